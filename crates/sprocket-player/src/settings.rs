use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub version: u32,
    pub volume: i32,
    pub loop_playback: bool,
    #[serde(default = "default_rate")]
    pub rate: f32,
    #[serde(default)]
    pub mpv_binary: Option<String>,
}

fn default_rate() -> f32 {
    1.0
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            volume: 100,
            loop_playback: false,
            rate: 1.0,
            mpv_binary: None,
        }
    }
}

impl PlayerSettings {
    pub fn load() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = config_dir.join("sprocket").join("settings.json");
        match std::fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        let Some(config_dir) = dirs::config_dir() else {
            return;
        };
        let dir = config_dir.join("sprocket");
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("settings.json");
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
