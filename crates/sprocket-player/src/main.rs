mod app;
mod engine;
mod session;
mod settings;
mod transport;

use anyhow::Result;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    run()
}

#[cfg(unix)]
fn run() -> Result<()> {
    let settings = settings::PlayerSettings::load();
    let binary = settings
        .mpv_binary
        .clone()
        .unwrap_or_else(|| "mpv".to_string());

    let engine = engine::mpv::MpvEngine::spawn(&binary)?;
    let mut app = app::App::new(Box::new(engine), settings)?;
    if let Some(source) = std::env::args().nth(1) {
        app.open(&source);
    }
    app.run()
}

#[cfg(not(unix))]
fn run() -> Result<()> {
    anyhow::bail!("the mpv engine is driven over a Unix IPC socket; this platform is unsupported")
}
