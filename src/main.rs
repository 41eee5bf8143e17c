use anyhow::Result;

use duet::app::{App, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting duet karaoke controller");

    let app = App::new(AppConfig::default())?;

    // Headless boot: open the display surface with the built-in simulated
    // player. A desktop shell replaces the factory with a webview-backed
    // player and drives the same App surface from its UI.
    let opened = app.open_display();
    match opened.window_id {
        Some(id) => log::info!("display window {id} open"),
        None => log::error!(
            "failed to open display window: {}",
            opened.error.unwrap_or_default()
        ),
    }

    log::info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c().await?;

    log::info!("Shutting down");
    app.shutdown().await;

    Ok(())
}
