use std::sync::Arc;
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod client;
mod config;
mod handler;
mod transcript;
mod tui;
mod ui;

use app::App;
use client::AskClient;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to a file; the terminal belongs to the UI
    if let Err(err) = init_tracing() {
        eprintln!("warning: logging disabled: {}", err);
    }

    let config = Config::load().unwrap_or_else(|_| Config::new());
    tracing::info!(endpoint = config.endpoint(), "starting");

    let client = AskClient::new(config.endpoint());
    let mut app = App::new(client);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut terminal, &mut events, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, events: &mut tui::EventHandler, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }
    Ok(())
}

fn init_tracing() -> Result<()> {
    let log_path = Config::log_path()?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "askchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false),
        )
        .init();

    Ok(())
}
