mod action;
mod app;
mod auth;
mod avatar;
mod config;
mod error;
mod event;
mod list;
mod pagination;
mod search;
#[cfg(test)]
mod test_support;
mod tui;
mod types;
mod ui;

use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::action::Action;
use crate::app::App;
use crate::avatar::HttpImages;
use crate::config::Config;
use crate::event::Event;
use crate::search::GitHubSearch;
use crate::tui::EventHandler;

#[derive(Parser, Debug)]
#[command(name = "starseek", version, about = "Search GitHub repositories by stars")]
struct Cli {
    /// Initial search term; lists everything when omitted
    query: Option<String>,

    /// Search qualifier appended to every query (e.g. "language:Rust")
    #[arg(long)]
    filter: Option<String>,

    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref());
    if let Some(filter) = cli.filter {
        config.search.filter = filter;
    }

    let token = auth::load_token(&config.auth);
    let search = GitHubSearch::new(&config.search, token)?;

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = tui::restore();
        original_hook(panic_info);
    }));

    let result = run(config, search, cli.query).await;

    // Restore terminal
    tui::restore()?;

    result
}

async fn run(
    config: Config,
    search: GitHubSearch,
    initial_query: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut terminal = tui::init()?;

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();

    let mut app = App::new(
        &config,
        Arc::new(search),
        Arc::new(HttpImages::default()),
        action_tx.clone(),
    )
    .with_initial_query(initial_query);

    let tick_rate = Duration::from_millis(250);
    let render_rate = Duration::from_millis(16); // ~60fps
    let mut events = EventHandler::new(tick_rate, render_rate);

    // User input and fetch completions are handled one at a time here, so
    // the app state never sees two updates at once.
    loop {
        tokio::select! {
            Some(event) = events.next() => {
                if event.is_quit() {
                    break;
                }

                match event {
                    Event::Render => {
                        terminal.draw(|frame| {
                            app.prepare_frame(ui::list_viewport_height(frame.area()));
                            ui::render(frame, &app);
                        })?;
                    }
                    _ => {
                        let action = app.handle_event(event);
                        if !matches!(action, Action::None) {
                            action_tx.send(action)?;
                        }
                    }
                }
            }
            Some(action) = action_rx.recv() => {
                app.update(action);
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
