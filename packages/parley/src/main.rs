use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::warn;
use tracing_subscriber::prelude::*;

use parley::config::{self, ConnectionConfig, FileConfig};
use parley::connection::ConnectionManager;
use parley::controller::ChatController;
use parley::view::ViewFrame;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Terminal chat client backed by a message-exchange server")]
struct Args {
    /// WebSocket URL of the message-exchange server
    #[arg(short, long)]
    server: Option<String>,

    /// Path to config.toml (defaults to ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let default_directive = if args.debug {
        "parley=debug,chat_store=debug,info"
    } else {
        "parley=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let file_config: FileConfig = config::load_config(args.config.as_deref())
        .extract()
        .context("invalid configuration")?;
    let mut conn_config = ConnectionConfig::from_file(&file_config);
    if let Some(url) = args.server {
        conn_config.server_url = url;
    }

    let manager = ConnectionManager::new(conn_config);
    let mut events = manager.subscribe();
    let mut status = manager.watch_state();
    let mut controller = ChatController::new(manager.clone());
    let mut frames = controller.watch_frames();

    manager.connect().await;

    eprintln!("Type a message and press Enter. /select <id>, /clear, /retry, Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,

            line = lines.next_line() => match line? {
                Some(line) => handle_line(&mut controller, &manager, &line).await,
                // EOF
                None => break,
            },

            msg = events.recv() => match msg {
                Ok(msg) => controller.handle_server_message(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&frames.borrow_and_update());
            }

            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                eprintln!("[{}]", *status.borrow_and_update());
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}

async fn handle_line(controller: &mut ChatController, manager: &ConnectionManager, line: &str) {
    match line.trim() {
        "" => {}
        "/clear" => controller.clear_selection(),
        // Foreground-visibility analog: retry outside the backoff timer
        "/retry" => manager.notify_foreground().await,
        cmd if cmd.starts_with("/select ") => {
            controller.toggle_selection(cmd["/select ".len()..].trim());
        }
        text => {
            if let Err(e) = controller.submit(text).await {
                warn!(error = %e, "failed to submit message");
            }
        }
    }
}

/// Minimal line renderer, standing in for the real view layer.
fn render(frame: &ViewFrame) {
    println!(
        "── {} message(s) · head: {}",
        frame.messages.len(),
        frame.head.as_deref().unwrap_or("none")
    );
    for msg in &frame.messages {
        let marker = if frame.selected.as_deref() == Some(msg.id.as_str()) {
            '>'
        } else {
            ' '
        };
        println!("{marker}[{}] {}: {}", msg.short_id(), msg.role, msg.content);
    }
    if frame.typing {
        println!("  ...");
    }
}
