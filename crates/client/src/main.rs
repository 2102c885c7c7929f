use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use webterm_client::{Config, SessionRegistry, SessionState, UiModel, WsConnector};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!("webterm - persistent terminal sessions in the browser");
    println!();
    println!("USAGE:");
    println!("    webterm [OPTIONS] [WS_URL]");
    println!();
    println!("OPTIONS:");
    println!("    --session <id>   Re-attach to an existing session id");
    println!("    --version, -v    Print version");
    println!("    --help, -h       Print this help");
    println!();
    println!("Defaults to the ws_url from ~/.config/webterm/config.toml.");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging (tracing)
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let mut url_arg: Option<String> = None;
    let mut session_id: Option<String> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-v" => {
                println!("webterm {VERSION}");
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--session" => {
                session_id = args.next();
                if session_id.is_none() {
                    anyhow::bail!("--session requires an id");
                }
            }
            other => url_arg = Some(other.to_string()),
        }
    }

    Config::create_default_if_missing();
    let config = Config::load();
    let url = url_arg.unwrap_or_else(|| config.server.ws_url.clone());

    let ui = Arc::new(UiModel::new());
    let registry = SessionRegistry::new(config, Arc::new(WsConnector), ui);

    let handle = match session_id {
        Some(id) => registry.open_with_id(id, &url),
        None => registry.open(&url),
    };
    eprintln!("session {} -> {url}", handle.id());

    // PTY output to stdout
    let mut output = handle.subscribe_output();
    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        loop {
            match output.recv().await {
                Ok(bytes) => {
                    if stdout.write_all(&bytes).await.is_err() {
                        break;
                    }
                    let _ = stdout.flush().await;
                }
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    tracing::warn!(dropped, "renderer lagging, output frames skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Line-buffered stdin to the session; input typed during an outage is
    // queued and replayed by the session on reconnect.
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                handle.close()?;
                break;
            }
            () = async {
                let _ = handle.wait_for_state(SessionState::Failed).await;
            } => {
                eprintln!("connection lost permanently, giving up");
                break;
            }
            line = stdin.next_line() => match line? {
                Some(mut line) => {
                    line.push('\n');
                    handle.input(line.into_bytes())?;
                }
                None => {
                    handle.close()?;
                    break;
                }
            },
        }
    }

    registry.dispose(handle.id());
    Ok(())
}
