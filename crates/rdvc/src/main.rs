#![forbid(unsafe_code)]

use clap::Parser;
use rdvc::RelayClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line peer for the rendezvous relay.
///
/// Each stdin line `DEST MESSAGE...` sends MESSAGE to DEST; every message
/// received is printed on its own line.
#[derive(Parser, Debug)]
#[command(name = "rdvc")]
#[command(version)]
struct Cli {
    /// Relay endpoint.
    #[arg(long, default_value = "ws://127.0.0.1:12345/enter", env = "RDVC_URL")]
    url: String,
    /// Name to register under.
    #[arg(short, long)]
    name: String,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let directive = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::new(directive)
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Split `DEST MESSAGE...` at the first space.
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let (dest, body) = line.split_once(' ')?;
    if dest.is_empty() {
        return None;
    }
    Some((dest, body))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut client = RelayClient::connect(&cli.url, &cli.name).await?;
    info!("registered as {} at {}", client.name(), cli.url);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Some((dest, body)) => client.send(dest, body).await?,
                    None => warn!("expected `DEST MESSAGE`, got {:?}", line),
                }
            }
            msg = client.recv() => {
                match msg? {
                    Some(body) => println!("{body}"),
                    None => {
                        info!("relay closed the connection");
                        return Ok(());
                    }
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}
