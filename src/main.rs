//! peerchat - A Minimal Peer-to-Peer Terminal Chat
//!
//! This is the main entry point for a chat peer.
//! It sets up logging, the listener and the operator session.

use peerchat::config::{CliAction, Config};
use peerchat::connection::PeerContext;
use peerchat::console::{print_events, InputError, Interrupt, Session};
use peerchat::network::start_listener;
use tokio::io::BufReader;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!(
        r#"
peerchat - A Minimal Peer-to-Peer Terminal Chat

USAGE:
    peerchat [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to listen on (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on, 1024-65535 (prompted when absent)
    -c, --connect <IP,PORT>        Dial a peer at startup (repeatable)
        --connect-timeout <SECS>   Bound on each connect attempt (default: 10)
        --verbose                  Log at debug level
    -v, --version                  Print version information
        --help                     Print this help message

EXAMPLES:
    peerchat                                # Prompt for instance (1 = 8888, 2 = 8889)
    peerchat --port 8888                    # Listen on 127.0.0.1:8888
    peerchat -p 8889 -c 127.0.0.1,8888      # Listen on 8889 and dial 8888

CHATTING:
    At the menu choose (c)onnect to dial another peer, (s)end to start
    typing messages, or (e)xit. While sending, type 'exit' on its own line
    (or press Ctrl+C) to close every connection and quit.
"#
    );
}

fn print_banner(bind_address: &str) {
    println!(
        r#"
peerchat v{} - Peer-to-Peer Terminal Chat
──────────────────────────────────────────
Listening for peers on {}
"#,
        peerchat::VERSION,
        bind_address
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("peerchat version {}", peerchat::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    let _subscriber = FmtSubscriber::builder()
        .with_max_level(if config.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    println!("Peer-to-Peer Chat Application");

    // Shared registry, stats and the event channel feeding the printer
    let (ctx, events) = PeerContext::new();
    tokio::spawn(print_events(events));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut session = Session::new(
        stdin,
        ctx.clone(),
        config.connect_timeout,
        Interrupt::ctrl_c(),
    );

    let port = match config.port {
        Some(port) => port,
        None => match session.select_port().await {
            Ok(port) => port,
            Err(InputError::Interrupted) => {
                info!("Interrupted before choosing a port");
                // The stdin read is still pending, so returning would hang
                std::process::exit(0);
            }
            Err(InputError::Closed) => std::process::exit(0),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    // A bind failure only disables inbound connections
    let listener = start_listener(&config.host, port, ctx.clone()).await;
    if listener.is_some() {
        print_banner(&config.bind_address(port));
    } else {
        warn!(port = port, "Not accepting inbound connections");
    }

    for peer in &config.peers {
        session.connect(peer).await;
    }

    let reason = session.run().await;

    drop(listener);
    info!(reason = ?reason, "Peer shutdown complete");

    // Returning would wait on the blocking stdin read; handler tasks are not joined either
    std::process::exit(0);
}
