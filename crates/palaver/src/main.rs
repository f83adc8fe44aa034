//! palaver - interactive terminal client for the chat relay
//!
//! Thin line-oriented wrapper around one TCP connection: one task
//! prints everything the server sends, the main loop forwards stdin
//! lines to the server. All protocol intelligence (prompting,
//! validation, routing) lives server-side.
//!
//! # Usage
//!
//! ```bash
//! # Connect to localhost:8888
//! palaver
//!
//! # Connect to a specific host and port
//! palaver chat.example.net 7000
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Default server host.
const DEFAULT_HOST: &str = "localhost";

/// Default server port; matches the server default.
const DEFAULT_PORT: u16 = 8888;

/// How long to wait for the server's farewell after quitting.
const FAREWELL_TIMEOUT: Duration = Duration::from_secs(1);

/// palaver - chat relay terminal client
#[derive(Parser, Debug)]
#[command(name = "palaver", version, about)]
struct Args {
    /// Server host
    #[arg(default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", args.host, args.port))?;

    println!("Connected to chat server at {}:{}", args.host, args.port);

    let (read_half, write_half) = stream.into_split();

    // Signalled by the printer task when the server closes the stream.
    let server_gone = CancellationToken::new();
    let mut printer = tokio::spawn(print_server_lines(read_half, server_gone.clone()));

    let mut writer = BufWriter::new(write_half);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = server_gone.cancelled() => {
                println!("Connection lost with server");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                // Best-effort farewell before exiting.
                let _ = send_line(&mut writer, "/quit").await;
                break;
            }

            line = stdin.next_line() => {
                match line {
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() {
                            continue;
                        }
                        if send_line(&mut writer, input).await.is_err() {
                            println!("Connection lost with server");
                            break;
                        }
                        if input.eq_ignore_ascii_case("/quit") {
                            break;
                        }
                    }
                    // Stdin closed (piped input ended): quit cleanly.
                    Ok(None) | Err(_) => {
                        let _ = send_line(&mut writer, "/quit").await;
                        break;
                    }
                }
            }
        }
    }

    // Let the farewell line print before tearing down.
    if timeout(FAREWELL_TIMEOUT, &mut printer).await.is_err() {
        printer.abort();
    }

    println!("Disconnected from server");
    Ok(())
}

/// Prints every server line until the stream ends, then signals.
async fn print_server_lines(read_half: OwnedReadHalf, server_gone: CancellationToken) {
    let mut lines = BufReader::new(read_half).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        println!("{line}");
    }

    server_gone.cancel();
}

/// Sends one newline-terminated line to the server.
async fn send_line(writer: &mut BufWriter<OwnedWriteHalf>, line: &str) -> std::io::Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
