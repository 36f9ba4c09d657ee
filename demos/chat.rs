//! Interactive chat against a streaming chat service.
//!
//! Run with:
//! ```bash
//! export SSECHAT_BASE_URL="http://localhost:8080"
//! RUST_LOG=ssechat=debug cargo run --example chat
//! ```
//!
//! Type a prompt and press enter; the reply is printed as it streams in.
//! Ctrl-C stops the current reply, Ctrl-D exits.

use std::io::{self, BufRead, Write};

use futures::StreamExt;
use ssechat::client::{ChatClient, ClientError};
use ssechat::options::TransportOptions;
use ssechat::sse::is_done_marker;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let client = ChatClient::new(TransportOptions::from_env()?)?;
    println!("Chatting with {} (Ctrl-D to quit)\n", client.endpoint());

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        // Ctrl-C cancels only the reply in flight.
        let token = CancellationToken::new();
        let interrupt = tokio::spawn({
            let token = token.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    token.cancel();
                }
            }
        });

        match client.chat_stream_with_cancel(prompt, token).await {
            Ok(stream) => {
                futures::pin_mut!(stream);

                while let Some(chunk_result) = stream.next().await {
                    match chunk_result {
                        Ok(chunk) if is_done_marker(&chunk) => {}
                        Ok(chunk) => {
                            print!("{}", chunk);
                            io::stdout().flush()?;
                        }
                        Err(ClientError::StreamCancelled) => {
                            print!(" [interrupted]");
                        }
                        Err(e) => {
                            eprintln!("\nError in stream: {}", e);
                        }
                    }
                }
                println!("\n");
            }
            Err(e) => {
                eprintln!("Error starting stream: {}\n", e);
            }
        }

        interrupt.abort();
    }

    Ok(())
}
