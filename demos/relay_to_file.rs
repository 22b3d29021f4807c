//! Relay a live HTTP stream into a temp buffer and tee it into a file
//!
//! Run with: cargo run --example relay_to_file -- <STREAM_URL> [OUTPUT_FILE]
//!
//! Examples:
//!   cargo run --example relay_to_file -- http://192.168.1.20:5004/auto/v5.1
//!   cargo run --example relay_to_file -- http://192.168.1.20:5004/auto/v5.1 capture.ts
//!
//! The relay keeps the stream in a temp buffer under the system temp
//! directory for as long as it runs. The output file is attached as a live
//! consumer, so it only receives bytes from the moment it is attached.
//! Press Ctrl-C to stop; the temp buffer is deleted on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::BufWriter;
use tokio_util::sync::CancellationToken;

use tuner_relay::{HttpSource, LiveStream, LocalApiLocator, RelayConfig, TempDirPaths};

fn print_usage() {
    eprintln!("Usage: relay_to_file <STREAM_URL> [OUTPUT_FILE]");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tuner_relay=info".parse()?)
                .add_directive("relay_to_file=info".parse()?),
        )
        .init();

    let source = HttpSource::parse(&args[1])?;
    let output = args.get(2).cloned().unwrap_or_else(|| "capture.ts".to_string());

    let stream = LiveStream::new(
        Arc::new(source),
        &TempDirPaths::default(),
        Arc::new(LocalApiLocator::new("http://localhost:8096")),
        RelayConfig::default().reconnect_delay(Duration::from_millis(500)),
    );

    let opened = stream.open().await?;
    tracing::info!(
        temp = %opened.temp_path.display(),
        url = %opened.playback_url,
        "Stream is live"
    );

    let file = BufWriter::new(File::create(&output).await?);
    let tee = stream.attach_consumer(file, CancellationToken::new());
    tracing::info!(output = %output, "Recording");

    let mut stats_ticker = tokio::time::interval(Duration::from_secs(5));
    let mut tee = std::pin::pin!(tee);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            result = &mut tee => {
                match result {
                    Ok(()) => tracing::info!("Recording ended with the relay"),
                    Err(e) => tracing::warn!(error = %e, "Recording stopped"),
                }
                break;
            }
            _ = stats_ticker.tick() => {
                let stats = stream.stats();
                tracing::info!(
                    bytes = stats.bytes_relayed,
                    bitrate = stats.bitrate(),
                    reconnects = stats.reconnects,
                    consumers = stream.consumer_count(),
                    "Relay stats"
                );
            }
        }
    }

    stream.close().await;
    tracing::info!("Relay closed");

    Ok(())
}
