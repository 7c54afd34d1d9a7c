use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

use drainwatch::{
    DrainConfig, DrainCoordinator, ListenerGate, LoggingConfig, RequestTracker,
    TokioScheduler, tracked,
};

/// Line echo server that drains in-flight requests on SIGINT / SIGTERM
#[derive(Debug, Parser)]
#[command(name = "drainwatch", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "DRAINWATCH_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Seconds to wait for in-flight requests before exiting anyway
    #[arg(long, env = "DRAINWATCH_TIMEOUT", default_value_t = 30.0)]
    timeout: f64,

    /// Seconds between drain checks
    #[arg(long, env = "DRAINWATCH_POLL_INTERVAL", default_value_t = 5.0)]
    poll_interval: f64,

    /// Artificial processing time per request, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,

    /// Log level or filter directive
    #[arg(long, env = "DRAINWATCH_LOG", default_value = "info")]
    log_level: String,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&LoggingConfig {
        level: args.log_level.clone(),
        structured: args.json_logs,
    })?;

    let poll_interval = Duration::try_from_secs_f64(args.poll_interval)
        .context("poll interval must be a non-negative number of seconds")?;
    let mut config = DrainConfig::from_secs_f64(args.timeout)?;
    config.poll_interval = poll_interval;
    config.validate()?;

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    let tracker = Arc::new(RequestTracker::new());
    let gate = ListenerGate::new();
    let coordinator = Arc::new(DrainCoordinator::new(
        config,
        Arc::clone(&tracker),
        Arc::new(gate.clone()),
        Arc::new(TokioScheduler::new()),
    )?);
    coordinator.install();

    tokio::spawn(accept_loop(
        listener,
        gate,
        tracker,
        Duration::from_millis(args.delay_ms),
    ));

    let report = coordinator.completed().await;
    tracing::info!(
        outcome = %report.outcome,
        outstanding = report.outstanding,
        "Exiting"
    );
    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("invalid log filter {:?}", config.level))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.structured {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!(e))
}

async fn accept_loop(
    listener: TcpListener,
    gate: ListenerGate,
    tracker: Arc<RequestTracker>,
    delay: Duration,
) {
    loop {
        tokio::select! {
            () = gate.stopped() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let gate = gate.clone();
                    let tracker = Arc::clone(&tracker);
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(stream, &gate, &tracker, delay).await {
                            tracing::debug!(%peer, error = %e, "Connection closed with error");
                        }
                    });
                }
                Err(e) => tracing::warn!(error = %e, "Accept failed"),
            }
        }
    }

    drop(listener);
    gate.mark_closed();
}

/// Each line is one request, tracked until its reply is written
///
/// Stops reading once the gate is stopping; a request already running
/// finishes first.
async fn serve_connection(
    stream: TcpStream,
    gate: &ListenerGate,
    tracker: &Arc<RequestTracker>,
    delay: Duration,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            biased;
            () = gate.stopped() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        tracked(tracker, async {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await
        })
        .await?;
    }
    Ok(())
}
