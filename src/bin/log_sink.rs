use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use ringleader::cli::SinkArgs;
use ringleader::config::TransportConfig;
use ringleader::sink::LogSink;
use ringleader::transport::serve;
use ringleader::util::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let args = SinkArgs::parse();

    let sink = LogSink::open(&args.file)
        .await
        .with_context(|| format!("failed to prepare {}", args.file.display()))?;
    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind the log sink on {}", args.listen))?;
    tracing::info!(listen = %args.listen, file = %args.file.display(), "log sink ready");

    tokio::select! {
        _ = serve(listener, Arc::new(sink), TransportConfig::default()) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("failed to wait for ctrl-c")?;
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
