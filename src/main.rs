use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use ringleader::cli::NodeArgs;
use ringleader::node::spawn_node;
use ringleader::transport::TcpTransport;
use ringleader::util::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let args = NodeArgs::parse();
    let config = args.node_config();
    let transport_config = args.transport_config();

    let listen = args.listen_address();
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind the election listener on {listen}"))?;
    tracing::info!(
        id = config.node_id,
        %listen,
        members = ?config.membership,
        leader = config.default_leader,
        "starting ring node"
    );

    let node = spawn_node(config, TcpTransport::new(transport_config.clone()), listener, transport_config);

    if args.elect_on_start {
        node.service.start_election(None).await;
    }

    tokio::signal::ctrl_c().await.context("failed to wait for ctrl-c")?;
    tracing::info!("shutting down");
    node.shutdown();

    Ok(())
}
