use std::sync::Arc;

use continuum_host::config::Config;
use continuum_host::facade::MemoryFacade;
use continuum_host::protocol::serve_stdio;
use continuum_host::server::ToolServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(data_dir = %config.data_dir.display(), "starting continuum memory server");

    let facade = Arc::new(MemoryFacade::new(config).await?);
    facade.spawn_maintenance_loop();

    let server = Arc::new(ToolServer::new(facade));
    serve_stdio(server).await?;

    Ok(())
}
