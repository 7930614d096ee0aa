use anyhow::{Context, Result};
use rawtcp_echo::args::ServerArgs;
use rawtcp_echo::EchoServer;
use tracing::info;

fn main() -> Result<()> {
    let args = ServerArgs::parse();
    rawtcp_echo::init_logging(args.verbose);

    let config = args.into_config().context("invalid server configuration")?;
    let mut server = EchoServer::bind(&config.server).context("failed to start echo server")?;

    let sessions = server.run();
    let total: u64 = sessions.iter().map(|s| s.bytes_read).sum();
    info!(sessions = sessions.len(), bytes = total, "echo server done");
    Ok(())
}
