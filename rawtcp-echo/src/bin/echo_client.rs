use anyhow::{Context, Result};
use rawtcp_echo::args::ClientArgs;
use rawtcp_echo::EchoClient;

fn main() -> Result<()> {
    let args = ClientArgs::parse();
    rawtcp_echo::init_logging(args.verbose);

    let config = args.into_config().context("invalid client configuration")?;
    let client = EchoClient::connect(&config.client).context("failed to connect")?;
    let stats = client.run().context("echo exchange failed")?;

    let mut offset = 0;
    for round in 1..=stats.rounds {
        println!("{} bytes written.", round);
        let echoed = stats.echoed.get(offset..offset + round).unwrap_or_default();
        println!("{}", String::from_utf8_lossy(echoed));
        offset += round;
    }
    println!("total {} bytes sent.", stats.bytes_written);
    println!("total {} bytes read.", stats.bytes_read);
    Ok(())
}
