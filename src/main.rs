use log::info;
use rconsole::{Client, ConnectOptions};
use std::{env, error::Error, time::Duration};

const USAGE: &str = "usage: rconsole <host> <port> <command...>

environment:
  RCON_PASSWORD       rcon password (required)
  RCON_SINGLE_PACKET  set to 1 for servers that never split responses
  RCON_TIMEOUT_SECS   give up connecting after this many seconds";

fn options_from_env() -> Result<ConnectOptions, Box<dyn Error>> {
    let mut options = ConnectOptions::default();
    if let Ok(single) = env::var("RCON_SINGLE_PACKET") {
        options = options.multi(!matches!(single.as_str(), "1" | "true"));
    }
    if let Ok(secs) = env::var("RCON_TIMEOUT_SECS") {
        options = options.timeout(Duration::from_secs(secs.parse()?));
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(host), Some(port)) = (args.next(), args.next()) else {
        return Err(USAGE.into());
    };
    let port: u16 = port.parse()?;
    let command = args.collect::<Vec<_>>().join(" ");
    if command.is_empty() {
        return Err(USAGE.into());
    }
    let password = env::var("RCON_PASSWORD").map_err(|_| "RCON_PASSWORD is not set")?;

    let mut client = Client::connect_authenticated(&host, port, &password, options_from_env()?).await?;
    info!("authenticated to {}:{}", host, port);

    let response = client.execute(&command).await?;
    println!("{}", response.text_lossy());

    client.disconnect().await?;
    Ok(())
}
