use artemis_relay::components::{component4, shutdown_signal};
use artemis_relay::config::{load_config, Component};
use artemis_relay::logging;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config(Component::Four)?;
    logging::init(&settings.logging.level);

    let runtime = component4::run(&settings)?;
    runtime.serve(&settings.server.addr(), shutdown_signal()).await?;
    Ok(())
}
