use cellar_api::{server, setup, telemetry};
use cellar_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    telemetry::init(&config);

    let (_state, router) = setup::initialize_app(config.clone()).await?;
    server::start_server(&config, router).await?;

    Ok(())
}
