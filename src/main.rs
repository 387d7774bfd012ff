use projukti_backend::config::AppConfig;
use projukti_backend::run_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("mongodb", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    println!(
        "Configuration loaded: server={}:{}, database={}",
        config.server.host, config.server.port, config.database.name
    );

    run_server(config).await
}
