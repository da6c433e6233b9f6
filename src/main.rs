use anyhow::Context;
use clap::Parser;
use safe_zones::core::ConfigProvider;
use safe_zones::utils::{logger, validation::Validate};
use safe_zones::{
    CliConfig, CommandRequest, DirectoryOptions, HttpGeoResolver, LocalProfileStore,
    LocalZoneStore, SubscriptionDirectory, TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_cli_logger(cli.verbose);
    tracing::debug!("CLI config: {:?}", cli);

    let mut config = match &cli.config {
        Some(path) => TomlConfig::from_file(path)
            .with_context(|| format!("Failed to load config file '{}'", path))?,
        None => TomlConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.clone();
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let geo = HttpGeoResolver::from_config(&config)?;
    let zones = LocalZoneStore::new(config.data_dir());
    let profiles = LocalProfileStore::new(config.data_dir());
    let directory = SubscriptionDirectory::with_options(
        zones,
        profiles,
        geo,
        DirectoryOptions::from_config(&config),
    );
    tracing::info!(
        "Using data directory {} and zone endpoint {}",
        config.data_dir(),
        config.zones_endpoint()
    );

    let Some((command, user, zip)) = cli.action.command_parts() else {
        let zones = directory.zones().await.context("Failed to list zones")?;
        println!("{}", serde_json::to_string_pretty(&zones)?);
        return Ok(());
    };

    let request = CommandRequest {
        command: command.to_string(),
        user: user.to_string(),
        postal_code: zip.to_string(),
    };
    let response = directory.handle_request(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if response.status.is_failure() {
        std::process::exit(2);
    }
    Ok(())
}
