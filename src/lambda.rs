#[cfg(feature = "lambda")]
use aws_config::BehaviorVersion;
#[cfg(feature = "lambda")]
use aws_sdk_s3::config::Region;
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use safe_zones::core::api::{handle_api_event, ApiGatewayRequest, ApiGatewayResponse};
#[cfg(feature = "lambda")]
use safe_zones::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use safe_zones::{
    DirectoryOptions, HttpGeoResolver, LambdaConfig, S3ProfileStore, S3ZoneStore,
    SubscriptionDirectory,
};
#[cfg(feature = "lambda")]
use std::sync::Arc;

#[cfg(feature = "lambda")]
type Directory = SubscriptionDirectory<S3ZoneStore, S3ProfileStore, HttpGeoResolver>;

#[cfg(feature = "lambda")]
async fn function_handler(
    directory: &Directory,
    event: LambdaEvent<ApiGatewayRequest>,
) -> Result<ApiGatewayResponse, Error> {
    tracing::info!(request_id = %event.context.request_id, "Received zone command");
    Ok(handle_api_event(directory, &event.payload).await)
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let lambda_config = LambdaConfig::from_env()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    lambda_config
        .validate()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let region = Region::new(lambda_config.s3_region.clone());
    let config = aws_sdk_s3::config::Builder::from(&config)
        .region(region)
        .build();
    let s3_client = S3Client::from_conf(config);

    let zones = S3ZoneStore::new(
        s3_client.clone(),
        lambda_config.s3_bucket.clone(),
        lambda_config.s3_prefix.clone(),
    );
    let profiles = S3ProfileStore::new(
        s3_client,
        lambda_config.s3_bucket.clone(),
        lambda_config.s3_prefix.clone(),
    );
    let geo = HttpGeoResolver::from_config(&lambda_config)
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    let directory = Arc::new(SubscriptionDirectory::with_options(
        zones,
        profiles,
        geo,
        DirectoryOptions::from_config(&lambda_config),
    ));

    run(service_fn(move |event: LambdaEvent<ApiGatewayRequest>| {
        let directory = Arc::clone(&directory);
        async move { function_handler(&directory, event).await }
    }))
    .await
}
