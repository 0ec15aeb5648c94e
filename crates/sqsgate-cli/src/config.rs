//! AWS SDK configuration from command line flags and the environment.

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::config::Credentials;

/// Region used when neither `--region` nor the AWS environment names one.
pub const DEFAULT_REGION: &str = "eu-central-1";

pub const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

#[derive(Debug, Clone, clap::Args)]
pub struct AwsArgs {
    /// Talk to LocalStack with static test credentials
    #[arg(long, global = true)]
    pub local: bool,

    /// Override the SQS endpoint (defaults to LocalStack with --local)
    #[arg(long, global = true, env = "SQSGATE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// AWS region; falls back to the AWS environment, then eu-central-1
    #[arg(long, global = true)]
    pub region: Option<String>,
}

impl AwsArgs {
    pub async fn load(&self) -> SdkConfig {
        let region = RegionProviderChain::first_try(self.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::from_static(DEFAULT_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

        if self.local {
            log::debug!("using LocalStack credentials");
            loader = loader
                .credentials_provider(Credentials::new("test", "test", None, None, "static"))
                .endpoint_url(self.endpoint.as_deref().unwrap_or(LOCALSTACK_ENDPOINT));
        } else if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        loader.load().await
    }
}
