//! AWS S3 client construction from a [`ClientConfig`].

use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig as AwsRetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_runtime::env_config::file::{EnvConfigFileKind, EnvConfigFiles};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "user-provided";

impl ClientConfig {
    /// Build an S3 client from this configuration.
    ///
    /// Starts from the default provider chain and overrides the pieces
    /// the user configured: profile files, credentials, region, retry,
    /// timeouts, endpoint URL and path-style addressing.
    pub async fn create_client(&self) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        let mut profile_files = EnvConfigFiles::builder();
        let mut custom_profile_files = false;
        if let Some(path) = &self.client_config_location.aws_config_file {
            profile_files = profile_files.with_file(EnvConfigFileKind::Config, path);
            custom_profile_files = true;
        }
        if let Some(path) = &self.client_config_location.aws_shared_credentials_file {
            profile_files = profile_files.with_file(EnvConfigFileKind::Credentials, path);
            custom_profile_files = true;
        }
        if custom_profile_files {
            loader = loader.profile_files(profile_files.build());
        }

        match &self.credential {
            S3Credentials::Profile(profile_name) => {
                loader = loader.profile_name(profile_name);
            }
            S3Credentials::Credentials { access_keys } => {
                let credentials = Credentials::new(
                    access_keys.access_key.clone(),
                    access_keys.secret_access_key.clone(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                );
                loader = loader.credentials_provider(credentials);
            }
            S3Credentials::FromEnvironment => {}
        }

        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }

        loader = loader.retry_config(
            AwsRetryConfig::standard()
                .with_max_attempts(self.retry_config.aws_max_attempts)
                .with_initial_backoff(Duration::from_millis(
                    self.retry_config.initial_backoff_milliseconds,
                )),
        );

        let mut timeout_config = TimeoutConfig::builder();
        if let Some(ms) = self.cli_timeout_config.operation_timeout_milliseconds {
            timeout_config = timeout_config.operation_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.cli_timeout_config.operation_attempt_timeout_milliseconds {
            timeout_config = timeout_config.operation_attempt_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.cli_timeout_config.connect_timeout_milliseconds {
            timeout_config = timeout_config.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.cli_timeout_config.read_timeout_milliseconds {
            timeout_config = timeout_config.read_timeout(Duration::from_millis(ms));
        }
        loader = loader.timeout_config(timeout_config.build());

        let sdk_config = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(self.force_path_style);
        if let Some(endpoint_url) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        Client::from_conf(builder.build())
    }
}

/// Build an S3 client from the default provider chain only.
///
/// Used when no explicit client configuration was given.
pub async fn create_default_client() -> Client {
    let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    Client::new(&sdk_config)
}
