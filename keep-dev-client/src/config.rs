use std::time::Duration;

use clap::Parser;
use keep_registry::config::KeepNodeConfig;

/// The configuration for the keep dev client.
///
/// It can be configured via environment variables or command line arguments using `clap`.
#[derive(Parser, Debug, Clone)]
pub struct DevClientConfig {
    /// The amount of keeps to create
    #[clap(long, env = "KEEP_DEV_CLIENT_KEEPS", default_value = "3")]
    pub keeps: usize,

    /// The amount of signatures requested from every keep
    #[clap(long, env = "KEEP_DEV_CLIENT_SIGNATURE_REQUESTS", default_value = "5")]
    pub signature_requests: usize,

    /// Pause between two signature requests of the same keep
    #[clap(long, env = "KEEP_DEV_CLIENT_REQUEST_INTERVAL", default_value="10ms", value_parser=humantime::parse_duration)]
    pub request_interval: Duration,

    /// max wait time for a public key or signature to show up on the chain.
    #[clap(long, env = "KEEP_DEV_CLIENT_EVENT_WAIT_TIMEOUT", default_value="5s", value_parser=humantime::parse_duration)]
    pub event_wait_timeout: Duration,

    /// The node config
    #[clap(flatten)]
    pub node: KeepNodeConfig,
}
