//! Configuration types and CLI/environment parsing for a signer node using the keep registry.
//!
//! Concrete binaries may have a more detailed config and can use the exposed [`KeepNodeConfig`] and flatten it with `#[clap(flatten)]`.
//!
//! Additionally this module defines the [`Environment`] to assert dev-only code.

use std::time::Duration;

use clap::{Parser, ValueEnum};

/// The environment the node is running in.
///
/// Main usage for the `Environment` is to call
/// [`Environment::assert_is_dev`]. Backends that are intended
/// for `dev` only (like the [`LocalChain`](crate::chain::LocalChain))
/// shall assert that they are called from the `dev` environment.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Environment {
    /// Production environment.
    Prod,
    /// Development environment.
    Dev,
}

impl Environment {
    /// Asserts that `Environment` is `dev`. Panics if not the case.
    pub fn assert_is_dev(&self) {
        assert!(matches!(self, Environment::Dev), "Is not dev environment")
    }
}

/// The configuration for the keep registry and the keep event watcher.
///
/// It can be configured via environment variables or command line arguments using `clap`.
#[derive(Parser, Debug, Clone)]
pub struct KeepNodeConfig {
    /// The environment of the node (either `prod` or `dev`).
    #[clap(long, env = "KEEP_NODE_ENVIRONMENT", default_value = "prod")]
    pub environment: Environment,

    /// Max time a single keep event handler invocation may take (key generation or signing).
    #[clap(
        long,
        env = "KEEP_NODE_EVENT_HANDLER_TIMEOUT",
        default_value = "5min",
        value_parser = humantime::parse_duration
    )]
    pub event_handler_timeout: Duration,

    /// Max wait time the node waits for its workers during shutdown.
    #[clap(
        long,
        env = "KEEP_NODE_MAX_WAIT_TIME_SHUTDOWN",
        default_value = "10s",
        value_parser = humantime::parse_duration
    )]
    pub max_wait_time_shutdown: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KeepNodeConfig::parse_from(["keep-node"]);
        assert!(matches!(config.environment, Environment::Prod));
        assert_eq!(config.event_handler_timeout, Duration::from_secs(300));
        assert_eq!(config.max_wait_time_shutdown, Duration::from_secs(10));
    }

    #[test]
    fn parse_args() {
        let config = KeepNodeConfig::parse_from([
            "keep-node",
            "--environment",
            "dev",
            "--event-handler-timeout",
            "2s",
        ]);
        config.environment.assert_is_dev();
        assert_eq!(config.event_handler_timeout, Duration::from_secs(2));
    }

    #[test]
    #[should_panic(expected = "Is not dev environment")]
    fn prod_is_not_dev() {
        Environment::Prod.assert_is_dev();
    }
}
