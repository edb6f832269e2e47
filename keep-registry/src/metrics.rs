//! Metrics definitions for the keep registry.
//!
//! This module defines all metrics keys used by the registry and
//! provides a helper [`describe_metrics`] to set metadata for
//! each metric using the `metrics` crate.

/// Metrics key for the amount of registered keeps.
pub const METRICS_ID_REGISTRY_KEEPS: &str = "keep.registry.keeps";
/// Metrics key for submitted public keys.
pub const METRICS_ID_REGISTRY_PUBLIC_KEYS: &str = "keep.registry.public_keys";
/// Metrics key for rejected duplicate public keys.
pub const METRICS_ID_REGISTRY_DUPLICATE_PUBLIC_KEYS: &str = "keep.registry.public_keys.duplicate";
/// Metrics key for submitted signatures.
pub const METRICS_ID_REGISTRY_SIGNATURES: &str = "keep.registry.signatures";
/// Metrics key for signature requests.
pub const METRICS_ID_REGISTRY_SIGNATURE_REQUESTS: &str = "keep.registry.signature_requests";

/// Metrics key for the currently live subscriptions.
pub const METRICS_ID_BUS_SUBSCRIPTIONS: &str = "keep.bus.subscriptions";
/// Metrics key for published events.
pub const METRICS_ID_BUS_PUBLISHED: &str = "keep.bus.published";
/// Metrics key for events handed to a subscriber callback.
pub const METRICS_ID_BUS_DELIVERED: &str = "keep.bus.delivered";
/// Metrics key for subscribers whose delivery task died.
pub const METRICS_ID_BUS_DEAD_SUBSCRIBERS: &str = "keep.bus.dead_subscribers";

/// Metrics key for events the keep event watcher forwarded to its handler.
pub const METRICS_ID_WATCHER_EVENTS: &str = "keep.watcher.events";
/// Metrics key for failed or timed out handler invocations.
pub const METRICS_ID_WATCHER_HANDLER_ERROR: &str = "keep.watcher.handler.error";

/// Describe all metrics used by the registry.
///
/// This calls the `describe_*` functions from the `metrics` crate to set metadata on the different metrics.
pub fn describe_metrics() {
    metrics::describe_gauge!(
        METRICS_ID_REGISTRY_KEEPS,
        metrics::Unit::Count,
        "Number of keeps stored in the registry"
    );

    metrics::describe_counter!(
        METRICS_ID_REGISTRY_PUBLIC_KEYS,
        metrics::Unit::Count,
        "Number of keep public keys submitted"
    );

    metrics::describe_counter!(
        METRICS_ID_REGISTRY_DUPLICATE_PUBLIC_KEYS,
        metrics::Unit::Count,
        "Number of public key submissions rejected because the keep already has one"
    );

    metrics::describe_counter!(
        METRICS_ID_REGISTRY_SIGNATURES,
        metrics::Unit::Count,
        "Number of signatures submitted"
    );

    metrics::describe_counter!(
        METRICS_ID_REGISTRY_SIGNATURE_REQUESTS,
        metrics::Unit::Count,
        "Number of signature requests"
    );

    metrics::describe_gauge!(
        METRICS_ID_BUS_SUBSCRIPTIONS,
        metrics::Unit::Count,
        "Number of live event subscriptions"
    );

    metrics::describe_counter!(
        METRICS_ID_BUS_PUBLISHED,
        metrics::Unit::Count,
        "Number of events published on the event bus"
    );

    metrics::describe_counter!(
        METRICS_ID_BUS_DELIVERED,
        metrics::Unit::Count,
        "Number of events handed to subscriber callbacks"
    );

    metrics::describe_counter!(
        METRICS_ID_BUS_DEAD_SUBSCRIBERS,
        metrics::Unit::Count,
        "Number of subscribers removed because their delivery task stopped"
    );

    metrics::describe_counter!(
        METRICS_ID_WATCHER_EVENTS,
        metrics::Unit::Count,
        "Number of events the keep event watcher handled"
    );

    metrics::describe_counter!(
        METRICS_ID_WATCHER_HANDLER_ERROR,
        metrics::Unit::Count,
        "Number of keep event handler invocations that failed or timed out"
    )
}
