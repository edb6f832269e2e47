//! Core services that make up the keep registry of a signer node.
//!
//! Each service encapsulates a specific responsibility and is composed by the
//! [`KeepRegistry`](crate::KeepRegistry) or spawned by the hosting application.
//!
//! # Services overview
//!
//! - [`event_bus`] – per-topic subscriptions and asynchronous dispatch of keep events.
//! - [`keep_event_watcher`] – reacts to keep events of a chain by invoking a handler.
//! - [`keep_store`] – the authoritative, concurrency-safe record of every keep.

pub mod event_bus;
pub mod keep_event_watcher;
pub mod keep_store;
