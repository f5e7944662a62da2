//! Discovery telemetry.
//!
//! Lock-free counters describing what the discovery loop has done, read by
//! whatever metrics exporter or status view the host application uses.
//!
//! # Architecture
//!
//! ```text
//! DiscoveryLoop ─────► DiscoveryMetrics ─────► DiscoverySnapshot ─────► Views
//!                      (atomic counters)      (point-in-time copy)      (CLI, exporters)
//! ```
//!
//! # Example
//!
//! ```
//! use shardcache::telemetry::DiscoveryMetrics;
//!
//! let metrics = DiscoveryMetrics::new("chunks");
//! metrics.resolution_succeeded(3);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.servers, 3);
//! assert_eq!(snapshot.name, "chunks");
//! ```

mod metrics;
mod snapshot;

pub use metrics::DiscoveryMetrics;
pub use snapshot::DiscoverySnapshot;
