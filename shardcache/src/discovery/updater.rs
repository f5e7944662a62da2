//! One discovery step: resolve, sort, apply.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{DiscoveryError, Resolver};
use crate::selector::{ServerSelector, ServerSet};
use crate::telemetry::DiscoveryMetrics;

/// Called with the new server set after a membership change.
pub type MembershipHook = Box<dyn Fn(&ServerSet) + Send + Sync>;

/// Applies the resolver's answer to a selector.
///
/// Shared by the initial synchronous update in
/// [`DiscoveryLoop::start`](super::DiscoveryLoop::start) and every
/// subsequent tick.
pub struct ServerListUpdater {
    name: String,
    resolver: Arc<dyn Resolver>,
    selector: Arc<dyn ServerSelector>,
    metrics: Arc<DiscoveryMetrics>,
    on_change: Option<MembershipHook>,
}

impl ServerListUpdater {
    /// Creates an updater for the client `name`.
    pub fn new(
        name: impl Into<String>,
        resolver: Arc<dyn Resolver>,
        selector: Arc<dyn ServerSelector>,
        metrics: Arc<DiscoveryMetrics>,
    ) -> Self {
        Self {
            name: name.into(),
            resolver,
            selector,
            metrics,
            on_change: None,
        }
    }

    /// Registers `hook` to run after each update that changes membership.
    pub fn with_membership_hook(
        mut self,
        hook: impl Fn(&ServerSet) + Send + Sync + 'static,
    ) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    /// Client name used in log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The selector this updater feeds.
    pub fn selector(&self) -> &Arc<dyn ServerSelector> {
        &self.selector
    }

    /// The resolver this updater queries.
    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    /// Metrics updated on every step.
    pub fn metrics(&self) -> &Arc<DiscoveryMetrics> {
        &self.metrics
    }

    /// Resolves once and applies the sorted result.
    ///
    /// On failure the selector keeps its previous set and the server gauge is
    /// left untouched. Returns the number of servers applied.
    pub async fn update(&self) -> Result<usize, DiscoveryError> {
        let resolved = match self.resolver.resolve().await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.metrics.resolution_failed();
                return Err(e);
            }
        };

        let next = ServerSet::from_unsorted(resolved);
        let (added, removed) = self.selector.servers().diff(&next);
        let count = next.len();

        if let Err(e) = self.selector.set_servers(next) {
            self.metrics.resolution_failed();
            return Err(e.into());
        }
        self.metrics.resolution_succeeded(count);

        if count == 0 {
            warn!(name = %self.name, source = %self.resolver.describe(), "Discovery returned no servers");
        }

        if added == 0 && removed == 0 {
            debug!(name = %self.name, servers = count, "Server list unchanged");
        } else {
            self.metrics.membership_changed();
            info!(
                name = %self.name,
                servers = count,
                added,
                removed,
                "Server list updated"
            );
            if let Some(hook) = &self.on_change {
                hook(self.selector.servers().as_ref());
            }
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticResolver;
    use crate::selector::{SelectionStrategy, ServerAddr};
    use crate::BoxFuture;

    struct FailingResolver;

    impl Resolver for FailingResolver {
        fn resolve(&self) -> BoxFuture<'_, Result<Vec<ServerAddr>, DiscoveryError>> {
            Box::pin(async { Err(DiscoveryError::resolution("m", "SERVFAIL")) })
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    fn updater(resolver: Arc<dyn Resolver>) -> ServerListUpdater {
        ServerListUpdater::new(
            "test",
            resolver,
            SelectionStrategy::Modulo.build(),
            Arc::new(DiscoveryMetrics::new("test")),
        )
    }

    #[tokio::test]
    async fn test_update_applies_sorted_set() {
        let resolver = Arc::new(StaticResolver::new(vec![
            "b:1".into(),
            "a:1".into(),
            "c:1".into(),
            "a:1".into(),
        ]));
        let updater = updater(resolver);

        assert_eq!(updater.update().await.unwrap(), 3);

        let servers: Vec<String> = updater.selector().servers().iter().map(|s| s.to_string()).collect();
        assert_eq!(servers, vec!["a:1", "b:1", "c:1"]);

        let snapshot = updater.metrics().snapshot();
        assert_eq!(snapshot.servers, 3);
        assert_eq!(snapshot.resolutions_succeeded, 1);
        assert_eq!(snapshot.membership_changes, 1);
    }

    #[tokio::test]
    async fn test_membership_hook_sees_new_set_on_change_only() {
        let resolver = Arc::new(StaticResolver::new(vec!["b:1".into(), "a:1".into()]));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let updater = {
            let seen = Arc::clone(&seen);
            updater(resolver).with_membership_hook(move |servers| seen.lock().push(servers.clone()))
        };

        updater.update().await.unwrap();
        updater.update().await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ServerSet::from_unsorted(["a:1", "b:1"]));
    }

    #[tokio::test]
    async fn test_unchanged_set_is_not_a_membership_change() {
        let updater = updater(Arc::new(StaticResolver::new(vec!["a:1".into()])));
        updater.update().await.unwrap();
        updater.update().await.unwrap();

        let snapshot = updater.metrics().snapshot();
        assert_eq!(snapshot.resolutions_succeeded, 2);
        assert_eq!(snapshot.membership_changes, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_set() {
        let selector = SelectionStrategy::Consistent.build();
        selector
            .set_servers(ServerSet::from_unsorted(["a:1", "b:1"]))
            .unwrap();
        let metrics = Arc::new(DiscoveryMetrics::new("test"));
        metrics.resolution_succeeded(2);

        let updater = ServerListUpdater::new(
            "test",
            Arc::new(FailingResolver),
            Arc::clone(&selector),
            Arc::clone(&metrics),
        );

        assert!(matches!(
            updater.update().await,
            Err(DiscoveryError::Resolution { .. })
        ));
        assert_eq!(*selector.servers(), ServerSet::from_unsorted(["a:1", "b:1"]));
        assert_eq!(metrics.servers(), 2);
        assert_eq!(metrics.snapshot().resolutions_failed, 1);
    }

    #[tokio::test]
    async fn test_malformed_answer_is_rejected() {
        let updater = updater(Arc::new(StaticResolver::new(vec!["no-port".into()])));

        assert!(matches!(updater.update().await, Err(DiscoveryError::Apply(_))));
        assert!(updater.selector().servers().is_empty());
        assert_eq!(updater.metrics().snapshot().resolutions_failed, 1);
    }

    #[tokio::test]
    async fn test_empty_answer_clears_set() {
        let selector = SelectionStrategy::Modulo.build();
        selector.set_servers(ServerSet::from_unsorted(["a:1"])).unwrap();
        let updater = ServerListUpdater::new(
            "test",
            Arc::new(StaticResolver::new(Vec::new())),
            Arc::clone(&selector),
            Arc::new(DiscoveryMetrics::new("test")),
        );

        assert_eq!(updater.update().await.unwrap(), 0);
        assert!(selector.servers().is_empty());
    }
}
