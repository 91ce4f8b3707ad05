use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::debug;

use super::store::TtlStore;

/// Run [`TtlStore::cleanup_expired`] on every interval tick until the handle is aborted.
pub fn spawn_cleanup<T>(store: Arc<TtlStore<T>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Serialize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick completes immediately
        loop {
            ticker.tick().await;
            let removed = store.cleanup_expired();
            if removed > 0 {
                debug!(
                    target_module = "cache::sweeper",
                    removed, "Swept expired result cache entries"
                );
            }
        }
    })
}
