use std::sync::Arc;
use std::time::Duration;
use shared::Store;
use crate::cache::{Clock, TtlCache};
use crate::error::SessionError;
use super::{QueryId, RemoteSession, Transport};

/// A remote session whose query results are held for a TTL.
///
/// Views handed out are shared snapshots; callers read them, never mutate.
pub struct CachedSession<T> {
    remote: RemoteSession<T>,
    cache: TtlCache<QueryId, Store>,
}

impl<T: Transport> CachedSession<T> {
    pub fn new(remote: RemoteSession<T>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            remote,
            cache: TtlCache::new(ttl, clock),
        }
    }

    pub async fn read(&mut self, id: QueryId) -> Result<Arc<Store>, SessionError> {
        let remote = &mut self.remote;
        self.cache
            .read(id, move || RemoteSession::query(remote, id))
            .await
    }

    /// Hold results of `id` for `ttl` instead of the session default.
    pub fn with_ttl(mut self, id: QueryId, ttl: Duration) -> Self {
        self.cache = self.cache.with_ttl(id, ttl);
        self
    }

    pub async fn status(&mut self) -> Result<Arc<Store>, SessionError> {
        self.read(QueryId::Status).await
    }

    pub async fn peers(&mut self) -> Result<Arc<Store>, SessionError> {
        self.read(QueryId::Peers).await
    }

    pub async fn aggregate(&mut self) -> Result<Arc<Store>, SessionError> {
        self.read(QueryId::Aggregate).await
    }

    pub async fn close(self) {
        self.remote.close().await;
    }
}
