use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toygateway_protocol::Frame;

use crate::metrics::Metrics;
use crate::runtime::TaskSpawner;

use super::guard::SessionGuard;
use super::handle::SessionHandle;

/// Owns the live-sessions map and the idle-reap background task (§4.2).
///
/// A `DashMap` keyed by session id, an `AtomicU64` id-suffix generator, and a
/// hierarchical `CancellationToken` so `close_all` can force-close every
/// session without touching the map mutation path individual sessions use.
pub struct SessionManager {
    sessions: DashMap<String, Arc<SessionHandle>>,
    id_suffix: AtomicU64,
    global_cancel: RwLock<CancellationToken>,
    metrics: Arc<Metrics>,
}

impl SessionManager {
    pub fn new(metrics: Arc<Metrics>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            id_suffix: AtomicU64::new(0),
            global_cancel: RwLock::new(CancellationToken::new()),
            metrics,
        })
    }

    /// Allocates a Session for a newly-accepted connection. The id is the
    /// device id plus a monotonic timestamp and counter suffix.
    pub fn register(
        self: &Arc<Self>,
        device_id: String,
        toy_id: String,
    ) -> (Arc<SessionHandle>, SessionGuard, mpsc::UnboundedReceiver<Frame>) {
        let suffix = self.id_suffix.fetch_add(1, Ordering::Relaxed);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let id = format!("{device_id}-{timestamp}-{suffix}");

        let cancel_token = self.global_cancel.read().child_token();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let handle = Arc::new(SessionHandle::new(
            id.clone(),
            device_id,
            toy_id,
            outbound_tx,
            cancel_token.clone(),
        ));

        self.sessions.insert(id.clone(), Arc::clone(&handle));
        self.metrics.sessions_total.inc();
        self.metrics.active_sessions.inc();

        let guard = SessionGuard::new(id, Arc::clone(self), cancel_token);
        (handle, guard, outbound_rx)
    }

    pub fn unregister(&self, id: &str) {
        if let Some((_, handle)) = self.sessions.remove(id) {
            if !handle.ingress_is_empty() {
                log::warn!(
                    "[session] {} disconnected with a non-empty ingress buffer; partial utterance lost",
                    handle.id
                );
            }
            self.metrics.active_sessions.dec();
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.sessions.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Force-closes every live session; used on shutdown.
    pub fn close_all(&self) {
        let mut guard = self.global_cancel.write();
        guard.cancel();
        *guard = CancellationToken::new();
    }

    /// Spawns the idle-reap loop (§4.2): every `scan_interval`, close any
    /// session whose last-activity timestamp exceeds `idle_timeout`.
    pub fn spawn_idle_reaper(
        self: &Arc<Self>,
        spawner: &dyn TaskSpawner,
        scan_interval: std::time::Duration,
        idle_timeout: std::time::Duration,
    ) {
        let manager = Arc::clone(self);
        spawner.spawn(async move {
            let mut interval = tokio::time::interval(scan_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                manager.reap_idle_sessions(idle_timeout);
            }
        });
    }

    fn reap_idle_sessions(&self, idle_timeout: std::time::Duration) {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.value().idle_for() > idle_timeout)
            .map(|e| e.key().clone())
            .collect();

        for id in stale {
            if let Some(handle) = self.get(&id) {
                log::info!("[session] reaping idle session {id}");
                handle.cancel_token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::TokioSpawner;

    #[tokio::test]
    async fn register_then_unregister_tracks_active_count() {
        let metrics = Arc::new(Metrics::new());
        let manager = SessionManager::new(Arc::clone(&metrics));

        let (_handle, guard, _rx) = manager.register("device-1".into(), "toy-1".into());
        assert_eq!(manager.active_count(), 1);

        drop(guard);
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn idle_reaper_cancels_stale_sessions() {
        let metrics = Arc::new(Metrics::new());
        let manager = SessionManager::new(metrics);
        let (handle, _guard, _rx) = manager.register("device-1".into(), "toy-1".into());

        let spawner = TokioSpawner::current();
        manager.spawn_idle_reaper(
            &spawner,
            std::time::Duration::from_millis(5),
            std::time::Duration::from_millis(0),
        );

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(handle.cancel_token.is_cancelled());
    }
}
