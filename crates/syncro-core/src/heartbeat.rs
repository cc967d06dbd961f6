//! Presence heartbeat
//!
//! Tells the coordination service this session still has a document
//! mounted, and whether it holds unflushed local changes.
//!
//! The beacon is a self-rescheduling one-shot timer, not a fixed-rate
//! interval: the next sleep starts only after the previous beat settles,
//! so a slow coordinator delays beats instead of stacking them. Every
//! `enable`/`disable` bumps a generation counter; a timer task whose
//! generation is stale exits at its next decision point.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::coordinator::{Coordinator, HeartbeatSignal};
use crate::error::SyncroResult;
use crate::path::SyncroPath;

/// Liveness and dirty-flag beacon for one mounted path
pub struct PresenceHeartbeat {
    coordinator: Arc<dyn Coordinator>,
    path: SyncroPath,
    session: String,
    interval: Duration,
    enabled: AtomicBool,
    dirty: AtomicBool,
    beats: AtomicU64,
    generation: watch::Sender<u64>,
}

impl PresenceHeartbeat {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        path: SyncroPath,
        session: impl Into<String>,
        interval: Duration,
    ) -> Arc<Self> {
        let (generation, _) = watch::channel(0);
        Arc::new(Self {
            coordinator,
            path,
            session: session.into(),
            interval,
            enabled: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
            beats: AtomicU64::new(0),
            generation,
        })
    }

    /// Start beating, replacing any pending timer
    ///
    /// With `immediate`, one beat is sent right away before the first
    /// interval elapses. Must be called from within a tokio runtime.
    pub fn enable(self: &Arc<Self>, immediate: bool) {
        self.enabled.store(true, Ordering::SeqCst);
        let generation = self.bump();
        debug!("Heartbeat enabled for {} (gen {})", self.path, generation);

        let this = Arc::clone(self);
        tokio::spawn(async move { this.run(generation, immediate).await });
    }

    /// Stop scheduling beats; a beat already in flight completes
    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            debug!("Heartbeat disabled for {}", self.path);
        }
        self.bump();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flag unflushed local changes for the next beat
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Beats sent so far, successful or not
    pub fn beat_count(&self) -> u64 {
        self.beats.load(Ordering::SeqCst)
    }

    /// Send one beat now
    ///
    /// The dirty flag is consumed whether or not the request succeeds.
    pub async fn beat(&self) -> SyncroResult<()> {
        let dirty = self.dirty.swap(false, Ordering::SeqCst);
        let signal = HeartbeatSignal::new(self.session.as_str(), dirty);
        self.beats.fetch_add(1, Ordering::SeqCst);

        let result = self.coordinator.heartbeat(&self.path, &signal).await;
        if let Err(e) = &result {
            warn!("Heartbeat for {} failed: {}", self.path, e);
        }
        result
    }

    fn bump(&self) -> u64 {
        let mut next = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            next = *g;
        });
        next
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_enabled() && *self.generation.borrow() == generation
    }

    async fn run(self: Arc<Self>, generation: u64, immediate: bool) {
        let mut changes = self.generation.subscribe();

        if immediate && self.is_current(generation) {
            let _ = self.beat().await;
        }

        loop {
            if !self.is_current(generation) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            if !self.is_current(generation) {
                break;
            }
            let _ = self.beat().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::SyncroError;

    #[derive(Default)]
    struct RecordingCoordinator {
        signals: Mutex<Vec<HeartbeatSignal>>,
        failing: AtomicBool,
    }

    #[async_trait]
    impl Coordinator for RecordingCoordinator {
        async fn ensure_populated(&self, _path: &SyncroPath, _force: bool) -> SyncroResult<()> {
            Ok(())
        }

        async fn heartbeat(&self, _path: &SyncroPath, signal: &HeartbeatSignal) -> SyncroResult<()> {
            self.signals.lock().push(signal.clone());
            if self.failing.load(Ordering::SeqCst) {
                return Err(SyncroError::Transport {
                    url: "http://test/heartbeat".to_string(),
                    status: 500,
                });
            }
            Ok(())
        }

        async fn flush(&self, _path: &SyncroPath, _destroy: bool) -> SyncroResult<()> {
            Ok(())
        }
    }

    const INTERVAL: Duration = Duration::from_secs(10);

    fn setup() -> (Arc<RecordingCoordinator>, Arc<PresenceHeartbeat>) {
        let coordinator = Arc::new(RecordingCoordinator::default());
        let path: SyncroPath = "projects::11111111-1111-1111-1111-111111111111"
            .parse()
            .unwrap();
        let heartbeat = PresenceHeartbeat::new(coordinator.clone(), path, "session-1", INTERVAL);
        (coordinator, heartbeat)
    }

    /// Let spawned tasks run without crossing a beat boundary
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_then_periodic() {
        let (coordinator, heartbeat) = setup();

        heartbeat.enable(true);
        settle().await;
        assert_eq!(coordinator.signals.lock().len(), 1);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(coordinator.signals.lock().len(), 2);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(coordinator.signals.lock().len(), 3);
        assert_eq!(heartbeat.beat_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_immediate_waits_for_interval() {
        let (coordinator, heartbeat) = setup();

        heartbeat.enable(false);
        settle().await;
        assert!(coordinator.signals.lock().is_empty());

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(coordinator.signals.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_carried_then_reset() {
        let (coordinator, heartbeat) = setup();

        heartbeat.mark_dirty();
        heartbeat.enable(true);
        settle().await;
        assert!(!heartbeat.is_dirty());

        tokio::time::sleep(INTERVAL).await;
        let signals = coordinator.signals.lock().clone();
        assert_eq!(signals[0].dirty, Some(true));
        assert_eq!(signals[1].dirty, None);
        assert_eq!(signals[0].session, "session-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dirty_reset_on_failure() {
        let (coordinator, heartbeat) = setup();
        coordinator.failing.store(true, Ordering::SeqCst);

        heartbeat.mark_dirty();
        assert!(heartbeat.beat().await.is_err());
        assert!(!heartbeat.is_dirty());

        // The failed beat is not retried with the dirty bit
        assert!(heartbeat.beat().await.is_err());
        let signals = coordinator.signals.lock().clone();
        assert_eq!(signals[0].dirty, Some(true));
        assert_eq!(signals[1].dirty, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_stops_further_beats() {
        let (coordinator, heartbeat) = setup();

        heartbeat.enable(true);
        settle().await;
        heartbeat.mark_dirty();
        heartbeat.disable();

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(coordinator.signals.lock().len(), 1);
        assert!(heartbeat.is_dirty());
        assert!(!heartbeat.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reenable_replaces_timer() {
        let (coordinator, heartbeat) = setup();

        heartbeat.enable(true);
        settle().await;
        heartbeat.enable(true);
        settle().await;
        assert_eq!(coordinator.signals.lock().len(), 2);

        // Only one timer remains armed
        tokio::time::sleep(INTERVAL).await;
        assert_eq!(coordinator.signals.lock().len(), 3);
    }
}
