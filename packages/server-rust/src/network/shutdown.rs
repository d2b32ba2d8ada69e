//! Health state and graceful shutdown for the HTTP host.
//!
//! The state moves `Starting -> Ready -> Draining -> Stopped`. It turns to
//! `Draining` as soon as the process shutdown signal fires, before the HTTP
//! server stops accepting connections, so readiness probes answer 503 for
//! the whole graceful window. `Stopped` is reached once no OWS request is
//! in flight.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Notify};
use tracing::info;

/// Server health state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Starting,
    Ready,
    /// Shutdown signalled; in-flight requests are finishing.
    Draining,
    Stopped,
}

impl HealthState {
    /// Lower-case name used in the `/health` body.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// In-flight request count; `idle` is notified when it drops to zero.
#[derive(Debug, Default)]
struct Requests {
    active: AtomicU64,
    idle: Notify,
}

/// Coordinates readiness, the shutdown signal and request draining.
#[derive(Debug)]
pub struct ShutdownController {
    state: ArcSwap<HealthState>,
    stopping: watch::Sender<bool>,
    requests: Arc<Requests>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(HealthState::Starting),
            stopping: watch::Sender::new(false),
            requests: Arc::default(),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(HealthState::Ready));
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.state.load()
    }

    /// Moves to `Draining`. Idempotent.
    pub fn trigger_shutdown(&self) {
        self.state.store(Arc::new(HealthState::Draining));
        self.stopping.send_replace(true);
    }

    /// Wraps the process shutdown signal: once `signal` resolves the
    /// controller is `Draining`, then the returned future resolves.
    ///
    /// Hand the result to the HTTP server as its graceful shutdown trigger.
    pub fn draining_on(
        self: &Arc<Self>,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> impl Future<Output = ()> + Send + 'static {
        let controller = Arc::clone(self);
        async move {
            signal.await;
            controller.trigger_shutdown();
            info!(
                in_flight = controller.in_flight_count(),
                "Shutdown signalled, draining OWS requests"
            );
        }
    }

    /// Counts one request as in flight until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.requests.active.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            requests: Arc::clone(&self.requests),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.requests.active.load(Ordering::Acquire)
    }

    /// Waits until no request is in flight, at most `timeout`.
    ///
    /// On success the state becomes `Stopped` and `true` is returned; on
    /// timeout the state is left unchanged.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let idle = async {
            loop {
                // Created before the check so a concurrent drop to zero is not missed.
                let notified = self.requests.idle.notified();
                if self.in_flight_count() == 0 {
                    return;
                }
                notified.await;
            }
        };

        let drained =
            self.in_flight_count() == 0 || tokio::time::timeout(timeout, idle).await.is_ok();
        if drained {
            self.state.store(Arc::new(HealthState::Stopped));
        }
        drained
    }

    /// Resolves only when shutdown was triggered and requests are still in
    /// flight `timeout` later. Pends forever otherwise.
    pub async fn drain_expired(&self, timeout: Duration) {
        let mut stopping = self.stopping.subscribe();
        if stopping.wait_for(|stopping| *stopping).await.is_ok()
            && !self.wait_for_drain(timeout).await
        {
            return;
        }
        std::future::pending::<()>().await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop, including during unwinding.
#[derive(Debug)]
pub struct InFlightGuard {
    requests: Arc<Requests>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.requests.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.requests.idle.notify_waiters();
        }
    }
}
