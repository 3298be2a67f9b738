//! Metrics emission is explicitly out of scope (§1) — this crate only
//! names the seam the surrounding sequencer plugs into.

use std::time::Instant;

/// Starts and stops a single publish-duration measurement. The trait
/// exists so `Publisher` never has to know what backs it (Prometheus
/// histogram, statsd timer, a test spy); `NoopMetrics` is the default
/// for callers that don't care.
pub trait PublishMetrics: Send + Sync {
    fn publish_timer(&self) -> Box<dyn PublishTimerGuard>;
}

pub trait PublishTimerGuard: Send {
    fn stop(self: Box<Self>);
}

pub struct NoopMetrics;

impl PublishMetrics for NoopMetrics {
    fn publish_timer(&self) -> Box<dyn PublishTimerGuard> {
        Box::new(NoopTimer)
    }
}

struct NoopTimer;

impl PublishTimerGuard for NoopTimer {
    fn stop(self: Box<Self>) {}
}

/// A timer that logs its own duration on `stop`; useful as a
/// drop-in when the surrounding system hasn't wired a real metrics
/// sink yet but an operator still wants the number in the logs.
pub struct LoggingMetrics;

impl PublishMetrics for LoggingMetrics {
    fn publish_timer(&self) -> Box<dyn PublishTimerGuard> {
        Box::new(LoggingTimer {
            started: Instant::now(),
        })
    }
}

struct LoggingTimer {
    started: Instant,
}

impl PublishTimerGuard for LoggingTimer {
    fn stop(self: Box<Self>) {
        tracing::info!(elapsed_ms = self.started.elapsed().as_millis() as u64, "publish timer stopped");
    }
}
