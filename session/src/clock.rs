//! Injected time source, so pacing behavior stays testable.

use std::time::Duration;

/// Cooperative pause capability.
pub trait ClockDelay {
    fn delay(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Delays on the tokio timer.
pub struct TokioDelay;

impl ClockDelay for TokioDelay {
    fn delay(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Elapses immediately. For tests and non-interactive drivers where there is
/// no preview to pace.
pub struct NoDelay;

impl ClockDelay for NoDelay {
    async fn delay(&self, _duration: Duration) {}
}
