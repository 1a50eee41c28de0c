use crate::application::session::{SessionController, SessionGuard, TickOutcome};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

pub fn format_remaining(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Whole seconds left until `deadline`, rounded to the nearest second and
/// never negative.
pub fn remaining_seconds(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    let millis = left.as_millis().saturating_add(500) / 1_000;
    u64::try_from(millis).unwrap_or(u64::MAX)
}

pub(crate) async fn run_tick_loop(
    controller: SessionController,
    guard: SessionGuard,
    cancel: CancellationToken,
) {
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately; the start path already rendered it
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match controller.tick_for(&guard) {
            TickOutcome::Remaining(_) => {}
            TickOutcome::Expired => {
                controller.complete_expired(&guard).await;
                break;
            }
            TickOutcome::Inactive => break,
        }
    }

    tracing::debug!(epoch = guard.epoch(), "countdown finished");
}
