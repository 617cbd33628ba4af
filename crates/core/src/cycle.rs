//! Color cycle: the sweep of constant-brightness triples and the
//! per-device generator task that feeds them into a command queue.

use crate::color::Rgb;
use crate::registry::Registry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Channel sum every sweep triple satisfies.
pub const SWEEP_SUM: u8 = 100;
/// Channel increment between sweep triples.
pub const SWEEP_STEP: u8 = 5;
/// Default delay between generated steps.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(50);

/// One full sweep: every (r, g, b) on the step-5 grid with r + g + b = 100,
/// in row-major order (red ascending, then green ascending, blue derived).
pub fn sweep() -> impl Iterator<Item = Rgb> {
    (0..=SWEEP_SUM).step_by(SWEEP_STEP as usize).flat_map(|r| {
        (0..=SWEEP_SUM - r)
            .step_by(SWEEP_STEP as usize)
            .map(move |g| Rgb::new(r, g, SWEEP_SUM - r - g))
    })
}

/// Spawn the cycling generator for one device.
///
/// Each step checks the shared flag, enqueues the next sweep triple, then
/// waits the step delay; the sweep restarts from the beginning when
/// exhausted. Clearing the flag stops the task within one step, so at
/// most one triple can still be emitted after a disable.
pub(crate) fn spawn_generator(
    registry: Arc<Registry>,
    path: String,
    cycling: Arc<AtomicBool>,
    step_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(path = %path, "Color cycle started");
        loop {
            for rgb in sweep() {
                if !cycling.load(Ordering::SeqCst) {
                    debug!(path = %path, "Color cycle stopped");
                    return;
                }
                if registry.enqueue_color(&path, rgb).is_err() {
                    debug!(path = %path, "Color cycle target no longer registered");
                    return;
                }
                tokio::time::sleep(step_delay).await;
            }
        }
    })
}
