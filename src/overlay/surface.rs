use super::state::{Session, Tick};
use super::ExitReason;
use crate::effects::compose::{compose, FrameProgress, Scene};
use crate::error::OverlayError;
use eframe::egui::Rect;
use std::thread;
use std::time::{Duration, Instant};

/// Something scenes can be presented on.
pub trait Surface {
    /// Drawable area in points.
    fn screen(&self) -> Rect;
    fn present(&mut self, scene: &Scene) -> Result<(), OverlayError>;
    /// Release the surface. Called exactly once when the session ends,
    /// whether it completed, was killed or failed.
    fn teardown(&mut self);
}

/// Drive `session` on `surface` with a fixed tick, sleeping between ticks,
/// until the session ends or presenting fails.
pub fn drive<S: Surface>(
    session: &mut Session,
    surface: &mut S,
    tick: Duration,
) -> Result<ExitReason, OverlayError> {
    let mut ticks: u64 = 0;
    loop {
        let started = Instant::now();
        match session.tick(tick) {
            Tick::Exit(reason) => {
                surface.teardown();
                return Ok(reason);
            }
            Tick::Render { index, elapsed } => {
                let Some(frame) = session.frame(index) else {
                    surface.teardown();
                    return Err(OverlayError::Render(format!("frame {index} missing")));
                };
                let progress = FrameProgress {
                    index,
                    elapsed,
                    tick: ticks,
                };
                let scene = compose(frame, progress, surface.screen());
                if let Err(e) = surface.present(&scene) {
                    tracing::error!(error = %e, frame = index, "present failed; tearing down");
                    surface.teardown();
                    return Err(e);
                }
            }
        }
        ticks += 1;
        thread::sleep(tick.saturating_sub(started.elapsed()));
    }
}
