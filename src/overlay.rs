pub mod app;
pub mod state;
pub mod surface;

pub use state::{OverlayState, Pacer, Session, Tick};
pub use surface::{drive, Surface};

use crate::effects::EffectSequence;
use crate::error::OverlayError;
use crate::hotkey::KillSignal;
use crate::settings::Settings;
use app::{OverlayApp, Outcome};
use eframe::egui;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The sequence played to the end.
    Completed,
    /// The kill switch fired, or the window was closed underneath us.
    Killed,
}

/// Open a fullscreen, topmost, undecorated window and play `sequence` on it
/// until it completes or `signal` is raised.
pub fn run(
    sequence: EffectSequence,
    settings: &Settings,
    signal: KillSignal,
) -> Result<ExitReason, OverlayError> {
    let tick = settings.tick_interval();
    tracing::info!(
        frames = sequence.len(),
        looping = settings.loop_sequence,
        tick_ms = tick.as_millis() as u64,
        "starting overlay"
    );

    let outcome: Outcome = Arc::new(Mutex::new(None));
    let session = Session::new(sequence, signal, settings.loop_sequence);
    let app = OverlayApp::new(session, Pacer::new(tick), outcome.clone());

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("glitch overlay")
            .with_fullscreen(true)
            .with_decorations(false)
            .with_always_on_top(),
        ..Default::default()
    };

    eframe::run_native(
        "glitch_overlay",
        native_options,
        Box::new(move |_cc| Box::new(app)),
    )
    .map_err(|e| OverlayError::SurfaceInit(e.to_string()))?;

    let result = outcome.lock().ok().and_then(|mut slot| slot.take());
    result.unwrap_or_else(|| {
        tracing::info!("event loop ended without a session result");
        Ok(ExitReason::Killed)
    })
}
