pub mod compose;
pub mod loader;

pub use loader::{build_sequence, default_sequence, load_sequence};

use crate::error::OverlayError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Ordered, immutable list of frames replayed by the renderer.
#[derive(Debug, Clone)]
pub struct EffectSequence {
    frames: Arc<[EffectFrame]>,
}

impl EffectSequence {
    pub fn new(frames: Vec<EffectFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn frames(&self) -> &[EffectFrame] {
        &self.frames
    }

    pub fn get(&self, index: usize) -> Option<&EffectFrame> {
        self.frames.get(index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Sum of all frame durations for one pass.
    pub fn total_duration(&self) -> Duration {
        self.frames.iter().map(EffectFrame::duration).sum()
    }
}

#[derive(Debug, Clone)]
pub enum EffectFrame {
    Glitch(GlitchFrame),
    Image(GlitchImage),
    TypedText(TypedText),
}

impl EffectFrame {
    pub fn duration(&self) -> Duration {
        match self {
            EffectFrame::Glitch(g) => g.duration,
            EffectFrame::Image(i) => i.duration,
            EffectFrame::TypedText(t) => t.duration(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EffectFrame::Glitch(_) => "glitch",
            EffectFrame::Image(_) => "image",
            EffectFrame::TypedText(_) => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlitchStyle {
    /// Green binary digits with faint vertical streaks.
    Matrix,
    /// Neon blocks and tearing lines from one random palette.
    CyberRed,
    /// Grey pixel noise with bright horizontal scan bars.
    TvStatic,
}

/// Length of one full-screen colour flash played before a glitch style.
pub const PRELUDE_FLASH: Duration = Duration::from_millis(70);

#[derive(Debug, Clone, PartialEq)]
pub struct GlitchFrame {
    pub style: GlitchStyle,
    pub duration: Duration,
    /// Number of [`PRELUDE_FLASH`] colour flashes shown before the style
    /// itself. They count towards `duration`.
    pub prelude_flashes: u32,
    pub seed: u64,
}

impl GlitchFrame {
    pub fn new(style: GlitchStyle, duration: Duration) -> Self {
        Self {
            style,
            duration,
            prelude_flashes: 0,
            seed: rand::random(),
        }
    }

    pub fn with_prelude(mut self, flashes: u32) -> Self {
        self.prelude_flashes = flashes;
        self
    }

    /// Time taken by the colour flashes, capped at the frame duration.
    pub fn prelude(&self) -> Duration {
        PRELUDE_FLASH
            .saturating_mul(self.prelude_flashes)
            .min(self.duration)
    }
}

pub const DEFAULT_NOISE_PIXELS: usize = 800;
pub const DEFAULT_FLICKER_TIMES: u32 = 3;

/// How an image frame is put on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEffect {
    /// Fullscreen, flickering, with pixel noise sampled from the picture.
    #[default]
    Noise,
    /// Centred at 60% of the screen, fading in and back out on black.
    Fade,
}

/// A decoded picture shown with one of the [`ImageEffect`]s.
#[derive(Clone)]
pub struct GlitchImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Arc<Vec<u8>>,
    pub duration: Duration,
    pub effect: ImageEffect,
    pub noise_pixels: usize,
    pub flicker_times: u32,
    pub seed: u64,
}

impl std::fmt::Debug for GlitchImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlitchImage")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("duration", &self.duration)
            .field("effect", &self.effect)
            .finish()
    }
}

impl GlitchImage {
    pub fn open(path: &Path, duration: Duration) -> Result<Self, OverlayError> {
        let img = image::open(path).map_err(|e| OverlayError::asset(path, e))?;
        let rgba = img.to_rgba8();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("image")
            .to_string();
        Ok(Self::from_rgba(name, rgba.width(), rgba.height(), rgba.into_raw(), duration))
    }

    pub fn with_effect(mut self, effect: ImageEffect) -> Self {
        self.effect = effect;
        self
    }

    /// Opacity of a [`ImageEffect::Fade`] image `elapsed` into the frame:
    /// rises linearly to 1.0 at the midpoint and falls back to 0.0.
    pub fn fade_alpha(&self, elapsed: Duration) -> f32 {
        if self.duration.is_zero() {
            return 0.0;
        }
        let t = (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0);
        1.0 - (2.0 * t - 1.0).abs()
    }

    pub fn from_rgba(
        name: impl Into<String>,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            rgba: Arc::new(rgba),
            duration,
            effect: ImageEffect::Noise,
            noise_pixels: DEFAULT_NOISE_PIXELS,
            flicker_times: DEFAULT_FLICKER_TIMES,
            seed: rand::random(),
        }
    }

    /// RGBA of the pixel at (`x`, `y`), or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.rgba
            .get(i..i + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba.len() == self.width as usize * self.height as usize * 4
    }
}

pub const DEFAULT_CHAR_DELAY: Duration = Duration::from_millis(70);
pub const DEFAULT_HOLD: Duration = Duration::from_millis(2500);
pub const DEFAULT_FADE: Duration = Duration::from_millis(1200);
const SENTENCE_PAUSE_MS: u64 = 160;
const NEWLINE_PAUSE_MS: u64 = 70;
const MIN_CHAR_DELAY_MS: u64 = 10;

/// Text revealed one character at a time, then held on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedText {
    pub text: String,
    pub char_delay: Duration,
    pub hold: Duration,
    pub fade: Duration,
}

impl TypedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            char_delay: DEFAULT_CHAR_DELAY,
            hold: DEFAULT_HOLD,
            fade: DEFAULT_FADE,
        }
    }

    /// Pause after `ch` before the next character appears.
    pub fn delay_after(&self, ch: char) -> Duration {
        let extra = match ch {
            '.' | '!' | '?' => SENTENCE_PAUSE_MS,
            '\n' => NEWLINE_PAUSE_MS,
            _ => 0,
        };
        let ms = self.char_delay.as_millis() as u64 + extra;
        Duration::from_millis(ms.max(MIN_CHAR_DELAY_MS))
    }

    pub fn typing_time(&self) -> Duration {
        self.text.chars().map(|c| self.delay_after(c)).sum()
    }

    pub fn duration(&self) -> Duration {
        self.typing_time() + self.hold
    }

    /// Number of characters on screen `elapsed` into the frame. The first
    /// character shows immediately.
    pub fn visible_chars(&self, elapsed: Duration) -> usize {
        let mut at = Duration::ZERO;
        let mut shown = 0;
        for c in self.text.chars() {
            if at > elapsed {
                break;
            }
            shown += 1;
            at += self.delay_after(c);
        }
        shown
    }

    pub fn visible_text(&self, elapsed: Duration) -> &str {
        let n = self.visible_chars(elapsed);
        match self.text.char_indices().nth(n) {
            Some((end, _)) => &self.text[..end],
            None => &self.text,
        }
    }

    /// Fade progress in `0.0..=1.0` once typing has finished.
    pub fn fade_progress(&self, elapsed: Duration) -> f32 {
        let typing = self.typing_time();
        if elapsed <= typing {
            return 0.0;
        }
        if self.fade.is_zero() {
            return 1.0;
        }
        ((elapsed - typing).as_secs_f32() / self.fade.as_secs_f32()).min(1.0)
    }
}
