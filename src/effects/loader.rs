use super::{
    EffectFrame, EffectSequence, GlitchFrame, GlitchImage, GlitchStyle, ImageEffect, TypedText,
};
use crate::error::OverlayError;
use crate::hotkey::KeyCombo;
use crate::ip_lookup::Location;
use crate::settings::Settings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

const GLITCH_DURATION: Duration = Duration::from_millis(2000);
const IMAGE_DURATION: Duration = Duration::from_millis(750);
/// 20 steps in and 20 steps out at 40ms each.
const FADE_DURATION: Duration = Duration::from_millis(1600);
/// Colour flashes played ahead of the built-in static.
const STATIC_PRELUDE_FLASHES: u32 = 3;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// On-disk description of a custom sequence.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub frames: Vec<FrameSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameSpec {
    Glitch {
        style: GlitchStyle,
        #[serde(default = "default_glitch_ms")]
        duration_ms: u64,
        #[serde(default)]
        prelude_flashes: u32,
    },
    Image {
        path: PathBuf,
        #[serde(default)]
        effect: ImageEffect,
        /// Defaults to 750ms for noise and 1600ms for fade.
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        noise_pixels: Option<usize>,
        #[serde(default)]
        flicker_times: Option<u32>,
    },
    Text {
        text: String,
        #[serde(default)]
        char_delay_ms: Option<u64>,
        #[serde(default)]
        hold_ms: Option<u64>,
        #[serde(default)]
        fade_ms: Option<u64>,
    },
}

fn default_glitch_ms() -> u64 {
    GLITCH_DURATION.as_millis() as u64
}

impl FrameSpec {
    fn into_frame(self, base: &Path) -> Result<EffectFrame, OverlayError> {
        Ok(match self {
            FrameSpec::Glitch {
                style,
                duration_ms,
                prelude_flashes,
            } => EffectFrame::Glitch(
                GlitchFrame::new(style, Duration::from_millis(duration_ms))
                    .with_prelude(prelude_flashes),
            ),
            FrameSpec::Image {
                path,
                effect,
                duration_ms,
                noise_pixels,
                flicker_times,
            } => {
                let full = if path.is_absolute() { path } else { base.join(path) };
                let duration = match (duration_ms, effect) {
                    (Some(ms), _) => Duration::from_millis(ms),
                    (None, ImageEffect::Noise) => IMAGE_DURATION,
                    (None, ImageEffect::Fade) => FADE_DURATION,
                };
                let mut img = GlitchImage::open(&full, duration)?.with_effect(effect);
                if let Some(n) = noise_pixels {
                    img.noise_pixels = n;
                }
                if let Some(n) = flicker_times {
                    img.flicker_times = n;
                }
                EffectFrame::Image(img)
            }
            FrameSpec::Text {
                text,
                char_delay_ms,
                hold_ms,
                fade_ms,
            } => {
                let mut t = TypedText::new(text);
                if let Some(ms) = char_delay_ms {
                    t.char_delay = Duration::from_millis(ms);
                }
                if let Some(ms) = hold_ms {
                    t.hold = Duration::from_millis(ms);
                }
                if let Some(ms) = fade_ms {
                    t.fade = Duration::from_millis(ms);
                }
                EffectFrame::TypedText(t)
            }
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Build a sequence from custom assets.
///
/// * a directory: every image inside (sorted by name) becomes an image frame
/// * a `.json` file: parsed as a [`Manifest`], relative paths resolve
///   against the manifest's directory
/// * any other file: loaded as a single image frame
pub fn load_sequence(path: &Path) -> Result<EffectSequence, OverlayError> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image(e.path()))
            .map(|e| e.into_path())
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(OverlayError::asset(path, "directory contains no images"));
        }
        let frames = files
            .iter()
            .map(|f| GlitchImage::open(f, IMAGE_DURATION).map(EffectFrame::Image))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(count = frames.len(), dir = %path.display(), "loaded image frames");
        return Ok(EffectSequence::new(frames));
    }

    let is_manifest = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if is_manifest {
        let content = std::fs::read_to_string(path).map_err(|e| OverlayError::asset(path, e))?;
        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| OverlayError::asset(path, e))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let frames = manifest
            .frames
            .into_iter()
            .map(|entry| entry.into_frame(base))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(count = frames.len(), manifest = %path.display(), "loaded manifest");
        return Ok(EffectSequence::new(frames));
    }

    let img = GlitchImage::open(path, IMAGE_DURATION)?;
    Ok(EffectSequence::new(vec![EffectFrame::Image(img)]))
}

/// The built-in sequence: three glitch styles followed by a typed greeting.
pub fn default_sequence(greeting: &str) -> EffectSequence {
    EffectSequence::new(vec![
        EffectFrame::Glitch(GlitchFrame::new(GlitchStyle::Matrix, GLITCH_DURATION)),
        EffectFrame::Glitch(GlitchFrame::new(GlitchStyle::CyberRed, GLITCH_DURATION)),
        EffectFrame::Glitch(
            GlitchFrame::new(GlitchStyle::TvStatic, GLITCH_DURATION)
                .with_prelude(STATIC_PRELUDE_FLASHES),
        ),
        EffectFrame::TypedText(TypedText::new(greeting)),
    ])
}

pub fn local_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "User".to_string())
}

pub fn greeting_text(user: &str, combo: KeyCombo) -> String {
    format!("Hello, {user}.\n\nYour screen has been glitched.\nPress {combo} to escape.\n")
}

pub fn location_report(user: &str, location: &Location) -> String {
    let city = if location.city.is_empty() { "-" } else { &location.city };
    [
        format!("Hello, {user}"),
        String::new(),
        format!("Approx. location: {}", location.describe()),
        format!("City: {city}"),
        format!("Country: {}", location.country),
        String::new(),
        "-- end of report --".to_string(),
    ]
    .join("\n")
        + "\n"
}

/// Assemble the session's sequence. The location, when present and enabled,
/// becomes a typed report appended after the base frames.
pub fn build_sequence(
    settings: &Settings,
    location: Option<&Location>,
) -> Result<EffectSequence, OverlayError> {
    let user = local_username();
    let base = match &settings.effects_path {
        Some(path) => load_sequence(path)?,
        None => default_sequence(&greeting_text(&user, KeyCombo::kill_switch())),
    };

    match location.filter(|_| settings.show_location) {
        Some(loc) => {
            let mut frames = base.frames().to_vec();
            frames.push(EffectFrame::TypedText(TypedText::new(location_report(&user, loc))));
            Ok(EffectSequence::new(frames))
        }
        None => Ok(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_mentions_location() {
        let loc = Location {
            city: "Lima".into(),
            country: "Peru".into(),
        };
        let text = location_report("neo", &loc);
        assert!(text.starts_with("Hello, neo\n"));
        assert!(text.contains("Approx. location: Lima, Peru"));
        assert!(text.contains("City: Lima"));
        assert!(text.ends_with("-- end of report --\n"));
    }

    #[test]
    fn country_only_report_uses_placeholder_city() {
        let loc = Location {
            city: String::new(),
            country: "Iceland".into(),
        };
        let text = location_report("neo", &loc);
        assert!(text.contains("City: -"));
        assert!(text.contains("Approx. location: Iceland"));
    }

    #[test]
    fn greeting_names_escape_combo() {
        let text = greeting_text("trin", KeyCombo::kill_switch());
        assert!(text.contains("trin"));
        assert!(text.contains("Ctrl+Shift+K"));
    }

    #[test]
    fn image_extension_check_is_case_insensitive() {
        assert!(is_image(Path::new("a/B.PNG")));
        assert!(is_image(Path::new("c.jpeg")));
        assert!(!is_image(Path::new("notes.txt")));
    }
}
