//! Turns an [`EffectFrame`] at a point in time into a flat list of drawing
//! primitives. Nothing here touches the window, so every effect can be
//! inspected in tests.

use super::{
    EffectFrame, GlitchFrame, GlitchImage, GlitchStyle, ImageEffect, TypedText, PRELUDE_FLASH,
};
use eframe::egui::{pos2, vec2, Color32, Pos2, Rect};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Area the original effects were tuned for; counts scale with screen area.
const REFERENCE_AREA: f32 = 760.0 * 360.0;

const BLACK: Color32 = Color32::from_rgb(0x00, 0x00, 0x00);
const PANEL_BG: Color32 = Color32::from_rgb(0x0b, 0x07, 0x10);
const TEXT_RED: Color32 = Color32::from_rgb(0xff, 0x22, 0x22);
const MATRIX_GREEN: Color32 = Color32::from_rgb(0x00, 0xff, 0x66);
const RAIN_GREEN: Color32 = Color32::from_rgb(0x00, 0xff, 0x00);
const MATRIX_STREAK: Color32 = Color32::from_rgb(0x00, 0x33, 0x00);

const FLASH_DARK: [Color32; 3] = [
    Color32::from_rgb(0x0a, 0x0a, 0x0a),
    Color32::from_rgb(0x10, 0x10, 0x10),
    Color32::from_rgb(0x07, 0x07, 0x07),
];

const FLASH_IMAGE: [Color32; 4] = [
    Color32::from_rgb(0x00, 0x00, 0x00),
    Color32::from_rgb(0x11, 0x11, 0x11),
    Color32::from_rgb(0x06, 0x06, 0x06),
    Color32::from_rgb(0x1a, 0x1a, 0x1a),
];

const PRELUDE_COLORS: [Color32; 5] = [
    Color32::from_rgb(0x00, 0x44, 0x00),
    Color32::from_rgb(0x33, 0x00, 0x00),
    Color32::from_rgb(0x0f, 0x30, 0x57),
    Color32::from_rgb(0x00, 0x11, 0x00),
    Color32::from_rgb(0x00, 0x22, 0x00),
];

const CYBER_PALETTES: [[Color32; 3]; 3] = [
    [
        Color32::from_rgb(0xff, 0x2e, 0x2e),
        Color32::from_rgb(0xcc, 0x23, 0x23),
        Color32::from_rgb(0x99, 0x0f, 0x0f),
    ],
    [
        Color32::from_rgb(0x3a, 0x0c, 0xa3),
        Color32::from_rgb(0x43, 0x61, 0xee),
        Color32::from_rgb(0x72, 0x09, 0xb7),
    ],
    [
        Color32::from_rgb(0x00, 0xff, 0xcc),
        Color32::from_rgb(0x00, 0xcc, 0xff),
        Color32::from_rgb(0x00, 0x66, 0xff),
    ],
];

const STATIC_GREYS: [Color32; 5] = [
    Color32::from_rgb(0xaa, 0xaa, 0xaa),
    Color32::from_rgb(0xbb, 0xbb, 0xbb),
    Color32::from_rgb(0xcc, 0xcc, 0xcc),
    Color32::from_rgb(0xee, 0xee, 0xee),
    Color32::from_rgb(0xff, 0xff, 0xff),
];

const SCAN_NEON: [Color32; 3] = [
    Color32::from_rgb(0xff, 0x00, 0x77),
    Color32::from_rgb(0x00, 0xff, 0xee),
    Color32::from_rgb(0xff, 0xff, 0x00),
];

/// One drawable element of a [`Scene`], in screen coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Rect {
        rect: Rect,
        color: Color32,
    },
    Text {
        pos: Pos2,
        text: String,
        size: f32,
        color: Color32,
        /// Wrap width; `None` lays the text out on explicit newlines only.
        wrap: Option<f32>,
    },
    /// The picture of the image frame at `frame` stretched over `rect`,
    /// multiplied by the premultiplied `tint`.
    Image {
        frame: usize,
        rect: Rect,
        tint: Color32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub background: Color32,
    pub primitives: Vec<Primitive>,
}

impl Scene {
    fn new(background: Color32) -> Self {
        Self {
            background,
            primitives: Vec::new(),
        }
    }

    fn rect(&mut self, rect: Rect, color: Color32) {
        self.primitives.push(Primitive::Rect { rect, color });
    }

    /// Concatenated text of every text primitive, handy for assertions.
    pub fn text(&self) -> String {
        self.primitives
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Where the renderer is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub index: usize,
    pub elapsed: Duration,
    /// Global tick counter, used to reseed the noise every tick.
    pub tick: u64,
}

fn tick_rng(seed: u64, tick: u64) -> StdRng {
    StdRng::seed_from_u64(seed ^ tick.wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

fn scaled(base: usize, screen: Rect) -> usize {
    let factor = (screen.area() / REFERENCE_AREA).max(1.0);
    (base as f32 * factor) as usize
}

fn pick(rng: &mut StdRng, colors: &[Color32]) -> Color32 {
    colors.choose(rng).copied().unwrap_or(BLACK)
}

pub fn compose(frame: &EffectFrame, progress: FrameProgress, screen: Rect) -> Scene {
    match frame {
        EffectFrame::Glitch(g) => compose_glitch(g, progress, screen),
        EffectFrame::Image(img) => compose_image(img, progress, screen),
        EffectFrame::TypedText(t) => compose_text(t, progress, screen),
    }
}

fn compose_glitch(g: &GlitchFrame, progress: FrameProgress, screen: Rect) -> Scene {
    if progress.elapsed < g.prelude() {
        // One colour per flash, held for the whole flash.
        let flash = progress.elapsed.as_nanos() / PRELUDE_FLASH.as_nanos();
        let mut rng = tick_rng(g.seed, flash as u64);
        return Scene::new(pick(&mut rng, &PRELUDE_COLORS));
    }
    let mut rng = tick_rng(g.seed, progress.tick);
    let mut scene = Scene::new(pick(&mut rng, &FLASH_DARK));
    let (w, h) = (screen.width().max(1.0), screen.height().max(1.0));
    let origin = screen.min;

    match g.style {
        GlitchStyle::Matrix => {
            for _ in 0..scaled(200, screen) {
                let pos = origin + vec2(rng.gen_range(0.0..w), rng.gen_range(0.0..h));
                let digit = if rng.gen_bool(0.5) { "1" } else { "0" };
                scene.primitives.push(Primitive::Text {
                    pos,
                    text: digit.to_string(),
                    size: 11.0,
                    color: MATRIX_GREEN,
                    wrap: None,
                });
            }
            for _ in 0..6 {
                let x = origin.x + rng.gen_range(0.0..w);
                scene.rect(
                    Rect::from_min_max(pos2(x, origin.y), pos2(x + 2.0, origin.y + h)),
                    MATRIX_STREAK,
                );
            }
        }
        GlitchStyle::CyberRed => {
            let palette = CYBER_PALETTES.choose(&mut rng).copied().unwrap_or(CYBER_PALETTES[0]);
            for _ in 0..scaled(60, screen) {
                let min = origin + vec2(rng.gen_range(0.0..w), rng.gen_range(0.0..h));
                let size = vec2(rng.gen_range(10.0..120.0), rng.gen_range(6.0..40.0));
                scene.rect(Rect::from_min_size(min, size), pick(&mut rng, &palette));
            }
            for _ in 0..5 {
                let x = origin.x + rng.gen_range(0.0..w);
                let width = rng.gen_range(2.0..=5.0);
                scene.rect(
                    Rect::from_min_max(pos2(x, origin.y), pos2(x + width, origin.y + h)),
                    pick(&mut rng, &palette),
                );
            }
        }
        GlitchStyle::TvStatic => {
            for _ in 0..scaled(1200, screen) {
                let min = origin + vec2(rng.gen_range(0.0..w), rng.gen_range(0.0..h));
                scene.rect(Rect::from_min_size(min, vec2(2.0, 2.0)), pick(&mut rng, &STATIC_GREYS));
            }
            for _ in 0..8 {
                let y = origin.y + rng.gen_range(0.0..h);
                let height = rng.gen_range(1.0..=4.0);
                scene.rect(
                    Rect::from_min_max(pos2(origin.x, y), pos2(origin.x + w, y + height)),
                    pick(&mut rng, &SCAN_NEON),
                );
            }
        }
    }
    scene
}

/// Rectangle covering `screen` with the image's aspect ratio, centred.
pub fn cover_rect(width: u32, height: u32, screen: Rect) -> (Rect, f32) {
    let (iw, ih) = (width.max(1) as f32, height.max(1) as f32);
    let scale = (screen.width() / iw).max(screen.height() / ih);
    (
        Rect::from_center_size(screen.center(), vec2(iw * scale, ih * scale)),
        scale,
    )
}

/// Rectangle of the image's aspect ratio fitting inside `area`, centred.
pub fn contain_rect(width: u32, height: u32, area: Rect) -> Rect {
    let (iw, ih) = (width.max(1) as f32, height.max(1) as f32);
    let scale = (area.width() / iw).min(area.height() / ih);
    Rect::from_center_size(area.center(), vec2(iw * scale, ih * scale))
}

const FLICKER_START: Duration = Duration::from_millis(50);
const FADE_AREA: f32 = 0.6;
/// Upper bound on noise blocks in a single scene.
pub const MAX_NOISE_BLOCKS: usize = 50_000;

fn compose_image(img: &GlitchImage, progress: FrameProgress, screen: Rect) -> Scene {
    if !img.is_consistent() {
        return Scene::new(BLACK);
    }
    match img.effect {
        ImageEffect::Noise => compose_noise_image(img, progress, screen),
        ImageEffect::Fade => compose_fade_image(img, progress, screen),
    }
}

fn compose_fade_image(img: &GlitchImage, progress: FrameProgress, screen: Rect) -> Scene {
    let mut scene = Scene::new(BLACK);
    let area = Rect::from_center_size(screen.center(), screen.size() * FADE_AREA);
    let alpha = (img.fade_alpha(progress.elapsed) * 255.0).round() as u8;
    scene.primitives.push(Primitive::Image {
        frame: progress.index,
        rect: contain_rect(img.width, img.height, area),
        tint: Color32::from_white_alpha(alpha),
    });
    scene
}

fn compose_noise_image(img: &GlitchImage, progress: FrameProgress, screen: Rect) -> Scene {
    let mut rng = tick_rng(img.seed, progress.tick);
    let mut scene = Scene::new(BLACK);
    let (rect, scale) = cover_rect(img.width, img.height, screen);
    scene.primitives.push(Primitive::Image {
        frame: progress.index,
        rect,
        tint: Color32::WHITE,
    });

    if progress.elapsed < FLICKER_START {
        return scene;
    }

    let step = img.duration / img.flicker_times.saturating_mul(2).max(4);
    let phase = (progress.elapsed - FLICKER_START).as_nanos() / step.as_nanos().max(1);
    let phase = phase.min(u32::MAX as u128) as u32;
    let per_flicker = img.noise_pixels / 3;
    let (count, max_block) = if phase < img.flicker_times {
        scene.background = pick(&mut rng, &FLASH_IMAGE);
        (per_flicker.saturating_mul(phase as usize + 1), 4.0)
    } else {
        (
            per_flicker
                .saturating_mul(img.flicker_times as usize)
                .saturating_add(img.noise_pixels / 10 * 7),
            5.0,
        )
    };
    let count = count.min(MAX_NOISE_BLOCKS);

    let block_scale = scale.max(1.0);
    for _ in 0..count {
        let rx = rng.gen_range(0..img.width);
        let ry = rng.gen_range(0..img.height);
        let Some([r, g, b, _]) = img.pixel(rx, ry) else {
            continue;
        };
        let min = rect.min + vec2(rx as f32 * scale, ry as f32 * scale);
        let size = vec2(
            rng.gen_range(1.0..=max_block) * block_scale,
            rng.gen_range(1.0..=max_block) * block_scale,
        );
        scene.rect(Rect::from_min_size(min, size), Color32::from_rgb(r, g, b));
    }
    scene
}

const RAIN_COLUMN: f32 = 14.0;
const RAIN_STEP_MS: f32 = 35.0;
const TEXT_SIZE: f32 = 26.0;

fn compose_text(t: &TypedText, progress: FrameProgress, screen: Rect) -> Scene {
    let mut scene = Scene::new(BLACK);
    let fade = t.fade_progress(progress.elapsed);
    let seed = 0x5eed_0000 ^ progress.index as u64;

    if fade < 1.0 {
        binary_rain(&mut scene, seed, progress, screen);
    }
    if fade > 0.0 {
        let grey = (fade * 60.0) as u8;
        scene.rect(screen, Color32::from_rgb(grey, grey, grey));
    }

    let panel = Rect::from_center_size(
        screen.center(),
        vec2(screen.width() * 0.7, screen.height() * 0.6),
    );
    scene.rect(panel, PANEL_BG);
    let pad = 24.0;
    scene.primitives.push(Primitive::Text {
        pos: panel.min + vec2(pad, pad),
        text: t.visible_text(progress.elapsed).to_string(),
        size: TEXT_SIZE,
        color: TEXT_RED,
        wrap: Some((panel.width() - 2.0 * pad).max(1.0)),
    });
    scene
}

fn binary_rain(scene: &mut Scene, seed: u64, progress: FrameProgress, screen: Rect) {
    let h = screen.height().max(1.0);
    let columns = ((screen.width() / RAIN_COLUMN) as usize).max(10);
    let steps = progress.elapsed.as_millis() as f32 / RAIN_STEP_MS;
    let period = h + 200.0;

    // Column layout is fixed for the frame; only the digits change per tick.
    let mut layout = StdRng::seed_from_u64(seed);
    let mut digits = tick_rng(seed, progress.tick);
    for i in 0..columns {
        let start = layout.gen_range(-h..=0.0);
        let speed = layout.gen_range(8.0..=20.0);
        let y = (start + speed * steps + 160.0).rem_euclid(period) - 160.0;
        let x = screen.min.x + i as f32 * RAIN_COLUMN + 4.0;
        for k in 0..3 {
            let digit = if digits.gen_bool(0.5) { "1" } else { "0" };
            scene.primitives.push(Primitive::Text {
                pos: pos2(x, screen.min.y + y - k as f32 * 12.0),
                text: digit.to_string(),
                size: 10.0,
                color: RAIN_GREEN,
                wrap: None,
            });
        }
    }
}
