use glitch_overlay::effects::{
    build_sequence, load_sequence, EffectFrame, GlitchStyle, ImageEffect,
};
use glitch_overlay::error::OverlayError;
use glitch_overlay::ip_lookup::Location;
use glitch_overlay::settings::Settings;
use image::{Rgba, RgbaImage};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

fn write_png(path: &Path, w: u32, h: u32) {
    RgbaImage::from_pixel(w, h, Rgba([10, 200, 30, 255]))
        .save(path)
        .unwrap();
}

#[test]
fn manifest_builds_every_frame_kind() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("face.png"), 8, 6);
    let manifest = dir.path().join("effects.json");
    fs::write(
        &manifest,
        r#"{
            "frames": [
                { "kind": "glitch", "style": "tv_static", "duration_ms": 500 },
                { "kind": "image", "path": "face.png", "noise_pixels": 30 },
                { "kind": "text", "text": "hi.", "char_delay_ms": 50, "hold_ms": 0 }
            ]
        }"#,
    )
    .unwrap();

    let seq = load_sequence(&manifest).unwrap();
    assert_eq!(seq.len(), 3);
    match seq.get(0) {
        Some(EffectFrame::Glitch(g)) => {
            assert_eq!(g.style, GlitchStyle::TvStatic);
            assert_eq!(g.duration, Duration::from_millis(500));
        }
        other => panic!("unexpected frame {other:?}"),
    }
    match seq.get(1) {
        Some(EffectFrame::Image(img)) => {
            assert_eq!((img.width, img.height), (8, 6));
            assert_eq!(img.noise_pixels, 30);
            assert_eq!(img.duration, Duration::from_millis(750));
            assert!(img.is_consistent());
        }
        other => panic!("unexpected frame {other:?}"),
    }
    match seq.get(2) {
        Some(EffectFrame::TypedText(t)) => {
            // 'h' and 'i' at 50ms, '.' at 50 + 160ms
            assert_eq!(t.duration(), Duration::from_millis(310));
        }
        other => panic!("unexpected frame {other:?}"),
    }
}

#[test]
fn directory_loads_images_sorted_and_skips_other_files() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("b.png"), 2, 2);
    write_png(&dir.path().join("a.png"), 3, 1);
    fs::write(dir.path().join("readme.txt"), "not an image").unwrap();

    let seq = load_sequence(dir.path()).unwrap();
    let names: Vec<_> = seq
        .frames()
        .iter()
        .map(|f| match f {
            EffectFrame::Image(img) => img.name.clone(),
            other => panic!("unexpected frame {other:?}"),
        })
        .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
}

#[test]
fn empty_directory_is_an_asset_error() {
    let dir = tempdir().unwrap();
    let err = load_sequence(dir.path()).unwrap_err();
    assert!(matches!(err, OverlayError::Asset { .. }));
    assert!(err.is_fatal());
}

#[test]
fn broken_manifest_is_an_asset_error() {
    let dir = tempdir().unwrap();
    let manifest = dir.path().join("effects.json");
    fs::write(&manifest, r#"{ "frames": [ { "kind": "hologram" } ] }"#).unwrap();
    assert!(matches!(
        load_sequence(&manifest),
        Err(OverlayError::Asset { .. })
    ));
}

#[test]
fn missing_image_in_manifest_is_an_asset_error() {
    let dir = tempdir().unwrap();
    let manifest = dir.path().join("effects.json");
    fs::write(
        &manifest,
        r#"{ "frames": [ { "kind": "image", "path": "gone.png" } ] }"#,
    )
    .unwrap();
    match load_sequence(&manifest) {
        Err(OverlayError::Asset { path, .. }) => assert!(path.ends_with("gone.png")),
        other => panic!("unexpected result {other:?}"),
    }
}

#[test]
fn default_sequence_without_location() {
    let seq = build_sequence(&Settings::default(), None).unwrap();
    assert_eq!(seq.len(), 4);
    match seq.get(2) {
        Some(EffectFrame::Glitch(g)) => {
            assert_eq!(g.style, GlitchStyle::TvStatic);
            assert_eq!(g.prelude_flashes, 3);
        }
        other => panic!("unexpected frame {other:?}"),
    }
    assert!(matches!(seq.get(3), Some(EffectFrame::TypedText(_))));
}

#[test]
fn manifest_fade_images_and_glitch_prelude() {
    let dir = tempdir().unwrap();
    write_png(&dir.path().join("photo.png"), 8, 6);
    let manifest = dir.path().join("effects.json");
    fs::write(
        &manifest,
        r#"{
            "frames": [
                { "kind": "glitch", "style": "matrix", "prelude_flashes": 2 },
                { "kind": "image", "path": "photo.png", "effect": "fade" },
                { "kind": "image", "path": "photo.png", "effect": "fade", "duration_ms": 400 }
            ]
        }"#,
    )
    .unwrap();

    let seq = load_sequence(&manifest).unwrap();
    match seq.get(0) {
        Some(EffectFrame::Glitch(g)) => {
            assert_eq!(g.prelude_flashes, 2);
            assert_eq!(g.prelude(), Duration::from_millis(140));
        }
        other => panic!("unexpected frame {other:?}"),
    }
    match (seq.get(1), seq.get(2)) {
        (Some(EffectFrame::Image(slow)), Some(EffectFrame::Image(quick))) => {
            assert_eq!(slow.effect, ImageEffect::Fade);
            assert_eq!(slow.duration, Duration::from_millis(1600));
            assert_eq!(quick.duration, Duration::from_millis(400));
        }
        other => panic!("unexpected frames {other:?}"),
    }
}

#[test]
fn location_report_is_appended_when_enabled() {
    let loc = Location {
        city: "Lima".into(),
        country: "Peru".into(),
    };
    let seq = build_sequence(&Settings::default(), Some(&loc)).unwrap();
    assert_eq!(seq.len(), 5);
    match seq.get(4) {
        Some(EffectFrame::TypedText(t)) => assert!(t.text.contains("Approx. location: Lima, Peru")),
        other => panic!("unexpected frame {other:?}"),
    }

    let mut quiet = Settings::default();
    quiet.show_location = false;
    assert_eq!(build_sequence(&quiet, Some(&loc)).unwrap().len(), 4);
}

#[test]
fn custom_path_replaces_builtin_frames() {
    let dir = tempdir().unwrap();
    let img = dir.path().join("only.png");
    write_png(&img, 2, 2);
    let mut settings = Settings::default();
    settings.effects_path = Some(img);
    let seq = build_sequence(&settings, None).unwrap();
    assert_eq!(seq.len(), 1);
    assert_eq!(seq.frames()[0].kind(), "image");
}
