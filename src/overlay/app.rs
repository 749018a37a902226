use super::state::{Pacer, Session, Tick};
use super::ExitReason;
use crate::effects::compose::{compose, FrameProgress, Primitive, Scene};
use crate::effects::EffectFrame;
use crate::error::OverlayError;
use eframe::egui;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub type Outcome = Arc<Mutex<Option<Result<ExitReason, OverlayError>>>>;

/// eframe front end for a [`Session`]: paces ticks, composes each frame and
/// paints it across the whole viewport.
pub struct OverlayApp {
    session: Session,
    pacer: Pacer,
    ticks: u64,
    shown: Option<usize>,
    scene: Option<Scene>,
    textures: HashMap<usize, egui::TextureHandle>,
    outcome: Outcome,
    closing: bool,
}

impl OverlayApp {
    pub fn new(session: Session, pacer: Pacer, outcome: Outcome) -> Self {
        Self {
            session,
            pacer,
            ticks: 0,
            shown: None,
            scene: None,
            textures: HashMap::new(),
            outcome,
            closing: false,
        }
    }

    fn finish(&mut self, ctx: &egui::Context, result: Result<ExitReason, OverlayError>) {
        match &result {
            Ok(reason) => tracing::info!(?reason, ticks = self.ticks, "tearing down overlay"),
            Err(e) => tracing::error!(error = %e, "overlay failed; tearing down"),
        }
        if let Ok(mut slot) = self.outcome.lock() {
            slot.get_or_insert(result);
        }
        self.closing = true;
        self.scene = None;
        self.textures.clear();
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn texture(&mut self, ctx: &egui::Context, index: usize) -> Result<(), OverlayError> {
        if self.textures.contains_key(&index) {
            return Ok(());
        }
        let img = match self.session.frame(index) {
            Some(EffectFrame::Image(img)) if img.is_consistent() => img,
            Some(EffectFrame::Image(img)) => {
                return Err(OverlayError::Render(format!(
                    "image '{}' has inconsistent pixel data",
                    img.name
                )))
            }
            _ => return Err(OverlayError::Render(format!("frame {index} is not an image"))),
        };
        let size = [img.width as usize, img.height as usize];
        let tex = ctx.load_texture(
            img.name.clone(),
            egui::ColorImage::from_rgba_unmultiplied(size, img.rgba.as_slice()),
            egui::TextureOptions::LINEAR,
        );
        tracing::debug!(frame = index, name = %img.name, "uploaded texture");
        self.textures.insert(index, tex);
        Ok(())
    }

    fn paint(&mut self, ctx: &egui::Context) -> Result<(), OverlayError> {
        let Some(scene) = self.scene.take() else {
            return Ok(());
        };
        for p in &scene.primitives {
            if let Primitive::Image { frame, .. } = p {
                self.texture(ctx, *frame)?;
            }
        }

        let textures = &self.textures;
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(scene.background))
            .show(ctx, |ui| {
                let painter = ui.painter();
                for p in &scene.primitives {
                    match p {
                        Primitive::Rect { rect, color } => {
                            painter.rect_filled(*rect, 0.0, *color);
                        }
                        Primitive::Text {
                            pos,
                            text,
                            size,
                            color,
                            wrap: None,
                        } => {
                            painter.text(
                                *pos,
                                egui::Align2::LEFT_TOP,
                                text,
                                egui::FontId::monospace(*size),
                                *color,
                            );
                        }
                        Primitive::Text {
                            pos,
                            text,
                            size,
                            color,
                            wrap: Some(width),
                        } => {
                            let galley = painter.layout(
                                text.clone(),
                                egui::FontId::monospace(*size),
                                *color,
                                *width,
                            );
                            painter.galley(*pos, galley, *color);
                        }
                        Primitive::Image { frame, rect, tint } => {
                            if let Some(tex) = textures.get(frame) {
                                painter.image(
                                    tex.id(),
                                    *rect,
                                    egui::Rect::from_min_max(
                                        egui::pos2(0.0, 0.0),
                                        egui::pos2(1.0, 1.0),
                                    ),
                                    *tint,
                                );
                            }
                        }
                    }
                }
            });
        self.scene = Some(scene);
        Ok(())
    }
}

impl eframe::App for OverlayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.closing {
            return;
        }
        if ctx.input(|i| i.viewport().close_requested()) {
            let reason = self.session.abort(ExitReason::Killed);
            tracing::info!("overlay window closed externally");
            self.finish(ctx, Ok(reason));
            return;
        }
        ctx.set_cursor_icon(egui::CursorIcon::None);

        if let Some(dt) = self.pacer.due(Instant::now()) {
            match self.session.tick(dt) {
                Tick::Exit(reason) => {
                    self.finish(ctx, Ok(reason));
                    return;
                }
                Tick::Render { index, elapsed } => {
                    let progress = FrameProgress {
                        index,
                        elapsed,
                        tick: self.ticks,
                    };
                    let frame = self.session.frame(index);
                    if self.shown != Some(index) {
                        if let Some(frame) = frame {
                            tracing::debug!(frame = index, kind = frame.kind(), "showing frame");
                        }
                        self.shown = Some(index);
                    }
                    self.scene = frame.map(|frame| compose(frame, progress, ctx.screen_rect()));
                    self.ticks += 1;
                }
            }
        }

        if let Err(e) = self.paint(ctx) {
            self.finish(ctx, Err(e));
            return;
        }
        ctx.request_repaint_after(self.pacer.remaining(Instant::now()));
    }
}
