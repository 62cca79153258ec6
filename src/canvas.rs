use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;

use crate::compositor;
use crate::coords::CoordinateMapper;
use crate::error::{CanvasError, CompositionError, DecodeError};
use crate::io::DecodedImage;
use crate::layer::{Layer, LayerId};
use crate::settings::EditorSettings;
use crate::stack::LayerStack;
use crate::{log_info, log_warn};

// ============================================================================
// CANVAS SIZE + ASPECT-RATIO MENU
// ============================================================================

/// Logical canvas resolution in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 || width > MAX_CANVAS_DIM || height > MAX_CANVAS_DIM {
            return Err(CanvasError::InvalidSize { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn rect(self) -> Rect {
        Rect::from_min_size(Pos2::ZERO, self.as_vec2())
    }
}

impl fmt::Display for CanvasSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Parses `"1024x768"` (also accepts `×` and `X`).
impl FromStr for CanvasSize {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CanvasError::InvalidSize { width: 0, height: 0 };
        let s = s.trim();
        let (w, h) = s
            .split_once(['x', 'X', '×'])
            .ok_or_else(bad)?;
        let w: u32 = w.trim().parse().map_err(|_| bad())?;
        let h: u32 = h.trim().parse().map_err(|_| bad())?;
        CanvasSize::new(w, h)
    }
}

/// Maximum supported canvas dimension in pixels (per axis).
pub const MAX_CANVAS_DIM: u32 = 8192;

/// The fixed menu of canvas shapes offered to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AspectRatio {
    #[default]
    Square,
    Landscape,
    Portrait,
    Standard,
    Tall,
}

impl AspectRatio {
    pub fn all() -> &'static [AspectRatio] {
        &[
            AspectRatio::Square,
            AspectRatio::Landscape,
            AspectRatio::Portrait,
            AspectRatio::Standard,
            AspectRatio::Tall,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Square    => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait  => "9:16",
            AspectRatio::Standard  => "4:3",
            AspectRatio::Tall      => "3:4",
        }
    }

    pub fn size(&self) -> CanvasSize {
        let (width, height) = match self {
            AspectRatio::Square    => (1024, 1024),
            AspectRatio::Landscape => (1344, 768),
            AspectRatio::Portrait  => (768, 1344),
            AspectRatio::Standard  => (1024, 768),
            AspectRatio::Tall      => (768, 1024),
        };
        CanvasSize { width, height }
    }

    /// Menu entry matching a canvas size exactly, if any.
    pub fn of_size(size: CanvasSize) -> Option<AspectRatio> {
        Self::all().iter().copied().find(|a| a.size() == size)
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|a| a.label() == s)
            .ok_or_else(|| format!("unknown aspect ratio '{}' (expected 1:1, 16:9, 9:16, 4:3 or 3:4)", s))
    }
}

// ============================================================================
// CANVAS STATE: the editing session's single owned context
// ============================================================================

/// Result of adding one decode batch to the canvas.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// New layers in insertion order (bottom to top).
    pub added: Vec<LayerId>,
    pub failed: Vec<DecodeError>,
}

/// Canvas size, layer stack and editor settings for one session.
///
/// The interaction controller and renderer read and write only through
/// this object, so independent sessions never share state.
#[derive(Clone, Debug, Default)]
pub struct CanvasState {
    size: Option<CanvasSize>,
    pub layers: LayerStack,
    pub settings: EditorSettings,
    /// Monotonically increasing counter, bumped on each visible change.
    pub dirty_generation: u64,
}

impl CanvasState {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            size: None,
            layers: LayerStack::new(),
            settings,
            dirty_generation: 0,
        }
    }

    pub fn with_size(size: CanvasSize, settings: EditorSettings) -> Self {
        let mut state = Self::new(settings);
        state.size = Some(size);
        state
    }

    pub fn size(&self) -> Option<CanvasSize> {
        self.size
    }

    pub fn mark_dirty(&mut self) {
        self.dirty_generation = self.dirty_generation.wrapping_add(1);
    }

    // ---- sizing ------------------------------------------------------------

    /// Choose the logical resolution.  Allowed while the canvas is empty;
    /// once layers exist the size is fixed until `clear`.
    pub fn set_size(&mut self, size: CanvasSize) -> Result<CanvasSize, CanvasError> {
        if let Some(current) = self.size
            && current != size
            && !self.layers.is_empty()
        {
            log_warn!("Canvas resize to {} refused: {} layers on {}", size, self.layers.len(), current);
            return Err(CanvasError::SizeLocked {
                current_w: current.width,
                current_h: current.height,
            });
        }
        if self.size != Some(size) {
            log_info!("Canvas size set to {}", size);
            self.size = Some(size);
            self.mark_dirty();
        }
        Ok(size)
    }

    pub fn set_aspect_ratio(&mut self, aspect: AspectRatio) -> Result<CanvasSize, CanvasError> {
        self.set_size(aspect.size())
    }

    /// Current size, applying the configured default aspect on first use.
    pub fn ensure_size(&mut self) -> CanvasSize {
        match self.size {
            Some(size) => size,
            None => {
                let size = self.settings.default_aspect.size();
                log_info!("No canvas size chosen; defaulting to {} ({})", size, self.settings.default_aspect.label());
                self.size = Some(size);
                size
            }
        }
    }

    /// Display mapper for this canvas shown at `display` on screen.
    pub fn mapper(&self, display: Vec2) -> Option<CoordinateMapper> {
        self.size.map(|s| CoordinateMapper::for_canvas(s.width, s.height, display))
    }

    // ---- adding images -----------------------------------------------------

    /// Initial rectangle for a `w × h` image: shrunk (never enlarged) to fit
    /// the canvas, centered, then cascaded by `batch_index` steps while
    /// staying fully on the canvas.
    pub fn default_placement(&self, canvas: CanvasSize, w: u32, h: u32, batch_index: usize) -> Rect {
        let cw = canvas.width as f32;
        let ch = canvas.height as f32;
        let (w, h) = (w.max(1) as f32, h.max(1) as f32);
        let scale = (cw / w).min(ch / h).min(1.0);
        let width = (w * scale).round().clamp(1.0, cw);
        let height = (h * scale).round().clamp(1.0, ch);

        let step = self.settings.cascade_offset * batch_index as f32;
        let x = ((cw - width) / 2.0 + step).min(cw - width).max(0.0);
        let y = ((ch - height) / 2.0 + step).min(ch - height).max(0.0);
        Rect::from_min_size(Pos2::new(x, y), Vec2::new(width, height))
    }

    /// Place one decoded image as a new topmost, active layer.
    pub fn add_image(&mut self, name: impl Into<String>, pixels: Arc<RgbaImage>) -> LayerId {
        self.add_image_at(name.into(), pixels, 0)
    }

    fn add_image_at(&mut self, name: String, pixels: Arc<RgbaImage>, batch_index: usize) -> LayerId {
        let canvas = self.ensure_size();
        let rect = self.default_placement(canvas, pixels.width(), pixels.height(), batch_index);
        let layer = Layer::new(name, pixels, rect);
        let id = layer.id;
        log_info!(
            "Layer {} '{}' added at ({:.0}, {:.0}) {:.0}×{:.0}",
            id, layer.name, rect.min.x, rect.min.y, rect.width(), rect.height()
        );
        self.layers.insert(layer, None);
        self.layers.select(id);
        self.mark_dirty();
        id
    }

    /// Apply a whole decode batch in one update.  Successful images become
    /// layers in batch order; failures are handed back untouched.
    pub fn add_decoded(&mut self, batch: Vec<Result<DecodedImage, DecodeError>>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut placed = 0usize;
        for result in batch {
            match result {
                Ok(decoded) => {
                    let id = self.add_image_at(decoded.name, decoded.pixels, placed);
                    outcome.added.push(id);
                    placed += 1;
                }
                Err(e) => {
                    log_warn!("Skipping image: {}", e);
                    outcome.failed.push(e);
                }
            }
        }
        outcome
    }

    // ---- panel commands ----------------------------------------------------

    pub fn select_layer(&mut self, id: LayerId) -> bool {
        let changed = self.layers.select(id);
        if changed {
            self.mark_dirty();
        }
        changed
    }

    pub fn clear_selection(&mut self) {
        if self.layers.active_id().is_some() {
            self.layers.clear_selection();
            self.mark_dirty();
        }
    }

    pub fn toggle_visibility(&mut self, id: LayerId) -> bool {
        self.touch(|s| s.toggle_visible(id))
    }

    pub fn toggle_lock(&mut self, id: LayerId) -> bool {
        self.touch(|s| s.toggle_locked(id))
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> bool {
        self.touch(|s| s.rename(id, name))
    }

    /// List-level reorder: `dragged` ends up directly above `target`.
    pub fn reorder_layer(&mut self, dragged: LayerId, target: LayerId) {
        let before = self.layers.ids();
        self.layers.reorder(dragged, target);
        if self.layers.ids() != before {
            self.mark_dirty();
        }
    }

    /// Duplicate a layer above itself and select the copy.
    pub fn duplicate_layer(&mut self, id: LayerId) -> Option<LayerId> {
        let offset = Vec2::splat(self.settings.duplicate_offset);
        let new_id = self.layers.duplicate(id, offset)?;
        self.layers.select(new_id);
        log_info!("Layer {} duplicated as {}", id, new_id);
        self.mark_dirty();
        Some(new_id)
    }

    pub fn delete_layer(&mut self, id: LayerId) -> Option<Layer> {
        let removed = self.layers.remove(id)?;
        log_info!("Layer {} '{}' deleted", id, removed.name);
        self.mark_dirty();
        Some(removed)
    }

    /// Drop all layers and forget the canvas size.
    pub fn clear(&mut self) {
        log_info!("Canvas cleared ({} layers)", self.layers.len());
        self.layers.clear();
        self.size = None;
        self.mark_dirty();
    }

    fn touch(&mut self, f: impl FnOnce(&mut LayerStack) -> bool) -> bool {
        let changed = f(&mut self.layers);
        if changed {
            self.mark_dirty();
        }
        changed
    }

    // ---- output ------------------------------------------------------------

    /// Flatten every visible layer at the canvas's logical resolution.
    pub fn composite(&self) -> Result<RgbaImage, CompositionError> {
        let size = self.size.ok_or(CompositionError::CanvasUnsized)?;
        compositor::flatten(&self.layers, size, self.settings.resample_filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::pos2;

    fn image(w: u32, h: u32) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::new(w, h))
    }

    #[test]
    fn aspect_menu_parses_labels() {
        assert_eq!("16:9".parse::<AspectRatio>(), Ok(AspectRatio::Landscape));
        assert!("2:1".parse::<AspectRatio>().is_err());
        assert_eq!(AspectRatio::of_size(AspectRatio::Tall.size()), Some(AspectRatio::Tall));
    }

    #[test]
    fn canvas_size_parses_wxh() {
        assert_eq!("1024x768".parse::<CanvasSize>(), Ok(CanvasSize { width: 1024, height: 768 }));
        assert_eq!(" 64 × 32 ".parse::<CanvasSize>(), Ok(CanvasSize { width: 64, height: 32 }));
        assert!("0x10".parse::<CanvasSize>().is_err());
        assert!("wide".parse::<CanvasSize>().is_err());
    }

    #[test]
    fn first_insert_applies_default_size() {
        let mut state = CanvasState::default();
        assert_eq!(state.size(), None);
        state.add_image("a.png", image(10, 10));
        assert_eq!(state.size(), Some(AspectRatio::Square.size()));
    }

    #[test]
    fn large_image_is_shrunk_to_fit() {
        let mut state = CanvasState::with_size(AspectRatio::Square.size(), EditorSettings::default());
        let id = state.add_image("wide.png", image(2000, 1000));
        let layer = state.layers.get(id).unwrap();
        assert!(layer.width <= 1024.0 && layer.height <= 1024.0);
        assert!((layer.width / layer.height - 2.0).abs() < 0.01);
        assert_eq!(layer.origin(), pos2(0.0, 256.0));
    }

    #[test]
    fn small_image_is_not_enlarged() {
        let mut state = CanvasState::with_size(AspectRatio::Square.size(), EditorSettings::default());
        let id = state.add_image("icon.png", image(64, 32));
        let layer = state.layers.get(id).unwrap();
        assert_eq!((layer.width, layer.height), (64.0, 32.0));
        assert_eq!(layer.origin(), pos2(480.0, 496.0));
    }

    #[test]
    fn size_is_locked_while_layers_exist() {
        let mut state = CanvasState::default();
        state.set_aspect_ratio(AspectRatio::Landscape).unwrap();
        state.set_aspect_ratio(AspectRatio::Portrait).unwrap();
        state.add_image("a.png", image(10, 10));
        assert!(matches!(
            state.set_aspect_ratio(AspectRatio::Square),
            Err(CanvasError::SizeLocked { current_w: 768, current_h: 1344 })
        ));
        state.clear();
        assert_eq!(state.size(), None);
        assert!(state.set_aspect_ratio(AspectRatio::Square).is_ok());
    }

    #[test]
    fn batch_adds_successes_and_returns_failures() {
        let mut state = CanvasState::default();
        let batch = vec![
            Ok(DecodedImage { name: "one.png".into(), pixels: image(100, 100) }),
            Err(DecodeError::Unsupported { name: "notes.txt".into() }),
            Ok(DecodedImage { name: "two.png".into(), pixels: image(100, 100) }),
        ];
        let before = state.dirty_generation;
        let outcome = state.add_decoded(batch);
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(state.layers.active_id(), Some(outcome.added[1]));
        assert!(state.dirty_generation > before);

        let first = state.layers.get(outcome.added[0]).unwrap().origin();
        let second = state.layers.get(outcome.added[1]).unwrap().origin();
        let step = state.settings.cascade_offset;
        assert_eq!(second, pos2(first.x + step, first.y + step));
    }

    #[test]
    fn duplicate_selects_copy() {
        let mut state = CanvasState::default();
        let a = state.add_image("a.png", image(50, 50));
        let b = state.duplicate_layer(a).unwrap();
        assert_eq!(state.layers.active_id(), Some(b));
        assert_eq!(state.layers.ids(), vec![a, b]);
        assert!(state.delete_layer(b).is_some());
        assert_eq!(state.layers.active_id(), None);
    }
}
