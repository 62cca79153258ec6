use std::fmt;
use std::sync::Arc;

use egui::{Pos2, Rect, Vec2};
use image::RgbaImage;
use uuid::Uuid;

/// Stable identity of a layer.  Fresh for every created or duplicated
/// layer and never handed out twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(Uuid);

impl LayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First UUID group is plenty for log lines.
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// One placed image on the canvas.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    /// Decoded pixels at natural resolution.  Shared, never edited.
    pub source: Arc<RgbaImage>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
    pub locked: bool,
}

impl Layer {
    /// New visible, unlocked layer showing `source` at `rect`.
    pub fn new(name: impl Into<String>, source: Arc<RgbaImage>, rect: Rect) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            source,
            x: rect.min.x,
            y: rect.min.y,
            width: rect.width(),
            height: rect.height(),
            visible: true,
            locked: false,
        }
    }

    /// Layer at the source's natural size with its top-left at `origin`.
    pub fn at_natural_size(name: impl Into<String>, source: Arc<RgbaImage>, origin: Pos2) -> Self {
        let size = Vec2::new(source.width() as f32, source.height() as f32);
        Self::new(name, source, Rect::from_min_size(origin, size))
    }

    pub fn rect(&self) -> Rect {
        Rect::from_min_size(Pos2::new(self.x, self.y), Vec2::new(self.width, self.height))
    }

    pub fn origin(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    pub(crate) fn set_rect(&mut self, rect: Rect) {
        self.x = rect.min.x;
        self.y = rect.min.y;
        self.width = rect.width();
        self.height = rect.height();
    }

    pub(crate) fn set_origin(&mut self, origin: Pos2) {
        self.x = origin.x;
        self.y = origin.y;
    }

    pub fn natural_size(&self) -> (u32, u32) {
        (self.source.width(), self.source.height())
    }

    /// Natural width / height of the source image.
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.natural_size();
        if h == 0 { 1.0 } else { w as f32 / h as f32 }
    }

    /// Copy with a fresh id, shifted by `offset`, named "<name> copy".
    pub fn duplicated(&self, offset: Vec2) -> Self {
        Self {
            id: LayerId::new(),
            name: format!("{} copy", self.name),
            source: Arc::clone(&self.source),
            x: self.x + offset.x,
            y: self.y + offset.y,
            width: self.width,
            height: self.height,
            visible: self.visible,
            locked: self.locked,
        }
    }
}
