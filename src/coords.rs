// ============================================================================
// COORDINATE MAPPING: display pixels ↔ canvas logical pixels
// ============================================================================

use egui::{Pos2, Vec2};

/// Raw pointer position as delivered by the host, relative to the top-left
/// corner of the displayed canvas surface.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerInput {
    Mouse(Pos2),
    /// Every contact point currently on the surface.
    Touch(Vec<Pos2>),
}

impl PointerInput {
    /// The single interaction point, or `None` for multi-touch gestures
    /// (and for touch events with no contacts at all).
    pub fn primary(&self) -> Option<Pos2> {
        match self {
            PointerInput::Mouse(pos) => Some(*pos),
            PointerInput::Touch(points) if points.len() == 1 => Some(points[0]),
            PointerInput::Touch(_) => None,
        }
    }
}

/// Scales between the canvas's logical resolution and its on-screen size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateMapper {
    logical: Vec2,
    display: Vec2,
}

impl CoordinateMapper {
    pub fn new(logical: Vec2, display: Vec2) -> Self {
        Self { logical, display }
    }

    /// Mapper for a `logical_w × logical_h` canvas shown at `display`.
    pub fn for_canvas(logical_w: u32, logical_h: u32, display: Vec2) -> Self {
        Self::new(Vec2::new(logical_w as f32, logical_h as f32), display)
    }

    pub fn logical_size(&self) -> Vec2 {
        self.logical
    }

    pub fn display_size(&self) -> Vec2 {
        self.display
    }

    /// Host resized the view (responsive layout, DPI change, rotation).
    pub fn set_display_size(&mut self, display: Vec2) {
        self.display = display;
    }

    /// Logical pixels per display pixel on each axis.  `None` while the
    /// surface has no on-screen area.
    pub fn scale(&self) -> Option<Vec2> {
        if self.display.x <= 0.0 || self.display.y <= 0.0 {
            return None;
        }
        Some(Vec2::new(
            self.logical.x / self.display.x,
            self.logical.y / self.display.y,
        ))
    }

    pub fn to_logical(&self, raw: Pos2) -> Option<Pos2> {
        let s = self.scale()?;
        Some(Pos2::new(raw.x * s.x, raw.y * s.y))
    }

    pub fn to_display(&self, logical: Pos2) -> Option<Pos2> {
        let s = self.scale()?;
        if s.x == 0.0 || s.y == 0.0 {
            return None;
        }
        Some(Pos2::new(logical.x / s.x, logical.y / s.y))
    }

    /// Map a raw pointer event to logical space.  Multi-contact touch is
    /// ignored and yields `None`.
    pub fn map_input(&self, input: &PointerInput) -> Option<Pos2> {
        self.to_logical(input.primary()?)
    }
}
