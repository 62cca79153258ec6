// ============================================================================
// GEOMETRY: resize handles, hit boxes, aspect-locked resize math
// ============================================================================
//
// Everything here works in canvas logical space and is free of state, so the
// interaction controller and the renderer share one definition of where a
// handle is.

use egui::{CursorIcon, Pos2, Rect, Vec2};

use crate::error::InvalidGeometry;

/// One of the four corner handles of the active layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Handle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl Handle {
    /// Enumeration order; also the tie-break order for hit-testing.
    pub const ALL: [Handle; 4] = [Handle::Nw, Handle::Ne, Handle::Sw, Handle::Se];

    pub fn name(self) -> &'static str {
        match self {
            Handle::Nw => "nw",
            Handle::Ne => "ne",
            Handle::Sw => "sw",
            Handle::Se => "se",
        }
    }

    /// Which edges of the rectangle this handle drags.
    pub fn edges(self) -> ResizeEdges {
        let name = self.name();
        ResizeEdges {
            north: name.contains('n'),
            south: name.contains('s'),
            west: name.contains('w'),
            east: name.contains('e'),
        }
    }

    pub fn has_north(self) -> bool {
        self.edges().north
    }

    pub fn has_south(self) -> bool {
        self.edges().south
    }

    pub fn has_west(self) -> bool {
        self.edges().west
    }

    pub fn has_east(self) -> bool {
        self.edges().east
    }

    /// The corner that stays pinned while this handle is dragged.
    pub fn opposite(self) -> Handle {
        match self {
            Handle::Nw => Handle::Se,
            Handle::Ne => Handle::Sw,
            Handle::Sw => Handle::Ne,
            Handle::Se => Handle::Nw,
        }
    }

    /// Position of this corner on `rect`.
    pub fn anchor(self, rect: Rect) -> Pos2 {
        match self {
            Handle::Nw => rect.left_top(),
            Handle::Ne => rect.right_top(),
            Handle::Sw => rect.left_bottom(),
            Handle::Se => rect.right_bottom(),
        }
    }

    /// Cursor to show while hovering or dragging this handle.
    pub fn cursor(self) -> CursorIcon {
        match self {
            Handle::Nw | Handle::Se => CursorIcon::ResizeNwSe,
            Handle::Ne | Handle::Sw => CursorIcon::ResizeNeSw,
        }
    }
}

/// Edges a resize gesture moves.  Corner handles always set one vertical
/// and one horizontal flag; the math also accepts a single edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResizeEdges {
    pub north: bool,
    pub south: bool,
    pub west: bool,
    pub east: bool,
}

impl ResizeEdges {
    pub fn horizontal(self) -> bool {
        self.west || self.east
    }

    pub fn vertical(self) -> bool {
        self.north || self.south
    }
}

/// The four corner points of a layer rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandleAnchors {
    pub nw: Pos2,
    pub ne: Pos2,
    pub sw: Pos2,
    pub se: Pos2,
}

impl HandleAnchors {
    pub fn get(&self, handle: Handle) -> Pos2 {
        match handle {
            Handle::Nw => self.nw,
            Handle::Ne => self.ne,
            Handle::Sw => self.sw,
            Handle::Se => self.se,
        }
    }

    /// Anchors paired with their handle, in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, Pos2)> + '_ {
        Handle::ALL.into_iter().map(|h| (h, self.get(h)))
    }
}

pub fn handle_anchors(rect: Rect) -> HandleAnchors {
    HandleAnchors {
        nw: Handle::Nw.anchor(rect),
        ne: Handle::Ne.anchor(rect),
        sw: Handle::Sw.anchor(rect),
        se: Handle::Se.anchor(rect),
    }
}

/// Square hit box of side `size` centered on `anchor`.
pub fn handle_hit_box(anchor: Pos2, size: f32) -> Rect {
    Rect::from_center_size(anchor, Vec2::splat(size))
}

/// The handle whose hit box contains `point`; first match in
/// `nw, ne, sw, se` order wins.
pub fn hit_handle(rect: Rect, point: Pos2, hit_size: f32) -> Option<Handle> {
    handle_anchors(rect)
        .iter()
        .find(|(_, anchor)| handle_hit_box(*anchor, hit_size).contains(point))
        .map(|(handle, _)| handle)
}

/// Point-in-rectangle, edges inclusive.
pub fn hit_rect(rect: Rect, point: Pos2) -> bool {
    rect.contains(point)
}

/// Aspect-locked resize of `start` toward `pointer`.
///
/// Widths and heights are measured from the edge opposite to the one being
/// dragged, so that edge (and with corner handles, the opposite corner)
/// stays where it was at gesture start.  `aspect` is the source's natural
/// width / height.  Returns `InvalidGeometry` when either dimension would
/// not exceed `min_size`.
pub fn resize_rect(
    start: Rect,
    edges: ResizeEdges,
    pointer: Pos2,
    aspect: f32,
    min_size: f32,
) -> Result<Rect, InvalidGeometry> {
    let mut width = start.width();
    let mut height = start.height();

    if edges.east {
        width = pointer.x - start.min.x;
    } else if edges.west {
        width = start.max.x - pointer.x;
    }

    if edges.south {
        height = pointer.y - start.min.y;
    } else if edges.north {
        height = start.max.y - pointer.y;
    }

    if aspect.is_finite() && aspect > 0.0 {
        if edges.horizontal() {
            height = width / aspect;
        } else if edges.vertical() {
            width = height * aspect;
        }
    }

    if !(width > min_size && height > min_size) {
        return Err(InvalidGeometry { width, height, min: min_size });
    }

    let x = if edges.west { start.max.x - width } else { start.min.x };
    let y = if edges.north { start.max.y - height } else { start.min.y };
    Ok(Rect::from_min_size(Pos2::new(x, y), Vec2::new(width, height)))
}
