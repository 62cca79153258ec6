// ============================================================================
// INTERACTION CONTROLLER: pointer gestures on canvas layers
// ============================================================================
//
// One explicit gesture state per session.  Every event arrives already in
// canvas logical space (see `coords`), so mouse and touch share one path.

use egui::{CursorIcon, Pos2, Rect, Vec2};

use crate::canvas::CanvasState;
use crate::coords::{CoordinateMapper, PointerInput};
use crate::geometry::{self, Handle};
use crate::layer::LayerId;

/// What the pointer is currently doing.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Moving `layer`; `offset` is pointer minus layer origin at grab time.
    Dragging { layer: LayerId, offset: Vec2 },
    /// Resizing `layer` by `handle`, measured against `start_rect`.
    Resizing { layer: LayerId, handle: Handle, start_rect: Rect },
}

impl Gesture {
    pub fn layer(&self) -> Option<LayerId> {
        match *self {
            Gesture::Idle => None,
            Gesture::Dragging { layer, .. } | Gesture::Resizing { layer, .. } => Some(layer),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// A raw host pointer event in display pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub input: PointerInput,
}

impl PointerEvent {
    pub fn mouse(phase: PointerPhase, pos: Pos2) -> Self {
        Self { phase, input: PointerInput::Mouse(pos) }
    }

    pub fn touch(phase: PointerPhase, contacts: Vec<Pos2>) -> Self {
        Self { phase, input: PointerInput::Touch(contacts) }
    }
}

#[derive(Clone, Debug)]
pub struct InteractionController {
    gesture: Gesture,
    /// Logical units per display pixel, from the last mapper seen.
    hit_scale: f32,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self { gesture: Gesture::Idle, hit_scale: 1.0 }
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track the display scale so handle hit boxes keep their on-screen
    /// size.  `handle_event` calls this; hosts that call `hover_cursor`
    /// directly should call it on resize.
    pub fn sync_display(&mut self, mapper: &CoordinateMapper) {
        if let Some(s) = mapper.scale() {
            self.hit_scale = s.x.max(s.y);
        }
    }

    /// Handle hit box side in logical units.
    fn hit_size(&self, state: &CanvasState) -> f32 {
        state.settings.handle_hit_size * self.hit_scale
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn is_idle(&self) -> bool {
        self.gesture == Gesture::Idle
    }

    /// Route a raw display-space event.  Multi-touch down/move events are
    /// dropped; up and cancel always end the gesture.  Returns `true` when
    /// the event changed anything.
    pub fn handle_event(
        &mut self,
        state: &mut CanvasState,
        mapper: &CoordinateMapper,
        event: &PointerEvent,
    ) -> bool {
        self.sync_display(mapper);
        match event.phase {
            PointerPhase::Up => self.pointer_up(),
            PointerPhase::Cancel => self.cancel(),
            PointerPhase::Down => match mapper.map_input(&event.input) {
                Some(p) => self.pointer_down(state, p),
                None => false,
            },
            PointerPhase::Move => match mapper.map_input(&event.input) {
                Some(p) => self.pointer_move(state, p),
                None => false,
            },
        }
    }

    // ---- events (logical space) --------------------------------------------

    pub fn pointer_down(&mut self, state: &mut CanvasState, point: Pos2) -> bool {
        if !self.is_idle() {
            // A second down without an up: treat the old gesture as lost.
            self.gesture = Gesture::Idle;
        }

        // Handles of the active layer win over everything underneath.
        if let Some(layer) = state.layers.active()
            && layer.visible
            && !layer.locked
            && let Some(handle) = geometry::hit_handle(layer.rect(), point, self.hit_size(state))
        {
            self.gesture = Gesture::Resizing { layer: layer.id, handle, start_rect: layer.rect() };
            return true;
        }

        let hit = state.layers.topmost_at(point).map(|l| (l.id, l.locked, l.origin()));
        match hit {
            Some((id, false, origin)) => {
                state.layers.select(id);
                state.layers.bring_to_front(id);
                state.mark_dirty();
                self.gesture = Gesture::Dragging { layer: id, offset: point - origin };
                true
            }
            Some((id, true, _)) => state.select_layer(id),
            None => {
                let had_selection = state.layers.active_id().is_some();
                state.clear_selection();
                had_selection
            }
        }
    }

    pub fn pointer_move(&mut self, state: &mut CanvasState, point: Pos2) -> bool {
        match self.gesture {
            Gesture::Idle => false,
            Gesture::Dragging { layer, offset } => {
                let Some(l) = state.layers.get_mut(layer) else {
                    self.gesture = Gesture::Idle;
                    return false;
                };
                if l.locked {
                    return false;
                }
                l.set_origin(point - offset);
                state.mark_dirty();
                true
            }
            Gesture::Resizing { layer, handle, start_rect } => {
                let min_size = state.settings.min_layer_size;
                let Some(l) = state.layers.get_mut(layer) else {
                    self.gesture = Gesture::Idle;
                    return false;
                };
                if l.locked {
                    return false;
                }
                match geometry::resize_rect(start_rect, handle.edges(), point, l.aspect_ratio(), min_size) {
                    Ok(rect) => {
                        l.set_rect(rect);
                        state.mark_dirty();
                        true
                    }
                    // Collapsing frames are routine during fast motion.
                    Err(_) => false,
                }
            }
        }
    }

    pub fn pointer_up(&mut self) -> bool {
        self.end()
    }

    /// Pointer left the surface or the host aborted the gesture.
    pub fn cancel(&mut self) -> bool {
        self.end()
    }

    fn end(&mut self) -> bool {
        let was_active = !self.is_idle();
        self.gesture = Gesture::Idle;
        was_active
    }

    // ---- hover -------------------------------------------------------------

    /// Cursor to show at `point`.  Read-only.
    pub fn hover_cursor(&self, state: &CanvasState, point: Pos2) -> CursorIcon {
        match self.gesture {
            Gesture::Resizing { handle, .. } => return handle.cursor(),
            Gesture::Dragging { .. } => return CursorIcon::Grabbing,
            Gesture::Idle => {}
        }
        if let Some(layer) = state.layers.active()
            && layer.visible
            && !layer.locked
            && let Some(handle) = geometry::hit_handle(layer.rect(), point, self.hit_size(state))
        {
            return handle.cursor();
        }
        match state.layers.topmost_at(point) {
            Some(l) if !l.locked => CursorIcon::Move,
            _ => CursorIcon::Default,
        }
    }
}
