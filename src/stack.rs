// ============================================================================
// LAYER STACK: ordered layers + active selection
// ============================================================================
//
// Order is paint order: index 0 is the bottom, the last layer is on top.
// Every mutation here is plain data manipulation; callers decide when to
// repaint.

use egui::{Pos2, Vec2};

use crate::layer::{Layer, LayerId};

#[derive(Clone, Debug, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
    active: Option<LayerId>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- queries -----------------------------------------------------------

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Back-to-front.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Layer> + ExactSizeIterator {
        self.layers.iter()
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.iter().map(|l| l.id).collect()
    }

    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn active_id(&self) -> Option<LayerId> {
        self.active
    }

    pub fn active(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.get(id))
    }

    pub fn topmost(&self) -> Option<&Layer> {
        self.layers.last()
    }

    /// Topmost visible layer whose rectangle contains `point`.
    pub fn topmost_at(&self, point: Pos2) -> Option<&Layer> {
        self.layers
            .iter()
            .rev()
            .find(|l| l.visible && crate::geometry::hit_rect(l.rect(), point))
    }

    pub fn visible_count(&self) -> usize {
        self.layers.iter().filter(|l| l.visible).count()
    }

    // ---- structural edits --------------------------------------------------

    /// Insert at `index` (clamped to the end), or append when `None`.
    /// Returns `false` and leaves the stack untouched if the id is taken.
    pub fn insert(&mut self, layer: Layer, index: Option<usize>) -> bool {
        if self.contains(layer.id) {
            return false;
        }
        match index {
            Some(i) => {
                let i = i.min(self.layers.len());
                self.layers.insert(i, layer);
            }
            None => self.layers.push(layer),
        }
        true
    }

    /// Remove a layer.  Clears the selection if it pointed at it.
    pub fn remove(&mut self, id: LayerId) -> Option<Layer> {
        let idx = self.index_of(id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        Some(self.layers.remove(idx))
    }

    /// Move a layer to the top of the paint order.
    pub fn bring_to_front(&mut self, id: LayerId) {
        if let Some(idx) = self.index_of(id)
            && idx + 1 != self.layers.len()
        {
            let layer = self.layers.remove(idx);
            self.layers.push(layer);
        }
    }

    /// List-level drag-and-drop: place `dragged` immediately after `target`.
    pub fn reorder(&mut self, dragged: LayerId, target: LayerId) {
        if dragged == target || !self.contains(target) {
            return;
        }
        let Some(from) = self.index_of(dragged) else { return };
        let layer = self.layers.remove(from);
        // Target index shifts down by one if it sat above the removed slot.
        let to = match self.index_of(target) {
            Some(t) => t + 1,
            None => return,
        };
        self.layers.insert(to, layer);
    }

    /// Copy a layer with a fresh id, offset by `offset`, inserted directly
    /// above the source.  Returns the new id.
    pub fn duplicate(&mut self, id: LayerId, offset: Vec2) -> Option<LayerId> {
        let idx = self.index_of(id)?;
        let dup = self.layers[idx].duplicated(offset);
        let new_id = dup.id;
        self.layers.insert(idx + 1, dup);
        Some(new_id)
    }

    /// Drop every layer and the selection.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.active = None;
    }

    // ---- selection ---------------------------------------------------------

    /// Make `id` the active layer.  Unknown ids are ignored.
    pub fn select(&mut self, id: LayerId) -> bool {
        if self.contains(id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    pub fn clear_selection(&mut self) {
        self.active = None;
    }

    // ---- panel commands ----------------------------------------------------

    pub fn set_visible(&mut self, id: LayerId, visible: bool) -> bool {
        self.with_layer(id, |l| l.visible = visible)
    }

    pub fn toggle_visible(&mut self, id: LayerId) -> bool {
        self.with_layer(id, |l| l.visible = !l.visible)
    }

    pub fn set_locked(&mut self, id: LayerId, locked: bool) -> bool {
        self.with_layer(id, |l| l.locked = locked)
    }

    pub fn toggle_locked(&mut self, id: LayerId) -> bool {
        self.with_layer(id, |l| l.locked = !l.locked)
    }

    /// Rename a layer.  Blank names are refused so the panel never shows an
    /// empty row.
    pub fn rename(&mut self, id: LayerId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.with_layer(id, |l| l.name = name.to_string())
    }

    fn with_layer(&mut self, id: LayerId, f: impl FnOnce(&mut Layer)) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                f(layer);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::{Rect, pos2, vec2};
    use image::RgbaImage;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn layer(name: &str, x: f32, y: f32) -> Layer {
        Layer::new(
            name,
            Arc::new(RgbaImage::new(4, 4)),
            Rect::from_min_size(pos2(x, y), vec2(100.0, 100.0)),
        )
    }

    fn names(stack: &LayerStack) -> Vec<String> {
        stack.iter().map(|l| l.name.clone()).collect()
    }

    fn stack_abc() -> (LayerStack, [LayerId; 3]) {
        let mut s = LayerStack::new();
        let (a, b, c) = (layer("a", 0.0, 0.0), layer("b", 0.0, 0.0), layer("c", 0.0, 0.0));
        let ids = [a.id, b.id, c.id];
        s.insert(a, None);
        s.insert(b, None);
        s.insert(c, None);
        (s, ids)
    }

    #[test]
    fn insert_appends_or_places() {
        let (mut s, _) = stack_abc();
        s.insert(layer("front", 0.0, 0.0), Some(0));
        s.insert(layer("far", 0.0, 0.0), Some(99));
        assert_eq!(names(&s), ["front", "a", "b", "c", "far"]);
    }

    #[test]
    fn insert_refuses_duplicate_ids() {
        let (mut s, [a, ..]) = stack_abc();
        let mut clash = layer("clash", 0.0, 0.0);
        clash.id = a;
        assert!(!s.insert(clash, None));
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn remove_active_clears_selection() {
        let (mut s, [a, b, _]) = stack_abc();
        s.select(b);
        s.remove(a);
        assert_eq!(s.active_id(), Some(b));
        s.remove(b);
        assert_eq!(s.active_id(), None);
        assert!(s.remove(b).is_none());
        assert_eq!(names(&s), ["c"]);
    }

    #[test]
    fn bring_to_front_is_idempotent() {
        let (mut s, [a, ..]) = stack_abc();
        s.bring_to_front(a);
        let once = s.ids();
        s.bring_to_front(a);
        assert_eq!(s.ids(), once);
        assert_eq!(names(&s), ["b", "c", "a"]);
    }

    #[test]
    fn reorder_places_after_target() {
        let (mut s, [a, b, c]) = stack_abc();
        s.reorder(a, c);
        assert_eq!(names(&s), ["b", "c", "a"]);
        s.reorder(a, b);
        assert_eq!(names(&s), ["b", "a", "c"]);
        s.reorder(c, c);
        assert_eq!(names(&s), ["b", "a", "c"]);
        s.reorder(c, LayerId::new());
        assert_eq!(names(&s), ["b", "a", "c"]);
    }

    #[test]
    fn duplicate_inserts_above_source() {
        let (mut s, [a, ..]) = stack_abc();
        let dup = s.duplicate(a, vec2(20.0, 20.0)).unwrap();
        assert_eq!(names(&s), ["a", "a copy", "b", "c"]);
        assert_eq!(s.get(dup).unwrap().origin(), pos2(20.0, 20.0));
        assert!(s.duplicate(LayerId::new(), Vec2::ZERO).is_none());
    }

    #[test]
    fn topmost_at_skips_hidden_layers() {
        let (mut s, [_, b, c]) = stack_abc();
        assert_eq!(s.topmost_at(pos2(50.0, 50.0)).map(|l| l.id), Some(c));
        s.set_visible(c, false);
        assert_eq!(s.topmost_at(pos2(50.0, 50.0)).map(|l| l.id), Some(b));
        assert!(s.topmost_at(pos2(500.0, 50.0)).is_none());
    }

    #[test]
    fn rename_rejects_blank() {
        let (mut s, [a, ..]) = stack_abc();
        assert!(!s.rename(a, "   "));
        assert!(s.rename(a, "  sky "));
        assert_eq!(s.get(a).unwrap().name, "sky");
    }

    #[test]
    fn toggles_flip_flags() {
        let (mut s, [a, ..]) = stack_abc();
        s.toggle_locked(a);
        s.toggle_visible(a);
        let l = s.get(a).unwrap();
        assert!(l.locked && !l.visible);
        assert_eq!(s.visible_count(), 2);
    }

    #[test]
    fn ids_stay_unique_and_active_resolves() {
        let mut rng = StdRng::seed_from_u64(0x2545_f491);
        let mut s = LayerStack::new();
        for step in 0..400 {
            let ids = s.ids();
            match rng.gen_range(0..4) {
                0 | 1 => {
                    let l = layer(&format!("l{step}"), 0.0, 0.0);
                    let id = l.id;
                    s.insert(l, Some(rng.gen_range(0..=ids.len())));
                    s.select(id);
                }
                2 if !ids.is_empty() => {
                    s.remove(ids[rng.gen_range(0..ids.len())]);
                }
                _ if !ids.is_empty() => {
                    if let Some(id) = s.duplicate(ids[rng.gen_range(0..ids.len())], vec2(1.0, 1.0)) {
                        s.select(id);
                    }
                }
                _ => {}
            }
            let unique: HashSet<_> = s.ids().into_iter().collect();
            assert_eq!(unique.len(), s.len());
            if let Some(active) = s.active_id() {
                assert!(s.contains(active));
            }
        }
    }
}
