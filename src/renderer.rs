// ============================================================================
// RENDERER: canvas state to egui paint commands
// ============================================================================
//
// Pure: reads the state, returns shapes in paint order.  The host uploads
// one texture per layer (`pending_uploads`) and hands the ids in; layers
// without a texture yet draw as a placeholder box.  Hosts should clip the painter to
// `display_rect`, layers may extend past the canvas.

use std::collections::HashMap;

use egui::{Color32, ColorImage, Pos2, Rect, Shape, Stroke, TextureId, Vec2};
use image::RgbaImage;

use crate::canvas::CanvasState;
use crate::coords::CoordinateMapper;
use crate::geometry;
use crate::layer::LayerId;

#[derive(Clone, Copy, Debug)]
pub struct RenderStyle {
    pub canvas_fill: Color32,
    pub placeholder_fill: Color32,
    pub accent: Color32,
    pub handle_border: Color32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            canvas_fill: Color32::from_gray(250),
            placeholder_fill: Color32::from_gray(200),
            accent: Color32::from_rgb(66, 133, 244),
            handle_border: Color32::WHITE,
        }
    }
}

/// Paint commands for `state` shown inside `display_rect` (screen space).
/// Empty while the canvas has no size or no on-screen area.
pub fn paint(
    state: &CanvasState,
    display_rect: Rect,
    textures: &HashMap<LayerId, TextureId>,
    style: &RenderStyle,
) -> Vec<Shape> {
    let Some(mapper) = state.mapper(display_rect.size()) else { return Vec::new() };
    if mapper.scale().is_none() {
        return Vec::new();
    }
    let to_screen = |r: Rect| screen_rect(&mapper, display_rect.min, r);

    let mut shapes = vec![Shape::rect_filled(display_rect, 0.0, style.canvas_fill)];

    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
    for layer in state.layers.iter().filter(|l| l.visible) {
        let Some(r) = to_screen(layer.rect()) else { continue };
        match textures.get(&layer.id) {
            Some(&tex) => shapes.push(Shape::image(tex, r, uv, Color32::WHITE)),
            None => shapes.push(Shape::rect_filled(r, 0.0, style.placeholder_fill)),
        }
    }

    if let Some(active) = state.layers.active()
        && active.visible
        && let Some(r) = to_screen(active.rect())
    {
        selection_outline(&mut shapes, r, style);
        if !active.locked {
            handles(&mut shapes, r, state.settings.handle_draw_size, style);
        }
    }
    shapes
}

/// Layers that have no texture yet, with their pixels ready for upload.
pub fn pending_uploads(
    state: &CanvasState,
    textures: &HashMap<LayerId, TextureId>,
) -> Vec<(LayerId, ColorImage)> {
    state
        .layers
        .iter()
        .filter(|l| !textures.contains_key(&l.id))
        .map(|l| (l.id, rgba_image_to_color_image(&l.source)))
        .collect()
}

/// Converts an RgbaImage to egui's ColorImage format for texture upload.
pub fn rgba_image_to_color_image(img: &RgbaImage) -> ColorImage {
    let size = [img.width() as usize, img.height() as usize];
    let color_pixels: Vec<Color32> = img
        .as_raw()
        .chunks_exact(4)
        .map(|c| Color32::from_rgba_unmultiplied(c[0], c[1], c[2], c[3]))
        .collect();
    ColorImage { size, pixels: color_pixels }
}

fn screen_rect(mapper: &CoordinateMapper, origin: Pos2, logical: Rect) -> Option<Rect> {
    let min = mapper.to_display(logical.min)?;
    let max = mapper.to_display(logical.max)?;
    Some(Rect::from_min_max(min, max).translate(origin.to_vec2()))
}

fn selection_outline(shapes: &mut Vec<Shape>, r: Rect, style: &RenderStyle) {
    let [ar, ag, ab, _] = style.accent.to_array();
    let glow = Color32::from_rgba_unmultiplied(ar, ag, ab, 50);
    let semi = Color32::from_rgba_unmultiplied(ar, ag, ab, 180);
    shapes.push(Shape::rect_stroke(r, 0.0, Stroke::new(5.0, glow)));
    shapes.push(Shape::rect_stroke(r, 0.0, Stroke::new(3.0, semi)));
    shapes.push(Shape::rect_stroke(r, 0.0, Stroke::new(1.0, style.accent)));
}

/// Corner squares with a drop shadow, `size` display pixels wide.
fn handles(shapes: &mut Vec<Shape>, r: Rect, size: f32, style: &RenderStyle) {
    let [ar, ag, ab, _] = style.accent.to_array();
    let fill = Color32::from_rgba_unmultiplied(ar, ag, ab, 220);
    for (_, anchor) in geometry::handle_anchors(r).iter() {
        let hr = Rect::from_center_size(anchor, Vec2::splat(size));
        shapes.push(Shape::rect_filled(hr.translate(Vec2::new(1.0, 1.0)), 2.0, Color32::from_black_alpha(60)));
        shapes.push(Shape::rect_filled(hr, 2.0, fill));
        shapes.push(Shape::rect_stroke(hr, 2.0, Stroke::new(1.5, style.handle_border)));
    }
}
