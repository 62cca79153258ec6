// ============================================================================
// COMPOSITOR: flatten the stack, normalize single images
// ============================================================================
//
// Both operations are deterministic and produce an image of exactly the
// requested size: resample with `image::imageops`, then source-over blend
// row by row on the rayon pool.

use std::borrow::Cow;

use image::{Rgba, RgbaImage, imageops};
use rayon::prelude::*;

use crate::canvas::CanvasSize;
use crate::error::CompositionError;
use crate::layer::Layer;
use crate::log_info;
use crate::stack::LayerStack;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl Interpolation {
    pub fn label(&self) -> &'static str {
        match self {
            Interpolation::Nearest  => "Nearest Neighbor",
            Interpolation::Bilinear => "Bilinear",
            Interpolation::Bicubic  => "Bicubic",
            Interpolation::Lanczos3 => "Lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest  => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }

    /// Config-file spelling, named after the `image` filter it selects.
    pub fn key(&self) -> &'static str {
        match self {
            Interpolation::Nearest  => "nearest",
            Interpolation::Bilinear => "triangle",
            Interpolation::Bicubic  => "catmullrom",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "nearest" => Some(Interpolation::Nearest),
            "triangle" | "bilinear" => Some(Interpolation::Bilinear),
            "catmullrom" | "bicubic" => Some(Interpolation::Bicubic),
            "lanczos3" | "lanczos" => Some(Interpolation::Lanczos3),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
//  Flatten
// ---------------------------------------------------------------------------

/// Paint every visible layer, bottom to top, onto a transparent surface of
/// exactly `size`.  Locked layers are painted like any other.
pub fn flatten(
    stack: &LayerStack,
    size: CanvasSize,
    filter: Interpolation,
) -> Result<RgbaImage, CompositionError> {
    if size.width == 0 || size.height == 0 {
        return Err(CompositionError::EmptyTarget { width: size.width, height: size.height });
    }
    if stack.visible_count() == 0 {
        return Err(CompositionError::EmptyComposition);
    }

    let mut canvas = RgbaImage::new(size.width, size.height);
    for layer in stack.iter().filter(|l| l.visible) {
        paint_layer(&mut canvas, layer, filter);
    }
    log_info!("Flattened {} visible layers to {}", stack.visible_count(), size);
    Ok(canvas)
}

fn paint_layer(canvas: &mut RgbaImage, layer: &Layer, filter: Interpolation) {
    let w = layer.width.round();
    let h = layer.height.round();
    if !(w >= 1.0 && h >= 1.0) {
        return;
    }
    let (w, h) = (w as u32, h as u32);
    let x0 = layer.x.round() as i64;
    let y0 = layer.y.round() as i64;
    blit(canvas, &resampled(&layer.source, w, h, filter), x0, y0);
}

fn resampled(src: &RgbaImage, w: u32, h: u32, filter: Interpolation) -> Cow<'_, RgbaImage> {
    if src.width() == w && src.height() == h {
        Cow::Borrowed(src)
    } else {
        Cow::Owned(imageops::resize(src, w, h, filter.to_filter()))
    }
}

/// Source-over `src` onto `dst` with its top-left at `(x0, y0)`, clipped.
fn blit(dst: &mut RgbaImage, src: &RgbaImage, x0: i64, y0: i64) {
    let (cw, ch) = (dst.width() as i64, dst.height() as i64);
    let left = x0.max(0);
    let right = (x0 + src.width() as i64).min(cw);
    let top = y0.max(0);
    let bottom = (y0 + src.height() as i64).min(ch);
    if left >= right || top >= bottom {
        return;
    }

    let row_bytes = cw as usize * 4;
    dst.as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(top as usize)
        .take((bottom - top) as usize)
        .for_each(|(dy, row)| {
            let sy = (dy as i64 - y0) as u32;
            for dx in left..right {
                let sx = (dx - x0) as u32;
                let s = *src.get_pixel(sx, sy);
                let i = dx as usize * 4;
                let d = Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]);
                row[i..i + 4].copy_from_slice(&alpha_blend(d, s).0);
            }
        });
}

/// Simple alpha-composite: src over dst.
fn alpha_blend(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    if src[3] == 0 { return dst; }
    if src[3] == 255 || dst[3] == 0 { return src; }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a < 0.001 { return Rgba([0, 0, 0, 0]); }
    let inv = 1.0 / out_a;
    let ch = |c: usize| ((src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) * inv).round().clamp(0.0, 255.0) as u8;
    Rgba([ch(0), ch(1), ch(2), (out_a * 255.0).round().clamp(0.0, 255.0) as u8])
}

// ---------------------------------------------------------------------------
//  Normalize
// ---------------------------------------------------------------------------

/// Where a normalized image was drawn on its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub offset_x: u32,
    pub offset_y: u32,
    pub draw_w: u32,
    pub draw_h: u32,
}

#[derive(Clone, Debug)]
pub struct NormalizedImage {
    pub image: RgbaImage,
    pub placement: Placement,
}

/// Fit `src_w × src_h` inside `target` without enlarging, centered.
pub fn normalize_placement(src_w: u32, src_h: u32, target: CanvasSize) -> Placement {
    let (tw, th) = (target.width as f32, target.height as f32);
    let (w, h) = (src_w.max(1) as f32, src_h.max(1) as f32);
    let scale = (tw / w).min(th / h).min(1.0);
    let draw_w = ((w * scale).round() as u32).clamp(1, target.width.max(1));
    let draw_h = ((h * scale).round() as u32).clamp(1, target.height.max(1));
    Placement {
        offset_x: (target.width - draw_w) / 2,
        offset_y: (target.height - draw_h) / 2,
        draw_w,
        draw_h,
    }
}

/// Scale `img` down to fit `target` and center it on transparent padding.
pub fn normalize(
    img: &RgbaImage,
    target: CanvasSize,
    filter: Interpolation,
) -> Result<NormalizedImage, CompositionError> {
    if target.width == 0 || target.height == 0 {
        return Err(CompositionError::EmptyTarget { width: target.width, height: target.height });
    }
    if img.width() == 0 || img.height() == 0 {
        return Err(CompositionError::EmptyComposition);
    }

    let placement = normalize_placement(img.width(), img.height(), target);
    let mut out = RgbaImage::new(target.width, target.height);
    let scaled = resampled(img, placement.draw_w, placement.draw_h, filter);
    imageops::replace(&mut out, &*scaled, placement.offset_x as i64, placement.offset_y as i64);
    log_info!(
        "Normalized {}x{} onto {} at ({}, {}) {}x{}",
        img.width(), img.height(), target,
        placement.offset_x, placement.offset_y, placement.draw_w, placement.draw_h
    );
    Ok(NormalizedImage { image: out, placement })
}
