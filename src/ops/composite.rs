// ============================================================================
// BADGE COMPOSITING
// ============================================================================
//
// Draw order: background → source → intersection → [promoted slices] → overlay.
// Every step is a straight-alpha blit at 64×64.
// ============================================================================

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::canvas::{CANVAS_SIZE, Placement, blank_canvas, blend_pixel, draw_over, render_source};
use crate::ops::slicing::{SLICE_COLORS, Slice, slice_mask};

const CHECKED_TINT: f32 = 0.55;
const UNCHECKED_TINT: f32 = 0.15;

/// Compiled buffers of the three bands. Absent bands are skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct BandBuffers<'a> {
    pub background: Option<&'a RgbaImage>,
    pub intersection: Option<&'a RgbaImage>,
    pub overlay: Option<&'a RgbaImage>,
}

fn draw_optional(dst: &mut RgbaImage, src: Option<&RgbaImage>) {
    if let Some(src) = src {
        draw_over(dst, src, 1.0);
    }
}

/// Background, source and intersection; everything below the overlay.
fn composite_base(source: &RgbaImage, bands: &BandBuffers) -> RgbaImage {
    let mut out = blank_canvas();
    draw_optional(&mut out, bands.background);
    draw_over(&mut out, source, 1.0);
    draw_optional(&mut out, bands.intersection);
    out
}

pub fn composite_standard(source: &RgbaImage, mode: Placement, bands: &BandBuffers) -> RgbaImage {
    let rendered = render_source(source, mode);
    let mut out = composite_base(&rendered, bands);
    draw_optional(&mut out, bands.overlay);
    out
}

/// Like [`composite_standard`], but the pixels of the `promoted` slices are
/// redrawn from the source above the intersection band and below the overlay.
///
/// Indices outside `slices` are skipped.
pub fn composite_sliced(
    source: &RgbaImage,
    mode: Placement,
    slices: &[Slice],
    promoted: &[usize],
    bands: &BandBuffers,
) -> RgbaImage {
    let rendered = render_source(source, mode);
    let mut out = composite_base(&rendered, bands);

    let chosen = promoted.iter().filter_map(|&i| {
        let slice = slices.get(i);
        if slice.is_none() {
            log::warn!("Ignoring slice index {i}: only {} slices detected", slices.len());
        }
        slice
    });
    let front = slice_mask(chosen);

    for ((dst, src), in_front) in out.pixels_mut().zip(rendered.pixels()).zip(front) {
        if in_front {
            *dst = blend_pixel(*dst, *src, 1.0);
        }
    }

    draw_optional(&mut out, bands.overlay);
    out
}

/// Selection preview: the standard composite upscaled by `scale`, with each
/// slice tinted in its [`SLICE_COLORS`] entry, stronger when `checked`.
pub fn slice_preview(
    source: &RgbaImage,
    mode: Placement,
    bands: &BandBuffers,
    slices: &[Slice],
    checked: &[bool],
    scale: u32,
) -> RgbaImage {
    let scale = scale.max(1);
    let base = composite_standard(source, mode, bands);
    let size = CANVAS_SIZE * scale;
    let mut out = imageops::resize(&base, size, size, FilterType::Nearest);

    for (idx, slice) in slices.iter().enumerate() {
        let [r, g, b] = SLICE_COLORS[idx % SLICE_COLORS.len()];
        let tint = Rgba([r, g, b, 255]);
        let alpha = if checked.get(idx).copied().unwrap_or(false) { CHECKED_TINT } else { UNCHECKED_TINT };
        for &i in slice.pixels() {
            let (x, y) = (i as u32 % CANVAS_SIZE, i as u32 / CANVAS_SIZE);
            for dy in 0..scale {
                for dx in 0..scale {
                    let p = out.get_pixel_mut(x * scale + dx, y * scale + dy);
                    *p = blend_pixel(*p, tint, alpha);
                }
            }
        }
    }
    out
}
