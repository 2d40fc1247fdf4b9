use std::collections::VecDeque;

use image::RgbaImage;

use crate::canvas::{CANVAS_SIZE, PIXEL_COUNT, Placement, render_source};
use crate::ops::colors::Rgb;

/// Intersection pixels must be more opaque than this to count as overlap.
pub const INTERSECTION_MIN_ALPHA: u8 = 10;
/// Source pixels must be more opaque than this to count as overlap.
pub const SOURCE_MIN_ALPHA: u8 = 200;
/// Components smaller than this are discarded as noise.
pub const MIN_SLICE_PIXELS: usize = 3;

/// Tint colours used to tell slices apart in previews, cycled by slice index.
pub const SLICE_COLORS: [Rgb; 8] = [
    [255, 80, 80],
    [80, 220, 80],
    [80, 120, 255],
    [255, 210, 40],
    [210, 80, 255],
    [40, 210, 255],
    [255, 140, 50],
    [50, 255, 160],
];

/// A 4-connected region where the source overlaps the intersection band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    /// Row-major pixel indices (`y * 64 + x`) in discovery order.
    pixels: Vec<usize>,
}

impl Slice {
    pub fn pixels(&self) -> &[usize] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.pixels.contains(&((y * CANVAS_SIZE + x) as usize))
    }

    /// Mean pixel position, in canvas coordinates.
    pub fn centroid(&self) -> (f32, f32) {
        if self.pixels.is_empty() {
            return (0.0, 0.0);
        }
        let (sx, sy) = self.pixels.iter().fold((0usize, 0usize), |(sx, sy), &i| {
            (sx + i % CANVAS_SIZE as usize, sy + i / CANVAS_SIZE as usize)
        });
        let n = self.pixels.len() as f32;
        (sx as f32 / n, sy as f32 / n)
    }
}

/// Place `source` per `mode` and find its overlap regions with `intersection`.
///
/// With no compiled intersection there is nothing to overlap.
pub fn detect_slices(source: &RgbaImage, mode: Placement, intersection: Option<&RgbaImage>) -> Vec<Slice> {
    let Some(intersection) = intersection else {
        return Vec::new();
    };
    find_slices(&render_source(source, mode), intersection)
}

/// Connected overlap components of two 64×64 buffers, smallest first.
///
/// Equal-sized components keep the row-major order of their first pixel.
/// Buffers of any other size have no slices.
pub fn find_slices(rendered: &RgbaImage, intersection: &RgbaImage) -> Vec<Slice> {
    let canvas = (CANVAS_SIZE, CANVAS_SIZE);
    if rendered.dimensions() != canvas || intersection.dimensions() != canvas {
        log::warn!(
            "Slice detection needs 64×64 buffers, got {:?} and {:?}",
            rendered.dimensions(),
            intersection.dimensions()
        );
        return Vec::new();
    }

    let mut overlap = [false; PIXEL_COUNT];
    for (i, (s, b)) in rendered.pixels().zip(intersection.pixels()).enumerate() {
        overlap[i] = b[3] > INTERSECTION_MIN_ALPHA && s[3] > SOURCE_MIN_ALPHA;
    }

    let size = CANVAS_SIZE as usize;
    let mut visited = [false; PIXEL_COUNT];
    let mut slices = Vec::new();
    let mut queue = VecDeque::with_capacity(256);

    for start in 0..PIXEL_COUNT {
        if !overlap[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let mut pixels = Vec::new();

        while let Some(idx) = queue.pop_front() {
            pixels.push(idx);
            let (x, y) = (idx % size, idx / size);
            let neighbors = [
                (x > 0).then(|| idx - 1),
                (x + 1 < size).then(|| idx + 1),
                (y > 0).then(|| idx - size),
                (y + 1 < size).then(|| idx + size),
            ];
            for n in neighbors.into_iter().flatten() {
                if overlap[n] && !visited[n] {
                    visited[n] = true;
                    queue.push_back(n);
                }
            }
        }

        if pixels.len() >= MIN_SLICE_PIXELS {
            slices.push(Slice { pixels });
        }
    }

    // Stable: ties stay in scan order
    slices.sort_by_key(Slice::len);
    slices
}

/// Membership mask over the canvas for the selected slices.
pub(crate) fn slice_mask<'a>(slices: impl IntoIterator<Item = &'a Slice>) -> Vec<bool> {
    let mut mask = vec![false; PIXEL_COUNT];
    for slice in slices {
        for &i in &slice.pixels {
            mask[i] = true;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn canvas_with(points: &[(u32, u32)], a: u8) -> RgbaImage {
        let mut img = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
        for &(x, y) in points {
            img.put_pixel(x, y, Rgba([255, 255, 255, a]));
        }
        img
    }

    fn opaque() -> RgbaImage {
        RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([0, 0, 0, 255]))
    }

    fn rect(x0: u32, y0: u32, w: u32, h: u32) -> Vec<(u32, u32)> {
        (y0..y0 + h).flat_map(|y| (x0..x0 + w).map(move |x| (x, y))).collect()
    }

    #[test]
    fn transparent_intersection_yields_nothing() {
        let border = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
        assert!(find_slices(&opaque(), &border).is_empty());
        assert!(detect_slices(&opaque(), Placement::Resize, None).is_empty());
    }

    #[test]
    fn components_sorted_smallest_first() {
        let mut points = rect(0, 0, 4, 4); // 16
        points.extend(rect(10, 10, 3, 1)); // 3
        points.extend(rect(20, 20, 2, 3)); // 6
        points.extend([(40, 40), (41, 40)]); // 2, dropped
        let border = canvas_with(&points, 255);
        let slices = find_slices(&opaque(), &border);
        let sizes: Vec<_> = slices.iter().map(Slice::len).collect();
        assert_eq!(sizes, [3, 6, 16]);
        assert!(slices[0].contains(11, 10));
    }

    #[test]
    fn equal_sizes_keep_scan_order() {
        let mut points = rect(50, 2, 3, 1);
        points.extend(rect(1, 2, 1, 3));
        points.extend(rect(5, 30, 3, 1));
        let border = canvas_with(&points, 255);
        let slices = find_slices(&opaque(), &border);
        let firsts: Vec<_> = slices.iter().map(|s| s.pixels()[0]).collect();
        assert_eq!(firsts, [2 * 64 + 1, 2 * 64 + 50, 30 * 64 + 5]);
        assert_eq!(slices, find_slices(&opaque(), &border));
    }

    #[test]
    fn diagonal_pixels_are_not_connected() {
        let border = canvas_with(&[(0, 0), (1, 1), (2, 2), (3, 3)], 255);
        assert!(find_slices(&opaque(), &border).is_empty());
    }

    #[test]
    fn thresholds_gate_the_overlap() {
        let points = rect(8, 8, 3, 3);
        let faint_border = canvas_with(&points, INTERSECTION_MIN_ALPHA);
        assert!(find_slices(&opaque(), &faint_border).is_empty());

        let border = canvas_with(&points, INTERSECTION_MIN_ALPHA + 1);
        let soft_source = canvas_with(&points, SOURCE_MIN_ALPHA);
        assert!(find_slices(&soft_source, &border).is_empty());
        assert_eq!(find_slices(&opaque(), &border).len(), 1);
    }

    #[test]
    fn frame_border_over_full_source_is_one_ring() {
        let mut points = rect(0, 0, 64, 2);
        points.extend(rect(0, 62, 64, 2));
        points.extend(rect(0, 2, 2, 60));
        points.extend(rect(62, 2, 2, 60));
        let border = canvas_with(&points, 255);
        let small = RgbaImage::from_pixel(16, 16, Rgba([1, 1, 1, 255]));
        let slices = detect_slices(&small, Placement::Resize, Some(&border));
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].len(), 64 * 4 * 2 - 16);
        // Centred 16×16 never reaches the frame.
        assert!(detect_slices(&small, Placement::Center, Some(&border)).is_empty());
    }

    #[test]
    fn off_size_buffers_have_no_slices() {
        let big = RgbaImage::from_pixel(128, 128, Rgba([0, 0, 0, 255]));
        assert!(find_slices(&big, &big).is_empty());
        assert!(find_slices(&opaque(), &big).is_empty());
        assert!(find_slices(&big, &opaque()).is_empty());
        assert_eq!(find_slices(&opaque(), &opaque()).len(), 1);
    }

    #[test]
    fn centroid_of_a_bar() {
        let border = canvas_with(&rect(10, 4, 3, 1), 255);
        let slices = find_slices(&opaque(), &border);
        assert_eq!(slices[0].centroid(), (11.0, 4.0));
    }
}
