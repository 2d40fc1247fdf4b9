// ============================================================================
// BORDER STYLES: classic frames, coordinate patterns and pixel-art corners
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::{CANVAS_SIZE, Corners};
use crate::ops::colors::{Rgb, SeededRng, WHITE};

const EDGE: i64 = CANVAS_SIZE as i64;
const LAST: i64 = EDGE - 1;
const LIGHT_GRAY: Rgb = [200, 200, 200];
const MID_GRAY: Rgb = [150, 150, 150];
const MORTAR: Rgb = [160, 100, 60];
const PIP: Rgb = [0, 0, 0];
const SHADOW: Rgba<u8> = Rgba([0, 0, 0, 128]);
const SHADOW_OFFSET: i64 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderStyle {
    // Classic
    #[default]
    Solid,
    Dashed,
    Dotted,
    #[serde(rename = "dotdash")]
    DotDash,
    Shadow,
    Checkerboard,
    #[serde(rename = "multiring")]
    MultiRing,
    // Math pattern
    Axial,
    Bitplane,
    Constant,
    Edge,
    Manhattan,
    Parity,
    Prime,
    Radial,
    Sawtooth,
    Xor,
    // Pixel art
    #[serde(rename = "px-bracket")]
    PxBracket,
    #[serde(rename = "px-chamfer")]
    PxChamfer,
    #[serde(rename = "px-rivet")]
    PxRivet,
    #[serde(rename = "px-open")]
    PxOpen,
    #[serde(rename = "px-pip")]
    PxPip,
    #[serde(rename = "px-double")]
    PxDouble,
    #[serde(rename = "px-stitch")]
    PxStitch,
    #[serde(rename = "px-zigzag")]
    PxZigzag,
    #[serde(rename = "px-brick")]
    PxBrick,
}

impl BorderStyle {
    pub fn all() -> &'static [BorderStyle] {
        use BorderStyle::*;
        &[
            Solid, Dashed, Dotted, DotDash, Shadow, Checkerboard, MultiRing, Axial, Bitplane,
            Constant, Edge, Manhattan, Parity, Prime, Radial, Sawtooth, Xor, PxBracket, PxChamfer,
            PxRivet, PxOpen, PxPip, PxDouble, PxStitch, PxZigzag, PxBrick,
        ]
    }

    pub fn id(&self) -> &'static str {
        use BorderStyle::*;
        match self {
            Solid => "solid",
            Dashed => "dashed",
            Dotted => "dotted",
            DotDash => "dotdash",
            Shadow => "shadow",
            Checkerboard => "checkerboard",
            MultiRing => "multiring",
            Axial => "axial",
            Bitplane => "bitplane",
            Constant => "constant",
            Edge => "edge",
            Manhattan => "manhattan",
            Parity => "parity",
            Prime => "prime",
            Radial => "radial",
            Sawtooth => "sawtooth",
            Xor => "xor",
            PxBracket => "px-bracket",
            PxChamfer => "px-chamfer",
            PxRivet => "px-rivet",
            PxOpen => "px-open",
            PxPip => "px-pip",
            PxDouble => "px-double",
            PxStitch => "px-stitch",
            PxZigzag => "px-zigzag",
            PxBrick => "px-brick",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.id() == id)
    }

    pub fn label(&self) -> &'static str {
        use BorderStyle::*;
        match self {
            Solid => "Solid",
            Dashed => "Dashed",
            Dotted => "Dotted",
            DotDash => "Dot-Dash",
            Shadow => "Drop Shadow",
            Checkerboard => "Checkerboard",
            MultiRing => "Multi-Color Rings",
            Axial => "Axial Stripe",
            Bitplane => "Bitplane Slice",
            Constant => "Constant Field",
            Edge => "Edge Gradient Band",
            Manhattan => "Manhattan Distance",
            Parity => "Parity Field",
            Prime => "Prime Modulation",
            Radial => "Ring Distance Field",
            Sawtooth => "Sawtooth Edge",
            Xor => "XOR Interference",
            PxBracket => "Px: Corner Brackets",
            PxChamfer => "Px: Chamfered Corners",
            PxRivet => "Px: Corner Rivets",
            PxOpen => "Px: Open Corners",
            PxPip => "Px: Corner Pips",
            PxDouble => "Px: Double Rule",
            PxStitch => "Px: Cross-Stitch",
            PxZigzag => "Px: Zigzag Teeth",
            PxBrick => "Px: Brick Course",
        }
    }

    pub fn group(&self) -> &'static str {
        use BorderStyle::*;
        match self {
            Solid | Dashed | Dotted | DotDash | Shadow | Checkerboard | MultiRing => "Classic",
            Axial | Bitplane | Constant | Edge | Manhattan | Parity | Prime | Radial | Sawtooth
            | Xor => "Math Pattern",
            PxBracket | PxChamfer | PxRivet | PxOpen | PxPip | PxDouble | PxStitch | PxZigzag
            | PxBrick => "Pixel Art",
        }
    }

    /// Styles whose output depends on the corner mask.
    pub fn is_corner_aware(&self) -> bool {
        self.corner_hint().is_some()
    }

    pub fn corner_hint(&self) -> Option<&'static str> {
        match self {
            BorderStyle::PxBracket => {
                Some("Selected corners get an L-bracket block; unselected corners connect normally.")
            }
            BorderStyle::PxChamfer => Some("Selected corners are clipped with a diagonal pixel cut."),
            BorderStyle::PxRivet => Some("Selected corners get a contrasting square rivet/pin."),
            BorderStyle::PxOpen => Some("Selected corners are left transparent (gap in the border)."),
            BorderStyle::PxPip => Some("Selected corners get a small contrasting pip dot."),
            _ => None,
        }
    }
}

/// Render a transparent 64×64 canvas with a `width`-pixel frame.
///
/// `width` is clamped to 2..=5. An empty `colors` slice draws in white.
pub fn generate_border(
    colors: &[Rgb],
    width: u32,
    style: BorderStyle,
    rng: &mut SeededRng,
    corners: Corners,
) -> RgbaImage {
    let colors: &[Rgb] = if colors.is_empty() { &[WHITE] } else { colors };
    let w = width.clamp(2, 5) as i64;
    // The only per-generation parameter any style consumes.
    let axis = (rng.next_f64() * 3.0).floor() as u32;

    let mut p = Painter::new();
    let c0 = colors[0];
    let second = |fallback: Rgb| colors.get(1).copied().unwrap_or(fallback);

    use BorderStyle::*;
    match style {
        Solid => solid(&mut p, c0, w),
        Dashed => dashed(&mut p, c0, w),
        Dotted => dotted(&mut p, c0, w),
        DotDash => dot_dash(&mut p, c0, second(LIGHT_GRAY), w),
        Shadow => {
            shadow(&mut p, w);
            solid(&mut p, c0, w);
        }
        Checkerboard => {
            let pair = [c0, second(LIGHT_GRAY)];
            fill_frame(&mut p, w, |x, y| pair[((x + y) % 2) as usize]);
        }
        MultiRing => {
            let rings = [c0, second(LIGHT_GRAY), colors.get(2).copied().unwrap_or(MID_GRAY)];
            multi_ring(&mut p, rings, w);
        }
        Axial | Bitplane | Constant | Edge | Manhattan | Parity | Prime | Radial | Sawtooth
        | Xor => {
            let n = colors.len() as u32;
            fill_frame(&mut p, w, |x, y| colors[(pattern_index(style, x as u32, y as u32, n, axis) % n) as usize]);
        }
        PxBracket => bracket(&mut p, c0, w, corners),
        PxChamfer => {
            fill_frame(&mut p, w, |_, _| c0);
            for_each_corner(corners, w, |ox, oy, flip_x, flip_y| {
                for dy in 0..w {
                    for dx in 0..w {
                        let ix = if flip_x { w - 1 - dx } else { dx };
                        let iy = if flip_y { w - 1 - dy } else { dy };
                        if ix + iy < w - 1 {
                            p.clear(ox + dx, oy + dy);
                        }
                    }
                }
            });
        }
        PxRivet => {
            solid(&mut p, c0, w);
            let rivet = second(c0);
            let rs = (w + 1).min(5).min(w);
            for_each_corner(corners, w, |ox, oy, flip_x, flip_y| {
                let x = if flip_x { ox + w - rs } else { ox };
                let y = if flip_y { oy + w - rs } else { oy };
                p.fill(x, y, rs, rs, rivet);
            });
        }
        PxOpen => {
            fill_frame(&mut p, w, |_, _| c0);
            for_each_corner(corners, w, |ox, oy, _, _| {
                for dy in 0..w {
                    for dx in 0..w {
                        p.clear(ox + dx, oy + dy);
                    }
                }
            });
        }
        PxPip => {
            solid(&mut p, c0, w);
            let pip = second(PIP);
            let ps = 2.max((w as f64 * 0.55).floor() as i64);
            let off = (w - ps) / 2;
            for_each_corner(corners, w, |ox, oy, _, _| p.fill(ox + off, oy + off, ps, ps, pip));
        }
        PxDouble => double_rule(&mut p, c0, second(c0), w),
        PxStitch => stitch(&mut p, c0, second(c0), w),
        PxZigzag => zigzag(&mut p, c0, second(c0), w),
        PxBrick => {
            let mortar = second(MORTAR);
            fill_frame(&mut p, w, |x, y| {
                let offset = ((y / 2) % 2) * 4;
                if y % 2 == 1 || (x + offset) % 8 == 7 { mortar } else { c0 }
            });
        }
    }

    p.into_image()
}

/// Colour index for the coordinate-pattern styles, before reduction.
fn pattern_index(style: BorderStyle, x: u32, y: u32, n: u32, axis: u32) -> u32 {
    let (dx, dy) = (x as f64 - 31.5, y as f64 - 31.5);
    let edge = x.min(y).min(63 - x).min(63 - y);
    match style {
        BorderStyle::Axial => match axis {
            0 => y,
            1 => x,
            _ => x + y,
        },
        BorderStyle::Parity => x + y,
        BorderStyle::Xor => x ^ y,
        BorderStyle::Radial => (dx * dx + dy * dy).sqrt().floor() as u32,
        BorderStyle::Manhattan => (dx.abs() + dy.abs()).floor() as u32,
        BorderStyle::Edge => edge,
        BorderStyle::Sawtooth => edge + x + y,
        BorderStyle::Bitplane if n == 2 => ((x >> 1) & 1) ^ ((y >> 2) & 1),
        BorderStyle::Bitplane => (x & 1) + 2 * ((y >> 1) & 1),
        BorderStyle::Prime => (x % 3) * (y % 5),
        _ => 0,
    }
}

fn in_frame(x: i64, y: i64, w: i64) -> bool {
    x < w || x >= EDGE - w || y < w || y >= EDGE - w
}

/// Calls `f(origin_x, origin_y, right, bottom)` for every enabled corner square.
fn for_each_corner(corners: Corners, w: i64, mut f: impl FnMut(i64, i64, bool, bool)) {
    let far = EDGE - w;
    if corners.tl {
        f(0, 0, false, false);
    }
    if corners.tr {
        f(far, 0, true, false);
    }
    if corners.bl {
        f(0, far, false, true);
    }
    if corners.br {
        f(far, far, true, true);
    }
}

fn fill_frame(p: &mut Painter, w: i64, color_at: impl Fn(i64, i64) -> Rgb) {
    for y in 0..EDGE {
        for x in 0..EDGE {
            if in_frame(x, y, w) {
                p.put(x, y, color_at(x, y));
            }
        }
    }
}

fn solid(p: &mut Painter, c: Rgb, w: i64) {
    fill_frame(p, w, |_, _| c);
}

fn dashed(p: &mut Painter, c: Rgb, w: i64) {
    const DASH: i64 = 8;
    const STEP: i64 = 12;
    for x in (0..EDGE).step_by(STEP as usize) {
        for y in 0..w {
            for dx in 0..DASH.min(EDGE - x) {
                p.put(x + dx, y, c);
                p.put(x + dx, EDGE - w + y, c);
            }
        }
    }
    for y in (w..EDGE - w).step_by(STEP as usize) {
        for x in 0..w {
            for dy in 0..DASH.min(EDGE - w - y) {
                p.put(x, y + dy, c);
                p.put(EDGE - w + x, y + dy, c);
            }
        }
    }
}

fn dotted(p: &mut Painter, c: Rgb, w: i64) {
    const SPACING: i64 = 6;
    for x in (SPACING..EDGE - SPACING).step_by(SPACING as usize) {
        for y in 0..w {
            p.put(x, y, c);
            p.put(x, LAST - y, c);
        }
    }
    for y in (SPACING..EDGE - SPACING).step_by(SPACING as usize) {
        for x in 0..w {
            p.put(x, y, c);
            p.put(LAST - x, y, c);
        }
    }
}

fn dot_dash(p: &mut Painter, dot_color: Rgb, dash_color: Rgb, w: i64) {
    const DOT: i64 = 3;
    const GAP: i64 = 3;
    const DASH: i64 = 6;
    const PERIOD: i64 = DOT + GAP + DASH + GAP;
    let segments = [(0..DOT, dot_color), (DOT + GAP..DOT + GAP + DASH, dash_color)];

    for x in (0..EDGE).step_by(PERIOD as usize) {
        for y in 0..w {
            for (range, c) in segments.iter().cloned() {
                for dx in range.take_while(|dx| x + dx < EDGE) {
                    p.put(x + dx, y, c);
                    p.put(x + dx, EDGE - w + y, c);
                }
            }
        }
    }
    for y in (w..EDGE - w).step_by(PERIOD as usize) {
        for x in 0..w {
            for (range, c) in segments.iter().cloned() {
                for dy in range.take_while(|dy| y + dy < EDGE - w) {
                    p.put(x, y + dy, c);
                    p.put(EDGE - w + x, y + dy, c);
                }
            }
        }
    }
}

fn shadow(p: &mut Painter, w: i64) {
    let o = SHADOW_OFFSET;
    for x in 0..EDGE {
        for y in 0..w {
            p.shade(x + o, y + o);
            p.shade(x + o, EDGE - w + y + o);
        }
    }
    for y in w..EDGE - w {
        for x in 0..w {
            p.shade(x + o, y + o);
            p.shade(EDGE - w + x + o, y + o);
        }
    }
}

fn multi_ring(p: &mut Painter, rings: [Rgb; 3], w: i64) {
    let per_color = (w + 2) / 3;
    for ring in 0..w {
        let c = rings[((ring / per_color) % 3) as usize];
        for x in 0..EDGE {
            p.put(x, ring, c);
            p.put(x, EDGE - w + ring, c);
        }
        for y in ring + 1..EDGE - w + ring {
            p.put(ring, y, c);
            p.put(EDGE - w + ring, y, c);
        }
    }
}

fn bracket(p: &mut Painter, c: Rgb, w: i64, corners: Corners) {
    let mid = w / 2;
    for i in w..EDGE - w {
        p.put(i, mid, c);
        p.put(i, LAST - mid, c);
        p.put(mid, i, c);
        p.put(LAST - mid, i, c);
    }
    for_each_corner(corners, w, |ox, oy, _, _| p.fill(ox, oy, w, w, c));
}

fn double_rule(p: &mut Painter, outer: Rgb, inner_color: Rgb, w: i64) {
    for i in 0..EDGE {
        p.put(i, 0, outer);
        p.put(i, LAST, outer);
        p.put(0, i, outer);
        p.put(LAST, i, outer);
    }
    if w >= 3 {
        let inner = w - 1;
        for x in inner..EDGE - inner {
            p.put(x, inner, inner_color);
            p.put(x, LAST - inner, inner_color);
        }
        for y in inner + 1..LAST - inner {
            p.put(inner, y, inner_color);
            p.put(LAST - inner, y, inner_color);
        }
    }
}

fn stitch(p: &mut Painter, c1: Rgb, c2: Rgb, w: i64) {
    for x in 0..EDGE {
        for y in 0..w {
            if (x + y) % 2 == 0 {
                let c = if y % 2 == 0 { c1 } else { c2 };
                p.put(x, y, c);
                p.put(x, LAST - y, c);
            }
        }
    }
    for x in 0..w {
        for y in w..EDGE - w {
            if (x + y) % 2 == 0 {
                let c = if x % 2 == 0 { c1 } else { c2 };
                p.put(x, y, c);
                p.put(LAST - x, y, c);
            }
        }
    }
}

fn zigzag(p: &mut Painter, c1: Rgb, c2: Rgb, w: i64) {
    const HALF_PERIOD: i64 = 2;
    let tooth = |i: i64| (i / HALF_PERIOD) % 2;
    for x in 0..EDGE {
        let t = tooth(x);
        let c = if t == 1 { c2 } else { c1 };
        for y in 0..(w - 1 + t).max(1) {
            p.put(x, y, c);
            p.put(x, LAST - y, c);
        }
    }
    for y in w..EDGE - w {
        let t = tooth(y);
        let c = if t == 1 { c2 } else { c1 };
        for x in 0..(w - 1 + t).max(1) {
            p.put(x, y, c);
            p.put(LAST - x, y, c);
        }
    }
}

/// Pixel writer that ignores out-of-canvas coordinates.
struct Painter {
    img: RgbaImage,
}

impl Painter {
    fn new() -> Self {
        Self { img: RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE) }
    }

    fn set(&mut self, x: i64, y: i64, px: Rgba<u8>) {
        if (0..EDGE).contains(&x) && (0..EDGE).contains(&y) {
            self.img.put_pixel(x as u32, y as u32, px);
        }
    }

    fn put(&mut self, x: i64, y: i64, [r, g, b]: Rgb) {
        self.set(x, y, Rgba([r, g, b, 255]));
    }

    fn shade(&mut self, x: i64, y: i64) {
        self.set(x, y, SHADOW);
    }

    fn clear(&mut self, x: i64, y: i64) {
        self.set(x, y, Rgba([0, 0, 0, 0]));
    }

    fn fill(&mut self, x: i64, y: i64, w: i64, h: i64, c: Rgb) {
        for yy in y..y + h {
            for xx in x..x + w {
                self.put(xx, yy, c);
            }
        }
    }

    fn into_image(self) -> RgbaImage {
        self.img
    }
}
