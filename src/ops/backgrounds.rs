// ============================================================================
// BACKGROUND PATTERNS: thirteen procedural 64×64 textures
// ============================================================================
//
// Each style is a pure `(draws, sample, colour count) → colour index` function.
// The four `draws` are pulled from the generator's RNG once per generation, so
// a style varies between generations but never from pixel to pixel.
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::canvas::CANVAS_SIZE;
use crate::ops::colors::{Rgb, SeededRng, WHITE};

const CENTER: f64 = 31.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackgroundStyle {
    #[default]
    #[serde(rename = "bg1")]
    CellularNoise,
    #[serde(rename = "bg2")]
    PolygonRings,
    #[serde(rename = "bg3")]
    DirectionalDrift,
    #[serde(rename = "bg4")]
    FlowNoise,
    #[serde(rename = "bg5")]
    GalaxyNoise,
    #[serde(rename = "bg6")]
    WaveInterference,
    #[serde(rename = "bg7")]
    RadialFalloff,
    #[serde(rename = "bg8")]
    SpiralSwirl,
    #[serde(rename = "bg9")]
    Starburst,
    #[serde(rename = "bg10")]
    Starfield,
    #[serde(rename = "bg11")]
    PixelGrid,
    #[serde(rename = "bg12")]
    DiagonalStripes,
    #[serde(rename = "bg13")]
    DotGrid,
}

/// Per-pixel coordinates handed to every style.
struct Sample {
    x: u32,
    y: u32,
    nx: f64,
    ny: f64,
    r: f64,
    theta: f64,
}

impl Sample {
    fn at(x: u32, y: u32) -> Self {
        let nx = (x as f64 - CENTER) / 32.0;
        let ny = (y as f64 - CENTER) / 32.0;
        Self {
            x,
            y,
            nx,
            ny,
            r: (nx * nx + ny * ny).sqrt(),
            theta: ny.atan2(nx),
        }
    }
}

type Draws = [f64; 4];
type IndexFn = fn(&Draws, &Sample, i64) -> i64;

impl BackgroundStyle {
    pub fn all() -> &'static [BackgroundStyle] {
        &[
            BackgroundStyle::CellularNoise,
            BackgroundStyle::PolygonRings,
            BackgroundStyle::DirectionalDrift,
            BackgroundStyle::FlowNoise,
            BackgroundStyle::GalaxyNoise,
            BackgroundStyle::WaveInterference,
            BackgroundStyle::RadialFalloff,
            BackgroundStyle::SpiralSwirl,
            BackgroundStyle::Starburst,
            BackgroundStyle::Starfield,
            BackgroundStyle::PixelGrid,
            BackgroundStyle::DiagonalStripes,
            BackgroundStyle::DotGrid,
        ]
    }

    /// Stable wire id used in session files.
    pub fn id(&self) -> &'static str {
        match self {
            BackgroundStyle::CellularNoise => "bg1",
            BackgroundStyle::PolygonRings => "bg2",
            BackgroundStyle::DirectionalDrift => "bg3",
            BackgroundStyle::FlowNoise => "bg4",
            BackgroundStyle::GalaxyNoise => "bg5",
            BackgroundStyle::WaveInterference => "bg6",
            BackgroundStyle::RadialFalloff => "bg7",
            BackgroundStyle::SpiralSwirl => "bg8",
            BackgroundStyle::Starburst => "bg9",
            BackgroundStyle::Starfield => "bg10",
            BackgroundStyle::PixelGrid => "bg11",
            BackgroundStyle::DiagonalStripes => "bg12",
            BackgroundStyle::DotGrid => "bg13",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|s| s.id() == id)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackgroundStyle::CellularNoise => "Cellular Soft Noise",
            BackgroundStyle::PolygonRings => "Concentric Polygon Rings",
            BackgroundStyle::DirectionalDrift => "Directional Drift Field",
            BackgroundStyle::FlowNoise => "Flow Noise Field",
            BackgroundStyle::GalaxyNoise => "Galaxy Noise Hybrid",
            BackgroundStyle::WaveInterference => "Low-Frequency Wave Interference",
            BackgroundStyle::RadialFalloff => "Soft Radial Falloff",
            BackgroundStyle::SpiralSwirl => "Spiral Swirl Field",
            BackgroundStyle::Starburst => "Starburst Harmonic",
            BackgroundStyle::Starfield => "Starfield Sparse Distribution",
            BackgroundStyle::PixelGrid => "Pixel Grid",
            BackgroundStyle::DiagonalStripes => "Diagonal Stripes",
            BackgroundStyle::DotGrid => "Dot Grid",
        }
    }

    /// Picker group heading.
    pub fn group(&self) -> &'static str {
        match self {
            BackgroundStyle::CellularNoise
            | BackgroundStyle::FlowNoise
            | BackgroundStyle::GalaxyNoise
            | BackgroundStyle::RadialFalloff => "Noise & Organic",
            BackgroundStyle::PolygonRings
            | BackgroundStyle::DirectionalDrift
            | BackgroundStyle::WaveInterference
            | BackgroundStyle::SpiralSwirl
            | BackgroundStyle::Starburst => "Wave & Angular",
            BackgroundStyle::PixelGrid
            | BackgroundStyle::DiagonalStripes
            | BackgroundStyle::DotGrid => "Geometric",
            BackgroundStyle::Starfield => "Sparse",
        }
    }

    fn index_fn(self) -> IndexFn {
        match self {
            BackgroundStyle::CellularNoise => cellular_noise,
            BackgroundStyle::PolygonRings => polygon_rings,
            BackgroundStyle::DirectionalDrift => directional_drift,
            BackgroundStyle::FlowNoise => flow_noise,
            BackgroundStyle::GalaxyNoise => galaxy_noise,
            BackgroundStyle::WaveInterference => wave_interference,
            BackgroundStyle::RadialFalloff => radial_falloff,
            BackgroundStyle::SpiralSwirl => spiral_swirl,
            BackgroundStyle::Starburst => starburst,
            BackgroundStyle::Starfield => starfield,
            BackgroundStyle::PixelGrid => pixel_grid,
            BackgroundStyle::DiagonalStripes => diagonal_stripes,
            BackgroundStyle::DotGrid => dot_grid,
        }
    }
}

/// Render an opaque 64×64 background. An empty `colors` slice renders white.
pub fn generate_background(colors: &[Rgb], style: BackgroundStyle, rng: &mut SeededRng) -> RgbaImage {
    let colors: &[Rgb] = if colors.is_empty() { &[WHITE] } else { colors };
    let n = colors.len() as i64;
    let draws: Draws = [rng.next_f64(), rng.next_f64(), rng.next_f64(), rng.next_f64()];
    let index = style.index_fn();

    RgbaImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |x, y| {
        let ci = index(&draws, &Sample::at(x, y), n).rem_euclid(n) as usize;
        let [r, g, b] = colors[ci];
        Rgba([r, g, b, 255])
    })
}

// ============================================================================
// STYLE FUNCTIONS
// ============================================================================

/// Sine hash in [0, 1).
fn hash(x: f64, y: f64, s: f64) -> f64 {
    let v = (x * 12.9898 + y * 78.233 + s * 37.719).sin() * 43758.5453;
    v - v.floor()
}

fn salt(draw: f64) -> f64 {
    (draw * 1000.0).floor()
}

/// Two colours split on sign; otherwise a banded lookup.
fn signed_band(v: f64, n: i64, offset: f64, scale: f64) -> i64 {
    if n == 2 {
        (v > 0.0) as i64
    } else {
        ((v + offset) * scale).floor() as i64
    }
}

fn cellular_noise(d: &Draws, p: &Sample, n: i64) -> i64 {
    let v = hash((p.x / 8) as f64, (p.y / 8) as f64, salt(d[0]));
    (v * n as f64).floor() as i64
}

fn polygon_rings(d: &Draws, p: &Sample, n: i64) -> i64 {
    let sides = 3.0 + (salt(d[0]) % 6.0);
    let v = (sides * p.theta).cos().abs() + p.r;
    (v * n as f64).floor() as i64
}

fn directional_drift(d: &Draws, p: &Sample, n: i64) -> i64 {
    let a = 3.0 + (d[0] * 4.0).floor();
    let b = 3.0 + (d[1] * 4.0).floor();
    let v = (p.nx * a + p.ny * b + salt(d[2])).sin();
    signed_band(v, n, 1.0, 1.5)
}

fn flow_noise(d: &Draws, p: &Sample, n: i64) -> i64 {
    let (x, y) = (p.x as f64, p.y as f64);
    let warp_x = x + hash(y, 0.0, salt(d[0])) * 16.0;
    let warp_y = y + hash(x, 0.0, salt(d[1])) * 16.0;
    let v = hash(warp_x, warp_y, salt(d[2]));
    (v * n as f64).floor() as i64
}

fn galaxy_noise(d: &Draws, p: &Sample, n: i64) -> i64 {
    let arms = 4.0 + (salt(d[0]) % 5.0);
    let grain = hash(p.x as f64, p.y as f64, salt(d[1])) * 2.0;
    let v = (p.theta * arms + p.r * 6.0 + grain).sin();
    signed_band(v, n, 2.0, 1.0 / 1.3)
}

fn wave_interference(d: &Draws, p: &Sample, n: i64) -> i64 {
    let a = 3.0 + (d[0] * 4.0).floor();
    let b = 3.0 + (d[1] * 4.0).floor();
    let v = (p.nx * a + salt(d[2])).sin() + (p.ny * b - salt(d[3])).cos();
    signed_band(v, n, 2.0, 1.0 / 1.5)
}

fn radial_falloff(d: &Draws, p: &Sample, n: i64) -> i64 {
    let v = p.r + hash(p.x as f64, p.y as f64, salt(d[0])) * 0.08;
    (v * n as f64).floor() as i64
}

fn spiral_swirl(d: &Draws, p: &Sample, n: i64) -> i64 {
    let twist = 4.0 + (salt(d[0]) % 5.0);
    let v = p.theta + p.r * twist;
    (v * n as f64).floor() as i64
}

fn starburst(d: &Draws, p: &Sample, n: i64) -> i64 {
    let rays = 4.0 + (salt(d[0]) % 5.0);
    let v = (rays * p.theta).cos();
    signed_band(v, n, 1.0, 1.5)
}

fn starfield(d: &Draws, p: &Sample, n: i64) -> i64 {
    let v = hash(p.x as f64, p.y as f64, salt(d[0]));
    if n == 2 {
        return (v > 0.92) as i64;
    }
    if v > 0.97 {
        2
    } else if v > 0.92 {
        1
    } else {
        0
    }
}

fn pixel_grid(_: &Draws, p: &Sample, n: i64) -> i64 {
    if p.x % 8 == 0 || p.y % 8 == 0 { 1 % n } else { 0 }
}

fn diagonal_stripes(_: &Draws, p: &Sample, n: i64) -> i64 {
    let band = ((p.x + p.y) % 16) as f64;
    (band / (16.0 / n as f64)).floor() as i64
}

fn dot_grid(_: &Draws, p: &Sample, n: i64) -> i64 {
    let dx = (p.x % 8) as i64 - 4;
    let dy = (p.y % 8) as i64 - 4;
    if dx * dx + dy * dy <= 4 { 1 % n } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALETTE: [Rgb; 3] = [[10, 20, 30], [200, 100, 50], [0, 255, 128]];

    #[test]
    fn every_style_stays_inside_the_palette() {
        for &style in BackgroundStyle::all() {
            for n in 1..=3 {
                let mut rng = SeededRng::from_seed("bounds");
                let img = generate_background(&PALETTE[..n], style, &mut rng);
                for p in img.pixels() {
                    let rgb = [p[0], p[1], p[2]];
                    assert!(PALETTE[..n].contains(&rgb), "{} with {n} colours produced {rgb:?}", style.id());
                    assert_eq!(p[3], 255);
                }
            }
        }
    }

    #[test]
    fn single_colour_is_a_flat_fill() {
        for &style in BackgroundStyle::all() {
            let mut rng = SeededRng::from_seed("flat");
            let img = generate_background(&[[9, 8, 7]], style, &mut rng);
            assert!(img.pixels().all(|p| p.0 == [9, 8, 7, 255]), "{}", style.id());
        }
    }

    #[test]
    fn empty_colours_render_white() {
        let mut rng = SeededRng::from_seed("white");
        let img = generate_background(&[], BackgroundStyle::Starburst, &mut rng);
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn same_seed_same_pattern() {
        for &style in BackgroundStyle::all() {
            let a = generate_background(&PALETTE, style, &mut SeededRng::from_seed("s"));
            let b = generate_background(&PALETTE, style, &mut SeededRng::from_seed("s"));
            assert_eq!(a.as_raw(), b.as_raw(), "{}", style.id());
        }
    }

    #[test]
    fn pixel_grid_lines_every_eighth_pixel() {
        let img = generate_background(&PALETTE[..2], BackgroundStyle::PixelGrid, &mut SeededRng::from_seed("g"));
        assert_eq!(img.get_pixel(0, 5).0, [200, 100, 50, 255]);
        assert_eq!(img.get_pixel(16, 3).0, [200, 100, 50, 255]);
        assert_eq!(img.get_pixel(3, 5).0, [10, 20, 30, 255]);
    }

    #[test]
    fn style_ids_round_trip() {
        for &style in BackgroundStyle::all() {
            assert_eq!(BackgroundStyle::from_id(style.id()), Some(style));
        }
        assert_eq!(BackgroundStyle::all().len(), 13);
        assert_eq!(BackgroundStyle::from_id("bg99"), None);
    }
}
