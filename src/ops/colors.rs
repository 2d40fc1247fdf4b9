// ============================================================================
// COLOUR UTILITIES: seeded RNG, hex/HSL conversion, reference palettes
// ============================================================================
//
// Everything here is a pure function of its inputs except `random_seed()` and
// `RandomSeeds`, which pull fresh entropy for the "Generate" button and for
// cycle mode.
// ============================================================================

use std::collections::HashMap;

use image::RgbaImage;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::CANVAS_SIZE;

pub type Rgb = [u8; 3];

/// Opaque white, substituted whenever a generator receives no colours.
pub const WHITE: Rgb = [255, 255, 255];

/// Padding used when a reference image yields fewer dominant colours than
/// requested: gray-blue, tan, mint.
pub const DEFAULT_PALETTE: [Rgb; 3] = [[100, 100, 120], [200, 150, 100], [150, 200, 150]];

/// Pixels at or below this alpha are ignored by palette extraction.
const EXTRACT_MIN_ALPHA: u8 = 64;

// ============================================================================
// SEEDED RNG
// ============================================================================

/// Linear-congruential generator seeded from a string.
///
/// The sequence is a pure function of the seed, so two generators built from
/// the same string always produce the same draws.
#[derive(Clone, Debug)]
pub struct SeededRng {
    state: i64,
}

impl SeededRng {
    pub fn from_seed(seed: &str) -> Self {
        let mut h: i32 = 0;
        for unit in seed.encode_utf16() {
            h = (h << 5).wrapping_sub(h).wrapping_add(unit as i32);
        }
        Self { state: h as i64 }
    }

    /// Next draw in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * 9301 + 49297).rem_euclid(233_280);
        self.state as f64 / 233_280.0
    }
}

/// Fresh random seed string (32 random bits in base 36).
pub fn random_seed() -> String {
    let bits = (Uuid::new_v4().as_u128() & 0xFFFF_FFFF) as u32;
    to_base36(bits)
}

fn to_base36(mut v: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if v == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while v > 0 {
        out.push(DIGITS[(v % 36) as usize]);
        v /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Where generation seeds come from.
pub trait SeedSource {
    fn next_seed(&mut self) -> String;
}

/// Fresh entropy for every seed; the default for interactive sessions.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSeeds;

impl SeedSource for RandomSeeds {
    fn next_seed(&mut self) -> String {
        random_seed()
    }
}

/// Deterministic `"{base}-{n}"` seeds, for reproducible cycles.
#[derive(Clone, Debug)]
pub struct SeedSequence {
    base: String,
    next: u64,
}

impl SeedSequence {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into(), next: 0 }
    }
}

impl SeedSource for SeedSequence {
    fn next_seed(&mut self) -> String {
        let seed = format!("{}-{}", self.base, self.next);
        self.next += 1;
        seed
    }
}

// ============================================================================
// HEX / HSL
// ============================================================================

/// Parse `#rrggbb` (the `#` is optional). Anything else is white.
pub fn hex_to_rgb(hex: &str) -> Rgb {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return WHITE;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).unwrap_or(255);
    [channel(0), channel(2), channel(4)]
}

pub fn rgb_to_hex(c: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

/// RGB → (hue degrees 0..360, saturation %, lightness %)
pub fn rgb_to_hsl(c: Rgb) -> (f64, f64, f64) {
    let r = c[0] as f64 / 255.0;
    let g = c[1] as f64 / 255.0;
    let b = c[2] as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l * 100.0);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s * 100.0, l * 100.0)
}

/// (hue degrees, saturation %, lightness %) → RGB
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb {
    let s = s / 100.0;
    let l = l / 100.0;
    let a = s * l.min(1.0 - l);
    let f = |n: f64| {
        let k = (n + h / 30.0).rem_euclid(12.0);
        let v = l - a * (k - 3.0).min(9.0 - k).min(1.0).max(-1.0);
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    [f(0.0), f(8.0), f(4.0)]
}

/// Three-colour harmony around a random hue: the base, its complement or
/// triad partner, and a third triad stop.
pub fn harmonious_colors(count: usize, rng: &mut SeededRng) -> Vec<Rgb> {
    let h = rng.next_f64() * 360.0;
    let s = 70.0 + rng.next_f64() * 30.0;
    let l = 40.0 + rng.next_f64() * 30.0;
    let mut colors = vec![hsl_to_rgb(h, s, l)];
    if count >= 2 {
        let offset = if rng.next_f64() > 0.5 { 180.0 } else { 120.0 };
        colors.push(hsl_to_rgb((h + offset) % 360.0, s, l));
    }
    if count >= 3 {
        colors.push(hsl_to_rgb((h + 240.0) % 360.0, s, l));
    }
    colors
}

// ============================================================================
// DOMINANT PALETTE EXTRACTION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum HueBucket {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Purple,
}

impl HueBucket {
    fn of(hue: f64) -> Self {
        match hue {
            h if h < 30.0 => HueBucket::Red,
            h if h < 60.0 => HueBucket::Orange,
            h if h < 120.0 => HueBucket::Yellow,
            h if h < 180.0 => HueBucket::Green,
            h if h < 240.0 => HueBucket::Cyan,
            h if h < 300.0 => HueBucket::Blue,
            h if h < 360.0 => HueBucket::Purple,
            _ => HueBucket::Red,
        }
    }
}

/// Blacks, greys and near-whites carry no useful hue.
fn is_neutral(r: u8, g: u8, b: u8) -> bool {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let saturation = if max > 0 { (max - min) as f64 / max as f64 } else { 0.0 };
    let brightness = (r as f64 + g as f64 + b as f64) / 3.0;
    let very_light = max > 220 && min > 190;
    saturation < 0.20 || brightness < 25.0 || very_light
}

fn quantize(c: u8) -> u8 {
    ((c as f64 / 16.0).round() * 16.0).min(255.0) as u8
}

/// Most frequent hue-bucketed, 16-level-quantised colours of `image`.
///
/// This is a frequency heuristic, not a perceptual model: it ranks filtered
/// buckets by pixel count and nothing more. Short results are padded from
/// [`DEFAULT_PALETTE`].
pub fn extract_dominant_palette(image: &RgbaImage, max_colors: usize) -> Vec<Rgb> {
    let sample = if image.dimensions() == (CANVAS_SIZE, CANVAS_SIZE) {
        image.clone()
    } else {
        image::imageops::resize(image, CANVAS_SIZE, CANVAS_SIZE, FilterType::Triangle)
    };

    // First-seen order is kept so equal counts rank deterministically.
    let mut slot_of: HashMap<(HueBucket, Rgb), usize> = HashMap::new();
    let mut counts: Vec<(Rgb, usize)> = Vec::new();

    for p in sample.pixels() {
        let [r, g, b, a] = p.0;
        if a <= EXTRACT_MIN_ALPHA || is_neutral(r, g, b) {
            continue;
        }
        let (hue, _, _) = rgb_to_hsl([r, g, b]);
        let key = (HueBucket::of(hue), [quantize(r), quantize(g), quantize(b)]);
        match slot_of.get(&key) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slot_of.insert(key, counts.len());
                counts.push((key.1, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let mut palette: Vec<Rgb> = counts.into_iter().take(max_colors).map(|(c, _)| c).collect();
    while palette.len() < max_colors {
        palette.push(DEFAULT_PALETTE[palette.len() % DEFAULT_PALETTE.len()]);
    }
    palette
}

// ============================================================================
// COMPLEMENTARY PALETTES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteBias {
    Cool,
    Warm,
    None,
}

/// Shift every colour toward cool or warm hues.
///
/// Cool: hue +30°, saturation ×0.85 (floor 35), lightness ×1.15+5 (cap 72).
/// Warm: hue −30°, saturation ×1.3+10 (cap 95), lightness ×0.92 (floor 30).
pub fn derive_complementary_palette(base: &[Rgb], bias: PaletteBias) -> Vec<Rgb> {
    base.iter()
        .map(|&color| {
            let (h, s, l) = rgb_to_hsl(color);
            match bias {
                PaletteBias::Cool => hsl_to_rgb(
                    (h + 30.0) % 360.0,
                    (s * 0.85).max(35.0),
                    (l * 1.15 + 5.0).min(72.0),
                ),
                PaletteBias::Warm => hsl_to_rgb(
                    (h - 30.0 + 360.0) % 360.0,
                    (s * 1.3 + 10.0).min(95.0),
                    (l * 0.92).max(30.0),
                ),
                PaletteBias::None => color,
            }
        })
        .collect()
}

/// The three preset palettes offered next to every colour picker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePalettes {
    pub base: Vec<Rgb>,
    pub cool: Vec<Rgb>,
    pub warm: Vec<Rgb>,
}

impl ReferencePalettes {
    pub fn from_image(image: &RgbaImage) -> Self {
        let base = extract_dominant_palette(image, 3);
        let cool = derive_complementary_palette(&base, PaletteBias::Cool);
        let warm = derive_complementary_palette(&base, PaletteBias::Warm);
        Self { base, cool, warm }
    }

    pub fn get(&self, choice: PaletteChoice) -> &[Rgb] {
        match choice {
            PaletteChoice::Base => &self.base,
            PaletteChoice::Cool => &self.cool,
            PaletteChoice::Warm => &self.warm,
        }
    }
}

/// Which preset button was pressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaletteChoice {
    Base,
    Cool,
    Warm,
}
