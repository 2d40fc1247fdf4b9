use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::ops::backgrounds::{BackgroundStyle, generate_background};
use crate::ops::borders::{BorderStyle, generate_border};
use crate::ops::colors::{Rgb, SeedSource, SeededRng, WHITE, hex_to_rgb};
use crate::ops::composite::BandBuffers;

/// Edge length of every working buffer.
pub const CANVAS_SIZE: u32 = 64;
pub const PIXEL_COUNT: usize = (CANVAS_SIZE * CANVAS_SIZE) as usize;

pub const MAX_COLORS: u8 = 3;
pub const MIN_BORDER_WIDTH: u32 = 2;
pub const MAX_BORDER_WIDTH: u32 = 5;

const BACKGROUND_DEFAULT_COLORS: [&str; 3] = ["#1a1a2e", "#16213e", "#0f3460"];
const BORDER_DEFAULT_COLORS: [&str; 3] = ["#ffffff", "#ff0000", "#00ff00"];

// ============================================================================
// BUFFERS & BLENDING
// ============================================================================

/// Fully transparent 64×64 buffer.
pub fn blank_canvas() -> RgbaImage {
    RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE)
}

/// Scale any image to 64×64 with nearest-neighbour sampling.
pub fn normalize(img: &RgbaImage) -> RgbaImage {
    if img.dimensions() == (CANVAS_SIZE, CANVAS_SIZE) {
        img.clone()
    } else {
        imageops::resize(img, CANVAS_SIZE, CANVAS_SIZE, FilterType::Nearest)
    }
}

/// Straight-alpha source-over of `top` onto `base`, with `top` scaled by `opacity`.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    // Fast path: nothing to draw
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    // Fast path: opaque top at full opacity overwrites
    if opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let opacity = opacity.clamp(0.0, 1.0);
    let top_a = (top[3] as f32 / 255.0) * opacity;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |i: usize| {
        let t = top[i] as f32 / 255.0;
        let b = base[i] as f32 / 255.0;
        let c = (t * top_a + b * base_a * (1.0 - top_a)) / out_a;
        (c * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([channel(0), channel(1), channel(2), (out_a * 255.0).round().clamp(0.0, 255.0) as u8])
}

/// Blit `src` over `dst` pixel for pixel. Both must be 64×64.
pub fn draw_over(dst: &mut RgbaImage, src: &RgbaImage, opacity: f32) {
    for (d, s) in dst.pixels_mut().zip(src.pixels()) {
        *d = blend_pixel(*d, *s, opacity);
    }
}

// ============================================================================
// SOURCE PLACEMENT
// ============================================================================

/// How a source image is fitted into the 64×64 canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Stretch to fill.
    #[default]
    Resize,
    /// Scale down only when larger than the canvas, keep aspect, centre.
    Center,
}

impl Placement {
    pub fn id(&self) -> &'static str {
        match self {
            Placement::Resize => "resize",
            Placement::Center => "center",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().as_str() {
            "resize" => Some(Placement::Resize),
            "center" | "centre" => Some(Placement::Center),
            _ => None,
        }
    }
}

/// Render `source` into a transparent 64×64 buffer using `mode`.
pub fn render_source(source: &RgbaImage, mode: Placement) -> RgbaImage {
    match mode {
        Placement::Resize => normalize(source),
        Placement::Center => {
            let (sw, sh) = source.dimensions();
            let (mut dw, mut dh) = (sw, sh);
            if sw > CANVAS_SIZE || sh > CANVAS_SIZE {
                let ratio = (CANVAS_SIZE as f64 / sw as f64).min(CANVAS_SIZE as f64 / sh as f64);
                dw = (sw as f64 * ratio).floor() as u32;
                dh = (sh as f64 * ratio).floor() as u32;
            }
            let mut out = blank_canvas();
            if dw == 0 || dh == 0 {
                return out;
            }
            let scaled = if (dw, dh) == (sw, sh) {
                source.clone()
            } else {
                imageops::resize(source, dw, dh, FilterType::Nearest)
            };
            let ox = (CANVAS_SIZE - dw) / 2;
            let oy = (CANVAS_SIZE - dh) / 2;
            imageops::replace(&mut out, &scaled, ox as i64, oy as i64);
            out
        }
    }
}

// ============================================================================
// LAYER SETTINGS
// ============================================================================

/// The three independently compiled layer categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Band {
    Background,
    Intersection,
    Overlay,
}

impl Band {
    pub fn all() -> [Band; 3] {
        [Band::Background, Band::Intersection, Band::Overlay]
    }

    /// Key used in session files and archive names.
    pub fn key(&self) -> &'static str {
        match self {
            Band::Background => "background",
            Band::Intersection => "intersection",
            Band::Overlay => "overlay",
        }
    }

    pub fn is_border(&self) -> bool {
        !matches!(self, Band::Background)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerKind {
    #[default]
    #[serde(rename = "upload")]
    Upload,
    #[serde(rename = "generate")]
    Generated,
}

/// Per-corner decoration mask for corner-aware border styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corners {
    pub tl: bool,
    pub tr: bool,
    pub bl: bool,
    pub br: bool,
}

impl Default for Corners {
    fn default() -> Self {
        Self { tl: true, tr: true, bl: true, br: true }
    }
}

/// Partial corner mask; absent flags keep their current value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornersPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bl: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub br: Option<bool>,
}

impl Corners {
    pub fn merge(&mut self, patch: &CornersPatch) {
        if let Some(v) = patch.tl {
            self.tl = v;
        }
        if let Some(v) = patch.tr {
            self.tr = v;
        }
        if let Some(v) = patch.bl {
            self.bl = v;
        }
        if let Some(v) = patch.br {
            self.br = v;
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundSettings {
    pub style: BackgroundStyle,
    pub color_count: u8,
    /// Only the first `color_count` entries are consulted; the rest are kept.
    pub manual_colors: Vec<String>,
}

impl Default for BackgroundSettings {
    fn default() -> Self {
        Self {
            style: BackgroundStyle::CellularNoise,
            color_count: 2,
            manual_colors: BACKGROUND_DEFAULT_COLORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BorderSettings {
    pub style: BorderStyle,
    pub color_count: u8,
    pub manual_colors: Vec<String>,
    pub width: u32,
    pub corners: Corners,
}

impl Default for BorderSettings {
    fn default() -> Self {
        Self {
            style: BorderStyle::Solid,
            color_count: 1,
            manual_colors: BORDER_DEFAULT_COLORS.iter().map(|s| s.to_string()).collect(),
            width: 3,
            corners: Corners::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerSettings {
    Background(BackgroundSettings),
    Border(BorderSettings),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackgroundPatch {
    pub style: Option<BackgroundStyle>,
    pub color_count: Option<u8>,
    pub manual_colors: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BorderPatch {
    pub style: Option<BorderStyle>,
    pub color_count: Option<u8>,
    pub manual_colors: Option<Vec<String>>,
    pub width: Option<u32>,
    pub corners: Option<CornersPatch>,
}

/// Partial settings override applied on top of a band's defaults.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsPatch {
    Background(BackgroundPatch),
    Border(BorderPatch),
}

fn clamp_count(n: u8) -> u8 {
    n.clamp(1, MAX_COLORS)
}

impl BackgroundSettings {
    pub fn merge(&mut self, patch: &BackgroundPatch) {
        if let Some(style) = patch.style {
            self.style = style;
        }
        if let Some(n) = patch.color_count {
            self.color_count = clamp_count(n);
        }
        if let Some(colors) = &patch.manual_colors {
            self.manual_colors = colors.clone();
        }
    }
}

impl BorderSettings {
    pub fn merge(&mut self, patch: &BorderPatch) {
        if let Some(style) = patch.style {
            self.style = style;
        }
        if let Some(n) = patch.color_count {
            self.color_count = clamp_count(n);
        }
        if let Some(colors) = &patch.manual_colors {
            self.manual_colors = colors.clone();
        }
        if let Some(w) = patch.width {
            self.width = w.clamp(MIN_BORDER_WIDTH, MAX_BORDER_WIDTH);
        }
        if let Some(corners) = &patch.corners {
            self.corners.merge(corners);
        }
    }
}

impl LayerSettings {
    pub fn default_for(band: Band) -> Self {
        if band.is_border() {
            LayerSettings::Border(BorderSettings::default())
        } else {
            LayerSettings::Background(BackgroundSettings::default())
        }
    }

    /// Returns `false` when the patch targets the other settings variant.
    pub fn merge(&mut self, patch: &SettingsPatch) -> bool {
        match (self, patch) {
            (LayerSettings::Background(s), SettingsPatch::Background(p)) => {
                s.merge(p);
                true
            }
            (LayerSettings::Border(s), SettingsPatch::Border(p)) => {
                s.merge(p);
                true
            }
            _ => false,
        }
    }

    pub fn color_count(&self) -> u8 {
        match self {
            LayerSettings::Background(s) => s.color_count,
            LayerSettings::Border(s) => s.color_count,
        }
    }

    pub fn manual_colors(&self) -> &[String] {
        match self {
            LayerSettings::Background(s) => &s.manual_colors,
            LayerSettings::Border(s) => &s.manual_colors,
        }
    }

    pub fn manual_colors_mut(&mut self) -> &mut Vec<String> {
        match self {
            LayerSettings::Background(s) => &mut s.manual_colors,
            LayerSettings::Border(s) => &mut s.manual_colors,
        }
    }

    /// The colours a generator actually receives. Never empty.
    pub fn resolve_colors(&self) -> Vec<Rgb> {
        let count = self.color_count() as usize;
        let colors: Vec<Rgb> = self
            .manual_colors()
            .iter()
            .take(count)
            .filter(|hex| !hex.is_empty())
            .map(|hex| hex_to_rgb(hex))
            .collect();
        if colors.is_empty() { vec![WHITE] } else { colors }
    }

    /// Render a fresh buffer from these settings.
    pub fn render(&self, rng: &mut SeededRng) -> RgbaImage {
        let colors = self.resolve_colors();
        match self {
            LayerSettings::Background(s) => generate_background(&colors, s.style, rng),
            LayerSettings::Border(s) => generate_border(&colors, s.width, s.style, rng, s.corners),
        }
    }
}

// ============================================================================
// LAYERS
// ============================================================================

#[derive(Clone, Debug)]
pub struct Layer {
    pub id: u32,
    pub kind: LayerKind,
    pub settings: LayerSettings,
    pub alpha: f32,
    pub pixels: Option<RgbaImage>,
}

/// Optional values applied over a band's defaults by [`LayerStack::add_layer`].
#[derive(Clone, Debug, Default)]
pub struct LayerOverrides {
    pub kind: Option<LayerKind>,
    pub alpha: Option<f32>,
    pub settings: Option<SettingsPatch>,
}

/// Ordered layers of one band. Index 0 is drawn first (bottommost).
#[derive(Clone, Debug)]
pub struct LayerStack {
    band: Band,
    layers: Vec<Layer>,
    next_id: u32,
    compiled: Option<RgbaImage>,
}

impl LayerStack {
    pub fn new(band: Band) -> Self {
        Self { band, layers: Vec::new(), next_id: 1, compiled: None }
    }

    pub fn band(&self) -> Band {
        self.band
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer(&self, id: u32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: u32) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    /// Flattened result of the last compile; `None` until the first one.
    pub fn compiled(&self) -> Option<&RgbaImage> {
        self.compiled.as_ref()
    }

    pub fn has_any_image(&self) -> bool {
        self.layers.iter().any(|l| l.pixels.is_some())
    }

    /// Append a layer on top of the draw order.
    pub fn add_layer(&mut self, overrides: LayerOverrides) -> &mut Layer {
        let id = self.next_id;
        self.next_id += 1;

        let mut settings = LayerSettings::default_for(self.band);
        if let Some(patch) = &overrides.settings {
            if !settings.merge(patch) {
                log::warn!("{} layer {id}: ignoring settings for the other band", self.band.key());
            }
        }

        log::debug!("{} layer {id} added", self.band.key());
        self.layers.push(Layer {
            id,
            kind: overrides.kind.unwrap_or_default(),
            settings,
            alpha: overrides.alpha.map_or(1.0, |a| a.clamp(0.0, 1.0)),
            pixels: None,
        });
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// Remove by id. Unknown ids are ignored.
    pub fn remove_layer(&mut self, id: u32) -> bool {
        let Some(idx) = self.layers.iter().position(|l| l.id == id) else {
            return false;
        };
        self.layers.remove(idx);
        log::debug!("{} layer {id} removed", self.band.key());
        self.recompile();
        true
    }

    /// Replace a layer's pixels (normalised to 64×64) and recompile.
    pub fn set_image(&mut self, id: u32, image: &RgbaImage) -> bool {
        let Some(layer) = self.layer_mut(id) else {
            return false;
        };
        layer.pixels = Some(normalize(image));
        self.recompile();
        true
    }

    pub fn set_alpha(&mut self, id: u32, alpha: f32) -> bool {
        let Some(layer) = self.layer_mut(id) else {
            return false;
        };
        layer.alpha = alpha.clamp(0.0, 1.0);
        self.recompile();
        true
    }

    pub fn set_kind(&mut self, id: u32, kind: LayerKind) -> bool {
        match self.layer_mut(id) {
            Some(layer) => {
                layer.kind = kind;
                true
            }
            None => false,
        }
    }

    /// Render the layer from its settings with a fresh seed and install the result.
    pub fn generate(&mut self, id: u32, seeds: &mut dyn SeedSource) -> bool {
        let Some(layer) = self.layer(id) else {
            return false;
        };
        let seed = seeds.next_seed();
        let pixels = layer.settings.render(&mut SeededRng::from_seed(&seed));
        log::debug!("{} layer {id} generated (seed {seed})", self.band.key());
        self.set_image(id, &pixels)
    }

    /// Drop every layer; ids restart at 1 and the compiled buffer is cleared.
    pub fn clear_all(&mut self) {
        self.layers.clear();
        self.next_id = 1;
        self.compiled = None;
    }

    /// Rebuild the compiled buffer from the layers in draw order.
    pub fn recompile(&mut self) {
        let mut out = blank_canvas();
        for layer in &self.layers {
            if let Some(pixels) = &layer.pixels {
                draw_over(&mut out, pixels, layer.alpha);
            }
        }
        log::debug!("{} stack recompiled ({} layers)", self.band.key(), self.layers.len());
        self.compiled = Some(out);
    }

    /// Flatten with every generated layer re-rendered from a new seed.
    ///
    /// Leaves the stack and its compiled buffer untouched.
    pub fn recompile_for_cycle(&self, seeds: &mut dyn SeedSource) -> RgbaImage {
        let mut out = blank_canvas();
        for layer in &self.layers {
            match layer.kind {
                LayerKind::Generated => {
                    let seed = seeds.next_seed();
                    log::debug!("{} layer {} cycled with seed {seed}", self.band.key(), layer.id);
                    let fresh = layer.settings.render(&mut SeededRng::from_seed(&seed));
                    draw_over(&mut out, &fresh, layer.alpha);
                }
                LayerKind::Upload => {
                    if let Some(pixels) = &layer.pixels {
                        draw_over(&mut out, pixels, layer.alpha);
                    }
                }
            }
        }
        out
    }
}

/// The three bands of a session.
#[derive(Clone, Debug)]
pub struct BandStacks {
    pub background: LayerStack,
    pub intersection: LayerStack,
    pub overlay: LayerStack,
}

impl BandStacks {
    pub fn empty() -> Self {
        Self {
            background: LayerStack::new(Band::Background),
            intersection: LayerStack::new(Band::Intersection),
            overlay: LayerStack::new(Band::Overlay),
        }
    }

    /// Startup state: one default layer per band, nothing compiled yet.
    pub fn with_default_layers() -> Self {
        let mut stacks = Self::empty();
        for band in Band::all() {
            stacks.get_mut(band).add_layer(LayerOverrides::default());
        }
        stacks
    }

    pub fn get(&self, band: Band) -> &LayerStack {
        match band {
            Band::Background => &self.background,
            Band::Intersection => &self.intersection,
            Band::Overlay => &self.overlay,
        }
    }

    pub fn get_mut(&mut self, band: Band) -> &mut LayerStack {
        match band {
            Band::Background => &mut self.background,
            Band::Intersection => &mut self.intersection,
            Band::Overlay => &mut self.overlay,
        }
    }

    /// Cumulative previews: background, then with the intersection, then
    /// with the overlay as well. Missing compiled buffers are skipped.
    pub fn previews(&self) -> [RgbaImage; 3] {
        let mut acc = blank_canvas();
        let mut add = |stack: &LayerStack| {
            if let Some(compiled) = stack.compiled() {
                draw_over(&mut acc, compiled, 1.0);
            }
            acc.clone()
        };
        [add(&self.background), add(&self.intersection), add(&self.overlay)]
    }

    pub fn buffers(&self) -> BandBuffers<'_> {
        BandBuffers {
            background: self.background.compiled(),
            intersection: self.intersection.compiled(),
            overlay: self.overlay.compiled(),
        }
    }
}
