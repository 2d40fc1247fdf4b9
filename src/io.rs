use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageError, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canvas::{
    Band, BandStacks, BackgroundPatch, BorderPatch, CornersPatch, Layer, LayerKind, LayerOverrides,
    LayerSettings, LayerStack, PIXEL_COUNT, SettingsPatch, normalize,
};
use crate::ops::backgrounds::BackgroundStyle;
use crate::ops::borders::BorderStyle;
use crate::ops::colors::{ReferencePalettes, SeedSource, SeededRng};

/// Session documents with any other version are rejected.
pub const SESSION_VERSION: u64 = 2;
/// Most distinct RGBA values an indexed layer can carry.
const MAX_PALETTE: usize = 256;
const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unsupported session version {found} (expected {expected})")]
    VersionMismatch { found: String, expected: u64 },
    #[error("Session document has no integer version field")]
    MissingVersion,
    #[error("Malformed session JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid session data: {0}")]
    InvalidFormat(String),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

/// Top-level session file.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub version: u64,
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub cycle_backgrounds: bool,
    #[serde(default)]
    pub color_ref_palettes: Option<ReferencePalettes>,
    pub stacks: StacksDocument,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StacksDocument {
    #[serde(default)]
    pub background: Vec<LayerDocument>,
    #[serde(default)]
    pub intersection: Vec<LayerDocument>,
    #[serde(default)]
    pub overlay: Vec<LayerDocument>,
}

impl StacksDocument {
    fn get(&self, band: Band) -> &[LayerDocument] {
        match band {
            Band::Background => &self.background,
            Band::Intersection => &self.intersection,
            Band::Overlay => &self.overlay,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LayerDocument {
    #[serde(rename = "type", default)]
    pub kind: LayerKind,
    #[serde(default)]
    pub settings: SettingsDocument,
    #[serde(rename = "imageData", default)]
    pub image_data: Option<ImageData>,
}

/// Layer settings as stored on disk. Every field is optional on read.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_count: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<CornersPatch>,
}

/// Pixel payload of one layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageData {
    /// Up to 256 `rrggbbaa` entries plus 4096 base64 byte indices.
    Indexed { palette: Vec<String>, pixels: String },
    /// PNG data URL, used when a layer has more than 256 colours.
    Fallback { fallback: String },
    /// Generated layer; pixels are re-rendered from settings on load.
    Regen { regen: bool },
}

// ============================================================================
// IMAGE INTAKE & EXPORT
// ============================================================================

/// Decode any supported image file into RGBA.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf).write_image(img.as_raw(), img.width(), img.height(), ColorType::Rgba8)?;
    Ok(buf.into_inner())
}

/// Default download name for a saved session, e.g. `badges-session-2024-05-01_13-45.json`.
pub fn session_file_name(at: DateTime<Utc>) -> String {
    format!("badges-session-{}.json", at.format("%Y-%m-%d_%H-%M"))
}

// ============================================================================
// PIXEL ENCODING
// ============================================================================

fn palette_key(p: Rgba<u8>) -> String {
    format!("{:02x}{:02x}{:02x}{:02x}", p[0], p[1], p[2], p[3])
}

fn parse_palette_entry(entry: &str) -> Result<Rgba<u8>, SessionError> {
    if entry.len() != 8 || !entry.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SessionError::InvalidFormat(format!("palette entry '{entry}' is not rrggbbaa")));
    }
    let mut px = [0u8; 4];
    for (i, c) in px.iter_mut().enumerate() {
        *c = u8::from_str_radix(&entry[i * 2..i * 2 + 2], 16)
            .map_err(|e| SessionError::InvalidFormat(format!("palette entry '{entry}': {e}")))?;
    }
    Ok(Rgba(px))
}

/// Encode a buffer as palette indices, or as a PNG data URL when it has
/// more than 256 distinct colours.
pub fn encode_pixels(img: &RgbaImage) -> Result<ImageData, SessionError> {
    let img = normalize(img);
    let mut lookup: HashMap<[u8; 4], u8> = HashMap::new();
    let mut palette = Vec::new();
    let mut indices = Vec::with_capacity(PIXEL_COUNT);

    for p in img.pixels() {
        let index = match lookup.get(&p.0) {
            Some(&i) => i,
            None => {
                if palette.len() >= MAX_PALETTE {
                    log::info!("Layer exceeds {MAX_PALETTE} colours, storing as PNG");
                    return Ok(ImageData::Fallback { fallback: png_data_url(&img)? });
                }
                let i = palette.len() as u8;
                lookup.insert(p.0, i);
                palette.push(palette_key(*p));
                i
            }
        };
        indices.push(index);
    }

    Ok(ImageData::Indexed { palette, pixels: STANDARD.encode(&indices) })
}

/// Decode stored pixels. `Regen` markers carry no pixels and yield `None`.
pub fn decode_pixels(data: &ImageData) -> Result<Option<RgbaImage>, SessionError> {
    match data {
        ImageData::Indexed { palette, pixels } => decode_indexed(palette, pixels).map(Some),
        ImageData::Fallback { fallback } => decode_data_url(fallback).map(Some),
        ImageData::Regen { .. } => Ok(None),
    }
}

fn decode_indexed(palette: &[String], pixels: &str) -> Result<RgbaImage, SessionError> {
    let colors = palette.iter().map(|e| parse_palette_entry(e)).collect::<Result<Vec<_>, _>>()?;
    let indices = STANDARD
        .decode(pixels)
        .map_err(|e| SessionError::InvalidFormat(format!("pixel indices: {e}")))?;
    if indices.len() != PIXEL_COUNT {
        return Err(SessionError::InvalidFormat(format!(
            "expected {PIXEL_COUNT} pixel indices, found {}",
            indices.len()
        )));
    }

    let mut img = crate::canvas::blank_canvas();
    for (px, &i) in img.pixels_mut().zip(&indices) {
        *px = *colors.get(i as usize).ok_or_else(|| {
            SessionError::InvalidFormat(format!("pixel index {i} outside palette of {}", colors.len()))
        })?;
    }
    Ok(img)
}

fn png_data_url(img: &RgbaImage) -> Result<String, SessionError> {
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(encode_png(img)?)))
}

fn decode_data_url(url: &str) -> Result<RgbaImage, SessionError> {
    let Some((_, payload)) = url.split_once("base64,") else {
        return Err(SessionError::InvalidFormat("fallback is not a base64 data URL".into()));
    };
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| SessionError::InvalidFormat(format!("fallback payload: {e}")))?;
    Ok(normalize(&decode_image(&bytes)?))
}

// ============================================================================
// SESSION ENCODE / DECODE
// ============================================================================

/// Everything a session file restores, built fully before anything is applied.
#[derive(Debug)]
pub struct RestoredSession {
    pub saved_at: DateTime<Utc>,
    pub cycle_backgrounds: bool,
    pub palettes: Option<ReferencePalettes>,
    pub stacks: BandStacks,
}

fn settings_document(layer: &Layer) -> SettingsDocument {
    match &layer.settings {
        LayerSettings::Background(s) => SettingsDocument {
            style: Some(s.style.id().to_string()),
            color_count: Some(s.color_count),
            manual_colors: Some(s.manual_colors.clone()),
            alpha: Some(layer.alpha),
            width: None,
            corners: None,
        },
        LayerSettings::Border(s) => SettingsDocument {
            style: Some(s.style.id().to_string()),
            color_count: Some(s.color_count),
            manual_colors: Some(s.manual_colors.clone()),
            alpha: Some(layer.alpha),
            width: Some(s.width),
            corners: Some(CornersPatch {
                tl: Some(s.corners.tl),
                tr: Some(s.corners.tr),
                bl: Some(s.corners.bl),
                br: Some(s.corners.br),
            }),
        },
    }
}

fn encode_stack(stack: &LayerStack) -> Result<Vec<LayerDocument>, SessionError> {
    stack
        .layers()
        .iter()
        .map(|layer| {
            let image_data = match (layer.kind, &layer.pixels) {
                (LayerKind::Generated, _) => Some(ImageData::Regen { regen: true }),
                (LayerKind::Upload, Some(pixels)) => Some(encode_pixels(pixels)?),
                (LayerKind::Upload, None) => None,
            };
            Ok(LayerDocument { kind: layer.kind, settings: settings_document(layer), image_data })
        })
        .collect()
}

/// Serialize the three stacks and session flags to JSON text.
pub fn encode_session(
    stacks: &BandStacks,
    cycle_backgrounds: bool,
    palettes: Option<&ReferencePalettes>,
    saved_at: DateTime<Utc>,
) -> Result<String, SessionError> {
    let doc = SessionDocument {
        version: SESSION_VERSION,
        saved_at,
        cycle_backgrounds,
        color_ref_palettes: palettes.cloned(),
        stacks: StacksDocument {
            background: encode_stack(&stacks.background)?,
            intersection: encode_stack(&stacks.intersection)?,
            overlay: encode_stack(&stacks.overlay)?,
        },
    };
    Ok(serde_json::to_string(&doc)?)
}

fn settings_patch(band: Band, doc: &SettingsDocument) -> Result<SettingsPatch, SessionError> {
    let unknown = |id: &str| SessionError::InvalidFormat(format!("unknown {} style '{id}'", band.key()));
    if band.is_border() {
        let style = doc
            .style
            .as_deref()
            .map(|id| BorderStyle::from_id(id).ok_or_else(|| unknown(id)))
            .transpose()?;
        Ok(SettingsPatch::Border(BorderPatch {
            style,
            color_count: doc.color_count,
            manual_colors: doc.manual_colors.clone(),
            width: doc.width,
            corners: doc.corners,
        }))
    } else {
        let style = doc
            .style
            .as_deref()
            .map(|id| BackgroundStyle::from_id(id).ok_or_else(|| unknown(id)))
            .transpose()?;
        Ok(SettingsPatch::Background(BackgroundPatch {
            style,
            color_count: doc.color_count,
            manual_colors: doc.manual_colors.clone(),
        }))
    }
}

/// Decoded stack plus the ids of layers still waiting to be re-rendered.
fn decode_stack(band: Band, docs: &[LayerDocument]) -> Result<(LayerStack, Vec<u32>), SessionError> {
    let mut stack = LayerStack::new(band);
    let mut pending = Vec::new();
    for doc in docs {
        let overrides = LayerOverrides {
            kind: Some(doc.kind),
            alpha: doc.settings.alpha,
            settings: Some(settings_patch(band, &doc.settings)?),
        };
        let layer = stack.add_layer(overrides);
        layer.pixels = match &doc.image_data {
            None | Some(ImageData::Regen { regen: false }) => None,
            Some(ImageData::Regen { regen: true }) => {
                pending.push(layer.id);
                None
            }
            Some(data) => decode_pixels(data)?,
        };
    }
    Ok((stack, pending))
}

/// Render the pending layers from fresh seeds, then compile.
fn finish_stack(mut stack: LayerStack, pending: &[u32], seeds: &mut dyn SeedSource) -> LayerStack {
    for &id in pending {
        if let Some(layer) = stack.layer_mut(id) {
            layer.pixels = Some(layer.settings.render(&mut SeededRng::from_seed(&seeds.next_seed())));
        }
    }
    stack.recompile();
    stack
}

/// Read the `version` field. Any number other than [`SESSION_VERSION`] is a
/// mismatch; a missing or non-numeric field is [`SessionError::MissingVersion`].
fn check_version(value: &Value) -> Result<(), SessionError> {
    let version = value.get("version").filter(|v| v.is_number()).ok_or(SessionError::MissingVersion)?;
    if version.as_u64() == Some(SESSION_VERSION) {
        return Ok(());
    }
    log::warn!("Rejecting session version {version} (expected {SESSION_VERSION})");
    Err(SessionError::VersionMismatch { found: version.to_string(), expected: SESSION_VERSION })
}

/// Parse a session document. Fails without side effects on any error.
///
/// The version is checked before the rest of the document is interpreted,
/// and no seed is drawn until every stack has decoded.
pub fn decode_session(text: &str, seeds: &mut dyn SeedSource) -> Result<RestoredSession, SessionError> {
    let value: Value = serde_json::from_str(text)?;
    check_version(&value)?;

    let doc: SessionDocument = serde_json::from_value(value)?;
    let (background, bg_pending) = decode_stack(Band::Background, doc.stacks.get(Band::Background))?;
    let (intersection, int_pending) = decode_stack(Band::Intersection, doc.stacks.get(Band::Intersection))?;
    let (overlay, ov_pending) = decode_stack(Band::Overlay, doc.stacks.get(Band::Overlay))?;

    let stacks = BandStacks {
        background: finish_stack(background, &bg_pending, seeds),
        intersection: finish_stack(intersection, &int_pending, seeds),
        overlay: finish_stack(overlay, &ov_pending, seeds),
    };

    Ok(RestoredSession {
        saved_at: doc.saved_at,
        cycle_backgrounds: doc.cycle_backgrounds,
        palettes: doc.color_ref_palettes,
        stacks,
    })
}

pub fn write_session_file(path: &Path, text: &str) -> Result<(), SessionError> {
    std::fs::write(path, text)?;
    Ok(())
}

pub fn read_session_file(path: &Path) -> Result<String, SessionError> {
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{BorderSettings, CANVAS_SIZE, Corners};
    use crate::ops::colors::SeedSequence;

    fn checker(a: [u8; 4], b: [u8; 4]) -> RgbaImage {
        RgbaImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |x, y| Rgba(if (x + y) % 2 == 0 { a } else { b }))
    }

    fn gradient() -> RgbaImage {
        RgbaImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 7, 255]))
    }

    fn seeds() -> SeedSequence {
        SeedSequence::new("io")
    }

    #[test]
    fn indexed_round_trip_is_exact() {
        let img = checker([1, 2, 3, 4], [250, 0, 9, 255]);
        let data = encode_pixels(&img).unwrap();
        let ImageData::Indexed { palette, .. } = &data else {
            panic!("two colours must index");
        };
        assert_eq!(palette, &["01020304", "fa0009ff"]);
        assert_eq!(decode_pixels(&data).unwrap().unwrap().as_raw(), img.as_raw());
    }

    /// Random buffer drawing every pixel from `colours` random RGBA values.
    fn random_buffer(rng: &mut SeededRng, colours: usize) -> RgbaImage {
        let mut channel = || (rng.next_f64() * 256.0) as u8;
        let palette: Vec<[u8; 4]> = (0..colours).map(|_| [channel(), channel(), channel(), channel()]).collect();
        RgbaImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |_, _| {
            Rgba(palette[(rng.next_f64() * colours as f64) as usize])
        })
    }

    #[test]
    fn random_buffers_survive_both_encodings() {
        let mut rng = SeededRng::from_seed("pixel-codec");
        for round in 0..12 {
            let colours = [1, 2, 17, 200, 256, 4096][round % 6];
            let img = random_buffer(&mut rng, colours);
            let data = encode_pixels(&img).unwrap();
            match &data {
                ImageData::Indexed { palette, .. } => assert!(colours <= 256 && palette.len() <= 256),
                ImageData::Fallback { .. } => assert!(colours > 256, "round {round} fell back"),
                ImageData::Regen { .. } => panic!("pixels never encode as regen"),
            }
            assert_eq!(decode_pixels(&data).unwrap().unwrap().as_raw(), img.as_raw(), "round {round}");
        }
    }

    #[test]
    fn many_colours_fall_back_to_png() {
        let img = gradient();
        let data = encode_pixels(&img).unwrap();
        let ImageData::Fallback { fallback } = &data else {
            panic!("4096 colours cannot index");
        };
        assert!(fallback.starts_with(PNG_DATA_URL_PREFIX));
        assert_eq!(decode_pixels(&data).unwrap().unwrap().as_raw(), img.as_raw());
    }

    #[test]
    fn exactly_256_colours_still_index() {
        let img = RgbaImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |x, y| {
            let i = ((y * CANVAS_SIZE + x) % 256) as u8;
            Rgba([i, 0, 0, 255])
        });
        assert!(matches!(encode_pixels(&img).unwrap(), ImageData::Indexed { .. }));
    }

    #[test]
    fn index_outside_palette_is_rejected() {
        let data = ImageData::Indexed {
            palette: vec!["000000ff".into()],
            pixels: STANDARD.encode([1u8; PIXEL_COUNT]),
        };
        assert!(matches!(decode_pixels(&data), Err(SessionError::InvalidFormat(_))));
    }

    #[test]
    fn short_pixel_payload_is_rejected() {
        let data = ImageData::Indexed { palette: vec!["000000ff".into()], pixels: STANDARD.encode([0u8; 100]) };
        assert!(matches!(decode_pixels(&data), Err(SessionError::InvalidFormat(_))));
    }

    #[test]
    fn malformed_palette_entry_is_rejected() {
        let data = ImageData::Indexed { palette: vec!["#00000".into()], pixels: STANDARD.encode([0u8; PIXEL_COUNT]) };
        assert!(matches!(decode_pixels(&data), Err(SessionError::InvalidFormat(_))));
    }

    #[test]
    fn image_data_wire_shapes() {
        let regen: ImageData = serde_json::from_str(r#"{"regen":true}"#).unwrap();
        assert_eq!(regen, ImageData::Regen { regen: true });
        let fallback: ImageData = serde_json::from_str(r#"{"fallback":"data:x"}"#).unwrap();
        assert_eq!(fallback, ImageData::Fallback { fallback: "data:x".into() });
        let doc: LayerDocument = serde_json::from_str(r#"{"type":"upload","settings":{},"imageData":null}"#).unwrap();
        assert!(doc.image_data.is_none());
    }

    #[test]
    fn previous_version_is_rejected() {
        let text = r#"{"version":1,"stacks":{}}"#;
        let err = decode_session(text, &mut seeds()).unwrap_err();
        assert!(matches!(&err, SessionError::VersionMismatch { found, expected: 2 } if found == "1"));
        assert_eq!(err.to_string(), "Unsupported session version 1 (expected 2)");
    }

    #[test]
    fn fractional_and_negative_versions_are_mismatches() {
        for (text, shown) in [(r#"{"version":1.5,"stacks":{}}"#, "1.5"), (r#"{"version":-1,"stacks":{}}"#, "-1")] {
            let err = decode_session(text, &mut seeds()).unwrap_err();
            assert!(matches!(&err, SessionError::VersionMismatch { found, expected: 2 } if found == shown), "{err}");
        }
    }

    #[test]
    fn failed_load_draws_no_seeds() {
        let text = r#"{"version":2,"stacks":{
            "background":[{"type":"generate","settings":{"style":"bg3"},"imageData":{"regen":true}}],
            "overlay":[{"type":"upload","settings":{"style":"nope"},"imageData":null}]}}"#;
        let mut sequence = seeds();
        assert!(decode_session(text, &mut sequence).is_err());
        assert_eq!(sequence.next_seed(), seeds().next_seed());
    }

    #[test]
    fn missing_version_is_rejected() {
        let err = decode_session(r#"{"stacks":{}}"#, &mut seeds()).unwrap_err();
        assert!(matches!(err, SessionError::MissingVersion));
        let err = decode_session(r#"{"version":"2","stacks":{}}"#, &mut seeds()).unwrap_err();
        assert!(matches!(err, SessionError::MissingVersion));
    }

    #[test]
    fn unknown_style_fails_the_whole_load() {
        let text = r#"{"version":2,"stacks":{"background":[{"type":"upload","settings":{"style":"bg99"},"imageData":null}]}}"#;
        assert!(matches!(decode_session(text, &mut seeds()), Err(SessionError::InvalidFormat(_))));
    }

    #[test]
    fn partial_corners_merge_over_defaults() {
        let text = r#"{"version":2,"stacks":{"intersection":[
            {"type":"upload","settings":{"style":"px-open","width":4,"corners":{"bl":false}},"imageData":null}]}}"#;
        let restored = decode_session(text, &mut seeds()).unwrap();
        let layer = &restored.stacks.intersection.layers()[0];
        let LayerSettings::Border(s) = &layer.settings else {
            panic!("intersection layers hold border settings");
        };
        assert_eq!(s.style, BorderStyle::PxOpen);
        assert_eq!(s.corners, Corners { tl: true, tr: true, bl: false, br: true });
        assert_eq!(s.manual_colors, BorderSettings::default().manual_colors);
    }

    #[test]
    fn session_round_trip() {
        let mut stacks = BandStacks::empty();
        let up = stacks.background.add_layer(LayerOverrides { alpha: Some(0.5), ..Default::default() }).id;
        stacks.background.set_image(up, &checker([9, 9, 9, 255], [0, 0, 0, 0]));
        stacks.overlay.add_layer(LayerOverrides { kind: Some(LayerKind::Generated), ..Default::default() });
        stacks.intersection.add_layer(LayerOverrides {
            settings: Some(SettingsPatch::Border(BorderPatch {
                width: Some(5),
                corners: Some(CornersPatch { tr: Some(false), ..Default::default() }),
                ..Default::default()
            })),
            ..Default::default()
        });
        let palettes = ReferencePalettes { base: vec![[1, 2, 3]], cool: vec![[4, 5, 6]], warm: vec![[7, 8, 9]] };

        let text = encode_session(&stacks, true, Some(&palettes), Utc::now()).unwrap();
        let json: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["version"], 2);
        assert_eq!(json["stacks"]["overlay"][0]["imageData"], serde_json::json!({"regen": true}));
        assert_eq!(json["stacks"]["intersection"][0]["imageData"], Value::Null);
        assert_eq!(json["stacks"]["intersection"][0]["settings"]["corners"]["tr"], false);

        let restored = decode_session(&text, &mut seeds()).unwrap();
        assert!(restored.cycle_backgrounds);
        assert_eq!(restored.palettes, Some(palettes));

        let bg = &restored.stacks.background.layers()[0];
        assert_eq!(bg.alpha, 0.5);
        assert_eq!(
            bg.pixels.as_ref().unwrap().as_raw(),
            stacks.background.layers()[0].pixels.as_ref().unwrap().as_raw()
        );
        let overlay = &restored.stacks.overlay.layers()[0];
        assert_eq!(overlay.kind, LayerKind::Generated);
        assert!(overlay.pixels.is_some());
        assert_eq!(
            restored.stacks.intersection.layers()[0].settings,
            stacks.intersection.layers()[0].settings
        );
        assert!(restored.stacks.background.compiled().is_some());
    }

    #[test]
    fn session_file_name_uses_minutes() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T13:45:59Z").unwrap().with_timezone(&Utc);
        assert_eq!(session_file_name(at), "badges-session-2024-05-01_13-45.json");
    }

    #[test]
    fn session_files_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        write_session_file(&path, "{}").unwrap();
        assert_eq!(read_session_file(&path).unwrap(), "{}");
    }
}
