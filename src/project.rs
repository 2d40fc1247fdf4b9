use std::path::{Path, PathBuf};

use chrono::Utc;
use image::{ImageError, RgbaImage};
use uuid::Uuid;

use crate::canvas::{Band, BandStacks, LayerStack, Placement};
use crate::io::{self, SessionError};
use crate::ops::colors::{
    PaletteChoice, RandomSeeds, ReferencePalettes, Rgb, SeedSource, SeededRng, harmonious_colors, rgb_to_hex,
};
use crate::ops::composite::{BandBuffers, composite_sliced, composite_standard, slice_preview};
use crate::ops::slicing::{Slice, detect_slices};
use crate::settings::AppSettings;

const ARCHIVE_FOLDER: &str = "bordered_images";
const BASE_SUFFIX: &str = "_base";
const SLICES_SUFFIX: &str = "_slices_front";

/// One queued source image.
#[derive(Clone, Debug)]
pub struct SourceEntry {
    pub id: Uuid,
    /// Original file name, extension included.
    pub name: String,
    pub image: RgbaImage,
    pub mode: Placement,
    pub slicing: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub total: usize,
    pub with_slicing: usize,
    pub without_slicing: usize,
}

/// A finished badge.
#[derive(Clone, Debug)]
pub struct ProcessedBadge {
    pub name: String,
    /// `""`, `"_base"` or `"_slices_front"`.
    pub suffix: &'static str,
    pub label: String,
    pub image: RgbaImage,
}

impl ProcessedBadge {
    pub fn stem(&self) -> &str {
        file_stem(&self.name)
    }

    /// Download name of a single badge.
    pub fn file_name(&self) -> String {
        format!("processed_{}{}.png", self.stem(), self.suffix)
    }
}

/// Strip the last extension: `"a.b.png"` → `"a.b"`.
fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('/') => stem,
        _ => name,
    }
}

/// What a [`SliceSelector`] is asked to decide for one slicing image.
pub struct SliceRequest<'a> {
    /// Position among the slicing entries of the batch.
    pub index: usize,
    pub entry: &'a SourceEntry,
    pub slices: &'a [Slice],
    /// Suggested state; every slice starts checked.
    pub checked: Vec<bool>,
    pub bands: BandBuffers<'a>,
    /// Zoom factor for [`SliceRequest::preview`].
    pub preview_scale: u32,
}

impl SliceRequest<'_> {
    /// Upscaled composite with each slice tinted by its `checked` state.
    pub fn preview(&self, checked: &[bool]) -> RgbaImage {
        slice_preview(&self.entry.image, self.entry.mode, &self.bands, self.slices, checked, self.preview_scale)
    }
}

/// Chooses which slices are promoted in front of the intersection band.
///
/// Returning `None` cancels the whole batch.
pub trait SliceSelector {
    fn select(&mut self, request: &SliceRequest<'_>) -> Option<Vec<bool>>;
}

/// Accepts the suggested selection unchanged.
pub struct AcceptDefaults;

impl SliceSelector for AcceptDefaults {
    fn select(&mut self, request: &SliceRequest<'_>) -> Option<Vec<bool>> {
        Some(request.checked.clone())
    }
}

/// Files for one-by-one download, with the pause to leave between them.
#[derive(Debug)]
pub struct ExportPlan<'a> {
    pub delay_ms: u64,
    pub files: Vec<(String, &'a ProcessedBadge)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Number of badges produced.
    Completed(usize),
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("no source images are queued")]
    NothingQueued,
    #[error("the intersection band has no image")]
    NoIntersection,
}

/// Application context: layer stacks, palettes, queue and results.
pub struct Session {
    stacks: BandStacks,
    reference_image: Option<RgbaImage>,
    saved_palettes: Option<ReferencePalettes>,
    pub cycle_backgrounds: bool,
    /// Placement for sources queued through [`Session::add_source_default`].
    pub default_placement: Placement,
    pub export_delay_ms: u64,
    pub preview_scale: u32,
    queue: Vec<SourceEntry>,
    processed: Vec<ProcessedBadge>,
    seeds: Box<dyn SeedSource>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            stacks: BandStacks::with_default_layers(),
            reference_image: None,
            saved_palettes: None,
            cycle_backgrounds: false,
            default_placement: Placement::Resize,
            export_delay_ms: AppSettings::default().export_delay_ms,
            preview_scale: AppSettings::default().preview_scale,
            queue: Vec::new(),
            processed: Vec::new(),
            seeds: Box::new(RandomSeeds),
        }
    }

    pub fn with_settings(settings: &AppSettings) -> Self {
        Self {
            cycle_backgrounds: settings.cycle_backgrounds,
            default_placement: settings.default_placement,
            export_delay_ms: settings.export_delay_ms,
            preview_scale: settings.preview_scale,
            ..Self::new()
        }
    }

    /// Back to the startup state. The seed source and preferences are kept.
    pub fn reset(&mut self) {
        let seeds = std::mem::replace(&mut self.seeds, Box::new(RandomSeeds));
        *self = Self {
            seeds,
            default_placement: self.default_placement,
            export_delay_ms: self.export_delay_ms,
            preview_scale: self.preview_scale,
            ..Self::new()
        };
    }

    pub fn set_seed_source(&mut self, seeds: Box<dyn SeedSource>) {
        self.seeds = seeds;
    }

    pub fn stacks(&self) -> &BandStacks {
        &self.stacks
    }

    pub fn stacks_mut(&mut self) -> &mut BandStacks {
        &mut self.stacks
    }

    pub fn stack_mut(&mut self, band: Band) -> &mut LayerStack {
        self.stacks.get_mut(band)
    }

    /// Render a layer from its settings with the session's seed source.
    pub fn generate_layer(&mut self, band: Band, id: u32) -> bool {
        self.stacks.get_mut(band).generate(id, self.seeds.as_mut())
    }

    // -- Palettes -------------------------------------------------------------

    pub fn reference_image(&self) -> Option<&RgbaImage> {
        self.reference_image.as_ref()
    }

    /// Install a colour reference image. Saved palettes are discarded.
    pub fn set_reference_image(&mut self, image: RgbaImage) {
        self.reference_image = Some(image);
        self.saved_palettes = None;
    }

    pub fn clear_reference_image(&mut self) {
        self.reference_image = None;
    }

    /// Palettes from the reference image, else the ones restored from a session.
    pub fn palettes(&self) -> Option<ReferencePalettes> {
        match &self.reference_image {
            Some(img) => Some(ReferencePalettes::from_image(img)),
            None => self.saved_palettes.clone(),
        }
    }

    /// Copy a reference palette into a layer's manual colours.
    pub fn apply_palette(&mut self, band: Band, id: u32, choice: PaletteChoice) -> bool {
        let Some(palettes) = self.palettes() else {
            return false;
        };
        self.write_colors(band, id, palettes.get(choice))
    }

    /// Fill a layer's manual colours with a fresh harmonious set.
    pub fn randomize_colors(&mut self, band: Band, id: u32) -> bool {
        let Some(count) = self.stacks.get(band).layer(id).map(|l| l.settings.color_count()) else {
            return false;
        };
        let seed = self.seeds.next_seed();
        let colors = harmonious_colors(count as usize, &mut SeededRng::from_seed(&seed));
        self.write_colors(band, id, &colors)
    }

    fn write_colors(&mut self, band: Band, id: u32, colors: &[Rgb]) -> bool {
        let Some(layer) = self.stacks.get_mut(band).layer_mut(id) else {
            return false;
        };
        let manual = layer.settings.manual_colors_mut();
        for (i, &c) in colors.iter().take(3).enumerate() {
            let hex = rgb_to_hex(c);
            if i < manual.len() {
                manual[i] = hex;
            } else {
                manual.push(hex);
            }
        }
        true
    }

    // -- Queue ----------------------------------------------------------------

    pub fn queue(&self) -> &[SourceEntry] {
        &self.queue
    }

    /// Decode and queue an image file.
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        bytes: &[u8],
        mode: Placement,
        slicing: bool,
    ) -> Result<Uuid, ImageError> {
        let image = io::decode_image(bytes)?;
        Ok(self.add_source_image(name, image, mode, slicing))
    }

    /// [`Session::add_source`] with the session's default placement.
    pub fn add_source_default(
        &mut self,
        name: impl Into<String>,
        bytes: &[u8],
        slicing: bool,
    ) -> Result<Uuid, ImageError> {
        self.add_source(name, bytes, self.default_placement, slicing)
    }

    pub fn add_source_image(
        &mut self,
        name: impl Into<String>,
        image: RgbaImage,
        mode: Placement,
        slicing: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.queue.push(SourceEntry { id, name: name.into(), image, mode, slicing });
        id
    }

    pub fn remove_source(&mut self, id: Uuid) -> bool {
        let before = self.queue.len();
        self.queue.retain(|e| e.id != id);
        self.queue.len() != before
    }

    /// Empty one drop zone.
    pub fn clear_sources(&mut self, mode: Placement, slicing: bool) {
        self.queue.retain(|e| !(e.mode == mode && e.slicing == slicing));
    }

    pub fn queue_summary(&self) -> QueueSummary {
        let with_slicing = self.queue.iter().filter(|e| e.slicing).count();
        QueueSummary {
            total: self.queue.len(),
            with_slicing,
            without_slicing: self.queue.len() - with_slicing,
        }
    }

    pub fn can_process(&self) -> bool {
        !self.queue.is_empty() && self.stacks.intersection.has_any_image()
    }

    // -- Batch ----------------------------------------------------------------

    pub fn processed(&self) -> &[ProcessedBadge] {
        &self.processed
    }

    /// Composite every queued image.
    ///
    /// Slice selections are collected for all slicing entries first; a
    /// cancelled selection leaves the previous results in place.
    pub fn process(
        &mut self,
        selector: &mut dyn SliceSelector,
        mut progress: impl FnMut(Progress),
    ) -> Result<BatchOutcome, ProcessError> {
        if self.queue.is_empty() {
            return Err(ProcessError::NothingQueued);
        }
        if !self.stacks.intersection.has_any_image() {
            return Err(ProcessError::NoIntersection);
        }

        let intersection = self.stacks.intersection.compiled();
        let mut selections: Vec<Option<(Vec<Slice>, Vec<bool>)>> = Vec::with_capacity(self.queue.len());
        let mut slicing_index = 0;
        for entry in &self.queue {
            if !entry.slicing {
                selections.push(None);
                continue;
            }
            let slices = detect_slices(&entry.image, entry.mode, intersection);
            let request = SliceRequest {
                index: slicing_index,
                entry,
                slices: &slices,
                checked: vec![true; slices.len()],
                bands: self.stacks.buffers(),
                preview_scale: self.preview_scale,
            };
            slicing_index += 1;
            let Some(mut checked) = selector.select(&request) else {
                log::info!("Batch cancelled during slice selection ({})", entry.name);
                return Ok(BatchOutcome::Cancelled);
            };
            checked.resize(slices.len(), false);
            selections.push(Some((slices, checked)));
        }

        let total = self.queue.len();
        log::info!("Processing {total} image(s), cycle backgrounds: {}", self.cycle_backgrounds);

        let mut out = Vec::new();
        for (i, (entry, selection)) in self.queue.iter().zip(selections).enumerate() {
            let cycled = if self.cycle_backgrounds {
                Some(self.stacks.background.recompile_for_cycle(self.seeds.as_mut()))
            } else {
                None
            };
            let mut bands = self.stacks.buffers();
            if cycled.is_some() {
                bands.background = cycled.as_ref();
            }

            match selection {
                Some((slices, checked)) => {
                    out.push(ProcessedBadge {
                        name: entry.name.clone(),
                        suffix: BASE_SUFFIX,
                        label: "Base Badge".to_string(),
                        image: composite_standard(&entry.image, entry.mode, &bands),
                    });
                    let promoted: Vec<usize> = checked.iter().enumerate().filter(|(_, c)| **c).map(|(i, _)| i).collect();
                    if !promoted.is_empty() {
                        let numbers: Vec<String> = promoted.iter().map(|i| (i + 1).to_string()).collect();
                        out.push(ProcessedBadge {
                            name: entry.name.clone(),
                            suffix: SLICES_SUFFIX,
                            label: format!("Slices {} front", numbers.join(", ")),
                            image: composite_sliced(&entry.image, entry.mode, &slices, &promoted, &bands),
                        });
                    }
                }
                None => out.push(ProcessedBadge {
                    name: entry.name.clone(),
                    suffix: "",
                    label: format!("Image {}", i + 1),
                    image: composite_standard(&entry.image, entry.mode, &bands),
                }),
            }
            progress(Progress { done: i + 1, total });
        }

        log::info!("Batch complete: {} badge(s) from {total} image(s)", out.len());
        let count = out.len();
        self.processed = out;
        Ok(BatchOutcome::Completed(count))
    }

    // -- Export ---------------------------------------------------------------

    /// Badges grouped by file stem in first-seen order.
    fn grouped(&self) -> Vec<Vec<&ProcessedBadge>> {
        let mut groups: Vec<(&str, Vec<&ProcessedBadge>)> = Vec::new();
        for badge in &self.processed {
            match groups.iter_mut().find(|(stem, _)| *stem == badge.stem()) {
                Some((_, items)) => items.push(badge),
                None => groups.push((badge.stem(), vec![badge])),
            }
        }
        groups.into_iter().map(|(_, items)| items).collect()
    }

    /// `Badge{group}-{index}.png` names paired with their badges.
    pub fn individual_export_names(&self) -> Vec<(String, &ProcessedBadge)> {
        let mut names = Vec::with_capacity(self.processed.len());
        for (g, items) in self.grouped().into_iter().enumerate() {
            for (i, badge) in items.into_iter().enumerate() {
                names.push((format!("Badge{:03}-{:03}.png", g + 1, i), badge));
            }
        }
        names
    }

    /// Names for one-by-one export, paced by `export_delay_ms`.
    pub fn individual_export_plan(&self) -> ExportPlan<'_> {
        ExportPlan { delay_ms: self.export_delay_ms, files: self.individual_export_names() }
    }

    /// Paths and PNG bytes for the ZIP export.
    pub fn archive_entries(&self) -> Result<Vec<(String, Vec<u8>)>, ImageError> {
        let mut entries = Vec::with_capacity(self.processed.len() + 3);
        for items in self.grouped() {
            for badge in items {
                let path = format!("{ARCHIVE_FOLDER}/{}{}.png", badge.stem(), badge.suffix);
                entries.push((path, io::encode_png(&badge.image)?));
            }
        }
        for band in Band::all() {
            if let Some(compiled) = self.stacks.get(band).compiled() {
                let path = format!("{ARCHIVE_FOLDER}/compiled_{}.png", band.key());
                entries.push((path, io::encode_png(compiled)?));
            }
        }
        Ok(entries)
    }

    // -- Session files --------------------------------------------------------

    pub fn save_session(&self) -> Result<String, SessionError> {
        let palettes = self.palettes();
        let text = io::encode_session(&self.stacks, self.cycle_backgrounds, palettes.as_ref(), Utc::now())?;
        log::info!("Session saved ({} bytes)", text.len());
        Ok(text)
    }

    /// Replace the stacks and flags from a session document.
    ///
    /// Nothing changes unless the whole document decodes.
    pub fn load_session(&mut self, text: &str) -> Result<(), SessionError> {
        let restored = match io::decode_session(text, self.seeds.as_mut()) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Session load failed: {e}");
                return Err(e);
            }
        };
        self.stacks = restored.stacks;
        self.cycle_backgrounds = restored.cycle_backgrounds;
        if restored.palettes.is_some() {
            self.reference_image = None;
            self.saved_palettes = restored.palettes;
        }
        log::info!("Session restored (saved {})", restored.saved_at.to_rfc3339());
        Ok(())
    }

    /// Write the session into `dir` under a timestamped name.
    pub fn save_session_in(&self, dir: &Path) -> Result<PathBuf, SessionError> {
        let path = dir.join(io::session_file_name(Utc::now()));
        io::write_session_file(&path, &self.save_session()?)?;
        Ok(path)
    }

    pub fn load_session_from(&mut self, path: &Path) -> Result<(), SessionError> {
        let text = io::read_session_file(path)?;
        self.load_session(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CANVAS_SIZE, LayerKind};
    use crate::ops::colors::SeedSequence;
    use image::Rgba;

    /// Two-pixel-wide frame around the canvas; its ring is one slice.
    fn frame() -> RgbaImage {
        RgbaImage::from_fn(CANVAS_SIZE, CANVAS_SIZE, |x, y| {
            let edge = x < 2 || y < 2 || x >= CANVAS_SIZE - 2 || y >= CANVAS_SIZE - 2;
            Rgba(if edge { [255, 255, 255, 255] } else { [0, 0, 0, 0] })
        })
    }

    fn solid(rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba(rgba))
    }

    fn ready_session() -> Session {
        let mut session = Session::new();
        session.set_seed_source(Box::new(SeedSequence::new("test")));
        session.stacks_mut().intersection.set_image(1, &frame());
        session
    }

    struct Cancel;

    impl SliceSelector for Cancel {
        fn select(&mut self, _: &SliceRequest<'_>) -> Option<Vec<bool>> {
            None
        }
    }

    struct NoneChecked(usize);

    impl SliceSelector for NoneChecked {
        fn select(&mut self, request: &SliceRequest<'_>) -> Option<Vec<bool>> {
            self.0 += 1;
            Some(vec![false; request.slices.len()])
        }
    }

    #[test]
    fn starts_with_one_layer_per_band() {
        let session = Session::new();
        for band in Band::all() {
            assert_eq!(session.stacks().get(band).layers().len(), 1);
        }
        assert!(!session.can_process());
    }

    #[test]
    fn settings_seed_session_flags() {
        let settings = AppSettings {
            cycle_backgrounds: true,
            default_placement: Placement::Center,
            export_delay_ms: 40,
            preview_scale: 2,
            ..Default::default()
        };
        let mut session = Session::with_settings(&settings);
        assert!(session.cycle_backgrounds);
        assert_eq!(session.default_placement, Placement::Center);
        session.reset();
        assert_eq!((session.export_delay_ms, session.preview_scale), (40, 2));
    }

    #[test]
    fn default_placement_applies_to_unspecified_uploads() {
        let settings = AppSettings { default_placement: Placement::Center, ..Default::default() };
        let mut session = Session::with_settings(&settings);
        session.stacks_mut().intersection.set_image(1, &frame());
        let wide = io::encode_png(&RgbaImage::from_pixel(128, 64, Rgba([5, 6, 7, 255]))).unwrap();
        session.add_source_default("wide.png", &wide, false).unwrap();
        assert_eq!(session.queue()[0].mode, Placement::Center);

        session.process(&mut AcceptDefaults, |_| {}).unwrap();
        let badge = &session.processed()[0].image;
        // 128×64 letterboxes to rows 16..48.
        assert_eq!(badge.get_pixel(32, 32).0, [5, 6, 7, 255]);
        assert_eq!(badge.get_pixel(32, 10).0[3], 0);
    }

    /// Records the dimensions of the preview it renders.
    struct PreviewSize(Option<(u32, u32)>);

    impl SliceSelector for PreviewSize {
        fn select(&mut self, request: &SliceRequest<'_>) -> Option<Vec<bool>> {
            self.0 = Some(request.preview(&request.checked).dimensions());
            Some(request.checked.clone())
        }
    }

    #[test]
    fn slice_preview_uses_session_scale() {
        let mut session = ready_session();
        session.preview_scale = 3;
        session.add_source_image("a.png", solid([9, 9, 9, 255]), Placement::Resize, true);
        let mut selector = PreviewSize(None);
        session.process(&mut selector, |_| {}).unwrap();
        assert_eq!(selector.0, Some((192, 192)));
    }

    #[test]
    fn process_requires_queue_and_intersection() {
        let mut session = Session::new();
        assert!(matches!(session.process(&mut AcceptDefaults, |_| {}), Err(ProcessError::NothingQueued)));
        session.add_source_image("a.png", solid([1, 1, 1, 255]), Placement::Resize, false);
        assert!(matches!(session.process(&mut AcceptDefaults, |_| {}), Err(ProcessError::NoIntersection)));
        session.stacks_mut().intersection.set_image(1, &frame());
        assert!(session.can_process());
    }

    #[test]
    fn plain_and_sliced_outputs() {
        let mut session = ready_session();
        session.add_source_image("cat.png", solid([200, 0, 0, 255]), Placement::Resize, true);
        session.add_source_image("dog.jpg", solid([0, 0, 200, 255]), Placement::Resize, false);

        let mut reports = Vec::new();
        let outcome = session.process(&mut AcceptDefaults, |p| reports.push(p)).unwrap();
        assert_eq!(outcome, BatchOutcome::Completed(3));
        assert_eq!(reports, vec![Progress { done: 1, total: 2 }, Progress { done: 2, total: 2 }]);

        let out = session.processed();
        assert_eq!(out[0].suffix, "_base");
        assert_eq!(out[0].label, "Base Badge");
        assert_eq!(out[1].suffix, "_slices_front");
        assert_eq!(out[1].label, "Slices 1 front");
        assert_eq!(out[2].suffix, "");
        assert_eq!(out[2].label, "Image 2");
        assert_eq!(out[2].file_name(), "processed_dog.png");

        // Border covers the base badge; the promoted slice shows the source.
        assert_eq!(out[0].image.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(out[1].image.get_pixel(0, 0).0, [200, 0, 0, 255]);
    }

    #[test]
    fn unchecked_slices_give_only_the_base_badge() {
        let mut session = ready_session();
        session.add_source_image("a.png", solid([9, 9, 9, 255]), Placement::Resize, true);
        session.add_source_image("b.png", solid([9, 9, 9, 255]), Placement::Resize, true);
        let mut selector = NoneChecked(0);
        assert_eq!(session.process(&mut selector, |_| {}).unwrap(), BatchOutcome::Completed(2));
        assert_eq!(selector.0, 2);
        assert!(session.processed().iter().all(|b| b.suffix == "_base"));
    }

    #[test]
    fn cancel_keeps_previous_results() {
        let mut session = ready_session();
        session.add_source_image("a.png", solid([9, 9, 9, 255]), Placement::Resize, false);
        session.process(&mut AcceptDefaults, |_| {}).unwrap();
        assert_eq!(session.processed().len(), 1);

        session.add_source_image("b.png", solid([9, 9, 9, 255]), Placement::Resize, true);
        let mut calls = 0;
        let outcome = session.process(&mut Cancel, |_| calls += 1).unwrap();
        assert_eq!(outcome, BatchOutcome::Cancelled);
        assert_eq!(calls, 0);
        assert_eq!(session.processed().len(), 1);
    }

    #[test]
    fn cycling_regenerates_background_per_image() {
        let mut session = ready_session();
        session.stacks_mut().background.set_kind(1, LayerKind::Generated);
        session.generate_layer(Band::Background, 1);
        session.cycle_backgrounds = true;
        for name in ["a.png", "b.png", "c.png"] {
            session.add_source_image(name, RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE), Placement::Resize, false);
        }
        session.process(&mut AcceptDefaults, |_| {}).unwrap();
        let out = session.processed();
        assert!(out[0].image.as_raw() != out[1].image.as_raw() || out[1].image.as_raw() != out[2].image.as_raw());
        // Interiors are opaque background.
        assert!(out.iter().all(|b| b.image.get_pixel(32, 32).0[3] == 255));
    }

    #[test]
    fn queue_zones_and_summary() {
        let mut session = Session::new();
        let img = solid([0, 0, 0, 255]);
        session.add_source_image("a", img.clone(), Placement::Resize, true);
        session.add_source_image("b", img.clone(), Placement::Center, true);
        let c = session.add_source_image("c", img.clone(), Placement::Center, false);
        session.add_source_image("d", img, Placement::Resize, true);
        assert_eq!(session.queue_summary(), QueueSummary { total: 4, with_slicing: 3, without_slicing: 1 });

        session.clear_sources(Placement::Resize, true);
        let names: Vec<_> = session.queue().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
        assert!(session.remove_source(c));
        assert!(!session.remove_source(c));
    }

    #[test]
    fn add_source_rejects_garbage() {
        let mut session = Session::new();
        assert!(session.add_source("x.png", b"not an image", Placement::Resize, false).is_err());
        let png = io::encode_png(&solid([1, 2, 3, 255])).unwrap();
        session.add_source("x.png", &png, Placement::Resize, false).unwrap();
        assert_eq!(session.queue()[0].image.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn export_names_group_by_stem() {
        let mut session = ready_session();
        session.add_source_image("cat.png", solid([200, 0, 0, 255]), Placement::Resize, true);
        session.add_source_image("dog.png", solid([0, 0, 200, 255]), Placement::Resize, false);
        session.add_source_image("cat.jpg", solid([0, 200, 0, 255]), Placement::Resize, false);
        session.process(&mut AcceptDefaults, |_| {}).unwrap();

        session.export_delay_ms = 25;
        let plan = session.individual_export_plan();
        assert_eq!(plan.delay_ms, 25);
        let names: Vec<_> = plan.files.into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["Badge001-000.png", "Badge001-001.png", "Badge001-002.png", "Badge002-000.png"]
        );
    }

    #[test]
    fn archive_lists_badges_then_compiled_bands() {
        let mut session = ready_session();
        session.add_source_image("cat.png", solid([200, 0, 0, 255]), Placement::Resize, false);
        session.process(&mut AcceptDefaults, |_| {}).unwrap();

        let entries = session.archive_entries().unwrap();
        let paths: Vec<_> = entries.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, ["bordered_images/cat.png", "bordered_images/compiled_intersection.png"]);
        assert!(entries.iter().all(|(_, bytes)| bytes.starts_with(&[0x89, b'P', b'N', b'G'])));
    }

    #[test]
    fn palettes_prefer_reference_image() {
        let mut session = Session::new();
        assert!(session.palettes().is_none());
        assert!(!session.apply_palette(Band::Background, 1, PaletteChoice::Base));

        session.set_reference_image(solid([255, 0, 0, 255]));
        let palettes = session.palettes().unwrap();
        assert!(session.apply_palette(Band::Background, 1, PaletteChoice::Base));
        let layer = session.stacks().background.layer(1).unwrap();
        assert_eq!(layer.settings.manual_colors()[0], rgb_to_hex(palettes.base[0]));
    }

    #[test]
    fn randomize_writes_layer_color_count() {
        let mut session = Session::new();
        session.set_seed_source(Box::new(SeedSequence::new("r")));
        let before = session.stacks().intersection.layer(1).unwrap().settings.manual_colors().to_vec();
        assert!(session.randomize_colors(Band::Intersection, 1));
        let after = session.stacks().intersection.layer(1).unwrap().settings.manual_colors();
        // Border default uses one colour, so only the first entry changes.
        assert_eq!(&after[1..], &before[1..]);
        assert!(!session.randomize_colors(Band::Intersection, 99));
    }

    #[test]
    fn session_round_trip_restores_palettes_and_flag() {
        let mut session = ready_session();
        session.cycle_backgrounds = true;
        session.set_reference_image(solid([0, 0, 255, 255]));
        let text = session.save_session().unwrap();

        let mut restored = Session::new();
        restored.load_session(&text).unwrap();
        assert!(restored.cycle_backgrounds);
        assert!(restored.reference_image().is_none());
        assert_eq!(restored.palettes(), session.palettes());
        assert_eq!(
            restored.stacks().intersection.compiled().unwrap().as_raw(),
            session.stacks().intersection.compiled().unwrap().as_raw()
        );

        // A new reference image discards saved palettes.
        restored.set_reference_image(solid([255, 0, 0, 255]));
        assert_ne!(restored.palettes(), session.palettes());
    }

    #[test]
    fn failed_load_changes_nothing() {
        let mut session = ready_session();
        session.cycle_backgrounds = true;
        let err = session.load_session(r#"{"version": 1, "stacks": {}}"#).unwrap_err();
        assert!(matches!(&err, SessionError::VersionMismatch { found, expected: 2 } if found == "1"));
        assert!(session.cycle_backgrounds);
        assert!(session.stacks().intersection.has_any_image());
    }

    #[test]
    fn session_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let session = ready_session();
        let path = session.save_session_in(dir.path()).unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("badges-session-"));

        let mut restored = Session::new();
        restored.load_session_from(&path).unwrap();
        assert!(restored.stacks().intersection.has_any_image());
    }

    #[test]
    fn reset_returns_to_startup() {
        let mut session = ready_session();
        session.add_source_image("a.png", solid([1, 1, 1, 255]), Placement::Resize, false);
        session.cycle_backgrounds = true;
        session.reset();
        assert!(session.queue().is_empty());
        assert!(!session.cycle_backgrounds);
        assert!(!session.stacks().intersection.has_any_image());
    }

    #[test]
    fn stems_strip_one_extension() {
        assert_eq!(file_stem("a.b.png"), "a.b");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem("dir.v2/file"), "dir.v2/file");
    }
}
