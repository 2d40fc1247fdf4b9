use std::path::{Path, PathBuf};

use log::LevelFilter;

use crate::canvas::Placement;

const SETTINGS_FILE: &str = "badgeforge_settings.cfg";
const DEFAULT_EXPORT_DELAY_MS: u64 = 100;
const DEFAULT_PREVIEW_SCALE: u32 = 4;
const MAX_PREVIEW_SCALE: u32 = 8;

/// Persistent preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Re-roll generated background layers for every processed image.
    pub cycle_backgrounds: bool,
    /// Placement assigned to newly queued source images.
    pub default_placement: Placement,
    /// Pause between files when exporting badges one by one.
    pub export_delay_ms: u64,
    /// Zoom factor of the slice selection preview (1..=8).
    pub preview_scale: u32,
    pub log_level: LevelFilter,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            cycle_backgrounds: false,
            default_placement: Placement::Resize,
            export_delay_ms: DEFAULT_EXPORT_DELAY_MS,
            preview_scale: DEFAULT_PREVIEW_SCALE,
            log_level: LevelFilter::Info,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/badgeforge/badgeforge_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\BadgeForge\badgeforge_settings.cfg
    /// On macOS:   ~/Library/Application Support/BadgeForge/badgeforge_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("badgeforge");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("BadgeForge").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("BadgeForge")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    pub fn to_cfg(&self) -> String {
        format!(
            "cycle_backgrounds={}\n\
             default_placement={}\n\
             export_delay_ms={}\n\
             preview_scale={}\n\
             log_level={}\n",
            self.cycle_backgrounds,
            self.default_placement.id(),
            self.export_delay_ms,
            self.preview_scale,
            self.log_level.as_str().to_ascii_lowercase(),
        )
    }

    /// Parse `key=value` lines. Unknown keys and bad values keep their defaults.
    pub fn from_cfg(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "cycle_backgrounds" => s.cycle_backgrounds = val == "true",
                "default_placement" => {
                    s.default_placement = Placement::from_id(val).unwrap_or_default();
                }
                "export_delay_ms" => {
                    s.export_delay_ms = val.parse().unwrap_or(DEFAULT_EXPORT_DELAY_MS);
                }
                "preview_scale" => {
                    s.preview_scale = val
                        .parse()
                        .ok()
                        .filter(|v| (1..=MAX_PREVIEW_SCALE).contains(v))
                        .unwrap_or(DEFAULT_PREVIEW_SCALE);
                }
                "log_level" => s.log_level = val.parse().unwrap_or(LevelFilter::Info),
                _ => {}
            }
        }
        s
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_cfg())
    }

    /// Missing or unreadable files yield the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_cfg(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save to the platform settings path. Failures are logged, not returned.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log::warn!("Could not save settings to {}: {e}", path.display());
        }
    }

    pub fn load() -> Self {
        Self::settings_path().map_or_else(Self::default, |p| Self::load_from(&p))
    }
}
