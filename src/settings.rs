// ============================================================================
// EDITOR SETTINGS: persisted as a plain `key=value` config file
// ============================================================================

use std::path::{Path, PathBuf};

use crate::canvas::{AspectRatio, CanvasSize};
use crate::compositor::Interpolation;
use crate::error::SettingsError;
use crate::{log_err, log_warn};

#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Canvas shape applied when the first image arrives before any choice.
    pub default_aspect: AspectRatio,
    /// Resize frames that would make a side this small or smaller are dropped.
    pub min_layer_size: f32,
    /// Side of the square pointer hit box around each corner handle
    /// (display pixels, larger than the drawn handle).
    pub handle_hit_size: f32,
    /// Side of the drawn handle square (display pixels).
    pub handle_draw_size: f32,
    /// How far a duplicate is shifted from its source, on both axes.
    pub duplicate_offset: f32,
    /// Per-image shift for images added in one batch.
    pub cascade_offset: f32,
    /// Target resolution when normalizing a reference image.
    pub reference_size: CanvasSize,
    /// Resampling filter for flatten / normalize.
    pub resample_filter: Interpolation,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            default_aspect: AspectRatio::Square,
            min_layer_size: 10.0,
            handle_hit_size: 24.0,
            handle_draw_size: 10.0,
            duplicate_offset: 20.0,
            cascade_offset: 20.0,
            reference_size: AspectRatio::Square.size(),
            resample_filter: Interpolation::Bilinear,
        }
    }
}

impl EditorSettings {
    /// `~/.config/collage/collage_settings.cfg` and the platform equivalents.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("Collage").join("collage_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Collage")
                    .join("collage_settings.cfg"),
            );
        }
        #[allow(unreachable_code)]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("collage").join("collage_settings.cfg"))
        }
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        let Ok(content) = std::fs::read_to_string(&path) else { return Self::default() };
        Self::from_config_str(&content)
    }

    /// Load from an explicit file.  A missing or unreadable file is an error.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_config_str(&content))
    }

    /// Parse `key=value` lines.  Comments (`#`), blank lines, unknown keys
    /// and bad values are skipped; bad values keep their default.
    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else {
                log_warn!("settings: ignoring malformed line '{}'", line);
                continue;
            };
            match s.set(key.trim(), val.trim()) {
                Ok(true) => {}
                Ok(false) => {
                    log_warn!("settings: unknown key '{}'", key.trim());
                }
                Err(e) => {
                    log_warn!("settings: {}", e);
                }
            }
        }
        s
    }

    /// Apply one setting.  `Ok(false)` for keys this version doesn't know.
    pub fn set(&mut self, key: &str, val: &str) -> Result<bool, SettingsError> {
        let invalid = || SettingsError::InvalidValue { key: key.to_string(), value: val.to_string() };
        let positive = |v: &str| -> Result<f32, SettingsError> {
            v.parse::<f32>()
                .ok()
                .filter(|f| f.is_finite() && *f > 0.0)
                .ok_or_else(invalid)
        };
        match key {
            "default_aspect" => self.default_aspect = val.parse().map_err(|_| invalid())?,
            "min_layer_size" => self.min_layer_size = positive(val)?,
            "handle_hit_size" => self.handle_hit_size = positive(val)?,
            "handle_draw_size" => self.handle_draw_size = positive(val)?,
            "duplicate_offset" => {
                self.duplicate_offset = val.parse::<f32>().ok().filter(|f| f.is_finite()).ok_or_else(invalid)?
            }
            "cascade_offset" => {
                self.cascade_offset = val.parse::<f32>().ok().filter(|f| f.is_finite()).ok_or_else(invalid)?
            }
            "reference_size" => self.reference_size = val.parse().map_err(|_| invalid())?,
            "resample_filter" => {
                self.resample_filter = Interpolation::from_key(val).ok_or_else(invalid)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "default_aspect={}\n\
             min_layer_size={}\n\
             handle_hit_size={}\n\
             handle_draw_size={}\n\
             duplicate_offset={}\n\
             cascade_offset={}\n\
             reference_size={}\n\
             resample_filter={}\n",
            self.default_aspect.label(),
            self.min_layer_size,
            self.handle_hit_size,
            self.handle_draw_size,
            self.duplicate_offset,
            self.cascade_offset,
            self.reference_size,
            self.resample_filter.key(),
        )
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Save to the default location; failures are logged, not raised.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_err!("Failed to save settings to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let s = EditorSettings::from_config_str(
            "# editor\n\
             default_aspect=16:9\n\
             min_layer_size = 4\n\
             reference_size=512x256\n\
             resample_filter=lanczos3\n",
        );
        assert_eq!(s.default_aspect, AspectRatio::Landscape);
        assert_eq!(s.min_layer_size, 4.0);
        assert_eq!(s.reference_size, CanvasSize { width: 512, height: 256 });
        assert_eq!(s.resample_filter, Interpolation::Lanczos3);
        assert_eq!(s.handle_hit_size, EditorSettings::default().handle_hit_size);
    }

    #[test]
    fn bad_values_keep_defaults() {
        let s = EditorSettings::from_config_str("min_layer_size=-3\ndefault_aspect=7:5\nnonsense\nfuture_key=1\n");
        assert_eq!(s, EditorSettings::default());
    }

    #[test]
    fn skipped_lines_are_logged() {
        let log = std::env::temp_dir().join(format!("collage-log-{}.log", uuid::Uuid::new_v4()));
        crate::logger::init_at(&log);
        EditorSettings::from_config_str("future_key=1\nmin_layer_size=-3\n");
        let path = crate::logger::log_path().unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("[WARN] settings: unknown key 'future_key'"), "{text}");
        assert!(text.contains("min_layer_size"), "{text}");
    }

    #[test]
    fn set_reports_invalid_values() {
        let mut s = EditorSettings::default();
        assert!(matches!(s.set("handle_hit_size", "zero"), Err(SettingsError::InvalidValue { .. })));
        assert!(matches!(s.set("whatever", "1"), Ok(false)));
        assert!(matches!(s.set("duplicate_offset", "-12"), Ok(true)));
        assert_eq!(s.duplicate_offset, -12.0);
    }

    #[test]
    fn config_string_round_trips() {
        let mut s = EditorSettings::default();
        s.default_aspect = AspectRatio::Tall;
        s.cascade_offset = 32.5;
        s.resample_filter = Interpolation::Nearest;
        assert_eq!(EditorSettings::from_config_str(&s.to_config_string()), s);
    }

    #[test]
    fn save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("collage-settings-{}", uuid::Uuid::new_v4()));
        let path = dir.join("collage_settings.cfg");
        let mut s = EditorSettings::default();
        s.min_layer_size = 16.0;
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path).unwrap(), s);
        let _ = std::fs::remove_dir_all(&dir);
        assert!(EditorSettings::load_from(&path).is_err());
    }
}
