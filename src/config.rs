//! Sheet configuration module.
//!
//! Handles loading, validating, and merging `proxy-sheet.toml`. Configuration
//! is layered: stock defaults, then the config file, then command-line flags.
//! Each layer only needs the keys it wants to override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! page_size = [210.0, 297.0]  # Paper width, height in mm (A4)
//! card_size = [62.0, 87.0]    # Card width, height in mm
//! resolution = 300            # Dots per inch of the rendered pages
//!
//! [processing]
//! max_processes = 4           # Max parallel workers (omit for auto = CPU cores)
//!
//! [output]
//! compression = 6             # zlib level for page streams (0-10)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::GeometrySpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "proxy-sheet.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Sheet configuration loaded from `proxy-sheet.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    /// Paper `[width, height]` in millimetres.
    pub page_size: [f64; 2],
    /// Card `[width, height]` in millimetres.
    pub card_size: [f64; 2],
    /// Dots per inch.
    pub resolution: u32,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
}

impl Default for SheetConfig {
    fn default() -> Self {
        let geometry = GeometrySpec::default();
        Self {
            page_size: [geometry.page_width_mm, geometry.page_height_mm],
            card_size: [geometry.card_width_mm, geometry.card_height_mm],
            resolution: geometry.dpi,
            processing: ProcessingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl SheetConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, [w, h]) in [("page_size", self.page_size), ("card_size", self.card_size)] {
            if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{name} values must be positive, got [{w}, {h}]"
                )));
            }
        }
        if self.resolution == 0 {
            return Err(ConfigError::Validation(
                "resolution must be positive".into(),
            ));
        }
        let geometry = self.to_geometry().resolve();
        if geometry.is_degenerate() {
            return Err(ConfigError::Validation(format!(
                "page {}x{} px and card {}x{} px must each be at least 1 px at {} dpi",
                geometry.page_width,
                geometry.page_height,
                geometry.card_width,
                geometry.card_height,
                self.resolution
            )));
        }
        if self.output.compression > 10 {
            return Err(ConfigError::Validation(
                "output.compression must be 0-10".into(),
            ));
        }
        Ok(())
    }

    pub fn to_geometry(&self) -> GeometrySpec {
        GeometrySpec {
            page_width_mm: self.page_size[0],
            page_height_mm: self.page_size[1],
            card_width_mm: self.card_size[0],
            card_height_mm: self.card_size[1],
            dpi: self.resolution,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Document output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// zlib level for embedded page images, 0 (store) to 10 (smallest).
    pub compression: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { compression: 6 }
    }
}

/// Values given on the command line, highest precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub page_size: Option<[f64; 2]>,
    pub card_size: Option<[f64; 2]>,
    pub resolution: Option<u32>,
}

impl Overrides {
    /// Sparse TOML table holding only the flags that were set.
    pub fn to_toml(&self) -> toml::Value {
        let mut table = toml::Table::new();
        let size = |[w, h]: [f64; 2]| toml::Value::Array(vec![w.into(), h.into()]);
        if let Some(s) = self.page_size {
            table.insert("page_size".into(), size(s));
        }
        if let Some(s) = self.card_size {
            table.insert("card_size".into(), size(s));
        }
        if let Some(dpi) = self.resolution {
            table.insert("resolution".into(), toml::Value::Integer(dpi.into()));
        }
        toml::Value::Table(table)
    }
}

/// Parse a `WIDTHxHEIGHT` millimetre pair such as `63x88` or `63.5x88.9`.
pub fn parse_size(text: &str) -> Result<[f64; 2], String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{text}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a number of millimetres", s.trim()))
    };
    Ok([parse(w)?, parse(h)?])
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer that file and flag overrides merge onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(SheetConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn read_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Like [`read_raw_config`], but a missing file is `Ok(None)`.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    read_raw_config(path).map(Some)
}

/// Merge the overlays onto a base value in order, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<SheetConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let config: SheetConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective configuration.
///
/// An explicit `path` must exist. Without one, `proxy-sheet.toml` in the
/// working directory is used when present. Flag overrides apply last.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<SheetConfig, ConfigError> {
    let file = match path {
        Some(p) => Some(read_raw_config(p)?),
        None => load_raw_config(Path::new(CONFIG_FILE_NAME))?,
    };
    resolve_config(
        stock_defaults_value()?,
        file.into_iter().chain([overrides.to_toml()]),
    )
}

/// Returns a fully-commented stock `proxy-sheet.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# proxy-sheet configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# The file is read from ./proxy-sheet.toml, or from the path given with
# --config. Command-line flags (--page-size, --card-size, --dpi) override it.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Geometry
# ---------------------------------------------------------------------------
# Paper [width, height] in millimetres. A4 is [210, 297], US Letter is
# [215.9, 279.4].
page_size = [210.0, 297.0]

# Card [width, height] in millimetres. Cards are placed 3x3, edge to edge,
# centered on the page.
card_size = [62.0, 87.0]

# Dots per inch. Cards are resampled to exactly this resolution.
resolution = 300

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel page-compression workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Output
# ---------------------------------------------------------------------------
[output]
# zlib level for page images: 0 = store, 6 = balanced, 10 = smallest file.
compression = 6
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_a4_poker_300dpi() {
        let config = SheetConfig::default();
        assert_eq!(config.page_size, [210.0, 297.0]);
        assert_eq!(config.card_size, [62.0, 87.0]);
        assert_eq!(config.resolution, 300);
        assert_eq!(config.output.compression, 6);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn to_geometry_maps_fields() {
        let config = SheetConfig {
            page_size: [215.9, 279.4],
            card_size: [63.0, 88.0],
            resolution: 600,
            ..SheetConfig::default()
        };
        let g = config.to_geometry();
        assert_eq!(g.page_width_mm, 215.9);
        assert_eq!(g.page_height_mm, 279.4);
        assert_eq!(g.card_width_mm, 63.0);
        assert_eq!(g.card_height_mm, 88.0);
        assert_eq!(g.dpi, 600);
    }

    #[test]
    fn parse_partial_config() {
        let config: SheetConfig = toml::from_str("resolution = 600").unwrap();
        assert_eq!(config.resolution, 600);
        assert_eq!(config.page_size, [210.0, 297.0]);
    }

    #[test]
    fn integer_sizes_are_accepted() {
        let config: SheetConfig = toml::from_str("card_size = [63, 88]").unwrap();
        assert_eq!(config.card_size, [63.0, 88.0]);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_reads_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sheet.toml");
        fs::write(
            &path,
            r#"
page_size = [215.9, 279.4]

[output]
compression = 9
"#,
        )
        .unwrap();

        let config = load_config(Some(&path), &Overrides::default()).unwrap();
        assert_eq!(config.page_size, [215.9, 279.4]);
        assert_eq!(config.output.compression, 9);
        // Unspecified values should be defaults
        assert_eq!(config.card_size, [62.0, 87.0]);
        assert_eq!(config.resolution, 300);
    }

    #[test]
    fn load_config_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("nope.toml")), &Overrides::default());
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sheet.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(Some(&path), &Overrides::default());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn overrides_beat_file_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sheet.toml");
        fs::write(&path, "resolution = 150\ncard_size = [63, 88]").unwrap();

        let overrides = Overrides {
            resolution: Some(600),
            ..Overrides::default()
        };
        let config = load_config(Some(&path), &overrides).unwrap();
        assert_eq!(config.resolution, 600);
        assert_eq!(config.card_size, [63.0, 88.0]);
    }

    #[test]
    fn overrides_to_toml_is_sparse() {
        let val = Overrides {
            card_size: Some([63.0, 88.0]),
            ..Overrides::default()
        }
        .to_toml();
        let table = val.as_table().unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key("card_size"));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let result = load_raw_config(&tmp.path().join(CONFIG_FILE_NAME)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_raw_config_returns_value_when_file_exists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "resolution = 200").unwrap();

        let val = load_raw_config(&path).unwrap().unwrap();
        assert_eq!(val.get("resolution").unwrap().as_integer(), Some(200));
    }

    // =========================================================================
    // parse_size tests
    // =========================================================================

    #[test]
    fn parse_size_accepts_integers_and_decimals() {
        assert_eq!(parse_size("63x88"), Ok([63.0, 88.0]));
        assert_eq!(parse_size("215.9X279.4"), Ok([215.9, 279.4]));
        assert_eq!(parse_size(" 63 x 88 "), Ok([63.0, 88.0]));
    }

    #[test]
    fn parse_size_rejects_malformed() {
        assert!(parse_size("63").is_err());
        assert!(parse_size("63xabc").is_err());
        assert!(parse_size("x88").is_err());
    }

    // =========================================================================
    // effective_threads tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn parse_processing_config() {
        let config: SheetConfig = toml::from_str("[processing]\nmax_processes = 4").unwrap();
        assert_eq!(config.processing.max_processes, Some(4));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("resolution = 300").unwrap();
        let overlay: toml::Value = toml::from_str("resolution = 600").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("resolution").unwrap().as_integer(), Some(600));
    }

    #[test]
    fn merge_toml_table_merge_preserves_base_keys() {
        let base: toml::Value = toml::from_str(
            r#"
[output]
compression = 6
other = true
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[output]\ncompression = 1").unwrap();
        let merged = merge_toml(base, overlay);
        let output = merged.get("output").unwrap();
        assert_eq!(output.get("compression").unwrap().as_integer(), Some(1));
        assert_eq!(output.get("other").unwrap().as_bool(), Some(true));
    }

    #[test]
    fn merge_toml_arrays_replace_whole() {
        let base: toml::Value = toml::from_str("page_size = [210.0, 297.0]").unwrap();
        let overlay: toml::Value = toml::from_str("page_size = [100]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("page_size").unwrap().as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<SheetConfig, _> = toml::from_str("resolutoin = 300");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let result: Result<SheetConfig, _> = toml::from_str("[output]\nlevel = 3");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sheet.toml");
        fs::write(&path, "[imagez]\nquality = 90").unwrap();
        assert!(load_config(Some(&path), &Overrides::default()).is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(SheetConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_card_width() {
        let config = SheetConfig {
            card_size: [0.0, 87.0],
            ..SheetConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_negative_page_height() {
        let config = SheetConfig {
            page_size: [210.0, -1.0],
            ..SheetConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("page_size"));
    }

    #[test]
    fn validate_rejects_zero_resolution() {
        let config = SheetConfig {
            resolution: 0,
            ..SheetConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_sizes_below_one_pixel() {
        let config = SheetConfig {
            page_size: [0.1, 0.1],
            card_size: [0.05, 0.05],
            resolution: 72,
            ..SheetConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("at least 1 px"));

        // The same card is fine once the resolution gives it a pixel
        let config = SheetConfig {
            page_size: [0.1, 0.1],
            card_size: [0.05, 0.05],
            resolution: 1200,
            ..SheetConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_compression_boundary() {
        let mut config = SheetConfig::default();
        config.output.compression = 10;
        assert!(config.validate().is_ok());
        config.output.compression = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_config_rejects_invalid_values() {
        let overlay: toml::Value = toml::from_str("resolution = 0").unwrap();
        let result = resolve_config(stock_defaults_value().unwrap(), [overlay]);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn resolve_config_with_no_overlay() {
        let config = resolve_config(stock_defaults_value().unwrap(), []).unwrap();
        assert_eq!(config, SheetConfig::default());
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: SheetConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, SheetConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("page_size"));
        assert!(content.contains("card_size"));
        assert!(content.contains("resolution"));
        assert!(content.contains("[processing]"));
        assert!(content.contains("[output]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("page_size").is_some());
        assert!(val.get("processing").is_some());
        assert!(val.get("output").is_some());
    }
}
