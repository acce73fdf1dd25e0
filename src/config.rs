use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::color::HsvRange;
use crate::errors::{WheatRustError, Result};

/// Configuration for the wheat rust analyzer
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    // Persisted state loaded once at startup
    #[serde(default = "default_model_path")]
    pub model_path: String,

    #[serde(default = "default_features_path")]
    pub features_path: String,

    #[serde(default = "default_labels_path")]
    pub labels_path: String,

    // Embedding model input
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    #[serde(default)]
    pub input_layout: TensorLayout,

    // Local contrast normalization of the value channel
    #[serde(default = "default_clahe_clip_limit")]
    pub clahe_clip_limit: f64,

    #[serde(default = "default_clahe_tile_grid")]
    pub clahe_tile_grid: u32,

    #[serde(default = "default_opening_kernel_size")]
    pub opening_kernel_size: u32,

    #[serde(default = "default_blur_kernel_size")]
    pub blur_kernel_size: u32,

    /// Minimum fraction of leaf-coloured pixels for an upload to count as wheat
    #[serde(default = "default_wheat_min_leaf_fraction")]
    pub wheat_min_leaf_fraction: f64,

    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    // CLI batch mode
    #[serde(default = "default_input_path")]
    pub input_path: String,

    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: String,

    // HSV bands on the 8-bit scale (H 0..180, S/V 0..255)
    #[serde(default = "default_leaf_range")]
    pub leaf_range: HsvRange,

    #[serde(default = "default_yellow_range")]
    pub yellow_range: HsvRange,

    #[serde(default = "default_brown_range")]
    pub brown_range: HsvRange,
}

/// Memory layout of the model input tensor
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// Batch, height, width, channels (Keras exports)
    #[default]
    Nhwc,
    /// Batch, channels, height, width
    Nchw,
}

fn default_model_path() -> String {
    "trained_models/vgg16_model.onnx".to_string()
}

fn default_features_path() -> String {
    "features/features.npy".to_string()
}

fn default_labels_path() -> String {
    "features/labels.npy".to_string()
}

fn default_input_size() -> u32 {
    224
}

fn default_leaf_range() -> HsvRange {
    HsvRange::new([20, 20, 20], [100, 255, 255])
}

fn default_yellow_range() -> HsvRange {
    HsvRange::new([15, 40, 70], [35, 255, 255])
}

fn default_brown_range() -> HsvRange {
    HsvRange::new([10, 25, 40], [30, 180, 160])
}

fn default_clahe_clip_limit() -> f64 {
    2.0
}

fn default_clahe_tile_grid() -> u32 {
    8
}

fn default_opening_kernel_size() -> u32 {
    3
}

fn default_blur_kernel_size() -> u32 {
    25
}

fn default_wheat_min_leaf_fraction() -> f64 {
    0.05
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
}

fn default_parallel() -> bool {
    true
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_output_base_dir() -> String {
    "./output".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            features_path: default_features_path(),
            labels_path: default_labels_path(),
            input_size: default_input_size(),
            input_layout: TensorLayout::default(),
            leaf_range: default_leaf_range(),
            yellow_range: default_yellow_range(),
            brown_range: default_brown_range(),
            clahe_clip_limit: default_clahe_clip_limit(),
            clahe_tile_grid: default_clahe_tile_grid(),
            opening_kernel_size: default_opening_kernel_size(),
            blur_kernel_size: default_blur_kernel_size(),
            wheat_min_leaf_fraction: default_wheat_min_leaf_fraction(),
            allowed_extensions: default_allowed_extensions(),
            use_parallel: default_parallel(),
            input_path: default_input_path(),
            output_base_dir: default_output_base_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            WheatRustError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|source| WheatRustError::ConfigLoad {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, range) in [
            ("leaf_range", &self.leaf_range),
            ("yellow_range", &self.yellow_range),
            ("brown_range", &self.brown_range),
        ] {
            if !range.is_valid() {
                return Err(WheatRustError::Config(format!(
                    "{} must have lower <= upper on every channel and hue < 180",
                    name
                )));
            }
        }

        if self.clahe_clip_limit <= 0.0 {
            return Err(WheatRustError::Config(
                "clahe_clip_limit must be > 0.0".to_string(),
            ));
        }

        if self.clahe_tile_grid == 0 {
            return Err(WheatRustError::Config(
                "clahe_tile_grid must be > 0".to_string(),
            ));
        }

        if self.opening_kernel_size == 0 || self.opening_kernel_size % 2 == 0 {
            return Err(WheatRustError::Config(
                "opening_kernel_size must be an odd number > 0".to_string(),
            ));
        }

        if self.blur_kernel_size == 0 || self.blur_kernel_size % 2 == 0 {
            return Err(WheatRustError::Config(
                "blur_kernel_size must be an odd number > 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.wheat_min_leaf_fraction) {
            return Err(WheatRustError::Config(
                "wheat_min_leaf_fraction must be in [0.0, 1.0)".to_string(),
            ));
        }

        if self.input_size == 0 {
            return Err(WheatRustError::Config(
                "input_size must be > 0".to_string(),
            ));
        }

        if self.allowed_extensions.is_empty() {
            return Err(WheatRustError::Config(
                "allowed_extensions must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            WheatRustError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            wheat_min_leaf_fraction = 0.1
            input_layout = "nchw"

            [leaf_range]
            lower = [20, 40, 40]
            upper = [100, 255, 255]
            "#,
        )
        .unwrap();

        assert_eq!(config.wheat_min_leaf_fraction, 0.1);
        assert_eq!(config.input_layout, TensorLayout::Nchw);
        assert_eq!(config.leaf_range.lower, [20, 40, 40]);
        assert_eq!(config.yellow_range, default_yellow_range());
        assert_eq!(config.opening_kernel_size, 3);
    }

    #[test]
    fn even_kernels_are_rejected() {
        let config = Config {
            blur_kernel_size: 24,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            opening_kernel_size: 4,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn gate_fraction_must_be_a_fraction() {
        let config = Config {
            wheat_min_leaf_fraction: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.brown_range, config.brown_range);
        assert_eq!(parsed.allowed_extensions, config.allowed_extensions);
    }
}
