use crate::palette::ModelVariant;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Image encoding used by the file sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }
}

/// Display parameters for a positional-variance figure.
///
/// Every field has a default, so a TOML file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Target sample size used to turn mean proportions into subject counts in titles.
    pub n_samples: Option<usize>,
    /// Number of display stages; fewer than the event count bins raw stages together.
    pub display_stages: Option<usize>,
    /// Size in pixels of one panel.
    pub panel_size: (u32, u32),
    /// Overall figure size in pixels; derived from `panel_size` and the grid when absent.
    pub figure_size: Option<(u32, u32)>,
    /// One label per biomarker; placeholders are generated when absent.
    pub biomarker_labels: Option<Vec<String>>,
    /// Explicit top-to-bottom biomarker order, overriding the expected-stage ordering.
    pub biomarker_order: Option<Vec<usize>>,
    /// Explicit panel order of subtypes, overriding descending mean proportion.
    pub subtype_order: Option<Vec<usize>>,
    /// One title per subtype, in panel order.
    pub subtype_titles: Option<Vec<String>>,
    pub cross_validated: bool,
    /// Render every panel as its own figure.
    pub separate_subtypes: bool,
    pub stage_label: String,
    /// Spacing between labelled stage ticks.
    pub stage_interval: usize,
    pub title_font_size: u32,
    pub label_font_size: u32,
    pub stage_font_size: u32,
    pub image_format: ImageFormat,
    pub model_variant: ModelVariant,
    /// Destination prefix; figures are written only when this is set.
    pub save_path: Option<PathBuf>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            n_samples: None,
            display_stages: None,
            panel_size: (640, 360),
            figure_size: None,
            biomarker_labels: None,
            biomarker_order: None,
            subtype_order: None,
            subtype_titles: None,
            cross_validated: false,
            separate_subtypes: false,
            stage_label: "Disease stage".to_string(),
            stage_interval: 1,
            title_font_size: 18,
            label_font_size: 14,
            stage_font_size: 12,
            image_format: ImageFormat::Png,
            model_variant: ModelVariant::Zscore,
            save_path: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read render options file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML render options: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize render options to TOML: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl RenderOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let options = RenderOptions::from_toml_str("").unwrap();
        assert_eq!(options, RenderOptions::default());
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let options = RenderOptions::from_toml_str(
            r#"
            n_samples = 250
            display_stages = 8
            separate_subtypes = true
            image_format = "svg"
            model_variant = "ordinal"
            biomarker_labels = ["Hippocampus", "Ventricles"]
            panel_size = [800, 400]
            "#,
        )
        .unwrap();
        assert_eq!(options.n_samples, Some(250));
        assert_eq!(options.display_stages, Some(8));
        assert!(options.separate_subtypes);
        assert_eq!(options.image_format, ImageFormat::Svg);
        assert_eq!(options.model_variant, ModelVariant::Ordinal);
        assert_eq!(options.panel_size, (800, 400));
        assert_eq!(options.biomarker_labels.unwrap().len(), 2);
        assert_eq!(options.stage_interval, 1);
    }

    #[test]
    fn options_survive_a_toml_round_trip() {
        let options = RenderOptions {
            n_samples: Some(100),
            subtype_titles: Some(vec!["Typical".into(), "Cortical".into()]),
            ..RenderOptions::default()
        };
        let text = options.to_toml_string().unwrap();
        assert_eq!(RenderOptions::from_toml_str(&text).unwrap(), options);
    }

    #[test]
    fn options_load_from_a_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.toml");
        fs::write(
            &path,
            r#"
            n_samples = 400
            stage_interval = 2
            save_path = "figures/cohort"
            subtype_titles = ["Typical", "Cortical"]
            "#,
        )
        .unwrap();

        let options = RenderOptions::load(&path).unwrap();
        assert_eq!(options.n_samples, Some(400));
        assert_eq!(options.stage_interval, 2);
        assert_eq!(options.save_path, Some(PathBuf::from("figures/cohort")));
        assert_eq!(options.subtype_titles.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(options.image_format, ImageFormat::Png);

        let written = dir.path().join("written.toml");
        fs::write(&written, options.to_toml_string().unwrap()).unwrap();
        assert_eq!(RenderOptions::load(&written).unwrap(), options);
    }

    #[test]
    fn missing_options_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RenderOptions::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn unknown_enum_values_are_parse_errors() {
        let err = RenderOptions::from_toml_str("image_format = \"gif\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseError(_)));
    }
}
