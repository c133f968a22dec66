//! Settings management for the effect compositor
//!
//! Handles loading/saving of the XML effect settings file: target frame rate,
//! parameter values, pass layout and LFO automation.

use quick_xml::de::from_str;
use quick_xml::se::to_string;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::effects::builtin::DEFAULT_CHAIN;
use crate::effects::{LfoShape, LfoSource, ParameterSchema};

/// One pass in the configured chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassSettings {
    /// Registered effect type
    #[serde(rename = "@effect")]
    pub effect: String,

    /// Whether the pass starts bypassed
    #[serde(rename = "@bypassed", default)]
    pub bypassed: bool,
}

impl PassSettings {
    pub fn new(effect: impl Into<String>) -> Self {
        Self {
            effect: effect.into(),
            bypassed: false,
        }
    }
}

/// LFO automation of one parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationSettings {
    /// Parameter name (snake_case, as in the schema)
    #[serde(rename = "@parameter")]
    pub parameter: String,

    #[serde(rename = "@shape", default)]
    pub shape: LfoShape,

    /// Frequency in Hz
    #[serde(rename = "@frequency", default = "default_frequency")]
    pub frequency: f32,

    /// Modulation depth (0.0-1.0)
    #[serde(rename = "@amplitude", default = "default_amplitude")]
    pub amplitude: f32,

    /// Phase offset (0.0-1.0)
    #[serde(rename = "@phase", default)]
    pub phase: f32,
}

impl AutomationSettings {
    /// LFO source described by these settings
    pub fn source(&self) -> LfoSource {
        LfoSource {
            shape: self.shape,
            frequency: self.frequency,
            phase: self.phase,
            amplitude: self.amplitude,
            offset: 0.0,
        }
    }
}

fn default_frequency() -> f32 {
    1.0
}

fn default_amplitude() -> f32 {
    1.0
}

fn default_target_fps() -> u32 {
    60
}

fn default_vignette_smoothness() -> f32 {
    0.5
}

fn default_passes() -> Vec<PassSettings> {
    DEFAULT_CHAIN.iter().map(|effect| PassSettings::new(*effect)).collect()
}

/// `<passes>` container; an empty one is distinct from a missing one
#[derive(Serialize)]
struct PassChainRef<'a> {
    #[serde(rename = "pass")]
    passes: &'a [PassSettings],
}

#[derive(Deserialize)]
struct PassChain {
    #[serde(rename = "pass", default)]
    passes: Vec<PassSettings>,
}

fn serialize_pass_chain<S>(passes: &[PassSettings], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    PassChainRef { passes }.serialize(serializer)
}

fn deserialize_pass_chain<'de, D>(deserializer: D) -> Result<Vec<PassSettings>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(PassChain::deserialize(deserializer)?.passes)
}

/// Effect compositor settings (saved as XML)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "ImageEffectSettings")]
pub struct EffectSettings {
    /// Target frame rate for the host render loop
    #[serde(rename = "targetFps", default = "default_target_fps")]
    pub target_fps: u32,

    #[serde(rename = "impastoIntensity", default)]
    pub impasto_intensity: f32,

    #[serde(rename = "normalInfluence", default)]
    pub normal_influence: f32,

    #[serde(rename = "blurIntensity", default)]
    pub blur_intensity: f32,

    #[serde(rename = "vignetteIntensity", default)]
    pub vignette_intensity: f32,

    #[serde(rename = "vignetteSmoothness", default = "default_vignette_smoothness")]
    pub vignette_smoothness: f32,

    /// Pass chain in processing order; a missing `<passes>` element means
    /// the default chain, an empty one means no passes
    #[serde(
        rename = "passes",
        default = "default_passes",
        serialize_with = "serialize_pass_chain",
        deserialize_with = "deserialize_pass_chain"
    )]
    pub passes: Vec<PassSettings>,

    /// Parameter automation
    #[serde(rename = "automation", default)]
    pub automations: Vec<AutomationSettings>,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            impasto_intensity: 0.0,
            normal_influence: 0.0,
            blur_intensity: 0.0,
            vignette_intensity: 0.0,
            vignette_smoothness: default_vignette_smoothness(),
            passes: default_passes(),
            automations: Vec::new(),
        }
    }
}

impl EffectSettings {
    /// Clamp FPS to valid range (24-240)
    pub fn clamp_fps(&mut self) {
        self.target_fps = self.target_fps.clamp(24, 240);
    }

    /// Time between frames at the target frame rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.clamp(24, 240) as f64)
    }

    /// Parameter values keyed by schema name, in schema order
    pub fn parameters(&self) -> [(&'static str, f32); 5] {
        [
            ("impasto_intensity", self.impasto_intensity),
            ("normal_influence", self.normal_influence),
            ("blur_intensity", self.blur_intensity),
            ("vignette_intensity", self.vignette_intensity),
            ("vignette_smoothness", self.vignette_smoothness),
        ]
    }

    /// Set a parameter by schema name or XML element name; returns false
    /// for unknown names
    pub fn set_parameter(&mut self, name: &str, value: f32) -> bool {
        let slot = match name {
            "impasto_intensity" | "impastoIntensity" => &mut self.impasto_intensity,
            "normal_influence" | "normalInfluence" => &mut self.normal_influence,
            "blur_intensity" | "blurIntensity" => &mut self.blur_intensity,
            "vignette_intensity" | "vignetteIntensity" => &mut self.vignette_intensity,
            "vignette_smoothness" | "vignetteSmoothness" => &mut self.vignette_smoothness,
            _ => return false,
        };
        *slot = value;
        true
    }

    /// Schema the parameter values belong to
    pub fn schema(&self) -> ParameterSchema {
        ParameterSchema::painterly()
    }

    /// Load settings from an XML file
    pub fn load_from_file(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path).map_err(SettingsError::Io)?;
        let mut settings: Self = from_str(&contents).map_err(SettingsError::XmlParse)?;
        settings.clamp_fps();
        Ok(settings)
    }

    /// Save settings to an XML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SettingsError> {
        let xml = to_string(self).map_err(SettingsError::XmlWrite)?;
        let formatted = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(SettingsError::Io)?;
        }
        fs::write(path, formatted).map_err(SettingsError::Io)?;
        Ok(())
    }

    /// Default settings file location in the user config directory
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::config_dir()
            .map(|mut p| {
                p.push("EffectCompositor");
                p.push("settings.xml");
                p
            })
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Ok(path) = Self::default_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to load settings, using defaults: {}", e);
                Self::default()
            }
        }
    }
}

/// Settings-related errors
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    XmlParse(quick_xml::DeError),
    XmlWrite(quick_xml::SeError),
    NoConfigDir,
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Io(e) => write!(f, "IO error: {}", e),
            SettingsError::XmlParse(e) => write!(f, "XML parse error: {}", e),
            SettingsError::XmlWrite(e) => write!(f, "XML write error: {}", e),
            SettingsError::NoConfigDir => write!(f, "Could not find config directory"),
        }
    }
}

impl std::error::Error for SettingsError {}
