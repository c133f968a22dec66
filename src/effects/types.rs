//! Core effect data types
//!
//! Parameter schema, the live parameter set and its per-frame snapshot,
//! the validated uniform table, and the LFO automation description.
//! These types hold no backend resources.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::EffectError;

/// Shader uniforms understood by the built-in effects
///
/// Replaces free-form uniform strings: a binding can only reference a
/// uniform that exists in this table, and each uniform knows which
/// parameter feeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectUniform {
    /// Paint-like sampling radius
    Radius,
    /// Surface-normal contribution weight
    NormalWeight,
    /// Blur strength
    BlurIntensity,
    /// Edge darkening amount
    VignetteIntensity,
    /// Edge falloff width
    VignetteSmoothness,
}

impl EffectUniform {
    /// All uniforms in canonical order
    pub const ALL: [EffectUniform; 5] = [
        EffectUniform::Radius,
        EffectUniform::NormalWeight,
        EffectUniform::BlurIntensity,
        EffectUniform::VignetteIntensity,
        EffectUniform::VignetteSmoothness,
    ];

    /// Name of the uniform as declared in shader source
    pub fn shader_name(&self) -> &'static str {
        match self {
            EffectUniform::Radius => "_Radius",
            EffectUniform::NormalWeight => "_NormalWeight",
            EffectUniform::BlurIntensity => "_BlurIntensity",
            EffectUniform::VignetteIntensity => "_VignetteIntensity",
            EffectUniform::VignetteSmoothness => "_VignetteSmoothness",
        }
    }

    /// Name of the parameter that drives this uniform
    pub fn parameter_name(&self) -> &'static str {
        match self {
            EffectUniform::Radius => "impasto_intensity",
            EffectUniform::NormalWeight => "normal_influence",
            EffectUniform::BlurIntensity => "blur_intensity",
            EffectUniform::VignetteIntensity => "vignette_intensity",
            EffectUniform::VignetteSmoothness => "vignette_smoothness",
        }
    }

    /// Look up a uniform by its shader name
    pub fn from_shader_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.shader_name() == name)
    }
}

impl std::fmt::Display for EffectUniform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.shader_name())
    }
}

/// Metadata for a parameter (describes the parameter, doesn't hold the value)
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterMeta {
    /// Internal name (used as key)
    pub name: String,
    /// Display label
    pub label: String,
    /// Default value
    pub default: f32,
    /// Minimum value
    pub min: f32,
    /// Maximum value
    pub max: f32,
    /// Step increment
    pub step: Option<f32>,
}

impl ParameterMeta {
    /// Create a new float parameter metadata
    pub fn float(name: impl Into<String>, label: impl Into<String>, default: f32, min: f32, max: f32) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            default,
            min,
            max,
            step: None,
        }
    }

    /// Create a new float parameter with step increment
    pub fn float_with_step(
        name: impl Into<String>,
        label: impl Into<String>,
        default: f32,
        min: f32,
        max: f32,
        step: f32,
    ) -> Self {
        Self {
            step: Some(step),
            ..Self::float(name, label, default, min, max)
        }
    }

    /// Width of the valid range
    pub fn range(&self) -> f32 {
        self.max - self.min
    }

    /// Clamp a value into the declared range
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Ordered set of declared parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    params: Vec<ParameterMeta>,
}

impl ParameterSchema {
    /// Create a schema from parameter metadata (later duplicates are ignored)
    pub fn new(params: Vec<ParameterMeta>) -> Self {
        let mut unique: Vec<ParameterMeta> = Vec::with_capacity(params.len());
        for meta in params {
            if unique.iter().any(|p| p.name == meta.name) {
                tracing::warn!(parameter = %meta.name, "Duplicate parameter in schema ignored");
                continue;
            }
            unique.push(meta);
        }
        Self { params: unique }
    }

    /// The painterly post-process schema: one parameter per `EffectUniform`
    pub fn painterly() -> Self {
        Self::new(vec![
            ParameterMeta::float_with_step("impasto_intensity", "Impasto Intensity", 0.0, 0.0, 1.0, 0.01),
            ParameterMeta::float_with_step("normal_influence", "Normal Influence", 0.0, 0.0, 2.0, 0.01),
            ParameterMeta::float_with_step("blur_intensity", "Blur Intensity", 0.0, 0.0, 1.0, 0.01),
            ParameterMeta::float_with_step("vignette_intensity", "Vignette Intensity", 0.0, 0.0, 1.0, 0.01),
            ParameterMeta::float_with_step("vignette_smoothness", "Vignette Smoothness", 0.5, 0.0, 1.0, 0.01),
        ])
    }

    /// Index of a parameter by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }

    /// Get parameter metadata by name
    pub fn get(&self, name: &str) -> Option<&ParameterMeta> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Get parameter metadata by index
    pub fn meta(&self, index: usize) -> Option<&ParameterMeta> {
        self.params.get(index)
    }

    /// Check whether a parameter is declared
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// All declared parameters in order
    pub fn params(&self) -> &[ParameterMeta] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Live parameter values for one controller
///
/// Values are keyed by the schema; names outside it are rejected.
/// The set is mutated in place every tick and is never shared between
/// threads; renderers only ever see a [`ParameterSnapshot`].
#[derive(Debug, Clone)]
pub struct ParameterSet {
    schema: Arc<ParameterSchema>,
    values: Vec<f32>,
}

impl ParameterSet {
    /// Create a set with every parameter at its default
    pub fn new(schema: Arc<ParameterSchema>) -> Self {
        let values = schema.params().iter().map(|p| p.default).collect();
        Self { schema, values }
    }

    /// Store or overwrite a named value
    ///
    /// The value is stored exactly as given (no clamping); kernels clamp
    /// at sampling time.
    pub fn set(&mut self, name: &str, value: f32) -> Result<(), EffectError> {
        let index = self
            .schema
            .index_of(name)
            .ok_or_else(|| EffectError::UnknownParameter(name.to_string()))?;
        if !value.is_finite() {
            return Err(EffectError::InvalidValue {
                name: name.to_string(),
                value,
            });
        }
        self.values[index] = value;
        Ok(())
    }

    /// Get a value by name
    pub fn get(&self, name: &str) -> Option<f32> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    /// Get a value by schema index
    pub fn value_at(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// Reset every parameter to its default
    pub fn reset(&mut self) {
        for (value, meta) in self.values.iter_mut().zip(self.schema.params()) {
            *value = meta.default;
        }
    }

    /// Iterate over `(name, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.schema
            .params()
            .iter()
            .zip(self.values.iter())
            .map(|(meta, value)| (meta.name.as_str(), *value))
    }

    /// The schema this set is keyed by
    pub fn schema(&self) -> &Arc<ParameterSchema> {
        &self.schema
    }

    /// Take an immutable copy for rendering one frame
    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            schema: Arc::clone(&self.schema),
            values: Arc::from(self.values.as_slice()),
        }
    }
}

/// Immutable per-frame copy of a [`ParameterSet`]
///
/// Cloning is cheap; mutations of the live set after the snapshot was
/// taken are never observed through it.
#[derive(Debug, Clone)]
pub struct ParameterSnapshot {
    schema: Arc<ParameterSchema>,
    values: Arc<[f32]>,
}

impl ParameterSnapshot {
    /// Get a value by name
    pub fn get(&self, name: &str) -> Option<f32> {
        self.schema.index_of(name).map(|i| self.values[i])
    }

    /// Get a value by schema index
    pub fn value_at(&self, index: usize) -> Option<f32> {
        self.values.get(index).copied()
    }

    /// All values in schema order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn schema(&self) -> &Arc<ParameterSchema> {
        &self.schema
    }
}

/// LFO waveform shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LfoShape {
    #[default]
    Sine,
    Triangle,
    Square,
    Sawtooth,
    SawtoothReverse,
    Random,
}

impl LfoShape {
    /// Get all available shapes
    pub fn all() -> &'static [LfoShape] {
        &[
            LfoShape::Sine,
            LfoShape::Triangle,
            LfoShape::Square,
            LfoShape::Sawtooth,
            LfoShape::SawtoothReverse,
            LfoShape::Random,
        ]
    }

    /// Get display name
    pub fn name(&self) -> &'static str {
        match self {
            LfoShape::Sine => "Sine",
            LfoShape::Triangle => "Triangle",
            LfoShape::Square => "Square",
            LfoShape::Sawtooth => "Sawtooth",
            LfoShape::SawtoothReverse => "Saw Rev",
            LfoShape::Random => "Random",
        }
    }
}

/// LFO automation source
#[derive(Debug, Clone, PartialEq)]
pub struct LfoSource {
    /// Waveform shape
    pub shape: LfoShape,
    /// Frequency in Hz
    pub frequency: f32,
    /// Phase offset (0.0-1.0)
    pub phase: f32,
    /// Modulation depth (0.0-1.0)
    pub amplitude: f32,
    /// Center value offset
    pub offset: f32,
}

impl Default for LfoSource {
    fn default() -> Self {
        Self {
            shape: LfoShape::Sine,
            frequency: 1.0,
            phase: 0.0,
            amplitude: 1.0,
            offset: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn painterly_set() -> ParameterSet {
        ParameterSet::new(Arc::new(ParameterSchema::painterly()))
    }

    #[test]
    fn test_uniform_names() {
        assert_eq!(EffectUniform::Radius.shader_name(), "_Radius");
        assert_eq!(EffectUniform::NormalWeight.parameter_name(), "normal_influence");
        assert_eq!(EffectUniform::from_shader_name("_VignetteSmoothness"), Some(EffectUniform::VignetteSmoothness));
        assert_eq!(EffectUniform::from_shader_name("_Radiu"), None);
    }

    #[test]
    fn test_painterly_schema_covers_every_uniform() {
        let schema = ParameterSchema::painterly();
        assert_eq!(schema.len(), EffectUniform::ALL.len());
        for uniform in EffectUniform::ALL {
            assert!(schema.contains(uniform.parameter_name()), "{} missing", uniform);
        }
    }

    #[test]
    fn test_schema_ignores_duplicates() {
        let schema = ParameterSchema::new(vec![
            ParameterMeta::float("a", "A", 0.0, 0.0, 1.0),
            ParameterMeta::float("a", "A again", 1.0, 0.0, 1.0),
        ]);
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("a").map(|m| m.label.as_str()), Some("A"));
    }

    #[test]
    fn test_set_then_snapshot_is_exact() {
        let mut params = painterly_set();
        let values = [0.5, 1.0, 0.2, 0.8, 0.3];
        for (uniform, value) in EffectUniform::ALL.iter().zip(values) {
            params.set(uniform.parameter_name(), value).unwrap();
        }

        let snapshot = params.snapshot();
        for (uniform, value) in EffectUniform::ALL.iter().zip(values) {
            assert_eq!(snapshot.get(uniform.parameter_name()), Some(value));
        }
    }

    #[test]
    fn test_set_does_not_clamp() {
        let mut params = painterly_set();
        params.set("blur_intensity", 7.25).unwrap();
        assert_eq!(params.snapshot().get("blur_intensity"), Some(7.25));
    }

    #[test]
    fn test_unknown_parameter_rejected_and_set_unchanged() {
        let mut params = painterly_set();
        params.set("impasto_intensity", 0.4).unwrap();
        let before: Vec<f32> = params.snapshot().values().to_vec();

        let err = params.set("impastoIntensty", 0.9).unwrap_err();
        assert_eq!(err, EffectError::UnknownParameter("impastoIntensty".to_string()));
        assert_eq!(params.snapshot().values(), before.as_slice());
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut params = painterly_set();
        assert!(matches!(
            params.set("normal_influence", f32::NAN),
            Err(EffectError::InvalidValue { .. })
        ));
        assert_eq!(params.get("normal_influence"), Some(0.0));
    }

    #[test]
    fn test_snapshot_isolated_from_later_mutation() {
        let mut params = painterly_set();
        params.set("vignette_intensity", 0.25).unwrap();
        let snapshot = params.snapshot();
        params.set("vignette_intensity", 0.75).unwrap();

        assert_eq!(snapshot.get("vignette_intensity"), Some(0.25));
        assert_eq!(params.get("vignette_intensity"), Some(0.75));
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut params = painterly_set();
        params.set("vignette_smoothness", 0.9).unwrap();
        params.reset();
        assert_eq!(params.get("vignette_smoothness"), Some(0.5));
        assert_eq!(params.iter().count(), 5);
    }
}
