//! Automation system for effect parameters
//!
//! Provides LFO modulation and the `ParameterDriver` hook through which
//! external input or animation sources advance parameter values once per
//! tick, before the frame snapshot is taken.

use super::error::EffectError;
use super::types::{LfoShape, LfoSource, ParameterSet};

/// Source of per-tick parameter updates
///
/// Drivers run in registration order, after automation, before the
/// controller snapshots the parameter set for rendering.
pub trait ParameterDriver {
    /// Advance parameter values for the frame at `time` seconds
    fn update(&mut self, time: f32, delta_time: f32, parameters: &mut ParameterSet) -> Result<(), EffectError>;
}

/// Evaluate an LFO source
impl LfoSource {
    /// Evaluate the LFO at the given time in seconds
    ///
    /// Returns a value in the range [offset - amplitude, offset + amplitude]
    pub fn evaluate(&self, time: f32) -> f32 {
        let phase = ((time * self.frequency) + self.phase).rem_euclid(1.0);
        let wave = self.evaluate_waveform(phase);

        // Map from 0-1 to offset +/- amplitude
        self.offset + (wave - 0.5) * 2.0 * self.amplitude
    }

    /// Evaluate the waveform at a given phase (0-1)
    /// Returns a value in the range [0, 1]
    fn evaluate_waveform(&self, phase: f32) -> f32 {
        match self.shape {
            LfoShape::Sine => 0.5 + 0.5 * (phase * std::f32::consts::TAU).sin(),
            LfoShape::Triangle => {
                if phase < 0.5 {
                    phase * 2.0
                } else {
                    1.0 - (phase - 0.5) * 2.0
                }
            }
            LfoShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            LfoShape::Sawtooth => phase,
            LfoShape::SawtoothReverse => 1.0 - phase,
            LfoShape::Random => {
                // Stepped random: phase is the seed, so the value is stable within a step
                let seed = (phase * 1000.0) as u32;
                let hash = Self::simple_hash(seed);
                (hash as f32) / (u32::MAX as f32)
            }
        }
    }

    fn simple_hash(mut x: u32) -> u32 {
        x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
        x = ((x >> 16) ^ x).wrapping_mul(0x45d9f3b);
        (x >> 16) ^ x
    }
}

/// LFO modulation of one parameter around a base value
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterAutomation {
    /// Parameter name
    pub parameter: String,
    /// Unmodulated value
    pub base: f32,
    /// Modulation source
    pub source: LfoSource,
}

/// All automations for one parameter set
#[derive(Debug, Clone, Default)]
pub struct AutomationSet {
    entries: Vec<ParameterAutomation>,
}

impl AutomationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Automate a parameter, replacing any existing automation for it
    ///
    /// The base value is the parameter's current value.
    pub fn add(&mut self, parameters: &ParameterSet, parameter: &str, source: LfoSource) -> Result<(), EffectError> {
        let base = parameters
            .get(parameter)
            .ok_or_else(|| EffectError::UnknownParameter(parameter.to_string()))?;

        self.entries.retain(|e| e.parameter != parameter);
        self.entries.push(ParameterAutomation {
            parameter: parameter.to_string(),
            base,
            source,
        });
        Ok(())
    }

    /// Remove a parameter's automation
    pub fn remove(&mut self, parameter: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.parameter != parameter);
        self.entries.len() != before
    }

    /// Update the base value of an automated parameter; false if not automated
    pub fn set_base(&mut self, parameter: &str, value: f32) -> bool {
        match self.entries.iter_mut().find(|e| e.parameter == parameter) {
            Some(entry) => {
                entry.base = value;
                true
            }
            None => false,
        }
    }

    /// Check whether a parameter is automated
    pub fn contains(&self, parameter: &str) -> bool {
        self.entries.iter().any(|e| e.parameter == parameter)
    }

    pub fn entries(&self) -> &[ParameterAutomation] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ParameterDriver for AutomationSet {
    fn update(&mut self, time: f32, _delta_time: f32, parameters: &mut ParameterSet) -> Result<(), EffectError> {
        for entry in &self.entries {
            let meta = parameters
                .schema()
                .get(&entry.parameter)
                .ok_or_else(|| EffectError::UnknownParameter(entry.parameter.clone()))?;

            // Modulate around the base value, half the range either way at full depth
            let lfo_value = entry.source.evaluate(time);
            let value = meta.clamp(entry.base + lfo_value * meta.range() * 0.5);
            parameters.set(&entry.parameter, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::effects::types::ParameterSchema;

    fn lfo(shape: LfoShape) -> LfoSource {
        LfoSource {
            shape,
            ..Default::default()
        }
    }

    #[test]
    fn test_lfo_shapes() {
        assert!((lfo(LfoShape::Sine).evaluate(0.25) - 1.0).abs() < 1e-5);
        assert!((lfo(LfoShape::Sine).evaluate(0.0)).abs() < 1e-5);
        assert_eq!(lfo(LfoShape::Triangle).evaluate(0.5), 1.0);
        assert_eq!(lfo(LfoShape::Square).evaluate(0.25), 1.0);
        assert_eq!(lfo(LfoShape::Square).evaluate(0.75), -1.0);
        assert_eq!(lfo(LfoShape::Sawtooth).evaluate(0.0), -1.0);
        assert_eq!(lfo(LfoShape::SawtoothReverse).evaluate(0.0), 1.0);
    }

    #[test]
    fn test_lfo_random_is_deterministic_and_bounded() {
        let source = lfo(LfoShape::Random);
        for i in 0..50 {
            let t = i as f32 * 0.173;
            let a = source.evaluate(t);
            assert_eq!(a, source.evaluate(t));
            assert!((-1.0..=1.0).contains(&a));
        }
    }

    #[test]
    fn test_lfo_amplitude_and_offset() {
        let source = LfoSource {
            shape: LfoShape::Square,
            amplitude: 0.25,
            offset: 0.5,
            ..Default::default()
        };
        assert_eq!(source.evaluate(0.1), 0.75);
        assert_eq!(source.evaluate(0.6), 0.25);
    }

    #[test]
    fn test_automation_modulates_and_clamps() {
        let mut params = ParameterSet::new(Arc::new(ParameterSchema::painterly()));
        params.set("vignette_intensity", 0.8).unwrap();

        let mut automation = AutomationSet::new();
        automation.add(&params, "vignette_intensity", lfo(LfoShape::Square)).unwrap();

        // +1 * range/2 from 0.8 clamps at the max
        automation.update(0.25, 0.0, &mut params).unwrap();
        assert_eq!(params.get("vignette_intensity"), Some(1.0));

        // -1 * range/2 from 0.8
        automation.update(0.75, 0.0, &mut params).unwrap();
        assert!((params.get("vignette_intensity").unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_automation_base_updates() {
        let mut params = ParameterSet::new(Arc::new(ParameterSchema::painterly()));
        let mut automation = AutomationSet::new();
        let flat = LfoSource {
            amplitude: 0.0,
            ..Default::default()
        };
        automation.add(&params, "blur_intensity", flat).unwrap();

        assert!(automation.set_base("blur_intensity", 0.4));
        assert!(!automation.set_base("normal_influence", 0.4));
        automation.update(1.0, 0.016, &mut params).unwrap();
        assert_eq!(params.get("blur_intensity"), Some(0.4));
    }

    #[test]
    fn test_automation_rejects_unknown_parameter() {
        let params = ParameterSet::new(Arc::new(ParameterSchema::painterly()));
        let mut automation = AutomationSet::new();
        let err = automation.add(&params, "exposure", LfoSource::default()).unwrap_err();
        assert_eq!(err, EffectError::UnknownParameter("exposure".to_string()));
        assert!(automation.is_empty());
    }

    #[test]
    fn test_automation_replace_and_remove() {
        let params = ParameterSet::new(Arc::new(ParameterSchema::painterly()));
        let mut automation = AutomationSet::new();
        automation.add(&params, "blur_intensity", lfo(LfoShape::Sine)).unwrap();
        automation.add(&params, "blur_intensity", lfo(LfoShape::Triangle)).unwrap();
        assert_eq!(automation.entries().len(), 1);
        assert_eq!(automation.entries()[0].source.shape, LfoShape::Triangle);

        assert!(automation.remove("blur_intensity"));
        assert!(!automation.contains("blur_intensity"));
    }
}
