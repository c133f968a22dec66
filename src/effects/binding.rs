//! Parameter-to-uniform binding for one effect pass
//!
//! A binding maps schema parameters onto the uniform table of a program
//! owned by the rendering backend. Parameters are resolved when the binding
//! is constructed, so a typo in the pass layout fails at configuration time
//! instead of being silently dropped at draw time.

use super::error::EffectError;
use super::traits::{ProgramId, RenderBackend};
use super::types::{EffectUniform, ParameterSchema, ParameterSnapshot};

/// One uniform fed by one schema parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub uniform: EffectUniform,
    /// Index of the parameter in the schema
    pub parameter: usize,
}

/// Result of binding a snapshot into a program
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindOutcome {
    /// Uniforms that were written
    pub written: Vec<EffectUniform>,
    /// Declared uniforms the program does not expose (left at their prior value)
    pub missing: Vec<EffectUniform>,
}

impl BindOutcome {
    /// True when every declared uniform was written
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Binds parameter snapshots to a backend shader program
///
/// Holds only the program handle; the program itself belongs to the backend.
/// Once the backend destroys the program every `bind` fails with
/// `ProgramInvalidated`.
#[derive(Debug, Clone)]
pub struct EffectMaterialBinding {
    effect_type: String,
    program: ProgramId,
    slots: Vec<UniformSlot>,
    /// Missing uniforms already reported at warn level
    reported_missing: Vec<EffectUniform>,
}

impl EffectMaterialBinding {
    /// Create a binding, resolving every uniform's parameter in the schema
    pub fn new(
        effect_type: impl Into<String>,
        program: ProgramId,
        uniforms: &[EffectUniform],
        schema: &ParameterSchema,
    ) -> Result<Self, EffectError> {
        let slots = uniforms
            .iter()
            .map(|uniform| {
                let name = uniform.parameter_name();
                schema
                    .index_of(name)
                    .map(|parameter| UniformSlot {
                        uniform: *uniform,
                        parameter,
                    })
                    .ok_or_else(|| EffectError::UnknownParameter(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            effect_type: effect_type.into(),
            program,
            slots,
            reported_missing: Vec::new(),
        })
    }

    /// Effect type this binding feeds
    pub fn effect_type(&self) -> &str {
        &self.effect_type
    }

    /// Program handle
    pub fn program(&self) -> ProgramId {
        self.program
    }

    /// Declared uniform slots in order
    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    /// Check whether the program is still alive in the backend
    pub fn is_valid<B: RenderBackend + ?Sized>(&self, backend: &B) -> bool {
        backend.uniforms(self.program).is_some()
    }

    /// Write every declared parameter into the program's uniform table
    ///
    /// Missing uniforms are logged and skipped; the pass can still run.
    pub fn bind<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        snapshot: &ParameterSnapshot,
    ) -> Result<BindOutcome, EffectError> {
        // Resolve values first so a bad snapshot never leaves the table half-written
        let values = self
            .slots
            .iter()
            .map(|slot| {
                snapshot
                    .value_at(slot.parameter)
                    .ok_or_else(|| EffectError::UnknownParameter(slot.uniform.parameter_name().to_string()))
            })
            .collect::<Result<Vec<f32>, _>>()?;

        let table = backend
            .uniforms_mut(self.program)
            .ok_or(EffectError::ProgramInvalidated(self.program))?;

        let mut outcome = BindOutcome::default();
        for (slot, value) in self.slots.iter().zip(values) {
            if table.set(slot.uniform, value) {
                outcome.written.push(slot.uniform);
            } else {
                outcome.missing.push(slot.uniform);
            }
        }

        for uniform in &outcome.missing {
            let error = EffectError::MissingUniform {
                effect_type: self.effect_type.clone(),
                uniform: *uniform,
            };
            if self.reported_missing.contains(uniform) {
                tracing::debug!(program = %self.program, "{}", error);
            } else {
                tracing::warn!(program = %self.program, "{}", error);
                self.reported_missing.push(*uniform);
            }
        }

        Ok(outcome)
    }
}
