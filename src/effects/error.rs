//! Effect pipeline errors
//!
//! Every error here is local to a single tick. The host keeps ticking after
//! any of them; a failed pass yields an unmodified or partially processed
//! frame.

use super::traits::{FramebufferId, ProgramId};
use super::types::EffectUniform;

/// Errors raised by parameter sets, bindings, the compositor and the controller
#[derive(Debug, Clone, PartialEq)]
pub enum EffectError {
    /// Parameter name is not part of the declared schema
    UnknownParameter(String),
    /// Parameter value is NaN or infinite
    InvalidValue { name: String, value: f32 },
    /// The shader program does not expose a declared uniform
    MissingUniform {
        effect_type: String,
        uniform: EffectUniform,
    },
    /// The pipeline has no active passes (source is copied through unmodified)
    PipelineConfig(String),
    /// Lifecycle misuse: operation called outside the `Ready` state
    NotReady(&'static str),
    /// The program handle was destroyed by the rendering collaborator
    ProgramInvalidated(ProgramId),
    /// Effect type is not registered
    UnknownEffect(String),
    /// Framebuffer handle is unknown to the backend
    UnknownFramebuffer(FramebufferId),
    /// The backend cannot run this effect (no kernel/shader for it)
    UnsupportedEffect(String),
    /// Backend-specific failure
    Backend(String),
}

impl std::fmt::Display for EffectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectError::UnknownParameter(name) => write!(f, "Unknown parameter: {}", name),
            EffectError::InvalidValue { name, value } => {
                write!(f, "Invalid value for parameter {}: {}", name, value)
            }
            EffectError::MissingUniform { effect_type, uniform } => write!(
                f,
                "Program for {} has no uniform {}",
                effect_type,
                uniform.shader_name()
            ),
            EffectError::PipelineConfig(msg) => write!(f, "Pipeline configuration error: {}", msg),
            EffectError::NotReady(state) => write!(f, "Controller not ready (state: {})", state),
            EffectError::ProgramInvalidated(id) => write!(f, "Program {} is no longer alive", id),
            EffectError::UnknownEffect(effect_type) => write!(f, "Unknown effect type: {}", effect_type),
            EffectError::UnknownFramebuffer(id) => write!(f, "Unknown framebuffer: {}", id),
            EffectError::UnsupportedEffect(effect_type) => {
                write!(f, "Effect {} is not supported by this backend", effect_type)
            }
            EffectError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for EffectError {}

impl EffectError {
    /// Whether the error leaves the frame in a usable (degraded) state
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            EffectError::MissingUniform { .. } | EffectError::PipelineConfig(_) | EffectError::ProgramInvalidated(_)
        )
    }
}
