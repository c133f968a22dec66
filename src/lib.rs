//! Effect Compositor Library
//!
//! Engine-independent full-screen image effects: a named parameter set is
//! mapped onto shader uniforms and an ordered chain of passes is applied to
//! a source framebuffer each frame. Ships a CPU backend and a wgpu backend.

pub mod cpu;
pub mod effects;
pub mod gpu;
pub mod settings;
pub mod shaders;
pub mod telemetry;

pub use cpu::CpuBackend;
pub use effects::{
    EffectController, EffectDefinition, EffectError, EffectRegistry, FrameCompositor, FramebufferId, ImageTransfer,
    ParameterSet, ParameterSnapshot, ProgramId, RenderBackend, TickReport,
};
pub use gpu::{GpuContext, GpuError, WgpuBackend};
pub use settings::{EffectSettings, SettingsError};
