//! Effect traits and backend interfaces
//!
//! This module defines the seams between the compositor and the outside world:
//! - `RenderBackend` - the external rendering collaborator (framebuffers, programs, draws)
//! - `ImageTransfer` - host-side upload/readback of framebuffer contents
//! - `EffectDefinition` - factory trait describing one effect pass
//! - `CpuKernel` - software implementation of an effect pass

use image::RgbaImage;

use super::error::EffectError;
use super::types::EffectUniform;

/// Maximum number of uniforms a single program can declare
pub const MAX_UNIFORMS: usize = 12;

/// Opaque framebuffer handle issued by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

impl std::fmt::Display for FramebufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fb#{}", self.0)
    }
}

/// Opaque shader program handle issued by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

impl std::fmt::Display for ProgramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Uniform storage of one shader program
///
/// Holds only the uniforms the program actually exposes. Values start at
/// `0.0` and keep their last written value until overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformTable {
    uniforms: Vec<EffectUniform>,
    values: Vec<f32>,
}

impl UniformTable {
    /// Create a table for the given uniforms (duplicates dropped, capped at `MAX_UNIFORMS`)
    pub fn new(uniforms: &[EffectUniform]) -> Self {
        let mut declared: Vec<EffectUniform> = Vec::with_capacity(uniforms.len());
        for uniform in uniforms {
            if !declared.contains(uniform) {
                declared.push(*uniform);
            }
        }
        declared.truncate(MAX_UNIFORMS);
        let values = vec![0.0; declared.len()];
        Self {
            uniforms: declared,
            values,
        }
    }

    /// Check whether the program exposes a uniform
    pub fn contains(&self, uniform: EffectUniform) -> bool {
        self.uniforms.contains(&uniform)
    }

    /// Get a uniform's current value
    pub fn get(&self, uniform: EffectUniform) -> Option<f32> {
        self.slot(uniform).map(|i| self.values[i])
    }

    /// Get a uniform's current value, `0.0` if the program does not expose it
    pub fn value(&self, uniform: EffectUniform) -> f32 {
        self.get(uniform).unwrap_or(0.0)
    }

    /// Write a uniform; returns false if the program does not expose it
    pub fn set(&mut self, uniform: EffectUniform, value: f32) -> bool {
        match self.slot(uniform) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Uniforms in slot order
    pub fn uniforms(&self) -> &[EffectUniform] {
        &self.uniforms
    }

    /// Slot index of a uniform
    pub fn slot(&self, uniform: EffectUniform) -> Option<usize> {
        self.uniforms.iter().position(|u| *u == uniform)
    }

    /// Pack values in slot order for GPU upload
    pub fn pack(&self) -> [f32; MAX_UNIFORMS] {
        let mut packed = [0.0; MAX_UNIFORMS];
        for (dst, src) in packed.iter_mut().zip(self.values.iter()) {
            *dst = *src;
        }
        packed
    }
}

/// Uniform block passed to effect shaders
///
/// Laid out for direct GPU transfer: texel size and resolution followed by
/// the program's uniform slots (3 vec4s).
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EffectParams {
    /// 1 / output size in pixels
    pub texel_size: [f32; 2],
    /// Output size in pixels
    pub resolution: [f32; 2],
    /// Uniform values in slot order
    pub params: [f32; MAX_UNIFORMS],
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            texel_size: [1.0, 1.0],
            resolution: [1.0, 1.0],
            params: [0.0; MAX_UNIFORMS],
        }
    }
}

impl EffectParams {
    /// Create params for an output of the given size
    pub fn new(width: u32, height: u32, uniforms: &UniformTable) -> Self {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        Self {
            texel_size: [1.0 / w, 1.0 / h],
            resolution: [w, h],
            params: uniforms.pack(),
        }
    }
}

/// Trait for effect definitions (factory pattern)
///
/// Each effect pass implements this trait to describe itself and to create
/// backend programs. Definitions are registered with the `EffectRegistry`.
pub trait EffectDefinition: Send + Sync {
    /// Unique identifier for this effect type (e.g., "vignette")
    fn effect_type(&self) -> &'static str;

    /// Human-readable display name
    fn display_name(&self) -> &'static str;

    /// Category for grouping (e.g., "Stylize", "Blur", "Lens")
    fn category(&self) -> &'static str;

    /// Uniforms the pass is bound with, in slot order
    fn uniforms(&self) -> &'static [EffectUniform];

    /// WGSL fragment source (without the fullscreen vertex stage)
    ///
    /// Returns None if the effect has no GPU implementation.
    fn wgsl_source(&self) -> Option<&'static str>;

    /// Create a CPU kernel for this effect
    ///
    /// Returns None if the effect has no CPU implementation.
    fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>>;
}

/// Software implementation of an effect pass
///
/// Reads an RGBA8 input image and writes an RGBA8 output image of the same
/// size. Uniforms the kernel reads are listed by `uniforms()`; a uniform the
/// kernel does not expose is never written by bindings.
pub trait CpuKernel: Send {
    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Uniforms this kernel exposes
    fn uniforms(&self) -> &'static [EffectUniform];

    /// Process a frame through the effect
    fn process(&self, input: &RgbaImage, output: &mut RgbaImage, uniforms: &UniformTable);
}

/// The rendering collaborator the compositor drives
///
/// Owns every framebuffer and program; callers only hold the handles.
pub trait RenderBackend {
    /// Allocate a framebuffer
    fn create_framebuffer(&mut self, width: u32, height: u32, label: &str) -> Result<FramebufferId, EffectError>;

    /// Free a framebuffer (unknown handles are ignored)
    fn release_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Size of a framebuffer, None if the handle is unknown
    fn framebuffer_size(&self, framebuffer: FramebufferId) -> Option<(u32, u32)>;

    /// Build a program for an effect definition
    fn create_program(&mut self, definition: &dyn EffectDefinition) -> Result<ProgramId, EffectError>;

    /// Destroy a program; bindings referencing it become invalid
    fn destroy_program(&mut self, program: ProgramId);

    /// Uniform table of a live program
    fn uniforms(&self, program: ProgramId) -> Option<&UniformTable>;

    /// Mutable uniform table of a live program
    fn uniforms_mut(&mut self, program: ProgramId) -> Option<&mut UniformTable>;

    /// Draw one full-screen pass reading `input` and writing `output`
    fn draw_fullscreen(
        &mut self,
        program: ProgramId,
        input: FramebufferId,
        output: FramebufferId,
    ) -> Result<(), EffectError>;

    /// Copy `input` to `output` unmodified (scaled if sizes differ)
    fn blit(&mut self, input: FramebufferId, output: FramebufferId) -> Result<(), EffectError>;
}

/// Host-side access to framebuffer contents
pub trait ImageTransfer {
    /// Replace the framebuffer contents with an image of the same size
    fn upload(&mut self, framebuffer: FramebufferId, image: &RgbaImage) -> Result<(), EffectError>;

    /// Read the framebuffer contents back
    fn download(&mut self, framebuffer: FramebufferId) -> Result<RgbaImage, EffectError>;
}
