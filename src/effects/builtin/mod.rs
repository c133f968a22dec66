//! Built-in effects
//!
//! This module contains the painterly post-processing passes that ship with
//! the compositor.

mod blur;
mod impasto;
pub(crate) mod kernels;
mod painterly;
mod surface_normal;
mod vignette;

pub use blur::{BlurDefinition, BlurKernel};
pub use impasto::{ImpastoDefinition, ImpastoKernel};
pub use painterly::{PainterlyDefinition, PainterlyKernel};
pub use surface_normal::{SurfaceNormalDefinition, SurfaceNormalKernel};
pub use vignette::{VignetteDefinition, VignetteKernel};

use super::EffectRegistry;

/// Default pass order: impasto, surface normal, blur, vignette
pub const DEFAULT_CHAIN: [&str; 4] = ["impasto", "surface_normal", "blur", "vignette"];

/// Register all built-in effects with the registry
pub fn register_builtin_effects(registry: &mut EffectRegistry) {
    registry.register(ImpastoDefinition);
    registry.register(SurfaceNormalDefinition);
    registry.register(BlurDefinition);
    registry.register(VignetteDefinition);
    registry.register(PainterlyDefinition);
}
