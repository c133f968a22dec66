//! Impasto Effect
//!
//! Kuwahara filter that flattens texture into thick, paint-like strokes.

use image::RgbaImage;

use super::kernels;
use crate::effects::traits::{CpuKernel, EffectDefinition, UniformTable};
use crate::effects::types::EffectUniform;

const UNIFORMS: &[EffectUniform] = &[EffectUniform::Radius];

/// Impasto effect definition
pub struct ImpastoDefinition;

impl EffectDefinition for ImpastoDefinition {
    fn effect_type(&self) -> &'static str {
        "impasto"
    }

    fn display_name(&self) -> &'static str {
        "Impasto"
    }

    fn category(&self) -> &'static str {
        "Stylize"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn wgsl_source(&self) -> Option<&'static str> {
        Some(include_str!("../../shaders/effects/impasto.wgsl"))
    }

    fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
        Some(Box::new(ImpastoKernel))
    }
}

/// CPU kernel for the Impasto effect
pub struct ImpastoKernel;

impl CpuKernel for ImpastoKernel {
    fn effect_type(&self) -> &'static str {
        "impasto"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn process(&self, input: &RgbaImage, output: &mut RgbaImage, uniforms: &UniformTable) {
        let radius = kernels::impasto_radius(uniforms.value(EffectUniform::Radius));
        if radius == 0 {
            output.clone_from(input);
            return;
        }

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let color = kernels::kuwahara_at(input, x as i64, y as i64, radius);
            *pixel = kernels::to_rgba8(color);
        }
    }
}
