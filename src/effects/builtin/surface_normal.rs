//! Surface Normal Effect
//!
//! Treats luminance as a height field and shades the frame with the derived
//! normals, giving brush strokes relief. Flat regions are left untouched.

use image::RgbaImage;

use super::kernels;
use crate::effects::traits::{CpuKernel, EffectDefinition, UniformTable};
use crate::effects::types::EffectUniform;

const UNIFORMS: &[EffectUniform] = &[EffectUniform::NormalWeight];

/// Surface normal effect definition
pub struct SurfaceNormalDefinition;

impl EffectDefinition for SurfaceNormalDefinition {
    fn effect_type(&self) -> &'static str {
        "surface_normal"
    }

    fn display_name(&self) -> &'static str {
        "Surface Normal"
    }

    fn category(&self) -> &'static str {
        "Stylize"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn wgsl_source(&self) -> Option<&'static str> {
        Some(include_str!("../../shaders/effects/surface_normal.wgsl"))
    }

    fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
        Some(Box::new(SurfaceNormalKernel))
    }
}

/// CPU kernel for the Surface Normal effect
pub struct SurfaceNormalKernel;

impl CpuKernel for SurfaceNormalKernel {
    fn effect_type(&self) -> &'static str {
        "surface_normal"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn process(&self, input: &RgbaImage, output: &mut RgbaImage, uniforms: &UniformTable) {
        let weight = uniforms.value(EffectUniform::NormalWeight);
        if weight <= 0.0 {
            output.clone_from(input);
            return;
        }

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let (x, y) = (x as i64, y as i64);
            let factor = kernels::normal_factor_at(input, x, y, weight);
            *pixel = kernels::to_rgba8(kernels::scale_rgb(kernels::fetch(input, x, y), factor));
        }
    }
}
