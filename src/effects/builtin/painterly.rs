//! Painterly Effect
//!
//! Single-pass combination of impasto, surface normal shading, blur and
//! vignette. Every stage samples the original input, so the result differs
//! slightly from chaining the four separate passes but needs one draw and
//! no scratch buffers.

use image::RgbaImage;

use super::kernels;
use crate::effects::traits::{CpuKernel, EffectDefinition, UniformTable};
use crate::effects::types::EffectUniform;

/// Painterly effect definition
pub struct PainterlyDefinition;

impl EffectDefinition for PainterlyDefinition {
    fn effect_type(&self) -> &'static str {
        "painterly"
    }

    fn display_name(&self) -> &'static str {
        "Painterly"
    }

    fn category(&self) -> &'static str {
        "Stylize"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        &EffectUniform::ALL
    }

    fn wgsl_source(&self) -> Option<&'static str> {
        Some(include_str!("../../shaders/effects/painterly.wgsl"))
    }

    fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
        Some(Box::new(PainterlyKernel))
    }
}

/// CPU kernel for the Painterly effect
pub struct PainterlyKernel;

impl CpuKernel for PainterlyKernel {
    fn effect_type(&self) -> &'static str {
        "painterly"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        &EffectUniform::ALL
    }

    fn process(&self, input: &RgbaImage, output: &mut RgbaImage, uniforms: &UniformTable) {
        let impasto_radius = kernels::impasto_radius(uniforms.value(EffectUniform::Radius));
        let normal_weight = uniforms.value(EffectUniform::NormalWeight);
        let blur_amount = uniforms.value(EffectUniform::BlurIntensity).clamp(0.0, 1.0);
        let blur_radius = kernels::blur_radius(blur_amount);
        let weights = kernels::gaussian_weights(blur_radius);
        let vignette_intensity = uniforms.value(EffectUniform::VignetteIntensity);
        let vignette_smoothness = uniforms.value(EffectUniform::VignetteSmoothness);
        let (width, height) = input.dimensions();

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let (sx, sy) = (x as i64, y as i64);

            let painted = kernels::kuwahara_at(input, sx, sy, impasto_radius);
            let blurred = kernels::gaussian_at(input, sx, sy, blur_radius, &weights);
            let color = painted.lerp(blurred, blur_amount);

            let factor = kernels::normal_factor_at(input, sx, sy, normal_weight)
                * kernels::vignette_factor(x, y, width, height, vignette_intensity, vignette_smoothness);
            *pixel = kernels::to_rgba8(kernels::scale_rgb(color, factor));
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn table(values: [f32; 5]) -> UniformTable {
        let mut table = UniformTable::new(&EffectUniform::ALL);
        for (uniform, value) in EffectUniform::ALL.into_iter().zip(values) {
            table.set(uniform, value);
        }
        table
    }

    #[test]
    fn test_all_zero_is_identity() {
        let input = RgbaImage::from_fn(7, 7, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 60, 255]));
        let mut output = RgbaImage::new(7, 7);
        PainterlyKernel.process(&input, &mut output, &table([0.0; 5]));
        assert_eq!(output, input);
    }

    #[test]
    fn test_solid_color_center_preserved() {
        let input = RgbaImage::from_pixel(33, 33, Rgba([120, 180, 60, 255]));
        let mut output = RgbaImage::new(33, 33);
        PainterlyKernel.process(&input, &mut output, &table([0.5, 1.0, 0.2, 0.8, 0.3]));

        assert_eq!(output.get_pixel(16, 16), input.get_pixel(16, 16));
        assert!(output.get_pixel(0, 0)[1] < 180);
    }
}
