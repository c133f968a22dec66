//! Vignette Effect
//!
//! Darkens the frame towards its corners. The center of the frame is never
//! touched; `_VignetteSmoothness` widens the falloff band inward from the
//! corners.

use image::RgbaImage;

use super::kernels;
use crate::effects::traits::{CpuKernel, EffectDefinition, UniformTable};
use crate::effects::types::EffectUniform;

const UNIFORMS: &[EffectUniform] = &[EffectUniform::VignetteIntensity, EffectUniform::VignetteSmoothness];

/// Vignette effect definition
pub struct VignetteDefinition;

impl EffectDefinition for VignetteDefinition {
    fn effect_type(&self) -> &'static str {
        "vignette"
    }

    fn display_name(&self) -> &'static str {
        "Vignette"
    }

    fn category(&self) -> &'static str {
        "Lens"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn wgsl_source(&self) -> Option<&'static str> {
        Some(include_str!("../../shaders/effects/vignette.wgsl"))
    }

    fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
        Some(Box::new(VignetteKernel))
    }
}

/// CPU kernel for the Vignette effect
pub struct VignetteKernel;

impl CpuKernel for VignetteKernel {
    fn effect_type(&self) -> &'static str {
        "vignette"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn process(&self, input: &RgbaImage, output: &mut RgbaImage, uniforms: &UniformTable) {
        let intensity = uniforms.value(EffectUniform::VignetteIntensity);
        let smoothness = uniforms.value(EffectUniform::VignetteSmoothness);
        let (width, height) = input.dimensions();

        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let factor = kernels::vignette_factor(x, y, width, height, intensity, smoothness);
            let color = kernels::fetch(input, x as i64, y as i64);
            *pixel = kernels::to_rgba8(kernels::scale_rgb(color, factor));
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn table(intensity: f32, smoothness: f32) -> UniformTable {
        let mut table = UniformTable::new(UNIFORMS);
        table.set(EffectUniform::VignetteIntensity, intensity);
        table.set(EffectUniform::VignetteSmoothness, smoothness);
        table
    }

    #[test]
    fn test_center_unchanged_corners_darker() {
        let input = RgbaImage::from_pixel(33, 33, Rgba([200, 150, 100, 255]));
        let mut output = RgbaImage::new(33, 33);
        VignetteKernel.process(&input, &mut output, &table(0.8, 0.3));

        assert_eq!(output.get_pixel(16, 16), input.get_pixel(16, 16));
        for (x, y) in [(0, 0), (32, 0), (0, 32), (32, 32)] {
            let corner = output.get_pixel(x, y);
            assert!(corner[0] < 200 && corner[1] < 150 && corner[2] < 100);
            assert_eq!(corner[3], 255);
        }
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let input = RgbaImage::from_fn(9, 9, |x, y| Rgba([(x * 25) as u8, (y * 25) as u8, 90, 255]));
        let mut output = RgbaImage::new(9, 9);
        VignetteKernel.process(&input, &mut output, &table(0.0, 1.0));
        assert_eq!(output, input);
    }

    #[test]
    fn test_smoothness_widens_falloff() {
        let input = RgbaImage::from_pixel(33, 33, Rgba([200, 200, 200, 255]));
        let mut narrow = RgbaImage::new(33, 33);
        let mut wide = RgbaImage::new(33, 33);
        VignetteKernel.process(&input, &mut narrow, &table(1.0, 0.1));
        VignetteKernel.process(&input, &mut wide, &table(1.0, 0.9));

        // Halfway to the corner only the wide falloff reaches
        assert_eq!(narrow.get_pixel(8, 8)[0], 200);
        assert!(wide.get_pixel(8, 8)[0] < 200);
    }
}
