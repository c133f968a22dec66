//! Blur Effect
//!
//! Separable Gaussian blur that softens brush strokes.

use glam::Vec4;
use image::RgbaImage;

use super::kernels;
use crate::effects::traits::{CpuKernel, EffectDefinition, UniformTable};
use crate::effects::types::EffectUniform;

const UNIFORMS: &[EffectUniform] = &[EffectUniform::BlurIntensity];

/// Blur effect definition
pub struct BlurDefinition;

impl EffectDefinition for BlurDefinition {
    fn effect_type(&self) -> &'static str {
        "blur"
    }

    fn display_name(&self) -> &'static str {
        "Blur"
    }

    fn category(&self) -> &'static str {
        "Blur"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn wgsl_source(&self) -> Option<&'static str> {
        Some(include_str!("../../shaders/effects/blur.wgsl"))
    }

    fn create_cpu_kernel(&self) -> Option<Box<dyn CpuKernel>> {
        Some(Box::new(BlurKernel))
    }
}

/// CPU kernel for the Blur effect
pub struct BlurKernel;

impl CpuKernel for BlurKernel {
    fn effect_type(&self) -> &'static str {
        "blur"
    }

    fn uniforms(&self) -> &'static [EffectUniform] {
        UNIFORMS
    }

    fn process(&self, input: &RgbaImage, output: &mut RgbaImage, uniforms: &UniformTable) {
        let radius = kernels::blur_radius(uniforms.value(EffectUniform::BlurIntensity));
        if radius == 0 {
            output.clone_from(input);
            return;
        }

        let weights = kernels::gaussian_weights(radius);
        let (width, height) = input.dimensions();

        // Horizontal pass into a float buffer
        let mut horizontal = vec![Vec4::ZERO; (width * height) as usize];
        for y in 0..height as i64 {
            for x in 0..width as i64 {
                let mut sum = Vec4::ZERO;
                for (offset, weight) in (-radius..=radius).zip(&weights) {
                    sum += kernels::fetch(input, x + offset, y) * *weight;
                }
                horizontal[(y * width as i64 + x) as usize] = sum;
            }
        }

        // Vertical pass, clamping rows to the edge
        let row = |y: i64| y.clamp(0, height as i64 - 1) as usize * width as usize;
        for (x, y, pixel) in output.enumerate_pixels_mut() {
            let mut sum = Vec4::ZERO;
            for (offset, weight) in (-radius..=radius).zip(&weights) {
                sum += horizontal[row(y as i64 + offset) + x as usize] * *weight;
            }
            *pixel = kernels::to_rgba8(sum);
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;

    use super::*;

    fn table(intensity: f32) -> UniformTable {
        let mut table = UniformTable::new(UNIFORMS);
        table.set(EffectUniform::BlurIntensity, intensity);
        table
    }

    #[test]
    fn test_zero_intensity_is_identity() {
        let input = RgbaImage::from_fn(5, 5, |x, y| Rgba([(x * 50) as u8, (y * 50) as u8, 0, 255]));
        let mut output = RgbaImage::new(5, 5);
        BlurKernel.process(&input, &mut output, &table(0.0));
        assert_eq!(output, input);
    }

    #[test]
    fn test_solid_color_unchanged() {
        let input = RgbaImage::from_pixel(10, 10, Rgba([77, 150, 222, 255]));
        let mut output = RgbaImage::new(10, 10);
        BlurKernel.process(&input, &mut output, &table(1.0));
        assert_eq!(output, input);
    }

    #[test]
    fn test_spreads_bright_pixel() {
        let mut input = RgbaImage::from_pixel(11, 11, Rgba([0, 0, 0, 255]));
        input.put_pixel(5, 5, Rgba([255, 255, 255, 255]));
        let mut output = RgbaImage::new(11, 11);
        BlurKernel.process(&input, &mut output, &table(0.5));

        let center = output.get_pixel(5, 5)[0];
        let neighbor = output.get_pixel(6, 5)[0];
        assert!(center < 255);
        assert!(neighbor > 0);
        assert!(center > neighbor);
        // Symmetric kernel
        assert_eq!(output.get_pixel(4, 5), output.get_pixel(6, 5));
        assert_eq!(output.get_pixel(5, 4), output.get_pixel(5, 6));
    }
}
