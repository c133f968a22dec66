//! Shared per-pixel math for the built-in CPU kernels
//!
//! Sampling clamps to the edge, matching the `ClampToEdge` sampler used by
//! the WGSL versions. Colors are handled as straight RGBA in 0..1.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};
use image::{Rgba, RgbaImage};

/// Largest Kuwahara radius in pixels (at `_Radius = 1`)
pub const MAX_IMPASTO_RADIUS: f32 = 8.0;
/// Largest blur radius in pixels (at `_BlurIntensity = 1`)
pub const MAX_BLUR_RADIUS: f32 = 6.0;
/// Height-to-slope scale for the luminance normal map
pub const NORMAL_STRENGTH: f32 = 4.0;
/// A later Kuwahara quadrant must beat the best variance by this margin,
/// so ties go to the earliest quadrant regardless of float rounding
pub const KUWAHARA_TIE_EPSILON: f32 = 1e-5;

/// Light direction used for surface-normal shading (unnormalized)
const LIGHT_DIR: Vec3 = Vec3::new(-0.5, 0.5, 1.0);

/// Fetch a pixel as 0..1 floats, clamping coordinates to the image
pub fn fetch(image: &RgbaImage, x: i64, y: i64) -> Vec4 {
    let (w, h) = image.dimensions();
    let cx = x.clamp(0, w as i64 - 1) as u32;
    let cy = y.clamp(0, h as i64 - 1) as u32;
    let p = image.get_pixel(cx, cy).0;
    Vec4::new(p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32) / 255.0
}

/// Quantize a 0..1 color to RGBA8
pub fn to_rgba8(color: Vec4) -> Rgba<u8> {
    let c = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
    Rgba([c.x as u8, c.y as u8, c.z as u8, c.w as u8])
}

/// Rec. 709 luma
pub fn luminance(color: Vec4) -> f32 {
    color.xyz().dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Hermite interpolation between two edges, as in WGSL `smoothstep`
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Kuwahara radius in pixels for a `_Radius` value
pub fn impasto_radius(radius: f32) -> i64 {
    (radius.clamp(0.0, 1.0) * MAX_IMPASTO_RADIUS).round() as i64
}

/// Blur radius in pixels for a `_BlurIntensity` value
pub fn blur_radius(intensity: f32) -> i64 {
    (intensity.clamp(0.0, 1.0) * MAX_BLUR_RADIUS).round() as i64
}

/// Kuwahara filter at one pixel
///
/// Averages the quadrant with the lowest color variance, which flattens
/// texture into paint-like strokes while keeping edges. Alpha is taken
/// from the center pixel.
pub fn kuwahara_at(image: &RgbaImage, x: i64, y: i64, radius: i64) -> Vec4 {
    let center = fetch(image, x, y);
    if radius <= 0 {
        return center;
    }

    let quadrants = [(-radius, 0, -radius, 0), (0, radius, -radius, 0), (-radius, 0, 0, radius), (0, radius, 0, radius)];

    let mut best_mean = center.xyz();
    let mut best_variance = f32::INFINITY;
    for (x0, x1, y0, y1) in quadrants {
        let mut sum = Vec3::ZERO;
        let mut sum_sq = Vec3::ZERO;
        let mut count = 0.0;
        for dy in y0..=y1 {
            for dx in x0..=x1 {
                let c = fetch(image, x + dx, y + dy).xyz();
                sum += c;
                sum_sq += c * c;
                count += 1.0;
            }
        }
        let mean = sum / count;
        let variance = (sum_sq / count - mean * mean).max(Vec3::ZERO).element_sum();
        if variance < best_variance - KUWAHARA_TIE_EPSILON {
            best_variance = variance;
            best_mean = mean;
        }
    }

    best_mean.extend(center.w)
}

/// Brightness multiplier from the luminance normal map at one pixel
///
/// Flat regions return exactly 1.0 regardless of `weight`.
pub fn normal_factor_at(image: &RgbaImage, x: i64, y: i64, weight: f32) -> f32 {
    let weight = weight.clamp(0.0, 2.0);
    if weight == 0.0 {
        return 1.0;
    }

    let dx = (luminance(fetch(image, x + 1, y)) - luminance(fetch(image, x - 1, y))) * 0.5;
    let dy = (luminance(fetch(image, x, y + 1)) - luminance(fetch(image, x, y - 1))) * 0.5;
    let normal = Vec3::new(-dx * NORMAL_STRENGTH, -dy * NORMAL_STRENGTH, 1.0).normalize();
    let light = LIGHT_DIR.normalize();

    // Relative to a flat surface facing the viewer
    let shade = normal.dot(light) - light.z;
    (1.0 + weight * shade).max(0.0)
}

/// Normalized 1D Gaussian weights for offsets `-radius..=radius`
pub fn gaussian_weights(radius: i64) -> Vec<f32> {
    let sigma = (radius as f32 * 0.5).max(0.5);
    let mut weights: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= total;
    }
    weights
}

/// 2D Gaussian blur at one pixel
pub fn gaussian_at(image: &RgbaImage, x: i64, y: i64, radius: i64, weights: &[f32]) -> Vec4 {
    if radius <= 0 {
        return fetch(image, x, y);
    }
    let mut sum = Vec4::ZERO;
    for (j, wy) in (-radius..=radius).zip(weights) {
        for (i, wx) in (-radius..=radius).zip(weights) {
            sum += fetch(image, x + i, y + j) * (wx * wy);
        }
    }
    sum
}

/// Vignette brightness multiplier at one pixel
///
/// Distance is measured from the frame center and normalized so the corners
/// are at 1.0. Pixels closer than `1 - smoothness` are untouched.
pub fn vignette_factor(x: u32, y: u32, width: u32, height: u32, intensity: f32, smoothness: f32) -> f32 {
    let intensity = intensity.clamp(0.0, 1.0);
    if intensity == 0.0 {
        return 1.0;
    }
    let uv = Vec2::new(
        (x as f32 + 0.5) / width.max(1) as f32,
        (y as f32 + 0.5) / height.max(1) as f32,
    );
    let distance = (uv - Vec2::splat(0.5)).length() * std::f32::consts::SQRT_2;
    let inner = (1.0 - smoothness.clamp(0.0, 1.0)).min(0.999);
    1.0 - intensity * smoothstep(inner, 1.0, distance)
}

/// Multiply the color channels, leaving alpha alone
pub fn scale_rgb(color: Vec4, factor: f32) -> Vec4 {
    (color.xyz() * factor).extend(color.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_clamps_and_round_trips() {
        let image = RgbaImage::from_pixel(3, 3, Rgba([200, 120, 60, 255]));
        assert_eq!(to_rgba8(fetch(&image, -5, 10)), Rgba([200, 120, 60, 255]));
    }

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.7, 1.0, 0.0), 0.0);
        assert_eq!(smoothstep(0.7, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_radius_mapping() {
        assert_eq!(impasto_radius(0.0), 0);
        assert_eq!(impasto_radius(0.5), 4);
        assert_eq!(impasto_radius(3.0), 8);
        assert_eq!(blur_radius(0.2), 1);
    }

    #[test]
    fn test_gaussian_weights_normalized() {
        let weights = gaussian_weights(3);
        assert_eq!(weights.len(), 7);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(weights[3] > weights[0]);
    }

    #[test]
    fn test_vignette_factor_center_and_corner() {
        assert_eq!(vignette_factor(16, 16, 33, 33, 0.8, 0.3), 1.0);
        assert!(vignette_factor(0, 0, 33, 33, 0.8, 0.3) < 0.5);
        assert_eq!(vignette_factor(0, 0, 33, 33, 0.0, 0.3), 1.0);
    }

    #[test]
    fn test_kuwahara_tie_prefers_upper_left_quadrant() {
        // Columns step by 10; every quadrant has the same variance
        let image = RgbaImage::from_fn(9, 3, |x, _| {
            let v = (x * 10) as u8;
            Rgba([v, v, v, 255])
        });
        // Top row: y - 1 clamps onto row 0, so upper and lower quadrants match too
        let color = to_rgba8(kuwahara_at(&image, 5, 0, 1));
        assert_eq!(color, Rgba([45, 45, 45, 255]));

        let color = to_rgba8(kuwahara_at(&image, 5, 1, 1));
        assert_eq!(color, Rgba([45, 45, 45, 255]));
    }

    #[test]
    fn test_normal_factor_flat_is_identity() {
        let image = RgbaImage::from_pixel(5, 5, Rgba([90, 90, 90, 255]));
        assert_eq!(normal_factor_at(&image, 2, 2, 1.0), 1.0);
    }
}
