//! PNG rendering of a canopy field through the heatmap gradient

use anyhow::{Context, Result};
use flux::{heatmap, FieldSample};
use image::{Rgb, RgbImage};

/// Bilinear value of the first layer at continuous node coordinates
fn sample_nodes(field: &FieldSample, x: f32, y: f32) -> f32 {
    let cols = field.cols();
    let rows = field.rows();
    let x = x.clamp(0.0, (cols - 1) as f32);
    let y = y.clamp(0.0, (rows - 1) as f32);
    let (c0, r0) = (x.floor() as usize, y.floor() as usize);
    let (c1, r1) = ((c0 + 1).min(cols - 1), (r0 + 1).min(rows - 1));
    let (fx, fy) = (x - c0 as f32, y - r0 as f32);
    let at = |c, r| field.get(c, r, 0).unwrap_or(0.0);
    let top = at(c0, r0) + (at(c1, r0) - at(c0, r0)) * fx;
    let bottom = at(c0, r1) + (at(c1, r1) - at(c0, r1)) * fx;
    top + (bottom - top) * fy
}

/// Render the first layer, `scale` pixels per grid node
///
/// Values map through the gradient as `value / max`; `max` defaults to the
/// field's own peak. Row 0 of the field is the top image row.
pub fn render(field: &FieldSample, scale: u32, max: Option<f32>) -> Result<RgbImage> {
    if field.is_empty() {
        return Ok(RgbImage::new(0, 0));
    }
    let scale = scale.max(1);
    let width = image_extent(field.cols(), scale)?;
    let height = image_extent(field.rows(), scale)?;
    width
        .checked_mul(height)
        .and_then(|pixels| pixels.checked_mul(3))
        .with_context(|| format!("heatmap of {width}x{height} pixels is too large"))?;
    let max = max.filter(|m| *m > 0.0).unwrap_or_else(|| field.peak());

    let span_x = (field.cols() - 1) as f32 / (width - 1).max(1) as f32;
    let span_y = (field.rows() - 1) as f32 / (height - 1).max(1) as f32;

    Ok(RgbImage::from_fn(width, height, |px, py| {
        let value = sample_nodes(field, px as f32 * span_x, py as f32 * span_y);
        let t = if max > 0.0 { value / max } else { 0.0 };
        let c = heatmap(t);
        Rgb([to_byte(c.x), to_byte(c.y), to_byte(c.z)])
    }))
}

/// Pixel count along one axis of `nodes` grid nodes
fn image_extent(nodes: usize, scale: u32) -> Result<u32> {
    u32::try_from(nodes)
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .with_context(|| format!("{nodes} nodes at scale {scale} overflow the image size"))
}

fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux::{glam::Vec3, Resolution, HEATMAP_STOPS};

    fn ramp() -> FieldSample {
        FieldSample::from_values(
            Resolution::grid(3, 2),
            Vec3::new(2.0, 1.0, 0.0),
            vec![0.0, 50.0, 100.0, 0.0, 50.0, 100.0],
        )
    }

    #[test]
    fn test_size_and_corners() {
        let img = render(&ramp(), 4, None).unwrap();
        assert_eq!(img.dimensions(), (12, 8));
        let low = HEATMAP_STOPS[0];
        let high = HEATMAP_STOPS[6];
        assert_eq!(img.get_pixel(0, 0).0, [to_byte(low.x), to_byte(low.y), to_byte(low.z)]);
        assert_eq!(img.get_pixel(11, 7).0, [to_byte(high.x), to_byte(high.y), to_byte(high.z)]);
    }

    #[test]
    fn test_absolute_scale() {
        // Against 200 the peak only reaches the middle stop
        let img = render(&ramp(), 1, Some(200.0)).unwrap();
        let mid = heatmap(0.5);
        assert_eq!(img.get_pixel(2, 0).0, [to_byte(mid.x), to_byte(mid.y), to_byte(mid.z)]);
    }

    #[test]
    fn test_oversized_scale_is_an_error() {
        assert!(render(&ramp(), u32::MAX, None).is_err());
        assert!(image_extent(3, u32::MAX / 2).is_err());
        assert_eq!(image_extent(3, 16).unwrap(), 48);
    }

    #[test]
    fn test_empty_field() {
        let img = render(&FieldSample::empty(), 8, None).unwrap();
        assert_eq!(img.dimensions(), (0, 0));
    }
}
