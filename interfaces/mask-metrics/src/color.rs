use candle_core::{DType, Device, Tensor};
use image::RgbImage;

use crate::{Mask, MetricsError};

/// Per channel statistics of the image pixels under a mask.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorStats {
    /// The mean of each channel.
    pub mean: Vec<f64>,
    /// The population variance of each channel.
    pub variance: Vec<f64>,
}

impl ColorStats {
    /// The statistics reported when no pixel could be sampled.
    pub fn zeros() -> Self {
        Self {
            mean: vec![0.0; 3],
            variance: vec![0.0; 3],
        }
    }
}

/// Returns true if the first two axes of the image match the mask.
pub fn image_matches(mask: &Mask, image_dims: &[usize]) -> bool {
    matches!(image_dims, [height, width, ..] if (*height, *width) == mask.dims())
}

/// Compute the mean and variance of every channel of `image` under `mask`.
///
/// The image is laid out as `height x width x channels...`; trailing axes are flattened into
/// channels and a two dimensional image has a single channel. Returns `Ok(None)` if the spatial
/// shape of the image does not match the mask or if the mask is empty.
pub fn color_statistics(mask: &Mask, image: &Tensor) -> Result<Option<ColorStats>, MetricsError> {
    let dims = image.dims();
    if !image_matches(mask, dims) {
        tracing::debug!(
            "Skipping color statistics: image shape {:?} does not match mask {:?}",
            dims,
            mask.dims()
        );
        return Ok(None);
    }
    let area = mask.area();
    if area == 0 {
        return Ok(None);
    }
    let channels: usize = dims[2..].iter().product();
    if channels == 0 {
        return Ok(None);
    }
    let pixels = image.to_dtype(DType::F64)?.flatten_all()?.to_vec1::<f64>()?;

    let count = area as f64;
    let mut mean = vec![0.0; channels];
    for pixel in masked_pixels(mask, &pixels, channels) {
        for (sum, value) in mean.iter_mut().zip(pixel) {
            *sum += value;
        }
    }
    mean.iter_mut().for_each(|sum| *sum /= count);

    let mut variance = vec![0.0; channels];
    for pixel in masked_pixels(mask, &pixels, channels) {
        for ((sum, value), mean) in variance.iter_mut().zip(pixel).zip(&mean) {
            *sum += (value - mean).powi(2);
        }
    }
    variance.iter_mut().for_each(|sum| *sum /= count);

    Ok(Some(ColorStats { mean, variance }))
}

fn masked_pixels<'a>(
    mask: &'a Mask,
    pixels: &'a [f64],
    channels: usize,
) -> impl Iterator<Item = &'a [f64]> + 'a {
    mask.as_slice()
        .iter()
        .zip(pixels.chunks_exact(channels))
        .filter(|(&set, _)| set)
        .map(|(_, pixel)| pixel)
}

/// Convert an RGB image into a `height x width x 3` tensor of bytes.
pub fn rgb_image_to_tensor(image: &RgbImage, device: &Device) -> Result<Tensor, MetricsError> {
    let (width, height) = image.dimensions();
    let data = image.as_raw().clone();
    Ok(Tensor::from_vec(
        data,
        (height as usize, width as usize, 3),
        device,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use pretty_assertions::assert_eq;

    #[test]
    fn uniform_color_has_zero_variance() {
        let image = RgbImage::from_pixel(6, 4, Rgb([10, 20, 30]));
        let tensor = rgb_image_to_tensor(&image, &Device::Cpu).unwrap();
        let mask = Mask::empty(4, 6).with_rect(1..3, 1..5);
        let stats = color_statistics(&mask, &tensor).unwrap().unwrap();
        assert_eq!(stats.mean, vec![10.0, 20.0, 30.0]);
        assert_eq!(stats.variance, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn only_masked_pixels_are_sampled() {
        let mut image = RgbImage::from_pixel(4, 2, Rgb([0, 0, 255]));
        image.put_pixel(0, 0, Rgb([200, 0, 0]));
        image.put_pixel(1, 0, Rgb([100, 0, 0]));
        let tensor = rgb_image_to_tensor(&image, &Device::Cpu).unwrap();
        let mask = Mask::empty(2, 4).with_rect(0..1, 0..2);
        let stats = color_statistics(&mask, &tensor).unwrap().unwrap();
        assert_eq!(stats.mean, vec![150.0, 0.0, 0.0]);
        assert_eq!(stats.variance, vec![2500.0, 0.0, 0.0]);
    }

    #[test]
    fn mismatched_shape_is_skipped() {
        let tensor = Tensor::zeros((5, 5, 3), DType::U8, &Device::Cpu).unwrap();
        let mask = Mask::empty(4, 4).with_rect(0..2, 0..2);
        assert_eq!(color_statistics(&mask, &tensor).unwrap(), None);
    }

    #[test]
    fn empty_mask_is_skipped() {
        let tensor = Tensor::ones((4, 4, 3), DType::F32, &Device::Cpu).unwrap();
        assert_eq!(color_statistics(&Mask::empty(4, 4), &tensor).unwrap(), None);
    }

    #[test]
    fn grayscale_image_has_one_channel() {
        let tensor = Tensor::new(&[[1.0f32, 3.0], [5.0, 7.0]], &Device::Cpu).unwrap();
        let mask = Mask::from_fn(2, 2, |row, _| row == 0);
        let stats = color_statistics(&mask, &tensor).unwrap().unwrap();
        assert_eq!(stats.mean, vec![2.0]);
        assert_eq!(stats.variance, vec![1.0]);
    }
}
