use std::f64::consts::PI;

use candle_core::Tensor;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    color_statistics, label_components, perimeter, BoundingBox, ColorStats, Connectivity, Mask,
    MetricsError,
};

/// Settings for [`compute_metrics_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSettings {
    labeling: Connectivity,
    perimeter: Connectivity,
}

impl MetricsSettings {
    /// Creates the default settings: 8-connected labeling and an 8-neighborhood perimeter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connectivity used to find the region the bounding box is taken from.
    pub fn with_labeling(mut self, connectivity: Connectivity) -> Self {
        self.labeling = connectivity;
        self
    }

    /// Set the neighborhood used to find boundary cells for the perimeter.
    pub fn with_perimeter_neighborhood(mut self, neighborhood: Connectivity) -> Self {
        self.perimeter = neighborhood;
        self
    }

    /// The connectivity used for labeling.
    pub fn labeling(&self) -> Connectivity {
        self.labeling
    }

    /// The neighborhood used for the perimeter.
    pub fn perimeter_neighborhood(&self) -> Connectivity {
        self.perimeter
    }
}

/// Shape and color descriptors of a mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskMetrics {
    /// The number of foreground pixels.
    pub area: usize,
    /// The bounding box of the first connected region (in raster order). Other regions are not
    /// included.
    pub bbox: BoundingBox,
    /// The estimated length of the boundary of the foreground.
    pub perimeter: f64,
    /// The `(row, col)` center of mass of the foreground.
    pub centroid: (f64, f64),
    /// `bbox width / bbox height`
    pub aspect_ratio: f64,
    /// `4π·area / perimeter²`, 1.0 for a perfect circle.
    pub compactness: f64,
    /// `area / bbox area`
    pub solidity: f64,
    /// The mean of each image channel under the mask.
    pub mean_color: Vec<f64>,
    /// The population variance of each image channel under the mask.
    pub var_color: Vec<f64>,
}

impl Default for MaskMetrics {
    fn default() -> Self {
        let ColorStats { mean, variance } = ColorStats::zeros();
        Self {
            area: 0,
            bbox: BoundingBox::default(),
            perimeter: 0.0,
            centroid: (0.0, 0.0),
            aspect_ratio: 0.0,
            compactness: 0.0,
            solidity: 0.0,
            mean_color: mean,
            var_color: variance,
        }
    }
}

/// The result of [`compute_metrics`].
///
/// Computing metrics never fails loudly: malformed input produces [`MetricsResult::Invalid`].
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsResult {
    /// The metrics were computed.
    Valid(MaskMetrics),
    /// The input could not be processed.
    Invalid,
}

impl MetricsResult {
    /// Returns true if the metrics were computed.
    pub fn is_valid(&self) -> bool {
        matches!(self, MetricsResult::Valid(_))
    }

    /// The computed metrics, if any.
    pub fn metrics(&self) -> Option<&MaskMetrics> {
        match self {
            MetricsResult::Valid(metrics) => Some(metrics),
            MetricsResult::Invalid => None,
        }
    }

    /// The computed metrics, or the all-zero metrics if the input was invalid.
    pub fn into_metrics(self) -> MaskMetrics {
        match self {
            MetricsResult::Valid(metrics) => metrics,
            MetricsResult::Invalid => MaskMetrics::default(),
        }
    }

    /// Like [`MetricsResult::into_metrics`] without consuming the result.
    pub fn metrics_or_default(&self) -> MaskMetrics {
        self.clone().into_metrics()
    }
}

impl From<Result<MaskMetrics, MetricsError>> for MetricsResult {
    fn from(result: Result<MaskMetrics, MetricsError>) -> Self {
        match result {
            Ok(metrics) => MetricsResult::Valid(metrics),
            Err(err) => {
                tracing::warn!("Error calculating mask metrics: {err}");
                MetricsResult::Invalid
            }
        }
    }
}

/// Serialized as a flat map of every [`MaskMetrics`] field plus a `valid` flag.
impl Serialize for MetricsResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Flat<'a> {
            #[serde(flatten)]
            metrics: &'a MaskMetrics,
            valid: bool,
        }

        let default;
        let metrics = match self {
            MetricsResult::Valid(metrics) => metrics,
            MetricsResult::Invalid => {
                default = MaskMetrics::default();
                &default
            }
        };
        Flat {
            metrics,
            valid: self.is_valid(),
        }
        .serialize(serializer)
    }
}

/// Compute the shape metrics of `mask` and, if an image with matching spatial dimensions is
/// supplied, the color statistics of the pixels under it.
///
/// `mask` may carry any number of singleton axes as long as two axes remain after squeezing them.
/// `image` is `height x width x channels`. Any error is logged and turned into
/// [`MetricsResult::Invalid`].
///
/// ```rust
/// use candle_core::{Device, Tensor};
/// use mask_metrics::compute_metrics;
///
/// let mut cells = vec![0u8; 100 * 100];
/// for row in 25..75 {
///     cells[row * 100 + 25..row * 100 + 75].fill(1);
/// }
/// let mask = Tensor::from_vec(cells, (100, 100), &Device::Cpu).unwrap();
/// let metrics = compute_metrics(&mask, None);
/// assert!(metrics.is_valid());
/// assert_eq!(metrics.into_metrics().area, 2500);
/// ```
pub fn compute_metrics(mask: &Tensor, image: Option<&Tensor>) -> MetricsResult {
    compute_metrics_with(&MetricsSettings::default(), mask, image)
}

/// [`compute_metrics`] with custom [`MetricsSettings`].
pub fn compute_metrics_with(
    settings: &MetricsSettings,
    mask: &Tensor,
    image: Option<&Tensor>,
) -> MetricsResult {
    try_compute_metrics(settings, mask, image).into()
}

/// [`compute_metrics_with`] without the failure boundary.
pub fn try_compute_metrics(
    settings: &MetricsSettings,
    mask: &Tensor,
    image: Option<&Tensor>,
) -> Result<MaskMetrics, MetricsError> {
    let mask = Mask::from_tensor(mask)?;
    mask.try_metrics(settings, image)
}

impl Mask {
    /// Compute the metrics of this mask with the default settings. See [`compute_metrics`].
    pub fn metrics(&self, image: Option<&Tensor>) -> MetricsResult {
        self.try_metrics(&MetricsSettings::default(), image).into()
    }

    /// Compute the metrics of this mask, returning any error that occurs.
    pub fn try_metrics(
        &self,
        settings: &MetricsSettings,
        image: Option<&Tensor>,
    ) -> Result<MaskMetrics, MetricsError> {
        let area = self.area();
        if area == 0 {
            return Ok(MaskMetrics::default());
        }

        let bbox = label_components(self, settings.labeling)
            .first_bbox()
            .unwrap_or_default();
        let (width, height) = (bbox.width(), bbox.height());
        let perimeter = perimeter(self, settings.perimeter);
        let centroid = center_of_mass(self);

        let aspect_ratio = if height > 0 {
            width as f64 / height as f64
        } else {
            0.0
        };
        let compactness = if perimeter > 0.0 {
            4.0 * PI * area as f64 / perimeter.powi(2)
        } else {
            0.0
        };
        let solidity = if width * height > 0 {
            area as f64 / (width * height) as f64
        } else {
            0.0
        };

        let ColorStats { mean, variance } = match image {
            Some(image) => color_statistics(self, image)?.unwrap_or_else(ColorStats::zeros),
            None => ColorStats::zeros(),
        };

        Ok(MaskMetrics {
            area,
            bbox,
            perimeter,
            centroid,
            aspect_ratio,
            compactness,
            solidity,
            mean_color: mean,
            var_color: variance,
        })
    }
}

/// The `(row, col)` center of mass of the foreground, or `(0.0, 0.0)` for an empty mask.
pub fn center_of_mass(mask: &Mask) -> (f64, f64) {
    let (count, rows, cols) = mask
        .foreground()
        .fold((0usize, 0.0, 0.0), |(count, rows, cols), (row, col)| {
            (count + 1, rows + row as f64, cols + col as f64)
        });
    if count == 0 {
        return (0.0, 0.0);
    }
    (rows / count as f64, cols / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use pretty_assertions::assert_eq;

    fn square_tensor(size: usize, range: std::ops::Range<usize>) -> Tensor {
        let mask = Mask::empty(size, size).with_rect(range.clone(), range);
        let data: Vec<f32> = mask.as_slice().iter().map(|&set| set as u8 as f32).collect();
        Tensor::from_vec(data, (size, size), &Device::Cpu).unwrap()
    }

    #[test]
    fn fifty_pixel_square() {
        let metrics = compute_metrics(&square_tensor(100, 25..75), None);
        assert!(metrics.is_valid());
        let metrics = metrics.into_metrics();
        assert_eq!(metrics.area, 2500);
        assert_eq!(metrics.bbox, BoundingBox::new(25, 25, 75, 75));
        assert_eq!(metrics.centroid, (49.5, 49.5));
        assert_eq!(metrics.aspect_ratio, 1.0);
        assert_eq!(metrics.solidity, 1.0);
        assert_eq!(metrics.perimeter, 196.0);
        let compactness = 4.0 * PI * 2500.0 / (196.0 * 196.0);
        assert!((metrics.compactness - compactness).abs() < 1e-12);
        assert_eq!(metrics.mean_color, vec![0.0; 3]);
        assert_eq!(metrics.var_color, vec![0.0; 3]);
    }

    #[test]
    fn empty_mask_defaults_but_stays_valid() {
        let mask = Tensor::zeros((32, 16), DType::U8, &Device::Cpu).unwrap();
        let result = compute_metrics(&mask, None);
        assert!(result.is_valid());
        assert_eq!(result.into_metrics(), MaskMetrics::default());
    }

    #[test]
    fn single_pixel() {
        let mask = Mask::empty(9, 9).with_rect(4..5, 6..7);
        let metrics = mask.metrics(None).into_metrics();
        assert_eq!(metrics.area, 1);
        assert_eq!(metrics.bbox, BoundingBox::new(4, 6, 5, 7));
        assert_eq!(metrics.centroid, (4.0, 6.0));
        assert_eq!(metrics.aspect_ratio, 1.0);
        assert_eq!(metrics.solidity, 1.0);
        assert_eq!(metrics.perimeter, 0.0);
        assert_eq!(metrics.compactness, 0.0);
    }

    #[test]
    fn rectangle_touching_the_border() {
        let mask = Mask::empty(10, 10).with_rect(0..4, 2..10);
        let metrics = mask.metrics(None).into_metrics();
        assert_eq!(metrics.bbox, BoundingBox::new(0, 2, 4, 10));
        assert_eq!(metrics.aspect_ratio, 2.0);
        assert_eq!(metrics.solidity, 1.0);
        assert_eq!(metrics.perimeter, 20.0);
    }

    #[test]
    fn only_the_first_region_is_boxed() {
        let mask = Mask::empty(20, 20).with_rect(1..4, 1..4).with_rect(10..18, 10..14);
        let metrics = mask.metrics(None).into_metrics();
        assert_eq!(metrics.area, 9 + 32);
        assert_eq!(metrics.bbox, BoundingBox::new(1, 1, 4, 4));
        // Solidity compares the whole area against the first region's box.
        assert_eq!(metrics.solidity, 41.0 / 9.0);
        // The centroid still covers every region.
        let (row, col) = metrics.centroid;
        assert!((row - (9.0 * 2.0 + 32.0 * 13.5) / 41.0).abs() < 1e-12);
        assert!((col - (9.0 * 2.0 + 32.0 * 11.5) / 41.0).abs() < 1e-12);
    }

    #[test]
    fn labeling_connectivity_changes_the_first_region() {
        let mask = Mask::from_fn(4, 4, |row, col| row == col);
        let eight = mask.try_metrics(&MetricsSettings::new(), None).unwrap();
        assert_eq!(eight.bbox, BoundingBox::new(0, 0, 4, 4));
        let four = mask
            .try_metrics(&MetricsSettings::new().with_labeling(Connectivity::Four), None)
            .unwrap();
        assert_eq!(four.bbox, BoundingBox::new(0, 0, 1, 1));
    }

    #[test]
    fn singleton_axes_are_squeezed() {
        let mask = square_tensor(12, 3..7).unsqueeze(0).unwrap().unsqueeze(3).unwrap();
        assert_eq!(mask.dims(), &[1, 12, 12, 1]);
        let metrics = compute_metrics(&mask, None).into_metrics();
        assert_eq!(metrics.area, 16);
    }

    #[test]
    fn malformed_mask_is_invalid() {
        let mask = Tensor::ones((2, 8, 8), DType::U8, &Device::Cpu).unwrap();
        let result = compute_metrics(&mask, None);
        assert_eq!(result, MetricsResult::Invalid);
        assert_eq!(result.metrics_or_default(), MaskMetrics::default());
        assert!(matches!(
            try_compute_metrics(&MetricsSettings::default(), &mask, None),
            Err(MetricsError::InvalidMaskRank(_))
        ));
    }

    #[test]
    fn color_statistics_follow_the_image() {
        let mask = square_tensor(8, 2..6);
        let image = Tensor::ones((8, 8, 3), DType::F32, &Device::Cpu)
            .unwrap()
            .affine(1.0, 4.0)
            .unwrap();
        let metrics = compute_metrics(&mask, Some(&image)).into_metrics();
        assert_eq!(metrics.mean_color, vec![5.0, 5.0, 5.0]);
        assert_eq!(metrics.var_color, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn mismatched_image_keeps_result_valid() {
        let mask = square_tensor(8, 2..6);
        let image = Tensor::ones((7, 8, 3), DType::F32, &Device::Cpu).unwrap();
        let result = compute_metrics(&mask, Some(&image));
        assert!(result.is_valid());
        let metrics = result.into_metrics();
        assert_eq!(metrics.area, 16);
        assert_eq!(metrics.mean_color, vec![0.0; 3]);
        assert_eq!(metrics.var_color, vec![0.0; 3]);
    }

    #[test]
    fn serializes_as_flat_mapping() {
        let json = serde_json::to_value(MetricsResult::Invalid).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "area": 0,
                "bbox": [0, 0, 0, 0],
                "perimeter": 0.0,
                "centroid": [0.0, 0.0],
                "aspect_ratio": 0.0,
                "compactness": 0.0,
                "solidity": 0.0,
                "mean_color": [0.0, 0.0, 0.0],
                "var_color": [0.0, 0.0, 0.0],
                "valid": false,
            })
        );
        let valid = compute_metrics(&square_tensor(10, 2..4), None);
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json["valid"], true);
        assert_eq!(json["area"], 4);
        assert_eq!(json["bbox"], serde_json::json!([2, 2, 4, 4]));
    }
}
