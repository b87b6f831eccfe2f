use candle_core::{DType, Tensor};

use crate::{Mask, MetricsError};

/// The Intersection over Union of two tensors of the same shape. Nonzero values are foreground.
///
/// Returns `0.0` when neither tensor has any foreground. The shapes are compared as given, without
/// squeezing singleton axes; different shapes are an error.
pub fn iou(mask_a: &Tensor, mask_b: &Tensor) -> Result<f64, MetricsError> {
    if mask_a.dims() != mask_b.dims() {
        return Err(MetricsError::ShapeMismatch {
            left: mask_a.dims().to_vec(),
            right: mask_b.dims().to_vec(),
        });
    }
    let a = truthy(mask_a)?;
    let b = truthy(mask_b)?;
    Ok(iou_of(a.iter().copied(), b.iter().copied()))
}

fn truthy(tensor: &Tensor) -> Result<Vec<bool>, MetricsError> {
    Ok(tensor
        .to_dtype(DType::F64)?
        .flatten_all()?
        .to_vec1::<f64>()?
        .into_iter()
        .map(|value| value != 0.0)
        .collect())
}

fn iou_of(a: impl Iterator<Item = bool>, b: impl Iterator<Item = bool>) -> f64 {
    let (intersection, union) = a.zip(b).fold((0usize, 0usize), |(both, either), (a, b)| {
        (both + usize::from(a && b), either + usize::from(a || b))
    });
    if union > 0 {
        intersection as f64 / union as f64
    } else {
        0.0
    }
}

impl Mask {
    /// The Intersection over Union of this mask with another mask of the same dimensions.
    pub fn iou(&self, other: &Mask) -> Result<f64, MetricsError> {
        if self.dims() != other.dims() {
            let (h1, w1) = self.dims();
            let (h2, w2) = other.dims();
            return Err(MetricsError::ShapeMismatch {
                left: vec![h1, w1],
                right: vec![h2, w2],
            });
        }
        Ok(iou_of(
            self.as_slice().iter().copied(),
            other.as_slice().iter().copied(),
        ))
    }
}
