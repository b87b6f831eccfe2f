use std::fmt::Debug;
use std::ops::Range;

use candle_core::{DType, Tensor};
use image::GrayImage;

use crate::MetricsError;

/// A two dimensional binary mask stored in row-major order.
#[derive(Clone, PartialEq, Eq)]
pub struct Mask {
    height: usize,
    width: usize,
    data: Vec<bool>,
}

impl Debug for Mask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mask")
            .field("height", &self.height)
            .field("width", &self.width)
            .field("area", &self.area())
            .finish()
    }
}

impl Mask {
    /// Create a mask from row-major cells.
    pub fn new(height: usize, width: usize, data: Vec<bool>) -> Result<Self, MetricsError> {
        let expected = height * width;
        if data.len() != expected {
            return Err(MetricsError::InvalidMaskLength {
                height,
                width,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            data,
        })
    }

    /// Create a mask with every cell unset.
    pub fn empty(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            data: vec![false; height * width],
        }
    }

    /// Create a mask by evaluating `f(row, col)` for every cell.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self {
            height,
            width,
            data,
        }
    }

    /// Read a mask from a tensor of any dtype. Every axis of size one is squeezed away and
    /// exactly two axes must remain. Nonzero values are foreground.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self, MetricsError> {
        Self::from_tensor_with(tensor, |value| value != 0.0)
    }

    /// Threshold a tensor of mask logits: cells strictly above `threshold` are foreground.
    pub fn from_logits(logits: &Tensor, threshold: f32) -> Result<Self, MetricsError> {
        let threshold = threshold as f64;
        Self::from_tensor_with(logits, |value| value > threshold)
    }

    fn from_tensor_with(
        tensor: &Tensor,
        mut is_set: impl FnMut(f64) -> bool,
    ) -> Result<Self, MetricsError> {
        let (height, width) = squeezed_dims(tensor.dims())?;
        let values = tensor
            .to_dtype(DType::F64)?
            .flatten_all()?
            .to_vec1::<f64>()?;
        let data = values.into_iter().map(&mut is_set).collect();
        Self::new(height, width, data)
    }

    /// Read a mask from a grayscale image. Nonzero pixels are foreground.
    pub fn from_luma(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            height: height as usize,
            width: width as usize,
            data: image.as_raw().iter().map(|&pixel| pixel != 0).collect(),
        }
    }

    /// Convert the mask into a grayscale image with foreground pixels set to 255.
    ///
    /// Fails if either dimension does not fit in a `u32`.
    pub fn to_luma(&self) -> Result<GrayImage, MetricsError> {
        let too_large = || MetricsError::ImageTooLarge {
            height: self.height,
            width: self.width,
        };
        let width = u32::try_from(self.width).map_err(|_| too_large())?;
        let height = u32::try_from(self.height).map_err(|_| too_large())?;
        let pixels = self.data.iter().map(|&set| if set { 255 } else { 0 }).collect();
        GrayImage::from_raw(width, height, pixels).ok_or_else(too_large)
    }

    /// Set every cell inside the given row and column ranges. Ranges are clipped to the mask.
    pub fn fill_rect(&mut self, rows: Range<usize>, cols: Range<usize>) {
        let rows = rows.start.min(self.height)..rows.end.min(self.height);
        let cols = cols.start.min(self.width)..cols.end.min(self.width);
        if cols.is_empty() {
            return;
        }
        for row in rows {
            let start = row * self.width;
            self.data[start + cols.start..start + cols.end].fill(true);
        }
    }

    /// Builder style version of [`Mask::fill_rect`].
    pub fn with_rect(mut self, rows: Range<usize>, cols: Range<usize>) -> Self {
        self.fill_rect(rows, cols);
        self
    }

    /// The number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// `(height, width)`
    pub fn dims(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Returns the cell at `(row, col)`, or `false` outside of the mask.
    pub fn get(&self, row: usize, col: usize) -> bool {
        row < self.height && col < self.width && self.data[row * self.width + col]
    }

    /// Like [`Mask::get`], but accepts signed coordinates so neighbors of border cells can be
    /// looked up directly.
    pub(crate) fn get_signed(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && self.get(row as usize, col as usize)
    }

    /// The row-major cells of the mask.
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// The number of foreground cells.
    pub fn area(&self) -> usize {
        self.data.iter().filter(|&&set| set).count()
    }

    /// Returns true if no cell is set.
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|&set| set)
    }

    /// Iterate over the `(row, col)` coordinates of foreground cells in raster order.
    pub fn foreground(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let width = self.width;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &set)| set)
            .map(move |(index, _)| (index / width, index % width))
    }
}

/// Remove every axis of size one and check that exactly two axes remain.
pub(crate) fn squeezed_dims(dims: &[usize]) -> Result<(usize, usize), MetricsError> {
    let squeezed: Vec<usize> = dims.iter().copied().filter(|&dim| dim != 1).collect();
    match squeezed.as_slice() {
        [height, width] => Ok((*height, *width)),
        _ => Err(MetricsError::InvalidMaskRank(dims.to_vec())),
    }
}
