//! # Mask Metrics
//!
//! Shape, color and overlap metrics for binary segmentation masks.
//!
//! ## Usage
//!
//! ```rust
//! use mask_metrics::*;
//!
//! let predicted = Mask::empty(100, 100).with_rect(25..75, 25..75);
//! let ground_truth = Mask::empty(100, 100).with_rect(30..75, 25..75);
//!
//! let metrics = predicted.metrics(None);
//! match &metrics {
//!     MetricsResult::Valid(metrics) => println!("area: {}", metrics.area),
//!     MetricsResult::Invalid => println!("could not read the mask"),
//! }
//!
//! let overlap = predicted.iou(&ground_truth).unwrap();
//! assert_eq!(overlap, 0.9);
//! ```

#![warn(missing_docs)]

mod color;
mod error;
mod iou;
mod label;
mod mask;
mod metrics;
mod perimeter;

pub use color::*;
pub use error::*;
pub use iou::*;
pub use label::*;
pub use mask::*;
pub use metrics::*;
pub use perimeter::*;
