//! Boundary length estimation using the classic weighted pixel-perimeter approximation.
//!
//! The boundary of a mask is every foreground cell that does not survive an erosion with the
//! neighborhood footprint (cells outside of the grid count as background). Each boundary cell is
//! then given a code by convolving the boundary image with
//!
//! ```text
//! 10  2 10
//!  2  1  2
//! 10  2 10
//! ```
//!
//! and each code contributes a fixed length: straight runs weigh 1, diagonal steps weigh √2 and
//! corners between the two weigh (1 + √2) / 2.

use std::f64::consts::SQRT_2;

use crate::{Connectivity, Mask};

const KERNEL: [[u8; 3]; 3] = [[10, 2, 10], [2, 1, 2], [10, 2, 10]];

fn code_weight(code: u8) -> f64 {
    match code {
        5 | 7 | 15 | 17 | 25 | 27 => 1.0,
        21 | 33 => SQRT_2,
        13 | 23 => (1.0 + SQRT_2) / 2.0,
        _ => 0.0,
    }
}

/// Foreground cells that are lost when eroding with the footprint of `neighborhood`.
pub fn boundary(mask: &Mask, neighborhood: Connectivity) -> Mask {
    let (height, width) = mask.dims();
    Mask::from_fn(height, width, |row, col| {
        mask.get(row, col)
            && neighborhood
                .offsets()
                .iter()
                .any(|&(dr, dc)| !mask.get_signed(row as isize + dr, col as isize + dc))
    })
}

/// Estimate the length of the boundary of the foreground of `mask`.
///
/// An empty mask has a perimeter of zero, and so does a single isolated cell.
pub fn perimeter(mask: &Mask, neighborhood: Connectivity) -> f64 {
    let border = boundary(mask, neighborhood);
    let mut histogram = [0usize; 50];

    // Background cells only ever produce even codes which all weigh zero, so only boundary cells
    // need to be visited.
    for (row, col) in border.foreground() {
        let mut code = 0u8;
        for (kr, kernel_row) in KERNEL.iter().enumerate() {
            for (kc, &weight) in kernel_row.iter().enumerate() {
                let r = row as isize + kr as isize - 1;
                let c = col as isize + kc as isize - 1;
                if border.get_signed(r, c) {
                    code += weight;
                }
            }
        }
        histogram[code as usize] += 1;
    }

    histogram
        .iter()
        .enumerate()
        .map(|(code, &count)| count as f64 * code_weight(code as u8))
        .sum()
}
