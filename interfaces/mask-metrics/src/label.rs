use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::Mask;

/// Which neighbors count as touching when labeling regions or tracing boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Connectivity {
    /// Only the horizontal and vertical neighbors.
    Four,
    /// Horizontal, vertical and diagonal neighbors.
    #[default]
    Eight,
}

impl Connectivity {
    /// The `(row, col)` offsets of the neighbors of a cell.
    pub fn offsets(self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }
}

/// An axis aligned box `(min_row, min_col, max_row, max_col)` with exclusive maximums.
///
/// Serialized as a 4-tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    from = "(usize, usize, usize, usize)",
    into = "(usize, usize, usize, usize)"
)]
pub struct BoundingBox {
    /// The first row inside the box.
    pub min_row: usize,
    /// The first column inside the box.
    pub min_col: usize,
    /// One past the last row inside the box.
    pub max_row: usize,
    /// One past the last column inside the box.
    pub max_col: usize,
}

impl BoundingBox {
    /// Create a box from its corners.
    pub fn new(min_row: usize, min_col: usize, max_row: usize, max_col: usize) -> Self {
        Self {
            min_row,
            min_col,
            max_row,
            max_col,
        }
    }

    /// The number of columns covered.
    pub fn width(&self) -> usize {
        self.max_col.saturating_sub(self.min_col)
    }

    /// The number of rows covered.
    pub fn height(&self) -> usize {
        self.max_row.saturating_sub(self.min_row)
    }

    /// `width * height`
    pub fn area(&self) -> usize {
        self.width() * self.height()
    }

    fn single(row: usize, col: usize) -> Self {
        Self::new(row, col, row + 1, col + 1)
    }

    fn include(&mut self, row: usize, col: usize) {
        self.min_row = self.min_row.min(row);
        self.min_col = self.min_col.min(col);
        self.max_row = self.max_row.max(row + 1);
        self.max_col = self.max_col.max(col + 1);
    }
}

impl From<(usize, usize, usize, usize)> for BoundingBox {
    fn from((min_row, min_col, max_row, max_col): (usize, usize, usize, usize)) -> Self {
        Self::new(min_row, min_col, max_row, max_col)
    }
}

impl From<BoundingBox> for (usize, usize, usize, usize) {
    fn from(bbox: BoundingBox) -> Self {
        (bbox.min_row, bbox.min_col, bbox.max_row, bbox.max_col)
    }
}

/// The connected regions of a mask.
///
/// Labels start at 1 and are handed out in raster order of the first cell of each region, so
/// label 1 is always the region containing the first foreground cell. Background is 0.
#[derive(Debug, Clone)]
pub struct Components {
    width: usize,
    labels: Vec<u32>,
    regions: Vec<Region>,
}

#[derive(Debug, Clone, Copy)]
struct Region {
    bbox: BoundingBox,
    area: usize,
}

impl Components {
    /// The number of labeled regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Returns true if the mask had no foreground.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// The label of the cell at `(row, col)`.
    pub fn label(&self, row: usize, col: usize) -> u32 {
        self.labels[row * self.width + col]
    }

    /// The row-major label grid.
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// The bounding box of every region, indexed by `label - 1`.
    pub fn find_objects(&self) -> Vec<BoundingBox> {
        self.regions.iter().map(|region| region.bbox).collect()
    }

    /// The bounding box of the region with label 1.
    pub fn first_bbox(&self) -> Option<BoundingBox> {
        self.regions.first().map(|region| region.bbox)
    }

    /// The number of cells in each region, indexed by `label - 1`.
    pub fn areas(&self) -> Vec<usize> {
        self.regions.iter().map(|region| region.area).collect()
    }
}

/// Label the connected foreground regions of a mask with a breadth first flood fill.
pub fn label_components(mask: &Mask, connectivity: Connectivity) -> Components {
    let (height, width) = mask.dims();
    let mut labels = vec![0u32; height * width];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for (row, col) in mask.foreground() {
        if labels[row * width + col] != 0 {
            continue;
        }
        let label = regions.len() as u32 + 1;
        let mut region = Region {
            bbox: BoundingBox::single(row, col),
            area: 0,
        };
        labels[row * width + col] = label;
        queue.push_back((row, col));

        while let Some((row, col)) = queue.pop_front() {
            region.area += 1;
            region.bbox.include(row, col);
            for &(dr, dc) in connectivity.offsets() {
                let (r, c) = (row as isize + dr, col as isize + dc);
                if !mask.get_signed(r, c) {
                    continue;
                }
                let index = r as usize * width + c as usize;
                if labels[index] == 0 {
                    labels[index] = label;
                    queue.push_back((r as usize, c as usize));
                }
            }
        }
        regions.push(region);
    }

    Components {
        width,
        labels,
        regions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn diagonal_pair() -> Mask {
        Mask::from_fn(3, 3, |row, col| (row, col) == (0, 0) || (row, col) == (1, 1))
    }

    #[test]
    fn empty_mask_has_no_regions() {
        let components = label_components(&Mask::empty(4, 4), Connectivity::Eight);
        assert!(components.is_empty());
        assert_eq!(components.first_bbox(), None);
        assert!(components.labels().iter().all(|&label| label == 0));
    }

    #[test]
    fn diagonal_cells_join_only_with_eight_connectivity() {
        let mask = diagonal_pair();
        assert_eq!(label_components(&mask, Connectivity::Eight).len(), 1);
        let four = label_components(&mask, Connectivity::Four);
        assert_eq!(four.len(), 2);
        assert_eq!(four.label(0, 0), 1);
        assert_eq!(four.label(1, 1), 2);
    }

    #[test]
    fn labels_follow_raster_order() {
        // The lower region starts further left but the upper region is reached first.
        let mask = Mask::empty(6, 8).with_rect(0..2, 5..8).with_rect(3..6, 0..2);
        let components = label_components(&mask, Connectivity::Eight);
        assert_eq!(
            components.find_objects(),
            vec![BoundingBox::new(0, 5, 2, 8), BoundingBox::new(3, 0, 6, 2)]
        );
        assert_eq!(components.areas(), vec![6, 6]);
        assert_eq!(components.first_bbox(), Some(BoundingBox::new(0, 5, 2, 8)));
    }

    #[test]
    fn bbox_of_concave_region_covers_all_arms() {
        // An L shape whose lower arm extends left of the first foreground cell.
        let mask = Mask::empty(5, 5).with_rect(0..4, 3..4).with_rect(3..4, 0..4);
        let components = label_components(&mask, Connectivity::Four);
        assert_eq!(components.len(), 1);
        assert_eq!(components.first_bbox(), Some(BoundingBox::new(0, 0, 4, 4)));
    }

    #[test]
    fn bbox_serializes_as_tuple() {
        let bbox = BoundingBox::new(1, 2, 3, 4);
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[1,2,3,4]");
        let parsed: BoundingBox = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(parsed, bbox);
    }
}
