use serde::{Deserialize, Serialize};

/// The id of a tracked object.
pub type ObjectId = u32;

/// Whether a prompt point lies on the object or on the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointLabel {
    /// The point is part of the background (label `0`).
    Background,
    /// The point is part of the object (label `1`).
    Foreground,
}

impl PointLabel {
    /// The numeric label used by point prompted models.
    pub fn as_i32(self) -> i32 {
        match self {
            PointLabel::Background => 0,
            PointLabel::Foreground => 1,
        }
    }
}

impl TryFrom<i32> for PointLabel {
    type Error = PromptError;

    fn try_from(label: i32) -> Result<Self, Self::Error> {
        match label {
            0 => Ok(PointLabel::Background),
            1 => Ok(PointLabel::Foreground),
            other => Err(PromptError::UnknownLabel(other)),
        }
    }
}

/// An error building a [`PointPrompt`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PromptError {
    /// A prompt needs at least one point.
    #[error("A prompt needs at least one point")]
    NoPoints,
    /// Every point needs exactly one label.
    #[error("Got {points} points but {labels} labels")]
    LabelCountMismatch {
        /// The number of points.
        points: usize,
        /// The number of labels.
        labels: usize,
    },
    /// Labels must be `0` or `1`.
    #[error("Unknown point label {0}, expected 0 (background) or 1 (foreground)")]
    UnknownLabel(i32),
}

/// Points that describe one object on one frame.
///
/// Points are `(x, y)` pixel coordinates in the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPrompt {
    frame_idx: usize,
    object_id: ObjectId,
    points: Vec<(f32, f32)>,
    labels: Vec<PointLabel>,
}

impl PointPrompt {
    /// Create a prompt from matching lists of points and labels.
    pub fn new(
        frame_idx: usize,
        object_id: ObjectId,
        points: Vec<(f32, f32)>,
        labels: Vec<PointLabel>,
    ) -> Result<Self, PromptError> {
        if points.is_empty() {
            return Err(PromptError::NoPoints);
        }
        if points.len() != labels.len() {
            return Err(PromptError::LabelCountMismatch {
                points: points.len(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            frame_idx,
            object_id,
            points,
            labels,
        })
    }

    /// Create a prompt from numeric labels (`1` foreground, `0` background).
    pub fn from_raw_labels(
        frame_idx: usize,
        object_id: ObjectId,
        points: Vec<(f32, f32)>,
        labels: &[i32],
    ) -> Result<Self, PromptError> {
        let labels = labels
            .iter()
            .map(|&label| PointLabel::try_from(label))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(frame_idx, object_id, points, labels)
    }

    /// A prompt with a single foreground point.
    pub fn foreground_point(frame_idx: usize, object_id: ObjectId, x: f32, y: f32) -> Self {
        Self {
            frame_idx,
            object_id,
            points: vec![(x, y)],
            labels: vec![PointLabel::Foreground],
        }
    }

    /// Add another point to the prompt.
    pub fn with_point(mut self, x: f32, y: f32, label: PointLabel) -> Self {
        self.points.push((x, y));
        self.labels.push(label);
        self
    }

    /// The frame the points were placed on.
    pub fn frame_idx(&self) -> usize {
        self.frame_idx
    }

    /// The object the points describe.
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    /// The `(x, y)` pixel coordinates of the points.
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// The label of each point.
    pub fn labels(&self) -> &[PointLabel] {
        &self.labels
    }

    /// Iterate over every point with its label.
    pub fn labeled_points(&self) -> impl Iterator<Item = ((f32, f32), PointLabel)> + '_ {
        self.points.iter().copied().zip(self.labels.iter().copied())
    }
}
