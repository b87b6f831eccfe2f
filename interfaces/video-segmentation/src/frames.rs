use std::ops::Range;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use mask_metrics::Mask;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// List the frames of a video stored as numbered JPEG files (`00000.jpg`, `00001.jpg`, ...),
/// sorted by frame number. Files whose name is not a number are ignored.
pub fn list_frames(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_frame {
            continue;
        }
        match path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<usize>().ok())
        {
            Some(index) => frames.push((index, path)),
            None => tracing::trace!("Ignoring non-numbered frame {}", path.display()),
        }
    }
    frames.sort_by_key(|(index, _)| *index);
    Ok(frames.into_iter().map(|(_, path)| path).collect())
}

/// Fabricated video frames: a solid object on a solid background, identical on every frame.
#[derive(Debug, Clone)]
pub struct FrameSynthesis {
    count: usize,
    width: u32,
    height: u32,
    background: Rgb<u8>,
    object: Rgb<u8>,
    rows: Range<u32>,
    cols: Range<u32>,
}

impl Default for FrameSynthesis {
    fn default() -> Self {
        Self {
            count: 5,
            width: 640,
            height: 480,
            background: Rgb([0, 0, 255]),
            object: Rgb([255, 0, 0]),
            rows: 200..300,
            cols: 250..350,
        }
    }
}

impl FrameSynthesis {
    /// Five 640x480 blue frames with a 100x100 red square at rows 200..300, columns 250..350.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the frame size.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the background and object colors.
    pub fn with_colors(mut self, background: Rgb<u8>, object: Rgb<u8>) -> Self {
        self.background = background;
        self.object = object;
        self
    }

    /// Set the rows and columns covered by the object.
    pub fn with_object(mut self, rows: Range<u32>, cols: Range<u32>) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// The number of frames.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Render a single frame.
    pub fn frame(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            if self.rows.contains(&y) && self.cols.contains(&x) {
                self.object
            } else {
                self.background
            }
        })
    }

    /// The mask of the object on every frame.
    pub fn ground_truth(&self) -> Mask {
        let rows = self.rows.start as usize..self.rows.end as usize;
        let cols = self.cols.start as usize..self.cols.end as usize;
        Mask::empty(self.height as usize, self.width as usize).with_rect(rows, cols)
    }

    /// The `(x, y)` center of the object, a natural foreground prompt.
    pub fn object_center(&self) -> (f32, f32) {
        (
            (self.cols.start + self.cols.end) as f32 / 2.0,
            (self.rows.start + self.rows.end) as f32 / 2.0,
        )
    }

    /// Write `count` frames named `00000.jpg`, `00001.jpg`, ... into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let frame = self.frame();
        let mut paths = Vec::with_capacity(self.count);
        for index in 0..self.count {
            let path = dir.join(format!("{index:05}.jpg"));
            frame.save(&path)?;
            paths.push(path);
        }
        tracing::debug!("Wrote {} frames to {}", self.count, dir.display());
        Ok(paths)
    }
}
