//! Jagged Datasets
//!
//! Synthetic list-of-lists data for reducer kernels. A dataset with average
//! list size `a` is three flat arrays:
//!
//! - `offsets`: `u32`, one more than the number of lists, cumulative
//! - `content`: `f32` values drawn from Normal(1, 0.01)
//! - `parents`: `i32`, the list index of every content element
//!
//! List sizes are drawn from Poisson(`a`). Each array is stored as raw
//! little-endian values in `<dir>/<kind>-<a>`.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use tracing::info;

use crate::executor::{Args, Val};

/// Average list sizes swept by default
pub const DEFAULT_AVERAGES: [f64; 9] = [0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 100.0, 1000.0];

/// Most lists a generated dataset may hold; offsets are `u32`
pub const MAX_LISTS: usize = u32::MAX as usize - 1;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("average list size must be positive and finite, got {0}")]
    InvalidAverage(f64),

    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has {len} bytes, not a whole number of 4-byte values", .path.display())]
    Truncated { path: PathBuf, len: usize },

    #[error("malformed dataset: {0}")]
    Shape(String),
}

/// The three arrays of a jagged dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub average: f64,
    pub offsets: Vec<u32>,
    pub content: Vec<f32>,
    pub parents: Vec<i32>,
}

impl Dataset {
    /// Draw `ceil(task_size / average)` lists
    pub fn generate<R: Rng + ?Sized>(average: f64, task_size: usize, rng: &mut R) -> Result<Self, DatasetError> {
        let sizes = Poisson::new(average).map_err(|_| DatasetError::InvalidAverage(average))?;
        let values = Normal::new(1.0f32, 0.01).map_err(|e| DatasetError::Shape(e.to_string()))?;

        let num_lists = (task_size as f64 / average).ceil();
        if num_lists > MAX_LISTS as f64 {
            return Err(DatasetError::Shape(format!(
                "{} lists of average size {} exceed the limit of {}",
                num_lists, average, MAX_LISTS
            )));
        }
        let num_lists = num_lists as usize;
        let counts: Vec<u32> = (0..num_lists).map(|_| sizes.sample(rng) as u32).collect();
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let content = (0..total).map(|_| values.sample(rng)).collect();

        Self::from_counts(average, &counts, content)
    }

    /// Build a dataset from explicit list sizes
    pub fn from_counts(average: f64, counts: &[u32], content: Vec<f32>) -> Result<Self, DatasetError> {
        if !(average.is_finite() && average > 0.0) {
            return Err(DatasetError::InvalidAverage(average));
        }

        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut parents = Vec::with_capacity(content.len());
        let mut end: u32 = 0;
        offsets.push(end);
        for (list, &count) in counts.iter().enumerate() {
            end = end
                .checked_add(count)
                .ok_or_else(|| DatasetError::Shape("content does not fit u32 offsets".to_string()))?;
            offsets.push(end);
            parents.extend(std::iter::repeat(list as i32).take(count as usize));
        }

        let dataset = Self {
            average,
            offsets,
            content,
            parents,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    pub fn num_lists(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Check offsets, content and parents agree with each other
    pub fn validate(&self) -> Result<(), DatasetError> {
        let Some(&last) = self.offsets.last() else {
            return Err(DatasetError::Shape("offsets are empty".to_string()));
        };
        if self.offsets[0] != 0 {
            return Err(DatasetError::Shape(format!(
                "offsets start at {} instead of 0",
                self.offsets[0]
            )));
        }
        if let Some(i) = self.offsets.windows(2).position(|w| w[0] > w[1]) {
            return Err(DatasetError::Shape(format!("offsets decrease at index {}", i + 1)));
        }
        if last as usize != self.content.len() {
            return Err(DatasetError::Shape(format!(
                "offsets end at {} but content has {} values",
                last,
                self.content.len()
            )));
        }
        if self.parents.len() != self.content.len() {
            return Err(DatasetError::Shape(format!(
                "parents has {} values but content has {}",
                self.parents.len(),
                self.content.len()
            )));
        }
        Ok(())
    }

    /* ===================== Files ===================== */

    /// Write the three arrays into `dir`, creating it if needed
    pub fn write(&self, dir: &Path) -> Result<(), DatasetError> {
        fs::create_dir_all(dir).map_err(|source| DatasetError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        write_array(&file_path(dir, "offsets", self.average), &self.offsets, |v| v.to_le_bytes())?;
        write_array(&file_path(dir, "content", self.average), &self.content, |v| v.to_le_bytes())?;
        write_array(&file_path(dir, "parents", self.average), &self.parents, |v| v.to_le_bytes())?;

        info!(
            dir = %dir.display(),
            average = self.average,
            lists = self.num_lists(),
            values = self.content.len(),
            "Wrote dataset"
        );
        Ok(())
    }

    /// Read the dataset for `average` from `dir`
    pub fn read(dir: &Path, average: f64) -> Result<Self, DatasetError> {
        let dataset = Self {
            average,
            offsets: read_array(&file_path(dir, "offsets", average), u32::from_le_bytes)?,
            content: read_array(&file_path(dir, "content", average), f32::from_le_bytes)?,
            parents: read_array(&file_path(dir, "parents", average), i32::from_le_bytes)?,
        };
        dataset.validate()?;

        info!(
            dir = %dir.display(),
            average,
            lists = dataset.num_lists(),
            "Read dataset"
        );
        Ok(dataset)
    }

    /// Keyword arguments `offsets`, `content` and `parents`
    pub fn to_args(&self) -> Args {
        let offsets = self.offsets.iter().map(|&v| Val::Num(f64::from(v))).collect();
        let content = self.content.iter().map(|&v| Val::Num(f64::from(v))).collect();
        let parents = self.parents.iter().map(|&v| Val::Num(f64::from(v))).collect();
        Args::new()
            .with_keyword("offsets", Val::list(offsets))
            .with_keyword("content", Val::list(content))
            .with_keyword("parents", Val::list(parents))
    }
}

/// `<dir>/<kind>-<average>`, with the average printed like `0.1` or `2.0`
pub fn file_path(dir: &Path, kind: &str, average: f64) -> PathBuf {
    dir.join(format!("{}-{:?}", kind, average))
}

fn write_array<T: Copy>(path: &Path, values: &[T], to_bytes: impl Fn(T) -> [u8; 4]) -> Result<(), DatasetError> {
    let bytes: Vec<u8> = values.iter().flat_map(|&v| to_bytes(v)).collect();
    fs::write(path, bytes).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_array<T>(path: &Path, from_bytes: impl Fn([u8; 4]) -> T) -> Result<Vec<T>, DatasetError> {
    let bytes = fs::read(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() % 4 != 0 {
        return Err(DatasetError::Truncated {
            path: path.to_path_buf(),
            len: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
