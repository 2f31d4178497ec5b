use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Sorted start times of the measurement bins plus the end of the last bin.
///
/// Bin `i` covers `[starts[i], starts[i + 1])`; the last bin ends at `end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeIndexContainer {
    starts: Vec<f64>,
    end: f64,
}

impl TimeIndexContainer {
    pub fn new(starts: Vec<f64>, end: f64) -> Result<Self, TransportError> {
        let Some(&last) = starts.last() else {
            return Err(TransportError::InvalidConfig(
                "time index needs at least one bin".to_string(),
            ));
        };
        if starts.iter().any(|s| !s.is_finite()) || starts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TransportError::InvalidConfig(
                "bin start times must be finite and strictly increasing".to_string(),
            ));
        }
        if !end.is_finite() || end <= last {
            return Err(TransportError::InvalidConfig(format!(
                "time index end {end} must follow the last bin start {last}"
            )));
        }
        Ok(Self { starts, end })
    }

    /// `bins` equally wide bins between `start` and `end`.
    pub fn uniform(start: f64, end: f64, bins: usize) -> Result<Self, TransportError> {
        if bins == 0 {
            return Err(TransportError::InvalidConfig(
                "time index needs at least one bin".to_string(),
            ));
        }
        let width = (end - start) / bins as f64;
        let starts = (0..bins).map(|i| start + i as f64 * width).collect();
        Self::new(starts, end)
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn starts(&self) -> &[f64] {
        &self.starts
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    /// Bin containing `time`, or `None` outside `[first start, end)`.
    pub fn bin_of(&self, time: f64) -> Option<usize> {
        let first = *self.starts.first()?;
        if time.is_nan() || time < first || time >= self.end {
            return None;
        }
        Some(self.starts.partition_point(|&s| s <= time) - 1)
    }

    pub fn bin_start(&self, bin: usize) -> Option<f64> {
        self.starts.get(bin).copied()
    }

    pub fn bin_end(&self, bin: usize) -> Option<f64> {
        if bin + 1 < self.starts.len() {
            Some(self.starts[bin + 1])
        } else if bin + 1 == self.starts.len() {
            Some(self.end)
        } else {
            None
        }
    }

    pub fn bin_duration(&self, bin: usize) -> Option<f64> {
        Some(self.bin_end(bin)? - self.bin_start(bin)?)
    }
}
