//! N-dimensional binned response histograms.
//!
//! A response histogram counts training events over a rectangular grid of
//! linear axes. Lookups clamp to the edge bins, matching the behavior of
//! the training side; interpolated lookups blend neighbor bins linearly
//! along every axis.
//!
//! The on-disk format is line-oriented text:
//!
//! ```text
//! RH 1
//! NM <name>
//! AX <name>;<bins>;<min>;<max>
//! BN <flat index> <value>
//! ```
//!
//! Only nonzero bins are written.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};

/// One linear axis of a response histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    /// Axis name (for diagnostics).
    pub name: String,
    /// Number of bins.
    pub bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
}

impl Axis {
    /// Creates a linear axis.
    pub fn new(name: impl Into<String>, bins: usize, min: f64, max: f64) -> Result<Self> {
        let name = name.into();
        if bins == 0 {
            return Err(Error::InvalidAxis(name, "zero bins".to_string()));
        }
        if !(max > min) {
            return Err(Error::InvalidAxis(name, "empty range".to_string()));
        }
        Ok(Self { name, bins, min, max })
    }

    /// Bin index of a value, clamped to the axis range.
    pub fn bin_of(&self, value: f64) -> usize {
        if value <= self.min {
            return 0;
        }
        if value >= self.max {
            return self.bins - 1;
        }
        let width = (self.max - self.min) / self.bins as f64;
        (((value - self.min) / width) as usize).min(self.bins - 1)
    }

    /// Center of a bin.
    pub fn bin_center(&self, bin: usize) -> f64 {
        let width = (self.max - self.min) / self.bins as f64;
        self.min + (bin as f64 + 0.5) * width
    }
}

/// An n-dimensional histogram of training counts.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHistogram {
    name: String,
    axes: Vec<Axis>,
    data: Vec<f64>,
}

impl ResponseHistogram {
    /// Creates an empty histogram over the given axes.
    pub fn new(name: impl Into<String>, axes: Vec<Axis>) -> Self {
        let size = axes.iter().map(|a| a.bins).product();
        Self {
            name: name.into(),
            axes,
            data: vec![0.0; size],
        }
    }

    /// Histogram name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The axes.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Sum over all bins.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    fn flat_index(&self, bins: &[usize]) -> usize {
        let mut index = 0;
        for (axis, &bin) in self.axes.iter().zip(bins) {
            index = index * axis.bins + bin.min(axis.bins - 1);
        }
        index
    }

    fn check_dimension(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.axes.len() {
            return Err(Error::DimensionMismatch {
                expected: self.axes.len(),
                got: values.len(),
            });
        }
        Ok(())
    }

    /// Adds `weight` to the bin containing `values`.
    pub fn fill(&mut self, values: &[f64], weight: f64) -> Result<()> {
        self.check_dimension(values)?;
        let bins: Vec<usize> = self
            .axes
            .iter()
            .zip(values)
            .map(|(axis, &v)| axis.bin_of(v))
            .collect();
        let index = self.flat_index(&bins);
        self.data[index] += weight;
        Ok(())
    }

    /// Value of the bin containing `values` (clamped at the edges).
    pub fn get(&self, values: &[f64]) -> Result<f64> {
        self.check_dimension(values)?;
        let bins: Vec<usize> = self
            .axes
            .iter()
            .zip(values)
            .map(|(axis, &v)| axis.bin_of(v))
            .collect();
        Ok(self.data[self.flat_index(&bins)])
    }

    /// Multilinear interpolation between the neighbor bin centers.
    pub fn get_interpolated(&self, values: &[f64]) -> Result<f64> {
        self.check_dimension(values)?;
        // per axis: lower neighbor bin and blend weight toward the upper
        let mut lower = Vec::with_capacity(self.axes.len());
        let mut fraction = Vec::with_capacity(self.axes.len());
        for (axis, &v) in self.axes.iter().zip(values) {
            let bin = axis.bin_of(v);
            let center = axis.bin_center(bin);
            let width = (axis.max - axis.min) / axis.bins as f64;
            if v < center && bin > 0 {
                lower.push(bin - 1);
                fraction.push(1.0 - (center - v) / width);
            } else if v > center && bin + 1 < axis.bins {
                lower.push(bin);
                fraction.push((v - center) / width);
            } else {
                lower.push(bin);
                fraction.push(0.0);
            }
        }
        let mut result = 0.0;
        for corner in 0..(1usize << self.axes.len()) {
            let mut weight = 1.0;
            let mut bins = Vec::with_capacity(self.axes.len());
            for d in 0..self.axes.len() {
                if corner & (1 << d) == 0 {
                    weight *= 1.0 - fraction[d];
                    bins.push(lower[d]);
                } else {
                    weight *= fraction[d];
                    bins.push((lower[d] + 1).min(self.axes[d].bins - 1));
                }
            }
            if weight > 0.0 {
                result += weight * self.data[self.flat_index(&bins)];
            }
        }
        Ok(result)
    }

    /// Writes the histogram to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "RH 1")?;
        writeln!(out, "NM {}", self.name)?;
        for axis in &self.axes {
            writeln!(out, "AX {};{};{};{}", axis.name, axis.bins, axis.min, axis.max)?;
        }
        for (index, &value) in self.data.iter().enumerate() {
            if value != 0.0 {
                writeln!(out, "BN {index} {value}")?;
            }
        }
        Ok(())
    }

    /// Reads a histogram from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let parse_err = |line: usize, message: String| Error::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };
        let reader = BufReader::new(File::open(path)?);
        let mut name = String::new();
        let mut axes: Vec<Axis> = Vec::new();
        let mut bins: Vec<(usize, f64)> = Vec::new();
        let mut seen_header = false;
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let number = number + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (tag, rest) = line
                .split_once(' ')
                .ok_or_else(|| parse_err(number, "missing tag".to_string()))?;
            match tag {
                "RH" => {
                    if rest.trim() != "1" {
                        return Err(parse_err(number, format!("unknown version {rest}")));
                    }
                    seen_header = true;
                }
                "NM" => name = rest.trim().to_string(),
                "AX" => {
                    let parts: Vec<&str> = rest.split(';').collect();
                    if parts.len() != 4 {
                        return Err(parse_err(number, "axis needs name;bins;min;max".to_string()));
                    }
                    let bins_count: usize = parts[1]
                        .trim()
                        .parse()
                        .map_err(|e| parse_err(number, format!("bad bin count: {e}")))?;
                    let min: f64 = parts[2]
                        .trim()
                        .parse()
                        .map_err(|e| parse_err(number, format!("bad axis minimum: {e}")))?;
                    let max: f64 = parts[3]
                        .trim()
                        .parse()
                        .map_err(|e| parse_err(number, format!("bad axis maximum: {e}")))?;
                    axes.push(Axis::new(parts[0].trim(), bins_count, min, max)?);
                }
                "BN" => {
                    let (index, value) = rest
                        .split_once(' ')
                        .ok_or_else(|| parse_err(number, "bin needs index and value".to_string()))?;
                    let index: usize = index
                        .trim()
                        .parse()
                        .map_err(|e| parse_err(number, format!("bad bin index: {e}")))?;
                    let value: f64 = value
                        .trim()
                        .parse()
                        .map_err(|e| parse_err(number, format!("bad bin value: {e}")))?;
                    bins.push((index, value));
                }
                other => return Err(parse_err(number, format!("unknown tag {other}"))),
            }
        }
        if !seen_header {
            return Err(parse_err(0, "missing RH header".to_string()));
        }
        let mut histogram = ResponseHistogram::new(name, axes);
        for (index, value) in bins {
            if index >= histogram.data.len() {
                return Err(parse_err(0, format!("bin index {index} out of range")));
            }
            histogram.data[index] = value;
        }
        debug!(
            path = %path.display(),
            dimension = histogram.dimension(),
            sum = histogram.sum(),
            "loaded response histogram"
        );
        Ok(histogram)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn axis(bins: usize, min: f64, max: f64) -> Axis {
        Axis::new("a", bins, min, max).unwrap()
    }

    #[test]
    fn test_bin_of_clamps() {
        let axis = axis(10, 0.0, 10.0);
        assert_eq!(axis.bin_of(-5.0), 0);
        assert_eq!(axis.bin_of(0.5), 0);
        assert_eq!(axis.bin_of(9.5), 9);
        assert_eq!(axis.bin_of(25.0), 9);
    }

    #[test]
    fn test_fill_and_get() {
        let mut histogram = ResponseHistogram::new(
            "test",
            vec![axis(10, 0.0, 10.0), axis(4, 0.0, 180.0)],
        );
        histogram.fill(&[2.5, 45.0], 3.0).unwrap();
        histogram.fill(&[2.5, 45.0], 1.0).unwrap();
        assert_relative_eq!(histogram.get(&[2.5, 45.0]).unwrap(), 4.0);
        assert_relative_eq!(histogram.get(&[7.5, 45.0]).unwrap(), 0.0);
        assert_relative_eq!(histogram.sum(), 4.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let histogram = ResponseHistogram::new("test", vec![axis(4, 0.0, 1.0)]);
        assert!(matches!(
            histogram.get(&[0.5, 0.5]),
            Err(Error::DimensionMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn test_interpolation_blends_neighbors() {
        let mut histogram = ResponseHistogram::new("test", vec![axis(4, 0.0, 4.0)]);
        // centers at 0.5, 1.5, 2.5, 3.5
        histogram.fill(&[0.5], 10.0).unwrap();
        histogram.fill(&[1.5], 20.0).unwrap();
        let mid = histogram.get_interpolated(&[1.0]).unwrap();
        assert_relative_eq!(mid, 15.0);
        // exactly on a center: no blending
        assert_relative_eq!(histogram.get_interpolated(&[1.5]).unwrap(), 20.0);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.rsp");
        let mut histogram = ResponseHistogram::new(
            "round-trip",
            vec![axis(8, 0.0, 2000.0), axis(9, 0.0, 90.0)],
        );
        histogram.fill(&[700.0, 30.0], 5.0).unwrap();
        histogram.fill(&[120.0, 80.0], 2.5).unwrap();
        histogram.save(&path).unwrap();

        let loaded = ResponseHistogram::load(&path).unwrap();
        assert_eq!(loaded, histogram);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.rsp");
        std::fs::write(&path, "RH 1\nAX broken\n").unwrap();
        assert!(matches!(
            ResponseHistogram::load(&path),
            Err(Error::Parse { .. })
        ));
    }
}
