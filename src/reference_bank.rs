// src/reference_bank.rs - Labelled feature vectors used for nearest-neighbour lookup

use std::path::Path;

use log::info;
use ndarray::{Array2, ArrayD, ArrayView1, Axis};
use ndarray_npy::read_npy;

use crate::errors::{WheatRustError, Result};
use crate::severity::SeverityLabel;

/// Read-only table of `(feature vector, severity label)` pairs aligned by row
#[derive(Debug, Clone)]
pub struct ReferenceBank {
    features: Array2<f32>,
    labels: Vec<SeverityLabel>,
}

impl ReferenceBank {
    /// Build a bank, checking that rows and labels line up
    pub fn new(features: Array2<f32>, labels: Vec<SeverityLabel>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(WheatRustError::ReferenceBank(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(WheatRustError::ReferenceBank(
                "reference bank is empty".to_string(),
            ));
        }

        Ok(Self { features, labels })
    }

    /// Build a bank from raw class indices into the severity table
    pub fn from_label_indices(features: Array2<f32>, indices: &[i64]) -> Result<Self> {
        let labels = indices
            .iter()
            .map(|&i| {
                usize::try_from(i)
                    .ok()
                    .and_then(SeverityLabel::from_index)
                    .ok_or_else(|| {
                        WheatRustError::ReferenceBank(format!("label index {} out of range", i))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(features, labels)
    }

    /// Load features and labels from `.npy` files.
    ///
    /// Features may be f32 or f64 of any rank >= 2; everything after the first
    /// axis is flattened into the vector. Labels may be i64, i32 or u8.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(features_path: P, labels_path: Q) -> Result<Self> {
        let features = read_features(features_path.as_ref())?;
        let labels = read_labels(labels_path.as_ref())?;

        info!(
            "Reference bank loaded: features {:?}, labels {}",
            features.dim(),
            labels.len()
        );

        Self::from_label_indices(features, &labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Width of every feature vector
    pub fn dimension(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    pub fn feature(&self, index: usize) -> ArrayView1<'_, f32> {
        self.features.index_axis(Axis(0), index)
    }

    pub fn label(&self, index: usize) -> SeverityLabel {
        self.labels[index]
    }
}

fn bank_error(path: &Path, e: impl std::fmt::Display) -> WheatRustError {
    WheatRustError::ReferenceBank(format!("failed to read {}: {}", path.display(), e))
}

fn read_features(path: &Path) -> Result<Array2<f32>> {
    let raw: ArrayD<f32> = match read_npy::<_, ArrayD<f32>>(path) {
        Ok(array) => array,
        Err(_) => read_npy::<_, ArrayD<f64>>(path)
            .map_err(|e| bank_error(path, e))?
            .mapv(|v| v as f32),
    };

    if raw.ndim() < 2 {
        return Err(WheatRustError::ReferenceBank(format!(
            "features in {} must have at least 2 dimensions, got {:?}",
            path.display(),
            raw.shape()
        )));
    }

    let rows = raw.shape()[0];
    let cols: usize = raw.shape()[1..].iter().product();
    let flat: Vec<f32> = raw.iter().copied().collect();
    Array2::from_shape_vec((rows, cols), flat).map_err(|e| bank_error(path, e))
}

fn read_labels(path: &Path) -> Result<Vec<i64>> {
    if let Ok(array) = read_npy::<_, ArrayD<i64>>(path) {
        return Ok(array.iter().copied().collect());
    }
    if let Ok(array) = read_npy::<_, ArrayD<i32>>(path) {
        return Ok(array.iter().map(|&v| v as i64).collect());
    }
    let array = read_npy::<_, ArrayD<u8>>(path).map_err(|e| bank_error(path, e))?;
    Ok(array.iter().map(|&v| v as i64).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array3};
    use ndarray_npy::write_npy;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("wheat_rust_bank_{}_{}", std::process::id(), name))
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let features = array![[0.0f32, 1.0], [1.0, 0.0]];
        assert!(ReferenceBank::new(features, vec![SeverityLabel::R]).is_err());
    }

    #[test]
    fn out_of_range_label_is_rejected() {
        let features = array![[0.0f32, 1.0]];
        assert!(ReferenceBank::from_label_indices(features.clone(), &[8]).is_err());
        assert!(ReferenceBank::from_label_indices(features, &[-1]).is_err());
    }

    #[test]
    fn empty_bank_is_rejected() {
        let features = Array2::<f32>::zeros((0, 4));
        assert!(ReferenceBank::new(features, vec![]).is_err());
    }

    #[test]
    fn loads_npy_and_flattens_feature_maps() {
        let features_path = temp_path("features.npy");
        let labels_path = temp_path("labels.npy");

        let features = Array3::<f32>::from_shape_fn((3, 2, 2), |(i, j, k)| (i * 4 + j * 2 + k) as f32);
        write_npy(&features_path, &features).unwrap();
        write_npy(&labels_path, &Array1::from(vec![0i64, 3, 7])).unwrap();

        let bank = ReferenceBank::load(&features_path, &labels_path).unwrap();
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.dimension(), 4);
        assert_eq!(bank.feature(1).to_vec(), vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(bank.label(1), SeverityLabel::Mr);
        assert_eq!(bank.label(2), SeverityLabel::S);

        std::fs::remove_file(features_path).ok();
        std::fs::remove_file(labels_path).ok();
    }

    #[test]
    fn loads_f64_features_and_i32_labels() {
        let features_path = temp_path("features64.npy");
        let labels_path = temp_path("labels32.npy");

        write_npy(&features_path, &array![[1.5f64, 2.5], [3.5, 4.5]]).unwrap();
        write_npy(&labels_path, &Array1::from(vec![1i32, 2])).unwrap();

        let bank = ReferenceBank::load(&features_path, &labels_path).unwrap();
        assert_eq!(bank.feature(0).to_vec(), vec![1.5f32, 2.5]);
        assert_eq!(bank.label(1), SeverityLabel::Rmr);

        std::fs::remove_file(features_path).ok();
        std::fs::remove_file(labels_path).ok();
    }

    #[test]
    fn missing_files_are_an_error() {
        assert!(ReferenceBank::load("/nonexistent/features.npy", "/nonexistent/labels.npy").is_err());
    }
}
