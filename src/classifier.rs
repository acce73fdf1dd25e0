// src/classifier.rs - Exact nearest-neighbour classification against the reference bank

use ndarray::ArrayView1;

use crate::errors::{WheatRustError, Result};
use crate::reference_bank::ReferenceBank;
use crate::severity::SeverityLabel;

/// Closest reference entry for a query vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
    pub label: SeverityLabel,
}

/// Exact nearest-neighbour search over a reference bank.
///
/// Implementations must return the same neighbour as a linear scan, including
/// the tie-break: among equidistant entries the lowest bank index wins.
pub trait NeighborIndex: Send + Sync {
    fn nearest(&self, query: &[f32]) -> Result<Neighbor>;

    fn dimension(&self) -> usize;

    fn classify(&self, query: &[f32]) -> Result<SeverityLabel> {
        self.nearest(query).map(|n| n.label)
    }
}

/// Brute-force scan, O(n·d) per query
#[derive(Debug, Clone)]
pub struct LinearScanIndex {
    bank: ReferenceBank,
}

impl LinearScanIndex {
    pub fn new(bank: ReferenceBank) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &ReferenceBank {
        &self.bank
    }
}

/// Euclidean distance between two equal-length vectors
pub fn euclidean_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

impl NeighborIndex for LinearScanIndex {
    fn nearest(&self, query: &[f32]) -> Result<Neighbor> {
        if query.len() != self.bank.dimension() {
            return Err(WheatRustError::Inference(format!(
                "feature vector has {} values, reference bank expects {}",
                query.len(),
                self.bank.dimension()
            )));
        }

        let query = ArrayView1::from(query);
        let mut best: Option<(usize, f32)> = None;
        for (index, row) in self.bank.features().rows().into_iter().enumerate() {
            let distance = euclidean_distance(query, row);
            if distance.is_nan() {
                continue;
            }
            // Strict comparison keeps the first of equal distances
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((index, distance));
            }
        }

        let (index, distance) = best.ok_or_else(|| {
            WheatRustError::Inference("no comparable reference vector".to_string())
        })?;

        Ok(Neighbor {
            index,
            distance,
            label: self.bank.label(index),
        })
    }

    fn dimension(&self) -> usize {
        self.bank.dimension()
    }
}
