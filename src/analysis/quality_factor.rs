use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use log::info;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ForensicsError, Result};

pub const QUANTIZATION_TABLE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityEstimate {
    pub quality_factor: i32,
    pub distance: f64,
}

#[derive(Serialize, Deserialize)]
struct StoredTable {
    quality_factor: Vec<i32>,
    quantization_table: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct QualityEstimator {
    storage: PathBuf,
    quality_factors: Vec<i32>,
    quantization_tables: Array2<f64>,
}

impl QualityEstimator {
    pub fn new<P: AsRef<Path>>(storage: P) -> Self {
        Self {
            storage: storage.as_ref().to_path_buf(),
            quality_factors: Vec::new(),
            quantization_tables: Array2::zeros((0, QUANTIZATION_TABLE_LEN)),
        }
    }

    pub fn open<P: AsRef<Path>>(storage: P) -> Result<Self> {
        let mut estimator = Self::new(storage);

        if estimator.storage.exists() {
            info!("Loading quality factor table from {}", estimator.storage.display());
            estimator.load()?;
        } else {
            info!("Initializing empty quality factor table");
        }

        Ok(estimator)
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    pub fn len(&self) -> usize {
        self.quality_factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quality_factors.is_empty()
    }

    pub fn quality_factors(&self) -> &[i32] {
        &self.quality_factors
    }

    pub fn quantization_tables(&self) -> &Array2<f64> {
        &self.quantization_tables
    }

    pub fn append(&mut self, quality_factor: i32, quantization_table: &[f64]) -> Result<()> {
        let row = Self::check_table(quantization_table)?;
        self.quantization_tables.push_row(row)?;
        self.quality_factors.push(quality_factor);
        Ok(())
    }

    pub fn append_from_chroma_tables(
        &mut self,
        quality_factor: i32,
        cb_table: &[f64],
        cr_table: &[f64],
    ) -> Result<()> {
        if cb_table != cr_table {
            return Err(ForensicsError::SanityCheck(format!(
                "Cb and Cr quantization tables differ for quality factor {}",
                quality_factor
            )));
        }
        self.append(quality_factor, cb_table)
    }

    /// Quality factor of the stored table closest to `query_table` in
    /// Euclidean distance. Ties resolve to the earliest entry.
    pub fn find_nearest(&self, query_table: &[f64]) -> Result<QualityEstimate> {
        if self.is_empty() {
            return Err(ForensicsError::Precondition(
                "No known quantization tables at the moment".into(),
            ));
        }

        let query = Self::check_table(query_table)?;
        if query.iter().any(|q| !q.is_finite()) {
            return Err(ForensicsError::InvalidParameter(
                "quantization table contains non-finite entries".into(),
            ));
        }

        let distances: Array1<f64> = (&self.quantization_tables - &query)
            .mapv(|d| d * d)
            .sum_axis(Axis(1))
            .mapv(f64::sqrt);

        let mut best = 0;
        for (idx, &distance) in distances.iter().enumerate() {
            if distance < distances[best] {
                best = idx;
            }
        }

        Ok(QualityEstimate {
            quality_factor: self.quality_factors[best],
            distance: distances[best],
        })
    }

    pub fn load(&mut self) -> Result<()> {
        let reader = BufReader::new(File::open(&self.storage)?);
        let stored: StoredTable = serde_json::from_reader(reader)?;

        if stored.quality_factor.len() != stored.quantization_table.len() {
            return Err(ForensicsError::Shape(format!(
                "{} quality factors but {} quantization tables",
                stored.quality_factor.len(),
                stored.quantization_table.len()
            )));
        }

        let mut tables = Array2::zeros((0, QUANTIZATION_TABLE_LEN));
        for table in &stored.quantization_table {
            tables.push_row(Self::check_table(table)?)?;
        }

        self.quality_factors = stored.quality_factor;
        self.quantization_tables = tables;
        Ok(())
    }

    pub fn persist(&self) -> Result<()> {
        let stored = StoredTable {
            quality_factor: self.quality_factors.clone(),
            quantization_table: self
                .quantization_tables
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
        };

        let writer = BufWriter::new(File::create(&self.storage)?);
        serde_json::to_writer(writer, &stored)?;
        info!(
            "Persisted {} quality factors to {}",
            self.len(),
            self.storage.display()
        );
        Ok(())
    }

    fn check_table(table: &[f64]) -> Result<ArrayView1<'_, f64>> {
        if table.len() != QUANTIZATION_TABLE_LEN {
            return Err(ForensicsError::Shape(format!(
                "quantization table must have {} entries, got {}",
                QUANTIZATION_TABLE_LEN,
                table.len()
            )));
        }
        Ok(ArrayView1::from(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled_table(scale: f64) -> Vec<f64> {
        (0..64).map(|i| ((i % 8 + i / 8 + 1) as f64 * scale).round().max(1.0)).collect()
    }

    #[test]
    fn test_empty_table_is_precondition_error() {
        let estimator = QualityEstimator::new("unused.json");
        assert!(matches!(
            estimator.find_nearest(&scaled_table(1.0)),
            Err(ForensicsError::Precondition(_))
        ));
    }

    #[test]
    fn test_exact_match_has_zero_distance() {
        let mut estimator = QualityEstimator::new("unused.json");
        let table = scaled_table(3.0);
        estimator.append(75, &table).unwrap();

        let estimate = estimator.find_nearest(&table).unwrap();
        assert_eq!(estimate.quality_factor, 75);
        assert_eq!(estimate.distance, 0.0);
    }

    #[test]
    fn test_single_entry_matches_any_query() {
        let mut estimator = QualityEstimator::new("unused.json");
        estimator.append(40, &scaled_table(5.0)).unwrap();
        let estimate = estimator.find_nearest(&scaled_table(0.5)).unwrap();
        assert_eq!(estimate.quality_factor, 40);
        assert!(estimate.distance > 0.0);
    }

    #[test]
    fn test_ties_resolve_to_first_entry() {
        let mut estimator = QualityEstimator::new("unused.json");
        let table = scaled_table(2.0);
        estimator.append(60, &table).unwrap();
        estimator.append(61, &table).unwrap();
        assert_eq!(estimator.find_nearest(&table).unwrap().quality_factor, 60);
    }

    #[test]
    fn test_wrong_table_length() {
        let mut estimator = QualityEstimator::new("unused.json");
        assert!(matches!(
            estimator.append(50, &[1.0; 63]),
            Err(ForensicsError::Shape(_))
        ));
        assert!(estimator.is_empty());
    }

    #[test]
    fn test_differing_chroma_tables_rejected() {
        let mut estimator = QualityEstimator::new("unused.json");
        let result = estimator.append_from_chroma_tables(90, &scaled_table(1.0), &scaled_table(2.0));
        assert!(matches!(result, Err(ForensicsError::SanityCheck(_))));
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality_factors.json");

        let mut estimator = QualityEstimator::new(&path);
        estimator.append(50, &scaled_table(4.0)).unwrap();
        estimator.append(90, &scaled_table(0.8)).unwrap();
        estimator.persist().unwrap();

        let reopened = QualityEstimator::open(&path).unwrap();
        assert_eq!(reopened.quality_factors(), &[50, 90]);
        assert_eq!(reopened.quantization_tables(), estimator.quantization_tables());
    }

    #[test]
    fn test_persist_keeps_reals_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality_factors.json");

        let mut rng = fastrand::Rng::with_seed(23);
        let mut estimator = QualityEstimator::new(&path);
        for quality in [30, 60, 95] {
            let table = (0..64).map(|_| rng.f64() * 100.0 + 1e-9).collect::<Vec<_>>();
            estimator.append(quality, &table).unwrap();
        }
        estimator.persist().unwrap();

        let reopened = QualityEstimator::open(&path).unwrap();
        for (a, b) in reopened
            .quantization_tables()
            .iter()
            .zip(estimator.quantization_tables().iter())
        {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_non_finite_query_rejected() {
        let mut estimator = QualityEstimator::new("unused.json");
        estimator.append(50, &scaled_table(1.0)).unwrap();

        for bad in [f64::NAN, f64::INFINITY] {
            let mut query = scaled_table(1.0);
            query[7] = bad;
            assert!(matches!(
                estimator.find_nearest(&query),
                Err(ForensicsError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_load_replaces_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality_factors.json");

        let mut stored = QualityEstimator::new(&path);
        stored.append(70, &scaled_table(2.5)).unwrap();
        stored.persist().unwrap();

        let mut estimator = QualityEstimator::new(&path);
        estimator.append(10, &scaled_table(9.0)).unwrap();
        estimator.append(20, &scaled_table(8.0)).unwrap();
        estimator.load().unwrap();
        assert_eq!(estimator.quality_factors(), &[70]);
    }

    #[test]
    fn test_open_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let estimator = QualityEstimator::open(dir.path().join("missing.json")).unwrap();
        assert!(estimator.is_empty());
    }

    #[test]
    fn test_load_rejects_mismatched_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, r#"{"quality_factor":[1,2],"quantization_table":[]}"#).unwrap();

        assert!(matches!(
            QualityEstimator::open(&path),
            Err(ForensicsError::Shape(_))
        ));
    }
}
