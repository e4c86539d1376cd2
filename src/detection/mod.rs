pub mod dct_template;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::{detection::dct_template::DctTemplateDetector, error::Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorKind {
    DctTemplate,
}

/// Every detector consumes dequantized 8x8 DCT blocks of shape `[V, H, 64]`.
#[derive(Debug, Clone)]
pub enum Detector {
    DctTemplate(DctTemplateDetector),
}

impl Detector {
    pub fn new(kind: DetectorKind) -> Self {
        match kind {
            DetectorKind::DctTemplate => Detector::DctTemplate(DctTemplateDetector::new()),
        }
    }

    pub fn kind(&self) -> DetectorKind {
        match self {
            Detector::DctTemplate(_) => DetectorKind::DctTemplate,
        }
    }

    /// Per-block match strength, shape `[V, H]`.
    pub fn detect_map(&self, dct_blocks: &Array3<f64>) -> Result<Array2<f64>> {
        match self {
            Detector::DctTemplate(detector) => detector.detect_map(dct_blocks),
        }
    }

    /// One scalar per channel; higher means a stronger match.
    pub fn detect_score(&self, dct_blocks: &Array3<f64>) -> Result<f64> {
        match self {
            Detector::DctTemplate(detector) => detector.detect_score(dct_blocks),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Detector::DctTemplate(_) => "DCT Template Matching",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Detector::DctTemplate(_) => {
                "Normalized cross-correlation of 8x8 DCT blocks with the chroma dimple template"
            }
        }
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(DetectorKind::DctTemplate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_matches_concrete_detector() {
        let mut rng = fastrand::Rng::with_seed(3);
        let blocks = Array3::from_shape_fn((2, 2, 64), |_| rng.f64());

        let detector = Detector::default();
        assert_eq!(detector.kind(), DetectorKind::DctTemplate);
        assert_eq!(
            detector.detect_score(&blocks).unwrap(),
            DctTemplateDetector::new().detect_score(&blocks).unwrap()
        );
    }
}
