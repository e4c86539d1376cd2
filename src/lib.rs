use log::{debug, error, warn};
use ndarray::Array3;
use parking_lot::{RwLock, RwLockReadGuard};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;

use crate::{
    analysis::{
        cropping::Realigner,
        noise_residual::ResidualExtractor,
        quality_factor::{QualityEstimate, QualityEstimator},
        upsampling::{UpsamplingMode, UpsamplingUndo},
    },
    decoder::{CB, CR, CoefficientDecoder, LUMA, dequantize, table_as_f64},
    detection::Detector,
    error::{ForensicsError, Result},
};

pub mod error;
pub mod image_utils;
pub mod transform;
pub mod decoder;
pub mod analysis;
pub mod detection;
pub mod report;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Halve full-resolution (4:4:4) chroma channels before scoring.
    pub reduce_444_chroma: bool,
    pub upsampling_mode: UpsamplingMode,
    /// Pixels to crop from the top and left margins, each below 8.
    pub crop: Option<(usize, usize)>,
    pub use_noise_residual: bool,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reduce_444_chroma: false,
            upsampling_mode: UpsamplingMode::Auto,
            crop: None,
            use_noise_residual: false,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageScores {
    pub max_h_samp_factor: u8,
    pub max_v_samp_factor: u8,
    pub cb_h_samp_factor: u8,
    pub cb_v_samp_factor: u8,
    pub cb_score: f64,
    pub cr_score: f64,
    pub quality: Option<QualityEstimate>,
    pub chroma_reduced: bool,
    pub crop_top: usize,
    pub crop_left: usize,
}

pub struct ChromaAnalyzer {
    config: AnalysisConfig,
    detector: Detector,
    quality_estimator: RwLock<QualityEstimator>,
    realigner: Realigner,
    upsampling: UpsamplingUndo,
    residual: ResidualExtractor,
}

impl ChromaAnalyzer {
    pub fn new(quality_estimator: QualityEstimator) -> Self {
        Self {
            config: AnalysisConfig::default(),
            detector: Detector::default(),
            quality_estimator: RwLock::new(quality_estimator),
            realigner: Realigner::new(),
            upsampling: UpsamplingUndo::new(),
            residual: ResidualExtractor::new(),
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn quality_estimator(&self) -> RwLockReadGuard<'_, QualityEstimator> {
        self.quality_estimator.read()
    }

    pub fn register_quality_factor(&self, quality_factor: i32, quantization_table: &[f64]) -> Result<()> {
        self.quality_estimator.write().append(quality_factor, quantization_table)
    }

    pub fn persist_quality_factors(&self) -> Result<()> {
        self.quality_estimator.read().persist()
    }

    pub fn analyze<D: CoefficientDecoder + ?Sized>(&self, decoder: &D) -> Result<ImageScores> {
        let max_v_samp_factor = decoder.max_v_samp_factor();
        let max_h_samp_factor = decoder.max_h_samp_factor();

        if decoder.height_in_blocks(CR) != decoder.height_in_blocks(CB)
            || decoder.width_in_blocks(CR) != decoder.width_in_blocks(CB)
            || decoder.v_samp_factor(LUMA) != max_v_samp_factor
            || decoder.h_samp_factor(LUMA) != max_h_samp_factor
        {
            return Err(ForensicsError::SanityCheck(
                "chroma block grids or luma sampling factors are inconsistent".into(),
            ));
        }

        let cb_table = decoder.quantization_table(CB)?;
        let cr_table = decoder.quantization_table(CR)?;
        if cb_table != cr_table {
            warn!("Quantization tables for Cb and Cr channels are different");
        }

        let quality = self.estimate_quality(&table_as_f64(&cb_table))?;

        let cb_blocks = dequantize(&decoder.dct_coefficients(CB)?, &cb_table)?;
        let cr_blocks = dequantize(&decoder.dct_coefficients(CR)?, &cr_table)?;

        let chroma_reduced =
            self.config.reduce_444_chroma && max_v_samp_factor == 1 && max_h_samp_factor == 1;

        let (cb_score, cr_score) = if self.config.parallel {
            let (cb, cr) = rayon::join(
                || self.score_channel(cb_blocks, chroma_reduced),
                || self.score_channel(cr_blocks, chroma_reduced),
            );
            (cb?, cr?)
        } else {
            (
                self.score_channel(cb_blocks, chroma_reduced)?,
                self.score_channel(cr_blocks, chroma_reduced)?,
            )
        };

        let (crop_top, crop_left) = self.config.crop.unwrap_or((0, 0));

        Ok(ImageScores {
            max_h_samp_factor,
            max_v_samp_factor,
            cb_h_samp_factor: decoder.h_samp_factor(CB),
            cb_v_samp_factor: decoder.v_samp_factor(CB),
            cb_score,
            cr_score,
            quality,
            chroma_reduced,
            crop_top,
            crop_left,
        })
    }

    pub fn analyze_many<D>(&self, images: &[(String, D)]) -> Vec<(String, ImageScores)>
    where
        D: CoefficientDecoder + Sync,
    {
        let analyze_one = |(name, decoder): &(String, D)| match self.analyze(decoder) {
            Ok(scores) => Some((name.clone(), scores)),
            Err(err) => {
                error!("Error processing image {}: {}", name, err);
                None
            }
        };

        if self.config.parallel {
            images.par_iter().filter_map(analyze_one).collect()
        } else {
            images.iter().filter_map(analyze_one).collect()
        }
    }

    /// Reduction, cropping and residual extraction, in that order, on
    /// dequantized blocks.
    pub fn prepare_channel(&self, dct_blocks: Array3<f64>, reduce: bool) -> Result<Array3<f64>> {
        let mut blocks = dct_blocks;

        if reduce {
            blocks = self.upsampling.reduce(&blocks, self.config.upsampling_mode)?;
            debug!("Reduced chroma to {:?} blocks", &blocks.shape()[..2]);
        }

        if let Some((crop_top, crop_left)) = self.config.crop {
            blocks = self.realigner.crop(&blocks, crop_top, crop_left)?;
        }

        if self.config.use_noise_residual {
            blocks = self.residual.extract(&blocks, false)?.dct_blocks;
        }

        Ok(blocks)
    }

    fn score_channel(&self, dct_blocks: Array3<f64>, reduce: bool) -> Result<f64> {
        let blocks = self.prepare_channel(dct_blocks, reduce)?;
        self.detector.detect_score(&blocks)
    }

    fn estimate_quality(&self, table: &[f64]) -> Result<Option<QualityEstimate>> {
        let estimator = self.quality_estimator.read();
        if estimator.is_empty() {
            warn!("No reference quantization tables loaded, skipping quality estimate");
            return Ok(None);
        }
        estimator.find_nearest(table).map(Some)
    }
}
