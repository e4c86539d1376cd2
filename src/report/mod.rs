pub mod visualization;

use serde::Serialize;

use crate::ImageScores;

#[derive(Serialize)]
pub struct JsonReport {
    pub image_count: usize,
    pub mean_cb_score: Option<f64>,
    pub mean_cr_score: Option<f64>,
    pub images: Vec<ImageReportSection>,
}

#[derive(Serialize)]
pub struct ImageReportSection {
    pub filename: String,
    pub max_h_samp_factor: u8,
    pub max_v_samp_factor: u8,
    pub cb_h_samp_factor: u8,
    pub cb_v_samp_factor: u8,
    pub cb_score: f64,
    pub cr_score: f64,
    pub estimated_quality_factor: Option<i32>,
    pub estimated_quality_factor_distance: Option<f64>,
    pub crop_top: usize,
    pub crop_left: usize,
}

impl From<(&str, &ImageScores)> for ImageReportSection {
    fn from((filename, scores): (&str, &ImageScores)) -> Self {
        Self {
            filename: filename.to_string(),
            max_h_samp_factor: scores.max_h_samp_factor,
            max_v_samp_factor: scores.max_v_samp_factor,
            cb_h_samp_factor: scores.cb_h_samp_factor,
            cb_v_samp_factor: scores.cb_v_samp_factor,
            cb_score: scores.cb_score,
            cr_score: scores.cr_score,
            estimated_quality_factor: scores.quality.map(|q| q.quality_factor),
            estimated_quality_factor_distance: scores.quality.map(|q| q.distance),
            crop_top: scores.crop_top,
            crop_left: scores.crop_left,
        }
    }
}

impl From<&[(String, ImageScores)]> for JsonReport {
    fn from(results: &[(String, ImageScores)]) -> Self {
        let images = results
            .iter()
            .map(|(name, scores)| ImageReportSection::from((name.as_str(), scores)))
            .collect::<Vec<_>>();

        let mean = |values: Vec<f64>| {
            let finite = values.into_iter().filter(|v| v.is_finite()).collect::<Vec<_>>();
            if finite.is_empty() {
                None
            } else {
                Some(finite.iter().sum::<f64>() / finite.len() as f64)
            }
        };

        Self {
            image_count: images.len(),
            mean_cb_score: mean(images.iter().map(|i| i.cb_score).collect()),
            mean_cr_score: mean(images.iter().map(|i| i.cr_score).collect()),
            images,
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::quality_factor::QualityEstimate;

    fn scores(cb_score: f64, quality: Option<QualityEstimate>) -> ImageScores {
        ImageScores {
            max_h_samp_factor: 2,
            max_v_samp_factor: 2,
            cb_h_samp_factor: 1,
            cb_v_samp_factor: 1,
            cb_score,
            cr_score: 0.5,
            quality,
            chroma_reduced: false,
            crop_top: 0,
            crop_left: 3,
        }
    }

    #[test]
    fn test_report_columns() {
        let results = vec![
            (
                "a.jpg".to_string(),
                scores(0.2, Some(QualityEstimate { quality_factor: 90, distance: 1.5 })),
            ),
            ("b.jpg".to_string(), scores(0.4, None)),
        ];

        let report = JsonReport::from(results.as_slice());
        assert_eq!(report.image_count, 2);
        assert!((report.mean_cb_score.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(report.images[0].estimated_quality_factor, Some(90));
        assert_eq!(report.images[1].estimated_quality_factor_distance, None);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"filename\": \"a.jpg\""));
        assert!(json.contains("\"crop_left\": 3"));
    }

    #[test]
    fn test_empty_report() {
        let results: Vec<(String, ImageScores)> = Vec::new();
        let report = JsonReport::from(results.as_slice());
        assert_eq!(report.image_count, 0);
        assert!(report.mean_cb_score.is_none());
    }
}
