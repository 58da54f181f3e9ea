use crate::models::{MetricCheck, QualityLevel, QualityMetrics, QualityReport, ResolutionCheck, Thresholds};
use crate::processing::{ImageProcessor, QualityProcessor};
use crate::utils::KycError;
use image::DynamicImage;
use log::{debug, warn};
use std::path::Path;

const MID_GRAY: f64 = 127.0;
const FULL_SHARPNESS_VARIANCE: f64 = 300.0;
const FULL_CONTRAST_STDDEV: f64 = 50.0;
const EDGE_DENSITY_GAIN: f64 = 500.0;
const COLOR_VARIANCE_DIVISOR: f64 = 1000.0;
const VALID_QUALITY_SCORE: f64 = 40.0;

const RECOMMENDATIONS: [(&str, &str); 4] = [
    ("resolution", "Use a higher resolution camera or scanner"),
    ("brightness", "Ensure good lighting conditions"),
    ("blur", "Hold camera steady and ensure focus"),
    ("contrast", "Place document on contrasting background"),
];
const MEETS_STANDARDS: &str = "Document meets quality standards";

/// Raw measurements taken from one decoded image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMeasurements {
    pub width: u32,
    pub height: u32,
    pub brightness: f64,
    pub sharpness: f64,
    pub contrast: f64,
    pub edge_density: f64,
    pub color_variance: f64,
}

/// Normalised sub-scores, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityScores {
    pub resolution: f64,
    pub brightness: f64,
    pub sharpness: f64,
    pub contrast: f64,
    pub edge: f64,
    pub color: f64,
}

impl QualityScores {
    pub fn composite(&self) -> f64 {
        let score = self.resolution * 0.25
            + self.brightness * 0.20
            + self.sharpness * 0.25
            + self.contrast * 0.15
            + self.edge * 0.10
            + self.color * 0.05;
        score.clamp(0.0, 100.0)
    }
}

pub struct QualityAnalyzer {
    thresholds: Thresholds,
}

impl QualityAnalyzer {
    pub fn new(thresholds: Thresholds) -> Self {
        QualityAnalyzer { thresholds }
    }

    /// Never fails: unreadable files yield an invalid report carrying the error.
    pub fn analyze_image_quality(&self, image_path: &Path) -> QualityReport {
        match ImageProcessor::load(image_path).and_then(|img| self.analyze(&img)) {
            Ok(report) => report,
            Err(e) => {
                warn!("Error analyzing image quality for {:?}: {}", image_path, e);
                QualityReport::failed(e)
            }
        }
    }

    pub fn analyze(&self, img: &DynamicImage) -> Result<QualityReport, KycError> {
        let measurements = self.measure(img)?;
        Ok(self.report(&measurements))
    }

    pub fn measure(&self, img: &DynamicImage) -> Result<QualityMeasurements, KycError> {
        let gray = ImageProcessor::grayscale(img);
        let (brightness, contrast) = QualityProcessor::mean_and_stddev(&gray);
        let sharpness = QualityProcessor::laplacian_variance(&gray);
        let edges = QualityProcessor::edge_map(&gray, self.thresholds.canny_low, self.thresholds.canny_high);
        let edge_density = QualityProcessor::edge_density(&edges);
        let color_variance = QualityProcessor::color_histogram_variance(img);

        let measurements = QualityMeasurements {
            width: img.width(),
            height: img.height(),
            brightness,
            sharpness,
            contrast,
            edge_density,
            color_variance,
        };

        let values = [brightness, sharpness, contrast, edge_density, color_variance];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(KycError::ImageProcessing(format!(
                "non-finite quality measurement: {:?}",
                measurements
            )));
        }

        debug!("Quality measurements: {:?}", measurements);
        Ok(measurements)
    }

    pub fn resolution_passed(&self, m: &QualityMeasurements) -> bool {
        m.width >= self.thresholds.min_image_width && m.height >= self.thresholds.min_image_height
    }

    pub fn brightness_passed(&self, m: &QualityMeasurements) -> bool {
        self.thresholds.min_brightness <= m.brightness && m.brightness <= self.thresholds.max_brightness
    }

    pub fn sharpness_passed(&self, m: &QualityMeasurements) -> bool {
        m.sharpness >= self.thresholds.min_sharpness
    }

    pub fn contrast_passed(&self, m: &QualityMeasurements) -> bool {
        m.contrast >= self.thresholds.min_contrast
    }

    pub fn scores(&self, m: &QualityMeasurements) -> QualityScores {
        let t = &self.thresholds;

        let resolution = 50.0 * m.width as f64 / t.min_image_width as f64
            + 50.0 * m.height as f64 / t.min_image_height as f64;
        let brightness = if self.brightness_passed(m) {
            100.0
        } else {
            100.0 - (m.brightness - MID_GRAY).abs() / MID_GRAY * 100.0
        };

        QualityScores {
            resolution: resolution.clamp(0.0, 100.0),
            brightness: brightness.clamp(0.0, 100.0),
            sharpness: (m.sharpness / FULL_SHARPNESS_VARIANCE * 100.0).clamp(0.0, 100.0),
            contrast: (m.contrast / FULL_CONTRAST_STDDEV * 100.0).clamp(0.0, 100.0),
            edge: (m.edge_density * EDGE_DENSITY_GAIN).clamp(0.0, 100.0),
            color: (m.color_variance / COLOR_VARIANCE_DIVISOR).clamp(0.0, 100.0),
        }
    }

    /// Issues for the four gated checks, in evaluation order.
    pub fn issues(&self, m: &QualityMeasurements) -> Vec<String> {
        let t = &self.thresholds;
        let mut issues = Vec::new();

        if !self.resolution_passed(m) {
            issues.push(format!(
                "Low resolution: {}x{} (minimum {}x{})",
                m.width, m.height, t.min_image_width, t.min_image_height
            ));
        }
        if !self.brightness_passed(m) {
            issues.push(format!(
                "Brightness issue: {:.1} (acceptable {}-{})",
                m.brightness, t.min_brightness, t.max_brightness
            ));
        }
        if !self.sharpness_passed(m) {
            issues.push(format!("Image appears blurry (sharpness: {:.1})", m.sharpness));
        }
        if !self.contrast_passed(m) {
            issues.push(format!("Low contrast detected ({:.1})", m.contrast));
        }

        issues
    }

    pub fn report(&self, m: &QualityMeasurements) -> QualityReport {
        let score = self.scores(m).composite();
        let issues = self.issues(m);
        let recommendations = recommendations_for(&issues);

        QualityReport {
            valid: score >= VALID_QUALITY_SCORE,
            quality_score: round_to(score, 2),
            metrics: Some(QualityMetrics {
                quality_level: QualityLevel::from_score(score),
                resolution: ResolutionCheck {
                    width: m.width,
                    height: m.height,
                    passed: self.resolution_passed(m),
                },
                brightness: MetricCheck {
                    value: round_to(m.brightness, 2),
                    passed: self.brightness_passed(m),
                },
                sharpness: MetricCheck {
                    value: round_to(m.sharpness, 2),
                    passed: self.sharpness_passed(m),
                },
                contrast: MetricCheck {
                    value: round_to(m.contrast, 2),
                    passed: self.contrast_passed(m),
                },
                edge_density: round_to(m.edge_density, 4),
                color_variance: round_to(m.color_variance, 2),
                issues,
                recommendations,
            }),
            error: None,
        }
    }
}

impl Default for QualityAnalyzer {
    fn default() -> Self {
        QualityAnalyzer::new(Thresholds::default())
    }
}

/// One recommendation per matching category, in first-seen order.
pub fn recommendations_for(issues: &[String]) -> Vec<String> {
    let mut recommendations: Vec<String> = Vec::new();
    for issue in issues {
        let lowered = issue.to_lowercase();
        for (keyword, advice) in RECOMMENDATIONS {
            if lowered.contains(keyword) && !recommendations.iter().any(|r| r == advice) {
                recommendations.push(advice.to_string());
            }
        }
    }
    if recommendations.is_empty() {
        recommendations.push(MEETS_STANDARDS.to_string());
    }
    recommendations
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
