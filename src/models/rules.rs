use crate::utils::KycError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MIN_IMAGE_WIDTH: u32 = 800;
pub const MIN_IMAGE_HEIGHT: u32 = 600;
pub const MIN_BRIGHTNESS: f64 = 30.0;
pub const MAX_BRIGHTNESS: f64 = 225.0;
pub const MIN_SHARPNESS: f64 = 100.0;
pub const MIN_CONTRAST: f64 = 30.0;
pub const MIN_FILE_SIZE: u64 = 50_000; // 50KB
pub const MAX_FILE_SIZE: u64 = 10_485_760; // 10MB

/// Quality thresholds and scoring policy shared by every analyzer.
///
/// `Default` reproduces the process-wide constants above. A deployment can
/// override any subset from a JSON file; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_image_width: u32,
    pub min_image_height: u32,
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_sharpness: f64,
    pub min_contrast: f64,
    pub min_file_size: u64,
    pub max_file_size: u64,
    pub canny_low: f32,
    pub canny_high: f32,
    pub face_detection: FaceDetectionParams,
    pub decision: DecisionPolicy,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_image_width: MIN_IMAGE_WIDTH,
            min_image_height: MIN_IMAGE_HEIGHT,
            min_brightness: MIN_BRIGHTNESS,
            max_brightness: MAX_BRIGHTNESS,
            min_sharpness: MIN_SHARPNESS,
            min_contrast: MIN_CONTRAST,
            min_file_size: MIN_FILE_SIZE,
            max_file_size: MAX_FILE_SIZE,
            canny_low: 50.0,
            canny_high: 150.0,
            face_detection: FaceDetectionParams::default(),
            decision: DecisionPolicy::default(),
        }
    }
}

impl Thresholds {
    pub fn from_json_file(path: &Path) -> Result<Self, KycError> {
        let raw = std::fs::read_to_string(path)?;
        let thresholds: Thresholds = serde_json::from_str(&raw)?;
        thresholds.check()?;
        Ok(thresholds)
    }

    fn check(&self) -> Result<(), KycError> {
        if self.min_brightness > self.max_brightness {
            return Err(KycError::Config(format!(
                "min_brightness {} exceeds max_brightness {}",
                self.min_brightness, self.max_brightness
            )));
        }
        if self.min_file_size > self.max_file_size {
            return Err(KycError::Config(format!(
                "min_file_size {} exceeds max_file_size {}",
                self.min_file_size, self.max_file_size
            )));
        }
        if self.min_image_width == 0 || self.min_image_height == 0 {
            return Err(KycError::Config("minimum image dimensions must be non-zero".to_string()));
        }
        if self.face_detection.scale_factor <= 1.0 {
            return Err(KycError::Config(format!(
                "face scale_factor must be greater than 1.0, got {}",
                self.face_detection.scale_factor
            )));
        }
        Ok(())
    }
}

/// Sliding-window parameters for the frontal-face detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: usize,
    pub min_size: u32,
}

impl Default for FaceDetectionParams {
    fn default() -> Self {
        FaceDetectionParams {
            scale_factor: 1.1,
            min_neighbors: 5,
            min_size: 30,
        }
    }
}

/// Points awarded per validation check and the decision bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionPolicy {
    pub quality_points: u32,
    pub document_type_points: u32,
    pub face_points: u32,
    pub min_type_confidence: f64,
    pub auto_approve_score: u32,
    pub auto_approve_quality: f64,
    pub manual_review_score: u32,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        DecisionPolicy {
            quality_points: 40,
            document_type_points: 30,
            face_points: 30,
            min_type_confidence: 70.0,
            auto_approve_score: 80,
            auto_approve_quality: 60.0,
            manual_review_score: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_constants() {
        let t = Thresholds::default();
        assert_eq!(t.min_image_width, 800);
        assert_eq!(t.min_image_height, 600);
        assert_eq!(t.max_file_size, 10_485_760);
        assert_eq!(t.face_detection.min_neighbors, 5);
        assert_eq!(t.decision.quality_points + t.decision.document_type_points + t.decision.face_points, 100);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_sharpness": 150.0, "decision": {{"auto_approve_score": 90}}}}"#).unwrap();

        let t = Thresholds::from_json_file(file.path()).unwrap();
        assert_eq!(t.min_sharpness, 150.0);
        assert_eq!(t.decision.auto_approve_score, 90);
        assert_eq!(t.decision.quality_points, 40);
        assert_eq!(t.min_image_width, 800);
    }

    #[test]
    fn test_inverted_brightness_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"min_brightness": 200.0, "max_brightness": 100.0}}"#).unwrap();

        let err = Thresholds::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, KycError::Config(_)));
    }
}
