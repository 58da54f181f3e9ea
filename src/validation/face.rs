use crate::models::{FaceRegion, FaceReport, Thresholds};
use crate::processing::{CascadeFaceDetector, FaceDetector, ImageProcessor};
use crate::utils::KycError;
use crate::validation::quality::round_to;
use image::DynamicImage;
use log::{debug, warn};
use std::path::Path;
use std::sync::Arc;

pub struct FaceValidator {
    detector: Arc<dyn FaceDetector>,
}

impl FaceValidator {
    pub fn new(detector: Arc<dyn FaceDetector>) -> Self {
        FaceValidator { detector }
    }

    /// Uses the built-in cascade configured from `thresholds.face_detection`.
    pub fn from_thresholds(thresholds: &Thresholds) -> Self {
        FaceValidator::new(Arc::new(CascadeFaceDetector::new(thresholds.face_detection.clone())))
    }

    pub fn detect_face(&self, image_path: &Path) -> FaceReport {
        match ImageProcessor::load(image_path).and_then(|img| self.analyze(&img)) {
            Ok(report) => report,
            Err(e) => {
                warn!("Error detecting face in {:?}: {}", image_path, e);
                FaceReport::failed(e)
            }
        }
    }

    pub fn analyze(&self, img: &DynamicImage) -> Result<FaceReport, KycError> {
        let gray = ImageProcessor::grayscale(img);
        let boxes = self.detector.detect(&gray)?;
        let image_area = img.width() as f64 * img.height() as f64;

        let faces: Vec<FaceRegion> = boxes
            .iter()
            .map(|b| FaceRegion {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
                face_ratio_percent: round_to(b.area() as f64 / image_area * 100.0, 2),
            })
            .collect();

        debug!("Detected {} face(s)", faces.len());

        Ok(FaceReport {
            face_detected: !faces.is_empty(),
            face_count: faces.len(),
            valid_for_id: faces.len() == 1,
            faces,
            error: None,
        })
    }
}

impl Default for FaceValidator {
    fn default() -> Self {
        FaceValidator::from_thresholds(&Thresholds::default())
    }
}
