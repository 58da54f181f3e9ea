use crate::models::*;
use crate::processing::{FaceDetector, ImageProcessor};
use crate::validation::{DocumentTypeClassifier, FaceValidator, QualityAnalyzer};
use chrono::Utc;
use image::DynamicImage;
use log::{error, info, warn};
use std::path::Path;
use std::sync::Arc;

/// Outcome flags, each evaluated on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionFlags {
    pub auto_approved: bool,
    pub requires_manual_review: bool,
    pub auto_rejected: bool,
}

impl DecisionFlags {
    /// A score in the approval band with quality below the approval floor
    /// matches none of the three rules and leaves every flag unset.
    pub fn evaluate(policy: &DecisionPolicy, validation_score: u32, quality_score: f64) -> Self {
        DecisionFlags {
            auto_approved: validation_score >= policy.auto_approve_score
                && quality_score >= policy.auto_approve_quality,
            requires_manual_review: validation_score >= policy.manual_review_score
                && validation_score < policy.auto_approve_score,
            auto_rejected: validation_score < policy.manual_review_score,
        }
    }
}

pub struct DocumentValidator {
    thresholds: Thresholds,
    quality: QualityAnalyzer,
    classifier: DocumentTypeClassifier,
    faces: FaceValidator,
}

impl DocumentValidator {
    pub fn new(thresholds: Thresholds) -> Self {
        DocumentValidator {
            quality: QualityAnalyzer::new(thresholds.clone()),
            classifier: DocumentTypeClassifier::new(thresholds.clone()),
            faces: FaceValidator::from_thresholds(&thresholds),
            thresholds,
        }
    }

    /// Replace the built-in cascade with another face detection backend.
    pub fn with_face_detector(mut self, detector: Arc<dyn FaceDetector>) -> Self {
        self.faces = FaceValidator::new(detector);
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn analyze_image_quality(&self, image_path: &Path) -> QualityReport {
        self.quality.analyze_image_quality(image_path)
    }

    pub fn detect_document_type(&self, image_path: &Path) -> DocumentTypeReport {
        self.classifier.detect_document_type(image_path)
    }

    pub fn detect_face(&self, image_path: &Path) -> FaceReport {
        self.faces.detect_face(image_path)
    }

    // Main entry point: decode once, run the three checks, score and decide
    pub fn validate_document(&self, image_path: &Path, id_type: &IdType) -> ValidationReport {
        match ImageProcessor::load(image_path) {
            Ok(img) => self.validate_image(&img, id_type),
            Err(e) => {
                error!("Error validating document {:?}: {}", image_path, e);
                ValidationReport::failed(e)
            }
        }
    }

    /// Same as `validate_document` for an upload still held in memory.
    pub fn validate_bytes(&self, bytes: &[u8], id_type: &IdType) -> ValidationReport {
        match ImageProcessor::load_from_bytes(bytes) {
            Ok(img) => self.validate_image(&img, id_type),
            Err(e) => {
                error!("Error validating in-memory document ({} bytes): {}", bytes.len(), e);
                ValidationReport::failed(e)
            }
        }
    }

    pub fn validate_image(&self, img: &DynamicImage, id_type: &IdType) -> ValidationReport {
        let quality = self.quality.analyze(img).unwrap_or_else(|e| {
            warn!("Quality analysis failed: {}", e);
            QualityReport::failed(e)
        });
        let document_type = self.classifier.analyze(img).unwrap_or_else(|e| {
            warn!("Document type detection failed: {}", e);
            DocumentTypeReport::failed(e)
        });
        let face_detection = self.faces.analyze(img).unwrap_or_else(|e| {
            warn!("Face detection failed: {}", e);
            FaceReport::failed(e)
        });

        self.combine(quality, document_type, face_detection, id_type)
    }

    /// Scores the three sub-reports and sets the decision flags.
    pub fn combine(
        &self,
        quality: QualityReport,
        document_type: DocumentTypeReport,
        face_detection: FaceReport,
        id_type: &IdType,
    ) -> ValidationReport {
        let policy = &self.thresholds.decision;
        let mut validation_score = 0;
        let mut checks = Vec::with_capacity(3);

        // Check 1: image quality
        if quality.valid {
            validation_score += policy.quality_points;
            checks.push(ValidationCheck {
                check: CheckKind::ImageQuality,
                passed: true,
                detail: CheckDetail::Score { score: quality.quality_score },
            });
        } else {
            checks.push(ValidationCheck {
                check: CheckKind::ImageQuality,
                passed: false,
                detail: CheckDetail::Issues { issues: quality.issues().to_vec() },
            });
        }

        // Check 2: document type
        if document_type.confidence >= policy.min_type_confidence {
            validation_score += policy.document_type_points;
            checks.push(ValidationCheck {
                check: CheckKind::DocumentType,
                passed: true,
                detail: CheckDetail::Detected { detected: document_type.document_type },
            });
        } else {
            checks.push(ValidationCheck {
                check: CheckKind::DocumentType,
                passed: false,
                detail: CheckDetail::Confidence { confidence: document_type.confidence },
            });
        }

        // Check 3: face, only for photo-bearing documents
        if id_type.requires_face() {
            if face_detection.valid_for_id {
                validation_score += policy.face_points;
            }
            checks.push(ValidationCheck {
                check: CheckKind::FaceDetection,
                passed: face_detection.valid_for_id,
                detail: CheckDetail::Faces { faces: face_detection.face_count },
            });
        } else {
            validation_score += policy.face_points;
            checks.push(ValidationCheck {
                check: CheckKind::FaceDetection,
                passed: true,
                detail: CheckDetail::NotRequired { required: false },
            });
        }

        let flags = DecisionFlags::evaluate(policy, validation_score, quality.quality_score);
        info!(
            "Validation for {}: score {}, quality {:.2}, approved={}, review={}, rejected={}",
            id_type,
            validation_score,
            quality.quality_score,
            flags.auto_approved,
            flags.requires_manual_review,
            flags.auto_rejected
        );

        ValidationReport {
            validation_score,
            auto_approved: flags.auto_approved,
            requires_manual_review: flags.requires_manual_review,
            auto_rejected: flags.auto_rejected,
            quality_analysis: quality,
            document_type,
            face_detection,
            validation_checks: checks,
            analyzed_at: Utc::now(),
            error: None,
        }
    }
}

impl Default for DocumentValidator {
    fn default() -> Self {
        DocumentValidator::new(Thresholds::default())
    }
}
