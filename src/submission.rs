use crate::document_validator::DocumentValidator;
use crate::models::{IdType, ValidationReport};
use crate::utils::KycError;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "pdf"];
pub const AUTO_APPROVAL_NOTE: &str = "Automatically approved based on quality analysis";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let label = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        };
        write!(f, "{}", label)
    }
}

/// Account verification tier set alongside the submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_id: String,
    pub file_name: String,
    pub file_size: u64,
    /// `None` for PDFs, which are stored but not analysed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<ValidationReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionAnalysis {
    pub validation_score: f64,
    pub auto_approved: bool,
    pub requires_manual_review: bool,
    pub file_analyses: Vec<FileAnalysis>,
    pub analyzed_at: DateTime<Utc>,
}

impl SubmissionAnalysis {
    /// Mean quality score over the analysed files.
    pub fn quality_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self
            .file_analyses
            .iter()
            .filter_map(|f| f.analysis.as_ref())
            .map(|a| a.quality_analysis.quality_score)
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(round2(scores.iter().sum::<f64>() / scores.len() as f64))
    }
}

/// One KYC submission as stored for the review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycSubmission {
    pub id: String,
    pub id_type: IdType,
    pub file_ids: Vec<String>,
    pub status: SubmissionStatus,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
    pub analysis: SubmissionAnalysis,
}

impl KycSubmission {
    /// Manual decision from the review queue.
    pub fn record_review(&mut self, approve: bool, note: Option<String>, at: DateTime<Utc>) {
        if approve {
            self.status = SubmissionStatus::Approved;
            self.kyc_status = KycStatus::Verified;
        } else {
            self.status = SubmissionStatus::Rejected;
            self.kyc_status = KycStatus::Rejected;
        }
        self.admin_note = note;
        self.reviewed_at = Some(at);
    }

    pub fn processing_hours(&self) -> Option<f64> {
        self.reviewed_at
            .map(|reviewed| (reviewed - self.created_at).num_seconds() as f64 / 3600.0)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, KycError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

pub struct SubmissionProcessor {
    validator: DocumentValidator,
}

impl SubmissionProcessor {
    pub fn new(validator: DocumentValidator) -> Self {
        SubmissionProcessor { validator }
    }

    /// Extension and size gate applied to every upload before analysis.
    pub fn check_upload(&self, path: &Path) -> Result<u64, KycError> {
        let allowed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);
        if !allowed {
            return Err(KycError::UnsupportedFile(path.to_path_buf()));
        }

        let thresholds = self.validator.thresholds();
        let size = fs::metadata(path)?.len();
        if size < thresholds.min_file_size || size > thresholds.max_file_size {
            return Err(KycError::FileSize {
                size,
                min: thresholds.min_file_size,
                max: thresholds.max_file_size,
            });
        }
        Ok(size)
    }

    /// Rejects the whole submission if any file fails the upload gate.
    /// Analysis failures never reject: they land in the file's report.
    pub fn submit(&self, id_type: &IdType, paths: &[PathBuf]) -> Result<KycSubmission, KycError> {
        let mut uploads = Vec::with_capacity(paths.len());
        for path in paths {
            let file_size = self.check_upload(path)?;
            let bytes = fs::read(path)?;
            uploads.push((path, file_size, file_digest(&bytes)));
        }

        let mut file_analyses = Vec::with_capacity(uploads.len());
        for (path, file_size, file_id) in uploads {
            let analysis = if is_pdf(path) {
                debug!("Skipping analysis of PDF {:?}", path);
                None
            } else {
                Some(self.validator.validate_document(path, id_type))
            };
            file_analyses.push(FileAnalysis {
                file_id,
                file_name: file_name(path),
                file_size,
                analysis,
            });
        }

        let scores: Vec<f64> = file_analyses
            .iter()
            .filter_map(|f| f.analysis.as_ref())
            .map(|a| a.validation_score as f64)
            .collect();
        let validation_score = if scores.is_empty() {
            warn!("No analysable images in submission, leaving it for manual review");
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let policy = &self.validator.thresholds().decision;
        let auto_approved = validation_score >= policy.auto_approve_score as f64;
        let now = Utc::now();

        let file_ids: Vec<String> = file_analyses.iter().map(|f| f.file_id.clone()).collect();
        let submission = KycSubmission {
            id: submission_id(&file_ids, now),
            id_type: id_type.clone(),
            file_ids,
            status: if auto_approved { SubmissionStatus::Approved } else { SubmissionStatus::Pending },
            kyc_status: if auto_approved { KycStatus::Verified } else { KycStatus::Pending },
            created_at: now,
            reviewed_at: if auto_approved { Some(now) } else { None },
            admin_note: if auto_approved { Some(AUTO_APPROVAL_NOTE.to_string()) } else { None },
            analysis: SubmissionAnalysis {
                validation_score: round2(validation_score),
                auto_approved,
                requires_manual_review: !auto_approved,
                file_analyses,
                analyzed_at: now,
            },
        };

        info!(
            "Submission {} ({}, {} files): score {:.2}, status {}",
            submission.id,
            id_type,
            submission.file_ids.len(),
            submission.analysis.validation_score,
            submission.status
        );
        Ok(submission)
    }
}

impl Default for SubmissionProcessor {
    fn default() -> Self {
        SubmissionProcessor::new(DocumentValidator::default())
    }
}

/// Hex SHA-256 of the file contents, used as the stored file id.
pub fn file_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn submission_id(file_ids: &[String], at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    for id in file_ids {
        hasher.update(id.as_bytes());
    }
    hasher.update(at.to_rfc3339().as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Thresholds;
    use crate::processing::{FaceBox, FaceDetector};
    use image::{DynamicImage, GrayImage, Luma};
    use std::sync::Arc;

    struct OneFace;

    impl FaceDetector for OneFace {
        fn detect(&self, _gray: &GrayImage) -> Result<Vec<FaceBox>, KycError> {
            Ok(vec![FaceBox { x: 40, y: 30, width: 60, height: 60 }])
        }
    }

    fn processor() -> SubmissionProcessor {
        let thresholds = Thresholds { min_file_size: 1, ..Thresholds::default() };
        SubmissionProcessor::new(DocumentValidator::new(thresholds).with_face_detector(Arc::new(OneFace)))
    }

    fn write_checkerboard(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageLuma8(GrayImage::from_fn(1600, 1000, |x, y| {
            Luma([if (x / 8 + y / 8) % 2 == 0 { 255 } else { 0 }])
        }))
        .save(&path)
        .unwrap();
        path
    }

    fn write_flat(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 150, Luma([127u8])))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_good_scan_is_auto_approved() {
        let dir = tempfile::tempdir().unwrap();
        let scan = write_checkerboard(dir.path(), "front.png");

        let submission = processor().submit(&IdType::Passport, &[scan]).unwrap();
        assert_eq!(submission.analysis.validation_score, 100.0);
        assert!(submission.analysis.auto_approved);
        assert_eq!(submission.status, SubmissionStatus::Approved);
        assert_eq!(submission.kyc_status, KycStatus::Verified);
        assert_eq!(submission.admin_note.as_deref(), Some(AUTO_APPROVAL_NOTE));
        assert!(submission.reviewed_at.is_some());
    }

    #[test]
    fn test_average_score_decides_approval() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_checkerboard(dir.path(), "front.png");
        let poor = write_flat(dir.path(), "back.png");

        let submission = processor().submit(&IdType::Passport, &[good, poor]).unwrap();
        // 100 and 60 (passport-shaped flat image with one stub face)
        assert_eq!(submission.analysis.validation_score, 80.0);
        assert!(submission.analysis.auto_approved);

        let dir = tempfile::tempdir().unwrap();
        let poor = write_flat(dir.path(), "only.png");
        let submission = processor().submit(&IdType::Passport, &[poor]).unwrap();
        assert_eq!(submission.analysis.validation_score, 60.0);
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert_eq!(submission.kyc_status, KycStatus::Pending);
        assert!(submission.analysis.requires_manual_review);
        assert!(submission.admin_note.is_none());
    }

    #[test]
    fn test_pdf_is_stored_but_not_scored() {
        let dir = tempfile::tempdir().unwrap();
        let scan = write_checkerboard(dir.path(), "front.png");
        let pdf = dir.path().join("proof.PDF");
        fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

        let submission = processor().submit(&IdType::Passport, &[scan, pdf]).unwrap();
        assert_eq!(submission.file_ids.len(), 2);
        assert!(submission.analysis.file_analyses[1].analysis.is_none());
        assert_eq!(submission.analysis.validation_score, 100.0);
    }

    #[test]
    fn test_pdf_only_submission_is_pending() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("statement.pdf");
        fs::write(&pdf, b"%PDF-1.4 fake").unwrap();

        let submission = processor().submit(&IdType::NationalId, &[pdf]).unwrap();
        assert_eq!(submission.analysis.validation_score, 0.0);
        assert_eq!(submission.status, SubmissionStatus::Pending);
        assert!(submission.analysis.quality_score().is_none());
    }

    #[test]
    fn test_unsupported_extension_rejects_submission() {
        let dir = tempfile::tempdir().unwrap();
        let gif = dir.path().join("anim.gif");
        fs::write(&gif, b"GIF89a").unwrap();

        let err = processor().submit(&IdType::Passport, &[gif]).unwrap_err();
        assert!(matches!(err, KycError::UnsupportedFile(_)));
    }

    #[test]
    fn test_undersized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tiny = write_flat(dir.path(), "tiny.png");

        let err = SubmissionProcessor::default().check_upload(&tiny).unwrap_err();
        assert!(matches!(err, KycError::FileSize { min: 50_000, .. }));
    }

    #[test]
    fn test_file_digest_is_sha256_hex() {
        assert_eq!(
            file_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_review_and_processing_time() {
        let dir = tempfile::tempdir().unwrap();
        let poor = write_flat(dir.path(), "only.png");
        let mut submission = processor().submit(&IdType::Passport, &[poor]).unwrap();
        assert!(submission.processing_hours().is_none());

        let reviewed = submission.created_at + chrono::Duration::minutes(90);
        submission.record_review(false, Some("Blurry scan".to_string()), reviewed);
        assert_eq!(submission.status, SubmissionStatus::Rejected);
        assert_eq!(submission.kyc_status, KycStatus::Rejected);
        assert_eq!(submission.processing_hours(), Some(1.5));
    }

    #[test]
    fn test_stored_submission_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let scan = write_checkerboard(dir.path(), "front.png");
        let submission = processor().submit(&IdType::DriverLicense, &[scan]).unwrap();

        let stored = dir.path().join("submission.json");
        fs::write(&stored, serde_json::to_string_pretty(&submission).unwrap()).unwrap();
        let loaded = KycSubmission::from_json_file(&stored).unwrap();
        assert_eq!(loaded, submission);
    }
}
