use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,  // >= 80
    Good,       // >= 60
    Acceptable, // >= 40
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            QualityLevel::Excellent
        } else if score >= 60.0 {
            QualityLevel::Good
        } else if score >= 40.0 {
            QualityLevel::Acceptable
        } else {
            QualityLevel::Poor
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Acceptable => "acceptable",
            QualityLevel::Poor => "poor",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionCheck {
    pub width: u32,
    pub height: u32,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCheck {
    pub value: f64,
    pub passed: bool,
}

/// Per-metric breakdown of a successful quality analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub quality_level: QualityLevel,
    pub resolution: ResolutionCheck,
    pub brightness: MetricCheck,
    pub sharpness: MetricCheck,
    pub contrast: MetricCheck,
    pub edge_density: f64,
    pub color_variance: f64,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub valid: bool,
    pub quality_score: f64,
    /// Stored alongside `valid` and `quality_score`, not under a key of its own.
    #[serde(flatten)]
    pub metrics: Option<QualityMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QualityReport {
    pub fn failed(error: impl ToString) -> Self {
        QualityReport {
            valid: false,
            quality_score: 0.0,
            metrics: None,
            error: Some(error.to_string()),
        }
    }

    pub fn issues(&self) -> &[String] {
        self.metrics.as_ref().map_or(&[], |m| m.issues.as_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    IdCard,
    Passport,
    PortraitPhoto,
    DriverLicense,
    Unknown,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            DocumentType::IdCard => "id_card",
            DocumentType::Passport => "passport",
            DocumentType::PortraitPhoto => "portrait_photo",
            DocumentType::DriverLicense => "driver_license",
            DocumentType::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTypeReport {
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub confidence: f64,
    pub aspect_ratio: f64,
    pub has_document_shape: bool,
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentTypeReport {
    pub fn failed(error: impl ToString) -> Self {
        DocumentTypeReport {
            document_type: DocumentType::Unknown,
            confidence: 0.0,
            aspect_ratio: 0.0,
            has_document_shape: false,
            dimensions: Dimensions::default(),
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub face_ratio_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceReport {
    pub face_detected: bool,
    pub face_count: usize,
    pub faces: Vec<FaceRegion>,
    pub valid_for_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FaceReport {
    pub fn failed(error: impl ToString) -> Self {
        FaceReport {
            face_detected: false,
            face_count: 0,
            faces: Vec::new(),
            valid_for_id: false,
            error: Some(error.to_string()),
        }
    }
}

/// Declared identity document type from the submission form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdType {
    Passport,
    NationalId,
    DriverLicense,
    Other(String),
}

impl IdType {
    /// Photo-bearing documents must show exactly one face.
    pub fn requires_face(&self) -> bool {
        matches!(self, IdType::Passport | IdType::NationalId | IdType::DriverLicense)
    }

    pub fn as_str(&self) -> &str {
        match self {
            IdType::Passport => "passport",
            IdType::NationalId => "national_id",
            IdType::DriverLicense => "driver_license",
            IdType::Other(other) => other,
        }
    }
}

impl From<&str> for IdType {
    fn from(value: &str) -> Self {
        match value {
            "passport" => IdType::Passport,
            "national_id" => IdType::NationalId,
            "driver_license" => IdType::DriverLicense,
            other => IdType::Other(other.to_string()),
        }
    }
}

impl From<String> for IdType {
    fn from(value: String) -> Self {
        IdType::from(value.as_str())
    }
}

impl From<IdType> for String {
    fn from(value: IdType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckKind {
    #[serde(rename = "Image Quality")]
    ImageQuality,
    #[serde(rename = "Document Type")]
    DocumentType,
    #[serde(rename = "Face Detection")]
    FaceDetection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckDetail {
    Score { score: f64 },
    Issues { issues: Vec<String> },
    Detected { detected: DocumentType },
    Confidence { confidence: f64 },
    Faces { faces: usize },
    NotRequired { required: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub check: CheckKind,
    pub passed: bool,
    #[serde(flatten)]
    pub detail: CheckDetail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutoApprove,
    ManualReview,
    AutoReject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub validation_score: u32,
    pub auto_approved: bool,
    pub requires_manual_review: bool,
    pub auto_rejected: bool,
    pub quality_analysis: QualityReport,
    pub document_type: DocumentTypeReport,
    pub face_detection: FaceReport,
    pub validation_checks: Vec<ValidationCheck>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationReport {
    /// Zero-score report used when the analysis itself could not run.
    /// Internal failures always land in the manual review queue.
    pub fn failed(error: impl ToString) -> Self {
        let error = error.to_string();
        ValidationReport {
            validation_score: 0,
            auto_approved: false,
            requires_manual_review: true,
            auto_rejected: false,
            quality_analysis: QualityReport::failed(&error),
            document_type: DocumentTypeReport::failed(&error),
            face_detection: FaceReport::failed(&error),
            validation_checks: Vec::new(),
            analyzed_at: Utc::now(),
            error: Some(error),
        }
    }

    /// Collapses the three independently evaluated flags into one outcome.
    ///
    /// A score at or above the approval band with image quality below the
    /// approval floor sets none of the flags; that case is routed to manual
    /// review here.
    pub fn decision(&self) -> Decision {
        if self.auto_approved {
            Decision::AutoApprove
        } else if self.auto_rejected {
            Decision::AutoReject
        } else {
            Decision::ManualReview
        }
    }
}
