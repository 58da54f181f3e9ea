pub mod document_type;
pub mod face;
pub mod quality;

pub use document_type::DocumentTypeClassifier;
pub use face::FaceValidator;
pub use quality::{QualityAnalyzer, QualityMeasurements, QualityScores};
