pub mod document_validator;
pub mod models;
pub mod processing;
pub mod reporting;
pub mod submission;
pub mod utils;
pub mod validation;

pub use document_validator::DocumentValidator;
pub use submission::SubmissionProcessor;
