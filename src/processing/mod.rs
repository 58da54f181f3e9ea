pub mod face;
pub mod image;
pub mod quality;
pub mod shape;

pub use self::face::{CascadeFaceDetector, FaceBox, FaceDetector};
pub use self::image::ImageProcessor;
pub use self::quality::QualityProcessor;
pub use self::shape::ShapeProcessor;
