use crate::models::{Dimensions, DocumentType, DocumentTypeReport, Thresholds};
use crate::processing::{ImageProcessor, QualityProcessor, ShapeProcessor};
use crate::utils::KycError;
use crate::validation::quality::round_to;
use image::{DynamicImage, GrayImage};
use log::{debug, warn};
use std::path::Path;

const POLYGON_EPSILON_RATIO: f64 = 0.02;
const SHAPE_BOOST: f64 = 10.0;
const MAX_CONFIDENCE: f64 = 95.0;

/// Aspect-ratio band classification. Bands are checked in order and the
/// first match wins, so a ratio of exactly 1.5 is an ID card.
pub fn classify_aspect_ratio(aspect_ratio: f64) -> (DocumentType, f64) {
    if (1.5..=1.7).contains(&aspect_ratio) {
        (DocumentType::IdCard, 85.0)
    } else if (1.3..1.5).contains(&aspect_ratio) {
        (DocumentType::Passport, 80.0)
    } else if (0.6..=0.8).contains(&aspect_ratio) {
        (DocumentType::PortraitPhoto, 75.0)
    } else if aspect_ratio > 2.0 {
        (DocumentType::DriverLicense, 70.0)
    } else {
        (DocumentType::Unknown, 30.0)
    }
}

/// Confidence after the document-outline check. Applied at most once.
pub fn boost_for_shape(confidence: f64, has_document_shape: bool) -> f64 {
    if has_document_shape {
        (confidence + SHAPE_BOOST).min(MAX_CONFIDENCE)
    } else {
        confidence
    }
}

pub struct DocumentTypeClassifier {
    thresholds: Thresholds,
}

impl DocumentTypeClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        DocumentTypeClassifier { thresholds }
    }

    pub fn detect_document_type(&self, image_path: &Path) -> DocumentTypeReport {
        match ImageProcessor::load(image_path).and_then(|img| self.analyze(&img)) {
            Ok(report) => report,
            Err(e) => {
                warn!("Error detecting document type for {:?}: {}", image_path, e);
                DocumentTypeReport::failed(e)
            }
        }
    }

    pub fn analyze(&self, img: &DynamicImage) -> Result<DocumentTypeReport, KycError> {
        let gray = ImageProcessor::grayscale(img);
        let edges = QualityProcessor::edge_map(&gray, self.thresholds.canny_low, self.thresholds.canny_high);
        self.classify_edges(img.width(), img.height(), &edges)
    }

    /// Classification from image dimensions and a precomputed edge map.
    pub fn classify_edges(
        &self,
        width: u32,
        height: u32,
        edges: &GrayImage,
    ) -> Result<DocumentTypeReport, KycError> {
        if height == 0 {
            return Err(KycError::ImageProcessing("Image has zero height".to_string()));
        }

        let aspect_ratio = width as f64 / height as f64;
        let (document_type, base_confidence) = classify_aspect_ratio(aspect_ratio);
        let has_document_shape = ShapeProcessor::find_quadrilateral(edges, POLYGON_EPSILON_RATIO).is_some();
        let confidence = boost_for_shape(base_confidence, has_document_shape);

        debug!(
            "Aspect ratio {:.3} -> {} ({}), document outline: {}",
            aspect_ratio, document_type, confidence, has_document_shape
        );

        Ok(DocumentTypeReport {
            document_type,
            confidence,
            aspect_ratio: round_to(aspect_ratio, 2),
            has_document_shape,
            dimensions: Dimensions { width, height },
            error: None,
        })
    }
}

impl Default for DocumentTypeClassifier {
    fn default() -> Self {
        DocumentTypeClassifier::new(Thresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
    use imageproc::rect::Rect;

    #[test]
    fn test_aspect_ratio_bands() {
        assert_eq!(classify_aspect_ratio(1.6), (DocumentType::IdCard, 85.0));
        assert_eq!(classify_aspect_ratio(1.42), (DocumentType::Passport, 80.0));
        assert_eq!(classify_aspect_ratio(0.7), (DocumentType::PortraitPhoto, 75.0));
        assert_eq!(classify_aspect_ratio(2.5), (DocumentType::DriverLicense, 70.0));
        assert_eq!(classify_aspect_ratio(1.0), (DocumentType::Unknown, 30.0));
        assert_eq!(classify_aspect_ratio(2.0), (DocumentType::Unknown, 30.0));
    }

    #[test]
    fn test_boundary_goes_to_first_band() {
        assert_eq!(classify_aspect_ratio(1.5).0, DocumentType::IdCard);
        assert_eq!(classify_aspect_ratio(1.7).0, DocumentType::IdCard);
        assert_eq!(classify_aspect_ratio(1.3).0, DocumentType::Passport);
    }

    #[test]
    fn test_full_hd_is_unknown() {
        assert_eq!(classify_aspect_ratio(1920.0 / 1080.0).0, DocumentType::Unknown);
    }

    #[test]
    fn test_shape_boost_is_capped() {
        assert_eq!(boost_for_shape(85.0, true), 95.0);
        assert_eq!(boost_for_shape(80.0, true), 90.0);
        assert_eq!(boost_for_shape(30.0, false), 30.0);
    }

    #[test]
    fn test_two_outlines_boost_once() {
        let mut edges = GrayImage::new(400, 400);
        draw_hollow_rect_mut(&mut edges, Rect::at(20, 20).of_size(150, 100), Luma([255u8]));
        draw_hollow_rect_mut(&mut edges, Rect::at(220, 250).of_size(120, 90), Luma([255u8]));

        let report = DocumentTypeClassifier::default().classify_edges(400, 400, &edges).unwrap();
        assert_eq!(report.document_type, DocumentType::Unknown);
        assert!(report.has_document_shape);
        assert_eq!(report.confidence, 40.0);
    }

    #[test]
    fn test_overlapping_outlines_boost_once() {
        // A card outline with the photo-box outline lying on top of it
        let mut edges = GrayImage::new(400, 400);
        draw_hollow_rect_mut(&mut edges, Rect::at(20, 20).of_size(320, 200), Luma([255u8]));
        draw_hollow_rect_mut(&mut edges, Rect::at(40, 50).of_size(100, 130), Luma([255u8]));
        let classifier = DocumentTypeClassifier::default();

        let report = classifier.classify_edges(400, 400, &edges).unwrap();
        assert_eq!(report.document_type, DocumentType::Unknown);
        assert!(report.has_document_shape);
        assert_eq!(report.confidence, 40.0);

        let report = classifier.classify_edges(1600, 1000, &edges).unwrap();
        assert_eq!(report.document_type, DocumentType::IdCard);
        assert!(report.has_document_shape);
        assert_eq!(report.confidence, 95.0);
    }

    #[test]
    fn test_card_on_background_detected() {
        // 1600x1000 id-card framing with a bright card outline on dark background
        let mut gray = GrayImage::from_pixel(1600, 1000, Luma([20u8]));
        draw_filled_rect_mut(&mut gray, Rect::at(200, 150).of_size(1200, 700), Luma([230u8]));
        let img = DynamicImage::ImageLuma8(gray);

        let report = DocumentTypeClassifier::default().analyze(&img).unwrap();
        assert_eq!(report.document_type, DocumentType::IdCard);
        assert!(report.has_document_shape);
        assert_eq!(report.confidence, 95.0);
        assert_eq!(report.aspect_ratio, 1.6);
        assert_eq!(report.dimensions, Dimensions { width: 1600, height: 1000 });
    }

    #[test]
    fn test_plain_image_has_no_outline() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(700, 1000, Luma([128u8])));
        let report = DocumentTypeClassifier::default().analyze(&img).unwrap();
        assert_eq!(report.document_type, DocumentType::PortraitPhoto);
        assert!(!report.has_document_shape);
        assert_eq!(report.confidence, 75.0);
    }

    #[test]
    fn test_unreadable_file_is_unknown() {
        let report = DocumentTypeClassifier::default().detect_document_type(Path::new("/nonexistent/card.png"));
        assert_eq!(report.document_type, DocumentType::Unknown);
        assert_eq!(report.confidence, 0.0);
        assert!(report.error.is_some());
    }
}
