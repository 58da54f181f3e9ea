use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::edges::canny;
use imageproc::filter::filter3x3;

/// 4-neighbour Laplacian.
const LAPLACIAN_KERNEL: [i32; 9] = [0, 1, 0, 1, -4, 1, 0, 1, 0];

/// Raw image statistics behind the quality score.
pub struct QualityProcessor;

impl QualityProcessor {
    /// Mean intensity and population standard deviation of a grayscale image.
    pub fn mean_and_stddev(gray: &GrayImage) -> (f64, f64) {
        let count = (gray.width() as u64 * gray.height() as u64) as f64;
        if count == 0.0 {
            return (0.0, 0.0);
        }

        let (sum, sum_sq) = gray.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
            let v = p[0] as f64;
            (s + v, sq + v * v)
        });

        let mean = sum / count;
        let variance = (sum_sq / count - mean * mean).max(0.0);
        (mean, variance.sqrt())
    }

    /// Variance of the Laplacian response; low values indicate defocus or motion blur.
    pub fn laplacian_variance(gray: &GrayImage) -> f64 {
        let response: ImageBuffer<Luma<i16>, Vec<i16>> = filter3x3(gray, &LAPLACIAN_KERNEL);
        let count = response.len() as f64;
        if count == 0.0 {
            return 0.0;
        }

        let (sum, sum_sq) = response.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
            let v = p[0] as f64;
            (s + v, sq + v * v)
        });

        let mean = sum / count;
        (sum_sq / count - mean * mean).max(0.0)
    }

    pub fn edge_map(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
        canny(gray, low, high)
    }

    /// Fraction of pixels marked in an edge map.
    pub fn edge_density(edges: &GrayImage) -> f64 {
        let total = edges.len();
        if total == 0 {
            return 0.0;
        }
        let marked = edges.pixels().filter(|p| p[0] > 0).count();
        marked as f64 / total as f64
    }

    /// Mean over the R, G and B channels of the variance of their 256-bin histograms.
    pub fn color_histogram_variance(img: &DynamicImage) -> f64 {
        let rgb = img.to_rgb8();
        let mut histograms = [[0u64; 256]; 3];
        for pixel in rgb.pixels() {
            for (channel, histogram) in histograms.iter_mut().enumerate() {
                histogram[pixel[channel] as usize] += 1;
            }
        }

        let variances: Vec<f64> = histograms
            .iter()
            .map(|histogram| {
                let mean = histogram.iter().sum::<u64>() as f64 / 256.0;
                histogram
                    .iter()
                    .map(|&count| {
                        let d = count as f64 - mean;
                        d * d
                    })
                    .sum::<f64>()
                    / 256.0
            })
            .collect();

        variances.iter().sum::<f64>() / variances.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn checkerboard(width: u32, height: u32, cell: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    #[test]
    fn test_mean_and_stddev_uniform() {
        let gray = GrayImage::from_pixel(40, 30, Luma([127u8]));
        let (mean, sd) = QualityProcessor::mean_and_stddev(&gray);
        assert!((mean - 127.0).abs() < 1e-9);
        assert!(sd.abs() < 1e-9);
    }

    #[test]
    fn test_mean_and_stddev_two_levels() {
        let gray = checkerboard(64, 64, 8);
        let (mean, sd) = QualityProcessor::mean_and_stddev(&gray);
        assert!((mean - 127.5).abs() < 1e-9);
        assert!((sd - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_laplacian_variance_flat_is_zero() {
        let gray = GrayImage::from_pixel(50, 50, Luma([90u8]));
        assert_eq!(QualityProcessor::laplacian_variance(&gray), 0.0);
    }

    #[test]
    fn test_laplacian_variance_sharp_beats_gradient() {
        let sharp = checkerboard(64, 64, 4);
        let smooth = GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8]));
        let sharp_var = QualityProcessor::laplacian_variance(&sharp);
        let smooth_var = QualityProcessor::laplacian_variance(&smooth);
        assert!(sharp_var > 10_000.0, "checkerboard variance {}", sharp_var);
        assert!(smooth_var < sharp_var);
    }

    #[test]
    fn test_edge_density_flat_image() {
        let gray = GrayImage::from_pixel(60, 60, Luma([200u8]));
        let edges = QualityProcessor::edge_map(&gray, 50.0, 150.0);
        assert_eq!(QualityProcessor::edge_density(&edges), 0.0);
    }

    #[test]
    fn test_edge_density_counts_marked_pixels() {
        let mut edges = GrayImage::new(10, 10);
        for x in 0..10 {
            edges.put_pixel(x, 5, Luma([255u8]));
        }
        assert!((QualityProcessor::edge_density(&edges) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_color_variance_single_colour() {
        // 100 pixels all in one bin: var = 100^2/256 - (100/256)^2
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([10, 20, 30])));
        let expected = 10_000.0 / 256.0 - (100.0f64 / 256.0).powi(2);
        assert!((QualityProcessor::color_histogram_variance(&img) - expected).abs() < 1e-9);
    }
}
