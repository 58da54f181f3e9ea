use crate::models::FaceDetectionParams;
use crate::utils::KycError;
use image::GrayImage;
use log::debug;

/// Axis-aligned face bounding box in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Pluggable frontal-face detection backend.
///
/// Any detector honouring the sliding-window contract (scale step, minimum
/// neighbours, minimum face size) can stand in for the built-in cascade.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>, KycError>;
}

const BASE_WINDOW: u32 = 24;
const MIN_WINDOW_STDDEV: f64 = 10.0;
const GROUP_EPS: f64 = 0.2;

/// Rectangle in 24x24 base-window units.
#[derive(Clone, Copy)]
struct Region {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

const fn region(x: u32, y: u32, w: u32, h: u32) -> Region {
    Region { x, y, w, h }
}

const FOREHEAD: Region = region(4, 1, 16, 4);
const EYE_BAND: Region = region(3, 6, 18, 4);
const LEFT_EYE: Region = region(3, 6, 6, 4);
const RIGHT_EYE: Region = region(15, 6, 6, 4);
const LEFT_TEMPLE: Region = region(0, 6, 2, 4);
const RIGHT_TEMPLE: Region = region(22, 6, 2, 4);
const NOSE_BRIDGE: Region = region(10, 6, 4, 4);
const CHEEKS: Region = region(3, 11, 18, 4);
const LEFT_CHEEK: Region = region(3, 11, 6, 4);
const RIGHT_CHEEK: Region = region(15, 11, 6, 4);
const MOUTH: Region = region(7, 17, 10, 3);
const MOUTH_LEFT: Region = region(3, 17, 3, 3);
const MOUTH_RIGHT: Region = region(18, 17, 3, 3);

/// Two-rectangle Haar-like test: `brighter` must out-shine `darker` by
/// `margin` window standard deviations.
struct Stage {
    brighter: Region,
    darker: Region,
    margin: f64,
}

const STAGES: [Stage; 11] = [
    Stage { brighter: FOREHEAD, darker: EYE_BAND, margin: 0.3 },
    Stage { brighter: CHEEKS, darker: EYE_BAND, margin: 0.3 },
    Stage { brighter: NOSE_BRIDGE, darker: LEFT_EYE, margin: 0.5 },
    Stage { brighter: NOSE_BRIDGE, darker: RIGHT_EYE, margin: 0.5 },
    Stage { brighter: LEFT_CHEEK, darker: LEFT_EYE, margin: 0.3 },
    Stage { brighter: RIGHT_CHEEK, darker: RIGHT_EYE, margin: 0.3 },
    Stage { brighter: CHEEKS, darker: MOUTH, margin: 0.3 },
    // Eyes and mouth are bounded blobs. A line of print runs on past them.
    Stage { brighter: LEFT_TEMPLE, darker: LEFT_EYE, margin: 0.3 },
    Stage { brighter: RIGHT_TEMPLE, darker: RIGHT_EYE, margin: 0.3 },
    Stage { brighter: MOUTH_LEFT, darker: MOUTH, margin: 0.3 },
    Stage { brighter: MOUTH_RIGHT, darker: MOUTH, margin: 0.3 },
];

/// Skin patches that must be nearly flat: the middle of the forehead, the
/// band between eyes and mouth, and the nose bridge between the eyes.
const UNIFORM_REGIONS: [Region; 3] = [region(5, 2, 14, 2), region(4, 12, 16, 2), region(11, 6, 2, 4)];

/// Largest standard deviation a uniform patch may have, in window standard
/// deviations.
const MAX_PATCH_STDDEV: f64 = 0.25;

/// Summed-area tables of pixel values and squared pixel values.
struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    fn new(gray: &GrayImage) -> Self {
        let (width, height) = (gray.width() as usize, gray.height() as usize);
        let stride = width + 1;
        let mut sum = vec![0u64; stride * (height + 1)];
        let mut sq_sum = vec![0u64; stride * (height + 1)];

        for y in 0..height {
            let mut row = 0u64;
            let mut row_sq = 0u64;
            for x in 0..width {
                let v = gray.get_pixel(x as u32, y as u32)[0] as u64;
                row += v;
                row_sq += v * v;
                sum[(y + 1) * stride + x + 1] = sum[y * stride + x + 1] + row;
                sq_sum[(y + 1) * stride + x + 1] = sq_sum[y * stride + x + 1] + row_sq;
            }
        }

        IntegralImage { stride, sum, sq_sum }
    }

    fn rect(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        table[y1 * stride + x1] + table[y0 * stride + x0]
            - table[y0 * stride + x1]
            - table[y1 * stride + x0]
    }

    fn mean(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        Self::rect(&self.sum, self.stride, x, y, w, h) as f64 / (w as f64 * h as f64)
    }

    fn stddev(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let n = w as f64 * h as f64;
        let mean = Self::rect(&self.sum, self.stride, x, y, w, h) as f64 / n;
        let mean_sq = Self::rect(&self.sq_sum, self.stride, x, y, w, h) as f64 / n;
        (mean_sq - mean * mean).max(0.0).sqrt()
    }
}

/// Built-in frontal-face detector: a fixed cascade of Haar-like contrast
/// tests evaluated over a multi-scale sliding window, followed by neighbour
/// grouping of the raw hits.
///
/// The eyes must be darker than the forehead, the cheeks, the nose bridge
/// and the temples, and the mouth darker than the skin around it. The
/// forehead, the cheek band and the nose bridge must also be flat, which
/// rejects rows of printed text where word blocks line up like eyes.
pub struct CascadeFaceDetector {
    params: FaceDetectionParams,
}

impl CascadeFaceDetector {
    pub fn new(params: FaceDetectionParams) -> Self {
        CascadeFaceDetector { params }
    }

    fn passes(&self, integral: &IntegralImage, x: u32, y: u32, scale: f64, win: u32) -> bool {
        let sigma = integral.stddev(x, y, win, win);
        if sigma < MIN_WINDOW_STDDEV {
            return false;
        }

        let place = |r: Region| {
            let x0 = (r.x as f64 * scale).round() as u32;
            let y0 = (r.y as f64 * scale).round() as u32;
            let x1 = (((r.x + r.w) as f64 * scale).round() as u32).max(x0 + 1).min(win);
            let y1 = (((r.y + r.h) as f64 * scale).round() as u32).max(y0 + 1).min(win);
            (x + x0, y + y0, x1 - x0, y1 - y0)
        };
        let mean_of = |r: Region| {
            let (rx, ry, rw, rh) = place(r);
            integral.mean(rx, ry, rw, rh)
        };

        let contrasted = STAGES
            .iter()
            .all(|stage| mean_of(stage.brighter) - mean_of(stage.darker) > stage.margin * sigma);

        contrasted
            && UNIFORM_REGIONS.iter().all(|&r| {
                let (rx, ry, rw, rh) = place(r);
                integral.stddev(rx, ry, rw, rh) <= MAX_PATCH_STDDEV * sigma
            })
    }

    fn scan(&self, gray: &GrayImage) -> Vec<FaceBox> {
        let (width, height) = gray.dimensions();
        let integral = IntegralImage::new(gray);
        let mut candidates = Vec::new();

        let mut scale = (self.params.min_size as f64 / BASE_WINDOW as f64).max(1.0);
        loop {
            let win = (BASE_WINDOW as f64 * scale).round() as u32;
            if win > width || win > height {
                break;
            }
            let step_units = if scale > 2.0 { 1.0 } else { 2.0 };
            let step = ((step_units * scale).round() as u32).max(1);

            let mut y = 0;
            while y + win <= height {
                let mut x = 0;
                while x + win <= width {
                    if self.passes(&integral, x, y, scale, win) {
                        candidates.push(FaceBox { x, y, width: win, height: win });
                    }
                    x += step;
                }
                y += step;
            }
            scale *= self.params.scale_factor;
        }

        candidates
    }
}

impl Default for CascadeFaceDetector {
    fn default() -> Self {
        CascadeFaceDetector::new(FaceDetectionParams::default())
    }
}

impl FaceDetector for CascadeFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<FaceBox>, KycError> {
        if self.params.scale_factor <= 1.0 {
            return Err(KycError::FaceDetection(format!(
                "scale factor must exceed 1.0, got {}",
                self.params.scale_factor
            )));
        }

        let candidates = self.scan(gray);
        let faces = group_candidates(&candidates, self.params.min_neighbors);
        debug!("Face cascade: {} raw hits, {} faces", candidates.len(), faces.len());
        Ok(faces)
    }
}

fn similar(a: &FaceBox, b: &FaceBox) -> bool {
    let delta = GROUP_EPS * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: u32, q: u32| (p as f64 - q as f64).abs() <= delta;
    close(a.x, b.x)
        && close(a.y, b.y)
        && close(a.x + a.width, b.x + b.width)
        && close(a.y + a.height, b.y + b.height)
}

fn find_root(parents: &mut [usize], mut i: usize) -> usize {
    while parents[i] != i {
        parents[i] = parents[parents[i]];
        i = parents[i];
    }
    i
}

/// Cluster overlapping hits, keep clusters with more than `min_neighbors`
/// members, and drop clusters nested inside a stronger one.
fn group_candidates(candidates: &[FaceBox], min_neighbors: usize) -> Vec<FaceBox> {
    if min_neighbors == 0 {
        return candidates.to_vec();
    }

    let mut parents: Vec<usize> = (0..candidates.len()).collect();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            if similar(&candidates[i], &candidates[j]) {
                let (ri, rj) = (find_root(&mut parents, i), find_root(&mut parents, j));
                if ri != rj {
                    parents[rj] = ri;
                }
            }
        }
    }

    // root index -> (sum x, sum y, sum w, sum h, count)
    let mut clusters: Vec<(usize, [u64; 4], usize)> = Vec::new();
    for (i, candidate) in candidates.iter().enumerate() {
        let root = find_root(&mut parents, i);
        let slot = match clusters.iter().position(|c| c.0 == root) {
            Some(pos) => pos,
            None => {
                clusters.push((root, [0; 4], 0));
                clusters.len() - 1
            }
        };
        let entry = &mut clusters[slot];
        entry.1[0] += candidate.x as u64;
        entry.1[1] += candidate.y as u64;
        entry.1[2] += candidate.width as u64;
        entry.1[3] += candidate.height as u64;
        entry.2 += 1;
    }

    let grouped: Vec<(FaceBox, usize)> = clusters
        .into_iter()
        .filter(|(_, _, count)| *count > min_neighbors)
        .map(|(_, sums, count)| {
            let avg = |s: u64| ((s as f64) / count as f64).round() as u32;
            (
                FaceBox { x: avg(sums[0]), y: avg(sums[1]), width: avg(sums[2]), height: avg(sums[3]) },
                count,
            )
        })
        .collect();

    grouped
        .iter()
        .enumerate()
        .filter(|(i, (inner, n_inner))| {
            !grouped.iter().enumerate().any(|(j, (outer, n_outer))| {
                if *i == j {
                    return false;
                }
                let dx = (outer.width as f64 * GROUP_EPS).round() as i64;
                let dy = (outer.height as f64 * GROUP_EPS).round() as i64;
                let contained = inner.x as i64 >= outer.x as i64 - dx
                    && inner.y as i64 >= outer.y as i64 - dy
                    && (inner.x + inner.width) as i64 <= (outer.x + outer.width) as i64 + dx
                    && (inner.y + inner.height) as i64 <= (outer.y + outer.height) as i64 + dy;
                contained && (*n_outer > (*n_inner).max(3) || *n_inner < 3)
            })
        })
        .map(|(_, (face, _))| *face)
        .collect()
}
