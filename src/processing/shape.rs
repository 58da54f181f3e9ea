use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;

/// Contour geometry used to recognise the outline of a card or page.
pub struct ShapeProcessor;

impl ShapeProcessor {
    /// Outermost borders of an edge map; borders nested inside holes are dropped.
    pub fn external_contours(edges: &GrayImage) -> Vec<Vec<Point<i32>>> {
        find_contours::<i32>(edges)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .map(|c| c.points)
            .collect()
    }

    pub fn arc_length(points: &[Point<i32>], closed: bool) -> f64 {
        let mut length: f64 = points.windows(2).map(|w| distance(w[0], w[1])).sum();
        if closed && points.len() > 1 {
            length += distance(points[points.len() - 1], points[0]);
        }
        length
    }

    /// Douglas-Peucker simplification of a closed contour.
    ///
    /// The contour is split at the point farthest from its first point and
    /// each half is simplified separately, so the result is a vertex list of
    /// a closed polygon without a repeated closing vertex.
    pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
        if points.len() < 3 {
            return points.to_vec();
        }

        let origin = points[0];
        let far = (1..points.len())
            .max_by(|&a, &b| {
                distance(origin, points[a])
                    .partial_cmp(&distance(origin, points[b]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        if far == 0 || points[far] == origin {
            return vec![origin];
        }

        let mut polygon = Vec::new();
        simplify_open(&points[..=far], epsilon, &mut polygon);

        let mut return_chain: Vec<Point<i32>> = points[far..].to_vec();
        return_chain.push(origin);
        simplify_open(&return_chain, epsilon, &mut polygon);

        polygon
    }

    /// First external contour whose approximation (epsilon = `epsilon_ratio`
    /// of its perimeter) has exactly four vertices.
    pub fn find_quadrilateral(edges: &GrayImage, epsilon_ratio: f64) -> Option<Vec<Point<i32>>> {
        Self::external_contours(edges)
            .into_iter()
            .filter(|contour| contour.len() >= 4)
            .map(|contour| {
                let epsilon = epsilon_ratio * Self::arc_length(&contour, true);
                Self::approximate_closed_polygon(&contour, epsilon)
            })
            .find(|polygon| polygon.len() == 4)
    }
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    (dx * dx + dy * dy).sqrt()
}

fn perpendicular_distance(p: Point<i32>, start: Point<i32>, end: Point<i32>) -> f64 {
    if start == end {
        return distance(p, start);
    }
    let dx = (end.x - start.x) as f64;
    let dy = (end.y - start.y) as f64;
    let cross = dx * (p.y - start.y) as f64 - dy * (p.x - start.x) as f64;
    cross.abs() / (dx * dx + dy * dy).sqrt()
}

// Pushes the kept vertices of `chain`, excluding its last point.
fn simplify_open(chain: &[Point<i32>], epsilon: f64, out: &mut Vec<Point<i32>>) {
    if chain.len() < 3 {
        out.extend_from_slice(&chain[..chain.len().saturating_sub(1)]);
        return;
    }

    let start = chain[0];
    let end = chain[chain.len() - 1];
    let (index, max_distance) = chain[1..chain.len() - 1]
        .iter()
        .enumerate()
        .map(|(i, &p)| (i + 1, perpendicular_distance(p, start, end)))
        .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

    if max_distance > epsilon {
        simplify_open(&chain[..=index], epsilon, out);
        simplify_open(&chain[index..], epsilon, out);
    } else {
        out.push(start);
    }
}
