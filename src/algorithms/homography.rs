//! Planar projective transforms and their direct linear estimation

use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

const EPSILON: f64 = 1e-12;

/// 3x3 projective map from template space to scene space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(pub Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self(matrix)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Map a point; `None` when it lands on the line at infinity
    pub fn apply(&self, point: Point2<f64>) -> Option<Point2<f64>> {
        let p = self.0 * Vector3::new(point.x, point.y, 1.0);
        if p.z.abs() < EPSILON {
            return None;
        }
        Some(Point2::new(p.x / p.z, p.y / p.z))
    }

    pub fn try_inverse(&self) -> Option<Homography> {
        self.0.try_inverse().map(Homography)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Squared distance between the mapped `from` and `to`, infinite when unmappable
    pub fn transfer_error_sq(&self, from: &Point2<f64>, to: &Point2<f64>) -> f64 {
        match self.apply(*from) {
            Some(mapped) => (mapped - *to).norm_squared(),
            None => f64::INFINITY,
        }
    }

    /// Scale so that `h33 == 1` where possible
    fn normalized(self) -> Self {
        let h33 = self.0[(2, 2)];
        if h33.abs() > EPSILON {
            Self(self.0 / h33)
        } else {
            let norm = self.0.norm();
            if norm > EPSILON {
                Self(self.0 / norm)
            } else {
                self
            }
        }
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

/// Similarity transform moving the centroid to the origin with mean distance sqrt(2)
fn conditioning(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !mean_dist.is_finite() || mean_dist < EPSILON {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

fn transform(t: &Matrix3<f64>, p: &Point2<f64>) -> Point2<f64> {
    Point2::new(t[(0, 0)] * p.x + t[(0, 2)], t[(1, 1)] * p.y + t[(1, 2)])
}

/// Normalized direct linear transform over all given pairs.
///
/// Solves for the null vector of the stacked constraint matrix through the
/// eigen-decomposition of `AᵀA`. Returns `None` for fewer than four pairs or
/// when the points do not pin down a finite, invertible transform.
pub fn estimate_homography_dlt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }

    let t_src = conditioning(src)?;
    let t_dst = conditioning(dst)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (s, d) in src.iter().zip(dst.iter()) {
        let s = transform(&t_src, s);
        let d = transform(&t_dst, d);
        let rows = [
            [-s.x, -s.y, -1.0, 0.0, 0.0, 0.0, d.x * s.x, d.x * s.y, d.x],
            [0.0, 0.0, 0.0, -s.x, -s.y, -1.0, d.y * s.x, d.y * s.y, d.y],
        ];
        for row in rows.iter() {
            let r = SVector::<f64, 9>::from_row_slice(&row[..]);
            ata += r * r.transpose();
        }
    }

    let eigen = ata.symmetric_eigen();
    let smallest = eigen.eigenvalues.imin();
    let h: Vec<f64> = eigen.eigenvectors.column(smallest).iter().copied().collect();
    let normalized = Matrix3::from_row_slice(&h);

    let t_dst_inv = t_dst.try_inverse()?;
    let homography = Homography(t_dst_inv * normalized * t_src).normalized();

    if !homography.is_finite() || homography.0.determinant().abs() < EPSILON {
        return None;
    }
    Some(homography)
}

/// True when three points are (nearly) on one line
pub fn is_collinear(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    let ab = *b - *a;
    let ac = *c - *a;
    let cross = ab.x * ac.y - ab.y * ac.x;
    cross.abs() <= 1e-6 * (ab.norm() * ac.norm()).max(f64::MIN_POSITIVE)
}

/// True when any three of the points are collinear
pub fn has_collinear_triple(points: &[Point2<f64>]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if is_collinear(&points[i], &points[j], &points[k]) {
                    return true;
                }
            }
        }
    }
    false
}
