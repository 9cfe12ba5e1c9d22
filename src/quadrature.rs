use crate::mesh::space::RefPoint;
use nalgebra::{DMatrix, SymmetricEigen};

/// Generate `n` Gauss-Legendre-Quadrature points and weights over the range `(-1, 1)`
///
/// Uses the Golub-Welsch algorithm: the points are the eigenvalues of the Jacobi matrix of the Legendre polynomials, and the weights follow from the first component of each eigenvector.
///
/// ```
/// use fem_mortar::quadrature::gauss_quadrature_points;
///
/// let (points, weights) = gauss_quadrature_points(3);
///
/// assert!((points[1]).abs() < 1e-14);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-14);
/// ```
pub fn gauss_quadrature_points(n: usize) -> (Vec<f64>, Vec<f64>) {
    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let polymat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(polymat);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| (*weight).powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.total_cmp(&b.0));

    xw.drain(0..).unzip()
}

/// Gauss-Legendre points and weights which exactly integrate polynomials of degree `order` over `(-1, 1)`
pub fn gauss_points_for_order(order: usize) -> (Vec<f64>, Vec<f64>) {
    gauss_quadrature_points(order / 2 + 1)
}

/// Points and weights over the reference triangle `{(0, 0), (1, 0), (0, 1)}` which exactly integrate polynomials of degree `order`
///
/// The triangle is treated as a collapsed square:
/// ```text
///   v                      η
///   ^                      ^
///   |-------|              |\
///   |       |     ==>      |  \
///   |       |              |    \
///   |-------|-> u          |------\-> ξ
/// ```
/// with `ξ = (1 + u)(1 - v) / 4` and `η = (1 + v) / 2`.
pub fn triangle_quadrature_points(order: usize) -> (Vec<RefPoint>, Vec<f64>) {
    let (u_points, u_weights) = gauss_quadrature_points(order / 2 + 1);
    // the collapse adds a linear factor in v
    let (v_points, v_weights) = gauss_quadrature_points((order + 1) / 2 + 1);

    let mut points = Vec::with_capacity(u_points.len() * v_points.len());
    let mut weights = Vec::with_capacity(u_points.len() * v_points.len());

    for (v, v_w) in v_points.iter().zip(v_weights.iter()) {
        for (u, u_w) in u_points.iter().zip(u_weights.iter()) {
            points.push([(1.0 + u) * (1.0 - v) / 4.0, (1.0 + v) / 2.0]);
            weights.push(u_w * v_w * (1.0 - v) / 8.0);
        }
    }

    (points, weights)
}
