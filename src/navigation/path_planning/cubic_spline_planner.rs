//! Cubic spline path geometry
//!
//! Based on the algorithm from:
//! https://github.com/AtsushiSakai/PythonRobotics/blob/master/PathPlanning/CubicSpline/cubic_spline_planner.py

use nalgebra::Vector2;

/// Natural cubic spline of one variable
#[derive(Debug, Clone)]
pub struct CubicSpline1D {
    x: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline1D {
    /// Fit a spline through `(x[i], y[i])`
    ///
    /// `x` must be strictly increasing. Returns `None` when the knots are unusable
    /// or the coefficient system is singular.
    pub fn new(x: &[f64], y: &[f64]) -> Option<Self> {
        let n = x.len();
        if n < 2 || n != y.len() {
            return None;
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        if h.iter().any(|&dx| !(dx > 0.0)) {
            return None;
        }

        let a = y.to_vec();

        // Tridiagonal system for the second-order coefficients, natural end conditions
        let mut lower = vec![0.0; n];
        let mut diag = vec![1.0; n];
        let mut upper = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 1..n - 1 {
            lower[i] = h[i - 1];
            diag[i] = 2.0 * (h[i - 1] + h[i]);
            upper[i] = h[i];
            rhs[i] = 3.0 * (a[i + 1] - a[i]) / h[i] - 3.0 * (a[i] - a[i - 1]) / h[i - 1];
        }

        let c = solve_tridiagonal(&lower, &diag, &upper, &rhs)?;

        let mut b = Vec::with_capacity(n - 1);
        let mut d = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            d.push((c[i + 1] - c[i]) / (3.0 * h[i]));
            b.push((a[i + 1] - a[i]) / h[i] - h[i] * (c[i + 1] + 2.0 * c[i]) / 3.0);
        }

        Some(CubicSpline1D {
            x: x.to_vec(),
            a,
            b,
            c,
            d,
        })
    }

    /// Evaluate the spline; `t` is clamped to the knot range
    pub fn calc_position(&self, t: f64) -> f64 {
        let (i, dx) = self.segment(t);
        self.a[i] + self.b[i] * dx + self.c[i] * dx.powi(2) + self.d[i] * dx.powi(3)
    }

    fn segment(&self, t: f64) -> (usize, f64) {
        let last = self.x.len() - 1;
        let t = t.clamp(self.x[0], self.x[last]);
        // Index of the segment whose left knot is <= t
        let i = self.x.partition_point(|&k| k <= t).saturating_sub(1).min(last - 1);
        (i, t - self.x[i])
    }
}

/// Planar cubic spline parameterized by cumulative chord length
#[derive(Debug, Clone)]
pub struct CubicSpline2D {
    s: Vec<f64>,
    sx: CubicSpline1D,
    sy: CubicSpline1D,
}

impl CubicSpline2D {
    /// Fit a spline through `points`; consecutive points must be distinct
    pub fn new(points: &[Vector2<f64>]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let mut s = Vec::with_capacity(points.len());
        s.push(0.0);
        for w in points.windows(2) {
            let last = s[s.len() - 1];
            s.push(last + (w[1] - w[0]).norm());
        }

        let x: Vec<f64> = points.iter().map(|p| p.x).collect();
        let y: Vec<f64> = points.iter().map(|p| p.y).collect();

        Some(CubicSpline2D {
            sx: CubicSpline1D::new(&s, &x)?,
            sy: CubicSpline1D::new(&s, &y)?,
            s,
        })
    }

    /// Length of the parameter range (sum of chord lengths)
    pub fn parameter_length(&self) -> f64 {
        self.s[self.s.len() - 1]
    }

    /// Position at parameter `s`
    pub fn calc_position(&self, s: f64) -> Vector2<f64> {
        Vector2::new(self.sx.calc_position(s), self.sy.calc_position(s))
    }
}

/// Thomas algorithm for `lower[i] x[i-1] + diag[i] x[i] + upper[i] x[i+1] = rhs[i]`
///
/// Linear in the number of knots. `lower[0]` and `upper[n-1]` are ignored.
fn solve_tridiagonal(lower: &[f64], diag: &[f64], upper: &[f64], rhs: &[f64]) -> Option<Vec<f64>> {
    let n = diag.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    for i in 0..n {
        let (c_prev, d_prev) = if i == 0 { (0.0, 0.0) } else { (c_prime[i - 1], d_prime[i - 1]) };
        let m = diag[i] - lower[i] * c_prev;
        if m == 0.0 || !m.is_finite() {
            return None;
        }
        c_prime[i] = if i + 1 < n { upper[i] / m } else { 0.0 };
        d_prime[i] = (rhs[i] - lower[i] * d_prev) / m;
    }

    let mut x = d_prime;
    for i in (0..n.saturating_sub(1)).rev() {
        x[i] -= c_prime[i] * x[i + 1];
    }
    if x.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(x)
}
