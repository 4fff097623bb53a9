use std::ops::{Add, Div, Mul, Neg, Sub};
use super::Scalar;


/// Number of coefficients carried by every series
pub const ORDER: usize = 12;
/// Sums smaller than this fraction of their operands are treated as exact cancellations
const CANCELLATION: f64 = 1e-10;

/// Truncated Laurent series `sum_k c_k * eps^(valuation + k)` around a point.
///
/// Evaluating an expression with the voltage replaced by `p + eps` cancels
/// the common zeros of numerator and denominator at `p`, which gives the
/// limit of a removable singularity without rewriting the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Laurent {
    valuation: i32,
    coefficients: Vec<f64>,
}

impl Laurent {
    fn zero() -> Self {
        Laurent { valuation: 0, coefficients: vec![0.; ORDER] }
    }

    fn undefined() -> Self {
        Laurent { valuation: 0, coefficients: vec![f64::NAN; ORDER] }
    }

    fn from_parts(valuation: i32, mut coefficients: Vec<f64>) -> Self {
        coefficients.resize(ORDER, 0.);
        let mut series = Laurent { valuation, coefficients };
        series.normalize();

        series
    }

    /// Series of `point + eps`
    pub fn variable(point: f64) -> Self {
        Laurent::from_parts(0, vec![point, 1.])
    }

    pub fn valuation(&self) -> i32 {
        self.valuation
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.iter().all(|c| *c == 0.)
    }

    fn is_undefined(&self) -> bool {
        self.coefficients.iter().any(|c| !c.is_finite())
    }

    /// Coefficient of `eps^power`
    pub fn coefficient(&self, power: i32) -> f64 {
        let index = power - self.valuation;
        if index < 0 {
            0.
        } else {
            self.coefficients.get(index as usize).copied().unwrap_or(0.)
        }
    }

    /// Value of the series at `eps = offset`, not finite if a pole remains
    pub fn evaluate(&self, offset: f64) -> f64 {
        if self.is_zero() {
            return 0.;
        }
        if self.valuation < 0 {
            return f64::NAN;
        }

        self.coefficients.iter()
            .rev()
            .fold(0., |acc, c| acc * offset + c) * offset.powi(self.valuation)
    }

    /// Shifts leading zeros into the valuation
    fn normalize(&mut self) {
        if self.is_undefined() {
            return;
        }

        let leading = self.coefficients.iter().take_while(|c| **c == 0.).count();
        if leading == self.coefficients.len() {
            self.valuation = 0;
            return;
        }
        if leading > 0 {
            self.coefficients.drain(0..leading);
            self.coefficients.resize(ORDER, 0.);
            self.valuation += leading as i32;
        }
    }

    /// Coefficients over the powers `0..ORDER`, requires a non negative valuation
    fn dense(&self) -> Option<Vec<f64>> {
        if self.is_zero() {
            return Some(vec![0.; ORDER]);
        }
        if self.valuation < 0 {
            return None;
        }

        let shift = self.valuation as usize;
        let mut dense = vec![0.; ORDER];
        for (n, c) in self.coefficients.iter().enumerate() {
            if n + shift < ORDER {
                dense[n + shift] = *c;
            }
        }

        Some(dense)
    }

    fn reciprocal(&self) -> Self {
        if self.is_zero() || self.is_undefined() {
            return Laurent::undefined();
        }

        let a = &self.coefficients;
        let mut b = vec![0.; ORDER];
        b[0] = 1. / a[0];
        for n in 1..ORDER {
            let sum: f64 = (1..=n).map(|k| a[k] * b[n - k]).sum();
            b[n] = -sum / a[0];
        }

        Laurent::from_parts(-self.valuation, b)
    }

    /// Applies `f` to a series with no pole, `None` otherwise
    fn map_dense<F: Fn(&[f64]) -> Vec<f64>>(&self, f: F) -> Self {
        match self.dense() {
            Some(dense) if !self.is_undefined() => Laurent::from_parts(0, f(&dense)),
            _ => Laurent::undefined(),
        }
    }

    /// `sin` and `cos` (or `sinh` and `cosh` when `hyperbolic`) of a dense series
    fn sin_cos(c: &[f64], hyperbolic: bool) -> (Vec<f64>, Vec<f64>) {
        let mut s = vec![0.; ORDER];
        let mut co = vec![0.; ORDER];
        if hyperbolic {
            s[0] = c[0].sinh();
            co[0] = c[0].cosh();
        } else {
            s[0] = c[0].sin();
            co[0] = c[0].cos();
        }

        let sign = if hyperbolic { 1. } else { -1. };
        for n in 1..ORDER {
            let mut sum_s = 0.;
            let mut sum_c = 0.;
            for k in 1..=n {
                sum_s += k as f64 * c[k] * co[n - k];
                sum_c += k as f64 * c[k] * s[n - k];
            }
            s[n] = sum_s / n as f64;
            co[n] = sign * sum_c / n as f64;
        }

        (s, co)
    }
}

fn cancel(sum: f64, lhs: f64, rhs: f64) -> f64 {
    if sum.abs() <= CANCELLATION * lhs.abs().max(rhs.abs()) {
        0.
    } else {
        sum
    }
}

impl Add for Laurent {
    type Output = Laurent;

    fn add(self, rhs: Laurent) -> Laurent {
        if self.is_undefined() || rhs.is_undefined() {
            return Laurent::undefined();
        }
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }

        let valuation = self.valuation.min(rhs.valuation);
        let mut coefficients = vec![0.; ORDER];
        for (n, slot) in coefficients.iter_mut().enumerate() {
            let power = valuation + n as i32;
            let (a, b) = (self.coefficient(power), rhs.coefficient(power));
            *slot = cancel(a + b, a, b);
        }

        Laurent::from_parts(valuation, coefficients)
    }
}

impl Neg for Laurent {
    type Output = Laurent;

    fn neg(self) -> Laurent {
        Laurent {
            valuation: self.valuation,
            coefficients: self.coefficients.into_iter().map(|c| -c).collect(),
        }
    }
}

impl Sub for Laurent {
    type Output = Laurent;

    fn sub(self, rhs: Laurent) -> Laurent {
        self + (-rhs)
    }
}

impl Mul for Laurent {
    type Output = Laurent;

    fn mul(self, rhs: Laurent) -> Laurent {
        if self.is_undefined() || rhs.is_undefined() {
            return Laurent::undefined();
        }
        if self.is_zero() || rhs.is_zero() {
            return Laurent::zero();
        }

        let mut coefficients = vec![0.; ORDER];
        for (n, slot) in coefficients.iter_mut().enumerate() {
            *slot = (0..=n).map(|k| self.coefficients[k] * rhs.coefficients[n - k]).sum();
        }

        Laurent::from_parts(self.valuation + rhs.valuation, coefficients)
    }
}

impl Div for Laurent {
    type Output = Laurent;

    fn div(self, rhs: Laurent) -> Laurent {
        self * rhs.reciprocal()
    }
}

impl Scalar for Laurent {
    fn constant(value: f64) -> Self {
        Laurent::from_parts(0, vec![value])
    }

    fn exp(&self) -> Self {
        self.map_dense(|c| {
            let mut b = vec![0.; ORDER];
            b[0] = c[0].exp();
            for n in 1..ORDER {
                let sum: f64 = (1..=n).map(|k| k as f64 * c[k] * b[n - k]).sum();
                b[n] = sum / n as f64;
            }

            b
        })
    }

    fn ln(&self) -> Self {
        if self.valuation != 0 || self.is_zero() {
            return Laurent::undefined();
        }

        self.map_dense(|c| {
            let mut b = vec![0.; ORDER];
            b[0] = c[0].ln();
            for n in 1..ORDER {
                let sum: f64 = (1..n).map(|k| k as f64 * b[k] * c[n - k]).sum();
                b[n] = (c[n] - sum / n as f64) / c[0];
            }

            b
        })
    }

    fn sin(&self) -> Self {
        self.map_dense(|c| Laurent::sin_cos(c, false).0)
    }

    fn cos(&self) -> Self {
        self.map_dense(|c| Laurent::sin_cos(c, false).1)
    }

    fn tan(&self) -> Self {
        self.sin() / self.cos()
    }

    fn sinh(&self) -> Self {
        self.map_dense(|c| Laurent::sin_cos(c, true).0)
    }

    fn cosh(&self) -> Self {
        self.map_dense(|c| Laurent::sin_cos(c, true).1)
    }

    fn tanh(&self) -> Self {
        self.sinh() / self.cosh()
    }

    fn powi(&self, n: i32) -> Self {
        if n < 0 {
            return self.reciprocal().powi(-n);
        }

        let mut result = Laurent::constant(1.);
        let mut base = self.clone();
        let mut exponent = n;
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result * base.clone();
            }
            base = base.clone() * base;
            exponent >>= 1;
        }

        result
    }

    fn powf(&self, exponent: &Self) -> Self {
        let constant_exponent = if exponent.is_zero() {
            Some(0.)
        } else if exponent.valuation == 0 && exponent.coefficients[1..].iter().all(|c| *c == 0.) {
            Some(exponent.coefficients[0])
        } else {
            None
        };

        if let Some(e) = constant_exponent {
            if e.fract() == 0. && e.abs() <= i32::MAX as f64 {
                return self.powi(e as i32);
            }
        }

        (exponent.clone() * self.ln()).exp()
    }
}
