//! Fixed-dimension real vectors and the holographic algebra over them.
//!
//! Binding is circular convolution, computed directly:
//! `(a ⊗ b)[k] = Σ_i a[i] · b[(k - i) mod n]`. Each output component is one
//! dot product against a reversed, doubled copy of `b`, so the same dot kernel
//! serves `dot` and `bind` and picks up the `simd` / `parallel` tiers.

use core::cmp::Ordering;
use core::ops::{Add, Mul, Neg, Sub};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "simd")]
use wide::f64x4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    /// The "nothing recognized" sentinel.
    pub fn zero(dimension: usize) -> Self {
        Self {
            data: vec![0.0; dimension],
        }
    }

    /// Unit vector along axis `index`.
    pub fn basis(dimension: usize, index: usize) -> Self {
        let mut v = Self::zero(dimension);
        if index < dimension {
            v.data[index] = 1.0;
        }
        v
    }

    pub fn from_vec(data: Vec<f64>) -> Self {
        Self { data }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&x| x == 0.0)
    }

    pub fn add(&self, other: &Vector) -> Result<Vector> {
        self.check(other)?;
        Ok(self.zip_with(other, |a, b| a + b))
    }

    /// Addition of the negated right operand.
    pub fn sub(&self, other: &Vector) -> Result<Vector> {
        self.check(other)?;
        Ok(self.zip_with(other, |a, b| a - b))
    }

    pub fn scale(&self, k: f64) -> Vector {
        Vector {
            data: self.data.iter().map(|&x| x * k).collect(),
        }
    }

    /// Circular convolution.
    pub fn bind(&self, other: &Vector) -> Result<Vector> {
        self.check(other)?;
        Ok(Vector {
            data: convolve(&self.data, &other.data),
        })
    }

    /// Involution `~a[k] = a[(-k) mod n]`: the exact inverse of a unitary
    /// vector and an approximate inverse of any other.
    pub fn inverse(&self) -> Vector {
        let n = self.data.len();
        Vector {
            data: (0..n).map(|k| self.data[(n - k) % n]).collect(),
        }
    }

    pub fn dot(&self, other: &Vector) -> Result<f64> {
        self.check(other)?;
        Ok(dot_kernel(&self.data, &other.data))
    }

    pub fn norm(&self) -> f64 {
        dot_kernel(&self.data, &self.data).sqrt()
    }

    /// Rescale to unit length. A zero vector is returned unchanged.
    pub fn normalize(&self) -> Vector {
        let norm = self.norm();
        if norm == 0.0 {
            return self.clone();
        }
        self.scale(1.0 / norm)
    }

    /// Component-wise lexicographic order; incomparable (NaN) pairs count as equal.
    pub fn lexicographic_cmp(&self, other: &Vector) -> Ordering {
        for (a, b) in self.data.iter().zip(&other.data) {
            match a.partial_cmp(b) {
                Some(Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        self.data.len().cmp(&other.data.len())
    }

    fn check(&self, other: &Vector) -> Result<()> {
        if self.data.len() != other.data.len() {
            return Err(Error::DimensionMismatch {
                expected: self.data.len(),
                found: other.data.len(),
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &Vector, f: impl Fn(f64, f64) -> f64) -> Vector {
        Vector {
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }
}

// Operator sugar fails fast on mismatched dimensions; use the checked
// methods when the operands come from outside the engine.

impl Add for &Vector {
    type Output = Vector;

    fn add(self, rhs: &Vector) -> Vector {
        assert_eq!(self.dimension(), rhs.dimension(), "dimension mismatch in +");
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &Vector {
    type Output = Vector;

    fn sub(self, rhs: &Vector) -> Vector {
        assert_eq!(self.dimension(), rhs.dimension(), "dimension mismatch in -");
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul for &Vector {
    type Output = Vector;

    fn mul(self, rhs: &Vector) -> Vector {
        assert_eq!(self.dimension(), rhs.dimension(), "dimension mismatch in *");
        Vector {
            data: convolve(&self.data, &rhs.data),
        }
    }
}

impl Neg for &Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        self.scale(-1.0)
    }
}

fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len();
    if n == 0 {
        return Vec::new();
    }

    // rr[j] = b[n - 1 - (j mod n)], so b[(k - i) mod n] == rr[n - 1 - k + i].
    let mut rr = Vec::with_capacity(2 * n);
    rr.extend(b.iter().rev());
    rr.extend(b.iter().rev());

    #[cfg(feature = "parallel")]
    {
        (0..n)
            .into_par_iter()
            .map(|k| dot_kernel(a, &rr[n - 1 - k..2 * n - 1 - k]))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        (0..n)
            .map(|k| dot_kernel(a, &rr[n - 1 - k..2 * n - 1 - k]))
            .collect()
    }
}

#[cfg(feature = "simd")]
#[inline]
fn dot_kernel(a: &[f64], b: &[f64]) -> f64 {
    let chunks = a.len() / 4;
    let mut acc = f64x4::splat(0.0);
    for c in 0..chunks {
        let i = c * 4;
        let va = f64x4::from([a[i], a[i + 1], a[i + 2], a[i + 3]]);
        let vb = f64x4::from([b[i], b[i + 1], b[i + 2], b[i + 3]]);
        acc += va * vb;
    }
    let mut sum = acc.reduce_add();
    for i in chunks * 4..a.len() {
        sum += a[i] * b[i];
    }
    sum
}

#[cfg(not(feature = "simd"))]
#[inline]
fn dot_kernel(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::Prng;

    fn random(dim: usize, seed: u64) -> Vector {
        let mut rng = Prng::new(seed);
        let scale = 1.0 / (dim as f64).sqrt();
        Vector::from_vec((0..dim).map(|_| rng.next_gaussian() * scale).collect())
    }

    fn naive_convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
        let n = a.len();
        (0..n)
            .map(|k| (0..n).map(|i| a[i] * b[(k + n - i) % n]).sum())
            .collect()
    }

    fn assert_close(a: &Vector, b: &Vector, tol: f64) {
        assert_eq!(a.dimension(), b.dimension());
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < tol, "{x} vs {y}");
        }
    }

    #[test]
    fn bind_matches_direct_convolution() {
        let a = random(37, 1);
        let b = random(37, 2);
        let expected = Vector::from_vec(naive_convolve(a.as_slice(), b.as_slice()));
        assert_close(&a.bind(&b).unwrap(), &expected, 1e-12);
    }

    #[test]
    fn bind_is_commutative_and_associative() {
        let a = random(32, 3);
        let b = random(32, 4);
        let c = random(32, 5);
        assert_close(&(&a * &b), &(&b * &a), 1e-12);
        assert_close(&(&(&a * &b) * &c), &(&a * &(&b * &c)), 1e-12);
    }

    #[test]
    fn basis_zero_is_binding_identity() {
        let a = random(16, 6);
        let e0 = Vector::basis(16, 0);
        assert_close(&a.bind(&e0).unwrap(), &a, 1e-12);
    }

    #[test]
    fn inverse_reverses_indices() {
        let a = Vector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(a.inverse().as_slice(), &[1.0, 4.0, 3.0, 2.0]);
        assert_eq!(a.inverse().inverse(), a);
    }

    #[test]
    fn superposition_is_associative() {
        let a = random(64, 7);
        let b = random(64, 8);
        let c = random(64, 9);
        assert_close(&(&(&a + &b) + &c), &(&a + &(&b + &c)), 1e-12);
    }

    #[test]
    fn sub_adds_the_negation() {
        let a = random(8, 10);
        let b = random(8, 11);
        assert_close(&a.sub(&b).unwrap(), &(&a + &(-&b)), 1e-15);
    }

    #[test]
    fn normalize_gives_unit_norm() {
        let a = random(128, 12).scale(3.5);
        assert!((a.normalize().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalize_leaves_zero_unchanged() {
        let z = Vector::zero(32);
        let n = z.normalize();
        assert!(n.is_zero());
        assert_eq!(n.dimension(), 32);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let a = Vector::zero(8);
        let b = Vector::zero(9);
        assert!(matches!(
            a.add(&b),
            Err(Error::DimensionMismatch { expected: 8, found: 9 })
        ));
        assert!(a.bind(&b).is_err());
        assert!(a.dot(&b).is_err());
    }

    #[test]
    #[should_panic(expected = "dimension mismatch")]
    fn operator_sugar_fails_fast() {
        let _ = &Vector::zero(4) + &Vector::zero(5);
    }

    #[test]
    fn lexicographic_order_uses_first_difference() {
        let a = Vector::from_vec(vec![0.1, 0.9]);
        let b = Vector::from_vec(vec![0.2, -1.0]);
        assert_eq!(a.lexicographic_cmp(&b), Ordering::Less);
        assert_eq!(b.lexicographic_cmp(&a), Ordering::Greater);
        assert_eq!(a.lexicographic_cmp(&a.clone()), Ordering::Equal);
    }
}
