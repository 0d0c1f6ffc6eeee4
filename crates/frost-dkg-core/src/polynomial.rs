//! Secret polynomials, Feldman commitments and Lagrange interpolation

use crate::types::{decode_point, encode_point, position_scalar};
use crate::{Error, Position, Result};
use k256::{
    elliptic_curve::{ops::LinearCombination, Field},
    ProjectivePoint, Scalar,
};
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Random polynomial of degree `threshold - 1`.
///
/// The constant term is this participant's contribution to the group
/// secret. The polynomial never leaves its owner.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretPolynomial {
    coefficients: Vec<Scalar>,
}

impl SecretPolynomial {
    /// Sample `threshold` uniformly random coefficients
    pub fn random<R: RngCore + CryptoRng>(threshold: usize, rng: &mut R) -> Self {
        let coefficients = (0..threshold).map(|_| Scalar::random(&mut *rng)).collect();
        Self { coefficients }
    }

    pub fn threshold(&self) -> usize {
        self.coefficients.len()
    }

    pub(crate) fn constant_term(&self) -> Scalar {
        self.coefficients.first().copied().unwrap_or(Scalar::ZERO)
    }

    /// Evaluate at `x` with Horner's rule
    pub fn evaluate(&self, x: Position) -> Scalar {
        let x = position_scalar(x);
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::ZERO, |acc, coef| acc * x + coef)
    }

    /// Feldman commitment: one point `a_k * G` per coefficient
    pub fn commit(&self) -> PolynomialCommitment {
        PolynomialCommitment::new(
            self.coefficients
                .iter()
                .map(|coef| ProjectivePoint::GENERATOR * coef)
                .collect(),
        )
    }
}

impl fmt::Debug for SecretPolynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPolynomial")
            .field("threshold", &self.coefficients.len())
            .finish_non_exhaustive()
    }
}

/// Public commitment to a secret polynomial's coefficients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolynomialCommitment {
    points: Vec<ProjectivePoint>,
}

impl PolynomialCommitment {
    pub fn new(points: Vec<ProjectivePoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ProjectivePoint] {
        &self.points
    }

    /// Number of committed coefficients
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Commitment to the constant term, i.e. the sender's public contribution
    pub fn constant_term(&self) -> Option<&ProjectivePoint> {
        self.points.first()
    }

    /// `sum_k powers[k] * C_k`, the public image of the polynomial at the
    /// point whose powers are given
    pub fn evaluate(&self, powers: &[Scalar]) -> ProjectivePoint {
        linear_combination(powers.iter().zip(self.points.iter()))
    }

    /// Compressed SEC1 encoding of every point
    pub fn to_bytes(&self) -> Vec<Vec<u8>> {
        self.points.iter().map(encode_point).collect()
    }

    pub fn from_bytes(encoded: &[Vec<u8>]) -> Result<Self> {
        let points = encoded
            .iter()
            .map(|bytes| decode_point(bytes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(points))
    }
}

/// Sum of `scalar * point` terms, folded two at a time
pub(crate) fn linear_combination<'a, I>(terms: I) -> ProjectivePoint
where
    I: IntoIterator<Item = (&'a Scalar, &'a ProjectivePoint)>,
{
    let mut terms = terms.into_iter();
    let mut acc = ProjectivePoint::IDENTITY;
    while let Some((k, x)) = terms.next() {
        acc += match terms.next() {
            Some((l, y)) => ProjectivePoint::lincomb(x, k, y, l),
            None => *x * k,
        };
    }
    acc
}

/// Lagrange coefficient at zero for `index` over the set `indices`
pub fn lagrange_coefficient(index: Position, indices: &[Position]) -> Result<Scalar> {
    if !indices.contains(&index) {
        return Err(Error::InvalidConfig(format!(
            "Index {} is not part of the interpolation set",
            index
        )));
    }

    let x_i = position_scalar(index);
    let mut numerator = Scalar::ONE;
    let mut denominator = Scalar::ONE;

    for &j in indices {
        if j == index {
            continue;
        }
        let x_j = position_scalar(j);
        numerator *= x_j;
        denominator *= x_j - x_i;
    }

    Option::<Scalar>::from(denominator.invert())
        .map(|inv| numerator * inv)
        .ok_or_else(|| Error::InvalidConfig("Duplicate interpolation index".into()))
}

/// Reconstruct `f(0)` from `(index, f(index))` samples.
///
/// Needs at least `threshold` distinct samples to recover the secret of a
/// degree `threshold - 1` polynomial.
pub fn interpolate_secret(shares: &[(Position, Scalar)]) -> Result<Scalar> {
    let indices: Vec<Position> = shares.iter().map(|(index, _)| *index).collect();
    shares.iter().try_fold(Scalar::ZERO, |acc, (index, share)| {
        Ok(acc + lagrange_coefficient(*index, &indices)? * share)
    })
}
