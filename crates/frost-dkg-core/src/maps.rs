//! Aggregate public maps for deriving any index's public signing share
//!
//! The Q map is the Feldman commitment to the joint polynomial
//! `F = sum_i f_i`, i.e. `Q_k = sum_i C_{i,k}`. The W map holds, for every
//! evaluation index `j` in `1..=n`, the row `(1, j, ..., j^(t-1))`. With both,
//! the public signing share of index `j` is `Y_j = sum_k W_j[k] * Q_k`, which
//! equals `F(j) * G`.
//!
//! Both maps are pure functions of the complete commitment table, so one
//! participant can derive them and hand out snapshots instead of every
//! participant repeating the O(n * t) work.

use crate::polynomial::{linear_combination, PolynomialCommitment};
use crate::power_map::powers_of;
use crate::types::{
    decode_point, encode_point, scalar_from_bytes, scalar_to_bytes, PositionTable,
};
use crate::{Error, Position, Result};
use k256::{ProjectivePoint, Scalar};
use serde::{Deserialize, Serialize};

/// Commitment to the joint polynomial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QMap {
    points: Vec<ProjectivePoint>,
}

impl QMap {
    /// Sum every registered commitment coefficient-wise
    pub fn derive(
        commitments: &PositionTable<PolynomialCommitment>,
        threshold: usize,
    ) -> Result<Self> {
        if commitments.is_empty() {
            return Err(Error::InvalidConfig(
                "Cannot derive Q map without commitments".into(),
            ));
        }

        let mut points = vec![ProjectivePoint::IDENTITY; threshold];
        for (sender, commitment) in commitments.iter() {
            if commitment.len() != threshold {
                return Err(Error::InvalidCommitmentLength {
                    sender,
                    expected: threshold,
                    actual: commitment.len(),
                });
            }
            for (acc, point) in points.iter_mut().zip(commitment.points()) {
                *acc += point;
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[ProjectivePoint] {
        &self.points
    }

    pub fn threshold(&self) -> usize {
        self.points.len()
    }

    /// Constant term of the joint commitment
    pub fn group_public_key(&self) -> ProjectivePoint {
        self.points
            .first()
            .copied()
            .unwrap_or(ProjectivePoint::IDENTITY)
    }

    /// `sum_k powers[k] * Q_k`
    pub fn evaluate(&self, powers: &[Scalar]) -> ProjectivePoint {
        linear_combination(powers.iter().zip(self.points.iter()))
    }

    pub fn snapshot(&self) -> QMapSnapshot {
        QMapSnapshot {
            points: self.points.iter().map(encode_point).collect(),
        }
    }

    /// Import a snapshot, checking it was built for `threshold`
    pub fn from_snapshot(snapshot: &QMapSnapshot, threshold: usize) -> Result<Self> {
        if snapshot.points.len() != threshold {
            return Err(Error::Deserialization(format!(
                "Q map has {} points, expected {}",
                snapshot.points.len(),
                threshold
            )));
        }
        let points = snapshot
            .points
            .iter()
            .map(|bytes| decode_point(bytes))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { points })
    }
}

/// Per-index power rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WMap {
    threshold: usize,
    rows: PositionTable<Vec<Scalar>>,
}

impl WMap {
    /// Build rows for every index `1..=n` covered by the commitment table
    pub fn derive(
        commitments: &PositionTable<PolynomialCommitment>,
        threshold: usize,
    ) -> Result<Self> {
        if let Some((sender, commitment)) = commitments
            .iter()
            .find(|(_, commitment)| commitment.len() != threshold)
        {
            return Err(Error::InvalidCommitmentLength {
                sender,
                expected: threshold,
                actual: commitment.len(),
            });
        }

        let n = commitments.capacity();
        let mut rows = PositionTable::new(n);
        for index in 1..=n {
            rows.set(index, powers_of(index, threshold))?;
        }
        Ok(Self { threshold, rows })
    }

    pub fn row(&self, index: Position) -> Option<&[Scalar]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Highest index with a row
    pub fn n(&self) -> usize {
        self.rows.capacity()
    }

    pub fn snapshot(&self) -> WMapSnapshot {
        WMapSnapshot {
            threshold: self.threshold,
            rows: self
                .rows
                .iter()
                .map(|(_, row)| row.iter().map(scalar_to_bytes).collect())
                .collect(),
        }
    }

    /// Import a snapshot, checking its shape against `(n, threshold)`
    pub fn from_snapshot(snapshot: &WMapSnapshot, n: usize, threshold: usize) -> Result<Self> {
        if snapshot.threshold != threshold || snapshot.rows.len() != n {
            return Err(Error::Deserialization(format!(
                "W map shape {}x{} does not match {}x{}",
                snapshot.rows.len(),
                snapshot.threshold,
                n,
                threshold
            )));
        }

        let mut rows = PositionTable::new(n);
        for (idx, row) in snapshot.rows.iter().enumerate() {
            if row.len() != threshold {
                return Err(Error::Deserialization(format!(
                    "W map row {} has {} entries, expected {}",
                    idx + 1,
                    row.len(),
                    threshold
                )));
            }
            rows.set(idx + 1, row.iter().map(scalar_from_bytes).collect())?;
        }
        Ok(Self { threshold, rows })
    }
}

/// Immutable wire form of a [`QMap`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QMapSnapshot {
    /// Compressed SEC1 points, constant term first
    pub points: Vec<Vec<u8>>,
}

/// Immutable wire form of a [`WMap`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WMapSnapshot {
    pub threshold: usize,
    /// Row `j - 1` holds index `j`'s powers as 32-byte big-endian scalars
    pub rows: Vec<Vec<[u8; 32]>>,
}

impl QMapSnapshot {
    /// BLAKE3 digest of the canonical encoding
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for point in &self.points {
            hasher.update(point);
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl WMapSnapshot {
    /// BLAKE3 digest of the canonical encoding
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.threshold as u64).to_be_bytes());
        for scalar in self.rows.iter().flatten() {
            hasher.update(scalar);
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polynomial::SecretPolynomial;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    fn commitments(
        n: usize,
        registered: usize,
        t: usize,
    ) -> (Vec<SecretPolynomial>, PositionTable<PolynomialCommitment>) {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let polys: Vec<_> = (0..registered)
            .map(|_| SecretPolynomial::random(t, &mut rng))
            .collect();
        let mut table = PositionTable::new(n);
        for (i, poly) in polys.iter().enumerate() {
            table.set(i + 1, poly.commit()).unwrap();
        }
        (polys, table)
    }

    #[test]
    fn test_maps_yield_joint_public_shares() {
        let (polys, table) = commitments(6, 3, 3);
        let q = QMap::derive(&table, 3).unwrap();
        let w = WMap::derive(&table, 3).unwrap();
        assert_eq!(w.n(), 6);

        for index in 1..=6 {
            let joint: Scalar = polys
                .iter()
                .fold(Scalar::ZERO, |acc, poly| acc + poly.evaluate(index));
            assert_eq!(
                q.evaluate(w.row(index).unwrap()),
                ProjectivePoint::GENERATOR * joint
            );
        }

        let secret = polys
            .iter()
            .fold(Scalar::ZERO, |acc, poly| acc + poly.evaluate(0));
        assert_eq!(q.group_public_key(), ProjectivePoint::GENERATOR * secret);
    }

    #[test]
    fn test_snapshots_import() {
        let (_, table) = commitments(4, 4, 2);
        let q = QMap::derive(&table, 2).unwrap();
        let w = WMap::derive(&table, 2).unwrap();

        let q_json = serde_json::to_vec(&q.snapshot()).unwrap();
        let q_snapshot: QMapSnapshot = serde_json::from_slice(&q_json).unwrap();
        assert_eq!(QMap::from_snapshot(&q_snapshot, 2).unwrap(), q);
        assert_eq!(q_snapshot.fingerprint(), q.snapshot().fingerprint());

        assert_eq!(WMap::from_snapshot(&w.snapshot(), 4, 2).unwrap(), w);
    }

    #[test]
    fn test_snapshot_shape_checked() {
        let (_, table) = commitments(4, 4, 2);
        let q = QMap::derive(&table, 2).unwrap();
        let w = WMap::derive(&table, 2).unwrap();

        assert!(QMap::from_snapshot(&q.snapshot(), 3).is_err());
        assert!(WMap::from_snapshot(&w.snapshot(), 5, 2).is_err());

        let mut short = w.snapshot();
        short.rows[2].pop();
        assert!(WMap::from_snapshot(&short, 4, 2).is_err());

        let mut garbage = q.snapshot();
        garbage.points[0] = vec![0x05; 33];
        assert!(QMap::from_snapshot(&garbage, 2).is_err());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let (_, table) = commitments(3, 3, 2);
        let q = QMap::derive(&table, 2).unwrap();
        let mut other = q.snapshot();
        other.points.swap(0, 1);
        assert_ne!(q.snapshot().fingerprint(), other.fingerprint());
    }

    #[test]
    fn test_derive_rejects_bad_commitments() {
        let table: PositionTable<PolynomialCommitment> = PositionTable::new(3);
        assert!(QMap::derive(&table, 2).is_err());

        let (_, table) = commitments(3, 2, 2);
        assert!(matches!(
            QMap::derive(&table, 3),
            Err(Error::InvalidCommitmentLength { sender: 1, .. })
        ));
        assert!(WMap::derive(&table, 3).is_err());
    }
}
