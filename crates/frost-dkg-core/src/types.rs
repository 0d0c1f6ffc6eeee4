//! Core types shared by the key generation rounds

use crate::{Error, Result};
use k256::{
    elliptic_curve::{
        bigint::U256,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
    },
    AffinePoint, ProjectivePoint, Scalar,
};
use serde::{Deserialize, Serialize};

/// 1-based position of a participant or key slot
pub type Position = usize;

/// Unique identifier for a session, doubles as the proof-of-knowledge context
pub type SessionId = [u8; 32];

/// Fixed-size table indexed by position `1..=n`.
///
/// Unset slots are `None`. Tables that hold public protocol data are filled
/// through [`PositionTable::insert_once`], which refuses to overwrite a slot
/// with a different value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionTable<T> {
    slots: Vec<Option<T>>,
}

impl<T> PositionTable<T> {
    /// Create an empty table covering positions `1..=n`
    pub fn new(n: usize) -> Self {
        Self {
            slots: (0..n).map(|_| None).collect(),
        }
    }

    /// Highest addressable position
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of filled slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn get(&self, position: Position) -> Option<&T> {
        position
            .checked_sub(1)
            .and_then(|idx| self.slots.get(idx))
            .and_then(Option::as_ref)
    }

    pub fn contains(&self, position: Position) -> bool {
        self.get(position).is_some()
    }

    /// Store `value` at `position`, returning the previous value
    pub fn set(&mut self, position: Position, value: T) -> Result<Option<T>> {
        let idx = self.slot_index(position)?;
        Ok(self.slots[idx].replace(value))
    }

    /// Filled slots in ascending position order
    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|value| (idx + 1, value)))
    }

    /// Filled positions in ascending order
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.iter().map(|(position, _)| position)
    }

    fn slot_index(&self, position: Position) -> Result<usize> {
        if position == 0 || position > self.slots.len() {
            return Err(Error::InvalidPosition {
                position,
                max: self.slots.len(),
            });
        }
        Ok(position - 1)
    }
}

impl<T: PartialEq> PositionTable<T> {
    /// Write-once insert.
    ///
    /// Returns `Ok(true)` if the slot was empty, `Ok(false)` if it already
    /// held an identical value, and the error built by `on_conflict` if it
    /// held a different one.
    pub fn insert_once<F>(&mut self, position: Position, value: T, on_conflict: F) -> Result<bool>
    where
        F: FnOnce(Position) -> Error,
    {
        let idx = self.slot_index(position)?;
        match &self.slots[idx] {
            None => {
                self.slots[idx] = Some(value);
                Ok(true)
            }
            Some(existing) if *existing == value => Ok(false),
            Some(_) => Err(on_conflict(position)),
        }
    }
}

/// Convert a position into a field element
pub fn position_scalar(position: Position) -> Scalar {
    Scalar::from(position as u64)
}

/// Encode a point as 33-byte compressed SEC1
pub fn encode_point(point: &ProjectivePoint) -> Vec<u8> {
    point.to_affine().to_encoded_point(true).as_bytes().to_vec()
}

/// Decode a compressed or uncompressed SEC1 point
pub fn decode_point(bytes: &[u8]) -> Result<ProjectivePoint> {
    let encoded =
        k256::EncodedPoint::from_bytes(bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
    let affine_opt = AffinePoint::from_encoded_point(&encoded);
    let affine: AffinePoint = Option::<AffinePoint>::from(affine_opt)
        .ok_or_else(|| Error::Deserialization("Invalid curve point".into()))?;
    Ok(ProjectivePoint::from(affine))
}

pub fn scalar_to_bytes(scalar: &Scalar) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(scalar.to_bytes().as_slice());
    bytes
}

/// Decode a 32-byte big-endian scalar, reducing modulo the group order
pub fn scalar_from_bytes(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(&(*bytes).into())
}

/// Static parameters of a single participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantConfig {
    /// Number of share positions (participants, or key slots when weighted)
    pub n: usize,
    /// Shares required to reconstruct; polynomial degree is `threshold - 1`
    pub threshold: usize,
    /// This participant's position in `1..=n`
    pub position: Position,
}

impl ParticipantConfig {
    pub fn new(n: usize, threshold: usize, position: Position) -> Result<Self> {
        validate_threshold(n, threshold)?;
        if position == 0 || position > n {
            return Err(Error::InvalidPosition { position, max: n });
        }
        Ok(Self {
            n,
            threshold,
            position,
        })
    }
}

/// How the Q/W maps reach every participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapMode {
    /// One designated participant derives the maps, everyone else imports them
    #[default]
    Broadcast,
    /// Every participant derives the maps and checks them against the
    /// designated participant's copy
    Recompute,
}

/// Configuration for a simulated key generation session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session identifier, bound into every proof of knowledge
    pub session_id: SessionId,

    /// Number of physical parties
    pub n_parties: usize,

    /// Number of key slots; equals `n_parties` for plain FROST
    pub n_keys: usize,

    /// Threshold (t-of-n_keys)
    pub threshold: usize,

    /// Q/W map distribution mode
    #[serde(default)]
    pub map_mode: MapMode,
}

impl SessionConfig {
    /// Plain FROST session: every party owns exactly one key slot
    pub fn frost(n: usize, threshold: usize) -> Result<Self> {
        Self::wsts(n, n, threshold)
    }

    /// Weighted session with `n_keys` slots spread over `n_parties` parties
    pub fn wsts(n_parties: usize, n_keys: usize, threshold: usize) -> Result<Self> {
        let config = Self {
            session_id: rand::random(),
            n_parties,
            n_keys,
            threshold,
            map_mode: MapMode::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_map_mode(mut self, map_mode: MapMode) -> Self {
        self.map_mode = map_mode;
        self
    }

    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    /// Check parameter consistency, e.g. after loading from a file
    pub fn validate(&self) -> Result<()> {
        if self.n_parties == 0 {
            return Err(Error::InvalidConfig("At least one party is required".into()));
        }
        if self.n_parties > self.n_keys {
            return Err(Error::InvalidConfig(format!(
                "{} parties cannot share {} key slots",
                self.n_parties, self.n_keys
            )));
        }
        validate_threshold(self.n_keys, self.threshold)
    }
}

fn validate_threshold(n: usize, threshold: usize) -> Result<()> {
    if threshold == 0 {
        return Err(Error::InvalidConfig("Threshold must be at least 1".into()));
    }
    if threshold > n {
        return Err(Error::InvalidConfig(format!(
            "Threshold {} cannot exceed {} shares",
            threshold, n
        )));
    }
    Ok(())
}
