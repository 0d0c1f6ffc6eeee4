//! # FROST DKG Core
//!
//! Dealerless distributed key generation for FROST threshold Schnorr
//! signatures over secp256k1, with a weighted (WSTS) layer on top.
//!
//! This crate provides:
//! - Participants that run the Pedersen/Feldman DKG rounds
//! - Schnorr proofs of knowledge for the polynomial constant terms
//! - Batched verification of received secret shares
//! - Q/W maps for deriving every public signing share in one pass
//! - Weighted parties that own several key slots
//! - In-process sessions that drive all rounds for benchmarking
//!
//! ## Protocol Overview
//!
//! Each participant samples a secret polynomial of degree `t - 1`, commits
//! to its coefficients, proves knowledge of the constant term and sends
//! `f_i(j)` to every peer `j`. A receiver checks its shares against the
//! commitments, sums them into its signing share and, from the joint
//! commitment, derives the public signing share of any index. The group
//! public key is the sum of all constant-term commitments.
//!
//! ## Example
//!
//! ```rust,ignore
//! use frost_dkg_core::{FrostSession, SessionConfig};
//!
//! let config = SessionConfig::frost(5, 3)?;
//! let report = FrostSession::new(config)?.run()?;
//! println!("{}", report.group_public_key);
//! ```

pub mod error;
pub mod keygen;
pub mod maps;
mod parallel;
pub mod participant;
pub mod polynomial;
pub mod power_map;
pub mod proof;
pub mod types;
pub mod vss;
pub mod weighted;

pub use error::{Error, Result};
pub use keygen::{
    partition_keys, validate_partition, FrostSession, RoundTiming, SessionReport, WstsSession,
};
pub use maps::{QMap, QMapSnapshot, WMap, WMapSnapshot};
pub use participant::{Participant, Stage};
pub use polynomial::{interpolate_secret, lagrange_coefficient, PolynomialCommitment};
pub use proof::SecretProof;
pub use types::{MapMode, ParticipantConfig, Position, PositionTable, SessionConfig, SessionId};
pub use vss::ShareInbox;
pub use weighted::WeightedParticipant;

/// Protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default threshold for the simulator
pub const DEFAULT_THRESHOLD: usize = 3;

/// Default number of parties for the simulator
pub const DEFAULT_PARTIES: usize = 5;
