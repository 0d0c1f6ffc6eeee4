//! Error types for key generation

use crate::Position;
use thiserror::Error;

/// Result type alias for key generation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the key generation protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Invalid participant or session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Position or key index outside 1..=n
    #[error("Invalid position {position}, expected 1..={max}")]
    InvalidPosition { position: Position, max: usize },

    /// Key slot is not owned by this weighted party
    #[error("Key slot {0} is not owned by this party")]
    KeyNotOwned(Position),

    /// Key slot assigned twice in a partition
    #[error("Key slot {0} assigned more than once")]
    DuplicateKey(Position),

    /// A sender registered two different commitment vectors
    #[error("Conflicting commitment registered for sender {sender}")]
    ConflictingCommitment { sender: Position },

    /// A share or proof arrived from a sender with no registered commitment
    #[error("No commitment registered for sender {sender}")]
    MissingCommitment { sender: Position },

    /// Registered senders whose share for `index` never arrived
    #[error("Missing secret shares for index {index} from senders {senders:?}")]
    MissingShares {
        index: Position,
        senders: Vec<Position>,
    },

    /// Commitment vector does not carry `threshold` points
    #[error("Commitment from sender {sender} has {actual} points, expected {expected}")]
    InvalidCommitmentLength {
        sender: Position,
        expected: usize,
        actual: usize,
    },

    /// Operation invoked before the protocol reached the required stage
    #[error("{operation} not allowed at stage {stage}")]
    OutOfOrder {
        operation: &'static str,
        stage: &'static str,
    },

    /// Schnorr proof of knowledge for the constant term did not verify
    #[error("Invalid proof of knowledge from participant {culprit}")]
    InvalidProofOfKnowledge { culprit: Position },

    /// One or more received secret shares are inconsistent with the
    /// senders' commitments
    #[error("Invalid secret shares for index {index} from senders {culprits:?}")]
    InvalidSecretShares {
        index: Position,
        culprits: Vec<Position>,
    },

    /// Two derivations of a public signing share disagree
    #[error("Public signing share mismatch for index {index}")]
    PublicShareMismatch { index: Position },

    /// Independently derived Q/W maps differ from the distributed ones
    #[error("Q/W map derived by participant {node} differs from the distributed maps")]
    MapMismatch { node: Position },

    /// Participants disagree on the group public key
    #[error("Group public key computed by participant {node} differs")]
    GroupKeyMismatch { node: Position },

    /// Malformed point, scalar or snapshot
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Deserialization(e.to_string())
    }
}
