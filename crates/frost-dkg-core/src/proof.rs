//! Schnorr proof of knowledge of a participant's constant term
//!
//! Each participant proves it knows `a_0` behind its published `a_0 * G`,
//! bound to the session context and its own position. This stops rogue-key
//! contributions and replay of a proof across sessions.

use crate::types::{decode_point, encode_point, scalar_from_bytes, scalar_to_bytes};
use crate::{Error, Position, Result, SessionId};
use k256::{
    elliptic_curve::{bigint::U256, ops::Reduce, Field},
    ProjectivePoint, Scalar,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const PROOF_DOMAIN: &[u8] = b"FROST-DKG-secp256k1-SHA256-PoK-v1";

/// Proof `(R, z)` with `z = k + a_0 * c` and `R = k * G`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretProof {
    /// Nonce commitment `R`
    pub nonce_commitment: ProjectivePoint,
    /// Response `z`
    pub response: Scalar,
}

/// Wire form of a [`SecretProof`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretProofBytes {
    pub nonce_commitment: Vec<u8>,
    pub response: [u8; 32],
}

impl SecretProof {
    pub fn to_bytes(&self) -> SecretProofBytes {
        SecretProofBytes {
            nonce_commitment: encode_point(&self.nonce_commitment),
            response: scalar_to_bytes(&self.response),
        }
    }

    pub fn from_bytes(bytes: &SecretProofBytes) -> Result<Self> {
        Ok(Self {
            nonce_commitment: decode_point(&bytes.nonce_commitment)?,
            response: scalar_from_bytes(&bytes.response),
        })
    }
}

/// Hash length-framed inputs under a domain tag and reduce into a scalar
pub fn hash_to_scalar(domain: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha256::new();
    hasher.update((domain.len() as u64).to_be_bytes());
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    <Scalar as Reduce<U256>>::reduce_bytes(&hasher.finalize())
}

/// Challenge `c = H(context, position, a_0 * G, R)`
pub fn challenge(
    context: &SessionId,
    position: Position,
    constant_commitment: &ProjectivePoint,
    nonce_commitment: &ProjectivePoint,
) -> Scalar {
    hash_to_scalar(
        PROOF_DOMAIN,
        &[
            context.as_slice(),
            (position as u64).to_be_bytes().as_slice(),
            encode_point(constant_commitment).as_slice(),
            encode_point(nonce_commitment).as_slice(),
        ],
    )
}

pub(crate) fn prove<R: RngCore + CryptoRng>(
    context: &SessionId,
    position: Position,
    secret: &Scalar,
    constant_commitment: &ProjectivePoint,
    rng: &mut R,
) -> SecretProof {
    let k = Scalar::random(&mut *rng);
    let nonce_commitment = ProjectivePoint::GENERATOR * k;
    let c = challenge(context, position, constant_commitment, &nonce_commitment);
    SecretProof {
        nonce_commitment,
        response: k + *secret * c,
    }
}

/// Check `R == z * G - c * (a_0 * G)`, failing closed on any mismatch
pub fn verify(
    context: &SessionId,
    proof: &SecretProof,
    position: Position,
    constant_commitment: &ProjectivePoint,
) -> Result<()> {
    let c = challenge(context, position, constant_commitment, &proof.nonce_commitment);
    let expected = ProjectivePoint::GENERATOR * proof.response - *constant_commitment * c;
    if bool::from(expected.ct_eq(&proof.nonce_commitment)) {
        Ok(())
    } else {
        Err(Error::InvalidProofOfKnowledge { culprit: position })
    }
}
