//! Feldman share verification, single and batched
//!
//! A share `s` from sender `i` evaluated at index `x` is valid iff
//! `s * G == sum_k x^k * C_{i,k}`. The batched check draws a random 128-bit
//! weight `r_i` per sender and tests the single equation
//!
//! ```text
//! (sum_i r_i * s_i) * G == sum_i sum_k (r_i * x^k) * C_{i,k}
//! ```
//!
//! whose right side is one multi-scalar multiplication, split into chunks of
//! senders when the `multi-thread` feature is on. A forged share passes
//! with probability at most `2^-128`. On rejection the senders are
//! re-checked one by one so the culprits can be named.
//!
//! Both checks require a share from every sender with a registered
//! commitment, and a registered commitment for every sender in the inbox.

use crate::parallel;
use crate::polynomial::PolynomialCommitment;
use crate::types::{scalar_from_bytes, scalar_to_bytes, PositionTable};
use crate::{Error, Position, Result};
use k256::elliptic_curve::ops::LinearCombinationExt;
use k256::{ProjectivePoint, Scalar};
use merlin::Transcript;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Senders per multi-scalar multiplication in the batched check
const BATCH_CHUNK: usize = 8;

/// Secret shares received for one evaluation index, keyed by sender
pub type ShareInbox = PositionTable<Scalar>;

/// Sum of every received share: the signing share for that index
pub fn sum_shares(inbox: &ShareInbox) -> Scalar {
    inbox.iter().fold(Scalar::ZERO, |acc, (_, share)| acc + share)
}

/// Verify a single share against its sender's commitment
pub fn verify_share(share: &Scalar, commitment: &PolynomialCommitment, powers: &[Scalar]) -> bool {
    let expected = ProjectivePoint::GENERATOR * share;
    let actual = commitment.evaluate(powers);
    expected.ct_eq(&actual).into()
}

/// Verify every share in `inbox` at `index` with one combined equation.
///
/// `powers` must be `(1, index, index^2, ...)` with one entry per
/// commitment point.
pub fn verify_batch(
    inbox: &ShareInbox,
    commitments: &PositionTable<PolynomialCommitment>,
    index: Position,
    powers: &[Scalar],
) -> Result<()> {
    let entries = collect_entries(inbox, commitments, index, powers.len())?;
    let weights = batch_weights(&entries, index);

    let combined_share = entries
        .iter()
        .zip(&weights)
        .fold(Scalar::ZERO, |acc, ((_, share, _), weight)| acc + *weight * *share);

    let chunks: Vec<_> = entries
        .chunks(BATCH_CHUNK)
        .zip(weights.chunks(BATCH_CHUNK))
        .collect();
    let combined_commitment = parallel::map(&chunks, |(chunk, weights)| {
        weighted_commitment_sum(chunk, weights, powers)
    })
    .into_iter()
    .fold(ProjectivePoint::IDENTITY, |acc, partial| acc + partial);

    let lhs = ProjectivePoint::GENERATOR * combined_share;
    if bool::from(lhs.ct_eq(&combined_commitment)) {
        debug!(index, shares = entries.len(), "Batch share verification passed");
        return Ok(());
    }

    let culprits = find_culprits(&entries, powers);
    warn!(index, ?culprits, "Batch share verification failed");
    Err(Error::InvalidSecretShares { index, culprits })
}

/// Check every share individually, returning the offending senders
pub fn verify_individually(
    inbox: &ShareInbox,
    commitments: &PositionTable<PolynomialCommitment>,
    index: Position,
    powers: &[Scalar],
) -> Result<()> {
    let entries = collect_entries(inbox, commitments, index, powers.len())?;
    let culprits = find_culprits(&entries, powers);
    if culprits.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidSecretShares { index, culprits })
    }
}

type Entry<'a> = (Position, &'a Scalar, &'a PolynomialCommitment);

fn collect_entries<'a>(
    inbox: &'a ShareInbox,
    commitments: &'a PositionTable<PolynomialCommitment>,
    index: Position,
    threshold: usize,
) -> Result<Vec<Entry<'a>>> {
    let entries = inbox
        .iter()
        .map(|(sender, share)| {
            let commitment = commitments
                .get(sender)
                .ok_or(Error::MissingCommitment { sender })?;
            if commitment.len() != threshold {
                return Err(Error::InvalidCommitmentLength {
                    sender,
                    expected: threshold,
                    actual: commitment.len(),
                });
            }
            Ok((sender, share, commitment))
        })
        .collect::<Result<Vec<_>>>()?;

    let missing: Vec<Position> = commitments
        .positions()
        .filter(|sender| !inbox.contains(*sender))
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingShares {
            index,
            senders: missing,
        });
    }
    if entries.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "No commitments registered to verify index {index} against"
        )));
    }
    Ok(entries)
}

/// One 128-bit weight per entry, bound to the index, senders and shares
fn batch_weights(entries: &[Entry<'_>], index: Position) -> Vec<Scalar> {
    let mut transcript = Transcript::new(b"FROST-DKG-batch-vss-v1");
    transcript.append_u64(b"index", index as u64);
    let mut witness = Vec::with_capacity(entries.len() * 32);
    for (sender, share, _) in entries {
        transcript.append_u64(b"sender", *sender as u64);
        witness.extend_from_slice(&scalar_to_bytes(share));
    }
    let mut rng = transcript
        .build_rng()
        .rekey_with_witness_bytes(b"shares", &witness)
        .finalize(&mut OsRng);

    entries
        .iter()
        .map(|_| {
            let mut bytes = [0u8; 32];
            rng.fill_bytes(&mut bytes[16..]);
            scalar_from_bytes(&bytes)
        })
        .collect()
}

/// `sum_i sum_k (r_i * x^k) * C_{i,k}` over one chunk of senders
fn weighted_commitment_sum(
    entries: &[Entry<'_>],
    weights: &[Scalar],
    powers: &[Scalar],
) -> ProjectivePoint {
    let terms: Vec<(ProjectivePoint, Scalar)> = entries
        .iter()
        .zip(weights)
        .flat_map(|((_, _, commitment), weight)| {
            commitment
                .points()
                .iter()
                .zip(powers)
                .map(move |(point, power)| (*point, *weight * power))
        })
        .collect();
    ProjectivePoint::lincomb_ext(terms.as_slice())
}

fn find_culprits(entries: &[Entry<'_>], powers: &[Scalar]) -> Vec<Position> {
    parallel::filter_map(entries, |(sender, share, commitment)| {
        (!verify_share(share, commitment, powers)).then_some(*sender)
    })
}
