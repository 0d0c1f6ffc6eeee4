//! Round orchestration for simulated key generation
//!
//! The sessions here play the network: they run each round as a parallel
//! task per participant, join, and then perform the cross-participant
//! copies (commitment broadcast, share delivery, map propagation) before
//! starting the next round.

mod frost;
mod wsts;

pub use frost::FrostSession;
pub use wsts::WstsSession;

use crate::parallel;
use crate::participant::Participant;
use crate::proof::SecretProof;
use crate::types::{encode_point, MapMode};
use crate::{Error, Position, Result, SessionConfig, SessionId};
use k256::ProjectivePoint;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, info};

/// Wall-clock time spent in one round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundTiming {
    pub round: &'static str,
    pub elapsed_ms: u64,
}

/// Outcome of a completed session
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub n_parties: usize,
    pub n_keys: usize,
    pub threshold: usize,
    /// Compressed group public key, hex encoded
    pub group_public_key: String,
    /// Compressed public signing share of every key slot, hex encoded
    pub public_signing_shares: Vec<String>,
    pub rounds: Vec<RoundTiming>,
}

/// Per-round timing log shared by both session kinds
#[derive(Debug, Default)]
pub(crate) struct RoundLog {
    rounds: Vec<RoundTiming>,
}

impl RoundLog {
    pub(crate) fn record(&mut self, round: &'static str, started: Instant) {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(round, elapsed_ms, "Round completed");
        self.rounds.push(RoundTiming { round, elapsed_ms });
    }

    pub(crate) fn rounds(&self) -> &[RoundTiming] {
        &self.rounds
    }
}

pub(crate) fn build_report<P: AsRef<Participant>>(
    config: &SessionConfig,
    participants: &[P],
    group_public_key: &ProjectivePoint,
    log: &RoundLog,
) -> Result<SessionReport> {
    let observer = participants
        .first()
        .map(AsRef::as_ref)
        .ok_or_else(|| Error::Internal("Session without participants".into()))?;
    let public_signing_shares = (1..=config.n_keys)
        .map(|key| {
            observer
                .get_public_signing_shares(key)
                .map(|point| hex::encode(encode_point(&point)))
                .ok_or_else(|| Error::Internal(format!("No public signing share for {}", key)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SessionReport {
        n_parties: config.n_parties,
        n_keys: config.n_keys,
        threshold: config.threshold,
        group_public_key: hex::encode(encode_point(group_public_key)),
        public_signing_shares,
        rounds: log.rounds().to_vec(),
    })
}

/// Register every participant's commitment with every participant, itself
/// included, so each commitment table covers the full sender set
pub(crate) fn exchange_commitments<P>(participants: &mut [P]) -> Result<()>
where
    P: AsRef<Participant> + AsMut<Participant> + Send,
{
    let broadcast: Vec<_> = participants
        .iter()
        .map(|p| (p.as_ref().position(), p.as_ref().commitment().clone()))
        .collect();

    parallel::try_for_each_mut(participants, |p| {
        let participant = p.as_mut();
        for (sender, commitment) in &broadcast {
            participant.update_polynomial_commitments(*sender, commitment.clone())?;
        }
        Ok(())
    })
}

/// Every participant proves knowledge of its constant term, then checks
/// everyone else's proof
pub(crate) fn exchange_proofs<P>(participants: &[P], context: &SessionId) -> Result<()>
where
    P: AsRef<Participant> + Sync,
{
    let proofs: Vec<(Position, SecretProof, ProjectivePoint)> =
        parallel::try_map(participants, |p| {
            let participant = p.as_ref();
            let constant = participant
                .commitment()
                .constant_term()
                .copied()
                .ok_or(Error::MissingCommitment {
                    sender: participant.position(),
                })?;
            Ok((
                participant.position(),
                participant.calculate_secret_proofs(context),
                constant,
            ))
        })?;

    parallel::try_map(participants, |p| {
        let verifier = p.as_ref();
        for (peer, proof, constant) in &proofs {
            verifier.verify_secret_proofs(context, proof, *peer, constant)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Derive the Q/W maps once and propagate them, or let every participant
/// derive its own and compare, depending on `mode`
pub(crate) fn propagate_maps<P>(participants: &mut [P], mode: MapMode) -> Result<()>
where
    P: AsRef<Participant> + AsMut<Participant> + Send,
{
    let (designated, others) = participants
        .split_first_mut()
        .ok_or_else(|| Error::Internal("Session without participants".into()))?;

    let designated = designated.as_mut();
    designated.derive_external_q_map()?;
    designated.derive_external_w_map()?;
    let q_snapshot = designated.copy_q_map()?;
    let w_snapshot = designated.copy_w_map()?;
    debug!(
        designated = designated.position(),
        q_map = %q_snapshot.fingerprint(),
        w_map = %w_snapshot.fingerprint(),
        "Q/W maps derived"
    );

    match mode {
        MapMode::Broadcast => parallel::try_for_each_mut(others, |p| {
            let participant = p.as_mut();
            participant.parse_q_map(&q_snapshot)?;
            participant.parse_w_map(&w_snapshot)
        }),
        MapMode::Recompute => parallel::try_for_each_mut(others, |p| {
            let participant = p.as_mut();
            participant.derive_external_q_map()?;
            participant.derive_external_w_map()?;
            let q_matches = participant.copy_q_map()? == q_snapshot;
            let w_matches = participant.copy_w_map()? == w_snapshot;
            if !(q_matches && w_matches) {
                return Err(Error::MapMismatch {
                    node: participant.position(),
                });
            }
            Ok(())
        }),
    }
}

/// Every participant computes the group key; all results must agree
pub(crate) fn derive_group_keys<P>(participants: &mut [P]) -> Result<ProjectivePoint>
where
    P: AsRef<Participant> + AsMut<Participant> + Send,
{
    parallel::try_for_each_mut(participants, |p| {
        p.as_mut().calculate_group_public_key().map(|_| ())
    })?;

    let mut keys = participants.iter().map(|p| {
        let participant = p.as_ref();
        participant
            .group_public_key()
            .map(|key| (participant.position(), key))
            .ok_or_else(|| Error::Internal("Group public key missing".into()))
    });
    let (_, expected) = keys
        .next()
        .ok_or_else(|| Error::Internal("Session without participants".into()))??;
    for entry in keys {
        let (position, key) = entry?;
        if key != expected {
            return Err(Error::GroupKeyMismatch { node: position });
        }
    }
    Ok(expected)
}

/// Split key slots `1..=n_keys` into contiguous ranges, one per party.
///
/// When `n_keys` is not a multiple of `n_parties` the first parties take
/// one extra slot each.
pub fn partition_keys(n_parties: usize, n_keys: usize) -> Result<Vec<BTreeSet<Position>>> {
    if n_parties == 0 || n_parties > n_keys {
        return Err(Error::InvalidConfig(format!(
            "Cannot split {} key slots over {} parties",
            n_keys, n_parties
        )));
    }

    let base = n_keys / n_parties;
    let extra = n_keys % n_parties;
    let mut next = 1;
    Ok((0..n_parties)
        .map(|party| {
            let size = base + usize::from(party < extra);
            let range: BTreeSet<Position> = (next..next + size).collect();
            next += size;
            range
        })
        .collect())
}

/// Check that `partition` hands every slot `1..=n_keys` to exactly one party
/// and leaves no party empty
pub fn validate_partition(partition: &[BTreeSet<Position>], n_keys: usize) -> Result<()> {
    let mut seen = BTreeSet::new();
    for (idx, keys) in partition.iter().enumerate() {
        if keys.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "Party {} owns no key slots",
                idx + 1
            )));
        }
        for &key in keys {
            if key == 0 || key > n_keys {
                return Err(Error::InvalidPosition {
                    position: key,
                    max: n_keys,
                });
            }
            if !seen.insert(key) {
                return Err(Error::DuplicateKey(key));
            }
        }
    }
    if seen.len() != n_keys {
        return Err(Error::InvalidConfig(format!(
            "Partition covers {} of {} key slots",
            seen.len(),
            n_keys
        )));
    }
    Ok(())
}
