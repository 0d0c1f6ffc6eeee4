//! FROST session: n participants, one key slot each

use super::{
    build_report, derive_group_keys, exchange_commitments, exchange_proofs, propagate_maps,
    RoundLog, SessionReport,
};
use crate::parallel;
use crate::participant::Participant;
use crate::types::ParticipantConfig;
use crate::vss::{self, ShareInbox};
use crate::{Error, Position, Result, SessionConfig};
use k256::ProjectivePoint;
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{info, instrument};

/// Simulated FROST key generation across `n` in-process participants
#[derive(Debug)]
pub struct FrostSession {
    config: SessionConfig,
    participants: Vec<Participant>,
    inboxes: Vec<ShareInbox>,
    log: RoundLog,
}

impl FrostSession {
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::from_rng(config, &mut OsRng)
    }

    /// Create the participants with polynomials drawn from `rng`
    pub fn from_rng<R: RngCore + CryptoRng>(config: SessionConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        if config.n_parties != config.n_keys {
            return Err(Error::InvalidConfig(format!(
                "FROST needs one key slot per party, got {} parties and {} slots",
                config.n_parties, config.n_keys
            )));
        }

        let n = config.n_parties;
        let participants = (1..=n)
            .map(|position| {
                let participant_config = ParticipantConfig::new(n, config.threshold, position)?;
                Participant::from_rng(participant_config, rng)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            inboxes: (0..n).map(|_| ShareInbox::new(n)).collect(),
            participants,
            config,
            log: RoundLog::default(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, position: Position) -> Option<&Participant> {
        position
            .checked_sub(1)
            .and_then(|idx| self.participants.get(idx))
    }

    /// Shares delivered to `receiver`, available after [`Self::distribute_shares`]
    pub fn inbox(&self, receiver: Position) -> Option<&ShareInbox> {
        receiver.checked_sub(1).and_then(|idx| self.inboxes.get(idx))
    }

    /// Mutable access to a delivery buffer, standing in for a network that
    /// can alter messages in flight
    pub fn inbox_mut(&mut self, receiver: Position) -> Option<&mut ShareInbox> {
        receiver
            .checked_sub(1)
            .and_then(|idx| self.inboxes.get_mut(idx))
    }

    /// Round 1: broadcast every commitment to every peer
    #[instrument(skip(self))]
    pub fn exchange_commitments(&mut self) -> Result<()> {
        let started = Instant::now();
        exchange_commitments(&mut self.participants)?;
        self.log.record("exchange-commitments", started);
        Ok(())
    }

    /// Round 2: all-to-all proofs of knowledge of the constant terms
    #[instrument(skip(self))]
    pub fn exchange_proofs(&mut self) -> Result<()> {
        let started = Instant::now();
        exchange_proofs(&self.participants, &self.config.session_id)?;
        self.log.record("secret-proofs", started);
        Ok(())
    }

    /// Round 3: every participant evaluates its polynomial for all peers
    #[instrument(skip(self))]
    pub fn calculate_secret_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        parallel::try_for_each_mut(&mut self.participants, Participant::calculate_secret_shares)?;
        self.log.record("calculate-secret-shares", started);
        Ok(())
    }

    /// Deliver share `(i -> j)` into `j`'s inbox for every pair, self included
    pub fn distribute_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        for (idx, inbox) in self.inboxes.iter_mut().enumerate() {
            let receiver = idx + 1;
            for sender in &self.participants {
                inbox.set(sender.position(), sender.get_secret_shares(receiver)?)?;
            }
        }
        self.log.record("distribute-secret-shares", started);
        Ok(())
    }

    /// Round 4: power maps and batch verification of every inbox
    #[instrument(skip(self))]
    pub fn verify_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        let inboxes = &self.inboxes;
        parallel::try_for_each_mut(&mut self.participants, |participant| {
            participant.derive_power_map()?;
            let position = participant.position();
            participant.verify_batch_public_secret_shares(&inboxes[position - 1], position)
        })?;
        self.log.record("verify-batch-public-secret-shares", started);
        Ok(())
    }

    /// Round 5: sum the inbox into the signing share and derive its public
    /// counterpart
    #[instrument(skip(self))]
    pub fn calculate_signing_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        let inboxes = &self.inboxes;
        parallel::try_for_each_mut(&mut self.participants, |participant| {
            let position = participant.position();
            let signing_share = vss::sum_shares(&inboxes[position - 1]);
            participant
                .calculate_internal_public_signing_shares(signing_share, position)
                .map(|_| ())
        })?;
        self.log.record("calculate-internal-public-signing-shares", started);
        Ok(())
    }

    /// Round 6: Q/W map derivation and propagation
    #[instrument(skip(self))]
    pub fn derive_external_maps(&mut self) -> Result<()> {
        let started = Instant::now();
        propagate_maps(&mut self.participants, self.config.map_mode)?;
        self.log.record("derive-external-q-w-map", started);
        Ok(())
    }

    /// Round 7: every participant derives every peer's public signing share
    #[instrument(skip(self))]
    pub fn calculate_public_signing_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        parallel::try_for_each_mut(&mut self.participants, |participant| {
            let exclude = BTreeSet::from([participant.position()]);
            participant.calculate_batch_public_signing_shares(&exclude)
        })?;
        self.log.record("calculate-batch-public-signing-shares", started);
        Ok(())
    }

    /// Round 8: group public key, checked to agree across participants
    #[instrument(skip(self))]
    pub fn calculate_group_public_key(&mut self) -> Result<ProjectivePoint> {
        let started = Instant::now();
        let key = derive_group_keys(&mut self.participants)?;
        self.log.record("calculate-group-public-key", started);
        Ok(key)
    }

    /// Run every round in order
    #[instrument(skip(self), fields(n = self.config.n_parties, threshold = self.config.threshold))]
    pub fn run(&mut self) -> Result<SessionReport> {
        info!("Starting FROST key generation");

        self.exchange_commitments()?;
        self.exchange_proofs()?;
        self.calculate_secret_shares()?;
        self.distribute_shares()?;
        self.verify_shares()?;
        self.calculate_signing_shares()?;
        self.derive_external_maps()?;
        self.calculate_public_signing_shares()?;
        let group_public_key = self.calculate_group_public_key()?;

        let report = build_report(&self.config, &self.participants, &group_public_key, &self.log)?;
        info!(
            group_public_key = %report.group_public_key,
            "FROST key generation completed"
        );
        Ok(report)
    }
}
