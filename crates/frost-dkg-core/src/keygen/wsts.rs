//! WSTS session: `n_keys` key slots spread over `n_parties` weighted parties

use super::{
    build_report, derive_group_keys, exchange_commitments, exchange_proofs, partition_keys,
    propagate_maps, validate_partition, RoundLog, SessionReport,
};
use crate::parallel;
use crate::participant::Participant;
use crate::types::ParticipantConfig;
use crate::vss::ShareInbox;
use crate::weighted::WeightedParticipant;
use crate::{Error, Position, Result, SessionConfig};
use k256::{ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{info, instrument};

/// Simulated weighted key generation
#[derive(Debug)]
pub struct WstsSession {
    config: SessionConfig,
    parties: Vec<WeightedParticipant>,
    log: RoundLog,
}

impl WstsSession {
    /// Session with key slots split evenly by [`partition_keys`]
    pub fn new(config: SessionConfig) -> Result<Self> {
        let partition = partition_keys(config.n_parties, config.n_keys)?;
        Self::with_partition(config, partition, &mut OsRng)
    }

    /// Session where party `i` owns `partition[i - 1]`
    pub fn with_partition<R: RngCore + CryptoRng>(
        config: SessionConfig,
        partition: Vec<BTreeSet<Position>>,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        if partition.len() != config.n_parties {
            return Err(Error::InvalidConfig(format!(
                "Partition has {} entries for {} parties",
                partition.len(),
                config.n_parties
            )));
        }
        validate_partition(&partition, config.n_keys)?;

        let parties = partition
            .into_iter()
            .enumerate()
            .map(|(idx, keys)| {
                let participant_config =
                    ParticipantConfig::new(config.n_keys, config.threshold, idx + 1)?;
                let frost = Participant::from_rng(participant_config, rng)?;
                WeightedParticipant::new(config.n_parties, frost)?.with_keys(keys)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            parties,
            log: RoundLog::default(),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn parties(&self) -> &[WeightedParticipant] {
        &self.parties
    }

    pub fn party(&self, position: Position) -> Option<&WeightedParticipant> {
        position.checked_sub(1).and_then(|idx| self.parties.get(idx))
    }

    /// Direct access to a party, e.g. to replace its delivered shares
    pub fn party_mut(&mut self, position: Position) -> Option<&mut WeightedParticipant> {
        position
            .checked_sub(1)
            .and_then(|idx| self.parties.get_mut(idx))
    }

    /// Signing share of key slot `key`, looked up at its owner
    pub fn signing_share(&self, key: Position) -> Option<Scalar> {
        self.parties
            .iter()
            .find(|party| party.owns(key))
            .and_then(|party| party.signing_share(key))
    }

    #[instrument(skip(self))]
    pub fn exchange_commitments(&mut self) -> Result<()> {
        let started = Instant::now();
        exchange_commitments(&mut self.parties)?;
        self.log.record("exchange-commitments", started);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn exchange_proofs(&mut self) -> Result<()> {
        let started = Instant::now();
        exchange_proofs(&self.parties, &self.config.session_id)?;
        self.log.record("secret-proofs", started);
        Ok(())
    }

    /// Every party evaluates its polynomial at all `n_keys` slots
    #[instrument(skip(self))]
    pub fn calculate_secret_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        parallel::try_for_each_mut(&mut self.parties, |party| {
            party.frost_mut().calculate_secret_shares()
        })?;
        self.log.record("calculate-secret-shares", started);
        Ok(())
    }

    /// Hand every party, for each slot it owns, the share of that slot from
    /// every party
    pub fn distribute_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        let n_parties = self.config.n_parties;

        let mut deliveries = Vec::with_capacity(self.parties.len());
        for receiver in &self.parties {
            let mut inboxes = Vec::with_capacity(receiver.keys().len());
            for &key in receiver.keys() {
                let mut inbox = ShareInbox::new(n_parties);
                for sender in &self.parties {
                    inbox.set(sender.position(), sender.frost().get_secret_shares(key)?)?;
                }
                inboxes.push((key, inbox));
            }
            deliveries.push(inboxes);
        }

        for (party, inboxes) in self.parties.iter_mut().zip(deliveries) {
            for (key, inbox) in inboxes {
                party.store_secret_shares(key, inbox)?;
            }
        }
        self.log.record("distribute-secret-shares", started);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn verify_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        parallel::try_for_each_mut(&mut self.parties, WeightedParticipant::verify_secret_shares)?;
        self.log.record("verify-batch-public-secret-shares", started);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn calculate_signing_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        parallel::try_for_each_mut(&mut self.parties, |party| {
            party.calculate_signing_shares()?;
            party.calculate_internal_public_signing_shares()
        })?;
        self.log.record("calculate-internal-public-signing-shares", started);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn derive_external_maps(&mut self) -> Result<()> {
        let started = Instant::now();
        propagate_maps(&mut self.parties, self.config.map_mode)?;
        self.log.record("derive-external-q-w-map", started);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn calculate_public_signing_shares(&mut self) -> Result<()> {
        let started = Instant::now();
        parallel::try_for_each_mut(
            &mut self.parties,
            WeightedParticipant::calculate_batch_public_signing_shares,
        )?;
        self.log.record("calculate-batch-public-signing-shares", started);
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn calculate_group_public_key(&mut self) -> Result<ProjectivePoint> {
        let started = Instant::now();
        let key = derive_group_keys(&mut self.parties)?;
        self.log.record("calculate-group-public-key", started);
        Ok(key)
    }

    /// Run every round in order
    #[instrument(
        skip(self),
        fields(
            parties = self.config.n_parties,
            keys = self.config.n_keys,
            threshold = self.config.threshold
        )
    )]
    pub fn run(&mut self) -> Result<SessionReport> {
        info!("Starting WSTS key generation");

        self.exchange_commitments()?;
        self.exchange_proofs()?;
        self.calculate_secret_shares()?;
        self.distribute_shares()?;
        self.verify_shares()?;
        self.calculate_signing_shares()?;
        self.derive_external_maps()?;
        self.calculate_public_signing_shares()?;
        let group_public_key = self.calculate_group_public_key()?;

        let report = build_report(&self.config, &self.parties, &group_public_key, &self.log)?;
        info!(
            group_public_key = %report.group_public_key,
            "WSTS key generation completed"
        );
        Ok(report)
    }
}
