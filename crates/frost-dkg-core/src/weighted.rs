//! Weighted participants (WSTS)
//!
//! A physical party controls several key slots of an `n_keys`-sized FROST
//! instance. It runs one polynomial, sized for `n_keys` evaluation points,
//! and replays the per-index operations once for every slot it owns.

use crate::participant::Participant;
use crate::vss::{self, ShareInbox};
use crate::{Error, Position, Result};
use k256::Scalar;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, instrument};

/// A party owning a disjoint set of key slots
#[derive(Debug)]
pub struct WeightedParticipant {
    frost: Participant,
    n_parties: usize,
    keys: BTreeSet<Position>,
    secret_shares: BTreeMap<Position, ShareInbox>,
    verified: BTreeSet<Position>,
    signing_shares: BTreeMap<Position, Scalar>,
}

impl WeightedParticipant {
    /// Wrap `frost`, whose `n` is the number of key slots and whose position
    /// is this party's index among `n_parties`
    pub fn new(n_parties: usize, frost: Participant) -> Result<Self> {
        if n_parties == 0 || n_parties > frost.n() {
            return Err(Error::InvalidConfig(format!(
                "{} parties cannot share {} key slots",
                n_parties,
                frost.n()
            )));
        }
        if frost.position() > n_parties {
            return Err(Error::InvalidPosition {
                position: frost.position(),
                max: n_parties,
            });
        }

        Ok(Self {
            frost,
            n_parties,
            keys: BTreeSet::new(),
            secret_shares: BTreeMap::new(),
            verified: BTreeSet::new(),
            signing_shares: BTreeMap::new(),
        })
    }

    /// Take ownership of `keys`
    pub fn with_keys<I>(mut self, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = Position>,
    {
        for key in keys {
            self.add_key(key)?;
        }
        Ok(self)
    }

    pub fn add_key(&mut self, key: Position) -> Result<()> {
        let n_keys = self.frost.n();
        if key == 0 || key > n_keys {
            return Err(Error::InvalidPosition {
                position: key,
                max: n_keys,
            });
        }
        if !self.keys.insert(key) {
            return Err(Error::DuplicateKey(key));
        }
        Ok(())
    }

    pub fn keys(&self) -> &BTreeSet<Position> {
        &self.keys
    }

    pub fn owns(&self, key: Position) -> bool {
        self.keys.contains(&key)
    }

    pub fn position(&self) -> Position {
        self.frost.position()
    }

    pub fn n_parties(&self) -> usize {
        self.n_parties
    }

    pub fn frost(&self) -> &Participant {
        &self.frost
    }

    pub fn frost_mut(&mut self) -> &mut Participant {
        &mut self.frost
    }

    /// Record the shares every party sent for owned slot `key`
    pub fn store_secret_shares(&mut self, key: Position, shares: ShareInbox) -> Result<()> {
        self.require_owned(key)?;
        if let Some(sender) = shares.positions().find(|sender| *sender > self.n_parties) {
            return Err(Error::InvalidPosition {
                position: sender,
                max: self.n_parties,
            });
        }
        self.verified.remove(&key);
        self.secret_shares.insert(key, shares);
        Ok(())
    }

    pub fn get_secret_shares_map(&self, key: Position) -> Option<&ShareInbox> {
        self.secret_shares.get(&key)
    }

    /// Batch-verify the stored shares of every owned slot.
    ///
    /// Stops at the first failing slot; the error names the slot and every
    /// offending sender.
    #[instrument(skip(self), fields(position = self.frost.position()))]
    pub fn verify_secret_shares(&mut self) -> Result<()> {
        self.frost.derive_power_map_for(self.keys.iter().copied())?;
        for &key in &self.keys {
            let inbox = self
                .secret_shares
                .get(&key)
                .ok_or_else(|| self.missing_shares("verify_secret_shares"))?;
            self.frost.verify_batch_public_secret_shares(inbox, key)?;
            self.verified.insert(key);
        }
        debug!(keys = self.keys.len(), "Owned key slots verified");
        Ok(())
    }

    /// Sum the inbound shares of every owned slot into its signing share
    pub fn calculate_signing_shares(&mut self) -> Result<()> {
        for &key in &self.keys {
            if !self.verified.contains(&key) {
                return Err(self.missing_shares("calculate_signing_shares"));
            }
            let inbox = self
                .secret_shares
                .get(&key)
                .ok_or_else(|| self.missing_shares("calculate_signing_shares"))?;
            self.signing_shares.insert(key, vss::sum_shares(inbox));
        }
        Ok(())
    }

    pub fn signing_share(&self, key: Position) -> Option<Scalar> {
        self.signing_shares.get(&key).copied()
    }

    pub fn signing_shares(&self) -> &BTreeMap<Position, Scalar> {
        &self.signing_shares
    }

    /// Derive the public signing share of every owned slot from its
    /// signing share
    pub fn calculate_internal_public_signing_shares(&mut self) -> Result<()> {
        for &key in &self.keys {
            let share = self
                .signing_shares
                .get(&key)
                .copied()
                .ok_or_else(|| self.missing_shares("calculate_internal_public_signing_shares"))?;
            self.frost.calculate_internal_public_signing_shares(share, key)?;
        }
        Ok(())
    }

    /// Derive the public signing share of every slot this party does not own
    pub fn calculate_batch_public_signing_shares(&mut self) -> Result<()> {
        self.frost.calculate_batch_public_signing_shares(&self.keys)
    }

    fn require_owned(&self, key: Position) -> Result<()> {
        if self.owns(key) {
            Ok(())
        } else {
            Err(Error::KeyNotOwned(key))
        }
    }

    fn missing_shares(&self, operation: &'static str) -> Error {
        Error::OutOfOrder {
            operation,
            stage: self.frost.stage().as_str(),
        }
    }
}

impl AsRef<Participant> for WeightedParticipant {
    fn as_ref(&self) -> &Participant {
        &self.frost
    }
}

impl AsMut<Participant> for WeightedParticipant {
    fn as_mut(&mut self) -> &mut Participant {
        &mut self.frost
    }
}
