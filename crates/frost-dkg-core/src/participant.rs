//! A single key generation participant
//!
//! A [`Participant`] owns its secret polynomial and the public data it
//! accumulates from its peers. Calls must follow the round order
//!
//! 1. [`update_polynomial_commitments`] for every sender
//! 2. [`calculate_secret_proofs`] / [`verify_secret_proofs`]
//! 3. [`calculate_secret_shares`], then hand out [`get_secret_shares`]
//! 4. [`derive_power_map`] and [`verify_batch_public_secret_shares`]
//! 5. [`calculate_internal_public_signing_shares`]
//! 6. Q/W map derivation or import
//! 7. [`calculate_batch_public_signing_shares`]
//! 8. [`calculate_group_public_key`]
//!
//! Out-of-order calls fail with [`Error::OutOfOrder`] rather than operate on
//! partial state.
//!
//! [`update_polynomial_commitments`]: Participant::update_polynomial_commitments
//! [`calculate_secret_proofs`]: Participant::calculate_secret_proofs
//! [`verify_secret_proofs`]: Participant::verify_secret_proofs
//! [`calculate_secret_shares`]: Participant::calculate_secret_shares
//! [`get_secret_shares`]: Participant::get_secret_shares
//! [`derive_power_map`]: Participant::derive_power_map
//! [`verify_batch_public_secret_shares`]: Participant::verify_batch_public_secret_shares
//! [`calculate_internal_public_signing_shares`]: Participant::calculate_internal_public_signing_shares
//! [`calculate_batch_public_signing_shares`]: Participant::calculate_batch_public_signing_shares
//! [`calculate_group_public_key`]: Participant::calculate_group_public_key

use crate::maps::{QMap, QMapSnapshot, WMap, WMapSnapshot};
use crate::polynomial::{PolynomialCommitment, SecretPolynomial};
use crate::power_map::PowerMap;
use crate::proof::{self, SecretProof};
use crate::types::{ParticipantConfig, PositionTable};
use crate::vss::{self, ShareInbox};
use crate::{Error, Position, Result, SessionId};
use k256::{ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use rand_core::{CryptoRng, RngCore};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, instrument, warn};

/// Protocol progress; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Created,
    CommitmentsExchanged,
    SharesDistributed,
    SharesVerified,
    SigningShareComputed,
    PublicSharesComputed,
    GroupKeyDerived,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Created => "created",
            Stage::CommitmentsExchanged => "commitments-exchanged",
            Stage::SharesDistributed => "shares-distributed",
            Stage::SharesVerified => "shares-verified",
            Stage::SigningShareComputed => "signing-share-computed",
            Stage::PublicSharesComputed => "public-shares-computed",
            Stage::GroupKeyDerived => "group-key-derived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FROST key generation participant
pub struct Participant {
    config: ParticipantConfig,
    polynomial: SecretPolynomial,
    commitment: PolynomialCommitment,
    commitments: PositionTable<PolynomialCommitment>,
    secret_shares: PositionTable<Scalar>,
    signing_share: Option<Scalar>,
    public_signing_shares: PositionTable<ProjectivePoint>,
    power_map: PowerMap,
    q_map: Option<QMap>,
    w_map: Option<WMap>,
    group_public_key: Option<ProjectivePoint>,
    stage: Stage,
}

impl Participant {
    /// Create a participant at `position` out of `n`, sampling its polynomial
    /// from the OS RNG
    pub fn new(n: usize, threshold: usize, position: Position) -> Result<Self> {
        let config = ParticipantConfig::new(n, threshold, position)?;
        Self::from_rng(config, &mut OsRng)
    }

    pub fn from_rng<R: RngCore + CryptoRng>(
        config: ParticipantConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let config = ParticipantConfig::new(config.n, config.threshold, config.position)?;
        let polynomial = SecretPolynomial::random(config.threshold, rng);
        let commitment = polynomial.commit();
        let mut commitments = PositionTable::new(config.n);
        commitments.set(config.position, commitment.clone())?;

        Ok(Self {
            config,
            polynomial,
            commitment,
            commitments,
            secret_shares: PositionTable::new(config.n),
            signing_share: None,
            public_signing_shares: PositionTable::new(config.n),
            power_map: PowerMap::new(config.n, config.threshold),
            q_map: None,
            w_map: None,
            group_public_key: None,
            stage: Stage::Created,
        })
    }

    pub fn position(&self) -> Position {
        self.config.position
    }

    pub fn n(&self) -> usize {
        self.config.n
    }

    pub fn threshold(&self) -> usize {
        self.config.threshold
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// This participant's own Feldman commitment
    pub fn commitment(&self) -> &PolynomialCommitment {
        &self.commitment
    }

    pub fn commitments(&self) -> &PositionTable<PolynomialCommitment> {
        &self.commitments
    }

    /// Register `sender`'s commitment vector.
    ///
    /// Re-registering an identical vector is a no-op; a different vector for
    /// a known sender is a protocol violation.
    pub fn update_polynomial_commitments(
        &mut self,
        sender: Position,
        commitment: PolynomialCommitment,
    ) -> Result<()> {
        self.require_before(Stage::SharesVerified, "update_polynomial_commitments")?;
        if commitment.len() != self.config.threshold {
            return Err(Error::InvalidCommitmentLength {
                sender,
                expected: self.config.threshold,
                actual: commitment.len(),
            });
        }

        self.commitments
            .insert_once(sender, commitment, |sender| Error::ConflictingCommitment { sender })?;
        self.advance(Stage::CommitmentsExchanged);
        Ok(())
    }

    /// Prove knowledge of the constant term under `context`
    pub fn calculate_secret_proofs(&self, context: &SessionId) -> SecretProof {
        self.calculate_secret_proofs_with_rng(context, &mut OsRng)
    }

    pub fn calculate_secret_proofs_with_rng<R: RngCore + CryptoRng>(
        &self,
        context: &SessionId,
        rng: &mut R,
    ) -> SecretProof {
        let constant = *self
            .commitment
            .constant_term()
            .unwrap_or(&ProjectivePoint::IDENTITY);
        proof::prove(
            context,
            self.config.position,
            &self.polynomial.constant_term(),
            &constant,
            rng,
        )
    }

    /// Verify `peer`'s proof against the constant commitment it claims.
    ///
    /// If a commitment from `peer` is already registered, the claimed
    /// constant must match it as well.
    pub fn verify_secret_proofs(
        &self,
        context: &SessionId,
        proof: &SecretProof,
        peer: Position,
        peer_constant_commitment: &ProjectivePoint,
    ) -> Result<()> {
        if let Some(registered) = self.commitments.get(peer) {
            if registered.constant_term() != Some(peer_constant_commitment) {
                return Err(Error::InvalidProofOfKnowledge { culprit: peer });
            }
        }
        proof::verify(context, proof, peer, peer_constant_commitment)
    }

    /// Evaluate the secret polynomial at every position `1..=n`, self included
    #[instrument(skip(self), fields(position = self.config.position))]
    pub fn calculate_secret_shares(&mut self) -> Result<()> {
        self.require_before(Stage::SharesVerified, "calculate_secret_shares")?;
        for peer in 1..=self.config.n {
            self.secret_shares.set(peer, self.polynomial.evaluate(peer))?;
        }
        debug!(shares = self.config.n, "Secret shares calculated");
        self.advance(Stage::SharesDistributed);
        Ok(())
    }

    /// Share destined for `peer`
    pub fn get_secret_shares(&self, peer: Position) -> Result<Scalar> {
        if peer == 0 || peer > self.config.n {
            return Err(Error::InvalidPosition {
                position: peer,
                max: self.config.n,
            });
        }
        self.secret_shares
            .get(peer)
            .copied()
            .ok_or(Error::OutOfOrder {
                operation: "get_secret_shares",
                stage: self.stage.as_str(),
            })
    }

    /// Precompute own position's powers for batch verification
    pub fn derive_power_map(&mut self) -> Result<()> {
        self.power_map.derive(self.config.position)
    }

    /// Precompute powers for extra evaluation indices, e.g. owned key slots
    pub fn derive_power_map_for<I>(&mut self, indices: I) -> Result<()>
    where
        I: IntoIterator<Item = Position>,
    {
        indices
            .into_iter()
            .try_for_each(|index| self.power_map.derive(index))
    }

    pub fn power_map(&self) -> &PowerMap {
        &self.power_map
    }

    /// Check every share in `inbox`, evaluated at `index`, against its
    /// sender's commitment in one combined equation.
    ///
    /// Every sender with a registered commitment must have a share in
    /// `inbox`; absent senders fail with [`Error::MissingShares`].
    #[instrument(skip(self, inbox), fields(position = self.config.position))]
    pub fn verify_batch_public_secret_shares(
        &mut self,
        inbox: &ShareInbox,
        index: Position,
    ) -> Result<()> {
        self.require_at_least(Stage::CommitmentsExchanged, "verify_batch_public_secret_shares")?;
        if index == 0 || index > self.config.n {
            return Err(Error::InvalidPosition {
                position: index,
                max: self.config.n,
            });
        }

        {
            let powers = self.power_map.powers(index);
            vss::verify_batch(inbox, &self.commitments, index, &powers)?;
        }
        self.advance(Stage::SharesVerified);
        Ok(())
    }

    /// Derive the public signing share for `index` from its secret signing
    /// share, i.e. `signing_share * G`.
    ///
    /// When `index` is this participant's own position the signing share is
    /// kept as its long-term key share.
    pub fn calculate_internal_public_signing_shares(
        &mut self,
        signing_share: Scalar,
        index: Position,
    ) -> Result<ProjectivePoint> {
        self.require_at_least(Stage::SharesVerified, "calculate_internal_public_signing_shares")?;

        let public_share = ProjectivePoint::GENERATOR * signing_share;
        self.public_signing_shares
            .insert_once(index, public_share, |index| Error::PublicShareMismatch { index })?;
        if index == self.config.position {
            self.signing_share = Some(signing_share);
        }
        self.advance(Stage::SigningShareComputed);
        Ok(public_share)
    }

    /// Build the Q map from the complete commitment table
    pub fn derive_external_q_map(&mut self) -> Result<()> {
        self.require_at_least(Stage::SharesVerified, "derive_external_q_map")?;
        self.q_map = Some(QMap::derive(&self.commitments, self.config.threshold)?);
        Ok(())
    }

    /// Build the W map for every index `1..=n`
    pub fn derive_external_w_map(&mut self) -> Result<()> {
        self.require_at_least(Stage::SharesVerified, "derive_external_w_map")?;
        self.w_map = Some(WMap::derive(&self.commitments, self.config.threshold)?);
        Ok(())
    }

    pub fn copy_q_map(&self) -> Result<QMapSnapshot> {
        self.q_map
            .as_ref()
            .map(QMap::snapshot)
            .ok_or_else(|| self.out_of_order("copy_q_map"))
    }

    pub fn copy_w_map(&self) -> Result<WMapSnapshot> {
        self.w_map
            .as_ref()
            .map(WMap::snapshot)
            .ok_or_else(|| self.out_of_order("copy_w_map"))
    }

    /// Import a Q map derived by another participant
    pub fn parse_q_map(&mut self, snapshot: &QMapSnapshot) -> Result<()> {
        self.require_at_least(Stage::SharesVerified, "parse_q_map")?;
        self.q_map = Some(QMap::from_snapshot(snapshot, self.config.threshold)?);
        Ok(())
    }

    /// Import a W map derived by another participant
    pub fn parse_w_map(&mut self, snapshot: &WMapSnapshot) -> Result<()> {
        self.require_at_least(Stage::SharesVerified, "parse_w_map")?;
        self.w_map = Some(WMap::from_snapshot(
            snapshot,
            self.config.n,
            self.config.threshold,
        )?);
        Ok(())
    }

    pub fn q_map(&self) -> Option<&QMap> {
        self.q_map.as_ref()
    }

    pub fn w_map(&self) -> Option<&WMap> {
        self.w_map.as_ref()
    }

    /// Compute the public signing share of every index not in `exclude`
    /// from the Q/W maps.
    ///
    /// Indices already derived internally are checked for equality instead
    /// of overwritten. Excluded indices are skipped only when nothing is
    /// stored for them yet; an internal share stored for an excluded index
    /// must still match its map evaluation.
    #[instrument(skip(self, exclude), fields(position = self.config.position))]
    pub fn calculate_batch_public_signing_shares(
        &mut self,
        exclude: &BTreeSet<Position>,
    ) -> Result<()> {
        self.require_at_least(Stage::SharesVerified, "calculate_batch_public_signing_shares")?;
        let (q_map, w_map) = match (&self.q_map, &self.w_map) {
            (Some(q), Some(w)) => (q, w),
            _ => return Err(self.out_of_order("calculate_batch_public_signing_shares")),
        };

        let mut derived = 0usize;
        let mut checked = 0usize;
        for index in 1..=self.config.n {
            let excluded = exclude.contains(&index);
            if excluded && !self.public_signing_shares.contains(index) {
                continue;
            }
            let row = w_map.row(index).ok_or(Error::InvalidPosition {
                position: index,
                max: w_map.n(),
            })?;
            let public_share = q_map.evaluate(row);
            if excluded {
                if self.public_signing_shares.get(index) != Some(&public_share) {
                    warn!(index, "Internal public signing share disagrees with the maps");
                    return Err(Error::PublicShareMismatch { index });
                }
                checked += 1;
                continue;
            }
            self.public_signing_shares
                .insert_once(index, public_share, |index| Error::PublicShareMismatch { index })?;
            derived += 1;
        }

        debug!(derived, checked, "Public signing shares calculated");
        self.advance(Stage::PublicSharesComputed);
        Ok(())
    }

    pub fn get_public_signing_shares(&self, index: Position) -> Option<ProjectivePoint> {
        self.public_signing_shares.get(index).copied()
    }

    pub fn public_signing_shares(&self) -> &PositionTable<ProjectivePoint> {
        &self.public_signing_shares
    }

    /// This participant's final key share, once derived
    pub fn signing_share(&self) -> Option<Scalar> {
        self.signing_share
    }

    /// Sum of every registered constant-term commitment.
    ///
    /// The key is set once; later calls recompute and compare. If a Q map is
    /// present its constant term must agree.
    pub fn calculate_group_public_key(&mut self) -> Result<ProjectivePoint> {
        self.require_at_least(Stage::SharesVerified, "calculate_group_public_key")?;

        let key = self
            .commitments
            .iter()
            .try_fold(ProjectivePoint::IDENTITY, |acc, (sender, commitment)| {
                commitment
                    .constant_term()
                    .map(|point| acc + point)
                    .ok_or(Error::InvalidCommitmentLength {
                        sender,
                        expected: self.config.threshold,
                        actual: 0,
                    })
            })?;

        if let Some(q_map) = &self.q_map {
            if q_map.group_public_key() != key {
                return Err(Error::MapMismatch {
                    node: self.config.position,
                });
            }
        }
        if let Some(existing) = self.group_public_key {
            if existing != key {
                return Err(Error::Internal("Group public key changed".into()));
            }
        }

        self.group_public_key = Some(key);
        self.advance(Stage::GroupKeyDerived);
        Ok(key)
    }

    pub fn group_public_key(&self) -> Option<ProjectivePoint> {
        self.group_public_key
    }

    fn advance(&mut self, stage: Stage) {
        self.stage = self.stage.max(stage);
    }

    fn require_before(&self, stage: Stage, operation: &'static str) -> Result<()> {
        if self.stage < stage {
            Ok(())
        } else {
            Err(self.out_of_order(operation))
        }
    }

    fn require_at_least(&self, stage: Stage, operation: &'static str) -> Result<()> {
        if self.stage >= stage {
            Ok(())
        } else {
            Err(self.out_of_order(operation))
        }
    }

    fn out_of_order(&self, operation: &'static str) -> Error {
        Error::OutOfOrder {
            operation,
            stage: self.stage.as_str(),
        }
    }
}

impl AsRef<Participant> for Participant {
    fn as_ref(&self) -> &Participant {
        self
    }
}

impl AsMut<Participant> for Participant {
    fn as_mut(&mut self) -> &mut Participant {
        self
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("position", &self.config.position)
            .field("n", &self.config.n)
            .field("threshold", &self.config.threshold)
            .field("stage", &self.stage)
            .field("commitments", &self.commitments.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polynomial::interpolate_secret;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    const CONTEXT: SessionId = [0u8; 32];

    fn participants(n: usize, t: usize) -> Vec<Participant> {
        let mut rng = ChaCha20Rng::seed_from_u64(41);
        let mut participants: Vec<_> = (1..=n)
            .map(|p| {
                let config = ParticipantConfig::new(n, t, p).unwrap();
                Participant::from_rng(config, &mut rng).unwrap()
            })
            .collect();

        let commitments: Vec<_> = participants.iter().map(|p| p.commitment().clone()).collect();
        for participant in participants.iter_mut() {
            for (i, commitment) in commitments.iter().enumerate() {
                participant
                    .update_polynomial_commitments(i + 1, commitment.clone())
                    .unwrap();
            }
        }
        participants
    }

    fn inboxes(participants: &mut [Participant]) -> Vec<ShareInbox> {
        for participant in participants.iter_mut() {
            participant.calculate_secret_shares().unwrap();
        }
        let n = participants.len();
        (1..=n)
            .map(|receiver| {
                let mut inbox = ShareInbox::new(n);
                for sender in participants.iter() {
                    inbox
                        .set(sender.position(), sender.get_secret_shares(receiver).unwrap())
                        .unwrap();
                }
                inbox
            })
            .collect()
    }

    #[test]
    fn test_commitment_registration() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let config = ParticipantConfig::new(3, 2, 1).unwrap();
        let mut p1 = Participant::from_rng(config, &mut rng).unwrap();
        let p2 = Participant::from_rng(ParticipantConfig::new(3, 2, 2).unwrap(), &mut rng).unwrap();
        assert_eq!(p1.stage(), Stage::Created);

        p1.update_polynomial_commitments(2, p2.commitment().clone()).unwrap();
        p1.update_polynomial_commitments(2, p2.commitment().clone()).unwrap();
        assert_eq!(p1.stage(), Stage::CommitmentsExchanged);
        assert_eq!(p1.commitments().len(), 2);

        let other =
            Participant::from_rng(ParticipantConfig::new(3, 2, 2).unwrap(), &mut rng).unwrap();
        assert_eq!(
            p1.update_polynomial_commitments(2, other.commitment().clone()),
            Err(Error::ConflictingCommitment { sender: 2 })
        );

        let short = PolynomialCommitment::new(vec![ProjectivePoint::GENERATOR]);
        assert!(matches!(
            p1.update_polynomial_commitments(3, short),
            Err(Error::InvalidCommitmentLength { sender: 3, .. })
        ));
        assert!(p1
            .update_polynomial_commitments(4, other.commitment().clone())
            .is_err());
    }

    #[test]
    fn test_proofs() {
        let ps = participants(3, 2);
        let proof = ps[1].calculate_secret_proofs(&CONTEXT);
        let constant = *ps[1].commitment().constant_term().unwrap();

        assert!(ps[0].verify_secret_proofs(&CONTEXT, &proof, 2, &constant).is_ok());

        // a constant that disagrees with the registered commitment
        let forged = constant + ProjectivePoint::GENERATOR;
        assert_eq!(
            ps[0].verify_secret_proofs(&CONTEXT, &proof, 2, &forged),
            Err(Error::InvalidProofOfKnowledge { culprit: 2 })
        );
    }

    #[test]
    fn test_full_round_trip() {
        let mut ps = participants(4, 3);
        let inboxes = inboxes(&mut ps);

        for (p, inbox) in ps.iter_mut().zip(inboxes.iter()) {
            p.derive_power_map().unwrap();
            let position = p.position();
            p.verify_batch_public_secret_shares(inbox, position).unwrap();
            p.calculate_internal_public_signing_shares(vss::sum_shares(inbox), position)
                .unwrap();
        }

        ps[0].derive_external_q_map().unwrap();
        ps[0].derive_external_w_map().unwrap();
        let q = ps[0].copy_q_map().unwrap();
        let w = ps[0].copy_w_map().unwrap();
        for p in ps.iter_mut().skip(1) {
            p.parse_q_map(&q).unwrap();
            p.parse_w_map(&w).unwrap();
        }

        for p in ps.iter_mut() {
            let exclude = BTreeSet::from([p.position()]);
            p.calculate_batch_public_signing_shares(&exclude).unwrap();
            assert_eq!(p.stage(), Stage::PublicSharesComputed);
        }

        let keys: Vec<_> = ps
            .iter_mut()
            .map(|p| p.calculate_group_public_key().unwrap())
            .collect();
        assert!(keys.windows(2).all(|pair| pair[0] == pair[1]));

        for i in 1..=4 {
            let expected = ps[i - 1].get_public_signing_shares(i).unwrap();
            for p in &ps {
                assert_eq!(p.get_public_signing_shares(i), Some(expected));
            }
        }

        let shares: Vec<_> = ps[1..]
            .iter()
            .map(|p| (p.position(), p.signing_share().unwrap()))
            .collect();
        let secret = interpolate_secret(&shares).unwrap();
        assert_eq!(ProjectivePoint::GENERATOR * secret, keys[0]);
    }

    #[test]
    fn test_out_of_order_calls_rejected() {
        let mut ps = participants(3, 2);
        let p = &mut ps[0];

        assert!(matches!(
            p.get_secret_shares(2),
            Err(Error::OutOfOrder { .. })
        ));
        assert!(matches!(
            p.calculate_internal_public_signing_shares(Scalar::ONE, 1),
            Err(Error::OutOfOrder { .. })
        ));
        assert!(matches!(
            p.derive_external_q_map(),
            Err(Error::OutOfOrder { .. })
        ));
        assert!(matches!(p.copy_w_map(), Err(Error::OutOfOrder { .. })));
        assert!(matches!(
            p.calculate_group_public_key(),
            Err(Error::OutOfOrder { .. })
        ));
        assert_eq!(
            p.get_secret_shares(9),
            Err(Error::InvalidPosition { position: 9, max: 3 })
        );
    }

    #[test]
    fn test_commitments_frozen_after_verification() {
        let mut ps = participants(3, 2);
        let inboxes = inboxes(&mut ps);
        ps[0].verify_batch_public_secret_shares(&inboxes[0], 1).unwrap();

        let commitment = ps[1].commitment().clone();
        assert!(matches!(
            ps[0].update_polynomial_commitments(2, commitment),
            Err(Error::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_batch_public_shares_need_maps() {
        let mut ps = participants(3, 2);
        let inboxes = inboxes(&mut ps);
        ps[0].verify_batch_public_secret_shares(&inboxes[0], 1).unwrap();
        ps[0].derive_external_q_map().unwrap();

        assert!(matches!(
            ps[0].calculate_batch_public_signing_shares(&BTreeSet::new()),
            Err(Error::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_wrong_internal_share_detected() {
        let mut ps = participants(3, 2);
        let inboxes = inboxes(&mut ps);
        let p = &mut ps[0];
        p.verify_batch_public_secret_shares(&inboxes[0], 1).unwrap();
        // an incorrect signing share for own index
        p.calculate_internal_public_signing_shares(vss::sum_shares(&inboxes[0]) + Scalar::ONE, 1)
            .unwrap();
        p.derive_external_q_map().unwrap();
        p.derive_external_w_map().unwrap();

        assert_eq!(
            p.calculate_batch_public_signing_shares(&BTreeSet::new()),
            Err(Error::PublicShareMismatch { index: 1 })
        );
    }

    #[test]
    fn test_verification_needs_every_share() {
        let mut rng = ChaCha20Rng::seed_from_u64(43);
        let config = ParticipantConfig::new(3, 2, 1).unwrap();
        let mut fresh = Participant::from_rng(config, &mut rng).unwrap();
        assert!(matches!(
            fresh.verify_batch_public_secret_shares(&ShareInbox::new(3), 1),
            Err(Error::OutOfOrder { .. })
        ));
        assert_eq!(fresh.stage(), Stage::Created);

        let mut ps = participants(3, 2);
        let inboxes = inboxes(&mut ps);
        let p = &mut ps[0];
        assert_eq!(
            p.verify_batch_public_secret_shares(&ShareInbox::new(3), 1),
            Err(Error::MissingShares {
                index: 1,
                senders: vec![1, 2, 3]
            })
        );

        let mut partial = ShareInbox::new(3);
        partial.set(2, *inboxes[0].get(2).unwrap()).unwrap();
        assert_eq!(
            p.verify_batch_public_secret_shares(&partial, 1),
            Err(Error::MissingShares {
                index: 1,
                senders: vec![1, 3]
            })
        );
        assert_eq!(p.stage(), Stage::SharesDistributed);
    }

    #[test]
    fn test_excluded_own_share_checked_against_maps() {
        let mut ps = participants(3, 2);
        let inboxes = inboxes(&mut ps);
        let p = &mut ps[0];
        p.verify_batch_public_secret_shares(&inboxes[0], 1).unwrap();
        p.calculate_internal_public_signing_shares(vss::sum_shares(&inboxes[0]) + Scalar::ONE, 1)
            .unwrap();
        p.derive_external_q_map().unwrap();
        p.derive_external_w_map().unwrap();

        assert_eq!(
            p.calculate_batch_public_signing_shares(&BTreeSet::from([1])),
            Err(Error::PublicShareMismatch { index: 1 })
        );

        // excluded indices with nothing stored are left alone
        let q = ps[0].copy_q_map().unwrap();
        let w = ps[0].copy_w_map().unwrap();
        let p = &mut ps[1];
        p.verify_batch_public_secret_shares(&inboxes[1], 2).unwrap();
        p.calculate_internal_public_signing_shares(vss::sum_shares(&inboxes[1]), 2)
            .unwrap();
        p.parse_q_map(&q).unwrap();
        p.parse_w_map(&w).unwrap();
        p.calculate_batch_public_signing_shares(&BTreeSet::from([2, 3]))
            .unwrap();
        assert!(p.get_public_signing_shares(1).is_some());
        assert!(p.get_public_signing_shares(3).is_none());
    }
}
