//! End-to-end weighted key generation scenarios

use frost_dkg_core::{
    interpolate_secret, partition_keys, Error, MapMode, Participant, ParticipantConfig,
    SessionConfig, ShareInbox, WstsSession,
};
use k256::ProjectivePoint;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;
use std::collections::BTreeSet;

fn run_session(config: SessionConfig, partition: Vec<BTreeSet<usize>>, seed: u64) -> WstsSession {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut session = WstsSession::with_partition(config, partition, &mut rng).unwrap();
    session.run().unwrap();
    session
}

#[test]
fn test_group_key_matches_plain_participants() {
    let (n_parties, n_keys, t) = (3, 7, 4);
    let config = SessionConfig::wsts(n_parties, n_keys, t).unwrap();
    let session = run_session(config, partition_keys(n_parties, n_keys).unwrap(), 20);
    let weighted_key = session.parties()[0].frost().group_public_key().unwrap();

    // the same polynomials driven through unweighted participants
    let mut rng = ChaCha20Rng::seed_from_u64(20);
    let mut plain: Vec<_> = (1..=n_parties)
        .map(|position| {
            let config = ParticipantConfig::new(n_keys, t, position).unwrap();
            Participant::from_rng(config, &mut rng).unwrap()
        })
        .collect();
    let commitments: Vec<_> = plain.iter().map(|p| p.commitment().clone()).collect();
    for participant in plain.iter_mut() {
        for (idx, commitment) in commitments.iter().enumerate() {
            participant
                .update_polynomial_commitments(idx + 1, commitment.clone())
                .unwrap();
        }
        participant.calculate_secret_shares().unwrap();
    }

    let inboxes: Vec<_> = (1..=n_parties)
        .map(|receiver| {
            let mut inbox = ShareInbox::new(n_parties);
            for sender in &plain {
                inbox
                    .set(sender.position(), sender.get_secret_shares(receiver).unwrap())
                    .unwrap();
            }
            inbox
        })
        .collect();
    for (participant, inbox) in plain.iter_mut().zip(&inboxes) {
        let position = participant.position();
        participant.derive_power_map().unwrap();
        participant
            .verify_batch_public_secret_shares(inbox, position)
            .unwrap();
        assert_eq!(participant.calculate_group_public_key().unwrap(), weighted_key);
    }
}

#[test]
fn test_threshold_slots_reconstruct_group_key() {
    let config = SessionConfig::wsts(4, 10, 6).unwrap();
    let session = run_session(config, partition_keys(4, 10).unwrap(), 21);
    let group_key = session.parties()[0].frost().group_public_key().unwrap();

    for slots in [[1, 2, 3, 4, 5, 6], [2, 4, 6, 8, 9, 10], [1, 3, 5, 7, 9, 10]] {
        let shares: Vec<_> = slots
            .iter()
            .map(|&key| (key, session.signing_share(key).unwrap()))
            .collect();
        let secret = interpolate_secret(&shares).unwrap();
        assert_eq!(ProjectivePoint::GENERATOR * secret, group_key);
    }
}

#[test]
fn test_custom_partition_public_shares() {
    let partition = vec![
        BTreeSet::from([1, 5]),
        BTreeSet::from([2, 3, 4]),
        BTreeSet::from([6]),
    ];
    let config = SessionConfig::wsts(3, 6, 3)
        .unwrap()
        .with_map_mode(MapMode::Recompute);
    let session = run_session(config, partition, 22);

    for key in 1..=6 {
        let expected = ProjectivePoint::GENERATOR * session.signing_share(key).unwrap();
        for party in session.parties() {
            assert_eq!(party.frost().get_public_signing_shares(key), Some(expected));
        }
    }
    assert_eq!(session.party(2).unwrap().signing_shares().len(), 3);
}

#[test]
fn test_single_party_owns_everything() {
    let config = SessionConfig::wsts(1, 4, 3).unwrap();
    let session = run_session(config, partition_keys(1, 4).unwrap(), 23);

    let party = session.party(1).unwrap();
    assert_eq!(party.keys().len(), 4);
    let shares: Vec<_> = [1, 2, 4]
        .iter()
        .map(|&key| (key, party.signing_share(key).unwrap()))
        .collect();
    let secret = interpolate_secret(&shares).unwrap();
    assert_eq!(
        ProjectivePoint::GENERATOR * secret,
        party.frost().group_public_key().unwrap()
    );
}

#[test]
fn test_invalid_partitions_rejected() {
    let mut rng = ChaCha20Rng::seed_from_u64(24);
    let config = SessionConfig::wsts(2, 4, 2).unwrap();

    let overlapping = vec![BTreeSet::from([1, 2, 3]), BTreeSet::from([3, 4])];
    assert_eq!(
        WstsSession::with_partition(config.clone(), overlapping, &mut rng).err(),
        Some(Error::DuplicateKey(3))
    );

    let incomplete = vec![BTreeSet::from([1]), BTreeSet::from([2, 3])];
    assert!(matches!(
        WstsSession::with_partition(config, incomplete, &mut rng),
        Err(Error::InvalidConfig(_))
    ));

    assert!(matches!(
        SessionConfig::wsts(5, 4, 2),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_slot_with_missing_sender_aborts() {
    let mut rng = ChaCha20Rng::seed_from_u64(25);
    let config = SessionConfig::wsts(3, 5, 3).unwrap();
    let mut session =
        WstsSession::with_partition(config, partition_keys(3, 5).unwrap(), &mut rng).unwrap();
    session.exchange_commitments().unwrap();
    session.exchange_proofs().unwrap();
    session.calculate_secret_shares().unwrap();
    session.distribute_shares().unwrap();

    // party 2 owns slots 3 and 4; sender 3 is dropped from slot 4
    let party = session.party_mut(2).unwrap();
    let delivered = party.get_secret_shares_map(4).unwrap().clone();
    let mut partial = ShareInbox::new(3);
    for sender in [1, 2] {
        partial.set(sender, *delivered.get(sender).unwrap()).unwrap();
    }
    party.store_secret_shares(4, partial).unwrap();

    assert_eq!(
        session.verify_shares(),
        Err(Error::MissingShares {
            index: 4,
            senders: vec![3]
        })
    );
}
