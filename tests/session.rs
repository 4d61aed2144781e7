//! Whole-session tests against the in-process card double.

mod common;

use {
    common::{build_com, build_dg1, build_dg11, build_sod, MockCard, MRZ_KEY, TD3_MRZ},
    emrtd_reader::{
        read_document_with_rng, AuthStatus, DataGroupContent, DataGroupId, DisplayMessage, Error,
        ReadConfig,
    },
    rand::SeedableRng,
    std::{
        collections::BTreeSet,
        sync::{Arc, Mutex},
    },
};

fn rng() -> rand::rngs::StdRng {
    rand::rngs::StdRng::seed_from_u64(42)
}

fn standard_card() -> MockCard {
    let dg1 = build_dg1(TD3_MRZ);
    let dg11 = build_dg11("ERIKSSON<<ANNA<MARIA");
    let sod = build_sod(&[(1, dg1.clone()), (11, dg11.clone())]);
    MockCard::new(MRZ_KEY)
        .with_file(DataGroupId::Com, build_com(&[DataGroupId::Dg1, DataGroupId::Dg11]))
        .with_file(DataGroupId::Sod, sod)
        .with_file(DataGroupId::Dg1, dg1)
        .with_file(DataGroupId::Dg11, dg11)
}

#[test]
fn test_full_read_over_bac() {
    let card = standard_card();
    let result =
        read_document_with_rng(Box::new(card), ReadConfig::new(MRZ_KEY), &mut rng()).unwrap();

    // No EF.CardAccess on this document: BAC, not PACE.
    assert_eq!(result.bac_status, AuthStatus::Success);
    assert_eq!(result.pace_status, AuthStatus::NotDone);
    assert_eq!(result.chip_authentication_status, AuthStatus::NotDone);
    assert_eq!(result.active_authentication_status, AuthStatus::NotDone);

    // COM, SOD and both announced data groups were read and decoded.
    assert_eq!(result.data_groups.len(), 4);
    let dg1 = result.data_group(DataGroupId::Dg1).unwrap();
    match &dg1.content {
        DataGroupContent::Mrz(dg1) => {
            assert_eq!(dg1.fields.document_number, "L898902C3");
            assert_eq!(dg1.fields.nationality, "UTO");
        }
        other => panic!("expected MRZ content, got {other:?}"),
    }
    match &result.data_group(DataGroupId::Dg11).unwrap().content {
        DataGroupContent::AdditionalPersonalDetails(dg11) => {
            assert_eq!(dg11.full_name.as_deref(), Some("ERIKSSON<<ANNA<MARIA"));
        }
        other => panic!("expected DG11 content, got {other:?}"),
    }

    // The hash table matches, but the SOD carries no signer, so
    // passive authentication as a whole must be Failed while every
    // hash check passed.
    assert_eq!(result.passive_authentication_status, AuthStatus::Failed);
    assert!(result
        .verification_errors
        .iter()
        .all(|e| !e.contains("hash mismatch")));
}

#[test]
fn test_access_denied_group_is_dropped_not_retried() {
    let mut card = standard_card();
    card.files
        .insert(DataGroupId::Dg3.short_id(), vec![0x63, 0x01, 0x00]);
    card.deny.insert(DataGroupId::Dg3.short_id());

    let mut config = ReadConfig::new(MRZ_KEY);
    config.skip_secure_elements = false;
    config.data_groups = BTreeSet::from([DataGroupId::Dg1, DataGroupId::Dg3]);

    let result = read_document_with_rng(Box::new(card), config, &mut rng()).unwrap();

    // DG3 is gone, DG1 survived, and the session recovered through a
    // second BAC run.
    assert!(result.data_group(DataGroupId::Dg3).is_none());
    assert!(result.data_group(DataGroupId::Dg1).is_some());
    assert_eq!(result.bac_status, AuthStatus::Success);
    assert!(result
        .verification_errors
        .iter()
        .any(|e| e.contains("EF.DG3")));
}

#[test]
fn test_sod_hash_mismatch_still_returns_document() {
    let dg1 = build_dg1(TD3_MRZ);
    let mut tampered = dg1.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;

    let sod = build_sod(&[(1, tampered)]);
    let card = MockCard::new(MRZ_KEY)
        .with_file(DataGroupId::Com, build_com(&[DataGroupId::Dg1]))
        .with_file(DataGroupId::Sod, sod)
        .with_file(DataGroupId::Dg1, dg1);

    let result =
        read_document_with_rng(Box::new(card), ReadConfig::new(MRZ_KEY), &mut rng()).unwrap();
    assert_eq!(result.passive_authentication_status, AuthStatus::Failed);
    assert!(result.data_group(DataGroupId::Dg1).is_some());
    assert!(result
        .verification_errors
        .iter()
        .any(|e| e.contains("hash mismatch")));
}

#[test]
fn test_chip_authentication_failure_recovers_via_bac() {
    // DG14 is present but carries no usable chip authentication key;
    // the session must mark CA failed, re-run BAC and keep reading.
    let dg14 = hex_literal::hex!("6E0D310B30090604 2A030405 020101").to_vec();
    let dg1 = build_dg1(TD3_MRZ);
    let sod = build_sod(&[(1, dg1.clone()), (14, dg14.clone())]);
    let card = MockCard::new(MRZ_KEY)
        .with_file(
            DataGroupId::Com,
            build_com(&[DataGroupId::Dg1, DataGroupId::Dg14]),
        )
        .with_file(DataGroupId::Sod, sod)
        .with_file(DataGroupId::Dg1, dg1)
        .with_file(DataGroupId::Dg14, dg14);

    let result =
        read_document_with_rng(Box::new(card), ReadConfig::new(MRZ_KEY), &mut rng()).unwrap();

    assert_eq!(result.chip_authentication_status, AuthStatus::Failed);
    assert_eq!(result.bac_status, AuthStatus::Success);
    assert!(result.data_group(DataGroupId::Dg1).is_some());
    assert!(result.data_group(DataGroupId::Dg14).is_some());
    // Both hash checks pass even though CA could not run.
    assert!(result
        .verification_errors
        .iter()
        .all(|e| !e.contains("hash mismatch")));
}

#[test]
fn test_tag_lost_maps_to_connection_error() {
    let mut card = standard_card();
    // Enough exchanges for BAC, then the holder pulls the document.
    card.fail_after = Some(6);

    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let mut config = ReadConfig::new(MRZ_KEY);
    config.on_display_message = Some(Box::new(move |msg: &DisplayMessage| {
        sink.lock().unwrap().push(msg.clone());
        None
    }));

    let err = read_document_with_rng(Box::new(card), config, &mut rng()).unwrap_err();
    assert!(matches!(err, Error::ConnectionError));

    let messages = messages.lock().unwrap();
    assert!(messages
        .iter()
        .any(|m| matches!(m, DisplayMessage::Error(text)
            if text == "Connection error. Please try again.")));
}

#[test]
fn test_cancellation_before_read() {
    let card = standard_card();
    let config = ReadConfig::new(MRZ_KEY);
    config.cancel.cancel();

    let err = read_document_with_rng(Box::new(card), config, &mut rng()).unwrap_err();
    assert!(matches!(err, Error::UserCanceled));
}

#[test]
fn test_wrong_mrz_key_aborts_with_invalid_key() {
    let card = standard_card();
    let config = ReadConfig::new("L898902C<369080619406235");
    let err = read_document_with_rng(Box::new(card), config, &mut rng()).unwrap_err();
    assert!(matches!(err, Error::InvalidMrzKey));
}

#[test]
fn test_progress_reaches_hundred_per_file() {
    let card = standard_card();
    let max_pct = Arc::new(Mutex::new(0u8));
    let sink = max_pct.clone();

    let mut config = ReadConfig::new(MRZ_KEY);
    config.on_display_message = Some(Box::new(move |msg: &DisplayMessage| {
        if let DisplayMessage::ReadingDataGroup(DataGroupId::Dg1, pct) = msg {
            let mut max = sink.lock().unwrap();
            *max = (*max).max(*pct);
        }
        None
    }));

    read_document_with_rng(Box::new(card), config, &mut rng()).unwrap();
    assert_eq!(*max_pct.lock().unwrap(), 100);
}
