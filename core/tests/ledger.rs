//! UTXO ledger behaviour: batch atomicity, fees and income rules

use halflife_core::{
    Input, InputInfo, LedgerError, Output, ProtocolSettings, Transaction, UtxosLedger,
};
use halflife_crypto::KeyPair;
use std::sync::Arc;

const MINIMAL_FEE: u64 = 1;

fn settings() -> Arc<ProtocolSettings> {
    Arc::new(ProtocolSettings {
        minimal_transaction_fee: MINIMAL_FEE,
        ..Default::default()
    })
}

/// Ledger holding one non-yielding UTXO of `value` owned by `owner`
fn funded_ledger(owner: &KeyPair, value: u64) -> (UtxosLedger, Transaction) {
    let ledger = UtxosLedger::new(settings());
    let funding = Transaction::reward(owner.address(), false, 0, value).unwrap();
    ledger.update_utxos(&[funding.clone()], 0).unwrap();
    (ledger, funding)
}

fn spend(owner: &KeyPair, info: InputInfo, outputs: Vec<Output>, timestamp: i64) -> Transaction {
    let input = Input::sign(owner, info).unwrap();
    Transaction::new(vec![input], outputs, timestamp).unwrap()
}

#[test]
fn test_update_utxos_moves_value_between_addresses() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let transfer = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 99)],
        0,
    );

    ledger.update_utxos(&[transfer.clone()], 0).unwrap();

    assert!(ledger.utxos(&owner.address()).is_empty());
    let received = ledger.utxos("B");
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].input_info(), &InputInfo::new(0, transfer.id()));
    assert_eq!(received[0].output().initial_value(), 99);
}

#[test]
fn test_verify_utxos_never_mutates_the_ledger() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let before = ledger.copy();
    let transfer = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 99)],
        0,
    );

    ledger.verify_utxos(&[transfer], 0).unwrap();

    assert_eq!(ledger, before);
    assert_eq!(ledger.utxos(&owner.address()).len(), 1);
}

#[test]
fn test_duplicate_transaction_id_is_rejected_and_ledger_unchanged() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let before = ledger.copy();

    let error = ledger.update_utxos(&[funding.clone()], 1).unwrap_err();

    assert!(matches!(error, LedgerError::DuplicateTransaction(id) if id == funding.id()));
    assert_eq!(ledger, before);
}

#[test]
fn test_duplicate_inside_one_batch_is_rejected() {
    let ledger = UtxosLedger::new(settings());
    let reward = Transaction::reward("A", false, 0, 10).unwrap();

    let error = ledger
        .update_utxos(&[reward.clone(), reward], 0)
        .unwrap_err();

    assert!(matches!(error, LedgerError::DuplicateTransaction(_)));
    assert!(ledger.is_empty());
}

#[test]
fn test_unknown_input_fails_the_whole_batch() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let before = ledger.copy();
    let valid = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 99)],
        0,
    );
    let unknown = spend(
        &owner,
        InputInfo::new(0, "missing"),
        vec![Output::new("C", false, 1)],
        0,
    );

    let error = ledger.update_utxos(&[valid, unknown], 0).unwrap_err();

    assert!(matches!(error, LedgerError::UnknownTransaction(id) if id == "missing"));
    assert_eq!(ledger, before);
    assert!(ledger.utxos("B").is_empty());
}

#[test]
fn test_spent_output_cannot_be_spent_twice() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let first = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 50)],
        0,
    );
    let second = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("C", false, 50)],
        1,
    );
    ledger.update_utxos(&[first], 0).unwrap();

    let error = ledger.update_utxos(&[second], 1).unwrap_err();

    assert!(matches!(
        error,
        LedgerError::UnknownTransaction(_) | LedgerError::UnknownOutput { .. }
    ));
}

#[test]
fn test_two_yielding_utxos_for_one_address_are_rejected() {
    let ledger = UtxosLedger::new(settings());
    ledger
        .update_utxos(&[Transaction::reward("A", true, 0, 10).unwrap()], 0)
        .unwrap();
    let before = ledger.copy();

    let error = ledger
        .update_utxos(&[Transaction::reward("A", true, 1, 10).unwrap()], 1)
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "income requested for several UTXOs for address A"
    );
    assert_eq!(ledger, before);

    // a non-yielding output is fine
    ledger
        .update_utxos(&[Transaction::reward("A", false, 2, 10).unwrap()], 2)
        .unwrap();
    assert_eq!(ledger.utxos("A").len(), 2);
}

#[test]
fn test_utxos_of_unknown_address_is_empty() {
    let ledger = UtxosLedger::new(settings());

    assert!(ledger.utxos("nobody").is_empty());
}

#[test]
fn test_utxo_lookup_failures() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);

    assert!(ledger.utxo(&InputInfo::new(0, funding.id())).is_ok());
    assert!(matches!(
        ledger.utxo(&InputInfo::new(1, funding.id())),
        Err(LedgerError::UnknownOutput { output_index: 1, .. })
    ));
    assert!(matches!(
        ledger.utxo(&InputInfo::new(0, "missing")),
        Err(LedgerError::UnknownTransaction(_))
    ));
}

#[test]
fn test_calculate_fee_valid_transaction() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let transfer = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 99)],
        0,
    );

    assert_eq!(ledger.calculate_fee(&transfer, 0).unwrap(), 1);
}

#[test]
fn test_calculate_fee_uses_decayed_value() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 1_000_000);
    let half_life = ledger.settings().half_life_ns() as i64;
    let transfer = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 400_000)],
        half_life,
    );

    assert_eq!(ledger.calculate_fee(&transfer, half_life).unwrap(), 100_000);
}

#[test]
fn test_calculate_fee_unknown_transaction_id() {
    let owner = KeyPair::generate();
    let (ledger, _) = funded_ledger(&owner, 100);
    let transfer = spend(
        &owner,
        InputInfo::new(0, "missing"),
        vec![Output::new("B", false, 1)],
        0,
    );

    assert!(matches!(
        ledger.calculate_fee(&transfer, 0),
        Err(LedgerError::UnknownTransaction(_))
    ));
}

#[test]
fn test_calculate_fee_unknown_output_index() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let transfer = spend(
        &owner,
        InputInfo::new(3, funding.id()),
        vec![Output::new("B", false, 1)],
        0,
    );

    assert!(matches!(
        ledger.calculate_fee(&transfer, 0),
        Err(LedgerError::UnknownOutput { output_index: 3, .. })
    ));
}

#[test]
fn test_calculate_fee_wrong_owner() {
    let owner = KeyPair::generate();
    let thief = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let transfer = spend(
        &thief,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 1)],
        0,
    );

    assert!(matches!(
        ledger.calculate_fee(&transfer, 0),
        Err(LedgerError::AddressMismatch { .. })
    ));
}

#[test]
fn test_calculate_fee_negative() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let transfer = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 101)],
        0,
    );

    let error = ledger.calculate_fee(&transfer, 0).unwrap_err();

    assert_eq!(error.to_string(), "fee is negative");
}

#[test]
fn test_calculate_fee_too_low() {
    let owner = KeyPair::generate();
    let (ledger, funding) = funded_ledger(&owner, 100);
    let transfer = spend(
        &owner,
        InputInfo::new(0, funding.id()),
        vec![Output::new("B", false, 100)],
        0,
    );

    assert!(matches!(
        ledger.calculate_fee(&transfer, 0),
        Err(LedgerError::FeeTooLow { fee: 0, minimal: MINIMAL_FEE })
    ));
}
