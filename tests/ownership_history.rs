//! Ownership history assembly against a scripted chain.
//!
//! Run with: cargo test --test ownership_history

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use alloy::primitives::{address, Address, Bytes, U256};
use chain_lens::abi::IOwnable;
use chain_lens::contract::ContractInspector;
use chain_lens::error::LensError;
use chain_lens::events::EventKind;
use chain_lens::ownership::HistoryStatus;
use chain_lens::rpc::TransactionInfo;
use common::{address_topic, fast_retry, log, no_pacing, tx_hash, MockRpc};
use eyre::{Context, Result};

const CONTRACT: Address = address!("0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82");
const ALICE: Address = address!("1111111111111111111111111111111111111111");
const CAROL: Address = address!("3333333333333333333333333333333333333333");
const BOB: Address = address!("2222222222222222222222222222222222222222");
const DEPLOYER: Address = address!("dddddddddddddddddddddddddddddddddddddddd");

fn inspector(mock: &MockRpc) -> ContractInspector<'_, MockRpc> {
    ContractInspector::new(mock, CONTRACT)
        .with_retry(fast_retry(2))
        .with_pacing(no_pacing())
        .with_deployment_block(Some(0))
}

/// Record one `OwnershipTransferred` with its transaction and block.
fn add_transfer(mock: &MockRpc, block_number: u64, previous: Address, new: Address, sender: Address) {
    mock.add_log(log(
        CONTRACT,
        block_number,
        0,
        vec![
            EventKind::OwnershipTransferred.signature_hash(),
            address_topic(previous),
            address_topic(new),
        ],
        Bytes::new(),
    ));
    mock.add_transaction(TransactionInfo {
        hash: tx_hash(block_number, 0),
        from: sender,
        value: U256::ZERO,
        block_number: Some(block_number),
    });
    mock.add_block(block_number, 1_700_000_000 + block_number * 3);
}

/// Three transfers inserted out of block order.
fn chain_with_transfers(current_owner: Address) -> MockRpc {
    let mock = MockRpc::new(1_000);
    mock.on_call(CONTRACT, &IOwnable::ownerCall {}, current_owner);
    add_transfer(&mock, 100, ALICE, CAROL, ALICE);
    add_transfer(&mock, 50, Address::ZERO, ALICE, DEPLOYER);
    add_transfer(&mock, 200, CAROL, BOB, CAROL);
    mock
}

#[tokio::test]
async fn test_history_sorted_by_block() -> Result<()> {
    let mock = chain_with_transfers(BOB);

    let history = inspector(&mock)
        .history()
        .await
        .wrap_err("history failed")?;

    let blocks: Vec<u64> = history.transfer_events.iter().map(|e| e.block_number).collect();
    assert_eq!(blocks, vec![50, 100, 200]);

    let first = &history.transfer_events[0];
    assert_eq!(first.previous_owner, Address::ZERO);
    assert_eq!(first.new_owner, ALICE);
    assert_eq!(first.from_address, DEPLOYER);
    assert_eq!(first.timestamp, 1_700_000_150);
    assert_eq!(first.transaction_hash, tx_hash(50, 0));

    assert_eq!(history.current_owner, BOB);
    assert!(!history.is_renounced);
    assert_eq!(history.status(), HistoryStatus::Complete);
    Ok(())
}

#[tokio::test]
async fn test_history_flags_stale_trail() -> Result<()> {
    let other = address!("4444444444444444444444444444444444444444");
    let mock = chain_with_transfers(other);

    let history = inspector(&mock).history().await?;

    assert_eq!(history.transfer_events.len(), 3);
    assert_eq!(
        history.status(),
        HistoryStatus::Stale {
            expected: other,
            found: Some(BOB),
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_failed_transaction_lookup_aborts_history() {
    let mock = chain_with_transfers(BOB);
    mock.fail_transaction(tx_hash(100, 0));

    let result = inspector(&mock).history().await;

    assert!(matches!(result, Err(LensError::HistoryError { .. })));
}

#[tokio::test]
async fn test_missing_block_aborts_history() {
    let mock = MockRpc::new(1_000);
    mock.on_call(CONTRACT, &IOwnable::ownerCall {}, ALICE);
    mock.add_log(log(
        CONTRACT,
        75,
        0,
        vec![
            EventKind::OwnershipTransferred.signature_hash(),
            address_topic(Address::ZERO),
            address_topic(ALICE),
        ],
        Bytes::new(),
    ));
    mock.add_transaction(TransactionInfo {
        hash: tx_hash(75, 0),
        from: DEPLOYER,
        value: U256::ZERO,
        block_number: Some(75),
    });

    let result = inspector(&mock).history().await;

    assert!(matches!(result, Err(LensError::HistoryError { .. })));
}

#[tokio::test]
async fn test_quick_check_detects_renounced() -> Result<()> {
    let mock = MockRpc::new(1_000);
    mock.on_call(CONTRACT, &IOwnable::ownerCall {}, Address::ZERO);

    let status = inspector(&mock).quick_check().await?;

    assert!(status.is_renounced);
    assert_eq!(status.current_owner, Address::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_renounced_after_transfers() -> Result<()> {
    let mock = chain_with_transfers(Address::ZERO);
    add_transfer(&mock, 300, BOB, Address::ZERO, BOB);

    let history = inspector(&mock).history().await?;

    assert!(history.is_renounced);
    assert_eq!(history.transfer_events.len(), 4);
    assert_eq!(history.status(), HistoryStatus::Complete);
    Ok(())
}

#[tokio::test]
async fn test_other_contracts_events_ignored() -> Result<()> {
    let mock = chain_with_transfers(BOB);
    let elsewhere = address!("5555555555555555555555555555555555555555");
    mock.add_log(log(
        elsewhere,
        150,
        0,
        vec![
            EventKind::OwnershipTransferred.signature_hash(),
            address_topic(BOB),
            address_topic(ALICE),
        ],
        Bytes::new(),
    ));

    let history = inspector(&mock).history().await?;

    assert_eq!(history.transfer_events.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_owner_read_failure_is_fatal() {
    let mock = chain_with_transfers(BOB);
    mock.fail_calls_to(CONTRACT);

    let result = inspector(&mock).history().await;

    assert!(matches!(result, Err(LensError::RetriesExhausted { .. })));
}
