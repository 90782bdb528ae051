//! Adaptive log scanning against a scripted chain.
//!
//! Run with: cargo test --test scanner

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::{address, Address, Bytes};
use chain_lens::error::LensError;
use chain_lens::events::EventKind;
use chain_lens::scanner::{LogScanner, ScanPacing, ScanRequest};
use common::{fast_retry, limit_exceeded, log, network_error, no_pacing, MockRpc};
use eyre::{Context, Result};
use futures_util::StreamExt;

const TOKEN: Address = address!("0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82");
const OTHER: Address = address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");

/// One Transfer log from TOKEN every `step` blocks in `[0, last]`.
fn seeded_chain(latest: u64, last: u64, step: u64) -> MockRpc {
    let mock = MockRpc::new(latest);
    let topic = EventKind::Transfer.signature_hash();
    for block in (0..=last).step_by(usize::try_from(step).unwrap()) {
        mock.add_log(log(TOKEN, block, 0, vec![topic], Bytes::new()));
    }
    mock
}

fn assert_contiguous(windows: &[(u64, u64)], from: u64, to: u64) {
    assert_eq!(windows.first().map(|w| w.0), Some(from));
    assert_eq!(windows.last().map(|w| w.1), Some(to));
    for pair in windows.windows(2) {
        assert_eq!(pair[1].0, pair[0].1 + 1, "gap or overlap between {pair:?}");
    }
}

#[tokio::test]
async fn test_every_block_scanned_exactly_once() -> Result<()> {
    let mock = seeded_chain(3_000, 2_500, 7);
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let logs = scanner
        .collect_logs(ScanRequest::new(0, Some(2_500)).batch_size(1_000))
        .await
        .wrap_err("scan failed")?;

    let mut seen: HashMap<u64, usize> = HashMap::new();
    for log in &logs {
        *seen.entry(log.block_number).or_default() += 1;
    }
    assert_eq!(seen.len(), 2_500 / 7 + 1);
    assert!(seen.values().all(|count| *count == 1));

    let windows = mock.windows();
    assert_eq!(windows, vec![(0, 999), (1_000, 1_999), (2_000, 2_500)]);
    Ok(())
}

#[tokio::test]
async fn test_window_arithmetic_with_offset_start() -> Result<()> {
    let mock = MockRpc::new(10_000);
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let batches: Vec<_> = scanner
        .scan_windows(ScanRequest::new(1_234, Some(1_600)).batch_size(100))
        .collect()
        .await;

    assert_eq!(batches.len(), 4);
    let windows = mock.windows();
    assert_eq!(
        windows,
        vec![(1_234, 1_333), (1_334, 1_433), (1_434, 1_533), (1_534, 1_600)]
    );
    assert_contiguous(&windows, 1_234, 1_600);
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_shrinks_then_recovers() -> Result<()> {
    let mock = seeded_chain(2_000, 2_000, 50);
    mock.fail_next_get_logs(limit_exceeded());
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let batches: Vec<_> = scanner
        .scan_windows(ScanRequest::new(0, Some(2_000)).batch_size(1_000))
        .collect()
        .await;
    let batches = batches.into_iter().collect::<Result<Vec<_>, LensError>>()?;

    assert_eq!(
        mock.windows(),
        vec![(0, 999), (0, 499), (500, 1_499), (1_500, 2_000)]
    );
    let sizes: Vec<u64> = batches.iter().map(|b| b.batch_size).collect();
    assert_eq!(sizes, vec![500, 1_000, 1_000]);

    let total: usize = batches.iter().map(|b| b.logs.len()).sum();
    assert_eq!(total, 2_000 / 50 + 1);

    let successful: Vec<(u64, u64)> = batches.iter().map(|b| (b.from_block, b.to_block)).collect();
    assert_contiguous(&successful, 0, 2_000);
    Ok(())
}

#[tokio::test]
async fn test_rate_limit_at_floor_exhausts_budget() {
    let mock = MockRpc::new(5_000);
    for _ in 0..20 {
        mock.fail_next_get_logs(limit_exceeded());
    }
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let result = scanner
        .collect_logs(ScanRequest::new(0, Some(5_000)).batch_size(1_000))
        .await;

    assert!(matches!(
        result,
        Err(LensError::RetriesExhausted { attempts: 3, .. })
    ));
    if let Err(e) = result {
        assert!(e.is_rate_limited());
    }

    // 1000 -> 500 -> 250 -> 125 -> 100, then three attempts at the floor
    let sizes: Vec<u64> = mock.windows().iter().map(|(from, to)| to - from + 1).collect();
    assert_eq!(sizes, vec![1_000, 500, 250, 125, 100, 100, 100]);
}

#[tokio::test]
async fn test_transient_error_retries_same_window() -> Result<()> {
    let mock = seeded_chain(1_500, 1_500, 100);
    mock.fail_next_get_logs(network_error());
    mock.fail_next_get_logs(network_error());
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let logs = scanner
        .collect_logs(ScanRequest::new(0, Some(1_500)).batch_size(1_000))
        .await?;

    assert_eq!(logs.len(), 16);
    assert_eq!(
        mock.windows(),
        vec![(0, 999), (0, 999), (0, 999), (1_000, 1_500)]
    );
    Ok(())
}

#[tokio::test]
async fn test_transient_errors_exhaust_budget() {
    let mock = MockRpc::new(1_500);
    for _ in 0..5 {
        mock.fail_next_get_logs(network_error());
    }
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let result = scanner
        .collect_logs(ScanRequest::new(0, Some(1_500)).batch_size(1_000))
        .await;

    assert!(matches!(
        result,
        Err(LensError::RetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(mock.windows().len(), 3);
}

#[tokio::test]
async fn test_non_retryable_error_aborts() {
    let mock = MockRpc::new(1_500);
    mock.fail_next_get_logs(LensError::decoding("malformed response", None));
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let mut stream = std::pin::pin!(scanner.scan(ScanRequest::new(0, Some(1_500))));
    let first = stream.next().await;
    assert!(matches!(first, Some(Err(LensError::DecodingError { .. }))));
    assert!(stream.next().await.is_none());
    assert_eq!(mock.windows().len(), 1);
}

#[tokio::test]
async fn test_open_ended_scan_stops_at_tip() -> Result<()> {
    let mock = seeded_chain(1_200, 1_500, 100);
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let logs = scanner
        .collect_logs(ScanRequest::new(0, None).batch_size(1_000))
        .await?;

    assert_eq!(logs.len(), 13);
    assert_eq!(mock.windows(), vec![(0, 999), (1_000, 1_200)]);
    Ok(())
}

#[tokio::test]
async fn test_to_block_beyond_tip_is_clipped() -> Result<()> {
    let mock = MockRpc::new(800);
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    scanner
        .collect_logs(ScanRequest::new(500, Some(5_000)).batch_size(1_000))
        .await?;

    assert_eq!(mock.windows(), vec![(500, 800)]);
    Ok(())
}

#[tokio::test]
async fn test_empty_range_requests_nothing() -> Result<()> {
    let mock = MockRpc::new(100);
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());

    let logs = scanner.collect_logs(ScanRequest::new(200, Some(300))).await?;

    assert!(logs.is_empty());
    assert!(mock.windows().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_filters_by_address_and_signature() -> Result<()> {
    let mock = MockRpc::new(1_000);
    let transfer = EventKind::Transfer.signature_hash();
    let approval = EventKind::Approval.signature_hash();
    mock.add_log(log(TOKEN, 10, 0, vec![transfer], Bytes::new()));
    mock.add_log(log(TOKEN, 11, 0, vec![approval], Bytes::new()));
    mock.add_log(log(OTHER, 12, 0, vec![transfer], Bytes::new()));

    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());
    let request = ScanRequest::new(0, Some(1_000))
        .address(TOKEN)
        .signatures([transfer]);
    let logs = scanner.collect_logs(request).await?;

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number, 10);
    Ok(())
}

#[tokio::test]
async fn test_scan_holds_no_state_between_calls() -> Result<()> {
    let mock = seeded_chain(2_000, 2_000, 250);
    let scanner = LogScanner::new(&mock, fast_retry(3), no_pacing());
    let request = ScanRequest::new(0, Some(2_000)).batch_size(600);

    let first = scanner.collect_logs(request.clone()).await?;
    let second = scanner.collect_logs(request).await?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_request_delay_between_windows() -> Result<()> {
    let mock = MockRpc::new(3_000);
    let pacing = ScanPacing {
        request_delay: Duration::from_millis(500),
        ..ScanPacing::none()
    };
    let scanner = LogScanner::new(&mock, fast_retry(3), pacing);

    let start = tokio::time::Instant::now();
    scanner
        .collect_logs(ScanRequest::new(0, Some(2_999)).batch_size(1_000))
        .await?;

    // Three windows, two pauses
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1_000) && elapsed < Duration::from_millis(1_500));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_cooldown_applied() -> Result<()> {
    let mock = MockRpc::new(999);
    mock.fail_next_get_logs(limit_exceeded());
    let pacing = ScanPacing {
        rate_limit_cooldown: Duration::from_secs(2),
        ..ScanPacing::none()
    };
    let scanner = LogScanner::new(&mock, fast_retry(3), pacing);

    let start = tokio::time::Instant::now();
    scanner
        .collect_logs(ScanRequest::new(0, Some(999)).batch_size(1_000))
        .await?;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2_500));
    Ok(())
}
