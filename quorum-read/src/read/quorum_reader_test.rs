use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use crate::config::Config;
use crate::errors::ReadError;
use crate::errors::ReadPhase;
use crate::read::QuorumReader;
use crate::read::MAX_READ_BARRIER_RETRIES;
use crate::read::MAX_READ_QUORUM_RETRIES;
use crate::store::status::StatusCode;
use crate::testing::failed_outcome;
use crate::testing::outcome;
use crate::testing::read_request;
use crate::testing::strong_target;
use crate::testing::throttled_outcome;
use crate::testing::ut_harness;
use crate::testing::ScriptedStore;

fn reader(store: &Arc<ScriptedStore>) -> QuorumReader<ScriptedStore> {
    QuorumReader::new(store.clone(), Arc::new(Config::default()))
}

/// The legacy fixed-retry barrier finishes a failed wait in tens of
/// milliseconds, so tests that must exhaust barrier retries use it.
fn legacy_reader(store: &Arc<ScriptedStore>) -> QuorumReader<ScriptedStore> {
    let config = Config {
        legacy_read_barrier: true,
        ..Config::default()
    };
    QuorumReader::new(store.clone(), Arc::new(config))
}

#[test_harness::test(harness = ut_harness)]
async fn test_strong_read_met_on_first_fan_out() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    store.push_fan_out(vec![
        outcome(10).body("doc").build(),
        outcome(10).build(),
    ]);

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    assert_eq!(StatusCode::OK, got.status);
    assert_eq!(b"doc".as_slice(), &got.body[..]);
    assert_eq!(1, store.fan_out_calls());
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_all_throttled_returns_the_throttled_body() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    store.push_fan_out(vec![
        throttled_outcome().build(),
        throttled_outcome().build(),
    ]);

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    // Throttling is an answer, not a quorum failure; the backoff body goes
    // back to the caller unchanged.
    assert_eq!(StatusCode::TOO_MANY_REQUESTS, got.status);
    assert_eq!(1, store.fan_out_calls());
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_not_selected_falls_back_to_primary() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    // Only one valid secondary: no quorum can even be selected.
    store.push_fan_out(vec![
        outcome(5).build(),
        failed_outcome("connection reset").build(),
    ]);
    store.push_primary(outcome(5).body("doc").replica_set_size(2).build());

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    assert_eq!(b"doc".as_slice(), &got.body[..]);
    assert_eq!(1, store.primary_calls());
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_primary_redirects_back_to_secondaries() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    store.push_fan_out(vec![
        outcome(5).build(),
        failed_outcome("connection reset").build(),
    ]);
    store.push_fan_out(vec![outcome(10).build(), outcome(10).build()]);
    // The replica set is larger than the read quorum: the primary alone
    // cannot vouch for the data.
    store.push_primary(outcome(5).replica_set_size(3).build());

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    assert_eq!(StatusCode::OK, got.status);
    let log = store.fan_out_log();
    assert_eq!(false, log[0].include_primary);
    // The retried quorum read counts the primary in.
    assert_eq!(true, log[1].include_primary);
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_not_selected_after_primary_fallback_fails() -> anyhow::Result<()>
{
    let store = Arc::new(ScriptedStore::new());
    store.push_fan_out(vec![
        outcome(5).build(),
        failed_outcome("connection reset").build(),
    ]);
    store.push_primary(outcome(5).replica_set_size(3).build());

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await;

    // One primary fallback only; a second not-selected round gives up.
    match got {
        Err(ReadError::QuorumNotMet(e)) => {
            assert_eq!(ReadPhase::SecondaryQuorumRead, e.phase)
        }
        other => panic!("expected QuorumNotMet, got {:?}", other),
    }
    assert_eq!(1, store.primary_calls());
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_selected_converges_via_secondary_barrier() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    // The replicas disagree: LSN 10 wins but only one replica is there.
    store.push_fan_out(vec![
        outcome(10).body("winner").build(),
        outcome(9).build(),
    ]);
    // The barrier probe then finds both caught up.
    store.push_fan_out(vec![outcome(10).build(), outcome(10).build()]);

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    assert_eq!(b"winner".as_slice(), &got.body[..]);
    let log = store.fan_out_log();
    assert_eq!(2, log.len());
    // The secondary barrier never touches the primary.
    assert_eq!(false, log[1].include_primary);
    assert_eq!(true, log[1].force_read_all);
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_global_strong_read_confirms_global_commit() -> anyhow::Result<()>
{
    let store = Arc::new(ScriptedStore::new());
    // A quorum sits at LSN 10 but the global committed LSN lags: not met.
    store.push_fan_out(vec![
        outcome(10).body("doc").read_regions(2).global_committed_lsn(8).build(),
        outcome(10).read_regions(2).global_committed_lsn(8).build(),
    ]);
    // The barrier confirms cross-region commit caught up.
    store.push_fan_out(vec![
        outcome(10).read_regions(2).global_committed_lsn(10).build(),
        outcome(10).read_regions(2).global_committed_lsn(10).build(),
    ]);

    let mut request = read_request(Duration::from_secs(10));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    assert_eq!(b"doc".as_slice(), &got.body[..]);
    assert_eq!(2, store.fan_out_calls());
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_selected_retries_with_cached_selection() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    store.push_fan_out(vec![
        outcome(10).body("winner").build(),
        outcome(9).build(),
    ]);
    // Both the secondary and the primary read barrier run out of retries.
    for _ in 0..(2 * MAX_READ_BARRIER_RETRIES) {
        store.push_fan_out(vec![outcome(9).build(), outcome(9).build()]);
    }
    // The next outer attempt converges.
    store.push_fan_out(vec![outcome(10).build(), outcome(10).build()]);

    let mut request = read_request(Duration::from_secs(10));
    let got = legacy_reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await?;

    // The selection is kept across outer retries: no second quorum fan-out,
    // the retry goes straight back to the barrier and returns the response
    // locked on earlier.
    assert_eq!(b"winner".as_slice(), &got.body[..]);
    assert_eq!(14, store.fan_out_calls());

    let log = store.fan_out_log();
    // Calls 8..=13 are the primary read barrier.
    assert_eq!(true, log[7].include_primary);
    assert_eq!(true, log[12].include_primary);
    assert_eq!(false, log[13].include_primary);
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_bounded_staleness_never_reads_the_primary() -> anyhow::Result<()>
{
    let store = Arc::new(ScriptedStore::new());
    store.push_fan_out(vec![
        outcome(10).body("winner").build(),
        outcome(9).build(),
    ]);
    // The lagging replica never catches up.
    store.push_fan_out(vec![outcome(9).build(), outcome(9).build()]);

    let mut request = read_request(Duration::from_secs(10));
    let got = legacy_reader(&store)
        .read_bounded_staleness(&mut request, 2)
        .await;

    match got {
        Err(ReadError::QuorumNotMet(e)) => {
            assert_eq!(ReadPhase::SecondaryQuorumRead, e.phase);
            // The failure report carries the replica summaries for
            // diagnostics.
            assert_eq!(2, e.responses.len());
        }
        other => panic!("expected QuorumNotMet, got {:?}", other),
    }

    assert_eq!(0, store.primary_calls());
    assert!(store.fan_out_log().iter().all(|c| !c.include_primary));
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_outer_retries_are_bounded() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    // The replicas never agree and every barrier wait fails. With a time
    // budget far larger than the retries need, the outer loop must give up
    // on its own rather than spin forever.
    store.push_fan_out(vec![outcome(10).build(), outcome(9).build()]);

    let mut request = read_request(Duration::from_secs(60));
    let got = legacy_reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await;

    match got {
        Err(ReadError::QuorumNotMet(e)) => {
            assert_eq!(ReadPhase::SecondaryQuorumRead, e.phase)
        }
        other => panic!("expected QuorumNotMet, got {:?}", other),
    }

    // One quorum fan-out, then each outer attempt runs the secondary and
    // the primary read barrier to exhaustion against the cached selection.
    let expected =
        1 + MAX_READ_QUORUM_RETRIES * 2 * MAX_READ_BARRIER_RETRIES;
    assert_eq!(expected, store.fan_out_calls());
    Ok(())
}

#[test_harness::test(harness = ut_harness)]
async fn test_read_times_out_as_quorum_not_met() -> anyhow::Result<()> {
    let store = Arc::new(ScriptedStore::new());
    // The quorum is never met and the barrier never converges; the overall
    // time budget is what stops the read.
    store.push_fan_out(vec![outcome(10).build(), outcome(9).build()]);

    let mut request = read_request(Duration::from_millis(100));
    let got = reader(&store)
        .read_strong(&mut request, &strong_target(2))
        .await;

    match got {
        Err(ReadError::QuorumNotMet(e)) => {
            assert_eq!(ReadPhase::Timeout, e.phase)
        }
        other => panic!("expected QuorumNotMet, got {:?}", other),
    }
    Ok(())
}
