use pretty_assertions::assert_eq;

use crate::read::decision::evaluate;
use crate::store::status::StatusCode;
use crate::testing::failed_outcome;
use crate::testing::outcome;

#[test]
fn test_quorum_met_at_max_lsn() {
    let outcomes = vec![
        outcome(10).build(),
        outcome(10).build(),
        outcome(10).build(),
        outcome(9).build(),
    ];

    let eval = evaluate(&outcomes, 3, false);

    assert_eq!(true, eval.met);
    assert_eq!(10, eval.read_lsn);
    assert_eq!(-1, eval.global_committed_lsn);
    // The selected response sits at the maximal LSN.
    assert_eq!(10, outcomes[eval.selected.unwrap()].lsn);
}

#[test]
fn test_quorum_not_met_when_replicas_disagree() {
    let outcomes = vec![
        outcome(10).build(),
        outcome(9).build(),
        outcome(8).build(),
    ];

    let eval = evaluate(&outcomes, 3, false);

    assert_eq!(false, eval.met);
    assert_eq!(10, eval.read_lsn);
    assert_eq!(10, outcomes[eval.selected.unwrap()].lsn);
}

#[test]
fn test_old_item_shortcut() {
    // Only 2 of 4 replicas are at LSN 10, but the returned item was written
    // at LSN 8, at or below every replica's LSN: every probed replica has
    // durably passed it.
    let outcomes = vec![
        outcome(10).item_lsn(8).build(),
        outcome(10).item_lsn(8).build(),
        outcome(9).build(),
        outcome(8).build(),
    ];

    let eval = evaluate(&outcomes, 3, false);

    assert_eq!(true, eval.met);
    assert_eq!(8, eval.read_lsn);
}

#[test]
fn test_old_item_shortcut_requires_item_older_than_min() {
    let outcomes = vec![
        outcome(10).item_lsn(9).build(),
        outcome(10).item_lsn(9).build(),
        outcome(9).build(),
        outcome(8).build(),
    ];

    let eval = evaluate(&outcomes, 3, false);

    // min LSN is 8 < item LSN 9: the slowest replica may not have the item.
    assert_eq!(false, eval.met);
    assert_eq!(9, eval.read_lsn);
}

#[test]
fn test_invalid_outcomes_are_excluded() {
    let outcomes = vec![
        outcome(10).build(),
        outcome(10).build(),
        failed_outcome("connection reset").build(),
    ];

    let eval = evaluate(&outcomes, 3, false);

    assert_eq!(false, eval.met);
}

#[test]
fn test_empty_and_all_invalid_batches() {
    let eval = evaluate(&[], 3, false);
    assert_eq!(false, eval.met);
    assert_eq!(0, eval.read_lsn);
    assert_eq!(-1, eval.global_committed_lsn);
    assert_eq!(None, eval.selected);

    let outcomes = vec![
        failed_outcome("a").build(),
        failed_outcome("b").build(),
    ];
    let eval = evaluate(&outcomes, 2, false);
    assert_eq!(false, eval.met);
    assert_eq!(None, eval.selected);
}

#[test]
fn test_global_strong_waits_for_global_committed_lsn() {
    let outcomes = vec![
        outcome(10).read_regions(2).global_committed_lsn(8).build(),
        outcome(10).read_regions(2).global_committed_lsn(7).build(),
        outcome(10).read_regions(2).global_committed_lsn(8).build(),
    ];

    // Quorum sits at LSN 10 but the global committed LSN lags behind.
    let eval = evaluate(&outcomes, 3, true);
    assert_eq!(false, eval.met);
    assert_eq!(10, eval.global_committed_lsn);

    // Once the global committed LSN catches up, the quorum is met.
    let outcomes = vec![
        outcome(10).read_regions(2).global_committed_lsn(10).build(),
        outcome(10).read_regions(2).global_committed_lsn(7).build(),
        outcome(10).read_regions(2).global_committed_lsn(8).build(),
    ];
    let eval = evaluate(&outcomes, 3, true);
    assert_eq!(true, eval.met);
}

#[test]
fn test_global_strong_ignored_without_read_regions() {
    // A global strong read against a single-region account: no read regions
    // are reported, so the global-commit gate does not apply.
    let outcomes = vec![
        outcome(10).global_committed_lsn(-1).build(),
        outcome(10).global_committed_lsn(-1).build(),
    ];

    let eval = evaluate(&outcomes, 2, true);
    assert_eq!(true, eval.met);
    assert_eq!(-1, eval.global_committed_lsn);
}

#[test]
fn test_selection_prefers_error_free_response() {
    let outcomes = vec![
        outcome(10).status(StatusCode::GONE).build(),
        outcome(10).build(),
        outcome(10).build(),
    ];

    let eval = evaluate(&outcomes, 3, false);

    assert_eq!(true, eval.met);
    let selected = &outcomes[eval.selected.unwrap()];
    assert_eq!(StatusCode::OK, selected.status);
}

#[test]
fn test_selection_falls_back_to_error_response_at_max_lsn() {
    let outcomes = vec![
        outcome(10).status(StatusCode::NOT_FOUND).build(),
        outcome(9).build(),
    ];

    let eval = evaluate(&outcomes, 2, false);

    assert_eq!(false, eval.met);
    let selected = &outcomes[eval.selected.unwrap()];
    assert_eq!(StatusCode::NOT_FOUND, selected.status);
    assert_eq!(10, selected.lsn);
}
