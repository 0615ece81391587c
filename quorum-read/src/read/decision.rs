//! The quorum-met decision rule.

use tracing::debug;

use crate::store::StoreOutcome;

/// What one batch of replica outcomes proves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QuorumEvaluation {
    pub(crate) met: bool,
    /// The LSN the read locks on: the maximal observed LSN, or the selected
    /// item's own write LSN when that is lower.
    pub(crate) read_lsn: i64,
    /// The global-commit target a global strong read must confirm, `-1`
    /// otherwise.
    pub(crate) global_committed_lsn: i64,
    /// Index into the batch of the replica response to return, `None` when
    /// no valid outcome exists.
    pub(crate) selected: Option<usize>,
}

impl QuorumEvaluation {
    fn not_met() -> Self {
        Self {
            met: false,
            read_lsn: 0,
            global_committed_lsn: -1,
            selected: None,
        }
    }
}

/// Decide whether a batch of replica outcomes constitutes a read quorum.
///
/// Pure reduction over the outcome set; completion order is irrelevant.
/// Quorum is met if either
///
/// 1. `read_quorum` replicas sit at the maximal observed LSN (and, for a
///    global strong read, the maximal observed global-committed LSN has
///    caught up to it), or
/// 2. the selected item's own write LSN is at or below the minimum LSN seen
///    across at least `read_quorum` valid outcomes: the item is old enough
///    that every probed replica, even the slowest, has durably passed it.
pub(crate) fn evaluate(
    outcomes: &[StoreOutcome],
    read_quorum: i32,
    is_global_strong_read: bool,
) -> QuorumEvaluation {
    let valid: Vec<usize> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_valid)
        .map(|(i, _)| i)
        .collect();

    if valid.is_empty() {
        return QuorumEvaluation::not_met();
    }

    let number_of_read_regions = valid
        .iter()
        .map(|&i| outcomes[i].number_of_read_regions)
        .max()
        .unwrap_or(-1);
    let check_global_strong = is_global_strong_read && number_of_read_regions > 0;

    let mut max_lsn: i64 = 0;
    let mut min_lsn: i64 = i64::MAX;
    let mut replica_count_at_max_lsn: i32 = 0;

    for &i in &valid {
        let lsn = outcomes[i].lsn;
        if lsn == max_lsn {
            replica_count_at_max_lsn += 1;
        } else if lsn > max_lsn {
            replica_count_at_max_lsn = 1;
            max_lsn = lsn;
        }

        if lsn < min_lsn {
            min_lsn = lsn;
        }
    }

    // Prefer an error-free response at the maximal LSN; any response at the
    // maximal LSN otherwise.
    let selected = valid
        .iter()
        .copied()
        .find(|&i| outcomes[i].lsn == max_lsn && !outcomes[i].status.is_error())
        .or_else(|| {
            valid.iter().copied().find(|&i| outcomes[i].lsn == max_lsn)
        });

    let Some(selected) = selected else {
        return QuorumEvaluation::not_met();
    };

    let item_lsn = outcomes[selected].item_lsn;
    let read_lsn = if item_lsn == -1 {
        max_lsn
    } else {
        item_lsn.min(max_lsn)
    };
    let global_committed_lsn = if check_global_strong { read_lsn } else { -1 };

    let max_global_committed_lsn = valid
        .iter()
        .map(|&i| outcomes[i].global_committed_lsn)
        .max()
        .unwrap_or(-1);

    debug!(
        max_lsn,
        replica_count_at_max_lsn,
        check_global_strong,
        max_global_committed_lsn,
        number_of_read_regions,
        selected_item_lsn = item_lsn,
        "evaluated quorum batch"
    );

    let mut met = read_lsn > 0
        && replica_count_at_max_lsn >= read_quorum
        && (!check_global_strong || max_global_committed_lsn >= max_lsn);

    if !met
        && valid.len() as i32 >= read_quorum
        && item_lsn != -1
        && (min_lsn != i64::MAX && item_lsn <= min_lsn)
        && (!check_global_strong || item_lsn <= max_global_committed_lsn)
    {
        met = true;
    }

    QuorumEvaluation {
        met,
        read_lsn,
        global_committed_lsn,
        selected: Some(selected),
    }
}
