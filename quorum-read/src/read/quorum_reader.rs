//! The quorum read orchestrator.

use std::sync::Arc;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::config::Config;
use crate::errors::probe_failure;
use crate::errors::QuorumNotMet;
use crate::errors::ReadError;
use crate::errors::ReadPhase;
use crate::read::barrier::BarrierConverger;
use crate::read::barrier::BarrierWait;
use crate::read::barrier::Converger;
use crate::read::decision;
use crate::read::primary;
use crate::read::MAX_READ_QUORUM_RETRIES;
use crate::store::reader::StoreReader;
use crate::store::request::BarrierRequest;
use crate::store::request::ReadRequest;
use crate::store::response::StoreResponse;
use crate::store::ConsistencyLevel;
use crate::store::QuorumTarget;
use crate::store::ReadMode;
use crate::store::StoreOutcome;

/// What one secondary quorum read established.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum QuorumOutcome {
    /// A read quorum agrees; the response may be returned.
    Met {
        lsn: i64,
        global_committed_lsn: i64,
        response: StoreOutcome,
    },
    /// One replica's LSN was picked as the barrier target but a quorum has
    /// not confirmed it yet. Provisional: must become `Met` or fail before
    /// anything is returned to the caller.
    Selected {
        lsn: i64,
        global_committed_lsn: i64,
        response: StoreOutcome,
    },
    /// Fewer than `read_quorum` replicas produced valid outcomes.
    NotSelected,
    /// Every probed replica asked for backoff.
    Throttled { response: StoreOutcome },
}

/// Client-side quorum read engine.
///
/// Composes the quorum decision rule, the read-barrier convergence loop and
/// the primary-read fallback into the strong and bounded-staleness read
/// algorithms, on top of a caller-supplied replica fan-out
/// [`StoreReader`].
pub struct QuorumReader<S>
where S: StoreReader
{
    store: Arc<S>,
    config: Arc<Config>,
    converger: Converger,
}

impl<S> QuorumReader<S>
where S: StoreReader
{
    pub fn new(store: Arc<S>, config: Arc<Config>) -> Self {
        let converger = Converger::from_legacy_flag(config.legacy_read_barrier);
        Self {
            store,
            config,
            converger,
        }
    }

    /// Return the config of this reader.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Strong read: fan out to a read quorum of secondaries, converge on the
    /// selected LSN via read barriers, and fall back to the primary when a
    /// quorum cannot even be selected.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn read_strong(
        &self,
        request: &mut ReadRequest,
        target: &QuorumTarget,
    ) -> Result<StoreResponse, ReadError> {
        self.read_with_quorum(request, target, true).await
    }

    /// Bounded-staleness read: same machinery, but without the primary read
    /// barrier after a quorum was selected. Under asynchronous replication
    /// the primary has the potential to always be caught up, which would
    /// defeat the staleness bound.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn read_bounded_staleness(
        &self,
        request: &mut ReadRequest,
        read_quorum: i32,
    ) -> Result<StoreResponse, ReadError> {
        let target = QuorumTarget::new(
            read_quorum,
            ReadMode::BoundedStaleness,
            ConsistencyLevel::BoundedStaleness,
        );
        self.read_with_quorum(request, &target, false).await
    }

    async fn read_with_quorum(
        &self,
        request: &mut ReadRequest,
        target: &QuorumTarget,
        perform_primary_read_barrier: bool,
    ) -> Result<StoreResponse, ReadError> {
        let read_quorum = target.read_quorum;
        let mut has_performed_read_from_primary = false;
        let mut include_primary = false;

        for _retry in 0..MAX_READ_QUORUM_RETRIES {
            request.context.timeout.check_elapsed(read_quorum)?;

            match self.read_quorum_once(request, target, include_primary).await? {
                QuorumOutcome::Met { response, .. } => {
                    return into_response(response);
                }

                QuorumOutcome::Throttled { response } => {
                    return into_response(response);
                }

                QuorumOutcome::Selected {
                    lsn,
                    global_committed_lsn,
                    response,
                } => {
                    if perform_primary_read_barrier {
                        let mut barrier = BarrierRequest::new(
                            request,
                            lsn,
                            Some(global_committed_lsn),
                        );
                        match self
                            .converger
                            .wait_for_read_barrier(
                                self.store.as_ref(),
                                &mut barrier,
                                true,
                                read_quorum,
                                target.read_mode,
                            )
                            .await?
                        {
                            BarrierWait::Converged => {
                                return into_response(response);
                            }
                            BarrierWait::Throttled(r) => {
                                return into_response(r);
                            }
                            BarrierWait::Exhausted => {
                                warn!(
                                    lsn,
                                    global_committed_lsn,
                                    read_quorum,
                                    responses = debug(
                                        &request.context.store_responses
                                    ),
                                    "selected: could not converge on the LSN \
                                     after the primary read barrier"
                                );
                            }
                        }
                    } else {
                        warn!(
                            lsn,
                            read_quorum,
                            "selected: could not converge on the LSN; no \
                             primary barrier for this read mode"
                        );
                    }

                    // Keep the locked response so a retried quorum read can
                    // skip re-reading the replicas.
                    request.context.quorum_selected_lsn = lsn;
                    request.context.global_committed_selected_lsn =
                        global_committed_lsn;
                    request.context.quorum_selected_outcome = Some(response);
                }

                QuorumOutcome::NotSelected => {
                    if has_performed_read_from_primary {
                        warn!(
                            "not-selected: primary read already attempted; \
                             quorum could not be selected on secondaries"
                        );
                        return Err(self.quorum_not_met(
                            request,
                            read_quorum,
                            ReadPhase::SecondaryQuorumRead,
                        ));
                    }

                    warn!(
                        read_quorum,
                        "not-selected: quorum could not be selected"
                    );
                    let result = primary::read_primary(
                        self.store.as_ref(),
                        request,
                        read_quorum,
                    )
                    .await?;

                    if result.is_successful && result.should_retry_on_secondary
                    {
                        error!(
                            "primary result has both successful and \
                             retry-on-secondary set"
                        );
                    }

                    if result.is_successful {
                        info!("not-selected: primary read successful");
                        let Some(response) = result.response else {
                            return Err(self.quorum_not_met(
                                request,
                                read_quorum,
                                ReadPhase::PrimaryRead,
                            ));
                        };
                        return into_response(response);
                    } else if result.should_retry_on_secondary {
                        warn!(
                            "not-selected: primary read did not succeed; \
                             retrying on secondaries with primary included"
                        );
                        has_performed_read_from_primary = true;
                        include_primary = true;
                    } else {
                        warn!(
                            "not-selected: no successful response from the \
                             primary read"
                        );
                        return Err(self.quorum_not_met(
                            request,
                            read_quorum,
                            ReadPhase::PrimaryRead,
                        ));
                    }
                }
            }
        }

        warn!(
            read_quorum,
            retries = MAX_READ_QUORUM_RETRIES,
            "could not complete the quorum read"
        );
        Err(self.quorum_not_met(
            request,
            read_quorum,
            ReadPhase::SecondaryQuorumRead,
        ))
    }

    /// One secondary quorum read: fan out (or reuse the cached selection),
    /// evaluate the quorum rule, and run the secondary read barrier when a
    /// barrier target was selected but not confirmed.
    async fn read_quorum_once(
        &self,
        request: &mut ReadRequest,
        target: &QuorumTarget,
        include_primary: bool,
    ) -> Result<QuorumOutcome, ReadError> {
        let read_quorum = target.read_quorum;
        request.context.timeout.check_elapsed(read_quorum)?;

        let (read_lsn, global_committed_lsn, selected) = if let Some(cached) =
            request.context.quorum_selected_outcome.clone()
        {
            (
                request.context.quorum_selected_lsn,
                request.context.global_committed_selected_lsn,
                cached,
            )
        } else {
            let mut outcomes = self
                .store
                .fan_out_read(
                    request,
                    include_primary,
                    read_quorum,
                    true,
                    target.read_mode,
                    false,
                    false,
                )
                .await;

            request.context.store_responses =
                outcomes.iter().map(|o| o.to_string()).collect();

            if !outcomes.is_empty()
                && outcomes.iter().all(|o| o.is_throttled())
            {
                return Ok(QuorumOutcome::Throttled {
                    response: outcomes.swap_remove(0),
                });
            }

            let valid_count =
                outcomes.iter().filter(|o| o.is_valid).count() as i32;
            if valid_count < read_quorum {
                return Ok(QuorumOutcome::NotSelected);
            }

            let eval = decision::evaluate(
                &outcomes,
                read_quorum,
                target.is_global_strong_read(),
            );
            let Some(idx) = eval.selected else {
                return Ok(QuorumOutcome::NotSelected);
            };

            // The winner escapes the batch by move; the rest of the batch is
            // dropped here and must never be read again.
            let selected = outcomes.swap_remove(idx);
            drop(outcomes);

            if eval.met {
                return Ok(QuorumOutcome::Met {
                    lsn: eval.read_lsn,
                    global_committed_lsn: eval.global_committed_lsn,
                    response: selected,
                });
            }

            // Any needed address refresh already happened during the
            // fan-out; avoid further refreshes for this request.
            request.context.force_refresh_address_cache = false;

            (eval.read_lsn, eval.global_committed_lsn, selected)
        };

        // Read barrier required before the selected response may be
        // returned.
        let mut barrier =
            BarrierRequest::new(request, read_lsn, Some(global_committed_lsn));
        match self
            .converger
            .wait_for_read_barrier(
                self.store.as_ref(),
                &mut barrier,
                false,
                read_quorum,
                target.read_mode,
            )
            .await?
        {
            BarrierWait::Converged => Ok(QuorumOutcome::Met {
                lsn: read_lsn,
                global_committed_lsn,
                response: selected,
            }),
            BarrierWait::Throttled(r) => {
                Ok(QuorumOutcome::Throttled { response: r })
            }
            BarrierWait::Exhausted => Ok(QuorumOutcome::Selected {
                lsn: read_lsn,
                global_committed_lsn,
                response: selected,
            }),
        }
    }

    fn quorum_not_met(
        &self,
        request: &ReadRequest,
        read_quorum: i32,
        phase: ReadPhase,
    ) -> ReadError {
        ReadError::QuorumNotMet(QuorumNotMet {
            read_quorum,
            phase,
            responses: request.context.store_responses.clone(),
        })
    }
}

fn into_response(outcome: StoreOutcome) -> Result<StoreResponse, ReadError> {
    match outcome.response.clone() {
        Some(r) => Ok(r),
        None => Err(probe_failure(&outcome)),
    }
}
