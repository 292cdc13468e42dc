//! Durability coordinator
//!
//! Polls the master and replicas of a key until the persistence and
//! replication requirements both hold, a probe fails, or the deadline
//! passes. Each round probes every target node in parallel and resolves
//! them against one topology snapshot.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;

use crate::config::DurabilityConfig;
use crate::errors::{ClientError, ClientResult};
use crate::observability::{log_event, ClientMetrics, Event};
use crate::routing::{NodeLocator, RoutingError, MAX_REPLICAS};
use crate::transport::{ObserveProbe, Request, SubscriptionGuard, Transport};

use super::quorum::{evaluate, ObserveSample, StatusIdentifiers};
use super::status::{ObserveStatus, PersistTo, ReplicateTo};

/// Waits for mutations to reach a persistence/replication quorum
pub struct DurabilityCoordinator {
    transport: Arc<dyn Transport>,
    locator: Arc<NodeLocator>,
    guard: SubscriptionGuard,
    metrics: Arc<ClientMetrics>,
    poll_interval: Duration,
}

impl std::fmt::Debug for DurabilityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurabilityCoordinator")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl DurabilityCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        locator: Arc<NodeLocator>,
        metrics: Arc<ClientMetrics>,
        config: &DurabilityConfig,
    ) -> Self {
        Self {
            transport,
            locator,
            guard: SubscriptionGuard::new(Arc::clone(&metrics)),
            metrics,
            poll_interval: config.poll_interval(),
        }
    }

    /// Wait until the mutation of `key` at `cas` meets both requirements.
    ///
    /// Fails with `DurabilityTimeout` when `timeout` elapses first and with
    /// `DurabilityFailed` as soon as a probe fails. Dropping the returned
    /// future stops polling and cancels in-flight probes.
    pub async fn await_durability(
        &self,
        key: &str,
        cas: u64,
        removed: bool,
        persist_to: PersistTo,
        replicate_to: ReplicateTo,
        timeout: Duration,
    ) -> ClientResult<()> {
        if persist_to == PersistTo::None && replicate_to == ReplicateTo::None {
            return Ok(());
        }

        let replicas = self.locator.replica_count();
        if replicate_to.value() > replicas {
            let cause = RoutingError::ReplicaNotConfigured {
                replica: replicate_to.value(),
            };
            return Err(self.failed(key, cause.into()));
        }
        if persist_to.value() > replicas + 1 {
            let cause = RoutingError::ReplicaNotConfigured {
                replica: persist_to.value() - 1,
            };
            return Err(self.failed(key, cause.into()));
        }

        log_event(
            Event::DurabilityBegin,
            &[
                ("key", key),
                ("persist_to", &persist_to.to_string()),
                ("replicate_to", &replicate_to.to_string()),
            ],
        );

        let polling = self.poll_until_satisfied(key, cas, removed, persist_to, replicate_to);
        match tokio::time::timeout(timeout, polling).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.metrics.increment_durability_timeouts();
                log_event(
                    Event::DurabilityTimeout,
                    &[("key", key), ("timeout_ms", &timeout.as_millis().to_string())],
                );
                Err(ClientError::DurabilityTimeout {
                    key: key.to_string(),
                    timeout,
                })
            }
        }
    }

    async fn poll_until_satisfied(
        &self,
        key: &str,
        cas: u64,
        removed: bool,
        persist_to: PersistTo,
        replicate_to: ReplicateTo,
    ) -> ClientResult<()> {
        let identifiers = StatusIdentifiers::for_mutation(removed);
        let touches_replica = persist_to.touches_replica() || replicate_to.touches_replica();

        loop {
            self.metrics.increment_observe_polls();
            let samples = self
                .observe_round(key, cas, touches_replica)
                .await
                .map_err(|source| self.failed(key, source))?;

            let state = evaluate(&samples, identifiers, persist_to, replicate_to);
            if state.is_satisfied() {
                log_event(
                    Event::DurabilitySatisfied,
                    &[
                        ("key", key),
                        ("persisted", &state.persisted.to_string()),
                        ("replicated", &state.replicated.to_string()),
                    ],
                );
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn failed(&self, key: &str, source: ClientError) -> ClientError {
        self.metrics.increment_durability_failures();
        log_event(
            Event::DurabilityFailed,
            &[("key", key), ("cause", &source.to_string())],
        );
        ClientError::DurabilityFailed {
            key: key.to_string(),
            source: Box::new(source),
        }
    }

    /// Probe the master and, when needed, every configured replica
    async fn observe_round(
        &self,
        key: &str,
        cas: u64,
        touches_replica: bool,
    ) -> ClientResult<Vec<ObserveSample>> {
        let topology = self.locator.snapshot();
        let partition = topology.partition_of(key).map(|p| p as u16);

        let mut probes = vec![ObserveProbe {
            key: key.to_string(),
            cas,
            node: topology.owner_of(key)?,
            replica: 0,
            partition,
        }];
        if touches_replica {
            for n in 1..=topology.replica_count().min(MAX_REPLICAS) {
                probes.push(ObserveProbe {
                    key: key.to_string(),
                    cas,
                    node: topology.replica_of(key, n)?,
                    replica: n,
                    partition,
                });
            }
        }

        try_join_all(probes.into_iter().map(|probe| self.probe(probe))).await
    }

    async fn probe(&self, probe: ObserveProbe) -> ClientResult<ObserveSample> {
        let node = probe.node.clone();
        let master = probe.is_master();
        let transport = Arc::clone(&self.transport);
        let response = self
            .guard
            .wrap(move |watch| transport.send(Request::Observe(probe), watch))
            .await?
            .into_observe()?;

        // A node that could not answer contributes nothing this round
        let status = if response.status.is_success() {
            ObserveStatus::from_code(response.key_state)
        } else {
            ObserveStatus::Unknown(response.key_state)
        };
        Ok(ObserveSample {
            node,
            master,
            status,
        })
    }
}
