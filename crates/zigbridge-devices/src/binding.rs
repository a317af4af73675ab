//! Attribute reporting and listener setup.
//!
//! For the primary endpoint the binding pass walks every cluster present on
//! the endpoint and every attribute of that cluster in the profile's ZCL
//! table: configure reporting, register a change listener, read once to seed
//! state. DataPoints have no per-attribute model; one listener covers the
//! whole multiplexed stream.
//!
//! Failures are isolated per attribute and retried after the full pass.

use serde::Serialize;
use zigbridge_core::{EngineConfig, EngineError, Result, Value};

use crate::endpoint::EndpointDescriptor;
use crate::profiles::DeviceProfile;
use crate::radio::{InboundSink, ListenerHandle, RadioGuard, SharedRadio};
use crate::zcl::{AttributeRef, ClusterId, MappingEntry};

/// Step at which binding an attribute failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindStage {
    Subscribe,
    Read,
}

/// An attribute whose binding kept failing after all retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedAttribute {
    pub source: AttributeRef,
    pub attribute_name: &'static str,
    pub capability: Option<&'static str>,
    pub stage: BindStage,
    pub reason: String,
}

/// Outcome of one binding pass.
#[derive(Debug, Clone, Default)]
pub struct BindingReport {
    /// Attributes with reporting configured
    pub subscribed: Vec<AttributeRef>,
    /// Initial values read from the device, in binding order
    pub seed: Vec<(AttributeRef, Value)>,
    pub degraded: Vec<DegradedAttribute>,
    /// Per-attribute change listeners
    pub listeners: Vec<ListenerHandle>,
    pub datapoint_listener: Option<ListenerHandle>,
}

impl BindingReport {
    pub fn is_clean(&self) -> bool {
        self.degraded.is_empty()
    }

    pub fn all_listeners(&self) -> impl Iterator<Item = ListenerHandle> + '_ {
        self.listeners.iter().copied().chain(self.datapoint_listener)
    }
}

/// Progress of one attribute across binding rounds.
struct Pending<'a> {
    entry: &'a MappingEntry,
    subscribed: bool,
    listener: Option<ListenerHandle>,
    failure: Option<(BindStage, String)>,
}

impl<'a> Pending<'a> {
    fn new(entry: &'a MappingEntry) -> Self {
        Self {
            entry,
            // Entries without a reporting window are read, never subscribed
            subscribed: entry.reporting.is_none(),
            listener: None,
            failure: None,
        }
    }
}

/// Runs the binding pass for one session.
pub struct BindingManager {
    radio: SharedRadio,
    guard: RadioGuard,
    config: EngineConfig,
}

impl BindingManager {
    pub(crate) fn new(radio: SharedRadio, guard: RadioGuard, config: EngineConfig) -> Self {
        Self {
            radio,
            guard,
            config,
        }
    }

    /// Bind every mapped attribute on `endpoint` and the DataPoint stream.
    ///
    /// Only teardown aborts the pass; every listener registered so far is
    /// released before `Cancelled` is returned.
    pub async fn bind(
        &self,
        device_id: &str,
        profile: &DeviceProfile,
        endpoint: &EndpointDescriptor,
        sink: &InboundSink,
    ) -> Result<BindingReport> {
        let mut report = BindingReport::default();
        let mut pending: Vec<Pending<'_>> = endpoint
            .clusters
            .iter()
            .flat_map(|cluster| profile.zcl.entries_for_cluster(*cluster))
            .map(Pending::new)
            .collect();

        tracing::debug!(
            device_id,
            endpoint = endpoint.id,
            attributes = pending.len(),
            "Binding attributes"
        );

        for round in 0..=self.config.subscription_retries {
            if round > 0 {
                let retrying = pending.iter().filter(|p| p.failure.is_some()).count();
                if retrying == 0 {
                    break;
                }
                tracing::debug!(device_id, round, retrying, "Retrying failed bindings");
            }

            for i in 0..pending.len() {
                let item = &mut pending[i];
                if round > 0 && item.failure.is_none() {
                    continue;
                }
                match self.bind_attribute(endpoint.id, item, sink, &mut report).await {
                    Ok(()) => item.failure = None,
                    Err(EngineError::Cancelled) => {
                        self.release(&report, &pending_listeners(&pending));
                        return Err(EngineError::Cancelled);
                    }
                    Err(e) => {
                        tracing::warn!(
                            device_id,
                            source = %item.entry.source,
                            round,
                            error = %e,
                            "Attribute binding failed"
                        );
                        let stage = if item.subscribed {
                            BindStage::Read
                        } else {
                            BindStage::Subscribe
                        };
                        item.failure = Some((stage, e.to_string()));
                    }
                }
            }
        }

        for item in pending {
            if let Some(listener) = item.listener {
                report.listeners.push(listener);
            }
            if let Some((stage, reason)) = item.failure {
                report.degraded.push(DegradedAttribute {
                    source: item.entry.source,
                    attribute_name: item.entry.attribute_name,
                    capability: item.entry.capability,
                    stage,
                    reason,
                });
            }
        }

        if endpoint.has_cluster(ClusterId::TUYA_PRIVATE) && profile.has_datapoints() {
            report.datapoint_listener =
                Some(self.radio.on_data_point_report(endpoint.id, sink.clone()));

            if profile.quirks.query_datapoints_on_bind {
                match self
                    .guard
                    .run(
                        self.config.command_timeout(),
                        self.radio.query_data_points(endpoint.id),
                    )
                    .await
                {
                    Ok(()) => {}
                    Err(EngineError::Cancelled) => {
                        self.release(&report, &[]);
                        return Err(EngineError::Cancelled);
                    }
                    Err(e) => tracing::warn!(device_id, error = %e, "DataPoint query failed"),
                }
            }
        }

        tracing::info!(
            device_id,
            subscribed = report.subscribed.len(),
            seeded = report.seed.len(),
            degraded = report.degraded.len(),
            datapoints = report.datapoint_listener.is_some(),
            "Binding complete"
        );
        Ok(report)
    }

    /// Subscribe, listen and read, resuming after the last successful step.
    async fn bind_attribute(
        &self,
        endpoint: u8,
        item: &mut Pending<'_>,
        sink: &InboundSink,
        report: &mut BindingReport,
    ) -> Result<()> {
        let source = item.entry.source;

        if !item.subscribed {
            if let Some(reporting) = item.entry.reporting {
                let reporting = reporting.or_default(self.config.default_reporting.into());
                self.guard
                    .run(
                        self.config.command_timeout(),
                        self.radio.subscribe(endpoint, source, reporting),
                    )
                    .await
                    .map_err(|e| match e {
                        EngineError::Cancelled => e,
                        other => EngineError::SubscriptionFailed {
                            cluster: source.cluster.name().to_string(),
                            attribute: item.entry.attribute_name.to_string(),
                            reason: other.to_string(),
                        },
                    })?;
                report.subscribed.push(source);
            }
            item.subscribed = true;
        }

        if item.listener.is_none() {
            item.listener = Some(self.radio.on_attribute_change(endpoint, source, sink.clone()));
        }

        let value = self
            .guard
            .run(
                self.config.read_timeout(),
                self.radio.read_attribute(endpoint, source),
            )
            .await?;
        report.seed.push((source, value));
        Ok(())
    }

    fn release(&self, report: &BindingReport, extra: &[ListenerHandle]) {
        for handle in report.all_listeners().chain(extra.iter().copied()) {
            self.radio.remove_listener(handle);
        }
    }
}

fn pending_listeners(pending: &[Pending<'_>]) -> Vec<ListenerHandle> {
    pending.iter().filter_map(|p| p.listener).collect()
}
