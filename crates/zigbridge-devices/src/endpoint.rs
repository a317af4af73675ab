//! Primary endpoint selection.
//!
//! Multi-endpoint devices often expose the functional clusters on one
//! endpoint and diagnostics or groups-only stubs on others. The selector
//! scores each endpoint by the clusters it carries and picks the best one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use zigbridge_core::{EngineError, Result};

use crate::zcl::ClusterId;

/// An endpoint and the input clusters it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub id: u8,
    pub clusters: BTreeSet<ClusterId>,
}

impl EndpointDescriptor {
    pub fn new(id: u8, clusters: impl IntoIterator<Item = ClusterId>) -> Self {
        Self {
            id,
            clusters: clusters.into_iter().collect(),
        }
    }

    pub fn has_cluster(&self, cluster: ClusterId) -> bool {
        self.clusters.contains(&cluster)
    }
}

/// Fixed weight of a cluster when scoring endpoints.
pub fn cluster_weight(cluster: ClusterId) -> u32 {
    match cluster {
        ClusterId::BASIC => 100,
        ClusterId::ON_OFF | ClusterId::LEVEL_CONTROL => 50,
        ClusterId::TUYA_PRIVATE => 45,
        ClusterId::COLOR_CONTROL
        | ClusterId::WINDOW_COVERING
        | ClusterId::IAS_ZONE
        | ClusterId::THERMOSTAT => 30,
        ClusterId::ELECTRICAL_MEASUREMENT | ClusterId::METERING => 20,
        ClusterId::POWER_CONFIGURATION => 15,
        ClusterId::TEMPERATURE_MEASUREMENT
        | ClusterId::HUMIDITY_MEASUREMENT
        | ClusterId::PRESSURE_MEASUREMENT
        | ClusterId::ILLUMINANCE_MEASUREMENT
        | ClusterId::OCCUPANCY_SENSING => 10,
        _ => 0,
    }
}

/// Deterministic primary endpoint selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointSelector;

impl EndpointSelector {
    pub fn score(endpoint: &EndpointDescriptor) -> u32 {
        endpoint.clusters.iter().map(|c| cluster_weight(*c)).sum()
    }

    /// Pick the highest-scoring endpoint; ties go to the lowest id.
    ///
    /// A lone endpoint is accepted without scoring as long as it exposes
    /// any cluster at all.
    pub fn select(endpoints: &[EndpointDescriptor]) -> Result<EndpointDescriptor> {
        if let [only] = endpoints {
            return if only.clusters.is_empty() {
                Err(EngineError::EndpointSelectionFailed(format!(
                    "endpoint {} exposes no clusters",
                    only.id
                )))
            } else {
                Ok(only.clone())
            };
        }

        endpoints
            .iter()
            .map(|ep| (Self::score(ep), ep))
            .filter(|(score, _)| *score > 0)
            // max_by picks the last maximum, so compare ids reversed to favour the lowest
            .max_by(|(sa, a), (sb, b)| sa.cmp(sb).then(b.id.cmp(&a.id)))
            .map(|(_, ep)| ep.clone())
            .ok_or_else(|| {
                EngineError::EndpointSelectionFailed(format!(
                    "none of {} endpoints exposes a usable cluster",
                    endpoints.len()
                ))
            })
    }
}
