//! Security-zone (IAS) enrollment.
//!
//! Zone sensors stay silent until the coordinator answers their enroll
//! request. Enrollment runs once while the session is binding, with its own
//! retry budget, and never holds the session back from becoming ready.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use zigbridge_core::event::now_millis;
use zigbridge_core::{EngineError, EngineEvent, EventBus};

use crate::radio::{RadioGuard, SharedRadio};
use crate::zcl::{ClusterId, ZclCommand};

/// Enrollment progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EnrollmentState {
    NotEnrolled,
    EnrollRequested { attempt: u32 },
    Enrolled,
    EnrollFailed { attempts: u32 },
}

impl EnrollmentState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotEnrolled => "not_enrolled",
            Self::EnrollRequested { .. } => "enroll_requested",
            Self::Enrolled => "enrolled",
            Self::EnrollFailed { .. } => "enroll_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Enrolled | Self::EnrollFailed { .. })
    }
}

impl std::fmt::Display for EnrollmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bounded enrollment sub-state machine for one zone.
#[derive(Debug, Clone)]
pub struct ZoneEnrollment {
    zone_id: u8,
    max_attempts: u32,
    attempts: u32,
    state: EnrollmentState,
}

impl ZoneEnrollment {
    pub fn new(zone_id: u8, max_attempts: u32) -> Self {
        Self {
            zone_id,
            max_attempts: max_attempts.max(1),
            attempts: 0,
            state: EnrollmentState::NotEnrolled,
        }
    }

    pub fn zone_id(&self) -> u8 {
        self.zone_id
    }

    pub fn state(&self) -> EnrollmentState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start the next attempt. `None` once enrolled or out of attempts.
    pub fn begin(&mut self) -> Option<u32> {
        if self.state.is_terminal() || self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        self.state = EnrollmentState::EnrollRequested {
            attempt: self.attempts,
        };
        Some(self.attempts)
    }

    pub fn record_success(&mut self) {
        self.state = EnrollmentState::Enrolled;
    }

    /// Record a failed attempt. Returns `true` when another attempt is allowed.
    pub fn record_failure(&mut self) -> bool {
        if self.attempts >= self.max_attempts {
            self.state = EnrollmentState::EnrollFailed {
                attempts: self.attempts,
            };
            false
        } else {
            true
        }
    }

    /// The device reported itself enrolled, e.g. `zoneState == 1`.
    /// Returns `true` if this changed the state.
    pub fn mark_enrolled(&mut self) -> bool {
        let changed = self.state != EnrollmentState::Enrolled;
        self.state = EnrollmentState::Enrolled;
        changed
    }

    /// Send enroll responses until one is acknowledged or the budget runs out.
    ///
    /// Teardown interrupts the loop and leaves the state where it was.
    pub(crate) async fn run(
        &mut self,
        radio: &SharedRadio,
        guard: &RadioGuard,
        endpoint: u8,
        timeout: Duration,
        retry_delay: Duration,
        bus: &EventBus,
        device_id: &str,
    ) -> EnrollmentState {
        while let Some(attempt) = self.begin() {
            self.publish(bus, device_id).await;

            let command = ZclCommand::enroll_success(self.zone_id);
            let result = guard
                .run(
                    timeout,
                    radio.write_zcl_command(endpoint, ClusterId::IAS_ZONE, command),
                )
                .await;

            match result {
                Ok(()) => {
                    tracing::info!(device_id, zone_id = self.zone_id, attempt, "Zone enrolled");
                    self.record_success();
                    self.publish(bus, device_id).await;
                    break;
                }
                Err(EngineError::Cancelled) => {
                    tracing::debug!(device_id, "Enrollment interrupted by teardown");
                    break;
                }
                Err(e) => {
                    tracing::warn!(device_id, attempt, error = %e, "Enroll response failed");
                    if !self.record_failure() {
                        self.publish(bus, device_id).await;
                        break;
                    }
                    if guard.is_shutdown() {
                        break;
                    }
                    tokio::time::sleep(retry_delay).await;
                }
            }
        }
        self.state
    }

    pub(crate) async fn publish(&self, bus: &EventBus, device_id: &str) {
        bus.publish_with_source(
            EngineEvent::EnrollmentChanged {
                device_id: device_id.to_string(),
                state: self.state.name().to_string(),
                attempts: self.attempts,
                timestamp: now_millis(),
            },
            "ias",
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_budget() {
        let mut enrollment = ZoneEnrollment::new(10, 2);
        assert_eq!(enrollment.state(), EnrollmentState::NotEnrolled);

        assert_eq!(enrollment.begin(), Some(1));
        assert_eq!(enrollment.state(), EnrollmentState::EnrollRequested { attempt: 1 });
        assert!(enrollment.record_failure());

        assert_eq!(enrollment.begin(), Some(2));
        assert!(!enrollment.record_failure());
        assert_eq!(enrollment.state(), EnrollmentState::EnrollFailed { attempts: 2 });
        assert_eq!(enrollment.begin(), None);
    }

    #[test]
    fn test_success_is_terminal() {
        let mut enrollment = ZoneEnrollment::new(10, 3);
        enrollment.begin();
        enrollment.record_success();
        assert_eq!(enrollment.state(), EnrollmentState::Enrolled);
        assert_eq!(enrollment.begin(), None);
        assert!(!enrollment.mark_enrolled());
    }

    #[test]
    fn test_device_report_overrides_failure() {
        let mut enrollment = ZoneEnrollment::new(10, 1);
        enrollment.begin();
        enrollment.record_failure();
        assert!(enrollment.mark_enrolled());
        assert_eq!(enrollment.state(), EnrollmentState::Enrolled);
    }

    #[test]
    fn test_zero_budget_still_tries_once() {
        let mut enrollment = ZoneEnrollment::new(10, 0);
        assert_eq!(enrollment.begin(), Some(1));
        assert_eq!(enrollment.begin(), None);
    }
}
