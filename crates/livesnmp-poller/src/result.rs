//! Poll cycle results as handed to a [`crate::PollSink`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::SnmpError;

/// Value of one service after a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PolledValue {
    Value {
        value: String,
        timestamp: DateTime<Utc>,
        /// Set when the decoder passed an unexpected type through.
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },
    Failed {
        reason: String,
    },
}

impl PolledValue {
    pub fn value(&self) -> Option<&str> {
        match self {
            PolledValue::Value { value, .. } => Some(value),
            PolledValue::Failed { .. } => None,
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            PolledValue::Value { note, .. } => note.as_deref(),
            PolledValue::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PolledValue::Failed { .. })
    }
}

/// What a cycle produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every service decoded.
    Values(BTreeMap<String, PolledValue>),

    /// Some services failed; `values` holds both kinds and `error` is the
    /// aggregated [`SnmpError::PartialDecodeFailure`].
    Partial {
        values: BTreeMap<String, PolledValue>,
        error: SnmpError,
    },

    /// The exchange failed as a whole.
    Failed(SnmpError),
}

/// Result of one poll cycle of one host, keyed by service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: PollOutcome,
}

impl PollResult {
    /// Builds a result from what [`crate::SnmpTransport::get_from_host`]
    /// returned. Decoded values are stamped with `finished_at`.
    pub fn new(
        host: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        reply: Result<BTreeMap<String, String>, SnmpError>,
    ) -> Self {
        let stamp = |values: BTreeMap<String, String>| -> BTreeMap<String, PolledValue> {
            values
                .into_iter()
                .map(|(service, value)| {
                    (
                        service,
                        PolledValue::Value {
                            value,
                            timestamp: finished_at,
                            note: None,
                        },
                    )
                })
                .collect()
        };

        let outcome = match reply {
            Ok(values) => PollOutcome::Values(stamp(values)),
            Err(SnmpError::PartialDecodeFailure { values, failed }) => {
                let error = SnmpError::PartialDecodeFailure {
                    values: values.clone(),
                    failed: failed.clone(),
                };
                let mut merged = stamp(values);
                for (service, reason) in failed {
                    merged.insert(service, PolledValue::Failed { reason });
                }
                PollOutcome::Partial {
                    values: merged,
                    error,
                }
            }
            Err(e) => PollOutcome::Failed(e),
        };

        Self {
            host: host.into(),
            started_at,
            finished_at,
            outcome,
        }
    }

    /// Attaches decoder notes (keyed by service) to the matching values.
    pub fn with_notes(mut self, notes: BTreeMap<String, String>) -> Self {
        let values = match &mut self.outcome {
            PollOutcome::Values(values) | PollOutcome::Partial { values, .. } => values,
            PollOutcome::Failed(_) => return self,
        };
        for (service, text) in notes {
            if let Some(PolledValue::Value { note, .. }) = values.get_mut(&service) {
                *note = Some(text);
            }
        }
        self
    }

    /// Returns true when every service decoded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, PollOutcome::Values(_))
    }

    pub fn error(&self) -> Option<&SnmpError> {
        match &self.outcome {
            PollOutcome::Values(_) => None,
            PollOutcome::Partial { error, .. } | PollOutcome::Failed(error) => Some(error),
        }
    }

    /// Per-service values, `None` when the exchange failed as a whole.
    pub fn values(&self) -> Option<&BTreeMap<String, PolledValue>> {
        match &self.outcome {
            PollOutcome::Values(values) | PollOutcome::Partial { values, .. } => Some(values),
            PollOutcome::Failed(_) => None,
        }
    }

    /// Decoded value of `service`, if it has one.
    pub fn value(&self, service: &str) -> Option<&str> {
        self.values()?.get(service)?.value()
    }

    /// Services without a value in this cycle.
    pub fn failed_services(&self) -> Vec<&str> {
        self.values()
            .map(|values| {
                values
                    .iter()
                    .filter(|(_, v)| v.is_failed())
                    .map(|(service, _)| service.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Wall time the cycle took.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Flat, serializable view used for JSON output.
    pub fn report(&self) -> PollReport<'_> {
        let status = match &self.outcome {
            PollOutcome::Values(_) => "ok",
            PollOutcome::Partial { .. } => "partial",
            PollOutcome::Failed(_) => "failed",
        };
        PollReport {
            host: &self.host,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status,
            error_kind: self.error().map(SnmpError::kind),
            error: self.error().map(ToString::to_string),
            values: self.values(),
        }
    }
}

/// JSON line written by `livesnmpd --json`.
#[derive(Debug, Serialize)]
pub struct PollReport<'a> {
    pub host: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<&'a BTreeMap<String, PolledValue>>,
}
