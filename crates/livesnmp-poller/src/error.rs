//! Error types for the polling pipeline.
//!
//! [`ResolutionError`] and [`DecodeError`] stay inside the transport: they
//! are folded into per-OID failures or into a single [`SnmpError`], which is
//! the only error a poll cycle ever hands to the result sink.

use std::collections::BTreeMap;
use thiserror::Error;

/// Symbolic OID could not be translated to numeric form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The translator reported an error on stderr.
    #[error("Failed to translate OID '{oid}': {stderr}")]
    Lookup { oid: String, stderr: String },

    /// The translator could not be started.
    #[error("Failed to run OID translator for '{oid}': {message}")]
    Exec { oid: String, message: String },

    /// The translator exited cleanly without printing anything.
    #[error("OID translator returned nothing for '{oid}'")]
    Empty { oid: String },
}

/// Malformed `TYPE: VALUE` text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Missing type separator in '{0}'")]
    MissingSeparator(String),

    #[error("Invalid Hex-STRING value '{0}'")]
    InvalidHex(String),

    #[error("Invalid Timeticks value '{0}'")]
    InvalidTimeticks(String),
}

/// Failure of an SNMP GET exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnmpError {
    /// The agent did not answer within the exchange timeout.
    #[error("SNMP timeout: {0}")]
    Timeout(String),

    /// `snmpget` printed nothing at all.
    #[error("Empty reply in SNMP request")]
    EmptyReply,

    /// `snmpget` wrote to stderr, or could not be run.
    #[error("SNMP error: {0}")]
    DiagnosticOutput(String),

    /// Some values decoded, others did not.
    ///
    /// `values` and `failed` are keyed by the requested OID (or service name
    /// once the scheduler has mapped them); `failed` carries the reason.
    #[error(
        "Failed to decode {} of {} values",
        .failed.len(),
        .failed.len() + .values.len()
    )]
    PartialDecodeFailure {
        values: BTreeMap<String, String>,
        failed: BTreeMap<String, String>,
    },
}

impl SnmpError {
    /// Short machine-friendly name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SnmpError::Timeout(_) => "timeout",
            SnmpError::EmptyReply => "empty_reply",
            SnmpError::DiagnosticOutput(_) => "diagnostic_output",
            SnmpError::PartialDecodeFailure { .. } => "partial_decode_failure",
        }
    }

    /// Returns true when the cycle still produced some values.
    pub fn is_partial(&self) -> bool {
        matches!(self, SnmpError::PartialDecodeFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::Lookup {
            oid: "FOO-MIB::bar".to_string(),
            stderr: "Unknown object identifier".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to translate OID 'FOO-MIB::bar': Unknown object identifier"
        );
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::MissingSeparator("bogus".to_string());
        assert_eq!(err.to_string(), "Missing type separator in 'bogus'");
    }

    #[test]
    fn test_partial_decode_display() {
        let err = SnmpError::PartialDecodeFailure {
            values: BTreeMap::from([(".1.3.6.1.2.1.1.5.0".to_string(), "gw".to_string())]),
            failed: BTreeMap::from([(".1.3.6.1.2.1.1.3.0".to_string(), "bad".to_string())]),
        };
        assert_eq!(err.to_string(), "Failed to decode 1 of 2 values");
        assert!(err.is_partial());
        assert_eq!(err.kind(), "partial_decode_failure");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(SnmpError::EmptyReply.kind(), "empty_reply");
        assert_eq!(SnmpError::Timeout(String::new()).kind(), "timeout");
        assert!(!SnmpError::DiagnosticOutput("x".to_string()).is_partial());
    }
}
