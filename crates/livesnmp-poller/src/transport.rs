//! SNMP GET exchanges through `snmpget`.
//!
//! One exchange is one `snmpget` run:
//!
//! ```text
//! snmpget -v2c -c public -O n -t 0.3 udp:192.0.2.1:161 .1.3.6.1.2.1.1.3.0 .1.3.6.1.2.1.1.5.0
//! ```
//!
//! which prints one `OID = TYPE: VALUE` record per requested OID. Records are
//! matched back to the request by their OID, never by position.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use livesnmp_common::exec::{command_line, SNMPGET_CMD};
use livesnmp_common::{CommandRunner, Host, RequestMode};

use crate::decode::decode;
use crate::error::SnmpError;
use crate::oid::{is_numeric_oid, normalize, OidResolver};

/// Exchange timeout suited to LAN polling.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

/// What `snmpget` prints when the agent never answers.
pub const TIMEOUT_SENTINEL: &str = "Timeout: No Response from";

/// Separator between the OID and the typed value of a record.
const RECORD_SEPARATOR: &str = " = ";

/// Reason attached to OIDs the agent left out of its reply.
const MISSING_REASON: &str = "no value in reply";

/// What one [`SnmpTransport::get_from_host`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostReply {
    pub result: Result<BTreeMap<String, String>, SnmpError>,
    /// Decoder notes for values that were passed through unchanged.
    pub notes: BTreeMap<String, String>,
}

/// Runs `snmpget` against a host and decodes what comes back.
pub struct SnmpTransport {
    runner: Arc<dyn CommandRunner>,
    resolver: Arc<OidResolver>,
    program: String,
    timeout: Duration,
}

impl SnmpTransport {
    pub fn new(runner: Arc<dyn CommandRunner>, resolver: Arc<OidResolver>) -> Self {
        Self {
            runner,
            resolver,
            program: SNMPGET_CMD.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Uses a different `snmpget` program (path or name).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Sets the per-exchange timeout passed to `snmpget -t`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn resolver(&self) -> &Arc<OidResolver> {
        &self.resolver
    }

    /// Arguments for one exchange.
    pub fn build_args(&self, host: &Host, oids: &[String]) -> Vec<String> {
        let mut args = vec![
            host.version.flag().to_string(),
            "-c".to_string(),
            host.community.clone(),
            "-O".to_string(),
            "n".to_string(),
            "-t".to_string(),
            format_timeout(self.timeout),
            host.endpoint(),
        ];
        args.extend(oids.iter().cloned());
        args
    }

    /// Command line of one exchange, for logs.
    pub fn command_line(&self, host: &Host, oids: &[String]) -> String {
        command_line(&self.program, &self.build_args(host, oids))
    }

    /// Fetches `oids` from `host`.
    ///
    /// The returned map is keyed by the OIDs exactly as requested. Timeouts,
    /// empty replies and anything printed on stderr fail the whole call.
    /// OIDs that could not be resolved, decoded or were left out of the
    /// reply are collected into [`SnmpError::PartialDecodeFailure`] next to
    /// the values that did decode.
    pub async fn get(
        &self,
        host: &Host,
        oids: &[String],
    ) -> Result<BTreeMap<String, String>, SnmpError> {
        self.fetch(host, oids).await.result
    }

    /// Fetches the OIDs of `services` (`(service name, OID)` pairs) and keys
    /// the result and the decoder notes by service name.
    pub async fn get_from_host(&self, host: &Host, services: &[(String, String)]) -> HostReply {
        let oids: Vec<String> = services.iter().map(|(_, oid)| oid.clone()).collect();
        let reply = self.fetch(host, &oids).await;

        let result = match reply.result {
            Ok(values) => Ok(by_service(services, &values)),
            Err(SnmpError::PartialDecodeFailure { values, failed }) => {
                Err(SnmpError::PartialDecodeFailure {
                    values: by_service(services, &values),
                    failed: by_service(services, &failed),
                })
            }
            Err(e) => Err(e),
        };

        HostReply {
            result,
            notes: by_service(services, &reply.notes),
        }
    }

    #[instrument(skip(self, host), fields(host = %host.name, mode = ?host.requests))]
    async fn fetch(&self, host: &Host, oids: &[String]) -> HostReply {
        let mut values = BTreeMap::new();
        let mut failed = BTreeMap::new();
        let mut notes = BTreeMap::new();

        // Wire OID (normalized) -> requested OIDs
        let mut requested: HashMap<String, Vec<String>> = HashMap::new();
        let mut wire_oids: Vec<String> = Vec::new();

        for oid in oids {
            let wire = if is_numeric_oid(oid) {
                oid.clone()
            } else {
                match self.resolver.resolve(oid, false).await {
                    Ok(numeric) => numeric,
                    Err(e) => {
                        failed.insert(oid.clone(), e.to_string());
                        continue;
                    }
                }
            };

            let wanted = requested.entry(normalize(&wire).to_string()).or_default();
            if wanted.is_empty() {
                wire_oids.push(wire);
            }
            if !wanted.contains(oid) {
                wanted.push(oid.clone());
            }
        }

        let batches: Vec<Vec<String>> = match host.requests {
            RequestMode::Multiple if !wire_oids.is_empty() => vec![wire_oids],
            RequestMode::Multiple => Vec::new(),
            RequestMode::Single => wire_oids.into_iter().map(|oid| vec![oid]).collect(),
        };

        for batch in &batches {
            let records = match self.exchange(host, batch).await {
                Ok(records) => records,
                Err(e) => {
                    return HostReply {
                        result: Err(e),
                        notes: BTreeMap::new(),
                    }
                }
            };
            for (returned, typed) in records {
                let Some(targets) = requested.get(normalize(&returned)) else {
                    warn!(oid = %returned, "Ignoring unrequested OID in reply");
                    continue;
                };
                match decode(&typed) {
                    Ok(decoded) => {
                        if let Some(note) = &decoded.note {
                            debug!(oid = %returned, note = %note, "Value passed through");
                        }
                        for target in targets {
                            values.insert(target.clone(), decoded.value.clone());
                            if let Some(note) = &decoded.note {
                                notes.insert(target.clone(), note.clone());
                            }
                        }
                    }
                    Err(e) => {
                        warn!(oid = %returned, error = %e, "Failed to decode value");
                        for target in targets {
                            failed.insert(target.clone(), e.to_string());
                        }
                    }
                }
            }
        }

        for target in requested.values().flatten() {
            if !values.contains_key(target) && !failed.contains_key(target) {
                failed.insert(target.clone(), MISSING_REASON.to_string());
            }
        }

        let result = if failed.is_empty() {
            Ok(values)
        } else {
            Err(SnmpError::PartialDecodeFailure { values, failed })
        };
        HostReply { result, notes }
    }

    /// Runs one `snmpget` and splits its reply into `(OID, TYPE: VALUE)`.
    async fn exchange(
        &self,
        host: &Host,
        oids: &[String],
    ) -> Result<Vec<(String, String)>, SnmpError> {
        let args = self.build_args(host, oids);
        let result = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|e| SnmpError::DiagnosticOutput(e.to_string()))?;

        if result.stderr.starts_with(TIMEOUT_SENTINEL) {
            return Err(SnmpError::Timeout(result.stderr));
        }
        if result.has_diagnostics() {
            return Err(SnmpError::DiagnosticOutput(result.stderr));
        }
        if result.stdout.starts_with(TIMEOUT_SENTINEL) {
            return Err(SnmpError::Timeout(result.stdout));
        }
        if result.stdout.trim().is_empty() {
            return Err(SnmpError::EmptyReply);
        }

        Ok(parse_records(&result.stdout))
    }
}

impl std::fmt::Debug for SnmpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpTransport")
            .field("program", &self.program)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Renders a timeout in seconds the way `snmpget -t` expects (`0.3`, `1`).
pub fn format_timeout(timeout: Duration) -> String {
    format!("{}", timeout.as_secs_f64())
}

/// Splits `snmpget -O n` output into records.
///
/// A record starts with a numeric OID followed by ` = `. Any other line,
/// blank lines included, continues the previous value (multi-line strings).
/// Blank lines before the first record or after the last line of a value
/// are dropped.
pub fn parse_records(stdout: &str) -> Vec<(String, String)> {
    let mut records: Vec<(String, String)> = Vec::new();
    let mut blank_lines = 0;

    for line in stdout.lines() {
        if line.trim().is_empty() {
            if !records.is_empty() {
                blank_lines += 1;
            }
            continue;
        }
        match line.split_once(RECORD_SEPARATOR) {
            Some((oid, typed)) if is_numeric_oid(oid) => {
                records.push((oid.to_string(), typed.to_string()));
            }
            _ => match records.last_mut() {
                Some((_, typed)) => {
                    for _ in 0..blank_lines {
                        typed.push('\n');
                    }
                    typed.push('\n');
                    typed.push_str(line);
                }
                None => warn!(line = %line, "Ignoring unexpected line in reply"),
            },
        }
        blank_lines = 0;
    }

    records
}

fn by_service(
    services: &[(String, String)],
    by_oid: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    services
        .iter()
        .filter_map(|(name, oid)| by_oid.get(oid).map(|v| (name.clone(), v.clone())))
        .collect()
}
