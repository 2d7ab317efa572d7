//! Consumers of poll results.

use std::io::Write;
use tracing::{error, info, warn};

use livesnmp_common::Host;

use crate::result::{PollOutcome, PollResult};

/// Receives the results of a [`crate::PollScheduler`].
///
/// The scheduler owns its sink and calls it from the task that drives
/// [`crate::PollScheduler::process_next`], so calls never overlap.
pub trait PollSink: Send {
    /// A cycle for `services` of `host` has started; values shown so far
    /// are stale.
    fn poll_started(&mut self, _host: &Host, _services: &[String]) {}

    /// A cycle has finished.
    fn poll_result(&mut self, result: PollResult);
}

impl<S: PollSink + ?Sized> PollSink for Box<S> {
    fn poll_started(&mut self, host: &Host, services: &[String]) {
        (**self).poll_started(host, services)
    }

    fn poll_result(&mut self, result: PollResult) {
        (**self).poll_result(result)
    }
}

/// Logs every result through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PollSink for LogSink {
    fn poll_result(&mut self, result: PollResult) {
        let elapsed_ms = result.elapsed().num_milliseconds();
        match &result.outcome {
            PollOutcome::Values(values) => {
                for (service, value) in values {
                    info!(
                        host = %result.host,
                        service = %service,
                        value = value.value().unwrap_or_default(),
                        note = value.note(),
                        "Polled value"
                    );
                }
                info!(host = %result.host, elapsed_ms, count = values.len(), "Poll complete");
            }
            PollOutcome::Partial { values, error } => {
                for (service, value) in values {
                    match value.value() {
                        Some(v) => info!(
                            host = %result.host,
                            service = %service,
                            value = v,
                            note = value.note(),
                            "Polled value"
                        ),
                        None => warn!(host = %result.host, service = %service, "No data"),
                    }
                }
                warn!(host = %result.host, elapsed_ms, error = %error, "Poll incomplete");
            }
            PollOutcome::Failed(error) => {
                warn!(
                    host = %result.host,
                    elapsed_ms,
                    kind = error.kind(),
                    error = %error,
                    "Poll failed"
                );
            }
        }
    }
}

/// Writes one JSON object per result.
pub struct JsonSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> PollSink for JsonSink<W> {
    fn poll_result(&mut self, result: PollResult) {
        let line = match serde_json::to_string(&result.report()) {
            Ok(line) => line,
            Err(e) => {
                error!(host = %result.host, error = %e, "Failed to serialize poll result");
                return;
            }
        };
        if let Err(e) = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush()) {
            error!(host = %result.host, error = %e, "Failed to write poll result");
        }
    }
}
