//! Scripted command runner
//!
//! Answers invocations from a list of rules instead of spawning processes.
//! Rules are checked in insertion order; the first match wins. Unmatched
//! invocations get a failing result with a diagnostic on stderr, which the
//! poller treats like any other tool error.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use livesnmp_common::exec::{command_line, SNMPGET_CMD, SNMPTRANSLATE_CMD};
use livesnmp_common::{CommandRunner, ExecResult, LiveSnmpError, LiveSnmpResult};

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Last argument, which is the OID for single-OID exchanges.
    pub fn last_arg(&self) -> Option<&str> {
        self.args.last().map(String::as_str)
    }
}

type Matcher = Box<dyn Fn(&str, &[String]) -> bool + Send + Sync>;

enum Response {
    Output(ExecResult),
    SpawnError,
}

struct Rule {
    matcher: Matcher,
    response: Response,
}

/// [`CommandRunner`] driven by canned responses.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Invocation>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedRunner {
    /// Creates a runner with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers any invocation accepted by `matcher`.
    pub fn on<F>(mut self, matcher: F, result: ExecResult) -> Self
    where
        F: Fn(&str, &[String]) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            matcher: Box::new(matcher),
            response: Response::Output(result),
        });
        self
    }

    /// Answers every invocation of `program`.
    pub fn on_program(self, program: &str, result: ExecResult) -> Self {
        let program = program.to_string();
        self.on(move |p, _| p == program, result)
    }

    /// Answers `snmpget` invocations whose last argument is `oid`.
    pub fn on_get(self, oid: &str, result: ExecResult) -> Self {
        let oid = oid.to_string();
        self.on(
            move |p, args| p == SNMPGET_CMD && args.last() == Some(&oid),
            result,
        )
    }

    /// Answers `snmpget` invocations that request every OID in `oids`.
    pub fn on_get_all(self, oids: &[&str], result: ExecResult) -> Self {
        let oids: Vec<String> = oids.iter().map(|s| s.to_string()).collect();
        self.on(
            move |p, args| p == SNMPGET_CMD && oids.iter().all(|o| args.contains(o)),
            result,
        )
    }

    /// Translates `symbolic` into `numeric`.
    pub fn on_translate(self, symbolic: &str, numeric: &str) -> Self {
        let symbolic = symbolic.to_string();
        self.on(
            move |p, args| p == SNMPTRANSLATE_CMD && args.last() == Some(&symbolic),
            ExecResult::with_stdout(format!("{}\n", numeric)),
        )
    }

    /// Fails to spawn `program`.
    pub fn fail_spawn(mut self, program: &str) -> Self {
        let program = program.to_string();
        self.rules.push(Rule {
            matcher: Box::new(move |p, _| p == program),
            response: Response::SpawnError,
        });
        self
    }

    /// Delays every answer, simulating an exchange in flight.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// All recorded invocations, oldest first.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of recorded invocations of `program`.
    pub fn calls_to(&self, program: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.program == program).count()
    }

    /// Highest number of invocations that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> LiveSnmpResult<ExecResult> {
        self.calls.lock().push(Invocation {
            program: program.to_string(),
            args: args.to_vec(),
        });

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let rule = self.rules.iter().find(|r| (r.matcher)(program, args));
        match rule.map(|r| &r.response) {
            Some(Response::Output(result)) => Ok(result.clone()),
            Some(Response::SpawnError) => Err(LiveSnmpError::CommandExec {
                command: command_line(program, args),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
            None => Ok(ExecResult::with_stderr(
                1,
                format!("no scripted response for: {}", command_line(program, args)),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_first_matching_rule_wins() {
        let runner = ScriptedRunner::new()
            .on_get(".1.3.6.1.2.1.1.5.0", ExecResult::with_stdout("first"))
            .on_program("snmpget", ExecResult::with_stdout("second"));

        let result = runner
            .run("snmpget", &args(&["-v2c", ".1.3.6.1.2.1.1.5.0"]))
            .await
            .unwrap();
        assert_eq!(result.stdout, "first");

        let result = runner.run("snmpget", &args(&["-v2c", ".1.3"])).await.unwrap();
        assert_eq!(result.stdout, "second");
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_invocation_reports_on_stderr() {
        let runner = ScriptedRunner::new();
        let result = runner.run("snmpget", &args(&["-v1"])).await.unwrap();
        assert!(result.has_diagnostics());
        assert!(result.stderr.contains("snmpget -v1"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let runner = ScriptedRunner::new().fail_spawn("snmpget");
        assert!(runner.run("snmpget", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_records_calls() {
        let runner = ScriptedRunner::new().on_translate("SNMPv2-MIB::sysName.0", ".1.3.6.1.2.1.1.5.0");
        let result = runner
            .run("snmptranslate", &args(&["-On", "SNMPv2-MIB::sysName.0"]))
            .await
            .unwrap();
        assert_eq!(result.stdout, ".1.3.6.1.2.1.1.5.0\n");
        assert_eq!(runner.calls_to("snmptranslate"), 1);
        assert_eq!(runner.calls()[0].last_arg(), Some("SNMPv2-MIB::sysName.0"));
        assert_eq!(runner.max_in_flight(), 1);
    }
}
