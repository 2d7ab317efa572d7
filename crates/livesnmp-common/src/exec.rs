//! External command execution for the Net-SNMP tools.
//!
//! Commands are spawned directly from an argument vector, never through a
//! shell, so host-supplied values such as community strings cannot inject
//! anything. [`shellquote`] is only used to render a copy-pasteable command
//! line for logs and error messages.
//!
//! The [`CommandRunner`] trait is the seam between the poller and the
//! operating system: production code uses [`SystemRunner`], tests inject a
//! scripted runner.
//!
//! # Example
//!
//! ```ignore
//! use livesnmp_common::exec::{self, SNMPTRANSLATE_CMD};
//!
//! let args = vec!["-On".to_string(), "SNMPv2-MIB::sysName.0".to_string()];
//! let result = exec::exec(SNMPTRANSLATE_CMD, &args).await?;
//! println!("{}", result.stdout);
//! ```

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{LiveSnmpError, LiveSnmpResult};

/// Net-SNMP GET client.
pub const SNMPGET_CMD: &str = "snmpget";

/// Net-SNMP OID name translator.
pub const SNMPTRANSLATE_CMD: &str = "snmptranslate";

/// Regex for characters that need escaping in shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Arguments made only of these characters are rendered without quotes.
static SHELL_SAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:/=@%+,-]+$").expect("Invalid regex pattern"));

/// Quotes a string for safe use in a shell command line.
///
/// Wraps the string in double quotes and escapes `$`, `` ` ``, `"`, `\`
/// and newline.
///
/// ```
/// use livesnmp_common::exec::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

/// Renders a program and its arguments as a single shell line.
///
/// Plain arguments are left bare; anything else goes through [`shellquote`].
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        if SHELL_SAFE_RE.is_match(arg) {
            line.push_str(arg);
        } else {
            line.push_str(&shellquote(arg));
        }
    }
    line
}

/// Result of an external command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// The exit code of the command (0 = success).
    pub exit_code: i32,
    /// The stdout output, surrounding whitespace trimmed.
    pub stdout: String,
    /// The stderr output, surrounding whitespace trimmed.
    pub stderr: String,
}

impl ExecResult {
    /// Builds a successful result with the given stdout.
    pub fn with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed result with the given stderr.
    pub fn with_stderr(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true if the command wrote anything to stderr.
    ///
    /// The Net-SNMP tools report every failure there, whatever the exit code.
    pub fn has_diagnostics(&self) -> bool {
        !self.stderr.is_empty()
    }
}

/// Runs an external program and collects its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` and waits for it to exit.
    ///
    /// Returns `Err` only when the program could not be spawned; a non-zero
    /// exit is reported through [`ExecResult::exit_code`].
    async fn run(&self, program: &str, args: &[String]) -> LiveSnmpResult<ExecResult>;
}

/// [`CommandRunner`] that spawns real processes with tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> LiveSnmpResult<ExecResult> {
        exec(program, args).await
    }
}

/// Executes a program asynchronously, capturing stdout and stderr.
///
/// The child is killed if the returned future is dropped before it exits.
pub async fn exec(program: &str, args: &[String]) -> LiveSnmpResult<ExecResult> {
    let line = command_line(program, args);
    tracing::debug!(command = %line, "Executing command");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| LiveSnmpError::CommandExec {
            command: line.clone(),
            source: e,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    let result = ExecResult {
        exit_code,
        stdout,
        stderr,
    };

    if result.success() {
        tracing::trace!(command = %line, exit_code = exit_code, "Command succeeded");
    } else {
        tracing::debug!(
            command = %line,
            exit_code = exit_code,
            stderr = %result.stderr,
            "Command failed"
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_shellquote_simple() {
        assert_eq!(shellquote("simple"), "\"simple\"");
        assert_eq!(shellquote("public"), "\"public\"");
    }

    #[test]
    fn test_shellquote_special_chars() {
        assert_eq!(shellquote("$HOME"), "\"\\$HOME\"");
        assert_eq!(shellquote("`whoami`"), "\"\\`whoami\\`\"");
        assert_eq!(shellquote("say \"hello\""), "\"say \\\"hello\\\"\"");
        assert_eq!(shellquote("path\\to"), "\"path\\\\to\"");
    }

    #[test]
    fn test_shellquote_empty() {
        assert_eq!(shellquote(""), "\"\"");
    }

    #[test]
    fn test_command_line_plain_args() {
        let line = command_line(
            SNMPGET_CMD,
            &args(&["-v2c", "-c", "public", "udp:10.0.0.1:161", ".1.3.6.1.2.1.1.5.0"]),
        );
        assert_eq!(line, "snmpget -v2c -c public udp:10.0.0.1:161 .1.3.6.1.2.1.1.5.0");
    }

    #[test]
    fn test_command_line_quotes_unsafe_args() {
        let line = command_line(SNMPGET_CMD, &args(&["-c", "my community$"]));
        assert_eq!(line, "snmpget -c \"my community\\$\"");
    }

    #[test]
    fn test_exec_result_success() {
        let result = ExecResult::with_stdout("output");
        assert!(result.success());
        assert!(!result.has_diagnostics());
    }

    #[test]
    fn test_exec_result_failure() {
        let result = ExecResult::with_stderr(1, "error message");
        assert!(!result.success());
        assert!(result.has_diagnostics());
    }

    #[tokio::test]
    async fn test_exec_echo() {
        let result = exec("echo", &args(&["hello"])).await.unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, "hello");
    }

    #[tokio::test]
    async fn test_exec_failure_exit_code() {
        let result = exec("sh", &args(&["-c", "echo oops >&2; exit 42"]))
            .await
            .unwrap();
        assert!(!result.success());
        assert_eq!(result.exit_code, 42);
        assert_eq!(result.stderr, "oops");
    }

    #[tokio::test]
    async fn test_exec_missing_program() {
        let result = SystemRunner
            .run("/nonexistent/livesnmp-no-such-tool", &[])
            .await;
        match result {
            Err(LiveSnmpError::CommandExec { command, .. }) => {
                assert!(command.contains("livesnmp-no-such-tool"));
            }
            other => panic!("Expected CommandExec error, got {:?}", other),
        }
    }
}
