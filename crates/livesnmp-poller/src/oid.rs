//! Symbolic to numeric OID translation.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use livesnmp_common::exec::SNMPTRANSLATE_CMD;
use livesnmp_common::CommandRunner;

use crate::error::ResolutionError;

/// Returns true for OIDs made only of digits and dots.
pub fn is_numeric_oid(oid: &str) -> bool {
    !oid.is_empty()
        && oid.bytes().any(|b| b.is_ascii_digit())
        && oid.bytes().all(|b| b.is_ascii_digit() || b == b'.')
}

/// Strips the leading dot `snmpget -O n` puts in front of numeric OIDs.
pub fn normalize(oid: &str) -> &str {
    oid.strip_prefix('.').unwrap_or(oid)
}

/// Memoizing wrapper around `snmptranslate -On`.
///
/// One resolver is shared by every poll session of the process. The cache
/// lock is held for the whole lookup, so two sessions asking for the same
/// unresolved name run the translator once.
pub struct OidResolver {
    runner: Arc<dyn CommandRunner>,
    program: String,
    cache: Mutex<HashMap<String, String>>,
}

impl OidResolver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: SNMPTRANSLATE_CMD.to_string(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Uses a different translator program (path or name).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Translates `oid` to numeric form.
    ///
    /// Cached translations are returned without running the translator
    /// unless `force` is set. Failed lookups are never cached.
    #[instrument(skip(self))]
    pub async fn resolve(&self, oid: &str, force: bool) -> Result<String, ResolutionError> {
        let mut cache = self.cache.lock().await;
        if !force {
            if let Some(numeric) = cache.get(oid) {
                return Ok(numeric.clone());
            }
        }

        let args = vec!["-On".to_string(), oid.to_string()];
        let result = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|e| ResolutionError::Exec {
                oid: oid.to_string(),
                message: e.to_string(),
            })?;

        if result.has_diagnostics() {
            warn!(oid = %oid, stderr = %result.stderr, "OID translation failed");
            return Err(ResolutionError::Lookup {
                oid: oid.to_string(),
                stderr: result.stderr,
            });
        }

        let numeric = result.stdout.trim_end_matches(['\r', '\n']).trim().to_string();
        if numeric.is_empty() {
            return Err(ResolutionError::Empty {
                oid: oid.to_string(),
            });
        }

        debug!(oid = %oid, numeric = %numeric, "Resolved OID");
        cache.insert(oid.to_string(), numeric.clone());
        Ok(numeric)
    }

    /// Cached translation for `oid`, if any.
    pub async fn cached(&self, oid: &str) -> Option<String> {
        self.cache.lock().await.get(oid).cloned()
    }

    /// Number of cached translations.
    pub async fn len(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.lock().await.is_empty()
    }
}

impl std::fmt::Debug for OidResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidResolver")
            .field("program", &self.program)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesnmp_common::ExecResult;
    use livesnmp_test::ScriptedRunner;

    const SYS_NAME: &str = "SNMPv2-MIB::sysName.0";
    const SYS_NAME_NUMERIC: &str = ".1.3.6.1.2.1.1.5.0";

    fn resolver(runner: &Arc<ScriptedRunner>) -> OidResolver {
        OidResolver::new(runner.clone())
    }

    #[test]
    fn test_is_numeric_oid() {
        assert!(is_numeric_oid(".1.3.6.1.2.1.1.5.0"));
        assert!(is_numeric_oid("1.3.6.1.2.1.1.5.0"));
        assert!(!is_numeric_oid(SYS_NAME));
        assert!(!is_numeric_oid("sysName.0"));
        assert!(!is_numeric_oid(""));
        assert!(!is_numeric_oid("..."));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(".1.3.6"), "1.3.6");
        assert_eq!(normalize("1.3.6"), "1.3.6");
    }

    #[tokio::test]
    async fn test_resolve_caches_translation() {
        let runner = Arc::new(ScriptedRunner::new().on_translate(SYS_NAME, SYS_NAME_NUMERIC));
        let resolver = resolver(&runner);

        assert_eq!(resolver.resolve(SYS_NAME, false).await.unwrap(), SYS_NAME_NUMERIC);
        assert_eq!(resolver.resolve(SYS_NAME, false).await.unwrap(), SYS_NAME_NUMERIC);

        assert_eq!(runner.call_count(), 1);
        let call = &runner.calls()[0];
        assert_eq!(call.program, "snmptranslate");
        assert_eq!(call.args, vec!["-On".to_string(), SYS_NAME.to_string()]);
        assert_eq!(resolver.cached(SYS_NAME).await.as_deref(), Some(SYS_NAME_NUMERIC));
    }

    #[tokio::test]
    async fn test_force_lookup_runs_translator_again() {
        let runner = Arc::new(ScriptedRunner::new().on_translate(SYS_NAME, SYS_NAME_NUMERIC));
        let resolver = resolver(&runner);

        resolver.resolve(SYS_NAME, false).await.unwrap();
        resolver.resolve(SYS_NAME, true).await.unwrap();

        assert_eq!(runner.call_count(), 2);
        assert_eq!(resolver.len().await, 1);
    }

    #[tokio::test]
    async fn test_stderr_fails_and_is_not_cached() {
        let runner = Arc::new(ScriptedRunner::new().on_program(
            "snmptranslate",
            ExecResult::with_stderr(2, "Unknown object identifier: FOO-MIB::bar"),
        ));
        let resolver = resolver(&runner);

        let err = resolver.resolve("FOO-MIB::bar", false).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Lookup { .. }));
        assert!(resolver.is_empty().await);

        resolver.resolve("FOO-MIB::bar", false).await.unwrap_err();
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_output_fails() {
        let runner = Arc::new(
            ScriptedRunner::new().on_program("snmptranslate", ExecResult::with_stdout("")),
        );
        let err = resolver(&runner).resolve(SYS_NAME, false).await.unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Empty {
                oid: SYS_NAME.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let runner = Arc::new(ScriptedRunner::new().fail_spawn("snmptranslate"));
        let err = resolver(&runner).resolve(SYS_NAME, false).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Exec { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_share_one_lookup() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on_translate(SYS_NAME, SYS_NAME_NUMERIC)
                .with_delay(std::time::Duration::from_millis(20)),
        );
        let resolver = Arc::new(resolver(&runner));

        let a = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(SYS_NAME, false).await }
        });
        let b = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve(SYS_NAME, false).await }
        });

        assert_eq!(a.await.unwrap().unwrap(), SYS_NAME_NUMERIC);
        assert_eq!(b.await.unwrap().unwrap(), SYS_NAME_NUMERIC);
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_custom_program() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on_program("/opt/net-snmp/bin/snmptranslate", ExecResult::with_stdout(".1.3")),
        );
        let resolver = OidResolver::new(runner.clone()).with_program("/opt/net-snmp/bin/snmptranslate");
        assert_eq!(resolver.resolve("iso.3", false).await.unwrap(), ".1.3");
    }
}
