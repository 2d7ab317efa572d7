//! Wiring used by `livesnmpd`: one scheduler per selected host.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use livesnmp_common::{
    CommandRunner, Host, LiveSnmpError, LiveSnmpResult, PollerConfig, PollerSettings, Registry,
};

use crate::oid::OidResolver;
use crate::scheduler::{PollScheduler, PollSession};
use crate::sink::PollSink;
use crate::transport::SnmpTransport;

/// Command line choices that shape a daemon run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Hosts to poll by name; empty means every host.
    pub hosts: Vec<String>,
    /// Restrict to hosts of this group.
    pub group: Option<String>,
    /// Poll each host once and exit.
    pub once: bool,
    /// Overrides `poller.interval_ms`.
    pub interval: Option<Duration>,
}

/// Hosts matching `names` and `group`, ordered by name.
///
/// Unknown host names are an error.
pub fn select_hosts(
    registry: &Registry,
    names: &[String],
    group: Option<&str>,
) -> LiveSnmpResult<Vec<Host>> {
    let mut hosts: Vec<Host> = match (names.is_empty(), group) {
        (true, Some(group)) => registry.hosts_in_group(group).cloned().collect(),
        (true, None) => registry.hosts().cloned().collect(),
        (false, _) => {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let host = registry.host(name)?;
                if group.map_or(true, |g| host.group.as_deref() == Some(g)) {
                    selected.push(host.clone());
                }
            }
            selected
        }
    };

    hosts.sort_by(|a, b| a.name.cmp(&b.name));
    hosts.dedup_by(|a, b| a.name == b.name);
    Ok(hosts)
}

/// Transport (and its resolver) configured from `settings`.
pub fn build_transport(settings: &PollerSettings, runner: Arc<dyn CommandRunner>) -> Arc<SnmpTransport> {
    let resolver =
        Arc::new(OidResolver::new(Arc::clone(&runner)).with_program(&settings.snmptranslate_path));
    Arc::new(
        SnmpTransport::new(runner, resolver)
            .with_program(&settings.snmpget_path)
            .with_timeout(settings.timeout()),
    )
}

/// Polls the selected hosts until `shutdown` is cancelled (or once each,
/// with [`DaemonOptions::once`]) and returns their sinks.
///
/// Every host gets its own scheduler and sink from `make_sink`; the OID
/// resolver is shared.
pub async fn run<S, F>(
    config: &PollerConfig,
    options: &DaemonOptions,
    runner: Arc<dyn CommandRunner>,
    make_sink: F,
    shutdown: CancellationToken,
) -> LiveSnmpResult<Vec<S>>
where
    S: PollSink + 'static,
    F: Fn(&Host) -> S,
{
    let registry = config.registry();
    let hosts = select_hosts(&registry, &options.hosts, options.group.as_deref())?;
    if hosts.is_empty() {
        return Err(LiveSnmpError::invalid_config("hosts", "no host selected for polling"));
    }

    let interval = options.interval.unwrap_or_else(|| config.poller.interval());
    if interval.is_zero() {
        return Err(LiveSnmpError::invalid_config("interval", "interval must be > 0"));
    }
    let transport = build_transport(&config.poller, runner);
    let timer_enabled = config.poller.timer_enabled && !options.once;

    info!(
        hosts = hosts.len(),
        interval_ms = interval.as_millis() as u64,
        timer_enabled,
        "Starting pollers"
    );

    let mut tasks = JoinSet::new();
    for host in &hosts {
        let session = PollSession::from_registry(&registry, &host.name)?;
        let mut scheduler = PollScheduler::new(session, Arc::clone(&transport), make_sink(host))
            .with_interval(interval)
            .with_timer_enabled(timer_enabled);
        let shutdown = shutdown.clone();
        let once = options.once;

        tasks.spawn(async move {
            if once {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = scheduler.poll_once() => {}
                }
            } else {
                scheduler.run(shutdown).await;
            }
            scheduler.into_sink()
        });
    }

    let mut sinks = Vec::with_capacity(hosts.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(sink) => sinks.push(sink),
            Err(e) => error!(error = %e, "Poller task failed"),
        }
    }

    info!(hosts = sinks.len(), "Pollers finished");
    Ok(sinks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use livesnmp_test::{host_fixtures, system_registry, ScriptedRunner};
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        let mut registry = system_registry();
        let mut core = host_fixtures::router("core");
        core.group = Some("backbone".to_string());
        registry.add_host(core);
        registry.add_host(host_fixtures::router("edge"));
        registry.add_host(host_fixtures::single_request_switch("access"));
        registry
    }

    fn names(hosts: &[Host]) -> Vec<&str> {
        hosts.iter().map(|h| h.name.as_str()).collect()
    }

    #[test]
    fn test_select_all_hosts() {
        let hosts = select_hosts(&registry(), &[], None).unwrap();
        assert_eq!(names(&hosts), vec!["access", "core", "edge"]);
    }

    #[test]
    fn test_select_by_name_and_group() {
        let registry = registry();
        let hosts = select_hosts(&registry, &["edge".to_string(), "core".to_string()], None).unwrap();
        assert_eq!(names(&hosts), vec!["core", "edge"]);

        let hosts = select_hosts(&registry, &[], Some("backbone")).unwrap();
        assert_eq!(names(&hosts), vec!["core"]);

        let hosts = select_hosts(&registry, &["edge".to_string()], Some("backbone")).unwrap();
        assert!(hosts.is_empty());
    }

    #[test]
    fn test_select_unknown_host() {
        let err = select_hosts(&registry(), &["nope".to_string()], None).unwrap_err();
        assert!(err.is_lookup_failure());
    }

    #[test]
    fn test_build_transport_uses_settings() {
        let settings = PollerSettings {
            snmpget_path: "/opt/bin/snmpget".to_string(),
            timeout_ms: 1500,
            ..PollerSettings::default()
        };
        let transport = build_transport(&settings, Arc::new(ScriptedRunner::new()));
        let line = transport.command_line(&host_fixtures::router("gw"), &["1.3".to_string()]);
        assert!(line.starts_with("/opt/bin/snmpget -v2c"));
        assert!(line.contains("-t 1.5"));
    }

    #[tokio::test]
    async fn test_run_rejects_zero_interval() {
        let runner = Arc::new(ScriptedRunner::new());
        let mut config = PollerConfig::default();
        config.hosts.push(host_fixtures::router("gw"));
        let options = DaemonOptions {
            interval: Some(Duration::ZERO),
            ..DaemonOptions::default()
        };

        let result = run(
            &config,
            &options,
            runner.clone(),
            |_| crate::sink::LogSink,
            CancellationToken::new(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(runner.call_count(), 0);
    }
}
