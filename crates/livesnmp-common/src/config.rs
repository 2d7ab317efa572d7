//! Configuration file support for livesnmp
//!
//! Loads and validates the poller settings together with the host, service
//! and device records from a TOML file.
//! Default location: /etc/livesnmp/livesnmpd.toml
//!
//! The records are read-only inputs to the poller: they are collected into
//! a [`Registry`] owned by the caller and passed by reference to whatever
//! builds poll sessions.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{LiveSnmpError, LiveSnmpResult};
use crate::exec::{SNMPGET_CMD, SNMPTRANSLATE_CMD};

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/livesnmp/livesnmpd.toml";

/// Standard SNMP agent port.
pub const DEFAULT_SNMP_PORT: u16 = 161;

/// Community used when a host does not set one.
pub const DEFAULT_COMMUNITY: &str = "public";

/// Characters rejected in host names and addresses.
const FORBIDDEN_HOST_CHARS: [char; 3] = ['\'', '\\', '/'];

/// Transport protocol used to reach an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    #[serde(alias = "UDP")]
    Udp,
    #[serde(alias = "TCP")]
    Tcp,
}

impl Protocol {
    /// Transport specifier as understood by the Net-SNMP tools.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Community-based SNMP version.
///
/// Written as `"1"` or `"2c"`; `"2"` and the integers `1` and `2` are
/// accepted too.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum SnmpVersion {
    #[serde(rename = "1")]
    V1,
    #[default]
    #[serde(rename = "2c")]
    V2c,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionInput {
    Number(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for SnmpVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match VersionInput::deserialize(deserializer)? {
            VersionInput::Number(1) => Ok(SnmpVersion::V1),
            VersionInput::Number(2) => Ok(SnmpVersion::V2c),
            VersionInput::Number(other) => Err(DeError::custom(format!(
                "unsupported SNMP version {}",
                other
            ))),
            VersionInput::Text(text) => match text.trim() {
                "1" => Ok(SnmpVersion::V1),
                "2" | "2c" => Ok(SnmpVersion::V2c),
                other => Err(DeError::custom(format!(
                    "unsupported SNMP version '{}'",
                    other
                ))),
            },
        }
    }
}

impl SnmpVersion {
    /// Version flag for `snmpget`.
    pub fn flag(&self) -> &'static str {
        match self {
            SnmpVersion::V1 => "-v1",
            SnmpVersion::V2c => "-v2c",
        }
    }
}

/// How the OIDs of a host are requested.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// One exchange per OID.
    Single,
    /// One exchange carrying every OID.
    #[default]
    Multiple,
}

/// An SNMP agent to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub protocol: Protocol,

    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub version: SnmpVersion,

    #[serde(default = "default_community")]
    pub community: String,

    /// Name of the [`Device`] describing which services are polled.
    pub device: String,

    #[serde(default)]
    pub requests: RequestMode,

    /// Optional group the host is listed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Host {
    /// Creates a host with default protocol, port, version and community.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            protocol: Protocol::default(),
            address: address.into(),
            port: DEFAULT_SNMP_PORT,
            version: SnmpVersion::default(),
            community: DEFAULT_COMMUNITY.to_string(),
            device: device.into(),
            requests: RequestMode::default(),
            group: None,
        }
    }

    /// Agent endpoint in `protocol:address:port` form.
    pub fn endpoint(&self) -> String {
        format!("{}:{}:{}", self.protocol, self.address, self.port)
    }

    fn validate(&self) -> LiveSnmpResult<()> {
        let field = |name: &str| format!("hosts.{}.{}", self.name, name);

        if self.name.is_empty() {
            return Err(LiveSnmpError::invalid_config("hosts.name", "host name is missing"));
        }
        if self.name.contains(FORBIDDEN_HOST_CHARS) {
            return Err(LiveSnmpError::invalid_config(field("name"), "host name is invalid"));
        }
        if self.description.is_empty() {
            return Err(LiveSnmpError::invalid_config(
                field("description"),
                "host description is missing",
            ));
        }
        if self.address.is_empty() {
            return Err(LiveSnmpError::invalid_config(field("address"), "host address is missing"));
        }
        if self.address.contains(FORBIDDEN_HOST_CHARS) {
            return Err(LiveSnmpError::invalid_config(field("address"), "host address is invalid"));
        }
        if self.port == 0 {
            return Err(LiveSnmpError::invalid_config(field("port"), "port must be > 0"));
        }
        if self.community.is_empty() {
            return Err(LiveSnmpError::invalid_config(
                field("community"),
                "community string is missing",
            ));
        }
        Ok(())
    }
}

/// A named OID binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Numeric (`.1.3.6.1.2.1.1.5.0`) or symbolic (`SNMPv2-MIB::sysName.0`).
    pub oid: String,
}

impl Service {
    pub fn new(name: impl Into<String>, oid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            oid: oid.into(),
        }
    }
}

/// A device model: the ordered set of services polled on hosts of this kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub services: Vec<String>,
}

impl Device {
    pub fn new<I, S>(name: impl Into<String>, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: String::new(),
            services: services.into_iter().map(Into::into).collect(),
        }
    }
}

/// Poller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerSettings {
    /// Delay between two poll cycles of the same host, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Re-poll automatically after each completed cycle
    #[serde(default = "default_timer_enabled")]
    pub timer_enabled: bool,

    /// Per-exchange `snmpget` timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Path or name of the `snmpget` program
    #[serde(default = "default_snmpget_path")]
    pub snmpget_path: String,

    /// Path or name of the `snmptranslate` program
    #[serde(default = "default_snmptranslate_path")]
    pub snmptranslate_path: String,
}

/// Complete livesnmpd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default)]
    pub poller: PollerSettings,

    #[serde(default)]
    pub services: Vec<Service>,

    #[serde(default)]
    pub devices: Vec<Device>,

    #[serde(default)]
    pub hosts: Vec<Host>,
}

// Default functions
fn default_port() -> u16 {
    DEFAULT_SNMP_PORT
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_timer_enabled() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    300
}

fn default_snmpget_path() -> String {
    SNMPGET_CMD.to_string()
}

fn default_snmptranslate_path() -> String {
    SNMPTRANSLATE_CMD.to_string()
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timer_enabled: default_timer_enabled(),
            timeout_ms: default_timeout_ms(),
            snmpget_path: default_snmpget_path(),
            snmptranslate_path: default_snmptranslate_path(),
        }
    }
}

impl PollerSettings {
    /// Get poll interval as Duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Get exchange timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl PollerConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> LiveSnmpResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| match e {
                LiveSnmpError::ConfigFile { message, .. } => {
                    LiveSnmpError::config_file(path, message)
                }
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(LiveSnmpError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> LiveSnmpResult<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Parse a configuration document
    pub fn from_toml(content: &str) -> LiveSnmpResult<Self> {
        toml::from_str(content).map_err(|e| LiveSnmpError::config_file("<inline>", e.to_string()))
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> LiveSnmpResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| LiveSnmpError::config_file(path, format!("Failed to serialize: {}", e)))?;

        fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> LiveSnmpResult<()> {
        if self.poller.interval_ms == 0 {
            return Err(LiveSnmpError::invalid_config(
                "poller.interval_ms",
                "interval_ms must be > 0",
            ));
        }
        if self.poller.timeout_ms == 0 {
            return Err(LiveSnmpError::invalid_config(
                "poller.timeout_ms",
                "timeout_ms must be > 0",
            ));
        }

        let mut service_names = BTreeSet::new();
        for service in &self.services {
            if service.name.is_empty() {
                return Err(LiveSnmpError::invalid_config("services.name", "service name is missing"));
            }
            if service.oid.trim().is_empty() {
                return Err(LiveSnmpError::invalid_config(
                    format!("services.{}.oid", service.name),
                    "OID is missing",
                ));
            }
            if !service_names.insert(service.name.as_str()) {
                return Err(LiveSnmpError::invalid_config(
                    format!("services.{}", service.name),
                    "duplicate service name",
                ));
            }
        }

        let mut device_names = BTreeSet::new();
        for device in &self.devices {
            if !device_names.insert(device.name.as_str()) {
                return Err(LiveSnmpError::invalid_config(
                    format!("devices.{}", device.name),
                    "duplicate device name",
                ));
            }
            if let Some(missing) = device
                .services
                .iter()
                .find(|s| !service_names.contains(s.as_str()))
            {
                return Err(LiveSnmpError::invalid_config(
                    format!("devices.{}.services", device.name),
                    format!("unknown service '{}'", missing),
                ));
            }
        }

        let mut host_names = BTreeSet::new();
        for host in &self.hosts {
            host.validate()?;
            if !host_names.insert(host.name.as_str()) {
                return Err(LiveSnmpError::invalid_config(
                    format!("hosts.{}", host.name),
                    "a host with that name already exists",
                ));
            }
            if !device_names.contains(host.device.as_str()) {
                return Err(LiveSnmpError::invalid_config(
                    format!("hosts.{}.device", host.name),
                    format!("unknown device '{}'", host.device),
                ));
            }
        }

        Ok(())
    }

    /// Builds the lookup registry from the loaded records
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::new();
        for service in &self.services {
            registry.add_service(service.clone());
        }
        for device in &self.devices {
            registry.add_device(device.clone());
        }
        for host in &self.hosts {
            registry.add_host(host.clone());
        }
        registry
    }
}

/// Name-indexed hosts, services and devices.
///
/// Owned by the composition root and handed out by reference; the poller
/// never mutates it.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    hosts: BTreeMap<String, Host>,
    services: BTreeMap<String, Service>,
    devices: BTreeMap<String, Device>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&mut self, host: Host) {
        self.hosts.insert(host.name.clone(), host);
    }

    pub fn add_service(&mut self, service: Service) {
        self.services.insert(service.name.clone(), service);
    }

    pub fn add_device(&mut self, device: Device) {
        self.devices.insert(device.name.clone(), device);
    }

    pub fn host(&self, name: &str) -> LiveSnmpResult<&Host> {
        self.hosts
            .get(name)
            .ok_or_else(|| LiveSnmpError::unknown_host(name))
    }

    pub fn service(&self, name: &str) -> LiveSnmpResult<&Service> {
        self.services
            .get(name)
            .ok_or_else(|| LiveSnmpError::unknown_service(name))
    }

    pub fn device(&self, name: &str) -> LiveSnmpResult<&Device> {
        self.devices
            .get(name)
            .ok_or_else(|| LiveSnmpError::unknown_device(name))
    }

    /// All hosts, ordered by name.
    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    /// Hosts listed under `group`.
    pub fn hosts_in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Host> + 'a {
        self.hosts
            .values()
            .filter(move |h| h.group.as_deref() == Some(group))
    }

    /// Ordered `(service name, OID)` pairs polled on `host`.
    pub fn service_oids(&self, host: &Host) -> LiveSnmpResult<Vec<(String, String)>> {
        let device = self.device(&host.device)?;
        device
            .services
            .iter()
            .map(|name| {
                self.service(name)
                    .map(|service| (service.name.clone(), service.oid.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
[poller]
interval_ms = 2500

[[services]]
name = "name"
description = "System name"
oid = "SNMPv2-MIB::sysName.0"

[[services]]
name = "uptime"
oid = ".1.3.6.1.2.1.1.3.0"

[[devices]]
name = "router"
description = "Generic router"
services = ["uptime", "name"]

[[hosts]]
name = "gw"
description = "Gateway"
address = "192.168.1.1"
device = "router"
version = "1"
requests = "single"
group = "office"
"#;

    fn sample() -> PollerConfig {
        PollerConfig::from_toml(SAMPLE).unwrap()
    }

    #[test]
    fn test_default_settings() {
        let settings = PollerSettings::default();
        assert_eq!(settings.interval_ms, 1000);
        assert!(settings.timer_enabled);
        assert_eq!(settings.timeout_ms, 300);
        assert_eq!(settings.snmpget_path, "snmpget");
        assert_eq!(settings.snmptranslate_path, "snmptranslate");
    }

    #[test]
    fn test_settings_durations() {
        let settings = PollerSettings::default();
        assert_eq!(settings.interval(), Duration::from_secs(1));
        assert_eq!(settings.timeout(), Duration::from_millis(300));
    }

    #[test]
    fn test_toml_deserialization() {
        let config = sample();
        assert_eq!(config.poller.interval_ms, 2500);
        assert_eq!(config.poller.timeout_ms, 300);

        let host = &config.hosts[0];
        assert_eq!(host.port, 161);
        assert_eq!(host.community, "public");
        assert_eq!(host.protocol, Protocol::Udp);
        assert_eq!(host.version, SnmpVersion::V1);
        assert_eq!(host.requests, RequestMode::Single);
        assert_eq!(host.group.as_deref(), Some("office"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_uppercase_protocol_and_numeric_version() {
        let host: Host = toml::from_str(
            r#"
name = "sw"
address = "10.0.0.2"
device = "switch"
protocol = "TCP"
version = "2"
"#,
        )
        .unwrap();
        assert_eq!(host.protocol, Protocol::Tcp);
        assert_eq!(host.version, SnmpVersion::V2c);
        assert_eq!(host.endpoint(), "tcp:10.0.0.2:161");
    }

    #[test]
    fn test_integer_version() {
        for (raw, expected) in [("1", SnmpVersion::V1), ("2", SnmpVersion::V2c)] {
            let host: Host = toml::from_str(&format!(
                "name = \"sw\"\naddress = \"10.0.0.2\"\ndevice = \"switch\"\nversion = {}\n",
                raw
            ))
            .unwrap();
            assert_eq!(host.version, expected);
        }

        let err = toml::from_str::<Host>(
            "name = \"sw\"\naddress = \"10.0.0.2\"\ndevice = \"switch\"\nversion = 3\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported SNMP version 3"));
    }

    #[test]
    fn test_version_serializes_as_string() {
        #[derive(Serialize)]
        struct Wrapper {
            version: SnmpVersion,
        }
        let text = toml::to_string(&Wrapper { version: SnmpVersion::V2c }).unwrap();
        assert_eq!(text.trim(), "version = \"2c\"");
    }

    #[test]
    fn test_version_flags() {
        assert_eq!(SnmpVersion::V1.flag(), "-v1");
        assert_eq!(SnmpVersion::V2c.flag(), "-v2c");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = sample();
        config.poller.interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("interval_ms"));
    }

    #[test]
    fn test_validate_rejects_invalid_host_name() {
        let mut config = sample();
        config.hosts[0].name = "bad/name".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_community() {
        let mut config = sample();
        config.hosts[0].community.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("community"));
    }

    #[test]
    fn test_validate_rejects_unknown_device() {
        let mut config = sample();
        config.hosts[0].device = "printer".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown device 'printer'"));
    }

    #[test]
    fn test_validate_rejects_unknown_service() {
        let mut config = sample();
        config.devices[0].services.push("toner".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown service 'toner'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_host() {
        let mut config = sample();
        let duplicate = config.hosts[0].clone();
        config.hosts.push(duplicate);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_registry_service_oids_keep_device_order() {
        let config = sample();
        let registry = config.registry();
        let host = registry.host("gw").unwrap();
        let oids = registry.service_oids(host).unwrap();
        assert_eq!(
            oids,
            vec![
                ("uptime".to_string(), ".1.3.6.1.2.1.1.3.0".to_string()),
                ("name".to_string(), "SNMPv2-MIB::sysName.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_registry_lookup_failures() {
        let registry = sample().registry();
        assert!(registry.host("nope").unwrap_err().is_lookup_failure());

        let orphan = Host::new("orphan", "10.0.0.9", "missing");
        let err = registry.service_oids(&orphan).unwrap_err();
        assert!(matches!(err, LiveSnmpError::UnknownDevice { .. }));
    }

    #[test]
    fn test_hosts_in_group() {
        let mut registry = sample().registry();
        registry.add_host(Host::new("lab", "10.0.0.3", "router"));
        let office: Vec<_> = registry.hosts_in_group("office").map(|h| h.name.as_str()).collect();
        assert_eq!(office, vec!["gw"]);
        assert_eq!(registry.hosts().count(), 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livesnmpd.toml");
        let config = sample();
        config.save(&path).unwrap();

        let reloaded = PollerConfig::load_or_default(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = PollerConfig::load_or_default("/nonexistent/livesnmpd.toml").unwrap();
        assert!(config.hosts.is_empty());
        assert_eq!(config.poller, PollerSettings::default());
    }

    #[test]
    fn test_load_malformed_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[[hosts]\nname = ").unwrap();

        let err = PollerConfig::load_or_default(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
