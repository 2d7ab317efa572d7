//! Test fixtures for common polling scenarios
//!
//! Provides host/service/device records and canned `snmpget` output.

use livesnmp_common::{Device, ExecResult, Host, Registry, RequestMode, Service, SnmpVersion};

/// Well-known MIB-2 system OIDs, numeric form as printed by `snmpget -O n`
pub mod oids {
    pub const SYS_DESCR: &str = ".1.3.6.1.2.1.1.1.0";
    pub const SYS_UPTIME: &str = ".1.3.6.1.2.1.1.3.0";
    pub const SYS_CONTACT: &str = ".1.3.6.1.2.1.1.4.0";
    pub const SYS_NAME: &str = ".1.3.6.1.2.1.1.5.0";
    pub const SYS_LOCATION: &str = ".1.3.6.1.2.1.1.6.0";

    /// Symbolic form of [`SYS_NAME`]
    pub const SYS_NAME_SYMBOLIC: &str = "SNMPv2-MIB::sysName.0";
}

/// Canned `snmpget` replies
pub mod replies {
    use super::*;

    /// One `OID = TYPE: VALUE` record
    pub fn line(oid: &str, typed: &str) -> String {
        format!("{} = {}", oid, typed)
    }

    /// A successful reply made of the given records, in the given order
    pub fn get(records: &[(&str, &str)]) -> ExecResult {
        let body: Vec<String> = records.iter().map(|(oid, typed)| line(oid, typed)).collect();
        ExecResult::with_stdout(body.join("\n"))
    }

    /// The message `snmpget` prints when the agent does not answer
    pub fn timeout(address: &str) -> ExecResult {
        ExecResult {
            exit_code: 1,
            stdout: format!("Timeout: No Response from udp:{}:161.", address),
            stderr: String::new(),
        }
    }

    /// A reply with nothing on stdout or stderr
    pub fn empty() -> ExecResult {
        ExecResult::with_stdout("")
    }

    /// An error printed on stderr
    pub fn diagnostic(message: &str) -> ExecResult {
        ExecResult::with_stderr(2, message)
    }
}

/// Common host fixtures
pub mod host_fixtures {
    use super::*;

    /// A v2c router polled with one exchange per cycle
    pub fn router(name: &str) -> Host {
        let mut host = Host::new(name, "192.0.2.1", "router");
        host.description = format!("Router {}", name);
        host
    }

    /// A v1 switch polled with one exchange per OID
    pub fn single_request_switch(name: &str) -> Host {
        let mut host = Host::new(name, "192.0.2.2", "switch");
        host.description = format!("Switch {}", name);
        host.version = SnmpVersion::V1;
        host.community = "private".to_string();
        host.requests = RequestMode::Single;
        host
    }
}

/// Registry with the `router` and `switch` devices
///
/// - `router` polls `uptime` and `name`
/// - `switch` polls `name` and `contact`
pub fn system_registry() -> Registry {
    let mut registry = Registry::new();
    registry.add_service(Service::new("uptime", oids::SYS_UPTIME));
    registry.add_service(Service::new("name", oids::SYS_NAME));
    registry.add_service(Service::new("contact", oids::SYS_CONTACT));
    registry.add_service(Service::new("location", oids::SYS_LOCATION));
    registry.add_device(Device::new("router", ["uptime", "name"]));
    registry.add_device(Device::new("switch", ["name", "contact"]));
    registry
}
