//! Common infrastructure for the livesnmp poller.
//!
//! - [`exec`]: External command execution behind the [`CommandRunner`] trait
//! - [`config`]: Host, service and device records, poller settings and the
//!   TOML loader
//! - [`error`]: Error types for command execution and configuration
//!
//! # Example
//!
//! ```ignore
//! use livesnmp_common::{PollerConfig, LiveSnmpResult};
//!
//! fn load() -> LiveSnmpResult<()> {
//!     let config = PollerConfig::load_or_default("livesnmpd.toml")?;
//!     config.validate()?;
//!     let registry = config.registry();
//!     for host in registry.hosts() {
//!         println!("{} -> {}", host.name, host.endpoint());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod exec;

// Re-export commonly used items at crate root
pub use config::{
    Device, Host, PollerConfig, PollerSettings, Protocol, Registry, RequestMode, Service,
    SnmpVersion,
};
pub use error::{LiveSnmpError, LiveSnmpResult};
pub use exec::{CommandRunner, ExecResult, SystemRunner};
