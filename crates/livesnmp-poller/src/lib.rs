//! # livesnmp-poller - Live SNMP polling
//!
//! Polls a fixed set of OIDs on a host through the Net-SNMP command line
//! tools and hands each cycle's values to a consumer.
//!
//! ## Components
//! - [`OidResolver`]: `snmptranslate -On` with a process-wide cache
//! - [`decode`]: `TYPE: VALUE` text to a display string
//! - [`SnmpTransport`]: `snmpget` exchanges, correlated by OID
//! - [`PollScheduler`]: one cycle in flight at a time, cooperative stop and
//!   timed re-polling into a [`PollSink`]
//! - [`daemon`]: wiring used by `livesnmpd`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use livesnmp_common::{PollerConfig, SystemRunner};
//! use livesnmp_poller::{daemon, LogSink, PollScheduler, PollSession};
//!
//! let config = PollerConfig::load()?;
//! let registry = config.registry();
//! let transport = daemon::build_transport(&config.poller, Arc::new(SystemRunner));
//!
//! let session = PollSession::from_registry(&registry, "gw")?;
//! let mut scheduler = PollScheduler::new(session, transport, LogSink)
//!     .with_timer_enabled(true);
//! scheduler.start();
//! loop {
//!     scheduler.process_next().await;
//! }
//! ```

pub mod daemon;
mod decode;
mod error;
mod oid;
mod result;
mod scheduler;
mod sink;
mod transport;

pub use decode::{decode, DecodedValue};
pub use error::{DecodeError, ResolutionError, SnmpError};
pub use oid::{is_numeric_oid, normalize, OidResolver};
pub use result::{PollOutcome, PollReport, PollResult, PolledValue};
pub use scheduler::{PollScheduler, PollSession, SchedulerEvent, SchedulerState, DEFAULT_INTERVAL};
pub use sink::{JsonSink, LogSink, PollSink};
pub use transport::{
    format_timeout, parse_records, HostReply, SnmpTransport, DEFAULT_TIMEOUT, TIMEOUT_SENTINEL,
};
