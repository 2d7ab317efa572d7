//! Test infrastructure for the livesnmp poller
//!
//! Provides:
//! - [`ScriptedRunner`], a [`livesnmp_common::CommandRunner`] that answers
//!   `snmpget`/`snmptranslate` invocations from canned output and records
//!   every call
//! - Fixtures for hosts, services, devices and `snmpget` replies

pub mod fixtures;
mod runner;

pub use fixtures::*;
pub use runner::{Invocation, ScriptedRunner};
