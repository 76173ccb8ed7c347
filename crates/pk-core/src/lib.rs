//! pk-core: reconciliation supervisor for socat forwards
//!
//! Loads the declared forwarding rules, checks each against the live process
//! table and launches a forwarder for every rule that isn't running.

pub mod backoff;
pub mod config;
pub mod cron;
pub mod error;
pub mod host;
pub mod launcher;
pub mod logfile;
pub mod probe;
pub mod reconcile;
pub mod registry;
pub mod rule;
pub mod store;

pub use config::SupervisorConfig;
pub use error::{LaunchError, PkError};
pub use probe::{ProcessTable, Prober, SystemProcessTable};
pub use reconcile::{PassReport, Reconciler, RuleOutcome};
pub use rule::{AddressFamily, Rule};
pub use store::RuleStore;
