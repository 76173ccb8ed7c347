//! Reconciliation pass
//!
//! One pass loads the rule list, and for every rule either leaves a running
//! forwarder alone or makes exactly one launch attempt. A failed launch is
//! recorded and the pass moves on; only a store failure aborts it.

use std::fmt;

use crate::config::SupervisorConfig;
use crate::error::{LaunchError, PkError};
use crate::launcher::Launcher;
use crate::probe::{ProcessTable, Prober};
use crate::registry::PidRegistry;
use crate::rule::Rule;
use crate::store::RuleStore;

/// What happened to one rule during a pass
#[derive(Debug)]
pub enum RuleOutcome {
    /// A matching forwarder was already running
    AlreadyRunning,
    /// A forwarder was launched and confirmed
    Started { pid: u32 },
    /// The launch attempt failed
    Failed(LaunchError),
}

impl RuleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RuleOutcome::Failed(_))
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::AlreadyRunning => write!(f, "running"),
            RuleOutcome::Started { pid } => write!(f, "started (pid {})", pid),
            RuleOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Result of a full pass, in rule order
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<(Rule, RuleOutcome)>,
}

impl PassReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of launch attempts made, successful or not
    pub fn launches(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| !matches!(o, RuleOutcome::AlreadyRunning))
            .count()
    }

    /// Rules whose launch failed
    pub fn failures(&self) -> impl Iterator<Item = (&Rule, &LaunchError)> {
        self.outcomes.iter().filter_map(|(rule, outcome)| match outcome {
            RuleOutcome::Failed(e) => Some((rule, e)),
            _ => None,
        })
    }

    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(|(_, o)| o.is_failure())
    }
}

/// Drives a reconciliation pass over the stored rules
#[derive(Debug)]
pub struct Reconciler<T> {
    store: RuleStore,
    prober: Prober<T>,
    launcher: Launcher,
}

impl<T: ProcessTable> Reconciler<T> {
    pub fn new(config: &SupervisorConfig, table: T) -> Self {
        Self {
            store: RuleStore::new(&config.store_path),
            prober: Prober::new(
                table,
                config.executable_name(),
                PidRegistry::new(&config.registry_path),
            ),
            launcher: Launcher::from_config(config),
        }
    }

    pub fn store(&self) -> &RuleStore {
        &self.store
    }

    pub fn prober(&self) -> &Prober<T> {
        &self.prober
    }

    pub fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    /// Run one pass over every stored rule
    pub async fn run_pass(&self) -> Result<PassReport, PkError> {
        let rules = self.store.load()?;
        tracing::info!("Reconciling {} rule(s) from {:?}", rules.len(), self.store.path());
        self.prober.retain_rules(&rules);

        let mut report = PassReport::default();
        for rule in rules {
            let outcome = self.reconcile_rule(&rule).await;
            report.outcomes.push((rule, outcome));
        }

        tracing::info!(
            "Pass complete: {} rule(s), {} launch(es), {} failure(s)",
            report.outcomes.len(),
            report.launches(),
            report.failures().count()
        );
        Ok(report)
    }

    /// Bring a single rule to the satisfied state if it isn't already
    pub async fn reconcile_rule(&self, rule: &Rule) -> RuleOutcome {
        if self.prober.is_running(rule) {
            tracing::info!("{} is running", rule);
            return RuleOutcome::AlreadyRunning;
        }

        tracing::info!("{} is not running, starting", rule);
        match self.launcher.start(rule, &self.prober).await {
            Ok(pid) => RuleOutcome::Started { pid },
            Err(e) => {
                tracing::warn!("{}: {}", rule, e);
                RuleOutcome::Failed(e)
            }
        }
    }
}
