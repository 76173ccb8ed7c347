//! Output formatting utilities for the CLI
//!
//! Tables for the rule list and colored status lines for pass outcomes.

use tabled::{settings::Style, Table, Tabled};

use pk_core::{PassReport, Rule, RuleOutcome};

/// Format rules and their live state as an ASCII table
///
/// Returns "No forwarding rules configured" if the list is empty.
pub fn format_rules(rules: &[(Rule, bool)]) -> String {
    if rules.is_empty() {
        return "No forwarding rules configured".to_string();
    }

    #[derive(Tabled)]
    struct RuleRow {
        #[tabled(rename = "LISTEN")]
        listen: u16,
        #[tabled(rename = "TARGET")]
        target: String,
        #[tabled(rename = "LOCAL")]
        local: String,
        #[tabled(rename = "REMOTE")]
        remote: String,
        #[tabled(rename = "STATE")]
        state: &'static str,
    }

    let rows: Vec<RuleRow> = rules
        .iter()
        .map(|(rule, running)| RuleRow {
            listen: rule.listen_port(),
            target: rule.target(),
            local: rule.local_family().to_string(),
            remote: rule.remote_family().to_string(),
            state: if *running { "running" } else { "stopped" },
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print one status line per rule of a finished pass
///
/// Failed launches are followed by the captured log tail.
pub fn print_report(report: &PassReport) {
    for (rule, outcome) in &report.outcomes {
        match outcome {
            RuleOutcome::AlreadyRunning => {
                print_info(&format!("{} -> {} is running", rule.listen_port(), rule.target()));
            }
            RuleOutcome::Started { pid } => {
                print_success(&format!(
                    "Started {} -> {} (PID: {})",
                    rule.listen_port(),
                    rule.target(),
                    pid
                ));
            }
            RuleOutcome::Failed(e) => {
                print_error(&format!("{} -> {}: {}", rule.listen_port(), rule.target(), e));
                if let Some(tail) = e.log_tail().filter(|t| !t.trim().is_empty()) {
                    eprintln!("{}", indent(tail));
                }
            }
        }
    }
}

/// Summary line for a pass
pub fn format_summary(report: &PassReport) -> String {
    let failures = report.failures().count();
    format!(
        "{} rule(s): {} running, {} started, {} failed",
        report.outcomes.len(),
        report.outcomes.len() - report.launches(),
        report.launches() - failures,
        failures
    )
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow with a warning symbol prefix
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan with an info symbol prefix
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
