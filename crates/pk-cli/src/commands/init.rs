//! Interactive rule entry

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use pk_core::{AddressFamily, Rule, RuleStore, SupervisorConfig};

use super::run_command;
use crate::output::{print_info, print_success};

/// Prompt for rules on stdin, save them and run a pass
pub async fn init_command(config: &SupervisorConfig, append: bool, no_run: bool) -> Result<()> {
    let store = RuleStore::new(&config.store_path);

    let rules = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        collect_rules(&mut input, &mut output)?
    };

    let mut all = if append {
        store.load().context("Failed to load existing rules")?
    } else {
        Vec::new()
    };
    for rule in rules {
        if !all.contains(&rule) {
            all.push(rule);
        }
    }

    store
        .save(&all)
        .with_context(|| format!("Failed to save rules to {:?}", store.path()))?;
    print_success(&format!("Saved {} rule(s) to {:?}", all.len(), store.path()));

    if no_run {
        print_info("Run 'portkeep run' to start the forwards");
        return Ok(());
    }

    run_command(config).await
}

/// Read rules from `input` until the user declines to add another
///
/// Invalid answers are asked again. Running out of input is an error.
pub fn collect_rules<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Vec<Rule>> {
    let mut rules = Vec::new();

    loop {
        writeln!(output, "\nNew forwarding rule")?;
        let local = ask_family(input, output, "Local address family")?;
        let listen = ask_port(input, output, "Local listen port")?;
        let remote = ask_family(input, output, "Remote address family")?;
        let host = ask_host(input, output)?;
        let port = ask_port(input, output, "Remote port")?;

        let rule = Rule::new(listen, &host, port, local, remote);
        writeln!(output, "Added {}", rule)?;
        rules.push(rule);

        if !ask_yes_no(input, output, "Add another rule? [y/N]: ")? {
            break;
        }
    }

    Ok(rules)
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<String> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line).context("Failed to read input")? == 0 {
        anyhow::bail!("Input ended before the rule was complete");
    }
    Ok(line.trim().to_string())
}

fn ask_family<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> Result<AddressFamily> {
    let prompt = format!("{} (1 = IPv4, 2 = IPv6) [1]: ", label);
    loop {
        match read_answer(input, output, &prompt)?.as_str() {
            "" | "1" => return Ok(AddressFamily::Ipv4),
            "2" => return Ok(AddressFamily::Ipv6),
            other => writeln!(output, "Enter 1 or 2, not {:?}", other)?,
        }
    }
}

fn ask_port<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<u16> {
    let prompt = format!("{}: ", label);
    loop {
        let answer = read_answer(input, output, &prompt)?;
        match answer.parse::<u16>() {
            Ok(port) if port != 0 => return Ok(port),
            _ => writeln!(output, "Enter a port between 1 and 65535")?,
        }
    }
}

fn ask_host<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String> {
    loop {
        let answer = read_answer(input, output, "Remote host: ")?;
        if !answer.is_empty() && !answer.contains(char::is_whitespace) {
            return Ok(answer);
        }
        writeln!(output, "Enter a hostname or address")?;
    }
}

fn ask_yes_no<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<bool> {
    let answer = read_answer(input, output, prompt)?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}
