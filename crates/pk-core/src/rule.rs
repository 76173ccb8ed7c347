//! Forwarding rule types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address family of one side of a forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressFamily {
    /// IPv4
    #[serde(rename = "TCP4")]
    Ipv4,
    /// IPv6
    #[serde(rename = "TCP6")]
    Ipv6,
}

impl AddressFamily {
    /// Connect address prefix understood by the forwarding executable
    pub fn connect_prefix(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "TCP4",
            AddressFamily::Ipv6 => "TCP6",
        }
    }

    /// Listen address type understood by the forwarding executable
    pub fn listen_directive(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "TCP4-LISTEN",
            AddressFamily::Ipv6 => "TCP6-LISTEN",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "IPv4"),
            AddressFamily::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// A declared forward: traffic to `listen_port` goes to `target_host:target_port`
///
/// `target_host` is kept in canonical form. IPv6 hosts (and anything else
/// containing a `:`) are wrapped in a single pair of brackets so the composed
/// target string is unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RuleRecord", into = "RuleRecord")]
pub struct Rule {
    listen_port: u16,
    target_host: String,
    target_port: u16,
    local_family: AddressFamily,
    remote_family: AddressFamily,
}

impl Rule {
    /// Create a rule, canonicalizing the target host
    pub fn new(
        listen_port: u16,
        target_host: &str,
        target_port: u16,
        local_family: AddressFamily,
        remote_family: AddressFamily,
    ) -> Self {
        Self {
            listen_port,
            target_host: canonical_host(target_host, remote_family),
            target_port,
            local_family,
            remote_family,
        }
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    pub fn local_family(&self) -> AddressFamily {
        self.local_family
    }

    pub fn remote_family(&self) -> AddressFamily {
        self.remote_family
    }

    /// Composed `host:port` target, e.g. `[2001:db8::1]:8080`
    pub fn target(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }

    /// Stable key used to index per-rule state such as spawned PIDs
    pub fn key(&self) -> String {
        format!("{}->{}", self.listen_port, self.target())
    }

    /// Regular expression matching the command line of a forwarder for this rule
    ///
    /// The executable must appear as a whole path component, the listen port
    /// must end on a word boundary and the full target must follow a `:` and
    /// end on a word boundary. Ports or targets that are prefixes of another
    /// rule's therefore never match that rule's process.
    pub fn match_pattern(&self, executable_name: &str) -> String {
        format!(
            r"(?:^|/){}(?:\s|$).*-LISTEN:{}\b.*:{}\b",
            regex::escape(executable_name),
            self.listen_port,
            regex::escape(&self.target())
        )
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.listen_port, self.target())
    }
}

fn canonical_host(host: &str, family: AddressFamily) -> String {
    let bare = host.trim().trim_start_matches('[').trim_end_matches(']');
    if family == AddressFamily::Ipv6 || bare.contains(':') {
        format!("[{}]", bare)
    } else {
        bare.to_string()
    }
}

/// Persisted shape of a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleRecord {
    #[serde(with = "crate::config::serde_utils::port_string")]
    listen: u16,
    target: String,
    local_type: AddressFamily,
    remote_type: AddressFamily,
}

impl TryFrom<RuleRecord> for Rule {
    type Error = String;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let (host, port) = record
            .target
            .rsplit_once(':')
            .ok_or_else(|| format!("target {:?} has no port", record.target))?;
        if host.trim().is_empty() {
            return Err(format!("target {:?} has no host", record.target));
        }
        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid target port in {:?}: {}", record.target, e))?;
        if port == 0 {
            return Err(format!("target {:?} has port 0", record.target));
        }

        Ok(Rule::new(
            record.listen,
            host,
            port,
            record.local_type,
            record.remote_type,
        ))
    }
}

impl From<Rule> for RuleRecord {
    fn from(rule: Rule) -> Self {
        Self {
            listen: rule.listen_port,
            target: rule.target(),
            local_type: rule.local_family,
            remote_type: rule.remote_family,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn v4(listen: u16, host: &str, port: u16) -> Rule {
        Rule::new(listen, host, port, AddressFamily::Ipv4, AddressFamily::Ipv4)
    }

    fn cmdline(rule: &Rule) -> String {
        format!(
            "socat -T 30 {}:{},reuseaddr,fork {}:{}",
            rule.local_family().listen_directive(),
            rule.listen_port(),
            rule.remote_family().connect_prefix(),
            rule.target()
        )
    }

    #[test]
    fn test_ipv6_target_is_bracketed() {
        let rule = Rule::new(9000, "2001:db8::1", 8080, AddressFamily::Ipv4, AddressFamily::Ipv6);
        assert_eq!(rule.target_host(), "[2001:db8::1]");
        assert_eq!(rule.target(), "[2001:db8::1]:8080");
    }

    #[test]
    fn test_existing_brackets_are_not_doubled() {
        let rule = Rule::new(9000, "[2001:db8::1]", 8080, AddressFamily::Ipv6, AddressFamily::Ipv6);
        assert_eq!(rule.target(), "[2001:db8::1]:8080");
    }

    #[test]
    fn test_colon_host_bracketed_even_with_ipv4_family() {
        let rule = v4(9000, "::1", 22);
        assert_eq!(rule.target(), "[::1]:22");
    }

    #[test]
    fn test_ipv6_pattern_escapes_brackets() {
        let rule = Rule::new(9000, "2001:db8::1", 8080, AddressFamily::Ipv6, AddressFamily::Ipv6);
        let pattern = rule.match_pattern("socat");
        assert!(pattern.contains(r"\[2001:db8::1\]:8080"));

        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match(&cmdline(&rule)));
    }

    #[test]
    fn test_pattern_matches_own_process() {
        let rule = v4(9000, "203.0.113.5", 443);
        let re = Regex::new(&rule.match_pattern("socat")).unwrap();
        assert!(re.is_match(&cmdline(&rule)));
        assert!(re.is_match(&format!("/usr/bin/{}", cmdline(&rule))));
    }

    #[test]
    fn test_prefix_rules_do_not_cross_match() {
        let a = v4(8080, "10.0.0.1", 80);
        let b = v4(80, "10.0.0.1", 8080);

        let re_a = Regex::new(&a.match_pattern("socat")).unwrap();
        let re_b = Regex::new(&b.match_pattern("socat")).unwrap();

        assert!(re_a.is_match(&cmdline(&a)));
        assert!(re_b.is_match(&cmdline(&b)));
        assert!(!re_a.is_match(&cmdline(&b)));
        assert!(!re_b.is_match(&cmdline(&a)));
    }

    #[test]
    fn test_host_suffix_does_not_match() {
        let a = v4(9000, "10.0.0.1", 80);
        let b = v4(9000, "110.0.0.1", 80);
        let re_a = Regex::new(&a.match_pattern("socat")).unwrap();
        assert!(!re_a.is_match(&cmdline(&b)));
    }

    #[test]
    fn test_pattern_requires_executable_name() {
        let rule = v4(9000, "203.0.113.5", 443);
        let re = Regex::new(&rule.match_pattern("socat")).unwrap();
        let other = cmdline(&rule).replacen("socat", "notsocat", 1);
        assert!(!re.is_match(&other));
    }

    #[test]
    fn test_deserialize_original_store_shape() {
        let json = r#"{"listen": "9000", "target": "203.0.113.5:443", "local_type": "TCP4", "remote_type": "TCP4"}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule, v4(9000, "203.0.113.5", 443));
    }

    #[test]
    fn test_deserialize_numeric_listen_and_ipv6_target() {
        let json = r#"{"listen": 9000, "target": "[2001:db8::1]:8080", "local_type": "TCP6", "remote_type": "TCP6"}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.listen_port(), 9000);
        assert_eq!(rule.target(), "[2001:db8::1]:8080");
        assert_eq!(rule.local_family(), AddressFamily::Ipv6);
    }

    #[test]
    fn test_serialize_uses_store_field_names() {
        let rule = Rule::new(9000, "2001:db8::1", 8080, AddressFamily::Ipv4, AddressFamily::Ipv6);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["listen"], "9000");
        assert_eq!(value["target"], "[2001:db8::1]:8080");
        assert_eq!(value["local_type"], "TCP4");
        assert_eq!(value["remote_type"], "TCP6");
    }

    #[test]
    fn test_deserialize_rejects_bad_ports() {
        let bad_listen = r#"{"listen": "99999", "target": "1.2.3.4:80", "local_type": "TCP4", "remote_type": "TCP4"}"#;
        assert!(serde_json::from_str::<Rule>(bad_listen).is_err());

        let bad_target = r#"{"listen": "80", "target": "1.2.3.4", "local_type": "TCP4", "remote_type": "TCP4"}"#;
        assert!(serde_json::from_str::<Rule>(bad_target).is_err());
    }

    #[test]
    fn test_deserialize_rejects_port_zero() {
        let zero_listen = r#"{"listen": "0", "target": "1.2.3.4:80", "local_type": "TCP4", "remote_type": "TCP4"}"#;
        assert!(serde_json::from_str::<Rule>(zero_listen).is_err());

        let zero_target = r#"{"listen": 80, "target": "1.2.3.4:0", "local_type": "TCP4", "remote_type": "TCP4"}"#;
        assert!(serde_json::from_str::<Rule>(zero_target).is_err());
    }

    #[test]
    fn test_rule_display() {
        assert_eq!(v4(9000, "203.0.113.5", 443).to_string(), "9000 -> 203.0.113.5:443");
    }
}
