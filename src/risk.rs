//! Command risk classification
//!
//! A pure, ordered rule table flagging command strings whose blast radius
//! warrants an extra approval regardless of the configured bash rules. The
//! classifier never blocks anything itself; the bash tool layers a separate
//! `bash_sensitive` ask on top of the ordinary permission gate whenever a
//! rule matches, so a broad allow-rule can never silently wave through a
//! host-destructive action.

use std::sync::LazyLock;

use regex::Regex;

/// One classification rule
struct RiskRule {
    /// Machine key carried into approval metadata
    key: &'static str,
    /// Short reason shown alongside the key
    reason: &'static str,
    /// Longer description reused verbatim in approval prompts
    description: &'static str,
    pattern: Regex,
}

/// Outcome of classifying a command string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskAssessment {
    /// No rule matched
    Low,
    /// A rule matched; carries the rule's key, reason, and description
    Sensitive {
        key: &'static str,
        reason: &'static str,
        description: &'static str,
    },
}

impl RiskAssessment {
    /// Whether the command needs the extra approval step
    pub fn is_sensitive(&self) -> bool {
        matches!(self, RiskAssessment::Sensitive { .. })
    }
}

static RULES: LazyLock<Vec<RiskRule>> = LazyLock::new(|| {
    vec![
        RiskRule {
            key: "rm-recursive-force",
            reason: "potential filesystem destruction",
            description: "Recursive forced deletion targeting a root-level, home, or wildcard path",
            pattern: Regex::new(r"(?i)\brm\b[^\n]*\s-rf?\s+/|(^|\s)rm\s+-rf?\s+(\.|~|/|\*)")
                .expect("rm rule regex"),
        },
        RiskRule {
            key: "dd-disk-write",
            reason: "potential raw disk overwrite",
            description: "Writes directly to a block device with a disk-duplication utility",
            pattern: Regex::new(r"(?i)\bdd\b[^\n]*\bof=/dev/").expect("dd rule regex"),
        },
        RiskRule {
            key: "filesystem-format",
            reason: "potential filesystem formatting",
            description: "Creates a new filesystem, destroying existing data on the target",
            pattern: Regex::new(r"(?i)\bmkfs(\.[a-z0-9]+)?\b|\bnewfs\b").expect("mkfs rule regex"),
        },
        RiskRule {
            key: "service-disruption",
            reason: "service or host shutdown/restart",
            description: "Changes host power state or restarts the machine",
            pattern: Regex::new(r"(?i)\b(shutdown|reboot|poweroff|halt|init 0|init 6)\b")
                .expect("shutdown rule regex"),
        },
        RiskRule {
            key: "firewall-modification",
            reason: "firewall or packet filtering disruption",
            description: "Flushes, disables, or rewrites host firewall or packet-filter rules",
            pattern: Regex::new(r"(?i)\b(iptables|nft|ufw|pfctl|netsh advfirewall)\b")
                .expect("firewall rule regex"),
        },
        RiskRule {
            key: "exploit-framework",
            reason: "exploit-framework execution",
            description: "Launches a known offensive-security exploitation framework",
            pattern: Regex::new(r"(?i)\b(msfconsole|metasploit|exploitdb|sqlmap|beef-xss|empire)\b")
                .expect("exploit rule regex"),
        },
    ]
});

/// Classify a command string; first matching rule wins
pub fn classify(command: &str) -> RiskAssessment {
    for rule in RULES.iter() {
        if rule.pattern.is_match(command) {
            return RiskAssessment::Sensitive {
                key: rule.key,
                reason: rule.reason,
                description: rule.description,
            };
        }
    }
    RiskAssessment::Low
}
