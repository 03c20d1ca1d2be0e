//! Layered permission rule sets
//!
//! A `Ruleset` maps permission kinds (`bash`, `edit`, `task`, ...) to
//! pattern→action tables. The `bash` kind's patterns are command-prefix
//! wildcards matched token-wise against the parsed command; every other kind
//! matches its subject as a single string.
//!
//! Evaluation order: the most specific matching pattern wins, `*` is the
//! fallback, and a subject matched by nothing defaults to allow. Specificity
//! is the count of literal (non-wildcard) characters, ties broken by pattern
//! length and then lexicographic order, so declaration order never matters.

use std::collections::BTreeMap;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

/// Verdict for a gated action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    /// Proceed without prompting
    Allow,
    /// Suspend and ask the approval responder
    Ask,
    /// Refuse outright
    Deny,
}

/// Pattern→action table for one permission kind
pub type PatternRules = BTreeMap<String, PermissionAction>;

/// A configured permission value: either a scalar action or a pattern map
///
/// Scalar values broadcast to `{"*": action}` when the ruleset is built, so
/// `bash: "allow"` and `bash: {"*": "allow"}` are equivalent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionValue {
    /// Scalar shorthand, applied to every subject of the kind
    Action(PermissionAction),
    /// Explicit pattern map
    Patterns(BTreeMap<String, PermissionAction>),
}

/// Raw permission configuration: kind → scalar-or-map
pub type PermissionConfig = BTreeMap<String, PermissionValue>;

/// Layered rule set for one agent (or one session override)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ruleset {
    kinds: BTreeMap<String, PatternRules>,
}

impl Ruleset {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a rule set from configuration, broadcasting scalar values
    pub fn from_config(config: &PermissionConfig) -> Self {
        let mut kinds = BTreeMap::new();
        for (kind, value) in config {
            let rules: PatternRules = match value {
                PermissionValue::Action(action) => {
                    let mut map = BTreeMap::new();
                    map.insert("*".to_string(), *action);
                    map
                }
                PermissionValue::Patterns(map) => map.clone(),
            };
            kinds.insert(kind.clone(), rules);
        }
        Self { kinds }
    }

    /// Deep-merge `over` on top of this rule set, key-by-key per kind
    pub fn merged(&self, over: &Ruleset) -> Ruleset {
        let mut kinds = self.kinds.clone();
        for (kind, rules) in &over.kinds {
            let entry = kinds.entry(kind.clone()).or_default();
            for (pattern, action) in rules {
                entry.insert(pattern.clone(), *action);
            }
        }
        Ruleset { kinds }
    }

    /// Insert a single rule
    pub fn insert(&mut self, kind: impl Into<String>, pattern: impl Into<String>, action: PermissionAction) {
        self.kinds
            .entry(kind.into())
            .or_default()
            .insert(pattern.into(), action);
    }

    /// Whether the rule set carries any entry for a kind
    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// The pattern table for a kind, if present
    pub fn kind_rules(&self, kind: &str) -> Option<&PatternRules> {
        self.kinds.get(kind)
    }

    /// Serialize one kind's rules for inclusion in a denial message
    pub fn rules_dump(&self, kind: &str) -> String {
        self.kinds
            .get(kind)
            .and_then(|rules| serde_json::to_string(rules).ok())
            .unwrap_or_else(|| "{}".to_string())
    }

    /// Evaluate a single-string subject against a kind's rules
    ///
    /// Falls back to the `*` kind when the named kind has no matching
    /// pattern; a subject matched by nothing is allowed.
    pub fn evaluate(&self, kind: &str, subject: &str) -> PermissionAction {
        if let Some(action) = self.best_match(kind, |pattern| wildcard_match(pattern, subject)) {
            return action;
        }
        if kind != "*" {
            if let Some(action) = self.best_match("*", |pattern| wildcard_match(pattern, subject)) {
                return action;
            }
        }
        PermissionAction::Allow
    }

    /// Evaluate a parsed simple command against the `bash` pattern map
    pub fn evaluate_command(&self, head: &str, args: &[String]) -> PermissionAction {
        if let Some(action) = self.best_match("bash", |pattern| command_match(pattern, head, args)) {
            return action;
        }
        let joined = std::iter::once(head)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(action) = self.best_match("*", |pattern| wildcard_match(pattern, &joined)) {
            return action;
        }
        PermissionAction::Allow
    }

    fn best_match<F>(&self, kind: &str, matches: F) -> Option<PermissionAction>
    where
        F: Fn(&str) -> bool,
    {
        let rules = self.kinds.get(kind)?;
        rules
            .iter()
            .filter(|(pattern, _)| matches(pattern))
            .max_by(|(a, _), (b, _)| specificity(a).cmp(&specificity(b)).then_with(|| b.cmp(a)))
            .map(|(_, action)| *action)
    }
}

/// Specificity key: literal character count, then total length
///
/// `*` and `?` count as wildcards; everything else is literal. Higher wins.
fn specificity(pattern: &str) -> (usize, usize) {
    let literal = pattern.chars().filter(|c| *c != '*' && *c != '?').count();
    (literal, pattern.len())
}

/// Match a whole-string subject against a wildcard pattern
///
/// `*` crosses path separators here: permission patterns treat the subject
/// as opaque text, not as a filesystem path.
pub fn wildcard_match(pattern: &str, subject: &str) -> bool {
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    match Pattern::new(pattern) {
        Ok(compiled) => compiled.matches_with(subject, options),
        Err(_) => pattern == subject,
    }
}

/// Match a parsed command (`head` + args) against a command-prefix pattern
///
/// Pattern words match subject tokens positionally; a trailing `*` matches
/// any remaining arguments, including none. A pattern without a trailing `*`
/// must consume the subject exactly.
pub fn command_match(pattern: &str, head: &str, args: &[String]) -> bool {
    let words: Vec<&str> = pattern.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }
    let mut subject: Vec<&str> = Vec::with_capacity(args.len() + 1);
    subject.push(head);
    subject.extend(args.iter().map(String::as_str));

    for (i, word) in words.iter().enumerate() {
        let last = i == words.len() - 1;
        if *word == "*" && last {
            return true;
        }
        match subject.get(i) {
            Some(token) => {
                if !wildcard_match(word, token) {
                    return false;
                }
            }
            None => return false,
        }
    }
    subject.len() == words.len()
}
