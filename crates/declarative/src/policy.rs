//! Composition policy - named flags evaluated once at graph-build time

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of a single policy flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    /// On/off switch, e.g. `kyverno.reporter`
    Bool(bool),
    /// One of a closed set of values, e.g. `target = "local"`
    Choice(String),
    /// A list driving a loop, e.g. policy names
    List(Vec<String>),
}

/// Flags that decide which optional nodes and edges a graph contains
///
/// Absent flags read as "off": `enabled` is false, `choice` is `None`,
/// `list` is empty. A policy is never changed once graph building starts;
/// components only receive `&Policy`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Policy {
    flags: BTreeMap<String, Flag>,
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flag, replacing any previous value
    pub fn with_flag(mut self, name: impl Into<String>, flag: Flag) -> Self {
        self.flags.insert(name.into(), flag);
        self
    }

    pub fn with_bool(self, name: impl Into<String>, value: bool) -> Self {
        self.with_flag(name, Flag::Bool(value))
    }

    pub fn with_choice(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_flag(name, Flag::Choice(value.into()))
    }

    pub fn with_list<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_flag(name, Flag::List(values.into_iter().map(Into::into).collect()))
    }

    /// Whether a boolean flag is set to true
    pub fn enabled(&self, name: &str) -> bool {
        matches!(self.flags.get(name), Some(Flag::Bool(true)))
    }

    /// Value of a choice flag
    pub fn choice(&self, name: &str) -> Option<&str> {
        match self.flags.get(name) {
            Some(Flag::Choice(value)) => Some(value),
            _ => None,
        }
    }

    /// Whether a choice flag equals `value`
    pub fn is(&self, name: &str, value: &str) -> bool {
        self.choice(name) == Some(value)
    }

    /// Entries of a list flag
    pub fn list(&self, name: &str) -> &[String] {
        match self.flags.get(name) {
            Some(Flag::List(values)) => values,
            _ => &[],
        }
    }

    pub fn get(&self, name: &str) -> Option<&Flag> {
        self.flags.get(name)
    }

    /// All flags in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Flag)> {
        self.flags.iter().map(|(name, flag)| (name.as_str(), flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_flags_read_as_off() {
        let policy = Policy::new();
        assert!(!policy.enabled("kyverno.reporter"));
        assert_eq!(policy.choice("target"), None);
        assert!(policy.list("policies").is_empty());
    }

    #[test]
    fn test_typed_accessors() {
        let policy = Policy::new()
            .with_bool("reporter", true)
            .with_choice("target", "local")
            .with_list("policies", ["require-namespace"]);

        assert!(policy.enabled("reporter"));
        assert!(policy.is("target", "local"));
        assert!(!policy.is("target", "remote"));
        assert_eq!(policy.list("policies"), ["require-namespace".to_string()]);
        // Wrong type reads as off
        assert!(!policy.enabled("target"));
        assert!(policy.list("reporter").is_empty());
    }

    #[test]
    fn test_untagged_deserialization() {
        let policy: Policy = serde_json::from_str(
            r#"{ "reporter": false, "target": "remote", "policies": ["a", "b"] }"#,
        )
        .unwrap();
        assert_eq!(policy.get("reporter"), Some(&Flag::Bool(false)));
        assert_eq!(policy.choice("target"), Some("remote"));
        assert_eq!(policy.list("policies").len(), 2);
        let names: Vec<_> = policy.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["policies", "reporter", "target"]);
    }
}
