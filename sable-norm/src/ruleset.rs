//! The rule-application protocol.
//!
//! The normalizer hands each katakana or ASCII run to a rule engine and gets
//! back a tagged string: `X{A,B}Y` means the run `A` (as written) has the
//! normalized alternative `B`; untouched text passes through verbatim. In
//! production the engine wraps a morphological analyzer over a compiled
//! dictionary; the trait below is the full extent of the contract the
//! normalizer relies on.
//!
//! ASCII runs arrive wrapped in the [`ENGLISH_SENTINEL`] word-boundary
//! character at both ends; implementations are expected to consume it (the
//! dictionary maps the sentinel to nothing).

use std::collections::HashMap;

use sable_types::Utf16String;

use crate::error::NormError;

/// Delimiters of rule output: `X{A,B}Y`.
pub const RULE_DELIMITERS: [u16; 3] = [b'{' as u16, b',' as u16, b'}' as u16];

/// Word-boundary sentinel wrapped around ASCII runs.
pub const ENGLISH_SENTINEL: u16 = b'_' as u16;

/// A rule table the normalizer can apply to a buffered run.
pub trait RuleSet {
    /// Applies the rules to `input`, returning the tagged form.
    fn apply(&self, input: &Utf16String) -> Result<Utf16String, NormError>;
}

/// Strips the English word-boundary sentinel from both ends.
pub(crate) fn strip_sentinels(input: &Utf16String) -> Utf16String {
    let units = input.units();
    let start = units.iter().take_while(|u| **u == ENGLISH_SENTINEL).count();
    let end = units.len()
        - units
            .iter()
            .rev()
            .take_while(|u| **u == ENGLISH_SENTINEL)
            .count();
    if start >= end {
        Utf16String::new()
    } else {
        Utf16String::from(&units[start..end])
    }
}

/// A rule set that rewrites nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityRules;

impl RuleSet for IdentityRules {
    fn apply(&self, input: &Utf16String) -> Result<Utf16String, NormError> {
        Ok(strip_sentinels(input))
    }
}

/// A rule set backed by a whole-run lookup table.
///
/// A hit returns the stored tagged form; a miss passes the run through with
/// the sentinels consumed. This stands in for the dictionary engine in tests
/// and small deployments.
#[derive(Debug, Default, Clone)]
pub struct MapRules {
    entries: HashMap<Vec<u16>, Utf16String>,
}

impl MapRules {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the tagged output for a run. The key is matched against the
    /// buffered run including any sentinels.
    pub fn insert(&mut self, run: &str, tagged: &str) {
        self.entries.insert(
            Utf16String::from(run).units().to_vec(),
            Utf16String::from(tagged),
        );
    }
}

impl RuleSet for MapRules {
    fn apply(&self, input: &Utf16String) -> Result<Utf16String, NormError> {
        match self.entries.get(input.units()) {
            Some(tagged) => Ok(tagged.clone()),
            None => Ok(strip_sentinels(input)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_strips_sentinels() {
        let out = IdentityRules
            .apply(&Utf16String::from("_word_"))
            .unwrap();
        assert_eq!(out.to_string(), "word");
    }

    #[test]
    fn map_rules_hit_and_miss() {
        let mut rules = MapRules::new();
        rules.insert("_color_", "{color,colour}");
        assert_eq!(
            rules
                .apply(&Utf16String::from("_color_"))
                .unwrap()
                .to_string(),
            "{color,colour}"
        );
        assert_eq!(
            rules
                .apply(&Utf16String::from("_other_"))
                .unwrap()
                .to_string(),
            "other"
        );
    }
}
