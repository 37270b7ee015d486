//! Text normalization for the sable execution engine.
//!
//! The normalizer rewrites Unicode text through a fixed pipeline (per-unit
//! pre-map, surrogate lookup, combining-mark composition, context-driven rule
//! application over katakana and ASCII runs, and a per-unit post-map) and can
//! emit the normalized form alone or interleaved with the original ("both"
//! mode), expand a string into its spelling variants, and extract either side
//! back out of a both-mode string.
//!
//! The dictionary-driven rewrite engine itself is an external collaborator,
//! reached through the [`RuleSet`] trait.

#![warn(missing_docs)]

pub mod chars;
mod error;
mod normalizer;
mod rule;
mod ruleset;

pub use error::NormError;
pub use normalizer::{
    Normalizer, OutputMode, DEFAULT_DELIMITERS, DEFAULT_ESCAPE, DEFAULT_MAX_BUF_LEN,
};
pub use rule::{NormRule, NormRuleBuilder};
pub use ruleset::{IdentityRules, MapRules, RuleSet, ENGLISH_SENTINEL, RULE_DELIMITERS};
