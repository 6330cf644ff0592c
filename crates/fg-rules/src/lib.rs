//! FilterGate Rules
//!
//! This crate turns ABP/uBO/AdGuard-style filter lists into network rules the
//! FilterGate core can match: it parses rule text and modifiers, compiles URL
//! patterns, and keeps the rules in an in-memory [`RuleStore`].

pub mod error;
pub mod parser;
pub mod pattern;
pub mod rule;
pub mod storage;

pub use error::RuleSyntaxError;
pub use pattern::Pattern;
pub use rule::NetworkRule;
pub use storage::{ListStats, RuleStore};
