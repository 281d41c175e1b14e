//! metro - Rule engine
//!
//! Classifies records by matching their path against an ordered set of
//! rules, in two phases:
//!
//! 1. **Rewrites**: each matching rule replaces the first regex match in the
//!    path (capture-group substitution supported). A rule marked `stop` ends
//!    the phase when it matches.
//! 2. **Routing**: each matching rule queues a copy of the record on every
//!    host its clusters select. The first match ends the phase unless the
//!    rule is marked `continue`. A record matching no rule is dropped.
//!
//! Regexes compile once at startup; evaluation is pure and shares no mutable
//! state, so any number of workers can route concurrently.

mod engine;
mod error;

pub use engine::Engine;
pub use error::RuleError;
