// src/extractors/mod.rs
pub mod eps;
pub mod priority;

// Re-export key extraction types for convenience
#[allow(unused_imports)]
pub use eps::{Candidate, EpsMatch, EpsMatcher, EpsPattern, MatchMode};
#[allow(unused_imports)]
pub use priority::{resolve, Decision, Precedence, ResolvedEps, ResolvedResult};
