// src/extractors/priority.rs
//! Collapses the candidates of each document into one EPS figure.
//!
//! Candidates are folded in the order given (discovery order of documents,
//! then pattern order within a document). Each document keeps one running
//! value; a later candidate replaces it according to the first matching
//! [`Precedence`] rule. There is no backtracking.

use std::collections::HashMap;

use crate::extractors::eps::Candidate;

/// Context markers that flag an explicitly labelled headline figure.
const NET_TOTAL_MARKERS: [&str; 2] = ["net eps", "total eps"];

/// Rules in evaluation order; the first one that applies decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    /// New is non-negative, current is a loss: take the new value.
    PositiveOverLoss,
    /// New has strictly smaller magnitude: take it.
    SmallerMagnitude,
    /// Both non-negative: keep the smaller of the two.
    MinimumNonNegative,
    /// New comes from a "net eps" / "total eps" context: take it.
    NetOrTotalLabel,
    /// New is a loss, current is non-negative: take the loss.
    LossOverPositive,
    /// Nothing applied: keep the current value.
    Retained,
}

/// Outcome of comparing a new candidate with the running value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub rule: Precedence,
    pub replace: bool,
}

/// Applies the precedence rules to one (current, new) pair.
///
/// Note that `PositiveOverLoss` and `LossOverPositive` express opposite
/// preferences, so the final value of a document can depend on the order in
/// which its candidates arrive.
pub fn decide(current: &Candidate, new: &Candidate) -> Decision {
    let (cur, val) = (current.value, new.value);

    if val >= 0.0 && cur < 0.0 {
        return Decision { rule: Precedence::PositiveOverLoss, replace: true };
    }
    if val.abs() < cur.abs() {
        return Decision { rule: Precedence::SmallerMagnitude, replace: true };
    }
    if val >= 0.0 && cur >= 0.0 {
        return Decision { rule: Precedence::MinimumNonNegative, replace: val < cur };
    }
    if has_net_total_marker(&new.context) {
        return Decision { rule: Precedence::NetOrTotalLabel, replace: true };
    }
    if val < 0.0 && cur >= 0.0 {
        return Decision { rule: Precedence::LossOverPositive, replace: true };
    }
    Decision { rule: Precedence::Retained, replace: false }
}

fn has_net_total_marker(context: &str) -> bool {
    let lowered = context.to_lowercase();
    NET_TOTAL_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// One resolved row: a document and its chosen EPS value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEps {
    pub document: String,
    pub value: f64,
}

/// Document identifier -> chosen EPS, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedResult {
    entries: Vec<ResolvedEps>,
}

impl ResolvedResult {
    #[cfg(test)]
    pub fn get(&self, document: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.document == document)
            .map(|entry| entry.value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedEps> {
        self.entries.iter()
    }
}

impl FromIterator<(String, f64)> for ResolvedResult {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(document, value)| ResolvedEps { document, value })
            .collect();
        Self { entries }
    }
}

// Running state of the fold: the current winner per document plus a lookup index.
#[derive(Default)]
struct Accumulator<'a> {
    current: Vec<&'a Candidate>,
    index: HashMap<&'a str, usize>,
}

impl<'a> Accumulator<'a> {
    fn absorb(mut self, candidate: &'a Candidate) -> Self {
        match self.index.get(candidate.document.as_str()).copied() {
            None => {
                self.index.insert(&candidate.document, self.current.len());
                self.current.push(candidate);
            }
            Some(slot) => {
                let held = self.current[slot];
                let decision = decide(held, candidate);
                tracing::debug!(
                    "{}: current {} vs new {} ({}) -> {:?}, replace={}",
                    candidate.document,
                    held.value,
                    candidate.value,
                    candidate.pattern.label(),
                    decision.rule,
                    decision.replace
                );
                if decision.replace {
                    self.current[slot] = candidate;
                }
            }
        }
        self
    }

    fn finish(self) -> ResolvedResult {
        self.current
            .into_iter()
            .map(|candidate| (candidate.document.clone(), candidate.value))
            .collect()
    }
}

/// Reduces every document's candidates to exactly one value.
/// Documents without candidates never appear in the result.
pub fn resolve(candidates: &[Candidate]) -> ResolvedResult {
    candidates
        .iter()
        .fold(Accumulator::default(), Accumulator::absorb)
        .finish()
}
