// src/extractors/eps.rs

// --- Imports ---
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use regex::Regex;

// --- Constants ---
// Characters of text kept in front of a match so labels like "Net EPS" survive into the context.
const CONTEXT_LEAD_CHARS: usize = 24;

// --- Pattern Definitions ---
/// The EPS phrasings we search for, in the order they are applied.
/// The order matters downstream: the prioritizer sees candidates in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpsPattern {
    /// "EPS" followed by anything, then a number.
    Abbreviation,
    /// "Earnings per [common] share", optional trailing "cents".
    EarningsPerShare,
    /// "Loss per [common] share", optional trailing "cents".
    LossPerShare,
    /// "earnings" / "diluted" / "basic" / "eps", optionally "per [common] share".
    Qualifier,
    /// Narrow "loss per share".
    LossCatchAll,
    /// Any of the abbreviation or the two canonical phrases.
    BroadNet,
}

impl EpsPattern {
    pub const ALL: [EpsPattern; 6] = [
        EpsPattern::Abbreviation,
        EpsPattern::EarningsPerShare,
        EpsPattern::LossPerShare,
        EpsPattern::Qualifier,
        EpsPattern::LossCatchAll,
        EpsPattern::BroadNet,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EpsPattern::Abbreviation => "eps",
            EpsPattern::EarningsPerShare => "earnings-per-share",
            EpsPattern::LossPerShare => "loss-per-share",
            EpsPattern::Qualifier => "qualifier",
            EpsPattern::LossCatchAll => "loss-catch-all",
            EpsPattern::BroadNet => "broad-net",
        }
    }

    // (?i) case-insensitive, (?s) so the intervening span may cross line breaks.
    // Capture group 1 is always the signed decimal.
    fn source(&self) -> &'static str {
        match self {
            EpsPattern::Abbreviation => r"(?is)EPS\s*(?:.*?)(-?\d+(?:\.\d+)?)",
            EpsPattern::EarningsPerShare => {
                r"(?is)Earnings\s*per\s*(?:common\s*)?share\s*(?:.*?)(-?\d+(?:\.\d+)?)(?:\s*(?:cents|cents\s*per\s*share))?"
            }
            EpsPattern::LossPerShare => {
                r"(?is)Loss\s*per\s*(?:common\s*)?share\s*(?:.*?)(-?\d+(?:\.\d+)?)(?:\s*(?:cents|cents\s*per\s*share))?"
            }
            EpsPattern::Qualifier => {
                r"(?is)(?:earnings|diluted|basic|eps)\s*(?:per\s*(?:common\s*)?share)?\s*(?:.*?)(-?\d+(?:\.\d+)?)"
            }
            EpsPattern::LossCatchAll => r"(?is)(?:loss\s*per\s*share)\s*(?:.*?)(-?\d+(?:\.\d+)?)",
            EpsPattern::BroadNet => {
                r"(?is)(?:EPS|Earnings\s*per\s*(?:common\s*)?share|Loss\s*per\s*(?:common\s*)?share)\s*(?:.*?)(-?\d+(?:\.\d+)?)"
            }
        }
    }
}

// --- Regex Patterns (Lazy Static) ---
static EPS_PATTERNS: Lazy<Vec<(EpsPattern, Regex)>> = Lazy::new(|| {
    EpsPattern::ALL
        .iter()
        .map(|pattern| {
            let re = Regex::new(pattern.source()).expect("Failed to compile EPS pattern");
            (*pattern, re)
        })
        .collect()
});

// --- Data Structures ---

/// How many hits each pattern may contribute for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// First match of every pattern.
    #[default]
    First,
    /// Every non-overlapping match of every pattern.
    All,
}

/// A single pattern hit inside a text body.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsMatch {
    pub pattern: EpsPattern,
    pub value: f64,
    /// Byte span of the whole match in the searched text.
    pub span: (usize, usize),
    /// Whitespace-collapsed text around the match (lead-in plus matched text).
    pub context: String,
}

/// An EPS value found in a specific document.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub document: String,
    pub value: f64,
    pub pattern: EpsPattern,
    pub context: String,
}

impl Candidate {
    pub fn from_match(document: &str, hit: EpsMatch) -> Self {
        Self {
            document: document.to_string(),
            value: hit.value,
            pattern: hit.pattern,
            context: hit.context,
        }
    }
}

// --- Matcher ---
#[derive(Debug, Clone, Default)]
pub struct EpsMatcher {
    mode: MatchMode,
}

impl EpsMatcher {
    pub fn new(mode: MatchMode) -> Self {
        Self { mode }
    }

    /// Runs every pattern over `text`, in pattern order.
    /// A pattern that does not match contributes nothing; a capture that fails
    /// to parse is dropped without affecting the other hits.
    pub fn find_matches(&self, text: &str) -> Vec<EpsMatch> {
        let mut hits = Vec::new();

        for (pattern, re) in EPS_PATTERNS.iter() {
            let captures: Vec<regex::Captures> = match self.mode {
                MatchMode::First => re.captures(text).into_iter().collect(),
                MatchMode::All => re.captures_iter(text).collect(),
            };

            for caps in captures {
                let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };

                match parse_eps_value(number.as_str()) {
                    Ok(value) => {
                        tracing::trace!(
                            "Pattern '{}' matched {} at {}..{}",
                            pattern.label(),
                            value,
                            whole.start(),
                            whole.end()
                        );
                        hits.push(EpsMatch {
                            pattern: *pattern,
                            value,
                            span: (whole.start(), whole.end()),
                            context: context_window(text, whole.start(), whole.end()),
                        });
                    }
                    Err(e) => {
                        tracing::debug!("Discarding capture for pattern '{}': {}", pattern.label(), e);
                    }
                }
            }
        }

        hits
    }

    /// Extracts candidate EPS values for one document.
    pub fn extract_candidates(&self, document: &str, text: &str) -> Vec<Candidate> {
        self.find_matches(text)
            .into_iter()
            .map(|hit| Candidate::from_match(document, hit))
            .collect()
    }
}

/// Parses a captured EPS figure. Accounting-style parentheses denote a loss.
pub fn parse_eps_value(raw: &str) -> Result<f64, ExtractError> {
    let trimmed = raw.trim();
    let normalized = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => format!("-{}", inner.trim()),
        None => trimmed.to_string(),
    };

    let value: f64 = normalized
        .parse()
        .map_err(|_| ExtractError::MalformedNumber(raw.to_string()))?;

    if !value.is_finite() {
        return Err(ExtractError::MalformedNumber(raw.to_string()));
    }

    Ok(value)
}

fn context_window(text: &str, start: usize, end: usize) -> String {
    let lead_start = text[..start]
        .char_indices()
        .rev()
        .take(CONTEXT_LEAD_CHARS)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(start);

    text[lead_start..end].split_whitespace().collect::<Vec<_>>().join(" ")
}
