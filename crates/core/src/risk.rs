use std::collections::BTreeSet;

pub const DEFAULT_RISK_TERMS: &[&str] = &[
    "risk",
    "competition",
    "disruption",
    "geopolitical",
    "regulatory",
    "failure",
    "loss",
    "debt",
    "drawdown",
    "negative",
    "decrease",
    "down",
    "decline",
    "crisis",
    "impairment",
];

/// Normalized, de-duplicated set of risk keywords.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RiskTerms {
    terms: BTreeSet<String>,
}

impl RiskTerms {
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms = terms
            .into_iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect();
        Self { terms }
    }

    /// Parses a comma separated list such as `risk, debt,decline`.
    pub fn from_csv(value: &str) -> Self {
        Self::new(value.split(','))
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_RISK_TERMS)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn scan(&self, text: &str) -> bool {
        if self.terms.is_empty() {
            return false;
        }
        let haystack = text.to_lowercase();
        self.terms.iter().any(|term| haystack.contains(term.as_str()))
    }

    /// Matched terms in sorted order.
    pub fn matches(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.terms.iter().filter(|term| haystack.contains(term.as_str())).cloned().collect()
    }
}

/// Substring scan, case-insensitive. An empty term set never matches.
pub fn scan<S: AsRef<str>>(text: &str, terms: &[S]) -> bool {
    RiskTerms::new(terms).scan(text)
}
