use serde::{Deserialize, Serialize};

/// Column schema requested from the generator and expected by the parser.
pub const RESEARCH_COLUMNS: [&str; 5] = ["Section", "Insight", "DataPoints", "Risks", "Opportunities"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticker(pub String);

impl Ticker {
    /// Trims and upper-cases user input. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        (!normalized.is_empty()).then_some(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One parsed row of research output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRecord {
    pub ticker: Ticker,
    pub section: String,
    pub insight: String,
    pub data_points: String,
    pub risks: String,
    pub opportunities: String,
}

impl ResearchRecord {
    /// Builds a record from fields in `RESEARCH_COLUMNS` order.
    pub fn from_fields(ticker: &Ticker, fields: Vec<String>) -> Option<Self> {
        let [section, insight, data_points, risks, opportunities] =
            <[String; 5]>::try_from(fields).ok()?;
        Some(Self { ticker: ticker.clone(), section, insight, data_points, risks, opportunities })
    }

    /// Spreadsheet row, ticker first.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.ticker.0.clone(),
            self.section.clone(),
            self.insight.clone(),
            self.data_points.clone(),
            self.risks.clone(),
            self.opportunities.clone(),
        ]
    }

    pub fn header_row() -> Vec<String> {
        std::iter::once("Ticker").chain(RESEARCH_COLUMNS).map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{ResearchRecord, Ticker};

    #[test]
    fn ticker_is_normalized() {
        assert_eq!(Ticker::parse("  nvda "), Some(Ticker("NVDA".to_owned())));
        assert_eq!(Ticker::parse("   "), None);
    }

    #[test]
    fn record_requires_exactly_five_fields() {
        let ticker = Ticker("NVDA".to_owned());
        let short = vec!["Valuation".to_owned(), "Fair".to_owned()];
        assert!(ResearchRecord::from_fields(&ticker, short).is_none());

        let full = ["Valuation", "Fair", "P/E 30", "None", "Upside"]
            .into_iter()
            .map(str::to_owned)
            .collect();
        let record = ResearchRecord::from_fields(&ticker, full).expect("five fields");
        assert_eq!(record.to_row()[0], "NVDA");
        assert_eq!(record.to_row()[1], "Valuation");
        assert_eq!(ResearchRecord::header_row().len(), record.to_row().len());
    }
}
