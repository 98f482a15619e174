use tracing::debug;

use crate::domain::record::{ResearchRecord, Ticker, RESEARCH_COLUMNS};
use crate::errors::DomainError;

/// Splits delimited generator output into rows of a fixed column schema.
#[derive(Clone, Debug)]
pub struct TableParser {
    columns: Vec<String>,
    delimiter: char,
}

impl TableParser {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { columns: columns.into_iter().map(Into::into).collect(), delimiter: ',' }
    }

    pub fn research() -> Self {
        Self::new(RESEARCH_COLUMNS)
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns data rows in input order. Rows with the wrong field count are
    /// dropped; if none survive the output is malformed.
    pub fn parse(&self, raw: &str) -> Result<Vec<Vec<String>>, DomainError> {
        let mut lines = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("```"))
            .peekable();

        let mut lines_seen = 0;
        if let Some(first) = lines.peek() {
            if self.is_header(first) {
                lines.next();
            }
        }

        let mut rows = Vec::new();
        for line in lines {
            lines_seen += 1;
            let fields = split_fields(line, self.delimiter);
            if fields.len() == self.columns.len() {
                rows.push(fields);
            } else {
                debug!(
                    expected = self.columns.len(),
                    found = fields.len(),
                    line,
                    "dropping row with unexpected field count"
                );
            }
        }

        if rows.is_empty() {
            return Err(DomainError::MalformedOutput {
                expected_columns: self.columns.len(),
                lines_seen,
            });
        }

        Ok(rows)
    }

    fn is_header(&self, line: &str) -> bool {
        let fields = split_fields(line, self.delimiter);
        fields.len() == self.columns.len()
            && fields
                .iter()
                .zip(&self.columns)
                .all(|(field, column)| field.eq_ignore_ascii_case(column))
    }
}

/// Parses research output into records tagged with `ticker`.
pub fn parse_records(raw: &str, ticker: &Ticker) -> Result<Vec<ResearchRecord>, DomainError> {
    let rows = TableParser::research().parse(raw)?;
    Ok(rows.into_iter().filter_map(|fields| ResearchRecord::from_fields(ticker, fields)).collect())
}

/// Quote-aware split. Delimiters inside double quotes are kept literally and
/// `""` inside a quoted field is an escaped quote. Fields are trimmed.
fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && matches!(chars.peek(), Some('"')) => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ch if ch == delimiter && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            ch => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

#[cfg(test)]
mod tests {
    use super::{parse_records, split_fields, TableParser};
    use crate::domain::record::Ticker;
    use crate::errors::DomainError;

    fn nvda() -> Ticker {
        Ticker("NVDA".to_owned())
    }

    #[test]
    fn header_plus_one_row_yields_one_record() {
        let raw = "Section,Insight,DataPoints,Risks,Opportunities\nValuation,Fairly priced,P/E 30,None,Upside\n";

        let records = parse_records(raw, &nvda()).expect("one valid row");

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].section, "Valuation");
        assert_eq!(records[0].insight, "Fairly priced");
        assert_eq!(records[0].opportunities, "Upside");
        assert_eq!(records[0].ticker, nvda());
    }

    #[test]
    fn headerless_input_keeps_every_row_in_order() {
        let raw = "Valuation,Fair,P/E 30,None,Upside\n\
                   Growth,Strong,Rev +20%,Competition,AI demand\n\
                   Balance Sheet,Clean,Cash $26B,Low,Buybacks";

        let records = parse_records(raw, &nvda()).expect("three rows");

        let sections: Vec<_> = records.iter().map(|record| record.section.as_str()).collect();
        assert_eq!(sections, ["Valuation", "Growth", "Balance Sheet"]);
    }

    #[test]
    fn header_match_is_case_insensitive_but_order_sensitive() {
        let lower = "section,insight,datapoints,risks,opportunities\nA,B,C,D,E";
        assert_eq!(TableParser::research().parse(lower).map(|rows| rows.len()), Ok(1));

        // Reordered header is treated as data since it has the right width.
        let reordered = "Insight,Section,DataPoints,Risks,Opportunities\nA,B,C,D,E";
        assert_eq!(TableParser::research().parse(reordered).map(|rows| rows.len()), Ok(2));
    }

    #[test]
    fn mismatched_rows_are_dropped() {
        let raw = "Section,Insight,DataPoints,Risks,Opportunities\n\
                   Here is your analysis:\n\
                   Valuation,Fair,P/E 30,None,Upside\n\
                   too,few,fields";

        let records = parse_records(raw, &nvda()).expect("one surviving row");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn quoted_fields_keep_embedded_delimiters() {
        let raw = r#"Growth,"Revenue up, margins expanding","Rev $10B, +20%",None,"Data center, gaming""#;

        let records = parse_records(raw, &nvda()).expect("quoted row");

        assert_eq!(records[0].insight, "Revenue up, margins expanding");
        assert_eq!(records[0].data_points, "Rev $10B, +20%");
        assert_eq!(records[0].opportunities, "Data center, gaming");
    }

    #[test]
    fn escaped_quotes_and_whitespace_are_handled() {
        let fields = split_fields(r#"  a ,"say ""hi""", c "#, ',');
        assert_eq!(fields, ["a", r#"say "hi""#, "c"]);
    }

    #[test]
    fn code_fences_around_the_table_are_ignored() {
        let raw = "```csv\nSection,Insight,DataPoints,Risks,Opportunities\nValuation,Fair,P/E 30,None,Upside\n```";
        assert_eq!(parse_records(raw, &nvda()).map(|records| records.len()), Ok(1));
    }

    #[test]
    fn single_malformed_line_is_an_error() {
        let result = parse_records("I cannot help with that.", &nvda());
        assert_eq!(
            result,
            Err(DomainError::MalformedOutput { expected_columns: 5, lines_seen: 1 })
        );
    }

    #[test]
    fn header_only_or_empty_output_is_malformed() {
        assert!(matches!(
            parse_records("Section,Insight,DataPoints,Risks,Opportunities", &nvda()),
            Err(DomainError::MalformedOutput { lines_seen: 0, .. })
        ));
        assert!(matches!(parse_records("\n \n", &nvda()), Err(DomainError::MalformedOutput { .. })));
    }

    #[test]
    fn custom_delimiter_is_supported() {
        let parser = TableParser::new(["a", "b"]).with_delimiter('|');
        let rows = parser.parse("a|b\n1|2\n3|4").expect("two rows");
        assert_eq!(rows, vec![vec!["1", "2"], vec!["3", "4"]]);
        assert_eq!(parser.columns().len(), 2);
    }
}
