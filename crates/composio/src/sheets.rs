use std::sync::Arc;

use async_trait::async_trait;
use hedgeflow_core::domain::record::ResearchRecord;
use hedgeflow_core::errors::IntegrationError;
use hedgeflow_core::ports::{SpreadsheetService, WorksheetHandle};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::client::{ComposioClient, SERVICE};

pub const APPEND_VALUES: &str = "GOOGLESHEETS_SPREADSHEETS_VALUES_APPEND";
pub const GET_SHEET_NAMES: &str = "GOOGLESHEETS_GET_SHEET_NAMES";
pub const ADD_SHEET: &str = "GOOGLESHEETS_ADD_SHEET";
pub const BATCH_GET: &str = "GOOGLESHEETS_BATCH_GET";

/// Arguments of the values-append action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SheetAppend {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub values: Vec<Vec<String>>,
    pub value_input_option: String,
}

impl SheetAppend {
    pub fn new(handle: &WorksheetHandle, values: Vec<Vec<String>>) -> Self {
        Self {
            spreadsheet_id: handle.spreadsheet_id.clone(),
            sheet_name: handle.worksheet.clone(),
            values,
            value_input_option: "USER_ENTERED".to_string(),
        }
    }

    pub fn for_records(handle: &WorksheetHandle, records: &[ResearchRecord]) -> Self {
        Self::new(handle, records.iter().map(ResearchRecord::to_row).collect())
    }
}

pub struct ComposioSheets {
    client: Arc<ComposioClient>,
    spreadsheet_id: String,
    connected_account_id: String,
}

impl ComposioSheets {
    pub fn new(
        client: Arc<ComposioClient>,
        spreadsheet_id: impl Into<String>,
        connected_account_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            spreadsheet_id: spreadsheet_id.into(),
            connected_account_id: connected_account_id.into(),
        }
    }

    async fn append(&self, request: SheetAppend) -> Result<(), IntegrationError> {
        let arguments = serde_json::to_value(&request)
            .map_err(|error| IntegrationError::decode(SERVICE, error.to_string()))?;
        self.client.execute(APPEND_VALUES, Some(self.connected_account_id.as_str()), arguments).await?;
        Ok(())
    }

    async fn has_header(&self, handle: &WorksheetHandle) -> Result<bool, IntegrationError> {
        let data = self
            .client
            .execute(
                BATCH_GET,
                Some(self.connected_account_id.as_str()),
                serde_json::json!({
                    "spreadsheet_id": self.spreadsheet_id,
                    "ranges": [header_range(&handle.worksheet)],
                }),
            )
            .await?;
        Ok(first_row_from(&data).iter().any(|cell| !cell.trim().is_empty()))
    }
}

/// A1 range covering the header row of `worksheet`.
pub(crate) fn header_range(worksheet: &str) -> String {
    let last_column = char::from(b'A' + (ResearchRecord::header_row().len() - 1) as u8);
    format!("'{}'!A1:{last_column}1", worksheet.replace('\'', "''"))
}

/// Reads the first row of the first range in a batch-get result.
pub(crate) fn first_row_from(data: &Value) -> Vec<String> {
    let ranges = data
        .get("valueRanges")
        .or_else(|| data.get("response_data").and_then(|inner| inner.get("valueRanges")));
    ranges
        .and_then(Value::as_array)
        .and_then(|ranges| ranges.first())
        .and_then(|range| range.get("values"))
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_array)
        .map(|cells| cells.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Reads worksheet titles from a get-sheet-names result.
pub(crate) fn sheet_names_from(data: &Value) -> Vec<String> {
    let names = data
        .get("sheet_names")
        .or_else(|| data.get("response_data").and_then(|inner| inner.get("sheet_names")));
    names
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

#[async_trait]
impl SpreadsheetService for ComposioSheets {
    async fn ensure_worksheet(&self, name: &str) -> Result<WorksheetHandle, IntegrationError> {
        let handle =
            WorksheetHandle { spreadsheet_id: self.spreadsheet_id.clone(), worksheet: name.to_string() };
        let data = self
            .client
            .execute(
                GET_SHEET_NAMES,
                Some(self.connected_account_id.as_str()),
                serde_json::json!({ "spreadsheet_id": self.spreadsheet_id }),
            )
            .await?;

        if !sheet_names_from(&data).iter().any(|existing| existing == name) {
            self.client
                .execute(
                    ADD_SHEET,
                    Some(self.connected_account_id.as_str()),
                    serde_json::json!({
                        "spreadsheet_id": self.spreadsheet_id,
                        "properties": { "title": name },
                    }),
                )
                .await?;
            info!(event_name = "sheets.worksheet_created", worksheet = name, "created worksheet");
        }

        // Checked on every run so a tab left without its header gets one.
        if !self.has_header(&handle).await? {
            self.append(SheetAppend::new(&handle, vec![ResearchRecord::header_row()])).await?;
            info!(event_name = "sheets.header_written", worksheet = name, "wrote header row");
        }
        Ok(handle)
    }

    async fn append_rows(
        &self,
        handle: &WorksheetHandle,
        rows: &[ResearchRecord],
    ) -> Result<(), IntegrationError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.append(SheetAppend::for_records(handle, rows)).await?;
        info!(event_name = "sheets.rows_appended", worksheet = %handle.worksheet, rows = rows.len(), "appended research rows");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hedgeflow_core::domain::record::{ResearchRecord, Ticker};
    use hedgeflow_core::ports::WorksheetHandle;
    use serde_json::json;

    use super::{first_row_from, header_range, sheet_names_from, SheetAppend};

    fn handle() -> WorksheetHandle {
        WorksheetHandle { spreadsheet_id: "sheet-1".to_string(), worksheet: "Research".to_string() }
    }

    #[test]
    fn append_payload_puts_ticker_first() {
        let record = ResearchRecord::from_fields(
            &Ticker("NVDA".to_string()),
            ["Growth", "Strong", "Rev +120%", "Supply", "AI"].map(str::to_string).to_vec(),
        )
        .expect("five fields");

        let payload = serde_json::to_value(SheetAppend::for_records(&handle(), &[record]))
            .expect("serialize");

        assert_eq!(payload["spreadsheet_id"], "sheet-1");
        assert_eq!(payload["sheet_name"], "Research");
        assert_eq!(payload["value_input_option"], "USER_ENTERED");
        assert_eq!(payload["values"][0][0], "NVDA");
        assert_eq!(payload["values"][0][1], "Growth");
    }

    #[test]
    fn sheet_names_are_read_from_either_shape() {
        let flat = json!({"sheet_names": ["Sheet1", "Research"]});
        let nested = json!({"response_data": {"sheet_names": ["Sheet1"]}});

        assert_eq!(sheet_names_from(&flat), ["Sheet1", "Research"]);
        assert_eq!(sheet_names_from(&nested), ["Sheet1"]);
        assert!(sheet_names_from(&json!({})).is_empty());
    }

    #[test]
    fn header_range_spans_every_column() {
        assert_eq!(header_range("Research"), "'Research'!A1:F1");
        assert_eq!(header_range("Try Out"), "'Try Out'!A1:F1");
        assert_eq!(header_range("Bob's"), "'Bob''s'!A1:F1");
    }

    #[test]
    fn missing_first_row_reads_as_empty() {
        let written = json!({"valueRanges": [{"range": "'Research'!A1:F1", "values": [["Ticker", "Section"]]}]});
        let nested = json!({"response_data": {"valueRanges": [{"values": [["Ticker"]]}]}});
        let blank_tab = json!({"valueRanges": [{"range": "'Research'!A1:F1"}]});

        assert_eq!(first_row_from(&written), ["Ticker", "Section"]);
        assert_eq!(first_row_from(&nested), ["Ticker"]);
        assert!(first_row_from(&blank_tab).is_empty());
        assert!(first_row_from(&json!({})).is_empty());
    }
}
