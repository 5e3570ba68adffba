//! Batch input and output types
//!
//! Supports:
//! - Delimited text with a `nome,regiao` (or `name,region`) header row
//! - Free text with one organization name per line
//! - JSON files with an array of names or objects with a `nome`/`name` field
//! - Ordered result records, one or more per input item
//! - Run summary with per-outcome counts

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::pacing::RunStatus;

/// `domain` value used whenever a record carries no real link
pub const DOMAIN_NOT_AVAILABLE: &str = "N/A";
/// The search ran and produced zero candidate links
pub const NO_RESULTS: &str = "Nenhum resultado encontrado";
/// The official-site query produced no candidate
pub const SUGGESTION_NOT_FOUND: &str = "Não encontrado";
/// Network failure or unsuccessful provider response for this item
pub const SEARCH_FAILED: &str = "Falha na busca";
/// The provider blocked the session while searching this item
pub const BLOCKED_BY_PROVIDER: &str = "Bloqueado pelo provedor";
/// The run stopped before this item was searched
pub const NOT_SEARCHED: &str = "Não pesquisado";
/// The item had no usable name
pub const INVALID_INPUT: &str = "Entrada inválida";

/// One organization to look up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchItem {
    /// Organization name as supplied
    pub name: String,
    /// Optional region qualifier (city, state...)
    #[serde(default)]
    pub region: Option<String>,
}

impl SearchItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
        }
    }

    pub fn with_region(name: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            name: name.into(),
            region: if region.trim().is_empty() { None } else { Some(region) },
        }
    }

    /// A searchable item has a non-empty name after trimming
    pub fn is_searchable(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// What happened to the item a record belongs to
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Found,
    NotFound,
    Failed,
    Blocked,
    NotSearched,
    InvalidInput,
}

impl RecordOutcome {
    /// Sentinel written in the `url` column, None when a real link is present
    pub fn sentinel(&self) -> Option<&'static str> {
        match self {
            RecordOutcome::Found => None,
            RecordOutcome::NotFound => Some(NO_RESULTS),
            RecordOutcome::Failed => Some(SEARCH_FAILED),
            RecordOutcome::Blocked => Some(BLOCKED_BY_PROVIDER),
            RecordOutcome::NotSearched => Some(NOT_SEARCHED),
            RecordOutcome::InvalidInput => Some(INVALID_INPUT),
        }
    }
}

/// One output row
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResultRecord {
    /// Zero-based position of the originating item in the input
    pub item_index: usize,
    /// Name of the originating item
    pub source_name: String,
    /// Region of the originating item
    pub region: Option<String>,
    /// Best candidate of the official-site query, when that query ran
    pub suggested_site: Option<String>,
    /// Host of the candidate without `www.`, or `N/A`
    pub domain: String,
    /// Candidate URL or a sentinel
    pub url: String,
    pub outcome: RecordOutcome,
}

impl ResultRecord {
    /// Record for a candidate link that was found
    pub fn found(
        item: &SearchItem,
        suggested_site: Option<String>,
        domain: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            item_index: 0,
            source_name: item.name.clone(),
            region: item.region.clone(),
            suggested_site,
            domain: domain.into(),
            url: url.into(),
            outcome: RecordOutcome::Found,
        }
    }

    /// Sentinel record for any outcome without a link
    pub fn sentinel(item: &SearchItem, suggested_site: Option<String>, outcome: RecordOutcome) -> Self {
        Self {
            item_index: 0,
            source_name: item.name.clone(),
            region: item.region.clone(),
            suggested_site,
            domain: DOMAIN_NOT_AVAILABLE.to_string(),
            url: outcome.sentinel().unwrap_or(NO_RESULTS).to_string(),
            outcome,
        }
    }

    pub fn with_item_index(mut self, item_index: usize) -> Self {
        self.item_index = item_index;
        self
    }

    pub fn has_link(&self) -> bool {
        self.outcome == RecordOutcome::Found
    }
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Number of input items
    pub total_items: usize,
    /// Items with at least one link
    pub found: usize,
    pub not_found: usize,
    pub failed: usize,
    pub blocked: usize,
    pub not_searched: usize,
    pub invalid: usize,
    /// Number of output records
    pub total_records: usize,
    pub total_duration_secs: f64,
    pub started_at: String,
    pub completed_at: String,
}

/// Ordered output of one run
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub status: RunStatus,
    pub summary: BatchSummary,
    pub records: Vec<ResultRecord>,
}

impl BatchResult {
    /// Records produced for the item with the given name, in output order
    pub fn records_for(&self, name: &str) -> Vec<&ResultRecord> {
        self.records.iter().filter(|r| r.source_name == name).collect()
    }
}

/// Input format for batch item files
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    /// Delimited text with a header row
    Csv,
    /// One name per line
    Text,
    /// JSON document
    Json,
}

impl InputFormat {
    /// Detect format from file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
            Some("csv") => Some(Self::Csv),
            Some("txt") => Some(Self::Text),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse search items from a file (auto-detects format from extension)
///
/// `.txt` files that start with a `nome`/`name` header row are read as CSV,
/// matching uploads that use the `nome,regiao` layout with a text extension.
pub fn parse_items_file(path: &Path) -> Result<Vec<SearchItem>> {
    let format = InputFormat::from_path(path)
        .context(format!("Cannot determine input format from file extension. Expected .csv, .txt or .json: {}", path.display()))?;

    let content = fs::read_to_string(path)
        .context(format!("Failed to read input file: {}", path.display()))?;

    match format {
        InputFormat::Csv => parse_csv_items(&content),
        InputFormat::Text if has_header(&content) => parse_csv_items(&content),
        InputFormat::Text => Ok(parse_text_items(&content)),
        InputFormat::Json => parse_json_items(&content),
    }
}

fn has_header(content: &str) -> bool {
    content
        .lines()
        .find(|l| !l.trim().is_empty())
        .and_then(|l| l.split(',').next())
        .map(|first| is_name_column(first.trim().trim_start_matches('\u{feff}')))
        .unwrap_or(false)
}

fn is_name_column(header: &str) -> bool {
    matches!(header.to_lowercase().as_str(), "nome" | "name")
}

fn is_region_column(header: &str) -> bool {
    matches!(header.to_lowercase().as_str(), "regiao" | "região" | "region")
}

/// Parse items from delimited content with a header row
///
/// The header must contain a `nome` (or `name`) column; a `regiao` (or
/// `region`) column is optional. Rows whose name is empty are kept so the
/// run can report them instead of silently dropping them.
pub fn parse_csv_items(content: &str) -> Result<Vec<SearchItem>> {
    let content = content.trim_start_matches('\u{feff}');
    let mut items = Vec::new();

    if content.trim().is_empty() {
        return Ok(items);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()
        .context("Failed to read CSV headers")?
        .clone();

    let name_idx = headers.iter().position(is_name_column)
        .context("CSV must have a 'nome' (or 'name') column")?;
    let region_idx = headers.iter().position(is_region_column);

    for result in reader.records() {
        let record = result.context("Failed to parse CSV record")?;

        // Entirely blank lines carry no item
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let name = record.get(name_idx).unwrap_or_default().to_string();
        let region = region_idx
            .and_then(|idx| record.get(idx))
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());

        items.push(SearchItem { name, region });
    }

    Ok(items)
}

/// Parse items from free text, one name per line
///
/// Blank lines and `#` comments are skipped.
pub fn parse_text_items(content: &str) -> Vec<SearchItem> {
    content
        .trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(SearchItem::new)
        .collect()
}

/// Parse items from JSON content
///
/// Supports three formats:
/// 1. Array of name strings: ["Rádio Santana FM", "Exemplo News"]
/// 2. Array of objects: [{"nome": "Exemplo News", "regiao": "Bahia"}]
/// 3. Object with "items" array: {"items": [...]}
pub fn parse_json_items(content: &str) -> Result<Vec<SearchItem>> {
    let value: serde_json::Value = serde_json::from_str(content)
        .context("Failed to parse JSON content")?;

    let entries = match &value {
        serde_json::Value::Array(arr) => parse_json_array(arr),

        serde_json::Value::Object(obj) => match obj.get("items") {
            Some(serde_json::Value::Array(arr)) => parse_json_array(arr),
            Some(_) => bail!("'items' field must be an array"),
            None => bail!("JSON object must have an 'items' array field"),
        },

        _ => bail!("JSON must be an array of names or an object with an 'items' field"),
    };

    Ok(entries)
}

fn parse_json_array(arr: &[serde_json::Value]) -> Vec<SearchItem> {
    let mut items = Vec::new();

    for value in arr {
        match value {
            serde_json::Value::String(name) => items.push(SearchItem::new(name.trim())),

            serde_json::Value::Object(obj) => {
                let name = obj.get("nome").or_else(|| obj.get("name"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default();
                let region = obj.get("regiao").or_else(|| obj.get("region"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());

                items.push(SearchItem { name, region });
            }

            _ => {
                // Numbers, nulls and nested arrays are not items
            }
        }
    }

    items
}

/// Create a new batch summary stamped with the start time
pub fn new_batch_summary() -> BatchSummary {
    BatchSummary {
        total_items: 0,
        found: 0,
        not_found: 0,
        failed: 0,
        blocked: 0,
        not_searched: 0,
        invalid: 0,
        total_records: 0,
        total_duration_secs: 0.0,
        started_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        completed_at: String::new(),
    }
}

/// Finalize a batch summary from the per-item outcomes and records
pub fn finalize_batch_summary(summary: &mut BatchSummary, outcomes: &[RecordOutcome], records: &[ResultRecord]) {
    summary.completed_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    summary.total_items = outcomes.len();
    summary.total_records = records.len();

    let count = |wanted: RecordOutcome| outcomes.iter().filter(|o| **o == wanted).count();
    summary.found = count(RecordOutcome::Found);
    summary.not_found = count(RecordOutcome::NotFound);
    summary.failed = count(RecordOutcome::Failed);
    summary.blocked = count(RecordOutcome::Blocked);
    summary.not_searched = count(RecordOutcome::NotSearched);
    summary.invalid = count(RecordOutcome::InvalidInput);
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============ CSV Parsing Tests ============

    #[test]
    fn test_parse_csv_with_portuguese_header() {
        let content = "nome,regiao\nRádio Santana FM,Bahia\nExemplo News,";
        let result = parse_csv_items(content).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Rádio Santana FM");
        assert_eq!(result[0].region, Some("Bahia".to_string()));
        assert_eq!(result[1].name, "Exemplo News");
        assert!(result[1].region.is_none());
    }

    #[test]
    fn test_parse_csv_with_english_header_and_column_order() {
        let content = "region,name\nSão Paulo,Folha Local";
        let result = parse_csv_items(content).unwrap();

        assert_eq!(result, vec![SearchItem::with_region("Folha Local", "São Paulo")]);
    }

    #[test]
    fn test_parse_csv_keeps_empty_names() {
        let content = "nome,regiao\n,Bahia\nExemplo News,Pernambuco";
        let result = parse_csv_items(content).unwrap();

        assert_eq!(result.len(), 2);
        assert!(!result[0].is_searchable());
        assert!(result[1].is_searchable());
    }

    #[test]
    fn test_parse_csv_skips_blank_rows() {
        let content = "nome\nExemplo News\n\nOutro Portal\n";
        let result = parse_csv_items(content).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[1].name, "Outro Portal");
    }

    #[test]
    fn test_parse_csv_requires_name_column() {
        let content = "site,regiao\nexample.com,Bahia";
        assert!(parse_csv_items(content).is_err());
    }

    #[test]
    fn test_parse_csv_strips_bom() {
        let content = "\u{feff}nome,regiao\nExemplo News,Bahia";
        let result = parse_csv_items(content).unwrap();
        assert_eq!(result[0].name, "Exemplo News");
    }

    #[test]
    fn test_parse_csv_empty() {
        assert!(parse_csv_items("").unwrap().is_empty());
    }

    // ============ Text Parsing Tests ============

    #[test]
    fn test_parse_text_one_name_per_line() {
        let content = "  Exemplo News  \n# comentário\n\nRádio Santana FM";
        let result = parse_text_items(content);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Exemplo News");
        assert_eq!(result[1].name, "Rádio Santana FM");
        assert!(result.iter().all(|i| i.region.is_none()));
    }

    #[test]
    fn test_text_header_detection() {
        assert!(has_header("nome,regiao\nA,B"));
        assert!(has_header("Name\nA"));
        assert!(!has_header("Exemplo News\nOutro"));
        assert!(!has_header(""));
    }

    // ============ JSON Parsing Tests ============

    #[test]
    fn test_parse_json_string_array() {
        let content = r#"["Exemplo News", "Rádio Santana FM"]"#;
        let result = parse_json_items(content).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[1].name, "Rádio Santana FM");
    }

    #[test]
    fn test_parse_json_object_array() {
        let content = r#"[
            {"nome": "Exemplo News", "regiao": "Bahia"},
            {"name": "Outro Portal"}
        ]"#;
        let result = parse_json_items(content).unwrap();

        assert_eq!(result[0], SearchItem::with_region("Exemplo News", "Bahia"));
        assert_eq!(result[1], SearchItem::new("Outro Portal"));
    }

    #[test]
    fn test_parse_json_items_field() {
        let content = r#"{"items": ["Exemplo News", 42, null]}"#;
        let result = parse_json_items(content).unwrap();
        assert_eq!(result, vec![SearchItem::new("Exemplo News")]);
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(parse_json_items("not valid json").is_err());
        assert!(parse_json_items(r#"{"items": "x"}"#).is_err());
        assert!(parse_json_items("42").is_err());
    }

    // ============ Input Format Detection Tests ============

    #[test]
    fn test_input_format_detection() {
        assert_eq!(InputFormat::from_path(Path::new("portais.csv")), Some(InputFormat::Csv));
        assert_eq!(InputFormat::from_path(Path::new("portais.TXT")), Some(InputFormat::Text));
        assert_eq!(InputFormat::from_path(Path::new("portais.json")), Some(InputFormat::Json));
        assert_eq!(InputFormat::from_path(Path::new("portais.xlsx")), None);
        assert_eq!(InputFormat::from_path(Path::new("portais")), None);
    }

    // ============ Record Tests ============

    #[test]
    fn test_sentinel_records_use_na_domain() {
        let item = SearchItem::new("Rádio Santana FM");
        let record = ResultRecord::sentinel(&item, None, RecordOutcome::NotFound);

        assert_eq!(record.domain, "N/A");
        assert_eq!(record.url, "Nenhum resultado encontrado");
        assert!(!record.has_link());

        let failed = ResultRecord::sentinel(&item, None, RecordOutcome::Failed);
        assert_eq!(failed.url, "Falha na busca");
    }

    #[test]
    fn test_batch_summary_finalize() {
        let item = SearchItem::new("Exemplo News");
        let records = vec![
            ResultRecord::found(&item, None, "exemplonews.com.br", "http://www.exemplonews.com.br/home"),
            ResultRecord::found(&item, None, "exemplonews.com", "https://exemplonews.com"),
            ResultRecord::sentinel(&SearchItem::new("B"), None, RecordOutcome::Failed),
        ];
        let outcomes = vec![RecordOutcome::Found, RecordOutcome::Failed];

        let mut summary = new_batch_summary();
        finalize_batch_summary(&mut summary, &outcomes, &records);

        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.found, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.not_found, 0);
        assert!(!summary.completed_at.is_empty());
    }
}
