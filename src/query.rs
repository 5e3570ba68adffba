//! Search query construction

use once_cell::sync::Lazy;
use regex::Regex;

use crate::batch::SearchItem;
use crate::error::SearchError;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Which kind of lookup a query is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Single best candidate: quoted name plus the official-site qualifier
    OfficialSite,
    /// Several candidates: quoted name and region plus the general qualifier
    General,
}

/// Qualifier phrases appended to the quoted terms
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    pub official_qualifier: String,
    pub general_qualifier: Option<String>,
}

impl Default for QueryTemplate {
    fn default() -> Self {
        Self {
            official_qualifier: "site oficial".to_string(),
            general_qualifier: None,
        }
    }
}

/// A ready-to-send search string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    text: String,
    mode: QueryMode,
}

impl SearchQuery {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Collapse whitespace and drop double quotes so the term can be quoted safely
fn clean_term(term: &str) -> String {
    let without_quotes = term.replace(['"', '“', '”'], " ");
    WHITESPACE_RUN.replace_all(without_quotes.trim(), " ").trim().to_string()
}

/// Build the query for an item in the given mode
pub fn build_query(item: &SearchItem, mode: QueryMode, template: &QueryTemplate) -> Result<SearchQuery, SearchError> {
    let name = clean_term(&item.name);
    if name.is_empty() {
        return Err(SearchError::InvalidInput("organization name is empty".to_string()));
    }

    let text = match mode {
        QueryMode::OfficialSite => {
            with_qualifier(format!("\"{}\"", name), Some(&template.official_qualifier))
        }
        QueryMode::General => {
            let region = item.region.as_deref().map(clean_term).filter(|r| !r.is_empty());
            let quoted = match region {
                Some(region) => format!("\"{} {}\"", name, region),
                None => format!("\"{}\"", name),
            };
            with_qualifier(quoted, template.general_qualifier.as_ref())
        }
    };

    Ok(SearchQuery { text, mode })
}

fn with_qualifier(quoted: String, qualifier: Option<&String>) -> String {
    match qualifier.map(|q| q.trim()).filter(|q| !q.is_empty()) {
        Some(qualifier) => format!("{} {}", quoted, qualifier),
        None => quoted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news_template() -> QueryTemplate {
        QueryTemplate {
            official_qualifier: "site oficial".to_string(),
            general_qualifier: Some("portal de notícias site oficial".to_string()),
        }
    }

    #[test]
    fn test_official_site_query() {
        let item = SearchItem::with_region("Exemplo News", "Bahia");
        let query = build_query(&item, QueryMode::OfficialSite, &QueryTemplate::default()).unwrap();

        assert_eq!(query.as_str(), "\"Exemplo News\" site oficial");
        assert_eq!(query.mode(), QueryMode::OfficialSite);
    }

    #[test]
    fn test_general_query_with_region_and_qualifier() {
        let item = SearchItem::with_region("Exemplo News", "Bahia");
        let query = build_query(&item, QueryMode::General, &news_template()).unwrap();

        assert_eq!(query.to_string(), "\"Exemplo News Bahia\" portal de notícias site oficial");
    }

    #[test]
    fn test_general_query_without_region_or_qualifier() {
        let item = SearchItem::new("Rádio Santana FM");
        let query = build_query(&item, QueryMode::General, &QueryTemplate::default()).unwrap();

        assert_eq!(query.as_str(), "\"Rádio Santana FM\"");
    }

    #[test]
    fn test_whitespace_and_quotes_are_cleaned() {
        let item = SearchItem::new("  Jornal   \"O Povo\"\t ");
        let query = build_query(&item, QueryMode::OfficialSite, &QueryTemplate::default()).unwrap();

        assert_eq!(query.as_str(), "\"Jornal O Povo\" site oficial");
    }

    #[test]
    fn test_blank_qualifier_is_ignored() {
        let template = QueryTemplate {
            official_qualifier: "   ".to_string(),
            general_qualifier: Some(String::new()),
        };
        let item = SearchItem::new("Exemplo News");

        assert_eq!(build_query(&item, QueryMode::OfficialSite, &template).unwrap().as_str(), "\"Exemplo News\"");
        assert_eq!(build_query(&item, QueryMode::General, &template).unwrap().as_str(), "\"Exemplo News\"");
    }

    #[test]
    fn test_empty_name_is_invalid_input() {
        for name in ["", "   ", "\"\""] {
            let err = build_query(&SearchItem::new(name), QueryMode::General, &QueryTemplate::default()).unwrap_err();
            assert!(matches!(err, SearchError::InvalidInput(_)), "name {:?} should be rejected", name);
        }
    }
}
