use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use sitefinder::error::SearchError;
use sitefinder::extract::{RawResultSet, SelectorSet, StructuredHit};
use sitefinder::provider::SearchProvider;
use sitefinder::query::SearchQuery;

/// What the scripted provider answers for an item
#[derive(Clone)]
pub enum Script {
    Links(Vec<&'static str>),
    Markup(String),
    Fail(SearchError),
}

/// In-memory provider that answers by item name and records every query
pub struct ScriptedProvider {
    scripts: Vec<(&'static str, Script)>,
    calls: Arc<Mutex<Vec<String>>>,
    selectors: SelectorSet,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            selectors: SelectorSet::google(),
        }
    }

    /// Answer every query that mentions `name` with `script`.
    ///
    /// When several scripts match a query, the one registered first wins.
    pub fn on(mut self, name: &'static str, script: Script) -> Self {
        self.scripts.push((name, script));
        self
    }

    /// Shared handle to the queries received, usable after the provider is boxed
    pub fn call_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(&self, query: &SearchQuery, _max_results: usize) -> Result<RawResultSet, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());

        let script = self
            .scripts
            .iter()
            .find(|(name, _)| query.as_str().contains(*name))
            .map(|(_, script)| script.clone());

        match script {
            Some(Script::Links(urls)) => Ok(RawResultSet::Structured(
                urls.into_iter()
                    .map(|url| StructuredHit { url: url.to_string(), title: None })
                    .collect(),
            )),
            Some(Script::Markup(html)) => Ok(RawResultSet::Markup(html)),
            Some(Script::Fail(err)) => Err(err),
            None => Ok(RawResultSet::Markup(String::from("<html><body></body></html>"))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn selectors(&self) -> &SelectorSet {
        &self.selectors
    }
}
