use crate::{
    config::{MaxResults, StoreSize},
    field::FieldSpec,
};
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

/// Identity of one outstanding query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self(uuid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A window onto a flattened result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetRange {
    pub offset: u64,
    pub length: u64,
}

impl OffsetRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }
}

/// Settings for one table component of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRequest {
    pub component_id: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub show_detail: bool,
    #[serde(default)]
    pub max_results: Option<MaxResults>,
    #[serde(default)]
    pub store_size: StoreSize,
    #[serde(default)]
    pub requested_range: Option<OffsetRange>,
}

impl ResultRequest {
    pub fn new(component_id: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            component_id: component_id.into(),
            fields,
            show_detail: false,
            max_results: None,
            store_size: StoreSize::unbounded(),
            requested_range: None,
        }
    }

    pub fn show_detail(mut self, show_detail: bool) -> Self {
        self.show_detail = show_detail;
        self
    }

    pub fn max_results(mut self, max_results: impl Into<MaxResults>) -> Self {
        self.max_results = Some(max_results.into());
        self
    }

    pub fn store_size(mut self, store_size: impl Into<StoreSize>) -> Self {
        self.store_size = store_size.into();
        self
    }

    pub fn requested_range(mut self, range: OffsetRange) -> Self {
        self.requested_range = Some(range);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub key: QueryKey,
    pub components: Vec<ResultRequest>,
    /// Incremental requests return whatever is available immediately.
    #[serde(default = "incremental_by_default")]
    pub incremental: bool,
    /// How long a non-incremental request waits for the search to complete.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn incremental_by_default() -> bool {
    true
}

impl SearchRequest {
    pub fn new(key: QueryKey, components: Vec<ResultRequest>) -> Self {
        Self {
            key,
            components,
            incremental: true,
            timeout_ms: None,
        }
    }

    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn component(&self, component_id: &str) -> Option<&ResultRequest> {
        self.components
            .iter()
            .find(|c| c.component_id == component_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Sizes;

    #[test]
    fn test_search_request_decodes() {
        let json = r#"{
            "key": "7b1a5c3e",
            "incremental": false,
            "timeoutMs": 1500,
            "components": [{
                "componentId": "table-1",
                "fields": [{"name": "host", "group": 0}, {"name": "count"}],
                "maxResults": [100, 10],
                "storeSize": [1000, 100],
                "requestedRange": {"offset": 0, "length": 50}
            }]
        }"#;
        let request: SearchRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.key, QueryKey::new("7b1a5c3e"));
        assert!(!request.incremental);
        assert_eq!(request.timeout_duration(), Some(Duration::from_millis(1500)));

        let table = request.component("table-1").unwrap();
        assert_eq!(table.fields.len(), 2);
        assert!(!table.show_detail);
        assert_eq!(table.max_results, Some(Sizes::new(vec![100, 10])));
        assert_eq!(table.store_size, Sizes::new(vec![1000, 100]));
        assert_eq!(table.requested_range, Some(OffsetRange::new(0, 50)));
        assert!(request.component("table-2").is_none());
    }

    #[test]
    fn test_missing_settings_default_to_unbounded() {
        let json = r#"{"key": "q", "components": [{"componentId": "t", "fields": []}]}"#;
        let request: SearchRequest = serde_json::from_str(json).unwrap();

        assert!(request.incremental);
        assert_eq!(request.timeout_duration(), None);
        let table = &request.components[0];
        assert_eq!(table.max_results, None);
        assert!(table.store_size.is_unbounded());
    }

    #[test]
    fn test_built_and_decoded_requests_agree() {
        let json = r#"{"key": "q", "components": []}"#;
        let decoded: SearchRequest = serde_json::from_str(json).unwrap();
        assert_eq!(decoded, SearchRequest::new(QueryKey::new("q"), Vec::new()));
    }
}
