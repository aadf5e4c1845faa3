mod request;

pub use request::{OffsetRange, QueryKey, ResultRequest, SearchRequest};

use crate::{
    config::MaxResults,
    item::{Item, Key, RowKey},
    store::{Data, Store},
    value::Val,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};

/// How long a non-incremental request waits when it names no timeout.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// `None` for detail rows.
    pub group_key: Option<Key>,
    pub depth: usize,
    pub values: Vec<Option<Val>>,
}

impl Row {
    fn from_item(item: &Item) -> Self {
        Self {
            group_key: item.key.key().cloned(),
            depth: item.key.depth(),
            values: item
                .generators
                .iter()
                .map(|generator| generator.as_ref().map(|g| g.eval().into_owned()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResult {
    pub component_id: String,
    pub rows: Vec<Row>,
    pub result_range: OffsetRange,
    /// Rows available before the requested range was applied.
    pub total_results: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<TableResult>,
    pub highlights: Vec<String>,
    pub errors: Vec<String>,
    pub complete: bool,
}

/// Builds responses for one query from its store.
pub struct SearchResponseCreator {
    store: Arc<dyn Store>,
}

impl SearchResponseCreator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn create(&self, request: &SearchRequest) -> SearchResponse {
        if !request.incremental {
            let timeout = request
                .timeout_duration()
                .unwrap_or(DEFAULT_COMPLETION_TIMEOUT);
            if !self.store.await_completion(timeout) {
                tracing::debug!(query = %request.key, ?timeout, "Responding before search completed");
            }
        }

        // Read before the data so a complete response carries final results.
        let complete = self.store.is_complete();

        let mut errors = self.store.errors();
        let mut results = Vec::with_capacity(request.components.len());
        for component in &request.components {
            match self.store.data(&component.component_id) {
                Some(data) => results.push(table_result(component, &data)),
                None => errors.push(format!(
                    "No data found for component {}",
                    component.component_id
                )),
            }
        }

        SearchResponse {
            results,
            highlights: self.store.highlights(),
            errors,
            complete,
        }
    }

    pub fn destroy(&self) {
        self.store.destroy();
    }
}

impl fmt::Debug for SearchResponseCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResponseCreator")
            .field("complete", &self.store.is_complete())
            .finish_non_exhaustive()
    }
}

fn table_result(request: &ResultRequest, data: &Data) -> TableResult {
    let unbounded = MaxResults::unbounded();
    let max_results = request.max_results.as_ref().unwrap_or(&unbounded);

    let mut rows = Vec::new();
    flatten(data, &Key::root(), max_results, &mut rows);
    let total_results = rows.len() as u64;

    let rows: Vec<Row> = match request.requested_range {
        Some(range) => rows
            .into_iter()
            .skip(usize::try_from(range.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(range.length).unwrap_or(usize::MAX))
            .collect(),
        None => rows,
    };
    let offset = request.requested_range.map_or(0, |range| range.offset);

    TableResult {
        component_id: request.component_id.clone(),
        result_range: OffsetRange::new(offset, rows.len() as u64),
        rows,
        total_results,
    }
}

/// Depth-first walk from `parent`, each group followed by its children.
fn flatten(data: &Data, parent: &Key, max_results: &MaxResults, rows: &mut Vec<Row>) {
    let limit = max_results.size(parent.len());
    for item in data.children(parent).iter().take(limit) {
        rows.push(Row::from_item(item));
        match &item.key {
            // Only ever descend: a key no longer than its parent has no children of its own.
            RowKey::Group(key) if key.len() > parent.len() => {
                flatten(data, key, max_results, rows)
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{FieldSpec, SortDirection},
        handler::payload,
        store::{StoreFactory, TableStoreFactory},
        value::Generator,
    };
    use std::{collections::HashMap, thread};

    fn grouped_request() -> SearchRequest {
        let fields = vec![
            FieldSpec::new("host").group(0),
            FieldSpec::new("count").sort(0, SortDirection::Descending),
        ];
        SearchRequest::new(
            QueryKey::new("q"),
            vec![ResultRequest::new("t", fields).show_detail(true)],
        )
    }

    fn host(name: &str, count: u64) -> Item {
        Item::new(
            RowKey::group(vec![Val::from(name)]),
            vec![
                Some(Generator::Value(Val::from(name))),
                Some(Generator::Count(count)),
            ],
        )
    }

    fn event(host: &str, count: u64) -> Item {
        Item::new(
            RowKey::detail(Key::root().child(host)),
            vec![None, Some(Generator::Count(count))],
        )
    }

    fn setup(request: &SearchRequest) -> (SearchResponseCreator, Arc<crate::store::TableStore>) {
        let factory = TableStoreFactory::new();
        let store = factory.create(request).unwrap();
        let table = factory.store(&request.key).unwrap();
        table
            .add_payload(
                "t",
                payload(vec![
                    host("a", 1),
                    host("b", 5),
                    event("a", 1),
                    event("b", 2),
                    event("b", 3),
                ]),
            )
            .unwrap();
        (SearchResponseCreator::new(store), table)
    }

    fn labels(rows: &[Row]) -> Vec<(usize, Option<Val>)> {
        rows.iter()
            .map(|row| (row.depth, row.values[1].clone()))
            .collect()
    }

    #[test]
    fn test_rows_are_flattened_depth_first() {
        let request = grouped_request();
        let (creator, _table) = setup(&request);

        let response = creator.create(&request);
        assert!(!response.complete);
        assert_eq!(response.results.len(), 1);

        let result = &response.results[0];
        assert_eq!(result.total_results, 5);
        assert_eq!(
            labels(&result.rows),
            vec![
                (0, Some(Val::Long(5))),
                (1, Some(Val::Long(3))),
                (1, Some(Val::Long(2))),
                (0, Some(Val::Long(1))),
                (1, Some(Val::Long(1))),
            ]
        );
        assert_eq!(result.rows[0].group_key, Some(Key::root().child("b")));
        assert_eq!(result.rows[1].group_key, None);
    }

    #[test]
    fn test_empty_group_keys_become_separate_top_level_rows() {
        let request = grouped_request();
        let factory = TableStoreFactory::new();
        let creator = SearchResponseCreator::new(factory.create(&request).unwrap());
        let table = factory.store(&request.key).unwrap();

        let ungrouped = |key: RowKey, count: u64| {
            Item::new(key, vec![None, Some(Generator::Count(count))])
        };
        table
            .add_payload(
                "t",
                payload(vec![
                    ungrouped(RowKey::Group(Key::root()), 1),
                    ungrouped(RowKey::group(Vec::<Val>::new()), 2),
                    ungrouped(RowKey::Group(Key::root()), 3),
                ]),
            )
            .unwrap();

        let result = creator.create(&request).results.remove(0);
        assert_eq!(result.total_results, 3);
        assert_eq!(
            labels(&result.rows),
            vec![
                (0, Some(Val::Long(3))),
                (0, Some(Val::Long(2))),
                (0, Some(Val::Long(1))),
            ]
        );
        assert!(result.rows.iter().all(|row| row.group_key.is_none()));
    }

    #[test]
    fn test_flatten_never_revisits_a_parent() {
        let looping = Item::new(
            RowKey::Group(Key::root()),
            vec![None, Some(Generator::Count(1))],
        );
        let data = Data::new(HashMap::from([(Key::root(), vec![looping])]), 1, 1);

        let result = table_result(&grouped_request().components[0], &data);
        assert_eq!(result.total_results, 1);
        assert_eq!(result.rows[0].depth, 0);
    }

    #[test]
    fn test_max_results_and_range_window() {
        let mut request = grouped_request();
        request.components[0].max_results = Some(MaxResults::new(vec![2, 1]));
        request.components[0].requested_range = Some(OffsetRange::new(1, 10));
        let (creator, _table) = setup(&request);

        let result = creator.create(&request).results.remove(0);
        // b, b's first event, a, a's first event; then skip one.
        assert_eq!(result.total_results, 4);
        assert_eq!(result.result_range, OffsetRange::new(1, 3));
        assert_eq!(
            labels(&result.rows),
            vec![
                (1, Some(Val::Long(3))),
                (0, Some(Val::Long(1))),
                (1, Some(Val::Long(1))),
            ]
        );
    }

    #[test]
    fn test_non_incremental_waits_for_completion() {
        let request = grouped_request().incremental(false).timeout(Duration::from_secs(5));
        let (creator, table) = setup(&request);

        let completer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            table.add_error("partial failure");
            table.complete();
        });

        let response = creator.create(&request);
        completer.join().unwrap();
        assert!(response.complete);
        assert_eq!(response.errors, vec!["partial failure".to_string()]);
    }

    #[test]
    fn test_non_incremental_gives_up_after_timeout() {
        let request = grouped_request()
            .incremental(false)
            .timeout(Duration::from_millis(10));
        let (creator, _table) = setup(&request);

        let response = creator.create(&request);
        assert!(!response.complete);
        assert_eq!(response.results[0].total_results, 5);
    }

    #[test]
    fn test_destroyed_store_reports_missing_data() {
        let request = grouped_request();
        let (creator, table) = setup(&request);

        creator.destroy();
        assert!(table.is_complete());

        let response = creator.create(&request);
        assert!(response.complete);
        assert!(response.results.is_empty());
        assert_eq!(response.errors.len(), 1);
    }

    #[test]
    fn test_response_serializes() {
        let request = grouped_request();
        let (creator, _table) = setup(&request);

        let json = serde_json::to_value(creator.create(&request)).unwrap();
        assert_eq!(json["results"][0]["componentId"], "t");
        assert_eq!(json["results"][0]["totalResults"], 5);
        assert_eq!(json["complete"], false);
    }
}
