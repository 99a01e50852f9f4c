use crate::errors::{GateError, Result};
use crate::model::{CollectionName, DocumentId, Filter, Operation, Page};
use serde_json::Value as JsonValue;

/// Raw inputs of a document request, gathered from path segments and the
/// query string. Empty strings are treated the same as absent values.
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub collection: Option<CollectionName>,
    pub id: Option<DocumentId>,
    pub filter_field: Option<String>,
    pub filter_value: Option<String>,
    // raw JSON, handed to the store unchecked beyond being an object
    pub filter: Option<String>,
    pub count: bool,
    pub limit: Option<String>,
    pub skip: Option<String>,
}

impl DocumentQuery {
    /// Resolve the request into a single store operation.
    ///
    /// An identifier wins over every other input: the filter parameters are
    /// not even parsed. Otherwise the path equality pair is laid down first and
    /// the JSON filter is overlaid on top of it.
    pub fn plan(&self, paginate: bool) -> Result<Operation> {
        let collection = non_empty(&self.collection)
            .ok_or(GateError::MissingCollection)?
            .to_string();

        if let Some(id) = non_empty(&self.id) {
            return Ok(Operation::FetchById {
                collection,
                id: id.to_string(),
            });
        }

        let path_pair = match (non_empty(&self.filter_field), non_empty(&self.filter_value)) {
            (Some(f), Some(v)) => Some((f, v)),
            _ => None,
        };
        let filter = build_filter(path_pair, non_empty(&self.filter))?;

        if self.count {
            return Ok(Operation::Count { collection, filter });
        }
        let page = paginate
            .then(|| Page::from_params(self.limit.as_deref(), self.skip.as_deref()));
        Ok(Operation::List {
            collection,
            filter,
            page,
        })
    }
}

/// The collections endpoint only knows the count flag.
pub fn plan_collections(count: bool) -> Operation {
    if count {
        Operation::CountCollections
    } else {
        Operation::ListCollections
    }
}

/// Merge a path-derived `field = value` pair with a JSON-encoded filter
/// object. On key collision the JSON filter wins.
pub fn build_filter(path_pair: Option<(&str, &str)>, raw_json: Option<&str>) -> Result<Filter> {
    let mut filter = Filter::new();
    if let Some((field, value)) = path_pair {
        filter.insert(field.to_string(), JsonValue::String(value.to_string()));
    }
    if let Some(raw) = raw_json {
        let overlay = parse_filter(raw)?;
        filter.extend(overlay);
    }
    Ok(filter)
}

/// Parse a raw filter parameter. Only JSON objects are accepted.
pub fn parse_filter(raw: &str) -> Result<Filter> {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(map)) => Ok(map),
        _ => Err(GateError::InvalidFilter),
    }
}

/// The count flag is on only for the literal string `true`.
pub fn count_flag(raw: Option<&str>) -> bool {
    raw == Some("true")
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> DocumentQuery {
        DocumentQuery {
            collection: Some("users".into()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_collection_is_rejected() {
        let q = DocumentQuery::default();
        assert!(matches!(q.plan(false), Err(GateError::MissingCollection)));

        let q = DocumentQuery {
            collection: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(q.plan(false), Err(GateError::MissingCollection)));
    }

    #[test]
    fn identifier_takes_precedence_over_filters() {
        let q = DocumentQuery {
            id: Some("42".into()),
            filter_field: Some("status".into()),
            filter_value: Some("active".into()),
            // malformed on purpose: never parsed when an id is present
            filter: Some("{not json".into()),
            count: true,
            ..users()
        };
        assert_eq!(
            q.plan(true).unwrap(),
            Operation::FetchById {
                collection: "users".into(),
                id: "42".into()
            }
        );
    }

    #[test]
    fn json_filter_overlays_path_pair() {
        let f = build_filter(Some(("x", "y")), Some(r#"{"y": 1}"#)).unwrap();
        assert_eq!(JsonValue::Object(f), json!({"x": "y", "y": 1}));

        let f = build_filter(Some(("x", "y")), Some(r#"{"x": 5}"#)).unwrap();
        assert_eq!(JsonValue::Object(f), json!({"x": 5}));
    }

    #[test]
    fn path_pair_needs_both_halves() {
        let q = DocumentQuery {
            filter_field: Some("status".into()),
            filter_value: Some(String::new()),
            ..users()
        };
        match q.plan(false).unwrap() {
            Operation::List { filter, .. } => assert!(filter.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_or_non_object_filter_is_invalid() {
        for raw in ["{bad", "[1,2]", "42", "null", "\"text\""] {
            let q = DocumentQuery {
                filter: Some(raw.into()),
                ..users()
            };
            assert!(
                matches!(q.plan(false), Err(GateError::InvalidFilter)),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn count_flag_selects_count() {
        let q = DocumentQuery {
            filter: Some(r#"{"age": {"$gt": 30}}"#.into()),
            count: true,
            ..users()
        };
        assert_eq!(
            q.plan(true).unwrap(),
            Operation::Count {
                collection: "users".into(),
                filter: parse_filter(r#"{"age": {"$gt": 30}}"#).unwrap()
            }
        );
        assert!(count_flag(Some("true")));
        assert!(!count_flag(Some("TRUE")));
        assert!(!count_flag(Some("1")));
        assert!(!count_flag(None));
    }

    #[test]
    fn page_only_when_pagination_enabled() {
        let q = DocumentQuery {
            limit: Some("10".into()),
            skip: Some("20".into()),
            ..users()
        };
        match q.plan(false).unwrap() {
            Operation::List { page, .. } => assert_eq!(page, None),
            other => panic!("unexpected {other:?}"),
        }
        match q.plan(true).unwrap() {
            Operation::List { page, .. } => assert_eq!(
                page,
                Some(Page {
                    limit: 10,
                    skip: 20
                })
            ),
            other => panic!("unexpected {other:?}"),
        }
        match users().plan(true).unwrap() {
            Operation::List { page, .. } => assert_eq!(page, Some(Page::default())),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn collections_plan_follows_count_flag() {
        assert_eq!(plan_collections(true), Operation::CountCollections);
        assert_eq!(plan_collections(false), Operation::ListCollections);
    }
}
