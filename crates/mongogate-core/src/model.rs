use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub type CollectionName = String;
pub type DocumentId = String;

/// Field -> expected value (or store operator expression).
pub type Filter = Map<String, JsonValue>;

/// A stored document as relaxed JSON.
pub type Document = JsonValue;

pub const DEFAULT_PAGE_LIMIT: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: u64,
    pub skip: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            skip: 0,
        }
    }
}

impl Page {
    /// Lenient parse of the raw `limit` / `skip` parameters. Anything that is
    /// not a positive limit or a non-negative skip falls back to the default.
    pub fn from_params(limit: Option<&str>, skip: Option<&str>) -> Self {
        let limit = limit
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        let skip = skip
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0);
        Self { limit, skip }
    }
}

/// One command against the store, fully resolved from a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ListCollections,
    CountCollections,
    FetchById {
        collection: CollectionName,
        id: DocumentId,
    },
    Count {
        collection: CollectionName,
        filter: Filter,
    },
    List {
        collection: CollectionName,
        filter: Filter,
        page: Option<Page>,
    },
}

impl Operation {
    /// Short label used for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListCollections => "list_collections",
            Operation::CountCollections => "count_collections",
            Operation::FetchById { .. } => "fetch_by_id",
            Operation::Count { .. } => "count",
            Operation::List { .. } => "list",
        }
    }
}

/// What the store handed back for an [`Operation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Names(Vec<String>),
    Count(u64),
    Documents(Vec<Document>),
    Document(Option<Document>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_when_params_missing_or_bad() {
        assert_eq!(Page::from_params(None, None), Page::default());
        assert_eq!(
            Page::from_params(Some("abc"), Some("-3")),
            Page {
                limit: 1000,
                skip: 0
            }
        );
        // zero limit means "use the default", not "return nothing"
        assert_eq!(Page::from_params(Some("0"), None).limit, 1000);
    }

    #[test]
    fn trailing_garbage_is_not_a_number() {
        assert_eq!(
            Page::from_params(Some("25abc"), Some("3x")),
            Page {
                limit: 1000,
                skip: 0
            }
        );
    }

    #[test]
    fn page_parses_explicit_values() {
        assert_eq!(
            Page::from_params(Some("25"), Some(" 50 ")),
            Page {
                limit: 25,
                skip: 50
            }
        );
    }
}
