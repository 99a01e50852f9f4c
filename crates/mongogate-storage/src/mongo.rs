use crate::traits::{DocumentStore, StoreSession};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document as BsonDocument};
use mongodb::options::FindOptions;
use mongodb::{Client, Database};
use mongogate_core::{Document, Filter, GateError, Operation, Page, Result};
use tracing::debug;

/// Database used when neither the URI nor the configuration names one.
pub const DEFAULT_DATABASE: &str = "test";

/// MongoDB-backed store. Holds only the connection settings; a fresh client
/// is created for every session and shut down when the session closes.
#[derive(Debug, Clone)]
pub struct MongoStore {
    uri: String,
    database: Option<String>,
}

impl MongoStore {
    pub fn new(uri: impl Into<String>, database: Option<String>) -> Self {
        Self {
            uri: uri.into(),
            database,
        }
    }
}

#[async_trait::async_trait]
impl DocumentStore for MongoStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>> {
        let client = Client::with_uri_str(&self.uri)
            .await
            .map_err(GateError::store)?;
        let db = match &self.database {
            Some(name) => client.database(name),
            None => client
                .default_database()
                .unwrap_or_else(|| client.database(DEFAULT_DATABASE)),
        };
        debug!("opened session on database {}", db.name());
        Ok(Box::new(MongoSession { client, db }))
    }

    fn validate(&self, op: &Operation) -> Result<()> {
        match op {
            Operation::Count { filter, .. } | Operation::List { filter, .. } => {
                to_bson_filter(filter).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

struct MongoSession {
    client: Client,
    db: Database,
}

impl MongoSession {
    fn collection(&self, name: &str) -> mongodb::Collection<BsonDocument> {
        self.db.collection::<BsonDocument>(name)
    }
}

#[async_trait::async_trait]
impl StoreSession for MongoSession {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.db
            .list_collection_names(None)
            .await
            .map_err(GateError::store)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>> {
        let filter = to_bson_filter(filter)?;
        let options = page.map(|p| {
            let mut opts = FindOptions::default();
            opts.skip = Some(p.skip);
            opts.limit = Some(i64::try_from(p.limit).unwrap_or(i64::MAX));
            opts
        });
        let cursor = self
            .collection(collection)
            .find(filter, options)
            .await
            .map_err(GateError::store)?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await.map_err(GateError::store)?;
        Ok(docs.into_iter().map(to_json).collect())
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let filter = to_bson_filter(filter)?;
        self.collection(collection)
            .count_documents(filter, None)
            .await
            .map_err(GateError::store)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let found = self
            .collection(collection)
            .find_one(id_filter(id), None)
            .await
            .map_err(GateError::store)?;
        Ok(found.map(to_json))
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// Match `_id` as a plain string, and also as an ObjectId when the value
/// parses as one.
fn id_filter(id: &str) -> BsonDocument {
    match ObjectId::parse_str(id) {
        Ok(oid) => doc! { "_id": { "$in": [id, oid] } },
        Err(_) => doc! { "_id": id },
    }
}

// Extended JSON is honoured here, so `{"_id": {"$oid": "..."}}` works.
fn to_bson_filter(filter: &Filter) -> Result<BsonDocument> {
    match Bson::try_from(serde_json::Value::Object(filter.clone())) {
        Ok(Bson::Document(doc)) => Ok(doc),
        _ => Err(GateError::InvalidFilter),
    }
}

fn to_json(doc: BsonDocument) -> Document {
    Bson::Document(doc).into_relaxed_extjson()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongogate_core::parse_filter;
    use serde_json::json;

    #[test]
    fn id_filter_matches_both_forms_for_object_ids() {
        let f = id_filter("65a1b2c3d4e5f60718293a4b");
        let ids = f.get_document("_id").unwrap().get_array("$in").unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], Bson::String("65a1b2c3d4e5f60718293a4b".into()));
        assert!(matches!(ids[1], Bson::ObjectId(_)));

        assert_eq!(id_filter("42"), doc! { "_id": "42" });
    }

    #[test]
    fn filter_converts_extended_json() {
        let f = parse_filter(r#"{"_id": {"$oid": "65a1b2c3d4e5f60718293a4b"}, "age": {"$gt": 3}}"#)
            .unwrap();
        let bson = to_bson_filter(&f).unwrap();
        assert!(matches!(bson.get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(bson.get_document("age").unwrap(), &doc! { "$gt": 3 });
    }

    #[test]
    fn bad_extended_json_is_rejected_without_connecting() {
        // nothing listens here; validate must not touch the network
        let store = MongoStore::new("mongodb://127.0.0.1:1/app", None);
        let list = Operation::List {
            collection: "users".into(),
            filter: parse_filter(r#"{"a": {"$oid": 5}}"#).unwrap(),
            page: None,
        };
        assert!(matches!(store.validate(&list), Err(GateError::InvalidFilter)));

        let count = Operation::Count {
            collection: "users".into(),
            filter: parse_filter(r#"{"role": "admin"}"#).unwrap(),
        };
        assert!(store.validate(&count).is_ok());
        assert!(store.validate(&Operation::ListCollections).is_ok());
    }

    #[test]
    fn documents_render_as_relaxed_json() {
        let oid = ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap();
        let out = to_json(doc! { "_id": oid, "name": "ada", "n": 3_i32 });
        assert_eq!(
            out,
            json!({"_id": {"$oid": "65a1b2c3d4e5f60718293a4b"}, "name": "ada", "n": 3})
        );
    }
}
