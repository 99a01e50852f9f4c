use mongogate_core::{Document, Filter, Operation, Outcome, Page, Result};

/// Opens one session per request. Implementations must not pool sessions
/// behind the caller's back: every `connect` is paired with a `close`.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn StoreSession>>;

    /// Reject an operation this store could never run, before any session
    /// is opened.
    fn validate(&self, _op: &Operation) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
pub trait StoreSession: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;
    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        page: Option<Page>,
    ) -> Result<Vec<Document>>;
    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64>;
    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    // Release the underlying connection. Called on every exit path.
    async fn close(&self) -> Result<()>;

    /// Run a resolved operation against this session.
    async fn execute(&self, op: &Operation) -> Result<Outcome> {
        match op {
            Operation::ListCollections => self.list_collections().await.map(Outcome::Names),
            Operation::CountCollections => self
                .list_collections()
                .await
                .map(|names| Outcome::Count(names.len() as u64)),
            Operation::FetchById { collection, id } => {
                self.find_by_id(collection, id).await.map(Outcome::Document)
            }
            Operation::Count { collection, filter } => self
                .count_documents(collection, filter)
                .await
                .map(Outcome::Count),
            Operation::List {
                collection,
                filter,
                page,
            } => self
                .find(collection, filter, *page)
                .await
                .map(Outcome::Documents),
        }
    }
}
