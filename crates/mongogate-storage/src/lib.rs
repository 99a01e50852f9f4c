pub mod mem;
pub mod mongo;
pub mod traits;

pub use mem::InMemoryStore;
pub use mongo::MongoStore;
pub use traits::*;
