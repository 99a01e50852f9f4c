pub mod auth;
pub mod errors;
pub mod model;
pub mod query;

pub use auth::*;
pub use errors::*;
pub use model::*;
pub use query::*;
