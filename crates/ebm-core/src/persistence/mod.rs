//! SQLite-backed catalog: schema, row folding, FTS5 queries and the
//! transactional [`CatalogStore`].

mod db;
mod models;
mod query;
mod repository;

pub use query::{build_fts5_query, escape_fts5_term};
pub use repository::CatalogStore;
