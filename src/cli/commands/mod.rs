mod collection;
mod config;
mod ingest;
mod query;
mod status;

pub use collection::CollectionCommand;
pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use query::QueryArgs;

pub use collection::handle_collection;
pub use config::handle_config;
pub use ingest::handle_ingest;
pub use query::handle_query;
pub use status::handle_status;
