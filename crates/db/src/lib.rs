pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::RepositoryError;
pub use stores::Stores;
