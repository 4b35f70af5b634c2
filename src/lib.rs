pub mod config;
pub mod error;
pub mod families;
pub mod fetch;
pub mod pipeline;
pub mod schema;
pub mod source;
pub mod store;
pub mod table;
pub mod transform;
