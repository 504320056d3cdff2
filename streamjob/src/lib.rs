pub mod client;
pub mod error;
mod lifecycle;
pub mod models;
pub mod operation;
pub mod resource_id;
pub mod schema;
pub mod state;
pub mod types;

pub use client::StreamAnalyticsApi;
pub use error::{Error, Result};
pub use lifecycle::JobLifecycle;
pub use schema::JobConfiguration;
pub use state::ResourceData;
