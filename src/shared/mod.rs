pub mod error;
pub mod models;
pub mod pagination;
pub mod schema;
pub mod state;
pub mod utils;
