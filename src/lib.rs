pub mod api_router;
pub mod auth;
pub mod config;
pub mod departments;
pub mod security;
pub mod session;
pub mod shared;
pub mod tickets;
pub mod users;
