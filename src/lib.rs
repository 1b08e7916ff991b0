//! Library exports for the link dashboard service
//!
//! The HTTP layer (`route`, `handler`, `middleware`) sits on top of the redb
//! store (`database`, `store`) and the pure query engine (`query`).

pub mod config;
pub mod database;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod model;
pub mod query;
pub mod route;
pub mod store;
