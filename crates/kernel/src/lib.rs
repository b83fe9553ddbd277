//! Trellis Kernel Library
//!
//! Relational query planning and field projection over a declared relation
//! graph. The main entry point for running the server is the `trellis`
//! binary; integration tests drive [`routes::app`] directly.

pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod graph;
pub mod pagination;
pub mod projection;
pub mod query;
pub mod request;
pub mod routes;
pub mod service;
pub mod state;
