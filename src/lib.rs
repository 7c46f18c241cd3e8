pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod service;
pub mod sync;
