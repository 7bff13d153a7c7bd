pub mod api;
pub mod beacon;
pub mod cleanup;
pub mod config;
pub mod models;
pub mod registry;
pub mod storage;
pub mod tracking;
