pub mod api;
pub mod background;
pub mod bootstrap;
pub mod common;
pub mod config;
pub mod database;
pub mod operations;
pub mod storage;
pub mod utils;
