pub mod service;
pub mod setup;
