pub mod blob;
pub mod staging;
