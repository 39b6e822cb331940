pub mod resize;
pub mod synchronous;
pub mod system;
pub mod upload;
