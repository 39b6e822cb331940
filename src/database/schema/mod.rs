pub mod image;
pub mod resize;
pub mod task;
pub mod user_image;
