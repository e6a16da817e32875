pub mod guest;
pub mod item;
pub mod request;
pub mod request_item;
pub mod user;
