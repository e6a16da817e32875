pub mod cart;
pub mod common;
pub mod dashboard;
pub mod guests;
pub mod items;
pub mod requests;
pub mod status;
pub mod tasks;
pub mod users;
