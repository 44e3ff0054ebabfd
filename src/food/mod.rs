pub mod api;
pub mod banner;
pub mod collection;
pub mod display;
pub mod dto;
pub mod export;
pub mod filter;

pub use api::FoodApi;
pub use collection::{Confirm, EditForm, FoodCollection};
