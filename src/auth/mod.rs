pub mod callback;
pub mod dto;
pub mod oauth;
pub mod services;
pub mod session;

pub use oauth::{RedirectHandler, RedirectOutcome};
pub use session::Session;
