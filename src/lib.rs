pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod food;
pub mod http;
pub mod routes;
pub mod state;
pub mod storage;

#[cfg(test)]
mod test_support;
