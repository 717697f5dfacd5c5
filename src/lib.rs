mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod decode;
pub mod errors;
pub mod extract;
pub mod gmail;
pub mod oauth;
pub mod rows;
pub mod sheets;
pub mod sync;
pub mod types;
