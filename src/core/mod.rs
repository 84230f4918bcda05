pub mod api;
pub mod cli;
pub mod common;
pub mod configuration;
pub mod core;
pub mod identity;
pub mod logger;
pub mod mirror;
pub mod view;
