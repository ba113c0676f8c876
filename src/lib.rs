pub mod config;
pub mod domain;
pub mod engine;
pub mod export;
pub mod output;
pub mod parsing;
pub mod pricing;
pub mod store;
