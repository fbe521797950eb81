pub mod admission;
pub mod api;
pub mod config;
pub mod extractor;
pub mod humanize;
pub mod observability;
pub mod orchestrator;
pub mod request;
pub mod scratch;
