pub mod annotate;
pub mod badge;
pub mod cli;
pub mod config;
pub mod detect;
pub mod discovery;
pub mod error;
pub mod github;
pub mod ingest;
pub mod model;
pub mod parsers;
pub mod rewrite;
