//! Pipeline services

pub mod analyzer;
pub mod decision;
pub mod engine;
pub mod graph;
pub mod orchestrator;
pub mod output_format;
pub mod quality;
