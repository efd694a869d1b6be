// src/config/mod.rs
//! Runtime configuration for the pipeline, the collectors and the server.

pub mod pipeline;

pub use pipeline::{
    load_default, load_from, DatePolicy, OutputConfig, PipelineConfig, SourceConfig, SourcePolicy,
};
