//! XOSC Pipeline
//!
//! Batch stages over directories of scenario documents and the curation of
//! the resulting description/document dataset.
//!
//! # Core Concepts
//!
//! - [`BatchRunner`]: filter, reduce and inject stages run in parallel, every
//!   output passing the validation gate
//! - [`describe_dir`]: digest side-cars for a corpus
//! - [`build_dataset`] / [`reverse_dataset`] / [`check_dataset`]: JSONL records
//!   pairing a generated description with its document
//! - [`TextGenerator`]: description service, [`ChatClient`] over HTTP with
//!   bounded exponential backoff
//! - [`collect_stats`] / [`tag_usage`]: corpus statistics
//! - [`PipelineConfig`]: TOML configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use xosc_pipeline::{BatchRunner, PipelineConfig, Stage};
//! use xosc_transform::ValidationGate;
//!
//! let config = PipelineConfig::load(Path::new("xosc.toml"))?;
//! let gate = ValidationGate::new(config.build_validator());
//! let runner = BatchRunner::new(gate, config.injection.clone())?;
//! let report = runner.run(Stage::Reduce, Path::new("corpus"), Path::new("reduced"))?;
//! println!("{report}");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod batch;
mod config;
mod corpus;
mod dataset;
mod describe;
mod error;
mod generate;
mod stats;

pub use batch::{BatchReport, BatchRunner, FileFailure, Stage};
pub use config::{LlmConfig, PipelineConfig, ValidatorKind};
pub use corpus::{list_documents, DOCUMENT_EXTENSION};
pub use dataset::{
    analyst_prompt, build_dataset, check_dataset, describer_prompt, infer_map, load_records,
    resolve_dataset_path, reverse_dataset, BuildReport, CheckReport, DatasetRecord,
    LoadedRecords, RecordWriter, ReverseReport, DATASET_FILE, GENERATOR_PROMPT,
};
pub use describe::describe_dir;
pub use error::{BatchError, ConfigLoadError, DatasetError, GenerateError, StageError};
pub use generate::{with_retry, ChatClient, RetryPolicy, TextGenerator};
pub use stats::{
    collect_stats, tag_usage, CorpusStats, Counter, TagReport, WeatherCombo, WEATHER_PROPERTIES,
};
