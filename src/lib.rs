pub mod analyzer;
pub mod boundary;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod file_discovery;
pub mod model;
pub mod parser;
pub mod progress;
pub mod remote;
pub mod render;
pub mod reporter;

pub use analyzer::{Analysis, Analyzer};
pub use config::Config;
pub use dependency_graph::{DependencyGraph, GraphBuilder};
pub use file_discovery::{SourceFile, SourceScanner};
pub use model::ArchitectureData;
pub use parser::ParserRegistry;
pub use reporter::Reporter;

pub type Result<T> = anyhow::Result<T>;
