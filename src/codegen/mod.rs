//! Code generation for `.atomic` entity configuration files.
//!
//! The pipeline is `parser` -> `config_mapper` -> `csharp_codegen`, with
//! `output_path` deciding where the result lands.

pub mod types;
pub mod hash;
pub mod parser;
pub mod config_mapper;
pub mod csharp_codegen;
pub mod output_path;
pub mod utils;
pub mod project_config;
pub mod fs_utils;

// Re-export key types
pub use types::{AtomicFileData, CanonicalConfig, HeaderKey, HeaderProperty, ValueDef};
pub use hash::name_to_id;
pub use parser::{parse_atomic, parse_file_data, AtomicDocument, AtomicLine};
pub use config_mapper::map_to_config;
pub use csharp_codegen::{generate_csharp_code, generate_source, GENERATED_EXTENSION};
pub use output_path::{OutputPathResolver, OutputRequest};
pub use project_config::AtomicSettings;

use crate::error::Result;

/// Parse `.atomic` text and generate the C# source for it in one step
pub fn generate_from_text(text: &str) -> Result<String> {
    let data = parse_file_data(text)?;
    let config = map_to_config(&data)?;
    generate_source(&config)
}
