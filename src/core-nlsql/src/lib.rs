pub mod catalog;
pub mod common;
pub mod errors;
pub mod execute;
pub mod extract;
pub mod llms;
pub mod pipeline;

pub use catalog::{Catalog, CatalogError, TableName, list_tables};
pub use common::config::{Config, ConfigError};
pub use common::db_env::get_db_pool;
pub use common::logging::setup_logging;
pub use errors::{PipelineError, ask_error_from_execution};
pub use execute::{ExecutionError, PgQueryRunner, QueryRunner};
pub use extract::{ExtractedQuery, extract};
pub use llms::{GenerationError, Generator, Ollama, Prompt, prompt_text_to_sql};
pub use pipeline::{Pipeline, SharedPipeline, Stage};
