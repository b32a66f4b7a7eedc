pub mod chunker;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod job;
pub mod logging;
pub mod sanitize;

pub use chunker::{chunk_document, Chunk, ChunkerConfig, PageText};
pub use config::{config_from_env, load_config, Config, OcrServiceConfig};
pub use db::Database;
pub use error::{ConfigError, DocmineError, ExtractError, JobError, Result};
pub use extractor::{
    DocumentSource, ExtractedDocument, ExtractionCoordinator, ExtractionMethod, FileType,
};
pub use job::{JobService, JobStatus, NewJob, JOB_TTL_HOURS};
