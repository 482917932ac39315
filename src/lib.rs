pub mod config;
pub mod engine;
pub mod history;
pub mod inference;
pub mod intake;
pub mod record;
pub mod report;
pub mod store;

pub use config::Config;
pub use engine::{AnalysisEngine, AnalysisError, Session};
pub use inference::{InferenceClient, InferenceService, SubmissionError};
pub use intake::{UploadCandidate, ValidatedFile, ValidationError};
pub use record::{AnalysisRecord, AnalysisStatus, InferenceResult, Principal};
pub use store::{RecordStore, SqliteRecordStore, StoreError};
