use std::path::PathBuf;
use thiserror::Error;

use super::worker_status::WorkerStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("SlotLayout requires a branching factor of at least 2; given {0}")]
    BadBranching(usize),
    #[error("Branch index {branch} is out of range for branching factor {branching}")]
    BadBranch { branch: usize, branching: usize },
    #[error("Slot {slot} is not at depth {depth}")]
    DepthMismatch { slot: usize, depth: usize },
    #[error("Cannot allocate children below depth {0}; it is the maximum depth")]
    BelowMaxDepth(usize),
    #[error("Slot {slot} exceeds the layout capacity {capacity}")]
    Overflow { slot: usize, capacity: usize },
    #[error("Slot arithmetic overflowed at depth {0}")]
    ArithmeticOverflow(usize),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network has no pipes")]
    Empty,
    #[error("Network refers to pipe {0} which does not exist")]
    MissingPipe(String),
    #[error("Network has an invalid pipe name {0}")]
    BadPipeName(String),
    #[error("Network is not a valid tree: {0}")]
    NotATree(String),
    #[error("Network failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator failed due to slot error: {0}")]
    SlotError(#[from] SlotError),
    #[error("Generator failed due to network error: {0}")]
    NetworkError(#[from] NetworkError),
    #[error("Generator failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Generator failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Generator failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has an invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    #[error("Record has {0} fields; expected at least {1}")]
    TooFewFields(usize, usize),
    #[error("Record has an invalid pipe identifier {0:?}")]
    BadIdentifier(String),
    #[error("Record has an invalid number {0:?}")]
    BadNumber(String),
    #[error("Record has a non-positive dimension {0}")]
    BadDimension(f64),
    #[error("Receiver file name {0:?} does not match #<index>-<type>.txt")]
    BadReceiverName(String),
    #[error("Receiver file is missing its time series")]
    MissingSeries,
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Could not open run because directory {0:?} does not exist")]
    BadRunPath(PathBuf),
    #[error("Run failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconstructError {
    #[error("Run {run} has pipe {slot} beyond slot capacity {capacity}")]
    SlotOverflow {
        run: String,
        slot: usize,
        capacity: usize,
    },
}

#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer failed to build an array: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
    #[error("HDF5Writer was given an invalid string attribute {0:?}")]
    BadString(String),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Run error: {0}")]
    RunError(#[from] RunError),
    #[error("Processor failed due to reconstruction error: {0}")]
    ReconstructError(#[from] ReconstructError),
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to slot error: {0}")]
    SlotError(#[from] SlotError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed because a worker thread panicked")]
    WorkerPanic,
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
