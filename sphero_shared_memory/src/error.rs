//! Error types for shared state operations

use sphero_common::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing to or reading from the shared state
#[derive(Error, Debug)]
pub enum StateError {
    /// Robot index outside the configured fleet
    #[error("Robot index {index} out of range (fleet of {count})")]
    RobotOutOfRange {
        /// Requested robot
        index: usize,
        /// Configured robot count
        count: usize,
    },

    /// Frame does not match the ring's frame size
    #[error("Invalid frame size: {actual} elements (expected {expected})")]
    FrameSize {
        /// Elements per frame
        expected: usize,
        /// Elements supplied
        actual: usize,
    },

    /// Audio chunk larger than the sliding buffer, or empty
    #[error("Invalid audio chunk: {len} samples (buffer holds {capacity})")]
    AudioChunk {
        /// Samples supplied
        len: usize,
        /// Buffer length
        capacity: usize,
    },

    /// Zero-sized buffer requested
    #[error("Invalid capacity: {what} must be non-zero")]
    InvalidCapacity {
        /// Buffer being created
        what: &'static str,
    },

    /// Stream index outside the tracked set
    #[error("Stream index {index} out of range ({count} streams)")]
    StreamOutOfRange {
        /// Requested stream
        index: usize,
        /// Tracked streams
        count: usize,
    },

    /// Configuration rejected at construction
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A live process already owns the named segment
    #[error("Segment {} is owned by live process {pid}", path.display())]
    SegmentInUse {
        /// Segment file
        path: PathBuf,
        /// Owner process
        pid: u32,
    },

    /// No segment file to attach to
    #[error("Segment not found: {}", path.display())]
    SegmentNotFound {
        /// Segment file
        path: PathBuf,
    },

    /// Segment file that is not a published fleet segment
    #[error("Invalid segment {}: {reason}", path.display())]
    InvalidSegment {
        /// Segment file
        path: PathBuf,
        /// What failed validation
        reason: String,
    },

    /// Fleet configuration blob could not be encoded or decoded
    #[error("Configuration blob error: {0}")]
    ConfigBlob(#[from] serde_json::Error),

    /// IO error while mapping a segment
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for shared state operations
pub type StateResult<T> = Result<T, StateError>;
