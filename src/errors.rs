use thiserror::Error;

/// Error kinds produced while decoding an MFT image.
///
/// Almost everything here is survivable: the offending record is annotated
/// and still emitted. Only `Fatal` variants (unopenable input, first record
/// not an MFT record) abort a run.
#[derive(Error, Debug)]
pub enum MftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("record signature is {found:?}, not FILE")]
    BadSignature { found: [u8; 4] },

    #[error("fixup mismatch in sector {sector}: expected {expected:#06x}, found {found:#06x}")]
    FixupMismatch {
        sector: usize,
        expected: u16,
        found: u16,
    },

    #[error("attribute at offset {offset} overflows record (length {length})")]
    AttributeOverflow { offset: usize, length: u32 },

    #[error("unknown attribute type {0:#x}")]
    UnknownAttributeType(u32),

    #[error("malformed timestamp {0:#x}")]
    MalformedTimestamp(u64),

    #[error("malformed data run at byte {0}")]
    MalformedDataRun(usize),

    #[error("cycle in parent chain at record {0}")]
    CycleInPath(u64),

    #[error("record {record} references missing or reallocated parent {parent}")]
    OrphanRecord { record: u64, parent: u64 },

    #[error("extension record {0} referenced but not present")]
    MissingExtension(u64),

    #[error("read of {length} bytes at offset {offset} is out of bounds (buffer is {buffer} bytes)")]
    OutOfBounds {
        offset: usize,
        length: usize,
        buffer: usize,
    },

    #[error("analysis cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MftError>;

impl MftError {
    /// Whether the driver may keep going after this error. Recoverable
    /// errors become notes on the emitted row.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MftError::Io(_) | MftError::Cancelled)
    }

    /// Short machine-readable kind, used in row notes and error summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            MftError::Io(_) => "IoError",
            MftError::Truncated { .. } => "Truncated",
            MftError::BadSignature { .. } => "BadSignature",
            MftError::FixupMismatch { .. } => "FixupMismatch",
            MftError::AttributeOverflow { .. } => "AttributeOverflow",
            MftError::UnknownAttributeType(_) => "UnknownAttributeType",
            MftError::MalformedTimestamp(_) => "MalformedTimestamp",
            MftError::MalformedDataRun(_) => "MalformedDataRun",
            MftError::CycleInPath(_) => "CycleInPath",
            MftError::OrphanRecord { .. } => "OrphanRecord",
            MftError::MissingExtension(_) => "MissingExtension",
            MftError::OutOfBounds { .. } => "AttributeOverflow",
            MftError::Cancelled => "Cancelled",
        }
    }
}
