//! 错误类型
//!
//! 单条 read 的错误（[`GenerateError`]）只拒绝该 read，不会中断整个批次；
//! 配置错误（[`ConfigError`]）在启动阶段即失败。

use std::fmt;

use thiserror::Error;

/// CIGAR 字符串无法解析
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CigarParseError {
    #[error("empty CIGAR")]
    Empty,
    #[error("CIGAR operation '{0}' has no length")]
    MissingLength(char),
    #[error("CIGAR operation '{0}' has zero length")]
    ZeroLength(char),
    #[error("unknown CIGAR operation '{0}'")]
    UnknownOp(char),
    #[error("CIGAR ends with a dangling length")]
    TrailingLength,
    #[error("CIGAR length overflows")]
    Overflow,
}

/// The edit trace is inconsistent with the read or the reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    #[error("edit trace overruns the read: needs {needed} bases, read has {available}")]
    ReadOverrun { needed: usize, available: usize },
    #[error("edit trace consumes {consumed} of {read_len} read bases")]
    ReadNotConsumed { consumed: usize, read_len: usize },
    #[error("quality length {qual_len} does not match sequence length {seq_len}")]
    QualityLength { seq_len: usize, qual_len: usize },
    #[error("reference span ends at {end}, past reference length {reference_len}")]
    ReferenceOutOfBounds { end: usize, reference_len: usize },
    #[error("edit trace covers no reference position")]
    EmptySpan,
    #[error("unsupported edit operation '{0}'")]
    UnsupportedOp(char),
    #[error("invalid {field} field: {reason}")]
    MalformedRecord { field: &'static str, reason: String },
    #[error("mapped record has no {0}")]
    MissingField(&'static str),
}

/// The read decodes fine but fails a configured acceptance rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    #[error("mapping quality {mapq} below cutoff {min}")]
    LowMappingQuality { mapq: u8, min: u8 },
    #[error("mapped length {len} shorter than {min}")]
    MappedLengthTooShort { len: usize, min: usize },
    #[error("mapped length {len} longer than {max}")]
    MappedLengthTooLong { len: usize, max: usize },
    #[error("read contains {count} inserted bases")]
    InsertionsForbidden { count: usize },
    #[error("{found} mutations exceed cutoff {max}")]
    TooManyMutations { found: usize, max: usize },
    #[error("mutations at {first} and {second} closer than {min_distance}")]
    MutationsTooClose { first: usize, second: usize, min_distance: usize },
    #[error("read covers {covered} of {reference_len} reference bases")]
    InsufficientCoverage { covered: usize, reference_len: usize },
}

/// 单条 read 被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("decoding failed: {0}")]
    Decoding(#[from] DecodingError),
    #[error("constraint violated: {0}")]
    Constraint(#[from] ConstraintViolation),
    #[error("unknown reference '{0}'")]
    UnknownReference(String),
}

/// Rejection categories used for run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RejectKind {
    Decoding,
    LowMappingQuality,
    MappedLength,
    Insertions,
    TooManyMutations,
    MutationsTooClose,
    InsufficientCoverage,
    UnknownReference,
}

impl RejectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectKind::Decoding => "decoding",
            RejectKind::LowMappingQuality => "low_mapq",
            RejectKind::MappedLength => "mapped_length",
            RejectKind::Insertions => "insertions",
            RejectKind::TooManyMutations => "too_many_mutations",
            RejectKind::MutationsTooClose => "mutations_too_close",
            RejectKind::InsufficientCoverage => "insufficient_coverage",
            RejectKind::UnknownReference => "unknown_reference",
        }
    }
}

impl fmt::Display for RejectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GenerateError {
    pub fn kind(&self) -> RejectKind {
        match self {
            GenerateError::Decoding(_) => RejectKind::Decoding,
            GenerateError::UnknownReference(_) => RejectKind::UnknownReference,
            GenerateError::Constraint(c) => match c {
                ConstraintViolation::LowMappingQuality { .. } => RejectKind::LowMappingQuality,
                ConstraintViolation::MappedLengthTooShort { .. }
                | ConstraintViolation::MappedLengthTooLong { .. } => RejectKind::MappedLength,
                ConstraintViolation::InsertionsForbidden { .. } => RejectKind::Insertions,
                ConstraintViolation::TooManyMutations { .. } => RejectKind::TooManyMutations,
                ConstraintViolation::MutationsTooClose { .. } => RejectKind::MutationsTooClose,
                ConstraintViolation::InsufficientCoverage { .. } => RejectKind::InsufficientCoverage,
            },
        }
    }
}

/// Malformed or contradictory configuration. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("quality threshold {0} outside Phred range 0..=93")]
    QualityOutOfRange(u8),
    #[error("minimum mapped length {min} exceeds maximum {max}")]
    MappedLengthBounds { min: usize, max: usize },
    #[error("positions both included and excluded: {0:?}")]
    ConflictingOverrides(Vec<usize>),
    #[error("coverage fraction {0} outside [0, 1]")]
    CoverageFraction(f64),
    #[error("invalid position list '{0}'")]
    PositionList(String),
    #[error("thread count must be at least 1")]
    Threads,
    #[error("cannot build worker pool: {0}")]
    ThreadPool(String),
}
