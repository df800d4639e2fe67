//! 比特向量生成：CIGAR 回放、分级掩蔽流水线与批量驱动

pub mod batch;
pub mod config;
pub mod generate;
pub mod passes;
pub mod read;
pub mod result;
pub mod symbol;
pub mod trace;

pub use batch::{BatchDriver, BatchOutcome, BatchStats};
pub use config::{BitVectorConfig, BitVectorConfigBuilder, StricterConstraints};
pub use generate::generate;
pub use read::AlignedRead;
pub use result::{BitVectorResult, BitVectorSummary};
pub use symbol::BitVectorSymbol;
pub use trace::{parse_cigar, CigarKind, CigarOp};
