//! # rnamap-bitvector
//!
//! 将突变谱（DMS-MaPseq / SHAPE-MaP）实验的比对 read 转换为逐位置的比特向量。
//!
//! 每条 read 在参考坐标系上得到一个符号序列：匹配、突变（携带观测碱基）、
//! 缺失、不确定或未覆盖。本 crate 提供：
//!
//! - **生成器**：按 CIGAR 回放 read，并按固定优先级执行掩蔽流水线
//! - **配置**：质量阈值、缺失窗口、read 末端排除、强制包含/排除位置、更严格的二次约束
//! - **批量驱动**：基于 rayon 线程池的并行处理与拒绝原因统计
//! - **I/O**：FASTA 参考、SAM 文本输入、文本 / bincode 输出
//!
//! ## 快速示例
//!
//! ```rust
//! use rnamap_bitvector::bitvector::{generate, parse_cigar, AlignedRead, BitVectorConfig};
//!
//! let reference = b"ACGTACGTACGT";
//! let read = AlignedRead::new(
//!     "read1",
//!     "rna",
//!     2,
//!     60,
//!     parse_cigar("8M").unwrap(),
//!     b"GTAAGTAC",
//!     vec![40u8; 8],
//!     false,
//! );
//! let config = BitVectorConfig::builder().window_size(2).build().unwrap();
//!
//! let result = generate(&read, reference, &config).unwrap();
//! assert_eq!(result.bit_string(), "..000A0000..");
//! assert_eq!(result.summary().mutations, 1);
//! ```
//!
//! ## 模块说明
//!
//! - [`bitvector`] — 生成器、掩蔽流水线、配置、结果与批量驱动
//! - [`io`] — FASTA / SAM 解析，比特向量写出
//! - [`error`] — 错误类型
//! - [`util`] — 碱基编码工具函数

pub mod bitvector;
pub mod error;
pub mod io;
pub mod util;
