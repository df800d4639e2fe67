use std::collections::BTreeMap;
use std::io::BufRead;

use anyhow::ensure;
use rayon::prelude::*;

use super::config::BitVectorConfig;
use super::generate::generate;
use super::read::AlignedRead;
use super::result::{BitVectorResult, BitVectorSummary};
use super::trace;
use crate::error::{ConfigError, GenerateError, RejectKind};
use crate::io::bitvec::BitVectorSink;
use crate::io::fasta::ReferenceSet;
use crate::io::sam::{SamRead, SamReader};

/// 批量驱动：在独立线程池上并行处理一批 read
///
/// 参考序列与配置只读共享；每条 read 的处理相互独立，结果按输入顺序返回。
pub struct BatchDriver<'a> {
    references: &'a ReferenceSet,
    config: &'a BitVectorConfig,
    pool: rayon::ThreadPool,
}

impl<'a> BatchDriver<'a> {
    pub fn new(
        references: &'a ReferenceSet,
        config: &'a BitVectorConfig,
        threads: usize,
    ) -> Result<Self, ConfigError> {
        if threads == 0 {
            return Err(ConfigError::Threads);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConfigError::ThreadPool(e.to_string()))?;
        Ok(Self { references, config, pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Look up the read's reference and generate its bit vector.
    pub fn generate_one(&self, read: &AlignedRead) -> Result<BitVectorResult, GenerateError> {
        let reference = self
            .references
            .get(&read.reference)
            .ok_or_else(|| GenerateError::UnknownReference(read.reference.to_string()))?;
        generate(read, reference, self.config)
    }

    pub fn run(&self, reads: &[AlignedRead]) -> BatchOutcome {
        let results: Vec<Result<BitVectorResult, GenerateError>> = self
            .pool
            .install(|| reads.par_iter().map(|r| self.generate_one(r)).collect());

        let mut stats = BatchStats::default();
        for (read, res) in reads.iter().zip(&results) {
            if let Err(e) = res {
                tracing::debug!(
                    read = %read.name,
                    cigar = %trace::ops_to_cigar(&read.cigar),
                    reason = %e,
                    "read rejected"
                );
            }
            stats.record(res);
        }
        BatchOutcome { results, stats }
    }

    /// 按块读取 SAM，并行生成，并把接受的结果按输入顺序写入 `sink`
    ///
    /// Records that fail to decode are counted as rejections; only I/O and
    /// structural SAM errors stop the run. Memory is bounded by `chunk_size`.
    pub fn stream<R: BufRead>(
        &self,
        reader: &mut SamReader<R>,
        sink: &mut dyn BitVectorSink,
        chunk_size: usize,
    ) -> anyhow::Result<BatchStats> {
        ensure!(chunk_size > 0, "chunk size must be at least 1");

        let mut stats = BatchStats::default();
        let mut chunk = Vec::with_capacity(chunk_size);
        let mut eof = false;
        while !eof {
            chunk.clear();
            while chunk.len() < chunk_size {
                match reader.next_read()? {
                    Some(SamRead::Aligned(read)) => chunk.push(read),
                    Some(SamRead::Skipped) => stats.skipped += 1,
                    Some(SamRead::Rejected { name, error }) => {
                        tracing::debug!(read = %name, reason = %error, "record rejected");
                        stats.reject(&error.into());
                    }
                    None => {
                        eof = true;
                        break;
                    }
                }
            }
            if chunk.is_empty() {
                continue;
            }

            let outcome = self.run(&chunk);
            for r in outcome.accepted() {
                sink.write_result(r)?;
            }
            stats.merge(&outcome.stats);
            tracing::debug!(reads = stats.reads, accepted = stats.accepted, "chunk processed");
        }
        sink.finish()?;
        Ok(stats)
    }
}

/// One entry per input read, in input order.
#[derive(Debug)]
pub struct BatchOutcome {
    pub results: Vec<Result<BitVectorResult, GenerateError>>,
    pub stats: BatchStats,
}

impl BatchOutcome {
    pub fn accepted(&self) -> impl Iterator<Item = &BitVectorResult> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }
}

/// 运行统计，可跨批次合并
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub reads: u64,
    pub accepted: u64,
    pub rejected: BTreeMap<RejectKind, u64>,
    /// Unmapped, secondary and supplementary records; not counted in `reads`.
    pub skipped: u64,
    /// Accepted reads per reference.
    pub per_reference: BTreeMap<String, u64>,
    /// Symbol totals over accepted reads.
    pub symbols: BitVectorSummary,
}

impl BatchStats {
    pub fn record(&mut self, res: &Result<BitVectorResult, GenerateError>) {
        match res {
            Ok(r) => {
                self.reads += 1;
                self.accepted += 1;
                *self.per_reference.entry(r.reference().to_string()).or_default() += 1;
                self.symbols.merge(r.summary());
            }
            Err(e) => self.reject(e),
        }
    }

    /// Count a read rejected before or during generation.
    pub fn reject(&mut self, e: &GenerateError) {
        self.reads += 1;
        *self.rejected.entry(e.kind()).or_default() += 1;
    }

    pub fn total_rejected(&self) -> u64 {
        self.rejected.values().sum()
    }

    pub fn merge(&mut self, other: &BatchStats) {
        self.reads += other.reads;
        self.accepted += other.accepted;
        self.skipped += other.skipped;
        for (k, v) in &other.rejected {
            *self.rejected.entry(*k).or_default() += v;
        }
        for (k, v) in &other.per_reference {
            *self.per_reference.entry(k.clone()).or_default() += v;
        }
        self.symbols.merge(&other.symbols);
    }
}
