//! 比特向量输出：制表符分隔文本与 bincode 流两种格式

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

use super::fasta::ReferenceSet;
use crate::bitvector::config::BitVectorConfig;
use crate::bitvector::result::BitVectorResult;

/// 运行元信息，写入输出头部
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMeta {
    pub program: String,
    pub version: String,
    pub command: String,
    pub timestamp: String,
}

impl RunMeta {
    pub fn capture() -> Self {
        Self {
            program: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            command: std::env::args().collect::<Vec<_>>().join(" "),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Destination for accepted bit vectors.
pub trait BitVectorSink {
    fn write_result(&mut self, result: &BitVectorResult) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// 文本格式：
///
/// ```text
/// @SQ	SN:<name>	LN:<len>
/// @PG	ID:<program>	VN:<version>	DT:<timestamp>	CL:<command>
/// qname	rname	start(1-based)	end	bit_string	mutations	deletions	ambiguous
/// ```
pub struct TextWriter<W: Write> {
    out: W,
}

impl<W: Write> TextWriter<W> {
    pub fn new(mut out: W, references: &ReferenceSet, meta: &RunMeta) -> Result<Self> {
        for (name, seq) in references.iter() {
            writeln!(out, "@SQ\tSN:{}\tLN:{}", name, seq.len())?;
        }
        writeln!(
            out,
            "@PG\tID:{}\tVN:{}\tDT:{}\tCL:{}",
            meta.program, meta.version, meta.timestamp, meta.command
        )?;
        Ok(Self { out })
    }
}

impl<W: Write> BitVectorSink for TextWriter<W> {
    fn write_result(&mut self, r: &BitVectorResult) -> Result<()> {
        let s = r.summary();
        writeln!(
            self.out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.read_name(),
            r.reference(),
            r.start() + 1,
            r.end(),
            r.bit_string(),
            s.mutations,
            s.deletions,
            s.ambiguous,
        )?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// bincode 流的头部，后面紧跟逐条序列化的 [`BitVectorResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BincodeHeader {
    pub meta: RunMeta,
    /// `(name, length)` for every reference.
    pub references: Vec<(String, usize)>,
    pub config: BitVectorConfig,
}

impl BincodeHeader {
    pub fn new(meta: RunMeta, references: &ReferenceSet, config: &BitVectorConfig) -> Self {
        Self {
            meta,
            references: references.iter().map(|(n, s)| (n.to_string(), s.len())).collect(),
            config: config.clone(),
        }
    }
}

pub struct BincodeWriter<W: Write> {
    out: W,
}

impl<W: Write> BincodeWriter<W> {
    pub fn new(mut out: W, header: &BincodeHeader) -> Result<Self> {
        bincode::serialize_into(&mut out, header).context("cannot write bincode header")?;
        Ok(Self { out })
    }
}

impl<W: Write> BitVectorSink for BincodeWriter<W> {
    fn write_result(&mut self, result: &BitVectorResult) -> Result<()> {
        bincode::serialize_into(&mut self.out, result)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// 逐条读取 bincode 流，内存占用与文件大小无关
pub struct BincodeReader<R: BufRead> {
    reader: R,
    header: BincodeHeader,
    records: usize,
}

impl<R: BufRead> BincodeReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let header: BincodeHeader =
            bincode::deserialize_from(&mut reader).context("cannot read bincode header")?;
        Ok(Self { reader, header, records: 0 })
    }

    pub fn header(&self) -> &BincodeHeader {
        &self.header
    }

    /// Next result, `None` at a clean end of file.
    pub fn next_result(&mut self) -> Result<Option<BitVectorResult>> {
        if self.reader.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let r: BitVectorResult = bincode::deserialize_from(&mut self.reader)
            .with_context(|| format!("truncated or corrupt record #{}", self.records + 1))?;
        self.records += 1;
        Ok(Some(r))
    }
}

impl<R: BufRead> Iterator for BincodeReader<R> {
    type Item = Result<BitVectorResult>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_result().transpose()
    }
}
