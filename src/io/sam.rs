use anyhow::{Context, Result};
use noodles::sam;
use noodles::sam::alignment::record::cigar::op::Kind;
use noodles::sam::alignment::record::cigar::Op;
use noodles::sam::alignment::record::{QualityScores as _, Sequence as _};
use std::io::{self, BufRead};

use crate::bitvector::config::MAX_PHRED;
use crate::bitvector::read::AlignedRead;
use crate::bitvector::trace::{CigarKind, CigarOp};
use crate::error::DecodingError;

/// MAPQ 字段为 255（不可用）时使用的值
pub const MISSING_MAPQ: u8 = 255;

/// 一条 SAM 比对行的转换结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SamRead {
    Aligned(AlignedRead),
    /// Unmapped, secondary or supplementary.
    Skipped,
    /// Fields split fine but one of them does not decode; counted as a rejected read.
    Rejected { name: String, error: DecodingError },
}

/// SAM 文本读取器（基于 noodles，记录按需解码）
///
/// 头部在构造时读取。字段数不对或 I/O 失败会中止读取，
/// 单个字段无法解码只会让该条 read 被拒绝。
pub struct SamReader<R: BufRead> {
    inner: sam::io::Reader<R>,
    header: sam::Header,
    record: sam::Record,
    records: usize,
}

impl<R: BufRead> SamReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut inner = sam::io::Reader::new(reader);
        let header = inner.read_header().context("invalid SAM header")?;
        Ok(Self {
            inner,
            header,
            record: sam::Record::default(),
            records: 0,
        })
    }

    pub fn header(&self) -> &sam::Header {
        &self.header
    }

    pub fn next_read(&mut self) -> Result<Option<SamRead>> {
        let n = self
            .inner
            .read_record(&mut self.record)
            .with_context(|| format!("SAM record {}", self.records + 1))?;
        if n == 0 {
            return Ok(None);
        }
        self.records += 1;

        let read = match to_aligned_read(&self.record) {
            Ok(Some(read)) => SamRead::Aligned(read),
            Ok(None) => SamRead::Skipped,
            Err(error) => SamRead::Rejected {
                name: record_name(&self.record),
                error,
            },
        };
        Ok(Some(read))
    }
}

fn record_name(record: &sam::Record) -> String {
    record.name().map(|n| n.to_string()).unwrap_or_else(|| "*".to_string())
}

fn malformed(field: &'static str, e: io::Error) -> DecodingError {
    DecodingError::MalformedRecord {
        field,
        reason: e.to_string(),
    }
}

/// Convert one record. Unmapped, secondary and supplementary records yield `None`.
pub fn to_aligned_read(record: &sam::Record) -> Result<Option<AlignedRead>, DecodingError> {
    let flags = record.flags().map_err(|e| malformed("FLAG", e))?;
    if flags.is_unmapped() || flags.is_secondary() || flags.is_supplementary() {
        return Ok(None);
    }
    let (Some(rname), Some(start)) = (record.reference_sequence_name(), record.alignment_start())
    else {
        return Ok(None);
    };
    let pos = start.map_err(|e| malformed("POS", e))?.get() - 1;
    let mapq = match record.mapping_quality() {
        Some(q) => q.map_err(|e| malformed("MAPQ", e))?.get(),
        None => MISSING_MAPQ,
    };

    let cigar = sam::alignment::record::Cigar::iter(&record.cigar())
        .map(|op| op.map(cigar_op))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| malformed("CIGAR", e))?;
    if cigar.is_empty() {
        return Err(DecodingError::MissingField("CIGAR"));
    }

    let sequence = record.sequence();
    if sequence.is_empty() {
        return Err(DecodingError::MissingField("SEQ"));
    }
    let seq: Vec<u8> = sequence.iter().collect();

    // `*` 表示缺失质量，按最高质量处理
    let scores = record.quality_scores();
    let qualities = if scores.is_empty() {
        vec![MAX_PHRED; seq.len()]
    } else {
        scores
            .iter()
            .collect::<io::Result<Vec<u8>>>()
            .map_err(|e| malformed("QUAL", e))?
    };

    Ok(Some(AlignedRead::new(
        record_name(record),
        rname.to_string(),
        pos,
        mapq,
        cigar,
        &seq,
        qualities,
        flags.is_reverse_complemented(),
    )))
}

fn cigar_op(op: Op) -> CigarOp {
    let kind = match op.kind() {
        Kind::Match => CigarKind::Match,
        Kind::Insertion => CigarKind::Insertion,
        Kind::Deletion => CigarKind::Deletion,
        Kind::Skip => CigarKind::RefSkip,
        Kind::SoftClip => CigarKind::SoftClip,
        Kind::HardClip => CigarKind::HardClip,
        Kind::Pad => CigarKind::Padding,
        Kind::SequenceMatch => CigarKind::SeqMatch,
        Kind::SequenceMismatch => CigarKind::SeqMismatch,
    };
    CigarOp::new(kind, op.len() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SAM: &str = "@HD\tVN:1.6\n@SQ\tSN:rna\tLN:20\n\
r1\t0\trna\t3\t42\t2S4M1D2M\t*\t0\t0\tTTACGTCG\tIIII#III\tNM:i:1\n\
r2\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\tIIII\n\
r3\t256\trna\t1\t42\t4M\t*\t0\t0\tACGT\tIIII\n\
r4\t16\trna\t1\t255\t4M\t*\t0\t0\tacgu\t*\n";

    fn collect(data: &str) -> Vec<SamRead> {
        let mut r = SamReader::new(Cursor::new(data.as_bytes())).unwrap();
        let mut out = Vec::new();
        while let Some(read) = r.next_read().unwrap() {
            out.push(read);
        }
        out
    }

    #[test]
    fn converts_mapped_primary_reads() {
        let reads = collect(SAM);
        assert_eq!(reads.len(), 4);

        let SamRead::Aligned(r1) = &reads[0] else {
            panic!("r1 should be aligned: {:?}", reads[0]);
        };
        assert_eq!(&*r1.name, "r1");
        assert_eq!(&*r1.reference, "rna");
        assert_eq!(r1.pos, 2);
        assert_eq!(r1.mapq, 42);
        assert_eq!(r1.cigar[0], CigarOp::new(CigarKind::SoftClip, 2));
        assert_eq!(r1.cigar[2], CigarOp::new(CigarKind::Deletion, 1));
        assert_eq!(&*r1.qualities, &[40, 40, 40, 40, 2, 40, 40, 40]);
        assert!(!r1.is_reverse);

        assert_eq!(reads[1], SamRead::Skipped);
        assert_eq!(reads[2], SamRead::Skipped);

        let SamRead::Aligned(r4) = &reads[3] else {
            panic!("r4 should be aligned: {:?}", reads[3]);
        };
        assert!(r4.is_reverse);
        assert_eq!(r4.mapq, MISSING_MAPQ);
        assert_eq!(&*r4.sequence, b"ACGT");
        assert_eq!(&*r4.qualities, &[MAX_PHRED; 4]);
    }

    #[test]
    fn header_is_parsed() {
        let r = SamReader::new(Cursor::new(SAM.as_bytes())).unwrap();
        assert_eq!(r.header().reference_sequences().len(), 1);
    }

    #[test]
    fn bad_record_is_rejected_without_stopping() {
        let data = "good\t0\trna\t1\t42\t4M\t*\t0\t0\tACGT\tIIII\n\
bad\t0\trna\t1\t42\t4Q\t*\t0\t0\tACGT\tIIII\n\
noseq\t0\trna\t1\t42\t4M\t*\t0\t0\t*\t*\n\
good2\t0\trna\t2\t42\t4M\t*\t0\t0\tCGTA\tIIII\n";
        let reads = collect(data);
        assert_eq!(reads.len(), 4);
        assert!(matches!(&reads[0], SamRead::Aligned(r) if &*r.name == "good"));
        match &reads[1] {
            SamRead::Rejected { name, error } => {
                assert_eq!(name, "bad");
                assert!(matches!(error, DecodingError::MalformedRecord { field: "CIGAR", .. }));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(
            reads[2],
            SamRead::Rejected {
                name: "noseq".to_string(),
                error: DecodingError::MissingField("SEQ"),
            }
        );
        assert!(matches!(&reads[3], SamRead::Aligned(r) if &*r.name == "good2" && r.pos == 1));
    }

    #[test]
    fn empty_input_has_no_reads() {
        assert!(collect("").is_empty());
        assert!(collect("@HD\tVN:1.6\n").is_empty());
    }
}
