use std::sync::Arc;

use super::trace::{self, CigarOp};
use crate::util::dna;

/// 一条已比对的 read（由外部比对器产生，生成器只读）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRead {
    /// Query name.
    pub name: Arc<str>,
    /// Reference contig name.
    pub reference: Arc<str>,
    /// 0-based leftmost reference coordinate.
    pub pos: usize,
    /// Mapping quality (Phred-scaled).
    pub mapq: u8,
    /// Edit trace describing the alignment.
    pub cigar: Vec<CigarOp>,
    /// Read bases, uppercase ASCII with `U` folded to `T`.
    pub sequence: Arc<[u8]>,
    /// Per-base Phred qualities (already decoded, no +33 offset).
    pub qualities: Arc<[u8]>,
    /// Whether the read maps to the reverse strand.
    pub is_reverse: bool,
}

impl AlignedRead {
    /// Build a read, normalizing its bases.
    pub fn new(
        name: impl Into<Arc<str>>,
        reference: impl Into<Arc<str>>,
        pos: usize,
        mapq: u8,
        cigar: Vec<CigarOp>,
        sequence: &[u8],
        qualities: impl Into<Arc<[u8]>>,
        is_reverse: bool,
    ) -> Self {
        Self {
            name: name.into(),
            reference: reference.into(),
            pos,
            mapq,
            cigar,
            sequence: dna::normalize_seq(sequence).into(),
            qualities: qualities.into(),
            is_reverse,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Half-open end of the reference span implied by the trace.
    pub fn end(&self) -> usize {
        self.pos + trace::reference_len(&self.cigar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::trace::parse_cigar;

    #[test]
    fn new_normalizes_and_spans() {
        let read = AlignedRead::new(
            "r1",
            "ref",
            3,
            42,
            parse_cigar("2M1D2M1I").unwrap(),
            b"acgUa",
            vec![30u8; 5],
            false,
        );
        assert_eq!(&*read.sequence, b"ACGTA");
        assert_eq!(read.len(), 5);
        assert_eq!(read.end(), 8);
    }
}
