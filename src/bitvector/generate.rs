use super::config::{BitVectorConfig, StricterConstraints};
use super::passes::{self, RawCall};
use super::read::AlignedRead;
use super::result::BitVectorResult;
use super::symbol::BitVectorSymbol;
use super::trace::{self, CigarKind};
use crate::error::{ConstraintViolation, DecodingError, GenerateError};
use crate::util::dna::Base;

/// 由单条比对 read 生成比特向量
///
/// 纯函数：相同输入总是得到相同输出，无副作用，可在任意线程并发调用。
/// 任何错误都会拒绝整条 read，不会返回部分结果。
pub fn generate(
    read: &AlignedRead,
    reference: &[u8],
    config: &BitVectorConfig,
) -> Result<BitVectorResult, GenerateError> {
    if read.mapq < config.min_mapq() {
        return Err(ConstraintViolation::LowMappingQuality {
            mapq: read.mapq,
            min: config.min_mapq(),
        }
        .into());
    }

    let decoded = decode(read, reference, config.min_quality())?;
    let start = read.pos;
    let span = decoded.calls.len();
    let end = start + span;

    check_mapped_length(span, config)?;
    if let Some(s) = config.stricter() {
        check_read_constraints(&decoded, reference.len(), s)?;
    }

    let covered = passes::run(&decoded.calls, start, config);

    if let Some(s) = config.stricter() {
        check_mutations(&covered, start, s)?;
    }

    let mut symbols = vec![BitVectorSymbol::NoCoverage; reference.len()];
    symbols[start..end].copy_from_slice(&covered);
    Ok(BitVectorResult::new(
        read.name.as_ref(),
        read.reference.as_ref(),
        start,
        end,
        symbols,
    ))
}

struct Decoded {
    calls: Vec<RawCall>,
    inserted: usize,
}

/// 按 CIGAR 回放，得到 span 内每个参考位置的原始判定
fn decode(read: &AlignedRead, reference: &[u8], min_quality: u8) -> Result<Decoded, DecodingError> {
    if read.qualities.len() != read.sequence.len() {
        return Err(DecodingError::QualityLength {
            seq_len: read.sequence.len(),
            qual_len: read.qualities.len(),
        });
    }
    if let Some(op) = read.cigar.iter().find(|op| op.kind == CigarKind::RefSkip) {
        return Err(DecodingError::UnsupportedOp(op.kind.as_char()));
    }

    let span = trace::reference_len(&read.cigar);
    if span == 0 {
        return Err(DecodingError::EmptySpan);
    }
    let end = read.pos.saturating_add(span);
    if end > reference.len() {
        return Err(DecodingError::ReferenceOutOfBounds {
            end,
            reference_len: reference.len(),
        });
    }

    let seq = &read.sequence;
    let qual = &read.qualities;
    let mut calls = Vec::with_capacity(span);
    let mut inserted = 0usize;
    let mut rpos = read.pos;
    let mut qpos = 0usize;

    for op in &read.cigar {
        let len = op.len as usize;
        if op.kind.consumes_read() && qpos + len > seq.len() {
            return Err(DecodingError::ReadOverrun {
                needed: qpos + len,
                available: seq.len(),
            });
        }
        match op.kind {
            CigarKind::Match | CigarKind::SeqMatch | CigarKind::SeqMismatch => {
                for k in 0..len {
                    calls.push(call_base(seq[qpos + k], reference[rpos + k], qual[qpos + k], min_quality));
                }
                qpos += len;
                rpos += len;
            }
            CigarKind::Deletion => {
                calls.extend(std::iter::repeat(RawCall::Deletion).take(len));
                rpos += len;
            }
            CigarKind::Insertion => {
                inserted += len;
                qpos += len;
            }
            CigarKind::SoftClip => qpos += len,
            CigarKind::HardClip | CigarKind::Padding | CigarKind::RefSkip => {}
        }
    }

    if qpos != seq.len() {
        return Err(DecodingError::ReadNotConsumed {
            consumed: qpos,
            read_len: seq.len(),
        });
    }

    Ok(Decoded { calls, inserted })
}

#[inline]
fn call_base(read_base: u8, ref_base: u8, quality: u8, min_quality: u8) -> RawCall {
    match (Base::from_ascii(read_base), Base::from_ascii(ref_base)) {
        (Some(q), Some(r)) if q == r => RawCall::Match,
        (Some(q), Some(_)) => RawCall::Mismatch {
            base: q,
            low_quality: quality < min_quality,
        },
        _ => RawCall::Uncallable,
    }
}

fn check_mapped_length(span: usize, config: &BitVectorConfig) -> Result<(), ConstraintViolation> {
    if let Some(min) = config.min_mapped_length() {
        if span < min {
            return Err(ConstraintViolation::MappedLengthTooShort { len: span, min });
        }
    }
    if let Some(max) = config.max_mapped_length() {
        if span > max {
            return Err(ConstraintViolation::MappedLengthTooLong { len: span, max });
        }
    }
    Ok(())
}

fn check_read_constraints(
    decoded: &Decoded,
    reference_len: usize,
    s: &StricterConstraints,
) -> Result<(), ConstraintViolation> {
    if s.forbid_insertions && decoded.inserted > 0 {
        return Err(ConstraintViolation::InsertionsForbidden {
            count: decoded.inserted,
        });
    }
    if let Some(f) = s.min_coverage_fraction {
        let covered = decoded.calls.len();
        if (covered as f64) < f * reference_len as f64 {
            return Err(ConstraintViolation::InsufficientCoverage {
                covered,
                reference_len,
            });
        }
    }
    Ok(())
}

/// 在最终符号上检查突变数量与间距
fn check_mutations(
    covered: &[BitVectorSymbol],
    start: usize,
    s: &StricterConstraints,
) -> Result<(), ConstraintViolation> {
    if s.max_mutations.is_none() && s.min_mutation_distance.is_none() {
        return Ok(());
    }
    let positions: Vec<usize> = covered
        .iter()
        .enumerate()
        .filter(|(_, sym)| sym.is_mutation())
        .map(|(i, _)| start + i)
        .collect();

    if let Some(max) = s.max_mutations {
        if positions.len() > max {
            return Err(ConstraintViolation::TooManyMutations {
                found: positions.len(),
                max,
            });
        }
    }
    if let Some(min_distance) = s.min_mutation_distance {
        if let Some(w) = positions.windows(2).find(|w| w[1] - w[0] < min_distance) {
            return Err(ConstraintViolation::MutationsTooClose {
                first: w[0],
                second: w[1],
                min_distance,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitvector::trace::parse_cigar;

    const REF: &[u8] = b"ACGTACGTACGTACGTACGT";

    fn read(pos: usize, cigar: &str, seq: &[u8], qual: u8) -> AlignedRead {
        AlignedRead::new(
            "q",
            "ref",
            pos,
            60,
            parse_cigar(cigar).unwrap(),
            seq,
            vec![qual; seq.len()],
            false,
        )
    }

    fn cfg(window: usize) -> BitVectorConfig {
        BitVectorConfig::builder().window_size(window).build().unwrap()
    }

    fn bits(r: &AlignedRead, c: &BitVectorConfig) -> String {
        generate(r, REF, c).unwrap().bit_string()
    }

    #[test]
    fn perfect_match_is_all_match() {
        let r = read(2, "8M", &REF[2..10], 40);
        let res = generate(&r, REF, &cfg(3)).unwrap();
        assert_eq!(res.bit_string(), "..00000000..........");
        let s = res.summary();
        assert_eq!(s.matches, 8);
        assert_eq!(s.mutations + s.deletions + s.ambiguous, 0);
        assert_eq!(s.no_coverage, 12);
        assert_eq!((res.start(), res.end()), (2, 10));
    }

    #[test]
    fn high_quality_mismatch_is_mutation() {
        // ACGTACGT -> ACGAACGT
        let r = read(0, "8M", b"ACGAACGT", 40);
        assert_eq!(bits(&r, &cfg(3)), "000A0000............");
    }

    #[test]
    fn low_quality_mismatch_masks_window() {
        let mut q = vec![40u8; 8];
        q[3] = 10;
        let r = AlignedRead::new("q", "ref", 0, 60, parse_cigar("8M").unwrap(), b"ACGAACGT", q, false);
        assert_eq!(bits(&r, &cfg(2)), "0?????00............");
    }

    #[test]
    fn low_quality_match_stays_match() {
        let r = read(0, "4M", b"ACGT", 2);
        assert_eq!(bits(&r, &cfg(2)), "0000................");
    }

    #[test]
    fn deletion_marks_and_masks_flanks() {
        // ref ACGTACGTAC, read drops positions 4..6
        let r = read(0, "4M2D4M", b"ACGTGTAC", 40);
        assert_eq!(bits(&r, &cfg(1)), "000?11?000..........");
    }

    #[test]
    fn deletion_flank_rescued_by_include() {
        let r = read(0, "4M2D4M", b"ACGTGTAC", 40);
        let c = BitVectorConfig::builder().window_size(1).include([3]).build().unwrap();
        assert_eq!(bits(&r, &c), "000011?000..........");
    }

    #[test]
    fn insertion_leaves_no_symbol() {
        let r = read(0, "4M2I4M", b"ACGTTTACGT", 40);
        assert_eq!(bits(&r, &cfg(2)), "00000000............");
    }

    #[test]
    fn insertion_rejected_when_forbidden() {
        let r = read(0, "4M2I4M", b"ACGTTTACGT", 40);
        let c = BitVectorConfig::builder()
            .stricter(Some(StricterConstraints {
                forbid_insertions: true,
                ..Default::default()
            }))
            .build()
            .unwrap();
        assert_eq!(
            generate(&r, REF, &c).unwrap_err(),
            GenerateError::Constraint(ConstraintViolation::InsertionsForbidden { count: 2 })
        );
    }

    #[test]
    fn soft_clips_consume_read_only() {
        let r = read(4, "2S4M1S", b"TTACGTG", 40);
        assert_eq!(bits(&r, &cfg(2)), "....0000............");
    }

    #[test]
    fn n_bases_are_ambiguous_without_masking() {
        let r = read(0, "6M", b"ACNTAC", 40);
        assert_eq!(bits(&r, &cfg(3)), "00?000..............");
    }

    #[test]
    fn end_exclusion_and_excludes() {
        let r = read(0, "10M", &REF[..10], 40);
        let c = BitVectorConfig::builder()
            .end_exclusion(2)
            .exclude([5])
            .include([1])
            .build()
            .unwrap();
        assert_eq!(bits(&r, &c), "?0000?00??..........");
    }

    #[test]
    fn decoding_errors() {
        let c = cfg(1);
        let overrun = read(0, "6M", b"ACGT", 40);
        assert_eq!(
            generate(&overrun, REF, &c).unwrap_err(),
            GenerateError::Decoding(DecodingError::ReadOverrun { needed: 6, available: 4 })
        );
        let short = read(0, "3M", b"ACGT", 40);
        assert_eq!(
            generate(&short, REF, &c).unwrap_err(),
            GenerateError::Decoding(DecodingError::ReadNotConsumed { consumed: 3, read_len: 4 })
        );
        let oob = read(18, "4M", b"GTAC", 40);
        assert_eq!(
            generate(&oob, REF, &c).unwrap_err(),
            GenerateError::Decoding(DecodingError::ReferenceOutOfBounds { end: 22, reference_len: 20 })
        );
        let clipped = read(0, "4S", b"ACGT", 40);
        assert_eq!(
            generate(&clipped, REF, &c).unwrap_err(),
            GenerateError::Decoding(DecodingError::EmptySpan)
        );
        let skip = read(0, "2M3N2M", b"ACGT", 40);
        assert_eq!(
            generate(&skip, REF, &c).unwrap_err(),
            GenerateError::Decoding(DecodingError::UnsupportedOp('N'))
        );
        let mut bad_qual = read(0, "4M", b"ACGT", 40);
        bad_qual.qualities = vec![40u8; 3].into();
        assert!(matches!(
            generate(&bad_qual, REF, &c),
            Err(GenerateError::Decoding(DecodingError::QualityLength { .. }))
        ));
    }

    #[test]
    fn mapq_and_length_rules() {
        let mut r = read(0, "8M", &REF[..8], 40);
        r.mapq = 3;
        assert_eq!(
            generate(&r, REF, &cfg(1)).unwrap_err().kind(),
            crate::error::RejectKind::LowMappingQuality
        );
        r.mapq = 60;
        let c = BitVectorConfig::builder().min_mapped_length(Some(10)).build().unwrap();
        assert_eq!(
            generate(&r, REF, &c).unwrap_err(),
            GenerateError::Constraint(ConstraintViolation::MappedLengthTooShort { len: 8, min: 10 })
        );
        let c = BitVectorConfig::builder().max_mapped_length(Some(5)).build().unwrap();
        assert!(generate(&r, REF, &c).is_err());
    }

    #[test]
    fn stricter_mutation_rules() {
        // 位置 1 与 4 突变
        let r = read(0, "8M", b"AAGTCCGT", 40);
        let strict = |s: StricterConstraints| {
            BitVectorConfig::builder().window_size(0).stricter(Some(s)).build().unwrap()
        };
        let too_many = strict(StricterConstraints {
            max_mutations: Some(1),
            ..Default::default()
        });
        assert_eq!(
            generate(&r, REF, &too_many).unwrap_err(),
            GenerateError::Constraint(ConstraintViolation::TooManyMutations { found: 2, max: 1 })
        );
        let close = strict(StricterConstraints {
            min_mutation_distance: Some(4),
            ..Default::default()
        });
        assert_eq!(
            generate(&r, REF, &close).unwrap_err(),
            GenerateError::Constraint(ConstraintViolation::MutationsTooClose {
                first: 1,
                second: 4,
                min_distance: 4
            })
        );
        let coverage = strict(StricterConstraints {
            min_coverage_fraction: Some(0.5),
            ..Default::default()
        });
        assert!(matches!(
            generate(&r, REF, &coverage),
            Err(GenerateError::Constraint(ConstraintViolation::InsufficientCoverage { covered: 8, .. }))
        ));
        let ok = strict(StricterConstraints {
            max_mutations: Some(2),
            min_mutation_distance: Some(3),
            min_coverage_fraction: Some(0.4),
            ..Default::default()
        });
        assert_eq!(generate(&r, REF, &ok).unwrap().summary().mutations, 2);
    }

    #[test]
    fn generate_is_idempotent() {
        let r = read(1, "3M1D3M1I2M", b"CGTCGTAAC", 40);
        let c = cfg(1);
        assert_eq!(generate(&r, REF, &c), generate(&r, REF, &c));
    }
}
