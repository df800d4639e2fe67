use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::CigarParseError;

/// CIGAR 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CigarKind {
    /// `M`：比对（匹配或错配）
    Match,
    /// `=`
    SeqMatch,
    /// `X`
    SeqMismatch,
    /// `I`
    Insertion,
    /// `D`
    Deletion,
    /// `N`
    RefSkip,
    /// `S`
    SoftClip,
    /// `H`
    HardClip,
    /// `P`
    Padding,
}

impl CigarKind {
    pub fn from_char(ch: char) -> Option<Self> {
        Some(match ch {
            'M' => CigarKind::Match,
            '=' => CigarKind::SeqMatch,
            'X' => CigarKind::SeqMismatch,
            'I' => CigarKind::Insertion,
            'D' => CigarKind::Deletion,
            'N' => CigarKind::RefSkip,
            'S' => CigarKind::SoftClip,
            'H' => CigarKind::HardClip,
            'P' => CigarKind::Padding,
            _ => return None,
        })
    }

    pub fn as_char(self) -> char {
        match self {
            CigarKind::Match => 'M',
            CigarKind::SeqMatch => '=',
            CigarKind::SeqMismatch => 'X',
            CigarKind::Insertion => 'I',
            CigarKind::Deletion => 'D',
            CigarKind::RefSkip => 'N',
            CigarKind::SoftClip => 'S',
            CigarKind::HardClip => 'H',
            CigarKind::Padding => 'P',
        }
    }

    #[inline]
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::SeqMatch
                | CigarKind::SeqMismatch
                | CigarKind::Insertion
                | CigarKind::SoftClip
        )
    }

    #[inline]
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::SeqMatch
                | CigarKind::SeqMismatch
                | CigarKind::Deletion
                | CigarKind::RefSkip
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CigarOp {
    pub kind: CigarKind,
    pub len: u32,
}

impl CigarOp {
    pub fn new(kind: CigarKind, len: u32) -> Self {
        Self { kind, len }
    }
}

/// 解析 CIGAR 字符串，例如 `5S10M2D8M1I4M`
///
/// 与宽松解析不同，缺失长度、零长度、未知操作均视为错误。
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>, CigarParseError> {
    if cigar.is_empty() {
        return Err(CigarParseError::Empty);
    }
    let mut result = Vec::new();
    let mut num: Option<u32> = None;
    for ch in cigar.chars() {
        if let Some(d) = ch.to_digit(10) {
            let cur = num.unwrap_or(0);
            let next = cur
                .checked_mul(10)
                .and_then(|v| v.checked_add(d))
                .ok_or(CigarParseError::Overflow)?;
            num = Some(next);
        } else {
            let kind = CigarKind::from_char(ch).ok_or(CigarParseError::UnknownOp(ch))?;
            let len = num.take().ok_or(CigarParseError::MissingLength(ch))?;
            if len == 0 {
                return Err(CigarParseError::ZeroLength(ch));
            }
            result.push(CigarOp::new(kind, len));
        }
    }
    if num.is_some() {
        return Err(CigarParseError::TrailingLength);
    }
    Ok(result)
}

pub fn ops_to_cigar(ops: &[CigarOp]) -> String {
    let mut cigar = String::new();
    for op in ops {
        let _ = write!(&mut cigar, "{}{}", op.len, op.kind.as_char());
    }
    cigar
}

/// Number of reference bases the trace spans.
pub fn reference_len(ops: &[CigarOp]) -> usize {
    ops.iter()
        .filter(|op| op.kind.consumes_reference())
        .map(|op| op.len as usize)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn parse_mixed_cigar() {
        let ops = parse_cigar("5S10M2D8M1I4M").unwrap();
        assert_eq!(
            ops,
            vec![
                CigarOp::new(CigarKind::SoftClip, 5),
                CigarOp::new(CigarKind::Match, 10),
                CigarOp::new(CigarKind::Deletion, 2),
                CigarOp::new(CigarKind::Match, 8),
                CigarOp::new(CigarKind::Insertion, 1),
                CigarOp::new(CigarKind::Match, 4),
            ]
        );
        assert_eq!(reference_len(&ops), 24);
        assert_eq!(ops_to_cigar(&ops), "5S10M2D8M1I4M");
    }

    #[test]
    fn parse_extended_ops() {
        let ops = parse_cigar("3=1X2H").unwrap();
        assert_eq!(ops[0].kind, CigarKind::SeqMatch);
        assert_eq!(ops[1].kind, CigarKind::SeqMismatch);
        assert_eq!(ops[2].kind, CigarKind::HardClip);
        assert_eq!(reference_len(&ops), 4);
    }

    #[test_case("" => CigarParseError::Empty ; "empty")]
    #[test_case("M" => CigarParseError::MissingLength('M') ; "missing length")]
    #[test_case("0M" => CigarParseError::ZeroLength('M') ; "zero length")]
    #[test_case("4Q" => CigarParseError::UnknownOp('Q') ; "unknown op")]
    #[test_case("4M12" => CigarParseError::TrailingLength ; "dangling length")]
    #[test_case("99999999999M" => CigarParseError::Overflow ; "overflow")]
    fn parse_rejects(cigar: &str) -> CigarParseError {
        parse_cigar(cigar).unwrap_err()
    }
}
