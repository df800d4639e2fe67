use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::dna::Base;

/// 每个参考位置上的比特向量符号
///
/// 文本编码沿用 DREEM 约定：`0` 匹配，`A/C/G/T` 突变为该碱基，
/// `1` 缺失，`?` 不确定，`.` 未覆盖。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitVectorSymbol {
    Match,
    /// Substitution, carrying the base observed in the read.
    Mutation(Base),
    Deletion,
    Ambiguous,
    NoCoverage,
}

impl BitVectorSymbol {
    #[inline]
    pub fn to_code(self) -> u8 {
        match self {
            BitVectorSymbol::Match => b'0',
            BitVectorSymbol::Mutation(b) => b.to_ascii(),
            BitVectorSymbol::Deletion => b'1',
            BitVectorSymbol::Ambiguous => b'?',
            BitVectorSymbol::NoCoverage => b'.',
        }
    }

    #[inline]
    pub fn is_mutation(self) -> bool {
        matches!(self, BitVectorSymbol::Mutation(_))
    }
}

impl fmt::Display for BitVectorSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_code() as char)
    }
}

/// Render a symbol slice as its text code string.
pub fn to_bit_string(symbols: &[BitVectorSymbol]) -> String {
    symbols.iter().map(|s| s.to_code() as char).collect()
}
