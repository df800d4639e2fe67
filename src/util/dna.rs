use serde::{Deserialize, Serialize};

/// 可判定的核苷酸（N 等不确定碱基不在此列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Base {
    A,
    C,
    G,
    T,
}

impl Base {
    pub const ALL: [Base; 4] = [Base::A, Base::C, Base::G, Base::T];

    /// Decode an ASCII nucleotide. `U` reads as `T`; anything else is uncallable.
    #[inline]
    pub fn from_ascii(b: u8) -> Option<Self> {
        match b.to_ascii_uppercase() {
            b'A' => Some(Base::A),
            b'C' => Some(Base::C),
            b'G' => Some(Base::G),
            b'T' | b'U' => Some(Base::T),
            _ => None,
        }
    }

    #[inline]
    pub fn to_ascii(self) -> u8 {
        match self {
            Base::A => b'A',
            Base::C => b'C',
            Base::G => b'G',
            Base::T => b'T',
        }
    }

    /// 0..4 下标，用于按碱基计数
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Base::A => 0,
            Base::C => 1,
            Base::G => 2,
            Base::T => 3,
        }
    }
}

#[inline]
pub fn normalize_base(b: u8) -> u8 {
    let up = b.to_ascii_uppercase();
    match up {
        b'A' | b'C' | b'G' | b'T' | b'N' => up,
        b'U' => b'T',
        _ => b'N',
    }
}

pub fn normalize_seq(seq: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(seq.len());
    for &b in seq {
        out.push(normalize_base(b));
    }
    out
}
