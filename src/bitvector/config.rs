use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Phred 质量上限（SAM 规范中可打印字符 `~` 对应 93）
pub const MAX_PHRED: u8 = 93;

pub const DEFAULT_MIN_QUALITY: u8 = 25;
pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_MIN_MAPQ: u8 = 15;

/// 更严格的二次过滤规则
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StricterConstraints {
    /// Reject any read carrying an insertion.
    pub forbid_insertions: bool,
    /// Reject reads with more mutations than this in the final vector.
    pub max_mutations: Option<usize>,
    /// Reject reads with two mutations closer than this many positions.
    pub min_mutation_distance: Option<usize>,
    /// Minimum fraction of the reference the read span must cover.
    pub min_coverage_fraction: Option<f64>,
    /// A mutation is trusted only when this many positions on each side are matches.
    pub surrounding_matches: usize,
}

/// 比特向量生成规则，构造后不可变
///
/// 只能通过 [`BitVectorConfigBuilder::build`] 得到，保证已通过校验；
/// 反序列化同样经过构建器校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BitVectorConfigBuilder")]
pub struct BitVectorConfig {
    min_quality: u8,
    window_size: usize,
    end_exclusion: usize,
    min_mapped_length: Option<usize>,
    max_mapped_length: Option<usize>,
    min_mapq: u8,
    exclude: BTreeSet<usize>,
    include: BTreeSet<usize>,
    stricter: Option<StricterConstraints>,
}

impl BitVectorConfig {
    pub fn builder() -> BitVectorConfigBuilder {
        BitVectorConfigBuilder::default()
    }

    pub fn min_quality(&self) -> u8 {
        self.min_quality
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn end_exclusion(&self) -> usize {
        self.end_exclusion
    }

    pub fn min_mapped_length(&self) -> Option<usize> {
        self.min_mapped_length
    }

    pub fn max_mapped_length(&self) -> Option<usize> {
        self.max_mapped_length
    }

    pub fn min_mapq(&self) -> u8 {
        self.min_mapq
    }

    /// 0-based positions always forced to ambiguous.
    pub fn exclude(&self) -> &BTreeSet<usize> {
        &self.exclude
    }

    /// 0-based positions always reporting their raw call.
    pub fn include(&self) -> &BTreeSet<usize> {
        &self.include
    }

    pub fn stricter(&self) -> Option<&StricterConstraints> {
        self.stricter.as_ref()
    }
}

impl Default for BitVectorConfig {
    fn default() -> Self {
        let b = BitVectorConfigBuilder::default();
        Self {
            min_quality: b.min_quality,
            window_size: b.window_size,
            end_exclusion: b.end_exclusion,
            min_mapped_length: None,
            max_mapped_length: None,
            min_mapq: b.min_mapq,
            exclude: BTreeSet::new(),
            include: BTreeSet::new(),
            stricter: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitVectorConfigBuilder {
    min_quality: u8,
    window_size: usize,
    end_exclusion: usize,
    min_mapped_length: Option<usize>,
    max_mapped_length: Option<usize>,
    min_mapq: u8,
    exclude: BTreeSet<usize>,
    include: BTreeSet<usize>,
    stricter: Option<StricterConstraints>,
}

impl Default for BitVectorConfigBuilder {
    fn default() -> Self {
        Self {
            min_quality: DEFAULT_MIN_QUALITY,
            window_size: DEFAULT_WINDOW_SIZE,
            end_exclusion: 0,
            min_mapped_length: None,
            max_mapped_length: None,
            min_mapq: DEFAULT_MIN_MAPQ,
            exclude: BTreeSet::new(),
            include: BTreeSet::new(),
            stricter: None,
        }
    }
}

impl BitVectorConfigBuilder {
    pub fn min_quality(mut self, q: u8) -> Self {
        self.min_quality = q;
        self
    }

    pub fn window_size(mut self, w: usize) -> Self {
        self.window_size = w;
        self
    }

    pub fn end_exclusion(mut self, n: usize) -> Self {
        self.end_exclusion = n;
        self
    }

    pub fn min_mapped_length(mut self, len: Option<usize>) -> Self {
        self.min_mapped_length = len;
        self
    }

    pub fn max_mapped_length(mut self, len: Option<usize>) -> Self {
        self.max_mapped_length = len;
        self
    }

    pub fn min_mapq(mut self, q: u8) -> Self {
        self.min_mapq = q;
        self
    }

    pub fn exclude<I: IntoIterator<Item = usize>>(mut self, positions: I) -> Self {
        self.exclude.extend(positions);
        self
    }

    pub fn include<I: IntoIterator<Item = usize>>(mut self, positions: I) -> Self {
        self.include.extend(positions);
        self
    }

    pub fn stricter(mut self, s: Option<StricterConstraints>) -> Self {
        self.stricter = s;
        self
    }

    pub fn build(self) -> Result<BitVectorConfig, ConfigError> {
        if self.min_quality > MAX_PHRED {
            return Err(ConfigError::QualityOutOfRange(self.min_quality));
        }
        if let (Some(min), Some(max)) = (self.min_mapped_length, self.max_mapped_length) {
            if min > max {
                return Err(ConfigError::MappedLengthBounds { min, max });
            }
        }
        let conflicts: Vec<usize> = self.include.intersection(&self.exclude).copied().collect();
        if !conflicts.is_empty() {
            return Err(ConfigError::ConflictingOverrides(conflicts));
        }
        if let Some(f) = self.stricter.as_ref().and_then(|s| s.min_coverage_fraction) {
            if !f.is_finite() || !(0.0..=1.0).contains(&f) {
                return Err(ConfigError::CoverageFraction(f));
            }
        }

        Ok(BitVectorConfig {
            min_quality: self.min_quality,
            window_size: self.window_size,
            end_exclusion: self.end_exclusion,
            min_mapped_length: self.min_mapped_length,
            max_mapped_length: self.max_mapped_length,
            min_mapq: self.min_mapq,
            exclude: self.exclude,
            include: self.include,
            stricter: self.stricter,
        })
    }
}

impl TryFrom<BitVectorConfigBuilder> for BitVectorConfig {
    type Error = ConfigError;

    fn try_from(b: BitVectorConfigBuilder) -> Result<Self, Self::Error> {
        b.build()
    }
}

/// 解析 1-based 闭区间位置列表（如 `1-20,45`），返回 0-based 位置
pub fn parse_position_list(list: &str) -> Result<BTreeSet<usize>, ConfigError> {
    let bad = || ConfigError::PositionList(list.to_string());
    let mut out = BTreeSet::new();
    for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (a.trim(), b.trim()),
            None => (part, part),
        };
        let lo: usize = lo.parse().map_err(|_| bad())?;
        let hi: usize = hi.parse().map_err(|_| bad())?;
        if lo == 0 || hi < lo {
            return Err(bad());
        }
        out.extend(lo - 1..hi);
    }
    Ok(out)
}
