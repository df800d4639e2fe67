use serde::{Deserialize, Serialize};

use super::symbol::{to_bit_string, BitVectorSymbol};

/// 符号计数，始终等于符号序列的统计结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitVectorSummary {
    pub matches: usize,
    pub mutations: usize,
    /// Mutations split by observed base, indexed by `Base::index`.
    pub mutations_by_base: [usize; 4],
    pub deletions: usize,
    pub ambiguous: usize,
    pub no_coverage: usize,
}

impl BitVectorSummary {
    pub fn tally(symbols: &[BitVectorSymbol]) -> Self {
        let mut s = Self::default();
        for sym in symbols {
            match sym {
                BitVectorSymbol::Match => s.matches += 1,
                BitVectorSymbol::Mutation(b) => {
                    s.mutations += 1;
                    s.mutations_by_base[b.index()] += 1;
                }
                BitVectorSymbol::Deletion => s.deletions += 1,
                BitVectorSymbol::Ambiguous => s.ambiguous += 1,
                BitVectorSymbol::NoCoverage => s.no_coverage += 1,
            }
        }
        s
    }

    pub fn total(&self) -> usize {
        self.matches + self.mutations + self.deletions + self.ambiguous + self.no_coverage
    }

    pub fn merge(&mut self, other: &BitVectorSummary) {
        self.matches += other.matches;
        self.mutations += other.mutations;
        for (a, b) in self.mutations_by_base.iter_mut().zip(other.mutations_by_base) {
            *a += b;
        }
        self.deletions += other.deletions;
        self.ambiguous += other.ambiguous;
        self.no_coverage += other.no_coverage;
    }
}

/// 一条 read 的比特向量，构造时一次性计算汇总
///
/// `symbols` covers the whole reference; `[start, end)` is the read's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredResult")]
pub struct BitVectorResult {
    read_name: String,
    reference: String,
    start: usize,
    end: usize,
    symbols: Vec<BitVectorSymbol>,
    summary: BitVectorSummary,
}

/// 反序列化的原始形态，校验后才转换为 [`BitVectorResult`]
#[derive(Deserialize)]
struct StoredResult {
    read_name: String,
    reference: String,
    start: usize,
    end: usize,
    symbols: Vec<BitVectorSymbol>,
    summary: BitVectorSummary,
}

impl TryFrom<StoredResult> for BitVectorResult {
    type Error = String;

    fn try_from(r: StoredResult) -> Result<Self, Self::Error> {
        if r.start >= r.end || r.end > r.symbols.len() {
            return Err(format!(
                "read '{}': span {}..{} invalid for {} positions",
                r.read_name,
                r.start,
                r.end,
                r.symbols.len()
            ));
        }
        let outside = r.symbols[..r.start].iter().chain(&r.symbols[r.end..]);
        if outside.copied().any(|s| s != BitVectorSymbol::NoCoverage) {
            return Err(format!("read '{}': coverage outside its span", r.read_name));
        }
        let result = BitVectorResult::new(r.read_name, r.reference, r.start, r.end, r.symbols);
        if result.summary != r.summary {
            return Err(format!("read '{}': stored counts disagree with symbols", result.read_name));
        }
        Ok(result)
    }
}

impl BitVectorResult {
    pub fn new(
        read_name: impl Into<String>,
        reference: impl Into<String>,
        start: usize,
        end: usize,
        symbols: Vec<BitVectorSymbol>,
    ) -> Self {
        debug_assert!(start <= end && end <= symbols.len());
        let summary = BitVectorSummary::tally(&symbols);
        Self {
            read_name: read_name.into(),
            reference: reference.into(),
            start,
            end,
            symbols,
            summary,
        }
    }

    pub fn read_name(&self) -> &str {
        &self.read_name
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// 0-based first covered position.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Half-open end of the covered span.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn symbols(&self) -> &[BitVectorSymbol] {
        &self.symbols
    }

    /// Symbols inside the read's span.
    pub fn covered(&self) -> &[BitVectorSymbol] {
        &self.symbols[self.start..self.end]
    }

    /// Symbol at a reference position; `NoCoverage` past the reference end.
    pub fn symbol_at(&self, pos: usize) -> BitVectorSymbol {
        self.symbols.get(pos).copied().unwrap_or(BitVectorSymbol::NoCoverage)
    }

    pub fn summary(&self) -> &BitVectorSummary {
        &self.summary
    }

    pub fn bit_string(&self) -> String {
        to_bit_string(&self.symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::dna::Base;

    fn sample() -> BitVectorResult {
        let symbols = vec![
            BitVectorSymbol::NoCoverage,
            BitVectorSymbol::Match,
            BitVectorSymbol::Mutation(Base::G),
            BitVectorSymbol::Deletion,
            BitVectorSymbol::Mutation(Base::A),
            BitVectorSymbol::Ambiguous,
            BitVectorSymbol::NoCoverage,
        ];
        BitVectorResult::new("r1", "ref", 1, 6, symbols)
    }

    #[test]
    fn summary_tallies_symbols() {
        let r = sample();
        let s = r.summary();
        assert_eq!(s.matches, 1);
        assert_eq!(s.mutations, 2);
        assert_eq!(s.mutations_by_base, [1, 0, 1, 0]);
        assert_eq!(s.deletions, 1);
        assert_eq!(s.ambiguous, 1);
        assert_eq!(s.no_coverage, 2);
        assert_eq!(s.total(), r.symbols().len());
    }

    #[test]
    fn span_accessors() {
        let r = sample();
        assert_eq!(r.covered().len(), 5);
        assert_eq!(r.bit_string(), ".0G1A?.");
        assert_eq!(r.symbol_at(3), BitVectorSymbol::Deletion);
        assert_eq!(r.symbol_at(100), BitVectorSymbol::NoCoverage);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = *sample().summary();
        a.merge(sample().summary());
        assert_eq!(a.mutations, 4);
        assert_eq!(a.mutations_by_base, [2, 0, 2, 0]);
        assert_eq!(a.total(), 14);
    }

    #[test]
    fn deserialize_checks_span_and_counts() {
        let r = sample();
        let bytes = bincode::serialize(&r).unwrap();
        assert_eq!(bincode::deserialize::<BitVectorResult>(&bytes).unwrap(), r);

        // same field layout with an inverted span
        let inverted = ("r1", "ref", 6usize, 1usize, r.symbols().to_vec(), *r.summary());
        let bytes = bincode::serialize(&inverted).unwrap();
        assert!(bincode::deserialize::<BitVectorResult>(&bytes).is_err());

        let mut counts = *r.summary();
        counts.matches += 1;
        let tampered = ("r1", "ref", 1usize, 6usize, r.symbols().to_vec(), counts);
        let bytes = bincode::serialize(&tampered).unwrap();
        assert!(bincode::deserialize::<BitVectorResult>(&bytes).is_err());

        let mut symbols = r.symbols().to_vec();
        symbols[0] = BitVectorSymbol::Match;
        let outside = ("r1", "ref", 1usize, 6usize, symbols, *r.summary());
        let bytes = bincode::serialize(&outside).unwrap();
        assert!(bincode::deserialize::<BitVectorResult>(&bytes).is_err());
    }
}
