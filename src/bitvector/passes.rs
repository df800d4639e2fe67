//! 掩蔽流水线：按优先级从低到高依次执行的纯函数 pass
//!
//! 每个 pass 只作用于 read 覆盖的参考区间（span），因此区间外的位置
//! 在任何配置下都保持 `NoCoverage`。后执行的 pass 覆盖先执行的结果，
//! 于是执行顺序即优先级：
//!
//! | rank | pass |
//! |------|------|
//! | 1 | [`apply_includes`] |
//! | 2 | [`apply_excludes`] |
//! | 3 | [`exclude_read_ends`] |
//! | 4 | [`demote_unflanked_mutations`]（仅 stricter） |
//! | 5 | [`mask_event_windows`] |
//! | 6 | [`mask_low_quality`] |
//! | 7 | [`classify`] |

use std::collections::BTreeSet;

use super::config::BitVectorConfig;
use super::symbol::BitVectorSymbol;
use crate::util::dna::Base;

/// Per-position call straight from the edit trace, before any masking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCall {
    Match,
    Mismatch { base: Base, low_quality: bool },
    Deletion,
    /// `N` in the read or the reference.
    Uncallable,
}

impl RawCall {
    #[inline]
    pub fn symbol(self) -> BitVectorSymbol {
        match self {
            RawCall::Match => BitVectorSymbol::Match,
            RawCall::Mismatch { base, .. } => BitVectorSymbol::Mutation(base),
            RawCall::Deletion => BitVectorSymbol::Deletion,
            RawCall::Uncallable => BitVectorSymbol::Ambiguous,
        }
    }

    /// Deletions and low-quality mismatches mask their neighbourhood.
    #[inline]
    fn is_masking_event(self) -> bool {
        matches!(
            self,
            RawCall::Deletion | RawCall::Mismatch { low_quality: true, .. }
        )
    }
}

/// Run every pass over the span starting at reference position `start`.
pub fn run(raw: &[RawCall], start: usize, config: &BitVectorConfig) -> Vec<BitVectorSymbol> {
    let mut symbols = classify(raw);
    mask_low_quality(&mut symbols, raw);
    mask_event_windows(&mut symbols, raw, config.window_size());
    if let Some(s) = config.stricter() {
        demote_unflanked_mutations(&mut symbols, s.surrounding_matches);
    }
    exclude_read_ends(&mut symbols, config.end_exclusion());
    apply_excludes(&mut symbols, start, config.exclude());
    apply_includes(&mut symbols, raw, start, config.include());
    symbols
}

/// rank 7
pub fn classify(raw: &[RawCall]) -> Vec<BitVectorSymbol> {
    raw.iter().map(|c| c.symbol()).collect()
}

/// rank 6：低质量错配不计为突变
pub fn mask_low_quality(symbols: &mut [BitVectorSymbol], raw: &[RawCall]) {
    for (s, c) in symbols.iter_mut().zip(raw) {
        if let RawCall::Mismatch { low_quality: true, .. } = c {
            *s = BitVectorSymbol::Ambiguous;
        }
    }
}

/// rank 5：缺失与低质量错配两侧 `window` 个位置记为不确定
///
/// 事件只取自原始判定，已被掩蔽的位置不会继续向外扩散。缺失位置本身保留。
pub fn mask_event_windows(symbols: &mut [BitVectorSymbol], raw: &[RawCall], window: usize) {
    let n = raw.len();
    if n == 0 {
        return;
    }
    // 差分数组累计每个位置被多少个窗口覆盖
    let mut diff = vec![0i32; n + 1];
    let mut any = false;
    for (i, c) in raw.iter().enumerate() {
        if c.is_masking_event() {
            let lo = i.saturating_sub(window);
            let hi = i.saturating_add(window).min(n - 1);
            diff[lo] += 1;
            diff[hi + 1] -= 1;
            any = true;
        }
    }
    if !any {
        return;
    }
    let mut depth = 0i32;
    for i in 0..n {
        depth += diff[i];
        if depth > 0 && raw[i] != RawCall::Deletion {
            symbols[i] = BitVectorSymbol::Ambiguous;
        }
    }
}

/// rank 4：突变两侧各 `k` 个位置都必须是匹配，否则不可信
pub fn demote_unflanked_mutations(symbols: &mut [BitVectorSymbol], k: usize) {
    if k == 0 {
        return;
    }
    let snapshot = symbols.to_vec();
    let n = snapshot.len();
    for (i, s) in symbols.iter_mut().enumerate() {
        if !snapshot[i].is_mutation() {
            continue;
        }
        let flanked = (1..=k).all(|d| {
            i >= d
                && i + d < n
                && snapshot[i - d] == BitVectorSymbol::Match
                && snapshot[i + d] == BitVectorSymbol::Match
        });
        if !flanked {
            *s = BitVectorSymbol::Ambiguous;
        }
    }
}

/// rank 3：距 span 任一端不足 `n` 的位置记为不确定
pub fn exclude_read_ends(symbols: &mut [BitVectorSymbol], n: usize) {
    let len = symbols.len();
    let head = n.min(len);
    for s in &mut symbols[..head] {
        *s = BitVectorSymbol::Ambiguous;
    }
    for s in &mut symbols[len.saturating_sub(n)..] {
        *s = BitVectorSymbol::Ambiguous;
    }
}

/// rank 2
pub fn apply_excludes(symbols: &mut [BitVectorSymbol], start: usize, exclude: &BTreeSet<usize>) {
    let end = start + symbols.len();
    for &p in exclude.range(start..end) {
        symbols[p - start] = BitVectorSymbol::Ambiguous;
    }
}

/// rank 1：强制包含的位置恢复原始判定，凌驾于所有掩蔽之上
pub fn apply_includes(
    symbols: &mut [BitVectorSymbol],
    raw: &[RawCall],
    start: usize,
    include: &BTreeSet<usize>,
) {
    let end = start + symbols.len();
    for &p in include.range(start..end) {
        symbols[p - start] = raw[p - start].symbol();
    }
}
