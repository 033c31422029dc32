use crate::{Code, OrdpackError, SymbolCode, SymbolFreq, MAX_CODE_LEN};

/*****************************************************************************
 *                       Order-preserving code assignment                    *
 *****************************************************************************/

/*
 * Turns a lexicographically sorted (symbol, frequency) list into a
 * prefix-free code table in the same order. Because codes are handed out
 * along a contiguous recursive partition of the sorted list, a symbol's
 * code compares below a later symbol's code when both are left-aligned,
 * which is the invariant every encoder relies on.
 */
pub trait CodeAssigner {
    fn assign_codes(&self, symbol_freqs: &[SymbolFreq]) -> Result<Vec<SymbolCode>, OrdpackError>;
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AssignerKind {
    /// Recursive weight-balanced split, approximating Huffman lengths
    /// under the contiguity constraint. The default for every encoder.
    WeightBalanced,
    /// Equal-length codes by rank. Wastes entropy but keeps every code at
    /// `ceil(log2(n))` bits; useful as a baseline.
    FixedLen,
}

pub fn new_assigner(kind: AssignerKind) -> Box<dyn CodeAssigner> {
    match kind {
        AssignerKind::WeightBalanced => Box::new(WeightBalancedAssigner),
        AssignerKind::FixedLen => Box::new(FixedLenAssigner),
    }
}

impl AssignerKind {
    /// Numeric tags: 0 weight-balanced, 1 fixed-length.
    pub fn from_tag(tag: i64) -> Option<AssignerKind> {
        match tag {
            0 => Some(AssignerKind::WeightBalanced),
            1 => Some(AssignerKind::FixedLen),
            _ => None,
        }
    }
}

pub struct WeightBalancedAssigner;

impl WeightBalancedAssigner {
    /*
     * Assign codes to symbols[lo..hi] under the bit path 'path' of length
     * 'depth'. The split boundary is the one minimising the mass imbalance
     * between the two sides; on a tie the earlier boundary wins, which
     * keeps left codes shorter.
     */
    fn split(
        prefix: &[u64],
        out: &mut [Code],
        lo: usize,
        hi: usize,
        path: u64,
        depth: u32,
    ) -> Result<(), OrdpackError> {
        if hi - lo == 1 {
            out[lo] = Code {
                bits: path,
                len: depth as u8,
            };
            return Ok(());
        }
        if depth as usize >= MAX_CODE_LEN {
            return Err(OrdpackError::CodeLengthOverflow);
        }

        let target = prefix[lo] + prefix[hi];
        /* First boundary whose doubled prefix mass reaches the midpoint.
         * The imbalance is V-shaped in the boundary, so only this boundary
         * and the one before it can be minimal. */
        let m = (lo + 1)
            + prefix[lo + 1..hi].partition_point(|&p| 2 * p < target);
        let m = if m > lo + 1 {
            let imb_before = target.abs_diff(2 * prefix[m - 1]);
            let imb_at = if m < hi {
                target.abs_diff(2 * prefix[m])
            } else {
                u64::MAX
            };
            if imb_before <= imb_at {
                m - 1
            } else {
                m
            }
        } else {
            m
        };

        Self::split(prefix, out, lo, m, path << 1, depth + 1)?;
        Self::split(prefix, out, m, hi, (path << 1) | 1, depth + 1)
    }
}

impl CodeAssigner for WeightBalancedAssigner {
    fn assign_codes(&self, symbol_freqs: &[SymbolFreq]) -> Result<Vec<SymbolCode>, OrdpackError> {
        let n = symbol_freqs.len();
        if n < 2 {
            return Err(OrdpackError::InsufficientCorpus);
        }

        let mut prefix = Vec::with_capacity(n + 1);
        prefix.push(0u64);
        let mut acc = 0u64;
        for (_, freq) in symbol_freqs {
            acc += freq;
            prefix.push(acc);
        }

        let mut codes = vec![Code::default(); n];
        Self::split(&prefix, &mut codes, 0, n, 0, 0)?;

        Ok(symbol_freqs
            .iter()
            .zip(codes)
            .map(|((symbol, _), code)| (symbol.clone(), code))
            .collect())
    }
}

pub struct FixedLenAssigner;

impl CodeAssigner for FixedLenAssigner {
    fn assign_codes(&self, symbol_freqs: &[SymbolFreq]) -> Result<Vec<SymbolCode>, OrdpackError> {
        let n = symbol_freqs.len();
        if n < 2 {
            return Err(OrdpackError::InsufficientCorpus);
        }
        let len = (usize::BITS - (n - 1).leading_zeros()) as usize;
        if len > MAX_CODE_LEN {
            return Err(OrdpackError::CodeLengthOverflow);
        }

        Ok(symbol_freqs
            .iter()
            .enumerate()
            .map(|(i, (symbol, _))| {
                (
                    symbol.clone(),
                    Code {
                        bits: i as u64,
                        len: len as u8,
                    },
                )
            })
            .collect())
    }
}

/// Extend the last real code with zero bits up to `max_len`, the table's
/// longest code. Fixed-arity dictionaries use this to backfill indices past
/// the last symbol seen in the sample; such indices never occur in real
/// data and are not inserted into the decode trie.
pub fn synthesised_tail_code(last: Code, max_len: u8) -> Code {
    debug_assert!(last.len <= max_len);
    Code {
        bits: last.bits << (max_len - last.len) as u32,
        len: max_len,
    }
}
