use crate::{EncoderKind, OrdpackError, SymbolFreq, NUM_SINGLE_CHAR};
use std::collections::BTreeMap;

/*****************************************************************************
 *                             Symbol selection                              *
 *****************************************************************************/

/// Longest symbol the variable-length selector will grow.
pub const MAX_SYMBOL_LEN: usize = 16;

/// Growth rounds bound for the variable-length selector. Each round extends
/// hot symbols by one byte, so MAX_SYMBOL_LEN rounds already saturate the
/// length bound.
const MAX_GROW_ROUNDS: usize = MAX_SYMBOL_LEN;

/// A leaf qualifies for expansion when its parse count exceeds this
/// multiple of the mean symbol count.
const EXPAND_FACTOR: u64 = 4;

/// Scans a sample and emits a lexicographically sorted (symbol, frequency)
/// list for the code assigner. Frequencies are Laplace-smoothed parse
/// counts, so every emitted symbol carries positive mass.
pub trait SymbolSelector {
    fn select_symbols(
        &mut self,
        keys: &[Vec<u8>],
        dict_size_budget: i64,
    ) -> Result<Vec<SymbolFreq>, OrdpackError>;
}

pub fn new_selector(kind: EncoderKind) -> Box<dyn SymbolSelector> {
    match kind {
        EncoderKind::SingleChar => Box::new(SingleCharSelector),
        EncoderKind::DoubleChar => Box::new(DoubleCharSelector),
        EncoderKind::Alm => Box::new(AlmSelector::new()),
    }
}

/* An order-preserving dictionary needs an order to preserve: with fewer
 * than two distinct keys every build is rejected rather than synthesising
 * coverage out of nothing. */
fn has_two_distinct_keys(keys: &[Vec<u8>]) -> bool {
    match keys.first() {
        None => false,
        Some(first) => keys.iter().any(|k| k != first),
    }
}

pub struct SingleCharSelector;

impl SymbolSelector for SingleCharSelector {
    fn select_symbols(
        &mut self,
        keys: &[Vec<u8>],
        _dict_size_budget: i64,
    ) -> Result<Vec<SymbolFreq>, OrdpackError> {
        if !has_two_distinct_keys(keys) {
            return Err(OrdpackError::InsufficientCorpus);
        }

        let mut counts = [0u64; NUM_SINGLE_CHAR];
        for key in keys {
            for &b in key.iter() {
                counts[b as usize] += 1;
            }
        }

        /* Indices past the last byte seen in the sample are left to the
         * dictionary's synthesised tail codes. */
        let max_seen = counts.iter().rposition(|&c| c > 0).unwrap_or(0);
        Ok((0..=max_seen)
            .map(|b| (vec![b as u8], counts[b] + 1))
            .collect())
    }
}

pub struct DoubleCharSelector;

/// Symbol index of the byte pair starting at `pos`, using the same parse
/// the double-char encoder uses: a trailing odd byte b maps to 256*b.
#[inline(always)]
pub fn double_char_index(key: &[u8], pos: usize) -> usize {
    let hi = (key[pos] as usize) << 8;
    match key.get(pos + 1) {
        Some(&lo) => hi | lo as usize,
        None => hi,
    }
}

impl SymbolSelector for DoubleCharSelector {
    fn select_symbols(
        &mut self,
        keys: &[Vec<u8>],
        _dict_size_budget: i64,
    ) -> Result<Vec<SymbolFreq>, OrdpackError> {
        if !has_two_distinct_keys(keys) {
            return Err(OrdpackError::InsufficientCorpus);
        }

        let mut counts = vec![0u64; crate::NUM_DOUBLE_CHAR];
        for key in keys {
            let mut pos = 0;
            while pos < key.len() {
                counts[double_char_index(key, pos)] += 1;
                pos += 2;
            }
        }

        let max_seen = counts.iter().rposition(|&c| c > 0).unwrap_or(0);
        Ok((0..=max_seen)
            .map(|idx| (vec![(idx >> 8) as u8, idx as u8], counts[idx] + 1))
            .collect())
    }
}

/*****************************************************************************
 *                      Variable-length (ALM) selection                      *
 *****************************************************************************/

/*
 * The selector grows a trie seeded with all 256 single bytes. Each round
 * greedy-parses the sample against the current trie, counting how often a
 * parse stops at each node, then expands hot leaves by a full byte: an
 * expanded node always receives all 256 children, so a parse can stop
 * early only when the key itself ends. Every trie node is a symbol; a
 * node whose parse ends inside it keeps a code for that tail position.
 *
 * Two structural invariants follow and the encoders depend on both:
 * the node set is prefix-closed, and an inner node is never missing a
 * branch. Together they make the greedy parse of any key, sampled or not,
 * land exactly on node boundaries, so encoded order and decoded bytes are
 * exact for arbitrary query keys.
 */
struct GrowNode {
    children: BTreeMap<u8, u32>,
    freq: u64,
    depth: u8,
}

impl GrowNode {
    fn new(depth: u8) -> Self {
        Self {
            children: BTreeMap::new(),
            freq: 0,
            depth,
        }
    }
}

pub struct AlmSelector {
    nodes: Vec<GrowNode>,
    /// Bytes charged against the budget: symbol bytes plus one code entry
    /// per symbol.
    dict_bytes: i64,
}

const ROOT: u32 = 0;
const CODE_ENTRY_BYTES: i64 = std::mem::size_of::<crate::Code>() as i64;

impl AlmSelector {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            dict_bytes: 0,
        }
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(GrowNode::new(0));
        self.expand(ROOT);
        self.dict_bytes = NUM_SINGLE_CHAR as i64 * (1 + CODE_ENTRY_BYTES);
    }

    /// Attach all 256 children to `node`.
    fn expand(&mut self, node: u32) {
        let depth = self.nodes[node as usize].depth;
        for b in 0..=255u8 {
            let id = self.nodes.len() as u32;
            self.nodes.push(GrowNode::new(depth + 1));
            self.nodes[node as usize].children.insert(b, id);
        }
    }

    fn expansion_cost(&self, node: u32) -> i64 {
        let symbol_len = self.nodes[node as usize].depth as i64 + 1;
        NUM_SINGLE_CHAR as i64 * (symbol_len + CODE_ENTRY_BYTES)
    }

    /// Walk the trie from `key[pos..]` as far as the key allows, returning
    /// the node the parse stops at and the bytes consumed. The walk only
    /// ends at a leaf or at the end of the key, and always consumes at
    /// least one byte.
    #[inline]
    fn parse_step(&self, key: &[u8], pos: usize) -> (u32, usize) {
        let mut node = ROOT;
        let mut depth = 0;
        while pos + depth < key.len() {
            match self.nodes[node as usize].children.get(&key[pos + depth]) {
                Some(&child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }
        (node, depth)
    }

    /// One pass over the sample, recounting how often each node is
    /// emitted. Returns the total number of symbols emitted.
    fn count_pass(&mut self, keys: &[Vec<u8>]) -> u64 {
        for node in self.nodes.iter_mut() {
            node.freq = 0;
        }

        let mut emitted = 0u64;
        for key in keys {
            let mut pos = 0;
            while pos < key.len() {
                let (node, consumed) = self.parse_step(key, pos);
                self.nodes[node as usize].freq += 1;
                emitted += 1;
                pos += consumed;
            }
        }
        emitted
    }

    /// Predicted encoded bit size of the sample under the current symbol
    /// set, using the entropy-ideal code length per symbol rounded up.
    fn predicted_bits(&self, emitted: u64) -> u64 {
        let mut bits = 0u64;
        for node in self.nodes.iter().skip(1) {
            let freq = node.freq + 1;
            let est_len = 64 - u64::leading_zeros(((emitted + 1) / freq).max(1)) as u64;
            bits += node.freq * est_len.max(1);
        }
        bits
    }

    /// Expand every qualifying hot leaf, hottest first, while the byte
    /// budget lasts. Returns the number of leaves expanded.
    fn expand_hot_leaves(&mut self, emitted: u64, budget: i64) -> usize {
        let num_symbols = (self.nodes.len() - 1) as u64;
        let threshold = (emitted / num_symbols).max(1) * EXPAND_FACTOR;

        let mut hot: Vec<u32> = (1..self.nodes.len() as u32)
            .filter(|&id| {
                let node = &self.nodes[id as usize];
                node.children.is_empty()
                    && node.freq >= threshold
                    && (node.depth as usize) < MAX_SYMBOL_LEN
            })
            .collect();
        /* hottest first so the budget goes to the biggest wins */
        hot.sort_by_key(|&id| std::cmp::Reverse(self.nodes[id as usize].freq));

        let mut expanded = 0;
        for id in hot {
            let cost = self.expansion_cost(id);
            if self.dict_bytes + cost > budget {
                break;
            }
            self.expand(id);
            self.dict_bytes += cost;
            expanded += 1;
        }
        expanded
    }

    /// Preorder emission: a node precedes its children and children come
    /// in byte order, so the output is sorted lexicographically.
    fn emit(&self, out: &mut Vec<SymbolFreq>, node: u32, symbol: &mut Vec<u8>) {
        if node != ROOT {
            out.push((symbol.clone(), self.nodes[node as usize].freq + 1));
        }
        for (&byte, &child) in &self.nodes[node as usize].children {
            symbol.push(byte);
            self.emit(out, child, symbol);
            symbol.pop();
        }
    }
}

impl Default for AlmSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolSelector for AlmSelector {
    fn select_symbols(
        &mut self,
        keys: &[Vec<u8>],
        dict_size_budget: i64,
    ) -> Result<Vec<SymbolFreq>, OrdpackError> {
        if !has_two_distinct_keys(keys) {
            return Err(OrdpackError::InsufficientCorpus);
        }

        self.reset();
        let mut prev_predicted = u64::MAX;

        for round in 0..MAX_GROW_ROUNDS {
            let emitted = self.count_pass(keys);
            let predicted = self.predicted_bits(emitted);
            if predicted >= prev_predicted {
                break;
            }
            prev_predicted = predicted;

            let expanded = self.expand_hot_leaves(emitted, dict_size_budget);
            log::debug!(
                "alm round {}: {} symbols, predicted {} bits, {} expansions",
                round,
                self.nodes.len() - 1,
                predicted,
                expanded
            );
            if expanded == 0 {
                break;
            }
        }

        /* frequencies must describe the final trie, not the one the last
         * round was counted against */
        self.count_pass(keys);

        let mut out = Vec::with_capacity(self.nodes.len() - 1);
        let mut symbol = Vec::with_capacity(MAX_SYMBOL_LEN);
        self.emit(&mut out, ROOT, &mut symbol);
        Ok(out)
    }
}
