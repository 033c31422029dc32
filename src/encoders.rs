pub mod alm;
pub mod double_char;
pub mod single_char;

use crate::code_assign::{new_assigner, AssignerKind, CodeAssigner};
use crate::symbol_select::{new_selector, SymbolSelector};
use crate::{EncoderKind, OrdpackError, SymbolCode};
use std::time::Instant;

/// Run the two build stages shared by every variant: symbol selection over
/// the sample, then order-preserving code assignment. The caller turns the
/// resulting list into its dictionary representation.
pub(crate) fn select_and_assign(
    kind: EncoderKind,
    keys: &[Vec<u8>],
    dict_size_budget: i64,
) -> Result<Vec<SymbolCode>, OrdpackError> {
    let start = Instant::now();
    let mut selector = new_selector(kind);
    let symbol_freqs = selector.select_symbols(keys, dict_size_budget)?;
    log::debug!(
        "{:?} selection: {} symbols in {:.3}s",
        kind,
        symbol_freqs.len(),
        start.elapsed().as_secs_f64()
    );

    let start = Instant::now();
    let assigner = new_assigner(AssignerKind::WeightBalanced);
    let symbol_codes = assigner.assign_codes(&symbol_freqs)?;
    log::debug!(
        "{:?} code assignment in {:.3}s",
        kind,
        start.elapsed().as_secs_f64()
    );
    Ok(symbol_codes)
}

/// Common prefix length of a sorted key range, measured against the first
/// key. Comparison runs four bytes at a time before falling back to single
/// bytes.
pub(crate) fn range_common_prefix(keys: &[Vec<u8>], start: usize, end: usize) -> usize {
    let first = &keys[start];
    let mut common = first.len();
    for key in &keys[start + 1..end] {
        common = common.min(common_prefix_len(&first[..common], key));
        if common == 0 {
            break;
        }
    }
    common
}

#[inline]
pub(crate) fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let limit = a.len().min(b.len());
    let mut len = 0;

    while len + 4 <= limit {
        let aw = u32::from_ne_bytes(a[len..len + 4].try_into().unwrap());
        let bw = u32::from_ne_bytes(b[len..len + 4].try_into().unwrap());
        if aw != bw {
            break;
        }
        len += 4;
    }
    while len < limit && a[len] == b[len] {
        len += 1;
    }
    len
}

/// Allocate an output buffer without zeroing it; every byte the caller
/// reads back is covered by packed words.
#[inline]
pub(crate) fn alloc_out_buffer(bytes: usize) -> Box<[u8]> {
    unsafe { nightly_quirks::utils::NightlyUtils::box_new_uninit_slice_assume_init(bytes) }
}
