use crate::art::ArtDict;
use crate::bitpack::{byte_len, worst_case_bytes, BitPacker};
use crate::encoders::{alloc_out_buffer, range_common_prefix, select_and_assign};
#[cfg(feature = "decode")]
use crate::sbt::Sbt;
use crate::{Encoder, EncoderKind, OrdpackError, SymbolCode};

/*
 * Variable-length encoder. Symbols are the prefix-closed node set of the
 * selection trie, held in an ART keyed by symbol bytes; each encode step
 * takes the longest trie match of the remaining key. Because the base
 * alphabet covers all 256 single bytes, a step always consumes at least
 * one byte.
 */
pub struct AlmEncoder {
    dict: Option<ArtDict>,
    max_code_len: u8,
    #[cfg(feature = "decode")]
    decode_dict: Option<Sbt>,
    #[cfg(feature = "decode")]
    symbols: Vec<Box<[u8]>>,
}

impl AlmEncoder {
    pub fn new() -> Self {
        Self {
            dict: None,
            max_code_len: 0,
            #[cfg(feature = "decode")]
            decode_dict: None,
            #[cfg(feature = "decode")]
            symbols: Vec::new(),
        }
    }

    fn build_dict(&mut self, symbol_codes: &[SymbolCode]) -> Result<(), OrdpackError> {
        self.max_code_len = symbol_codes
            .iter()
            .map(|(_, code)| code.len)
            .max()
            .ok_or(OrdpackError::InsufficientCorpus)?;

        #[cfg(feature = "decode")]
        {
            let codes: Vec<_> = symbol_codes.iter().map(|(_, code)| *code).collect();
            self.decode_dict = Some(Sbt::new(&codes));
            self.symbols = symbol_codes
                .iter()
                .map(|(symbol, _)| symbol.clone().into_boxed_slice())
                .collect();
        }

        self.dict = Some(ArtDict::build(symbol_codes));
        Ok(())
    }

    #[inline(always)]
    fn dict(&self) -> &ArtDict {
        self.dict.as_ref().expect("encoder is not built")
    }

    #[inline(always)]
    fn push_key(&self, packer: &mut BitPacker, key: &[u8], mut pos: usize) {
        let dict = self.dict();
        while pos < key.len() {
            let (code, consumed, _) = dict.lookup(&key[pos..]);
            packer.push(code);
            pos += consumed;
        }
    }
}

impl Default for AlmEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for AlmEncoder {
    fn build(&mut self, keys: &[Vec<u8>], dict_size_budget: i64) -> Result<(), OrdpackError> {
        let symbol_codes = select_and_assign(EncoderKind::Alm, keys, dict_size_budget)?;
        self.build_dict(&symbol_codes)
    }

    fn encode(&self, key: &[u8], out: &mut [u8]) -> usize {
        let mut packer = BitPacker::new(out);
        self.push_key(&mut packer, key, 0);
        packer.finish()
    }

    fn encode_pair(
        &self,
        l: &[u8],
        r: &[u8],
        l_out: &mut [u8],
        r_out: &mut [u8],
    ) -> (usize, usize) {
        let dict = self.dict();
        let mut l_packer = BitPacker::new(l_out);

        /* shared walk: both parses stay in lockstep until the first symbol
         * where they differ, which for sorted keys is the first position
         * where l's code compares below r's */
        let mut pos = 0;
        let fork = loop {
            if pos >= l.len() {
                break None;
            }
            let (l_code, l_consumed, _) = dict.lookup(&l[pos..]);
            if pos >= r.len() || {
                let (r_code, _, _) = dict.lookup(&r[pos..]);
                l_code != r_code
            } {
                break Some((l_code, l_consumed));
            }
            l_packer.push(l_code);
            pos += l_consumed;
        };

        r_out[..l_packer.filled_bytes()].copy_from_slice(l_packer.filled());
        let state = l_packer.state();
        let r_pos = pos;

        if let Some((l_code, l_consumed)) = fork {
            l_packer.push(l_code);
            self.push_key(&mut l_packer, l, r_pos + l_consumed);
        }
        let l_bits = l_packer.finish();

        let mut r_packer = BitPacker::resume(r_out, state);
        self.push_key(&mut r_packer, r, r_pos);
        let r_bits = r_packer.finish();
        (l_bits, r_bits)
    }

    fn encode_batch(
        &self,
        keys: &[Vec<u8>],
        start: usize,
        batch: usize,
        mut enc_keys: Option<&mut Vec<Vec<u8>>>,
    ) -> u64 {
        let dict = self.dict();
        let end = start + batch;
        let prefix_len = range_common_prefix(keys, start, end);
        let prefix = &keys[start][..prefix_len];

        /* pack prefix symbols while the trie walk finishes strictly inside
         * the prefix; a walk that runs out of prefix bytes with children
         * left could match differently against each full key */
        let mut scratch =
            alloc_out_buffer(worst_case_bytes(prefix_len, self.max_code_len as usize));
        let mut packer = BitPacker::new(&mut scratch);
        let mut shared_pos = 0;
        while shared_pos < prefix_len {
            let (code, consumed, open) = dict.lookup(&prefix[shared_pos..]);
            if open {
                break;
            }
            packer.push(code);
            shared_pos += consumed;
        }
        let state = packer.state();
        let _ = packer.finish();

        let mut total_bits = 0u64;
        for key in &keys[start..end] {
            let mut out = alloc_out_buffer(self.max_encoded_bytes(key.len()));
            out[..state.filled_bytes()].copy_from_slice(&scratch[..state.filled_bytes()]);
            let mut packer = BitPacker::resume(&mut out, state);
            self.push_key(&mut packer, key, shared_pos);
            let bits = packer.finish();
            total_bits += bits as u64;
            if let Some(ref mut enc_keys) = enc_keys {
                let mut enc = out.into_vec();
                enc.truncate(byte_len(bits));
                enc_keys.push(enc);
            }
        }
        total_bits
    }

    #[cfg(feature = "decode")]
    fn decode(&self, enc: &[u8], bit_len: usize, out: &mut [u8]) -> Option<usize> {
        let decode_dict = self.decode_dict.as_ref()?;
        let mut pos = 0;
        let mut len = 0;
        while pos < bit_len {
            let (symbol, next) = decode_dict.lookup(enc, pos)?;
            let bytes = &self.symbols[symbol as usize];
            out[len..len + bytes.len()].copy_from_slice(bytes);
            len += bytes.len();
            pos = next;
        }
        Some(len)
    }

    fn num_entries(&self) -> usize {
        self.dict.as_ref().map_or(0, |dict| dict.num_entries())
    }

    fn memory_use(&self) -> usize {
        let dict = self.dict.as_ref().map_or(0, |dict| dict.memory());
        #[cfg(feature = "decode")]
        {
            dict + self.decode_dict.as_ref().map_or(0, |sbt| sbt.memory())
                + self.symbols.iter().map(|s| s.len()).sum::<usize>()
        }
        #[cfg(not(feature = "decode"))]
        {
            dict
        }
    }

    fn max_encoded_bytes(&self, key_len: usize) -> usize {
        worst_case_bytes(key_len, self.max_code_len as usize)
    }
}
