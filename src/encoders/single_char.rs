use crate::bitpack::{byte_len, worst_case_bytes, BitPacker};
use crate::code_assign::synthesised_tail_code;
use crate::encoders::{alloc_out_buffer, range_common_prefix, select_and_assign};
#[cfg(feature = "decode")]
use crate::sbt::Sbt;
use crate::{Code, Encoder, EncoderKind, OrdpackError, SymbolCode, NUM_SINGLE_CHAR};

/// Fixed-arity encoder over single bytes: a dense 256-entry code table
/// indexed directly by each key byte.
pub struct SingleCharEncoder {
    dict: Box<[Code]>,
    max_code_len: u8,
    #[cfg(feature = "decode")]
    decode_dict: Option<Sbt>,
}

impl SingleCharEncoder {
    pub fn new() -> Self {
        Self {
            dict: Vec::new().into_boxed_slice(),
            max_code_len: 0,
            #[cfg(feature = "decode")]
            decode_dict: None,
        }
    }

    fn build_dict(&mut self, symbol_codes: &[SymbolCode]) -> Result<(), OrdpackError> {
        debug_assert!(!symbol_codes.is_empty() && symbol_codes.len() <= NUM_SINGLE_CHAR);

        let mut dict = Vec::with_capacity(NUM_SINGLE_CHAR);
        dict.extend(symbol_codes.iter().map(|(_, code)| *code));

        let max_code_len = dict.iter().map(|code| code.len).max().unwrap();
        let tail = synthesised_tail_code(*dict.last().unwrap(), max_code_len);
        dict.resize(NUM_SINGLE_CHAR, tail);

        #[cfg(feature = "decode")]
        {
            let real: Vec<Code> = symbol_codes.iter().map(|(_, code)| *code).collect();
            self.decode_dict = Some(Sbt::new(&real));
        }

        self.dict = dict.into_boxed_slice();
        self.max_code_len = max_code_len;
        Ok(())
    }

    #[inline(always)]
    fn push_key(&self, packer: &mut BitPacker, key: &[u8]) {
        for &b in key {
            packer.push(self.dict[b as usize]);
        }
    }
}

impl Default for SingleCharEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for SingleCharEncoder {
    fn build(&mut self, keys: &[Vec<u8>], dict_size_budget: i64) -> Result<(), OrdpackError> {
        let symbol_codes = select_and_assign(EncoderKind::SingleChar, keys, dict_size_budget)?;
        self.build_dict(&symbol_codes)
    }

    fn encode(&self, key: &[u8], out: &mut [u8]) -> usize {
        let mut packer = BitPacker::new(out);
        self.push_key(&mut packer, key);
        packer.finish()
    }

    fn encode_pair(
        &self,
        l: &[u8],
        r: &[u8],
        l_out: &mut [u8],
        r_out: &mut [u8],
    ) -> (usize, usize) {
        let mut l_packer = BitPacker::new(l_out);
        let mut fork = None;

        for (pos, &b) in l.iter().enumerate() {
            if fork.is_none() && b < r[pos] {
                r_out[..l_packer.filled_bytes()].copy_from_slice(l_packer.filled());
                fork = Some((l_packer.state(), pos));
            }
            l_packer.push(self.dict[b as usize]);
        }

        let (state, r_pos) = fork.unwrap_or_else(|| {
            r_out[..l_packer.filled_bytes()].copy_from_slice(l_packer.filled());
            (l_packer.state(), l.len())
        });
        let l_bits = l_packer.finish();

        let mut r_packer = BitPacker::resume(r_out, state);
        self.push_key(&mut r_packer, &r[r_pos..]);
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
        let end = start + batch;
        let prefix_len = range_common_prefix(keys, start, end);

        let mut scratch =
            alloc_out_buffer(worst_case_bytes(prefix_len, self.max_code_len as usize));
        let mut packer = BitPacker::new(&mut scratch);
        self.push_key(&mut packer, &keys[start][..prefix_len]);
        let state = packer.state();
        let _ = packer.finish();

        let mut total_bits = 0u64;
        for key in &keys[start..end] {
            let mut out = alloc_out_buffer(self.max_encoded_bytes(key.len()));
            out[..state.filled_bytes()].copy_from_slice(&scratch[..state.filled_bytes()]);
            let mut packer = BitPacker::resume(&mut out, state);
            self.push_key(&mut packer, &key[prefix_len..]);
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
            out[len] = symbol as u8;
            len += 1;
            pos = next;
        }
        Some(len)
    }

    fn num_entries(&self) -> usize {
        NUM_SINGLE_CHAR
    }

    fn memory_use(&self) -> usize {
        let dict = NUM_SINGLE_CHAR * std::mem::size_of::<Code>();
        #[cfg(feature = "decode")]
        {
            dict + self.decode_dict.as_ref().map_or(0, |sbt| sbt.memory())
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
