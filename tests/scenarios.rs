use ordpack::bitpack::byte_len;
use ordpack::{new_encoder, Encoder, EncoderKind, OrdpackError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALL_KINDS: [EncoderKind; 3] = [
    EncoderKind::SingleChar,
    EncoderKind::DoubleChar,
    EncoderKind::Alm,
];

fn keys(strs: &[&str]) -> Vec<Vec<u8>> {
    strs.iter().map(|s| s.as_bytes().to_vec()).collect()
}

fn build(kind: EncoderKind, keys: &[Vec<u8>], budget: i64) -> Box<dyn Encoder> {
    let mut enc = new_encoder(kind);
    enc.build(keys, budget).unwrap();
    enc
}

fn encode_key(enc: &dyn Encoder, key: &[u8]) -> (Vec<u8>, usize) {
    let mut out = vec![0u8; enc.max_encoded_bytes(key.len())];
    let bits = enc.encode(key, &mut out);
    out.truncate(byte_len(bits));
    (out, bits)
}

#[cfg(feature = "decode")]
fn assert_round_trip(enc: &dyn Encoder, key: &[u8]) {
    let (enc_bytes, bits) = encode_key(enc, key);
    let mut decoded = vec![0u8; key.len() + 2];
    let len = enc.decode(&enc_bytes, bits, &mut decoded).unwrap();
    assert_eq!(&decoded[..len], key);
}

fn assert_sorted_corpus_order(enc: &dyn Encoder, keys: &[Vec<u8>]) {
    let mut prev: Option<Vec<u8>> = None;
    for key in keys {
        let (enc_bytes, _) = encode_key(enc, key);
        if let Some(prev) = prev {
            assert!(prev < enc_bytes, "order lost at key {:?}", key);
        }
        prev = Some(enc_bytes);
    }
}

/// 10k synthetic addresses: realistic lengths, shared domains, dense
/// shared prefixes after sorting.
fn email_corpus() -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let domains = ["example.com", "mail.net", "web.org", "post.io"];
    let mut keys: Vec<Vec<u8>> = (0..10_000)
        .map(|_| {
            let name_len = rng.gen_range(3..12);
            let name: String = (0..name_len)
                .map(|_| (b'a' + rng.gen_range(0..26)) as char)
                .collect();
            let number = rng.gen_range(0u32..1000);
            let domain = domains[rng.gen_range(0..domains.len())];
            format!("{}{}@{}", name, number, domain).into_bytes()
        })
        .collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Tiny shared-prefix corpus under the double-char encoder.
#[test]
fn shared_prefix_corpus_double_char() {
    let corpus = keys(&["aaaa", "aaab", "aaac"]);
    let enc = build(EncoderKind::DoubleChar, &corpus, 1000);

    assert_sorted_corpus_order(&*enc, &corpus);
    #[cfg(feature = "decode")]
    for key in &corpus {
        assert_round_trip(&*enc, key);
    }

    /* the common "aa" prefix is packed once, and the batch output still
     * matches key-at-a-time encoding */
    let mut enc_keys = Vec::new();
    let total = enc.encode_batch(&corpus, 0, 3, Some(&mut enc_keys));
    let individual: Vec<(Vec<u8>, usize)> =
        corpus.iter().map(|k| encode_key(&*enc, k)).collect();
    assert_eq!(
        total,
        individual.iter().map(|(_, b)| *b as u64).sum::<u64>()
    );
    for (batch, (one, _)) in enc_keys.iter().zip(&individual) {
        assert_eq!(batch, one);
    }
}

/// A sorted email-like corpus keeps byte order under every variant.
#[test]
fn email_corpus_keeps_order() {
    let corpus = email_corpus();
    for kind in ALL_KINDS {
        let enc = build(kind, &corpus, 1 << 16);
        assert_sorted_corpus_order(&*enc, &corpus);
    }
}

#[cfg(feature = "decode")]
#[test]
fn email_corpus_round_trips() {
    let corpus = email_corpus();
    for kind in ALL_KINDS {
        let enc = build(kind, &corpus, 1 << 16);
        for key in corpus.iter().step_by(7) {
            assert_round_trip(&*enc, key);
        }
    }
}

/// Cumulative big-endian u64 keys under the single-char encoder: lots of
/// leading zero bytes and dense low bytes.
#[test]
fn big_endian_integers_single_char() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut value = 1u64;
    let corpus: Vec<Vec<u8>> = (0..10_000)
        .map(|_| {
            value += rng.gen_range(1..=2_000_000);
            value.to_be_bytes().to_vec()
        })
        .collect();

    let enc = build(EncoderKind::SingleChar, &corpus, 1000);
    assert_sorted_corpus_order(&*enc, &corpus);
    #[cfg(feature = "decode")]
    for key in corpus.iter().step_by(11) {
        assert_round_trip(&*enc, key);
    }
}

/// A probe key between two sampled keys encodes between them.
#[test]
fn between_key_probe_orders_correctly() {
    let corpus = keys(&["a", "a\x7f", "b"]);
    for kind in ALL_KINDS {
        let enc = build(kind, &corpus, 1000);
        let (enc_a, _) = encode_key(&*enc, b"a");
        let (enc_probe, _) = encode_key(&*enc, b"a\x01");
        let (enc_b, _) = encode_key(&*enc, b"b");
        assert!(enc_a < enc_probe, "{:?}", kind);
        assert!(enc_probe < enc_b, "{:?}", kind);
    }
}

/// A sample with a single distinct key cannot cover a dictionary and
/// must be rejected.
#[test]
fn identical_keys_fail_to_build() {
    let corpus = vec![b"hello".to_vec(); 5];
    let mut enc = new_encoder(EncoderKind::DoubleChar);
    assert_eq!(
        enc.build(&corpus, 1000).unwrap_err(),
        OrdpackError::InsufficientCorpus
    );
}

/// Pair encoding of adjacent keys shares the packed prefix and still
/// equals the independent encodings.
#[test]
fn pair_encoding_shares_prefix() {
    let corpus = keys(&["abc", "abd", "abe", "xyz"]);
    for kind in ALL_KINDS {
        let enc = build(kind, &corpus, 1000);
        let (l, r) = (b"abc".as_slice(), b"abd".as_slice());
        let mut l_out = vec![0u8; enc.max_encoded_bytes(l.len())];
        let mut r_out = vec![0u8; enc.max_encoded_bytes(r.len())];
        let (l_bits, r_bits) = enc.encode_pair(l, r, &mut l_out, &mut r_out);

        let (l_one, l_one_bits) = encode_key(&*enc, l);
        let (r_one, r_one_bits) = encode_key(&*enc, r);
        assert_eq!(l_bits, l_one_bits);
        assert_eq!(r_bits, r_one_bits);
        assert_eq!(&l_out[..byte_len(l_bits)], &l_one[..]);
        assert_eq!(&r_out[..byte_len(r_bits)], &r_one[..]);

        #[cfg(feature = "decode")]
        {
            let mut decoded = vec![0u8; 8];
            let len = enc.decode(&l_out[..byte_len(l_bits)], l_bits, &mut decoded).unwrap();
            assert_eq!(&decoded[..len], l);
            let len = enc.decode(&r_out[..byte_len(r_bits)], r_bits, &mut decoded).unwrap();
            assert_eq!(&decoded[..len], r);
        }
    }
}

/// A frozen dictionary is a pure read structure: many threads encoding
/// against it must agree with the single-threaded result.
#[test]
fn frozen_dictionary_shared_across_readers() {
    use rayon::prelude::*;

    let corpus = email_corpus();
    let enc = build(EncoderKind::DoubleChar, &corpus, 1 << 16);

    let serial: Vec<Vec<u8>> = corpus.iter().map(|k| encode_key(&*enc, k).0).collect();
    let parallel: Vec<Vec<u8>> = corpus
        .par_iter()
        .map(|k| encode_key(&*enc, k).0)
        .collect();
    assert_eq!(serial, parallel);
}

/// Decode must reject streams whose bit prefix matches no code.
#[cfg(feature = "decode")]
#[test]
fn truncated_streams_fail_decode() {
    let corpus = email_corpus();
    let enc = build(EncoderKind::DoubleChar, &corpus, 1 << 16);

    let (enc_bytes, bits) = encode_key(&*enc, &corpus[0]);
    let mut out = vec![0u8; corpus[0].len() + 2];
    /* claiming more bits than were produced runs the lookup into the
     * zero padding and eventually off the buffer */
    assert_eq!(enc.decode(&enc_bytes, bits + 64, &mut out), None);
}
