use ordpack::bitpack::byte_len;
use ordpack::{load_sample_file, new_encoder, Encoder, EncoderKind};
use std::path::PathBuf;
use structopt::StructOpt;

/// Build an order-preserving dictionary from a line-delimited key file and
/// encode the keys against it, reporting sizes and a checksum of the
/// encoded stream. The crc32 is stable across architectures since the
/// packed output is defined byte for byte.
#[derive(StructOpt)]
struct OpencParams {
    input: PathBuf,
    /// Encoder kind: 1 single-char, 2 double-char, 3 variable-length
    #[structopt(short, long, default_value = "2")]
    kind: i64,
    /// Dictionary byte budget (variable-length encoder only)
    #[structopt(short, long, default_value = "65536")]
    budget: i64,
    /// Encode in sorted batches of this size instead of one key at a time
    #[structopt(long)]
    batch: Option<usize>,
}

fn main() {
    env_logger::init();
    let params: OpencParams = OpencParams::from_args();

    let kind = EncoderKind::from_tag(params.kind).expect("kind must be a positive tag");
    let mut keys = load_sample_file(&params.input).unwrap();
    keys.sort_unstable();

    let mut encoder = new_encoder(kind);
    encoder
        .build(&keys, params.budget)
        .expect("dictionary build failed");

    let input_bytes: usize = keys.iter().map(|k| k.len()).sum();
    let mut encoded_bits = 0u64;
    let mut encoded_bytes = 0usize;
    let mut hasher = crc32fast::Hasher::new();

    match params.batch {
        Some(batch) if batch > 1 => {
            let mut enc_keys = Vec::new();
            let mut start = 0;
            while start < keys.len() {
                let n = batch.min(keys.len() - start);
                encoded_bits += encoder.encode_batch(&keys, start, n, Some(&mut enc_keys));
                start += n;
            }
            for enc in &enc_keys {
                hasher.update(enc);
                encoded_bytes += enc.len();
            }
        }
        _ => {
            let max_len = keys.iter().map(|k| k.len()).max().unwrap_or(0);
            let mut out = vec![0u8; encoder.max_encoded_bytes(max_len)];
            for key in &keys {
                let bits = encoder.encode(key, &mut out);
                hasher.update(&out[..byte_len(bits)]);
                encoded_bits += bits as u64;
                encoded_bytes += byte_len(bits);
            }
        }
    }
    println!("keys:          {}", keys.len());
    println!("input bytes:   {}", input_bytes);
    println!("encoded bits:  {}", encoded_bits);
    println!("encoded bytes: {}", encoded_bytes);
    println!(
        "ratio:         {:.3}",
        input_bytes as f64 / encoded_bytes as f64
    );
    println!("dict entries:  {}", encoder.num_entries());
    println!("dict memory:   {}", encoder.memory_use());
    println!("crc32:         {:08x}", hasher.finalize());
}
