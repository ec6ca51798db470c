use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::{EncodeInput, Tokenizer, TruncationParams};

/// A right-padded batch ready for a BERT forward pass. All tensors are [B,T].
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub type_ids: Tensor,
    pub attention_mask: Tensor,
}

/// Load `tokenizer.json` and cap every encoding at `max_len` tokens. Pairs are
/// truncated longest-first so the query side survives.
pub fn load_tokenizer(path: &std::path::Path, max_len: usize) -> Result<Tokenizer> {
    let mut tokenizer = Tokenizer::from_file(path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", path.display(), e))?;
    tokenizer
        .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
        .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Encode single texts or (query, document) pairs and pad to the longest
/// sequence in the batch with id 0.
pub fn encode_batch<'s, E>(tokenizer: &Tokenizer, inputs: Vec<E>, device: &Device) -> Result<EncodedBatch>
where
    E: Into<EncodeInput<'s>>,
{
    let encodings = inputs
        .into_iter()
        .map(|input| tokenizer.encode(input, true).map_err(|e| anyhow!("Tokenization failed: {}", e)))
        .collect::<Result<Vec<_>>>()?;
    let batch = encodings.len();
    let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(batch * seq_len);
    let mut types = Vec::with_capacity(batch * seq_len);
    let mut mask = Vec::with_capacity(batch * seq_len);
    for enc in &encodings {
        let pad = seq_len - enc.get_ids().len();
        ids.extend_from_slice(enc.get_ids());
        ids.extend(std::iter::repeat(0u32).take(pad));
        types.extend_from_slice(enc.get_type_ids());
        types.extend(std::iter::repeat(0u32).take(pad));
        mask.extend_from_slice(enc.get_attention_mask());
        mask.extend(std::iter::repeat(0u32).take(pad));
    }

    Ok(EncodedBatch {
        input_ids: Tensor::from_vec(ids, (batch, seq_len), device)?,
        type_ids: Tensor::from_vec(types, (batch, seq_len), device)?,
        attention_mask: Tensor::from_vec(mask, (batch, seq_len), device)?,
    })
}
