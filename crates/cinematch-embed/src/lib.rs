//! Sentence embeddings with candle.
//!
//! [`BertEmbedder`] runs a BERT-family sentence encoder (all-MiniLM-L6-v2 by
//! default) with masked mean pooling and L2 normalization. [`FakeEmbedder`]
//! hashes tokens into a vector of the same size and is selected with
//! `APP_USE_FAKE_EMBEDDINGS=1` for tests and development.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use cinematch_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::{encode_batch, load_tokenizer, EncodedBatch};

/// Dimension of all-MiniLM-L6-v2; the fake embedder matches it.
pub const DEFAULT_DIM: usize = 384;

/// Texts per forward pass unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and the weights from `model_dir`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading sentence encoder");
        let config = read_bert_config(model_dir)?;
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len.min(config.max_position_embeddings))?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        let name = model_dir.file_name().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let dim = config.hidden_size;
        info!(dim, "sentence encoder ready");
        Ok(Self { model, tokenizer, device, id: format!("bert:{name}:d{dim}"), dim, max_len, batch_size: DEFAULT_BATCH_SIZE })
    }

    /// Texts per forward pass; `0` is treated as `1`.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = encode_batch(&self.tokenizer, texts.iter().map(String::as_str).collect(), &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?)
    }
}

impl Embedder for BertEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
        }
        debug!(n = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Deterministic bag-of-hashed-tokens embedder. Identical texts map to
/// identical unit vectors; texts sharing tokens land close together.
pub struct FakeEmbedder { dim: usize, id: String }

impl FakeEmbedder {
    /// A `dim` of zero is raised to one.
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:d{dim}") }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// The embedder for this process: the fake one when requested, otherwise the
/// BERT model found in `model_dir`, running `batch_size` texts per pass.
pub fn load_embedder(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        info!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(DEFAULT_DIM)));
    }
    if !model_dir.exists() {
        return Err(anyhow!("embedding model directory {} does not exist", model_dir.display()));
    }
    Ok(Box::new(BertEmbedder::load(model_dir, max_len)?.with_batch_size(batch_size)))
}

pub fn read_bert_config(model_dir: &Path) -> Result<BertConfig> {
    let path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Weights from `model.safetensors`, falling back to `pytorch_model.bin`.
pub fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let tensors: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let bin = model_dir.join("pytorch_model.bin");
        if !bin.exists() {
            return Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()));
        }
        candle_core::pickle::read_all(&bin)?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
}
