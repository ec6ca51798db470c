use anyhow::{anyhow, Result};
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{linear, Linear, Module};
use candle_transformers::models::bert::BertModel;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use cinematch_core::traits::CrossEncoder;
use cinematch_embed::{encode_batch, load_tokenizer, load_weights, read_bert_config, select_device, use_fake_embeddings};

/// BERT sequence classifier with a single relevance logit, as shipped by the
/// ms-marco cross-encoders: encoder, `[CLS]` pooler, linear head.
pub struct BertCrossEncoder {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
}

impl BertCrossEncoder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading cross-encoder");
        let config = read_bert_config(model_dir)?;
        let tokenizer = load_tokenizer(&model_dir.join("tokenizer.json"), max_len.min(config.max_position_embeddings))?;
        let vb = load_weights(model_dir, &device)?;
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = linear(config.hidden_size, config.hidden_size, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(config.hidden_size, 1, vb.pp("classifier"))?;
        Ok(Self { bert, pooler, classifier, tokenizer, device })
    }

    fn logits(&self, query: &str, documents: &[String]) -> Result<Tensor> {
        let pairs: Vec<(&str, &str)> = documents.iter().map(|d| (query, d.as_str())).collect();
        let batch = encode_batch(&self.tokenizer, pairs, &self.device)?;
        let hidden = self.bert.forward(&batch.input_ids, &batch.type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        Ok(self.classifier.forward(&pooled)?.squeeze(1)?)
    }
}

impl CrossEncoder for BertCrossEncoder {
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let scores = relevance(&self.logits(query, documents)?)?;
        debug!(pairs = documents.len(), elapsed_ms = start.elapsed().as_millis() as u64, "scored pairs");
        Ok(scores)
    }
}

/// Squash one logit per pair into a relevance probability in (0, 1).
pub fn relevance(logits: &Tensor) -> Result<Vec<f32>> {
    let probs = candle_nn::ops::sigmoid(&logits.to_dtype(DType::F32)?)?;
    Ok(probs.to_device(&Device::Cpu)?.to_vec1()?)
}

/// Counts query tokens found in each document. Stands in for the model in
/// tests and development, next to the fake embedder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeCrossEncoder;

impl CrossEncoder for FakeCrossEncoder {
    fn score_pairs(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Ok(documents
            .iter()
            .map(|doc| {
                let doc = doc.to_lowercase();
                terms.iter().filter(|t| doc.contains(t.as_str())).count() as f32
            })
            .collect())
    }
}

/// The cross-encoder for this process: the fake one when fake embeddings are
/// requested, otherwise the model found in `model_dir`.
pub fn load_cross_encoder(model_dir: &Path, max_len: usize) -> Result<Box<dyn CrossEncoder>> {
    if use_fake_embeddings() {
        info!("using FakeCrossEncoder");
        return Ok(Box::new(FakeCrossEncoder));
    }
    if !model_dir.exists() {
        return Err(anyhow!("cross-encoder directory {} does not exist", model_dir.display()));
    }
    Ok(Box::new(BertCrossEncoder::load(model_dir, max_len)?))
}
