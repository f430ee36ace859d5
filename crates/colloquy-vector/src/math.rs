//! Vector math shared by the embedding backends.

/// L2 norm of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector in place to unit L2 norm. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for val in v {
            *val /= norm;
        }
    }
}

/// Mean-pool token embeddings over the sequence dimension, masked by the
/// attention mask. `data` is a flat `[seq_len, hidden_dim]` slice.
pub fn masked_mean_pool(data: &[f32], attention_mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
        if mask_val > 0 {
            let offset = tok_idx * hidden_dim;
            for dim in 0..hidden_dim {
                pooled[dim] += data[offset + dim];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut pooled {
            *val /= count;
        }
    }

    pooled
}
