//! Embedding vector math and the persisted text encoding.
//!
//! Vectors are stored as a bracketed comma-separated decimal literal,
//! e.g. `[0.013,-0.221,0.87]`, the native literal form of the storage
//! layer's vector column.

use ndarray::ArrayView1;

use crate::error::{Error, Result};

/// Encode a vector into its persisted literal form.
pub fn encode_vector(vector: &[f64]) -> String {
    let mut out = String::with_capacity(vector.len() * 12 + 2);
    out.push('[');
    for (i, v) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

/// Decode a persisted vector literal back into a numeric array.
///
/// Accepts optional whitespace after commas. Fails with `MalformedData`
/// on missing brackets or unparseable components.
pub fn decode_vector(stored: &str) -> Result<Vec<f64>> {
    let trimmed = stored.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::MalformedData(format!("vector literal missing brackets: {}", truncate(stored))))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| Error::MalformedData(format!("bad vector component: {:?}", part.trim())))
        })
        .collect()
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= 32 {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(32).collect::<String>())
    }
}

/// Cosine similarity between two equal-length vectors.
///
/// Returns `0.0` when either vector has zero norm.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    a.dot(&b) / (norm_a * norm_b)
}

/// Element-wise mean of a set of equal-length vectors.
///
/// Fails with `EmptyInput` when given zero vectors.
pub fn centroid(vectors: &[Vec<f64>]) -> Result<Vec<f64>> {
    let first = vectors
        .first()
        .ok_or_else(|| Error::EmptyInput("centroid of zero vectors".to_string()))?;

    let dim = first.len();
    let mut sum = vec![0.0f64; dim];
    for vector in vectors {
        if vector.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            });
        }
        for (acc, v) in sum.iter_mut().zip(vector.iter()) {
            *acc += v;
        }
    }

    let n = vectors.len() as f64;
    for acc in sum.iter_mut() {
        *acc /= n;
    }
    Ok(sum)
}
