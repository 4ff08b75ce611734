//! Maximal Marginal Relevance reranking.
//!
//! MMR = λ × sim(query, doc) - (1 - λ) × max(sim(doc, selected))
//!
//! λ = 1.0 is pure relevance, λ = 0.0 pure diversity.

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = magnitude(a);
    let norm_b = magnitude(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Greedily pick up to `k` candidate positions (indices into `candidates`).
///
/// The first pick is always the candidate most similar to the query.
pub fn maximal_marginal_relevance(
    query: &[f32],
    candidates: &[&[f32]],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let k = k.min(candidates.len());
    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query, c))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k);
    // max similarity of each candidate to anything already selected
    let mut redundancy = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k {
        let mut best_idx = None;
        let mut best_score = f32::NEG_INFINITY;

        for idx in 0..candidates.len() {
            if selected.contains(&idx) {
                continue;
            }
            let score = if selected.is_empty() {
                relevance[idx]
            } else {
                lambda_mult * relevance[idx] - (1.0 - lambda_mult) * redundancy[idx]
            };
            if best_idx.is_none() || score > best_score {
                best_score = score;
                best_idx = Some(idx);
            }
        }

        let Some(best) = best_idx else { break };
        selected.push(best);

        for idx in 0..candidates.len() {
            let sim = cosine_similarity(candidates[idx], candidates[best]);
            if sim > redundancy[idx] {
                redundancy[idx] = sim;
            }
        }
    }

    selected
}
