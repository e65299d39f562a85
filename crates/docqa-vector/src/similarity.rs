/// Cosine similarity in `[-1, 1]`.
///
/// A zero-magnitude vector is maximally dissimilar to everything, so it scores
/// -1 rather than dividing by zero. Non-finite results also score -1.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return -1.0;
    }
    let score = dot / denom;
    if !score.is_finite() {
        return -1.0;
    }
    score.clamp(-1.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::cosine_similarity;

    #[test]
    fn identical_opposite_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-3.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 5.0]).abs() < 1e-6);
    }

    #[test]
    fn zero_magnitude_is_maximally_dissimilar() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), -1.0);
    }

    #[test]
    fn non_finite_scores_low() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), -1.0);
    }
}
