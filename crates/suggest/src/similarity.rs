use crate::vector::FeatureVector;

/// Cosine similarity of two sparse vectors.
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine(a: &FeatureVector, b: &FeatureVector) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f64 = small.iter().map(|(k, v)| v * large.get(k)).sum();

    let norm_a = a.norm();
    let norm_b = b.norm();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Centroid after adding `incoming` as member number `count`.
///
/// Computes `(current[k] * (count - 1) + incoming[k]) / count` over the union
/// of keys, so after `n` updates the centroid is the exact arithmetic mean of
/// all `n` members. Always returns a fresh vector.
pub fn running_mean(current: &FeatureVector, incoming: &FeatureVector, count: usize) -> FeatureVector {
    if count == 0 {
        return current.clone();
    }
    let n = count as f64;
    let prev = (count - 1) as f64;

    let mut out = FeatureVector::new();
    for key in current.keys().chain(incoming.keys()) {
        if out.contains_key(key) {
            continue;
        }
        out.insert(key.clone(), (current.get(key) * prev + incoming.get(key)) / n);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(&str, f64)]) -> FeatureVector {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn self_similarity_is_one() {
        let v = vector(&[("a", 0.3), ("b", 0.7), ("c", 1.9)]);
        assert!((cosine(&v, &v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_vector_similarity_is_zero() {
        let v = vector(&[("a", 1.0)]);
        let zero = FeatureVector::new();
        assert_eq!(cosine(&v, &zero), 0.0);
        assert_eq!(cosine(&zero, &v), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
    }

    #[test]
    fn disjoint_vectors_are_orthogonal() {
        let a = vector(&[("a", 1.0)]);
        let b = vector(&[("b", 1.0)]);
        assert_eq!(cosine(&a, &b), 0.0);
    }

    #[test]
    fn cosine_is_symmetric() {
        let a = vector(&[("a", 1.0), ("b", 2.0)]);
        let b = vector(&[("b", 1.0), ("c", 3.0), ("d", 0.5)]);
        assert_eq!(cosine(&a, &b), cosine(&b, &a));
    }

    #[test]
    fn running_mean_is_exact_mean() {
        let members = [
            vector(&[("a", 1.0)]),
            vector(&[("a", 0.5), ("b", 0.5)]),
            vector(&[("c", 3.0)]),
        ];
        let mut centroid = members[0].clone();
        for (i, m) in members.iter().enumerate().skip(1) {
            centroid = running_mean(&centroid, m, i + 1);
        }
        assert!((centroid.get("a") - 0.5).abs() < 1e-12);
        assert!((centroid.get("b") - 0.5 / 3.0).abs() < 1e-12);
        assert!((centroid.get("c") - 1.0).abs() < 1e-12);
        assert_eq!(centroid.len(), 3);
    }

    #[test]
    fn first_member_mean_is_itself() {
        let v = vector(&[("a", 0.25)]);
        assert_eq!(running_mean(&FeatureVector::new(), &v, 1), v);
    }
}
