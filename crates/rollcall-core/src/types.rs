use serde::{Deserialize, Serialize};

/// Default cosine similarity a probe must reach to count as the same person.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.40;

/// Bounding box for a detected face, in source image pixels, with optional landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl BoundingBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection-over-union with another box; 0.0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_w = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let inter_h = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter = inter_w * inter_h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Face feature vector (512-dimensional for ArcFace w600k_r50).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Cosine similarity in [-1, 1]. Zero-length or zero-norm vectors score 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let (dot, norm_a, norm_b) = self
            .values
            .iter()
            .zip(other.values.iter())
            .fold((0.0f32, 0.0f32, 0.0f32), |(d, na, nb), (a, b)| {
                (d + a * b, na + a * a, nb + b * b)
            });

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }
}

/// Decides whether two embeddings belong to the same person.
pub trait MatchPredicate {
    fn is_match(&self, enrolled: &Embedding, probe: &Embedding) -> bool;
}

/// Accepts a pair when cosine similarity reaches `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct CosineThreshold {
    pub threshold: f32,
}

impl CosineThreshold {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for CosineThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl MatchPredicate for CosineThreshold {
    fn is_match(&self, enrolled: &Embedding, probe: &Embedding) -> bool {
        enrolled.similarity(probe) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: 1.0, landmarks: None }
    }

    #[test]
    fn test_cosine_similarity_identical() {
        let a = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&a.clone()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_cosine_threshold_accepts_above_rejects_below() {
        let predicate = CosineThreshold::new(0.5);
        let enrolled = Embedding::new(vec![1.0, 0.0]);
        let above = Embedding::new(vec![0.6, 0.8]);
        let below = Embedding::new(vec![0.4, 0.9]);
        assert!(predicate.is_match(&enrolled, &above));
        assert!(!predicate.is_match(&enrolled, &below));
    }

    #[test]
    fn test_cosine_threshold_identical_always_matches() {
        let predicate = CosineThreshold::new(0.99);
        let a = Embedding::new(vec![0.2, 0.3, 0.9]);
        assert!(predicate.is_match(&a, &a.clone()));
    }

    #[test]
    fn test_default_threshold() {
        assert_eq!(CosineThreshold::default().threshold, DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_iou_identical() {
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 10.0, 10.0);
        assert!(a.iou(&b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_partial() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 10.0, 10.0);
        // 50 overlap over 150 union
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
    }
}
