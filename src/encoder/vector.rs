use serde::{Deserialize, Serialize};

/// Fixed-length numeric encoding of one context cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Stable 64-bit hash of the exact bit pattern. Equal vectors give equal digests.
    pub fn digest(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.0.len() as u64).to_le_bytes());
        for value in &self.0 {
            hasher.update(&value.to_bits().to_le_bytes());
        }
        let hash = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_tracks_bits() {
        let a = FeatureVector::new(vec![0.0, 1.0, 0.5]);
        let b = FeatureVector::new(vec![0.0, 1.0, 0.5]);
        let c = FeatureVector::new(vec![0.0, 1.0, 0.50001]);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_ne!(FeatureVector::zeros(2).digest(), FeatureVector::zeros(3).digest());
    }
}
