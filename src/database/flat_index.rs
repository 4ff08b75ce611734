use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum IndexError {
    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Index dimension must be greater than zero")]
    ZeroDimension,
}

/// Exhaustive nearest-neighbour index under squared L2 distance.
#[derive(Debug, Clone)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Result<Self, IndexError> {
        if dim == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self { dim, data: Vec::new() })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors; either all are added or none are.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        self.check_all(vectors)?;
        self.data.reserve(vectors.len() * self.dim);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Up to `k` `(position, squared distance)` pairs, nearest first.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        self.check(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self.data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(pos, vector)| (pos, l2_squared(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn reconstruct(&self, pos: usize) -> Option<&[f32]> {
        let start = pos.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    fn check(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn check_all(&self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        vectors.iter().try_for_each(|v| self.check(v))
    }
}

pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_nearest_first() {
        let mut index = FlatL2Index::new(2).unwrap();
        index.add(&[vec![0.0, 0.0], vec![5.0, 5.0], vec![1.0, 1.0]]).unwrap();

        let hits = index.search(&[0.9, 0.9], 2).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![2, 0]);
        assert!((hits[0].1 - 0.02).abs() < 1e-6);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let mut index = FlatL2Index::new(1).unwrap();
        index.add(&[vec![1.0], vec![2.0]]).unwrap();
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 2);
        assert!(index.search(&[0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut index = FlatL2Index::new(1).unwrap();
        index.add(&[vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let hits = index.search(&[0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_wrong_dimensions_atomically() {
        let mut index = FlatL2Index::new(3).unwrap();
        let err = index.add(&[vec![1.0, 2.0, 3.0], vec![1.0]]).unwrap_err();
        assert_eq!(err, IndexError::DimensionMismatch { expected: 3, actual: 1 });
        assert!(index.is_empty());

        assert!(index.search(&[1.0, 2.0], 1).is_err());
        assert_eq!(FlatL2Index::new(0).unwrap_err(), IndexError::ZeroDimension);
    }

    #[test]
    fn reconstruct_returns_stored_vector() {
        let mut index = FlatL2Index::new(2).unwrap();
        index.add(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(index.reconstruct(1), Some(&[3.0, 4.0][..]));
        assert_eq!(index.reconstruct(2), None);
        assert_eq!(index.len(), 2);
    }
}
