use thiserror::Error;

use crate::shared::constants::UNKNOWN_NAME;

#[derive(Error, Debug, PartialEq)]
#[error("gallery has {names} names but {embeddings} embeddings")]
pub struct GalleryMismatch {
    pub names: usize,
    pub embeddings: usize,
}

/// Enrolled identities: parallel name and embedding sequences of equal
/// length. Append-only; the same name may appear with several embeddings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gallery {
    names: Vec<String>,
    embeddings: Vec<Vec<f32>>,
}

/// Closest gallery entry for a probe embedding.
#[derive(Clone, Debug, PartialEq)]
pub struct GalleryMatch<'a> {
    pub name: &'a str,
    pub distance: f64,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        names: Vec<String>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, GalleryMismatch> {
        if names.len() != embeddings.len() {
            return Err(GalleryMismatch {
                names: names.len(),
                embeddings: embeddings.len(),
            });
        }
        Ok(Self { names, embeddings })
    }

    pub fn push(&mut self, name: impl Into<String>, embedding: Vec<f32>) {
        self.names.push(name.into());
        self.embeddings.push(embedding);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// Distinct enrolled names in first-enrollment order.
    pub fn unique_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.names
            .iter()
            .filter(|n| seen.insert(n.as_str()))
            .cloned()
            .collect()
    }

    /// Closest entry whose distance is strictly below `tolerance`.
    ///
    /// Entries with a different dimensionality than the probe are ignored.
    /// Ties keep the earliest enrollment.
    pub fn best_match(&self, probe: &[f32], tolerance: f64) -> Option<GalleryMatch<'_>> {
        self.names
            .iter()
            .zip(&self.embeddings)
            .filter(|(_, e)| e.len() == probe.len())
            .map(|(name, e)| GalleryMatch {
                name: name.as_str(),
                distance: euclidean_distance(probe, e),
            })
            .min_by(|a, b| {
                a.distance
                    .partial_cmp(&b.distance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .filter(|m| m.distance < tolerance)
    }

    /// Name of the best match, or `"Unknown"`.
    pub fn identify(&self, probe: &[f32], tolerance: f64) -> String {
        self.best_match(probe, tolerance)
            .map(|m| m.name.to_string())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = *x as f64 - *y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
