//! Optional accelerated nearest-neighbor path via `usearch` (HNSW),
//! feature-gated behind `vector-search`. Mirrors the embedder's lazy,
//! fail-cached backend pattern: the index is built once from the current
//! embedding set and marked `ready` only after a successful build; a build
//! failure or a disabled feature leaves every caller on the exact-scan
//! fallback in [`super::Storage::knn`].

#[cfg(feature = "vector-search")]
mod backend {
    use std::sync::RwLock;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    pub struct HnswIndex {
        inner: RwLock<Option<(Index, Vec<String>)>>,
        dimensions: usize,
    }

    impl HnswIndex {
        pub fn new(dimensions: usize) -> Self {
            Self { inner: RwLock::new(None), dimensions }
        }

        pub fn ready(&self) -> bool {
            self.inner.read().map(|g| g.is_some()).unwrap_or(false)
        }

        /// Rebuild the index from a full `(memory_id, unit_vector)` snapshot.
        /// Called by the Consolidator, not on the hot ingestion path.
        pub fn rebuild(&self, items: &[(String, Vec<f32>)]) -> bool {
            let options = IndexOptions {
                dimensions: self.dimensions,
                metric: MetricKind::Cos,
                quantization: ScalarKind::F32,
                ..Default::default()
            };
            let index = match Index::new(&options) {
                Ok(i) => i,
                Err(e) => {
                    tracing::warn!("failed to build HNSW index: {e}");
                    return false;
                }
            };
            if index.reserve(items.len().max(1)).is_err() {
                return false;
            }
            let mut ids = Vec::with_capacity(items.len());
            for (i, (id, vec)) in items.iter().enumerate() {
                if index.add(i as u64, vec).is_err() {
                    tracing::warn!("failed adding memory {id} to HNSW index");
                    continue;
                }
                ids.push(id.clone());
            }
            match self.inner.write() {
                Ok(mut guard) => {
                    *guard = Some((index, ids));
                    true
                }
                Err(_) => false,
            }
        }

        pub fn search(&self, query: &[f32], k: usize) -> Option<Vec<(String, f32)>> {
            let guard = self.inner.read().ok()?;
            let (index, ids) = guard.as_ref()?;
            let matches = index.search(query, k).ok()?;
            Some(
                matches
                    .keys
                    .iter()
                    .zip(matches.distances.iter())
                    .filter_map(|(key, dist)| ids.get(*key as usize).map(|id| (id.clone(), *dist)))
                    .collect(),
            )
        }
    }
}

#[cfg(not(feature = "vector-search"))]
mod backend {
    pub struct HnswIndex {
        _dimensions: usize,
    }

    impl HnswIndex {
        pub fn new(dimensions: usize) -> Self {
            Self { _dimensions: dimensions }
        }

        pub fn ready(&self) -> bool {
            false
        }

        pub fn rebuild(&self, _items: &[(String, Vec<f32>)]) -> bool {
            false
        }

        pub fn search(&self, _query: &[f32], _k: usize) -> Option<Vec<(String, f32)>> {
            None
        }
    }
}

pub use backend::HnswIndex;
