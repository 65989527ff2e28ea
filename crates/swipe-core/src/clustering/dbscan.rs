//! DBSCAN over post embeddings.
//!
//! Neighborhoods are inclusive (`distance <= epsilon`) and contain the point
//! itself, so a point is a core point when at least `min_points` points,
//! itself included, lie within `epsilon`.
//!
//! The pairwise distance matrix makes a run O(n²) in time and memory. That is
//! fine for catalogs in the low thousands; larger catalogs need a spatial
//! index for the region query, keeping the same boundary and tie-breaking
//! rules.

use crate::config::ClusteringConfig;
use crate::error::EngineError;
use crate::vector;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, instrument};

/// What happens to points that end a run as noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseHandling {
    /// Gather all noise points into one "outliers" pseudo-cluster.
    #[default]
    SeparateCluster,
    /// Leave noise points out of the cluster list.
    Drop,
}

/// Id of the pseudo-cluster holding noise points.
pub const OUTLIER_CLUSTER_ID: &str = "outliers";

/// Per-point state during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    Undefined,
    Noise,
    Cluster(usize),
}

/// One cluster found by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCluster {
    pub id: String,
    /// Mean of the normalized member vectors, renormalized.
    pub centroid: Vec<f32>,
    pub member_ids: Vec<String>,
    /// Indices into the input slices.
    pub member_indices: Vec<usize>,
    /// `size / (π·ε²)`.
    pub density: f32,
    /// Mean cosine similarity between members and the centroid.
    pub cohesion: f32,
    pub is_outlier: bool,
}

impl RawCluster {
    pub fn size(&self) -> usize {
        self.member_ids.len()
    }
}

/// Output of a clustering run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusteringResult {
    pub clusters: Vec<RawCluster>,
    /// Points left as noise, reported regardless of [`NoiseHandling`].
    pub noise_ids: Vec<String>,
    /// Final label of every input point, in input order.
    pub labels: Vec<PointLabel>,
}

impl ClusteringResult {
    /// Clusters excluding the outlier pseudo-cluster.
    pub fn dense_clusters(&self) -> impl Iterator<Item = &RawCluster> {
        self.clusters.iter().filter(|c| !c.is_outlier)
    }
}

/// Density-based clustering engine.
#[derive(Debug, Clone)]
pub struct DbscanClustering {
    config: ClusteringConfig,
}

impl DbscanClustering {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Clusters `embeddings`, labelling clusters `dbscan-0`, `dbscan-1`, ...
    /// in discovery order.
    ///
    /// Empty input yields an empty result. Returns `InvalidInput` when the
    /// id and embedding counts differ and `DimensionMismatch` when vectors
    /// disagree on dimension.
    #[instrument(skip_all, fields(points = embeddings.len()))]
    pub fn cluster(
        &self,
        entity_ids: &[String],
        embeddings: &[Vec<f32>],
    ) -> Result<ClusteringResult, EngineError> {
        if entity_ids.len() != embeddings.len() {
            return Err(EngineError::InvalidInput(format!(
                "{} entity ids but {} embeddings",
                entity_ids.len(),
                embeddings.len()
            )));
        }
        if embeddings.is_empty() {
            return Ok(ClusteringResult::default());
        }

        let points: Vec<Vec<f32>> = embeddings.iter().map(|e| vector::normalize_l2(e)).collect();
        let distances = self.distance_matrix(&points)?;
        let labels = self.assign_labels(&distances);

        let cluster_count = labels
            .iter()
            .filter_map(|l| match l {
                PointLabel::Cluster(c) => Some(*c + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        let mut members: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
        let mut noise: Vec<usize> = Vec::new();
        for (i, label) in labels.iter().enumerate() {
            match label {
                PointLabel::Cluster(c) => members[*c].push(i),
                _ => noise.push(i),
            }
        }

        let mut clusters = Vec::with_capacity(cluster_count + 1);
        for (c, indices) in members.into_iter().enumerate() {
            clusters.push(self.summarize(format!("dbscan-{}", c), indices, entity_ids, &points, false)?);
        }
        if self.config.noise_handling == NoiseHandling::SeparateCluster && !noise.is_empty() {
            clusters.push(self.summarize(
                OUTLIER_CLUSTER_ID.to_string(),
                noise.clone(),
                entity_ids,
                &points,
                true,
            )?);
        }

        debug!(
            clusters = cluster_count,
            noise = noise.len(),
            "Clustering finished"
        );

        Ok(ClusteringResult {
            clusters,
            noise_ids: noise.iter().map(|&i| entity_ids[i].clone()).collect(),
            labels,
        })
    }

    fn distance_matrix(&self, points: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, EngineError> {
        let n = points.len();
        let mut matrix = vec![vec![0.0f32; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = vector::distance(&points[i], &points[j], self.config.distance)?;
                matrix[i][j] = d;
                matrix[j][i] = d;
            }
        }
        Ok(matrix)
    }

    /// Indices within `epsilon` of `i`, including `i`, in index order.
    fn region_query(&self, distances: &[Vec<f32>], i: usize) -> Vec<usize> {
        distances[i]
            .iter()
            .enumerate()
            .filter(|(_, d)| **d <= self.config.epsilon)
            .map(|(j, _)| j)
            .collect()
    }

    fn assign_labels(&self, distances: &[Vec<f32>]) -> Vec<PointLabel> {
        let n = distances.len();
        let mut labels = vec![PointLabel::Undefined; n];
        let mut next_cluster = 0;

        for i in 0..n {
            if labels[i] != PointLabel::Undefined {
                continue;
            }
            let neighbors = self.region_query(distances, i);
            if neighbors.len() < self.config.min_points {
                // Provisional; may become a border point of a later cluster
                labels[i] = PointLabel::Noise;
                continue;
            }

            let cluster = next_cluster;
            next_cluster += 1;
            labels[i] = PointLabel::Cluster(cluster);

            let mut queue: VecDeque<usize> = neighbors.into_iter().filter(|&j| j != i).collect();
            while let Some(j) = queue.pop_front() {
                match labels[j] {
                    PointLabel::Cluster(_) => {}
                    PointLabel::Noise => labels[j] = PointLabel::Cluster(cluster),
                    PointLabel::Undefined => {
                        labels[j] = PointLabel::Cluster(cluster);
                        let reachable = self.region_query(distances, j);
                        if reachable.len() >= self.config.min_points {
                            queue.extend(reachable);
                        }
                    }
                }
            }
        }
        labels
    }

    fn summarize(
        &self,
        id: String,
        indices: Vec<usize>,
        entity_ids: &[String],
        points: &[Vec<f32>],
        is_outlier: bool,
    ) -> Result<RawCluster, EngineError> {
        let member_vectors: Vec<&[f32]> = indices.iter().map(|&i| points[i].as_slice()).collect();
        let centroid = vector::normalize_l2(&vector::mean(&member_vectors)?);

        let mut cohesion = 0.0;
        for v in &member_vectors {
            cohesion += vector::cosine_similarity(v, &centroid)?;
        }
        cohesion /= member_vectors.len().max(1) as f32;

        let area = std::f32::consts::PI * self.config.epsilon * self.config.epsilon;
        Ok(RawCluster {
            id,
            centroid,
            member_ids: indices.iter().map(|&i| entity_ids[i].clone()).collect(),
            density: indices.len() as f32 / area,
            member_indices: indices,
            cohesion,
            is_outlier,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::DistanceKind;
    use std::collections::BTreeSet;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("p{}", i)).collect()
    }

    fn engine(epsilon: f32, min_points: usize, noise_handling: NoiseHandling) -> DbscanClustering {
        DbscanClustering::new(ClusteringConfig {
            epsilon,
            min_points,
            noise_handling,
            ..Default::default()
        })
    }

    /// Five points tightly packed around the x axis, five around the y axis.
    fn two_groups() -> Vec<Vec<f32>> {
        let mut points = Vec::new();
        for i in 0..5 {
            points.push(vec![1.0, 0.02 * i as f32, 0.0]);
        }
        for i in 0..5 {
            points.push(vec![0.02 * i as f32, 1.0, 0.0]);
        }
        points
    }

    fn partition(result: &ClusteringResult) -> BTreeSet<BTreeSet<String>> {
        result
            .dense_clusters()
            .map(|c| c.member_ids.iter().cloned().collect())
            .collect()
    }

    #[test]
    fn test_two_tight_groups_give_two_clusters() {
        let result = engine(0.3, 5, NoiseHandling::Drop)
            .cluster(&ids(10), &two_groups())
            .unwrap();

        assert_eq!(result.clusters.len(), 2);
        assert!(result.noise_ids.is_empty());
        for cluster in &result.clusters {
            assert_eq!(cluster.size(), 5);
        }
    }

    #[test]
    fn test_reruns_give_same_partition() {
        let engine = engine(0.3, 5, NoiseHandling::Drop);
        let first = engine.cluster(&ids(10), &two_groups()).unwrap();
        let second = engine.cluster(&ids(10), &two_groups()).unwrap();
        assert_eq!(partition(&first), partition(&second));
    }

    #[test]
    fn test_min_points_boundary() {
        // Four points in a tight group: with itself, each has exactly 4 neighbors
        let points = vec![
            vec![1.0, 0.0],
            vec![1.0, 0.01],
            vec![1.0, 0.02],
            vec![1.0, 0.03],
        ];
        let noise = engine(0.3, 5, NoiseHandling::Drop)
            .cluster(&ids(4), &points)
            .unwrap();
        assert!(noise.clusters.is_empty());
        assert_eq!(noise.noise_ids.len(), 4);
        assert!(noise.labels.iter().all(|l| *l == PointLabel::Noise));

        let clustered = engine(0.3, 4, NoiseHandling::Drop)
            .cluster(&ids(4), &points)
            .unwrap();
        assert_eq!(clustered.clusters.len(), 1);
        assert!(clustered.noise_ids.is_empty());
    }

    #[test]
    fn test_noise_is_reclaimed_as_border_point() {
        // Unit vectors at the given angles. Cosine distance 0.3 is roughly 45°.
        // p0 only reaches p1, so it is visited first and marked noise, then
        // reclaimed when p1's cluster expands.
        let points: Vec<Vec<f32>> = [0.0f32, 40.0, 80.0, 82.0, 75.0]
            .iter()
            .map(|deg| {
                let rad = deg.to_radians();
                vec![rad.cos(), rad.sin()]
            })
            .collect();
        let engine = DbscanClustering::new(ClusteringConfig {
            epsilon: 0.3,
            min_points: 3,
            distance: DistanceKind::Cosine,
            noise_handling: NoiseHandling::Drop,
            ..Default::default()
        });
        let result = engine.cluster(&ids(5), &points).unwrap();
        assert_eq!(result.clusters.len(), 1);
        assert_eq!(result.clusters[0].size(), 5);
        assert!(result.noise_ids.is_empty());
        assert_eq!(result.labels[0], PointLabel::Cluster(0));
    }

    #[test]
    fn test_outliers_pseudo_cluster() {
        let mut points = two_groups();
        points.push(vec![0.0, 0.0, 1.0]);
        let result = engine(0.3, 5, NoiseHandling::SeparateCluster)
            .cluster(&ids(11), &points)
            .unwrap();

        assert_eq!(result.noise_ids, vec!["p10".to_string()]);
        let outliers = result.clusters.iter().find(|c| c.is_outlier).unwrap();
        assert_eq!(outliers.id, OUTLIER_CLUSTER_ID);
        assert_eq!(outliers.member_ids, vec!["p10".to_string()]);
        assert_eq!(result.dense_clusters().count(), 2);
    }

    #[test]
    fn test_cluster_summary() {
        let result = engine(0.3, 5, NoiseHandling::Drop)
            .cluster(&ids(10), &two_groups())
            .unwrap();
        let cluster = &result.clusters[0];
        assert_eq!(cluster.id, "dbscan-0");
        assert!((vector::l2_norm(&cluster.centroid) - 1.0).abs() < 1e-5);
        let expected_density = 5.0 / (std::f32::consts::PI * 0.09);
        assert!((cluster.density - expected_density).abs() < 1e-3);
        assert!(cluster.cohesion > 0.99);
    }

    #[test]
    fn test_empty_input() {
        let result = engine(0.3, 5, NoiseHandling::Drop).cluster(&[], &[]).unwrap();
        assert!(result.clusters.is_empty());
        assert!(result.noise_ids.is_empty());
    }

    #[test]
    fn test_length_mismatch_is_invalid_input() {
        let err = engine(0.3, 5, NoiseHandling::Drop)
            .cluster(&ids(2), &[vec![1.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = engine(0.3, 1, NoiseHandling::Drop)
            .cluster(&ids(2), &[vec![1.0, 0.0], vec![1.0, 0.0, 0.0]])
            .unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));
    }
}
