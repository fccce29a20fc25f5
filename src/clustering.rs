//! Grid clustering of observation markers for the map view.

use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Below this many points the map shows raw markers.
pub const MIN_POINTS_TO_CLUSTER: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MapPoint {
    pub id: Uuid,
    #[schema(example = "Eurasian otter")]
    pub species_name: String,
    #[schema(example = 51.5)]
    pub latitude: f64,
    #[schema(example = -0.12)]
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MapCluster {
    /// Mean latitude of the members.
    pub latitude: f64,
    /// Mean longitude of the members.
    pub longitude: f64,
    pub count: usize,
    pub point_ids: Vec<Uuid>,
}

impl MapCluster {
    fn seed(point: &MapPoint) -> Self {
        Self {
            latitude: point.latitude,
            longitude: point.longitude,
            count: 1,
            point_ids: vec![point.id],
        }
    }

    fn absorb(&mut self, point: &MapPoint) {
        self.count += 1;
        let n = self.count as f64;
        self.latitude += (point.latitude - self.latitude) / n;
        self.longitude += (point.longitude - self.longitude) / n;
        self.point_ids.push(point.id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapFeature {
    Point(MapPoint),
    Cluster(MapCluster),
}

/// Smallest accepted cell, about 10 cm at the equator. Cell indexes stay far
/// inside `i64` for any valid coordinate.
pub const MIN_GRID_SIZE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("grid size must be at least {MIN_GRID_SIZE} degrees, got {0}")]
pub struct InvalidGridSize(pub f64);

/// Cell edge length in degrees. Always finite and at least [`MIN_GRID_SIZE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSize(f64);

impl GridSize {
    pub fn new(degrees: f64) -> Result<Self, InvalidGridSize> {
        if degrees.is_finite() && degrees >= MIN_GRID_SIZE {
            Ok(Self(degrees))
        } else {
            Err(InvalidGridSize(degrees))
        }
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }

    fn cell(&self, point: &MapPoint) -> (i64, i64) {
        (
            (point.latitude / self.0).floor() as i64,
            (point.longitude / self.0).floor() as i64,
        )
    }
}

/// Buckets points into `grid`-degree cells, one cluster per occupied cell.
///
/// Returns the points unchanged (`false`) when there are fewer than
/// [`MIN_POINTS_TO_CLUSTER`]. Clusters come out in the order their cell was
/// first seen.
pub fn cluster_points(points: Vec<MapPoint>, grid: GridSize) -> (bool, Vec<MapFeature>) {
    if points.len() < MIN_POINTS_TO_CLUSTER {
        return (false, points.into_iter().map(MapFeature::Point).collect());
    }

    let mut index: HashMap<(i64, i64), usize> = HashMap::new();
    let mut clusters: Vec<MapCluster> = Vec::new();

    for point in &points {
        let cell = grid.cell(point);
        match index.get(&cell) {
            Some(&i) => clusters[i].absorb(point),
            None => {
                index.insert(cell, clusters.len());
                clusters.push(MapCluster::seed(point));
            }
        }
    }

    (true, clusters.into_iter().map(MapFeature::Cluster).collect())
}
