//! Read-only geometry queries consumed by the reconstruction.
//!
//! The reconstruction never builds or parses geometry; it only asks which
//! detector a volume belongs to, how many layers separate two elements,
//! and how much material lies between two points. Implementations must be
//! safe for concurrent read-only queries.

use nalgebra::Vector3;
use std::collections::HashMap;

use crate::rese::{DetectorType, Rese, VolumeId};

/// A material crossed between two interaction points.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material name.
    pub name: String,
    /// Radiation length (cm).
    pub radiation_length: f64,
}

/// One traversed material segment.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPath {
    /// The traversed material.
    pub material: Material,
    /// Geometric path length inside it (cm).
    pub length: f64,
}

/// A named tracking detector exposed by the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorInfo {
    /// Detector name as referenced by the configuration.
    pub name: String,
    /// Detector technology.
    pub detector_type: DetectorType,
}

/// Geometry queries used by the tracking stages.
///
/// Sign convention: `layer_distance(a, b)` is positive when `b` sits
/// deeper in the instrument than `a`, negative when above, and `None`
/// when the two elements are not in the same tracking subsystem.
pub trait TrackerGeometry: Send + Sync {
    /// Signed number of layers between two elements, `None` across
    /// tracking subsystems.
    fn layer_distance(&self, a: &Rese, b: &Rese) -> Option<i32>;

    /// True when both elements sit in the same layer.
    fn same_layer(&self, a: &Rese, b: &Rese) -> bool {
        self.layer_distance(a, b) == Some(0)
    }

    /// True when `a` sits above `b` (closer to the instrument top).
    fn is_above(&self, a: &Rese, b: &Rese) -> bool {
        self.layer_distance(a, b).is_some_and(|d| d > 0)
    }

    /// Materials and path lengths crossed between two points.
    fn path_lengths(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> Vec<MaterialPath>;

    /// Material at a position, if known.
    fn material_at(&self, position: &Vector3<f64>) -> Option<Material>;

    /// The tracking detectors this geometry exposes.
    fn detectors(&self) -> &[DetectorInfo];

    /// Index into [`TrackerGeometry::detectors`] for a volume, `None` for
    /// volumes outside every tracking detector.
    fn detector_of(&self, volume: VolumeId) -> Option<usize>;

    /// Total traversed material between two points, in radiation lengths.
    fn path_in_radiation_lengths(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> f64 {
        self.path_lengths(from, to)
            .iter()
            .filter(|p| p.material.radiation_length > 0.0)
            .map(|p| p.length / p.material.radiation_length)
            .sum()
    }
}

/// Planar-stack geometry: equally spaced layers perpendicular to z, with
/// the first layer at the top and depth increasing downward.
///
/// Volumes are registered explicitly; unregistered volumes belong to no
/// tracking detector. The space between points is assumed to be filled
/// with one homogeneous material.
#[derive(Debug, Clone)]
pub struct LayeredGeometry {
    z_top: f64,
    layer_spacing: f64,
    detectors: Vec<DetectorInfo>,
    volumes: HashMap<VolumeId, usize>,
    material: Material,
}

impl LayeredGeometry {
    /// Creates a stack with the top layer at `z_top` and the given layer
    /// spacing (cm), pre-populated with one silicon strip detector named
    /// `tracker`.
    pub fn new(z_top: f64, layer_spacing: f64) -> Self {
        Self {
            z_top,
            layer_spacing,
            detectors: vec![DetectorInfo {
                name: "tracker".to_string(),
                detector_type: DetectorType::Strip2D,
            }],
            volumes: HashMap::new(),
            material: Material {
                name: "silicon".to_string(),
                radiation_length: 9.37,
            },
        }
    }

    /// Adds a detector and returns its index.
    pub fn add_detector(&mut self, info: DetectorInfo) -> usize {
        self.detectors.push(info);
        self.detectors.len() - 1
    }

    /// Assigns a volume to a detector.
    pub fn register_volume(&mut self, volume: VolumeId, detector: usize) {
        self.volumes.insert(volume, detector);
    }

    /// Sets the homogeneous inter-layer material.
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    /// Layer index of a depth coordinate, 0 at the top.
    pub fn layer_index(&self, z: f64) -> i32 {
        let value = (self.z_top - z) / self.layer_spacing;
        // round-half-away-from-zero keeps hits centered on a layer stable
        value.round() as i32
    }
}

impl TrackerGeometry for LayeredGeometry {
    fn layer_distance(&self, a: &Rese, b: &Rese) -> Option<i32> {
        let da = self.detector_of(a.volume)?;
        let db = self.detector_of(b.volume)?;
        if da != db {
            return None;
        }
        Some(self.layer_index(b.position.z) - self.layer_index(a.position.z))
    }

    fn path_lengths(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> Vec<MaterialPath> {
        vec![MaterialPath {
            material: self.material.clone(),
            length: (to - from).norm(),
        }]
    }

    fn material_at(&self, _position: &Vector3<f64>) -> Option<Material> {
        Some(self.material.clone())
    }

    fn detectors(&self) -> &[DetectorInfo] {
        &self.detectors
    }

    fn detector_of(&self, volume: VolumeId) -> Option<usize> {
        self.volumes.get(&volume).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rese::{Hit, ReseId};
    use approx::assert_relative_eq;

    fn rese_at(id: u32, z: f64, volume: u32) -> Rese {
        Rese::from_hit(
            ReseId(id),
            Hit::new(Vector3::new(0.0, 0.0, z), 100.0).with_volume(VolumeId(volume)),
        )
    }

    fn geometry() -> LayeredGeometry {
        let mut geo = LayeredGeometry::new(0.0, 1.0);
        geo.register_volume(VolumeId(1), 0);
        geo.register_volume(VolumeId(2), 0);
        geo
    }

    #[test]
    fn test_layer_distance_sign() {
        let geo = geometry();
        let upper = rese_at(0, 0.0, 1);
        let lower = rese_at(1, -3.0, 1);
        assert_eq!(geo.layer_distance(&upper, &lower), Some(3));
        assert_eq!(geo.layer_distance(&lower, &upper), Some(-3));
        assert!(geo.is_above(&upper, &lower));
        assert!(!geo.is_above(&lower, &upper));
    }

    #[test]
    fn test_same_layer() {
        let geo = geometry();
        let a = rese_at(0, -1.0, 1);
        let b = rese_at(1, -1.2, 2);
        assert!(geo.same_layer(&a, &b));
    }

    #[test]
    fn test_unregistered_volume_is_outside() {
        let geo = geometry();
        let inside = rese_at(0, 0.0, 1);
        let outside = rese_at(1, -1.0, 99);
        assert_eq!(geo.layer_distance(&inside, &outside), None);
        assert_eq!(geo.detector_of(VolumeId(99)), None);
    }

    #[test]
    fn test_radiation_lengths() {
        let geo = geometry();
        let from = Vector3::new(0.0, 0.0, 0.0);
        let to = Vector3::new(0.0, 0.0, -9.37);
        assert_relative_eq!(geo.path_in_radiation_lengths(&from, &to), 1.0);
    }
}
