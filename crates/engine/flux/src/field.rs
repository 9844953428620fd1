//! Field sampling: the superposed intensity of every fixture over a grid
//!
//! A [`FieldSample`] is never mutated once built. Any change of volume, lights,
//! resolution or model produces a fresh grid, which is what lets callers
//! memoize by [`SimulationKey`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use glam::Vec3;
use serde::Serialize;
use tracing::{debug, trace};

use crate::light::LightSource;
use crate::model::{FieldModel, RadiometricModel};
use crate::units::Volume;

/// Number of samples along each axis
///
/// `cols` runs along the volume width, `rows` along its depth and `layers`
/// vertically. A single layer is a 2D canopy-plane grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
pub struct Resolution {
    pub cols: usize,
    pub rows: usize,
    #[serde(default = "default_layers")]
    pub layers: usize,
}

fn default_layers() -> usize {
    1
}

impl Resolution {
    /// A single-layer grid
    pub fn grid(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            layers: 1,
        }
    }

    /// A volumetric grid
    pub fn volume(cols: usize, rows: usize, layers: usize) -> Self {
        Self { cols, rows, layers }
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.cols * self.rows * self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::grid(10, 10)
    }
}

/// A grid of PPFD values
///
/// Values are stored layer-major, then row-major:
/// `index = (layer * rows + row) * cols + col`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSample {
    cols: usize,
    rows: usize,
    layers: usize,
    /// Physical extent in feet (width, depth, mounting height)
    extent: Vec3,
    /// Height in feet of each layer
    layer_heights: Vec<f32>,
    values: Vec<f32>,
}

impl FieldSample {
    /// A sample with no cells
    pub fn empty() -> Self {
        Self {
            cols: 0,
            rows: 0,
            layers: 0,
            extent: Vec3::ZERO,
            layer_heights: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a sample from raw values
    ///
    /// Returns an empty sample when `values` does not match the resolution.
    pub fn from_values(resolution: Resolution, extent: Vec3, values: Vec<f32>) -> Self {
        if values.len() != resolution.cell_count() || resolution.is_empty() {
            return Self::empty();
        }
        Self {
            cols: resolution.cols,
            rows: resolution.rows,
            layers: resolution.layers,
            extent,
            layer_heights: layer_heights(resolution.layers, extent.z),
            values,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::volume(self.cols, self.rows, self.layers)
    }

    pub fn extent(&self) -> Vec3 {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All values in storage order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at a cell, if in range
    pub fn get(&self, col: usize, row: usize, layer: usize) -> Option<f32> {
        if col >= self.cols || row >= self.rows || layer >= self.layers {
            return None;
        }
        self.values.get((layer * self.rows + row) * self.cols + col).copied()
    }

    /// Values of one layer, row-major
    pub fn layer(&self, layer: usize) -> &[f32] {
        if layer >= self.layers {
            return &[];
        }
        let stride = self.rows * self.cols;
        &self.values[layer * stride..(layer + 1) * stride]
    }

    /// Physical position in feet of a cell's sample point
    pub fn position(&self, col: usize, row: usize, layer: usize) -> Vec3 {
        Vec3::new(
            axis_node(col, self.cols, self.extent.x),
            axis_node(row, self.rows, self.extent.y),
            self.layer_heights.get(layer).copied().unwrap_or(0.0),
        )
    }

    /// Largest value, or zero when empty
    pub fn peak(&self) -> f32 {
        self.values.iter().copied().fold(0.0, f32::max)
    }
}

/// Sample coordinate along one axis: grid nodes with both edges included
///
/// A single sample sits at the centre of the axis.
pub(crate) fn axis_node(index: usize, count: usize, length: f32) -> f32 {
    if count > 1 {
        index as f32 / (count - 1) as f32 * length
    } else {
        length * 0.5
    }
}

fn layer_heights(layers: usize, mount: f32) -> Vec<f32> {
    if layers <= 1 {
        return vec![0.0; layers];
    }
    (0..layers)
        .map(|k| mount * k as f32 / layers as f32)
        .collect()
}

/// Resolve the mounting height, defaulting to the top of the volume
pub(crate) fn resolve_mount(volume: &Volume, mounting_height: Option<f32>) -> f32 {
    mounting_height
        .filter(|h| h.is_finite())
        .unwrap_or_else(|| volume.dimensions_ft().z)
}

/// Every fixture position (feet) paired with its source, mounted at `mount`
pub(crate) fn fixture_positions<'a>(
    volume: &Volume,
    lights: &'a [LightSource],
    mount: f32,
) -> Vec<(&'a LightSource, Vec3)> {
    let dims = volume.dimensions_ft();
    lights
        .iter()
        .flat_map(|light| {
            light
                .instances()
                .iter()
                .map(move |inst| (light, inst.position(dims.x, dims.y, mount)))
        })
        .collect()
}

/// Compute the field with the default (enhanced) model
///
/// `mounting_height` is the light-to-floor distance in feet and defaults to
/// the volume height. Invalid volumes or empty resolutions give an empty
/// sample; no lights give an all-zero one.
pub fn compute_field(
    volume: &Volume,
    lights: &[LightSource],
    resolution: Resolution,
    mounting_height: Option<f32>,
) -> FieldSample {
    compute_field_with(
        &FieldModel::default(),
        volume,
        lights,
        resolution,
        mounting_height,
    )
}

/// Compute the field with an explicit radiometric model
pub fn compute_field_with<M: RadiometricModel>(
    model: &M,
    volume: &Volume,
    lights: &[LightSource],
    resolution: Resolution,
    mounting_height: Option<f32>,
) -> FieldSample {
    if !volume.is_valid() || resolution.is_empty() {
        return FieldSample::empty();
    }

    let dims = volume.dimensions_ft();
    let mount = resolve_mount(volume, mounting_height);
    let extent = Vec3::new(dims.x, dims.y, mount);
    let fixtures = fixture_positions(volume, lights, mount);
    let heights = layer_heights(resolution.layers, mount);

    let mut values = Vec::with_capacity(resolution.cell_count());
    for z in &heights {
        for row in 0..resolution.rows {
            let y = axis_node(row, resolution.rows, dims.y);
            for col in 0..resolution.cols {
                let x = axis_node(col, resolution.cols, dims.x);
                let target = Vec3::new(x, y, *z);
                let total: f32 = fixtures
                    .iter()
                    .map(|(light, source)| {
                        light.quantity() as f32 * model.contribution(light, *source, target)
                    })
                    .sum();
                values.push(total);
            }
        }
    }

    debug!(
        cells = values.len(),
        fixtures = fixtures.len(),
        mount,
        "computed light field"
    );

    FieldSample {
        cols: resolution.cols,
        rows: resolution.rows,
        layers: resolution.layers,
        extent,
        layer_heights: heights,
        values,
    }
}

/// Identity of a simulation's inputs
///
/// Two calls with equal keys produce identical outputs, so a key change is the
/// only cache invalidation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimulationKey(u64);

impl SimulationKey {
    pub fn new(
        volume: &Volume,
        lights: &[LightSource],
        resolution: Resolution,
        mounting_height: Option<f32>,
        model: &FieldModel,
    ) -> Self {
        let mut h = DefaultHasher::new();
        hash_volume(volume, &mut h);
        lights.len().hash(&mut h);
        for light in lights {
            hash_light(light, &mut h);
        }
        resolution.hash(&mut h);
        mounting_height.map(f32::to_bits).hash(&mut h);
        match model {
            FieldModel::Basic(_) => 0u8.hash(&mut h),
            FieldModel::Enhanced(m) => {
                1u8.hash(&mut h);
                m.edge_softness_deg.to_bits().hash(&mut h);
                m.cutoff_exponent.to_bits().hash(&mut h);
            }
        }
        Self(h.finish())
    }

    /// Key for inputs that carry no resolution or model (beam layouts)
    pub fn for_layout(volume: &Volume, lights: &[LightSource], mounting_height: Option<f32>) -> Self {
        let mut h = DefaultHasher::new();
        hash_volume(volume, &mut h);
        for light in lights {
            hash_light(light, &mut h);
        }
        mounting_height.map(f32::to_bits).hash(&mut h);
        Self(h.finish())
    }

    /// Combine with extra discriminating state (e.g. a category filter)
    pub fn with(self, extra: u64) -> Self {
        let mut h = DefaultHasher::new();
        self.0.hash(&mut h);
        extra.hash(&mut h);
        Self(h.finish())
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

fn hash_volume(volume: &Volume, h: &mut DefaultHasher) {
    volume.width.to_bits().hash(h);
    volume.depth.to_bits().hash(h);
    volume.height.to_bits().hash(h);
    volume.unit.hash(h);
}

fn hash_light(light: &LightSource, h: &mut DefaultHasher) {
    light.name().hash(h);
    light.max_intensity().to_bits().hash(h);
    light.beam_angle().to_bits().hash(h);
    light.mounting_height_reference().map(f32::to_bits).hash(h);
    light.quantity().hash(h);
    light.instances().len().hash(h);
    for inst in light.instances() {
        inst.normalized_x().to_bits().hash(h);
        inst.normalized_y().to_bits().hash(h);
        inst.rotation.to_bits().hash(h);
    }
}

/// Single-entry memo keyed by [`SimulationKey`]
///
/// A hit is decided by the 64-bit key alone; the inputs are not kept for
/// comparison. Two layouts whose keys collide would share one entry.
#[derive(Debug)]
pub struct Memo<T> {
    entry: Option<(SimulationKey, Arc<T>)>,
    hits: u64,
    misses: u64,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            entry: None,
            hits: 0,
            misses: 0,
        }
    }
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing it on a miss
    pub fn get_or_compute(&mut self, key: SimulationKey, compute: impl FnOnce() -> T) -> Arc<T> {
        if let Some((cached, value)) = &self.entry {
            if *cached == key {
                self.hits += 1;
                trace!(key = key.value(), "memo hit");
                return Arc::clone(value);
            }
        }
        self.misses += 1;
        let value = Arc::new(compute());
        self.entry = Some((key, Arc::clone(&value)));
        value
    }

    /// Key of the cached entry, if any
    pub fn key(&self) -> Option<SimulationKey> {
        self.entry.as_ref().map(|(k, _)| *k)
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

/// Memo for computed fields
pub type FieldCache = Memo<FieldSample>;

#[cfg(test)]
mod tests {
    use super::*;

    fn centered_light() -> LightSource {
        LightSource::new("center", 800.0).at(0.5, 0.5)
    }

    #[test]
    fn test_empty_for_invalid_volume() {
        let field = compute_field(
            &Volume::feet(0.0, 4.0, 4.0),
            &[centered_light()],
            Resolution::grid(5, 5),
            None,
        );
        assert!(field.is_empty());
        assert_eq!(field.peak(), 0.0);
    }

    #[test]
    fn test_zero_resolution_is_empty() {
        let field = compute_field(&Volume::default(), &[centered_light()], Resolution::grid(0, 5), None);
        assert!(field.is_empty());
    }

    #[test]
    fn test_no_lights_is_all_zero() {
        let field = compute_field(&Volume::default(), &[], Resolution::grid(4, 3), None);
        assert_eq!(field.len(), 12);
        assert!(field.values().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_indexing_and_layers() {
        let field = compute_field(
            &Volume::feet(4.0, 2.0, 6.0),
            &[centered_light()],
            Resolution::volume(3, 2, 4),
            Some(4.0),
        );
        assert_eq!(field.len(), 24);
        assert_eq!(field.layer(1).len(), 6);
        assert!(field.layer(4).is_empty());
        assert!(field.get(3, 0, 0).is_none());
        assert_eq!(field.position(2, 1, 2), Vec3::new(4.0, 2.0, 2.0));
        assert_eq!(field.extent().z, 4.0);
    }

    #[test]
    fn test_higher_layers_are_brighter_under_light() {
        let light = LightSource::new("ref", 500.0).with_reference_height(2.0).at(0.5, 0.5);
        let field = compute_field(
            &Volume::feet(3.0, 3.0, 6.0),
            &[light],
            Resolution::volume(3, 3, 3),
            Some(3.0),
        );
        let floor = field.get(1, 1, 0).unwrap();
        let upper = field.get(1, 1, 2).unwrap();
        assert!(upper > floor);
    }

    #[test]
    fn test_quantity_multiplies() {
        let vol = Volume::default();
        let single = compute_field(&vol, &[centered_light()], Resolution::grid(5, 5), None);
        let double = compute_field(
            &vol,
            &[centered_light().with_quantity(2)],
            Resolution::grid(5, 5),
            None,
        );
        for (a, b) in single.values().iter().zip(double.values()) {
            assert!((a * 2.0 - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_metric_volume_matches_imperial() {
        let imperial = compute_field(&Volume::feet(3.0, 3.0, 3.0), &[centered_light()], Resolution::grid(3, 3), None);
        let metric = compute_field(
            &Volume::centimetres(91.44, 91.44, 91.44),
            &[centered_light()],
            Resolution::grid(3, 3),
            None,
        );
        for (a, b) in imperial.values().iter().zip(metric.values()) {
            assert!((a - b).abs() < 1e-2);
        }
    }

    #[test]
    fn test_from_values_shape_check() {
        let ok = FieldSample::from_values(Resolution::grid(2, 2), Vec3::ONE, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ok.get(1, 1, 0), Some(4.0));
        let bad = FieldSample::from_values(Resolution::grid(2, 2), Vec3::ONE, vec![1.0]);
        assert!(bad.is_empty());
    }

    #[test]
    fn test_key_changes_with_inputs() {
        let vol = Volume::default();
        let mut lights = vec![centered_light()];
        let model = FieldModel::default();
        let a = SimulationKey::new(&vol, &lights, Resolution::grid(5, 5), None, &model);
        let b = SimulationKey::new(&vol, &lights, Resolution::grid(5, 5), None, &model);
        assert_eq!(a, b);

        lights[0].instances_mut()[0].move_to(0.2, 0.2);
        let c = SimulationKey::new(&vol, &lights, Resolution::grid(5, 5), None, &model);
        assert_ne!(a, c);

        let d = SimulationKey::new(&vol, &lights, Resolution::grid(6, 5), None, &model);
        assert_ne!(c, d);
    }

    #[test]
    fn test_nearby_layouts_get_distinct_keys() {
        let vol = Volume::default();
        let model = FieldModel::default();
        let mut seen = std::collections::HashSet::new();
        for i in 0..=100 {
            for j in 0..=100 {
                let lights = vec![LightSource::new("panel", 600.0).at(i as f32 / 100.0, j as f32 / 100.0)];
                let key = SimulationKey::new(&vol, &lights, Resolution::grid(5, 5), None, &model);
                assert!(seen.insert(key.value()), "key reused at ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_memo_hits_and_misses() {
        let mut cache = FieldCache::new();
        let vol = Volume::default();
        let lights = vec![centered_light()];
        let key = SimulationKey::new(&vol, &lights, Resolution::grid(3, 3), None, &FieldModel::default());

        let first = cache.get_or_compute(key, || compute_field(&vol, &lights, Resolution::grid(3, 3), None));
        let second = cache.get_or_compute(key, || panic!("should be cached"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), (1, 1));

        cache.clear();
        assert!(cache.key().is_none());
    }
}
