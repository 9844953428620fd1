//! Voxel sampling and intensity classification
//!
//! The volume between the floor and the fixtures is cut into a regular grid of
//! cells. Each cell centre is evaluated against every fixture, classified into
//! an intensity band and emitted as a render-ready [`ClassifiedVoxel`]. The
//! output is sorted brightest first so a progressive reveal starts with the
//! most significant cells.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::field::{fixture_positions, resolve_mount, Resolution};
use crate::light::LightSource;
use crate::model::{incidence_angle, FieldModel, RadiometricModel};
use crate::units::Volume;

/// Default voxel grid (cols x rows x layers)
pub const DEFAULT_VOXEL_RESOLUTION: Resolution = Resolution {
    cols: 12,
    rows: 12,
    layers: 10,
};

/// Intensity band of a voxel
///
/// Lower bounds are inclusive: exactly 200 is `Seedling`, not `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Low,
    Seedling,
    Veg,
    Flower,
    High,
    Extreme,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Low,
        Category::Seedling,
        Category::Veg,
        Category::Flower,
        Category::High,
        Category::Extreme,
    ];

    /// Band for a PPFD value; anything not at least 200 (including NaN) is `Low`
    pub fn from_intensity(ppfd: f32) -> Self {
        if ppfd >= 1200.0 {
            Category::Extreme
        } else if ppfd >= 900.0 {
            Category::High
        } else if ppfd >= 600.0 {
            Category::Flower
        } else if ppfd >= 400.0 {
            Category::Veg
        } else if ppfd >= 200.0 {
            Category::Seedling
        } else {
            Category::Low
        }
    }

    /// Lower bound of the band in µmol/m²/s
    pub fn lower_bound(&self) -> f32 {
        match self {
            Category::Low => 0.0,
            Category::Seedling => 200.0,
            Category::Veg => 400.0,
            Category::Flower => 600.0,
            Category::High => 900.0,
            Category::Extreme => 1200.0,
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Low => "low",
            Category::Seedling => "seedling",
            Category::Veg => "veg",
            Category::Flower => "flower",
            Category::High => "high",
            Category::Extreme => "extreme",
        }
    }

    /// Linear RGB display color
    pub fn color(&self) -> Vec3 {
        match self {
            Category::Low => Vec3::new(0.15, 0.2, 0.55),
            Category::Seedling => Vec3::new(0.2, 0.55, 0.9),
            Category::Veg => Vec3::new(0.2, 0.8, 0.3),
            Category::Flower => Vec3::new(0.95, 0.85, 0.2),
            Category::High => Vec3::new(1.0, 0.45, 0.1),
            Category::Extreme => Vec3::new(0.95, 0.1, 0.15),
        }
    }

    /// Display opacity; brighter bands are more solid
    pub fn opacity(&self) -> f32 {
        match self {
            Category::Low => 0.08,
            Category::Seedling => 0.18,
            Category::Veg => 0.3,
            Category::Flower => 0.42,
            Category::High => 0.55,
            Category::Extreme => 0.7,
        }
    }
}

/// Which categories are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryFilter {
    active: [bool; 6],
}

impl Default for CategoryFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl CategoryFilter {
    /// Every category active
    pub fn all() -> Self {
        Self { active: [true; 6] }
    }

    /// No category active
    pub fn none() -> Self {
        Self { active: [false; 6] }
    }

    /// Only the listed categories active
    pub fn only(categories: &[Category]) -> Self {
        let mut filter = Self::none();
        for c in categories {
            filter.set(*c, true);
        }
        filter
    }

    pub fn is_active(&self, category: Category) -> bool {
        self.active[category.index()]
    }

    pub fn set(&mut self, category: Category, active: bool) {
        self.active[category.index()] = active;
    }

    /// Flip a category, returning its new state
    pub fn toggle(&mut self, category: Category) -> bool {
        let slot = &mut self.active[category.index()];
        *slot = !*slot;
        *slot
    }

    /// Active set as a bitmask, bit i for `Category::ALL[i]`
    pub fn bits(&self) -> u8 {
        self.active
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, on)| if *on { acc | (1 << i) } else { acc })
    }
}

/// One classified cell of the voxel grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassifiedVoxel {
    /// Cell centre in feet (Z up)
    pub position: Vec3,
    /// Grid index as (col, row, layer)
    pub cell: [usize; 3],
    pub intensity: f32,
    pub color: Vec3,
    pub opacity: f32,
    pub category: Category,
}

/// Classify with the default model, lights mounted at the top of the volume
pub fn classify_voxels(
    volume: &Volume,
    lights: &[LightSource],
    resolution: Resolution,
    filter: &CategoryFilter,
) -> Vec<ClassifiedVoxel> {
    classify_voxels_with(&FieldModel::default(), volume, lights, resolution, None, filter)
}

/// Sample cell centres between the floor and the mounting height
///
/// Voxels in filtered-out categories are dropped, not made transparent. The
/// result is sorted by intensity, highest first.
pub fn classify_voxels_with<M: RadiometricModel>(
    model: &M,
    volume: &Volume,
    lights: &[LightSource],
    resolution: Resolution,
    mounting_height: Option<f32>,
    filter: &CategoryFilter,
) -> Vec<ClassifiedVoxel> {
    if !volume.is_valid() || resolution.is_empty() {
        return Vec::new();
    }

    let dims = volume.dimensions_ft();
    let mount = resolve_mount(volume, mounting_height);
    let fixtures = fixture_positions(volume, lights, mount);
    let cutoffs: Vec<f32> = fixtures
        .iter()
        .map(|(light, _)| model.cutoff_angle(light))
        .collect();

    let mut voxels = Vec::with_capacity(resolution.cell_count());
    for layer in 0..resolution.layers {
        let z = cell_centre(layer, resolution.layers, mount);
        for row in 0..resolution.rows {
            let y = cell_centre(row, resolution.rows, dims.y);
            for col in 0..resolution.cols {
                let x = cell_centre(col, resolution.cols, dims.x);
                let target = Vec3::new(x, y, z);

                let mut intensity = 0.0;
                for ((light, source), cutoff) in fixtures.iter().zip(&cutoffs) {
                    if incidence_angle(*source, target) > *cutoff {
                        continue;
                    }
                    intensity += light.quantity() as f32 * model.contribution(light, *source, target);
                }

                let category = Category::from_intensity(intensity);
                if !filter.is_active(category) {
                    continue;
                }
                voxels.push(ClassifiedVoxel {
                    position: target,
                    cell: [col, row, layer],
                    intensity,
                    color: category.color(),
                    opacity: category.opacity(),
                    category,
                });
            }
        }
    }

    voxels.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    debug!(
        voxels = voxels.len(),
        cells = resolution.cell_count(),
        filter = filter.bits(),
        "classified voxels"
    );
    voxels
}

fn cell_centre(index: usize, count: usize, length: f32) -> f32 {
    (index as f32 + 0.5) / count as f32 * length
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BasicCosineModel;

    #[test]
    fn test_category_boundaries() {
        assert_eq!(Category::from_intensity(199.99), Category::Low);
        assert_eq!(Category::from_intensity(200.0), Category::Seedling);
        assert_eq!(Category::from_intensity(400.0), Category::Veg);
        assert_eq!(Category::from_intensity(600.0), Category::Flower);
        assert_eq!(Category::from_intensity(900.0), Category::High);
        assert_eq!(Category::from_intensity(1200.0), Category::Extreme);
        assert_eq!(Category::from_intensity(f32::NAN), Category::Low);
        assert_eq!(Category::from_intensity(-5.0), Category::Low);
    }

    #[test]
    fn test_lower_bounds_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_intensity(c.lower_bound()), c);
        }
    }

    #[test]
    fn test_filter_toggle() {
        let mut filter = CategoryFilter::all();
        assert_eq!(filter.bits(), 0b11_1111);
        assert!(!filter.toggle(Category::Low));
        assert!(!filter.is_active(Category::Low));
        assert_eq!(filter.bits(), 0b11_1110);
        assert!(filter.toggle(Category::Low));
        assert_eq!(CategoryFilter::only(&[Category::Veg]).bits(), 0b100);
    }

    #[test]
    fn test_sorted_descending() {
        let light = LightSource::new("p", 900.0).at(0.5, 0.5);
        let voxels = classify_voxels(
            &Volume::feet(4.0, 4.0, 4.0),
            &[light],
            Resolution::volume(6, 6, 4),
            &CategoryFilter::all(),
        );
        assert_eq!(voxels.len(), 144);
        assert!(voxels.windows(2).all(|w| w[0].intensity >= w[1].intensity));
    }

    #[test]
    fn test_filtered_categories_are_dropped() {
        let volume = Volume::feet(4.0, 4.0, 4.0);
        let light = LightSource::new("p", 900.0).at(0.5, 0.5);
        let all = classify_voxels(&volume, &[light.clone()], Resolution::volume(5, 5, 5), &CategoryFilter::all());
        let mut filter = CategoryFilter::all();
        filter.set(Category::Low, false);
        let some = classify_voxels(&volume, &[light], Resolution::volume(5, 5, 5), &filter);

        let lows = all.iter().filter(|v| v.category == Category::Low).count();
        assert_eq!(some.len(), all.len() - lows);
        assert!(some.iter().all(|v| v.category != Category::Low));
    }

    #[test]
    fn test_cutoff_skip_matches_full_sum() {
        // A narrow beam: many cells lie past the cutoff
        let light = LightSource::new("spot", 1000.0).with_beam_angle(40.0).at(0.3, 0.6);
        let volume = Volume::feet(5.0, 5.0, 5.0);
        let model = FieldModel::default();
        let voxels = classify_voxels_with(&model, &volume, &[light.clone()], Resolution::volume(5, 5, 3), None, &CategoryFilter::all());
        for v in &voxels {
            let source = Vec3::new(1.5, 3.0, 5.0);
            let full = model.contribution(&light, source, v.position);
            assert!((full - v.intensity).abs() < 1e-4);
        }
    }

    #[test]
    fn test_basic_model_ignores_beam_angle() {
        let narrow = LightSource::new("spot", 500.0).with_beam_angle(10.0).at(0.5, 0.5);
        let wide = LightSource::new("spot", 500.0).with_beam_angle(170.0).at(0.5, 0.5);
        let volume = Volume::feet(3.0, 3.0, 3.0);
        let res = Resolution::volume(3, 3, 2);
        let a = classify_voxels_with(&BasicCosineModel, &volume, &[narrow], res, None, &CategoryFilter::all());
        let b = classify_voxels_with(&BasicCosineModel, &volume, &[wide], res, None, &CategoryFilter::all());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.intensity, y.intensity);
        }
    }

    #[test]
    fn test_invalid_volume_yields_nothing() {
        let light = LightSource::new("p", 900.0).at(0.5, 0.5);
        assert!(classify_voxels(&Volume::feet(-1.0, 2.0, 2.0), &[light], DEFAULT_VOXEL_RESOLUTION, &CategoryFilter::all()).is_empty());
    }
}
