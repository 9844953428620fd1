//! Interactive session state
//!
//! [`FieldSession`] owns the scene inputs and everything derived from them.
//! Derived data is memoized by [`SimulationKey`]: an edit changes the key and
//! the next read recomputes. Nothing is invalidated eagerly.
//!
//! All mutation happens on the caller's update thread. Hover state is plain
//! last-write-wins.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use glam::Vec3;
use tracing::{debug, trace};

use crate::analysis::{analyze, AnalysisResult, GrowthStage, StageTarget};
use crate::beam::BeamSet;
use crate::classify::{classify_voxels_with, Category, CategoryFilter, ClassifiedVoxel, DEFAULT_VOXEL_RESOLUTION};
use crate::config::SceneConfig;
use crate::error::Result;
use crate::field::{
    compute_field_with, resolve_mount, FieldCache, FieldSample, Memo, Resolution, SimulationKey,
};
use crate::heightfield::DisplacementField;
use crate::light::{LightInstance, LightSource};
use crate::model::FieldModel;
use crate::reveal::RevealAnimator;
use crate::sensor::{compute_field_from_sensors, SensorGrid};
use crate::units::Volume;

/// Voxels visible this frame
#[derive(Debug, Clone)]
pub struct RevealFrame {
    pub voxels: Arc<Vec<ClassifiedVoxel>>,
    pub revealed: usize,
    pub eased_progress: f32,
}

impl RevealFrame {
    /// The revealed prefix of the sorted voxel list
    pub fn visible(&self) -> &[ClassifiedVoxel] {
        &self.voxels[..self.revealed.min(self.voxels.len())]
    }
}

/// Scene inputs, memoized outputs and per-frame view state
#[derive(Debug)]
pub struct FieldSession {
    volume: Volume,
    lights: Vec<LightSource>,
    mounting_height: Option<f32>,
    field_resolution: Resolution,
    voxel_resolution: Resolution,
    model: FieldModel,
    stage: StageTarget,
    sensors: Option<SensorGrid>,
    filter: CategoryFilter,

    fields: FieldCache,
    voxels: Memo<Vec<ClassifiedVoxel>>,
    beams: Memo<BeamSet>,
    displacement: Memo<DisplacementField>,

    reveal: RevealAnimator,
    hover: Option<usize>,
    hover_key: Option<SimulationKey>,
}

impl FieldSession {
    /// Session with default resolutions, model and a vegetative target
    pub fn new(volume: Volume, lights: Vec<LightSource>) -> Self {
        Self {
            volume,
            lights,
            mounting_height: None,
            field_resolution: Resolution::default(),
            voxel_resolution: DEFAULT_VOXEL_RESOLUTION,
            model: FieldModel::default(),
            stage: GrowthStage::Vegetative.target(),
            sensors: None,
            filter: CategoryFilter::all(),
            fields: FieldCache::new(),
            voxels: Memo::new(),
            beams: Memo::new(),
            displacement: Memo::new(),
            reveal: RevealAnimator::default(),
            hover: None,
            hover_key: None,
        }
    }

    pub fn from_config(config: &SceneConfig) -> Result<Self> {
        config.validate()?;
        let mut session = Self::new(config.volume, config.light_sources()?);
        session.mounting_height = config.mounting_height_ft();
        session.field_resolution = config.field_resolution;
        session.voxel_resolution = config.voxel_resolution;
        session.model = config.field_model()?;
        session.stage = config.stage_target()?;
        session.sensors = config.sensors.clone();
        Ok(session)
    }

    // Inputs

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn lights(&self) -> &[LightSource] {
        &self.lights
    }

    pub fn stage(&self) -> &StageTarget {
        &self.stage
    }

    pub fn filter(&self) -> CategoryFilter {
        self.filter
    }

    pub fn voxel_resolution(&self) -> Resolution {
        self.voxel_resolution
    }

    /// Effective light-to-floor distance in feet
    pub fn mount_ft(&self) -> f32 {
        resolve_mount(&self.volume, self.mounting_height)
    }

    /// Size of one voxel cell in feet (Z up)
    pub fn voxel_cell_size(&self) -> Vec3 {
        let dims = self.volume.dimensions_ft();
        let res = self.voxel_resolution;
        Vec3::new(
            dims.x / res.cols.max(1) as f32,
            dims.y / res.rows.max(1) as f32,
            self.mount_ft() / res.layers.max(1) as f32,
        )
    }

    pub fn set_volume(&mut self, volume: Volume) {
        self.volume = volume;
    }

    pub fn set_lights(&mut self, lights: Vec<LightSource>) {
        self.lights = lights;
    }

    /// Light-to-floor distance in feet; `None` hangs lights at the volume top
    pub fn set_mounting_height(&mut self, feet: Option<f32>) {
        self.mounting_height = feet;
    }

    pub fn set_model(&mut self, model: FieldModel) {
        self.model = model;
    }

    pub fn set_stage(&mut self, stage: StageTarget) {
        self.stage = stage;
    }

    pub fn set_field_resolution(&mut self, resolution: Resolution) {
        self.field_resolution = resolution;
    }

    pub fn set_voxel_resolution(&mut self, resolution: Resolution) {
        self.voxel_resolution = resolution;
    }

    /// Switch to a measured field, or back to simulation with `None`
    pub fn set_sensors(&mut self, sensors: Option<SensorGrid>) {
        self.sensors = sensors;
    }

    /// Drag a placement to new normalized coordinates
    ///
    /// Returns false when the light or instance does not exist.
    pub fn move_instance(&mut self, light: usize, instance: usize, x: f32, y: f32) -> bool {
        match self.instance_mut(light, instance) {
            Some(inst) => {
                inst.move_to(x, y);
                true
            }
            None => false,
        }
    }

    pub fn rotate_instance(&mut self, light: usize, instance: usize, degrees: f32) -> bool {
        match self.instance_mut(light, instance) {
            Some(inst) => {
                inst.rotation = degrees;
                true
            }
            None => false,
        }
    }

    fn instance_mut(&mut self, light: usize, instance: usize) -> Option<&mut LightInstance> {
        self.lights
            .get_mut(light)
            .and_then(|l| l.instances_mut().get_mut(instance))
    }

    /// Flip a category in the voxel filter, returning its new state
    pub fn toggle_category(&mut self, category: Category) -> bool {
        self.filter.toggle(category)
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;
    }

    // Keys

    pub fn field_key(&self) -> SimulationKey {
        let key = SimulationKey::new(
            &self.volume,
            &self.lights,
            self.field_resolution,
            self.mounting_height,
            &self.model,
        );
        match &self.sensors {
            Some(grid) => key.with(sensor_hash(grid)),
            None => key,
        }
    }

    pub fn voxel_key(&self) -> SimulationKey {
        SimulationKey::new(
            &self.volume,
            &self.lights,
            self.voxel_resolution,
            self.mounting_height,
            &self.model,
        )
        .with(self.filter.bits() as u64)
    }

    pub fn layout_key(&self) -> SimulationKey {
        SimulationKey::for_layout(&self.volume, &self.lights, self.mounting_height)
    }

    // Outputs

    /// Canopy field, measured when a sensor grid is set, simulated otherwise
    pub fn field(&mut self) -> Arc<FieldSample> {
        let key = self.field_key();
        let Self {
            fields,
            volume,
            lights,
            sensors,
            model,
            field_resolution,
            mounting_height,
            ..
        } = self;
        fields.get_or_compute(key, || match sensors {
            Some(grid) => compute_field_from_sensors(volume, grid, *field_resolution),
            None => compute_field_with(&*model, volume, lights, *field_resolution, *mounting_height),
        })
    }

    /// Metrics, coverage and issues of the current field against the stage
    pub fn analysis(&mut self) -> AnalysisResult {
        let field = self.field();
        analyze(&field, &self.stage)
    }

    /// Classified voxels, brightest first
    pub fn voxels(&mut self) -> Arc<Vec<ClassifiedVoxel>> {
        let key = self.voxel_key();
        let Self {
            voxels,
            volume,
            lights,
            model,
            voxel_resolution,
            mounting_height,
            filter,
            ..
        } = self;
        let out = voxels.get_or_compute(key, || {
            classify_voxels_with(&*model, volume, lights, *voxel_resolution, *mounting_height, filter)
        });

        if self.hover_key != Some(key) {
            if self.hover.is_some() {
                trace!("hover cleared by recompute");
            }
            self.hover = None;
            self.hover_key = Some(key);
        }
        self.reveal.sync(out.len(), key.value());
        out
    }

    pub fn beams(&mut self) -> Arc<BeamSet> {
        let key = self.layout_key();
        let Self {
            beams,
            volume,
            lights,
            mounting_height,
            ..
        } = self;
        beams.get_or_compute(key, || BeamSet::build(volume, lights, *mounting_height))
    }

    /// Normalized 8x8 field for the displaced surface view
    pub fn displacement(&mut self) -> Arc<DisplacementField> {
        let key = SimulationKey::new(
            &self.volume,
            &self.lights,
            DisplacementField::resolution(),
            self.mounting_height,
            &self.model,
        );
        let key = match &self.sensors {
            Some(grid) => key.with(sensor_hash(grid)),
            None => key,
        };
        let Self {
            displacement,
            volume,
            lights,
            sensors,
            model,
            mounting_height,
            ..
        } = self;
        displacement.get_or_compute(key, || match sensors {
            Some(grid) => DisplacementField::from_sample(&compute_field_from_sensors(
                volume,
                grid,
                DisplacementField::resolution(),
            )),
            None => DisplacementField::compute_with(&*model, volume, lights, *mounting_height),
        })
    }

    /// Advance the reveal animation by `dt` seconds
    ///
    /// A changed voxel set restarts the reveal before advancing.
    pub fn tick(&mut self, dt: f32) -> RevealFrame {
        let voxels = self.voxels();
        let revealed = self.reveal.tick(dt);
        RevealFrame {
            voxels,
            revealed,
            eased_progress: self.reveal.eased_progress(),
        }
    }

    pub fn reveal(&self) -> &RevealAnimator {
        &self.reveal
    }

    /// Set the hovered voxel by index into the sorted list
    pub fn hover(&mut self, index: Option<usize>) {
        self.hover = index;
    }

    /// Index of the hovered voxel in the sorted list
    pub fn hover_index(&self) -> Option<usize> {
        self.hover
    }

    /// The hovered voxel, if it is still part of the current list
    pub fn hovered(&mut self) -> Option<ClassifiedVoxel> {
        let voxels = self.voxels();
        self.hover.and_then(|i| voxels.get(i).copied())
    }

    /// Drop every memoized result
    pub fn clear_caches(&mut self) {
        self.fields.clear();
        self.voxels.clear();
        self.beams.clear();
        self.displacement.clear();
        debug!("session caches cleared");
    }
}

fn sensor_hash(grid: &SensorGrid) -> u64 {
    let mut h = DefaultHasher::new();
    grid.rows.hash(&mut h);
    grid.cols.hash(&mut h);
    for v in &grid.values {
        v.to_bits().hash(&mut h);
    }
    h.finish()
}
