//! Flux crate - Photon flux field simulation for grow volumes
//!
//! This crate computes the light intensity (PPFD) field produced by a set of
//! positioned fixtures over a 3D growing volume, derives metrics and advisory
//! diagnostics from it, and prepares render-ready data for the three
//! visualization modes (discrete voxels, displaced heatmap surface, beams).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Scene configuration                     │
//! │  Volume + LightSource set + resolution + mount height    │
//! ├─────────────────────────────────────────────────────────┤
//! │  Radiometric model (model)                               │
//! │  ├── BasicCosineModel - Lambertian falloff              │
//! │  └── EnhancedModel - cosine + smooth beam-edge cutoff   │
//! ├─────────────────────────────────────────────────────────┤
//! │  Field sampling (field, sensor)                          │
//! │  ├── compute_field - superposed light contributions     │
//! │  └── compute_field_from_sensors - IDW reconstruction    │
//! ├──────────────────────────┬──────────────────────────────┤
//! │  Analysis (analysis)     │  Voxels (classify, reveal)    │
//! │  ├── metrics / analyze   │  ├── classify_voxels          │
//! │  ├── daily light integral│  └── RevealAnimator           │
//! │  └── contours            │                               │
//! ├──────────────────────────┴──────────────────────────────┤
//! │  GPU-facing data (heightfield, beam, shading)            │
//! │  ├── DisplacementField - 8x8 normalized texture         │
//! │  ├── BeamSet - per-instance cone transforms             │
//! │  └── CPU reference shaders + GLSL codegen               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All simulation functions are pure: the same inputs always produce the same
//! grid, which is what makes [`FieldCache`] and [`FieldSession`] memoization
//! by [`SimulationKey`] sound.
//!
//! # Example
//!
//! ```rust
//! use flux::{analyze, compute_field, GrowthStage, LightSource, Resolution, Volume};
//!
//! let volume = Volume::feet(4.0, 4.0, 6.0);
//! let light = LightSource::new("panel", 900.0)
//!     .with_reference_height(1.5)
//!     .at(0.5, 0.5);
//!
//! let field = compute_field(&volume, &[light], Resolution::grid(9, 9), Some(1.5));
//! let report = analyze(&field, &GrowthStage::Flowering.target());
//! assert!(report.metrics.max >= report.metrics.min);
//! ```

pub mod analysis;
pub mod beam;
pub mod classify;
pub mod config;
mod error;
pub mod field;
pub mod heightfield;
pub mod light;
pub mod model;
pub mod reveal;
pub mod sensor;
pub mod session;
pub mod shading;
pub mod units;

pub use analysis::{
    analyze, contours, daily_light_integral, metrics, ppfd_for_dli, AnalysisResult, Coverage,
    CrossingCell, GrowthStage, Issue, IssueKind, Metrics, StageTarget,
    DEFAULT_CONTOUR_THRESHOLDS, DEFAULT_PHOTOPERIOD_HOURS,
};
pub use beam::{Beam, BeamSet, ConeMesh};
pub use classify::{
    classify_voxels, classify_voxels_with, Category, CategoryFilter, ClassifiedVoxel,
    DEFAULT_VOXEL_RESOLUTION,
};
pub use config::{LightConfig, ModelConfig, SceneConfig, StageConfig};
pub use error::{Error, Result};
pub use field::{
    compute_field, compute_field_with, FieldCache, FieldSample, Memo, Resolution, SimulationKey,
};
pub use heightfield::{DisplacementField, PlaneMesh, DISPLACEMENT_RESOLUTION};
pub use light::{LightInstance, LightSource, DEFAULT_BEAM_ANGLE};
pub use model::{BasicCosineModel, EnhancedModel, FieldModel, RadiometricModel};
pub use reveal::RevealAnimator;
pub use sensor::{
    compute_field_from_sensors, idw_interpolate, idw_interpolate_with_power, SensorGrid,
    SensorReading, DEFAULT_IDW_POWER,
};
pub use session::{FieldSession, RevealFrame};
pub use shading::{
    heatmap, BeamFalloff, BeamShader, HeatmapSurface, SurfaceShader, DISPLACEMENT_SCALE_UNIFORM,
    HEATMAP_STOPS,
};
pub use units::{to_render_space, UnitSystem, Volume, CM_PER_FOOT};

// Re-export glam for convenience
pub use glam;
