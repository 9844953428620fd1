//! Field reconstruction from manually entered sensor readings
//!
//! Instead of simulating fixtures, a sparse grid of measured PPFD values is
//! spread over the footprint with inverse distance weighting. The result has
//! the same [`FieldSample`] shape as a simulated field.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::field::{axis_node, FieldSample, Resolution};
use crate::units::Volume;

/// Default IDW distance exponent
pub const DEFAULT_IDW_POWER: f32 = 2.0;

/// Distances below this (feet) return the sensor value unchanged
const EXACT_MATCH_EPSILON: f32 = 1e-6;

/// One measured value at a physical position (feet) on the canopy plane
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub x: f32,
    pub y: f32,
    pub value: f32,
}

impl SensorReading {
    pub fn new(x: f32, y: f32, value: f32) -> Self {
        Self { x, y, value }
    }
}

/// Readings taken on an evenly spaced grid across the footprint
///
/// Readings are row-major; rows run along the depth, columns along the width.
/// Edge rows and columns sit on the footprint boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorGrid {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

impl SensorGrid {
    /// Create a grid, checking that the readings fill it exactly
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self> {
        let grid = Self { rows, cols, values };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<()> {
        if self.values.len() != self.rows * self.cols {
            return Err(Error::InvalidSensorGrid(format!(
                "{}x{} grid needs {} readings, got {}",
                self.rows,
                self.cols,
                self.rows * self.cols,
                self.values.len()
            )));
        }
        if let Some(bad) = self.values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(Error::InvalidSensorGrid(format!(
                "reading {bad} is not a non-negative number"
            )));
        }
        Ok(())
    }

    /// Place each reading at its physical position within `volume`
    pub fn readings(&self, volume: &Volume) -> Vec<SensorReading> {
        let dims = volume.dimensions_ft();
        let mut out = Vec::with_capacity(self.values.len());
        for row in 0..self.rows {
            for col in 0..self.cols {
                if let Some(value) = self.values.get(row * self.cols + col) {
                    out.push(SensorReading::new(
                        axis_node(col, self.cols, dims.x),
                        axis_node(row, self.rows, dims.y),
                        *value,
                    ));
                }
            }
        }
        out
    }
}

/// Interpolate at (x, y) with the default power of 2
pub fn idw_interpolate(sensors: &[SensorReading], x: f32, y: f32) -> f32 {
    idw_interpolate_with_power(sensors, x, y, DEFAULT_IDW_POWER)
}

/// Inverse distance weighted value at (x, y)
///
/// Each reading weighs `1 / distance^power`. A point coincident with a sensor
/// returns that sensor's value exactly. No sensors give zero.
pub fn idw_interpolate_with_power(sensors: &[SensorReading], x: f32, y: f32, power: f32) -> f32 {
    let mut weighted = 0.0f64;
    let mut total_weight = 0.0f64;

    for sensor in sensors {
        let dx = sensor.x - x;
        let dy = sensor.y - y;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < EXACT_MATCH_EPSILON {
            return sensor.value;
        }
        let weight = 1.0 / (distance as f64).powf(power as f64);
        weighted += weight * sensor.value as f64;
        total_weight += weight;
    }

    if total_weight > 0.0 {
        (weighted / total_weight) as f32
    } else {
        0.0
    }
}

/// Build a canopy-plane field from a sensor grid
///
/// Sensors describe a single plane, so the result always has one layer
/// whatever `resolution.layers` asks for.
pub fn compute_field_from_sensors(
    volume: &Volume,
    grid: &SensorGrid,
    resolution: Resolution,
) -> FieldSample {
    let plane = Resolution::grid(resolution.cols, resolution.rows);
    if !volume.is_valid() || plane.is_empty() {
        return FieldSample::empty();
    }

    let dims = volume.dimensions_ft();
    let sensors = grid.readings(volume);
    let mut values = Vec::with_capacity(plane.cell_count());
    for row in 0..plane.rows {
        let y = axis_node(row, plane.rows, dims.y);
        for col in 0..plane.cols {
            let x = axis_node(col, plane.cols, dims.x);
            values.push(idw_interpolate(&sensors, x, y));
        }
    }

    debug!(sensors = sensors.len(), cells = values.len(), "reconstructed field from sensors");
    FieldSample::from_values(plane, Vec3::new(dims.x, dims.y, 0.0), values)
}
