//! Field metrics, growth-stage diagnostics and contour detection
//!
//! Diagnostics are advisory. Problems with a layout come back as [`Issue`]
//! values alongside the metrics; nothing here fails.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::FieldSample;

/// Photoperiod used when none is given, in hours
pub const DEFAULT_PHOTOPERIOD_HOURS: f32 = 18.0;

/// Intensity levels traced by [`contours`] by default
pub const DEFAULT_CONTOUR_THRESHOLDS: [f32; 5] = [200.0, 400.0, 600.0, 900.0, 1200.0];

/// Peak may exceed the stage maximum by this factor before it is a hotspot
const HOTSPOT_FACTOR: f32 = 1.2;

/// min / average below this is reported as uneven coverage
const UNIFORMITY_THRESHOLD: f32 = 0.7;

/// Summary statistics of a field
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub average: f32,
    pub min: f32,
    pub max: f32,
    /// min / average, zero when the average is zero
    pub uniformity: f32,
}

/// Single pass over the field; an empty field gives all zeros
pub fn metrics(sample: &FieldSample) -> Metrics {
    let values = sample.values();
    if values.is_empty() {
        return Metrics::default();
    }

    let mut sum = 0.0f64;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for v in values {
        sum += *v as f64;
        min = min.min(*v);
        max = max.max(*v);
    }

    // Clamp guards float summation drift on uniform fields
    let average = ((sum / values.len() as f64) as f32).clamp(min, max);
    let uniformity = if average > 0.0 {
        (min / average).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Metrics {
        average,
        min,
        max,
        uniformity,
    }
}

/// Target PPFD band and day length for a growth stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTarget {
    pub name: String,
    pub min_ppfd: f32,
    pub max_ppfd: f32,
    #[serde(default = "default_photoperiod")]
    pub photoperiod_hours: f32,
}

fn default_photoperiod() -> f32 {
    DEFAULT_PHOTOPERIOD_HOURS
}

impl StageTarget {
    pub fn new(name: impl Into<String>, min_ppfd: f32, max_ppfd: f32) -> Self {
        Self {
            name: name.into(),
            min_ppfd,
            max_ppfd,
            photoperiod_hours: DEFAULT_PHOTOPERIOD_HOURS,
        }
    }

    /// Set the photoperiod (builder pattern)
    pub fn with_photoperiod(mut self, hours: f32) -> Self {
        self.photoperiod_hours = hours;
        self
    }

    /// DLI range implied by the band and photoperiod
    pub fn dli_range(&self) -> (f32, f32) {
        (
            daily_light_integral(self.min_ppfd, self.photoperiod_hours),
            daily_light_integral(self.max_ppfd, self.photoperiod_hours),
        )
    }
}

/// Preset growth stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthStage {
    Clone,
    Seedling,
    Vegetative,
    Flowering,
}

impl GrowthStage {
    pub const ALL: [GrowthStage; 4] = [
        GrowthStage::Clone,
        GrowthStage::Seedling,
        GrowthStage::Vegetative,
        GrowthStage::Flowering,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GrowthStage::Clone => "clone",
            GrowthStage::Seedling => "seedling",
            GrowthStage::Vegetative => "vegetative",
            GrowthStage::Flowering => "flowering",
        }
    }

    /// Look up a preset by name (case-insensitive, "veg"/"flower" accepted)
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "clone" | "clones" => Ok(GrowthStage::Clone),
            "seedling" | "seedlings" => Ok(GrowthStage::Seedling),
            "vegetative" | "veg" => Ok(GrowthStage::Vegetative),
            "flowering" | "flower" | "bloom" => Ok(GrowthStage::Flowering),
            _ => Err(Error::UnknownStage(name.to_string())),
        }
    }

    pub fn target(&self) -> StageTarget {
        match self {
            GrowthStage::Clone => StageTarget::new("clone", 100.0, 200.0),
            GrowthStage::Seedling => StageTarget::new("seedling", 200.0, 400.0),
            GrowthStage::Vegetative => StageTarget::new("vegetative", 400.0, 600.0),
            GrowthStage::Flowering => {
                StageTarget::new("flowering", 600.0, 900.0).with_photoperiod(12.0)
            }
        }
    }
}

/// What kind of problem an [`Issue`] describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Hotspot,
    Shadow,
    Uniformity,
}

/// An advisory finding with a suggested remedy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub message: String,
    pub suggestion: String,
}

/// Share of samples below, within and above the target band, in percent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub below: f32,
    pub within: f32,
    pub above: f32,
}

impl Coverage {
    fn of(sample: &FieldSample, target: &StageTarget) -> Self {
        let values = sample.values();
        if values.is_empty() {
            return Coverage::default();
        }
        let (mut below, mut above) = (0usize, 0usize);
        for v in values {
            if *v < target.min_ppfd {
                below += 1;
            } else if *v > target.max_ppfd {
                above += 1;
            }
        }
        let within = values.len() - below - above;
        let pct = |n: usize| n as f32 * 100.0 / values.len() as f32;
        Coverage {
            below: pct(below),
            within: pct(within),
            above: pct(above),
        }
    }
}

/// Everything derived from a field for one growth stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub stage: String,
    pub metrics: Metrics,
    pub issues: Vec<Issue>,
    pub coverage: Coverage,
    /// Daily light integral at the average intensity, mol/m²/day
    pub dli: f32,
}

impl AnalysisResult {
    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}

/// Compute metrics, coverage, DLI and issues for a stage target
pub fn analyze(sample: &FieldSample, target: &StageTarget) -> AnalysisResult {
    let m = metrics(sample);
    let mut issues = Vec::new();

    let hotspot_limit = target.max_ppfd * HOTSPOT_FACTOR;
    if m.max > hotspot_limit {
        issues.push(Issue {
            kind: IssueKind::Hotspot,
            message: format!(
                "Peak intensity {:.0} µmol/m²/s exceeds the {} limit of {:.0}",
                m.max, target.name, hotspot_limit
            ),
            suggestion: "Raise the fixtures or dim them to bring the peak down".to_string(),
        });
    }

    if m.min < target.min_ppfd {
        issues.push(Issue {
            kind: IssueKind::Shadow,
            message: format!(
                "Minimum intensity {:.0} µmol/m²/s is below the {} target of {:.0}",
                m.min, target.name, target.min_ppfd
            ),
            suggestion: "Add fixtures or move them toward the dim areas".to_string(),
        });
    }

    if m.average > 0.0 && m.uniformity < UNIFORMITY_THRESHOLD {
        issues.push(Issue {
            kind: IssueKind::Uniformity,
            message: format!(
                "Uniformity {:.2} is below {:.2}",
                m.uniformity, UNIFORMITY_THRESHOLD
            ),
            suggestion: "Spread fixtures more evenly or raise them so beams overlap".to_string(),
        });
    }

    AnalysisResult {
        stage: target.name.clone(),
        metrics: m,
        issues,
        coverage: Coverage::of(sample, target),
        dli: daily_light_integral(m.average, target.photoperiod_hours),
    }
}

/// Daily light integral in mol/m²/day
pub fn daily_light_integral(average_ppfd: f32, photoperiod_hours: f32) -> f32 {
    average_ppfd * photoperiod_hours * 3600.0 / 1_000_000.0
}

/// PPFD needed to reach `dli` over `photoperiod_hours`
///
/// A zero or negative photoperiod gives zero.
pub fn ppfd_for_dli(dli: f32, photoperiod_hours: f32) -> f32 {
    if photoperiod_hours <= 0.0 {
        return 0.0;
    }
    dli * 1_000_000.0 / (photoperiod_hours * 3600.0)
}

/// A grid cell whose corners straddle a threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrossingCell {
    pub threshold: f32,
    pub row: usize,
    pub col: usize,
}

/// Crossing cells of the first layer for each threshold
///
/// A simplified marching-squares edge detector: each 2x2 neighborhood whose
/// corners do not all fall on the same side of a threshold is reported, keyed
/// by its top-left corner. No polylines are traced.
pub fn contours(sample: &FieldSample, thresholds: &[f32]) -> Vec<CrossingCell> {
    contours_in_layer(sample, 0, thresholds)
}

/// [`contours`] for an arbitrary layer of a volumetric sample
pub fn contours_in_layer(sample: &FieldSample, layer: usize, thresholds: &[f32]) -> Vec<CrossingCell> {
    let values = sample.layer(layer);
    let (rows, cols) = (sample.rows(), sample.cols());
    let mut cells = Vec::new();
    if values.is_empty() || rows < 2 || cols < 2 {
        return cells;
    }

    for &threshold in thresholds {
        for row in 0..rows - 1 {
            for col in 0..cols - 1 {
                let corners = [
                    values[row * cols + col],
                    values[row * cols + col + 1],
                    values[(row + 1) * cols + col],
                    values[(row + 1) * cols + col + 1],
                ];
                let above = corners.iter().filter(|v| **v >= threshold).count();
                if above != 0 && above != corners.len() {
                    cells.push(CrossingCell {
                        threshold,
                        row,
                        col,
                    });
                }
            }
        }
    }
    cells
}
