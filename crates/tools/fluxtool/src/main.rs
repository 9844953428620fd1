use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use flux::{
    Category, DEFAULT_CONTOUR_THRESHOLDS, FieldSession, GrowthStage, Resolution, SceneConfig,
    contours, daily_light_integral, ppfd_for_dli,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod heatmap;

#[derive(Parser)]
#[command(name = "fluxtool")]
#[command(about = "Analyze grow-light layouts from scene files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Metrics, coverage and issues for a growth stage
    Analyze {
        /// Scene file (TOML)
        scene: PathBuf,

        /// Override the scene's stage: clone, seedling, vegetative or flowering
        #[arg(short, long)]
        stage: Option<String>,

        /// Field grid as COLSxROWS, e.g. 32x32
        #[arg(short, long)]
        resolution: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Volumetric classification summary
    Voxels {
        scene: PathBuf,

        /// List the brightest N voxels
        #[arg(short, long, default_value_t = 10)]
        top: usize,

        #[arg(long)]
        json: bool,
    },
    /// Cells where the canopy field crosses intensity thresholds
    Contours {
        scene: PathBuf,

        /// Comma separated thresholds in µmol/m²/s
        #[arg(short, long, value_delimiter = ',')]
        thresholds: Vec<f32>,

        #[arg(long)]
        json: bool,
    },
    /// Daily light integral from PPFD, or the PPFD needed for a DLI
    Dli {
        /// Average PPFD in µmol/m²/s
        #[arg(long, conflicts_with = "dli", required_unless_present = "dli")]
        ppfd: Option<f32>,

        /// Target DLI in mol/m²/day
        #[arg(long)]
        dli: Option<f32>,

        /// Photoperiod in hours
        #[arg(long, default_value_t = flux::DEFAULT_PHOTOPERIOD_HOURS)]
        hours: f32,
    },
    /// Export the canopy field as a PNG heatmap
    Heatmap {
        scene: PathBuf,

        /// Output image path
        #[arg(short, long, default_value = "heatmap.png")]
        output: PathBuf,

        /// Pixels per grid node
        #[arg(long, default_value_t = 16)]
        scale: u32,

        /// Intensity mapped to white; defaults to the field peak
        #[arg(long)]
        max: Option<f32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            scene,
            stage,
            resolution,
            json,
        } => analyze(&scene, stage.as_deref(), resolution.as_deref(), json),
        Commands::Voxels { scene, top, json } => voxels(&scene, top, json),
        Commands::Contours {
            scene,
            thresholds,
            json,
        } => contour_report(&scene, &thresholds, json),
        Commands::Dli { ppfd, dli, hours } => {
            dli_report(ppfd, dli, hours);
            Ok(())
        }
        Commands::Heatmap {
            scene,
            output,
            scale,
            max,
        } => export_heatmap(&scene, &output, scale, max),
    }
}

fn load_session(path: &Path) -> Result<FieldSession> {
    let config = SceneConfig::load(path)
        .with_context(|| format!("failed to load scene {}", path.display()))?;
    let session = FieldSession::from_config(&config)
        .with_context(|| format!("invalid scene {}", path.display()))?;
    info!(
        scene = %path.display(),
        lights = session.lights().len(),
        "loaded scene"
    );
    Ok(session)
}

fn parse_resolution(s: &str) -> Result<Resolution> {
    let (cols, rows) = s
        .split_once(['x', 'X'])
        .with_context(|| format!("expected COLSxROWS, got {s:?}"))?;
    let cols: usize = cols.trim().parse().context("bad column count")?;
    let rows: usize = rows.trim().parse().context("bad row count")?;
    if cols == 0 || rows == 0 {
        bail!("resolution must be at least 1x1");
    }
    Ok(Resolution::grid(cols, rows))
}

fn analyze(path: &Path, stage: Option<&str>, resolution: Option<&str>, json: bool) -> Result<()> {
    let mut session = load_session(path)?;
    if let Some(name) = stage {
        session.set_stage(GrowthStage::from_name(name)?.target());
    }
    if let Some(res) = resolution {
        session.set_field_resolution(parse_resolution(res)?);
    }

    let report = session.analysis();
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let target = session.stage();
    let m = report.metrics;
    println!(
        "stage       {} ({:.0}-{:.0} µmol/m²/s, {} h)",
        report.stage, target.min_ppfd, target.max_ppfd, target.photoperiod_hours
    );
    println!("average     {:.1}", m.average);
    println!("min / max   {:.1} / {:.1}", m.min, m.max);
    println!("uniformity  {:.2}", m.uniformity);
    println!("DLI         {:.1} mol/m²/day", report.dli);
    println!(
        "coverage    {:.0}% below, {:.0}% within, {:.0}% above",
        report.coverage.below, report.coverage.within, report.coverage.above
    );
    if report.issues.is_empty() {
        println!("no issues");
    }
    for issue in &report.issues {
        println!("[{:?}] {}", issue.kind, issue.message);
        println!("    {}", issue.suggestion);
    }
    Ok(())
}

fn voxels(path: &Path, top: usize, json: bool) -> Result<()> {
    let mut session = load_session(path)?;
    let voxels = session.voxels();

    if json {
        let shown = &voxels[..top.min(voxels.len())];
        println!("{}", serde_json::to_string_pretty(shown)?);
        return Ok(());
    }

    let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
    for v in voxels.iter() {
        *counts.entry(v.category).or_default() += 1;
    }
    let res = session.voxel_resolution();
    println!(
        "{} voxels ({}x{}x{})",
        voxels.len(),
        res.cols,
        res.rows,
        res.layers
    );
    for category in Category::ALL.iter().rev() {
        let n = counts.get(category).copied().unwrap_or(0);
        println!("  {:<9} >= {:>6.0}  {n}", category.label(), category.lower_bound());
    }
    for v in voxels.iter().take(top) {
        println!(
            "  [{:>2} {:>2} {:>2}] {:>7.1}  {}",
            v.cell[0],
            v.cell[1],
            v.cell[2],
            v.intensity,
            v.category.label()
        );
    }
    Ok(())
}

fn contour_report(path: &Path, thresholds: &[f32], json: bool) -> Result<()> {
    let mut session = load_session(path)?;
    let field = session.field();
    let thresholds = if thresholds.is_empty() {
        &DEFAULT_CONTOUR_THRESHOLDS[..]
    } else {
        thresholds
    };
    let cells = contours(&field, thresholds);

    if json {
        println!("{}", serde_json::to_string_pretty(&cells)?);
        return Ok(());
    }
    for t in thresholds {
        let n = cells.iter().filter(|c| c.threshold == *t).count();
        println!("{t:>7.0}  {n} cells");
    }
    Ok(())
}

fn dli_report(ppfd: Option<f32>, dli: Option<f32>, hours: f32) {
    match (ppfd, dli) {
        (Some(ppfd), _) => println!(
            "{:.2} mol/m²/day at {ppfd} µmol/m²/s over {hours} h",
            daily_light_integral(ppfd, hours)
        ),
        (None, Some(dli)) => println!(
            "{:.1} µmol/m²/s needed for {dli} mol/m²/day over {hours} h",
            ppfd_for_dli(dli, hours)
        ),
        (None, None) => {}
    }
}

fn export_heatmap(path: &Path, output: &Path, scale: u32, max: Option<f32>) -> Result<()> {
    let mut session = load_session(path)?;
    let field = session.field();
    if field.is_empty() {
        bail!("scene has an empty field; check the volume dimensions");
    }
    let img = heatmap::render(&field, scale, max)?;
    img.save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        output = %output.display(),
        width = img.width(),
        height = img.height(),
        "wrote heatmap"
    );
    println!("wrote {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("32x16").unwrap(), Resolution::grid(32, 16));
        assert_eq!(parse_resolution(" 8 X 8 ").unwrap(), Resolution::grid(8, 8));
        assert!(parse_resolution("8").is_err());
        assert!(parse_resolution("0x4").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["fluxtool", "contours", "scene.toml", "-t", "200,400"]).unwrap();
        match cli.command {
            Commands::Contours { thresholds, .. } => assert_eq!(thresholds, vec![200.0, 400.0]),
            _ => panic!("wrong subcommand"),
        }
        assert!(Cli::try_parse_from(["fluxtool", "dli", "--ppfd", "500", "--dli", "20"]).is_err());
        assert!(Cli::try_parse_from(["fluxtool", "dli"]).is_err());
    }
}
