//! wellgrid CLI: measure assay plates and fit standard curves.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use wellgrid::{GridParams, PlateAnalyzer, PlateLayout, WellKind};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// The CLI works on one plate at a time, so the id is fixed.
const PLATE_ID: wellgrid::PlateId = 1;

#[derive(Parser)]
#[command(name = "wellgrid")]
#[command(
    about = "Measure colorimetric assay plates (well photometry, standard curves, concentrations)"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure every well of a plate photo.
    Analyze(CliAnalyzeArgs),

    /// Print the well-center coordinates of a plate grid.
    Centers(CliCentersArgs),

    /// Fit a standard curve from known concentration/ratio points.
    Fit {
        /// JSON array of {"concentration", "ratio"} points.
        #[arg(long)]
        standards: PathBuf,

        /// Path to write the fitted curve (JSON); stdout summary only when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Convert between well labels and grid positions.
    Label {
        /// Well label such as A1 or H12.
        #[arg(long)]
        position: Option<String>,

        /// Zero-based row index (requires --column).
        #[arg(long)]
        row: Option<usize>,

        /// Zero-based column index (requires --row).
        #[arg(long)]
        column: Option<usize>,
    },

    /// Validate a plate layout document and print a summary.
    LayoutInfo {
        /// Path to the layout document (JSON).
        #[arg(long)]
        layout: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliAnalyzeArgs {
    /// Path to the plate photo.
    #[arg(long)]
    image: PathBuf,

    /// Path to write well measurements (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Plate layout document (JSON). When given, wells are classified and
    /// sample concentrations are resolved against the plate's standards.
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Path to write the fitted calibration (JSON). Requires --layout.
    #[arg(long, requires = "layout")]
    curve_out: Option<PathBuf>,

    #[command(flatten)]
    grid: CliGridArgs,
}

#[derive(Debug, Clone, Args)]
struct CliCentersArgs {
    /// Path to write the centers (JSON); printed to stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,

    #[command(flatten)]
    grid: CliGridArgs,
}

/// Grid geometry arguments; defaults describe a standard 96-well plate
/// photographed at roughly 1300x1000.
#[derive(Debug, Clone, Args)]
struct CliGridArgs {
    /// Number of well rows on the plate.
    #[arg(long, default_value = "8")]
    rows: usize,

    /// Number of well columns on the plate.
    #[arg(long, default_value = "12")]
    columns: usize,

    /// X coordinate of the first column's well centers (pixels).
    #[arg(long, default_value = "100")]
    x_origin: i32,

    /// Y coordinate of the first row's well centers (pixels).
    #[arg(long, default_value = "80")]
    y_origin: i32,

    /// X coordinate of the last column's well centers (pixels).
    #[arg(long, default_value = "1200")]
    x_end: i32,

    /// Y coordinate of the last row's well centers (pixels).
    #[arg(long, default_value = "900")]
    y_end: i32,

    /// Well diameter in pixels.
    #[arg(long, default_value = "85")]
    well_diameter: u32,
}

impl CliGridArgs {
    fn to_params(&self) -> GridParams {
        GridParams {
            rows: self.rows,
            columns: self.columns,
            x_origin: self.x_origin,
            y_origin: self.y_origin,
            x_end: self.x_end,
            y_end: self.y_end,
            well_diameter: self.well_diameter,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => run_analyze(&args),
        Commands::Centers(args) => run_centers(&args),
        Commands::Fit { standards, out } => run_fit(&standards, out.as_deref()),
        Commands::Label {
            position,
            row,
            column,
        } => run_label(position.as_deref(), row, column),
        Commands::LayoutInfo { layout } => run_layout_info(&layout),
    }
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(args: &CliAnalyzeArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let bytes = std::fs::read(&args.image).map_err(|e| -> CliError {
        format!("Failed to read image {}: {}", args.image.display(), e).into()
    })?;
    let params = args.grid.to_params();

    let wells = match &args.layout {
        Some(layout_path) => {
            let layout = PlateLayout::from_json_file(layout_path)?;
            if layout.rows != params.rows || layout.columns != params.columns {
                return Err(format!(
                    "layout is {}x{} but the grid arguments describe {}x{}",
                    layout.rows, layout.columns, params.rows, params.columns
                )
                .into());
            }

            let store = wellgrid::MemoryStore::new();
            store.set_classifications(PLATE_ID, layout.into_classes());
            let analyzer = PlateAnalyzer::new(store);
            let wells = analyzer.analyze_and_persist(PLATE_ID, &bytes, &params)?;

            match analyzer.calibration(PLATE_ID) {
                Ok(calibration) => {
                    let r2 = calibration
                        .regression
                        .r_squared
                        .map(|r| format!("{:.4}", r))
                        .unwrap_or_else(|| "n/a".to_string());
                    tracing::info!(
                        "Standard curve: concentration = {:.6} * ratio + {:.6} (r2 {}, {} points)",
                        calibration.regression.slope,
                        calibration.regression.intercept,
                        r2,
                        calibration.regression.point_count,
                    );
                    if let Some(path) = &args.curve_out {
                        let json = serde_json::to_string_pretty(&*calibration)?;
                        std::fs::write(path, &json)?;
                        tracing::info!("Calibration written to {}", path.display());
                    }
                }
                Err(err) => tracing::warn!("No standard curve: {}", err),
            }
            wells
        }
        None => wellgrid::analyze(&bytes, &params)?,
    };

    let incomplete = wells.iter().filter(|w| w.is_incomplete()).count();
    let resolved = wells
        .iter()
        .filter(|w| w.calculated_concentration.is_some())
        .count();
    tracing::info!(
        "Measured {} wells ({} incomplete, {} with concentration)",
        wells.len(),
        incomplete,
        resolved,
    );

    let json = serde_json::to_string_pretty(&wells)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Measurements written to {}", args.out.display());

    Ok(())
}

// ── centers ────────────────────────────────────────────────────────────

fn run_centers(args: &CliCentersArgs) -> CliResult<()> {
    let params = args.grid.to_params();
    let centers = wellgrid::well_centers(&params)?;
    let json = serde_json::to_string_pretty(&centers)?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("{} centers written to {}", centers.len(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

// ── fit ────────────────────────────────────────────────────────────────

fn run_fit(standards: &Path, out: Option<&Path>) -> CliResult<()> {
    let text = std::fs::read_to_string(standards).map_err(|e| -> CliError {
        format!("Failed to read standards {}: {}", standards.display(), e).into()
    })?;
    let points: Vec<wellgrid::StandardPoint> = serde_json::from_str(&text)?;

    // Replicate concentrations are averaged before the fit.
    let pairs: Vec<(f64, f64)> = points.iter().map(|p| (p.concentration, p.ratio)).collect();
    let grouped = wellgrid::group_standard_points(&pairs);
    let regression = wellgrid::fit_standard_curve(&grouped)?;

    println!("standard curve ({} points)", regression.point_count);
    println!("  slope:      {:.6}", regression.slope);
    println!("  intercept:  {:.6}", regression.intercept);
    match regression.r_squared {
        Some(r2) => println!("  r_squared:  {:.6}", r2),
        None => println!("  r_squared:  n/a (no concentration variance)"),
    }

    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&regression)?;
        std::fs::write(path, &json)?;
        tracing::info!("Curve written to {}", path.display());
    }

    Ok(())
}

// ── label ──────────────────────────────────────────────────────────────

fn run_label(position: Option<&str>, row: Option<usize>, column: Option<usize>) -> CliResult<()> {
    match (position, row, column) {
        (Some(position), None, None) => {
            let (row, column) = wellgrid::grid::parse_well_label(position)?;
            println!("{} -> row {}, column {}", position.trim(), row, column);
        }
        (None, Some(row), Some(column)) => {
            println!(
                "row {}, column {} -> {}",
                row,
                column,
                wellgrid::well_label(row, column)
            );
        }
        _ => return Err("provide either --position or both --row and --column".into()),
    }

    Ok(())
}

// ── layout-info ────────────────────────────────────────────────────────

fn run_layout_info(path: &Path) -> CliResult<()> {
    let layout = PlateLayout::from_json_file(path)?;

    println!("plate layout: {}", layout.name);
    println!(
        "  grid:        {} rows x {} columns",
        layout.rows, layout.columns
    );
    println!("  classified:  {} wells", layout.classes().len());
    println!("  standards:   {}", layout.count_of(WellKind::Standard));
    println!("  samples:     {}", layout.count_of(WellKind::Sample));
    println!("  controls:    {}", layout.count_of(WellKind::Control));
    println!("  blanks:      {}", layout.count_of(WellKind::Blank));
    println!("  empty:       {}", layout.count_of(WellKind::Empty));

    let standards = layout.standard_concentrations();
    if !standards.is_empty() {
        let rendered: Vec<String> = standards.iter().map(|c| c.to_string()).collect();
        println!("  standard concentrations: {}", rendered.join(", "));
    }

    Ok(())
}
