use clap::{Parser, Subcommand};
use cli::{resolve_parameters, write_outputs, AnalysisJob};
use color_eyre::eyre::{Result, WrapErr};
use grain::{AnalysisParameters, Pipeline};
use schemars::schema_for;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the grain size of one micrograph
    Analyze {
        /// Path to the micrograph
        #[arg(short, long)]
        image: PathBuf,
        /// Physical size of one pixel in micrometres
        #[arg(short, long)]
        pixel_size: f64,
        /// Parameter file (.toml or .json) replacing the defaults
        #[arg(long)]
        params: Option<PathBuf>,
        /// Inline JSON object overriding individual parameters
        #[arg(long)]
        set: Option<String>,
        /// Directory for result.json, result.geojson and the overlays
        #[arg(short, long, default_value = "output")]
        output_dir: PathBuf,
    },
    /// Run the analysis described by a job file
    Run {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        job: PathBuf,
    },
    /// Write only the boundary mask of a micrograph
    Preprocess {
        #[arg(short, long)]
        image: PathBuf,
        #[arg(long)]
        params: Option<PathBuf>,
        #[arg(long)]
        set: Option<String>,
        /// Output PNG path
        #[arg(short, long, default_value = "mask.png")]
        output: PathBuf,
    },
    /// Print the JSON schema of the analysis parameters
    Schema {
        /// Print the job file schema instead
        #[arg(long)]
        job: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Analyze { image, pixel_size, params, set, output_dir } => {
            let params = load_parameters(params.as_deref(), set.as_deref())?;
            analyze(image, *pixel_size, params, output_dir)?;
        }
        Commands::Run { job } => {
            let job = AnalysisJob::from_file(job)
                .wrap_err_with(|| format!("Failed to load job {}", job.display()))?;
            info!("Job: {:?}", job);
            let params = job.parameters()?;
            analyze(Path::new(&job.image), job.pixel_size_um, params, Path::new(&job.output_dir))?;
        }
        Commands::Preprocess { image, params, set, output } => {
            let params = load_parameters(params.as_deref(), set.as_deref())?;
            preprocess(image, params, output)?;
        }
        Commands::Schema { job } => {
            let schema = if *job {
                serde_json::to_string_pretty(&schema_for!(AnalysisJob))?
            } else {
                serde_json::to_string_pretty(&AnalysisParameters::schema())?
            };
            println!("{schema}");
        }
    }

    Ok(())
}

fn load_parameters(params_file: Option<&Path>, set: Option<&str>) -> Result<AnalysisParameters> {
    let overrides = set
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .wrap_err("--set must be a JSON object")?;
    Ok(resolve_parameters(params_file, overrides.as_ref())?)
}

fn analyze(image_path: &Path, pixel_size_um: f64, params: AnalysisParameters, output_dir: &Path) -> Result<()> {
    let image = image::open(image_path)
        .wrap_err_with(|| format!("Failed to open {}", image_path.display()))?;
    info!("Analysing {:?} ({}x{})", image_path, image.width(), image.height());

    let pipeline = Pipeline::from_params(params)?;
    info!("{}", pipeline.info());
    let analysis = pipeline.run(&image, pixel_size_um)?;

    if !analysis.result.warnings.is_empty() {
        info!("{} warning(s) recorded in the result", analysis.result.warnings.len());
    }
    let metrics = &analysis.result.metrics;
    info!(
        "G = {:.3}, mean intercept = {:.2} µm, N_int = {:.1} over {:.3} mm",
        metrics.g, metrics.ell_um, metrics.n_int, metrics.l_mm
    );

    let files = write_outputs(&analysis, &image, output_dir)?;
    info!("✅ Analysis written to {}", files.result_json.display());
    Ok(())
}

fn preprocess(image_path: &Path, params: AnalysisParameters, output: &Path) -> Result<()> {
    let image = image::open(image_path)
        .wrap_err_with(|| format!("Failed to open {}", image_path.display()))?;
    let mask = Pipeline::from_params(params)?.preprocess(&image)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    mask.save(output)?;
    info!("✅ Mask written to {}", output.display());
    Ok(())
}
