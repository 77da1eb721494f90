//! Raster drill command-line tool.
//!
//! Extracts forecast time series for a point, line or polygon and prints the
//! result on stdout. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use drill::{DrillConfig, DrillError, DrillProcess, DrillRequest, ForecastHoursInput};
use serde_json::Value;
use storage::{Catalog, ManifestIndex, RasterIndex};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "drill-cli")]
#[command(about = "Extract forecast raster time series along a geometry")]
struct Args {
    /// YAML configuration file (default: built-in defaults plus DRILL_* overrides)
    #[arg(short, long, env = "DRILL_CONFIG")]
    config: Option<PathBuf>,

    /// PostgreSQL raster catalog
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JSON manifest of raster entries; used instead of the catalog when given
    #[arg(long, env = "DRILL_MANIFEST")]
    manifest: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an extraction and print the encoded result
    Extract(ExtractArgs),
    /// Copy every entry of the manifest into the catalog
    Register,
}

#[derive(ClapArgs, Debug)]
struct ExtractArgs {
    /// Model name, e.g. hrdps
    #[arg(long)]
    model: String,

    /// Model run timestamp, e.g. 2024-03-01T12:00:00Z
    #[arg(long)]
    model_run: String,

    /// Comma-separated forecast hours or valid timestamps
    #[arg(long)]
    forecast_hours: String,

    /// Inline GeoJSON geometry, Feature or FeatureCollection
    #[arg(long, conflicts_with = "geometry_file", required_unless_present = "geometry_file")]
    geometry: Option<String>,

    /// File holding the GeoJSON input
    #[arg(long)]
    geometry_file: Option<PathBuf>,

    /// CRS of the geometry, overriding any `crs` member
    #[arg(long)]
    crs: Option<String>,

    /// Output format: geojson or csv
    #[arg(short, long, default_value = "geojson")]
    format: String,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Tokio runtime: {}", e);
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Exit status for a failure, following the drill error taxonomy.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DrillError>())
        .map_or(1, |e| e.exit_code() as u8)
}

async fn run(args: Args) -> Result<()> {
    match &args.command {
        Command::Extract(extract) => run_extract(&args, extract).await,
        Command::Register => {
            let Some(path) = &args.manifest else {
                bail!("register needs --manifest");
            };
            let manifest = ManifestIndex::load(path)
                .await
                .with_context(|| format!("loading manifest {}", path.display()))?;
            let catalog = connect_catalog(&args).await?;
            catalog.migrate().await?;
            for entry in manifest.entries() {
                catalog.register_raster(entry).await?;
            }
            info!(entries = manifest.entries().len(), "Registered manifest entries");
            Ok(())
        }
    }
}

async fn run_extract(args: &Args, extract: &ExtractArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate().map_err(DrillError::Config)?;

    let index: Arc<dyn RasterIndex> = match &args.manifest {
        Some(path) => Arc::new(
            ManifestIndex::load(path)
                .await
                .with_context(|| format!("loading manifest {}", path.display()))?,
        ),
        None => Arc::new(connect_catalog(args).await?),
    };

    let geometry = read_geometry(extract)?;
    let request = DrillRequest {
        model: extract.model.clone(),
        model_run: extract.model_run.clone(),
        forecast_hours: ForecastHoursInput::Text(extract.forecast_hours.clone()),
        geometry,
        crs: extract.crs.clone(),
        format: Some(extract.format.clone()),
    };

    let process = DrillProcess::new(index, config);
    let output = process.run(&request).await?;
    info!(content_type = output.content_type, bytes = output.body.len(), "Extraction encoded");

    match &extract.output {
        Some(path) => std::fs::write(path, &output.body)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{}", output.body),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<DrillConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(DrillConfig::from_yaml_str(&raw)?.with_env_overrides())
        }
        None => Ok(DrillConfig::from_env()),
    }
}

async fn connect_catalog(args: &Args) -> Result<Catalog> {
    let Some(url) = &args.database_url else {
        bail!("no raster index: pass --manifest or --database-url (or set DATABASE_URL)");
    };
    Catalog::connect(url)
        .await
        .context("connecting to the raster catalog")
}

fn read_geometry(extract: &ExtractArgs) -> Result<Value> {
    let raw = match (&extract.geometry, &extract.geometry_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading geometry {}", path.display()))?,
        (None, None) => bail!("one of --geometry or --geometry-file is required"),
    };
    serde_json::from_str(&raw)
        .map_err(|e| DrillError::InvalidGeometry(format!("not valid JSON: {}", e)))
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_drill_error() {
        let err = anyhow::Error::from(DrillError::NotFound("nothing".to_string()));
        assert_eq!(exit_code(&err), 3);

        let wrapped = anyhow::Error::from(DrillError::InvalidGeometry("bad".to_string()))
            .context("while extracting");
        assert_eq!(exit_code(&wrapped), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn test_parse_extract_args() {
        let args = Args::try_parse_from([
            "drill-cli",
            "--manifest",
            "/data/manifest.json",
            "extract",
            "--model",
            "hrdps",
            "--model-run",
            "2024-03-01T12:00:00Z",
            "--forecast-hours",
            "0,6",
            "--geometry",
            r#"{"type":"Point","coordinates":[-75,45]}"#,
        ])
        .unwrap();
        match &args.command {
            Command::Extract(extract) => {
                assert_eq!(extract.format, "geojson");
                let geometry = read_geometry(extract).unwrap();
                assert_eq!(geometry["type"], "Point");
            }
            other => panic!("expected extract, got {:?}", other),
        }
    }

    #[test]
    fn test_register_uses_global_index_args() {
        let args = Args::try_parse_from([
            "drill-cli",
            "--manifest",
            "rasters.json",
            "--database-url",
            "postgres://localhost/drill",
            "register",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Register));
        assert_eq!(args.manifest.as_deref(), Some(Path::new("rasters.json")));

        assert!(Args::try_parse_from(["drill-cli", "runs", "--model", "HRDPS"]).is_err());
    }

    #[test]
    fn test_geometry_sources_are_exclusive() {
        let parsed = Args::try_parse_from([
            "drill-cli",
            "extract",
            "--model",
            "hrdps",
            "--model-run",
            "2024-03-01T12:00:00Z",
            "--forecast-hours",
            "0",
            "--geometry",
            "{}",
            "--geometry-file",
            "g.json",
        ]);
        assert!(parsed.is_err());
    }
}
