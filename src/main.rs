use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use landcover_io::{BoundaryReader, ExperimentName, ResultWriter, SceneArchive, TrainingReader};
use landcover_pipeline::{
    AreaFilterSpec, ExportRequest, ExportService, LandCoverClass, RenderInputs, RenderSummary, Renderer, Workflow,
    WorkflowConfig,
};
use landcover_raster::InMemoryCollection;
use landcover_rf::{OobMode, TrainingMetadata};

#[derive(Parser)]
#[command(name = "landcover")]
#[command(about = "Supervised land-cover classification of a median composite over administrative boundaries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the train/test partition and the forest
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Where the boundaries come from and which of them to keep.
#[derive(Args, Debug, Clone)]
struct AreaArgs {
    /// GeoJSON FeatureCollection of village polygons
    #[arg(long)]
    boundaries: PathBuf,

    /// JSON area filter replacing the built-in Kamabuye selection
    #[arg(long)]
    area_filter: Option<PathBuf>,

    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full workflow: composite, train, evaluate, classify, report, export
    Run {
        #[command(flatten)]
        area: AreaArgs,

        /// Directory holding water/buildup/bareland/cropland/vegetation .geojson layers
        #[arg(long)]
        training_dir: PathBuf,

        /// Scene archive directory containing collection.json
        #[arg(long)]
        scenes: PathBuf,

        /// Number of trees in the random forest
        #[arg(long, default_value_t = 100)]
        n_trees: usize,

        /// Also score the forest on its out-of-bag samples
        #[arg(long, default_value_t = false)]
        oob: bool,

        /// Save the trained model next to the other results
        #[arg(long, default_value_t = false)]
        save_model: bool,

        /// Do not submit the classified-map export
        #[arg(long, default_value_t = false)]
        skip_export: bool,

        /// Do not draw maps, charts or the legend
        #[arg(long, default_value_t = false)]
        no_render: bool,
    },

    /// Select and simplify the target area only, and write it as GeoJSON
    Boundary {
        #[command(flatten)]
        area: AreaArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct BoundaryOutput {
    experiment: String,
    n_features: usize,
    n_selected: usize,
    area_ha: f64,
    vertex_count: usize,
    n_parts: usize,
    centroid: Option<[f64; 2]>,
    target_path: PathBuf,
}

#[derive(Serialize)]
struct RunOutput {
    experiment: String,
    seed: u64,
    n_selected: usize,
    target_area_ha: f64,
    scene_ids: Vec<String>,
    n_samples: usize,
    n_training: usize,
    n_testing: usize,
    forest: TrainingMetadata,
    overall_accuracy: Option<f64>,
    kappa: Option<f64>,
    oob_accuracy: Option<f64>,
    area_ha: Vec<ClassAreaOutput>,
    unclassified_ha: f64,
    model_path: Option<PathBuf>,
    export: Option<ExportOutput>,
    render: Option<RenderSummary>,
}

#[derive(Serialize)]
struct ClassAreaOutput {
    class: &'static str,
    hectares: f64,
}

#[derive(Serialize)]
struct ExportOutput {
    description: String,
    succeeded: bool,
    path: Option<PathBuf>,
    error: Option<String>,
}

fn workflow_config(area_filter: Option<&Path>, seed: u64) -> Result<WorkflowConfig> {
    let mut config = WorkflowConfig::new().with_seed(seed);
    if let Some(path) = area_filter {
        let spec = AreaFilterSpec::from_path(path).context("failed to load area filter")?;
        info!(path = %path.display(), "area filter loaded");
        config = config.with_area_filter(spec);
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Boundary { area } => {
            let experiment_name = ExperimentName::new(area.experiment.clone())?;
            let config = workflow_config(area.area_filter.as_deref(), cli.seed)?;

            let features = BoundaryReader::new(&area.boundaries)
                .read()
                .context("failed to read boundaries")?;
            let n_features = features.len();

            // Only the boundary stages run; no scenes or training points are needed.
            let workflow = Workflow::new(config, features, Vec::new(), InMemoryCollection::new())?;
            let n_selected = workflow.selected().context("boundary selection failed")?.len();
            let target = workflow.target().context("geometry preparation failed")?;

            let writer = ResultWriter::new(&area.output_dir, experiment_name)?;
            let target_path = writer.write_target(target)?;

            let output = BoundaryOutput {
                experiment: area.experiment,
                n_features,
                n_selected,
                area_ha: target.area() / 10_000.0,
                vertex_count: target.vertex_count(),
                n_parts: target.n_parts(),
                centroid: target.centroid().map(|c| [c.x(), c.y()]),
                target_path,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Run {
            area,
            training_dir,
            scenes,
            n_trees,
            oob,
            save_model,
            skip_export,
            no_render,
        } => {
            let experiment_name = ExperimentName::new(area.experiment.clone())?;
            let config = workflow_config(area.area_filter.as_deref(), cli.seed)?
                .with_n_trees(n_trees)
                .with_oob_mode(if oob { OobMode::Enabled } else { OobMode::Disabled });

            // 1. Read inputs
            let features = BoundaryReader::new(&area.boundaries)
                .read()
                .context("failed to read boundaries")?;
            let training = TrainingReader::new(&training_dir)
                .read_all(&LandCoverClass::layers()[..])
                .context("failed to read training layers")?;
            let archive = SceneArchive::open(&scenes).context("failed to open scene archive")?;
            info!(n_features = features.len(), n_layers = training.len(), "inputs loaded");

            let workflow = Workflow::new(config, features, training, archive)?;

            // 2. Boundary and composite
            let n_selected = workflow.selected().context("boundary selection failed")?.len();
            let target = workflow.target().context("geometry preparation failed")?;
            let composite = workflow.composite().context("compositing failed")?;

            // 3. Samples, model, evaluation
            let merged = workflow.merged_sample().context("failed to merge training layers")?;
            info!(n_points = merged.len(), layers = ?merged.layer_sizes(), "merged sample");
            let table = workflow.samples().context("sampling failed")?;
            let partition = workflow.partition()?;
            let model = workflow.model().context("training failed")?;
            let report = workflow.evaluation().context("evaluation failed")?;
            info!("accuracy assessment\n{report}");

            // 4. Classify and measure
            let classified = workflow.classified().context("classification failed")?;
            let areas = workflow.areas().context("area reduction failed")?;

            // 5. Write results
            let writer = ResultWriter::new(&area.output_dir, experiment_name)?;
            writer.write_target(target)?;
            writer.write_evaluation(report)?;
            writer.write_areas(&LandCoverClass::names(), areas)?;
            let model_path = if save_model {
                let path = writer.model_path();
                model.forest().save(&path).context("failed to save model")?;
                info!(path = %path.display(), "model saved");
                Some(path)
            } else {
                None
            };

            // 6. Export runs in the background while the visuals are drawn
            let export_handle = if skip_export {
                None
            } else {
                let request = ExportRequest::from_settings(workflow.config().export(), target.geometry().clone())?;
                Some(
                    ExportService::new(writer.output_dir())
                        .submit(classified, request)
                        .context("export rejected")?,
                )
            };

            let render = (!no_render).then(|| {
                Renderer::new(writer.output_dir(), &area.experiment, workflow.config().presentation().clone())
                    .render_all(&RenderInputs {
                        target,
                        composite: composite.image(),
                        classified,
                        evaluation: report,
                        areas,
                    })
            });

            let export = export_handle.map(|handle| {
                let description = handle.description().to_string();
                match handle.wait() {
                    Ok(path) => ExportOutput {
                        description,
                        succeeded: true,
                        path: Some(path),
                        error: None,
                    },
                    Err(err) => {
                        warn!(error = %err, "export failed");
                        ExportOutput {
                            description,
                            succeeded: false,
                            path: None,
                            error: Some(err.to_string()),
                        }
                    }
                }
            });
            let export_failed = export.as_ref().is_some_and(|e| !e.succeeded);

            // 7. Summary
            let output = RunOutput {
                experiment: area.experiment,
                seed: cli.seed,
                n_selected,
                target_area_ha: target.area() / 10_000.0,
                scene_ids: composite.scene_ids().to_vec(),
                n_samples: table.len(),
                n_training: partition.training().len(),
                n_testing: partition.testing().len(),
                forest: model.metadata().clone(),
                overall_accuracy: report.overall_accuracy,
                kappa: report.kappa,
                oob_accuracy: report.oob_accuracy,
                area_ha: LandCoverClass::ALL
                    .iter()
                    .zip(&areas.hectares)
                    .map(|(class, &hectares)| ClassAreaOutput {
                        class: class.name(),
                        hectares,
                    })
                    .collect(),
                unclassified_ha: areas.unclassified_hectares,
                model_path,
                export,
                render,
            };
            writer.write_summary(&output)?;
            println!("{}", serde_json::to_string_pretty(&output)?);

            if export_failed {
                anyhow::bail!("classification finished but the export failed");
            }
        }
    }

    Ok(())
}
