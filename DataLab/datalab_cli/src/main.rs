use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use datalab_generator::{
    params::{scenarios, slug},
    rng::random_seed,
    views::{regulation_counts, scatter, survival_by_group, volcano, Regulation, VolcanoThresholds},
    DataLab, DataLabConfig, Dataset, GeneratorTelemetry, ParameterOverrides,
};
use serde_json::json;
use shared_logging::LogLevel;

#[derive(Parser, Debug)]
#[command(name = "datalab", version, about = "Synthetic biological dataset generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lists the built-in scenarios.
    Scenarios,
    /// Generates a dataset and prints a summary.
    Generate {
        #[command(flatten)]
        request: RequestArgs,
        /// Writes the full dataset as JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Prints volcano calls for the generated dataset.
    Volcano {
        #[command(flatten)]
        request: RequestArgs,
        /// Minimum absolute log2 fold change.
        #[arg(long, default_value_t = 1.0)]
        fc: f64,
        /// Maximum adjusted p-value.
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,
        /// Number of significant genes to list.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Summarises survival per arm.
    Survival {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Correlates two genes, overall and per subtype.
    Scatter {
        #[command(flatten)]
        request: RequestArgs,
        gene_x: String,
        gene_y: String,
    },
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// Scenario name or slug; `custom` starts from the Textbook values.
    #[arg(long)]
    scenario: Option<String>,
    /// TOML request file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Draws a fresh seed instead of the scenario's.
    #[arg(long, conflicts_with = "seed")]
    reroll: bool,
    #[arg(long)]
    genes: Option<usize>,
    #[arg(long)]
    samples: Option<usize>,
    #[arg(long)]
    effect_size: Option<f64>,
    #[arg(long)]
    hazard_ratio: Option<f64>,
    /// JSON-lines log file.
    #[arg(long)]
    log: Option<PathBuf>,
}

impl RequestArgs {
    fn overrides(&self) -> ParameterOverrides {
        ParameterOverrides {
            seed: if self.reroll {
                Some(random_seed())
            } else {
                self.seed
            },
            genes: self.genes,
            samples: self.samples,
            effect_size: self.effect_size,
            hazard_ratio: self.hazard_ratio,
            ..ParameterOverrides::default()
        }
    }

    fn generate(&self) -> Result<(DataLab, Dataset)> {
        let config = match &self.config {
            Some(path) => DataLabConfig::load(path)?,
            None => DataLabConfig::default(),
        };
        let scenario = self.scenario.clone().unwrap_or(config.scenario);
        let overrides = config.overrides.merged(&self.overrides());

        let mut builder = DataLab::builder();
        if let Some(log_path) = self.log.clone().or(config.telemetry.log_path) {
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent)?;
            }
            builder = builder.telemetry(
                GeneratorTelemetry::builder("datalab")
                    .log_path(log_path)
                    .build()?,
            );
        }
        let lab = builder.build();
        let dataset = lab
            .generate(&scenario, &overrides)
            .with_context(|| format!("generating scenario {scenario:?}"))?;
        Ok((lab, dataset))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Scenarios => {
            let catalogue: Vec<_> = scenarios()
                .iter()
                .map(|(name, params)| json!({ "name": name, "slug": slug(name), "params": params }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&catalogue)?);
            Ok(())
        }
        Commands::Generate { request, out } => {
            let (lab, dataset) = request.generate()?;
            if let Some(path) = out {
                let file =
                    File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer(&mut writer, &dataset)?;
                writer.flush()?;
                if let Some(telemetry) = lab.telemetry() {
                    telemetry.log(
                        LogLevel::Info,
                        "datalab.cli.written",
                        json!({ "path": path, "fingerprint": dataset.fingerprint().to_string() }),
                    )?;
                }
            }
            let survival = survival_by_group(&dataset);
            let summary = json!({
                "fingerprint": dataset.fingerprint().to_string(),
                "params": dataset.params(),
                "genes": dataset.expression().n_genes(),
                "samples": dataset.expression().n_samples(),
                "affected_genes": dataset.affected_genes().len(),
                "survival": survival,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Commands::Volcano {
            request,
            fc,
            alpha,
            top,
        } => {
            let (_, dataset) = request.generate()?;
            let thresholds = VolcanoThresholds {
                log2_fold_change: fc,
                adjusted_p_value: alpha,
            };
            let mut points = volcano(dataset.gene_stats(), &thresholds);
            for (regulation, count) in regulation_counts(&points) {
                println!("{regulation:?}: {count}");
            }
            points.retain(|p| p.regulation != Regulation::NotSignificant);
            points.sort_by(|a, b| b.neg_log10_p.total_cmp(&a.neg_log10_p));
            for point in points.iter().take(top) {
                let truth = if dataset.affected_genes().contains(&point.gene_id) {
                    "affected"
                } else {
                    "null"
                };
                println!(
                    "{} | log2FC {:.3} | -log10 p {:.2} | {:?} | {truth}",
                    point.gene_id, point.log2_fold_change, point.neg_log10_p, point.regulation
                );
            }
            Ok(())
        }
        Commands::Survival { request } => {
            let (_, dataset) = request.generate()?;
            println!(
                "{}",
                serde_json::to_string_pretty(&survival_by_group(&dataset))?
            );
            Ok(())
        }
        Commands::Scatter {
            request,
            gene_x,
            gene_y,
        } => {
            let (_, dataset) = request.generate()?;
            let view = scatter(&dataset, &gene_x, &gene_y)
                .with_context(|| format!("unknown gene {gene_x} or {gene_y}"))?;
            println!(
                "{}",
                json!({
                    "gene_x": view.gene_x,
                    "gene_y": view.gene_y,
                    "pearson_r": view.pearson_r,
                    "by_subtype": view.by_subtype,
                })
            );
            Ok(())
        }
    }
}
