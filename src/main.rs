use clap::{Parser, Subcommand};
use feed_o_mat::config::{parse_duration, Config};
use feed_o_mat::feed::{validate_source, OnMalformed, SimulatedFeed};
use feed_o_mat::layer::{EntityLayer, LabelExpression};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "feed-o-mat")]
#[command(about = "Replay recorded entity observations as a live feed")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every record of an observation file
    Validate {
        source: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the schema a feed describes
    Schema {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Replay an observation file into an entity track layer
    Replay {
        source: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        entity_id_field: Option<String>,
        /// Pacing delay between observations, e.g. "10ms" or "1s"
        #[arg(long, value_parser = parse_delay_arg)]
        delay: Option<Duration>,
        #[arg(long, value_enum)]
        on_malformed: Option<OnMalformed>,
        /// Label expression, e.g. "[VesselName]"
        #[arg(long)]
        label: Option<String>,
    },
}

fn parse_delay_arg(value: &str) -> Result<Duration, String> {
    parse_duration(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { source, config } => validate(&source, config),
        Commands::Schema { config } => schema(config),
        Commands::Replay {
            source,
            config,
            entity_id_field,
            delay,
            on_malformed,
            label,
        } => {
            let mut config = match load_config(config) {
                Ok(c) => c,
                Err(code) => return code,
            };
            if source.is_some() {
                config.source = source;
            }
            if let Some(field) = entity_id_field {
                config.entity_id_field = field;
            }
            if let Some(delay) = delay {
                config.delay = delay;
            }
            if let Some(on_malformed) = on_malformed {
                config.on_malformed = on_malformed;
            }
            if label.is_some() {
                config.label = label;
            }
            replay(config).await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config, ExitCode> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    Config::from_file(&path).map_err(|e| {
        eprintln!("Error reading config {}: {}", path.display(), e);
        ExitCode::FAILURE
    })
}

fn validate(path: &Path, config: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let spatial_reference = match config.schema() {
        Ok(s) => s.spatial_reference,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = validate_source(&content, spatial_reference);
    for error in &report.rejected {
        println!("  {}", error);
    }

    if report.rejected.is_empty() {
        println!("Source is valid ({} records)", report.records);
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "{} valid records, {} malformed",
            report.records,
            report.rejected.len()
        );
        ExitCode::FAILURE
    }
}

fn schema(config: Option<PathBuf>) -> ExitCode {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let schema = match config.schema() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error encoding schema: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn replay(config: Config) -> ExitCode {
    let feed_config = match config.feed_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut feed = SimulatedFeed::new(feed_config);
    let layer = Arc::new(EntityLayer::new(&feed.describe(), config.tracks.clone()));

    if let Err(e) = feed.connect(layer.clone()).await {
        eprintln!("Connect failed: {}", e);
        return ExitCode::FAILURE;
    }

    let finished = tokio::select! {
        result = feed.wait() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            log::info!("Interrupted, disconnecting");
            feed.disconnect();
            feed.wait().await
        }
    };

    let label = config
        .label_expression()
        .unwrap_or_else(|| LabelExpression::parse("[VesselName]"));
    for entity in layer.entities() {
        let position = entity
            .latest()
            .map(|p| format!("({:.5}, {:.5})", p.position.x, p.position.y))
            .unwrap_or_default();
        println!(
            "  {} {:?}: {} observations, last at {}",
            entity.id,
            label.evaluate(&entity.attributes),
            entity.observation_count,
            position
        );
    }

    match result {
        Some(Ok(summary)) => {
            println!(
                "Replay {}: {} observations, {} skipped, {} entities",
                summary.status,
                summary.stats.emitted,
                summary.stats.skipped,
                layer.len()
            );
            ExitCode::SUCCESS
        }
        Some(Err(e)) => {
            eprintln!("Replay failed: {}", e);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
