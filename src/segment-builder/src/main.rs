//! Segment Builder: replays a script of builder interactions and prints
//! the resulting segment definition.

use campaign_core::config::AppConfig;
use clap::Parser;
use segment_builder::{demo_script, load_script, ScriptRunner};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "segment-builder")]
#[command(about = "Compose OR-of-AND audience segments and estimate their size")]
#[command(version)]
struct Cli {
    /// JSON file with the commands to replay (built-in demo if omitted)
    #[arg(long)]
    script: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "SEGMENT_BUILDER_CONFIG")]
    config: Option<PathBuf>,

    /// Number of groups to start with (overrides config)
    #[arg(long, env = "SEGMENT_BUILDER__BUILDER__INITIAL_GROUPS")]
    initial_groups: Option<usize>,

    /// RNG seed for estimation results (overrides config)
    #[arg(long, env = "SEGMENT_BUILDER__ESTIMATION__SEED")]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "segment_builder=info,campaign_segmentation=info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Segment Builder starting up");

    // Load configuration
    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(groups) = cli.initial_groups {
        config.builder.initial_groups = groups;
    }
    if let Some(seed) = cli.seed {
        config.estimation.seed = Some(seed);
    }
    config.normalize();

    info!(
        initial_groups = config.builder.initial_groups,
        steps = config.estimation.step_delays_ms.len(),
        seeded = config.estimation.seed.is_some(),
        "Configuration loaded"
    );

    let commands = match &cli.script {
        Some(path) => load_script(path)?,
        None => {
            info!("No script given, running the built-in demo");
            demo_script()
        }
    };

    let mut runner = ScriptRunner::new(&config);
    runner.run(&commands).await?;

    let builder = runner.builder();
    for group_id in builder.group_ids() {
        for card in builder.field_cards(group_id) {
            info!(
                group = %group_id,
                field = %card.field_id,
                collapsed = card.collapsed,
                preview = %card.preview,
                "condition"
            );
        }
    }
    let estimation = builder.estimation().state();
    if let Some(audience) = &estimation.confirmed_audience {
        info!(audience = %audience, "Total audience");
    }

    println!("{}", builder.submit_json()?);
    Ok(())
}
