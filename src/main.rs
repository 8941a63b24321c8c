pub mod types;
pub mod config;
pub mod data;
pub mod processing;
pub mod render;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the per-region utilization summary and exit
    Report {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the interactive dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Report { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let dataset = data::load_data(&app_config)?;
            print_report(&dataset);
        }
        Commands::Serve { config } => {
            println!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let dataset = data::load_data(&app_config)?;
            server::start_server(app_config, dataset).await?;
        }
    }

    Ok(())
}

fn print_report(dataset: &types::Dataset) {
    let selection = dataset.region_names();
    let utilization = processing::utilization_by_region(dataset, &selection);
    let beds = processing::bed_counts(dataset, &selection);

    println!("{:<24} {:>12} {:>10} {:>10}", "Region", "Avg Util (%)", "Utilized", "Empty");
    for (stat, bed) in utilization.iter().zip(&beds) {
        println!(
            "{:<24} {:>12.1} {:>10} {:>10}",
            stat.region, stat.mean_utilization, bed.utilized, bed.empty
        );
    }
}
