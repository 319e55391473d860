//! `roadwatch regions`: classify points and dump the registry.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use roadwatch_core::geojson;
use serde::Serialize;

use crate::output::{OutputMode, render};

#[derive(Subcommand, Debug)]
pub enum RegionsCommand {
    #[command(
        about = "Print the region a coordinate falls in",
        after_help = "EXAMPLES:\n    # Downtown Edmonton\n    roadwatch regions classify 53.5461 -113.4938"
    )]
    Classify {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
    },

    #[command(about = "List regions in priority order")]
    List,

    #[command(
        about = "Write the registry as a GeoJSON FeatureCollection",
        after_help = "EXAMPLES:\n    # Print to stdout\n    roadwatch regions export\n\n    # Save for a map viewer\n    roadwatch regions export --out regions.geojson"
    )]
    Export {
        /// Output file (default: stdout).
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Serialize)]
struct Classification {
    lat: f64,
    lon: f64,
    region: String,
}

#[derive(Debug, Serialize)]
struct RegionSummary<'a> {
    priority: usize,
    name: &'a str,
    vertices: usize,
}

pub fn run_regions(
    command: &RegionsCommand,
    config_path: &Path,
    output: OutputMode,
) -> anyhow::Result<()> {
    let loaded = super::load(config_path, output)?;
    let registry = loaded.regions(output)?;

    match command {
        RegionsCommand::Classify { lat, lon } => {
            let result = Classification {
                lat: *lat,
                lon: *lon,
                region: registry.classify(*lat, *lon),
            };
            render(output, &result, |result, w| writeln!(w, "{}", result.region))
        }
        RegionsCommand::List => {
            let summaries: Vec<RegionSummary<'_>> = registry
                .regions()
                .iter()
                .enumerate()
                .map(|(priority, region)| RegionSummary {
                    priority,
                    name: &region.name,
                    vertices: region.points.len(),
                })
                .collect();
            render(output, &summaries, |summaries, w| {
                for summary in summaries {
                    writeln!(
                        w,
                        "{:>2}  {:<20} {} points",
                        summary.priority, summary.name, summary.vertices
                    )?;
                }
                Ok(())
            })
        }
        RegionsCommand::Export { out } => {
            let body = geojson::to_string_pretty(&registry)?;
            match out {
                Some(path) => std::fs::write(path, format!("{body}\n"))
                    .with_context(|| format!("Failed to write {}", path.display())),
                None => {
                    let stdout = std::io::stdout();
                    let mut lock = stdout.lock();
                    writeln!(lock, "{body}")?;
                    Ok(())
                }
            }
        }
    }
}
