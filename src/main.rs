mod catalog;
mod maintenance;
mod perms;
mod predict;
mod scheduler;
mod station;
mod time_format;
mod web;

use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::process::ExitCode;

use crate::scheduler::service::{pass_windows, station_passes};
use crate::scheduler::{PassQuery, Storage};
use crate::station::StationDirectory;
use crate::web::server::load_catalog;
use crate::web::Config;

#[derive(Parser)]
#[command(name = "sat-o-net")]
#[command(about = "Pass prediction and observation scheduling for a ground station network")]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve,
    /// Free pass windows of a transmitter across stations
    Passes {
        satellite: u32,
        transmitter: String,
        /// Window start, absolute or `now+1h`
        #[arg(long, default_value = "now")]
        start: String,
        #[arg(long, default_value = "now+12h")]
        end: String,
        #[arg(long)]
        station: Option<u32>,
    },
    /// Upcoming passes of all schedulable satellites over a station
    Upcoming {
        station: u32,
        /// Include satellites the station cannot receive
        #[arg(long)]
        all_frequencies: bool,
    },
    /// Validate a configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading {}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Passes {
            satellite,
            transmitter,
            start,
            end,
            station,
        } => passes(&config, satellite, transmitter, &start, &end, station),
        Commands::Upcoming {
            station,
            all_frequencies,
        } => upcoming(&config, station, all_frequencies),
        Commands::CheckConfig => check_config(&config),
    }
}

async fn serve(config: Config) -> ExitCode {
    match web::run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Directory where every configured station counts as online. Offline CLI
/// runs have no heartbeats to go on.
fn online_directory(config: &Config) -> StationDirectory {
    let directory = StationDirectory::new(
        config.stations.clone(),
        config.scheduling.station_heartbeat,
    );
    let now = Utc::now();
    for id in directory.ids() {
        let _ = directory.record_heartbeat(id, now);
    }
    directory
}

fn passes(
    config: &Config,
    satellite: u32,
    transmitter: String,
    start: &str,
    end: &str,
    station: Option<u32>,
) -> ExitCode {
    let now = Utc::now();
    let (start, end) = match (
        time_format::parse_time(start, now),
        time_format::parse_time(end, now),
    ) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid time: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let catalog = load_catalog(config);
    let stations = online_directory(config);
    let storage = Storage::new(config.storage.base_folder.clone());
    let query = PassQuery {
        satellite_id: satellite,
        transmitter_uuid: transmitter,
        start,
        end,
        station,
    };

    match pass_windows(
        &catalog,
        &stations,
        &storage,
        &query,
        now,
        config.scheduling.min_start_lead,
    ) {
        Ok(windows) => {
            for station in &windows {
                println!("{} ({}): {} windows", station.name, station.id, station.windows.len());
                for w in &station.windows {
                    println!(
                        "  {} - {}  az {:>5.1}  max {:>4.1}{}",
                        time_format::format_wire(&w.start),
                        time_format::format_wire(&w.end),
                        w.rise_azimuth_deg,
                        w.max_altitude_deg,
                        if w.valid { "" } else { "  (too soon)" }
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn upcoming(config: &Config, station: u32, all_frequencies: bool) -> ExitCode {
    let catalog = load_catalog(config);
    let stations = online_directory(config);

    match station_passes(
        &catalog,
        &stations,
        station,
        Utc::now(),
        config.scheduling.upcoming_end,
        config.scheduling.min_start_lead,
        all_frequencies,
    ) {
        Ok(passes) => {
            for p in &passes {
                println!(
                    "{:<24} {}  max {:>4.1} @ {}  {}s",
                    p.satellite,
                    time_format::format_wire(&p.rise_time),
                    p.max_altitude_deg,
                    time_format::format_wire(&p.max_altitude_time),
                    p.duration_seconds
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn check_config(config: &Config) -> ExitCode {
    let catalog = load_catalog(config);
    println!(
        "Configuration is valid ({} stations, {} satellites, {} element sets, {} API keys)",
        config.stations.len(),
        config.satellites.len(),
        catalog.tle_count(),
        config.api_keys.len()
    );
    for station in &config.stations {
        println!(
            "  {}: {} ({:.4}, {:.4}, {} m)",
            station.id,
            station.name,
            station.location.latitude_deg,
            station.location.longitude_deg,
            station.location.altitude_m
        );
    }
    ExitCode::SUCCESS
}
