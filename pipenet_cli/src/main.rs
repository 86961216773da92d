use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::Duration;

use libpipenet::config::{ExtractorConfig, GeneratorConfig};
use libpipenet::generator::generate;
use libpipenet::process::process;
use libpipenet::worker_status::{BarColor, Stage, WorkerStatus};

const BAR_LENGTH: u64 = 100;

fn make_template_config<T: Serialize + Default>(path: &Path) {
    let config = T::default();
    let yaml_str = serde_yaml::to_string(&config).expect("Could not serialize template config!");
    let mut file = File::create(path).expect("Could not create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

fn bar_style(color: BarColor) -> ProgressStyle {
    let color = match color {
        BarColor::CYAN => "cyan",
        BarColor::MAGENTA => "magenta",
        BarColor::RED => "red",
        BarColor::GREEN => "green",
    };
    ProgressStyle::with_template(&format!(
        "{{prefix:>16}} [{{bar:40.{color}/blue}}] {{pos:>3}}%"
    ))
    .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Run a task on its own thread, drawing one progress bar per (stage, worker) it reports
fn run_with_progress<T, E, F>(pb_manager: &MultiProgress, task: F) -> Option<T>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: FnOnce(Sender<WorkerStatus>) -> Result<T, E> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || task(tx));

    let mut bars: HashMap<(Stage, usize), ProgressBar> = HashMap::new();
    loop {
        match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(status) => {
                let bar = bars.entry((status.stage, status.worker_id)).or_insert_with(|| {
                    let bar = pb_manager.add(ProgressBar::new(BAR_LENGTH));
                    bar.set_style(bar_style(status.color));
                    bar.set_prefix(format!("{} worker {}", status.stage, status.worker_id));
                    bar
                });
                bar.set_position((status.progress * BAR_LENGTH as f32) as u64);
            }
            Err(RecvTimeoutError::Timeout) => {
                if handle.is_finished() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for bar in bars.values() {
        bar.finish();
    }

    match handle.join() {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            log::error!("Task failed with error: {e}");
            None
        }
        Err(_) => {
            log::error!("Failed to join worker task!");
            None
        }
    }
}

fn run_generator(config_path: &Path, pb_manager: &MultiProgress) {
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match GeneratorConfig::read_config_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Variant: {:?}", config.variant);
    log::info!("Networks: {}", config.n_networks);
    match config.seed {
        Some(seed) => log::info!("Seed: {seed}"),
        None => log::info!("Seed: from entropy"),
    }

    if let Some(paths) = run_with_progress(pb_manager, move |tx| generate(&config, &tx)) {
        log::info!("Successfully generated {} networks!", paths.len());
    }
}

fn run_extractor(config_path: &Path, pb_manager: &MultiProgress) {
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match ExtractorConfig::read_config_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Data Path: {}", config.data_path.to_string_lossy());
    log::info!("HDF5 Path: {}", config.hdf_path.to_string_lossy());
    log::info!(
        "Max Branches: {} Max Depth: {}",
        config.max_branches,
        config.max_depth
    );
    log::info!("Number of Workers: {}", config.n_threads);

    if let Some(path) = run_with_progress(pb_manager, move |tx| process(&config, &tx)) {
        log::info!("Successfully wrote dataset to {}!", path.to_string_lossy());
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("pipenet_cli")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("new-generator")
                .about("Make a template generator configuration yaml file"),
        )
        .subcommand(
            Command::new("new-extractor")
                .about("Make a template extractor configuration yaml file"),
        )
        .subcommand(Command::new("generate").about("Generate pipe networks from a configuration"))
        .subcommand(
            Command::new("extract").about("Extract a tensor dataset from simulator output"),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    match matches.subcommand() {
        Some(("new-generator", _)) => {
            log::info!(
                "Making a template generator config at {}...",
                config_path.to_string_lossy()
            );
            make_template_config::<GeneratorConfig>(&config_path);
        }
        Some(("new-extractor", _)) => {
            log::info!(
                "Making a template extractor config at {}...",
                config_path.to_string_lossy()
            );
            make_template_config::<ExtractorConfig>(&config_path);
        }
        Some(("generate", _)) => run_generator(&config_path, &pb_manager),
        Some(("extract", _)) => run_extractor(&config_path, &pb_manager),
        _ => log::error!("Unknown command; see --help"),
    }

    log::info!("Done.");
}
