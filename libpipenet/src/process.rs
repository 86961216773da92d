use ndarray::{s, Array1, Array3};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use super::config::ExtractorConfig;
use super::constants::FEATURE_WIDTH;
use super::encoder::{encode_features, encode_label, Normalization, Sample};
use super::error::ProcessorError;
use super::hdf_writer::{ArchiveAttributes, HDFWriter, SplitData};
use super::run::{reconstruct, Run};
use super::worker_status::{Stage, WorkerStatus};

/// Fraction of a worker's runs between progress messages
const FLUSH_FRAC: f32 = 0.01;

/// Divide a list of items into per-worker subsets, dealt round robin.
/// Each item keeps its position in the original list.
pub fn create_subsets<T: Clone>(items: &[T], n_threads: usize) -> Vec<Vec<(usize, T)>> {
    let mut subsets: Vec<Vec<(usize, T)>> = vec![Vec::new(); n_threads.max(1)];
    let n_subsets = subsets.len();

    for (idx, item) in items.iter().enumerate() {
        subsets[idx % n_subsets].push((idx, item.clone()))
    }

    subsets
}

/// Shuffle the runs with the configured seed and cut them into train, validation and test.
/// Train and validation take floor(n * ratio) runs; test takes the rest.
pub fn split_runs(mut runs: Vec<PathBuf>, config: &ExtractorConfig) -> Vec<(Stage, Vec<PathBuf>)> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    runs.shuffle(&mut rng);
    let n_runs = runs.len() as f64;
    let n_train = ((n_runs * config.train_ratio).floor() as usize).min(runs.len());
    let n_val = ((n_runs * config.val_ratio).floor() as usize).min(runs.len() - n_train);
    let test = runs.split_off(n_train + n_val);
    let val = runs.split_off(n_train);
    vec![
        (Stage::Train, runs),
        (Stage::Validation, val),
        (Stage::Test, test),
    ]
}

/// Largest pipe length and radius over every readable run, if any pipe was seen
pub fn scan_global_maxima(runs: &[PathBuf]) -> Option<(f64, f64)> {
    let mut maxima: Option<(f64, f64)> = None;
    for path in runs {
        let run = match Run::read(path) {
            Ok(run) => run,
            Err(e) => {
                log::warn!("Maxima scan skipping {}: {e}", path.to_string_lossy());
                continue;
            }
        };
        for pipe in run.pipes.iter() {
            let (l_max, r_max) = maxima.unwrap_or((0.0, 0.0));
            maxima = Some((l_max.max(pipe.length), r_max.max(pipe.radius)));
        }
    }
    maxima
}

/// Read, reconstruct and encode a single run.
///
/// An unreadable run is logged and gives None. A slot overflow under the fail policy is
/// the only error.
pub fn process_run(
    path: &Path,
    config: &ExtractorConfig,
    norm: &Normalization,
    capacity: usize,
) -> Result<Option<Sample>, ProcessorError> {
    let run = match Run::read(path) {
        Ok(run) => run,
        Err(e) => {
            log::warn!("Skipping run {}: {e}", path.to_string_lossy());
            return Ok(None);
        }
    };
    let reconstruction = reconstruct(
        &run,
        capacity,
        config.slot_overflow,
        config.compression_window,
    )?;
    let label = encode_label(run.target.as_ref(), &reconstruction, norm);
    if !label.is_resolved() {
        log::warn!("Run {} has no resolvable emitter pipe; label set to -1", run.name);
    }

    log::debug!(
        "Run {}: {} pipes, {} skipped, label slot {} z {:.4}",
        run.name,
        reconstruction.pipes.len(),
        reconstruction.skipped,
        label.pipe_slot,
        label.z
    );
    for pipe in reconstruction.pipes.values() {
        if let Some(stats) = pipe.statistics.as_ref() {
            log::debug!(
                "  pipe{} depth {} children {} peak {:.3} first {:?} max {}@{} total {} mean {:.3} std {:.3} skew {:.3}",
                pipe.slot,
                pipe.depth,
                pipe.child_count,
                pipe.peak_time,
                stats.first_nonzero_index,
                stats.max_value,
                stats.max_index,
                stats.total,
                stats.mean,
                stats.std,
                stats.skewness
            );
        }
    }

    Ok(Some(Sample {
        run_name: run.name,
        features: encode_features(&reconstruction, norm, capacity),
        label,
    }))
}

/// Process a subset of runs, reporting progress under the given stage
fn process_subset(
    subset: &[(usize, PathBuf)],
    config: &ExtractorConfig,
    norm: &Normalization,
    capacity: usize,
    stage: Stage,
    tx: &Sender<WorkerStatus>,
    worker_id: usize,
) -> Result<Vec<(usize, Sample)>, ProcessorError> {
    let mut samples = Vec::with_capacity(subset.len());
    let mut last_report: f32 = 0.0;
    tx.send(WorkerStatus::new(0.0, stage, worker_id))?;
    for (count, (idx, path)) in subset.iter().enumerate() {
        if let Some(sample) = process_run(path, config, norm, capacity)? {
            samples.push((*idx, sample));
        }
        let progress = (count + 1) as f32 / subset.len() as f32;
        if progress - last_report >= FLUSH_FRAC {
            last_report = progress;
            tx.send(WorkerStatus::new(progress, stage, worker_id))?;
        }
    }
    tx.send(WorkerStatus::new(1.0, stage, worker_id))?;
    Ok(samples)
}

/// Stack samples, in order, into the arrays of one split
pub fn stack_samples(samples: &[Sample], capacity: usize) -> SplitData {
    let mut features = Array3::<f32>::zeros((samples.len(), capacity, FEATURE_WIDTH));
    for (idx, sample) in samples.iter().enumerate() {
        features
            .slice_mut(s![idx, .., ..])
            .assign(&sample.features);
    }
    SplitData {
        features,
        pipe_labels: samples.iter().map(|s| s.label.pipe_slot).collect::<Array1<i32>>(),
        z_labels: samples.iter().map(|s| s.label.z).collect::<Array1<f32>>(),
    }
}

/// Encode every run of a split on `n_threads` scoped worker threads.
///
/// Samples come back in the order of `runs` whatever the thread count.
pub fn process_split(
    stage: Stage,
    runs: &[PathBuf],
    config: &ExtractorConfig,
    norm: &Normalization,
    tx: &Sender<WorkerStatus>,
) -> Result<SplitData, ProcessorError> {
    let capacity = config.slot_layout()?.capacity();
    let subsets = create_subsets(runs, config.n_threads as usize);

    let results: Vec<Result<Vec<(usize, Sample)>, ProcessorError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = subsets
            .iter()
            .enumerate()
            .filter(|(_, subset)| !subset.is_empty())
            .map(|(worker_id, subset)| {
                let tx = tx.clone();
                scope.spawn(move || {
                    process_subset(subset, config, norm, capacity, stage, &tx, worker_id)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(ProcessorError::WorkerPanic)))
            .collect()
    });

    let mut indexed: Vec<(usize, Sample)> = Vec::with_capacity(runs.len());
    for result in results {
        indexed.extend(result?);
    }
    indexed.sort_by_key(|(idx, _)| *idx);
    let samples: Vec<Sample> = indexed.into_iter().map(|(_, sample)| sample).collect();
    log::info!(
        "Split {stage}: {} of {} runs encoded",
        samples.len(),
        runs.len()
    );
    Ok(stack_samples(&samples, capacity))
}

/// The main loop of the extractor.
///
/// Splits the runs in the data path, encodes each split and writes them all to one archive.
/// Returns the path to the archive.
pub fn process(
    config: &ExtractorConfig,
    tx: &Sender<WorkerStatus>,
) -> Result<PathBuf, ProcessorError> {
    config.validate()?;
    let layout = config.slot_layout()?;
    let runs = config.get_run_directories()?;
    log::info!(
        "Found {} runs in {}",
        runs.len(),
        config.data_path.to_string_lossy()
    );

    let mut norm = Normalization::from_config(config);
    if config.derive_maxima {
        match scan_global_maxima(&runs) {
            Some((l_max, r_max)) => {
                log::info!("Using observed maxima l_max = {l_max}, r_max = {r_max}");
                norm = norm.with_maxima(l_max, r_max);
            }
            None => log::warn!("No pipes found while scanning maxima; using configured values"),
        }
    }

    let hdf_path = config.get_hdf_file_name()?;
    let writer = HDFWriter::new(
        &hdf_path,
        &ArchiveAttributes {
            l_max: norm.l_max,
            r_max: norm.r_max,
            max_depth: layout.max_depth(),
            max_branches: layout.branching(),
            max_slots: layout.capacity(),
            compression_window: config.compression_window,
        },
    )?;

    for (stage, split) in split_runs(runs, config) {
        log::info!("Processing split {stage} with {} runs...", split.len());
        let data = process_split(stage, &split, config, &norm, tx)?;
        writer.write_split(stage, &data)?;
    }
    writer.close()?;
    Ok(hdf_path)
}
