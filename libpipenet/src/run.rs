use fxhash::FxHashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::config::SlotOverflow;
use super::constants::{
    ABSORBING_COUNTING_TYPE, PIPE_PREFIX, PIPE_RECORD_FIELDS, RECEIVER_FILE_PREFIX,
    RECEIVER_FILE_SUFFIX, RING_FILE_TAG, ROOT_PARENT_SENTINELS, SIMULATION_DATA_FILE_NAME,
    TARGET_FILE_NAME, TARGET_RECORD_FIELDS,
};
use super::error::{ReconstructError, RecordError, RunError};
use super::signal::{compress, peak_time_normalized, SignalStatistics};

/// Parse a pipe identifier written as `N`, `pipeN` or `pipeN-M`
pub fn parse_pipe_id(field: &str) -> Result<usize, RecordError> {
    let stripped = field.strip_prefix(PIPE_PREFIX).unwrap_or(field);
    let number = stripped.split('-').next().unwrap_or_default();
    number
        .parse()
        .map_err(|_| RecordError::BadIdentifier(field.to_string()))
}

/// Parse a parent field. The root sentinels parse to None.
pub fn parse_parent_id(field: &str) -> Result<Option<usize>, RecordError> {
    if ROOT_PARENT_SENTINELS.contains(&field) {
        Ok(None)
    } else {
        parse_pipe_id(field).map(Some)
    }
}

fn parse_f64(field: &str) -> Result<f64, RecordError> {
    field
        .parse()
        .map_err(|_| RecordError::BadNumber(field.to_string()))
}

/// One line of a pipe's simulation_data.txt
#[derive(Debug, Clone, PartialEq)]
pub struct PipeRecord {
    pub id: usize,
    pub parent: Option<usize>,
    pub length: f64,
    pub radius: f64,
    pub receiver_count: usize,
}

impl PipeRecord {
    pub fn new(id: usize, parent: Option<usize>, length: f64, radius: f64) -> Self {
        Self {
            id,
            parent,
            length,
            radius,
            receiver_count: 0,
        }
    }
}

impl FromStr for PipeRecord {
    type Err = RecordError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() < PIPE_RECORD_FIELDS {
            return Err(RecordError::TooFewFields(fields.len(), PIPE_RECORD_FIELDS));
        }
        let length = parse_f64(fields[2])?;
        let radius = parse_f64(fields[3])?;
        for value in [length, radius] {
            if !(value.is_finite() && value > 0.0) {
                return Err(RecordError::BadDimension(value));
            }
        }
        Ok(Self {
            id: parse_pipe_id(fields[0])?,
            parent: parse_parent_id(fields[1])?,
            length,
            radius,
            receiver_count: fields[4]
                .parse()
                .map_err(|_| RecordError::BadNumber(fields[4].to_string()))?,
        })
    }
}

/// One receiver output file
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverRecord {
    pub index: usize,
    pub kind: String,
    pub absorbing: bool,
    pub series: Vec<u64>,
}

impl ReceiverRecord {
    /// Split a `#<index>-<type>.txt` file name into index and type
    pub fn parse_file_name(name: &str) -> Result<(usize, String), RecordError> {
        let bad_name = || RecordError::BadReceiverName(name.to_string());
        let stem = name
            .strip_prefix(RECEIVER_FILE_PREFIX)
            .and_then(|s| s.strip_suffix(RECEIVER_FILE_SUFFIX))
            .ok_or_else(bad_name)?;
        let (index, kind) = stem.split_once('-').ok_or_else(bad_name)?;
        let index = index.parse().map_err(|_| bad_name())?;
        Ok((index, kind.to_string()))
    }

    /// Parse the file contents: counting mode on the first line, the comma separated
    /// series on the last non-empty line. A pipe-info line between them is ignored.
    ///
    /// A file holding only the header, or the header and the pipe-info line, has an empty
    /// series. An empty file has no header and is an error.
    pub fn parse(index: usize, kind: &str, contents: &str) -> Result<Self, RecordError> {
        let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
        let header = lines.next().ok_or(RecordError::MissingSeries)?;
        let rest: Vec<&str> = lines.collect();
        let absorbing = header
            .split_whitespace()
            .next()
            .and_then(|mode| mode.parse::<u8>().ok())
            == Some(ABSORBING_COUNTING_TYPE);
        let series = match rest.last() {
            None => Vec::new(),
            Some(last) => match (parse_series(last), rest.len()) {
                (Ok(series), _) => series,
                // only the pipe-info line follows the header
                (Err(_), 1) => Vec::new(),
                (Err(e), _) => return Err(e),
            },
        };
        Ok(Self {
            index,
            kind: kind.to_string(),
            absorbing,
            series,
        })
    }

    /// Ring receivers are the ones whose series feed the pipe features
    pub fn is_ring(&self) -> bool {
        self.kind.contains(RING_FILE_TAG)
    }
}

fn parse_series(line: &str) -> Result<Vec<u64>, RecordError> {
    line.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| RecordError::BadNumber(v.to_string()))
        })
        .collect()
}

/// The contents of targetOutput.txt: emitter pipe, radial and axial position
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRecord {
    pub pipe: usize,
    pub r: f64,
    pub z: f64,
}

impl FromStr for TargetRecord {
    type Err = RecordError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        if fields.len() < TARGET_RECORD_FIELDS {
            return Err(RecordError::TooFewFields(
                fields.len(),
                TARGET_RECORD_FIELDS,
            ));
        }
        Ok(Self {
            pipe: parse_pipe_id(fields[0])?,
            r: parse_f64(fields[1])?,
            z: parse_f64(fields[2])?,
        })
    }
}

/// A single simulator run: flat pipe records, receivers keyed by owning pipe, and the target
#[derive(Debug, Clone, Default)]
pub struct Run {
    pub name: String,
    pub pipes: Vec<PipeRecord>,
    pub receivers: FxHashMap<usize, Vec<ReceiverRecord>>,
    pub target: Option<TargetRecord>,
}

fn read_first_line(path: &Path) -> Result<String, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    Ok(contents.lines().next().unwrap_or_default().to_string())
}

impl Run {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Read a run directory.
    ///
    /// Every `pipe*` subdirectory contributes its simulation_data.txt record and its
    /// receiver files. Missing or malformed files are logged and skipped; only an
    /// unreadable run directory is an error.
    pub fn read(path: &Path) -> Result<Self, RunError> {
        if !path.is_dir() {
            return Err(RunError::BadRunPath(path.to_path_buf()));
        }
        let mut run = Run::new(&path.file_name().unwrap_or_default().to_string_lossy());

        let target_path = path.join(TARGET_FILE_NAME);
        if target_path.exists() {
            match read_first_line(&target_path) {
                Ok(line) => match line.parse::<TargetRecord>() {
                    Ok(target) => run.target = Some(target),
                    Err(e) => log::warn!("Run {}: skipping target record: {e}", run.name),
                },
                Err(e) => log::warn!(
                    "Run {}: could not read {TARGET_FILE_NAME}: {e}",
                    run.name
                ),
            }
        } else {
            log::warn!("Run {}: no {TARGET_FILE_NAME} found", run.name);
        }

        let mut pipe_folders: Vec<PathBuf> = Vec::new();
        for item in path.read_dir()? {
            let item = item?;
            let is_pipe = item.file_name().to_string_lossy().starts_with(PIPE_PREFIX);
            if is_pipe && item.file_type()?.is_dir() {
                pipe_folders.push(item.path());
            }
        }
        pipe_folders.sort();

        for folder in pipe_folders {
            let folder_name = folder
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            let data_path = folder.join(SIMULATION_DATA_FILE_NAME);
            if !data_path.exists() {
                log::warn!(
                    "Run {}: skipping {folder_name}, no {SIMULATION_DATA_FILE_NAME}",
                    run.name
                );
                continue;
            }
            let line = match read_first_line(&data_path) {
                Ok(line) => line,
                Err(e) => {
                    log::warn!(
                        "Run {}: skipping {folder_name}, unreadable record: {e}",
                        run.name
                    );
                    continue;
                }
            };
            let record = match line.parse::<PipeRecord>() {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("Run {}: skipping {folder_name}: {e}", run.name);
                    continue;
                }
            };
            let receivers = read_receivers(&folder, &run.name)?;
            if !receivers.is_empty() {
                run.receivers.insert(record.id, receivers);
            }
            run.pipes.push(record);
        }
        Ok(run)
    }
}

/// Read every receiver file in a pipe folder, sorted by receiver index
fn read_receivers(folder: &Path, run_name: &str) -> Result<Vec<ReceiverRecord>, RunError> {
    let mut receivers = Vec::new();
    for item in folder.read_dir()? {
        let item_path = item?.path();
        let file_name = item_path.file_name().unwrap_or_default().to_string_lossy().to_string();
        if !file_name.starts_with(RECEIVER_FILE_PREFIX) {
            continue;
        }
        let parsed = ReceiverRecord::parse_file_name(&file_name).and_then(|(index, kind)| {
            let contents = std::fs::read_to_string(&item_path)
                .map_err(|_| RecordError::MissingSeries)?;
            ReceiverRecord::parse(index, &kind, &contents)
        });
        match parsed {
            Ok(receiver) => receivers.push(receiver),
            Err(e) => log::warn!("Run {run_name}: skipping receiver {file_name}: {e}"),
        }
    }
    receivers.sort_by_key(|r| r.index);
    Ok(receivers)
}

/// Result of walking parent references from a pipe towards the root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthWalk {
    Depth(usize),
    /// The walk revisited a pipe, or ran longer than the guard allows
    Malformed,
}

/// Count hops from `id` to the root.
///
/// The walk ends at the root sentinel or at a parent that has no record. It is bounded by
/// `guard` hops; a longer walk can only be a cycle.
pub fn walk_depth(
    id: usize,
    parents: &FxHashMap<usize, Option<usize>>,
    guard: usize,
) -> DepthWalk {
    let mut current = id;
    let mut depth = 0;
    loop {
        match parents.get(&current) {
            Some(Some(parent)) if parents.contains_key(parent) => {
                if *parent == id || depth >= guard {
                    return DepthWalk::Malformed;
                }
                depth += 1;
                current = *parent;
            }
            _ => return DepthWalk::Depth(depth),
        }
    }
}

/// A pipe rebuilt from its flat record
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedPipe {
    pub slot: usize,
    pub depth: usize,
    pub child_count: usize,
    pub length: f64,
    pub radius: f64,
    pub has_receiver: bool,
    pub peak_time: f64,
    pub statistics: Option<SignalStatistics>,
}

/// Reconstructed topology of a run, keyed by slot
#[derive(Debug, Clone, Default)]
pub struct Reconstruction {
    pub pipes: BTreeMap<usize, ReconstructedPipe>,
    pub skipped: usize,
}

/// Rebuild depth and child counts for every pipe of a run.
///
/// Pipes whose slot is at or beyond `capacity` are skipped (or fail the run under
/// `SlotOverflow::Fail`), as are duplicate and cyclic records. The first absorbing ring
/// receiver of a pipe sets its receiver flag and its peak time over the `window`-compressed
/// series; sphere receivers never do.
pub fn reconstruct(
    run: &Run,
    capacity: usize,
    overflow: SlotOverflow,
    window: usize,
) -> Result<Reconstruction, ReconstructError> {
    let mut reconstruction = Reconstruction::default();
    let mut parents: FxHashMap<usize, Option<usize>> = FxHashMap::default();
    let mut records: Vec<&PipeRecord> = Vec::with_capacity(run.pipes.len());
    for record in run.pipes.iter() {
        if parents.contains_key(&record.id) {
            log::warn!("Run {}: skipping duplicate record for pipe {}", run.name, record.id);
            reconstruction.skipped += 1;
            continue;
        }
        parents.insert(record.id, record.parent);
        records.push(record);
    }

    let mut child_counts: FxHashMap<usize, usize> = FxHashMap::default();
    for parent in parents.values().flatten() {
        *child_counts.entry(*parent).or_default() += 1;
    }

    for record in records {
        if record.id >= capacity {
            match overflow {
                SlotOverflow::Skip => {
                    log::warn!(
                        "Run {}: skipping pipe {}, slot exceeds capacity {capacity}",
                        run.name,
                        record.id
                    );
                    reconstruction.skipped += 1;
                    continue;
                }
                SlotOverflow::Fail => {
                    return Err(ReconstructError::SlotOverflow {
                        run: run.name.clone(),
                        slot: record.id,
                        capacity,
                    })
                }
            }
        }
        let depth = match walk_depth(record.id, &parents, parents.len()) {
            DepthWalk::Depth(depth) => depth,
            DepthWalk::Malformed => {
                log::warn!("Run {}: skipping pipe {}, parent chain loops", run.name, record.id);
                reconstruction.skipped += 1;
                continue;
            }
        };

        let absorbing = run
            .receivers
            .get(&record.id)
            .and_then(|receivers| receivers.iter().find(|r| r.absorbing && r.is_ring()));
        let (peak_time, statistics) = match absorbing {
            Some(receiver) => (
                peak_time_normalized(&compress(&receiver.series, window)),
                Some(SignalStatistics::from_series(&receiver.series)),
            ),
            None => (0.0, None),
        };

        reconstruction.pipes.insert(
            record.id,
            ReconstructedPipe {
                slot: record.id,
                depth,
                child_count: child_counts.get(&record.id).copied().unwrap_or(0),
                length: record.length,
                radius: record.radius,
                has_receiver: absorbing.is_some(),
                peak_time,
                statistics,
            },
        );
    }
    Ok(reconstruction)
}
