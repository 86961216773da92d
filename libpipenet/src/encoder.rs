use ndarray::{s, Array2};

use super::config::ExtractorConfig;
use super::constants::{
    ABSENT_FILL, CHILDREN_COLUMN, DEPTH_COLUMN, FEATURE_WIDTH, LENGTH_COLUMN, MASK_COLUMN,
    PEAK_COLUMN, RADIUS_COLUMN, RECEIVER_COLUMN, UNRESOLVED_SLOT,
};
use super::run::{Reconstruction, TargetRecord};

/// Maxima used to normalize the pipe features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub l_max: f64,
    pub r_max: f64,
    pub max_depth: usize,
    pub max_children: usize,
}

impl Normalization {
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            l_max: config.l_max,
            r_max: config.r_max,
            max_depth: config.max_depth,
            max_children: config.max_branches,
        }
    }

    /// Replace the length and radius maxima, e.g. with values observed over a dataset
    pub fn with_maxima(self, l_max: f64, r_max: f64) -> Self {
        Self {
            l_max,
            r_max,
            ..self
        }
    }
}

/// value / max, unbounded above. A non-positive max yields 0.
fn normalize(value: f64, max: f64) -> f32 {
    if max > 0.0 {
        (value / max) as f32
    } else {
        0.0
    }
}

/// min(count, max) / max. A zero max yields 0.
fn normalize_count(count: usize, max: usize) -> f32 {
    if max > 0 {
        (count.min(max) as f64 / max as f64) as f32
    } else {
        0.0
    }
}

fn flag(value: bool) -> f32 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Pack a reconstruction into a [capacity, FEATURE_WIDTH] tensor.
///
/// Every row starts as an absent row (all fields ABSENT_FILL, mask 1). Each reconstructed
/// pipe overwrites the row at its slot with its normalized features and mask 0. Length and
/// radius are divided by their maxima and may exceed 1; depth and child count are capped at
/// their maxima first. Pipes at or beyond `capacity` are ignored; the reconstructor has
/// already dealt with them.
pub fn encode_features(
    reconstruction: &Reconstruction,
    norm: &Normalization,
    capacity: usize,
) -> Array2<f32> {
    let mut features = Array2::<f32>::from_elem((capacity, FEATURE_WIDTH), ABSENT_FILL);
    for pipe in reconstruction.pipes.values().filter(|p| p.slot < capacity) {
        let mut row = features.slice_mut(s![pipe.slot, ..]);
        row[LENGTH_COLUMN] = normalize(pipe.length, norm.l_max);
        row[RADIUS_COLUMN] = normalize(pipe.radius, norm.r_max);
        row[DEPTH_COLUMN] = normalize_count(pipe.depth, norm.max_depth);
        row[CHILDREN_COLUMN] = normalize_count(pipe.child_count, norm.max_children);
        row[RECEIVER_COLUMN] = flag(pipe.has_receiver);
        row[PEAK_COLUMN] = pipe.peak_time as f32;
        row[MASK_COLUMN] = 0.0;
    }
    features
}

/// Emitter label of one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Label {
    /// Slot of the emitter pipe, or UNRESOLVED_SLOT
    pub pipe_slot: i32,
    /// Axial emitter position over l_max
    pub z: f32,
}

impl Label {
    pub fn unresolved() -> Self {
        Self {
            pipe_slot: UNRESOLVED_SLOT,
            z: 0.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.pipe_slot != UNRESOLVED_SLOT
    }
}

/// Map the target record onto a label. A target pipe that was not reconstructed, or a
/// missing target, gives an unresolved label; the sample is still usable.
pub fn encode_label(
    target: Option<&TargetRecord>,
    reconstruction: &Reconstruction,
    norm: &Normalization,
) -> Label {
    let Some(target) = target else {
        return Label::unresolved();
    };
    match reconstruction.pipes.get(&target.pipe) {
        Some(pipe) => match i32::try_from(pipe.slot) {
            Ok(pipe_slot) => Label {
                pipe_slot,
                z: (target.z / norm.l_max) as f32,
            },
            Err(_) => Label::unresolved(),
        },
        None => Label::unresolved(),
    }
}

/// One encoded run
#[derive(Debug, Clone)]
pub struct Sample {
    pub run_name: String,
    pub features: Array2<f32>,
    pub label: Label,
}
