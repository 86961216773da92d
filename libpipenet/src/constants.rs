// Shared constants for the generator and the extractor. The naming scheme here is the
// only contract between the two halves: the simulator copies pipe names from the
// generated YAML into its output folders, and the extractor turns them back into slots.

/// Prefix of every pipe name, e.g. `pipe12`
pub const PIPE_PREFIX: &str = "pipe";
/// Prefix of every sink name, e.g. `sink3`
pub const SINK_PREFIX: &str = "sink";

/// Receiver type tags as understood by the simulator
pub const RING_RECEIVER_TYPE: &str = "Ring type with thickness";
pub const SPHERE_RECEIVER_TYPE: &str = "Sphere type";
/// Counting mode of an absorbing receiver
pub const ABSORBING_COUNTING_TYPE: u8 = 0;
/// Emitter pattern type; the pattern itself is a particle count
pub const EMITTER_PATTERN_TYPE: &str = "complete";

// Placement margins, as fractions of pipe length/radius
pub const Z_MARGIN: f64 = 0.9;
pub const R_MIN_FRACTION: f64 = 0.1;
pub const R_MAX_FRACTION: f64 = 0.9;
pub const SPHERE_R_MAX_FRACTION: f64 = 0.2;
pub const SPHERE_RADIUS_MIN_FRACTION: f64 = 0.1;
pub const SPHERE_RADIUS_MAX_FRACTION: f64 = 0.3;
// Random receivers per network, as fractions of the pipe count
pub const RECEIVER_COUNT_MIN_FRACTION: f64 = 0.5;
pub const RECEIVER_COUNT_MAX_FRACTION: f64 = 1.5;

/// Simulator output file names
pub const TARGET_FILE_NAME: &str = "targetOutput.txt";
pub const SIMULATION_DATA_FILE_NAME: &str = "simulation_data.txt";
pub const RECEIVER_FILE_PREFIX: &str = "#";
pub const RECEIVER_FILE_SUFFIX: &str = ".txt";
/// Receiver files whose type contains this tag feed the pipe features
pub const RING_FILE_TAG: &str = "Ring";
/// Parent sentinels written for the root pipe
pub const ROOT_PARENT_SENTINELS: [&str; 2] = ["none", "-1"];
/// Minimum whitespace separated fields in a simulation_data.txt line
pub const PIPE_RECORD_FIELDS: usize = 5;
/// Minimum whitespace separated fields in a targetOutput.txt line
pub const TARGET_RECORD_FIELDS: usize = 3;

/// Number of features per pipe row: length, radius, depth, children, has_receiver, t_peak, mask
pub const FEATURE_WIDTH: usize = 7;
pub const LENGTH_COLUMN: usize = 0;
pub const RADIUS_COLUMN: usize = 1;
pub const DEPTH_COLUMN: usize = 2;
pub const CHILDREN_COLUMN: usize = 3;
pub const RECEIVER_COLUMN: usize = 4;
pub const PEAK_COLUMN: usize = 5;
pub const MASK_COLUMN: usize = 6;
/// Fill value for every field of an absent row. Deliberately outside the normalized range.
pub const ABSENT_FILL: f32 = 1.0;
/// Label value for an emitter pipe that was never reconstructed
pub const UNRESOLVED_SLOT: i32 = -1;

/// Output archive format version
pub const FORMAT_VERSION: &str = "1.0";
