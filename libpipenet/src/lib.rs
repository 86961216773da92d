//! # pipenet
//!
//! pipenet builds training data for locating a particle emitter inside a network of pipes.
//! It has two halves which share only the pipe naming scheme:
//!
//! - The generator writes random pipe networks (trees of pipes with one emitter and a
//! sink and receiver on every leaf) as YAML files that a particle-flow simulator can run.
//! - The extractor reads the simulator's per-run output folders back, rebuilds each run's
//! topology, reduces the receiver time series and packs everything into fixed-shape
//! tensors in a single HDF5 archive split into train, validation and test sets.
//!
//! ## Installation
//!
//! The only method of install is from source, which is laid out below.
//!
//! ### Rust
//!
//! If you have not used Rust before, you will most likely need to install the Rust tool
//! chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for installation
//! instructions.
//!
//! ### HDF5
//!
//! Before building and running pipenet, HDF5 must be installed. Typically this will be
//! installed using a package manager (homebrew, apt, etc), and the Rust libraries will
//! auto detect the location of the HDF install. If HDF5 lives in a custom location, write
//! the following snippet into `.cargo/config.toml` in the repository:
//!
//! ```toml
//! [env]
//! HDF5_DIR="/path/to/my/hdf5/install/"
//!
//! [build]
//! rustflags="-C link-args=-Wl,-rpath,/path/to/my/hdf5/install/lib"
//! ```
//!
//! ### Building & Install
//!
//! To build and install the CLI use `cargo install --path ./pipenet_cli` from the top level
//! of the repository. See `pipenet_cli --help` for the available commands.
//!
//! ## Slot addressing
//!
//! Pipes of a generated tree are named `pipe<slot>`. With branching factor B, the first
//! slot at depth d is (B^d - 1) / (B - 1), and the k-th child of the pipe at slot p and
//! depth d is at first(d + 1) + B * (p - first(d)) + k. A tree of maximum depth D holds at
//! most sum(B^i, i = 0..=D) pipes, which is also the number of rows of a feature tensor.
//!
//! ## Configuration
//!
//! Both halves are driven by YAML configuration files. A generator configuration:
//!
//! ```yml
//! output_path: None
//! n_networks: 1000
//! seed: null
//! variant: slot_tree
//! max_branches: 4
//! max_depth: 5
//! min_pipe_count: 10
//! max_pipe_count: 20
//! min_pipe_radius: 0.0001
//! max_pipe_radius: 0.0005
//! min_pipe_length: 0.002
//! max_pipe_length: 0.005
//! flow_value: 0.0002
//! flow_policy: uniform
//! min_particle_count: 1000
//! max_particle_count: 2000
//! receiver_thickness: 0.0005
//! leaf_receiver: ring
//! random_receivers: true
//! base_network_path: null
//! ```
//!
//! `variant` is one of `slot_tree`, `recursive_tree` or `emitter_injection`; the last one
//! copies the network at `base_network_path` and gives each copy one random emitter.
//!
//! An extractor configuration:
//!
//! ```yml
//! data_path: None
//! hdf_path: None
//! max_branches: 4
//! max_depth: 5
//! l_max: 0.005
//! r_max: 0.0005
//! derive_maxima: false
//! compression_window: 10
//! train_ratio: 0.7
//! val_ratio: 0.15
//! test_ratio: 0.15
//! seed: 42
//! slot_overflow: skip
//! n_threads: 1
//! ```
//!
//! ## Simulator output
//!
//! The extractor expects `data_path` to hold one directory per run. Each run holds a
//! `targetOutput.txt` (`<emitter pipe> <r> <z>`) and one `pipe*` folder per pipe, with a
//! `simulation_data.txt` (`<pipe> <parent|none> <length> <radius> <receiver count>`) and
//! one `#<index>-<type>.txt` file per receiver (counting mode on the first line, the comma
//! separated count series on the last).
//!
//! ### HDF5 Data Format
//!
//! ```text
//! dataset.h5 - version, l_max, r_max, max_depth, max_branches, max_slots, compression_window
//! |---- train - n_samples
//! |    |---- features(dset) [N, max_slots, 7]
//! |    |---- pipe_labels(dset) [N]
//! |    |---- z_labels(dset) [N]
//! |---- val
//! |---- test
//! ```
//!
//! Feature rows are indexed by slot and hold normalized length, radius, depth and child
//! count, a receiver flag, the normalized peak time and a mask. Rows of absent pipes are
//! filled with 1 and have mask 1. A pipe label of -1 marks a run whose emitter pipe was
//! not reconstructed.
pub mod config;
pub mod constants;
pub mod encoder;
pub mod error;
pub mod flow;
pub mod generator;
pub mod hdf_writer;
pub mod leaf;
pub mod network;
pub mod placement;
pub mod process;
pub mod run;
pub mod signal;
pub mod slot;
pub mod topology;
pub mod worker_status;
