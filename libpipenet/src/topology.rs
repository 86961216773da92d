use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

use super::config::GeneratorConfig;
use super::error::GeneratorError;
use super::network::{Network, Pipe};

/// Draw a pipe length then a pipe radius, each uniform within the configured bounds
fn draw_dimensions<R: Rng + ?Sized>(config: &GeneratorConfig, rng: &mut R) -> (f64, f64) {
    let length = rng.gen_range(config.min_pipe_length..=config.max_pipe_length);
    let radius = rng.gen_range(config.min_pipe_radius..=config.max_pipe_radius);
    (length, radius)
}

/// Grow a bounded-branching tree breadth first from a root at slot 0.
///
/// Each expanded pipe draws its branch count from [0, B], except the root which draws
/// from [1, B] so that the network is never a lone pipe unless max_depth is 0. Pipes at
/// max_depth are never expanded and make no draw. Children are named by their slot.
pub fn build_slot_tree<R: Rng + ?Sized>(
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Network, GeneratorError> {
    let layout = config.slot_layout()?;
    let mut network = Network::new(config.flow_value);

    let (length, radius) = draw_dimensions(config, rng);
    let root = network.add_pipe(Pipe::new(0, 0, length, radius));
    let mut queue = VecDeque::from([root]);

    while let Some(parent) = queue.pop_front() {
        let parent_slot = network.pipes()[parent].slot;
        let parent_depth = network.pipes()[parent].depth;
        if parent_depth >= layout.max_depth() {
            continue;
        }

        let min_branches = if parent == root { 1 } else { 0 };
        let n_branches = rng.gen_range(min_branches..=layout.branching());
        for branch in 0..n_branches {
            let slot = layout.child_slot(parent_slot, parent_depth, branch)?;
            let (length, radius) = draw_dimensions(config, rng);
            let child = network.add_pipe(Pipe::new(slot, parent_depth + 1, length, radius));
            network.connect(parent, child);
            queue.push_back(child);
        }
    }

    log::debug!(
        "Grew slot tree with {} pipes (capacity {})",
        network.len(),
        layout.capacity()
    );
    Ok(network)
}

/// Build a random recursive tree over a drawn number of pipes.
///
/// Pipe names are shuffled so any of them may end up as the root. Every pipe after the
/// first takes a parent uniformly from the pipes before it, which cannot form a cycle.
/// Depths come from a breadth-first pass afterwards, and the network is returned in
/// slot order.
pub fn build_recursive_tree<R: Rng + ?Sized>(
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Network, GeneratorError> {
    let pipe_count = rng.gen_range(config.min_pipe_count..=config.max_pipe_count);
    let mut pipes: Vec<Pipe> = (0..pipe_count)
        .map(|slot| {
            let (length, radius) = draw_dimensions(config, rng);
            Pipe::new(slot, 0, length, radius)
        })
        .collect();

    let root_index = rng.gen_range(0..pipe_count);
    pipes.swap(0, root_index);
    pipes[1..].shuffle(rng);

    let mut network = Network::new(config.flow_value);
    for pipe in pipes {
        network.add_pipe(pipe);
    }
    for child in 1..pipe_count {
        let parent = rng.gen_range(0..child);
        network.connect(parent, child);
    }

    network.assign_depths()?;
    network.sort_by_slot();
    log::debug!("Grew recursive tree with {pipe_count} pipes");
    Ok(network)
}
