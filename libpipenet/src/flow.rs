use std::collections::VecDeque;

use super::config::FlowPolicy;
use super::error::NetworkError;
use super::network::Network;

/// Assign a flow to every pipe in the network.
///
/// Uniform gives every pipe `flow_value`. Proportional gives the root `flow_value` and
/// splits each pipe's flow over its children by radius, breadth first. Children of a pipe
/// whose children all have zero radius get zero flow. Draws no random numbers.
pub fn assign_flow(
    network: &mut Network,
    policy: FlowPolicy,
    flow_value: f64,
) -> Result<(), NetworkError> {
    match policy {
        FlowPolicy::Uniform => {
            for pipe in network.pipes_mut() {
                pipe.flow = flow_value;
            }
        }
        FlowPolicy::Proportional => {
            let root = network.root_position().ok_or(NetworkError::Empty)?;
            network.pipes_mut()[root].flow = flow_value;
            let mut queue = VecDeque::from([root]);
            while let Some(parent) = queue.pop_front() {
                let children = network.child_positions(parent);
                if children.is_empty() {
                    continue;
                }
                let parent_flow = network.pipes()[parent].flow;
                let total_radius: f64 = children.iter().map(|c| network.pipes()[*c].radius).sum();
                for child in children {
                    let pipe = &mut network.pipes_mut()[child];
                    pipe.flow = if total_radius > 0.0 {
                        parent_flow * pipe.radius / total_radius
                    } else {
                        0.0
                    };
                    queue.push_back(child);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;
    use crate::network::Pipe;
    use crate::topology::build_slot_tree;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_uniform_flow() {
        let config = GeneratorConfig::default();
        let mut network = build_slot_tree(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        assign_flow(&mut network, FlowPolicy::Uniform, 0.0002).unwrap();
        assert!(network.pipes().iter().all(|p| p.flow == 0.0002));
    }

    #[test]
    fn test_proportional_flow_is_conserved() {
        let config = GeneratorConfig::default();
        for seed in 0..20 {
            let mut network = build_slot_tree(&config, &mut StdRng::seed_from_u64(seed)).unwrap();
            assign_flow(&mut network, FlowPolicy::Proportional, 0.01).unwrap();
            assert_eq!(network.pipes()[0].flow, 0.01);
            for position in 0..network.len() {
                let children = network.child_positions(position);
                if children.is_empty() {
                    continue;
                }
                let total: f64 = children.iter().map(|c| network.pipes()[*c].flow).sum();
                let parent = network.pipes()[position].flow;
                assert!((total - parent).abs() <= 1e-12 * parent.max(1.0));
            }
        }
    }

    #[test]
    fn test_proportional_split_by_radius() {
        let mut network = Network::new(1.0);
        let root = network.add_pipe(Pipe::new(0, 0, 1.0, 1.0));
        let a = network.add_pipe(Pipe::new(1, 1, 1.0, 1.0));
        let b = network.add_pipe(Pipe::new(2, 1, 1.0, 3.0));
        network.connect(root, a);
        network.connect(root, b);
        assign_flow(&mut network, FlowPolicy::Proportional, 8.0).unwrap();
        assert_eq!(network.pipes()[a].flow, 2.0);
        assert_eq!(network.pipes()[b].flow, 6.0);
    }

    #[test]
    fn test_zero_radius_children_get_zero_flow() {
        let mut network = Network::new(1.0);
        let root = network.add_pipe(Pipe::new(0, 0, 1.0, 1.0));
        let a = network.add_pipe(Pipe::new(1, 1, 1.0, 0.0));
        network.connect(root, a);
        assign_flow(&mut network, FlowPolicy::Proportional, 5.0).unwrap();
        assert_eq!(network.pipes()[a].flow, 0.0);
    }
}
