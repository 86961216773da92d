use super::config::LeafReceiver;
use super::network::{Network, Receiver};

/// Terminate every leaf pipe with a sink and a receiver.
///
/// A leaf is a pipe with no right connections. Sinks are numbered from 1 in pipe order.
/// A ring receiver sits `thickness` before the pipe end; a sphere receiver fills the pipe
/// cross-section at its end. Receiver indices continue the network's global numbering.
/// Returns the number of leaves terminated.
pub fn terminate_leaves(network: &mut Network, receiver: LeafReceiver, thickness: f64) -> usize {
    let leaves: Vec<usize> = network
        .pipes()
        .iter()
        .enumerate()
        .filter(|(_, p)| p.right_connections.is_empty())
        .map(|(position, _)| position)
        .collect();

    for position in leaves.iter() {
        network.add_sink(*position);
        let index = network.next_receiver_index();
        let pipe = &mut network.pipes_mut()[*position];
        let leaf_receiver = match receiver {
            LeafReceiver::Ring => Receiver::ring(index, pipe.length - thickness, thickness),
            LeafReceiver::Sphere => Receiver::sphere(index, pipe.length, 0.0, 0.0, pipe.radius),
        };
        pipe.receivers.push(leaf_receiver);
    }
    leaves.len()
}
