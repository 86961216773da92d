use rand::Rng;
use std::f64::consts::TAU;

use super::config::GeneratorConfig;
use super::constants::{
    EMITTER_PATTERN_TYPE, RECEIVER_COUNT_MAX_FRACTION, RECEIVER_COUNT_MIN_FRACTION,
    R_MAX_FRACTION, R_MIN_FRACTION, SPHERE_RADIUS_MAX_FRACTION, SPHERE_RADIUS_MIN_FRACTION,
    SPHERE_R_MAX_FRACTION, Z_MARGIN,
};
use super::error::NetworkError;
use super::network::{Emitter, Network, Pipe, Receiver};

/// Cumulative-distribution sampler over a fixed array of weights.
///
/// Negative and non-finite weights count as zero. If nothing has positive weight the
/// sampler falls back to a uniform choice.
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    cumulative: Vec<f64>,
    total: f64,
}

impl WeightedSampler {
    /// Returns None for an empty pool
    pub fn new(weights: &[f64]) -> Option<Self> {
        if weights.is_empty() {
            return None;
        }
        let mut total = 0.0;
        let cumulative = weights
            .iter()
            .map(|w| {
                if w.is_finite() && *w > 0.0 {
                    total += w;
                }
                total
            })
            .collect();
        Some(Self { cumulative, total })
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    /// Draw one index
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if !(self.total > 0.0 && self.total.is_finite()) {
            return rng.gen_range(0..self.len());
        }
        let target = rng.gen::<f64>() * self.total;
        let index = self.cumulative.partition_point(|c| *c <= target);
        index.min(self.len() - 1)
    }
}

/// Per-pipe emitter weights, exp(-alpha * depth) normalized to sum to 1.
///
/// alpha is 1 / (deepest depth + 1), or 1 for a network with no depth, so pipes near the
/// root are favoured.
pub fn depth_weights(network: &Network) -> Vec<f64> {
    let deepest = network.pipes().iter().map(|p| p.depth).max().unwrap_or(0);
    let alpha = if deepest > 0 {
        1.0 / (deepest as f64 + 1.0)
    } else {
        1.0
    };
    let weights: Vec<f64> = network
        .pipes()
        .iter()
        .map(|p| (-alpha * p.depth as f64).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Draw an emitter strictly inside the pipe: z, then r, then theta, then the particle count
fn draw_emitter<R: Rng + ?Sized>(pipe: &Pipe, config: &GeneratorConfig, rng: &mut R) -> Emitter {
    let z = rng.gen_range(-Z_MARGIN * pipe.length..=Z_MARGIN * pipe.length);
    let r = rng.gen_range(R_MIN_FRACTION * pipe.radius..=R_MAX_FRACTION * pipe.radius);
    let theta = rng.gen_range(0.0..TAU);
    let particles = rng.gen_range(config.min_particle_count..=config.max_particle_count);
    Emitter {
        z,
        r,
        theta,
        emitter_pattern: particles.to_string(),
        emitter_pattern_type: String::from(EMITTER_PATTERN_TYPE),
    }
}

/// Place the network's single emitter on a depth-weighted pipe. Returns the pipe's position.
pub fn place_emitter<R: Rng + ?Sized>(
    network: &mut Network,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<usize, NetworkError> {
    let sampler = WeightedSampler::new(&depth_weights(network)).ok_or(NetworkError::Empty)?;
    let position = sampler.sample(rng);
    let emitter = draw_emitter(&network.pipes()[position], config, rng);
    network.pipes_mut()[position].emitters.push(emitter);
    Ok(position)
}

/// Add an emitter to a uniformly chosen pipe of an existing network
pub fn inject_emitter<R: Rng + ?Sized>(
    network: &mut Network,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<usize, NetworkError> {
    if network.is_empty() {
        return Err(NetworkError::Empty);
    }
    let position = rng.gen_range(0..network.len());
    let emitter = draw_emitter(&network.pipes()[position], config, rng);
    network.pipes_mut()[position].emitters.push(emitter);
    Ok(position)
}

/// Scatter sphere receivers over uniformly chosen pipes.
///
/// The count is drawn from [0.5 n, 1.5 n] for n pipes, and a pipe may receive any number
/// of them. Returns the number placed.
pub fn place_receivers<R: Rng + ?Sized>(network: &mut Network, rng: &mut R) -> usize {
    let n_pipes = network.len();
    if n_pipes == 0 {
        return 0;
    }
    let min_count = (RECEIVER_COUNT_MIN_FRACTION * n_pipes as f64) as usize;
    let max_count = (RECEIVER_COUNT_MAX_FRACTION * n_pipes as f64) as usize;
    let count = rng.gen_range(min_count..=max_count);
    for _ in 0..count {
        let position = rng.gen_range(0..n_pipes);
        let length = network.pipes()[position].length;
        let radius = network.pipes()[position].radius;
        let z = rng.gen_range(-Z_MARGIN * length..=Z_MARGIN * length);
        let r = rng.gen_range(R_MIN_FRACTION * radius..=SPHERE_R_MAX_FRACTION * radius);
        let sphere_radius = rng.gen_range(
            SPHERE_RADIUS_MIN_FRACTION * radius..=SPHERE_RADIUS_MAX_FRACTION * radius,
        );
        let theta = rng.gen_range(0.0..TAU);
        let index = network.next_receiver_index();
        network.pipes_mut()[position]
            .receivers
            .push(Receiver::sphere(index, z, r, theta, sphere_radius));
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::ReceiverKind;
    use crate::topology::build_slot_tree;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sampler_respects_zero_weights() {
        let sampler = WeightedSampler::new(&[0.0, 2.0, 0.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            assert_eq!(sampler.sample(&mut rng), 1);
        }
    }

    #[test]
    fn test_sampler_uniform_fallback() {
        let sampler = WeightedSampler::new(&[0.0, 0.0, 0.0, f64::NAN]).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut seen = [false; 4];
        for _ in 0..400 {
            seen[sampler.sample(&mut rng)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_sampler_empty_pool() {
        assert!(WeightedSampler::new(&[]).is_none());
    }

    #[test]
    fn test_sampler_frequencies() {
        let sampler = WeightedSampler::new(&[1.0, 3.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let hits = (0..10_000).filter(|_| sampler.sample(&mut rng) == 1).count();
        assert!(hits > 7_000 && hits < 8_000);
    }

    #[test]
    fn test_depth_weights() {
        let config = GeneratorConfig::default();
        let network = build_slot_tree(&config, &mut StdRng::seed_from_u64(2)).unwrap();
        let weights = depth_weights(&network);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        for (pipe, weight) in network.pipes().iter().zip(weights.iter()) {
            assert!(*weight <= weights[0] || pipe.depth == 0);
        }
    }

    #[test]
    fn test_emitter_within_envelope() {
        let config = GeneratorConfig::default();
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut network = build_slot_tree(&config, &mut rng).unwrap();
            let position = place_emitter(&mut network, &config, &mut rng).unwrap();
            assert_eq!(network.emitter_count(), 1);
            let pipe = &network.pipes()[position];
            let emitter = &pipe.emitters[0];
            assert!(emitter.z.abs() <= 0.9 * pipe.length);
            assert!(emitter.r >= 0.1 * pipe.radius && emitter.r <= 0.9 * pipe.radius);
            assert!(emitter.theta >= 0.0 && emitter.theta < TAU);
            let particles: u64 = emitter.emitter_pattern.parse().unwrap();
            assert!((1000..=2000).contains(&particles));
            assert_eq!(emitter.emitter_pattern_type, "complete");
        }
    }

    #[test]
    fn test_single_pipe_gets_emitter() {
        let config = GeneratorConfig {
            max_depth: 0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = build_slot_tree(&config, &mut rng).unwrap();
        assert_eq!(depth_weights(&network), vec![1.0]);
        assert_eq!(place_emitter(&mut network, &config, &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_receivers_are_numbered_and_bounded() {
        let config = GeneratorConfig::default();
        let mut rng = StdRng::seed_from_u64(4);
        let mut network = build_slot_tree(&config, &mut rng).unwrap();
        let count = place_receivers(&mut network, &mut rng);
        let n = network.len();
        assert!(count >= n / 2 && count <= (3 * n) / 2);
        assert_eq!(network.receiver_count(), count);
        let mut names: Vec<String> = Vec::new();
        for pipe in network.pipes() {
            for receiver in pipe.receivers.iter() {
                assert_eq!(receiver.kind, ReceiverKind::Sphere);
                let r = receiver.r.unwrap();
                assert!(r >= 0.1 * pipe.radius && r <= 0.2 * pipe.radius);
                names.push(receiver.name.clone());
            }
        }
        for index in 1..=count {
            assert!(names.contains(&format!("#{index}-Sphere type")));
        }
    }
}
