use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use super::config::{GeneratorConfig, TreeVariant};
use super::error::{ConfigError, GeneratorError};
use super::flow::assign_flow;
use super::leaf::terminate_leaves;
use super::network::Network;
use super::placement::{inject_emitter, place_emitter, place_receivers};
use super::topology::{build_recursive_tree, build_slot_tree};
use super::worker_status::{Stage, WorkerStatus};

/// Fraction of the batch between progress messages
const PROGRESS_STEP: f32 = 0.01;

/// Generate one complete network.
///
/// Draw order is fixed: tree growth, flow (no draws), emitter, scattered receivers
/// (recursive variant only), then leaf termination (no draws). Reproducing a seed's output
/// depends on keeping it.
pub fn generate_network<R: Rng + ?Sized>(
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Network, GeneratorError> {
    let mut network = match config.variant {
        TreeVariant::SlotTree => build_slot_tree(config, rng)?,
        TreeVariant::RecursiveTree => build_recursive_tree(config, rng)?,
        TreeVariant::EmitterInjection => {
            return Err(GeneratorError::ConfigError(ConfigError::InvalidValue {
                field: "variant",
                reason: String::from("emitter_injection does not grow networks"),
            }))
        }
    };

    assign_flow(&mut network, config.flow_policy, config.flow_value)?;
    let emitter_position = place_emitter(&mut network, config, rng)?;
    log::debug!(
        "Placed emitter in {}",
        network.pipes()[emitter_position].name()
    );
    if config.variant == TreeVariant::RecursiveTree && config.random_receivers {
        let n_receivers = place_receivers(&mut network, rng);
        log::debug!("Scattered {n_receivers} receivers");
    }
    terminate_leaves(&mut network, config.leaf_receiver, config.receiver_thickness);
    network.validate_tree()?;
    Ok(network)
}

/// Load the base network used for emitter injection
pub fn load_base_network(config: &GeneratorConfig) -> Result<Network, GeneratorError> {
    let path = config
        .base_network_path
        .as_ref()
        .ok_or(ConfigError::InvalidValue {
            field: "base_network_path",
            reason: String::from("is required for emitter_injection"),
        })?;
    if !path.exists() {
        return Err(ConfigError::BadFilePath(path.clone()).into());
    }
    let yaml_str = std::fs::read_to_string(path)?;
    Ok(Network::from_yaml_str(&yaml_str)?)
}

/// Copy the base network and give the copy one more emitter
pub fn generate_injected<R: Rng + ?Sized>(
    base: &Network,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Network, GeneratorError> {
    let mut network = base.clone();
    let position = inject_emitter(&mut network, config, rng)?;
    log::debug!("Emitter added to {}", network.pipes()[position].name());
    Ok(network)
}

/// The main loop of the generator.
///
/// Writes `n_networks` network files to the output directory, reporting progress through
/// the sender. One RNG is used for the whole batch, so a seeded batch is reproducible
/// as a whole.
pub fn generate(
    config: &GeneratorConfig,
    tx: &Sender<WorkerStatus>,
) -> Result<Vec<PathBuf>, GeneratorError> {
    config.validate()?;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let base = match config.variant {
        TreeVariant::EmitterInjection => Some(load_base_network(config)?),
        _ => None,
    };

    let mut written = Vec::with_capacity(config.n_networks);
    let mut last_report: f32 = 0.0;
    tx.send(WorkerStatus::new(0.0, Stage::Generate, 0))?;
    for index in 0..config.n_networks {
        let network = match &base {
            Some(base) => generate_injected(base, config, &mut rng)?,
            None => generate_network(config, &mut rng)?,
        };
        let path = config.get_network_file_name(index)?;
        std::fs::write(&path, network.to_yaml_string()?)?;
        written.push(path);

        let progress = (index + 1) as f32 / config.n_networks as f32;
        if progress - last_report >= PROGRESS_STEP {
            last_report = progress;
            tx.send(WorkerStatus::new(progress, Stage::Generate, 0))?;
        }
    }
    tx.send(WorkerStatus::new(1.0, Stage::Generate, 0))?;
    log::info!(
        "Wrote {} networks to {}",
        written.len(),
        config.output_path.to_string_lossy()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FlowPolicy, LeafReceiver};
    use std::sync::mpsc;

    #[test]
    fn test_root_only_network_end_to_end() {
        let config = GeneratorConfig {
            max_depth: 0,
            ..Default::default()
        };
        let network = generate_network(&config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(network.len(), 1);
        assert_eq!(network.emitter_count(), 1);
        assert_eq!(network.sinks().len(), 1);
        assert_eq!(network.receiver_count(), 1);
        assert_eq!(network.pipes()[0].right_connections, vec!["sink1"]);
    }

    #[test]
    fn test_exactly_one_emitter() {
        for variant in [TreeVariant::SlotTree, TreeVariant::RecursiveTree] {
            let config = GeneratorConfig {
                variant,
                flow_policy: FlowPolicy::Proportional,
                ..Default::default()
            };
            for seed in 0..20 {
                let network = generate_network(&config, &mut StdRng::seed_from_u64(seed)).unwrap();
                assert_eq!(network.emitter_count(), 1);
                network.validate_tree().unwrap();
            }
        }
    }

    #[test]
    fn test_recursive_variant_scatters_receivers() {
        let config = GeneratorConfig {
            variant: TreeVariant::RecursiveTree,
            leaf_receiver: LeafReceiver::Sphere,
            ..Default::default()
        };
        let network = generate_network(&config, &mut StdRng::seed_from_u64(8)).unwrap();
        assert!(network.receiver_count() > network.sinks().len());
    }

    #[test]
    fn test_same_seed_same_document() {
        let config = GeneratorConfig::default();
        let first = generate_network(&config, &mut StdRng::seed_from_u64(21)).unwrap();
        let second = generate_network(&config, &mut StdRng::seed_from_u64(21)).unwrap();
        assert_eq!(
            first.to_yaml_string().unwrap(),
            second.to_yaml_string().unwrap()
        );
    }

    #[test]
    fn test_generate_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = GeneratorConfig {
            output_path: dir.path().to_path_buf(),
            n_networks: 5,
            seed: Some(3),
            ..Default::default()
        };
        let (tx, rx) = mpsc::channel();
        let paths = generate(&config, &tx).unwrap();
        assert_eq!(paths.len(), 5);
        for path in paths.iter() {
            let yaml = std::fs::read_to_string(path).unwrap();
            let network = Network::from_yaml_str(&yaml).unwrap();
            assert_eq!(network.emitter_count(), 1);
        }
        let last = rx.try_iter().last().unwrap();
        assert_eq!(last.progress, 1.0);
        assert_eq!(last.stage, Stage::Generate);
    }

    #[test]
    fn test_emitter_injection_batch() {
        let dir = tempfile::tempdir().unwrap();
        let base_config = GeneratorConfig::default();
        let mut rng = StdRng::seed_from_u64(30);
        let mut base = build_slot_tree(&base_config, &mut rng).unwrap();
        terminate_leaves(&mut base, LeafReceiver::Ring, 0.0005);
        let base_path = dir.path().join("network_config.yaml");
        std::fs::write(&base_path, base.to_yaml_string().unwrap()).unwrap();

        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let config = GeneratorConfig {
            output_path: out,
            n_networks: 3,
            seed: Some(4),
            variant: TreeVariant::EmitterInjection,
            base_network_path: Some(base_path),
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel();
        for path in generate(&config, &tx).unwrap() {
            let yaml = std::fs::read_to_string(path).unwrap();
            let network = Network::from_yaml_str(&yaml).unwrap();
            assert_eq!(network.len(), base.len());
            assert_eq!(network.emitter_count(), 1);
            assert_eq!(network.sinks().len(), base.sinks().len());
        }
    }

    #[test]
    fn test_missing_output_directory() {
        let config = GeneratorConfig {
            output_path: PathBuf::from("/does/not/exist"),
            n_networks: 1,
            ..Default::default()
        };
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            generate(&config, &tx),
            Err(GeneratorError::ConfigError(ConfigError::BadFilePath(_)))
        ));
    }
}
