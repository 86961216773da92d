use hdf5::types::VarLenUnicode;
use hdf5::File;
use ndarray::{Array1, Array3};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::constants::FORMAT_VERSION;
use super::error::HDF5WriterError;
use super::worker_status::Stage;

const FEATURES_NAME: &str = "features";
const PIPE_LABELS_NAME: &str = "pipe_labels";
const Z_LABELS_NAME: &str = "z_labels";

/// Archive-wide metadata, written as root attributes
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveAttributes {
    pub l_max: f64,
    pub r_max: f64,
    pub max_depth: usize,
    pub max_branches: usize,
    pub max_slots: usize,
    pub compression_window: usize,
}

/// The stacked arrays of one split
#[derive(Debug, Clone)]
pub struct SplitData {
    pub features: Array3<f32>,
    pub pipe_labels: Array1<i32>,
    pub z_labels: Array1<f32>,
}

impl SplitData {
    pub fn len(&self) -> usize {
        self.pipe_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipe_labels.is_empty()
    }
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file and writes one group per dataset split.
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    path: PathBuf,
}
// Structure
// / - version, l_max, r_max, max_depth, max_branches, max_slots, compression_window
// |---- train
// |    |---- features(dset) [N, max_slots, 7]
// |    |---- pipe_labels(dset) [N]
// |    |---- z_labels(dset) [N]
// |---- val
// |---- test

impl HDFWriter {
    /// Create the writer, opening a file at path and writing the root attributes
    pub fn new(path: &Path, attributes: &ArchiveAttributes) -> Result<Self, HDF5WriterError> {
        let file_handle = File::create(path)?;

        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        let version = VarLenUnicode::from_str(&version)
            .map_err(|_| HDF5WriterError::BadString(version.clone()))?;
        file_handle
            .new_attr::<VarLenUnicode>()
            .create("version")?
            .write_scalar(&version)?;
        file_handle
            .new_attr::<f64>()
            .create("l_max")?
            .write_scalar(&attributes.l_max)?;
        file_handle
            .new_attr::<f64>()
            .create("r_max")?
            .write_scalar(&attributes.r_max)?;
        for (name, value) in [
            ("max_depth", attributes.max_depth),
            ("max_branches", attributes.max_branches),
            ("max_slots", attributes.max_slots),
            ("compression_window", attributes.compression_window),
        ] {
            file_handle
                .new_attr::<u64>()
                .create(name)?
                .write_scalar(&(value as u64))?;
        }

        Ok(Self {
            file_handle,
            path: path.to_path_buf(),
        })
    }

    /// Write one split as a group of three datasets
    pub fn write_split(&self, stage: Stage, data: &SplitData) -> Result<(), HDF5WriterError> {
        let group = self.file_handle.create_group(stage.group_name())?;
        group
            .new_dataset_builder()
            .with_data(&data.features)
            .create(FEATURES_NAME)?;
        group
            .new_dataset_builder()
            .with_data(&data.pipe_labels)
            .create(PIPE_LABELS_NAME)?;
        group
            .new_dataset_builder()
            .with_data(&data.z_labels)
            .create(Z_LABELS_NAME)?;
        group
            .new_attr::<u64>()
            .create("n_samples")?
            .write_scalar(&(data.len() as u64))?;
        log::info!("Wrote {} samples to group {}", data.len(), stage.group_name());
        Ok(())
    }

    /// Flush and close the file, consume the writer
    pub fn close(self) -> Result<(), HDF5WriterError> {
        self.file_handle.flush()?;
        drop(self.file_handle);
        let size = std::fs::metadata(&self.path)?.len();
        log::info!(
            "Archive {} closed, {} on disk",
            self.path.to_string_lossy(),
            human_bytes::human_bytes(size as f64)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_write_archive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.h5");
        let attributes = ArchiveAttributes {
            l_max: 0.005,
            r_max: 0.0005,
            max_depth: 1,
            max_branches: 2,
            max_slots: 3,
            compression_window: 10,
        };
        let writer = HDFWriter::new(&path, &attributes).unwrap();
        let train = SplitData {
            features: Array3::<f32>::ones((2, 3, 7)),
            pipe_labels: Array1::from_vec(vec![0, -1]),
            z_labels: Array1::from_vec(vec![0.5, 0.0]),
        };
        let empty = SplitData {
            features: Array3::<f32>::zeros((0, 3, 7)),
            pipe_labels: Array1::from_vec(vec![]),
            z_labels: Array1::from_vec(vec![]),
        };
        writer.write_split(Stage::Train, &train).unwrap();
        writer.write_split(Stage::Validation, &empty).unwrap();
        writer.write_split(Stage::Test, &empty).unwrap();
        writer.close().unwrap();

        let file = File::open(&path).unwrap();
        assert_eq!(file.attr("max_slots").unwrap().read_scalar::<u64>().unwrap(), 3);
        let features = file.dataset("train/features").unwrap();
        assert_eq!(features.shape(), vec![2, 3, 7]);
        let labels = file
            .dataset("train/pipe_labels")
            .unwrap()
            .read_1d::<i32>()
            .unwrap();
        assert_eq!(labels.to_vec(), vec![0, -1]);
        assert_eq!(file.dataset("val/z_labels").unwrap().shape(), vec![0]);
    }
}
