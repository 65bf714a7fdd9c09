// ============================================================
// Layer 4 — Image Folder Loader
// ============================================================
// Loads a CK+ style dataset laid out as one folder per class:
//
//   <dataset_root>/
//     neutral/   S005_001_00000001.png ...
//     happy/     ...
//     3/         (numeric class folders work as well)
//
// Every image is decoded with the `image` crate, converted to
// 8-bit grayscale, resized to a square of `image_size` and
// scaled to [0, 1]. The whole set is kept in memory (CK+ is a
// few thousand small frames) and handed out per fold through
// the KFoldSplitter.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::splitter::KFoldSplitter;
use crate::domain::error::TrainingError;
use crate::domain::expression::{Expression, FaceSample, Split};
use crate::domain::traits::FoldSource;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Options controlling how the folder is decoded and partitioned.
#[derive(Debug, Clone)]
pub struct FolderOptions {
    pub image_size: usize,
    pub num_folds:  usize,
    pub partitions: usize,
    pub seed:       u64,
}

/// Implements FoldSource over an in-memory copy of the dataset.
pub struct ImageFolderSource {
    samples:  Vec<FaceSample>,
    splitter: KFoldSplitter,
}

impl ImageFolderSource {
    /// Read every image under `root` once.
    pub fn open(root: impl AsRef<Path>, opts: &FolderOptions) -> Result<Self> {
        let root = root.as_ref();
        let mut files = list_labelled_files(root)?;
        // read_dir order is platform dependent
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut samples = Vec::with_capacity(files.len());
        for (path, expression) in &files {
            let sample = load_face(path, expression.label(), opts.image_size)?;
            samples.push(sample);
        }

        tracing::info!(
            "Loaded {} faces from '{}' ({}x{} grayscale)",
            samples.len(),
            root.display(),
            opts.image_size,
            opts.image_size,
        );

        Ok(Self::from_samples(samples, opts))
    }

    /// Build a source over already decoded samples.
    pub fn from_samples(samples: Vec<FaceSample>, opts: &FolderOptions) -> Self {
        let splitter = KFoldSplitter::new(samples.len(), opts.num_folds, opts.partitions, opts.seed);
        Self { samples, splitter }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn gather(&self, indices: &[usize]) -> Vec<FaceSample> {
        indices.iter().map(|&i| self.samples[i].clone()).collect()
    }
}

impl FoldSource for ImageFolderSource {
    fn load(&self, fold: usize, split: Split, stage: usize) -> Result<Vec<FaceSample>> {
        let indices = match split {
            Split::Validation      => self.splitter.validation(fold),
            Split::TrainingLabeled => self.splitter.training(fold, stage),
        };
        tracing::debug!("Fold {} {}: {} samples", fold + 1, split.as_str(), indices.len());
        Ok(self.gather(&indices))
    }

    fn num_folds(&self) -> usize {
        self.splitter.num_folds()
    }
}

/// Walk the class folders and pair every image file with its class.
fn list_labelled_files(root: &Path) -> Result<Vec<(PathBuf, Expression)>> {
    let entries = fs::read_dir(root).map_err(|e| TrainingError::io(root, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TrainingError::io(root, e))?;
        let class_dir = entry.path();
        if !class_dir.is_dir() {
            continue;
        }

        let name = class_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let Some(expression) = Expression::from_dir_name(name) else {
            tracing::warn!("Skipping folder '{}': not an expression class", class_dir.display());
            continue;
        };

        let images = fs::read_dir(&class_dir).map_err(|e| TrainingError::io(&class_dir, e))?;
        for image in images {
            let path = image.map_err(|e| TrainingError::io(&class_dir, e))?.path();
            if is_image(&path) {
                files.push((path, expression));
            }
        }
    }
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Decode, grayscale, resize and normalise a single face.
fn load_face(path: &Path, label: usize, size: usize) -> Result<FaceSample> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
    let gray = img
        .resize_exact(size as u32, size as u32, FilterType::Triangle)
        .to_luma8();
    let pixels = gray.into_raw().into_iter().map(|p| p as f32 / 255.0).collect();
    Ok(FaceSample::new(pixels, size, size, label))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write_face(dir: &Path, name: &str, shade: u8) {
        fs::create_dir_all(dir).unwrap();
        let img = GrayImage::from_pixel(8, 8, Luma([shade]));
        img.save(dir.join(name)).unwrap();
    }

    fn opts() -> FolderOptions {
        FolderOptions { image_size: 4, num_folds: 2, partitions: 1, seed: 0 }
    }

    #[test]
    fn test_reads_named_and_numeric_class_folders() {
        let tmp = tempfile::tempdir().unwrap();
        write_face(&tmp.path().join("happy"), "a.png", 255);
        write_face(&tmp.path().join("7"), "b.png", 0);
        fs::write(tmp.path().join("happy").join("notes.txt"), "ignore me").unwrap();
        write_face(&tmp.path().join("unknown"), "c.png", 10);

        let source = ImageFolderSource::open(tmp.path(), &opts()).unwrap();
        assert_eq!(source.sample_count(), 2);

        let mut labels: Vec<usize> = (0..2)
            .flat_map(|fold| source.load(fold, Split::Validation, 1).unwrap())
            .map(|s| s.label)
            .collect();
        labels.sort();
        assert_eq!(labels, vec![Expression::Happy.label(), Expression::Contempt.label()]);
    }

    #[test]
    fn test_fold_assignment_does_not_depend_on_creation_order() {
        let faces = [("happy", "a.png", 10u8), ("happy", "b.png", 60), ("sad", "c.png", 120), ("0", "d.png", 200)];
        let first  = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        for (class, name, shade) in faces {
            write_face(&first.path().join(class), name, shade);
        }
        for (class, name, shade) in faces.into_iter().rev() {
            write_face(&second.path().join(class), name, shade);
        }

        let a = ImageFolderSource::open(first.path(), &opts()).unwrap();
        let b = ImageFolderSource::open(second.path(), &opts()).unwrap();
        for fold in 0..2 {
            assert_eq!(
                a.load(fold, Split::Validation, 1).unwrap(),
                b.load(fold, Split::Validation, 1).unwrap(),
            );
        }
    }

    #[test]
    fn test_pixels_are_resized_and_normalised() {
        let tmp = tempfile::tempdir().unwrap();
        write_face(&tmp.path().join("0"), "white.png", 255);

        let source = ImageFolderSource::open(tmp.path(), &opts()).unwrap();
        let faces: Vec<FaceSample> = (0..2)
            .flat_map(|fold| source.load(fold, Split::Validation, 1).unwrap())
            .collect();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].pixels.len(), 16);
        assert!(faces[0].pixels.iter().all(|&p| (p - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_missing_root_is_an_io_error() {
        let err = ImageFolderSource::open("/definitely/not/here", &opts()).err().unwrap();
        assert!(matches!(err.downcast_ref::<TrainingError>(), Some(TrainingError::Io { .. })));
    }
}
