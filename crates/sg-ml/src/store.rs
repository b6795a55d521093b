//! On-disk model registry.
//!
//! Layout: `<dir>/v{idx:03}-{ts}/` holding `model.safetensors`, `norm.json`
//! and `metrics.json`, plus an `ACTIVE` pointer file naming the live
//! version. All writes go through tmp + rename; leftover tmp files from a
//! crashed writer are swept on open.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use thiserror::Error;

use sg_features::{Normalizer, F};

use crate::bundle::{ModelBundle, ModelVersionMeta};
use crate::model::{Mlp, H1, H2};

/// Tensor names inside `model.safetensors`.
pub const T_W1: &str = "w1";
pub const T_B1: &str = "b1";
pub const T_W2: &str = "w2";
pub const T_B2: &str = "b2";
pub const T_W3: &str = "w3";
pub const T_B3: &str = "b3";

const MODEL_FILE: &str = "model.safetensors";
const NORM_FILE: &str = "norm.json";
const METRICS_FILE: &str = "metrics.json";
const ACTIVE_FILE: &str = "ACTIVE";

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log: {0}")]
    Log(#[from] sg_logging::LogError),
    #[error("safetensors: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
    #[error("invalid model artifact: {0}")]
    InvalidModel(String),
    #[error("unknown model version: {0}")]
    UnknownVersion(String),
}

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ModelStoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        cleanup_tmp_files(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a new version and return its finished metadata. The version
    /// id is assigned here (`v{idx:03}-{created_ts_ms}`), resuming the index
    /// past any existing versions.
    pub fn save_version(
        &self,
        mlp: &Mlp,
        normalizer: &Normalizer,
        mut meta: ModelVersionMeta,
    ) -> Result<ModelVersionMeta, ModelStoreError> {
        let idx = self.next_version_idx()?;
        meta.version_id = format!("v{idx:03}-{}", meta.created_ts_ms);
        let vdir = self.dir.join(&meta.version_id);
        fs::create_dir_all(&vdir)?;

        // Weights: flatten to f32 tensors, serialize, rename into place.
        let w1: Vec<f32> = mlp.w1.iter().map(|&v| v as f32).collect();
        let b1: Vec<f32> = mlp.b1.iter().map(|&v| v as f32).collect();
        let w2: Vec<f32> = mlp.w2.iter().map(|&v| v as f32).collect();
        let b2: Vec<f32> = mlp.b2.iter().map(|&v| v as f32).collect();
        let w3: Vec<f32> = mlp.w3.iter().map(|&v| v as f32).collect();
        let b3: Vec<f32> = mlp.b3.iter().map(|&v| v as f32).collect();

        let mut tensors: BTreeMap<String, TensorView<'_>> = BTreeMap::new();
        tensors.insert(
            T_W1.to_string(),
            TensorView::new(Dtype::F32, vec![H1, F], bytemuck::cast_slice(&w1))?,
        );
        tensors.insert(
            T_B1.to_string(),
            TensorView::new(Dtype::F32, vec![H1], bytemuck::cast_slice(&b1))?,
        );
        tensors.insert(
            T_W2.to_string(),
            TensorView::new(Dtype::F32, vec![H2, H1], bytemuck::cast_slice(&w2))?,
        );
        tensors.insert(
            T_B2.to_string(),
            TensorView::new(Dtype::F32, vec![H2], bytemuck::cast_slice(&b2))?,
        );
        tensors.insert(
            T_W3.to_string(),
            TensorView::new(Dtype::F32, vec![1, H2], bytemuck::cast_slice(&w3))?,
        );
        tensors.insert(
            T_B3.to_string(),
            TensorView::new(Dtype::F32, vec![1], bytemuck::cast_slice(&b3))?,
        );

        let final_st = vdir.join(MODEL_FILE);
        let tmp_st = final_st.with_extension("safetensors.tmp");
        let st_bytes = safetensors::serialize(&tensors, &None)?;
        fs::write(&tmp_st, st_bytes)?;
        fs::rename(&tmp_st, &final_st)?;

        sg_logging::write_json_atomic(vdir.join(NORM_FILE), normalizer)?;
        sg_logging::write_json_atomic(vdir.join(METRICS_FILE), &meta)?;

        Ok(meta)
    }

    /// All stored versions, oldest first.
    pub fn list_versions(&self) -> Result<Vec<ModelVersionMeta>, ModelStoreError> {
        let mut entries: Vec<(u64, ModelVersionMeta)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let e = entry?;
            if !e.path().is_dir() {
                continue;
            }
            let Some(name) = e.file_name().to_str().map(String::from) else {
                continue;
            };
            let Some(idx) = parse_version_idx(&name) else {
                continue;
            };
            let meta_path = e.path().join(METRICS_FILE);
            if !meta_path.exists() {
                // Half-written version dir (crash between weight and meta
                // writes); skip it, never activate it.
                continue;
            }
            let meta: ModelVersionMeta = sg_logging::read_json(&meta_path)?;
            entries.push((idx, meta));
        }
        entries.sort_by_key(|(idx, _)| *idx);
        Ok(entries.into_iter().map(|(_, m)| m).collect())
    }

    pub fn load_version(&self, version_id: &str) -> Result<ModelBundle, ModelStoreError> {
        let vdir = self.dir.join(version_id);
        if !vdir.is_dir() {
            return Err(ModelStoreError::UnknownVersion(version_id.to_string()));
        }
        let meta: ModelVersionMeta = sg_logging::read_json(vdir.join(METRICS_FILE))?;
        let normalizer: Normalizer = sg_logging::read_json(vdir.join(NORM_FILE))?;

        let bytes = fs::read(vdir.join(MODEL_FILE))?;
        let st = SafeTensors::deserialize(&bytes)?;
        let mlp = Mlp {
            w1: read_matrix(&st, T_W1, H1, F)?,
            b1: read_vector(&st, T_B1, H1)?,
            w2: read_matrix(&st, T_W2, H2, H1)?,
            b2: read_vector(&st, T_B2, H2)?,
            w3: read_matrix(&st, T_W3, 1, H2)?,
            b3: read_vector(&st, T_B3, 1)?,
        };
        Ok(ModelBundle {
            meta,
            normalizer,
            mlp,
        })
    }

    /// The version named by the `ACTIVE` pointer, if any.
    pub fn active_version_id(&self) -> Result<Option<String>, ModelStoreError> {
        let p = self.dir.join(ACTIVE_FILE);
        if !p.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(p)?;
        let s = s.trim().to_string();
        if s.is_empty() {
            Ok(None)
        } else {
            Ok(Some(s))
        }
    }

    /// Atomically repoint `ACTIVE` at a stored version.
    pub fn set_active(&self, version_id: &str) -> Result<(), ModelStoreError> {
        if !self.dir.join(version_id).is_dir() {
            return Err(ModelStoreError::UnknownVersion(version_id.to_string()));
        }
        let p = self.dir.join(ACTIVE_FILE);
        let tmp = self.dir.join("ACTIVE.tmp");
        fs::write(&tmp, version_id)?;
        fs::rename(&tmp, p)?;
        Ok(())
    }

    /// Load the active bundle, if an `ACTIVE` pointer exists.
    pub fn load_active(&self) -> Result<Option<ModelBundle>, ModelStoreError> {
        match self.active_version_id()? {
            Some(id) => Ok(Some(self.load_version(&id)?)),
            None => Ok(None),
        }
    }

    fn next_version_idx(&self) -> Result<u64, ModelStoreError> {
        let mut max_idx: Option<u64> = None;
        for entry in fs::read_dir(&self.dir)? {
            let e = entry?;
            let Some(name) = e.file_name().to_str().map(String::from) else {
                continue;
            };
            if let Some(idx) = parse_version_idx(&name) {
                max_idx = Some(max_idx.map(|m| m.max(idx)).unwrap_or(idx));
            }
        }
        Ok(max_idx.map(|m| m.saturating_add(1)).unwrap_or(0))
    }
}

fn parse_version_idx(name: &str) -> Option<u64> {
    // Expected: v{idx:03}-{ts}
    let rest = name.strip_prefix('v')?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

fn read_matrix(
    st: &SafeTensors<'_>,
    name: &str,
    rows: usize,
    cols: usize,
) -> Result<Array2<f64>, ModelStoreError> {
    let view = st.tensor(name)?;
    if view.shape() != [rows, cols] {
        return Err(ModelStoreError::InvalidModel(format!(
            "{name}: shape {:?}, expected [{rows}, {cols}]",
            view.shape()
        )));
    }
    let data: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
    Ok(Array2::from_shape_vec(
        (rows, cols),
        data.into_iter().map(f64::from).collect(),
    )
    .map_err(|e| ModelStoreError::InvalidModel(e.to_string()))?)
}

fn read_vector(
    st: &SafeTensors<'_>,
    name: &str,
    len: usize,
) -> Result<Array1<f64>, ModelStoreError> {
    let view = st.tensor(name)?;
    if view.shape() != [len] {
        return Err(ModelStoreError::InvalidModel(format!(
            "{name}: shape {:?}, expected [{len}]",
            view.shape()
        )));
    }
    let data: Vec<f32> = bytemuck::pod_collect_to_vec(view.data());
    Ok(Array1::from_iter(data.into_iter().map(f64::from)))
}

fn cleanup_tmp_files(dir: &Path) -> Result<(), ModelStoreError> {
    for entry in fs::read_dir(dir)? {
        let e = entry?;
        let p = e.path();
        if let Some(name) = p.file_name().and_then(|s| s.to_str()) {
            if name.ends_with(".tmp") {
                let _ = fs::remove_file(&p);
            }
        }
        if p.is_dir() {
            for sub in fs::read_dir(&p)? {
                let s = sub?;
                if let Some(name) = s.path().file_name().and_then(|n| n.to_str()) {
                    if name.ends_with(".tmp") {
                        let _ = fs::remove_file(s.path());
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sg_logging::MetricsV1;

    fn meta() -> ModelVersionMeta {
        ModelVersionMeta {
            version_id: String::new(),
            created_ts_ms: 1_700_000_000_000,
            arch: "dense_v1".to_string(),
            feature_schema_id: sg_features::FEATURE_SCHEMA_ID,
            metrics: MetricsV1 {
                accuracy: 0.9,
                precision: 0.88,
                recall: 0.92,
                f1: 0.899,
            },
            train_samples: 80,
            val_samples: 20,
            synthetic_samples: 100,
            epochs: 50,
        }
    }

    #[test]
    fn save_load_roundtrip_preserves_weights_to_f32() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let mlp = Mlp::init(11);
        let norm = Normalizer::identity();

        let saved = store.save_version(&mlp, &norm, meta()).unwrap();
        assert!(saved.version_id.starts_with("v000-"));

        let bundle = store.load_version(&saved.version_id).unwrap();
        assert_eq!(bundle.normalizer, norm);
        assert_eq!(bundle.meta.metrics.f1, 0.899);
        // Weights survive the f64 -> f32 -> f64 trip within f32 precision.
        for (a, b) in mlp.w1.iter().zip(bundle.mlp.w1.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn version_indices_advance_and_list_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        let mlp = Mlp::init(1);
        let norm = Normalizer::identity();
        let a = store.save_version(&mlp, &norm, meta()).unwrap();
        let b = store.save_version(&mlp, &norm, meta()).unwrap();
        assert!(a.version_id.starts_with("v000-"));
        assert!(b.version_id.starts_with("v001-"));

        let listed = store.list_versions().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].version_id, a.version_id);
        assert_eq!(listed[1].version_id, b.version_id);
    }

    #[test]
    fn active_pointer_roundtrips_and_rejects_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::open(dir.path()).unwrap();
        assert_eq!(store.active_version_id().unwrap(), None);
        assert!(store.load_active().unwrap().is_none());

        let saved = store
            .save_version(&Mlp::init(2), &Normalizer::identity(), meta())
            .unwrap();
        store.set_active(&saved.version_id).unwrap();
        assert_eq!(
            store.active_version_id().unwrap().as_deref(),
            Some(saved.version_id.as_str())
        );
        let bundle = store.load_active().unwrap().expect("active bundle");
        assert_eq!(bundle.meta.version_id, saved.version_id);

        assert!(store.set_active("v999-0").is_err());
    }

    #[test]
    fn open_sweeps_leftover_tmp_files() {
        let dir = tempfile::tempdir().unwrap();
        let junk = dir.path().join("ACTIVE.tmp");
        std::fs::write(&junk, "half").unwrap();
        let _ = ModelStore::open(dir.path()).unwrap();
        assert!(!junk.exists());
    }
}
