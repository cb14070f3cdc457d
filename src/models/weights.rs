use super::network::ColorMobileViT;
use super::variant::Variant;
use crate::config::HistogramConfig;
use crate::utils::error::ClassifierError;
use crate::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// checkpoint 容器中保存 state dict 的已知键
pub const CHECKPOINT_KEYS: [&str; 2] = ["model_state_dict", "state_dict"];

/// BatchNorm 的计数缓冲区，推理不使用
const IGNORED_SUFFIX: &str = ".num_batches_tracked";

/// 网络声明的全部参数：名称 -> 形状
pub type ParameterManifest = BTreeMap<String, Vec<usize>>;

/// 枚举指定预设下网络声明的参数及形状
pub fn parameter_manifest(
    variant: Variant,
    num_classes: usize,
    histogram: HistogramConfig,
) -> Result<ParameterManifest> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    ColorMobileViT::load(vb, variant, num_classes, histogram)?;

    let data = varmap
        .data()
        .lock()
        .map_err(|_| ClassifierError::Internal("Parameter registry poisoned".to_string()))?;

    Ok(data
        .iter()
        .map(|(name, var)| (name.clone(), var.dims().to_vec()))
        .collect())
}

/// 读取权重文件，支持 PyTorch pickle（平铺 state dict 或 checkpoint 容器）与 safetensors
pub fn read_parameters(path: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let is_safetensors = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("safetensors"))
        .unwrap_or(false);

    let tensors = if is_safetensors {
        candle_core::safetensors::load(path, device)
            .map_err(|e| load_error(path, e))?
            .into_iter()
            .collect::<Vec<_>>()
    } else {
        read_pickle(path)?
    };

    let mut params = HashMap::with_capacity(tensors.len());
    for (name, tensor) in tensors {
        if name.ends_with(IGNORED_SUFFIX) {
            continue;
        }
        let tensor = tensor
            .to_dtype(DType::F32)
            .and_then(|t| t.to_device(device))
            .map_err(|e| load_error(path, e))?;
        params.insert(name, tensor);
    }

    tracing::debug!("Read {} parameter tensors from {}", params.len(), path.display());
    Ok(params)
}

fn read_pickle(path: &Path) -> Result<Vec<(String, Tensor)>> {
    let flat = candle_core::pickle::read_all_with_key(path, None).map_err(|e| load_error(path, e))?;
    if !flat.is_empty() {
        return Ok(flat);
    }

    for key in CHECKPOINT_KEYS {
        match candle_core::pickle::read_all_with_key(path, Some(key)) {
            Ok(tensors) if !tensors.is_empty() => {
                tracing::info!("Loaded state dict from checkpoint key '{}'", key);
                return Ok(tensors);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Checkpoint key '{}' not usable: {}", key, e),
        }
    }

    Err(ClassifierError::ModelLoad(format!(
        "{} is neither a parameter mapping nor a checkpoint containing one under {:?}",
        path.display(),
        CHECKPOINT_KEYS
    )))
}

/// 按名称和形状严格校验，等价于 `load_state_dict(strict=True)`
pub fn validate_parameters(
    manifest: &ParameterManifest,
    params: &HashMap<String, Tensor>,
) -> Result<()> {
    let missing: Vec<&str> = manifest
        .keys()
        .filter(|name| !params.contains_key(*name))
        .map(String::as_str)
        .collect();

    let mut unexpected: Vec<&str> = params
        .keys()
        .filter(|name| !manifest.contains_key(*name))
        .map(String::as_str)
        .collect();
    unexpected.sort_unstable();

    let mismatched: Vec<String> = manifest
        .iter()
        .filter_map(|(name, expected)| {
            let found = params.get(name)?.dims();
            (found != expected.as_slice()).then(|| {
                format!(
                    "size mismatch for {}: checkpoint {:?}, model {:?}",
                    name, found, expected
                )
            })
        })
        .collect();

    if missing.is_empty() && unexpected.is_empty() && mismatched.is_empty() {
        return Ok(());
    }

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing keys {:?}", missing));
    }
    if !unexpected.is_empty() {
        problems.push(format!("unexpected keys {:?}", unexpected));
    }
    problems.extend(mismatched);

    Err(ClassifierError::ModelLoad(format!(
        "Parameters do not match the network: {}",
        problems.join("; ")
    )))
}

fn load_error(path: &Path, err: candle_core::Error) -> ClassifierError {
    ClassifierError::ModelLoad(format!("Failed to read {}: {}", path.display(), err))
}
