use crate::models::Variant;
use crate::utils::error::ClassifierError;
use crate::Result;
use std::collections::HashSet;
use std::path::PathBuf;

/// 默认权重文件名
pub const DEFAULT_MODEL_PATH: &str = "best_color_model.pth";

/// 默认类别顺序
pub const DEFAULT_CLASS_NAMES: [&str; 4] = ["black", "grey", "red", "white"];

#[derive(Debug, Clone)]
pub struct Config {
    /// 权重文件路径
    pub model_path: PathBuf,

    /// 模型尺寸预设
    pub variant: Variant,

    /// 类别名称（按输出索引排列）
    pub class_names: Vec<String>,

    /// 计算设备偏好
    pub device: DevicePreference,

    /// 日志过滤级别
    pub log_level: String,

    /// 预处理配置
    pub preprocess_config: PreprocessConfig,

    /// 颜色直方图配置
    pub histogram_config: HistogramConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DevicePreference {
    /// 有 CUDA 时使用 GPU，否则 CPU
    Auto,
    Cpu,
}

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// 网络输入边长
    pub image_size: usize,

    /// 通道均值
    pub mean: [f32; 3],

    /// 通道标准差
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: 128,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HistogramConfig {
    /// 每通道分箱数
    pub bins: usize,

    /// 投影后的特征维度
    pub output_dim: usize,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bins: 16,
            output_dim: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// 工作线程数量
    pub workers: usize,

    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,

    /// 批量接口单次最多文件数
    pub max_batch_files: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3001".to_string(),
            workers: num_cpus::get(),
            request_timeout: 30,
            max_request_size: 10 * 1024 * 1024, // 10MB
            max_batch_files: 10,
        }
    }
}

impl Config {
    pub fn new(
        model_path: impl Into<PathBuf>,
        variant: Variant,
        class_names: Option<Vec<String>>,
        force_cpu: bool,
    ) -> Result<Self> {
        let class_names: Vec<String> = match class_names {
            Some(names) => names.into_iter().map(|n| n.trim().to_string()).collect(),
            None => DEFAULT_CLASS_NAMES.iter().map(|n| n.to_string()).collect(),
        };
        validate_class_names(&class_names)?;

        Ok(Self {
            model_path: model_path.into(),
            variant,
            class_names,
            device: if force_cpu {
                DevicePreference::Cpu
            } else {
                DevicePreference::Auto
            },
            log_level: "info".to_string(),
            preprocess_config: PreprocessConfig::default(),
            histogram_config: HistogramConfig::default(),
            server_config: ServerConfig::default(),
        })
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    /// 设置服务器参数
    pub fn with_server(mut self, bind_addr: String, workers: Option<usize>) -> Result<Self> {
        if let Some(0) = workers {
            return Err(ClassifierError::Config(
                "Worker thread count must be at least 1".to_string(),
            ));
        }

        self.server_config.bind_addr = bind_addr;
        if let Some(workers) = workers {
            self.server_config.workers = workers;
        }
        Ok(self)
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }
}

fn validate_class_names(names: &[String]) -> Result<()> {
    if names.is_empty() {
        return Err(ClassifierError::Config(
            "At least one class label is required".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(ClassifierError::Config("Class labels cannot be empty".to_string()));
        }
        if !seen.insert(name.as_str()) {
            return Err(ClassifierError::Config(format!(
                "Duplicate class label '{}'",
                name
            )));
        }
    }

    Ok(())
}
