use std::fmt;
use std::str::FromStr;

/// 模型尺寸预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Xxs,
    Xs,
    S,
}

/// 每个预设对应的通道宽度、注意力维度、深度和前馈宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantSpec {
    pub channels: [usize; 5],
    pub transformer_dims: [usize; 3],
    pub depths: [usize; 3],
    pub mlp_dims: [usize; 3],
}

impl Variant {
    pub fn spec(self) -> VariantSpec {
        match self {
            Variant::Xxs => VariantSpec {
                channels: [16, 24, 48, 64, 80],
                transformer_dims: [64, 80, 96],
                depths: [2, 2, 2],
                mlp_dims: [128, 160, 192],
            },
            Variant::Xs => VariantSpec {
                channels: [16, 32, 48, 80, 160],
                transformer_dims: [96, 120, 160],
                depths: [2, 4, 4],
                mlp_dims: [192, 240, 320],
            },
            Variant::S => VariantSpec {
                channels: [16, 32, 64, 128, 256],
                transformer_dims: [128, 160, 192],
                depths: [4, 4, 4],
                mlp_dims: [256, 320, 384],
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Xxs => "XXS",
            Variant::Xs => "XS",
            Variant::S => "S",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "XXS" => Ok(Variant::Xxs),
            "XS" => Ok(Variant::Xs),
            "S" => Ok(Variant::S),
            other => Err(format!(
                "Unknown model variant '{}'. Supported variants: XXS, XS, S",
                other
            )),
        }
    }
}
