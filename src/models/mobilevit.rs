use super::blocks::ColorAwareConv;
use super::layers::{Act, ConvBn, ConvSpec};
use candle_core::{Module, Result, Tensor};
use candle_nn::{layer_norm, linear, LayerNorm, Linear, VarBuilder};

const LAYER_NORM_EPS: f64 = 1e-5;

/// 单头维度基准，头数为 `min(4, dim / 16)`
const HEAD_DIM_BASE: usize = 16;
const MAX_HEADS: usize = 4;

pub fn num_heads(dim: usize) -> usize {
    (dim / HEAD_DIM_BASE).clamp(1, MAX_HEADS)
}

/// 实际编码层数为配置深度减半，至少一层
pub fn encoder_depth(depth: usize) -> usize {
    (depth / 2).max(1)
}

/// 多头自注意力，权重布局与 `nn.MultiheadAttention` 相同（打包的 in_proj）
#[derive(Debug, Clone)]
struct SelfAttention {
    in_proj: Linear,
    out_proj: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl SelfAttention {
    fn load(vb: VarBuilder, dim: usize, num_heads: usize) -> Result<Self> {
        if dim % num_heads != 0 {
            candle_core::bail!("attention dim {dim} is not divisible by {num_heads} heads");
        }

        let in_proj_weight = vb.get((3 * dim, dim), "in_proj_weight")?;
        let in_proj_bias = vb.get(3 * dim, "in_proj_bias")?;
        let out_proj = linear(dim, dim, vb.pp("out_proj"))?;

        Ok(Self {
            in_proj: Linear::new(in_proj_weight, Some(in_proj_bias)),
            out_proj,
            num_heads,
            head_dim: dim / num_heads,
        })
    }

    fn split_heads(&self, xs: &Tensor, b: usize, n: usize) -> Result<Tensor> {
        xs.reshape((b, n, self.num_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()
    }
}

impl Module for SelfAttention {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, n, dim) = xs.dims3()?;
        let qkv = self.in_proj.forward(xs)?;

        let q = self.split_heads(&qkv.narrow(2, 0, dim)?, b, n)?;
        let k = self.split_heads(&qkv.narrow(2, dim, dim)?, b, n)?;
        let v = self.split_heads(&qkv.narrow(2, 2 * dim, dim)?, b, n)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let attn = q.matmul(&k.t()?.contiguous()?)?.affine(scale, 0.0)?;
        let attn = candle_nn::ops::softmax_last_dim(&attn)?;

        let out = attn.matmul(&v)?.transpose(1, 2)?.reshape((b, n, dim))?;
        self.out_proj.forward(&out)
    }
}

/// Post-norm Transformer 编码层（GELU），等价于 `nn.TransformerEncoderLayer`
#[derive(Debug, Clone)]
struct EncoderLayer {
    self_attn: SelfAttention,
    linear1: Linear,
    linear2: Linear,
    norm1: LayerNorm,
    norm2: LayerNorm,
}

impl EncoderLayer {
    fn load(vb: VarBuilder, dim: usize, mlp_dim: usize) -> Result<Self> {
        Ok(Self {
            self_attn: SelfAttention::load(vb.pp("self_attn"), dim, num_heads(dim))?,
            linear1: linear(dim, mlp_dim, vb.pp("linear1"))?,
            linear2: linear(mlp_dim, dim, vb.pp("linear2"))?,
            norm1: layer_norm(dim, LAYER_NORM_EPS, vb.pp("norm1"))?,
            norm2: layer_norm(dim, LAYER_NORM_EPS, vb.pp("norm2"))?,
        })
    }
}

impl Module for EncoderLayer {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let attn = self.self_attn.forward(xs)?;
        let xs = self.norm1.forward(&xs.add(&attn)?)?;

        let ff = self.linear1.forward(&xs)?.gelu_erf()?;
        let ff = self.linear2.forward(&ff)?;
        self.norm2.forward(&xs.add(&ff)?)
    }
}

#[derive(Debug, Clone)]
pub struct TransformerEncoder {
    layers: Vec<EncoderLayer>,
}

impl TransformerEncoder {
    pub fn load(vb: VarBuilder, dim: usize, depth: usize, mlp_dim: usize) -> Result<Self> {
        let vb = vb.pp("layers");
        let layers = (0..depth)
            .map(|i| EncoderLayer::load(vb.pp(i), dim, mlp_dim))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

impl Module for TransformerEncoder {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in &self.layers {
            xs = layer.forward(&xs)?;
        }
        Ok(xs)
    }
}

/// 简化版 MobileViT 块：局部卷积表示 + 全局自注意力，再经 1x1 卷积融合
#[derive(Debug, Clone)]
pub struct MobileVitBlock {
    local_conv: ColorAwareConv,
    local_proj: ConvBn,
    transformer: TransformerEncoder,
    fusion: ConvBn,
}

impl MobileVitBlock {
    pub fn load(
        vb: VarBuilder,
        dim: usize,
        depth: usize,
        channel: usize,
        mlp_dim: usize,
    ) -> Result<Self> {
        let local = vb.pp("local_rep");
        let local_conv = ColorAwareConv::load(local.pp(0), channel, channel, 1)?;
        let local_proj = ConvBn::load(
            local.pp(1),
            local.pp(2),
            ConvSpec::new(channel, dim, 1),
            Some(Act::Silu),
        )?;

        let transformer =
            TransformerEncoder::load(vb.pp("transformer"), dim, encoder_depth(depth), mlp_dim)?;

        let fusion = vb.pp("fusion");
        let fusion = ConvBn::load(
            fusion.pp(0),
            fusion.pp(1),
            ConvSpec::new(dim * 2, channel, 1),
            Some(Act::Silu),
        )?;

        Ok(Self {
            local_conv,
            local_proj,
            transformer,
            fusion,
        })
    }

    pub fn encoder(&self) -> &TransformerEncoder {
        &self.transformer
    }
}

impl Module for MobileVitBlock {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let local = self.local_conv.forward(xs)?;
        let local = self.local_proj.forward(&local)?;
        let (b, dim, h, w) = local.dims4()?;

        // (B, D, H, W) -> (B, H*W, D)
        let tokens = local.permute((0, 2, 3, 1))?.reshape((b, h * w, dim))?;
        let tokens = self.transformer.forward(&tokens)?;

        // (B, H*W, D) -> (B, D, H, W)
        let global = tokens
            .reshape((b, h, w, dim))?
            .permute((0, 3, 1, 2))?
            .contiguous()?;

        let fused = Tensor::cat(&[&local, &global], 1)?;
        self.fusion.forward(&fused)
    }
}
