use super::layers::{adaptive_avg_pool2d, Act, ConvBn, ConvSpec};
use candle_core::{Module, Result, Tensor};
use candle_nn::{conv2d, Conv2d, VarBuilder};

/// 颜色分支的池化网格边长
const COLOR_POOL_SIZE: usize = 8;

/// 颜色分支叠加权重（固定常数，不参与训练）
const COLOR_BRANCH_WEIGHT: f64 = 0.2;

/// 颜色感知卷积块：3x3 卷积主路径 + 粗粒度颜色统计分支
#[derive(Debug, Clone)]
pub struct ColorAwareConv {
    main: ConvBn,
    color_conv: Conv2d,
}

impl ColorAwareConv {
    pub fn load(vb: VarBuilder, in_chs: usize, out_chs: usize, stride: usize) -> Result<Self> {
        let main = ConvBn::load(
            vb.pp("conv"),
            vb.pp("bn"),
            ConvSpec::new(in_chs, out_chs, 3).stride(stride),
            Some(Act::Silu),
        )?;
        let color_conv = conv2d(in_chs, out_chs, 1, Default::default(), vb.pp("color_conv"))?;

        Ok(Self { main, color_conv })
    }
}

impl Module for ColorAwareConv {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let out = self.main.forward(xs)?;
        let (_b, _c, h, w) = out.dims4()?;

        let color = adaptive_avg_pool2d(xs, COLOR_POOL_SIZE, COLOR_POOL_SIZE)?;
        let color = self.color_conv.forward(&color)?;
        let color = adaptive_avg_pool2d(&color, 1, 1)?;
        let color = color.upsample_nearest2d(h, w)?;

        out.add(&color.affine(COLOR_BRANCH_WEIGHT, 0.0)?)
    }
}

/// MobileNetV2 倒残差块
#[derive(Debug, Clone)]
pub struct InvertedResidual {
    expand: Option<ConvBn>,
    depthwise: ConvBn,
    project: ConvBn,
    use_residual: bool,
}

impl InvertedResidual {
    pub fn load(
        vb: VarBuilder,
        in_chs: usize,
        out_chs: usize,
        stride: usize,
        expand_ratio: usize,
    ) -> Result<Self> {
        let hidden = in_chs * expand_ratio;
        let vb = vb.pp("conv");

        // 权重下标沿用 nn.Sequential 的平铺编号（conv, bn, act 各占一位）
        let mut idx = 0;
        let expand = if expand_ratio != 1 {
            let layer = ConvBn::load(
                vb.pp(idx),
                vb.pp(idx + 1),
                ConvSpec::new(in_chs, hidden, 1),
                Some(Act::Relu6),
            )?;
            idx += 3;
            Some(layer)
        } else {
            None
        };

        let depthwise = ConvBn::load(
            vb.pp(idx),
            vb.pp(idx + 1),
            ConvSpec::new(hidden, hidden, 3).stride(stride).groups(hidden),
            Some(Act::Relu6),
        )?;
        idx += 3;

        let project = ConvBn::load(
            vb.pp(idx),
            vb.pp(idx + 1),
            ConvSpec::new(hidden, out_chs, 1),
            None,
        )?;

        Ok(Self {
            expand,
            depthwise,
            project,
            use_residual: stride == 1 && in_chs == out_chs,
        })
    }

    pub fn use_residual(&self) -> bool {
        self.use_residual
    }
}

impl Module for InvertedResidual {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut out = match &self.expand {
            Some(expand) => expand.forward(xs)?,
            None => xs.clone(),
        };
        out = self.depthwise.forward(&out)?;
        out = self.project.forward(&out)?;

        if self.use_residual {
            xs.add(&out)
        } else {
            Ok(out)
        }
    }
}
