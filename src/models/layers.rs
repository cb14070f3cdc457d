use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{batch_norm, conv2d_no_bias, BatchNorm, Conv2d, Conv2dConfig, VarBuilder};

/// BatchNorm2d 默认 eps
pub const BN_EPS: f64 = 1e-5;

/// 卷积后的激活函数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Act {
    Relu6,
    Silu,
}

impl Act {
    pub fn apply(self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Act::Relu6 => xs.clamp(0f32, 6f32),
            Act::Silu => xs.silu(),
        }
    }
}

/// 卷积形状参数，padding 取 kernel_size / 2
#[derive(Debug, Clone, Copy)]
pub struct ConvSpec {
    pub in_chs: usize,
    pub out_chs: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub groups: usize,
}

impl ConvSpec {
    pub fn new(in_chs: usize, out_chs: usize, kernel_size: usize) -> Self {
        Self {
            in_chs,
            out_chs,
            kernel_size,
            stride: 1,
            groups: 1,
        }
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }
}

/// 无偏置卷积 + BatchNorm（推理模式）+ 可选激活
///
/// 卷积与 BN 的权重前缀分开传入，以便对应 `nn.Sequential` 中相邻的两个下标。
#[derive(Debug, Clone)]
pub struct ConvBn {
    conv: Conv2d,
    bn: BatchNorm,
    act: Option<Act>,
}

impl ConvBn {
    pub fn load(
        conv_vb: VarBuilder,
        bn_vb: VarBuilder,
        spec: ConvSpec,
        act: Option<Act>,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding: spec.kernel_size / 2,
            stride: spec.stride,
            groups: spec.groups,
            ..Default::default()
        };
        let conv = conv2d_no_bias(spec.in_chs, spec.out_chs, spec.kernel_size, cfg, conv_vb)?;
        let bn = batch_norm(spec.out_chs, BN_EPS, bn_vb)?;

        Ok(Self { conv, bn, act })
    }
}

impl Module for ConvBn {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv.forward(xs)?;
        let xs = self.bn.forward_t(&xs, false)?;
        match self.act {
            Some(act) => act.apply(&xs),
            None => Ok(xs),
        }
    }
}

/// 自适应平均池化（NCHW），与 PyTorch 的窗口划分一致：
/// 第 i 个输出覆盖 `[floor(i*in/out), ceil((i+1)*in/out))`
pub fn adaptive_avg_pool2d(xs: &Tensor, out_h: usize, out_w: usize) -> Result<Tensor> {
    let (_b, _c, h, w) = xs.dims4()?;

    if h % out_h == 0 && w % out_w == 0 {
        return xs.avg_pool2d((h / out_h, w / out_w));
    }

    let mut rows = Vec::with_capacity(out_h);
    for i in 0..out_h {
        let (h0, h1) = pool_bounds(i, h, out_h);
        let band = xs.narrow(2, h0, h1 - h0)?;

        let mut cells = Vec::with_capacity(out_w);
        for j in 0..out_w {
            let (w0, w1) = pool_bounds(j, w, out_w);
            let cell = band.narrow(3, w0, w1 - w0)?.mean_keepdim(2)?.mean_keepdim(3)?;
            cells.push(cell);
        }
        rows.push(Tensor::cat(&cells, 3)?);
    }

    Tensor::cat(&rows, 2)
}

fn pool_bounds(index: usize, input: usize, output: usize) -> (usize, usize) {
    let start = index * input / output;
    let end = ((index + 1) * input).div_ceil(output);
    (start, end)
}

/// 全局平均池化并展平为 (B, C)
pub fn global_avg_pool(xs: &Tensor) -> Result<Tensor> {
    xs.mean((2, 3))
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn arange_map(h: usize, w: usize) -> Tensor {
        Tensor::arange(0f32, (h * w) as f32, &Device::Cpu)
            .unwrap()
            .reshape((1, 1, h, w))
            .unwrap()
    }

    #[test]
    fn pool_bounds_cover_input() {
        assert_eq!(pool_bounds(0, 5, 3), (0, 2));
        assert_eq!(pool_bounds(1, 5, 3), (1, 4));
        assert_eq!(pool_bounds(2, 5, 3), (3, 5));
        // 上采样时每个输出复用一个输入像素
        assert_eq!(pool_bounds(3, 4, 8), (1, 2));
    }

    #[test]
    fn adaptive_pool_divisible() {
        let xs = arange_map(4, 4);
        let pooled = adaptive_avg_pool2d(&xs, 2, 2).unwrap();
        let values = pooled.flatten_all().unwrap().to_vec1::<f32>().unwrap();

        assert_eq!(values, vec![2.5, 4.5, 10.5, 12.5]);
    }

    #[test]
    fn adaptive_pool_upsamples_small_maps() {
        let xs = arange_map(4, 4);
        let pooled = adaptive_avg_pool2d(&xs, 8, 8).unwrap();
        assert_eq!(pooled.dims4().unwrap(), (1, 1, 8, 8));

        let rows = pooled.squeeze(0).unwrap().squeeze(0).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(rows[0][0], 0.0);
        assert_eq!(rows[0][1], 0.0);
        assert_eq!(rows[7][7], 15.0);

        // 复制采样不改变全局均值
        let mean = global_avg_pool(&pooled)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!((mean[0] - 7.5).abs() < 1e-6);
    }

    #[test]
    fn adaptive_pool_uneven() {
        let xs = arange_map(5, 5);
        let pooled = adaptive_avg_pool2d(&xs, 3, 3).unwrap();
        let rows = pooled.squeeze(0).unwrap().squeeze(0).unwrap().to_vec2::<f32>().unwrap();

        // 左上窗口覆盖行 0..2、列 0..2 => {0,1,5,6}
        assert!((rows[0][0] - 3.0).abs() < 1e-6);
        // 中心窗口覆盖行 1..4、列 1..4
        assert!((rows[1][1] - 12.0).abs() < 1e-6);
    }

    #[test]
    fn relu6_clamps() {
        let xs = Tensor::new(&[-1f32, 3.0, 9.0], &Device::Cpu).unwrap();
        let ys = Act::Relu6.apply(&xs).unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(ys, vec![0.0, 3.0, 6.0]);
    }

    #[test]
    fn conv_bn_keeps_spatial_size_with_stride_one() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let layer = ConvBn::load(
            vb.pp("0"),
            vb.pp("1"),
            ConvSpec::new(3, 8, 3),
            Some(Act::Silu),
        )
        .unwrap();
        let xs = Tensor::zeros((1, 3, 16, 16), DType::F32, &Device::Cpu).unwrap();

        assert_eq!(layer.forward(&xs).unwrap().dims4().unwrap(), (1, 8, 16, 16));
    }
}
