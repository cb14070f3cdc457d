use crate::config::HistogramConfig;
use candle_core::{DType, IndexOp, Module, Result, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// 直方图分箱的取值范围
const HIST_MIN: f64 = 0.0;
const HIST_MAX: f64 = 1.0;

/// RGB 颜色直方图特征层
///
/// 每个通道在 [0, 1] 上等宽分箱，统计落入各箱的像素比例，三通道拼接后经
/// `Linear -> ReLU -> Dropout` 投影。推理时 Dropout 为恒等映射，因此不建模。
///
/// 输入是标准化之后的张量，超出 [0, 1] 的值不落入任何箱，比例之和会小于 1。
#[derive(Debug, Clone)]
pub struct ColorHistogram {
    fc: Linear,
    bins: usize,
}

impl ColorHistogram {
    pub fn load(vb: VarBuilder, config: HistogramConfig) -> Result<Self> {
        let fc = linear(config.bins * 3, config.output_dim, vb.pp("fc").pp("0"))?;
        Ok(Self {
            fc,
            bins: config.bins,
        })
    }

    /// 分箱边界，`bins + 1` 个等距点
    pub fn bin_edges(&self) -> Vec<f32> {
        bin_edges(self.bins)
    }

    /// 计算 (B, 3 * bins) 的原始分箱比例
    pub fn bin_fractions(&self, xs: &Tensor) -> Result<Tensor> {
        let (b, c, _h, _w) = xs.dims4()?;
        let edges = self.bin_edges();

        let mut channels = Vec::with_capacity(c);
        for ch in 0..c {
            let values = xs.i((.., ch))?.reshape((b, ()))?;
            channels.push(self.channel_histogram(&values, &edges)?);
        }

        Tensor::cat(&channels, 1)
    }

    fn channel_histogram(&self, values: &Tensor, edges: &[f32]) -> Result<Tensor> {
        let mut bins = Vec::with_capacity(self.bins);
        for i in 0..self.bins {
            let lower = values.ge(edges[i])?;
            let upper = values.lt(edges[i + 1])?;
            let mut mask = lower.mul(&upper)?;
            if i == self.bins - 1 {
                // 最后一个箱为闭区间，包含上界
                mask = mask.maximum(&values.eq(edges[i + 1])?)?;
            }
            bins.push(mask.to_dtype(DType::F32)?.mean_keepdim(1)?);
        }

        Tensor::cat(&bins, 1)
    }
}

impl Module for ColorHistogram {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let hist = self.bin_fractions(xs)?;
        self.fc.forward(&hist)?.relu()
    }
}

fn bin_edges(bins: usize) -> Vec<f32> {
    (0..=bins)
        .map(|i| (HIST_MIN + (HIST_MAX - HIST_MIN) * i as f64 / bins as f64) as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn histogram() -> ColorHistogram {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        ColorHistogram::load(vb, HistogramConfig::default()).unwrap()
    }

    fn channel_sums(fractions: &Tensor, bins: usize) -> Vec<f32> {
        let rows = fractions.to_vec2::<f32>().unwrap();
        rows[0].chunks(bins).map(|c| c.iter().sum()).collect()
    }

    #[test]
    fn edges_span_unit_interval() {
        let edges = bin_edges(16);
        assert_eq!(edges.len(), 17);
        assert_eq!(edges[0], 0.0);
        assert_eq!(edges[8], 0.5);
        assert_eq!(edges[16], 1.0);
    }

    #[test]
    fn fractions_sum_to_one_for_unit_range_values() {
        let hist = histogram();
        let xs = Tensor::rand(0f32, 1.0, (1, 3, 32, 32), &Device::Cpu).unwrap();
        let fractions = hist.bin_fractions(&xs).unwrap();

        assert_eq!(fractions.dims2().unwrap(), (1, 48));
        for sum in channel_sums(&fractions, 16) {
            assert!((sum - 1.0).abs() < 1e-6, "channel sum was {}", sum);
        }
    }

    #[test]
    fn upper_edge_lands_in_last_bin() {
        let hist = histogram();
        let xs = Tensor::ones((1, 3, 4, 4), DType::F32, &Device::Cpu).unwrap();
        let rows = hist.bin_fractions(&xs).unwrap().to_vec2::<f32>().unwrap();

        for ch in 0..3 {
            assert_eq!(rows[0][ch * 16 + 15], 1.0);
            assert_eq!(rows[0][ch * 16..ch * 16 + 15].iter().sum::<f32>(), 0.0);
        }
    }

    #[test]
    fn lower_edges_are_inclusive() {
        let hist = histogram();
        let xs = Tensor::full(0.5f32, (1, 3, 2, 2), &Device::Cpu).unwrap();
        let rows = hist.bin_fractions(&xs).unwrap().to_vec2::<f32>().unwrap();

        assert_eq!(rows[0][8], 1.0);
        assert_eq!(rows[0][7], 0.0);
    }

    #[test]
    fn out_of_range_values_are_not_counted() {
        let hist = histogram();
        // 半数像素在范围外（标准化后的暗像素即为负值）
        let data: Vec<f32> = (0..3 * 4).map(|i| if i % 2 == 0 { -2.0 } else { 0.25 }).collect();
        let xs = Tensor::from_vec(data, (1, 3, 2, 2), &Device::Cpu).unwrap();
        let fractions = hist.bin_fractions(&xs).unwrap();

        for sum in channel_sums(&fractions, 16) {
            assert!((sum - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn forward_projects_to_output_dim() {
        let hist = histogram();
        let xs = Tensor::rand(0f32, 1.0, (2, 3, 8, 8), &Device::Cpu).unwrap();
        assert_eq!(hist.forward(&xs).unwrap().dims2().unwrap(), (2, 64));
    }
}
