use super::blocks::InvertedResidual;
use super::histogram::ColorHistogram;
use super::layers::{global_avg_pool, Act, ConvBn, ConvSpec};
use super::mobilevit::MobileVitBlock;
use super::variant::Variant;
use crate::config::HistogramConfig;
use candle_core::{Module, Result, Tensor};
use candle_nn::{linear, Linear, VarBuilder};

/// ColorMobileViTv3：MobileNetV2 倒残差块与简化 MobileViT 块交替堆叠，
/// 池化后的骨干特征与颜色直方图特征拼接后分类。
///
/// 字段名与训练脚本中的模块名一一对应，权重可直接按名加载。
#[derive(Debug, Clone)]
pub struct ColorMobileViT {
    conv1: ConvBn,
    mv2_1: InvertedResidual,
    mv2_2: InvertedResidual,
    mvit1: MobileVitBlock,
    mv2_3: InvertedResidual,
    mvit2: MobileVitBlock,
    mv2_4: InvertedResidual,
    mvit3: MobileVitBlock,
    color_histogram: ColorHistogram,
    classifier: Linear,
    num_classes: usize,
}

impl ColorMobileViT {
    pub fn load(
        vb: VarBuilder,
        variant: Variant,
        num_classes: usize,
        histogram: HistogramConfig,
    ) -> Result<Self> {
        let spec = variant.spec();
        let ch = spec.channels;
        let dims = spec.transformer_dims;

        let conv1 = ConvBn::load(
            vb.pp("conv1").pp(0),
            vb.pp("conv1").pp(1),
            ConvSpec::new(3, ch[0], 3).stride(2),
            Some(Act::Relu6),
        )?;

        let mv2_1 = InvertedResidual::load(vb.pp("mv2_1"), ch[0], ch[1], 2, 1)?;
        let mv2_2 = InvertedResidual::load(vb.pp("mv2_2"), ch[1], ch[2], 2, 6)?;
        let mvit1 = MobileVitBlock::load(
            vb.pp("mvit1"),
            dims[0],
            spec.depths[0],
            ch[2],
            spec.mlp_dims[0],
        )?;

        let mv2_3 = InvertedResidual::load(vb.pp("mv2_3"), ch[2], ch[3], 2, 6)?;
        let mvit2 = MobileVitBlock::load(
            vb.pp("mvit2"),
            dims[1],
            spec.depths[1],
            ch[3],
            spec.mlp_dims[1],
        )?;

        let mv2_4 = InvertedResidual::load(vb.pp("mv2_4"), ch[3], ch[4], 2, 6)?;
        let mvit3 = MobileVitBlock::load(
            vb.pp("mvit3"),
            dims[2],
            spec.depths[2],
            ch[4],
            spec.mlp_dims[2],
        )?;

        let color_histogram = ColorHistogram::load(vb.pp("color_histogram"), histogram)?;
        let classifier = linear(ch[4] + histogram.output_dim, num_classes, vb.pp("classifier"))?;

        Ok(Self {
            conv1,
            mv2_1,
            mv2_2,
            mvit1,
            mv2_3,
            mvit2,
            mv2_4,
            mvit3,
            color_histogram,
            classifier,
            num_classes,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// 骨干网络输出的池化特征 (B, C4)
    pub fn backbone_features(&self, xs: &Tensor) -> Result<Tensor> {
        let xs = self.conv1.forward(xs)?;
        let xs = self.mv2_1.forward(&xs)?;
        let xs = self.mv2_2.forward(&xs)?;
        let xs = self.mvit1.forward(&xs)?;
        let xs = self.mv2_3.forward(&xs)?;
        let xs = self.mvit2.forward(&xs)?;
        let xs = self.mv2_4.forward(&xs)?;
        let xs = self.mvit3.forward(&xs)?;

        global_avg_pool(&xs)
    }
}

impl Module for ColorMobileViT {
    /// 输出未归一化的 logits (B, num_classes)
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        // 直方图取自网络输入本身
        let color_hist = self.color_histogram.forward(xs)?;
        let features = self.backbone_features(xs)?;

        let combined = Tensor::cat(&[&features, &color_hist], 1)?;
        self.classifier.forward(&combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn build(variant: Variant) -> (VarMap, ColorMobileViT) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let model = ColorMobileViT::load(vb, variant, 4, HistogramConfig::default()).unwrap();
        (varmap, model)
    }

    #[test]
    fn forward_produces_logits_per_class() {
        let (_varmap, model) = build(Variant::Xxs);
        let xs = Tensor::randn(0f32, 1.0, (1, 3, 128, 128), &Device::Cpu).unwrap();

        assert_eq!(model.backbone_features(&xs).unwrap().dims2().unwrap(), (1, 80));
        assert_eq!(model.forward(&xs).unwrap().dims2().unwrap(), (1, 4));
    }

    #[test]
    fn head_width_depends_on_variant() {
        for (variant, c4) in [(Variant::Xxs, 80), (Variant::Xs, 160), (Variant::S, 256)] {
            let (varmap, _model) = build(variant);
            let data = varmap.data().lock().unwrap();
            assert_eq!(data["classifier.weight"].dims(), &[4, c4 + 64]);
            assert_eq!(data["color_histogram.fc.0.weight"].dims(), &[64, 48]);
            assert_eq!(data["conv1.0.weight"].dims(), &[16, 3, 3, 3]);
        }
    }

    #[test]
    fn encoder_depths_follow_preset() {
        let (varmap, _model) = build(Variant::Xs);
        let data = varmap.data().lock().unwrap();

        // XS 深度 [2, 4, 4] => 实际层数 [1, 2, 2]
        assert!(data.contains_key("mvit1.transformer.layers.0.norm1.weight"));
        assert!(!data.contains_key("mvit1.transformer.layers.1.norm1.weight"));
        assert!(data.contains_key("mvit3.transformer.layers.1.norm1.weight"));
        assert!(!data.contains_key("mvit3.transformer.layers.2.norm1.weight"));
    }
}
