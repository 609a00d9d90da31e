//! InceptionV3
//!
//! The standard Inception-v3 trunk without the auxiliary classifier:
//!
//! ```text
//! stem:   conv3x3/2(32) → conv3x3(32) → conv3x3(64) → maxpool/2
//!         → conv1x1(80) → conv3x3(192) → maxpool/2
//! Mixed_5b..5d   Inception-A   (pool features 32, 64, 64)
//! Mixed_6a       grid reduction
//! Mixed_6b..6e   Inception-C   (7x7 factorised, widths 128, 160, 160, 192)
//! Mixed_7a       grid reduction
//! Mixed_7b..7c   Inception-E   (expanded filter banks)
//! global avg pool → dropout(0.5) → dense(classes)
//! ```
//!
//! Every convolution is conv (no bias) → batch norm → ReLU.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{
            AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, AvgPool2d, AvgPool2dConfig, MaxPool2d,
            MaxPool2dConfig,
        },
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Initializer, Linear, LinearConfig,
        PaddingConfig2d,
    },
    tensor::{activation::relu, backend::Backend, Tensor},
};

use super::{check_classes, BuildImageClassifier, ImageClassifier, InputShape};
use crate::utils::error::Result;

const NAME: &str = "InceptionV3";

/// The stem and the two grid reductions need at least this many pixels
pub(crate) const MIN_SIDE: usize = 75;

const BN_EPSILON: f64 = 0.001;

const LAYERS: [&str; 22] = [
    "reshape1",
    "Conv2d_1a_3x3",
    "Conv2d_2a_3x3",
    "Conv2d_2b_3x3",
    "MaxPool_3a_3x3",
    "Conv2d_3b_1x1",
    "Conv2d_4a_3x3",
    "MaxPool_5a_3x3",
    "Mixed_5b",
    "Mixed_5c",
    "Mixed_5d",
    "Mixed_6a",
    "Mixed_6b",
    "Mixed_6c",
    "Mixed_6d",
    "Mixed_6e",
    "Mixed_7a",
    "Mixed_7b",
    "Mixed_7c",
    "AvgPool",
    "Dropout",
    "Logits",
];
const DROPOUT: f64 = 0.5;
const FEATURES: usize = 2048;

/// Convolution → batch norm → ReLU
#[derive(Module, Debug)]
pub struct BasicConv2d<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
}

impl<B: Backend> BasicConv2d<B> {
    fn new(
        channels: [usize; 2],
        kernel: [usize; 2],
        stride: usize,
        padding: [usize; 2],
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new(channels, kernel)
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
            .with_bias(false)
            .with_initializer(Initializer::XavierUniform { gain: 1.0 })
            .init(device);
        let bn = BatchNormConfig::new(channels[1])
            .with_epsilon(BN_EPSILON)
            .init(device);

        Self { conv, bn }
    }

    fn square(in_ch: usize, out_ch: usize, kernel: usize, device: &B::Device) -> Self {
        Self::new([in_ch, out_ch], [kernel, kernel], 1, [kernel / 2, kernel / 2], device)
    }

    fn reduce(in_ch: usize, out_ch: usize, kernel: usize, device: &B::Device) -> Self {
        Self::new([in_ch, out_ch], [kernel, kernel], 2, [0, 0], device)
    }

    /// `1×n` convolution keeping the spatial size
    fn row(in_ch: usize, out_ch: usize, n: usize, device: &B::Device) -> Self {
        Self::new([in_ch, out_ch], [1, n], 1, [0, n / 2], device)
    }

    /// `n×1` convolution keeping the spatial size
    fn column(in_ch: usize, out_ch: usize, n: usize, device: &B::Device) -> Self {
        Self::new([in_ch, out_ch], [n, 1], 1, [n / 2, 0], device)
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu(self.bn.forward(self.conv.forward(x)))
    }
}

fn avg_pool_3x3_same() -> AvgPool2d {
    AvgPool2dConfig::new([3, 3])
        .with_strides([1, 1])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init()
}

fn max_pool_3x3_reduce() -> MaxPool2d {
    MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init()
}

/// Inception-A: 1x1, 5x5 and double 3x3 towers plus pooled projection
#[derive(Module, Debug)]
pub struct InceptionA<B: Backend> {
    branch1x1: BasicConv2d<B>,
    branch5x5_1: BasicConv2d<B>,
    branch5x5_2: BasicConv2d<B>,
    branch3x3dbl_1: BasicConv2d<B>,
    branch3x3dbl_2: BasicConv2d<B>,
    branch3x3dbl_3: BasicConv2d<B>,
    pool: AvgPool2d,
    branch_pool: BasicConv2d<B>,
}

impl<B: Backend> InceptionA<B> {
    fn new(in_ch: usize, pool_features: usize, device: &B::Device) -> Self {
        Self {
            branch1x1: BasicConv2d::square(in_ch, 64, 1, device),
            branch5x5_1: BasicConv2d::square(in_ch, 48, 1, device),
            branch5x5_2: BasicConv2d::square(48, 64, 5, device),
            branch3x3dbl_1: BasicConv2d::square(in_ch, 64, 1, device),
            branch3x3dbl_2: BasicConv2d::square(64, 96, 3, device),
            branch3x3dbl_3: BasicConv2d::square(96, 96, 3, device),
            pool: avg_pool_3x3_same(),
            branch_pool: BasicConv2d::square(in_ch, pool_features, 1, device),
        }
    }

    const fn out_channels(pool_features: usize) -> usize {
        64 + 64 + 96 + pool_features
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(x.clone());

        let b5 = self.branch5x5_1.forward(x.clone());
        let b5 = self.branch5x5_2.forward(b5);

        let b3 = self.branch3x3dbl_1.forward(x.clone());
        let b3 = self.branch3x3dbl_2.forward(b3);
        let b3 = self.branch3x3dbl_3.forward(b3);

        let bp = self.branch_pool.forward(self.pool.forward(x));

        Tensor::cat(vec![b1, b5, b3, bp], 1)
    }
}

/// Inception-B: 35x35 → 17x17 grid reduction
#[derive(Module, Debug)]
pub struct InceptionB<B: Backend> {
    branch3x3: BasicConv2d<B>,
    branch3x3dbl_1: BasicConv2d<B>,
    branch3x3dbl_2: BasicConv2d<B>,
    branch3x3dbl_3: BasicConv2d<B>,
    pool: MaxPool2d,
}

impl<B: Backend> InceptionB<B> {
    fn new(in_ch: usize, device: &B::Device) -> Self {
        Self {
            branch3x3: BasicConv2d::reduce(in_ch, 384, 3, device),
            branch3x3dbl_1: BasicConv2d::square(in_ch, 64, 1, device),
            branch3x3dbl_2: BasicConv2d::square(64, 96, 3, device),
            branch3x3dbl_3: BasicConv2d::reduce(96, 96, 3, device),
            pool: max_pool_3x3_reduce(),
        }
    }

    const fn out_channels(in_ch: usize) -> usize {
        384 + 96 + in_ch
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b3 = self.branch3x3.forward(x.clone());

        let bd = self.branch3x3dbl_1.forward(x.clone());
        let bd = self.branch3x3dbl_2.forward(bd);
        let bd = self.branch3x3dbl_3.forward(bd);

        let bp = self.pool.forward(x);

        Tensor::cat(vec![b3, bd, bp], 1)
    }
}

/// Inception-C: 7x7 convolutions factorised into 1x7 and 7x1
#[derive(Module, Debug)]
pub struct InceptionC<B: Backend> {
    branch1x1: BasicConv2d<B>,
    branch7x7_1: BasicConv2d<B>,
    branch7x7_2: BasicConv2d<B>,
    branch7x7_3: BasicConv2d<B>,
    branch7x7dbl_1: BasicConv2d<B>,
    branch7x7dbl_2: BasicConv2d<B>,
    branch7x7dbl_3: BasicConv2d<B>,
    branch7x7dbl_4: BasicConv2d<B>,
    branch7x7dbl_5: BasicConv2d<B>,
    pool: AvgPool2d,
    branch_pool: BasicConv2d<B>,
}

impl<B: Backend> InceptionC<B> {
    fn new(in_ch: usize, c7: usize, device: &B::Device) -> Self {
        Self {
            branch1x1: BasicConv2d::square(in_ch, 192, 1, device),
            branch7x7_1: BasicConv2d::square(in_ch, c7, 1, device),
            branch7x7_2: BasicConv2d::row(c7, c7, 7, device),
            branch7x7_3: BasicConv2d::column(c7, 192, 7, device),
            branch7x7dbl_1: BasicConv2d::square(in_ch, c7, 1, device),
            branch7x7dbl_2: BasicConv2d::column(c7, c7, 7, device),
            branch7x7dbl_3: BasicConv2d::row(c7, c7, 7, device),
            branch7x7dbl_4: BasicConv2d::column(c7, c7, 7, device),
            branch7x7dbl_5: BasicConv2d::row(c7, 192, 7, device),
            pool: avg_pool_3x3_same(),
            branch_pool: BasicConv2d::square(in_ch, 192, 1, device),
        }
    }

    const OUT_CHANNELS: usize = 4 * 192;

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(x.clone());

        let b7 = self.branch7x7_1.forward(x.clone());
        let b7 = self.branch7x7_2.forward(b7);
        let b7 = self.branch7x7_3.forward(b7);

        let bd = self.branch7x7dbl_1.forward(x.clone());
        let bd = self.branch7x7dbl_2.forward(bd);
        let bd = self.branch7x7dbl_3.forward(bd);
        let bd = self.branch7x7dbl_4.forward(bd);
        let bd = self.branch7x7dbl_5.forward(bd);

        let bp = self.branch_pool.forward(self.pool.forward(x));

        Tensor::cat(vec![b1, b7, bd, bp], 1)
    }
}

/// Inception-D: 17x17 → 8x8 grid reduction
#[derive(Module, Debug)]
pub struct InceptionD<B: Backend> {
    branch3x3_1: BasicConv2d<B>,
    branch3x3_2: BasicConv2d<B>,
    branch7x7x3_1: BasicConv2d<B>,
    branch7x7x3_2: BasicConv2d<B>,
    branch7x7x3_3: BasicConv2d<B>,
    branch7x7x3_4: BasicConv2d<B>,
    pool: MaxPool2d,
}

impl<B: Backend> InceptionD<B> {
    fn new(in_ch: usize, device: &B::Device) -> Self {
        Self {
            branch3x3_1: BasicConv2d::square(in_ch, 192, 1, device),
            branch3x3_2: BasicConv2d::reduce(192, 320, 3, device),
            branch7x7x3_1: BasicConv2d::square(in_ch, 192, 1, device),
            branch7x7x3_2: BasicConv2d::row(192, 192, 7, device),
            branch7x7x3_3: BasicConv2d::column(192, 192, 7, device),
            branch7x7x3_4: BasicConv2d::reduce(192, 192, 3, device),
            pool: max_pool_3x3_reduce(),
        }
    }

    const fn out_channels(in_ch: usize) -> usize {
        320 + 192 + in_ch
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b3 = self.branch3x3_1.forward(x.clone());
        let b3 = self.branch3x3_2.forward(b3);

        let b7 = self.branch7x7x3_1.forward(x.clone());
        let b7 = self.branch7x7x3_2.forward(b7);
        let b7 = self.branch7x7x3_3.forward(b7);
        let b7 = self.branch7x7x3_4.forward(b7);

        let bp = self.pool.forward(x);

        Tensor::cat(vec![b3, b7, bp], 1)
    }
}

/// Inception-E: expanded filter banks with split 1x3 / 3x1 outputs
#[derive(Module, Debug)]
pub struct InceptionE<B: Backend> {
    branch1x1: BasicConv2d<B>,
    branch3x3_1: BasicConv2d<B>,
    branch3x3_2a: BasicConv2d<B>,
    branch3x3_2b: BasicConv2d<B>,
    branch3x3dbl_1: BasicConv2d<B>,
    branch3x3dbl_2: BasicConv2d<B>,
    branch3x3dbl_3a: BasicConv2d<B>,
    branch3x3dbl_3b: BasicConv2d<B>,
    pool: AvgPool2d,
    branch_pool: BasicConv2d<B>,
}

impl<B: Backend> InceptionE<B> {
    fn new(in_ch: usize, device: &B::Device) -> Self {
        Self {
            branch1x1: BasicConv2d::square(in_ch, 320, 1, device),
            branch3x3_1: BasicConv2d::square(in_ch, 384, 1, device),
            branch3x3_2a: BasicConv2d::row(384, 384, 3, device),
            branch3x3_2b: BasicConv2d::column(384, 384, 3, device),
            branch3x3dbl_1: BasicConv2d::square(in_ch, 448, 1, device),
            branch3x3dbl_2: BasicConv2d::square(448, 384, 3, device),
            branch3x3dbl_3a: BasicConv2d::row(384, 384, 3, device),
            branch3x3dbl_3b: BasicConv2d::column(384, 384, 3, device),
            pool: avg_pool_3x3_same(),
            branch_pool: BasicConv2d::square(in_ch, 192, 1, device),
        }
    }

    const OUT_CHANNELS: usize = 320 + 2 * 384 + 2 * 384 + 192;

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = self.branch1x1.forward(x.clone());

        let b3 = self.branch3x3_1.forward(x.clone());
        let b3 = Tensor::cat(
            vec![
                self.branch3x3_2a.forward(b3.clone()),
                self.branch3x3_2b.forward(b3),
            ],
            1,
        );

        let bd = self.branch3x3dbl_1.forward(x.clone());
        let bd = self.branch3x3dbl_2.forward(bd);
        let bd = Tensor::cat(
            vec![
                self.branch3x3dbl_3a.forward(bd.clone()),
                self.branch3x3dbl_3b.forward(bd),
            ],
            1,
        );

        let bp = self.branch_pool.forward(self.pool.forward(x));

        Tensor::cat(vec![b1, b3, bd, bp], 1)
    }
}

/// InceptionV3 classifier
#[derive(Module, Debug)]
pub struct InceptionV3<B: Backend> {
    conv2d_1a_3x3: BasicConv2d<B>,
    conv2d_2a_3x3: BasicConv2d<B>,
    conv2d_2b_3x3: BasicConv2d<B>,
    maxpool1: MaxPool2d,
    conv2d_3b_1x1: BasicConv2d<B>,
    conv2d_4a_3x3: BasicConv2d<B>,
    maxpool2: MaxPool2d,
    mixed_5b: InceptionA<B>,
    mixed_5c: InceptionA<B>,
    mixed_5d: InceptionA<B>,
    mixed_6a: InceptionB<B>,
    mixed_6b: InceptionC<B>,
    mixed_6c: InceptionC<B>,
    mixed_6d: InceptionC<B>,
    mixed_6e: InceptionC<B>,
    mixed_7a: InceptionD<B>,
    mixed_7b: InceptionE<B>,
    mixed_7c: InceptionE<B>,
    avgpool: AdaptiveAvgPool2d,
    dropout: Dropout,
    fc: Linear<B>,
    width: usize,
    height: usize,
    channels: usize,
    num_classes: usize,
}

impl<B: Backend> InceptionV3<B> {
    pub fn new(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self> {
        check_classes(NAME, num_classes)?;
        input.validate(NAME, MIN_SIDE)?;

        let a1 = InceptionA::<B>::out_channels(32);
        let a2 = InceptionA::<B>::out_channels(64);
        let b = InceptionB::<B>::out_channels(a2);
        let c = InceptionC::<B>::OUT_CHANNELS;
        let d = InceptionD::<B>::out_channels(c);
        let e = InceptionE::<B>::OUT_CHANNELS;
        debug_assert_eq!(b, c);
        debug_assert_eq!(e, FEATURES);

        tracing::debug!(
            "Building InceptionV3 for {} input, {} classes",
            input,
            num_classes
        );

        Ok(Self {
            conv2d_1a_3x3: BasicConv2d::reduce(input.channels, 32, 3, device),
            conv2d_2a_3x3: BasicConv2d::new([32, 32], [3, 3], 1, [0, 0], device),
            conv2d_2b_3x3: BasicConv2d::square(32, 64, 3, device),
            maxpool1: max_pool_3x3_reduce(),
            conv2d_3b_1x1: BasicConv2d::square(64, 80, 1, device),
            conv2d_4a_3x3: BasicConv2d::new([80, 192], [3, 3], 1, [0, 0], device),
            maxpool2: max_pool_3x3_reduce(),
            mixed_5b: InceptionA::new(192, 32, device),
            mixed_5c: InceptionA::new(a1, 64, device),
            mixed_5d: InceptionA::new(a2, 64, device),
            mixed_6a: InceptionB::new(a2, device),
            mixed_6b: InceptionC::new(b, 128, device),
            mixed_6c: InceptionC::new(c, 160, device),
            mixed_6d: InceptionC::new(c, 160, device),
            mixed_6e: InceptionC::new(c, 192, device),
            mixed_7a: InceptionD::new(c, device),
            mixed_7b: InceptionE::new(d, device),
            mixed_7c: InceptionE::new(e, device),
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout: DropoutConfig::new(DROPOUT).init(),
            fc: LinearConfig::new(FEATURES, num_classes)
                .with_initializer(Initializer::XavierUniform { gain: 1.0 })
                .init(device),
            width: input.width,
            height: input.height,
            channels: input.channels,
            num_classes,
        })
    }
}

impl<B: Backend> InceptionV3<B> {
    /// Run the graph up to and including `scope`, flattened per sample
    fn forward_until(&self, input: Tensor<B, 2>, scope: &str) -> Tensor<B, 2> {
        let [batch_size, _] = input.dims();
        let mut x: Tensor<B, 4> =
            input.reshape([batch_size, self.channels, self.height, self.width]);
        if scope == "reshape1" {
            return x.flatten(1, 3);
        }

        type Stage<'a, B> = (&'static str, &'a dyn Fn(Tensor<B, 4>) -> Tensor<B, 4>);
        let stages: [Stage<B>; 18] = [
            ("Conv2d_1a_3x3", &|x| self.conv2d_1a_3x3.forward(x)),
            ("Conv2d_2a_3x3", &|x| self.conv2d_2a_3x3.forward(x)),
            ("Conv2d_2b_3x3", &|x| self.conv2d_2b_3x3.forward(x)),
            ("MaxPool_3a_3x3", &|x| self.maxpool1.forward(x)),
            ("Conv2d_3b_1x1", &|x| self.conv2d_3b_1x1.forward(x)),
            ("Conv2d_4a_3x3", &|x| self.conv2d_4a_3x3.forward(x)),
            ("MaxPool_5a_3x3", &|x| self.maxpool2.forward(x)),
            ("Mixed_5b", &|x| self.mixed_5b.forward(x)),
            ("Mixed_5c", &|x| self.mixed_5c.forward(x)),
            ("Mixed_5d", &|x| self.mixed_5d.forward(x)),
            ("Mixed_6a", &|x| self.mixed_6a.forward(x)),
            ("Mixed_6b", &|x| self.mixed_6b.forward(x)),
            ("Mixed_6c", &|x| self.mixed_6c.forward(x)),
            ("Mixed_6d", &|x| self.mixed_6d.forward(x)),
            ("Mixed_6e", &|x| self.mixed_6e.forward(x)),
            ("Mixed_7a", &|x| self.mixed_7a.forward(x)),
            ("Mixed_7b", &|x| self.mixed_7b.forward(x)),
            ("Mixed_7c", &|x| self.mixed_7c.forward(x)),
        ];
        for (name, stage) in stages {
            x = stage(x);
            if name == scope {
                return x.flatten(1, 3);
            }
        }

        // [B, 2048, H, W] -> [B, 2048]
        let x: Tensor<B, 2> = self.avgpool.forward(x).reshape([batch_size, FEATURES]);
        if scope == "AvgPool" {
            return x;
        }

        let x = self.dropout.forward(x);
        if scope == "Dropout" {
            return x;
        }

        self.fc.forward(x)
    }
}

impl<B: Backend> ImageClassifier<B> for InceptionV3<B> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn number_of_classes(&self) -> usize {
        self.num_classes
    }

    fn inputs(&self) -> InputShape {
        InputShape::new(self.width, self.height, self.channels)
    }

    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward_until(input, "Logits")
    }

    fn layers(&self) -> Vec<&'static str> {
        LAYERS.to_vec()
    }

    fn layer_output(&self, input: Tensor<B, 2>, scope: &str) -> Option<Tensor<B, 2>> {
        LAYERS
            .contains(&scope)
            .then(|| self.forward_until(input, scope))
    }
}

impl<B: Backend> BuildImageClassifier<B> for InceptionV3<B> {
    const MIN_SIDE: usize = MIN_SIDE;

    fn build(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self> {
        Self::new(input, num_classes, device)
    }
}
