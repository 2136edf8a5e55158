// 该文件是 Yexing （夜行） 项目的一部分。
// src/model/classifier.rs - 候选框分类器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  convert::Infallible,
  path::{Path, PathBuf},
};

use ndarray::{Array1, Array2};
use tracing::{debug, info};

use crate::{
  device::Device,
  frame::LumaFrame,
  model::{
    DetectItem, DetectResult, Model,
    checkpoint::{CheckpointError, StateDict},
    complexity::{ComplexityReport, LayerStat, Profile},
    proposal::{Proposal, ProposalConfig, propose},
  },
};

/// 每个候选框的特征维度
pub const FEATURE_DIM: usize = 8;
const MAX_ASPECT: f32 = 8.0;

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
  pub hidden: usize,
  pub proposal: ProposalConfig,
}

impl Default for ClassifierConfig {
  fn default() -> Self {
    Self {
      hidden: 16,
      proposal: ProposalConfig::default(),
    }
  }
}

#[derive(Debug, Clone)]
struct Linear {
  name: &'static str,
  weight: Array2<f32>, // [out, in]
  bias: Array1<f32>,
}

impl Linear {
  fn zeros(name: &'static str, in_features: usize, out_features: usize) -> Self {
    Self {
      name,
      weight: Array2::zeros((out_features, in_features)),
      bias: Array1::zeros(out_features),
    }
  }

  fn in_features(&self) -> usize {
    self.weight.ncols()
  }

  fn out_features(&self) -> usize {
    self.weight.nrows()
  }

  fn tensor_names(&self) -> [String; 2] {
    [format!("{}.weight", self.name), format!("{}.bias", self.name)]
  }

  fn load(&mut self, dict: &StateDict) -> Result<(), CheckpointError> {
    let [weight_name, bias_name] = self.tensor_names();
    let shape = [self.out_features(), self.in_features()];
    self.weight = dict.array2(&weight_name, shape)?;
    self.bias = dict.array1(&bias_name, shape[0])?;
    Ok(())
  }

  fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
    x.dot(&self.weight.t()) + &self.bias
  }

  fn stat(&self) -> LayerStat {
    let (input, output) = (self.in_features() as u64, self.out_features() as u64);
    LayerStat {
      name: self.name.to_string(),
      macs: input * output,
      params: input * output + output,
    }
  }
}

/// 两层感知机，对每个亮斑候选框给出车灯置信度
#[derive(Debug, Clone)]
pub struct Classifier {
  config: ClassifierConfig,
  fc1: Linear,
  fc2: Linear,
  device: Device,
}

impl Classifier {
  /// 权重全零的模型，需要再加载检查点
  pub fn new(config: ClassifierConfig, device: Device) -> Self {
    let fc1 = Linear::zeros("fc1", FEATURE_DIM, config.hidden);
    let fc2 = Linear::zeros("fc2", config.hidden, 1);
    Self {
      config,
      fc1,
      fc2,
      device,
    }
  }

  pub fn device(&self) -> Device {
    self.device
  }

  pub fn config(&self) -> &ClassifierConfig {
    &self.config
  }

  pub fn load_state_dict(&mut self, dict: &StateDict) -> Result<(), CheckpointError> {
    self.fc1.load(dict)?;
    self.fc2.load(dict)?;

    let known: Vec<String> = self
      .fc1
      .tensor_names()
      .into_iter()
      .chain(self.fc2.tensor_names())
      .collect();
    for key in dict.keys().filter(|k| !known.iter().any(|n| n.as_str() == *k)) {
      debug!("忽略检查点中的未知张量: {}", key);
    }
    Ok(())
  }

  /// 特征矩阵 [n, FEATURE_DIM] 到置信度
  pub fn score(&self, features: &Array2<f32>) -> Vec<f32> {
    let hidden = self.fc1.forward(features).mapv(|v| v.max(0.0));
    self
      .fc2
      .forward(&hidden)
      .iter()
      .map(|&logit| sigmoid(logit))
      .collect()
  }
}

/// 候选框的手工特征，见 [`FEATURE_DIM`]
pub fn proposal_features(
  frame: &LumaFrame,
  proposal: &Proposal,
  frame_mean: f32,
) -> [f32; FEATURE_DIM] {
  let [x0, y0, x1, y1] = proposal.bbox.map(|v| v.max(0.0) as u32);
  let x1 = x1.min(frame.width());
  let y1 = y1.min(frame.height());
  let (w, h) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
  let box_area = (w * h).max(1) as f32;

  let mut sum = 0f64;
  let mut sum_sq = 0f64;
  let mut max = 0u8;
  for y in y0..y1 {
    for x in x0..x1 {
      let v = frame.pixel(x, y);
      sum += v as f64;
      sum_sq += (v as f64) * (v as f64);
      max = max.max(v);
    }
  }
  let mean = (sum / box_area as f64) as f32;
  let var = (sum_sq / box_area as f64) as f32 - mean * mean;
  let frame_area = (frame.width() * frame.height()).max(1) as f32;
  let aspect = if h == 0 { 0.0 } else { w as f32 / h as f32 };
  let center_y = (y0 + y1) as f32 / 2.0 / frame.height().max(1) as f32;

  [
    mean / 255.0,
    max as f32 / 255.0,
    var.max(0.0).sqrt() / 255.0,
    box_area / frame_area,
    aspect.min(MAX_ASPECT) / MAX_ASPECT,
    proposal.blob_area as f32 / box_area,
    center_y,
    (mean - frame_mean) / 255.0,
  ]
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

impl Model for Classifier {
  type Input = LumaFrame;
  type Output = DetectResult;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let proposals = propose(input, &self.config.proposal);
    if proposals.is_empty() {
      return Ok(DetectResult::default());
    }

    let (frame_mean, _) = input.mean_std();
    let rows: Vec<[f32; FEATURE_DIM]> = proposals
      .iter()
      .map(|p| proposal_features(input, p, frame_mean))
      .collect();
    let features = Array2::from_shape_fn((rows.len(), FEATURE_DIM), |(i, j)| rows[i][j]);

    let scores = self.score(&features);
    let items: Vec<DetectItem> = proposals
      .into_iter()
      .zip(scores)
      .map(|(proposal, score)| DetectItem {
        score,
        bbox: proposal.bbox,
      })
      .collect();
    Ok(items.into())
  }
}

impl Profile for Classifier {
  fn complexity(&self) -> ComplexityReport {
    ComplexityReport {
      input_shape: vec![1, FEATURE_DIM],
      layers: vec![self.fc1.stat(), self.fc2.stat()],
    }
  }
}

pub struct ClassifierBuilder {
  model_path: PathBuf,
  config: ClassifierConfig,
  device: Device,
}

impl ClassifierBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      config: ClassifierConfig::default(),
      device: Device::FALLBACK,
    }
  }

  pub fn config(mut self, config: ClassifierConfig) -> Self {
    self.config = config;
    self
  }

  pub fn device(mut self, device: Device) -> Self {
    self.device = device;
    self
  }

  pub fn build(self) -> Result<Classifier, CheckpointError> {
    let mut model = Classifier::new(self.config, self.device);
    let dict = StateDict::from_path(&self.model_path)?;
    model.load_state_dict(&dict)?;
    info!("模型加载完成 ({} 个张量)", dict.len());
    Ok(model)
  }
}
