// 该文件是 Yexing （夜行） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::HashMap;

use serde::{
  Serialize, Serializer,
  ser::{SerializeMap, SerializeStruct},
};

use crate::{BBox, SampleId};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub score: f32,
  pub bbox: BBox, // [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 置信度不低于阈值的检测
  pub fn positives(&self, conf_thresh: f32) -> impl Iterator<Item = &DetectItem> {
    self.items.iter().filter(move |item| item.score >= conf_thresh)
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

// {"boxes": [[x1, y1, x2, y2], ...], "scores": [...]}
impl Serialize for DetectResult {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let boxes: Vec<&BBox> = self.items.iter().map(|item| &item.bbox).collect();
    let scores: Vec<f32> = self.items.iter().map(|item| item.score).collect();
    let mut state = serializer.serialize_struct("DetectResult", 2)?;
    state.serialize_field("boxes", &boxes)?;
    state.serialize_field("scores", &scores)?;
    state.end()
  }
}

/// 全部样本的预测结果，保持推理顺序
#[derive(Debug, Clone, Default)]
pub struct Predictions {
  entries: Vec<(SampleId, DetectResult)>,
  index: HashMap<SampleId, usize>,
}

impl Predictions {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      entries: Vec::with_capacity(capacity),
      index: HashMap::with_capacity(capacity),
    }
  }

  /// 样本编号重复时拒绝插入并返回 false
  pub fn insert(&mut self, id: SampleId, result: DetectResult) -> bool {
    if self.index.contains_key(&id) {
      return false;
    }
    self.index.insert(id, self.entries.len());
    self.entries.push((id, result));
    true
  }

  pub fn get(&self, id: SampleId) -> Option<&DetectResult> {
    self.index.get(&id).map(|&i| &self.entries[i].1)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (SampleId, &DetectResult)> {
    self.entries.iter().map(|(id, result)| (*id, result))
  }

  pub fn sample_ids(&self) -> impl Iterator<Item = SampleId> + '_ {
    self.entries.iter().map(|(id, _)| *id)
  }
}

impl Serialize for Predictions {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.entries.len()))?;
    for (id, result) in &self.entries {
      map.serialize_entry(&id.to_string(), result)?;
    }
    map.end()
  }
}

mod checkpoint;
mod classifier;
mod complexity;
mod proposal;

pub use self::checkpoint::{CheckpointError, StateDict, TensorRecord};
pub use self::classifier::{
  Classifier, ClassifierBuilder, ClassifierConfig, FEATURE_DIM, proposal_features,
};
pub use self::complexity::{ComplexityReport, LayerStat, Profile};
pub use self::proposal::{Proposal, ProposalConfig, propose};
