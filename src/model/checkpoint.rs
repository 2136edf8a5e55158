// 该文件是 Yexing （夜行） 项目的一部分。
// src/model/checkpoint.rs - 检查点读取
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// 训练脚本保存的检查点中权重所在的键
const NESTED_KEY: &str = "model";

#[derive(Error, Debug)]
pub enum CheckpointError {
  #[error("无法读取检查点 {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("检查点不是合法的 JSON: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("检查点顶层不是对象")]
  NotAnObject,
  #[error("缺少张量: {0}")]
  MissingTensor(String),
  #[error("张量 {name} 格式错误: {source}")]
  InvalidTensor {
    name: String,
    source: serde_json::Error,
  },
  #[error("张量 {name} 形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    name: String,
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("张量 {name} 数据长度 {actual} 与形状 {shape:?} 不符")]
  DataLength {
    name: String,
    shape: Vec<usize>,
    actual: usize,
  },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TensorRecord {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// 名称到张量的映射
#[derive(Debug, Clone)]
pub struct StateDict {
  tensors: Map<String, Value>,
}

impl StateDict {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
    let path = std::path::absolute(path.as_ref()).unwrap_or_else(|_| path.as_ref().to_path_buf());
    info!("加载检查点: {}", path.display());
    let bytes = std::fs::read(&path).map_err(|source| CheckpointError::IoError {
      path: path.clone(),
      source,
    })?;
    debug!(
      "检查点大小: {:.2} KB",
      bytes.len() as f64 / 1024.0
    );
    Self::from_value(serde_json::from_slice(&bytes)?)
  }

  /// 优先取 `"model"` 键下的权重；没有该键时整个对象就是权重
  pub fn from_value(value: Value) -> Result<Self, CheckpointError> {
    let Value::Object(mut root) = value else {
      return Err(CheckpointError::NotAnObject);
    };

    let tensors = match root.remove(NESTED_KEY) {
      Some(Value::Object(nested)) => {
        debug!("检查点权重位于 \"{}\" 键下", NESTED_KEY);
        nested
      }
      Some(_) => return Err(CheckpointError::NotAnObject),
      None => {
        debug!("检查点为扁平格式");
        root
      }
    };

    Ok(Self { tensors })
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.tensors.keys().map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.tensors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tensors.is_empty()
  }

  pub fn tensor(&self, name: &str) -> Result<TensorRecord, CheckpointError> {
    let value = self
      .tensors
      .get(name)
      .ok_or_else(|| CheckpointError::MissingTensor(name.to_string()))?;
    let record =
      TensorRecord::deserialize(value).map_err(|source| CheckpointError::InvalidTensor {
        name: name.to_string(),
        source,
      })?;

    let expected_len: usize = record.shape.iter().product();
    if expected_len != record.data.len() {
      return Err(CheckpointError::DataLength {
        name: name.to_string(),
        shape: record.shape,
        actual: record.data.len(),
      });
    }
    Ok(record)
  }

  pub fn array1(&self, name: &str, len: usize) -> Result<Array1<f32>, CheckpointError> {
    let record = self.tensor(name)?;
    check_shape(name, &[len], &record.shape)?;
    Ok(Array1::from_vec(record.data))
  }

  pub fn array2(&self, name: &str, shape: [usize; 2]) -> Result<Array2<f32>, CheckpointError> {
    let record = self.tensor(name)?;
    check_shape(name, &shape, &record.shape)?;
    Array2::from_shape_vec((shape[0], shape[1]), record.data).map_err(|_| {
      CheckpointError::ShapeMismatch {
        name: name.to_string(),
        expected: shape.to_vec(),
        actual: record.shape.clone(),
      }
    })
  }
}

fn check_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<(), CheckpointError> {
  if expected != actual {
    return Err(CheckpointError::ShapeMismatch {
      name: name.to_string(),
      expected: expected.to_vec(),
      actual: actual.to_vec(),
    });
  }
  Ok(())
}
