// 该文件是 Yexing （夜行） 项目的一部分。
// src/dataset/annotation.rs - 边界框标注解析
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

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::{BBox, dataset::DatasetError};

/// 标签为 1 的框才是车灯实例
const INSTANCE_LABEL: i64 = 1;

#[derive(Error, Debug)]
pub enum AnnotationError {
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("标签数量 {labels} 与边界框数量 {boxes} 不一致")]
  LabelCount { labels: usize, boxes: usize },
  #[error("非法边界框 {0:?}")]
  InvalidBox(BBox),
}

#[derive(Deserialize, Debug)]
struct RawAnnotation {
  bounding_boxes: Vec<BBox>,
  #[serde(default)]
  labels: Option<Vec<i64>>,
}

/// 单帧的真值实例框
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
  pub instances: Vec<BBox>,
}

impl Annotation {
  pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
    let bytes = std::fs::read(path).map_err(|source| DatasetError::IoError {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_slice(&bytes).map_err(|source| DatasetError::MalformedAnnotation {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn from_slice(bytes: &[u8]) -> Result<Self, AnnotationError> {
    let raw: RawAnnotation = serde_json::from_slice(bytes)?;

    for bbox in &raw.bounding_boxes {
      if bbox.iter().any(|v| !v.is_finite()) || bbox[2] < bbox[0] || bbox[3] < bbox[1] {
        return Err(AnnotationError::InvalidBox(*bbox));
      }
    }

    let instances = match raw.labels {
      None => raw.bounding_boxes,
      Some(labels) => {
        if labels.len() != raw.bounding_boxes.len() {
          return Err(AnnotationError::LabelCount {
            labels: labels.len(),
            boxes: raw.bounding_boxes.len(),
          });
        }
        raw
          .bounding_boxes
          .into_iter()
          .zip(labels)
          .filter(|(_, label)| *label == INSTANCE_LABEL)
          .map(|(bbox, _)| bbox)
          .collect()
      }
    };

    Ok(Self { instances })
  }
}
