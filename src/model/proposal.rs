// 该文件是 Yexing （夜行） 项目的一部分。
// src/model/proposal.rs - 亮斑候选框
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};
use tracing::debug;

use crate::{BBox, frame::LumaFrame};

#[derive(Debug, Clone)]
pub struct ProposalConfig {
  /// 阈值 = max(均值 + sigma_factor * 标准差, intensity_floor)
  pub sigma_factor: f32,
  pub intensity_floor: u8,
  /// 小于该像素数的连通域丢弃
  pub min_area: u32,
  /// 候选框向外扩展的像素
  pub margin: u32,
}

impl Default for ProposalConfig {
  fn default() -> Self {
    Self {
      sigma_factor: 2.0,
      intensity_floor: 96,
      min_area: 4,
      margin: 4,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
  pub bbox: BBox,
  /// 连通域内的亮像素数
  pub blob_area: u32,
}

struct Extent {
  x_min: u32,
  y_min: u32,
  x_max: u32,
  y_max: u32,
  area: u32,
}

/// 在帧上查找亮斑，返回按 (y, x) 排序的候选框
pub fn propose(frame: &LumaFrame, config: &ProposalConfig) -> Vec<Proposal> {
  if frame.is_empty() {
    return Vec::new();
  }

  let (mean, std) = frame.mean_std();
  let threshold = (mean + config.sigma_factor * std)
    .max(config.intensity_floor as f32)
    .min(255.0);

  let binary = GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
    if frame.pixel(x, y) as f32 >= threshold {
      Luma([255u8])
    } else {
      Luma([0u8])
    }
  });
  let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

  let mut extents: BTreeMap<u32, Extent> = BTreeMap::new();
  for (x, y, label) in labels.enumerate_pixels() {
    let label = label[0];
    if label == 0 {
      continue;
    }
    extents
      .entry(label)
      .and_modify(|e| {
        e.x_min = e.x_min.min(x);
        e.y_min = e.y_min.min(y);
        e.x_max = e.x_max.max(x);
        e.y_max = e.y_max.max(y);
        e.area += 1;
      })
      .or_insert(Extent {
        x_min: x,
        y_min: y,
        x_max: x,
        y_max: y,
        area: 1,
      });
  }

  let (width, height) = (frame.width(), frame.height());
  let mut proposals: Vec<Proposal> = extents
    .into_values()
    .filter(|e| e.area >= config.min_area)
    .map(|e| {
      let x_min = e.x_min.saturating_sub(config.margin);
      let y_min = e.y_min.saturating_sub(config.margin);
      let x_max = (e.x_max + 1 + config.margin).min(width);
      let y_max = (e.y_max + 1 + config.margin).min(height);
      Proposal {
        bbox: [x_min as f32, y_min as f32, x_max as f32, y_max as f32],
        blob_area: e.area,
      }
    })
    .collect();

  proposals.sort_by(|a, b| {
    (a.bbox[1], a.bbox[0])
      .partial_cmp(&(b.bbox[1], b.bbox[0]))
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  debug!(
    "阈值 {:.1}，候选框 {} 个",
    threshold,
    proposals.len()
  );
  proposals
}
