// 该文件是 Yexing （夜行） 项目的一部分。
// src/output/coco.rs - COCO 检测结果格式
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

use serde::{Deserialize, Serialize};

use crate::{SampleId, model::Predictions};

/// 只有车灯一个类别
pub const LIGHT_CATEGORY_ID: u32 = 1;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CocoDetection {
  pub image_id: SampleId,
  pub category_id: u32,
  /// [x, y, width, height]
  pub bbox: [f32; 4],
  pub score: f32,
}

/// 置信度不低于阈值的框转为 COCO 结果列表
pub fn to_coco(predictions: &Predictions, conf_thresh: f32) -> Vec<CocoDetection> {
  predictions
    .iter()
    .flat_map(|(image_id, result)| {
      result.positives(conf_thresh).map(move |item| {
        let [x1, y1, x2, y2] = item.bbox;
        CocoDetection {
          image_id,
          category_id: LIGHT_CATEGORY_ID,
          bbox: [x1, y1, x2 - x1, y2 - y1],
          score: item.score,
        }
      })
    })
    .collect()
}
