// 该文件是 Yexing （夜行） 项目的一部分。
// tests/common/mod.rs - 集成测试公共夹具
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

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use serde_json::{Value, json};

use yexing::{
  SampleId,
  device::{Device, DeviceProbe},
  model::FEATURE_DIM,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;
pub const HIDDEN: usize = 16;

/// 只有 cpu 的机器
pub struct CpuOnly;

impl DeviceProbe for CpuOnly {
  fn is_available(&self, device: Device) -> bool {
    device == Device::Cpu
  }
}

/// 每帧一个 5x5 的亮斑，返回亮斑对应的候选框
pub fn spot_center(id: SampleId) -> (u32, u32) {
  (12 + (id as u32 % 5) * 9, 14 + (id as u32 % 3) * 8)
}

pub fn spot_box(id: SampleId) -> [f32; 4] {
  let (cx, cy) = spot_center(id);
  [
    (cx - 6) as f32,
    (cy - 6) as f32,
    (cx + 7) as f32,
    (cy + 7) as f32,
  ]
}

fn frame(id: SampleId) -> GrayImage {
  let mut image = GrayImage::from_pixel(WIDTH, HEIGHT, Luma([10]));
  let (cx, cy) = spot_center(id);
  for y in cy - 2..=cy + 2 {
    for x in cx - 2..=cx + 2 {
      image.put_pixel(x, y, Luma([250]));
    }
  }
  image
}

/// 写出 `<root>/images/<scene>/<id>.png` 与 `<root>/labels/bounding_boxes/<id>.json`
///
/// 偶数帧的亮斑标为车灯，奇数帧的亮斑标为非车灯。
pub fn write_dataset(root: &Path, scenes: &[(&str, &[SampleId])]) {
  let labels = root.join("labels").join("bounding_boxes");
  std::fs::create_dir_all(&labels).unwrap();

  for (scene_id, ids) in scenes {
    let scene_dir = root.join("images").join(scene_id);
    std::fs::create_dir_all(&scene_dir).unwrap();
    for &id in *ids {
      frame(id)
        .save(scene_dir.join(format!("{:06}.png", id)))
        .unwrap();
      let label = if id % 2 == 0 { 1 } else { 0 };
      let annotation = json!({
        "bounding_boxes": [spot_box(id)],
        "labels": [label],
      });
      std::fs::write(
        labels.join(format!("{:06}.json", id)),
        serde_json::to_vec(&annotation).unwrap(),
      )
      .unwrap();
    }
  }
}

fn tensor(shape: &[usize], data: Vec<f32>) -> Value {
  json!({"shape": shape, "data": data})
}

/// 全零权重，只靠输出偏置决定置信度
pub fn constant_state_dict(fc2_bias: f32) -> Value {
  json!({
    "fc1.weight": tensor(&[HIDDEN, FEATURE_DIM], vec![0.0; HIDDEN * FEATURE_DIM]),
    "fc1.bias": tensor(&[HIDDEN], vec![0.0; HIDDEN]),
    "fc2.weight": tensor(&[1, HIDDEN], vec![0.0; HIDDEN]),
    "fc2.bias": tensor(&[1], vec![fc2_bias]),
  })
}

/// 非平凡权重，用来比较不同布局的检查点
pub fn patterned_state_dict() -> Value {
  let fc1: Vec<f32> = (0..HIDDEN * FEATURE_DIM)
    .map(|i| ((i % 7) as f32 - 3.0) * 0.25)
    .collect();
  let fc1_bias: Vec<f32> = (0..HIDDEN).map(|i| (i % 3) as f32 * 0.1).collect();
  let fc2: Vec<f32> = (0..HIDDEN).map(|i| ((i % 5) as f32 - 2.0) * 0.3).collect();
  json!({
    "fc1.weight": tensor(&[HIDDEN, FEATURE_DIM], fc1),
    "fc1.bias": tensor(&[HIDDEN], fc1_bias),
    "fc2.weight": tensor(&[1, HIDDEN], fc2),
    "fc2.bias": tensor(&[1], vec![0.2]),
  })
}

pub fn write_checkpoint(path: &Path, state_dict: Value, nested: bool) -> PathBuf {
  let value = if nested {
    json!({"model": state_dict, "epoch": 12})
  } else {
    state_dict
  };
  std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
  path.to_path_buf()
}

pub fn read_json(path: &Path) -> Value {
  serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}
