// 该文件是 Yexing （夜行） 项目的一部分。
// src/output/draw.rs - 场景检测结果可视化
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::debug;

use crate::{
  BBox,
  dataset::Sample,
  model::DetectResult,
  output::{Render, ReportError},
};

const GROUND_TRUTH_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const PREDICTION_COLOR: [u8; 3] = [255, 0, 0]; // 红色
const BOX_THICKNESS: i32 = 2;

pub struct Draw {
  thickness: i32,
  ground_truth_color: [u8; 3],
  prediction_color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      ground_truth_color: GROUND_TRUTH_COLOR,
      prediction_color: PREDICTION_COLOR,
    }
  }
}

impl Draw {
  // bbox 为像素坐标 [x_min, y_min, x_max, y_max]，max 不含
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &BBox, color: [u8; 3]) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h);

    for t in 0..self.thickness {
      let width = x_max - x_min - 2 * t;
      let height = y_max - y_min - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x_min + t, y_min + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }

  /// 绿色为真值，红色为置信度不低于阈值的预测
  pub fn draw_sample(&self, sample: &Sample, result: &DetectResult, conf_thresh: f32) -> RgbImage {
    let mut image = sample.frame.to_rgb_image();
    for bbox in &sample.instances {
      self.draw_bbox(&mut image, bbox, self.ground_truth_color);
    }
    for item in result.positives(conf_thresh) {
      self.draw_bbox(&mut image, &item.bbox, self.prediction_color);
    }
    image
  }
}

/// 把一个场景的帧画到 `<scenes>/<scene_id>/<frame_id>.png`
pub struct SceneRenderer {
  directory: PathBuf,
  conf_thresh: f32,
  draw: Draw,
}

impl SceneRenderer {
  pub fn new(directory: impl AsRef<Path>, conf_thresh: f32) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      conf_thresh,
      draw: Draw::default(),
    }
  }

  pub fn frame_path(&self, sample: &Sample) -> PathBuf {
    self
      .directory
      .join(&sample.scene_id)
      .join(format!("{}.png", sample.frame_name))
  }
}

impl Render<Sample, DetectResult> for SceneRenderer {
  type Error = ReportError;

  fn render_result(&self, frame: &Sample, result: &DetectResult) -> Result<(), Self::Error> {
    let path = self.frame_path(frame);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let image = self.draw.draw_sample(frame, result, self.conf_thresh);
    image.save(&path)?;
    debug!("保存场景帧: {}", path.display());
    Ok(())
  }
}
