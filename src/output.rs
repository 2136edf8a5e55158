// 该文件是 Yexing （夜行） 项目的一部分。
// src/output.rs - 评估结果输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
};

use serde::Serialize;
use thiserror::Error;
use tracing::info;
#[cfg(feature = "scene_plot")]
use tracing::warn;

use crate::{dataset::DatasetError, metrics::Metrics, model::Predictions, workspace::OutputLayout};
#[cfg(feature = "scene_plot")]
use crate::{dataset::BoundingBoxDataset, model::DetectResult};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

#[cfg(feature = "coco_export")]
pub mod coco;

#[cfg(feature = "scene_plot")]
pub mod draw;

#[derive(Error, Debug)]
pub enum ReportError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("数据集错误: {0}")]
  DatasetError(#[from] DatasetError),
  #[error("未启用场景绘制输出目录")]
  NoSceneDirectory,
}

/// 整文件覆盖写入 JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ReportError> {
  let mut writer = BufWriter::new(File::create(path)?);
  serde_json::to_writer(&mut writer, value)?;
  writer.flush()?;
  Ok(())
}

pub struct ReportWriter<'a> {
  layout: &'a OutputLayout,
}

impl<'a> ReportWriter<'a> {
  pub fn new(layout: &'a OutputLayout) -> Self {
    Self { layout }
  }

  pub fn write_metrics(&self, metrics: &Metrics) -> Result<(), ReportError> {
    let path = self.layout.metrics_path();
    write_json(&path, metrics)?;
    info!("指标已保存到 {}", path.display());
    Ok(())
  }

  pub fn write_predictions(&self, predictions: &Predictions) -> Result<(), ReportError> {
    let path = self.layout.predictions_path();
    write_json(&path, predictions)?;
    info!("预测结果已保存到 {}", path.display());
    Ok(())
  }

  #[cfg(feature = "coco_export")]
  pub fn write_coco(&self, predictions: &Predictions, conf_thresh: f32) -> Result<usize, ReportError> {
    let path = self.layout.coco_predictions_path();
    let detections = coco::to_coco(predictions, conf_thresh);
    write_json(&path, &detections)?;
    info!(
      "COCO 格式预测结果已保存到 {} ({} 个检测)",
      path.display(),
      detections.len()
    );
    Ok(detections.len())
  }

  /// 返回绘制的帧数；未知的场景编号跳过
  #[cfg(feature = "scene_plot")]
  pub fn plot_scenes(
    &self,
    dataset: &BoundingBoxDataset,
    scene_ids: &[String],
    predictions: &Predictions,
    conf_thresh: f32,
  ) -> Result<usize, ReportError> {
    let scene_dir = self.layout.scenes().ok_or(ReportError::NoSceneDirectory)?;
    info!("绘制场景 {} ...", scene_ids.join(", "));

    let renderer = draw::SceneRenderer::new(scene_dir, conf_thresh);
    let empty = DetectResult::default();
    let mut rendered = 0;
    for scene_id in scene_ids {
      let indices: Vec<usize> = dataset.scene_indices(scene_id).collect();
      if indices.is_empty() {
        warn!("测试集中没有场景 {}", scene_id);
        continue;
      }
      for index in indices {
        let sample = dataset.get(index)?;
        let result = predictions.get(sample.id).unwrap_or(&empty);
        renderer.render_result(&sample, result)?;
        rendered += 1;
      }
    }

    info!(
      "场景 {} 的结果已保存到 {}",
      scene_ids.join(", "),
      scene_dir.display()
    );
    Ok(rendered)
  }
}
