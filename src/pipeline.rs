// 该文件是 Yexing （夜行） 项目的一部分。
// src/pipeline.rs - 评估流程
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

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use tracing::info;
#[cfg(not(all(feature = "scene_plot", feature = "coco_export")))]
use tracing::warn;

use crate::{
  dataset::{BatchLoader, BoundingBoxDataset, LoaderConfig},
  device::{Device, DeviceProbe, resolve_device},
  metrics::{BoundingBoxEvaluator, EvaluatorConfig, Metrics},
  model::{ClassifierBuilder, ClassifierConfig, Predictions, Profile},
  output::ReportWriter,
  task::{InferenceTask, Task},
  workspace::OutputLayout,
};

/// 一次评估运行的全部配置
#[derive(Debug, Clone)]
pub struct EvaluationOptions {
  pub test_data: PathBuf,
  pub output_dir: PathBuf,
  pub model_path: PathBuf,
  pub device: Device,
  pub save_coco: bool,
  pub plot_scenes: Vec<String>,
  pub loader: LoaderConfig,
  pub classifier: ClassifierConfig,
  pub conf_thresh: f32,
  pub iou_thresh: f32,
}

#[derive(Debug)]
pub struct EvaluationSummary {
  pub layout: OutputLayout,
  pub device: Device,
  pub metrics: Metrics,
  pub predictions: Predictions,
}

pub fn run_evaluation<P: DeviceProbe + ?Sized>(
  options: &EvaluationOptions,
  probe: &P,
) -> Result<EvaluationSummary> {
  let layout = OutputLayout::prepare(&options.output_dir, !options.plot_scenes.is_empty())?;
  let device = resolve_device(options.device, probe);

  let dataset = Arc::new(
    BoundingBoxDataset::open(&options.test_data)
      .with_context(|| format!("无法加载测试集: {}", options.test_data.display()))?,
  );

  let model = ClassifierBuilder::new(&options.model_path)
    .config(options.classifier.clone())
    .device(device)
    .build()
    .with_context(|| format!("无法加载模型: {}", options.model_path.display()))?;
  model.complexity().log();

  let loader = BatchLoader::new(Arc::clone(&dataset), &options.loader)?;
  let predictions = InferenceTask::default()
    .with_num_batches(Some(loader.num_batches()))
    .run_task(loader, &model)?;

  let evaluator = BoundingBoxEvaluator::from_dataset(
    &dataset,
    EvaluatorConfig {
      iou_thresh: options.iou_thresh,
    },
  );
  let metrics = evaluator.evaluate(options.conf_thresh, &predictions);

  let writer = ReportWriter::new(&layout);
  writer.write_metrics(&metrics)?;

  if !options.plot_scenes.is_empty() {
    #[cfg(feature = "scene_plot")]
    writer.plot_scenes(
      &dataset,
      &options.plot_scenes,
      &predictions,
      options.conf_thresh,
    )?;
    #[cfg(not(feature = "scene_plot"))]
    warn!("未启用 scene_plot 特性，跳过场景绘制");
  }

  writer.write_predictions(&predictions)?;

  if options.save_coco {
    #[cfg(feature = "coco_export")]
    writer.write_coco(&predictions, options.conf_thresh)?;
    #[cfg(not(feature = "coco_export"))]
    warn!("未启用 coco_export 特性，跳过 COCO 格式输出");
  }

  info!("评估完成，结果位于 {}", layout.root().display());
  Ok(EvaluationSummary {
    layout,
    device,
    metrics,
    predictions,
  })
}
