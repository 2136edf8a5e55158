// 该文件是 Yexing （夜行） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Parser;

use yexing::{
  dataset::LoaderConfig, device::Device, model::ClassifierConfig, pipeline::EvaluationOptions,
};

/// 夜间车灯检测模型评估
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 测试集路径
  #[arg(long = "test_data", value_name = "DIR")]
  pub test_data: PathBuf,

  /// 结果输出目录
  #[arg(long = "output_dir", default_value = "runs/test", value_name = "DIR")]
  pub output_dir: PathBuf,

  /// 模型检查点路径
  #[arg(long = "model_path", default_value = "weights_pretrained.json", value_name = "FILE")]
  pub model_path: PathBuf,

  /// 计算设备，不可用时退回 cpu
  #[arg(long, value_enum, default_value_t = Device::Cuda)]
  pub device: Device,

  /// 同时保存 COCO 结果格式的预测
  #[arg(long = "save_coco")]
  pub save_coco: bool,

  /// 需要绘制并保存的场景编号
  #[arg(long = "plot_scenes", num_args = 1.., value_name = "SCENE")]
  pub plot_scenes: Vec<String>,

  /// 批大小
  #[arg(long = "batch_size", default_value_t = 64, value_name = "SIZE")]
  pub batch_size: usize,

  /// 数据读取线程数
  #[arg(long, default_value_t = 16, value_name = "COUNT")]
  pub workers: usize,

  /// 判为正例的置信度阈值 (0.0 - 1.0)
  #[arg(long = "conf_thresh", default_value_t = 0.5, value_name = "THRESHOLD")]
  pub conf_thresh: f32,

  /// 预测框与真值框匹配的 IoU 阈值 (0.0 - 1.0)
  #[arg(long = "iou_thresh", default_value_t = 0.5, value_name = "THRESHOLD")]
  pub iou_thresh: f32,
}

impl Args {
  pub fn into_options(self) -> EvaluationOptions {
    EvaluationOptions {
      test_data: self.test_data,
      output_dir: self.output_dir,
      model_path: self.model_path,
      device: self.device,
      save_coco: self.save_coco,
      plot_scenes: self.plot_scenes,
      loader: LoaderConfig {
        batch_size: self.batch_size,
        workers: self.workers,
        ..LoaderConfig::default()
      },
      classifier: ClassifierConfig::default(),
      conf_thresh: self.conf_thresh,
      iou_thresh: self.iou_thresh,
    }
  }
}
