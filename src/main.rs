// 该文件是 Yexing （夜行） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use yexing::{device::SystemProbe, pipeline::run_evaluation};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("Yexing 车灯检测评估");
  info!("测试集路径: {}", args.test_data.display());
  info!("模型文件路径: {}", args.model_path.display());
  info!("输出目录: {}", args.output_dir.display());
  info!("置信度阈值: {}", args.conf_thresh);

  let summary = run_evaluation(&args.into_options(), &SystemProbe).inspect_err(|e| {
    error!("评估失败: {:#}", e);
  })?;

  for (name, value) in summary.metrics.iter() {
    info!("  {}: {:.4}", name, value);
  }
  Ok(())
}
