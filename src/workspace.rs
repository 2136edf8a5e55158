// 该文件是 Yexing （夜行） 项目的一部分。
// src/workspace.rs - 输出目录管理
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

use thiserror::Error;
use tracing::{debug, info};

pub const SCENES_DIR: &str = "scenes";
pub const METRICS_FILE: &str = "metrics.json";
pub const PREDICTIONS_FILE: &str = "predictions.json";
pub const COCO_PREDICTIONS_FILE: &str = "predictions_coco.json";

#[derive(Error, Debug)]
pub enum WorkspaceError {
  #[error("无法准备输出目录 {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> WorkspaceError + '_ {
  move |source| WorkspaceError::IoError {
    path: path.to_path_buf(),
    source,
  }
}

/// 一次评估运行的输出目录布局
#[derive(Debug, Clone)]
pub struct OutputLayout {
  root: PathBuf,
  scenes: Option<PathBuf>,
}

impl OutputLayout {
  /// 创建输出目录；需要绘制场景时删除并重建 `scenes` 子目录
  pub fn prepare(output_dir: impl AsRef<Path>, plot_scenes: bool) -> Result<Self, WorkspaceError> {
    let output_dir = output_dir.as_ref();
    let root = std::path::absolute(output_dir).map_err(io_error(output_dir))?;

    if !root.is_dir() {
      info!("创建输出目录: {}", root.display());
      std::fs::create_dir_all(&root).map_err(io_error(&root))?;
    }

    let scenes = if plot_scenes {
      let scene_dir = root.join(SCENES_DIR);
      if scene_dir.exists() {
        debug!("清除旧的场景目录: {}", scene_dir.display());
        std::fs::remove_dir_all(&scene_dir).map_err(io_error(&scene_dir))?;
      }
      std::fs::create_dir(&scene_dir).map_err(io_error(&scene_dir))?;
      Some(scene_dir)
    } else {
      None
    };

    Ok(Self { root, scenes })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn scenes(&self) -> Option<&Path> {
    self.scenes.as_deref()
  }

  pub fn metrics_path(&self) -> PathBuf {
    self.root.join(METRICS_FILE)
  }

  pub fn predictions_path(&self) -> PathBuf {
    self.root.join(PREDICTIONS_FILE)
  }

  pub fn coco_predictions_path(&self) -> PathBuf {
    self.root.join(COCO_PREDICTIONS_FILE)
  }
}
