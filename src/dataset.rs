// 该文件是 Yexing （夜行） 项目的一部分。
// src/dataset.rs - 边界框测试集
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

//! 数据集目录结构：
//!
//! ```text
//! <root>/images/<scene_id>/<frame_id>.png
//! <root>/labels/bounding_boxes/<frame_id>.json
//! ```

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};

use crate::{BBox, SampleId, frame::LumaFrame};

mod annotation;
mod loader;

pub use self::annotation::{Annotation, AnnotationError};
pub use self::loader::{BatchLoader, LoaderConfig};

const IMAGES_DIR: &str = "images";
const LABELS_DIR: &str = "labels";
const BOUNDING_BOXES_DIR: &str = "bounding_boxes";

#[derive(Error, Debug)]
pub enum DatasetError {
  #[error("I/O 错误 {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("图像解码错误 {path}: {source}")]
  ImageError {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("标注文件格式错误 {path}: {source}")]
  MalformedAnnotation {
    path: PathBuf,
    #[source]
    source: AnnotationError,
  },
  #[error("缺少标注文件: {0}")]
  MissingAnnotation(PathBuf),
  #[error("帧文件名不是数字编号: {0}")]
  InvalidFrameId(PathBuf),
  #[error("帧编号重复: {0}")]
  DuplicateFrameId(SampleId),
  #[error("样本下标 {index} 越界 (共 {len} 帧)")]
  IndexOutOfRange { index: usize, len: usize },
  #[error("加载器配置错误: {0}")]
  InvalidConfig(String),
  #[error("无法创建读取线程池: {0}")]
  WorkerPool(#[from] rayon::ThreadPoolBuildError),
  #[error("无法创建预取线程: {0}")]
  SpawnError(std::io::Error),
  #[error("预取线程异常退出")]
  PrefetchPanicked,
}

/// 数据集索引中的一项，图像尚未解码
#[derive(Debug, Clone)]
pub struct SampleEntry {
  pub id: SampleId,
  /// 图像文件名（不含扩展名），与标注文件名一致
  pub frame_name: String,
  pub scene_id: String,
  pub image_path: PathBuf,
  pub annotation: Annotation,
}

/// 解码后的样本
#[derive(Debug, Clone)]
pub struct Sample {
  pub id: SampleId,
  pub frame_name: String,
  pub scene_id: String,
  pub frame: LumaFrame,
  pub instances: Vec<BBox>,
}

/// 按顺序组成的一批样本
#[derive(Debug, Clone, Default)]
pub struct Batch {
  pub samples: Vec<Sample>,
}

impl Batch {
  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }
}

#[derive(Debug)]
pub struct BoundingBoxDataset {
  root: PathBuf,
  entries: Vec<SampleEntry>,
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
  let io_error = |source| DatasetError::IoError {
    path: dir.to_path_buf(),
    source,
  };
  let mut paths = std::fs::read_dir(dir)
    .map_err(io_error)?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<Result<Vec<_>, _>>()
    .map_err(io_error)?;
  paths.sort();
  Ok(paths)
}

impl BoundingBoxDataset {
  /// 建立索引并解析全部标注；图像在 [`BoundingBoxDataset::get`] 时才解码
  pub fn open(root: impl AsRef<Path>) -> Result<Self, DatasetError> {
    let root = root.as_ref().to_path_buf();
    let image_root = root.join(IMAGES_DIR);
    let label_root = root.join(LABELS_DIR).join(BOUNDING_BOXES_DIR);
    info!("加载测试集: {}", root.display());

    let mut entries = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for scene_dir in read_dir_sorted(&image_root)? {
      if !scene_dir.is_dir() {
        continue;
      }
      let Some(scene_id) = scene_dir.file_name().and_then(|n| n.to_str()) else {
        continue;
      };
      let scene_id = scene_id.to_string();

      let mut scene_entries = Vec::new();
      for image_path in read_dir_sorted(&scene_dir)? {
        if !image_path.is_file() {
          continue;
        }
        let Some(frame_name) = image_path.file_stem().and_then(|s| s.to_str()) else {
          return Err(DatasetError::InvalidFrameId(image_path.clone()));
        };
        let frame_name = frame_name.to_string();
        let id: SampleId = frame_name
          .parse()
          .map_err(|_| DatasetError::InvalidFrameId(image_path.clone()))?;
        if !seen.insert(id) {
          return Err(DatasetError::DuplicateFrameId(id));
        }

        let label_path = label_root.join(format!("{frame_name}.json"));
        if !label_path.is_file() {
          return Err(DatasetError::MissingAnnotation(label_path));
        }
        let annotation = Annotation::from_path(&label_path)?;

        scene_entries.push(SampleEntry {
          id,
          frame_name,
          scene_id: scene_id.clone(),
          image_path,
          annotation,
        });
      }
      scene_entries.sort_by_key(|e| e.id);
      debug!("场景 {}: {} 帧", scene_id, scene_entries.len());
      entries.extend(scene_entries);
    }

    info!("测试集共 {} 帧", entries.len());
    Ok(Self { root, entries })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn entries(&self) -> &[SampleEntry] {
    &self.entries
  }

  pub fn sample_ids(&self) -> impl Iterator<Item = SampleId> + '_ {
    self.entries.iter().map(|e| e.id)
  }

  /// 按场景首次出现的顺序返回场景编号
  pub fn scene_ids(&self) -> Vec<&str> {
    let mut scenes: Vec<&str> = Vec::new();
    for entry in &self.entries {
      if scenes.last() != Some(&entry.scene_id.as_str()) {
        scenes.push(&entry.scene_id);
      }
    }
    scenes
  }

  pub fn scene_indices<'a>(&'a self, scene_id: &'a str) -> impl Iterator<Item = usize> + 'a {
    self
      .entries
      .iter()
      .enumerate()
      .filter(move |(_, e)| e.scene_id == scene_id)
      .map(|(i, _)| i)
  }

  /// 真值实例，顺序与数据集一致
  pub fn ground_truth(&self) -> Vec<(SampleId, Vec<BBox>)> {
    self
      .entries
      .iter()
      .map(|e| (e.id, e.annotation.instances.clone()))
      .collect()
  }

  pub fn get(&self, index: usize) -> Result<Sample, DatasetError> {
    let entry = self
      .entries
      .get(index)
      .ok_or(DatasetError::IndexOutOfRange {
        index,
        len: self.entries.len(),
      })?;
    let path = &entry.image_path;
    let image = ImageReader::open(path)
      .map_err(|source| DatasetError::IoError {
        path: path.clone(),
        source,
      })?
      .with_guessed_format()
      .map_err(|source| DatasetError::IoError {
        path: path.clone(),
        source,
      })?
      .decode()
      .map_err(|source| DatasetError::ImageError {
        path: path.clone(),
        source,
      })?;

    Ok(Sample {
      id: entry.id,
      frame_name: entry.frame_name.clone(),
      scene_id: entry.scene_id.clone(),
      frame: LumaFrame::from(image),
      instances: entry.annotation.instances.clone(),
    })
  }
}
