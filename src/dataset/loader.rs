// 该文件是 Yexing （夜行） 项目的一部分。
// src/dataset/loader.rs - 批次并行读取
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

use std::{
  sync::{
    Arc,
    mpsc::{Receiver, sync_channel},
  },
  thread::{self, JoinHandle},
};

use rayon::prelude::*;
use tracing::{debug, error};

use crate::dataset::{Batch, BoundingBoxDataset, DatasetError, Sample};

#[derive(Debug, Clone)]
pub struct LoaderConfig {
  pub batch_size: usize,
  /// 解码线程数
  pub workers: usize,
  /// 预取队列深度
  pub prefetch: usize,
}

impl Default for LoaderConfig {
  fn default() -> Self {
    Self {
      batch_size: 64,
      workers: 16,
      prefetch: 2,
    }
  }
}

impl LoaderConfig {
  fn validate(&self) -> Result<(), DatasetError> {
    if self.batch_size == 0 {
      return Err(DatasetError::InvalidConfig("batch_size 必须大于 0".into()));
    }
    if self.workers == 0 {
      return Err(DatasetError::InvalidConfig("workers 必须大于 0".into()));
    }
    Ok(())
  }
}

/// 按数据集顺序产出批次，不打乱
///
/// 后台线程在 rayon 线程池上并行解码一个批次内的样本，
/// 通过有界通道交给消费者。遇到第一个错误后停止。
pub struct BatchLoader {
  receiver: Receiver<Result<Batch, DatasetError>>,
  handle: Option<JoinHandle<()>>,
  num_batches: usize,
}

impl BatchLoader {
  pub fn new(dataset: Arc<BoundingBoxDataset>, config: &LoaderConfig) -> Result<Self, DatasetError> {
    config.validate()?;

    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(config.workers)
      .thread_name(|i| format!("yexing-fetch-{i}"))
      .build()?;

    let batch_size = config.batch_size;
    let num_batches = dataset.len().div_ceil(batch_size);
    let (sender, receiver) = sync_channel(config.prefetch);

    debug!(
      "创建批次加载器: batch_size={}, workers={}, 批次数={}",
      batch_size, config.workers, num_batches
    );

    let handle = thread::Builder::new()
      .name("yexing-prefetch".into())
      .spawn(move || {
        let indices: Vec<usize> = (0..dataset.len()).collect();
        for chunk in indices.chunks(batch_size) {
          let samples: Result<Vec<Sample>, DatasetError> =
            pool.install(|| chunk.par_iter().map(|&i| dataset.get(i)).collect());
          let failed = samples.is_err();
          if sender.send(samples.map(|samples| Batch { samples })).is_err() {
            debug!("消费端已关闭，停止预取");
            return;
          }
          if failed {
            return;
          }
        }
      })
      .map_err(DatasetError::SpawnError)?;

    Ok(Self {
      receiver,
      handle: Some(handle),
      num_batches,
    })
  }

  pub fn num_batches(&self) -> usize {
    self.num_batches
  }
}

impl Iterator for BatchLoader {
  type Item = Result<Batch, DatasetError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self.receiver.recv() {
      Ok(batch) => Some(batch),
      Err(_) => {
        // 发送端已结束；若是异常退出则报告一次
        let handle = self.handle.take()?;
        match handle.join() {
          Ok(()) => None,
          Err(_) => {
            error!("预取线程异常退出");
            Some(Err(DatasetError::PrefetchPanicked))
          }
        }
      }
    }
  }
}
