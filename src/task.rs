// 该文件是 Yexing （夜行） 项目的一部分。
// src/task.rs - 推理任务
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

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  SampleId,
  dataset::{Batch, DatasetError},
  frame::LumaFrame,
  model::{DetectResult, Model, Predictions},
};

pub trait Task<I, M>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: &M) -> Result<Self::Output, Self::Error>;
}

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("数据集错误: {0}")]
  DatasetError(#[from] DatasetError),
  #[error("推理错误: {0}")]
  ModelError(Box<dyn std::error::Error + Send + Sync + 'static>),
  #[error("样本编号重复: {0}")]
  DuplicateSample(SampleId),
}

/// 逐批推理，只读模型，产出与输入顺序一致的预测
#[derive(Default, Debug)]
pub struct InferenceTask {
  num_batches: Option<usize>,
}

impl InferenceTask {
  pub fn with_num_batches(mut self, num_batches: Option<usize>) -> Self {
    self.num_batches = num_batches;
    self
  }
}

impl<I, M, ME> Task<I, M> for InferenceTask
where
  I: Iterator<Item = Result<Batch, DatasetError>>,
  M: Model<Input = LumaFrame, Output = DetectResult, Error = ME>,
  ME: std::error::Error + Send + Sync + 'static,
{
  type Output = Predictions;
  type Error = TaskError;

  fn run_task(self, input: I, model: &M) -> Result<Self::Output, Self::Error> {
    info!("开始推理...");
    let started = Instant::now();
    let mut predictions = Predictions::default();
    let mut inference_time = Duration::ZERO;

    for (batch_index, batch) in input.enumerate() {
      let batch = batch?;
      let now = Instant::now();
      for sample in &batch.samples {
        let result = model
          .infer(&sample.frame)
          .map_err(|e| TaskError::ModelError(Box::new(e)))?;
        if !predictions.insert(sample.id, result) {
          return Err(TaskError::DuplicateSample(sample.id));
        }
      }
      let elapsed = now.elapsed();
      inference_time += elapsed;

      match self.num_batches {
        Some(total) => debug!(
          "批次 {}/{} ({} 帧) 推理完成，耗时: {:.2?}",
          batch_index + 1,
          total,
          batch.len(),
          elapsed
        ),
        None => debug!(
          "批次 {} ({} 帧) 推理完成，耗时: {:.2?}",
          batch_index + 1,
          batch.len(),
          elapsed
        ),
      }
    }

    info!(
      "推理完成: {} 帧，推理耗时 {:.2?}，总耗时 {:.2?}",
      predictions.len(),
      inference_time,
      started.elapsed()
    );
    Ok(predictions)
  }
}
