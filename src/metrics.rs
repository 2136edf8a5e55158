// 该文件是 Yexing （夜行） 项目的一部分。
// src/metrics.rs - 边界框评估
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

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::{
  BBox, SampleId,
  dataset::BoundingBoxDataset,
  model::{DetectItem, Predictions},
};

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
  pub iou_thresh: f32,
}

impl Default for EvaluatorConfig {
  fn default() -> Self {
    Self { iou_thresh: 0.5 }
  }
}

/// 指标名到数值
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, f64>);

impl Metrics {
  pub fn get(&self, name: &str) -> Option<f64> {
    self.0.get(name).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.0.iter().map(|(k, v)| (k.as_str(), *v))
  }

  fn set(&mut self, name: &str, value: f64) {
    self.0.insert(name.to_string(), value);
  }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
  true_positives: u64,
  false_positives: u64,
  false_negatives: u64,
  positives: u64,
  instances: u64,
  iou_sum: f64,
}

/// 交并比，退化框返回 0
pub fn iou(a: &BBox, b: &BBox) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按 f32 的最短十进制表示转为 f64，`0.3f32` 记为 `0.3`
fn threshold_value(value: f32) -> f64 {
  value.to_string().parse().unwrap_or(f64::from(value))
}

pub struct BoundingBoxEvaluator {
  ground_truth: Vec<(SampleId, Vec<BBox>)>,
  config: EvaluatorConfig,
}

impl BoundingBoxEvaluator {
  pub fn new(ground_truth: Vec<(SampleId, Vec<BBox>)>, config: EvaluatorConfig) -> Self {
    Self {
      ground_truth,
      config,
    }
  }

  pub fn from_dataset(dataset: &BoundingBoxDataset, config: EvaluatorConfig) -> Self {
    Self::new(dataset.ground_truth(), config)
  }

  /// 置信度不低于 `conf_thresh` 的预测按分数从高到低贪心匹配真值
  pub fn evaluate(&self, conf_thresh: f32, predictions: &Predictions) -> Metrics {
    let mut counts = Counts::default();
    let mut evaluated = HashSet::new();

    for (id, instances) in &self.ground_truth {
      evaluated.insert(*id);
      let items: &[DetectItem] = predictions.get(*id).map(|r| &r.items[..]).unwrap_or(&[]);
      self.match_sample(conf_thresh, items, instances, &mut counts);
    }

    // 真值中没有的样本，其正例全部记为误检
    for (id, result) in predictions.iter() {
      if !evaluated.contains(&id) {
        debug!("样本 {} 不在真值中", id);
        self.match_sample(conf_thresh, &result.items, &[], &mut counts);
      }
    }

    let metrics = self.summarize(conf_thresh, &counts);
    info!(
      "评估完成: precision={:.4}, recall={:.4}, f_score={:.4}",
      metrics.get("precision").unwrap_or_default(),
      metrics.get("recall").unwrap_or_default(),
      metrics.get("f_score").unwrap_or_default()
    );
    metrics
  }

  fn match_sample(
    &self,
    conf_thresh: f32,
    items: &[DetectItem],
    instances: &[BBox],
    counts: &mut Counts,
  ) {
    let mut positives: Vec<&DetectItem> = items.iter().filter(|i| i.score >= conf_thresh).collect();
    positives.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut matched = vec![false; instances.len()];
    for item in &positives {
      let best = instances
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched[*i])
        .map(|(i, gt)| (i, iou(&item.bbox, gt)))
        .max_by(|a, b| a.1.total_cmp(&b.1));

      match best {
        Some((i, overlap)) if overlap >= self.config.iou_thresh => {
          matched[i] = true;
          counts.true_positives += 1;
          counts.iou_sum += overlap as f64;
        }
        _ => counts.false_positives += 1,
      }
    }

    counts.positives += positives.len() as u64;
    counts.instances += instances.len() as u64;
    counts.false_negatives += matched.iter().filter(|m| !**m).count() as u64;
  }

  fn summarize(&self, conf_thresh: f32, counts: &Counts) -> Metrics {
    let tp = counts.true_positives as f64;
    let fp = counts.false_positives as f64;
    let fn_ = counts.false_negatives as f64;

    let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
    let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
    let f_score = if precision + recall > 0.0 {
      2.0 * precision * recall / (precision + recall)
    } else {
      0.0
    };
    let mean_iou = if counts.true_positives > 0 {
      counts.iou_sum / tp
    } else {
      0.0
    };

    let mut metrics = Metrics::default();
    metrics.set("precision", precision);
    metrics.set("recall", recall);
    metrics.set("f_score", f_score);
    metrics.set("true_positives", tp);
    metrics.set("false_positives", fp);
    metrics.set("false_negatives", fn_);
    metrics.set("positive_detections", counts.positives as f64);
    metrics.set("ground_truth_instances", counts.instances as f64);
    metrics.set("mean_iou", mean_iou);
    metrics.set("conf_thresh", threshold_value(conf_thresh));
    metrics.set("iou_thresh", threshold_value(self.config.iou_thresh));
    metrics
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::DetectResult;

  fn item(score: f32, bbox: BBox) -> DetectItem {
    DetectItem { score, bbox }
  }

  fn predictions() -> Predictions {
    let mut p = Predictions::default();
    p.insert(
      1,
      vec![
        item(0.9, [0.0, 0.0, 10.0, 10.0]),
        item(0.6, [50.0, 50.0, 60.0, 60.0]),
        item(0.3, [20.0, 20.0, 30.0, 30.0]),
      ]
      .into(),
    );
    p.insert(2, DetectResult::default());
    p
  }

  fn evaluator() -> BoundingBoxEvaluator {
    BoundingBoxEvaluator::new(
      vec![
        (1, vec![[0.0, 0.0, 10.0, 10.0], [20.0, 20.0, 30.0, 30.0]]),
        (2, vec![[5.0, 5.0, 8.0, 8.0]]),
      ],
      EvaluatorConfig::default(),
    )
  }

  #[test]
  fn iou_of_identical_and_disjoint_boxes() {
    let a = [0.0, 0.0, 2.0, 2.0];
    assert_eq!(iou(&a, &a), 1.0);
    assert_eq!(iou(&a, &[5.0, 5.0, 6.0, 6.0]), 0.0);
    assert!((iou(&a, &[1.0, 0.0, 3.0, 2.0]) - 1.0 / 3.0).abs() < 1e-6);
    assert_eq!(iou(&[1.0, 1.0, 1.0, 1.0], &[1.0, 1.0, 1.0, 1.0]), 0.0);
  }

  #[test]
  fn counts_at_default_threshold() {
    let metrics = evaluator().evaluate(0.5, &predictions());
    assert_eq!(metrics.get("true_positives"), Some(1.0));
    assert_eq!(metrics.get("false_positives"), Some(1.0));
    assert_eq!(metrics.get("false_negatives"), Some(2.0));
    assert_eq!(metrics.get("positive_detections"), Some(2.0));
    assert_eq!(metrics.get("ground_truth_instances"), Some(3.0));
    assert_eq!(metrics.get("precision"), Some(0.5));
    assert!((metrics.get("recall").unwrap() - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(metrics.get("mean_iou"), Some(1.0));
  }

  #[test]
  fn lower_threshold_admits_more_detections() {
    let metrics = evaluator().evaluate(0.2, &predictions());
    assert_eq!(metrics.get("true_positives"), Some(2.0));
    assert_eq!(metrics.get("positive_detections"), Some(3.0));
  }

  #[test]
  fn positives_are_monotone_in_threshold() {
    let evaluator = evaluator();
    let predictions = predictions();
    let thresholds = [0.0, 0.1, 0.3, 0.31, 0.5, 0.6, 0.7, 0.9, 0.95, 1.0];
    for pair in thresholds.windows(2) {
      let low = evaluator.evaluate(pair[0], &predictions);
      let high = evaluator.evaluate(pair[1], &predictions);
      assert!(high.get("positive_detections") <= low.get("positive_detections"));
      assert!(high.get("true_positives") <= low.get("true_positives"));
    }
  }

  fn single_box_evaluator(iou_thresh: f32) -> BoundingBoxEvaluator {
    BoundingBoxEvaluator::new(
      vec![(1, vec![[0.0, 0.0, 10.0, 10.0]])],
      EvaluatorConfig { iou_thresh },
    )
  }

  fn single(items: Vec<DetectItem>) -> Predictions {
    let mut p = Predictions::default();
    p.insert(1, items.into());
    p
  }

  #[test]
  fn higher_score_claims_the_box_first() {
    // 0.9 的框 IoU 只有 0.5，0.6 的框与真值重合，仍由 0.9 先匹配
    let p = single(vec![
      item(0.6, [0.0, 0.0, 10.0, 10.0]),
      item(0.9, [0.0, 0.0, 10.0, 5.0]),
    ]);
    let metrics = single_box_evaluator(0.5).evaluate(0.5, &p);
    assert_eq!(metrics.get("true_positives"), Some(1.0));
    assert_eq!(metrics.get("false_positives"), Some(1.0));
    assert_eq!(metrics.get("false_negatives"), Some(0.0));
    assert_eq!(metrics.get("mean_iou"), Some(0.5));
  }

  #[test]
  fn iou_equal_to_threshold_matches() {
    let half = single(vec![item(0.9, [0.0, 0.0, 10.0, 5.0])]);
    let metrics = single_box_evaluator(0.5).evaluate(0.5, &half);
    assert_eq!(metrics.get("true_positives"), Some(1.0));

    let below = single(vec![item(0.9, [0.0, 0.0, 10.0, 4.0])]);
    let metrics = single_box_evaluator(0.5).evaluate(0.5, &below);
    assert_eq!(metrics.get("true_positives"), Some(0.0));
    assert_eq!(metrics.get("false_positives"), Some(1.0));
  }

  #[test]
  fn stricter_iou_threshold_rejects_loose_boxes() {
    let p = single(vec![item(0.9, [0.0, 0.0, 10.0, 5.0])]);
    let metrics = single_box_evaluator(0.6).evaluate(0.5, &p);
    assert_eq!(metrics.get("true_positives"), Some(0.0));
    assert_eq!(metrics.get("false_positives"), Some(1.0));
    assert_eq!(metrics.get("false_negatives"), Some(1.0));
    assert_eq!(metrics.get("iou_thresh"), Some(0.6));

    let p = single(vec![item(0.9, [0.0, 0.0, 10.0, 3.0])]);
    let loose = single_box_evaluator(0.25).evaluate(0.5, &p);
    assert_eq!(loose.get("true_positives"), Some(1.0));
  }

  #[test]
  fn sample_without_predictions_only_adds_misses() {
    let evaluator = BoundingBoxEvaluator::new(
      vec![
        (1, vec![[0.0, 0.0, 10.0, 10.0]]),
        (2, vec![[20.0, 20.0, 30.0, 30.0]]),
      ],
      EvaluatorConfig::default(),
    );
    let metrics = evaluator.evaluate(0.5, &single(vec![item(0.9, [0.0, 0.0, 10.0, 10.0])]));
    assert_eq!(metrics.get("true_positives"), Some(1.0));
    assert_eq!(metrics.get("false_positives"), Some(0.0));
    assert_eq!(metrics.get("false_negatives"), Some(1.0));
    assert_eq!(metrics.get("ground_truth_instances"), Some(2.0));
    assert_eq!(metrics.get("precision"), Some(1.0));
    assert_eq!(metrics.get("recall"), Some(0.5));
  }

  #[test]
  fn thresholds_are_recorded_as_written() {
    let metrics = evaluator().evaluate(0.3, &predictions());
    assert_eq!(metrics.get("conf_thresh"), Some(0.3));
    assert_eq!(metrics.get("iou_thresh"), Some(0.5));
    let json = serde_json::to_string(&metrics).unwrap();
    assert!(json.contains(r#""conf_thresh":0.3,"#));
  }

  #[test]
  fn unknown_samples_count_as_false_positives() {
    let mut p = Predictions::default();
    p.insert(99, vec![item(0.8, [0.0, 0.0, 1.0, 1.0])].into());
    let metrics = BoundingBoxEvaluator::new(Vec::new(), EvaluatorConfig::default()).evaluate(0.5, &p);
    assert_eq!(metrics.get("false_positives"), Some(1.0));
    assert_eq!(metrics.get("precision"), Some(0.0));
    assert_eq!(metrics.get("recall"), Some(0.0));
  }
}
