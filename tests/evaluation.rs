// 该文件是 Yexing （夜行） 项目的一部分。
// tests/evaluation.rs - 评估流程集成测试
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

mod common;

use std::path::Path;

use common::*;
use tempfile::TempDir;
use yexing::{
  dataset::LoaderConfig,
  device::Device,
  model::ClassifierConfig,
  pipeline::{EvaluationOptions, run_evaluation},
};

const SCENES: &[(&str, &[u64])] = &[("S00001", &[1, 2, 3, 4, 5]), ("S00002", &[6, 7, 8, 9, 10])];

fn options(root: &Path, plot_scenes: &[&str]) -> EvaluationOptions {
  EvaluationOptions {
    test_data: root.join("test"),
    output_dir: root.join("runs").join("test"),
    model_path: root.join("weights.json"),
    device: Device::Cuda,
    save_coco: true,
    plot_scenes: plot_scenes.iter().map(|s| s.to_string()).collect(),
    loader: LoaderConfig {
      batch_size: 4,
      workers: 2,
      ..LoaderConfig::default()
    },
    classifier: ClassifierConfig::default(),
    conf_thresh: 0.5,
    iou_thresh: 0.5,
  }
}

fn fixture() -> TempDir {
  let dir = tempfile::tempdir().unwrap();
  write_dataset(&dir.path().join("test"), SCENES);
  write_checkpoint(&dir.path().join("weights.json"), constant_state_dict(3.0), true);
  dir
}

#[test]
fn end_to_end_writes_every_report() {
  let dir = fixture();
  let summary = run_evaluation(&options(dir.path(), &["S00002"]), &CpuOnly).unwrap();
  assert_eq!(summary.device, Device::Cpu);

  let out = dir.path().join("runs").join("test");

  let predictions = read_json(&out.join("predictions.json"));
  let predictions = predictions.as_object().unwrap();
  assert_eq!(predictions.len(), 10);
  let keys: Vec<&str> = predictions.keys().map(|k| k.as_str()).collect();
  for id in 1..=10u64 {
    assert!(keys.contains(&id.to_string().as_str()));
  }
  let third = &predictions["3"];
  assert_eq!(third["boxes"][0], serde_json::json!(spot_box(3)));
  let score = third["scores"][0].as_f64().unwrap();
  assert!((score - 1.0 / (1.0 + (-3.0f64).exp())).abs() < 1e-5);

  // 偶数帧是车灯，奇数帧的框全部误检
  let metrics = read_json(&out.join("metrics.json"));
  for value in metrics.as_object().unwrap().values() {
    assert!(value.is_number());
  }
  assert_eq!(metrics["true_positives"].as_f64(), Some(5.0));
  assert_eq!(metrics["false_positives"].as_f64(), Some(5.0));
  assert_eq!(metrics["false_negatives"].as_f64(), Some(0.0));
  assert_eq!(metrics["ground_truth_instances"].as_f64(), Some(5.0));
  assert!((metrics["precision"].as_f64().unwrap() - 0.5).abs() < 1e-9);
  assert!((metrics["recall"].as_f64().unwrap() - 1.0).abs() < 1e-9);
  assert_eq!(summary.metrics.get("positive_detections"), Some(10.0));

  let coco = read_json(&out.join("predictions_coco.json"));
  let coco = coco.as_array().unwrap();
  assert_eq!(coco.len(), 10);
  for detection in coco {
    let id = detection["image_id"].as_u64().unwrap();
    let [x1, y1, x2, y2] = spot_box(id);
    assert_eq!(detection["category_id"], 1);
    assert_eq!(detection["bbox"], serde_json::json!([x1, y1, x2 - x1, y2 - y1]));
    assert!(detection["score"].as_f64().unwrap() >= 0.5);
  }

  let scene_dir = out.join("scenes").join("S00002");
  for id in 6..=10u64 {
    assert!(scene_dir.join(format!("{:06}.png", id)).is_file());
  }
  assert!(!out.join("scenes").join("S00001").exists());
}

#[test]
fn scores_below_threshold_stay_in_raw_predictions_only() {
  let dir = fixture();
  write_checkpoint(&dir.path().join("weights.json"), constant_state_dict(-3.0), false);
  let summary = run_evaluation(&options(dir.path(), &[]), &CpuOnly).unwrap();

  let out = dir.path().join("runs").join("test");
  assert_eq!(read_json(&out.join("predictions.json")).as_object().unwrap().len(), 10);
  assert!(read_json(&out.join("predictions_coco.json")).as_array().unwrap().is_empty());
  assert_eq!(summary.metrics.get("positive_detections"), Some(0.0));
  assert_eq!(summary.metrics.get("false_negatives"), Some(5.0));
  assert!(!out.join("scenes").exists());
}

#[test]
fn rerun_replaces_scene_plots() {
  let dir = fixture();
  run_evaluation(&options(dir.path(), &["S00001"]), &CpuOnly).unwrap();
  let scenes = dir.path().join("runs").join("test").join("scenes");
  assert!(scenes.join("S00001").is_dir());

  run_evaluation(&options(dir.path(), &["S00002", "S09999"]), &CpuOnly).unwrap();
  let remaining: Vec<String> = std::fs::read_dir(&scenes)
    .unwrap()
    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
    .collect();
  assert_eq!(remaining, vec!["S00002".to_string()]);
}

#[test]
fn missing_checkpoint_fails_before_inference() {
  let dir = fixture();
  let mut options = options(dir.path(), &[]);
  options.model_path = dir.path().join("absent.json");
  assert!(run_evaluation(&options, &CpuOnly).is_err());
  assert!(!dir.path().join("runs/test/predictions.json").exists());
}

#[test]
fn missing_annotation_is_an_error() {
  let dir = fixture();
  std::fs::remove_file(dir.path().join("test/labels/bounding_boxes/000004.json")).unwrap();
  let err = run_evaluation(&options(dir.path(), &[]), &CpuOnly).unwrap_err();
  assert!(format!("{:#}", err).contains("000004.json"));
}
