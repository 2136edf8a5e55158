// 该文件是 Yexing （夜行） 项目的一部分。
// src/model/complexity.rs - 模型计算量统计
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::{debug, info};

pub trait Profile {
  fn complexity(&self) -> ComplexityReport;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerStat {
  pub name: String,
  pub macs: u64,
  pub params: u64,
}

/// 单个输入上的乘加次数与参数量
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexityReport {
  pub input_shape: Vec<usize>,
  pub layers: Vec<LayerStat>,
}

impl ComplexityReport {
  pub fn macs(&self) -> u64 {
    self.layers.iter().map(|l| l.macs).sum()
  }

  pub fn params(&self) -> u64 {
    self.layers.iter().map(|l| l.params).sum()
  }

  /// 一次乘加按两次浮点运算计
  pub fn gflops(&self) -> f64 {
    self.macs() as f64 / 1e9 * 2.0
  }

  pub fn log(&self) {
    for layer in &self.layers {
      debug!(
        "  {}: MACs={}, 参数={}",
        layer.name, layer.macs, layer.params
      );
    }
    info!("-----------------------------");
    info!("模型复杂度 (输入 {:?}):", self.input_shape);
    info!("\tFLOPs:\t{:.2e} GFLOPs", self.gflops());
    info!("\t参数:\t{}", self.params());
    info!("-----------------------------");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gflops_doubles_macs() {
    let report = ComplexityReport {
      input_shape: vec![1, 4],
      layers: vec![
        LayerStat {
          name: "a".into(),
          macs: 250_000_000,
          params: 10,
        },
        LayerStat {
          name: "b".into(),
          macs: 250_000_000,
          params: 5,
        },
      ],
    };
    assert_eq!(report.macs(), 500_000_000);
    assert_eq!(report.params(), 15);
    assert!((report.gflops() - 1.0).abs() < 1e-12);
  }
}
