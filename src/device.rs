// 该文件是 Yexing （夜行） 项目的一部分。
// src/device.rs - 计算设备选择
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

use std::{fmt, path::Path};

use clap::ValueEnum;
use tracing::{debug, info, warn};

const NVIDIA_DRIVER_NODES: [&str; 2] = ["/proc/driver/nvidia/version", "/dev/nvidia0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Device {
  Cuda,
  Cpu,
}

impl Device {
  /// 任何机器上都可用的设备
  pub const FALLBACK: Device = Device::Cpu;

  pub fn as_str(&self) -> &'static str {
    match self {
      Device::Cuda => "cuda",
      Device::Cpu => "cpu",
    }
  }
}

impl fmt::Display for Device {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

pub trait DeviceProbe {
  fn is_available(&self, device: Device) -> bool;
}

/// 通过环境变量与驱动节点探测本机设备
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl DeviceProbe for SystemProbe {
  fn is_available(&self, device: Device) -> bool {
    match device {
      Device::Cpu => true,
      Device::Cuda => {
        let visible = std::env::var("CUDA_VISIBLE_DEVICES").ok();
        if !cuda_devices_visible(visible.as_deref()) {
          debug!("CUDA_VISIBLE_DEVICES 屏蔽了全部 GPU");
          return false;
        }
        NVIDIA_DRIVER_NODES
          .iter()
          .any(|node| Path::new(node).exists())
      }
    }
  }
}

fn cuda_devices_visible(value: Option<&str>) -> bool {
  match value.map(str::trim) {
    None => true,
    Some(v) => !(v.is_empty() || v == "-1"),
  }
}

/// 返回可用的设备；请求的设备不可用时退回 [`Device::FALLBACK`] 并给出警告
pub fn resolve_device<P: DeviceProbe + ?Sized>(requested: Device, probe: &P) -> Device {
  let device = if probe.is_available(requested) {
    requested
  } else {
    warn!(
      "请求的设备 {} 不可用，退回到 {}",
      requested,
      Device::FALLBACK
    );
    Device::FALLBACK
  };
  info!("设备: {}", device);
  device
}
