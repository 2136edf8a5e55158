// 该文件是 Yexing （夜行） 项目的一部分。
// src/frame.rs - 灰度帧定义
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

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

/// 单通道 8 位帧，行优先存储
#[derive(Debug, Clone)]
pub struct LumaFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl LumaFrame {
  pub fn with_shape(height: u32, width: u32) -> Self {
    let data = vec![0u8; (width as usize) * (height as usize)].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  /// 数据长度与尺寸不符时返回 None
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
    if data.len() != (width as usize) * (height as usize) {
      return None;
    }
    Some(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn pixel(&self, x: u32, y: u32) -> u8 {
    self.data[(y as usize) * (self.width as usize) + (x as usize)]
  }

  /// 整帧亮度的均值与标准差
  pub fn mean_std(&self) -> (f32, f32) {
    if self.data.is_empty() {
      return (0.0, 0.0);
    }
    let n = self.data.len() as f64;
    let sum: f64 = self.data.iter().map(|&v| v as f64).sum();
    let mean = sum / n;
    let var = self
      .data
      .iter()
      .map(|&v| {
        let d = v as f64 - mean;
        d * d
      })
      .sum::<f64>()
      / n;
    (mean as f32, var.sqrt() as f32)
  }

  pub fn to_gray_image(&self) -> GrayImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| Luma([self.pixel(x, y)]))
  }

  pub fn to_rgb_image(&self) -> RgbImage {
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let v = self.pixel(x, y);
      Rgb([v, v, v])
    })
  }
}

impl AsRef<[u8]> for LumaFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for LumaFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl From<GrayImage> for LumaFrame {
  fn from(image: GrayImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

impl From<DynamicImage> for LumaFrame {
  fn from(image: DynamicImage) -> Self {
    match image {
      DynamicImage::ImageLuma8(gray) => gray.into(),
      other => other.to_luma8().into(),
    }
  }
}
