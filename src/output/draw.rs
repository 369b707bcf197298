// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::collections::BTreeMap;

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::warn;

use crate::{
  model::{DetectItem, DetectResult},
  output::palette::ColorTable,
};

const BBOX_THICKNESS: i32 = 2;

/// 单次推理中各类别的数量，只包含出现过的类别
pub type ClassTally = BTreeMap<String, u64>;

pub struct Annotator {
  thickness: i32,
}

impl Default for Annotator {
  fn default() -> Self {
    Self {
      thickness: BBOX_THICKNESS,
    }
  }
}

impl Annotator {
  /// 在输入图像的副本上绘制检测框，并统计各类别数量
  pub fn annotate(
    &self,
    image: &RgbImage,
    result: &DetectResult,
    colors: &ColorTable,
  ) -> (RgbImage, ClassTally) {
    let mut output = image.clone();
    let mut tally = ClassTally::new();

    for DetectItem { class_id, bbox, .. } in result.items.iter() {
      let Some((name, color)) = colors.entry(*class_id) else {
        warn!("未知类别索引 {}，跳过该检测框", class_id);
        continue;
      };
      *tally.entry(name.to_string()).or_insert(0) += 1;
      self.draw_bbox(&mut output, bbox, color);
    }

    (output, tally)
  }

  // 边框向内加粗，bbox 为原图像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox(&self, image: &mut RgbImage, bbox: &[i32; 4], color: [u8; 3]) {
    let [x_min, y_min, x_max, y_max] = *bbox;

    for t in 0..self.thickness {
      let (x0, y0) = (x_min + t, y_min + t);
      let (x1, y1) = (x_max - t, y_max - t);
      if x0 > x1 || y0 > y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, Rgb(color));
    }
  }
}
