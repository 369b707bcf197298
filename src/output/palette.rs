// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/output/palette.rs - 类别配色表
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

use crate::model::ClassList;

/// matplotlib 的 tab20 分类调色板
pub const TAB20: [[u8; 3]; 20] = [
  [31, 119, 180],
  [174, 199, 232],
  [255, 127, 14],
  [255, 187, 120],
  [44, 160, 44],
  [152, 223, 138],
  [214, 39, 40],
  [255, 152, 150],
  [148, 103, 189],
  [197, 176, 213],
  [140, 86, 75],
  [196, 156, 148],
  [227, 119, 194],
  [247, 182, 210],
  [127, 127, 127],
  [199, 199, 199],
  [188, 189, 34],
  [219, 219, 141],
  [23, 190, 207],
  [158, 218, 229],
];

pub fn rgb_to_hex(rgb: [u8; 3]) -> String {
  format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// 按类别索引排列的颜色表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
  entries: Vec<(String, [u8; 3])>,
}

impl ColorTable {
  /// 类别按位置取调色板颜色，超出调色板的类别沿用最后一种颜色
  pub fn build(classes: &ClassList) -> Self {
    let entries = classes
      .iter()
      .enumerate()
      .map(|(idx, name)| (name.to_string(), TAB20[idx.min(TAB20.len() - 1)]))
      .collect();
    Self { entries }
  }

  /// 类别索引对应的名称与颜色
  pub fn entry(&self, class_id: u32) -> Option<(&str, [u8; 3])> {
    self
      .entries
      .get(class_id as usize)
      .map(|(name, rgb)| (name.as_str(), *rgb))
  }

  fn to_hex_map(&self) -> BTreeMap<String, String> {
    self
      .entries
      .iter()
      .map(|(name, rgb)| (name.clone(), rgb_to_hex(*rgb)))
      .collect()
  }
}

/// 类别名称到 `#rrggbb` 的映射
pub fn build_colors(classes: &ClassList) -> BTreeMap<String, String> {
  ColorTable::build(classes).to_hex_map()
}
