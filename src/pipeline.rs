// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/pipeline.rs - 推理、标注与编码流程
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

use std::{collections::BTreeMap, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use image::{RgbImage, codecs::jpeg::JpegEncoder};
use thiserror::Error;
use tracing::info;

use crate::{
  model::{ClassList, ModelError, SharedModel},
  output::{Annotator, ClassTally, ColorTable, build_colors},
};

const JPEG_QUALITY: u8 = 95;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("推理失败: {0}")]
  Model(#[from] ModelError),
  #[error("图像编码失败: {0}")]
  Encode(#[from] image::ImageError),
}

/// 一次检测的展示结果
#[derive(Debug, Clone)]
pub struct Outcome {
  /// 标注后图像的 base64 JPEG
  pub image_base64: String,
  pub tally: ClassTally,
  /// 类别名称到 `#rrggbb`
  pub colors: BTreeMap<String, String>,
  /// 跟踪类别在本次检测中的数量
  pub tracked_count: u64,
  pub elapsed: Duration,
}

pub struct Pipeline {
  model: SharedModel,
  classes: ClassList,
  annotator: Annotator,
  tracked_class: String,
}

impl Pipeline {
  pub fn new(model: SharedModel, classes: ClassList, tracked_class: impl Into<String>) -> Self {
    Self {
      model,
      classes,
      annotator: Annotator::default(),
      tracked_class: tracked_class.into(),
    }
  }

  pub fn tracked_class(&self) -> &str {
    &self.tracked_class
  }

  pub fn run(&self, image: &RgbImage) -> Result<Outcome, PipelineError> {
    let now = std::time::Instant::now();
    let result = self.model.infer(image)?;
    let elapsed = now.elapsed();
    info!("推理完成，检测到 {} 个对象，耗时: {:.2?}", result.len(), elapsed);

    let colors = ColorTable::build(&self.classes);
    let (annotated, tally) = self.annotator.annotate(image, &result, &colors);
    let image_base64 = encode_jpeg_base64(&annotated)?;
    let tracked_count = tally.get(&self.tracked_class).copied().unwrap_or(0);

    Ok(Outcome {
      image_base64,
      tally,
      colors: build_colors(&self.classes),
      tracked_count,
      elapsed,
    })
  }
}

pub fn encode_jpeg_base64(image: &RgbImage) -> Result<String, image::ImageError> {
  let mut buf = Vec::new();
  image.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))?;
  Ok(STANDARD.encode(&buf))
}
