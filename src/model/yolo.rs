// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/model/yolo.rs - YOLO ONNX 模型
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

use std::sync::Mutex;

use image::{Rgb, RgbImage, imageops};
use ort::{session::Session, value::Tensor};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectItem, DetectResult, Model, ModelError},
};

const YOLO_DEFAULT_INPUT_SIZE: u32 = 1280;
const YOLO_DEFAULT_CONFIDENCE: f32 = 0.25;
const YOLO_DEFAULT_NMS_THRESHOLD: f32 = 0.7;
const YOLO_LETTERBOX_FILL: u8 = 114;
// 端到端导出模型每行: x1, y1, x2, y2, score, class
const YOLO_END2END_ROW: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloConfig {
  /// 模型输入边长（正方形）
  pub input_size: u32,
  /// 置信度阈值
  pub confidence: f32,
  /// NMS IOU 阈值
  pub nms_threshold: f32,
  /// 类别数量
  pub num_classes: usize,
}

impl Default for YoloConfig {
  fn default() -> Self {
    Self {
      input_size: YOLO_DEFAULT_INPUT_SIZE,
      confidence: YOLO_DEFAULT_CONFIDENCE,
      nms_threshold: YOLO_DEFAULT_NMS_THRESHOLD,
      num_classes: 1,
    }
  }
}

/// 原图到模型输入的 letterbox 变换参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub pad_x: f32,
  pub pad_y: f32,
  pub width: u32,
  pub height: u32,
}

impl Letterbox {
  /// 将模型输入空间中的坐标映射回原图像素坐标
  fn restore(&self, bbox: [f32; 4]) -> [i32; 4] {
    let (w, h) = (self.width as f32, self.height as f32);
    let x_min = ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_min = ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, h);
    let x_max = ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, w);
    let y_max = ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, h);
    [x_min as i32, y_min as i32, x_max as i32, y_max as i32]
  }
}

/// 等比缩放图像并居中填充到 size x size 的画布
pub fn letterbox(image: &RgbImage, size: u32) -> (RgbImage, Letterbox) {
  let (width, height) = image.dimensions();
  let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
  let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
  let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
  let pad_x = (size - new_w) / 2;
  let pad_y = (size - new_h) / 2;

  let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
  let mut canvas = RgbImage::from_pixel(size, size, Rgb([YOLO_LETTERBOX_FILL; 3]));
  imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

  (
    canvas,
    Letterbox {
      scale,
      pad_x: pad_x as f32,
      pad_y: pad_y as f32,
      width,
      height,
    },
  )
}

pub struct Yolo {
  session: Mutex<Session>,
  input_name: String,
  config: YoloConfig,
}

pub struct YoloBuilder {
  model_path: String,
  config: YoloConfig,
}

impl FromUrlWithScheme for YoloBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for YoloBuilder {
  type Error = ModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(YoloBuilder {
      model_path: url.path().to_string(),
      config: YoloConfig::default(),
    })
  }
}

impl YoloBuilder {
  pub fn input_size(mut self, input_size: u32) -> Self {
    self.config.input_size = input_size;
    self
  }

  pub fn confidence(mut self, confidence: f32) -> Self {
    self.config.confidence = confidence;
    self
  }

  pub fn nms_threshold(mut self, nms_threshold: f32) -> Self {
    self.config.nms_threshold = nms_threshold;
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.config.num_classes = num_classes;
    self
  }

  pub fn build(self) -> Result<Yolo, ModelError> {
    if self.config.input_size == 0 {
      return Err(ModelError::InvalidConfig("输入尺寸必须大于 0".to_string()));
    }
    if self.config.num_classes == 0 {
      return Err(ModelError::InvalidConfig("类别数量必须大于 0".to_string()));
    }
    info!("加载模型文件: {}", self.model_path);
    let model_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 ONNX Runtime 推理会话");
    let session = Session::builder()?.commit_from_memory(&model_data)?;

    let input_name = session
      .inputs
      .first()
      .map(|i| i.name.clone())
      .unwrap_or_else(|| "images".to_string());
    debug!("模型输入名称: {}", input_name);
    debug!("模型输出数量: {}", session.outputs.len());
    info!(
      "模型加载完成，输入尺寸 {}x{}",
      self.config.input_size, self.config.input_size
    );

    Ok(Yolo {
      session: Mutex::new(session),
      input_name,
      config: self.config,
    })
  }
}

/// NCHW 格式、归一化到 [0, 1] 的输入张量
fn to_nchw_tensor(canvas: &RgbImage) -> Result<ort::value::DynValue, ModelError> {
  let (width, height) = canvas.dimensions();
  let plane = (width * height) as usize;
  let mut data = vec![0f32; 3 * plane];
  for (idx, pixel) in canvas.pixels().enumerate() {
    data[idx] = pixel[0] as f32 / 255.0;
    data[plane + idx] = pixel[1] as f32 / 255.0;
    data[2 * plane + idx] = pixel[2] as f32 / 255.0;
  }

  let shape = [1usize, 3, height as usize, width as usize];
  Ok(Tensor::from_array((shape, data.into_boxed_slice()))?.into_dyn())
}

impl Model for Yolo {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("预处理输入图像 {}x{}", input.width(), input.height());
    let (canvas, transform) = letterbox(input, self.config.input_size);
    let tensor = to_nchw_tensor(&canvas)?;

    debug!("执行模型推理");
    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::SessionPoisoned)?;
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;
    let shape: Vec<i64> = shape.iter().copied().collect();
    debug!("模型输出形状: {:?}", shape);

    decode_output(&shape, data, &transform, &self.config)
  }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
  bbox: [f32; 4],
  score: f32,
  class_id: u32,
}

/// 解析模型输出，返回原图坐标下的检测结果
///
/// 支持两种输出布局:
/// - `[1, 4 + nc, N]`: 中心点、宽高与各类别分数，需要 NMS
/// - `[1, N, 6]`: 端到端导出，已包含角点、分数与类别
pub fn decode_output(
  shape: &[i64],
  data: &[f32],
  transform: &Letterbox,
  config: &YoloConfig,
) -> Result<DetectResult, ModelError> {
  let expected: i64 = shape.iter().product();
  if shape.len() != 3 || expected < 0 || data.len() < expected as usize {
    return Err(ModelError::UnsupportedOutput(shape.to_vec()));
  }

  let rows = shape[1];
  let cols = shape[2];
  let candidates = if rows as usize == 4 + config.num_classes {
    decode_raw(data, (rows - 4) as usize, cols as usize, config)
  } else if cols == YOLO_END2END_ROW {
    decode_end2end(data, rows as usize, config)
  } else if rows > 4 {
    warn!(
      "模型输出类别数 {} 与类别表长度 {} 不一致",
      rows - 4,
      config.num_classes
    );
    decode_raw(data, (rows - 4) as usize, cols as usize, config)
  } else {
    return Err(ModelError::UnsupportedOutput(shape.to_vec()));
  };

  let items: Vec<DetectItem> = candidates
    .into_iter()
    .map(|c| DetectItem {
      class_id: c.class_id,
      score: c.score,
      bbox: transform.restore(c.bbox),
    })
    .collect();

  debug!("检测到 {} 个物体", items.len());
  Ok(DetectResult::from(items))
}

fn decode_raw(data: &[f32], num_classes: usize, num_anchors: usize, config: &YoloConfig) -> Vec<Candidate> {
  let mut candidates = Vec::new();

  for i in 0..num_anchors {
    let (score, class_id) = {
      let mut max_score = f32::MIN;
      let mut cls_idx = 0usize;
      for c in 0..num_classes {
        let s = data[(4 + c) * num_anchors + i];
        if s > max_score {
          max_score = s;
          cls_idx = c;
        }
      }
      (max_score, cls_idx as u32)
    };

    if score < config.confidence {
      continue;
    }

    let cx = data[i];
    let cy = data[num_anchors + i];
    let w = data[2 * num_anchors + i];
    let h = data[3 * num_anchors + i];

    candidates.push(Candidate {
      bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
      score,
      class_id,
    });
  }

  nms(candidates, config.nms_threshold)
}

fn decode_end2end(data: &[f32], num_rows: usize, config: &YoloConfig) -> Vec<Candidate> {
  data
    .chunks_exact(YOLO_END2END_ROW as usize)
    .take(num_rows)
    .filter(|row| row[4] >= config.confidence)
    .map(|row| Candidate {
      bbox: [row[0], row[1], row[2], row[3]],
      score: row[4],
      class_id: row[5].max(0.0) as u32,
    })
    .collect()
}

/// 按类别的贪心非极大值抑制
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| {
    b.score
      .partial_cmp(&a.score)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept = Vec::new();
  let mut suppressed = vec![false; candidates.len()];

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    kept.push(candidates[i]);
    for j in (i + 1)..candidates.len() {
      if candidates[j].class_id == candidates[i].class_id
        && iou(&candidates[i].bbox, &candidates[j].bbox) > iou_threshold
      {
        suppressed[j] = true;
      }
    }
  }

  kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]) * (a[3] - a[1]);
  let area_b = (b[2] - b[0]) * (b[3] - b[1]);
  let union = area_a + area_b - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity(width: u32, height: u32) -> Letterbox {
    Letterbox {
      scale: 1.0,
      pad_x: 0.0,
      pad_y: 0.0,
      width,
      height,
    }
  }

  // 单类别原始输出，按 [cx, cy, w, h, score] 逐行排布
  fn raw_output(anchors: &[[f32; 5]]) -> (Vec<i64>, Vec<f32>) {
    let n = anchors.len();
    let mut data = vec![0f32; 5 * n];
    for (i, anchor) in anchors.iter().enumerate() {
      for (row, value) in anchor.iter().enumerate() {
        data[row * n + i] = *value;
      }
    }
    (vec![1, 5, n as i64], data)
  }

  #[test]
  fn letterbox_pads_the_short_side() {
    let image = RgbImage::from_pixel(200, 100, Rgb([10, 20, 30]));
    let (canvas, transform) = letterbox(&image, 100);

    assert_eq!(canvas.dimensions(), (100, 100));
    assert_eq!(transform.scale, 0.5);
    assert_eq!(transform.pad_x, 0.0);
    assert_eq!(transform.pad_y, 25.0);
    assert_eq!(canvas.get_pixel(50, 0), &Rgb([YOLO_LETTERBOX_FILL; 3]));
    assert_eq!(canvas.get_pixel(50, 50), &Rgb([10, 20, 30]));
  }

  #[test]
  fn raw_output_is_thresholded_and_suppressed() {
    let (shape, data) = raw_output(&[
      [50.0, 50.0, 20.0, 20.0, 0.9],
      [51.0, 50.0, 20.0, 20.0, 0.8],
      [150.0, 150.0, 10.0, 10.0, 0.6],
      [300.0, 300.0, 10.0, 10.0, 0.1],
    ]);
    let result = decode_output(&shape, &data, &identity(400, 400), &YoloConfig::default()).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.items[0].bbox, [40, 40, 60, 60]);
    assert_eq!(result.items[0].class_id, 0);
    assert_eq!(result.items[1].bbox, [145, 145, 155, 155]);
  }

  #[test]
  fn boxes_are_mapped_back_through_the_letterbox() {
    let transform = Letterbox {
      scale: 0.5,
      pad_x: 0.0,
      pad_y: 25.0,
      width: 200,
      height: 100,
    };
    let (shape, data) = raw_output(&[[50.0, 50.0, 20.0, 20.0, 0.9]]);
    let result = decode_output(&shape, &data, &transform, &YoloConfig::default()).unwrap();

    assert_eq!(result.items[0].bbox, [80, 30, 120, 70]);
  }

  #[test]
  fn boxes_are_clamped_to_the_image() {
    let (shape, data) = raw_output(&[[5.0, 5.0, 30.0, 30.0, 0.9]]);
    let result = decode_output(&shape, &data, &identity(16, 16), &YoloConfig::default()).unwrap();

    assert_eq!(result.items[0].bbox, [0, 0, 16, 16]);
  }

  #[test]
  fn end2end_output_skips_nms() {
    let config = YoloConfig {
      num_classes: 3,
      ..YoloConfig::default()
    };
    let data = vec![
      10.0, 10.0, 30.0, 30.0, 0.9, 2.0, //
      11.0, 10.0, 31.0, 30.0, 0.8, 2.0, //
      0.0, 0.0, 5.0, 5.0, 0.05, 1.0,
    ];
    let result = decode_output(&[1, 3, 6], &data, &identity(100, 100), &config).unwrap();

    assert_eq!(result.len(), 2);
    assert!(result.items.iter().all(|item| item.class_id == 2));
  }

  #[test]
  fn unknown_layout_is_rejected() {
    let err = decode_output(&[1, 4], &[0.0; 4], &identity(1, 1), &YoloConfig::default());
    assert!(matches!(err, Err(ModelError::UnsupportedOutput(_))));
  }

  #[test]
  fn builder_requires_onnx_scheme() {
    let url = Url::parse("yolo26:///models/best.onnx").unwrap();
    assert!(matches!(
      YoloBuilder::from_url(&url),
      Err(ModelError::ModelPathError(_))
    ));

    let url = Url::parse("onnx:///models/best.onnx").unwrap();
    let builder = YoloBuilder::from_url(&url).unwrap().input_size(640);
    assert_eq!(builder.model_path, "/models/best.onnx");
    assert_eq!(builder.config.input_size, 640);
  }

  #[test]
  fn builder_rejects_zero_input_size() {
    let url = Url::parse("onnx:///models/missing.onnx").unwrap();
    let result = YoloBuilder::from_url(&url).unwrap().input_size(0).build();
    assert!(matches!(result, Err(ModelError::InvalidConfig(_))));
  }
}
