// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/input/camera.rs - 摄像头单帧采集
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

use std::{sync::Arc, time::Duration};

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CameraError {
  #[error("摄像头不可用: {0}")]
  Unavailable(String),
  #[error("采集失败: {0}")]
  CaptureFailed(String),
  #[error("采集超时 ({0:?})")]
  Timeout(Duration),
  #[error("不支持的像素格式: {0}")]
  UnsupportedPixelFormat(String),
  #[error("帧解码错误: {0}")]
  DecodeError(#[from] image::ImageError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 单帧采集设备，每次调用独立打开并释放设备
pub trait Camera: Send + Sync {
  fn capture(&self) -> Result<RgbImage, CameraError>;

  fn describe(&self) -> String;
}

/// 未配置摄像头时的占位实现
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

impl Camera for NoCamera {
  fn capture(&self) -> Result<RgbImage, CameraError> {
    Err(CameraError::Unavailable("未配置摄像头".to_string()))
  }

  fn describe(&self) -> String {
    "none".to_string()
  }
}

/// 在阻塞线程池中采集一帧，超过 `timeout` 则放弃等待
pub async fn capture_with_timeout(
  camera: Arc<dyn Camera>,
  timeout: Duration,
) -> Result<RgbImage, CameraError> {
  debug!("从 {} 采集一帧，超时 {:?}", camera.describe(), timeout);
  let task = tokio::task::spawn_blocking(move || camera.capture());
  match tokio::time::timeout(timeout, task).await {
    Ok(Ok(frame)) => frame,
    Ok(Err(e)) => Err(CameraError::CaptureFailed(e.to_string())),
    Err(_) => Err(CameraError::Timeout(timeout)),
  }
}
