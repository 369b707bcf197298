// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/web/error.rs - 请求错误分类
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

use axum::{
  extract::multipart::MultipartError,
  http::StatusCode,
  response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  input::{CameraError, StorageError},
  pipeline::PipelineError,
};

pub const MSG_NO_FILE_PART: &str = "No file part";
pub const MSG_NO_SELECTED_FILE: &str = "No selected file";
pub const MSG_NOT_ALLOWED: &str = "Allowed file types are png, jpg, jpeg";
pub const MSG_INVALID_FILENAME: &str = "Invalid file name";
pub const MSG_LOAD_FAILED: &str = "Error: Failed to load the image";
pub const MSG_WEBCAM_UNAVAILABLE: &str = "Error: Could not open webcam";
pub const MSG_WEBCAM_FAILED: &str = "Error: Could not capture from webcam";

/// 请求处理错误
///
/// - 用户输入错误: 提示信息并重定向回表单
/// - 设备错误: 记录日志，提示信息并重定向回表单
/// - 其他错误: 记录日志并返回 500
#[derive(Error, Debug)]
pub enum AppError {
  #[error("{0}")]
  Rejected(&'static str),
  #[error("摄像头错误: {0}")]
  Camera(#[from] CameraError),
  #[error("处理失败: {0}")]
  Pipeline(#[from] PipelineError),
  #[error("存储错误: {0}")]
  Storage(std::io::Error),
  #[error("表单解析错误: {0}")]
  Multipart(#[from] MultipartError),
  #[error("后台任务失败: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl From<StorageError> for AppError {
  fn from(err: StorageError) -> Self {
    match err {
      StorageError::InvalidFilename(_) => AppError::Rejected(MSG_INVALID_FILENAME),
      StorageError::ImageLoadError(_) => AppError::Rejected(MSG_LOAD_FAILED),
      StorageError::IoError(e) => AppError::Storage(e),
    }
  }
}

/// 重定向回上传表单，并附带一次性提示信息
pub fn flash_redirect(message: &str) -> Response {
  Redirect::to(&format!("/?flash={}", urlencoding::encode(message))).into_response()
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::Rejected(message) => {
        info!("请求被拒绝: {}", message);
        flash_redirect(message)
      }
      AppError::Camera(e) => {
        warn!("摄像头采集失败: {}", e);
        match e {
          CameraError::Unavailable(_) => flash_redirect(MSG_WEBCAM_UNAVAILABLE),
          _ => flash_redirect(MSG_WEBCAM_FAILED),
        }
      }
      AppError::Multipart(e) => {
        warn!("表单解析失败: {}", e);
        e.into_response()
      }
      other => {
        error!("请求处理失败: {}", other);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
      }
    }
  }
}
