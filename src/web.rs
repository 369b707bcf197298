// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/web.rs - HTTP 服务
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

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post},
};

use crate::{
  counter::SessionCounter,
  input::{Camera, UploadStore},
  pipeline::Pipeline,
};

pub mod error;
pub mod handlers;
pub mod pages;

pub use self::error::AppError;

/// 默认上传大小上限
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// 各请求共享的服务状态
#[derive(Clone)]
pub struct AppState {
  pub pipeline: Arc<Pipeline>,
  pub camera: Arc<dyn Camera>,
  pub counter: Arc<SessionCounter>,
  pub store: Arc<UploadStore>,
  pub capture_timeout: Duration,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
  Router::new()
    .route("/", get(handlers::index).post(handlers::upload))
    .route("/reset", post(handlers::reset))
    .route("/capture_webcam", post(handlers::capture_webcam))
    .route("/count", get(handlers::count))
    .layer(DefaultBodyLimit::max(max_upload_bytes))
    .with_state(state)
}
