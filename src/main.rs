// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use yumi::{
  FromUrl,
  counter::SessionCounter,
  input::{Camera, NoCamera, UploadStore},
  model::{ClassList, SharedModel, YoloBuilder},
  pipeline::Pipeline,
  web::{self, AppState},
};

fn create_camera(args: &args::Args) -> Arc<dyn Camera> {
  if args.no_camera {
    return Arc::new(NoCamera);
  }

  #[cfg(feature = "v4l_camera")]
  {
    match yumi::input::V4lCamera::from_url(&args.camera) {
      Ok(camera) => return Arc::new(camera.with_exposure(args.exposure)),
      Err(e) => warn!("摄像头地址 {} 无效: {}", args.camera, e),
    }
  }
  #[cfg(not(feature = "v4l_camera"))]
  warn!("未启用 v4l_camera 特性，忽略摄像头 {}", args.camera);

  Arc::new(NoCamera)
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!("无法监听中断信号: {}", e);
    std::future::pending::<()>().await;
  }
  info!("收到中断信号，准备退出...");
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("工作目录: {}", args.upload_dir.display());
  info!("监听地址: {}", args.bind);

  let classes = ClassList::new(args.classes.iter().cloned());
  if !classes.iter().any(|name| name == args.tracked_class) {
    warn!("跟踪类别 {} 不在类别列表中", args.tracked_class);
  }

  let model: SharedModel = Arc::new(
    YoloBuilder::from_url(&args.model)?
      .input_size(args.imgsz)
      .confidence(args.confidence)
      .nms_threshold(args.nms_threshold)
      .num_classes(classes.len())
      .build()
      .context("无法加载模型")?,
  );

  let camera = create_camera(&args);
  info!("摄像头: {}", camera.describe());

  let store = UploadStore::new(&args.upload_dir, args.keep_uploads)
    .with_context(|| format!("无法创建工作目录 {}", args.upload_dir.display()))?;

  let state = AppState {
    pipeline: Arc::new(Pipeline::new(model, classes, args.tracked_class.clone())),
    camera,
    counter: Arc::new(SessionCounter::new()),
    store: Arc::new(store),
    capture_timeout: Duration::from_millis(args.capture_timeout_ms),
  };

  let app = web::router(state, args.max_upload_bytes());
  let listener = tokio::net::TcpListener::bind(args.bind)
    .await
    .with_context(|| format!("无法监听 {}", args.bind))?;
  info!("服务已启动: http://{}", args.bind);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}
