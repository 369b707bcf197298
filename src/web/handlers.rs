// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/web/handlers.rs - 请求处理
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
  Json,
  body::Bytes,
  extract::{Multipart, Query, State},
  response::{Html, IntoResponse, Redirect, Response},
};
use image::RgbImage;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::{
  input::{StorageError, StoredImage, allowed_file, capture_with_timeout, decode_image},
  web::{
    AppState,
    error::{AppError, MSG_NO_FILE_PART, MSG_NO_SELECTED_FILE, MSG_NOT_ALLOWED},
    pages,
  },
};

pub const FILE_FIELD: &str = "file";
pub const WEBCAM_FIELD: &str = "webcam_image_data";
pub const WEBCAM_FILENAME: &str = "webcam_capture.jpg";

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
  flash: Option<String>,
}

pub async fn index(Query(query): Query<IndexQuery>) -> Html<String> {
  Html(pages::upload_page(query.flash.as_deref()))
}

#[derive(Debug)]
struct UploadPart {
  filename: String,
  bytes: Bytes,
}

/// 选择参与检测的表单文件，非空的摄像头字段优先于普通文件字段
fn select_part(file: Option<UploadPart>, webcam: Option<UploadPart>) -> Result<UploadPart, AppError> {
  match (file, webcam) {
    (_, Some(webcam)) if !webcam.filename.is_empty() => Ok(webcam),
    (Some(file), _) => Ok(file),
    (None, Some(webcam)) => Ok(webcam),
    (None, None) => Err(AppError::Rejected(MSG_NO_FILE_PART)),
  }
}

pub async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, AppError> {
  let mut file = None;
  let mut webcam = None;

  while let Some(field) = multipart.next_field().await? {
    let name = field.name().unwrap_or_default().to_string();
    if name != FILE_FIELD && name != WEBCAM_FIELD {
      debug!("忽略表单字段: {}", name);
      continue;
    }
    let filename = field.file_name().unwrap_or_default().to_string();
    let bytes = field.bytes().await?;
    let part = UploadPart { filename, bytes };
    if name == FILE_FIELD {
      file = Some(part);
    } else {
      webcam = Some(part);
    }
  }

  let part = select_part(file, webcam)?;
  if part.filename.is_empty() {
    return Err(AppError::Rejected(MSG_NO_SELECTED_FILE));
  }
  if !allowed_file(&part.filename) {
    return Err(AppError::Rejected(MSG_NOT_ALLOWED));
  }
  info!("收到上传文件: {} ({} 字节)", part.filename, part.bytes.len());

  let store = state.store.clone();
  let (stored, image) = tokio::task::spawn_blocking(move || -> Result<_, StorageError> {
    let stored = store.save(&part.filename, &part.bytes)?;
    // 从内存解码，不依赖磁盘副本
    let image = decode_image(&part.bytes)?;
    Ok((stored, image))
  })
  .await??;

  detect_and_render(&state, stored, image).await
}

pub async fn capture_webcam(State(state): State<AppState>) -> Result<Response, AppError> {
  let frame = capture_with_timeout(state.camera.clone(), state.capture_timeout).await?;
  info!("摄像头采集成功: {}x{}", frame.width(), frame.height());

  let store = state.store.clone();
  let (stored, frame) = tokio::task::spawn_blocking(move || -> Result<_, StorageError> {
    let stored = store.save_image(WEBCAM_FILENAME, &frame)?;
    Ok((stored, frame))
  })
  .await??;

  detect_and_render(&state, stored, frame).await
}

async fn detect_and_render(
  state: &AppState,
  stored: StoredImage,
  image: RgbImage,
) -> Result<Response, AppError> {
  let pipeline = state.pipeline.clone();
  let outcome = tokio::task::spawn_blocking(move || pipeline.run(&image)).await??;
  // 推理完成后释放工作目录中的文件
  drop(stored);

  let cumulative = state.counter.increment(outcome.tracked_count);
  Ok(Html(pages::result_page(&outcome, cumulative, chrono::Local::now())).into_response())
}

pub async fn reset(State(state): State<AppState>) -> Redirect {
  state.counter.reset();
  Redirect::to("/")
}

pub async fn count(State(state): State<AppState>) -> Json<Value> {
  Json(json!({
    "cumulative_count": state.counter.get(),
    "tracked_class": state.pipeline.tracked_class(),
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn part(filename: &str) -> Option<UploadPart> {
    Some(UploadPart {
      filename: filename.to_string(),
      bytes: Bytes::from_static(b"data"),
    })
  }

  #[test]
  fn webcam_part_takes_precedence() {
    let chosen = select_part(part("field.jpg"), part("webcam_image.jpg")).unwrap();
    assert_eq!(chosen.filename, "webcam_image.jpg");
  }

  #[test]
  fn empty_webcam_part_falls_back_to_file() {
    let chosen = select_part(part("field.jpg"), part("")).unwrap();
    assert_eq!(chosen.filename, "field.jpg");

    let chosen = select_part(None, part("")).unwrap();
    assert_eq!(chosen.filename, "");
  }

  #[test]
  fn missing_parts_are_rejected() {
    assert!(matches!(
      select_part(None, None),
      Err(AppError::Rejected(MSG_NO_FILE_PART))
    ));
  }
}
