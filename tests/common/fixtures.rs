// 该文件是 Yumi （玉米计数） 项目的一部分。
// tests/common/fixtures.rs - 测试用模型、摄像头与请求构造
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
  body::Body,
  http::{Request, Response, header},
};
use http_body_util::BodyExt;
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use tempfile::TempDir;
use tower::ServiceExt;

use yumi::{
  counter::SessionCounter,
  input::{Camera, CameraError, NoCamera, UploadStore},
  model::{ClassList, DetectItem, DetectResult, Model, ModelError, SharedModel},
  pipeline::Pipeline,
  web::{self, AppState, DEFAULT_MAX_UPLOAD_BYTES},
};

const BOUNDARY: &str = "yumi-test-boundary";

/// 每次推理返回固定数量的玉米
pub struct FakeModel {
  pub corn: usize,
}

impl Model for FakeModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let (w, h) = (input.width() as i32, input.height() as i32);
    let items: Vec<DetectItem> = (0..self.corn as i32)
      .map(|i| DetectItem {
        class_id: 0,
        score: 0.9,
        bbox: [i, i, (w - 1 - i).max(i), (h - 1 - i).max(i)],
      })
      .collect();
    Ok(DetectResult::from(items))
  }
}

pub struct FailingModel;

impl Model for FailingModel {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, _input: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(ModelError::UnsupportedOutput(vec![1, 0]))
  }
}

pub struct FakeCamera;

impl Camera for FakeCamera {
  fn capture(&self) -> Result<RgbImage, CameraError> {
    Ok(RgbImage::from_pixel(32, 24, Rgb([90, 160, 60])))
  }

  fn describe(&self) -> String {
    "fake".to_string()
  }
}

pub struct TestApp {
  pub router: Router,
  pub counter: Arc<SessionCounter>,
  pub dir: TempDir,
}

pub struct TestAppBuilder {
  model: SharedModel,
  camera: Arc<dyn Camera>,
  keep_uploads: bool,
}

impl TestAppBuilder {
  pub fn new(corn: usize) -> Self {
    Self {
      model: Arc::new(FakeModel { corn }),
      camera: Arc::new(NoCamera),
      keep_uploads: false,
    }
  }

  pub fn failing() -> Self {
    Self {
      model: Arc::new(FailingModel),
      ..Self::new(0)
    }
  }

  pub fn camera(mut self, camera: Arc<dyn Camera>) -> Self {
    self.camera = camera;
    self
  }

  pub fn keep_uploads(mut self) -> Self {
    self.keep_uploads = true;
    self
  }

  pub fn build(self) -> anyhow::Result<TestApp> {
    let dir = TempDir::new()?;
    let counter = Arc::new(SessionCounter::new());
    let state = AppState {
      pipeline: Arc::new(Pipeline::new(self.model, ClassList::default(), "Total Corn")),
      camera: self.camera,
      counter: counter.clone(),
      store: Arc::new(UploadStore::new(dir.path().join("uploads"), self.keep_uploads)?),
      capture_timeout: Duration::from_secs(2),
    };

    Ok(TestApp {
      router: web::router(state, DEFAULT_MAX_UPLOAD_BYTES),
      counter,
      dir,
    })
  }
}

impl TestApp {
  pub async fn send(&self, request: Request<Body>) -> Response<Body> {
    self
      .router
      .clone()
      .oneshot(request)
      .await
      .expect("router is infallible")
  }

  pub fn upload_dir(&self) -> std::path::PathBuf {
    self.dir.path().join("uploads")
  }

  /// 工作目录中的文件名，已排序
  pub fn uploaded_files(&self) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(self.upload_dir())
      .expect("read upload dir")
      .filter_map(|entry| entry.ok())
      .map(|entry| entry.file_name().to_string_lossy().into_owned())
      .collect();
    names.sort();
    names
  }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
  let image = RgbImage::from_pixel(width, height, Rgb([200, 180, 40]));
  let mut buf = Vec::new();
  image
    .write_with_encoder(JpegEncoder::new(&mut buf))
    .expect("encode test jpeg");
  buf
}

/// 构造 multipart 请求，每个部分为 (字段名, 文件名, 内容)
pub fn multipart_request(uri: &str, parts: &[(&str, &str, &[u8])]) -> Request<Body> {
  let mut body = Vec::new();
  for (field, filename, data) in parts {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
      format!(
        "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
      )
      .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
  }
  body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

  Request::builder()
    .method("POST")
    .uri(uri)
    .header(
      header::CONTENT_TYPE,
      format!("multipart/form-data; boundary={BOUNDARY}"),
    )
    .body(Body::from(body))
    .expect("valid request")
}

pub fn post(uri: &str) -> Request<Body> {
  Request::builder()
    .method("POST")
    .uri(uri)
    .body(Body::empty())
    .expect("valid request")
}

pub fn get(uri: &str) -> Request<Body> {
  Request::builder()
    .uri(uri)
    .body(Body::empty())
    .expect("valid request")
}

pub async fn body_text(response: Response<Body>) -> String {
  let bytes = response
    .into_body()
    .collect()
    .await
    .expect("read body")
    .to_bytes();
  String::from_utf8_lossy(&bytes).into_owned()
}

pub fn location(response: &Response<Body>) -> String {
  response
    .headers()
    .get(header::LOCATION)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_string()
}
