// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/input/v4l_camera.rs - V4L2 摄像头
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

use image::{ImageFormat, RgbImage};
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::{
  Device, FourCC,
  buffer::Type,
  control::{Control, Value},
  io::{mmap::Stream, traits::CaptureStream},
  video::Capture,
};

use crate::{
  FromUrl, FromUrlWithScheme,
  input::camera::{Camera, CameraError},
};

const V4L_DEFAULT_DEVICE: &str = "/dev/video0";
const V4L_BUFFER_COUNT: u32 = 4;

// V4L2 曝光控制
const V4L2_CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
const V4L2_EXPOSURE_MANUAL: i64 = 1;
const V4L2_EXPOSURE_APERTURE_PRIORITY: i64 = 3;

pub struct V4lCamera {
  device_path: String,
  exposure: Option<i64>,
}

impl FromUrlWithScheme for V4lCamera {
  const SCHEME: &'static str = "v4l";
}

impl FromUrl for V4lCamera {
  type Error = CameraError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(CameraError::SchemeMismatch);
    }

    // v4l:///dev/video0
    let device_path = if url.path().is_empty() || url.path() == "/" {
      V4L_DEFAULT_DEVICE.to_string()
    } else {
      url.path().to_string()
    };

    Ok(V4lCamera {
      device_path,
      exposure: None,
    })
  }
}

impl V4lCamera {
  /// 设置手动曝光值，`None` 表示交给驱动自动曝光
  pub fn with_exposure(mut self, exposure: Option<i64>) -> Self {
    self.exposure = exposure;
    self
  }

  fn apply_exposure(&self, device: &Device) {
    let controls = match self.exposure {
      Some(value) => vec![
        (V4L2_CID_EXPOSURE_AUTO, V4L2_EXPOSURE_MANUAL),
        (V4L2_CID_EXPOSURE_ABSOLUTE, value),
      ],
      None => vec![(V4L2_CID_EXPOSURE_AUTO, V4L2_EXPOSURE_APERTURE_PRIORITY)],
    };

    for (id, value) in controls {
      let control = Control {
        id,
        value: Value::Integer(value),
      };
      // 部分驱动不支持曝光控制，忽略失败
      if let Err(e) = device.set_control(control) {
        warn!("设置摄像头控制 {:#x}={} 失败: {}", id, value, e);
      }
    }
  }
}

impl Camera for V4lCamera {
  fn capture(&self) -> Result<RgbImage, CameraError> {
    info!("打开摄像头设备: {}", self.device_path);
    let device = Device::with_path(&self.device_path)
      .map_err(|e| CameraError::Unavailable(format!("{}: {}", self.device_path, e)))?;

    self.apply_exposure(&device);

    let mut format = device
      .format()
      .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    format.fourcc = FourCC::new(b"MJPG");
    // 驱动可能不接受 MJPG，以实际生效的格式为准
    let format = device
      .set_format(&format)
      .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    debug!(
      "摄像头格式: {}x{} {}",
      format.width, format.height, format.fourcc
    );

    let mut stream = Stream::with_buffers(&device, Type::VideoCapture, V4L_BUFFER_COUNT)
      .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

    let (buf, meta) = stream
      .next()
      .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

    let used = meta.bytesused as usize;
    let data = if used > 0 && used <= buf.len() {
      &buf[..used]
    } else {
      buf
    };

    frame_to_rgb(format.fourcc.repr, format.width, format.height, data)
  }

  fn describe(&self) -> String {
    format!("v4l://{}", self.device_path)
  }
}

fn frame_to_rgb(
  fourcc: [u8; 4],
  width: u32,
  height: u32,
  data: &[u8],
) -> Result<RgbImage, CameraError> {
  match &fourcc {
    b"MJPG" | b"JPEG" => {
      Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.into_rgb8())
    }
    b"YUYV" => yuyv_to_rgb(width, height, data),
    b"RGB3" => {
      let expected = (width * height * 3) as usize;
      if data.len() < expected {
        return Err(CameraError::CaptureFailed(format!(
          "帧数据长度不足: 期望 {}, 实际 {}",
          expected,
          data.len()
        )));
      }
      RgbImage::from_raw(width, height, data[..expected].to_vec())
        .ok_or_else(|| CameraError::CaptureFailed("帧尺寸无效".to_string()))
    }
    other => Err(CameraError::UnsupportedPixelFormat(
      String::from_utf8_lossy(other).into_owned(),
    )),
  }
}

/// BT.601 YUYV (4:2:2) 转 RGB
fn yuyv_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<RgbImage, CameraError> {
  let expected = (width * height * 2) as usize;
  if data.len() < expected {
    return Err(CameraError::CaptureFailed(format!(
      "帧数据长度不足: 期望 {}, 实际 {}",
      expected,
      data.len()
    )));
  }

  let mut rgb = Vec::with_capacity((width * height * 3) as usize);
  for chunk in data[..expected].chunks_exact(4) {
    let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
    rgb.extend_from_slice(&yuv_to_rgb(y0, u, v));
    rgb.extend_from_slice(&yuv_to_rgb(y1, u, v));
  }

  RgbImage::from_raw(width, height, rgb)
    .ok_or_else(|| CameraError::CaptureFailed("帧尺寸无效".to_string()))
}

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
  let c = y as i32 - 16;
  let d = u as i32 - 128;
  let e = v as i32 - 128;
  let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
  [
    clamp(298 * c + 409 * e),
    clamp(298 * c - 100 * d - 208 * e),
    clamp(298 * c + 516 * d),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn device_path_comes_from_url() {
    let camera = V4lCamera::from_url(&Url::parse("v4l:///dev/video2").unwrap()).unwrap();
    assert_eq!(camera.device_path, "/dev/video2");

    let camera = V4lCamera::from_url(&Url::parse("v4l:///").unwrap()).unwrap();
    assert_eq!(camera.device_path, V4L_DEFAULT_DEVICE);

    assert!(matches!(
      V4lCamera::from_url(&Url::parse("rtsp://camera/stream").unwrap()),
      Err(CameraError::SchemeMismatch)
    ));
  }

  #[test]
  fn yuyv_gray_levels_convert() {
    // 两个像素: 白、黑
    let frame = yuyv_to_rgb(2, 1, &[235, 128, 16, 128]).unwrap();
    assert_eq!(frame.get_pixel(0, 0).0, [255, 255, 255]);
    assert_eq!(frame.get_pixel(1, 0).0, [0, 0, 0]);
  }

  #[test]
  fn short_frames_are_rejected() {
    assert!(matches!(
      frame_to_rgb(*b"YUYV", 4, 4, &[0; 8]),
      Err(CameraError::CaptureFailed(_))
    ));
    assert!(matches!(
      frame_to_rgb(*b"RGB3", 2, 2, &[0; 3]),
      Err(CameraError::CaptureFailed(_))
    ));
  }

  #[test]
  fn unknown_pixel_formats_are_reported() {
    assert!(matches!(
      frame_to_rgb(*b"NV12", 2, 2, &[0; 6]),
      Err(CameraError::UnsupportedPixelFormat(f)) if f == "NV12"
    ));
  }
}
