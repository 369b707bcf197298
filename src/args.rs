// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use url::Url;

/// Yumi 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// ONNX 模型路径，例如 onnx:///models/best.onnx
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 摄像头设备，例如 v4l:///dev/video0
  #[arg(long, default_value = "v4l:///dev/video0", value_name = "CAMERA")]
  pub camera: Url,

  /// 不使用服务端摄像头
  #[arg(long)]
  pub no_camera: bool,

  /// 监听地址
  #[arg(long, default_value = "0.0.0.0:5000", value_name = "ADDR")]
  pub bind: SocketAddr,

  /// 上传文件工作目录
  #[arg(long, default_value = "upload_folder", value_name = "DIR")]
  pub upload_dir: PathBuf,

  /// 响应后保留上传文件
  #[arg(long)]
  pub keep_uploads: bool,

  /// 模型输入边长
  #[arg(long, default_value = "1280", value_name = "PIXELS",
        value_parser = clap::value_parser!(u32).range(32..=8192))]
  pub imgsz: u32,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD", value_parser = parse_ratio)]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.7", value_name = "THRESHOLD", value_parser = parse_ratio)]
  pub nms_threshold: f32,

  /// 类别名称列表，按模型类别索引排列
  #[arg(long, value_delimiter = ',', default_value = "Total Corn", value_name = "NAMES")]
  pub classes: Vec<String>,

  /// 计入累计计数的类别
  #[arg(long, default_value = "Total Corn", value_name = "NAME")]
  pub tracked_class: String,

  /// 摄像头采集超时（毫秒）
  #[arg(long, default_value = "5000", value_name = "MILLIS")]
  pub capture_timeout_ms: u64,

  /// 手动曝光值，不设置时使用自动曝光
  #[arg(long, value_name = "VALUE")]
  pub exposure: Option<i64>,

  /// 上传大小上限（MiB）
  #[arg(long, default_value = "16", value_name = "MIB",
        value_parser = clap::value_parser!(u64).range(1..=1024))]
  pub max_upload_mb: u64,
}

impl Args {
  /// 上传大小上限（字节）
  pub fn max_upload_bytes(&self) -> usize {
    usize::try_from(self.max_upload_mb * 1024 * 1024).unwrap_or(usize::MAX)
  }
}

/// 解析 [0.0, 1.0] 区间内的阈值
fn parse_ratio(s: &str) -> Result<f32, String> {
  let value: f32 = s.parse().map_err(|e| format!("{s} 不是有效的数值: {e}"))?;
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(format!("{value} 不在 0.0 到 1.0 之间"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
    let mut argv = vec!["yumi", "--model", "onnx:///models/best.onnx"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv)
  }

  #[test]
  fn defaults_are_accepted() {
    let args = parse(&[]).unwrap();
    assert_eq!(args.imgsz, 1280);
    assert_eq!(args.classes, vec!["Total Corn".to_string()]);
    assert_eq!(args.max_upload_bytes(), 16 * 1024 * 1024);
  }

  #[test]
  fn out_of_range_values_are_rejected() {
    assert!(parse(&["--imgsz", "0"]).is_err());
    assert!(parse(&["--imgsz", "16"]).is_err());
    assert!(parse(&["--confidence", "1.5"]).is_err());
    assert!(parse(&["--confidence", "NaN"]).is_err());
    assert!(parse(&["--nms-threshold", "-0.1"]).is_err());
    assert!(parse(&["--max-upload-mb", "0"]).is_err());
    assert!(parse(&["--max-upload-mb", "18446744073709551615"]).is_err());
  }

  #[test]
  fn in_range_values_are_accepted() {
    let args = parse(&["--imgsz", "640", "--confidence", "0.5", "--nms-threshold", "0.45"]).unwrap();
    assert_eq!(args.imgsz, 640);
    assert_eq!(args.confidence, 0.5);
    assert_eq!(args.nms_threshold, 0.45);
  }
}
