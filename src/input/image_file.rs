// 该文件是 Yumi （玉米计数） 项目的一部分。
// src/input/image_file.rs - 上传图像文件的保存与读取
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

use std::{
  io::Write,
  path::{Path, PathBuf},
};

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, warn};

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum StorageError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("无效的文件名: {0:?}")]
  InvalidFilename(String),
}

/// 文件扩展名是否在允许列表中（不区分大小写）
pub fn allowed_file(filename: &str) -> bool {
  filename
    .rsplit_once('.')
    .map(|(_, ext)| {
      ALLOWED_EXTENSIONS
        .iter()
        .any(|allowed| ext.eq_ignore_ascii_case(allowed))
    })
    .unwrap_or(false)
}

/// 清洗用户提供的文件名，使其只能落在工作目录内
///
/// 去掉非 ASCII 字符，路径分隔符视为空白，空白折叠为 `_`，
/// 仅保留 `[A-Za-z0-9_.-]`，并去掉首尾的 `.` 与 `_`。
pub fn secure_filename(filename: &str) -> String {
  let ascii: String = filename
    .chars()
    .filter(char::is_ascii)
    .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
    .collect();

  let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
  joined
    .chars()
    .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    .collect::<String>()
    .trim_matches(|c| c == '.' || c == '_')
    .to_string()
}

/// 上传工作目录
#[derive(Debug, Clone)]
pub struct UploadStore {
  directory: PathBuf,
  keep_files: bool,
}

impl UploadStore {
  pub fn new<P: AsRef<Path>>(directory: P, keep_files: bool) -> Result<Self, StorageError> {
    let directory = directory.as_ref().to_path_buf();
    std::fs::create_dir_all(&directory)?;
    Ok(Self {
      directory,
      keep_files,
    })
  }

  /// 保存原始字节，文件名为清洗后的名称加随机后缀
  pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredImage, StorageError> {
    let (mut file, path) = self.create_unique(filename)?;
    let stored = self.stored(path);
    file.write_all(bytes)?;
    debug!("保存上传文件: {}", stored.path.display());
    Ok(stored)
  }

  /// 将图像编码后保存，格式由扩展名决定
  pub fn save_image(&self, filename: &str, image: &RgbImage) -> Result<StoredImage, StorageError> {
    let (_, path) = self.create_unique(filename)?;
    let stored = self.stored(path);
    image.save(&stored.path)?;
    debug!("保存采集图像: {}", stored.path.display());
    Ok(stored)
  }

  /// 在工作目录中创建唯一文件，同名上传互不覆盖
  fn create_unique(&self, filename: &str) -> Result<(std::fs::File, PathBuf), StorageError> {
    let name = secure_filename(filename);
    if name.is_empty() {
      return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    let (stem, suffix) = match name.rsplit_once('.') {
      Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), format!(".{ext}")),
      _ => (name.clone(), String::new()),
    };

    let file = tempfile::Builder::new()
      .prefix(&format!("{stem}_"))
      .suffix(&suffix)
      .tempfile_in(&self.directory)?;
    let (file, path) = file.keep().map_err(|e| e.error)?;
    Ok((file, path))
  }

  fn stored(&self, path: PathBuf) -> StoredImage {
    StoredImage {
      path,
      keep: self.keep_files,
    }
  }
}

/// 已落盘的图像文件，除非配置保留，否则在释放时删除
#[derive(Debug)]
pub struct StoredImage {
  path: PathBuf,
  keep: bool,
}

impl StoredImage {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// 按内容识别格式，将内存中的上传数据解码为 RGB 图像
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, StorageError> {
  Ok(image::load_from_memory(bytes)?.into_rgb8())
}

impl Drop for StoredImage {
  fn drop(&mut self) {
    if self.keep {
      return;
    }
    if let Err(e) = std::fs::remove_file(&self.path) {
      warn!("删除临时文件 {} 失败: {}", self.path.display(), e);
    }
  }
}
