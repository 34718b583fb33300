// 该文件是 Kanmen （看门） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::{Path, PathBuf};

use image::{ImageReader, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use crate::frame::{InputShape, RgbNhwcFrame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("I/O error: {path}: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("Image loading error: {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    source: image::ImageError,
  },
}

/// 读取图像文件，转换为 RGB 并缩放到模型输入尺寸
pub fn read_frame(path: &Path, shape: InputShape) -> Result<RgbNhwcFrame, ImageFileInputError> {
  let io_error = |source| ImageFileInputError::IoError {
    path: path.to_path_buf(),
    source,
  };
  let image_error = |source| ImageFileInputError::ImageLoadError {
    path: path.to_path_buf(),
    source,
  };

  let image = ImageReader::open(path)
    .map_err(io_error)?
    .with_guessed_format()
    .map_err(io_error)?
    .decode()
    .map_err(image_error)?;

  debug!(
    "解码 {}: {}x{}, 缩放到 {}x{}",
    path.display(),
    image.width(),
    image.height(),
    shape.width,
    shape.height
  );

  let resized = image::imageops::resize(
    &image.to_rgb8(),
    shape.width as u32,
    shape.height as u32,
    FilterType::Lanczos3,
  );

  Ok(RgbNhwcFrame::from(resized))
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn decodes_and_resizes_jpeg() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frontdoor-1.jpg");
    RgbImage::from_pixel(64, 48, Rgb([200, 10, 10]))
      .save(&path)
      .unwrap();

    let frame = read_frame(&path, InputShape::rgb(30, 20)).unwrap();
    assert_eq!(frame.height(), 30);
    assert_eq!(frame.width(), 20);
    assert_eq!(frame.as_nhwc().len(), 30 * 20 * 3);
  }

  #[test]
  fn zero_byte_file_fails_to_decode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.jpg");
    std::fs::write(&path, b"").unwrap();

    let err = read_frame(&path, InputShape::rgb(8, 8)).unwrap_err();
    assert!(matches!(err, ImageFileInputError::ImageLoadError { .. }));
  }

  #[test]
  fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_frame(&dir.path().join("nope.jpg"), InputShape::rgb(8, 8)).unwrap_err();
    assert!(matches!(err, ImageFileInputError::IoError { .. }));
  }
}
