// 该文件是 Kanmen （看门） 项目的一部分。
// src/input/camera_snapshots.rs - 摄像头快照目录
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

use tracing::{debug, warn};

pub const CAMERA_IMAGE_EXTENSION: &str = ".jpg";

/// 列出目录中匹配 `<camera>*.jpg` 的文件，按文件名升序排列
///
/// 目录不存在或不可读时返回空列表。
pub fn list_camera_images(directory: &Path, camera: &str) -> Vec<PathBuf> {
  let entries = match std::fs::read_dir(directory) {
    Ok(entries) => entries,
    Err(e) => {
      warn!("无法读取目录 {}: {}", directory.display(), e);
      return Vec::new();
    }
  };

  let mut paths: Vec<PathBuf> = entries
    .filter_map(|entry| entry.ok())
    .map(|entry| entry.path())
    // 跟随符号链接
    .filter(|path| path.is_file())
    .filter(|path| {
      path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| matches_camera(name, camera))
        .unwrap_or(false)
    })
    .collect();
  paths.sort();

  debug!(
    "目录 {} 中找到 {} 个 {} 图像",
    directory.display(),
    paths.len(),
    camera
  );
  paths
}

fn matches_camera(name: &str, camera: &str) -> bool {
  name.len() >= camera.len() + CAMERA_IMAGE_EXTENSION.len()
    && name.starts_with(camera)
    && name.ends_with(CAMERA_IMAGE_EXTENSION)
}
