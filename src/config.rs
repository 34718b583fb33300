// 该文件是 Kanmen （看门） 项目的一部分。
// src/config.rs - 项目参数配置
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

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值必须在 [0, 1] 之间, 实际为 {0}")]
  InvalidThreshold(f32),
  #[error("不是目录: {0}")]
  NotADirectory(PathBuf),
  #[error("轮询间隔必须大于 0")]
  InvalidPollInterval,
}

/// 批量检测参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Detect objects in camera snapshots of a folder", long_about = None)]
pub struct ScanArgs {
  /// 模型文件路径
  #[arg(long, value_name = "FILE", env = "KANMEN_MODEL")]
  pub model: PathBuf,

  /// 标签文件路径
  #[arg(long, value_name = "FILE", env = "KANMEN_LABELS")]
  pub labels: PathBuf,

  /// 图像目录
  #[arg(long, value_name = "DIR", env = "KANMEN_IMAGES")]
  pub images: PathBuf,

  /// 摄像头名称，匹配 `<camera>*.jpg`
  #[arg(long, default_value = "frontdoor", value_name = "NAME", env = "KANMEN_CAMERA")]
  pub camera: String,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.7", value_name = "THRESHOLD", env = "KANMEN_THRESHOLD")]
  pub threshold: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
  pub model: PathBuf,
  pub labels: PathBuf,
  pub images: PathBuf,
  pub camera: String,
  pub threshold: f32,
}

impl ScanArgs {
  pub fn validate(self) -> Result<ScanConfig, ConfigError> {
    Ok(ScanConfig {
      threshold: validate_threshold(self.threshold)?,
      model: self.model,
      labels: self.labels,
      images: self.images,
      camera: self.camera,
    })
  }
}

/// 目录监视参数配置
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Watch a snapshot folder and detect objects in new images", long_about = None)]
pub struct WatchArgs {
  /// 模型文件路径
  #[arg(long, value_name = "FILE", env = "KANMEN_MODEL")]
  pub model: PathBuf,

  /// 标签文件路径
  #[arg(long, value_name = "FILE", env = "KANMEN_LABELS")]
  pub labels: PathBuf,

  /// 需要监视的快照目录
  #[arg(
    long = "snapshot_dir",
    alias = "snapshot-dir",
    value_name = "DIR",
    env = "KANMEN_SNAPSHOT_DIR"
  )]
  pub snapshot_dir: PathBuf,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.4", value_name = "THRESHOLD", env = "KANMEN_THRESHOLD")]
  pub threshold: f32,

  /// 目录轮询间隔（毫秒）
  #[arg(long, default_value = "1000", value_name = "MS", env = "KANMEN_POLL_INTERVAL_MS")]
  pub poll_interval_ms: u64,

  /// 每个新文件都重新加载模型
  #[arg(long)]
  pub reload_per_event: bool,

  /// 标注输出，例如 folder:///var/lib/kanmen?record=json 或 log://
  #[arg(long, value_name = "URL", env = "KANMEN_ANNOTATE")]
  pub annotate: Option<Url>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
  pub model: PathBuf,
  pub labels: PathBuf,
  pub snapshot_dir: PathBuf,
  pub threshold: f32,
  pub poll_interval: Duration,
  pub reload_per_event: bool,
  pub annotate: Option<Url>,
}

impl WatchArgs {
  pub fn validate(self) -> Result<WatchConfig, ConfigError> {
    if !self.snapshot_dir.is_dir() {
      return Err(ConfigError::NotADirectory(self.snapshot_dir));
    }
    if self.poll_interval_ms == 0 {
      return Err(ConfigError::InvalidPollInterval);
    }

    Ok(WatchConfig {
      threshold: validate_threshold(self.threshold)?,
      model: self.model,
      labels: self.labels,
      snapshot_dir: self.snapshot_dir,
      poll_interval: Duration::from_millis(self.poll_interval_ms),
      reload_per_event: self.reload_per_event,
      annotate: self.annotate,
    })
  }
}

pub fn validate_threshold(threshold: f32) -> Result<f32, ConfigError> {
  if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
    Ok(threshold)
  } else {
    Err(ConfigError::InvalidThreshold(threshold))
  }
}
