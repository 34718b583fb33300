// 该文件是 Kanmen （看门） 项目的一部分。
// src/bin/detect_folder.rs - 批量检测快照目录
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

use anyhow::Result;
use clap::Parser;
use tracing::info;

use kanmen::{
  config::ScanArgs,
  label::LabelTable,
  logging,
  model::{InferenceEngine, OnnxInterpreter},
  task::{BatchScanner, report_scan},
};

fn main() -> Result<()> {
  logging::init("info");

  let config = ScanArgs::parse().validate()?;

  info!("模型文件路径: {}", config.model.display());
  info!("标签文件路径: {}", config.labels.display());
  info!("图像目录: {}", config.images.display());

  let labels = LabelTable::load(&config.labels)?;
  info!("共加载 {} 个标签", labels.len());

  let mut engine = InferenceEngine::<OnnxInterpreter>::load_ready(&config.model)?;
  let scanner = BatchScanner::new(&config.images, &config.camera, config.threshold);

  let scan = scanner.scan(&mut engine)?;
  let lines = report_scan(&mut std::io::stdout().lock(), scan, &labels)?;
  info!("共输出 {} 条检测结果", lines);

  Ok(())
}
