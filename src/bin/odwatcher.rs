// 该文件是 Kanmen （看门） 项目的一部分。
// src/bin/odwatcher.rs - 监视快照目录并检测新图像
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
  FromUrl,
  config::WatchArgs,
  label::LabelTable,
  logging,
  model::OnnxInterpreter,
  output::OutputWrapper,
  task::{EngineSlot, WatchContext, WatchHandler, WatchLoop},
};

fn main() -> Result<()> {
  logging::init("info");

  let config = WatchArgs::parse().validate()?;

  info!("模型文件路径: {}", config.model.display());
  info!("标签文件路径: {}", config.labels.display());
  info!("监视目录: {}", config.snapshot_dir.display());

  let labels = LabelTable::load(&config.labels)?;
  let annotator = config
    .annotate
    .as_ref()
    .map(OutputWrapper::from_url)
    .transpose()?;

  let mut engines = EngineSlot::<OnnxInterpreter>::from_path(&config.model, config.reload_per_event);
  // 模型错误在开始监视之前暴露
  engines.ready()?;

  let context = WatchContext {
    labels,
    threshold: config.threshold,
    annotator,
  };
  let mut handler = WatchHandler::new(context, engines);

  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(());
  })?;

  WatchLoop::new(&config.snapshot_dir, config.poll_interval).run(&mut handler, &rx)?;

  info!("统计: {:?}", handler.stats());
  Ok(())
}
