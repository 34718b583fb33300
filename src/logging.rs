// 该文件是 Kanmen （看门） 项目的一部分。
// src/logging.rs - 日志初始化
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

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 初始化日志输出：时间、级别与消息
///
/// `RUST_LOG` 优先，否则使用 `default_directive`。重复调用不会生效。
pub fn init(default_directive: &str) {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_timer(ChronoLocal::new(LOG_TIME_FORMAT.to_string()))
    .with_target(false)
    .try_init();
}

#[cfg(test)]
mod tests {
  #[test]
  fn init_twice_is_harmless() {
    super::init("debug");
    super::init("info");
    tracing::info!("logging initialised");
  }
}
