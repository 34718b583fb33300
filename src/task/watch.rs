// 该文件是 Kanmen （看门） 项目的一部分。
// src/task/watch.rs - 目录监视
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
  path::{Path, PathBuf},
  sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError},
  time::{Duration, Instant},
};

use notify::{EventKind, PollWatcher, RecursiveMode, Watcher, event::ModifyKind};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
  input::read_frame,
  label::LabelTable,
  model::{Detection, EngineError, EngineState, InferenceEngine, Interpreter, LoadModel},
  output::{Annotator, annotate_objects},
  task::describe_detection,
};

/// 等待单个事件的最长时间，决定响应中断信号的延迟
const EVENT_WAIT: Duration = Duration::from_millis(100);
/// 停止后等待轮询线程退出的额外时间
const QUIESCE_GRACE: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum WatchError {
  #[error(transparent)]
  Engine(#[from] EngineError),
  #[error("目录监视错误: {0}")]
  Watcher(#[from] notify::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
  Created(PathBuf),
  Deleted(PathBuf),
  Modified(PathBuf),
  Moved { from: PathBuf, to: Option<PathBuf> },
}

impl WatchEvent {
  /// 访问事件与未知事件被丢弃
  pub fn from_notify(event: notify::Event) -> Option<Self> {
    let mut paths = event.paths.into_iter();
    match event.kind {
      EventKind::Create(_) => paths.next().map(WatchEvent::Created),
      EventKind::Remove(_) => paths.next().map(WatchEvent::Deleted),
      EventKind::Modify(ModifyKind::Name(_)) => {
        let from = paths.next()?;
        Some(WatchEvent::Moved {
          from,
          to: paths.next(),
        })
      }
      EventKind::Modify(_) => paths.next().map(WatchEvent::Modified),
      _ => None,
    }
  }

  pub fn path(&self) -> &Path {
    match self {
      WatchEvent::Created(path) | WatchEvent::Deleted(path) | WatchEvent::Modified(path) => path,
      WatchEvent::Moved { from, .. } => from,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
  Idle,
  Watching,
  Handling,
  Stopped,
}

#[derive(Debug)]
pub enum HandleOutcome {
  Detected(Vec<Detection>),
  DecodeFailed,
  Logged,
  Ignored,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchStats {
  pub created: usize,
  pub deleted: usize,
  pub modified: usize,
  pub moved: usize,
  pub ignored: usize,
  pub detections: usize,
  pub decode_failures: usize,
}

pub type EngineLoader<I> = Box<dyn FnMut() -> Result<InferenceEngine<I>, EngineError> + Send>;

/// 为每个创建事件提供 Ready 状态的引擎
pub struct EngineSlot<I> {
  loader: EngineLoader<I>,
  reload_per_event: bool,
  engine: Option<InferenceEngine<I>>,
  loads: usize,
}

impl<I: LoadModel + 'static> EngineSlot<I> {
  pub fn from_path(path: impl Into<PathBuf>, reload_per_event: bool) -> Self {
    let path = path.into();
    Self::new(
      Box::new(move || InferenceEngine::load_ready(&path)),
      reload_per_event,
    )
  }
}

impl<I: Interpreter> EngineSlot<I> {
  pub fn new(loader: EngineLoader<I>, reload_per_event: bool) -> Self {
    EngineSlot {
      loader,
      reload_per_event,
      engine: None,
      loads: 0,
    }
  }

  /// 模型被加载的次数
  pub fn loads(&self) -> usize {
    self.loads
  }

  pub fn ready(&mut self) -> Result<&mut InferenceEngine<I>, EngineError> {
    let engine = match self.engine.take() {
      Some(engine) if !self.reload_per_event => engine,
      _ => {
        let engine = (self.loader)()?;
        self.loads += 1;
        engine
      }
    };

    if engine.state() != EngineState::Ready {
      return Err(EngineError::InvalidState {
        expected: EngineState::Ready,
        actual: engine.state(),
      });
    }

    Ok(self.engine.insert(engine))
  }
}

/// 监视回调读取的共享配置
pub struct WatchContext<A> {
  pub labels: LabelTable,
  pub threshold: f32,
  pub annotator: Option<A>,
}

pub struct WatchHandler<I, A> {
  context: WatchContext<A>,
  engines: EngineSlot<I>,
  stats: WatchStats,
}

impl<I: Interpreter, A: Annotator> WatchHandler<I, A> {
  pub fn new(context: WatchContext<A>, engines: EngineSlot<I>) -> Self {
    WatchHandler {
      context,
      engines,
      stats: WatchStats::default(),
    }
  }

  pub fn stats(&self) -> &WatchStats {
    &self.stats
  }

  pub fn engines(&self) -> &EngineSlot<I> {
    &self.engines
  }

  /// 只有创建事件会触发推理，其他事件只记录日志
  pub fn handle(&mut self, event: WatchEvent) -> Result<HandleOutcome, WatchError> {
    match event {
      WatchEvent::Created(path) | WatchEvent::Modified(path) if path.is_dir() => {
        debug!("忽略目录事件: {}", path.display());
        self.stats.ignored += 1;
        Ok(HandleOutcome::Ignored)
      }
      WatchEvent::Created(path) => {
        info!("{} was created", path.display());
        self.stats.created += 1;
        self.on_created(&path)
      }
      WatchEvent::Deleted(path) => {
        info!("{} was deleted", path.display());
        self.stats.deleted += 1;
        Ok(HandleOutcome::Logged)
      }
      WatchEvent::Modified(path) => {
        info!("{} has been modified", path.display());
        self.stats.modified += 1;
        Ok(HandleOutcome::Logged)
      }
      WatchEvent::Moved { from, to } => {
        match to {
          Some(to) => info!("{} was moved to {}", from.display(), to.display()),
          None => info!("{} was moved", from.display()),
        }
        self.stats.moved += 1;
        Ok(HandleOutcome::Logged)
      }
    }
  }

  fn on_created(&mut self, path: &Path) -> Result<HandleOutcome, WatchError> {
    let engine = self.engines.ready()?;
    let shape = engine.input_shape()?;

    let frame = match read_frame(path, shape) {
      Ok(frame) => frame,
      Err(e) => {
        error!("无法解码新文件, 跳过: {}", e);
        self.stats.decode_failures += 1;
        return Ok(HandleOutcome::DecodeFailed);
      }
    };

    let now = Instant::now();
    let detections = engine.detect(&frame, self.context.threshold)?;
    let elapsed = now.elapsed();

    let file_name = path
      .file_name()
      .map(|name| name.to_string_lossy())
      .unwrap_or_else(|| path.to_string_lossy());
    for detection in &detections {
      info!(
        "{}",
        describe_detection(&self.context.labels, detection, &file_name, elapsed)
      );
    }
    if detections.is_empty() {
      debug!("{} 中没有检测到物体", file_name);
    }

    if let Some(annotator) = self.context.annotator.as_mut() {
      if let Err(e) = annotate_objects(
        annotator,
        &frame,
        path,
        &detections,
        &self.context.labels,
        elapsed,
      ) {
        warn!("标注 {} 失败: {}", path.display(), e);
      }
    }

    self.stats.detections += detections.len();
    Ok(HandleOutcome::Detected(detections))
  }
}

/// 轮询目录变化并把事件逐个交给处理器
///
/// 处理器在调用线程上同步执行，一次只处理一个事件；处理期间新事件在通道中等待。
/// 单次推理没有超时限制，卡住的推理会阻塞整个循环。
pub struct WatchLoop {
  directory: PathBuf,
  poll_interval: Duration,
  state: WatchState,
}

impl WatchLoop {
  pub fn new(directory: impl Into<PathBuf>, poll_interval: Duration) -> Self {
    WatchLoop {
      directory: directory.into(),
      poll_interval,
      state: WatchState::Idle,
    }
  }

  pub fn state(&self) -> WatchState {
    self.state
  }

  /// 处理单个事件：Watching → Handling → Watching，致命错误时 Stopped
  pub fn dispatch<I: Interpreter, A: Annotator>(
    &mut self,
    handler: &mut WatchHandler<I, A>,
    event: WatchEvent,
  ) -> Result<HandleOutcome, WatchError> {
    self.state = WatchState::Handling;
    let result = handler.handle(event);
    self.state = match result {
      Ok(_) => WatchState::Watching,
      Err(_) => WatchState::Stopped,
    };
    result
  }

  /// 运行直到 `stop` 收到信号（或其发送端全部关闭）
  pub fn run<I: Interpreter, A: Annotator>(
    &mut self,
    handler: &mut WatchHandler<I, A>,
    stop: &Receiver<()>,
  ) -> Result<(), WatchError> {
    let (tx, rx) = mpsc::channel();
    let config = notify::Config::default().with_poll_interval(self.poll_interval);
    let mut watcher = PollWatcher::new(tx, config)?;
    watcher.watch(&self.directory, RecursiveMode::NonRecursive)?;

    self.state = WatchState::Watching;
    info!("Starting to Watch {}...", self.directory.display());

    let result = self.pump(handler, &rx, stop);

    drop(watcher);
    self.quiesce(&rx);
    self.state = WatchState::Stopped;
    info!("Stopped watching {}", self.directory.display());

    result
  }

  fn pump<I: Interpreter, A: Annotator>(
    &mut self,
    handler: &mut WatchHandler<I, A>,
    events: &Receiver<notify::Result<notify::Event>>,
    stop: &Receiver<()>,
  ) -> Result<(), WatchError> {
    loop {
      match stop.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => {
          info!("收到中断信号，退出监视循环");
          return Ok(());
        }
        Err(TryRecvError::Empty) => {}
      }

      match events.recv_timeout(EVENT_WAIT) {
        Ok(Ok(event)) => {
          if let Some(event) = WatchEvent::from_notify(event) {
            self.dispatch(handler, event)?;
          }
        }
        Ok(Err(e)) => warn!("目录监视错误: {}", e),
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => {
          warn!("事件通道已关闭");
          return Ok(());
        }
      }
    }
  }

  /// 等待轮询线程退出并释放事件通道
  fn quiesce(&self, events: &Receiver<notify::Result<notify::Event>>) {
    let grace = self.poll_interval * 2 + QUIESCE_GRACE;
    let deadline = Instant::now() + grace;

    loop {
      let remaining = deadline.saturating_duration_since(Instant::now());
      match events.recv_timeout(remaining) {
        Ok(_) => debug!("丢弃停止后到达的事件"),
        Err(RecvTimeoutError::Disconnected) => {
          debug!("轮询线程已退出");
          return;
        }
        Err(RecvTimeoutError::Timeout) => {
          warn!("轮询线程未在 {:.2?} 内退出", grace);
          return;
        }
      }
    }
  }
}
