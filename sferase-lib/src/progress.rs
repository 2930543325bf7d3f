//! 进度回调系统
//!
//! 这个模块定义了进度上报的抽象接口。擦除执行器在每一步擦除完成后
//! 上报一次结构化的进度事件，调用方（CLI、测试等）可以自定义如何展示。
//! 进度仅供参考，不参与任何控制决策。

use crate::geometry::Granularity;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// 进度条类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressType {
    /// 旋转进度条，用于不确定时长的操作
    Spinner,
    /// 条形进度条，用于有明确进度的操作
    Bar { total: u64 },
}

/// 进度条状态
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// 进度条类型
    pub progress_type: ProgressType,
    /// 步骤前缀（通常是十六进制步骤号）
    pub prefix: String,
    /// 当前消息
    pub message: String,
    /// 当前进度（仅对 Bar 类型有效）
    pub current: Option<u64>,
}

/// 单步擦除完成后的进度事件
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EraseProgress {
    /// 已完成的步数（从 1 开始）
    pub step: usize,
    /// 计划中的总步数
    pub steps: usize,
    /// 刚刚完成的擦除粒度
    pub granularity: Granularity,
    /// 刚刚完成的擦除地址
    pub address: u32,
    /// 已擦除的字节数
    pub erased: u64,
    /// 需要擦除的总字节数
    pub total: u64,
}

impl EraseProgress {
    /// 已擦除字节数占总字节数的百分比（0 到 100）
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.erased as f64 * 100.0 / self.total as f64
    }
}

/// 进度条结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Success,
    Failed,
}

/// 进度回调 trait
///
/// 实现此 trait 以自定义进度的显示方式
pub trait ProgressCallback: Send + Sync {
    /// 开始一个新的进度条，返回用于后续操作的进度条 ID
    fn start(&self, info: ProgressInfo) -> ProgressId;

    /// 一步擦除完成
    fn advance(&self, id: ProgressId, progress: &EraseProgress);

    /// 完成进度条
    fn finish(&self, id: ProgressId, status: ProgressStatus, final_message: String);
}

/// 进度条 ID 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

/// 默认的空进度回调实现
///
/// 这个实现不会产生任何输出，适用于不需要进度显示的场景
#[derive(Debug, Default)]
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn start(&self, _info: ProgressInfo) -> ProgressId {
        ProgressId(0)
    }

    fn advance(&self, _id: ProgressId, _progress: &EraseProgress) {}

    fn finish(&self, _id: ProgressId, _status: ProgressStatus, _final_message: String) {}
}

/// 进度回调的包装器，便于使用
pub type ProgressCallbackArc = Arc<dyn ProgressCallback>;

/// 创建默认的空进度回调
pub fn no_op_progress_callback() -> ProgressCallbackArc {
    Arc::new(NoOpProgressCallback)
}

/// 进度条助手结构体
///
/// 提供便捷的方法来创建和管理进度条
#[derive(Clone)]
pub struct ProgressHelper {
    callback: ProgressCallbackArc,
    step_counter: Arc<AtomicI32>,
}

impl ProgressHelper {
    /// 创建新的进度助手，从指定的初始步骤开始
    pub fn new(callback: ProgressCallbackArc, initial_step: i32) -> Self {
        Self {
            callback,
            step_counter: Arc::new(AtomicI32::new(initial_step)),
        }
    }

    /// 获取下一个步骤号并递增计数器
    fn next_step(&self) -> i32 {
        self.step_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// 创建一个旋转进度条
    pub fn create_spinner(&self, message: impl Into<String>) -> ProgressHandler {
        let step = self.next_step();
        let info = ProgressInfo {
            progress_type: ProgressType::Spinner,
            prefix: format!("0x{:02X}", step),
            message: message.into(),
            current: None,
        };
        let id = self.callback.start(info);
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
        }
    }

    /// 创建一个条形进度条
    pub fn create_bar(&self, total: u64, message: impl Into<String>) -> ProgressHandler {
        let step = self.next_step();
        let info = ProgressInfo {
            progress_type: ProgressType::Bar { total },
            prefix: format!("0x{:02X}", step),
            message: message.into(),
            current: Some(0),
        };
        let id = self.callback.start(info);
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
        }
    }

    /// 获取当前步骤号（不递增）
    pub fn current_step(&self) -> i32 {
        self.step_counter.load(Ordering::SeqCst)
    }
}

impl Default for ProgressHelper {
    fn default() -> Self {
        Self::new(no_op_progress_callback(), 0)
    }
}

/// 进度条处理器
///
/// 用于操作单个进度条实例
pub struct ProgressHandler {
    callback: ProgressCallbackArc,
    id: ProgressId,
}

impl ProgressHandler {
    /// 上报一步擦除完成
    pub fn advance(&self, progress: &EraseProgress) {
        self.callback.advance(self.id, progress);
    }

    /// 完成进度条
    pub fn finish(self, status: ProgressStatus, message: impl Into<String>) {
        self.callback.finish(self.id, status, message.into());
    }
}
