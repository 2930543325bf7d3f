//! CLI 进度条实现
//!
//! 这个模块提供基于 indicatif 的进度条实现，用于在 CLI 环境中显示擦除进度

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use sferase_lib::progress::{
    EraseProgress, ProgressCallback, ProgressId, ProgressInfo, ProgressStatus, ProgressType,
};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 基于标准输出的百分比进度回调实现
///
/// 非终端环境（例如被其他程序调用）下每次百分比变化输出一行
pub struct PercentProgressCallback {
    last_percent: Mutex<HashMap<u64, u64>>,
    next_id: Mutex<u64>,
}

impl PercentProgressCallback {
    /// 创建新的百分比进度回调
    pub fn new() -> Self {
        Self {
            last_percent: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// 获取下一个唯一的进度条 ID
    fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }

    fn print_line(&self, line: &str) {
        let mut stdout = io::stdout();
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}

impl ProgressCallback for PercentProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id();
        self.print_line(&format!("[{}] {}", info.prefix, info.message));
        if let ProgressType::Bar { .. } = info.progress_type {
            self.print_line("0%");
        }
        self.last_percent.lock().unwrap().insert(id, 0);
        ProgressId(id)
    }

    fn advance(&self, id: ProgressId, progress: &EraseProgress) {
        let percent = progress.percent().floor() as u64;
        let changed = {
            let mut states = self.last_percent.lock().unwrap();
            match states.get_mut(&id.0) {
                Some(last) if *last != percent => {
                    *last = percent;
                    true
                }
                _ => false,
            }
        };

        if changed {
            self.print_line(&format!("{}%", percent));
        }
    }

    fn finish(&self, id: ProgressId, status: ProgressStatus, final_message: String) {
        self.last_percent.lock().unwrap().remove(&id.0);
        if status == ProgressStatus::Failed {
            self.print_line(&format!("Error: {}", final_message));
        } else {
            self.print_line(&final_message);
        }
    }
}

/// 基于 indicatif 的进度回调实现
pub struct IndicatifProgressCallback {
    multi_progress: MultiProgress,
    progress_bars: Arc<Mutex<HashMap<u64, ProgressBar>>>,
    next_id: Arc<Mutex<u64>>,
}

impl IndicatifProgressCallback {
    /// 创建新的 indicatif 进度回调
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            progress_bars: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// 获取下一个唯一的进度条 ID
    fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }
}

impl Default for IndicatifProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for IndicatifProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id();
        let progress_id = ProgressId(id);

        let progress_bar = match info.progress_type {
            ProgressType::Spinner => {
                let spinner = self.multi_progress.add(ProgressBar::new_spinner());
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner.set_style(
                    ProgressStyle::with_template(&format!("[{}] {{spinner}} {{msg}}", info.prefix))
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner.set_message(info.message);
                spinner
            }
            ProgressType::Bar { total } => {
                let bar = self.multi_progress.add(ProgressBar::new(total));
                bar.set_style(
                    ProgressStyle::with_template(&format!(
                        "[{}] {{msg}} {{wide_bar}} {{bytes}}/{{total_bytes}} {{percent_precise}}%",
                        info.prefix
                    ))
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
                );
                bar.set_message(info.message);
                if let Some(current) = info.current {
                    bar.set_position(current);
                }
                bar
            }
        };

        // 存储进度条引用
        self.progress_bars.lock().unwrap().insert(id, progress_bar);

        progress_id
    }

    fn advance(&self, id: ProgressId, progress: &EraseProgress) {
        if let Ok(bars) = self.progress_bars.lock()
            && let Some(bar) = bars.get(&id.0)
        {
            bar.set_position(progress.erased);
        }
    }

    fn finish(&self, id: ProgressId, status: ProgressStatus, final_message: String) {
        if let Ok(mut bars) = self.progress_bars.lock()
            && let Some(bar) = bars.remove(&id.0)
        {
            match status {
                ProgressStatus::Success => bar.finish_with_message(final_message),
                ProgressStatus::Failed => bar.abandon_with_message(final_message),
            }
        }
    }
}

/// 创建 indicatif 进度回调的便利函数
pub fn create_indicatif_progress_callback() -> Arc<dyn ProgressCallback> {
    if io::stdout().is_terminal() {
        Arc::new(IndicatifProgressCallback::new())
    } else {
        Arc::new(PercentProgressCallback::new())
    }
}
