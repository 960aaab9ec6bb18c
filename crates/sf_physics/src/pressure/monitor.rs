// crates/sf_physics/src/pressure/monitor.rs

//! 线性求解不收敛监测
//!
//! 单次外迭代不收敛只记录，稳态迭代会自行恢复。连续不收敛的外迭代
//! 数达到阈值时报告发散，但不中止计算。

use sf_config::MonitorConfig;

/// 连续不收敛计数
#[derive(Debug, Clone)]
pub struct ConvergenceMonitor {
    threshold: usize,
    consecutive: usize,
    diverging: bool,
}

impl ConvergenceMonitor {
    /// 创建
    pub fn new(config: &MonitorConfig) -> Self {
        Self {
            threshold: config.divergence_threshold,
            consecutive: 0,
            diverging: false,
        }
    }

    /// 记录一次外迭代，返回是否处于发散状态
    pub fn record(&mut self, all_converged: bool) -> bool {
        if all_converged {
            if self.diverging {
                log::info!("压力求解重新收敛（此前连续 {} 次外迭代未收敛）", self.consecutive);
            }
            self.consecutive = 0;
            self.diverging = false;
            return false;
        }

        self.consecutive += 1;
        if self.consecutive >= self.threshold && !self.diverging {
            self.diverging = true;
            log::warn!("压力求解已连续 {} 次外迭代未收敛，计算可能发散", self.consecutive);
        }
        self.diverging
    }

    /// 连续不收敛的外迭代数
    pub fn consecutive(&self) -> usize {
        self.consecutive
    }

    /// 是否处于发散状态
    pub fn is_diverging(&self) -> bool {
        self.diverging
    }
}
