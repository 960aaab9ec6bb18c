// crates/sf_physics/src/pressure/error.rs

//! 压力修正错误类型
//!
//! 结构性错误（奇异系统、非正系数、参考单元越界、无法消除的连续性
//! 误差）作为 `Err` 返回并中止本次修正。数值警告（线性求解不收敛、
//! 密度截断）只记录日志并写入报告。

use sf_config::ConfigError;
use sf_foundation::SfError;
use thiserror::Error;

use crate::numerics::MatrixError;

/// 压力修正错误
#[derive(Debug, Error)]
pub enum PressureError {
    /// 闭域方程没有参考单元
    #[error("压力方程 {field} 奇异：闭域且未设置参考单元")]
    SingularSystem {
        /// 求解的场
        field: String,
    },

    /// rAU / rhorAUf 出现非正值
    #[error("{name} 在索引 {index} 处为非正值 {value}，速度场可能已发散")]
    NonPositiveCoefficient {
        /// 系数名称
        name: &'static str,
        /// 单元或面索引
        index: usize,
        /// 数值
        value: f64,
    },

    /// 参考单元越界
    #[error("参考单元 {cell} 越界（单元数 {n_cells}）")]
    ReferenceOutOfRange {
        /// 参考单元
        cell: usize,
        /// 单元数
        n_cells: usize,
    },

    /// 调整出流无法消除的连续性误差
    #[error("连续性误差无法通过调整出流消除: 入流 {mass_in:.6e}, 固定出流 {fixed_out:.6e}, 可调出流 {adjustable_out:.6e}")]
    ContinuityImbalance {
        /// 入流量
        mass_in: f64,
        /// 固定出流量
        fixed_out: f64,
        /// 可调出流量
        adjustable_out: f64,
    },

    /// 当前方程类型缺少必需的场或物性
    #[error("缺少必需的输入: {0}")]
    MissingInput(&'static str),

    /// 密度持续截断超过允许次数
    #[error("密度已连续 {iterations} 次外迭代被截断，计算发散")]
    PersistentDensityClipping {
        /// 连续截断次数
        iterations: usize,
    },

    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 基础错误
    #[error(transparent)]
    Foundation(#[from] SfError),
}

impl From<MatrixError> for PressureError {
    fn from(err: MatrixError) -> Self {
        match err {
            MatrixError::Singular { field } => PressureError::SingularSystem { field },
            MatrixError::ReferenceOutOfRange { cell, n_cells } => {
                PressureError::ReferenceOutOfRange { cell, n_cells }
            }
            MatrixError::Foundation(e) => PressureError::Foundation(e),
        }
    }
}

/// 压力修正结果
pub type PressureResult<T> = Result<T, PressureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_error_mapping() {
        let err: PressureError = MatrixError::Singular { field: "p".into() }.into();
        assert!(matches!(err, PressureError::SingularSystem { ref field } if field == "p"));
        let err: PressureError = MatrixError::ReferenceOutOfRange { cell: 9, n_cells: 4 }.into();
        assert!(err.to_string().contains('9'));
    }

    #[test]
    fn test_display() {
        let err = PressureError::NonPositiveCoefficient { name: "rAU", index: 3, value: -1.0 };
        assert!(err.to_string().contains("rAU"));
    }
}
