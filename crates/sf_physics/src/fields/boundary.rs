// crates/sf_physics/src/fields/boundary.rs

//! 边界条件类型
//!
//! 每个边界片对应一种 [`BoundaryKind`]。边界值由场自身存储，
//! 梯度类边界另存每个面的法向梯度。
//!
//! 隐式算子通过两组系数使用边界条件：
//!
//! - 值系数 `φ_b = vic·φ_P + vbc`（对流项）
//! - 梯度系数 `∂φ/∂n = gic·φ_P + gbc`（扩散项）

use serde::{Deserialize, Serialize};

/// 边界条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    /// 固定值（Dirichlet）
    FixedValue,
    /// 零梯度
    #[default]
    ZeroGradient,
    /// 固定法向梯度
    FixedGradient,
    /// 固定通量压力：梯度由压力修正根据通量一致性设定
    FixedFluxPressure,
    /// 由外部计算，隐式算子中按零梯度处理
    Calculated,
}

impl BoundaryKind {
    /// 是否固定场的绝对水平
    #[inline]
    pub fn fixes_level(self) -> bool {
        matches!(self, BoundaryKind::FixedValue)
    }

    /// 是否由存储的法向梯度确定边界值
    #[inline]
    pub fn is_gradient_type(self) -> bool {
        matches!(self, BoundaryKind::FixedGradient | BoundaryKind::FixedFluxPressure)
    }

    /// 值系数 `(vic, vbc)`，满足 `φ_b = vic·φ_P + vbc`
    ///
    /// `value` 为固定值（仅 FixedValue 使用），`gradient` 为法向梯度，
    /// `delta` 为面的 delta 系数。
    #[inline]
    pub fn value_coeffs(self, value: f64, gradient: f64, delta: f64) -> (f64, f64) {
        match self {
            BoundaryKind::FixedValue => (0.0, value),
            BoundaryKind::FixedGradient | BoundaryKind::FixedFluxPressure => (1.0, gradient / delta),
            BoundaryKind::ZeroGradient | BoundaryKind::Calculated => (1.0, 0.0),
        }
    }

    /// 梯度系数 `(gic, gbc)`，满足 `∂φ/∂n = gic·φ_P + gbc`
    #[inline]
    pub fn gradient_coeffs(self, value: f64, gradient: f64, delta: f64) -> (f64, f64) {
        match self {
            BoundaryKind::FixedValue => (-delta, delta * value),
            BoundaryKind::FixedGradient | BoundaryKind::FixedFluxPressure => (0.0, gradient),
            BoundaryKind::ZeroGradient | BoundaryKind::Calculated => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_value_coeffs() {
        let k = BoundaryKind::FixedValue;
        assert_eq!(k.value_coeffs(3.0, 0.0, 2.0), (0.0, 3.0));
        // ∂φ/∂n = (φ_b - φ_P)·δ
        let (gic, gbc) = k.gradient_coeffs(3.0, 0.0, 2.0);
        assert_eq!(gic * 1.0 + gbc, (3.0 - 1.0) * 2.0);
        assert!(k.fixes_level());
    }

    #[test]
    fn test_gradient_coeffs() {
        let k = BoundaryKind::FixedFluxPressure;
        assert_eq!(k.gradient_coeffs(0.0, 5.0, 2.0), (0.0, 5.0));
        assert_eq!(k.value_coeffs(0.0, 5.0, 2.0), (1.0, 2.5));
        assert!(k.is_gradient_type());
        assert!(!k.fixes_level());
    }

    #[test]
    fn test_zero_gradient_default() {
        assert_eq!(BoundaryKind::default(), BoundaryKind::ZeroGradient);
        assert_eq!(BoundaryKind::Calculated.gradient_coeffs(1.0, 1.0, 1.0), (0.0, 0.0));
    }
}
