// crates/sf_foundation/src/scalar.rs

//! 统一标量类型
//!
//! 压力-速度耦合对舍入误差敏感（参考单元锚定、闭域质量修正都依赖
//! 全域积分的精确抵消），因此只提供双精度。

/// 计算用标量类型
pub type Scalar = f64;

/// 小量，用于相对比较和防止除零
pub const SMALL: Scalar = 1e-15;

/// 极小量，用于绝对比较
pub const VSMALL: Scalar = 1e-300;

/// 安全除法：分母绝对值小于 [`VSMALL`] 时返回 `fallback`
#[inline]
pub fn safe_div(num: Scalar, den: Scalar, fallback: Scalar) -> Scalar {
    if den.abs() < VSMALL {
        fallback
    } else {
        num / den
    }
}
