// crates/sf_physics/src/thermo/eos.rs

//! 状态方程
//!
//! 每个状态方程给出密度 `ρ(p, T)` 与压缩性 `ψ = ∂ρ/∂p|_T`。

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use sf_foundation::{SfError, SfResult};

/// 状态方程 trait
pub trait EquationOfState: Send + Sync + Debug {
    /// 名称
    fn name(&self) -> &'static str;

    /// 密度 [kg/m³]
    fn rho(&self, p: f64, t: f64) -> f64;

    /// 压缩性 [s²/m²]
    fn psi(&self, p: f64, t: f64) -> f64;
}

/// 理想气体 `ρ = p/(R T)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerfectGas {
    /// 气体常数 [J/(kg·K)]
    pub r: f64,
}

impl PerfectGas {
    /// 空气
    pub const AIR: Self = Self { r: 287.0 };

    /// 创建理想气体
    pub fn new(r: f64) -> SfResult<Self> {
        SfError::check_range("gas constant", r, f64::MIN_POSITIVE, f64::INFINITY)?;
        Ok(Self { r })
    }
}

impl EquationOfState for PerfectGas {
    fn name(&self) -> &'static str {
        "perfectGas"
    }

    #[inline]
    fn rho(&self, p: f64, t: f64) -> f64 {
        p / (self.r * t)
    }

    #[inline]
    fn psi(&self, _p: f64, t: f64) -> f64 {
        1.0 / (self.r * t)
    }
}

/// 线性压缩流体 `ρ = ρ₀ + ψ (p − p₀)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearCompressibility {
    /// 参考密度
    pub rho0: f64,
    /// 参考压力
    pub p0: f64,
    /// 常压缩性
    pub psi: f64,
}

impl EquationOfState for LinearCompressibility {
    fn name(&self) -> &'static str {
        "linear"
    }

    #[inline]
    fn rho(&self, p: f64, _t: f64) -> f64 {
        self.rho0 + self.psi * (p - self.p0)
    }

    #[inline]
    fn psi(&self, _p: f64, _t: f64) -> f64 {
        self.psi
    }
}

/// 不可压理想气体：密度只随温度变化，`ρ = p_ref/(R T)`，`ψ = 0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncompressiblePerfectGas {
    /// 气体常数
    pub r: f64,
    /// 参考压力
    pub p_ref: f64,
}

impl EquationOfState for IncompressiblePerfectGas {
    fn name(&self) -> &'static str {
        "incompressiblePerfectGas"
    }

    #[inline]
    fn rho(&self, _p: f64, t: f64) -> f64 {
        self.p_ref / (self.r * t)
    }

    #[inline]
    fn psi(&self, _p: f64, _t: f64) -> f64 {
        0.0
    }
}
