// crates/sf_physics/src/pressure/closed_volume.rs

//! 闭域质量修正
//!
//! 闭域中边界不固定压力水平，压力方程解出的绝对压力会漂移。每次外
//! 迭代在最后一次求解后平移压力，使 `∫ψp dV` 等于初始质量：
//!
//! ```text
//! p += (M0 − ∫ψp dV) / ∫ψ dV
//! ```

use serde::Serialize;

use sf_foundation::SMALL;

use crate::fields::VolScalarField;
use crate::mesh::FvMesh;
use crate::numerics::fvc;

/// 初始质量，只写一次
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InitialMass(Option<f64>);

impl InitialMass {
    /// 未捕获
    pub fn new() -> Self {
        Self(None)
    }

    /// 已知值
    pub fn fixed(value: f64) -> Self {
        Self(Some(value))
    }

    /// 当前值
    pub fn get(&self) -> Option<f64> {
        self.0
    }

    /// 首次调用时写入 `capture()` 的结果，之后保持不变
    pub fn get_or_capture<F: FnOnce() -> f64>(&mut self, capture: F) -> f64 {
        *self.0.get_or_insert_with(capture)
    }
}

/// `∫ψp dV`
pub fn mass_integral(mesh: &FvMesh, psi: &VolScalarField, p: &VolScalarField) -> f64 {
    let psi_p: Vec<f64> = psi.internal().iter().zip(p.internal()).map(|(a, b)| a * b).collect();
    fvc::domain_integrate(mesh, &psi_p)
}

/// 平移压力使 `∫ψp dV = target`，返回平移量
///
/// 单元值与边界值整体平移。`∫ψ dV` 不大于 `SMALL`（不可压缩介质）时
/// 无法确定平移量，返回 `None` 且不修改压力。
pub fn correct_closed_volume(mesh: &FvMesh, p: &mut VolScalarField, psi: &VolScalarField, target: f64) -> Option<f64> {
    let psi_total = fvc::domain_integrate(mesh, psi.internal());
    if psi_total <= SMALL {
        log::debug!("闭域修正跳过: ∫ψ dV = {:.3e}", psi_total);
        return None;
    }

    let shift = (target - mass_integral(mesh, psi, p)) / psi_total;
    p.internal_mut().iter_mut().for_each(|v| *v += shift);
    p.boundary_mut().iter_mut().for_each(|v| *v += shift);
    p.correct_boundary_conditions(mesh);
    log::debug!("闭域修正: {} 平移 {:.6e}", p.name(), shift);
    Some(shift)
}
