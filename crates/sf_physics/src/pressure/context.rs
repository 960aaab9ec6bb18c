// crates/sf_physics/src/pressure/context.rs

//! 压力修正的场上下文与方程类型
//!
//! [`FlowFields`] 把一次外迭代中被修正的全部场打包，按引用依次传给
//! 各阶段函数。[`EquationKind`] 在运行开始时选定，决定各阶段的分支。

use glam::DVec3;
use serde::{Deserialize, Serialize};
use sf_config::PressureControls;
use sf_foundation::SfError;

use super::error::{PressureError, PressureResult};
use crate::fields::{SurfaceScalarField, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;

/// 压力方程类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EquationKind {
    /// 不可压稳态 SIMPLE
    Incompressible,
    /// 可压瞬态 PISO
    CompressibleTransient {
        /// 跨音速（对流型）形式
        transonic: bool,
    },
    /// 可压稳态 SIMPLE
    CompressibleSteady {
        /// 跨音速（对流型）形式
        transonic: bool,
    },
    /// 浮力驱动稳态 SIMPLE（求解 p_rgh）
    Buoyant,
}

impl EquationKind {
    /// 可压稳态，跨音速开关取自配置
    pub fn compressible_steady(controls: &PressureControls) -> Self {
        EquationKind::CompressibleSteady {
            transonic: controls.transonic,
        }
    }

    /// 可压瞬态，跨音速开关取自配置
    pub fn compressible_transient(controls: &PressureControls) -> Self {
        EquationKind::CompressibleTransient {
            transonic: controls.transonic,
        }
    }

    /// 稳态算法
    pub fn is_steady(self) -> bool {
        !matches!(self, EquationKind::CompressibleTransient { .. })
    }

    /// 跨音速形式
    pub fn is_transonic(self) -> bool {
        matches!(
            self,
            EquationKind::CompressibleTransient { transonic: true }
                | EquationKind::CompressibleSteady { transonic: true }
        )
    }

    /// 需要密度场与热物性
    pub fn needs_thermo(self) -> bool {
        !matches!(self, EquationKind::Incompressible)
    }

    /// 求解变量名
    pub fn solved_field(self) -> &'static str {
        match self {
            EquationKind::Buoyant => "p_rgh",
            _ => "p",
        }
    }

    /// 求解前对方程矩阵做隐式松弛（跨音速的迎风对流项已保证对角占优）
    pub fn relaxes_equation(self) -> bool {
        matches!(self, EquationKind::CompressibleSteady { transonic: false })
    }

    /// 密度阶段做松弛（跨音速不松弛）
    pub fn relaxes_density(self) -> bool {
        matches!(self, EquationKind::CompressibleSteady { transonic: false } | EquationKind::Buoyant)
    }

    /// 调用出流调整并据此判断闭域
    pub fn adjusts_flux(self) -> bool {
        matches!(
            self,
            EquationKind::Incompressible
                | EquationKind::CompressibleSteady { transonic: false }
                | EquationKind::Buoyant
        )
    }

    /// 每次调用的压力修正次数
    pub fn n_correctors(self, configured: usize) -> usize {
        if self.is_steady() {
            1
        } else {
            configured.max(1)
        }
    }
}

/// 被修正的场集合
#[derive(Debug, Clone)]
pub struct FlowFields {
    /// 压力（可压为绝对压力）
    pub p: VolScalarField,
    /// 速度
    pub u: VolVectorField,
    /// 面通量（不可压为体积通量，可压与浮力为质量通量）
    pub phi: SurfaceScalarField,
    /// 密度
    pub rho: Option<VolScalarField>,
    /// 去除静水压力的压力
    pub p_rgh: Option<VolScalarField>,
    /// 动能 `½|U|²`（仅瞬态）
    pub kinetic_energy: Option<Vec<f64>>,
}

impl FlowFields {
    /// 不可压场集合
    pub fn incompressible(p: VolScalarField, u: VolVectorField, phi: SurfaceScalarField) -> Self {
        Self {
            p,
            u,
            phi,
            rho: None,
            p_rgh: None,
            kinetic_energy: None,
        }
    }

    /// 可压场集合
    pub fn compressible(p: VolScalarField, u: VolVectorField, phi: SurfaceScalarField, rho: VolScalarField) -> Self {
        let kinetic_energy = Some(kinetic_energy(&u));
        Self {
            p,
            u,
            phi,
            rho: Some(rho),
            p_rgh: None,
            kinetic_energy,
        }
    }

    /// 浮力场集合
    pub fn buoyant(
        p: VolScalarField,
        p_rgh: VolScalarField,
        u: VolVectorField,
        phi: SurfaceScalarField,
        rho: VolScalarField,
    ) -> Self {
        Self {
            p,
            u,
            phi,
            rho: Some(rho),
            p_rgh: Some(p_rgh),
            kinetic_energy: None,
        }
    }

    /// 检查场尺寸以及方程类型所需的场
    pub fn validate(&self, mesh: &FvMesh, kind: EquationKind) -> PressureResult<()> {
        SfError::check_size("p", mesh.n_cells(), self.p.internal().len())?;
        SfError::check_size("U", mesh.n_cells(), self.u.internal().len())?;
        SfError::check_size("phi", mesh.n_faces(), self.phi.values().len())?;
        if kind.needs_thermo() {
            let rho = self.rho.as_ref().ok_or(PressureError::MissingInput("rho"))?;
            SfError::check_size("rho", mesh.n_cells(), rho.internal().len())?;
        }
        if kind == EquationKind::Buoyant {
            let p_rgh = self.p_rgh.as_ref().ok_or(PressureError::MissingInput("p_rgh"))?;
            SfError::check_size("p_rgh", mesh.n_cells(), p_rgh.internal().len())?;
        }
        Ok(())
    }

    /// 保存上一时间步值
    pub fn store_old_time(&mut self) {
        self.p.store_old_time();
        self.u.store_old_time();
        self.phi.store_old_time();
        if let Some(rho) = &mut self.rho {
            rho.store_old_time();
        }
    }

    /// 求解变量
    pub fn solved_mut(&mut self, kind: EquationKind) -> PressureResult<&mut VolScalarField> {
        match kind {
            EquationKind::Buoyant => self.p_rgh.as_mut().ok_or(PressureError::MissingInput("p_rgh")),
            _ => Ok(&mut self.p),
        }
    }

    /// 求解变量（只读）
    pub fn solved(&self, kind: EquationKind) -> PressureResult<&VolScalarField> {
        match kind {
            EquationKind::Buoyant => self.p_rgh.as_ref().ok_or(PressureError::MissingInput("p_rgh")),
            _ => Ok(&self.p),
        }
    }

    /// 密度
    pub fn rho(&self) -> PressureResult<&VolScalarField> {
        self.rho.as_ref().ok_or(PressureError::MissingInput("rho"))
    }
}

/// 动能 `½|U|²`
pub fn kinetic_energy(u: &VolVectorField) -> Vec<f64> {
    u.internal().iter().map(|v: &DVec3| 0.5 * v.length_squared()).collect()
}
