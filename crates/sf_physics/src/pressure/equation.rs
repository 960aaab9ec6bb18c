// crates/sf_physics/src/pressure/equation.rs

//! 压力方程组装
//!
//! | 类型 | 方程 | 守恒通量 |
//! |------|------|----------|
//! | 不可压 / 浮力 | `∇·(rAUf ∇p) = Σ phiHbyA` | `phiHbyA − flux` |
//! | 可压稳态 | `Σ phiHbyA [+ ∇·(phid p)] − ∇·(ρrAUf ∇p) = S` | `phiHbyA + flux` |
//! | 可压瞬态 | 上式加 `∂(ψp)/∂t` 与 `∂ρ/∂t − ∂(ψp)/∂t` 显式余项 | `phiHbyA + flux` |
//!
//! 其中 `flux` 为矩阵给出的面通量，`S` 为 fvOptions 质量源。

use sf_foundation::SfError;

use super::context::EquationKind;
use super::error::{PressureError, PressureResult};
use super::predictor::FluxPrediction;
use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;
use crate::numerics::{fvc, fvm, FvMatrix};

/// 可压方程的附加输入
#[derive(Debug, Clone, Copy)]
pub struct CompressibleTerms<'a> {
    /// 压缩系数 ψ
    pub psi: &'a VolScalarField,
    /// 当前密度（含上一时间步值）
    pub rho: &'a VolScalarField,
    /// 每个单元的质量源（积分形式）
    pub mass_source: &'a [f64],
    /// 时间步长（仅瞬态使用）
    pub delta_t: f64,
}

/// 已组装的压力方程
#[derive(Debug, Clone)]
pub struct PressureEquation {
    kind: EquationKind,
    matrix: FvMatrix,
    /// 守恒通量中矩阵通量的符号
    flux_sign: f64,
}

impl PressureEquation {
    /// 按方程类型组装
    ///
    /// `p` 为求解变量（浮力为 `p_rgh`），其边界条件已由预测阶段约束。
    /// 可压类型必须提供 `terms`。
    pub fn build(
        kind: EquationKind,
        mesh: &FvMesh,
        prediction: &FluxPrediction,
        p: &VolScalarField,
        terms: Option<CompressibleTerms<'_>>,
    ) -> PressureResult<Self> {
        let laplacian = fvm::laplacian(mesh, prediction.r_auf.values(), p)?;
        let div_phi_hby_a = fvc::surface_sum(mesh, prediction.phi_hby_a.values());

        let (matrix, flux_sign) = match kind {
            EquationKind::Incompressible | EquationKind::Buoyant => (laplacian.equals(&div_phi_hby_a)?, -1.0),

            EquationKind::CompressibleSteady { .. } | EquationKind::CompressibleTransient { .. } => {
                let terms = terms.ok_or(PressureError::MissingInput("compressible terms"))?;
                let mut matrix = laplacian.negate().add_explicit(&div_phi_hby_a)?;
                if let Some(phid) = &prediction.phid {
                    matrix = matrix.add(fvm::div(mesh, phid.values(), p)?)?;
                }
                if let EquationKind::CompressibleTransient { .. } = kind {
                    matrix = matrix
                        .add(fvm::ddt(mesh, terms.psi, p, terms.delta_t)?)?
                        .add_explicit(&density_residual(mesh, &terms, p)?)?;
                }
                (matrix.equals(terms.mass_source)?, 1.0)
            }
        };

        Ok(Self {
            kind,
            matrix,
            flux_sign,
        })
    }

    /// 方程类型
    pub fn kind(&self) -> EquationKind {
        self.kind
    }

    /// 方程矩阵
    pub fn matrix(&self) -> &FvMatrix {
        &self.matrix
    }

    /// 方程矩阵（可变，用于松弛、参考单元与非正交刷新）
    pub fn matrix_mut(&mut self) -> &mut FvMatrix {
        &mut self.matrix
    }

    /// 矩阵面通量
    pub fn flux(&self, mesh: &FvMesh, p: &VolScalarField) -> PressureResult<SurfaceScalarField> {
        Ok(self.matrix.flux(mesh, p)?)
    }

    /// 守恒通量 `phiHbyA ± flux`
    pub fn conservative_flux(
        &self,
        mesh: &FvMesh,
        phi_hby_a: &SurfaceScalarField,
        p: &VolScalarField,
    ) -> PressureResult<SurfaceScalarField> {
        let flux = self.flux(mesh, p)?;
        let mut phi = phi_hby_a.clone().renamed("phi");
        for (v, f) in phi.values_mut().iter_mut().zip(flux.values()) {
            *v += self.flux_sign * f;
        }
        Ok(phi)
    }
}

/// `V·((ρ − ψp) − (ρ⁰ − ψ⁰p⁰))/Δt`
fn density_residual(mesh: &FvMesh, terms: &CompressibleTerms<'_>, p: &VolScalarField) -> PressureResult<Vec<f64>> {
    SfError::check_size("rho", mesh.n_cells(), terms.rho.internal().len())?;
    SfError::check_size("psi", mesh.n_cells(), terms.psi.internal().len())?;
    let (rho, rho_old) = (terms.rho.internal(), terms.rho.old_time());
    let (psi, psi_old) = (terms.psi.internal(), terms.psi.old_time());
    let (x, x_old) = (p.internal(), p.old_time());
    Ok(mesh
        .cell_volumes()
        .iter()
        .enumerate()
        .map(|(i, vol)| vol * ((rho[i] - psi[i] * x[i]) - (rho_old[i] - psi_old[i] * x_old[i])) / terms.delta_t)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BoundaryKind, VolVectorField};
    use crate::mesh::MeshBuilder;
    use glam::DVec3;
    use sf_config::LinearSolverConfig;

    fn prediction(mesh: &FvMesh, phi: f64) -> FluxPrediction {
        let mut phi_hby_a = SurfaceScalarField::new("phiHbyA", mesh, 0.0);
        for f in mesh.internal_faces() {
            phi_hby_a.values_mut()[f] = phi;
        }
        FluxPrediction {
            r_au: vec![1.0; mesh.n_cells()],
            hby_a: VolVectorField::new("HbyA", mesh, DVec3::ZERO),
            r_auf: SurfaceScalarField::new("rAUf", mesh, 1.0),
            phi_hby_a,
            phid: None,
            phig: None,
            closed_volume: false,
        }
    }

    #[test]
    fn test_incompressible_flux_is_divergence_free() {
        let mesh = MeshBuilder::channel(4, 2, 4.0, 1.0).unwrap();
        let mut p = VolScalarField::new("p", &mesh, 0.0)
            .with_patch(&mesh, "outlet", BoundaryKind::FixedValue, 0.0)
            .unwrap();
        let mut pred = prediction(&mesh, 0.0);
        let inlet = mesh.find_patch("inlet").unwrap();
        for f in mesh.patches()[inlet].faces() {
            pred.phi_hby_a.values_mut()[f] = -0.5;
        }
        let mut eq = PressureEquation::build(EquationKind::Incompressible, &mesh, &pred, &p, None).unwrap();
        eq.matrix_mut().solve(&mesh, &mut p, &LinearSolverConfig::default()).unwrap();
        let phi = eq.conservative_flux(&mesh, &pred.phi_hby_a, &p).unwrap();
        let div = fvc::div(&mesh, phi.values());
        assert!(div.iter().all(|d| d.abs() < 1e-8), "{div:?}");
    }

    #[test]
    fn test_compressible_requires_terms() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let p = VolScalarField::new("p", &mesh, 1e5);
        let pred = prediction(&mesh, 0.0);
        let kind = EquationKind::CompressibleSteady { transonic: false };
        assert!(PressureEquation::build(kind, &mesh, &pred, &p, None).is_err());
    }

    #[test]
    fn test_transient_residual_vanishes_for_perfect_gas() {
        let mesh = MeshBuilder::channel(3, 1, 3.0, 1.0).unwrap();
        let psi_value = 1.0 / (287.0 * 300.0);
        let mut p = VolScalarField::new("p", &mesh, 1e5);
        let mut psi = VolScalarField::new("psi", &mesh, psi_value);
        let mut rho = VolScalarField::new("rho", &mesh, 1e5 * psi_value);
        p.store_old_time();
        psi.store_old_time();
        rho.store_old_time();
        p.internal_mut()[1] = 1.1e5;
        rho.internal_mut()[1] = 1.1e5 * psi_value;
        let terms = CompressibleTerms {
            psi: &psi,
            rho: &rho,
            mass_source: &[0.0; 3],
            delta_t: 1e-3,
        };
        let r = density_residual(&mesh, &terms, &p).unwrap();
        assert!(r.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_compressible_flux_sign() {
        // 均匀压力：矩阵通量只含边界项，phi = phiHbyA
        let mesh = MeshBuilder::channel(3, 1, 3.0, 1.0).unwrap();
        let p = VolScalarField::new("p", &mesh, 1e5)
            .with_patch(&mesh, "outlet", BoundaryKind::FixedValue, 1e5)
            .unwrap();
        let psi = VolScalarField::new("psi", &mesh, 0.0);
        let rho = VolScalarField::new("rho", &mesh, 1.0);
        let pred = prediction(&mesh, 2.0);
        let terms = CompressibleTerms {
            psi: &psi,
            rho: &rho,
            mass_source: &[0.0; 3],
            delta_t: 1.0,
        };
        let kind = EquationKind::CompressibleSteady { transonic: false };
        let eq = PressureEquation::build(kind, &mesh, &pred, &p, Some(terms)).unwrap();
        let phi = eq.conservative_flux(&mesh, &pred.phi_hby_a, &p).unwrap();
        for f in mesh.internal_faces() {
            assert!((phi.values()[f] - 2.0).abs() < 1e-12);
        }
        assert_eq!(eq.kind(), kind);
        assert!(!eq.matrix().is_asymmetric());
    }
}
