// crates/sf_physics/src/pressure/continuity.rs

//! 连续性误差
//!
//! - 体积/质量通量形式：`Δt·⟨|∇·φ|⟩` 与 `Δt·⟨∇·φ⟩`（稳态 `Δt = 1`）
//! - 可压瞬态形式：密度连续性方程的 `ρ` 与状态方程 `ρ` 之差，按总质量归一
//!
//! 全局误差逐次累加为累计误差。

use serde::Serialize;

use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;
use crate::numerics::fvc;

/// 一次修正后的连续性误差
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContinuityErrors {
    /// 局部误差和
    pub sum_local: f64,
    /// 全局误差
    pub global: f64,
    /// 累计全局误差
    pub cumulative: f64,
}

/// 累计误差跟踪
#[derive(Debug, Clone, Copy, Default)]
pub struct ContinuityTracker {
    cumulative: f64,
}

impl ContinuityTracker {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前累计误差
    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }

    /// 由通量散度计算
    pub fn from_flux(&mut self, mesh: &FvMesh, phi: &SurfaceScalarField, delta_t: f64) -> ContinuityErrors {
        let cont_err = fvc::div(mesh, phi.values());
        let total_volume = mesh.total_volume();
        let abs_err: Vec<f64> = cont_err.iter().map(|v| v.abs()).collect();
        let sum_local = delta_t * fvc::domain_integrate(mesh, &abs_err) / total_volume;
        let global = delta_t * fvc::domain_integrate(mesh, &cont_err) / total_volume;
        self.record(sum_local, global)
    }

    /// 由密度连续性方程的 `ρ` 与状态方程 `ρ` 计算
    pub fn from_density(&mut self, mesh: &FvMesh, rho: &VolScalarField, thermo_rho: &VolScalarField) -> ContinuityErrors {
        let total_mass = fvc::domain_integrate(mesh, rho.internal());
        let diff: Vec<f64> = rho.internal().iter().zip(thermo_rho.internal()).map(|(a, b)| a - b).collect();
        let abs_diff: Vec<f64> = diff.iter().map(|v| v.abs()).collect();
        let sum_local = fvc::domain_integrate(mesh, &abs_diff) / total_mass;
        let global = fvc::domain_integrate(mesh, &diff) / total_mass;
        self.record(sum_local, global)
    }

    fn record(&mut self, sum_local: f64, global: f64) -> ContinuityErrors {
        self.cumulative += global;
        let errors = ContinuityErrors {
            sum_local,
            global,
            cumulative: self.cumulative,
        };
        log::info!(
            "time step continuity errors : sum local = {:e}, global = {:e}, cumulative = {:e}",
            errors.sum_local,
            errors.global,
            errors.cumulative
        );
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_divergence_free_flux() {
        let mesh = MeshBuilder::channel(3, 1, 3.0, 1.0).unwrap();
        let values = (0..mesh.n_faces()).map(|f| mesh.sf(f).x).collect();
        let phi = SurfaceScalarField::from_values("phi", &mesh, values).unwrap();
        let mut tracker = ContinuityTracker::new();
        let e = tracker.from_flux(&mesh, &phi, 1.0);
        assert!(e.sum_local.abs() < 1e-14 && e.global.abs() < 1e-14);
    }

    #[test]
    fn test_cumulative_accumulates() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut phi = SurfaceScalarField::new("phi", &mesh, 0.0);
        let outlet = mesh.patches()[mesh.find_patch("outlet").unwrap()].start;
        phi.values_mut()[outlet] = 0.2;
        let mut tracker = ContinuityTracker::new();
        let e1 = tracker.from_flux(&mesh, &phi, 0.5);
        // 总体积 2，净流出 0.2
        assert!((e1.global - 0.05).abs() < 1e-14);
        assert!((e1.sum_local - 0.05).abs() < 1e-14);
        let e2 = tracker.from_flux(&mesh, &phi, 0.5);
        assert!((e2.cumulative - 0.1).abs() < 1e-14);
        assert_eq!(tracker.cumulative(), e2.cumulative);
    }

    #[test]
    fn test_density_errors() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let rho = VolScalarField::from_values("rho", &mesh, vec![1.0, 1.0]).unwrap();
        let thermo_rho = VolScalarField::from_values("thermo:rho", &mesh, vec![0.9, 1.1]).unwrap();
        let mut tracker = ContinuityTracker::new();
        let e = tracker.from_density(&mesh, &rho, &thermo_rho);
        assert!((e.sum_local - 0.1).abs() < 1e-12);
        assert!(e.global.abs() < 1e-12);
    }
}
