// crates/sf_physics/src/pressure/density.rs

//! 密度阶段
//!
//! 压力修正后由状态方程重算密度，截断到 `[rho_min, rho_max]` 并按
//! 需要松弛。截断说明解已偏离物理范围：每次都记录警告，按策略在
//! 连续多次截断后报错。瞬态方程另有密度连续性方程 [`solve_density_continuity`]。

use serde::Serialize;
use sf_config::{ClipPolicy, DensityLimits};
use sf_foundation::SfError;

use super::error::{PressureError, PressureResult};
use crate::fields::{SurfaceScalarField, VolScalarField};
use crate::mesh::FvMesh;
use crate::numerics::fvc;

/// 一次密度阶段的结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityReport {
    /// 最大密度
    pub max: f64,
    /// 最小密度
    pub min: f64,
    /// 被截断的单元数
    pub n_clipped: usize,
}

/// 密度截断与松弛
#[derive(Debug, Clone)]
pub struct DensityStage {
    limits: DensityLimits,
    clipped_this_iteration: usize,
    consecutive_clipped: usize,
}

impl DensityStage {
    /// 创建
    pub fn new(limits: DensityLimits) -> Self {
        Self {
            limits,
            clipped_this_iteration: 0,
            consecutive_clipped: 0,
        }
    }

    /// 连续出现截断的外迭代数
    pub fn consecutive_clipped(&self) -> usize {
        self.consecutive_clipped
    }

    /// 截断单元值与边界值，返回被截断的单元数
    pub fn clip(&mut self, rho: &mut VolScalarField) -> usize {
        let (lo, hi) = (self.limits.rho_min, self.limits.rho_max);
        let mut n_clipped = 0;
        for v in rho.internal_mut() {
            if *v < lo || *v > hi {
                *v = v.clamp(lo, hi);
                n_clipped += 1;
            }
        }
        for v in rho.boundary_mut() {
            *v = v.clamp(lo, hi);
        }
        if n_clipped > 0 {
            log::warn!(
                "{}: {} 个单元超出 [{}, {}]，已截断（解可能正在发散）",
                rho.name(),
                n_clipped,
                lo,
                hi
            );
        }
        self.clipped_this_iteration += n_clipped;
        n_clipped
    }

    /// 用状态方程密度覆盖当前密度（保留时间层与迭代层），随后截断
    pub fn assign_from_eos(&mut self, rho: &mut VolScalarField, eos_rho: &VolScalarField) -> PressureResult<usize> {
        SfError::check_size("rho", rho.internal().len(), eos_rho.internal().len())?;
        rho.internal_mut().copy_from_slice(eos_rho.internal());
        rho.boundary_mut().copy_from_slice(eos_rho.boundary());
        Ok(self.clip(rho))
    }

    /// 稳态密度阶段：状态方程 → 截断 → 松弛（可选）→ 再次限界
    ///
    /// 松弛以 `rho` 的上一次迭代值为基准，调用前须已保存。
    pub fn update(
        &mut self,
        rho: &mut VolScalarField,
        eos_rho: &VolScalarField,
        relax: Option<f64>,
    ) -> PressureResult<DensityReport> {
        let n_clipped = self.assign_from_eos(rho, eos_rho)?;
        if let Some(alpha) = relax {
            rho.relax_with(alpha);
        }
        let (lo, hi) = (self.limits.rho_min, self.limits.rho_max);
        rho.internal_mut().iter_mut().for_each(|v| *v = v.clamp(lo, hi));
        rho.boundary_mut().iter_mut().for_each(|v| *v = v.clamp(lo, hi));

        let report = DensityReport {
            max: rho.max(),
            min: rho.min(),
            n_clipped,
        };
        log::info!("rho max/min : {} {}", report.max, report.min);
        Ok(report)
    }

    /// 结束一次外迭代，按策略检查持续截断
    pub fn finish_iteration(&mut self) -> PressureResult<()> {
        if self.clipped_this_iteration > 0 {
            self.consecutive_clipped += 1;
        } else {
            self.consecutive_clipped = 0;
        }
        self.clipped_this_iteration = 0;

        if let ClipPolicy::FatalAfter { iterations } = self.limits.clip_policy {
            if self.consecutive_clipped >= iterations {
                return Err(PressureError::PersistentDensityClipping {
                    iterations: self.consecutive_clipped,
                });
            }
        }
        Ok(())
    }
}

/// 密度连续性方程（显式 Euler）
///
/// `ρ = ρ⁰ − Δt/V·(Σφ − S)`，`S` 为每个单元的质量源（积分形式）。
/// 边界值按零梯度更新。
pub fn solve_density_continuity(
    mesh: &FvMesh,
    rho: &mut VolScalarField,
    phi: &SurfaceScalarField,
    mass_source: &[f64],
    delta_t: f64,
) -> PressureResult<()> {
    SfError::check_size("mass source", mesh.n_cells(), mass_source.len())?;
    let net = fvc::surface_sum(mesh, phi.values());
    let values: Vec<f64> = rho
        .old_time()
        .iter()
        .zip(&net)
        .zip(mass_source)
        .zip(mesh.cell_volumes())
        .map(|(((r0, n), s), v)| r0 - delta_t / v * (n - s))
        .collect();
    rho.assign(values)?;
    for f in mesh.boundary_faces() {
        if !rho.face_kind(mesh, f).fixes_level() {
            rho.boundary_mut()[mesh.boundary_index(f)] = rho.internal()[mesh.owner(f)];
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    fn limits(policy: ClipPolicy) -> DensityLimits {
        DensityLimits {
            rho_min: 0.5,
            rho_max: 2.0,
            clip_policy: policy,
        }
    }

    #[test]
    fn test_clip_counts_and_bounds() {
        let mesh = MeshBuilder::channel(4, 1, 4.0, 1.0).unwrap();
        let mut stage = DensityStage::new(limits(ClipPolicy::Warn));
        let mut rho = VolScalarField::from_values("rho", &mesh, vec![0.1, 1.0, 3.0, 1.5]).unwrap();
        assert_eq!(stage.clip(&mut rho), 2);
        assert_eq!(rho.internal(), &[0.5, 1.0, 2.0, 1.5]);
        assert!(rho.boundary().iter().all(|&v| (0.5..=2.0).contains(&v)));
    }

    #[test]
    fn test_update_relaxes_within_bounds() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut stage = DensityStage::new(limits(ClipPolicy::Warn));
        let mut rho = VolScalarField::new("rho", &mesh, 1.0);
        rho.store_prev_iter();
        let eos = VolScalarField::from_values("thermo:rho", &mesh, vec![1.8, 5.0]).unwrap();
        let report = stage.update(&mut rho, &eos, Some(0.5)).unwrap();
        assert!((rho.internal()[0] - 1.4).abs() < 1e-12);
        assert!((rho.internal()[1] - 1.5).abs() < 1e-12);
        assert_eq!(report.n_clipped, 1);
        assert_eq!(report.max, 1.5);
        // 边界值与单元值一同松弛
        for f in mesh.boundary_faces() {
            assert!((rho.boundary_value(&mesh, f) - rho.internal()[mesh.owner(f)]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_fatal_after_consecutive_clipping() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut stage = DensityStage::new(limits(ClipPolicy::FatalAfter { iterations: 2 }));
        let mut rho = VolScalarField::new("rho", &mesh, 10.0);
        stage.clip(&mut rho);
        assert!(stage.finish_iteration().is_ok());
        // 中间一次没有截断，计数清零
        stage.finish_iteration().unwrap();
        assert_eq!(stage.consecutive_clipped(), 0);

        let mut rho = VolScalarField::new("rho", &mesh, 10.0);
        stage.clip(&mut rho);
        stage.finish_iteration().unwrap();
        let mut rho = VolScalarField::new("rho", &mesh, 0.0);
        stage.clip(&mut rho);
        assert!(matches!(
            stage.finish_iteration(),
            Err(PressureError::PersistentDensityClipping { iterations: 2 })
        ));
    }

    #[test]
    fn test_density_continuity() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut rho = VolScalarField::new("rho", &mesh, 1.0);
        rho.store_old_time();
        let mut phi = SurfaceScalarField::new("phi", &mesh, 0.0);
        // 单元 0 净流出 0.5
        phi.values_mut()[0] = 0.5;
        solve_density_continuity(&mesh, &mut rho, &phi, &[0.0, 0.0], 0.1).unwrap();
        assert!((rho.internal()[0] - 0.95).abs() < 1e-12);
        assert!((rho.internal()[1] - 1.05).abs() < 1e-12);
    }
}
