// crates/sf_physics/src/momentum.rs

//! 动量方程的 A/H 分解
//!
//! 压力修正只需要动量矩阵的两部分：
//! - `A`: 对角系数（单位体积）
//! - `H(U)`: 非对角项与显式源项之和（单位体积，不含压力梯度）
//!
//! 动量方程的组装本身在压力修正之外完成，[`MomentumSystem`] 只暴露
//! 这两部分。PISO 修正中 `H` 需要按最新速度重算。

use glam::DVec3;
use sf_foundation::{SfError, SfResult};

use crate::fields::VolVectorField;
use crate::mesh::FvMesh;

/// 动量方程分解接口
pub trait MomentumSystem {
    /// 对角系数 `A`（单位体积）
    fn a(&self) -> &[f64];

    /// `H(U)`（单位体积）
    fn h(&self, mesh: &FvMesh, u: &VolVectorField) -> Vec<DVec3>;
}

/// 固定的 A 与 H
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenMomentum {
    a: Vec<f64>,
    h: Vec<DVec3>,
}

impl FrozenMomentum {
    /// 由 A、H 创建
    pub fn new(a: Vec<f64>, h: Vec<DVec3>) -> SfResult<Self> {
        SfError::check_size("FrozenMomentum H", a.len(), h.len())?;
        Ok(Self { a, h })
    }

    /// 均匀 A，H 为零
    pub fn uniform(n_cells: usize, a: f64) -> Self {
        Self {
            a: vec![a; n_cells],
            h: vec![DVec3::ZERO; n_cells],
        }
    }
}

impl MomentumSystem for FrozenMomentum {
    fn a(&self) -> &[f64] {
        &self.a
    }

    fn h(&self, _mesh: &FvMesh, _u: &VolVectorField) -> Vec<DVec3> {
        self.h.clone()
    }
}

/// LDU 形式的动量矩阵
///
/// 对称非对角系数 `off[f]`，`H = (source − Σ off·U_nb)/V`。
#[derive(Debug, Clone, PartialEq)]
pub struct LduMomentum {
    a: Vec<f64>,
    off: Vec<f64>,
    source: Vec<DVec3>,
    volumes: Vec<f64>,
}

impl LduMomentum {
    /// 由系数直接创建（`diag`、`source` 为积分形式）
    pub fn new(mesh: &FvMesh, diag: Vec<f64>, off: Vec<f64>, source: Vec<DVec3>) -> SfResult<Self> {
        SfError::check_size("LduMomentum diag", mesh.n_cells(), diag.len())?;
        SfError::check_size("LduMomentum off", mesh.n_internal_faces(), off.len())?;
        SfError::check_size("LduMomentum source", mesh.n_cells(), source.len())?;
        let volumes = mesh.cell_volumes().to_vec();
        let a = diag.iter().zip(&volumes).map(|(d, v)| d / v).collect();
        Ok(Self { a, off, source, volumes })
    }

    /// 粘性扩散加伪时间项的 Stokes 动量矩阵
    ///
    /// `ρ V/Δτ (U − U*) − ∇·(ν∇U)`，`U*` 取当前速度。固定值速度边界
    /// 进入对角与源项，其余边界按零梯度处理。
    pub fn stokes(mesh: &FvMesh, nu: f64, pseudo_dt: f64, rho: f64, u: &VolVectorField) -> SfResult<Self> {
        SfError::check_range("nu", nu, 0.0, f64::INFINITY)?;
        SfError::check_range("pseudo_dt", pseudo_dt, f64::MIN_POSITIVE, f64::INFINITY)?;

        let mut diag = vec![0.0; mesh.n_cells()];
        let mut off = vec![0.0; mesh.n_internal_faces()];
        let mut source = vec![DVec3::ZERO; mesh.n_cells()];

        for f in mesh.internal_faces() {
            let c = nu * mesh.mag_sf(f) * mesh.delta_coeff(f);
            diag[mesh.owner(f)] += c;
            diag[mesh.neighbour(f)] += c;
            off[f] = -c;
        }
        for f in mesh.boundary_faces() {
            if u.face_kind(mesh, f).fixes_level() {
                let c = nu * mesh.mag_sf(f) * mesh.delta_coeff(f);
                diag[mesh.owner(f)] += c;
                source[mesh.owner(f)] += u.boundary_value(mesh, f) * c;
            }
        }
        for (i, &vol) in mesh.cell_volumes().iter().enumerate() {
            let c = rho * vol / pseudo_dt;
            diag[i] += c;
            source[i] += u.internal()[i] * c;
        }
        Self::new(mesh, diag, off, source)
    }
}

impl MomentumSystem for LduMomentum {
    fn a(&self) -> &[f64] {
        &self.a
    }

    fn h(&self, mesh: &FvMesh, u: &VolVectorField) -> Vec<DVec3> {
        let x = u.internal();
        let mut h = self.source.clone();
        for f in mesh.internal_faces() {
            let (o, n) = (mesh.owner(f), mesh.neighbour(f));
            h[o] -= x[n] * self.off[f];
            h[n] -= x[o] * self.off[f];
        }
        for (hi, &v) in h.iter_mut().zip(&self.volumes) {
            *hi /= v;
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::BoundaryKind;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_uniform_velocity_is_fixed_point() {
        // 均匀速度场、速度边界同值时 H/A = U
        let mesh = MeshBuilder::channel(4, 2, 2.0, 1.0).unwrap();
        let u0 = DVec3::new(1.0, 0.0, 0.0);
        let u = VolVectorField::new("U", &mesh, u0)
            .with_patch(&mesh, "inlet", BoundaryKind::FixedValue, u0)
            .unwrap();
        let m = LduMomentum::stokes(&mesh, 0.1, 0.5, 1.0, &u).unwrap();
        let h = m.h(&mesh, &u);
        for (hi, ai) in h.iter().zip(m.a()) {
            assert!((*hi / *ai - u0).length() < 1e-12);
        }
    }

    #[test]
    fn test_frozen() {
        let m = FrozenMomentum::uniform(3, 2.0);
        assert_eq!(m.a(), &[2.0, 2.0, 2.0]);
        assert!(FrozenMomentum::new(vec![1.0], vec![]).is_err());
    }

    #[test]
    fn test_stokes_rejects_bad_input() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let u = VolVectorField::new("U", &mesh, DVec3::ZERO);
        assert!(LduMomentum::stokes(&mesh, -1.0, 1.0, 1.0, &u).is_err());
        assert!(LduMomentum::stokes(&mesh, 1.0, 0.0, 1.0, &u).is_err());
    }
}
