// crates/sf_physics/src/pressure/hydrostatic.rs

//! 静水压力分量
//!
//! `gh = g·x − ghRef`，`ghRef = −|g|·hRef`，`p = p_rgh + ρ·gh`。

use glam::DVec3;
use sf_config::BuoyancyConfig;

use crate::fields::VolScalarField;
use crate::mesh::FvMesh;

/// 单元、边界面和所有面上的 `g·h`
#[derive(Debug, Clone, PartialEq)]
pub struct Hydrostatic {
    gravity: DVec3,
    gh: Vec<f64>,
    gh_boundary: Vec<f64>,
    ghf: Vec<f64>,
}

impl Hydrostatic {
    /// 由重力与参考高度计算
    pub fn new(mesh: &FvMesh, config: &BuoyancyConfig) -> Self {
        let g = DVec3::from_array(config.gravity);
        let gh_ref = -g.length() * config.h_ref;
        let gh = mesh.cell_centres().iter().map(|c| g.dot(*c) - gh_ref).collect();
        let ghf: Vec<f64> = (0..mesh.n_faces()).map(|f| g.dot(mesh.face_centre(f)) - gh_ref).collect();
        let gh_boundary = ghf[mesh.n_internal_faces()..].to_vec();
        Self {
            gravity: g,
            gh,
            gh_boundary,
            ghf,
        }
    }

    /// 重力向量
    pub fn gravity(&self) -> DVec3 {
        self.gravity
    }

    /// 单元 `gh`
    pub fn gh(&self) -> &[f64] {
        &self.gh
    }

    /// 面 `ghf`
    pub fn ghf(&self) -> &[f64] {
        &self.ghf
    }

    /// `p = p_rgh + ρ·gh`（含边界值）
    pub fn absolute(&self, p: &mut VolScalarField, p_rgh: &VolScalarField, rho: &VolScalarField) {
        for (i, v) in p.internal_mut().iter_mut().enumerate() {
            *v = p_rgh.internal()[i] + rho.internal()[i] * self.gh[i];
        }
        for (b, v) in p.boundary_mut().iter_mut().enumerate() {
            *v = p_rgh.boundary()[b] + rho.boundary()[b] * self.gh_boundary[b];
        }
    }

    /// `p_rgh = p − ρ·gh`（含边界值）
    pub fn relative(&self, p_rgh: &mut VolScalarField, p: &VolScalarField, rho: &VolScalarField) {
        for (i, v) in p_rgh.internal_mut().iter_mut().enumerate() {
            *v = p.internal()[i] - rho.internal()[i] * self.gh[i];
        }
        for (b, v) in p_rgh.boundary_mut().iter_mut().enumerate() {
            *v = p.boundary()[b] - rho.boundary()[b] * self.gh_boundary[b];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_round_trip() {
        let mesh = MeshBuilder::closed_box(2, 4, 1.0, 2.0, false).unwrap();
        let hs = Hydrostatic::new(&mesh, &BuoyancyConfig::default());
        let rho = VolScalarField::new("rho", &mesh, 1.2);
        let p_rgh = VolScalarField::new("p_rgh", &mesh, 1e5);
        let mut p = VolScalarField::new("p", &mesh, 0.0);
        hs.absolute(&mut p, &p_rgh, &rho);
        // 越高压力越小
        assert!(p.internal()[0] > p.internal()[7]);
        let mut back = VolScalarField::new("p_rgh", &mesh, 0.0);
        hs.relative(&mut back, &p, &rho);
        assert!(back.internal().iter().all(|v| (v - 1e5).abs() < 1e-9));
    }

    #[test]
    fn test_reference_height() {
        let mesh = MeshBuilder::closed_box(1, 2, 1.0, 2.0, false).unwrap();
        let cfg = BuoyancyConfig {
            gravity: [0.0, -10.0, 0.0],
            h_ref: 0.5,
        };
        let hs = Hydrostatic::new(&mesh, &cfg);
        // 第一个单元中心 y = 0.5
        assert!((hs.gh()[0] - (-5.0 + 5.0)).abs() < 1e-12);
        assert_eq!(hs.gravity(), DVec3::new(0.0, -10.0, 0.0));
    }
}
