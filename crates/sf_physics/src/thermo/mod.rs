// crates/sf_physics/src/thermo/mod.rs

//! 热物性模块
//!
//! [`Thermo`] 持有温度场与状态方程，按当前压力计算密度与压缩性
//! （单元值和边界面值）。能量方程不在本模块范围内，温度由外部更新。

pub mod eos;

pub use eos::{EquationOfState, IncompressiblePerfectGas, LinearCompressibility, PerfectGas};

use sf_foundation::{SfError, SfResult};

use crate::fields::VolScalarField;
use crate::mesh::FvMesh;

/// 热物性
#[derive(Debug)]
pub struct Thermo {
    eos: Box<dyn EquationOfState>,
    t: VolScalarField,
    psi: VolScalarField,
    rho: VolScalarField,
}

impl Thermo {
    /// 由状态方程、温度场和初始压力创建
    pub fn new<E>(mesh: &FvMesh, eos: E, t: VolScalarField, p: &VolScalarField) -> SfResult<Self>
    where
        E: EquationOfState + 'static,
    {
        SfError::check_size("Thermo T", mesh.n_cells(), t.internal().len())?;
        SfError::check_size("Thermo p", mesh.n_cells(), p.internal().len())?;
        if let Some(bad) = t.internal().iter().find(|&&v| !(v > 0.0)) {
            return Err(SfError::invalid_input(format!("温度必须为正，得到 {}", bad)));
        }
        let mut thermo = Self {
            eos: Box::new(eos),
            t,
            psi: VolScalarField::new("psi", mesh, 0.0),
            rho: VolScalarField::new("thermo:rho", mesh, 0.0),
        };
        thermo.correct(mesh, p);
        Ok(thermo)
    }

    /// 状态方程名称
    pub fn eos_name(&self) -> &'static str {
        self.eos.name()
    }

    /// 温度场
    #[inline]
    pub fn temperature(&self) -> &VolScalarField {
        &self.t
    }

    /// 温度场（可变，供能量方程写回）
    #[inline]
    pub fn temperature_mut(&mut self) -> &mut VolScalarField {
        &mut self.t
    }

    /// 压缩性场
    #[inline]
    pub fn psi(&self) -> &VolScalarField {
        &self.psi
    }

    /// 上一次 [`Thermo::correct`] 时的密度
    #[inline]
    pub fn rho(&self) -> &VolScalarField {
        &self.rho
    }

    /// 按压力与当前温度重新计算 `ψ` 与 `ρ`
    pub fn correct(&mut self, mesh: &FvMesh, p: &VolScalarField) {
        let old_psi = self.psi.has_old_time().then(|| self.psi.old_time().to_vec());
        let old_rho = self.rho.has_old_time().then(|| self.rho.old_time().to_vec());
        self.psi = self.evaluate(mesh, "psi", p, |eos, p, t| eos.psi(p, t));
        self.rho = self.evaluate(mesh, "thermo:rho", p, |eos, p, t| eos.rho(p, t));
        // 上一时间步值尺寸与网格一致，不会失败
        if let Some(old) = old_psi {
            let _ = self.psi.set_old_time(old);
        }
        if let Some(old) = old_rho {
            let _ = self.rho.set_old_time(old);
        }
    }

    /// 按给定压力计算密度，不修改内部状态
    pub fn rho_for(&self, mesh: &FvMesh, p: &VolScalarField) -> VolScalarField {
        self.evaluate(mesh, "thermo:rho", p, |eos, p, t| eos.rho(p, t))
    }

    /// 保存 `ψ` 与 `ρ` 的上一时间步值
    pub fn store_old_time(&mut self) {
        self.psi.store_old_time();
        self.rho.store_old_time();
    }

    fn evaluate<F>(&self, mesh: &FvMesh, name: &str, p: &VolScalarField, f: F) -> VolScalarField
    where
        F: Fn(&dyn EquationOfState, f64, f64) -> f64,
    {
        let eos = self.eos.as_ref();
        let mut field = VolScalarField::new(name, mesh, 0.0);
        for (i, v) in field.internal_mut().iter_mut().enumerate() {
            *v = f(eos, p.internal()[i], self.t.internal()[i]);
        }
        for (b, v) in field.boundary_mut().iter_mut().enumerate() {
            *v = f(eos, p.boundary()[b], self.t.boundary()[b]);
        }
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    #[test]
    fn test_perfect_gas_thermo() {
        let mesh = MeshBuilder::channel(3, 1, 3.0, 1.0).unwrap();
        let t = VolScalarField::new("T", &mesh, 300.0);
        let p = VolScalarField::new("p", &mesh, 1e5);
        let thermo = Thermo::new(&mesh, PerfectGas::AIR, t, &p).unwrap();
        let expected = 1e5 / (287.0 * 300.0);
        assert!(thermo.rho().internal().iter().all(|r| (r - expected).abs() < 1e-12));
        assert!(thermo.rho().boundary().iter().all(|r| (r - expected).abs() < 1e-12));
        assert_eq!(thermo.eos_name(), "perfectGas");

        let p2 = VolScalarField::new("p", &mesh, 2e5);
        let rho2 = thermo.rho_for(&mesh, &p2);
        assert!((rho2.internal()[0] - 2.0 * expected).abs() < 1e-12);
        // rho_for 不修改状态
        assert!((thermo.rho().internal()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_old_time_survives_correct() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let t = VolScalarField::new("T", &mesh, 300.0);
        let p = VolScalarField::new("p", &mesh, 1e5);
        let mut thermo = Thermo::new(&mesh, PerfectGas::AIR, t, &p).unwrap();
        thermo.store_old_time();
        let old = thermo.rho().internal()[0];
        thermo.correct(&mesh, &VolScalarField::new("p", &mesh, 3e5));
        assert!((thermo.rho().old_time()[0] - old).abs() < 1e-12);
        assert!((thermo.rho().internal()[0] - 3.0 * old).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_temperature_rejected() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let t = VolScalarField::new("T", &mesh, 0.0);
        let p = VolScalarField::new("p", &mesh, 1e5);
        assert!(Thermo::new(&mesh, PerfectGas::AIR, t, &p).is_err());
    }
}
