// crates/sf_physics/src/pressure/predictor.rs

//! 通量预测
//!
//! 由动量方程的 A/H 分解得到 `rAU = 1/A`、`HbyA = rAU·H`，再插值到面
//! 得到预测通量 `phiHbyA`（可压与浮力形式按密度加权）。同时负责：
//!
//! - 出流调整 [`adjust_phi`]，返回闭域标志
//! - 固定通量压力边界的法向梯度更新 [`constrain_pressure`]
//! - 跨音速形式的 `phid` 与残余显式通量

use sf_foundation::SMALL;

use super::context::{EquationKind, FlowFields};
use super::error::{PressureError, PressureResult};
use super::hydrostatic::Hydrostatic;
use crate::fields::{BoundaryKind, SurfaceScalarField, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;
use crate::momentum::MomentumSystem;
use crate::numerics::fvc;
use crate::thermo::Thermo;

/// 预测阶段的全部产物
#[derive(Debug, Clone)]
pub struct FluxPrediction {
    /// `1/A`（单元）
    pub r_au: Vec<f64>,
    /// `rAU·H`
    pub hby_a: VolVectorField,
    /// 拉普拉斯系数：`rAUf`（不可压）或 `rhorAUf`
    pub r_auf: SurfaceScalarField,
    /// 预测通量；跨音速形式下为扣除 `phid·p` 后的残余部分
    pub phi_hby_a: SurfaceScalarField,
    /// 跨音速对流通量 `ψ_f/ρ_f · phiHbyA`
    pub phid: Option<SurfaceScalarField>,
    /// 浮力通量
    pub phig: Option<SurfaceScalarField>,
    /// 闭域（无任何边界通量且压力水平未固定）
    pub closed_volume: bool,
}

/// `rAU` 与 `HbyA`
///
/// `HbyA` 的边界值：速度固定值边界取速度边界值，其余取 owner 单元值。
pub fn hby_a(mesh: &FvMesh, momentum: &dyn MomentumSystem, u: &VolVectorField) -> PressureResult<(Vec<f64>, VolVectorField)> {
    let a = momentum.a();
    sf_foundation::SfError::check_size("momentum A", mesh.n_cells(), a.len())?;
    if let Some((index, &value)) = a.iter().enumerate().find(|&(_, &v)| !(v > 0.0)) {
        return Err(PressureError::NonPositiveCoefficient { name: "rAU", index, value });
    }
    let r_au: Vec<f64> = a.iter().map(|v| 1.0 / v).collect();

    let h = momentum.h(mesh, u);
    sf_foundation::SfError::check_size("momentum H", mesh.n_cells(), h.len())?;
    let values = h.iter().zip(&r_au).map(|(hi, r)| *hi * *r).collect();
    let mut hby_a = VolVectorField::from_values("HbyA", mesh, values)?;
    for f in mesh.boundary_faces() {
        if u.face_kind(mesh, f).fixes_level() {
            hby_a.boundary_mut()[mesh.boundary_index(f)] = u.boundary_value(mesh, f);
        }
    }
    Ok((r_au, hby_a))
}

/// 面系数的正性检查
pub fn check_positive(field: &SurfaceScalarField, name: &'static str) -> PressureResult<()> {
    match field.first_non_positive() {
        Some((index, value)) => Err(PressureError::NonPositiveCoefficient { name, index, value }),
        None => Ok(()),
    }
}

/// 出流调整
///
/// 仅当 `p` 没有固定水平的边界时生效：把速度非固定值边界上的出流按
/// `(入流 − 固定出流)/可调出流` 缩放，使边界净通量为零。返回是否为
/// 闭域（所有边界通量都可忽略）。
pub fn adjust_phi(
    mesh: &FvMesh,
    phi: &mut SurfaceScalarField,
    u: &VolVectorField,
    p: &VolScalarField,
) -> PressureResult<bool> {
    if !p.needs_reference() {
        return Ok(false);
    }

    let (mut mass_in, mut fixed_out, mut adjustable_out) = (0.0, 0.0, 0.0);
    for (pi, patch) in mesh.patches().iter().enumerate() {
        let adjustable = !u.kind(pi).fixes_level();
        for &v in &phi.values()[patch.faces()] {
            if v < 0.0 {
                mass_in -= v;
            } else if adjustable {
                adjustable_out += v;
            } else {
                fixed_out += v;
            }
        }
    }

    let total = f64::MIN_POSITIVE + mass_in + fixed_out + adjustable_out;
    let mut correction = 1.0;
    if adjustable_out > f64::MIN_POSITIVE && adjustable_out / total > SMALL {
        correction = (mass_in - fixed_out) / adjustable_out;
    } else if (fixed_out - mass_in).abs() / total > 1e-8 {
        return Err(PressureError::ContinuityImbalance {
            mass_in,
            fixed_out,
            adjustable_out,
        });
    }

    for (pi, patch) in mesh.patches().iter().enumerate() {
        if u.kind(pi).fixes_level() {
            continue;
        }
        for v in &mut phi.values_mut()[patch.faces()] {
            if *v > 0.0 {
                *v *= correction;
            }
        }
    }

    log::trace!(
        "adjust_phi: 入流 {:.6e}, 固定出流 {:.6e}, 可调出流 {:.6e}, 修正 {:.6}",
        mass_in,
        fixed_out,
        adjustable_out,
        correction
    );

    Ok(mass_in / total < SMALL && fixed_out / total < SMALL && adjustable_out / total < SMALL)
}

/// 更新固定通量压力边界的法向梯度
///
/// `∂p/∂n = (phiHbyA_b − ρ_b·(Sf·U_b)) / (|Sf|·rAUf_b)`，使压力修正后
/// 的边界通量与速度边界条件一致。不可压时 `rho` 为 `None`。
pub fn constrain_pressure(
    mesh: &FvMesh,
    p: &mut VolScalarField,
    rho: Option<&VolScalarField>,
    u: &VolVectorField,
    phi_hby_a: &SurfaceScalarField,
    r_auf: &SurfaceScalarField,
) {
    let mut touched = false;
    for (pi, patch) in mesh.patches().iter().enumerate() {
        if p.kind(pi) != BoundaryKind::FixedFluxPressure {
            continue;
        }
        for f in patch.faces() {
            let rho_b = rho.map_or(1.0, |r| r.boundary_value(mesh, f));
            let flux_u = rho_b * mesh.sf(f).dot(u.boundary_value(mesh, f));
            let sn_grad = (phi_hby_a.values()[f] - flux_u) / (mesh.mag_sf(f) * r_auf.values()[f]);
            p.set_gradient(mesh, f, sn_grad);
        }
        touched = true;
    }
    if touched {
        p.correct_boundary_conditions(mesh);
    }
}

/// 按方程类型完成通量预测
///
/// 调用前 `fields.rho` 已处于本阶段应使用的值（瞬态为状态方程密度，
/// 浮力为松弛后的密度）。
pub fn predict(
    kind: EquationKind,
    mesh: &FvMesh,
    fields: &mut FlowFields,
    momentum: &dyn MomentumSystem,
    thermo: Option<&Thermo>,
    hydrostatic: Option<&Hydrostatic>,
    delta_t: f64,
) -> PressureResult<FluxPrediction> {
    let (r_au, hby_a) = hby_a(mesh, momentum, &fields.u)?;

    let prediction = match kind {
        EquationKind::Incompressible => {
            let r_au_field = VolScalarField::from_values("rAU", mesh, r_au.clone())?;
            let r_auf = fvc::interpolate_scalar(mesh, &r_au_field).renamed("rAUf");
            check_positive(&r_auf, "rAUf")?;

            let mut phi_hby_a = fvc::flux(mesh, &hby_a).renamed("phiHbyA");
            let closed_volume = adjust_phi(mesh, &mut phi_hby_a, &fields.u, &fields.p)?;
            constrain_pressure(mesh, &mut fields.p, None, &fields.u, &phi_hby_a, &r_auf);

            FluxPrediction {
                r_au,
                hby_a,
                r_auf,
                phi_hby_a,
                phid: None,
                phig: None,
                closed_volume,
            }
        }

        EquationKind::CompressibleSteady { transonic } | EquationKind::CompressibleTransient { transonic } => {
            let thermo = thermo.ok_or(PressureError::MissingInput("thermo"))?;
            let rho = fields.rho.as_ref().ok_or(PressureError::MissingInput("rho"))?;
            let r_auf = rho_r_auf(mesh, rho, &r_au)?;

            let mut phi_hby_a = density_weighted_flux(mesh, rho, &hby_a)?;
            if let EquationKind::CompressibleTransient { .. } = kind {
                let corr = fvc::ddt_corr(mesh, rho, &fields.u, &fields.phi, delta_t);
                let weighted: Vec<f64> = corr.iter().zip(r_auf.values()).map(|(c, r)| c * r).collect();
                phi_hby_a.add_assign(&weighted);
            }

            let closed_volume = if kind.adjusts_flux() {
                adjust_phi(mesh, &mut phi_hby_a, &fields.u, &fields.p)?
            } else {
                false
            };
            constrain_pressure(mesh, &mut fields.p, Some(rho), &fields.u, &phi_hby_a, &r_auf);

            let phid = if transonic {
                Some(split_transonic(mesh, &mut phi_hby_a, thermo.psi(), rho, &fields.p)?)
            } else {
                None
            };

            FluxPrediction {
                r_au,
                hby_a,
                r_auf,
                phi_hby_a,
                phid,
                phig: None,
                closed_volume,
            }
        }

        EquationKind::Buoyant => {
            let hydrostatic = hydrostatic.ok_or(PressureError::MissingInput("hydrostatic"))?;
            let rho = fields.rho.as_ref().ok_or(PressureError::MissingInput("rho"))?;
            let p_rgh = fields.p_rgh.as_mut().ok_or(PressureError::MissingInput("p_rgh"))?;
            let r_auf = rho_r_auf(mesh, rho, &r_au)?;

            let sn_grad_rho = fvc::sn_grad(mesh, rho);
            let phig_values = (0..mesh.n_faces())
                .map(|f| -r_auf.values()[f] * hydrostatic.ghf()[f] * sn_grad_rho[f] * mesh.mag_sf(f))
                .collect();
            let phig = SurfaceScalarField::from_values("phig", mesh, phig_values)?;

            let mut phi_hby_a = density_weighted_flux(mesh, rho, &hby_a)?;
            let closed_volume = adjust_phi(mesh, &mut phi_hby_a, &fields.u, p_rgh)?;
            phi_hby_a.add_assign(phig.values());
            constrain_pressure(mesh, p_rgh, Some(rho), &fields.u, &phi_hby_a, &r_auf);

            FluxPrediction {
                r_au,
                hby_a,
                r_auf,
                phi_hby_a,
                phid: None,
                phig: Some(phig),
                closed_volume,
            }
        }
    };

    Ok(prediction)
}

/// `interpolate(ρ·rAU)`
fn rho_r_auf(mesh: &FvMesh, rho: &VolScalarField, r_au: &[f64]) -> PressureResult<SurfaceScalarField> {
    let internal: Vec<f64> = rho.internal().iter().zip(r_au).map(|(r, a)| r * a).collect();
    let boundary: Vec<f64> = mesh
        .boundary_faces()
        .map(|f| rho.boundary_value(mesh, f) * r_au[mesh.owner(f)])
        .collect();
    let r_auf = SurfaceScalarField::from_values("rhorAUf", mesh, fvc::interpolate_values(mesh, &internal, &boundary))?;
    check_positive(&r_auf, "rhorAUf")?;
    Ok(r_auf)
}

/// `Sf · interpolate(ρ·HbyA)`
fn density_weighted_flux(mesh: &FvMesh, rho: &VolScalarField, hby_a: &VolVectorField) -> PressureResult<SurfaceScalarField> {
    let internal: Vec<_> = hby_a.internal().iter().zip(rho.internal()).map(|(h, r)| *h * *r).collect();
    let boundary: Vec<_> = hby_a.boundary().iter().zip(rho.boundary()).map(|(h, r)| *h * *r).collect();
    let face = fvc::interpolate_values(mesh, &internal, &boundary);
    let values = face.iter().enumerate().map(|(f, v)| mesh.sf(f).dot(*v)).collect();
    Ok(SurfaceScalarField::from_values("phiHbyA", mesh, values)?)
}

/// 跨音速分裂
///
/// `phid = ψ_f/ρ_f · phiHbyA`，`phiHbyA ← phiHbyA − (ψp)_f/ρ_f · phiHbyA`。
/// 理想气体下残余部分为零，`ψ = 0` 时 `phid` 为零、`phiHbyA` 不变。
fn split_transonic(
    mesh: &FvMesh,
    phi_hby_a: &mut SurfaceScalarField,
    psi: &VolScalarField,
    rho: &VolScalarField,
    p: &VolScalarField,
) -> PressureResult<SurfaceScalarField> {
    let psi_f = fvc::interpolate(mesh, psi);
    let rho_f = fvc::interpolate(mesh, rho);
    let psi_p_f = fvc::interpolate_product(mesh, psi, p);

    let mut phid = Vec::with_capacity(mesh.n_faces());
    for (f, v) in phi_hby_a.values_mut().iter_mut().enumerate() {
        phid.push(psi_f[f] / rho_f[f] * *v);
        *v -= psi_p_f[f] / rho_f[f] * *v;
    }
    Ok(SurfaceScalarField::from_values("phid", mesh, phid)?)
}
