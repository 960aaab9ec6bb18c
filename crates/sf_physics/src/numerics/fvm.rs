// crates/sf_physics/src/numerics/fvm.rs

//! 隐式有限体积算子（fvm）
//!
//! 每个算子返回一个 [`FvMatrix`]，通过 `add`/`subtract`/`negate`/
//! `add_explicit`/`equals` 组合成完整方程。
//!
//! - [`laplacian`]: `∇·(γ∇x)`，含滞后的过松弛非正交修正
//! - [`div`]: 一阶迎风对流 `∇·(φ x)`
//! - [`ddt`]: Euler 隐式 `∂(ψ x)/∂t`

use sf_foundation::{SfError, SfResult};

use super::fv_matrix::FvMatrix;
use crate::fields::VolScalarField;
use crate::mesh::FvMesh;

/// 拉普拉斯项 `∇·(γ_f ∇x)`，`gamma` 为每个面的扩散系数
pub fn laplacian(mesh: &FvMesh, gamma: &[f64], field: &VolScalarField) -> SfResult<FvMatrix> {
    SfError::check_size("laplacian gamma", mesh.n_faces(), gamma.len())?;

    let mut m = FvMatrix::new(mesh);
    let mut gamma_mag_sf = vec![0.0; mesh.n_internal_faces()];
    for f in mesh.internal_faces() {
        let gm = gamma[f] * mesh.mag_sf(f);
        let c = gm * mesh.delta_coeff(f);
        m.set_face(mesh, f, c, c);
        gamma_mag_sf[f] = gm;
    }
    for f in mesh.boundary_faces() {
        let gm = gamma[f] * mesh.mag_sf(f);
        let (gic, gbc) = field.gradient_coeffs(mesh, f);
        m.set_boundary_face(mesh, f, gm * gic, gm * gbc);
    }

    m.attach_non_orthogonal(gamma_mag_sf);
    m.refresh_non_orthogonal(mesh, field);
    Ok(m)
}

/// 迎风对流项 `∇·(φ x)`，`phi` 为每个面的通量
pub fn div(mesh: &FvMesh, phi: &[f64], field: &VolScalarField) -> SfResult<FvMatrix> {
    SfError::check_size("div phi", mesh.n_faces(), phi.len())?;

    let mut m = FvMatrix::new(mesh);
    for f in mesh.internal_faces() {
        let flux = phi[f];
        if flux >= 0.0 {
            m.set_face(mesh, f, 0.0, -flux);
        } else {
            m.set_face(mesh, f, flux, 0.0);
        }
    }
    for f in mesh.boundary_faces() {
        let (vic, vbc) = field.value_coeffs(mesh, f);
        m.set_boundary_face(mesh, f, phi[f] * vic, phi[f] * vbc);
    }
    m.mark_asymmetric();
    Ok(m)
}

/// Euler 时间项 `(ψ x − ψ⁰ x⁰)/Δt`
///
/// `psi` 与 `field` 的上一时间步值取自各自的 `old_time()`。
pub fn ddt(mesh: &FvMesh, psi: &VolScalarField, field: &VolScalarField, delta_t: f64) -> SfResult<FvMatrix> {
    SfError::check_range("delta_t", delta_t, f64::MIN_POSITIVE, f64::INFINITY)?;
    SfError::check_size("ddt psi", mesh.n_cells(), psi.internal().len())?;

    let mut m = FvMatrix::new(mesh);
    let psi_old = psi.old_time();
    let x_old = field.old_time();
    for (i, &vol) in mesh.cell_volumes().iter().enumerate() {
        let rdt = vol / delta_t;
        m.diag_mut()[i] += rdt * psi.internal()[i];
        m.source_mut()[i] += rdt * psi_old[i] * x_old[i];
    }
    Ok(m)
}
