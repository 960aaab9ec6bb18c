// crates/sf_physics/src/pressure/reconstruct.rs

//! 速度重构
//!
//! 守恒通量由非正交循环的最后一次求解给出，这里只负责单元速度：
//!
//! - 压力形式: `U = HbyA − rAU·∇p`
//! - 浮力形式: `U = HbyA + rAU·reconstruct((phig − flux(p_rgh))/rhorAUf)`
//!
//! 之后刷新速度边界并应用 fvOptions 的速度修正。

use glam::DVec3;
use sf_foundation::SfError;

use super::error::PressureResult;
use crate::fields::{SurfaceScalarField, VolScalarField, VolVectorField};
use crate::mesh::FvMesh;
use crate::numerics::fvc;
use crate::sources::FvOptions;

/// `U = HbyA − rAU·∇p`
pub fn correct_velocity(
    mesh: &FvMesh,
    u: &mut VolVectorField,
    hby_a: &VolVectorField,
    r_au: &[f64],
    p: &VolScalarField,
    options: &FvOptions,
) -> PressureResult<()> {
    SfError::check_size("rAU", mesh.n_cells(), r_au.len())?;
    let grad_p = fvc::grad(mesh, p);
    let values: Vec<DVec3> = hby_a
        .internal()
        .iter()
        .zip(r_au)
        .zip(&grad_p)
        .map(|((h, r), g)| *h - *g * *r)
        .collect();
    finish(mesh, u, values, options)
}

/// `U = HbyA + rAU·reconstruct((phig − flux)/rhorAUf)`
///
/// `flux` 为压力方程在（松弛后的）`p_rgh` 上的矩阵通量。
#[allow(clippy::too_many_arguments)]
pub fn correct_velocity_buoyant(
    mesh: &FvMesh,
    u: &mut VolVectorField,
    hby_a: &VolVectorField,
    r_au: &[f64],
    phig: &SurfaceScalarField,
    flux: &SurfaceScalarField,
    rho_r_auf: &SurfaceScalarField,
    options: &FvOptions,
) -> PressureResult<()> {
    SfError::check_size("rAU", mesh.n_cells(), r_au.len())?;
    let face: Vec<f64> = phig
        .values()
        .iter()
        .zip(flux.values())
        .zip(rho_r_auf.values())
        .map(|((g, f), r)| (g - f) / r)
        .collect();
    let reconstructed = fvc::reconstruct(mesh, &face);
    let values: Vec<DVec3> = hby_a
        .internal()
        .iter()
        .zip(r_au)
        .zip(&reconstructed)
        .map(|((h, r), c)| *h + *c * *r)
        .collect();
    finish(mesh, u, values, options)
}

fn finish(mesh: &FvMesh, u: &mut VolVectorField, values: Vec<DVec3>, options: &FvOptions) -> PressureResult<()> {
    u.assign(values)?;
    u.correct_boundary_conditions(mesh);
    options.correct(mesh, u);
    Ok(())
}
