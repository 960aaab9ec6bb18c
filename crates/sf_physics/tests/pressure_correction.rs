// crates/sf_physics/tests/pressure_correction.rs

//! 压力修正端到端测试
//!
//! # 测试覆盖
//!
//! - 直通道不可压修正：出流等于入流，压力单调下降
//! - 闭域可压修正：质量保持与幂等性
//! - 参考单元
//! - ψ = 0 的跨音速形式退化为不可压形式
//! - 非正交修正：正交网格不变，错切网格散度为零

use glam::DVec3;
use sf_config::PressureControls;
use sf_physics::pressure::mass_integral;
use sf_physics::{
    BoundaryKind, EquationKind, FlowFields, FrozenMomentum, FvMesh, FvOptions, IncompressiblePerfectGas,
    MeshBuilder, PerfectGas, PressureCorrector, SurfaceScalarField, Thermo, VolScalarField, VolVectorField,
};

// ============================================================================
// 测试辅助函数
// ============================================================================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 入口速度固定、出口压力固定、壁面无滑移的通道
fn channel_fields(mesh: &FvMesh, u_in: f64, p_out: f64) -> (VolScalarField, VolVectorField) {
    let p = VolScalarField::new("p", mesh, p_out)
        .with_patch(mesh, "outlet", BoundaryKind::FixedValue, p_out)
        .unwrap();
    let u = VolVectorField::new("U", mesh, DVec3::ZERO)
        .with_patch(mesh, "inlet", BoundaryKind::FixedValue, DVec3::new(u_in, 0.0, 0.0))
        .unwrap()
        .with_patch(mesh, "walls", BoundaryKind::FixedValue, DVec3::ZERO)
        .unwrap();
    (p, u)
}

/// 封闭方腔，壁面无滑移
fn closed_fields(mesh: &FvMesh, p0: f64) -> (VolScalarField, VolVectorField) {
    let p = VolScalarField::new("p", mesh, p0);
    let u = VolVectorField::new("U", mesh, DVec3::ZERO)
        .with_patch(mesh, "walls", BoundaryKind::FixedValue, DVec3::ZERO)
        .unwrap();
    (p, u)
}

/// 有散度的 H，使预测通量不满足连续性
fn swirling_momentum(mesh: &FvMesh, a: f64) -> FrozenMomentum {
    let h = mesh
        .cell_centres()
        .iter()
        .map(|c| DVec3::new(c.x - 0.5, 0.5 * (c.y - 0.5), 0.0))
        .collect();
    FrozenMomentum::new(vec![a; mesh.n_cells()], h).unwrap()
}

fn patch_flux(mesh: &FvMesh, phi: &SurfaceScalarField, patch: &str) -> f64 {
    let pi = mesh.find_patch(patch).unwrap();
    mesh.patches()[pi].faces().map(|f| phi.values()[f]).sum()
}

fn unit_relaxation() -> PressureControls {
    let mut controls = PressureControls::default();
    controls.relaxation.p = 1.0;
    controls
}

fn solve_incompressible_channel(mesh: &FvMesh, controls: PressureControls) -> (FlowFields, sf_physics::CorrectionReport) {
    let (p, u) = channel_fields(mesh, 1.0, 0.0);
    let mut fields = FlowFields::incompressible(p, u, SurfaceScalarField::new("phi", mesh, 0.0));
    let momentum = FrozenMomentum::uniform(mesh.n_cells(), 1.0);
    let mut corrector = PressureCorrector::new(controls, EquationKind::Incompressible).unwrap();
    let report = corrector
        .correct(mesh, &mut fields, &momentum, None, &FvOptions::new())
        .unwrap();
    (fields, report)
}

// ============================================================================
// 不可压直通道
// ============================================================================

#[test]
fn test_channel_outflow_matches_inflow() {
    init_logger();
    let mesh = MeshBuilder::channel(10, 1, 10.0, 1.0).unwrap();
    let (fields, report) = solve_incompressible_channel(&mesh, unit_relaxation());

    assert!(report.all_converged());
    assert!(!report.closed_volume);
    assert_eq!(report.solves.len(), 1);

    let q_in = -patch_flux(&mesh, &fields.phi, "inlet");
    let q_out = patch_flux(&mesh, &fields.phi, "outlet");
    assert!(q_in > 0.0);
    assert!((q_out - q_in).abs() < 1e-8 * q_in);

    // 压力从入口到出口单调下降
    let p = fields.p.internal();
    assert!(p.windows(2).all(|w| w[0] > w[1]));
    assert!(p[p.len() - 1] > 0.0);

    // 通道中段速度恢复为入口速度
    for v in &fields.u.internal()[2..8] {
        assert!((v.x - 1.0).abs() < 1e-8, "u = {:?}", v);
    }
    assert!(report.continuity[0].sum_local < 1e-8);
}

#[test]
fn test_channel_explicit_relaxation_keeps_flux() {
    let mesh = MeshBuilder::channel(10, 1, 10.0, 1.0).unwrap();
    let (relaxed, _) = solve_incompressible_channel(&mesh, PressureControls::default());
    let (full, _) = solve_incompressible_channel(&mesh, unit_relaxation());

    // 通量在松弛之前捕获，与松弛因子无关
    for (a, b) in relaxed.phi.values().iter().zip(full.phi.values()) {
        assert!((a - b).abs() < 1e-8);
    }
    // p 从 0 开始，按 0.3 松弛
    for (a, b) in relaxed.p.internal().iter().zip(full.p.internal()) {
        assert!((a - 0.3 * b).abs() < 1e-8);
    }
}

// ============================================================================
// 闭域可压稳态：质量保持
// ============================================================================

#[test]
fn test_closed_volume_mass_is_preserved() {
    init_logger();
    let mesh = MeshBuilder::closed_box(4, 4, 1.0, 1.0, false).unwrap();
    let (p, u) = closed_fields(&mesh, 1e5);
    let t = VolScalarField::new("T", &mesh, 300.0);
    let thermo = Thermo::new(&mesh, PerfectGas::AIR, t, &p).unwrap();
    let rho = VolScalarField::from_values("rho", &mesh, thermo.rho().internal().to_vec()).unwrap();
    let mut fields = FlowFields::compressible(p, u, SurfaceScalarField::new("phi", &mesh, 0.0), rho);
    let momentum = swirling_momentum(&mesh, 2.0);

    let mut controls = PressureControls::default();
    controls.reference.value = 1e5;
    let kind = EquationKind::compressible_steady(&controls);
    let mut corrector = PressureCorrector::new(controls, kind).unwrap();
    let options = FvOptions::new();

    let report = corrector.correct(&mesh, &mut fields, &momentum, Some(&thermo), &options).unwrap();
    let m0 = corrector.initial_mass().unwrap();
    let expected = 1e5 / (287.0 * 300.0) * mesh.total_volume();
    assert!((m0 - expected).abs() < 1e-12 * expected);

    assert!(report.closed_volume);
    assert!(report.pressure_shift.is_some());
    let m1 = mass_integral(&mesh, thermo.psi(), &fields.p);
    assert!((m1 - m0).abs() < 1e-10 * m0, "m1 = {}, m0 = {}", m1, m0);

    // 预测通量被修正为无散
    assert!(report.continuity[0].sum_local < 1e-8);
    let density = report.density.unwrap();
    assert_eq!(density.n_clipped, 0);
    assert!(density.min > 1.0 && density.max < 1.3);

    // 第二次调用：初始质量不变，仍满足质量约束
    corrector.correct(&mesh, &mut fields, &momentum, Some(&thermo), &options).unwrap();
    assert_eq!(corrector.initial_mass(), Some(m0));
    let m2 = mass_integral(&mesh, thermo.psi(), &fields.p);
    assert!((m2 - m0).abs() < 1e-10 * m0);
}

#[test]
fn test_restart_initial_mass_is_used() {
    let mesh = MeshBuilder::closed_box(3, 3, 1.0, 1.0, false).unwrap();
    let (p, u) = closed_fields(&mesh, 1e5);
    let t = VolScalarField::new("T", &mesh, 300.0);
    let thermo = Thermo::new(&mesh, PerfectGas::AIR, t, &p).unwrap();
    let rho = VolScalarField::from_values("rho", &mesh, thermo.rho().internal().to_vec()).unwrap();
    let mut fields = FlowFields::compressible(p, u, SurfaceScalarField::new("phi", &mesh, 0.0), rho);

    let mut controls = PressureControls::default();
    controls.reference.value = 1e5;
    let target = 1.01e5 / (287.0 * 300.0) * mesh.total_volume();
    let kind = EquationKind::compressible_steady(&controls);
    let mut corrector = PressureCorrector::new(controls, kind).unwrap().with_initial_mass(target);

    let momentum = FrozenMomentum::uniform(mesh.n_cells(), 1.0);
    let report = corrector
        .correct(&mesh, &mut fields, &momentum, Some(&thermo), &FvOptions::new())
        .unwrap();
    assert!((report.pressure_shift.unwrap() - 1e3).abs() < 1e-6);
    assert!(fields.p.internal().iter().all(|v| (v - 1.01e5).abs() < 1e-6));
}

// ============================================================================
// 参考单元
// ============================================================================

#[test]
fn test_reference_cell_is_anchored() {
    let mesh = MeshBuilder::closed_box(4, 4, 1.0, 1.0, false).unwrap();
    let (p, u) = closed_fields(&mesh, 0.0);
    let mut fields = FlowFields::incompressible(p, u, SurfaceScalarField::new("phi", &mesh, 0.0));
    let momentum = swirling_momentum(&mesh, 1.0);

    let mut controls = unit_relaxation();
    controls.reference.cell = 5;
    controls.reference.value = 2.0;
    let mut corrector = PressureCorrector::new(controls, EquationKind::Incompressible).unwrap();
    let report = corrector
        .correct(&mesh, &mut fields, &momentum, None, &FvOptions::new())
        .unwrap();

    assert!(report.closed_volume);
    assert_eq!(corrector.reference().map(|r| r.cell), Some(5));
    assert!((fields.p.internal()[5] - 2.0).abs() < 1e-8);
    // 压力确有变化
    assert!(fields.p.max() - fields.p.min() > 1e-3);
    assert!(report.continuity[0].sum_local < 1e-8);
}

// ============================================================================
// 跨音速形式
// ============================================================================

#[test]
fn test_transonic_without_compressibility_matches_incompressible() {
    init_logger();
    let mesh = MeshBuilder::channel(8, 2, 4.0, 1.0).unwrap();
    let (incompressible, _) = solve_incompressible_channel(&mesh, unit_relaxation());

    let (p, u) = channel_fields(&mesh, 1.0, 0.0);
    let eos = IncompressiblePerfectGas { r: 287.0, p_ref: 1e5 };
    let t = VolScalarField::new("T", &mesh, 300.0);
    let thermo = Thermo::new(&mesh, eos, t, &p).unwrap();
    let rho0 = 1e5 / (287.0 * 300.0);
    let rho = VolScalarField::new("rho", &mesh, rho0);
    let mut fields = FlowFields::compressible(p, u, SurfaceScalarField::new("phi", &mesh, 0.0), rho);

    let mut controls = unit_relaxation();
    controls.transonic = true;
    let kind = EquationKind::compressible_steady(&controls);
    assert!(kind.is_transonic());
    let mut corrector = PressureCorrector::new(controls, kind).unwrap();
    let momentum = FrozenMomentum::uniform(mesh.n_cells(), 1.0);
    let report = corrector
        .correct(&mesh, &mut fields, &momentum, Some(&thermo), &FvOptions::new())
        .unwrap();

    assert!(report.all_converged());
    // 质量通量 = ρ0 · 体积通量，压力相同
    for (m, v) in fields.phi.values().iter().zip(incompressible.phi.values()) {
        assert!((m - rho0 * v).abs() < 1e-7, "{} vs {}", m, rho0 * v);
    }
    for (a, b) in fields.p.internal().iter().zip(incompressible.p.internal()) {
        assert!((a - b).abs() < 1e-7);
    }
    // 跨音速不做闭域判定，也不做密度松弛
    assert!(!report.closed_volume);
    assert_eq!(report.density.unwrap().n_clipped, 0);
}

// ============================================================================
// 非正交修正
// ============================================================================

#[test]
fn test_extra_non_orth_passes_on_orthogonal_mesh() {
    let mesh = MeshBuilder::channel(6, 3, 3.0, 1.0).unwrap();
    assert!(mesh.is_orthogonal(1e-12));

    let (single, single_report) = solve_incompressible_channel(&mesh, unit_relaxation());
    let mut controls = unit_relaxation();
    controls.n_non_orth_correctors = 2;
    let (triple, triple_report) = solve_incompressible_channel(&mesh, controls);

    assert_eq!(single_report.solves.len(), 1);
    assert_eq!(triple_report.solves.len(), 3);
    assert!(triple_report.solves.iter().all(|s| s.non_orth_correction.abs() < 1e-12));
    for (a, b) in single.phi.values().iter().zip(triple.phi.values()) {
        assert!((a - b).abs() < 1e-8);
    }
}

#[test]
fn test_sheared_mesh_flux_is_divergence_free() {
    init_logger();
    let mesh = MeshBuilder::sheared_channel(6, 4, 6.0, 2.0, 0.5).unwrap();
    assert!(mesh.max_non_orthogonality() > 1.0);

    let mut controls = unit_relaxation();
    controls.n_non_orth_correctors = 2;
    let (fields, report) = solve_incompressible_channel(&mesh, controls);

    assert_eq!(report.solves.len(), 3);
    assert_eq!(report.solves[0].non_orth_correction, 0.0);
    assert!(report.solves[1].non_orth_correction > 0.0);
    assert!(report.continuity[0].sum_local < 1e-8);

    let q_in = -patch_flux(&mesh, &fields.phi, "inlet");
    let q_out = patch_flux(&mesh, &fields.phi, "outlet");
    assert!((q_out - q_in).abs() < 1e-8 * q_in.abs());
}
