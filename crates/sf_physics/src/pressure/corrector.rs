// crates/sf_physics/src/pressure/corrector.rs

//! 压力修正器
//!
//! 一次 [`PressureCorrector::correct`] 调用完成一次外迭代（PISO 为一个
//! 时间步）内的压力-速度耦合修正。
//!
//! # 算法概述
//!
//! 1. **通量预测**：由动量方程 A/H 分解得到 `HbyA` 与预测通量 `phiHbyA`
//! 2. **压力方程**：按方程类型组装，稳态可压方程做隐式松弛
//! 3. **非正交循环**：每次求解前钉住参考单元，最后一次求解后捕获守恒通量
//! 4. **速度重构**：`U = HbyA − rAU·∇p`（浮力形式用面通量重构）
//! 5. **闭域修正**：平移压力保持初始质量
//! 6. **密度阶段**：状态方程、截断、松弛
//!
//! 跨外迭代保留的状态只有参考单元判定、只写一次的初始质量、静水压力
//! 分量以及各类计数器。
//!
//! # 使用示例
//!
//! ```ignore
//! use sf_physics::pressure::{EquationKind, FlowFields, PressureCorrector};
//!
//! let mut corrector = PressureCorrector::new(controls, EquationKind::Incompressible)?;
//! let report = corrector.correct(&mesh, &mut fields, &momentum, None, &options)?;
//! ```

use serde::Serialize;
use sf_config::PressureControls;

use super::closed_volume::{correct_closed_volume, mass_integral, InitialMass};
use super::context::{kinetic_energy, EquationKind, FlowFields};
use super::continuity::{ContinuityErrors, ContinuityTracker};
use super::density::{solve_density_continuity, DensityReport, DensityStage};
use super::equation::{CompressibleTerms, PressureEquation};
use super::error::{PressureError, PressureResult};
use super::hydrostatic::Hydrostatic;
use super::monitor::ConvergenceMonitor;
use super::non_orthogonal::{self, refresh_lagged_term, LoopSettings, SolveRecord};
use super::predictor::predict;
use super::reconstruct::{correct_velocity, correct_velocity_buoyant};
use super::reference::ReferenceCell;
use crate::fields::VolScalarField;
use crate::mesh::FvMesh;
use crate::momentum::MomentumSystem;
use crate::sources::FvOptions;
use crate::thermo::Thermo;

/// 一次修正的报告
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionReport {
    /// 方程类型
    pub kind: EquationKind,
    /// 全部线性求解
    pub solves: Vec<SolveRecord>,
    /// 每次压力修正后的连续性误差
    pub continuity: Vec<ContinuityErrors>,
    /// 本次判定为闭域
    pub closed_volume: bool,
    /// 闭域修正的压力平移量
    pub pressure_shift: Option<f64>,
    /// 密度阶段结果（稳态可压与浮力）
    pub density: Option<DensityReport>,
    /// 线性求解连续不收敛已达阈值
    pub diverging: bool,
}

impl CorrectionReport {
    fn new(kind: EquationKind) -> Self {
        Self {
            kind,
            solves: Vec::new(),
            continuity: Vec::new(),
            closed_volume: false,
            pressure_shift: None,
            density: None,
            diverging: false,
        }
    }

    /// 所有线性求解均收敛
    pub fn all_converged(&self) -> bool {
        self.solves.iter().all(SolveRecord::converged)
    }
}

/// 压力修正器
#[derive(Debug)]
pub struct PressureCorrector {
    controls: PressureControls,
    kind: EquationKind,
    /// 首次调用时判定；内层 None 表示开域
    reference: Option<Option<ReferenceCell>>,
    initial_mass: InitialMass,
    hydrostatic: Option<Hydrostatic>,
    density: DensityStage,
    continuity: ContinuityTracker,
    monitor: ConvergenceMonitor,
}

impl PressureCorrector {
    /// 创建修正器（校验配置）
    pub fn new(controls: PressureControls, kind: EquationKind) -> PressureResult<Self> {
        controls.validate()?;
        log::info!(
            "压力修正: {:?}，非正交修正 {} 次，每步修正 {} 次",
            kind,
            controls.n_non_orth_correctors,
            kind.n_correctors(controls.n_correctors)
        );
        Ok(Self {
            density: DensityStage::new(controls.density),
            monitor: ConvergenceMonitor::new(&controls.monitor),
            controls,
            kind,
            reference: None,
            initial_mass: InitialMass::new(),
            hydrostatic: None,
            continuity: ContinuityTracker::new(),
        })
    }

    /// 指定初始质量（重启计算时使用）
    pub fn with_initial_mass(mut self, mass: f64) -> Self {
        self.initial_mass = InitialMass::fixed(mass);
        self
    }

    /// 方程类型
    pub fn kind(&self) -> EquationKind {
        self.kind
    }

    /// 控制参数
    pub fn controls(&self) -> &PressureControls {
        &self.controls
    }

    /// 初始质量（首次调用前为 None）
    pub fn initial_mass(&self) -> Option<f64> {
        self.initial_mass.get()
    }

    /// 参考单元（首次调用前或开域为 None）
    pub fn reference(&self) -> Option<ReferenceCell> {
        self.reference.flatten()
    }

    /// 不收敛监测
    pub fn monitor(&self) -> &ConvergenceMonitor {
        &self.monitor
    }

    /// 累计连续性误差
    pub fn cumulative_continuity_error(&self) -> f64 {
        self.continuity.cumulative()
    }

    /// 执行一次压力修正
    ///
    /// 可压与浮力类型必须提供 `thermo`。瞬态类型要求调用方在每个时间步
    /// 开始时保存场与热物性的上一时间步值。
    pub fn correct(
        &mut self,
        mesh: &FvMesh,
        fields: &mut FlowFields,
        momentum: &dyn MomentumSystem,
        thermo: Option<&Thermo>,
        options: &FvOptions,
    ) -> PressureResult<CorrectionReport> {
        let kind = self.kind;
        fields.validate(mesh, kind)?;

        if self.reference.is_none() {
            let resolved = ReferenceCell::resolve(kind, &self.controls.reference, fields.solved(kind)?)?;
            self.reference = Some(resolved);
        }
        if let Some(thermo) = thermo.filter(|_| kind.needs_thermo()) {
            let p = &fields.p;
            let m0 = self.initial_mass.get_or_capture(|| mass_integral(mesh, thermo.psi(), p));
            log::trace!("初始质量 {:.6e}", m0);
        }

        fields.solved_mut(kind)?.store_prev_iter();
        if let Some(rho) = &mut fields.rho {
            rho.store_prev_iter();
        }

        let mut report = CorrectionReport::new(kind);
        match kind {
            EquationKind::Incompressible => self.correct_incompressible(mesh, fields, momentum, options, &mut report)?,
            EquationKind::CompressibleSteady { .. } => {
                let thermo = thermo.ok_or(PressureError::MissingInput("thermo"))?;
                self.correct_compressible_steady(mesh, fields, momentum, thermo, options, &mut report)?;
            }
            EquationKind::CompressibleTransient { .. } => {
                let thermo = thermo.ok_or(PressureError::MissingInput("thermo"))?;
                self.correct_transient(mesh, fields, momentum, thermo, options, &mut report)?;
            }
            EquationKind::Buoyant => {
                let thermo = thermo.ok_or(PressureError::MissingInput("thermo"))?;
                self.correct_buoyant(mesh, fields, momentum, thermo, options, &mut report)?;
            }
        }

        self.density.finish_iteration()?;
        report.diverging = self.monitor.record(report.all_converged());
        Ok(report)
    }

    fn loop_settings(&self, corrector: usize) -> LoopSettings<'_> {
        LoopSettings {
            reference: self.reference.flatten(),
            n_non_orth_correctors: self.controls.n_non_orth_correctors,
            corrector,
            solver: &self.controls.linear_solver,
        }
    }

    fn correct_incompressible(
        &mut self,
        mesh: &FvMesh,
        fields: &mut FlowFields,
        momentum: &dyn MomentumSystem,
        options: &FvOptions,
        report: &mut CorrectionReport,
    ) -> PressureResult<()> {
        let prediction = predict(self.kind, mesh, fields, momentum, None, None, self.controls.delta_t)?;
        report.closed_volume = prediction.closed_volume;

        let mut equation = PressureEquation::build(self.kind, mesh, &prediction, &fields.p, None)?;
        let outcome = non_orthogonal::run(
            mesh,
            &mut equation,
            &mut fields.p,
            &prediction.phi_hby_a,
            self.loop_settings(0),
            refresh_lagged_term(mesh),
        )?;
        fields.phi = outcome.phi;
        report.solves.extend(outcome.solves);
        report.continuity.push(self.continuity.from_flux(mesh, &fields.phi, 1.0));

        relax_field(mesh, &mut fields.p, self.controls.relaxation.p);
        correct_velocity(mesh, &mut fields.u, &prediction.hby_a, &prediction.r_au, &fields.p, options)
    }

    fn correct_compressible_steady(
        &mut self,
        mesh: &FvMesh,
        fields: &mut FlowFields,
        momentum: &dyn MomentumSystem,
        thermo: &Thermo,
        options: &FvOptions,
        report: &mut CorrectionReport,
    ) -> PressureResult<()> {
        let kind = self.kind;
        let prediction = predict(kind, mesh, fields, momentum, Some(thermo), None, self.controls.delta_t)?;
        report.closed_volume = prediction.closed_volume;

        let mass_source = options.mass_source(mesh);
        let mut equation = {
            let terms = CompressibleTerms {
                psi: thermo.psi(),
                rho: fields.rho.as_ref().ok_or(PressureError::MissingInput("rho"))?,
                mass_source: &mass_source,
                delta_t: self.controls.delta_t,
            };
            PressureEquation::build(kind, mesh, &prediction, &fields.p, Some(terms))?
        };
        if kind.relaxes_equation() {
            let current = fields.p.internal().to_vec();
            equation
                .matrix_mut()
                .relax(mesh, self.controls.relaxation.p_equation, &current)?;
        }

        let outcome = non_orthogonal::run(
            mesh,
            &mut equation,
            &mut fields.p,
            &prediction.phi_hby_a,
            self.loop_settings(0),
            refresh_lagged_term(mesh),
        )?;
        fields.phi = outcome.phi;
        report.solves.extend(outcome.solves);
        report.continuity.push(self.continuity.from_flux(mesh, &fields.phi, 1.0));

        relax_field(mesh, &mut fields.p, self.controls.relaxation.p);
        correct_velocity(mesh, &mut fields.u, &prediction.hby_a, &prediction.r_au, &fields.p, options)?;

        if prediction.closed_volume {
            if let Some(m0) = self.initial_mass.get() {
                report.pressure_shift = correct_closed_volume(mesh, &mut fields.p, thermo.psi(), m0);
            }
        }

        let eos_rho = thermo.rho_for(mesh, &fields.p);
        let relax = kind.relaxes_density().then_some(self.controls.relaxation.rho);
        let rho = fields.rho.as_mut().ok_or(PressureError::MissingInput("rho"))?;
        report.density = Some(self.density.update(rho, &eos_rho, relax)?);
        Ok(())
    }

    fn correct_transient(
        &mut self,
        mesh: &FvMesh,
        fields: &mut FlowFields,
        momentum: &dyn MomentumSystem,
        thermo: &Thermo,
        options: &FvOptions,
        report: &mut CorrectionReport,
    ) -> PressureResult<()> {
        let kind = self.kind;
        let delta_t = self.controls.delta_t;
        let mass_source = options.mass_source(mesh);

        for corrector in 0..kind.n_correctors(self.controls.n_correctors) {
            let eos_rho = thermo.rho_for(mesh, &fields.p);
            let rho = fields.rho.as_mut().ok_or(PressureError::MissingInput("rho"))?;
            self.density.assign_from_eos(rho, &eos_rho)?;

            let prediction = predict(kind, mesh, fields, momentum, Some(thermo), None, delta_t)?;
            let mut equation = {
                let terms = CompressibleTerms {
                    psi: thermo.psi(),
                    rho: fields.rho.as_ref().ok_or(PressureError::MissingInput("rho"))?,
                    mass_source: &mass_source,
                    delta_t,
                };
                PressureEquation::build(kind, mesh, &prediction, &fields.p, Some(terms))?
            };

            let outcome = non_orthogonal::run(
                mesh,
                &mut equation,
                &mut fields.p,
                &prediction.phi_hby_a,
                self.loop_settings(corrector),
                refresh_lagged_term(mesh),
            )?;
            fields.phi = outcome.phi;
            report.solves.extend(outcome.solves);

            let rho = fields.rho.as_mut().ok_or(PressureError::MissingInput("rho"))?;
            solve_density_continuity(mesh, rho, &fields.phi, &mass_source, delta_t)?;
            let thermo_rho = thermo.rho_for(mesh, &fields.p);
            report.continuity.push(self.continuity.from_density(mesh, rho, &thermo_rho));

            correct_velocity(mesh, &mut fields.u, &prediction.hby_a, &prediction.r_au, &fields.p, options)?;
            fields.kinetic_energy = Some(kinetic_energy(&fields.u));
        }
        Ok(())
    }

    fn correct_buoyant(
        &mut self,
        mesh: &FvMesh,
        fields: &mut FlowFields,
        momentum: &dyn MomentumSystem,
        thermo: &Thermo,
        options: &FvOptions,
        report: &mut CorrectionReport,
    ) -> PressureResult<()> {
        let kind = self.kind;
        let relaxation = self.controls.relaxation;
        if self.hydrostatic.is_none() {
            self.hydrostatic = Some(Hydrostatic::new(mesh, &self.controls.buoyancy));
        }
        let hydrostatic = self.hydrostatic.as_ref().ok_or(PressureError::MissingInput("hydrostatic"))?;

        let eos_rho = thermo.rho_for(mesh, &fields.p);
        let rho = fields.rho.as_mut().ok_or(PressureError::MissingInput("rho"))?;
        self.density.assign_from_eos(rho, &eos_rho)?;
        rho.relax_with(relaxation.rho);

        let prediction = predict(kind, mesh, fields, momentum, Some(thermo), Some(hydrostatic), self.controls.delta_t)?;
        report.closed_volume = prediction.closed_volume;
        let phig = prediction.phig.as_ref().ok_or(PressureError::MissingInput("phig"))?;

        let p_rgh = fields.p_rgh.as_mut().ok_or(PressureError::MissingInput("p_rgh"))?;
        let mut equation = PressureEquation::build(kind, mesh, &prediction, p_rgh, None)?;
        let settings = LoopSettings {
            reference: self.reference.flatten().map(|r| r.with_current_value(&*p_rgh)),
            ..self.loop_settings(0)
        };
        let outcome = non_orthogonal::run(
            mesh,
            &mut equation,
            p_rgh,
            &prediction.phi_hby_a,
            settings,
            refresh_lagged_term(mesh),
        )?;
        fields.phi = outcome.phi;
        report.solves.extend(outcome.solves);
        report.continuity.push(self.continuity.from_flux(mesh, &fields.phi, 1.0));

        relax_field(mesh, p_rgh, relaxation.p_rgh);
        let flux = equation.flux(mesh, p_rgh)?;
        correct_velocity_buoyant(
            mesh,
            &mut fields.u,
            &prediction.hby_a,
            &prediction.r_au,
            phig,
            &flux,
            &prediction.r_auf,
            options,
        )?;

        let rho = fields.rho.as_ref().ok_or(PressureError::MissingInput("rho"))?;
        hydrostatic.absolute(&mut fields.p, p_rgh, rho);
        if prediction.closed_volume {
            if let Some(m0) = self.initial_mass.get() {
                report.pressure_shift = correct_closed_volume(mesh, &mut fields.p, thermo.psi(), m0);
                hydrostatic.relative(p_rgh, &fields.p, rho);
            }
        }

        let eos_rho = thermo.rho_for(mesh, &fields.p);
        let rho = fields.rho.as_mut().ok_or(PressureError::MissingInput("rho"))?;
        report.density = Some(self.density.update(rho, &eos_rho, Some(relaxation.rho))?);
        Ok(())
    }
}

/// 显式松弛并刷新边界值
fn relax_field(mesh: &FvMesh, field: &mut VolScalarField, alpha: f64) {
    field.relax_with(alpha);
    field.correct_boundary_conditions(mesh);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{BoundaryKind, SurfaceScalarField, VolVectorField};
    use crate::mesh::MeshBuilder;
    use crate::momentum::FrozenMomentum;
    use glam::DVec3;

    #[test]
    fn test_invalid_controls_rejected() {
        let controls = PressureControls {
            n_correctors: 0,
            ..Default::default()
        };
        assert!(matches!(
            PressureCorrector::new(controls, EquationKind::Incompressible),
            Err(PressureError::Config(_))
        ));
    }

    #[test]
    fn test_compressible_requires_thermo() {
        let mesh = MeshBuilder::channel(2, 1, 2.0, 1.0).unwrap();
        let mut fields = FlowFields::compressible(
            VolScalarField::new("p", &mesh, 1e5),
            VolVectorField::new("U", &mesh, DVec3::ZERO),
            SurfaceScalarField::new("phi", &mesh, 0.0),
            VolScalarField::new("rho", &mesh, 1.0),
        );
        let kind = EquationKind::CompressibleSteady { transonic: false };
        let mut corrector = PressureCorrector::new(PressureControls::default(), kind).unwrap();
        let m = FrozenMomentum::uniform(mesh.n_cells(), 1.0);
        assert!(matches!(
            corrector.correct(&mesh, &mut fields, &m, None, &FvOptions::new()),
            Err(PressureError::MissingInput("thermo"))
        ));
    }

    #[test]
    fn test_reference_resolved_once() {
        let mesh = MeshBuilder::closed_box(3, 3, 1.0, 1.0, false).unwrap();
        let u = VolVectorField::new("U", &mesh, DVec3::ZERO)
            .with_patch(&mesh, "walls", BoundaryKind::FixedValue, DVec3::ZERO)
            .unwrap();
        let mut fields = FlowFields::incompressible(
            VolScalarField::new("p", &mesh, 0.0),
            u,
            SurfaceScalarField::new("phi", &mesh, 0.0),
        );
        let mut controls = PressureControls::default();
        controls.reference.cell = 4;
        controls.reference.value = 1.5;
        let mut corrector = PressureCorrector::new(controls, EquationKind::Incompressible).unwrap();
        assert_eq!(corrector.reference(), None);

        let m = FrozenMomentum::uniform(mesh.n_cells(), 1.0);
        let report = corrector.correct(&mesh, &mut fields, &m, None, &FvOptions::new()).unwrap();
        assert!(report.closed_volume);
        assert_eq!(corrector.reference(), Some(ReferenceCell { cell: 4, value: 1.5 }));
        assert!(report.all_converged());
        assert!(!report.diverging);
    }
}
