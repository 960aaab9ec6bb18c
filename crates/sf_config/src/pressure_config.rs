// crates/sf_config/src/pressure_config.rs

//! PressureControls - 压力修正控制参数
//!
//! 汇总一次外迭代中压力方程相关的全部开关：非正交修正次数、
//! PISO 修正次数、跨音速模式、参考单元、松弛因子、密度上下限、
//! 线性求解器设置与发散监测阈值。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

/// 压力修正控制参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureControls {
    /// 非正交修正次数（循环执行 n + 1 次求解）
    #[serde(default)]
    pub n_non_orth_correctors: usize,

    /// 每个时间步的 PISO 压力修正次数
    #[serde(default = "default_n_correctors")]
    pub n_correctors: usize,

    /// 跨音速模式
    #[serde(default)]
    pub transonic: bool,

    /// 参考单元
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// 松弛因子
    #[serde(default)]
    pub relaxation: RelaxationFactors,

    /// 密度上下限
    #[serde(default)]
    pub density: DensityLimits,

    /// 线性求解器
    #[serde(default)]
    pub linear_solver: LinearSolverConfig,

    /// 不收敛监测
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// 浮力参数
    #[serde(default)]
    pub buoyancy: BuoyancyConfig,

    /// 时间步长 [s]（仅瞬态）
    #[serde(default = "default_delta_t")]
    pub delta_t: f64,
}

fn default_n_correctors() -> usize { 2 }
fn default_delta_t() -> f64 { 1e-3 }

impl Default for PressureControls {
    fn default() -> Self {
        Self {
            n_non_orth_correctors: 0,
            n_correctors: default_n_correctors(),
            transonic: false,
            reference: ReferenceConfig::default(),
            relaxation: RelaxationFactors::default(),
            density: DensityLimits::default(),
            linear_solver: LinearSolverConfig::default(),
            monitor: MonitorConfig::default(),
            buoyancy: BuoyancyConfig::default(),
            delta_t: default_delta_t(),
        }
    }
}

/// 参考单元配置
///
/// 仅当边界条件不固定压力水平（闭域）时生效。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ReferenceConfig {
    /// 参考单元索引
    #[serde(default)]
    pub cell: usize,

    /// 参考值 [Pa]
    #[serde(default)]
    pub value: f64,
}

/// 松弛因子
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxationFactors {
    /// 压力场显式松弛
    #[serde(default = "default_relax_p")]
    pub p: f64,

    /// p_rgh 场显式松弛
    #[serde(default = "default_relax_p_rgh")]
    pub p_rgh: f64,

    /// 密度场松弛
    #[serde(default = "default_relax_rho")]
    pub rho: f64,

    /// 压力方程矩阵松弛（隐式）
    #[serde(default = "default_relax_equation")]
    pub p_equation: f64,
}

fn default_relax_p() -> f64 { 0.3 }
fn default_relax_p_rgh() -> f64 { 0.7 }
fn default_relax_rho() -> f64 { 1.0 }
fn default_relax_equation() -> f64 { 1.0 }

impl Default for RelaxationFactors {
    fn default() -> Self {
        Self {
            p: default_relax_p(),
            p_rgh: default_relax_p_rgh(),
            rho: default_relax_rho(),
            p_equation: default_relax_equation(),
        }
    }
}

/// 持续截断策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ClipPolicy {
    /// 始终只警告
    #[default]
    Warn,
    /// 连续截断达到给定次数后报错
    FatalAfter {
        /// 允许的连续截断外迭代数
        iterations: usize,
    },
}

/// 密度上下限
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DensityLimits {
    /// 最小密度 [kg/m³]
    #[serde(default = "default_rho_min")]
    pub rho_min: f64,

    /// 最大密度 [kg/m³]
    #[serde(default = "default_rho_max")]
    pub rho_max: f64,

    /// 持续截断策略
    #[serde(default)]
    pub clip_policy: ClipPolicy,
}

fn default_rho_min() -> f64 { 0.01 }
fn default_rho_max() -> f64 { 100.0 }

impl Default for DensityLimits {
    fn default() -> Self {
        Self {
            rho_min: default_rho_min(),
            rho_max: default_rho_max(),
            clip_policy: ClipPolicy::default(),
        }
    }
}

/// 线性求解器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LinearSolverKind {
    /// 对称矩阵用 PCG，含对流项用 BiCGStab
    #[default]
    Auto,
    /// 预条件共轭梯度
    Pcg,
    /// 稳定双共轭梯度
    BiCgStab,
}

/// 预条件器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PreconditionerKind {
    /// 无预条件
    None,
    /// Jacobi 对角预条件
    #[default]
    Jacobi,
    /// 不完全 LU 分解
    Ilu0,
}

/// 线性求解器配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearSolverConfig {
    /// 求解器类型
    #[serde(default)]
    pub kind: LinearSolverKind,

    /// 预条件器
    #[serde(default)]
    pub preconditioner: PreconditionerKind,

    /// 相对容差
    #[serde(default = "default_rtol")]
    pub rtol: f64,

    /// 绝对容差
    #[serde(default = "default_atol")]
    pub atol: f64,

    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
}

fn default_rtol() -> f64 { 1e-10 }
fn default_atol() -> f64 { 1e-14 }
fn default_max_iter() -> usize { 2000 }

impl Default for LinearSolverConfig {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::default(),
            preconditioner: PreconditionerKind::default(),
            rtol: default_rtol(),
            atol: default_atol(),
            max_iter: default_max_iter(),
        }
    }
}

/// 不收敛监测配置
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// 连续不收敛外迭代数达到该值时报告发散
    #[serde(default = "default_divergence_threshold")]
    pub divergence_threshold: usize,
}

fn default_divergence_threshold() -> usize { 20 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: default_divergence_threshold(),
        }
    }
}

/// 浮力参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuoyancyConfig {
    /// 重力加速度向量 [m/s²]
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],

    /// 参考高度 [m]，ghRef = g · hRef
    #[serde(default)]
    pub h_ref: f64,
}

fn default_gravity() -> [f64; 3] { [0.0, -9.81, 0.0] }

impl Default for BuoyancyConfig {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            h_ref: 0.0,
        }
    }
}

impl PressureControls {
    /// 非正交循环总次数
    #[inline]
    pub fn n_non_orth_iterations(&self) -> usize {
        self.n_non_orth_correctors + 1
    }

    /// 从 JSON 字符串加载配置
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: PressureControls = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&content)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let relax = [
            ("relaxation.p", self.relaxation.p),
            ("relaxation.p_rgh", self.relaxation.p_rgh),
            ("relaxation.rho", self.relaxation.rho),
            ("relaxation.p_equation", self.relaxation.p_equation),
        ];
        for (key, alpha) in relax {
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(ConfigError::invalid(key, alpha, "松弛因子必须在 (0, 1] 范围内"));
            }
        }

        if self.n_correctors == 0 {
            return Err(ConfigError::invalid(
                "n_correctors",
                self.n_correctors,
                "至少需要一次压力修正",
            ));
        }

        // 密度上下限
        if !(self.density.rho_min > 0.0) {
            return Err(ConfigError::invalid(
                "density.rho_min",
                self.density.rho_min,
                "rho_min 必须为正",
            ));
        }
        if self.density.rho_max <= self.density.rho_min {
            return Err(ConfigError::invalid(
                "density.rho_max",
                self.density.rho_max,
                "rho_max 必须大于 rho_min",
            ));
        }
        if let ClipPolicy::FatalAfter { iterations: 0 } = self.density.clip_policy {
            return Err(ConfigError::invalid(
                "density.clip_policy.iterations",
                0,
                "至少允许一次截断",
            ));
        }

        // 线性求解器
        let ls = &self.linear_solver;
        if !(ls.rtol > 0.0 && ls.rtol < 1.0) {
            return Err(ConfigError::invalid("linear_solver.rtol", ls.rtol, "rtol 必须在 (0, 1) 内"));
        }
        if ls.atol < 0.0 {
            return Err(ConfigError::invalid("linear_solver.atol", ls.atol, "atol 不能为负"));
        }
        if ls.max_iter == 0 {
            return Err(ConfigError::invalid("linear_solver.max_iter", ls.max_iter, "必须为正"));
        }

        if self.monitor.divergence_threshold == 0 {
            return Err(ConfigError::invalid(
                "monitor.divergence_threshold",
                0,
                "阈值必须为正",
            ));
        }

        if !(self.delta_t > 0.0) {
            return Err(ConfigError::invalid("delta_t", self.delta_t, "时间步长必须为正"));
        }

        if self.buoyancy.gravity.iter().any(|g| !g.is_finite()) {
            return Err(ConfigError::invalid(
                "buoyancy.gravity",
                format!("{:?}", self.buoyancy.gravity),
                "重力分量必须有限",
            ));
        }

        Ok(())
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PressureControls::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.n_non_orth_iterations(), 1);
        assert_eq!(config.density.clip_policy, ClipPolicy::Warn);
    }

    #[test]
    fn test_invalid_relaxation() {
        let mut config = PressureControls::default();
        config.relaxation.p = 0.0;
        assert!(config.validate().is_err());

        config.relaxation.p = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_density_limits() {
        let mut config = PressureControls::default();
        config.density.rho_max = config.density.rho_min;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "density.rho_max"
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "n_non_orth_correctors": 2, "transonic": true,
                        "density": { "clip_policy": { "kind": "fatal_after", "iterations": 5 } } }"#;
        let config = PressureControls::from_json_str(json).unwrap();
        assert_eq!(config.n_non_orth_iterations(), 3);
        assert!(config.transonic);
        assert_eq!(config.n_correctors, 2);
        assert_eq!(
            config.density.clip_policy,
            ClipPolicy::FatalAfter { iterations: 5 }
        );
        assert_eq!(config.linear_solver.kind, LinearSolverKind::Auto);
    }

    #[test]
    fn test_fatal_after_zero_rejected() {
        let json = r#"{ "density": { "clip_policy": { "kind": "fatal_after", "iterations": 0 } } }"#;
        assert!(PressureControls::from_json_str(json).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pressure.json");

        let mut config = PressureControls::default();
        config.reference = ReferenceConfig { cell: 3, value: 1.0e5 };
        config.linear_solver.preconditioner = PreconditionerKind::Ilu0;
        config.save_to_file(&path).unwrap();

        let loaded = PressureControls::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let err = PressureControls::from_file("/nonexistent/pressure.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
