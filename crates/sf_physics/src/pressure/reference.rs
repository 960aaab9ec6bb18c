// crates/sf_physics/src/pressure/reference.rs

//! 参考单元
//!
//! 求解变量没有任何固定水平的边界时，方程只确定到一个加性常数。
//! 参考单元在每次求解前把指定单元的值钉住。

use serde::{Deserialize, Serialize};
use sf_config::ReferenceConfig;

use super::context::EquationKind;
use super::error::{PressureError, PressureResult};
use crate::fields::VolScalarField;
use crate::numerics::FvMatrix;

/// 参考单元与参考值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCell {
    /// 单元索引
    pub cell: usize,
    /// 参考值
    pub value: f64,
}

impl ReferenceCell {
    /// 由边界条件判断是否需要参考单元
    ///
    /// 场有固定值边界时返回 `None`。瞬态可压方程含 `ψ` 时间项，不需要
    /// 钉住。
    pub fn resolve(
        kind: EquationKind,
        config: &ReferenceConfig,
        field: &VolScalarField,
    ) -> PressureResult<Option<Self>> {
        if !field.needs_reference() || !kind.is_steady() {
            return Ok(None);
        }
        let n_cells = field.internal().len();
        if config.cell >= n_cells {
            return Err(PressureError::ReferenceOutOfRange {
                cell: config.cell,
                n_cells,
            });
        }
        log::info!("{}: 参考单元 {}，参考值 {}", field.name(), config.cell, config.value);
        Ok(Some(Self {
            cell: config.cell,
            value: config.value,
        }))
    }

    /// 浮力方程取当前 `p_rgh` 在参考单元处的值
    pub fn with_current_value(self, field: &VolScalarField) -> Self {
        Self {
            value: field.internal()[self.cell],
            ..self
        }
    }

    /// 在矩阵上设置参考（下一次求解生效）
    pub fn pin(&self, matrix: &mut FvMatrix) -> PressureResult<()> {
        matrix.set_reference(self.cell, self.value)?;
        Ok(())
    }
}
