use shiftplan_errors::{PlanningError, PlanningResult};

use crate::entities::Shift;

/// 班次轮换表长度：早班 -> 白班 -> 夜班
pub const ROTATION_LEN: usize = 3;

/// 班次日历：按开始小时排序的固定轮换表，纯查表，无运行期变更
///
/// 显式构造后注入展开器和自动接班策略，不做全局注册表查询。
#[derive(Debug, Clone)]
pub struct ShiftCalendar {
    rotation: Vec<Shift>,
}

impl ShiftCalendar {
    /// 从班次参考数据构造轮换表，仅保留启用的班次
    pub fn new(shifts: Vec<Shift>) -> PlanningResult<Self> {
        let mut rotation: Vec<Shift> = shifts.into_iter().filter(|s| s.active).collect();
        rotation.sort_by_key(|s| s.start_hour);
        if rotation.len() != ROTATION_LEN {
            return Err(PlanningError::config_error(format!(
                "班次日历需要 {ROTATION_LEN} 个启用班次, 实际 {}",
                rotation.len()
            )));
        }
        Ok(Self { rotation })
    }

    /// 按 1 起始的绝对班次序号解析当班班次，只在 3 班轮换内取模
    pub fn resolve(&self, absolute_index: i64) -> &Shift {
        let slot = (absolute_index - 1).rem_euclid(ROTATION_LEN as i64) as usize;
        &self.rotation[slot]
    }

    pub fn rotation(&self) -> &[Shift] {
        &self.rotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ShiftCode;

    fn shifts() -> Vec<Shift> {
        vec![
            Shift {
                id: 3,
                name: "Night".to_string(),
                code: ShiftCode::Night,
                start_hour: 22,
                end_hour: 6,
                active: true,
            },
            Shift {
                id: 1,
                name: "Morning".to_string(),
                code: ShiftCode::Morning,
                start_hour: 6,
                end_hour: 14,
                active: true,
            },
            Shift {
                id: 2,
                name: "Day".to_string(),
                code: ShiftCode::Day,
                start_hour: 14,
                end_hour: 22,
                active: true,
            },
        ]
    }

    #[test]
    fn test_rotation_sorted_by_start_hour() {
        let calendar = ShiftCalendar::new(shifts()).unwrap();
        let codes: Vec<ShiftCode> = calendar.rotation().iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![ShiftCode::Morning, ShiftCode::Day, ShiftCode::Night]);
    }

    #[test]
    fn test_resolve_wraps_modulo_three() {
        let calendar = ShiftCalendar::new(shifts()).unwrap();
        assert_eq!(calendar.resolve(1).code, ShiftCode::Morning);
        assert_eq!(calendar.resolve(2).code, ShiftCode::Day);
        assert_eq!(calendar.resolve(3).code, ShiftCode::Night);
        assert_eq!(calendar.resolve(4).code, ShiftCode::Morning);
        assert_eq!(calendar.resolve(8).code, ShiftCode::Day);
    }

    #[test]
    fn test_inactive_shift_rejected() {
        let mut data = shifts();
        data[0].active = false;
        assert!(ShiftCalendar::new(data).is_err());
    }

    #[test]
    fn test_wrong_shift_count_rejected() {
        let mut data = shifts();
        data.push(Shift {
            id: 4,
            name: "Extra".to_string(),
            code: ShiftCode::Day,
            start_hour: 10,
            end_hour: 18,
            active: true,
        });
        assert!(ShiftCalendar::new(data).is_err());
    }
}
