use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// 班次代码：冶金厂三班倒
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShiftCode {
    #[serde(rename = "MORNING")]
    Morning,
    #[serde(rename = "DAY")]
    Day,
    #[serde(rename = "NIGHT")]
    Night,
}

impl ShiftCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftCode::Morning => "MORNING",
            ShiftCode::Day => "DAY",
            ShiftCode::Night => "NIGHT",
        }
    }

    /// 看板颜色编号（日历视图沿用的配色）
    pub fn color(&self) -> i32 {
        match self {
            ShiftCode::Morning => 10,
            ShiftCode::Day => 3,
            ShiftCode::Night => 0,
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for ShiftCode {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ShiftCode {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "MORNING" => Ok(ShiftCode::Morning),
            "DAY" => Ok(ShiftCode::Day),
            "NIGHT" => Ok(ShiftCode::Night),
            _ => Err(format!("Invalid shift code: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ShiftCode {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 工艺类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProcessType {
    #[serde(rename = "MAIN")]
    Main,
    #[serde(rename = "PARALLEL")]
    Parallel,
    #[serde(rename = "MAINTENANCE")]
    Maintenance,
}

impl ProcessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessType::Main => "MAIN",
            ProcessType::Parallel => "PARALLEL",
            ProcessType::Maintenance => "MAINTENANCE",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for ProcessType {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ProcessType {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "MAIN" => Ok(ProcessType::Main),
            "PARALLEL" => Ok(ProcessType::Parallel),
            "MAINTENANCE" => Ok(ProcessType::Maintenance),
            _ => Err(format!("Invalid process type: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ProcessType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 排班计划的工艺过滤器（向导可以同时选择主工艺和辅助作业）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProcessFilter {
    #[serde(rename = "MAIN")]
    Main,
    #[serde(rename = "PARALLEL")]
    Parallel,
    #[serde(rename = "BOTH")]
    Both,
}

impl ProcessFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessFilter::Main => "MAIN",
            ProcessFilter::Parallel => "PARALLEL",
            ProcessFilter::Both => "BOTH",
        }
    }

    /// 过滤器展开成具体工艺类型集合
    pub fn process_types(&self) -> &'static [ProcessType] {
        match self {
            ProcessFilter::Main => &[ProcessType::Main],
            ProcessFilter::Parallel => &[ProcessType::Parallel],
            ProcessFilter::Both => &[ProcessType::Main, ProcessType::Parallel],
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for ProcessFilter {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ProcessFilter {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "MAIN" => Ok(ProcessFilter::Main),
            "PARALLEL" => Ok(ProcessFilter::Parallel),
            "BOTH" => Ok(ProcessFilter::Both),
            _ => Err(format!("Invalid process filter: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ProcessFilter {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 任务阶段：计划 -> 进行中 -> 已完成
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskStage {
    #[serde(rename = "PLANNED")]
    Planned,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl TaskStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStage::Planned => "PLANNED",
            TaskStage::InProgress => "IN_PROGRESS",
            TaskStage::Completed => "COMPLETED",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskStage {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskStage {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "PLANNED" => Ok(TaskStage::Planned),
            "IN_PROGRESS" => Ok(TaskStage::InProgress),
            "COMPLETED" => Ok(TaskStage::Completed),
            _ => Err(format!("Invalid task stage: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskStage {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 质检结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QualityStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "ACCEPTED")]
    Accepted,
    #[serde(rename = "REJECTED")]
    Rejected,
}

impl QualityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityStatus::Pending => "PENDING",
            QualityStatus::Accepted => "ACCEPTED",
            QualityStatus::Rejected => "REJECTED",
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for QualityStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for QualityStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "PENDING" => Ok(QualityStatus::Pending),
            "ACCEPTED" => Ok(QualityStatus::Accepted),
            "REJECTED" => Ok(QualityStatus::Rejected),
            _ => Err(format!("Invalid quality status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for QualityStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 产品类型（仅用于创建请求，不落库）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProductType {
    #[serde(rename = "STEEL")]
    Steel,
    #[serde(rename = "CAST_IRON")]
    CastIron,
    #[serde(rename = "NON_FERROUS")]
    NonFerrous,
    #[serde(rename = "ALLOY")]
    Alloy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PriorityLevel {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "URGENT")]
    Urgent,
}

/// 生产班次：固定的参考数据，运行期不修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    pub name: String,
    pub code: ShiftCode,
    pub start_hour: i32,
    pub end_hour: i32,
    pub active: bool,
}

impl Shift {
    /// 夜班跨午夜
    pub fn spans_midnight(&self) -> bool {
        self.end_hour <= self.start_hour
    }
}

/// 工种目录条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskType {
    pub id: i64,
    pub name: String,
    pub process_type: ProcessType,
    pub category: Option<String>,
    pub sequence: i32,
    pub active: bool,
}

/// 排班模板：周期性工作的蓝图，一个模板在多次计划运行中生成多条任务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: i64,
    pub sequence: i32,
    pub process_type: ProcessType,
    pub day_number: i32,
    pub shift_id: i64,
    pub task_type_id: i64,
    pub active: bool,
}

impl TaskTemplate {
    pub fn new(
        sequence: i32,
        process_type: ProcessType,
        day_number: i32,
        shift_id: i64,
        task_type_id: i64,
    ) -> Self {
        Self {
            id: 0, // 将由数据库生成
            sequence,
            process_type,
            day_number,
            shift_id,
            task_type_id,
            active: true,
        }
    }

    pub fn validate(&self) -> shiftplan_errors::PlanningResult<()> {
        if self.day_number <= 0 {
            return Err(shiftplan_errors::PlanningError::range_error(
                "day_number",
                "计划天数必须是正整数",
            ));
        }
        Ok(())
    }

    pub fn display_name(&self, shift_name: &str, task_type_name: Option<&str>) -> String {
        match task_type_name {
            Some(task_type) => format!(
                "{} - Day {} - {} - {}",
                self.process_type.as_str(),
                self.day_number,
                shift_name,
                task_type
            ),
            None => format!(
                "{} - Day {} - {}",
                self.process_type.as_str(),
                self.day_number,
                shift_name
            ),
        }
    }
}

/// 排班计划：一次模板展开的参数及其生成的任务系列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub start_shift: i32,
    pub shift_count: i32,
    pub maintenance_days: i32,
    pub process_type: ProcessFilter,
    pub start_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(
        name: String,
        project_id: i64,
        start_shift: i32,
        shift_count: i32,
        maintenance_days: i32,
        process_type: ProcessFilter,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0, // 将由数据库生成
            name,
            project_id,
            start_shift,
            shift_count,
            maintenance_days,
            process_type,
            start_date,
            created_at: Utc::now(),
        }
    }
}

/// 生产任务：一条具体的、带日期和班次的工作记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShiftTask {
    pub id: i64,
    pub name: String,
    pub project_id: i64,
    pub schedule_id: Option<i64>,
    pub process_type: ProcessType,
    pub shift_id: i64,
    pub shift_number: String,
    pub maintenance_day: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub task_type_id: Option<i64>,
    pub stage: TaskStage,
    pub auto_tracking: bool,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub employee_ids: Vec<i64>,
    pub quality_status: QualityStatus,
    pub material_consumption_kg: Option<f64>,
    pub people_fact: Option<i32>,
    pub problem_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShiftTask {
    pub fn is_planned(&self) -> bool {
        matches!(self.stage, TaskStage::Planned)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.stage, TaskStage::Completed)
    }

    /// 切换任务阶段并维护实际起止时间
    ///
    /// 进行中：补实际开始时间，清除实际结束时间；
    /// 已完成：补实际结束时间（开始时间缺失时一并回填）；
    /// 计划中：两个时间全部清除。
    pub fn apply_stage(&mut self, stage: TaskStage, now: DateTime<Utc>) {
        match stage {
            TaskStage::InProgress => {
                if self.actual_start.is_none() {
                    self.actual_start = Some(now);
                }
                self.actual_end = None;
            }
            TaskStage::Completed => {
                if self.actual_end.is_none() {
                    self.actual_end = Some(now);
                }
                if self.actual_start.is_none() {
                    self.actual_start = Some(now);
                }
            }
            TaskStage::Planned => {
                self.actual_start = None;
                self.actual_end = None;
            }
        }
        self.stage = stage;
        self.updated_at = now;
    }

    /// 生产周期展示串，例如 "Cycle 3 2026"
    pub fn production_cycle(&self) -> String {
        format!("Cycle {} {}", self.shift_number, self.start_date.year())
    }

    pub fn entity_description(&self) -> String {
        format!(
            "任务 '{}' (ID: {}, 工艺: {})",
            self.name,
            self.id,
            self.process_type.as_str()
        )
    }
}

/// 质检记录：独立追加，不随任务级联删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityControl {
    pub id: i64,
    pub name: String,
    pub task_id: i64,
    pub inspector_id: i64,
    pub status: QualityStatus,
    pub inspected_at: DateTime<Utc>,
    pub parameters: Option<String>,
    pub notes: Option<String>,
    pub measurement_data: Option<String>,
    pub product_batch: Option<String>,
    pub certificate_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QualityControl {
    pub fn new(name: String, task_id: i64, inspector_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            name,
            task_id,
            inspector_id,
            status: QualityStatus::Pending,
            inspected_at: now,
            parameters: None,
            notes: None,
            measurement_data: None,
            product_batch: None,
            certificate_number: None,
            created_at: now,
        }
    }
}

/// 自然日窗口 [00:00:00, 23:59:59.999999]，唯一性校验和接班扫描共用
pub fn calendar_day_window(
    ts: DateTime<Utc>,
) -> shiftplan_errors::PlanningResult<(DateTime<Utc>, DateTime<Utc>)> {
    let day = ts.date_naive();
    let start = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| shiftplan_errors::PlanningError::Internal("invalid day start".into()))?;
    let end = day
        .and_hms_micro_opt(23, 59, 59, 999_999)
        .ok_or_else(|| shiftplan_errors::PlanningError::Internal("invalid day end".into()))?;
    Ok((
        chrono::TimeZone::from_utc_datetime(&Utc, &start),
        chrono::TimeZone::from_utc_datetime(&Utc, &end),
    ))
}

/// 任务的质检状态 = 最近追加（id 最大）的质检记录的结果，无记录时为待检
pub fn derive_quality_status(controls: &[QualityControl]) -> QualityStatus {
    controls
        .iter()
        .max_by_key(|c| c.id)
        .map(|c| c.status)
        .unwrap_or(QualityStatus::Pending)
}
