use thiserror::Error;


#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },
    #[error("排班计划未找到: {id}")]
    ScheduleNotFound { id: i64 },
    #[error("质检记录未找到: {id}")]
    ControlNotFound { id: i64 },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("同一班次的重复任务: 项目 {project_id}, 日期 {day}, 工艺 {process_type}, 班次 {shift_id}")]
    DuplicateTask {
        project_id: i64,
        day: String,
        process_type: String,
        shift_id: i64,
    },
    #[error("参数超出范围: {field} - {message}")]
    Range { field: String, message: String },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type PlanningResult<T> = Result<T, PlanningError>;

impl PlanningError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }
    pub fn schedule_not_found(id: i64) -> Self {
        Self::ScheduleNotFound { id }
    }
    pub fn control_not_found(id: i64) -> Self {
        Self::ControlNotFound { id }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn range_error<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        Self::Range {
            field: field.into(),
            message: msg.into(),
        }
    }
    /// 阻塞型校验错误：直接返回给调用方，不应重试
    pub fn is_blocking_validation(&self) -> bool {
        matches!(
            self,
            PlanningError::Configuration(_)
                | PlanningError::DuplicateTask { .. }
                | PlanningError::Range { .. }
        )
    }
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlanningError::Database(_) | PlanningError::DatabaseOperation(_)
        )
    }
    pub fn user_message(&self) -> &str {
        match self {
            PlanningError::TaskNotFound { .. } => "请求的任务不存在",
            PlanningError::ScheduleNotFound { .. } => "请求的排班计划不存在",
            PlanningError::ControlNotFound { .. } => "请求的质检记录不存在",
            PlanningError::Configuration(_) => "计划参数配置有误",
            PlanningError::DuplicateTask { .. } => "该班次已存在相同参数的任务",
            PlanningError::Range { .. } => "输入数据超出允许范围",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for PlanningError {
    fn from(err: serde_json::Error) -> Self {
        PlanningError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for PlanningError {
    fn from(err: anyhow::Error) -> Self {
        PlanningError::Internal(err.to_string())
    }
}
