// ==========================================
// SObject 数据加载 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 仅用于致命前置条件失败；行级错误与批次查询错误
//       收集在返回结构中，不经由此类型传播
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum LoadError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 前置条件错误 =====
    #[error("没有可处理的数据行")]
    EmptyDataset,

    #[error("没有任何已映射的字段")]
    NoMappedFields,

    #[error("映射表中不存在输入列: {0}")]
    UnknownColumn(String),

    #[error("无效的关联查找目标 (字段 {field}): {related}")]
    InvalidLookupTarget { field: String, related: String },

    #[error("配置元数据对象 {sobject} 缺少 DeveloperName 映射")]
    MissingDeveloperName { sobject: String },

    // ===== 远端服务错误 =====
    #[error("对象描述失败 ({sobject}): {message}")]
    SchemaServiceError { sobject: String, message: String },

    #[error("关联字段元数据查询失败: {0}")]
    MetadataQueryError(String),

    #[error("查询失败: {0}")]
    QueryError(String),

    // ===== 元数据包错误 =====
    #[error("元数据包生成失败: {0}")]
    PackageBuildError(String),

    // ===== 缓存错误 =====
    #[error("字段元数据缓存失败: {0}")]
    CacheError(String),

    #[error("JSON 序列化失败: {0}")]
    SerializationError(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for LoadError {
    fn from(err: csv::Error) -> Self {
        LoadError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for LoadError {
    fn from(err: calamine::Error) -> Self {
        LoadError::ExcelParseError(err.to_string())
    }
}

// 实现 From<zip::result::ZipError>
impl From<zip::result::ZipError> for LoadError {
    fn from(err: zip::result::ZipError) -> Self {
        LoadError::PackageBuildError(err.to_string())
    }
}

// 实现 From<quick_xml::Error>
impl From<quick_xml::Error> for LoadError {
    fn from(err: quick_xml::Error) -> Self {
        LoadError::PackageBuildError(err.to_string())
    }
}

// 实现 From<serde_json::Error>
impl From<serde_json::Error> for LoadError {
    fn from(err: serde_json::Error) -> Self {
        LoadError::SerializationError(err.to_string())
    }
}

// 实现 From<RepositoryError>
impl From<crate::repository::RepositoryError> for LoadError {
    fn from(err: crate::repository::RepositoryError) -> Self {
        LoadError::CacheError(err.to_string())
    }
}

/// Result 类型别名
pub type LoadResult<T> = Result<T, LoadError>;
