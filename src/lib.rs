// ==========================================
// SObject 数据加载 - 核心库
// ==========================================
// 职责: 字段映射、关联记录解析、载荷整形、配置元数据打包
// 边界: 远端描述/查询服务通过 trait 注入；写入操作不在本库范围内
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 字段元数据 / 映射 / 行记录
pub mod domain;

// 数据仓储层 - 字段元数据缓存
pub mod repository;

// 导入层 - 映射与整形
pub mod importer;

// 配置层 - 加载选项
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    ApiMode, CellValue, FieldDescriptor, FieldMapping, FieldMappingItem, FieldType,
    InputRecord, MultipleMatchPolicy, NoMatchPolicy, PrepareDataResponse, RowError,
    TransformedRow,
};

pub use config::{ConfigManager, LoadOptions};
pub use importer::{LoadError, LoadPreparer, LoadResult, QueryService, SchemaService};
pub use repository::{FieldMetadataCache, RepositoryError, RepositoryResult};

// ==========================================
// 版本信息
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "sobject-loader";
