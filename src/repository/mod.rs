// ==========================================
// SObject 数据加载 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: 所有查询使用参数化
// ==========================================

pub mod error;
pub mod field_metadata_cache;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use field_metadata_cache::FieldMetadataCache;
