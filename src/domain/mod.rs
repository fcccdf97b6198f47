// ==========================================
// SObject 数据加载 - 领域层
// ==========================================
// 职责: 字段元数据 / 映射 / 行记录 / 远端响应结构
// ==========================================

pub mod describe;
pub mod field;
pub mod mapping;
pub mod record;
pub mod types;

// 重导出核心类型
pub use describe::{DescribeField, DescribeSObjectResult, GlobalSObject, QueryResult};
pub use field::{FieldDescriptor, RelatedField, RelatedFieldCatalog};
pub use mapping::{FieldMapping, FieldMappingItem};
pub use record::{CellValue, InputRecord, PrepareDataResponse, RowError, TransformedRow};
pub use types::{ApiMode, FieldType, MultipleMatchPolicy, NoMatchPolicy};
