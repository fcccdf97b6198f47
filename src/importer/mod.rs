// ==========================================
// SObject 数据加载 - 导入层
// ==========================================
// 主流程: 字段元数据 → 字段映射 → 关联记录解析 → 载荷整形
// 分支: 配置元数据对象 → XML 记录 → zip 部署包
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod metadata_packager;
pub mod pipeline;
pub mod progress;
pub mod query_builder;
pub mod related_resolver;
pub mod schema_resolver;
pub mod traits;
pub mod transformer;
pub mod value_coercion;

// 重导出核心类型
pub use error::{LoadError, LoadResult};
pub use field_mapper::{
    auto_map_fields, check_for_duplicate_field_mappings, reset_field_mapping, set_lookup_options,
    set_lookup_target, set_target_field,
};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use metadata_packager::{
    convert_to_custom_metadata, prepare_custom_metadata_package, CustomMetadataRecord,
    CustomMetadataRecords,
};
pub use pipeline::LoadPreparer;
pub use progress::{progress_channel, ProgressReporter, ProgressStream};
pub use query_builder::get_related_fields_queries;
pub use related_resolver::{RelatedRecordResolver, RelatedRecordsOutcome};
pub use schema_resolver::{is_loadable_sobject, SchemaFieldResolver};
pub use transformer::{field_headers, transform_data, TransformOptions};

// 重导出 Trait 接口
pub use traits::{FileParser, ParsedFile, QueryService, SchemaService};
