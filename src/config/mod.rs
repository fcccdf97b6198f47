// ==========================================
// SObject 数据加载 - 配置层
// ==========================================
// 职责: 加载选项定义与持久化默认值（支持分级覆写）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod load_options;

// 重导出核心配置类型
pub use config_manager::{config_keys, ConfigManager, GLOBAL_SCOPE};
pub use load_options::{LoadOptions, DEFAULT_API_VERSION, DEFAULT_DATE_FORMAT};
