// ==========================================
// SObject 数据加载 - 加载选项
// ==========================================
// 来源: 调用方 JSON / config_kv 持久化默认值
// ==========================================

use crate::domain::types::ApiMode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DATE_FORMAT: &str = "MM/DD/YYYY";
pub const DEFAULT_API_VERSION: &str = "v60.0";

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

/// 调用方加载选项（缺失字段取默认值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadOptions {
    pub api_mode: ApiMode,
    /// 空单元格是否显式写入空值
    pub insert_nulls: bool,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// 作为附件正文的字段（映射时标记）
    pub binary_body_field: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            api_mode: ApiMode::default(),
            insert_nulls: false,
            date_format: default_date_format(),
            binary_body_field: None,
            api_version: default_api_version(),
        }
    }
}

impl LoadOptions {
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LoadOptions::default();
        assert_eq!(options.api_mode, ApiMode::Batch);
        assert!(!options.insert_nulls);
        assert_eq!(options.date_format, "MM/DD/YYYY");
        assert_eq!(options.api_version, "v60.0");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = LoadOptions::from_json_str(r#"{"apiMode":"STREAMING","insertNulls":true}"#).unwrap();
        assert_eq!(options.api_mode, ApiMode::Streaming);
        assert!(options.insert_nulls);
        assert_eq!(options.date_format, DEFAULT_DATE_FORMAT);
        assert!(options.binary_body_field.is_none());
    }
}
