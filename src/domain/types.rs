// ==========================================
// SObject 数据加载 - 领域类型定义
// ==========================================
// 职责: 写入 API 变体 / 字段类型 / 关联查找策略
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// 流式批量 API 的空值占位符
pub const BULK_API_NULL_VALUE: &str = "#N/A";

/// 配置元数据对象后缀
pub const CUSTOM_METADATA_SUFFIX: &str = "__mdt";

/// 自定义字段后缀
pub const CUSTOM_FIELD_SUFFIX: &str = "__c";

// ==========================================
// 写入 API 变体 (API Mode)
// ==========================================
// Streaming: 流式批量格式（CSV 风格，扁平键）
// Batch: 组合/批处理格式（JSON，嵌套引用对象）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiMode {
    Streaming,
    #[default]
    Batch,
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiMode::Streaming => write!(f, "STREAMING"),
            ApiMode::Batch => write!(f, "BATCH"),
        }
    }
}

impl std::str::FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "STREAMING" | "BULK" => Ok(ApiMode::Streaming),
            "BATCH" => Ok(ApiMode::Batch),
            other => Err(format!("未知的 API 模式: {}", other)),
        }
    }
}

// ==========================================
// 无匹配策略 (No Match Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoMatchPolicy {
    #[default]
    Fail,    // 记录行错误
    Nullify, // 置空
}

// ==========================================
// 多匹配策略 (Multiple Match Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultipleMatchPolicy {
    #[default]
    Fail,     // 记录行错误
    UseFirst, // 取第一条
}

// ==========================================
// 字段类型 (Field Type)
// ==========================================
// 序列化格式: describe 返回的小写类型标签
// 未识别的类型保留原文（Other）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Id,
    Reference,
    String,
    Textarea,
    Boolean,
    Date,
    Datetime,
    Time,
    Int,
    Double,
    Currency,
    Percent,
    Email,
    Phone,
    Url,
    Picklist,
    Multipicklist,
    Base64,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Id => "id",
            FieldType::Reference => "reference",
            FieldType::String => "string",
            FieldType::Textarea => "textarea",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Time => "time",
            FieldType::Int => "int",
            FieldType::Double => "double",
            FieldType::Currency => "currency",
            FieldType::Percent => "percent",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Picklist => "picklist",
            FieldType::Multipicklist => "multipicklist",
            FieldType::Base64 => "base64",
            FieldType::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference)
    }
}

impl From<String> for FieldType {
    fn from(raw: String) -> Self {
        match raw.to_lowercase().as_str() {
            "id" => FieldType::Id,
            "reference" => FieldType::Reference,
            "string" => FieldType::String,
            "textarea" => FieldType::Textarea,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "datetime" => FieldType::Datetime,
            "time" => FieldType::Time,
            "int" => FieldType::Int,
            "double" => FieldType::Double,
            "currency" => FieldType::Currency,
            "percent" => FieldType::Percent,
            "email" => FieldType::Email,
            "phone" => FieldType::Phone,
            "url" => FieldType::Url,
            "picklist" => FieldType::Picklist,
            "multipicklist" => FieldType::Multipicklist,
            "base64" => FieldType::Base64,
            _ => FieldType::Other(raw),
        }
    }
}

impl From<&str> for FieldType {
    fn from(raw: &str) -> Self {
        FieldType::from(raw.to_string())
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
