// ==========================================
// SObject 数据加载 - 远端服务响应结构
// ==========================================
// 职责: describe / query 响应的最小形状
// 说明: 只声明核心逻辑需要的字段，其余字段忽略
// ==========================================

use crate::domain::types::FieldType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// describe 返回的对象描述
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeSObjectResult {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<DescribeField>,
}

/// describe 返回的原始字段定义
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub soap_type: String,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub updateable: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub type_label: Option<String>,
    #[serde(default)]
    pub reference_to: Vec<String>,
    #[serde(default)]
    pub relationship_name: Option<String>,
}

/// 全局 describe 中的对象条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSObject {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub createable: bool,
    #[serde(default)]
    pub updateable: bool,
}

/// 查询服务返回结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub records: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn new(records: Vec<Map<String, Value>>) -> Self {
        Self { records }
    }
}

/// 读取记录中的字符串字段，支持 `A.B` 形式的嵌套路径
pub fn record_str<'a>(record: &'a Map<String, Value>, path: &str) -> Option<&'a str> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = record.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    current.as_str()
}

/// 读取记录中的布尔字段
pub fn record_bool(record: &Map<String, Value>, key: &str) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_field_defaults() {
        let field: DescribeField = serde_json::from_value(json!({
            "name": "AccountId",
            "label": "Account ID",
            "type": "reference",
            "referenceTo": ["Account"],
            "relationshipName": "Account"
        }))
        .unwrap();

        assert_eq!(field.field_type, FieldType::Reference);
        assert!(!field.createable);
        assert_eq!(field.reference_to, vec!["Account".to_string()]);
        assert_eq!(field.relationship_name.as_deref(), Some("Account"));
    }

    #[test]
    fn test_record_str_nested_path() {
        let record = json!({
            "Name": "Email",
            "EntityDefinition": { "QualifiedApiName": "Contact" }
        });
        let record = record.as_object().unwrap();

        assert_eq!(record_str(record, "Name"), Some("Email"));
        assert_eq!(record_str(record, "EntityDefinition.QualifiedApiName"), Some("Contact"));
        assert_eq!(record_str(record, "EntityDefinition.Missing"), None);
    }
}
