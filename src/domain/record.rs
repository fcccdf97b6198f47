// ==========================================
// SObject 数据加载 - 行记录结构
// ==========================================
// 职责: 输入行 / 输出载荷 / 行错误
// ==========================================

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

// ==========================================
// 单元格值 (Cell Value)
// ==========================================
// Empty: 空字符串或缺失
// Null: 关联解析后显式置空（写入时不受 insert_nulls 影响）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(from = "Option<String>")]
pub enum CellValue {
    Text(String),
    #[default]
    Empty,
    Null,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    /// 非空文本值
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(v) => CellValue::text(v),
            None => CellValue::Empty,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::text(value)
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Text(v) => serializer.serialize_str(v),
            CellValue::Empty => serializer.serialize_str(""),
            CellValue::Null => serializer.serialize_none(),
        }
    }
}

/// 输入行（列名 → 单元格值）
pub type InputRecord = HashMap<String, CellValue>;

/// 输出载荷行（键顺序即写入顺序）
pub type TransformedRow = Map<String, Value>;

/// 行级错误（同一行的多个原因合并为一条）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_index: usize,
    pub original_record: InputRecord,
    pub messages: Vec<String>,
}

/// 主流程输出
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareDataResponse {
    pub rows: Vec<TransformedRow>,
    pub errors: Vec<RowError>,
    pub query_errors: Vec<String>,
}

/// 由 (列名, 值) 对构造输入行
pub fn input_record<'a, I>(pairs: I) -> InputRecord
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), CellValue::text(v)))
        .collect()
}
