// ==========================================
// SObject 数据加载 - 载荷整形
// ==========================================
// 职责: 输入行 → 指定写入 API 变体的载荷结构
// 空值策略:
// - STREAMING + insert_nulls → "#N/A"
// - BATCH + insert_nulls → null
// - BATCH 且不插入空值 → 省略该键（BATCH 传 null 会清空远端已有值）
// - STREAMING 且不插入空值 → 空字符串
// ==========================================

use crate::domain::mapping::{FieldMapping, FieldMappingItem};
use crate::domain::record::{CellValue, InputRecord, TransformedRow};
use crate::domain::types::{ApiMode, BULK_API_NULL_VALUE};
use crate::importer::value_coercion::transform_value;
use serde_json::{json, Map, Value};

/// 载荷整形参数
#[derive(Debug, Clone)]
pub struct TransformOptions<'a> {
    pub sobject: &'a str,
    pub api_mode: ApiMode,
    pub insert_nulls: bool,
    pub date_format: &'a str,
}

/// 单元格 → 载荷值；None 表示省略该键
fn resolve_value(
    cell: Option<&CellValue>,
    item: &FieldMappingItem,
    options: &TransformOptions<'_>,
) -> Option<Value> {
    match cell {
        Some(CellValue::Text(value)) => {
            let field_type = item.field_metadata.as_ref().map(|f| &f.field_type);
            Some(match field_type {
                Some(field_type) => transform_value(value, field_type, options.date_format),
                None => Value::String(value.clone()),
            })
        }
        // 关联解析阶段写入的显式空值
        Some(CellValue::Null) => Some(match options.api_mode {
            ApiMode::Batch => Value::Null,
            ApiMode::Streaming => Value::String(BULK_API_NULL_VALUE.to_string()),
        }),
        None | Some(CellValue::Empty) => match (options.api_mode, options.insert_nulls) {
            (ApiMode::Streaming, true) => Some(Value::String(BULK_API_NULL_VALUE.to_string())),
            (ApiMode::Batch, true) => Some(Value::Null),
            (ApiMode::Batch, false) => None,
            (ApiMode::Streaming, false) => Some(Value::String(String::new())),
        },
    }
}

/// 将值写入载荷（处理外部 ID 查找与多态引用）
fn place_value(output: &mut TransformedRow, item: &FieldMappingItem, value: Value, api_mode: ApiMode) {
    let relationship_name = item.relationship_name.as_deref().unwrap_or_default();
    let target_lookup_field = item.target_lookup_field.as_deref().unwrap_or_default();

    if item.is_external_id_lookup() {
        match api_mode {
            ApiMode::Batch => {
                let mut reference = Map::new();
                if item.is_polymorphic() {
                    reference.insert(
                        "attributes".to_string(),
                        json!({ "type": item.selected_reference_to.as_deref().unwrap_or_default() }),
                    );
                }
                reference.insert(target_lookup_field.to_string(), value);
                output.insert(relationship_name.to_string(), Value::Object(reference));
            }
            ApiMode::Streaming => {
                let key = if item.is_polymorphic() {
                    format!(
                        "{}:{}.{}",
                        item.selected_reference_to.as_deref().unwrap_or_default(),
                        relationship_name,
                        target_lookup_field
                    )
                } else {
                    format!("{}.{}", relationship_name, target_lookup_field)
                };
                output.insert(key, value);
            }
        }
    } else if let Some(target_field) = &item.target_field {
        output.insert(target_field.clone(), value);
    }
}

/// 整形单行
pub fn transform_row(
    row: &InputRecord,
    mapping: &FieldMapping,
    options: &TransformOptions<'_>,
) -> TransformedRow {
    let mut output = TransformedRow::new();
    for (i, item) in mapping.mapped_items().enumerate() {
        if options.api_mode == ApiMode::Batch && i == 0 {
            output.insert("attributes".to_string(), json!({ "type": options.sobject }));
        }
        if let Some(value) = resolve_value(row.get(&item.csv_field), item, options) {
            place_value(&mut output, item, value, options.api_mode);
        }
    }
    output
}

/// 整形全部行（输出顺序与输入一致）
pub fn transform_data(
    rows: &[InputRecord],
    mapping: &FieldMapping,
    options: &TransformOptions<'_>,
) -> Vec<TransformedRow> {
    rows.iter()
        .map(|row| transform_row(row, mapping, options))
        .collect()
}

/// 流式批量 API 的表头（外部 ID 查找列使用关联路径）
pub fn field_headers(mapping: &FieldMapping) -> Vec<String> {
    mapping
        .mapped_items()
        .filter_map(|item| {
            if item.is_external_id_lookup() {
                Some(item.relationship_path())
            } else {
                item.target_field.clone()
            }
        })
        .collect()
}
