// ==========================================
// SObject 数据加载 - 关联记录解析器
// ==========================================
// 职责: 非外部 ID 查找列的可读值 → 关联记录 ID
// 流程: 收集去重值 → 分批查询 → 按值汇总 ID → 逐行替换/记录错误 → 剔除失败行
// 约束: 查找列逐个处理，批次逐个执行（不并发），单批失败不中断
// 说明: 外部 ID 查找由写入 API 直接解析，在载荷整形阶段处理
// ==========================================

use crate::domain::mapping::{FieldMapping, FieldMappingItem};
use crate::domain::describe::record_str;
use crate::domain::record::{CellValue, InputRecord, RowError};
use crate::domain::types::{ApiMode, MultipleMatchPolicy, NoMatchPolicy, BULK_API_NULL_VALUE};
use crate::importer::progress::ProgressReporter;
use crate::importer::query_builder::get_related_fields_queries;
use crate::importer::traits::QueryService;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// 关联解析结果
#[derive(Debug, Clone, Default)]
pub struct RelatedRecordsOutcome {
    /// 保留的行（已替换为记录 ID）
    pub rows: Vec<InputRecord>,
    /// 保留行在输入中的原始下标
    pub row_indices: Vec<usize>,
    /// 行级错误（按行号升序）
    pub errors: Vec<RowError>,
    /// 批次查询错误
    pub query_errors: Vec<String>,
}

/// 按行号累积错误（同一行多条消息合并）
#[derive(Default)]
struct RowErrorCollector {
    by_row: BTreeMap<usize, RowError>,
}

impl RowErrorCollector {
    fn add(&mut self, row_index: usize, record: &InputRecord, message: String) {
        self.by_row
            .entry(row_index)
            .or_insert_with(|| RowError {
                row_index,
                original_record: record.clone(),
                messages: Vec::new(),
            })
            .messages
            .push(message);
    }

    fn has_error(&self, row_index: usize) -> bool {
        self.by_row.contains_key(&row_index)
    }

    fn into_errors(self) -> Vec<RowError> {
        self.by_row.into_values().collect()
    }
}

/// 千分位格式化计数
pub fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// 写入 API 对应的显式空值标记
pub fn explicit_null_marker(api_mode: ApiMode) -> CellValue {
    match api_mode {
        ApiMode::Batch => CellValue::Null,
        ApiMode::Streaming => CellValue::Text(BULK_API_NULL_VALUE.to_string()),
    }
}

/// 输入列中的去重非空值（保持首次出现顺序）
fn collect_related_values(rows: &[InputRecord], csv_field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(csv_field).and_then(CellValue::as_text))
        .filter(|value| seen.insert(*value))
        .map(str::to_string)
        .collect()
}

// ==========================================
// RelatedRecordResolver
// ==========================================
pub struct RelatedRecordResolver<'a, Q: QueryService> {
    query_service: &'a Q,
    sobject: String,
    api_mode: ApiMode,
}

impl<'a, Q: QueryService> RelatedRecordResolver<'a, Q> {
    /// # 参数
    /// - query_service: 查询服务
    /// - sobject: 查找字段所属对象
    /// - api_mode: 决定置空标记
    pub fn new(query_service: &'a Q, sobject: impl Into<String>, api_mode: ApiMode) -> Self {
        Self {
            query_service,
            sobject: sobject.into(),
            api_mode,
        }
    }

    /// 解析所有非外部 ID 查找列
    ///
    /// # 返回
    /// - RelatedRecordsOutcome: 剔除失败行后的数据 + 行错误 + 查询错误
    #[instrument(skip_all, fields(sobject = %self.sobject, rows = rows.len()))]
    pub async fn fetch_mapped_related_records(
        &self,
        mut rows: Vec<InputRecord>,
        mapping: &FieldMapping,
        progress: &mut ProgressReporter,
    ) -> RelatedRecordsOutcome {
        let lookup_items: Vec<&FieldMappingItem> = mapping
            .mapped_items()
            .filter(|item| item.is_non_external_id_lookup())
            .collect();

        let mut errors = RowErrorCollector::default();
        let mut query_errors = Vec::new();

        if !lookup_items.is_empty() {
            let step = 100.0 / lookup_items.len() as f64;
            for (item_idx, item) in lookup_items.iter().enumerate() {
                let current = item_idx as f64 * step;
                progress.report(current);
                self.resolve_item(item, &mut rows, &mut errors, &mut query_errors, progress, current, step)
                    .await;
            }
        }
        progress.report(100.0);

        // 剔除失败行
        let mut kept_rows = Vec::with_capacity(rows.len());
        let mut row_indices = Vec::with_capacity(rows.len());
        for (idx, row) in rows.into_iter().enumerate() {
            if !errors.has_error(idx) {
                kept_rows.push(row);
                row_indices.push(idx);
            }
        }

        let errors = errors.into_errors();
        if !errors.is_empty() || !query_errors.is_empty() {
            warn!(
                failed_rows = errors.len(),
                query_errors = query_errors.len(),
                "关联记录解析存在失败"
            );
        }
        info!(
            lookup_fields = lookup_items.len(),
            kept = kept_rows.len(),
            failed = errors.len(),
            "关联记录解析完成"
        );

        RelatedRecordsOutcome {
            rows: kept_rows,
            row_indices,
            errors,
            query_errors,
        }
    }

    /// 解析单个查找列
    #[allow(clippy::too_many_arguments)]
    async fn resolve_item(
        &self,
        item: &FieldMappingItem,
        rows: &mut [InputRecord],
        errors: &mut RowErrorCollector,
        query_errors: &mut Vec<String>,
        progress: &mut ProgressReporter,
        current: f64,
        step: f64,
    ) {
        let (Some(related_object), Some(related_field)) = (
            item.selected_reference_to.as_deref(),
            item.target_lookup_field.as_deref(),
        ) else {
            warn!(csv_field = %item.csv_field, "查找映射缺少关联对象或查找字段，跳过");
            return;
        };

        let related_values = collect_related_values(rows, &item.csv_field);
        if related_values.is_empty() {
            return;
        }

        // 值 → 全部匹配记录 ID
        let mut ids_by_value: HashMap<String, Vec<String>> = HashMap::new();
        let queries = get_related_fields_queries(&self.sobject, related_object, related_field, &related_values);
        let total = queries.len();
        for (query_idx, query) in queries.iter().enumerate() {
            let increment = ((query_idx + 1) as f64 / total as f64) * step;
            progress.report((current + increment).min(current + step));

            debug!(csv_field = %item.csv_field, batch = query_idx + 1, total, "执行关联记录查询");
            match self.query_service.query(query).await {
                Ok(result) => {
                    for record in &result.records {
                        if let (Some(value), Some(id)) =
                            (record_str(record, related_field), record_str(record, "Id"))
                        {
                            ids_by_value
                                .entry(value.to_string())
                                .or_default()
                                .push(id.to_string());
                        }
                    }
                }
                Err(e) => {
                    warn!(csv_field = %item.csv_field, error = %e, "关联记录查询失败，继续后续批次");
                    query_errors.push(e.to_string());
                }
            }
        }

        let relationship = item.relationship_path();
        for (row_idx, row) in rows.iter_mut().enumerate() {
            let Some(value) = row.get(&item.csv_field).and_then(CellValue::as_text).map(str::to_string) else {
                continue;
            };

            match ids_by_value.get(&value).map(Vec::as_slice) {
                None | Some([]) => match item.on_no_match {
                    NoMatchPolicy::Nullify => {
                        row.insert(item.csv_field.clone(), explicit_null_marker(self.api_mode));
                    }
                    NoMatchPolicy::Fail => errors.add(
                        row_idx,
                        row,
                        format!(
                            "Related record not found for relationship \"{}\" with a value of \"{}\".",
                            relationship, value
                        ),
                    ),
                },
                Some([id]) => {
                    row.insert(item.csv_field.clone(), CellValue::Text(id.clone()));
                }
                Some(ids) => match item.on_multiple_matches {
                    // 远端返回顺序不保证稳定，取第一条
                    MultipleMatchPolicy::UseFirst => {
                        row.insert(item.csv_field.clone(), CellValue::Text(ids[0].clone()));
                    }
                    MultipleMatchPolicy::Fail => errors.add(
                        row_idx,
                        row,
                        format!(
                            "Found {} related records for relationship \"{}\" with a value of \"{}\".",
                            format_count(ids.len()),
                            relationship,
                            value
                        ),
                    ),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::input_record;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_collect_related_values_dedup_and_skip_empty() {
        let rows = vec![
            input_record([("Account", "Acme")]),
            input_record([("Account", "")]),
            input_record([("Account", "Globex")]),
            input_record([("Account", "Acme")]),
            input_record([("Other", "x")]),
        ];
        assert_eq!(collect_related_values(&rows, "Account"), vec!["Acme", "Globex"]);
    }

    #[test]
    fn test_error_collector_merges_messages() {
        let row = input_record([("A", "1")]);
        let mut collector = RowErrorCollector::default();
        collector.add(4, &row, "first".to_string());
        collector.add(1, &row, "other".to_string());
        collector.add(4, &row, "second".to_string());

        let errors = collector.into_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].row_index, 1);
        assert_eq!(errors[1].messages, vec!["first", "second"]);
    }

    #[test]
    fn test_explicit_null_marker() {
        assert_eq!(explicit_null_marker(ApiMode::Batch), CellValue::Null);
        assert_eq!(
            explicit_null_marker(ApiMode::Streaming),
            CellValue::Text(BULK_API_NULL_VALUE.to_string())
        );
    }
}
