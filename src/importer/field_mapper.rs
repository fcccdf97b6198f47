// ==========================================
// SObject 数据加载 - 字段映射引擎
// ==========================================
// 职责: 输入列 → 目标字段 自动匹配 + 手工调整 + 重复映射检测
// 匹配优先级: API 名(精确/小写/去符号) > 标签(精确/小写/去符号)
// 关联列: `base.related` 在 base 字段的关联目录中查找 related
// ==========================================

use crate::domain::field::FieldDescriptor;
use crate::domain::mapping::{FieldMapping, FieldMappingItem};
use crate::domain::types::{MultipleMatchPolicy, NoMatchPolicy};
use crate::importer::error::{LoadError, LoadResult};
use std::collections::HashMap;
use tracing::{debug, info};

/// 小写后仅保留 ASCII 字母数字
fn strip_non_alphanumeric(value: &str) -> String {
    value.chars().filter(char::is_ascii_alphanumeric).collect()
}

// ==========================================
// 三级索引: 精确 / 小写 / 去符号小写
// ==========================================
// 同一级别内后插入者覆盖先插入者
#[derive(Default)]
struct TieredIndex<'a> {
    exact: HashMap<String, &'a FieldDescriptor>,
    lower: HashMap<String, &'a FieldDescriptor>,
    stripped: HashMap<String, &'a FieldDescriptor>,
}

impl<'a> TieredIndex<'a> {
    fn insert_exact_and_lower(&mut self, key: &str, field: &'a FieldDescriptor) {
        self.exact.insert(key.to_string(), field);
        self.lower.insert(key.to_lowercase(), field);
    }

    fn insert_stripped(&mut self, key: &str, field: &'a FieldDescriptor) {
        let stripped = strip_non_alphanumeric(&key.to_lowercase());
        if !stripped.is_empty() {
            self.stripped.insert(stripped, field);
        }
    }

    fn insert_all_tiers(&mut self, key: &str, field: &'a FieldDescriptor) {
        self.insert_exact_and_lower(key, field);
        self.insert_stripped(key, field);
    }

    fn lookup(&self, key: &str) -> Option<&'a FieldDescriptor> {
        let lower = key.to_lowercase();
        let stripped = strip_non_alphanumeric(&lower);
        self.exact
            .get(key)
            .or_else(|| self.lower.get(&lower))
            .or_else(|| {
                if stripped.is_empty() {
                    None
                } else {
                    self.stripped.get(&stripped)
                }
            })
            .copied()
    }
}

/// 目标字段匹配索引
struct FieldIndex<'a> {
    by_api_name: TieredIndex<'a>,
    by_label: TieredIndex<'a>,
}

impl<'a> FieldIndex<'a> {
    fn build(fields: &'a [FieldDescriptor]) -> Self {
        let mut by_api_name = TieredIndex::default();
        let mut by_label = TieredIndex::default();

        // 按字段顺序逐个写入；关联名别名只进入精确/小写两级
        for field in fields {
            by_api_name.insert_exact_and_lower(&field.name, field);
            if let Some(relationship_name) = &field.relationship_name {
                by_api_name.insert_exact_and_lower(relationship_name, field);
            }
            by_api_name.insert_stripped(&field.name, field);
            by_label.insert_all_tiers(&field.label, field);
        }

        Self {
            by_api_name,
            by_label,
        }
    }

    /// API 名匹配总是优先于标签匹配
    fn resolve(&self, base: &str) -> Option<&'a FieldDescriptor> {
        self.by_api_name
            .lookup(base)
            .or_else(|| self.by_label.lookup(base))
    }
}

fn is_binary_body(target_field: Option<&str>, binary_body_field: Option<&str>) -> bool {
    match (target_field, binary_body_field) {
        (Some(target), Some(binary)) => !binary.is_empty() && target == binary,
        _ => false,
    }
}

/// 将单个输入列匹配到目标字段
fn map_header(
    header: &str,
    index: &FieldIndex<'_>,
    binary_body_field: Option<&str>,
) -> FieldMappingItem {
    let mut item = FieldMappingItem::unmapped(header);

    let (base, related) = match header.split_once('.') {
        Some((base, related)) => (base, Some(related)),
        None => (header, None),
    };

    let Some(matched) = index.resolve(base) else {
        return item;
    };

    match related {
        None => {
            item.target_field = Some(matched.name.clone());
            item.field_metadata = Some(matched.clone());
        }
        Some(related) => {
            // 关联列找不到关联字段时整列不映射，不回退为直接字段
            if let Some((related_object, related_field)) = matched.find_related_field(related) {
                item.target_field = Some(matched.name.clone());
                item.field_metadata = Some(matched.clone());
                item.mapped_to_lookup = true;
                item.relationship_name = matched.relationship_name.clone();
                item.target_lookup_field = Some(related_field.name.clone());
                item.related_field_metadata = Some(related_field.clone());
                item.selected_reference_to = Some(related_object.to_string());
            } else {
                debug!(header = %header, field = %matched.name, "关联列未匹配到关联字段");
            }
        }
    }

    item.is_binary_body_field = is_binary_body(item.target_field.as_deref(), binary_body_field);
    item
}

/// 自动匹配输入列与目标字段
///
/// # 参数
/// - headers: 输入表头（顺序即映射顺序）
/// - fields: 丰富后的字段目录
/// - binary_body_field: 承载二进制内容的字段名（可选）
///
/// # 返回
/// - FieldMapping: 每个输入列一条，未匹配的 target_field 为 None
pub fn auto_map_fields<H: AsRef<str>>(
    headers: &[H],
    fields: &[FieldDescriptor],
    binary_body_field: Option<&str>,
) -> FieldMapping {
    let index = FieldIndex::build(fields);

    let mapping: FieldMapping = headers
        .iter()
        .map(|header| map_header(header.as_ref(), &index, binary_body_field))
        .collect();

    let mapping = check_for_duplicate_field_mappings(&mapping);
    info!(
        headers = mapping.len(),
        mapped = mapping.mapped_items().count(),
        lookups = mapping.items().filter(|i| i.mapped_to_lookup).count(),
        "字段自动映射完成"
    );
    mapping
}

/// 放弃自动映射：所有列置为未映射
pub fn reset_field_mapping<H: AsRef<str>>(headers: &[H]) -> FieldMapping {
    headers
        .iter()
        .map(|header| FieldMappingItem::unmapped(header.as_ref()))
        .collect()
}

/// 重复映射检测（纯函数，幂等）
///
/// 同一 target_field 被多个输入列映射时，相关条目全部标记为重复
pub fn check_for_duplicate_field_mappings(mapping: &FieldMapping) -> FieldMapping {
    let mut frequency: HashMap<&str, usize> = HashMap::new();
    for target in mapping.items().filter_map(|i| i.target_field.as_deref()) {
        *frequency.entry(target).or_insert(0) += 1;
    }

    mapping
        .items()
        .map(|item| {
            let mut item = item.clone();
            item.is_duplicate_mapped_field = item
                .target_field
                .as_deref()
                .map_or(false, |target| frequency.get(target).copied().unwrap_or(0) > 1);
            item
        })
        .collect()
}

fn existing_item<'m>(mapping: &'m FieldMapping, csv_field: &str) -> LoadResult<&'m FieldMappingItem> {
    mapping
        .get(csv_field)
        .ok_or_else(|| LoadError::UnknownColumn(csv_field.to_string()))
}

/// 手工指定（或清除）某列的直接目标字段
///
/// 查找策略保持不变，其余映射状态重建
pub fn set_target_field(
    mapping: &FieldMapping,
    csv_field: &str,
    field: Option<&FieldDescriptor>,
    binary_body_field: Option<&str>,
) -> LoadResult<FieldMapping> {
    let existing = existing_item(mapping, csv_field)?;

    let mut item = FieldMappingItem::unmapped(csv_field);
    item.on_no_match = existing.on_no_match;
    item.on_multiple_matches = existing.on_multiple_matches;
    if let Some(field) = field {
        item.target_field = Some(field.name.clone());
        item.field_metadata = Some(field.clone());
    }
    item.is_binary_body_field = is_binary_body(item.target_field.as_deref(), binary_body_field);

    Ok(check_for_duplicate_field_mappings(&mapping.with_item(item)))
}

/// 手工指定某列映射到引用字段的关联查找字段
///
/// # 参数
/// - field: 引用字段（需已解析关联目录）
/// - related_object: 选中的候选关联对象
/// - related_field_name: 关联对象上的查找字段
pub fn set_lookup_target(
    mapping: &FieldMapping,
    csv_field: &str,
    field: &FieldDescriptor,
    related_object: &str,
    related_field_name: &str,
) -> LoadResult<FieldMapping> {
    let existing = existing_item(mapping, csv_field)?;

    let related_field = field
        .related_fields
        .as_ref()
        .and_then(|catalog| catalog.get(related_object))
        .and_then(|fields| fields.iter().find(|f| f.name == related_field_name))
        .ok_or_else(|| LoadError::InvalidLookupTarget {
            field: field.name.clone(),
            related: format!("{}.{}", related_object, related_field_name),
        })?;

    let mut item = FieldMappingItem::unmapped(csv_field);
    item.on_no_match = existing.on_no_match;
    item.on_multiple_matches = existing.on_multiple_matches;
    item.target_field = Some(field.name.clone());
    item.field_metadata = Some(field.clone());
    item.mapped_to_lookup = true;
    item.relationship_name = field.relationship_name.clone();
    item.target_lookup_field = Some(related_field.name.clone());
    item.related_field_metadata = Some(related_field.clone());
    item.selected_reference_to = Some(related_object.to_string());

    Ok(check_for_duplicate_field_mappings(&mapping.with_item(item)))
}

/// 设置某列的关联查找策略
pub fn set_lookup_options(
    mapping: &FieldMapping,
    csv_field: &str,
    on_no_match: NoMatchPolicy,
    on_multiple_matches: MultipleMatchPolicy,
) -> LoadResult<FieldMapping> {
    let mut item = existing_item(mapping, csv_field)?.clone();
    item.on_no_match = on_no_match;
    item.on_multiple_matches = on_multiple_matches;
    Ok(mapping.with_item(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::field::{RelatedField, RelatedFieldCatalog};
    use crate::domain::types::FieldType;

    fn field(name: &str, label: &str) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            label: label.to_string(),
            field_type: FieldType::String,
            soap_type: "xsd:string".to_string(),
            external_id: false,
            type_label: None,
            reference_to: None,
            relationship_name: None,
            related_fields: None,
        }
    }

    fn account_lookup() -> FieldDescriptor {
        let mut catalog = RelatedFieldCatalog::new();
        catalog.insert(
            "Account".to_string(),
            vec![
                RelatedField {
                    name: "Name".to_string(),
                    label: "Account Name".to_string(),
                    field_type: FieldType::String,
                    is_external_id: false,
                },
                RelatedField {
                    name: "External_Id__c".to_string(),
                    label: "External Id".to_string(),
                    field_type: FieldType::String,
                    is_external_id: true,
                },
            ],
        );
        FieldDescriptor {
            field_type: FieldType::Reference,
            soap_type: "tns:ID".to_string(),
            reference_to: Some(vec!["Account".to_string()]),
            relationship_name: Some("Account".to_string()),
            related_fields: Some(catalog),
            ..field("AccountId", "Account ID")
        }
    }

    #[test]
    fn test_match_priority_levels() {
        let fields = vec![field("First_Name__c", "Given Name"), field("Phone", "Business Phone")];
        let mapping = auto_map_fields(&["first_name__c", "FIRST NAME C", "business phone"], &fields, None);

        assert_eq!(mapping.get("first_name__c").unwrap().target_field.as_deref(), Some("First_Name__c"));
        assert_eq!(mapping.get("FIRST NAME C").unwrap().target_field.as_deref(), Some("First_Name__c"));
        assert_eq!(mapping.get("business phone").unwrap().target_field.as_deref(), Some("Phone"));
    }

    #[test]
    fn test_api_name_outranks_label_at_any_level() {
        // "status" 小写匹配 API 名 Status，精确匹配另一个字段的标签
        let fields = vec![field("Status", "State"), field("Stage__c", "status")];
        let mapping = auto_map_fields(&["status"], &fields, None);
        assert_eq!(mapping.get("status").unwrap().target_field.as_deref(), Some("Status"));
    }

    #[test]
    fn test_later_field_wins_name_collision_with_alias() {
        let mut lookup = account_lookup();
        lookup.relationship_name = Some("Name".to_string());

        let fields = vec![lookup.clone(), field("Name", "Name")];
        let mapping = auto_map_fields(&["Name"], &fields, None);
        assert_eq!(mapping.get("Name").unwrap().target_field.as_deref(), Some("Name"));

        let fields = vec![field("Name", "Name"), lookup];
        let mapping = auto_map_fields(&["Name"], &fields, None);
        assert_eq!(mapping.get("Name").unwrap().target_field.as_deref(), Some("AccountId"));
    }

    #[test]
    fn test_later_field_wins_label_collision() {
        let fields = vec![field("Type", "Account Type"), field("Account_Type__c", "Account Type")];
        let mapping = auto_map_fields(&["Account Type", "account type", "ACCOUNT-TYPE"], &fields, None);
        for header in ["Account Type", "account type", "ACCOUNT-TYPE"] {
            assert_eq!(
                mapping.get(header).unwrap().target_field.as_deref(),
                Some("Account_Type__c")
            );
        }
    }

    #[test]
    fn test_related_suffix_without_match_is_unmapped() {
        let fields = vec![account_lookup(), field("Description", "Description")];
        let mapping = auto_map_fields(&["Account.Missing", "Description.Sub"], &fields, None);

        assert!(mapping.get("Account.Missing").unwrap().target_field.is_none());
        assert!(mapping.get("Description.Sub").unwrap().target_field.is_none());
    }

    #[test]
    fn test_external_id_lookup_mapping() {
        let fields = vec![account_lookup()];
        let mapping = auto_map_fields(&["account.external_id__c"], &fields, None);
        let item = mapping.get("account.external_id__c").unwrap();

        assert!(item.mapped_to_lookup);
        assert!(item.is_external_id_lookup());
        assert_eq!(item.target_lookup_field.as_deref(), Some("External_Id__c"));
    }

    #[test]
    fn test_binary_body_field_flag() {
        let fields = vec![field("VersionData", "Version Data"), field("Title", "Title")];
        let mapping = auto_map_fields(&["VersionData", "Title"], &fields, Some("VersionData"));

        assert!(mapping.get("VersionData").unwrap().is_binary_body_field);
        assert!(!mapping.get("Title").unwrap().is_binary_body_field);
    }

    #[test]
    fn test_duplicate_detection_is_idempotent() {
        let fields = vec![field("Name", "Name")];
        let mapping = auto_map_fields(&["Name", "name"], &fields, None);
        assert!(mapping.items().all(|i| i.is_duplicate_mapped_field));

        let again = check_for_duplicate_field_mappings(&mapping);
        assert_eq!(again, mapping);
    }

    #[test]
    fn test_set_lookup_target_and_options() {
        let fields = vec![account_lookup()];
        let mapping = reset_field_mapping(&["Parent"]);

        let mapping = set_lookup_target(&mapping, "Parent", &fields[0], "Account", "Name").unwrap();
        let mapping = set_lookup_options(&mapping, "Parent", NoMatchPolicy::Nullify, MultipleMatchPolicy::UseFirst).unwrap();
        let item = mapping.get("Parent").unwrap();

        assert!(item.is_non_external_id_lookup());
        assert_eq!(item.selected_reference_to.as_deref(), Some("Account"));
        assert_eq!(item.on_no_match, NoMatchPolicy::Nullify);
        assert_eq!(item.on_multiple_matches, MultipleMatchPolicy::UseFirst);

        // 改回直接字段时保留策略
        let mapping = set_target_field(&mapping, "Parent", Some(&fields[0]), None).unwrap();
        let item = mapping.get("Parent").unwrap();
        assert!(!item.mapped_to_lookup);
        assert_eq!(item.on_no_match, NoMatchPolicy::Nullify);
    }

    #[test]
    fn test_set_lookup_target_rejects_unknown_related_field() {
        let fields = vec![account_lookup()];
        let mapping = reset_field_mapping(&["Parent"]);
        let result = set_lookup_target(&mapping, "Parent", &fields[0], "Account", "Nope");
        assert!(matches!(result, Err(LoadError::InvalidLookupTarget { .. })));
    }

    #[test]
    fn test_edit_unknown_column() {
        let mapping = reset_field_mapping(&["A"]);
        let result = set_target_field(&mapping, "B", None, None);
        assert!(matches!(result, Err(LoadError::UnknownColumn(col)) if col == "B"));
    }
}
