// ==========================================
// SObject 数据加载 - 字段元数据解析器
// ==========================================
// 职责: describe 原始字段 → 丰富后的字段目录
// 流程: 过滤可写字段 → 截取候选关联对象 → 查询关联对象可查找字段
// ==========================================

use crate::domain::describe::{record_bool, record_str, DescribeField, GlobalSObject};
use crate::domain::field::{FieldDescriptor, RelatedField, RelatedFieldCatalog};
use crate::domain::types::{FieldType, CUSTOM_METADATA_SUFFIX};
use crate::importer::error::{LoadError, LoadResult};
use crate::importer::query_builder::build_external_id_fields_query;
use crate::importer::traits::{QueryService, SchemaService};
use crate::repository::FieldMetadataCache;
use indexmap::IndexMap;
use tracing::{debug, info, instrument};

/// 每个引用字段最多保留的候选关联对象数（限制查询规模）
pub const MAX_REFERENCE_CANDIDATES: usize = 5;

/// 对象是否为配置元数据对象
pub fn is_custom_metadata_object(sobject: &str) -> bool {
    sobject.ends_with(CUSTOM_METADATA_SUFFIX)
}

/// 对象是否可作为加载目标
///
/// 可创建/可更新/配置元数据对象，排除历史、标签、动态对象
pub fn is_loadable_sobject(sobject: &GlobalSObject) -> bool {
    (sobject.createable || sobject.updateable || is_custom_metadata_object(&sobject.name))
        && !sobject.name.ends_with("__History")
        && !sobject.name.ends_with("__Tag")
        && !sobject.name.ends_with("__Feed")
}

/// 普通对象字段过滤: 可创建 / 可更新 / Id
pub fn field_metadata_filter(field: &DescribeField) -> bool {
    field.createable || field.updateable || field.name == "Id"
}

/// 配置元数据对象字段过滤
///
/// describe 中所有字段均为只读，但可通过元数据部署写入
pub fn custom_metadata_field_filter(field: &DescribeField) -> bool {
    field.custom || field.name == "DeveloperName" || field.name == "Label"
}

/// 截取候选关联对象；恰好两个且第二个为 User 时交换顺序
fn reference_candidates(field: &DescribeField) -> Option<Vec<String>> {
    if !field.field_type.is_reference() {
        return None;
    }
    let mut reference_to: Vec<String> = field
        .reference_to
        .iter()
        .take(MAX_REFERENCE_CANDIDATES)
        .cloned()
        .collect();
    if reference_to.len() == 2 && reference_to[1] == "User" {
        reference_to.reverse();
    }
    Some(reference_to)
}

fn to_descriptor(field: DescribeField) -> FieldDescriptor {
    let reference_to = reference_candidates(&field);
    FieldDescriptor {
        name: field.name,
        label: field.label,
        field_type: field.field_type,
        soap_type: field.soap_type,
        external_id: field.external_id,
        type_label: field.type_label,
        reference_to,
        relationship_name: field.relationship_name.filter(|r| !r.is_empty()),
        related_fields: None,
    }
}

// ==========================================
// SchemaFieldResolver
// ==========================================
pub struct SchemaFieldResolver<'a, S, Q>
where
    S: SchemaService,
    Q: QueryService,
{
    schema_service: &'a S,
    query_service: &'a Q,
}

impl<'a, S, Q> SchemaFieldResolver<'a, S, Q>
where
    S: SchemaService,
    Q: QueryService,
{
    pub fn new(schema_service: &'a S, query_service: &'a Q) -> Self {
        Self {
            schema_service,
            query_service,
        }
    }

    /// 获取对象的丰富字段目录
    ///
    /// # 返回
    /// - Ok(Vec<FieldDescriptor>): 可加载字段（含关联字段目录）
    /// - Err: describe 或关联元数据查询失败（致命）
    #[instrument(skip(self))]
    pub async fn get_field_metadata(&self, sobject: &str) -> LoadResult<Vec<FieldDescriptor>> {
        let describe = self
            .schema_service
            .describe_sobject(sobject)
            .await
            .map_err(|e| LoadError::SchemaServiceError {
                sobject: sobject.to_string(),
                message: e.to_string(),
            })?;

        let filter: fn(&DescribeField) -> bool = if is_custom_metadata_object(sobject) {
            custom_metadata_field_filter
        } else {
            field_metadata_filter
        };

        let mut fields: Vec<FieldDescriptor> = describe
            .fields
            .into_iter()
            .filter(filter)
            .map(to_descriptor)
            .collect();

        // 所有引用字段的候选关联对象（去重，保持首次出现顺序）
        let mut related_objects: Vec<String> = Vec::new();
        for candidate in fields.iter().filter_map(|f| f.reference_to.as_ref()).flatten() {
            if !related_objects.contains(candidate) {
                related_objects.push(candidate.clone());
            }
        }

        if !related_objects.is_empty() {
            let related_by_object = self.fetch_related_fields(&related_objects).await?;
            for field in fields.iter_mut() {
                attach_related_fields(field, &related_by_object);
            }
        }

        info!(
            sobject = %sobject,
            fields = fields.len(),
            related_objects = related_objects.len(),
            "字段元数据解析完成"
        );
        Ok(fields)
    }

    /// 先查缓存，未命中时解析并写入缓存
    pub async fn get_field_metadata_cached(
        &self,
        cache: &FieldMetadataCache,
        org_id: &str,
        sobject: &str,
    ) -> LoadResult<Vec<FieldDescriptor>> {
        if let Some(fields) = cache.get(org_id, sobject)? {
            debug!(org_id = %org_id, sobject = %sobject, "字段元数据命中缓存");
            return Ok(fields);
        }
        let fields = self.get_field_metadata(sobject).await?;
        cache.put(org_id, sobject, &fields)?;
        Ok(fields)
    }

    /// 查询关联对象的可查找字段，按所属对象分组
    async fn fetch_related_fields(
        &self,
        related_objects: &[String],
    ) -> LoadResult<IndexMap<String, Vec<RelatedField>>> {
        let soql = build_external_id_fields_query(related_objects);
        debug!(soql = %soql, "查询关联字段元数据");

        let result = self
            .query_service
            .query(&soql)
            .await
            .map_err(|e| LoadError::MetadataQueryError(e.to_string()))?;

        let mut grouped: IndexMap<String, Vec<RelatedField>> = IndexMap::new();
        for record in &result.records {
            let Some(object) = record_str(record, "EntityDefinition.QualifiedApiName") else {
                continue;
            };
            let Some(name) = record_str(record, "Name").or_else(|| record_str(record, "QualifiedApiName")) else {
                continue;
            };
            grouped.entry(object.to_string()).or_default().push(RelatedField {
                name: name.to_string(),
                label: record_str(record, "Label").unwrap_or(name).to_string(),
                field_type: FieldType::from(record_str(record, "DataType").unwrap_or("string")),
                is_external_id: record_bool(record, "IsIdLookup"),
            });
        }
        Ok(grouped)
    }
}

/// 为引用字段挂载关联字段目录（只包含查询到字段的候选对象）
fn attach_related_fields(
    field: &mut FieldDescriptor,
    related_by_object: &IndexMap<String, Vec<RelatedField>>,
) {
    let Some(reference_to) = field.reference_to.as_ref() else {
        return;
    };
    let mut catalog = RelatedFieldCatalog::new();
    for candidate in reference_to {
        if let Some(related_fields) = related_by_object.get(candidate) {
            catalog.insert(candidate.clone(), related_fields.clone());
        }
    }
    if !catalog.is_empty() {
        field.related_fields = Some(catalog);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn describe_field(value: serde_json::Value) -> DescribeField {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_loadable_sobject_filter() {
        let obj = |name: &str, createable: bool| GlobalSObject {
            name: name.to_string(),
            label: name.to_string(),
            createable,
            updateable: false,
        };
        assert!(is_loadable_sobject(&obj("Account", true)));
        assert!(is_loadable_sobject(&obj("Setting__mdt", false)));
        assert!(!is_loadable_sobject(&obj("Report", false)));
        assert!(!is_loadable_sobject(&obj("Invoice__History", true)));
        assert!(!is_loadable_sobject(&obj("Invoice__Feed", true)));
    }

    #[test]
    fn test_reference_candidates_user_first() {
        let field = describe_field(json!({
            "name": "WhoId", "label": "Name ID", "type": "reference",
            "referenceTo": ["Contact", "User"], "relationshipName": "Who"
        }));
        // 两个候选且第二个为 User → 交换顺序
        assert_eq!(reference_candidates(&field), Some(vec!["User".to_string(), "Contact".to_string()]));
    }

    #[test]
    fn test_reference_candidates_truncated() {
        let field = describe_field(json!({
            "name": "WhatId", "label": "Related To", "type": "reference",
            "referenceTo": ["A", "B", "C", "D", "E", "F", "G"]
        }));
        assert_eq!(reference_candidates(&field).unwrap().len(), MAX_REFERENCE_CANDIDATES);
    }

    #[test]
    fn test_non_reference_has_no_candidates() {
        let field = describe_field(json!({
            "name": "Name", "label": "Name", "type": "string", "referenceTo": ["Ignored"]
        }));
        assert_eq!(reference_candidates(&field), None);
    }

    #[test]
    fn test_custom_metadata_filter() {
        let dev_name = describe_field(json!({"name": "DeveloperName", "label": "Name", "type": "string"}));
        let custom = describe_field(json!({"name": "Value__c", "label": "Value", "type": "string", "custom": true}));
        let system = describe_field(json!({"name": "NamespacePrefix", "label": "Namespace", "type": "string"}));
        assert!(custom_metadata_field_filter(&dev_name));
        assert!(custom_metadata_field_filter(&custom));
        assert!(!custom_metadata_field_filter(&system));
    }
}
