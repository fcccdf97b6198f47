// ==========================================
// SObject 数据加载 - 字段映射结构
// ==========================================
// 职责: 输入列 → 目标字段 的映射条目与映射表
// 约束: 映射表的键与输入表头完全一致，顺序 = 输入列顺序
// 约束: 编辑时整体重建，不原地修补
// ==========================================

use crate::domain::field::{FieldDescriptor, RelatedField};
use crate::domain::types::{MultipleMatchPolicy, NoMatchPolicy};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 单个输入列的映射条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMappingItem {
    pub csv_field: String,
    /// None = 未映射（下游跳过该列）
    pub target_field: Option<String>,
    pub mapped_to_lookup: bool,
    pub relationship_name: Option<String>,
    pub target_lookup_field: Option<String>,
    pub field_metadata: Option<FieldDescriptor>,
    pub related_field_metadata: Option<RelatedField>,
    /// 多态引用时选中的候选对象
    pub selected_reference_to: Option<String>,
    pub on_no_match: NoMatchPolicy,
    pub on_multiple_matches: MultipleMatchPolicy,
    pub is_duplicate_mapped_field: bool,
    pub is_binary_body_field: bool,
}

impl FieldMappingItem {
    /// 创建未映射条目
    pub fn unmapped(csv_field: impl Into<String>) -> Self {
        Self {
            csv_field: csv_field.into(),
            target_field: None,
            mapped_to_lookup: false,
            relationship_name: None,
            target_lookup_field: None,
            field_metadata: None,
            related_field_metadata: None,
            selected_reference_to: None,
            on_no_match: NoMatchPolicy::default(),
            on_multiple_matches: MultipleMatchPolicy::default(),
            is_duplicate_mapped_field: false,
            is_binary_body_field: false,
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.target_field.is_some()
    }

    /// 映射到外部 ID 查找字段（写入时由远端直接解析）
    pub fn is_external_id_lookup(&self) -> bool {
        self.mapped_to_lookup
            && self.target_lookup_field.is_some()
            && self
                .related_field_metadata
                .as_ref()
                .map_or(false, |r| r.is_external_id)
    }

    /// 映射到非外部 ID 查找字段（需预先查询记录 ID）
    pub fn is_non_external_id_lookup(&self) -> bool {
        self.mapped_to_lookup
            && self
                .related_field_metadata
                .as_ref()
                .map_or(false, |r| !r.is_external_id)
    }

    /// 关联路径 `<relationshipName>.<targetLookupField>`
    pub fn relationship_path(&self) -> String {
        format!(
            "{}.{}",
            self.relationship_name.as_deref().unwrap_or_default(),
            self.target_lookup_field.as_deref().unwrap_or_default()
        )
    }

    /// 目标字段是否为多态引用
    pub fn is_polymorphic(&self) -> bool {
        self.field_metadata
            .as_ref()
            .map_or(false, FieldDescriptor::is_polymorphic)
    }
}

/// 映射表：输入列 → 映射条目（保持输入列顺序）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(IndexMap<String, FieldMappingItem>);

impl FieldMapping {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn get(&self, csv_field: &str) -> Option<&FieldMappingItem> {
        self.0.get(csv_field)
    }

    pub fn contains(&self, csv_field: &str) -> bool {
        self.0.contains_key(csv_field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn items(&self) -> impl Iterator<Item = &FieldMappingItem> {
        self.0.values()
    }

    /// 已映射条目（按映射定义顺序）
    pub fn mapped_items(&self) -> impl Iterator<Item = &FieldMappingItem> {
        self.0.values().filter(|item| item.is_mapped())
    }

    /// 按目标字段查找映射条目（多列映射到同一字段时取最后一列）
    pub fn find_by_target(&self, target_field: &str) -> Option<&FieldMappingItem> {
        self.0
            .values()
            .rev()
            .find(|item| item.target_field.as_deref() == Some(target_field))
    }

    /// 以替换条目的方式重建映射表（顺序不变）
    pub fn with_item(&self, item: FieldMappingItem) -> Self {
        self.0
            .values()
            .map(|existing| {
                if existing.csv_field == item.csv_field {
                    item.clone()
                } else {
                    existing.clone()
                }
            })
            .collect()
    }
}

impl FromIterator<FieldMappingItem> for FieldMapping {
    fn from_iter<T: IntoIterator<Item = FieldMappingItem>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|item| (item.csv_field.clone(), item))
                .collect(),
        )
    }
}

impl IntoIterator for FieldMapping {
    type Item = (String, FieldMappingItem);
    type IntoIter = indexmap::map::IntoIter<String, FieldMappingItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
