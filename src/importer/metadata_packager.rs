// ==========================================
// SObject 数据加载 - 配置元数据打包
// ==========================================
// 职责: 配置元数据对象（__mdt）的输入行 → 每条记录一份 XML → zip 部署包
// 包结构:
//   package.xml
//   customMetadata/<Object>.<DeveloperName>.md
// ==========================================

use crate::domain::field::FieldDescriptor;
use crate::domain::mapping::FieldMapping;
use crate::domain::record::{CellValue, InputRecord};
use crate::domain::types::{CUSTOM_FIELD_SUFFIX, CUSTOM_METADATA_SUFFIX};
use crate::importer::error::{LoadError, LoadResult};
use crate::importer::value_coercion::transform_value_to_string;
use indexmap::IndexMap;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{Cursor, Write};
use tracing::{debug, info, instrument, warn};
use zip::write::FileOptions;
use zip::ZipWriter;

const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// 单条配置元数据记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetadataRecord {
    /// 记录预览（DeveloperName / Label / 各 __c 字段值）
    pub record: Map<String, Value>,
    pub full_name: String,
    /// 完整 XML 文档
    pub metadata: String,
}

/// fullName → 记录（保持插入顺序）
pub type CustomMetadataRecords = IndexMap<String, CustomMetadataRecord>;

/// 查找引用在配置元数据中按名称关联，统一写为字符串
fn metadata_soap_type(soap_type: &str) -> &str {
    if soap_type == "tns:ID" {
        "xsd:string"
    } else {
        soap_type
    }
}

fn cell_text<'r>(row: &'r InputRecord, csv_field: &str) -> Option<&'r str> {
    row.get(csv_field).and_then(CellValue::as_text)
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> LoadResult<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn into_utf8(bytes: Vec<u8>) -> LoadResult<String> {
    String::from_utf8(bytes).map_err(|e| LoadError::PackageBuildError(e.to_string()))
}

/// 生成单条记录的 XML 文档
fn build_record_xml(label: Option<&str>, values: &[(&FieldDescriptor, Option<String>)]) -> LoadResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("CustomMetadata").with_attributes([
        ("xmlns", METADATA_NAMESPACE),
        ("xmlns:xsi", XSI_NAMESPACE),
        ("xmlns:xsd", XSD_NAMESPACE),
    ])))?;

    if let Some(label) = label {
        write_text_element(&mut writer, "label", label)?;
    }
    write_text_element(&mut writer, "protected", "false")?;

    for (field, value) in values {
        writer.write_event(Event::Start(BytesStart::new("values")))?;
        write_text_element(&mut writer, "field", &field.name)?;
        match value {
            Some(value) => {
                let soap_type = metadata_soap_type(&field.soap_type);
                writer.write_event(Event::Start(
                    BytesStart::new("value").with_attributes([("xsi:type", soap_type)]),
                ))?;
                writer.write_event(Event::Text(BytesText::new(value)))?;
                writer.write_event(Event::End(BytesEnd::new("value")))?;
            }
            None => {
                writer.write_event(Event::Empty(
                    BytesStart::new("value").with_attributes([("xsi:nil", "true")]),
                ))?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("values")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("CustomMetadata")))?;
    into_utf8(writer.into_inner())
}

/// 输入行 → 配置元数据记录
///
/// # 参数
/// - sobject: 配置元数据对象名（含 __mdt 后缀）
/// - rows: 输入行
/// - fields: 对象字段目录（按字段顺序输出 __c 字段）
/// - mapping: 字段映射（必须映射 DeveloperName）
/// - date_format: 日期格式提示
///
/// # 返回
/// - fullName → 记录；同名的后续行覆盖前者
#[instrument(skip_all, fields(sobject = %sobject, rows = rows.len()))]
pub fn convert_to_custom_metadata(
    sobject: &str,
    rows: &[InputRecord],
    fields: &[FieldDescriptor],
    mapping: &FieldMapping,
    date_format: &str,
) -> LoadResult<CustomMetadataRecords> {
    let developer_name_item = mapping
        .find_by_target("DeveloperName")
        .ok_or_else(|| LoadError::MissingDeveloperName {
            sobject: sobject.to_string(),
        })?;
    let label_item = mapping.find_by_target("Label");
    let object_name = sobject.strip_suffix(CUSTOM_METADATA_SUFFIX).unwrap_or(sobject);

    let custom_fields: Vec<&FieldDescriptor> = fields
        .iter()
        .filter(|field| field.name.ends_with(CUSTOM_FIELD_SUFFIX))
        .collect();

    let mut records = CustomMetadataRecords::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let developer_name = cell_text(row, &developer_name_item.csv_field).unwrap_or_default();
        if developer_name.is_empty() {
            warn!(row = row_idx, sobject = %sobject, "DeveloperName 为空，生成的记录名不完整");
        }
        let full_name = format!("{}.{}", object_name, developer_name);
        let label = label_item.and_then(|item| cell_text(row, &item.csv_field));

        let mut record = Map::new();
        record.insert("DeveloperName".to_string(), Value::String(full_name.clone()));
        record.insert(
            "Label".to_string(),
            label.map_or(Value::Null, |l| Value::String(l.to_string())),
        );

        let values: Vec<(&FieldDescriptor, Option<String>)> = custom_fields
            .iter()
            .map(|field| {
                let value = mapping
                    .find_by_target(&field.name)
                    .and_then(|item| cell_text(row, &item.csv_field))
                    .map(|raw| transform_value_to_string(raw, &field.field_type, date_format))
                    .filter(|v| !v.is_empty());
                record.insert(
                    field.name.clone(),
                    value.clone().map_or(Value::Null, Value::String),
                );
                (*field, value)
            })
            .collect();

        let metadata = build_record_xml(label, &values)?;
        debug!(full_name = %full_name, "生成配置元数据记录");
        records.insert(
            full_name.clone(),
            CustomMetadataRecord {
                record,
                full_name,
                metadata,
            },
        );
    }

    info!(records = records.len(), "配置元数据转换完成");
    Ok(records)
}

/// 生成 package.xml
fn build_package_xml(api_version: &str, records: &CustomMetadataRecords) -> LoadResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("Package").with_attributes([("xmlns", METADATA_NAMESPACE)]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("types")))?;
    for full_name in records.keys() {
        write_text_element(&mut writer, "members", full_name)?;
    }
    write_text_element(&mut writer, "name", "CustomMetadata")?;
    writer.write_event(Event::End(BytesEnd::new("types")))?;
    write_text_element(&mut writer, "version", api_version.trim_start_matches('v'))?;
    writer.write_event(Event::End(BytesEnd::new("Package")))?;
    into_utf8(writer.into_inner())
}

fn write_entry<W: Write + std::io::Seek>(zip: &mut ZipWriter<W>, content: &str) -> LoadResult<()> {
    zip.write_all(content.as_bytes())
        .map_err(|e| LoadError::PackageBuildError(e.to_string()))
}

/// 打包为 zip 部署包
///
/// # 参数
/// - api_version: 如 "v60.0"（写入时去掉前缀 v）
/// - records: convert_to_custom_metadata 的输出
///
/// # 返回
/// - zip 字节
#[instrument(skip(records), fields(records = records.len()))]
pub fn prepare_custom_metadata_package(
    api_version: &str,
    records: &CustomMetadataRecords,
) -> LoadResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();

    zip.start_file("package.xml", options)?;
    write_entry(&mut zip, &build_package_xml(api_version, records)?)?;

    for (full_name, record) in records {
        zip.start_file(format!("customMetadata/{}.md", full_name), options)?;
        write_entry(&mut zip, &record.metadata)?;
    }

    let bytes = zip.finish()?.into_inner();
    info!(bytes = bytes.len(), "配置元数据部署包生成完成");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mapping::FieldMappingItem;
    use crate::domain::record::input_record;
    use crate::domain::types::FieldType;
    use std::io::Read;

    fn field(name: &str, field_type: FieldType, soap_type: &str) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            label: name.to_string(),
            field_type,
            soap_type: soap_type.to_string(),
            external_id: false,
            type_label: None,
            reference_to: None,
            relationship_name: None,
            related_fields: None,
        }
    }

    fn mapped(csv: &str, target: &str) -> FieldMappingItem {
        let mut item = FieldMappingItem::unmapped(csv);
        item.target_field = Some(target.to_string());
        item
    }

    fn fields() -> Vec<FieldDescriptor> {
        vec![
            field("DeveloperName", FieldType::String, "xsd:string"),
            field("Label", FieldType::String, "xsd:string"),
            field("Rate__c", FieldType::Double, "xsd:double"),
            field("Parent__c", FieldType::Reference, "tns:ID"),
            field("Starts__c", FieldType::Date, "xsd:date"),
        ]
    }

    fn mapping() -> FieldMapping {
        vec![
            mapped("Name", "DeveloperName"),
            mapped("Title", "Label"),
            mapped("Rate", "Rate__c"),
            mapped("Parent", "Parent__c"),
            mapped("Start", "Starts__c"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_missing_developer_name_is_fatal() {
        let mapping: FieldMapping = vec![mapped("Title", "Label")].into_iter().collect();
        let result = convert_to_custom_metadata("Rate__mdt", &[], &fields(), &mapping, "MM/DD/YYYY");
        assert!(matches!(result, Err(LoadError::MissingDeveloperName { .. })));
    }

    #[test]
    fn test_record_xml_content() {
        let rows = vec![input_record([
            ("Name", "Gold"),
            ("Title", "Gold & Co"),
            ("Rate", "1.5"),
            ("Parent", "Base"),
            ("Start", ""),
        ])];
        let records = convert_to_custom_metadata("Tier__mdt", &rows, &fields(), &mapping(), "MM/DD/YYYY").unwrap();

        let record = &records["Tier.Gold"];
        assert_eq!(record.full_name, "Tier.Gold");
        assert!(record.metadata.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(record.metadata.contains("<label>Gold &amp; Co</label>"));
        assert!(record.metadata.contains("<protected>false</protected>"));
        assert!(record.metadata.contains("<value xsi:type=\"xsd:double\">1.5</value>"));
        assert!(record.metadata.contains("<value xsi:type=\"xsd:string\">Base</value>"));
        assert!(record.metadata.contains("<value xsi:nil=\"true\"/>"));
        assert!(!record.metadata.contains("<field>DeveloperName</field>"));
        assert_eq!(record.record["Starts__c"], Value::Null);
        assert_eq!(record.record["Label"], Value::String("Gold & Co".to_string()));
    }

    #[test]
    fn test_values_follow_field_order() {
        let rows = vec![input_record([("Name", "A"), ("Rate", "2"), ("Start", "01/31/2025")])];
        let records = convert_to_custom_metadata("Tier__mdt", &rows, &fields(), &mapping(), "MM/DD/YYYY").unwrap();
        let xml = &records["Tier.A"].metadata;

        let rate = xml.find("<field>Rate__c</field>").unwrap();
        let parent = xml.find("<field>Parent__c</field>").unwrap();
        let starts = xml.find("<field>Starts__c</field>").unwrap();
        assert!(rate < parent && parent < starts);
        assert!(xml.contains("<value xsi:type=\"xsd:date\">2025-01-31</value>"));
        assert!(!xml.contains("<label>"));
    }

    #[test]
    fn test_duplicate_full_name_last_wins() {
        let rows = vec![
            input_record([("Name", "A"), ("Rate", "1")]),
            input_record([("Name", "A"), ("Rate", "9")]),
        ];
        let records = convert_to_custom_metadata("Tier__mdt", &rows, &fields(), &mapping(), "MM/DD/YYYY").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records["Tier.A"].record["Rate__c"], Value::String("9".to_string()));
    }

    #[test]
    fn test_only_trailing_suffix_is_stripped() {
        let rows = vec![input_record([("Name", "Gold")])];
        let records =
            convert_to_custom_metadata("Legacy__mdt_Tier__mdt", &rows, &fields(), &mapping(), "MM/DD/YYYY").unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["Legacy__mdt_Tier.Gold"]);
    }

    #[test]
    fn test_last_column_mapped_to_target_is_used() {
        let mapping: FieldMapping = mapping()
            .into_iter()
            .map(|(_, item)| item)
            .chain(std::iter::once(mapped("Code", "DeveloperName")))
            .collect();

        let rows = vec![input_record([("Name", "Gold"), ("Code", "GOLD_01")])];
        let records = convert_to_custom_metadata("Tier__mdt", &rows, &fields(), &mapping, "MM/DD/YYYY").unwrap();
        assert!(records.contains_key("Tier.GOLD_01"));
    }

    #[test]
    fn test_blank_developer_name_still_builds_record() {
        let rows = vec![input_record([("Name", ""), ("Title", "Unnamed")])];
        let records = convert_to_custom_metadata("Tier__mdt", &rows, &fields(), &mapping(), "MM/DD/YYYY").unwrap();
        assert!(records.contains_key("Tier."));
    }

    #[test]
    fn test_package_layout() {
        let rows = vec![input_record([("Name", "A")]), input_record([("Name", "B")])];
        let records = convert_to_custom_metadata("Tier__mdt", &rows, &fields(), &mapping(), "MM/DD/YYYY").unwrap();
        let bytes = prepare_custom_metadata_package("v60.0", &records).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);

        let mut package = String::new();
        archive.by_name("package.xml").unwrap().read_to_string(&mut package).unwrap();
        assert!(package.contains("<members>Tier.A</members>"));
        assert!(package.contains("<members>Tier.B</members>"));
        assert!(package.contains("<name>CustomMetadata</name>"));
        assert!(package.contains("<version>60.0</version>"));

        assert!(archive.by_name("customMetadata/Tier.A.md").is_ok());
        assert!(archive.by_name("customMetadata/Tier.B.md").is_ok());
    }
}
