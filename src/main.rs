// ==========================================
// SObject 数据加载 - 命令行入口
// ==========================================
// 用法:
//   sobject-loader <fields.json> <data file> [options.json] [--package out.zip]
//
// - fields.json: 已解析的字段目录（FieldDescriptor 数组），文件名即对象名
//   例如 Account.json / Rate_Tier__mdt.json
// - data file: .csv / .xlsx / .xls
// - options.json: 加载选项；缺省时读取本地 config_kv 中的默认值
// - --package: 配置元数据对象的部署包输出路径
//
// 说明: 非外部 ID 查找需要在线查询服务，命令行只报告为未解析
// ==========================================

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sobject_loader::config::{ConfigManager, LoadOptions};
use sobject_loader::db::default_db_path;
use sobject_loader::domain::types::ApiMode;
use sobject_loader::domain::FieldDescriptor;
use sobject_loader::importer::field_mapper::{auto_map_fields, set_target_field};
use sobject_loader::importer::metadata_packager::{
    convert_to_custom_metadata, prepare_custom_metadata_package,
};
use sobject_loader::importer::schema_resolver::is_custom_metadata_object;
use sobject_loader::importer::transformer::{field_headers, transform_data, TransformOptions};
use sobject_loader::importer::UniversalFileParser;
use sobject_loader::{logging, FieldMapping};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

struct CliArgs {
    fields_path: PathBuf,
    data_path: PathBuf,
    options_path: Option<PathBuf>,
    package_path: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs> {
    let mut positional = Vec::new();
    let mut package_path = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--package" {
            let path = args.next().context("--package 需要输出路径")?;
            package_path = Some(PathBuf::from(path));
        } else {
            positional.push(PathBuf::from(arg));
        }
    }

    let mut positional = positional.into_iter();
    let (Some(fields_path), Some(data_path)) = (positional.next(), positional.next()) else {
        bail!("用法: sobject-loader <fields.json> <data file> [options.json] [--package out.zip]");
    };
    Ok(CliArgs {
        fields_path,
        data_path,
        options_path: positional.next(),
        package_path,
    })
}

fn sobject_name(fields_path: &Path) -> Result<String> {
    fields_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .context("无法从字段目录文件名推断对象名")
}

/// 读取加载选项：显式文件优先，否则读取本地配置（失败时用默认值）
fn load_options(options_path: Option<&Path>, sobject: &str) -> Result<LoadOptions> {
    if let Some(path) = options_path {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("读取选项文件失败: {}", path.display()))?;
        return LoadOptions::from_json_str(&raw).context("选项文件格式错误");
    }

    let db_path = default_db_path();
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir).ok();
    }
    match ConfigManager::new(&db_path.to_string_lossy()).and_then(|m| m.load_options(sobject)) {
        Ok(options) => Ok(options),
        Err(e) => {
            warn!(error = %e, "本地配置不可用，使用默认选项");
            Ok(LoadOptions::default())
        }
    }
}

/// 移除需要在线查询的查找映射
fn drop_unresolvable_lookups(mapping: FieldMapping, options: &LoadOptions) -> Result<FieldMapping> {
    let unresolved: Vec<String> = mapping
        .mapped_items()
        .filter(|item| item.is_non_external_id_lookup())
        .map(|item| item.csv_field.clone())
        .collect();

    let mut mapping = mapping;
    for csv_field in &unresolved {
        eprintln!("未解析的查找列（需要在线查询）: {}", csv_field);
        mapping = set_target_field(&mapping, csv_field, None, options.binary_body_field.as_deref())?;
    }
    Ok(mapping)
}

fn print_mapping_summary(mapping: &FieldMapping) {
    for item in mapping.items() {
        let target = match (&item.target_field, item.mapped_to_lookup) {
            (Some(_), true) => item.relationship_path(),
            (Some(target), false) => target.clone(),
            (None, _) => "-".to_string(),
        };
        let duplicate = if item.is_duplicate_mapped_field { " (重复)" } else { "" };
        eprintln!("{} → {}{}", item.csv_field, target, duplicate);
    }
}

fn cell_to_csv(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn main() -> Result<()> {
    logging::init();

    let args = parse_args()?;
    let sobject = sobject_name(&args.fields_path)?;
    let options = load_options(args.options_path.as_deref(), &sobject)?;

    let fields_raw = std::fs::read_to_string(&args.fields_path)
        .with_context(|| format!("读取字段目录失败: {}", args.fields_path.display()))?;
    let fields: Vec<FieldDescriptor> =
        serde_json::from_str(&fields_raw).context("字段目录格式错误")?;

    let parsed = UniversalFileParser.parse(&args.data_path)?;
    info!(
        sobject = %sobject,
        headers = parsed.headers.len(),
        rows = parsed.rows.len(),
        version = sobject_loader::VERSION,
        "输入文件解析完成"
    );

    let mapping = auto_map_fields(&parsed.headers, &fields, options.binary_body_field.as_deref());
    print_mapping_summary(&mapping);

    if is_custom_metadata_object(&sobject) {
        let records = convert_to_custom_metadata(&sobject, &parsed.rows, &fields, &mapping, &options.date_format)?;
        let package = prepare_custom_metadata_package(&options.api_version, &records)?;
        let out = args
            .package_path
            .unwrap_or_else(|| PathBuf::from(format!("{}.zip", sobject)));
        std::fs::write(&out, package).with_context(|| format!("写入部署包失败: {}", out.display()))?;
        println!("{}", out.display());
        return Ok(());
    }

    let mapping = drop_unresolvable_lookups(mapping, &options)?;
    if mapping.mapped_items().next().is_none() {
        bail!("没有任何已映射的字段");
    }

    let transform_options = TransformOptions {
        sobject: &sobject,
        api_mode: options.api_mode,
        insert_nulls: options.insert_nulls,
        date_format: &options.date_format,
    };
    let rows = transform_data(&parsed.rows, &mapping, &transform_options);
    eprintln!("载荷字段: {}", field_headers(&mapping).join(", "));

    match options.api_mode {
        ApiMode::Batch => println!("{}", serde_json::to_string_pretty(&rows)?),
        ApiMode::Streaming => {
            // 多态外部 ID 列的键带对象前缀，以实际载荷键为准
            let headers: Vec<String> = rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default();
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            writer.write_record(&headers)?;
            for row in &rows {
                writer.write_record(headers.iter().map(|h| cell_to_csv(row.get(h))))?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}
