use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, FileDescriptorProto};

use crate::error::{ProbeError, ProbeResult};

/// Renders one `FileDescriptorProto` to `.proto` source text (spec.md §4.7).
pub fn render(file: &FileDescriptorProto) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "syntax = \"{}\";\n", file.syntax());
    let _ = writeln!(out, "package {};\n", file.package());

    for dep in &file.dependency {
        let _ = writeln!(out, "import \"{dep}\";");
    }
    if !file.dependency.is_empty() {
        out.push('\n');
    }

    let own_package = file.package().to_string();

    for (i, e) in file.enum_type.iter().enumerate() {
        render_enum(&mut out, e, 0);
        if i < file.enum_type.len() - 1 || !file.message_type.is_empty() {
            out.push('\n');
        }
    }

    for (i, m) in file.message_type.iter().enumerate() {
        render_message(&mut out, m, 0, &own_package);
        if i < file.message_type.len() - 1 {
            out.push('\n');
        }
    }

    out
}

fn render_enum(out: &mut String, e: &EnumDescriptorProto, indent: usize) {
    let pad = "  ".repeat(indent);
    let _ = writeln!(out, "{pad}enum {} {{", e.name());
    for value in &e.value {
        let _ = writeln!(out, "{pad}  {} = {};", value.name(), value.number());
    }
    let _ = writeln!(out, "{pad}}}");
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .map(|opts| opts.map_entry())
        .unwrap_or(false)
}

fn render_message(out: &mut String, message: &DescriptorProto, indent: usize, own_package: &str) {
    if is_map_entry(message) {
        return;
    }

    let pad = "  ".repeat(indent);
    let _ = writeln!(out, "{pad}message {} {{", message.name());

    for e in &message.enum_type {
        render_enum(out, e, indent + 1);
        out.push('\n');
    }

    for nested in &message.nested_type {
        if is_map_entry(nested) {
            continue;
        }
        render_message(out, nested, indent + 1, own_package);
        out.push('\n');
    }

    let mut fields: Vec<&protobuf::descriptor::FieldDescriptorProto> = message.field.iter().collect();
    fields.sort_by_key(|f| f.number());
    for field in fields {
        let _ = writeln!(out, "{pad}  {};", render_field(field, own_package));
    }

    let _ = writeln!(out, "{pad}}}");
}

fn render_field(field: &protobuf::descriptor::FieldDescriptorProto, own_package: &str) -> String {
    let mut s = String::new();

    match field.label() {
        Label::LABEL_REPEATED => s.push_str("repeated "),
        Label::LABEL_REQUIRED => s.push_str("required "),
        Label::LABEL_OPTIONAL => {}
    }

    s.push_str(&type_name(field, own_package));
    let _ = write!(s, " {} = {}", field.name(), field.number());
    s
}

fn type_name(field: &protobuf::descriptor::FieldDescriptorProto, own_package: &str) -> String {
    match field.type_() {
        Type::TYPE_MESSAGE | Type::TYPE_ENUM => qualify(field.type_name(), own_package),
        other => scalar_keyword(other).to_string(),
    }
}

/// A `type_name` is always fully qualified with a leading dot (`.pkg.Outer.Inner`). Strips it to
/// the simple name when the referenced type lives in this file's own package, keeps it qualified
/// (minus the leading dot) otherwise.
fn qualify(type_name: &str, own_package: &str) -> String {
    let trimmed = type_name.trim_start_matches('.');
    if let Some(rest) = trimmed.strip_prefix(&format!("{own_package}.")) {
        rest.to_string()
    } else {
        trimmed.to_string()
    }
}

fn scalar_keyword(ty: Type) -> &'static str {
    match ty {
        Type::TYPE_STRING => "string",
        Type::TYPE_BOOL => "bool",
        Type::TYPE_INT64 => "int64",
        Type::TYPE_UINT64 => "uint64",
        Type::TYPE_INT32 => "int32",
        Type::TYPE_UINT32 => "uint32",
        Type::TYPE_DOUBLE => "double",
        Type::TYPE_FLOAT => "float",
        Type::TYPE_BYTES => "bytes",
        Type::TYPE_FIXED64 => "fixed64",
        Type::TYPE_FIXED32 => "fixed32",
        Type::TYPE_SINT64 => "sint64",
        Type::TYPE_SINT32 => "sint32",
        Type::TYPE_SFIXED64 => "sfixed64",
        Type::TYPE_SFIXED32 => "sfixed32",
        Type::TYPE_GROUP => "group",
        Type::TYPE_MESSAGE => "message",
        Type::TYPE_ENUM => "enum",
    }
}

/// Writes every file in `files` under `output_dir`, creating intermediate directories as needed
/// (matching the original tool's `writeFile`/`os.MkdirAll` helper).
pub fn write_files(output_dir: &str, files: &BTreeMap<String, FileDescriptorProto>) -> ProbeResult<()> {
    for file in files.values() {
        let relative = file.name();
        let full_path = Path::new(output_dir).join(relative);
        if let Some(dir) = full_path.parent() {
            fs::create_dir_all(dir).map_err(|e| {
                ProbeError::Configuration(format!("could not create directory {dir:?}: {e}"))
            })?;
        }
        fs::write(&full_path, render(file)).map_err(|e| {
            ProbeError::Configuration(format!("could not write {full_path:?}: {e}"))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{self, DescriptorStore, FindOrCreate};

    #[test]
    fn renders_scalar_field() {
        let mut store = DescriptorStore::new();
        if let FindOrCreate::Message(msg) = store.find_or_create_message("pkg", "Request") {
            msg.field.push(descriptor::scalar_field("name", 7, Type::TYPE_STRING, false));
        }
        let file = store.file("pkg").unwrap();
        let text = render(file);
        assert!(text.contains("syntax = \"proto3\";"));
        assert!(text.contains("package pkg;"));
        assert!(text.contains("message Request {"));
        assert!(text.contains("string name = 7;"));
    }

    #[test]
    fn cross_package_field_uses_qualified_name() {
        let mut store = DescriptorStore::new();
        if let FindOrCreate::Message(msg) = store.find_or_create_message("my.pkg", "Request") {
            msg.field
                .push(descriptor::message_field("ctx", 3, ".other.pkg.Context", false));
        }
        store.add_dependency("my.pkg", "other.pkg");
        store.attach_dependencies();
        let file = store.file("my.pkg").unwrap();
        let text = render(file);
        assert!(text.contains("import \"other/pkg/message.proto\";"));
        assert!(text.contains("other.pkg.Context ctx = 3;"));
    }

    #[test]
    fn same_package_field_uses_simple_name() {
        let mut store = DescriptorStore::new();
        store.find_or_create_message("pkg", "Inner");
        if let FindOrCreate::Message(msg) = store.find_or_create_message("pkg", "Outer") {
            msg.field.push(descriptor::message_field("inner", 1, ".pkg.Inner", false));
        }
        let file = store.file("pkg").unwrap();
        let text = render(file);
        assert!(text.contains("Inner inner = 1;"));
        assert!(!text.contains(".pkg.Inner inner"));
    }

    #[test]
    fn required_field_emits_required_keyword() {
        let mut store = DescriptorStore::new();
        if let FindOrCreate::Message(msg) = store.find_or_create_message("pkg", "Request") {
            msg.field.push(descriptor::scalar_field("foo", 2, Type::TYPE_INT32, true));
        }
        store.upgrade_to_proto2("pkg");
        let file = store.file("pkg").unwrap();
        let text = render(file);
        assert!(text.contains("syntax = \"proto2\";"));
        assert!(text.contains("required int32 foo = 2;"));
    }
}
