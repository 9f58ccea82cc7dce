use std::collections::BTreeMap;

use protobuf::descriptor::field_descriptor_proto::Type as ScalarType;
use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FileDescriptorProto};

/// `package → FileDescriptorProto`, the in-memory form of every discovered `.proto` file.
/// `BTreeMap` keeps iteration (and therefore the emitted file order) deterministic across runs.
pub struct DescriptorStore {
    files: BTreeMap<String, FileDescriptorProto>,
    dependencies: BTreeMap<String, Vec<String>>,
}

/// The result of resolving a dotted message path: either the message itself (created on demand,
/// along with any missing intermediate messages), or a signal that the path already names an enum
/// — per spec.md §4.3, an enum can't have sub-fields, so the caller abandons the probe.
pub enum FindOrCreate<'a> {
    Message(&'a mut DescriptorProto),
    Enum,
}

impl DescriptorStore {
    pub fn new() -> Self {
        DescriptorStore {
            files: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }

    fn file_path(package: &str) -> String {
        format!("{}/message.proto", package.replace('.', "/"))
    }

    /// Creates an empty `proto3` file for `package` if this is the first reference to it.
    pub fn ensure_package(&mut self, package: &str) -> &mut FileDescriptorProto {
        self.files.entry(package.to_string()).or_insert_with(|| {
            let mut file = FileDescriptorProto::new();
            file.name = Some(Self::file_path(package));
            file.package = Some(package.to_string());
            file.syntax = Some("proto3".to_string());
            file
        })
    }

    pub fn file(&self, package: &str) -> Option<&FileDescriptorProto> {
        self.files.get(package)
    }

    pub fn file_mut(&mut self, package: &str) -> Option<&mut FileDescriptorProto> {
        self.files.get_mut(package)
    }

    /// Marks the file as requiring `required` fields — upgrades its syntax to `proto2` the first
    /// time a required field is discovered (spec.md Case D / Case E).
    pub fn upgrade_to_proto2(&mut self, package: &str) {
        if let Some(file) = self.files.get_mut(package) {
            file.syntax = Some("proto2".to_string());
        }
    }

    /// Walks `dotted_path` inside `package`'s file, creating any missing intermediate messages.
    pub fn find_or_create_message(&mut self, package: &str, dotted_path: &str) -> FindOrCreate<'_> {
        let file = self.ensure_package(package);
        let parts: Vec<&str> = dotted_path.split('.').collect();
        resolve(&mut file.message_type, &mut file.enum_type, &parts)
    }

    /// Records that `from_package`'s file imports `to_package`'s file, deduplicated.
    pub fn add_dependency(&mut self, from_package: &str, to_package: &str) {
        if from_package == to_package {
            return;
        }
        let dep_path = Self::file_path(to_package);
        let deps = self.dependencies.entry(from_package.to_string()).or_default();
        if !deps.contains(&dep_path) {
            deps.push(dep_path);
        }
    }

    /// Seeds `google.protobuf.Any` with its two standard fields the first time it is needed
    /// (spec.md Case F). Returns `true` if it newly created the message.
    pub fn seed_any(&mut self) -> bool {
        let file = self.ensure_package("google.protobuf");
        if let Some(any) = file.message_type.iter().find(|m| m.name() == "Any") {
            if any.field.iter().any(|f| f.name() == "type_url") {
                return false;
            }
        }
        let any = find_or_push_message(&mut file.message_type, "Any");
        if any.field.iter().any(|f| f.name() == "type_url") {
            return false;
        }
        any.field.push(scalar_field("type_url", 1, ScalarType::TYPE_STRING, false));
        any.field.push(scalar_field("data", 2, ScalarType::TYPE_BYTES, false));
        true
    }

    /// Appends the collected dependency lists into each file's `dependency` field, finalizing the
    /// store before post-processing and emission (spec.md §4.6 step 4).
    pub fn attach_dependencies(&mut self) {
        for (package, deps) in &self.dependencies {
            if let Some(file) = self.files.get_mut(package) {
                for dep in deps {
                    if !file.dependency.contains(dep) {
                        file.dependency.push(dep.clone());
                    }
                }
            }
        }
    }

    pub fn package_names(&self) -> impl Iterator<Item = &String> {
        self.files.keys()
    }

    pub fn into_files(self) -> BTreeMap<String, FileDescriptorProto> {
        self.files
    }

    pub fn files(&self) -> &BTreeMap<String, FileDescriptorProto> {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut BTreeMap<String, FileDescriptorProto> {
        &mut self.files
    }
}

impl Default for DescriptorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve<'a>(
    messages: &'a mut Vec<DescriptorProto>,
    enums: &'a mut Vec<EnumDescriptorProto>,
    parts: &[&str],
) -> FindOrCreate<'a> {
    let (head, rest) = parts.split_first().expect("dotted path must be non-empty");

    if rest.is_empty() {
        if enums.iter().any(|e| e.name() == *head) {
            return FindOrCreate::Enum;
        }
        let msg = find_or_push_message(messages, head);
        return FindOrCreate::Message(msg);
    }

    let msg = find_or_push_message(messages, head);
    resolve(&mut msg.nested_type, &mut msg.enum_type, rest)
}

fn find_or_push_message<'a>(messages: &'a mut Vec<DescriptorProto>, name: &str) -> &'a mut DescriptorProto {
    if let Some(pos) = messages.iter().position(|m| m.name() == name) {
        return &mut messages[pos];
    }
    let mut msg = DescriptorProto::new();
    msg.name = Some(name.to_string());
    messages.push(msg);
    messages.last_mut().unwrap()
}

/// Adds (or returns the existing) nested enum named `name` to `target`'s enum list, seeded with
/// the single sentinel value per spec.md §3.
pub fn ensure_sentinel_enum(enums: &mut Vec<EnumDescriptorProto>, name: &str) {
    if enums.iter().any(|e| e.name() == name) {
        return;
    }
    let mut enum_desc = EnumDescriptorProto::new();
    enum_desc.name = Some(name.to_string());
    let mut sentinel = EnumValueDescriptorProto::new();
    sentinel.name = Some(sentinel_name(name));
    sentinel.number = Some(0);
    enum_desc.value.push(sentinel);
    enums.push(enum_desc);
}

/// `UNKNOWN_<NAME_IN_SNAKE>` — insert an underscore before each uppercase letter that follows a
/// lowercase letter, then uppercase the whole thing (spec.md §9).
pub fn sentinel_name(type_name: &str) -> String {
    let mut result = String::from("UNKNOWN_");
    let chars: Vec<char> = type_name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() && !chars[i - 1].is_uppercase() {
            result.push('_');
        }
        result.push(c.to_ascii_uppercase());
    }
    result
}

/// Builds a new scalar field, matching the `Field` attributes from spec.md §3.
pub fn scalar_field(
    name: &str,
    number: i32,
    ty: ScalarType,
    required: bool,
) -> protobuf::descriptor::FieldDescriptorProto {
    use protobuf::descriptor::field_descriptor_proto::Label;
    use protobuf::EnumOrUnknown;

    let mut field = protobuf::descriptor::FieldDescriptorProto::new();
    field.name = Some(name.to_string());
    field.json_name = Some(name.to_string());
    field.number = Some(number);
    field.type_ = Some(EnumOrUnknown::new(ty));
    field.label = Some(EnumOrUnknown::new(if required {
        Label::LABEL_REQUIRED
    } else {
        Label::LABEL_OPTIONAL
    }));
    field
}

/// Builds a new message-typed field pointing at `type_name` (already fully qualified, leading dot).
pub fn message_field(
    name: &str,
    number: i32,
    type_name: &str,
    required: bool,
) -> protobuf::descriptor::FieldDescriptorProto {
    use protobuf::descriptor::field_descriptor_proto::{Label, Type};
    use protobuf::EnumOrUnknown;

    let mut field = protobuf::descriptor::FieldDescriptorProto::new();
    field.name = Some(name.to_string());
    field.json_name = Some(name.to_string());
    field.number = Some(number);
    field.type_ = Some(EnumOrUnknown::new(Type::TYPE_MESSAGE));
    field.type_name = Some(type_name.to_string());
    field.label = Some(EnumOrUnknown::new(if required {
        Label::LABEL_REQUIRED
    } else {
        Label::LABEL_OPTIONAL
    }));
    field
}

/// Maps the server's `TYPE_*` token to the matching `protobuf` crate scalar type. Covers the
/// fifteen scalar kinds the original tool's `typeMap` recognizes (spec.md §4.4 Case D).
pub fn scalar_type_from_token(token: &str) -> Option<ScalarType> {
    Some(match token {
        "TYPE_STRING" => ScalarType::TYPE_STRING,
        "TYPE_BOOL" => ScalarType::TYPE_BOOL,
        "TYPE_INT64" => ScalarType::TYPE_INT64,
        "TYPE_UINT64" => ScalarType::TYPE_UINT64,
        "TYPE_INT32" => ScalarType::TYPE_INT32,
        "TYPE_UINT32" => ScalarType::TYPE_UINT32,
        "TYPE_DOUBLE" => ScalarType::TYPE_DOUBLE,
        "TYPE_FLOAT" => ScalarType::TYPE_FLOAT,
        "TYPE_BYTES" => ScalarType::TYPE_BYTES,
        "TYPE_FIXED64" => ScalarType::TYPE_FIXED64,
        "TYPE_FIXED32" => ScalarType::TYPE_FIXED32,
        "TYPE_SINT64" => ScalarType::TYPE_SINT64,
        "TYPE_SINT32" => ScalarType::TYPE_SINT32,
        "TYPE_SFIXED64" => ScalarType::TYPE_SFIXED64,
        "TYPE_SFIXED32" => ScalarType::TYPE_SFIXED32,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_create_message_creates_missing_intermediates() {
        let mut store = DescriptorStore::new();
        match store.find_or_create_message("pkg", "Outer.Inner") {
            FindOrCreate::Message(msg) => {
                assert_eq!(msg.name(), "Inner");
            }
            FindOrCreate::Enum => panic!("expected message"),
        }
        let file = store.file("pkg").unwrap();
        assert_eq!(file.message_type.len(), 1);
        assert_eq!(file.message_type[0].name(), "Outer");
        assert_eq!(file.message_type[0].nested_type.len(), 1);
        assert_eq!(file.message_type[0].nested_type[0].name(), "Inner");
    }

    #[test]
    fn find_or_create_message_returns_existing_enum() {
        let mut store = DescriptorStore::new();
        {
            let file = store.ensure_package("pkg");
            ensure_sentinel_enum(&mut file.enum_type, "Status");
        }
        match store.find_or_create_message("pkg", "Status") {
            FindOrCreate::Enum => {}
            FindOrCreate::Message(_) => panic!("expected enum"),
        }
    }

    #[test]
    fn sentinel_name_inserts_underscores_before_camel_humps() {
        assert_eq!(sentinel_name("Status"), "UNKNOWN_STATUS");
        assert_eq!(sentinel_name("BrowseRequestContext"), "UNKNOWN_BROWSE_REQUEST_CONTEXT");
    }

    #[test]
    fn seed_any_is_idempotent() {
        let mut store = DescriptorStore::new();
        assert!(store.seed_any());
        assert!(!store.seed_any());
        let file = store.file("google.protobuf").unwrap();
        let any = file.message_type.iter().find(|m| m.name() == "Any").unwrap();
        assert_eq!(any.field.len(), 2);
        assert_eq!(any.field[0].name(), "type_url");
        assert_eq!(any.field[1].name(), "data");
    }

    #[test]
    fn scalar_type_from_token_covers_all_fifteen_kinds() {
        let tokens = [
            "TYPE_STRING", "TYPE_BOOL", "TYPE_INT64", "TYPE_UINT64", "TYPE_INT32", "TYPE_UINT32",
            "TYPE_DOUBLE", "TYPE_FLOAT", "TYPE_BYTES", "TYPE_FIXED64", "TYPE_FIXED32",
            "TYPE_SINT64", "TYPE_SINT32", "TYPE_SFIXED64", "TYPE_SFIXED32",
        ];
        for token in tokens {
            assert!(scalar_type_from_token(token).is_some(), "missing mapping for {token}");
        }
        assert!(scalar_type_from_token("TYPE_GROUP").is_none());
    }
}
