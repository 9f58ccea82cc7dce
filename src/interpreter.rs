use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use protobuf::descriptor::field_descriptor_proto::Label;
use protobuf::EnumOrUnknown;
use regex::Regex;

use crate::descriptor::{self, DescriptorStore, FindOrCreate};
use crate::probe::FieldViolation;

/// One probe target: a nested position within the request message, named by the field numbers
/// walked to reach it from the root (spec.md §3).
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub package: String,
    pub message_dotted_path: String,
    pub index_path: Vec<i32>,
    pub parent_package: String,
    pub parent_dotted_path: Option<String>,
    pub required_field_names: Vec<String>,
}

impl WorkItem {
    pub fn root(package: impl Into<String>, message: impl Into<String>) -> Self {
        WorkItem {
            package: package.into(),
            message_dotted_path: message.into(),
            index_path: Vec::new(),
            parent_package: String::new(),
            parent_dotted_path: None,
            required_field_names: Vec::new(),
        }
    }
}

static REQUIRED_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Missing required field (.+) at '([^']+)'").unwrap());

static FIELD_DESC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"Invalid value at '(.+)' \((.*)\), (?:Base64 decoding failed for "[^"]*", )?x([^"]*)"#)
        .unwrap()
});

static MESSAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:[a-z0-9_]+\.)*[a-z0-9_]+)\.([A-Z][A-Za-z0-9_.]+)$").unwrap());

const ENUM_VIOLATIONS: [&str; 2] = [
    "Invalid value (), Unexpected list for single non-message field.",
    "Invalid value (), List is not message or group type.",
];

/// Collects `path → [required field names]` from every `"Missing required field"` violation in
/// the list (spec.md §4.4, first scan).
fn collect_required_fields(violations: &[FieldViolation]) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for violation in violations {
        if let Some(captures) = REQUIRED_FIELD_RE.captures(&violation.description) {
            let name = captures.get(1).unwrap().as_str().to_string();
            map.entry(violation.field.clone()).or_default().push(name);
        }
    }
    map
}

/// Interprets the merged str-leaf/int-leaf violation list for one work item, mutating `store` in
/// place and returning the child work items the driver should enqueue (spec.md §4.4).
pub fn interpret(
    store: &mut DescriptorStore,
    item: &WorkItem,
    violations: &[FieldViolation],
    max_depth: i32,
) -> Vec<WorkItem> {
    let mut children = Vec::new();
    let required_by_path = collect_required_fields(violations);

    let mut existing_numbers: HashSet<i32> =
        match store.find_or_create_message(&item.package, &item.message_dotted_path) {
            FindOrCreate::Message(msg) => msg.field.iter().filter_map(|f| f.number).collect(),
            FindOrCreate::Enum => return children,
        };

    for violation in violations {
        if violation.description.starts_with("Missing required field") {
            continue;
        }

        if ENUM_VIOLATIONS.contains(&violation.description.as_str()) {
            apply_enum_promotion(store, item);
            return children;
        }

        let field_name = violation
            .field
            .rsplit('.')
            .next()
            .unwrap_or(violation.field.as_str());

        let Some(captures) = FIELD_DESC_RE.captures(&violation.description) else {
            log::error!(
                "message {}: could not parse violation description {:?}",
                item.message_dotted_path,
                violation.description
            );
            continue;
        };

        if field_name.ends_with(']') {
            apply_repeated_promotion(store, item, max_depth, &mut children);
            return children;
        }

        let type_token = captures.get(2).map_or("", |m| m.as_str());
        let number_str = captures.get(3).map_or("", |m| m.as_str()).trim();
        let Ok(number) = number_str.parse::<i32>() else {
            log::error!(
                "message {}: could not parse field number from {:?}",
                item.message_dotted_path,
                violation.description
            );
            continue;
        };

        if let Some(scalar_ty) = descriptor::scalar_type_from_token(type_token) {
            apply_scalar_field(store, item, &mut existing_numbers, field_name, number, scalar_ty);
        } else {
            apply_message_field(
                store,
                item,
                &required_by_path,
                &mut existing_numbers,
                violation,
                field_name,
                number,
                type_token,
                max_depth,
                &mut children,
            );
        }
    }

    children
}

/// Case A: the position is an enum, not a message.
fn apply_enum_promotion(store: &mut DescriptorStore, item: &WorkItem) {
    if let (Some(parent_path), Some(&last_index)) =
        (item.parent_dotted_path.as_ref(), item.index_path.last())
    {
        if let FindOrCreate::Message(parent_msg) =
            store.find_or_create_message(&item.parent_package, parent_path)
        {
            if let Some(field) = parent_msg.field.iter_mut().find(|f| f.number() == last_index) {
                field.type_ = Some(EnumOrUnknown::new(
                    protobuf::descriptor::field_descriptor_proto::Type::TYPE_ENUM,
                ));
                field.type_name = Some(format!(".{}.{}", item.package, item.message_dotted_path));
            }
        }
    }

    let components: Vec<&str> = item.message_dotted_path.split('.').collect();
    let enum_name = components.last().copied().unwrap_or(&item.message_dotted_path);

    if components.len() == 1 {
        let file = store.ensure_package(&item.package);
        descriptor::ensure_sentinel_enum(&mut file.enum_type, enum_name);
    } else {
        let enclosing_path = components[..components.len() - 1].join(".");
        if let FindOrCreate::Message(enclosing) =
            store.find_or_create_message(&item.package, &enclosing_path)
        {
            descriptor::ensure_sentinel_enum(&mut enclosing.enum_type, enum_name);
        }
    }
}

/// Case C: the position is itself a repeated field; probe one level deeper into its first element.
fn apply_repeated_promotion(
    store: &mut DescriptorStore,
    item: &WorkItem,
    max_depth: i32,
    children: &mut Vec<WorkItem>,
) {
    if let (Some(parent_path), Some(&last_index)) =
        (item.parent_dotted_path.as_ref(), item.index_path.last())
    {
        if let FindOrCreate::Message(parent_msg) =
            store.find_or_create_message(&item.parent_package, parent_path)
        {
            if let Some(field) = parent_msg.field.iter_mut().find(|f| f.number() == last_index) {
                field.label = Some(EnumOrUnknown::new(Label::LABEL_REPEATED));
            }
        }
    }

    if max_depth >= 0 && item.index_path.len() as i32 == max_depth {
        return;
    }

    let mut index_path = item.index_path.clone();
    index_path.push(1);
    children.push(WorkItem {
        package: item.package.clone(),
        message_dotted_path: item.message_dotted_path.clone(),
        index_path,
        parent_package: item.package.clone(),
        parent_dotted_path: Some(item.message_dotted_path.clone()),
        required_field_names: Vec::new(),
    });
}

/// Case D: a scalar field discovered at this position.
fn apply_scalar_field(
    store: &mut DescriptorStore,
    item: &WorkItem,
    existing_numbers: &mut HashSet<i32>,
    field_name: &str,
    number: i32,
    ty: protobuf::descriptor::field_descriptor_proto::Type,
) {
    if existing_numbers.contains(&number) {
        return;
    }

    let required = item.required_field_names.iter().any(|n| n == field_name);
    if required {
        store.upgrade_to_proto2(&item.package);
    }

    if let FindOrCreate::Message(msg) =
        store.find_or_create_message(&item.package, &item.message_dotted_path)
    {
        msg.field
            .push(descriptor::scalar_field(field_name, number, ty, required));
    }
    existing_numbers.insert(number);
}

/// Case E: a message field discovered at this position (`type.googleapis.com/<qualified_name>`).
#[allow(clippy::too_many_arguments)]
fn apply_message_field(
    store: &mut DescriptorStore,
    item: &WorkItem,
    required_by_path: &HashMap<String, Vec<String>>,
    existing_numbers: &mut HashSet<i32>,
    violation: &FieldViolation,
    field_name: &str,
    number: i32,
    type_token: &str,
    max_depth: i32,
    children: &mut Vec<WorkItem>,
) {
    if existing_numbers.contains(&number) {
        return;
    }

    let Some(qualified_name) = type_token.strip_prefix("type.googleapis.com/") else {
        log::error!(
            "message {}: unrecognized type token {:?}",
            item.message_dotted_path,
            type_token
        );
        return;
    };

    let (child_package, child_message) = match MESSAGE_RE.captures(qualified_name) {
        Some(captures) => (
            captures.get(1).unwrap().as_str().to_string(),
            captures.get(2).unwrap().as_str().to_string(),
        ),
        None => ("google".to_string(), qualified_name.to_string()),
    };

    match store.find_or_create_message(&child_package, &child_message) {
        FindOrCreate::Enum => return,
        FindOrCreate::Message(_) => {}
    }

    if child_package != item.package {
        store.add_dependency(&item.package, &child_package);
    }

    let required = item.required_field_names.iter().any(|n| n == field_name);
    if required {
        store.upgrade_to_proto2(&child_package);
    }

    if let FindOrCreate::Message(msg) =
        store.find_or_create_message(&item.package, &item.message_dotted_path)
    {
        msg.field.push(descriptor::message_field(
            field_name,
            number,
            &format!(".{qualified_name}"),
            required,
        ));
    }
    existing_numbers.insert(number);

    if child_package == "google.protobuf" && child_message == "Any" {
        store.seed_any();
        return;
    }

    if max_depth >= 0 && item.index_path.len() as i32 == max_depth {
        return;
    }

    let mut index_path = item.index_path.clone();
    index_path.push(number);
    children.push(WorkItem {
        package: child_package,
        message_dotted_path: child_message,
        index_path,
        parent_package: item.package.clone(),
        parent_dotted_path: Some(item.message_dotted_path.clone()),
        required_field_names: required_by_path.get(&violation.field).cloned().unwrap_or_default(),
    });
}
