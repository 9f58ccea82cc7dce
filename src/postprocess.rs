use std::collections::HashSet;

use protobuf::descriptor::field_descriptor_proto::Type;
use protobuf::descriptor::DescriptorProto;
use protobuf::EnumOrUnknown;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::descriptor::DescriptorStore;

/// Runs the four post-drain passes in order (spec.md §4.6).
pub fn run(store: &mut DescriptorStore) {
    resolve_enum_types(store);
    for file in store.files_mut().values_mut() {
        drop_message_enum_clashes(&mut file.message_type, &mut file.enum_type);
        for message in &mut file.message_type {
            rename_duplicate_fields(message);
        }
    }
    store.attach_dependencies();
}

/// Pass 1: any field whose `type_name` names a known enum gets reclassified from message to enum.
/// Needed because Case E (message field) and Case A (enum promotion) can discover the same type
/// independently and from different sides, leaving some fields stuck typed as message.
fn resolve_enum_types(store: &mut DescriptorStore) {
    let enum_names: HashSet<String> = store
        .files()
        .values()
        .flat_map(|file| collect_enum_names(file.package(), &file.message_type, &file.enum_type))
        .collect();

    for file in store.files_mut().values_mut() {
        retype_enum_fields(&mut file.message_type, &enum_names);
    }
}

fn collect_enum_names(
    package_prefix: &str,
    messages: &[DescriptorProto],
    enums: &[protobuf::descriptor::EnumDescriptorProto],
) -> Vec<String> {
    let mut names: Vec<String> = enums
        .iter()
        .map(|e| format!(".{}.{}", package_prefix, e.name()))
        .collect();
    for message in messages {
        let nested_prefix = format!("{}.{}", package_prefix, message.name());
        names.extend(collect_enum_names(&nested_prefix, &message.nested_type, &message.enum_type));
    }
    names
}

fn retype_enum_fields(messages: &mut [DescriptorProto], enum_names: &HashSet<String>) {
    for message in messages.iter_mut() {
        for field in message.field.iter_mut() {
            if field.type_() == Type::TYPE_MESSAGE {
                if let Some(type_name) = field.type_name.as_ref() {
                    if enum_names.contains(type_name) {
                        field.type_ = Some(EnumOrUnknown::new(Type::TYPE_ENUM));
                    }
                }
            }
        }
        retype_enum_fields(&mut message.nested_type, enum_names);
    }
}

/// Pass 2: a nested message and a nested enum sharing a simple name is a sign that Case A won
/// after Case E had already created the message — drop the message, keeping the enum.
fn drop_message_enum_clashes(
    messages: &mut Vec<DescriptorProto>,
    enums: &[protobuf::descriptor::EnumDescriptorProto],
) {
    let enum_names: HashSet<&str> = enums.iter().map(|e| e.name()).collect();
    messages.retain(|m| !enum_names.contains(m.name()));
    for message in messages.iter_mut() {
        drop_message_enum_clashes(&mut message.nested_type, &message.enum_type);
    }
}

/// Pass 3: within one message, a later field reusing an earlier field's name gets an 8-character
/// random lowercase-alphanumeric suffix. Numbers stay untouched since Case D/E already dedupe by
/// number; this only handles the independent case of name collisions.
fn rename_duplicate_fields(message: &mut DescriptorProto) {
    let mut seen: HashSet<String> = HashSet::new();
    for field in message.field.iter_mut() {
        let name = field.name().to_string();
        if seen.contains(&name) {
            let suffix = random_suffix();
            let renamed = format!("{name}_{suffix}");
            field.json_name = Some(renamed.clone());
            field.name = Some(renamed);
        } else {
            seen.insert(name);
        }
    }
    for nested in message.nested_type.iter_mut() {
        rename_duplicate_fields(nested);
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(8)
        .map(char::from)
        .collect()
}
