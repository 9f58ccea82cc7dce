use protobuf_parse::Parser;
use protoprobe::descriptor::{self, DescriptorStore, FindOrCreate};
use protoprobe::emitter;
use protoprobe::postprocess;

/// Builds a small multi-package descriptor set the way the driver/interpreter would, emits it to
/// a temp directory, then re-parses the emitted text with `protobuf-parse` and checks the result
/// matches structurally (spec.md §8: "Emitter round-trip").
#[test]
fn emitted_proto_files_reparse_to_the_same_shape() {
    let mut store = DescriptorStore::new();

    if let FindOrCreate::Message(msg) = store.find_or_create_message("my.pkg", "Request") {
        msg.field.push(descriptor::scalar_field(
            "name",
            1,
            protobuf::descriptor::field_descriptor_proto::Type::TYPE_STRING,
            false,
        ));
        msg.field.push(descriptor::message_field("ctx", 2, ".other.pkg.Context", false));
    }
    store.add_dependency("my.pkg", "other.pkg");

    if let FindOrCreate::Message(msg) = store.find_or_create_message("other.pkg", "Context") {
        msg.field.push(descriptor::scalar_field(
            "value",
            1,
            protobuf::descriptor::field_descriptor_proto::Type::TYPE_INT32,
            false,
        ));
    }

    postprocess::run(&mut store);

    let dir = tempfile::tempdir().unwrap();
    let files = store.into_files();
    emitter::write_files(dir.path().to_str().unwrap(), &files).unwrap();

    let proto_dir = dir.path();
    let file_descriptor_set = Parser::new()
        .pure()
        .inputs(&[
            proto_dir.join("my/pkg/message.proto"),
            proto_dir.join("other/pkg/message.proto"),
        ])
        .includes(&[proto_dir])
        .file_descriptor_set()
        .expect("emitted .proto files should reparse cleanly");

    let names: Vec<&str> = file_descriptor_set
        .file
        .iter()
        .map(|f| f.name())
        .collect();
    assert!(names.contains(&"my/pkg/message.proto"));
    assert!(names.contains(&"other/pkg/message.proto"));

    let reparsed_root = file_descriptor_set
        .file
        .iter()
        .find(|f| f.name() == "my/pkg/message.proto")
        .unwrap();
    let request = reparsed_root
        .message_type
        .iter()
        .find(|m| m.name() == "Request")
        .unwrap();
    let mut field_numbers: Vec<i32> = request.field.iter().map(|f| f.number()).collect();
    field_numbers.sort();
    assert_eq!(field_numbers, vec![1, 2]);
}
