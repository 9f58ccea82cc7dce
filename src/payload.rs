use serde_json::Value;

/// Number of uniform values in the leaf sequence — large enough to probe up to 300 sibling field
/// numbers in a single request (spec.md §4.1).
const LEAF_SIZE: usize = 300;

/// The scalar kind used to fill the innermost array of a probe payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
    Int,
    Str,
    Bool,
}

fn leaf_sequence(leaf_type: LeafType) -> Value {
    match leaf_type {
        LeafType::Int => Value::Array((1..=LEAF_SIZE as i64).map(Value::from).collect()),
        LeafType::Str => {
            Value::Array((1..=LEAF_SIZE).map(|i| Value::from(format!("x{i}"))).collect())
        }
        LeafType::Bool => Value::Array((0..LEAF_SIZE).map(|i| Value::from(i % 2 == 1)).collect()),
    }
}

/// Builds a JSON document addressing the nested position named by `index_path` with a leaf
/// sequence of the given type. An empty `index_path` targets the request root; the leaf sequence
/// itself is then the whole body. Otherwise, starting from the innermost index, each index `ik`
/// becomes an array of length `ik` whose first `ik-1` elements are `null` and whose last element
/// carries the value built so far, working outward (spec.md §4.1).
pub fn generate(index_path: &[i32], leaf_type: LeafType) -> Value {
    let mut value = leaf_sequence(leaf_type);

    for &index in index_path.iter().rev() {
        let len = index.max(1) as usize;
        let mut wrapper: Vec<Value> = vec![Value::Null; len];
        wrapper[len - 1] = value;
        value = Value::Array(wrapper);
    }

    value
}

/// Serializes a generated payload to the bytes sent over the wire.
pub fn generate_bytes(index_path: &[i32], leaf_type: LeafType) -> Vec<u8> {
    serde_json::to_vec(&generate(index_path, leaf_type)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_int_probe_is_flat_sequence() {
        let value = generate(&[], LeafType::Int);
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 300);
        assert_eq!(arr[0], Value::from(1));
        assert_eq!(arr[299], Value::from(300));
    }

    #[test]
    fn single_index_wraps_with_leading_nulls() {
        let value = generate(&[3], LeafType::Str);
        let outer = value.as_array().unwrap();
        assert_eq!(outer.len(), 3);
        assert_eq!(outer[0], Value::Null);
        assert_eq!(outer[1], Value::Null);
        let leaf = outer[2].as_array().unwrap();
        assert_eq!(leaf.len(), 300);
        assert_eq!(leaf[0], Value::from("x1"));
        assert_eq!(leaf[299], Value::from("x300"));
    }

    #[test]
    fn nested_index_path_wraps_outward() {
        let value = generate(&[2, 4], LeafType::Int);
        let outer = value.as_array().unwrap();
        assert_eq!(outer.len(), 2);
        assert_eq!(outer[0], Value::Null);
        let middle = outer[1].as_array().unwrap();
        assert_eq!(middle.len(), 4);
        assert_eq!(middle[0], Value::Null);
        assert_eq!(middle[1], Value::Null);
        assert_eq!(middle[2], Value::Null);
        let leaf = middle[3].as_array().unwrap();
        assert_eq!(leaf.len(), 300);
        assert_eq!(leaf[0], Value::from(1));
        assert_eq!(leaf[299], Value::from(300));
    }

    #[test]
    fn bool_leaf_alternates() {
        let value = generate(&[], LeafType::Bool);
        let arr = value.as_array().unwrap();
        assert_eq!(arr[0], Value::from(false));
        assert_eq!(arr[1], Value::from(true));
    }
}
