//! Decides whether the filters a user is looking at are already one of their saved selections.
//!
//! This is a relaxed structural equality over JSON. Timestamps built by the portal lack the `Z`
//! suffix the server may add, and sparse objects may carry explicit nulls where the other side
//! omits the key. The comparison is also one-sided: only the keys of the first value are visited,
//! so a key that only the second value has is never a mismatch.
use crate::datastore::structs::Selection;
use serde_json::Value;

/// Structural equality tolerant of `Z`-suffix drift and null/absent keys. `None` plays the role
/// of an undefined value and is interchangeable with `Value::Null`.
pub fn is_equivalent_selection(a: Option<&Value>, b: Option<&Value>) -> bool {
    if let (Some(Value::String(a)), Some(Value::String(b))) = (a, b) {
        if differ_by_zulu_suffix(a, b) {
            return true;
        }
    }
    if primitively_equal(a, b) {
        return true;
    }
    if is_nullish(a) && is_nullish(b) {
        return true;
    }
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) if is_composite(a) && is_composite(b) => (a, b),
        _ => return false,
    };
    // Null and absent members are equal to each other, but not to a value.
    keys(a)
        .iter()
        .all(|key| is_equivalent_selection(member(a, key), member(b, key)))
}

/// The first saved selection whose stored filters and sort are both equivalent to the live pair.
pub fn find_saved_selection<'a, I>(saved: I, filters: &Value, sort: &Value) -> Option<&'a Selection>
where
    I: IntoIterator<Item = &'a Selection>,
{
    saved.into_iter().find(|selection| {
        is_equivalent_selection(Some(&selection.filters), Some(filters))
            && is_equivalent_selection(Some(&selection.sort), Some(sort))
    })
}

fn differ_by_zulu_suffix(a: &str, b: &str) -> bool {
    let suffixed = |long: &str, short: &str| long.strip_suffix('Z') == Some(short);
    suffixed(a, b) || suffixed(b, a)
}

fn primitively_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Null), Some(Value::Null)) => true,
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a == b,
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        // 10 and 10.0 are the same number once they've been through a JS client.
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Some(a), Some(b)) => std::ptr::eq(a, b),
        _ => false,
    }
}

fn is_nullish(v: Option<&Value>) -> bool {
    matches!(v, None | Some(Value::Null))
}

fn is_composite(v: &Value) -> bool {
    matches!(v, Value::Object(_) | Value::Array(_))
}

/// Arrays are keyed by their indices, like any other object.
fn keys(v: &Value) -> Vec<String> {
    match v {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn member<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    match v {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}
