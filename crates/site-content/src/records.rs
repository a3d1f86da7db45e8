//! Record identity inside list sections.

use serde_json::Value;
use std::collections::HashSet;

/// Integer `id` of a record, if it has one.
pub fn record_id(record: &Value) -> Option<i64> {
    record.get("id").and_then(Value::as_i64)
}

/// `max(existing ids) + 1`, or `now_millis` when no record carries an id.
/// Once the maximum is `i64::MAX` the smallest unused positive id is taken.
pub fn next_record_id(records: &[Value], now_millis: i64) -> i64 {
    let used: HashSet<i64> = records.iter().filter_map(record_id).collect();
    match used.iter().max() {
        None => now_millis,
        Some(&max) => match max.checked_add(1) {
            Some(next) => next,
            None => (1..).find(|id| !used.contains(id)).unwrap_or(max),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn next_id_is_max_plus_one() {
        let records = vec![json!({"id": 4}), json!({"id": 9}), json!({"id": 2})];
        assert_eq!(next_record_id(&records, 1_000), 10);
    }

    #[test]
    fn empty_list_uses_timestamp() {
        assert_eq!(next_record_id(&[], 1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn records_without_integer_ids_are_ignored() {
        let records = vec![json!({"id": "x"}), json!({"name": "n"}), json!({"id": 3})];
        assert_eq!(next_record_id(&records, 0), 4);
    }

    #[test]
    fn saturated_max_falls_back_to_the_smallest_free_id() {
        assert_eq!(next_record_id(&[json!({"id": i64::MAX})], 0), 1);
        let records = vec![json!({"id": 1}), json!({"id": i64::MAX}), json!({"id": 3})];
        assert_eq!(next_record_id(&records, 0), 2);
    }
}
