// Schema validation and in-batch dedup, shared by the primary and fallback paths.

use std::collections::HashSet;

use scrapeline_common::{ExtractedRecord, TypeConfig};

use crate::diagnostics::Diagnostics;

/// Validate raw items against the type's schema. Items that fail are dropped
/// and reported once per batch; survivors keep their input order.
pub fn validate_items(
    config: &TypeConfig,
    items: impl IntoIterator<Item = serde_json::Value>,
    diagnostics: &dyn Diagnostics,
) -> Vec<ExtractedRecord> {
    let mut records = Vec::new();
    let mut rejected = 0usize;
    let mut first_reason = None;

    for item in items {
        match config.schema.validate(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                rejected += 1;
                first_reason.get_or_insert(e.0);
            }
        }
    }

    if rejected > 0 {
        diagnostics.records_rejected(
            config.record_type,
            rejected,
            first_reason.as_deref().unwrap_or_default(),
        );
    }

    records
}

/// Drop repeats of an earlier record's dedup key. First occurrence wins.
pub fn dedup(records: Vec<ExtractedRecord>) -> Vec<ExtractedRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.dedup_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DiagnosticEvent, RecordingDiagnostics};
    use scrapeline_common::{RecordType, SchemaRegistry};
    use serde_json::json;

    #[test]
    fn invalid_items_are_dropped_and_reported_once() {
        let registry = SchemaRegistry::standard();
        let diagnostics = RecordingDiagnostics::new();
        let records = validate_items(
            registry.get(RecordType::Books),
            vec![
                json!({"name": "A", "price": "£1.00"}),
                json!({"name": "B"}),
                json!("garbage"),
                json!({"name": "C", "price": "£3.00"}),
            ],
            &diagnostics,
        );

        let names: Vec<_> = records.iter().filter_map(|r| r.get("name")).collect();
        assert_eq!(names, vec!["A", "C"]);

        let rejected: Vec<_> = diagnostics
            .events()
            .into_iter()
            .filter(|e| matches!(e, DiagnosticEvent::RecordsRejected { .. }))
            .collect();
        assert_eq!(rejected.len(), 1);
        assert!(matches!(
            rejected[0],
            DiagnosticEvent::RecordsRejected { rejected: 2, .. }
        ));
    }

    #[test]
    fn dedup_keeps_first_occurrence_in_order() {
        let registry = SchemaRegistry::standard();
        let diagnostics = RecordingDiagnostics::new();
        let records = validate_items(
            registry.get(RecordType::Businesses),
            vec![
                json!({"name": "Acme", "url": "https://bbb.test/acme", "phone": "1"}),
                json!({"name": "Beta", "phone": "2"}),
                json!({"name": "Acme Dup", "url": "https://bbb.test/acme"}),
                json!({"name": "Beta", "phone": "2"}),
                json!({"name": "Beta", "phone": "3"}),
            ],
            &diagnostics,
        );

        let deduped = dedup(records);
        let names: Vec<_> = deduped
            .iter()
            .map(|r| (r.get("name").unwrap(), r.get("phone")))
            .collect();
        assert_eq!(
            names,
            vec![("Acme", Some("1")), ("Beta", Some("2")), ("Beta", Some("3"))]
        );
        assert!(diagnostics.events().is_empty());
    }
}
