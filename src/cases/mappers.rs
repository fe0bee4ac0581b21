//! Envelope → case-shaped data mapping.

use serde_json::{Value, json};

use crate::cases::api::CaseDocument;
use crate::envelope::{Document, Envelope};

/// Map one envelope document into its on-case representation.
///
/// The subtype, when present, wins over the generic type — it is the more
/// specific description of what was scanned.
pub fn scanned_document(document: &Document, source_ref: &str) -> CaseDocument {
    CaseDocument {
        file_name: Some(document.file_name.clone()),
        control_number: document.control_number.clone(),
        document_type: Some(
            document
                .subtype
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| document.doc_type.clone()),
        ),
        scanned_at: Some(document.scanned_at),
        url: Some(document.uuid.clone()),
        source_ref: Some(source_ref.to_string()),
    }
}

/// Case data for a new exception record. Carries the envelope id so later
/// dedup queries can find the record.
pub fn exception_record_data(envelope: &Envelope) -> Value {
    let documents: Vec<CaseDocument> = envelope
        .documents
        .iter()
        .map(|d| scanned_document(d, &envelope.id))
        .collect();

    json!({
        "envelope_id": envelope.id,
        "po_box": envelope.po_box,
        "jurisdiction": envelope.jurisdiction,
        "form_type": envelope.form_type,
        "delivery_date": envelope.delivery_date,
        "opening_date": envelope.opening_date,
        "envelope_case_ref": envelope.case_ref,
        "envelope_legacy_case_ref": envelope.legacy_case_ref,
        "scanned_documents": documents,
        "ocr_data": envelope.ocr_data.iter()
            .map(|f| json!({ "name": f.name, "value": f.value }))
            .collect::<Vec<_>>(),
        "ocr_data_validation_warnings": envelope.ocr_data_validation_warnings,
        "display_warnings": if envelope.ocr_data_validation_warnings.is_empty() { "No" } else { "Yes" },
        "contains_payments": if envelope.payments.is_empty() { "No" } else { "Yes" },
    })
}

/// Case data for attaching supplementary evidence: the existing documents
/// followed by the new ones, with the evidence-handled flag reset.
pub fn supplementary_evidence_data(
    existing_documents: &[CaseDocument],
    documents_to_add: &[CaseDocument],
) -> Value {
    let all: Vec<&CaseDocument> = existing_documents
        .iter()
        .chain(documents_to_add.iter())
        .collect();

    json!({
        "scanned_documents": all,
        "evidence_handled": "No",
    })
}

/// Append an envelope reference (id + action) to the `envelope_references`
/// collection of case data, preserving anything already there.
pub fn with_envelope_reference(mut data: Value, envelope_id: &str, action: &str) -> Value {
    let reference = json!({ "id": envelope_id, "action": action });
    match data.get_mut("envelope_references").and_then(Value::as_array_mut) {
        Some(references) => references.push(reference),
        None => {
            data["envelope_references"] = json!([reference]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn document(subtype: Option<&str>) -> Document {
        Document {
            file_name: "form.pdf".to_string(),
            control_number: "1234".to_string(),
            doc_type: "form".to_string(),
            subtype: subtype.map(str::to_string),
            scanned_at: Utc::now(),
            uuid: "52aa76e1-4a6c-433c-be26-ef4d0a56f6e4".to_string(),
            delivery_date: None,
        }
    }

    #[test]
    fn subtype_wins_over_type_when_present() {
        let mapped = scanned_document(&document(Some("D8S")), "env-1");
        assert_eq!(mapped.document_type.as_deref(), Some("D8S"));

        let mapped = scanned_document(&document(None), "env-1");
        assert_eq!(mapped.document_type.as_deref(), Some("form"));

        let mapped = scanned_document(&document(Some("")), "env-1");
        assert_eq!(mapped.document_type.as_deref(), Some("form"));
    }

    #[test]
    fn mapped_document_carries_the_source_ref() {
        let mapped = scanned_document(&document(None), "env-42");
        assert_eq!(mapped.source_ref.as_deref(), Some("env-42"));
        assert_eq!(mapped.control_number, "1234");
    }

    #[test]
    fn envelope_reference_appends_to_existing_collection() {
        let data = json!({ "envelope_references": [{ "id": "a", "action": "create" }] });
        let updated = with_envelope_reference(data, "b", "update");
        let refs = updated["envelope_references"].as_array().unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1]["id"], "b");
        assert_eq!(refs[1]["action"], "update");
    }

    #[test]
    fn envelope_reference_creates_collection_when_absent() {
        let updated = with_envelope_reference(json!({}), "env-1", "create");
        let refs = updated["envelope_references"].as_array().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0]["id"], "env-1");
    }
}
