//! Duplicate-document guard.
//!
//! Documents are identified by control number (DCN). Target-case documents
//! are partitioned by whether their back-reference points at the incoming
//! source: an overlap with documents from *other* sources is a genuine
//! clash; an overlap with documents from the *same* source means a prior
//! delivery already attached them, so they are skipped, not errored. This
//! is what makes the attach paths safe to retry.

use std::collections::BTreeSet;

use tracing::warn;

use crate::cases::api::CaseDocument;
use crate::envelope::Document;
use crate::error::AttachError;

/// Verify the incoming documents clash with nothing attached to the target
/// case from another source.
///
/// Returns the control numbers already attached from the *same* source —
/// the caller excludes those from the append instead of erroring.
pub fn verify_no_duplicates(
    target_case_documents: &[CaseDocument],
    incoming_documents: &[Document],
    incoming_source_ref: &str,
    target_case_ref: &str,
) -> Result<BTreeSet<String>, AttachError> {
    let incoming_dcns: BTreeSet<&str> = incoming_documents
        .iter()
        .map(|d| d.control_number.as_str())
        .collect();

    let (same_source, other_sources): (Vec<&CaseDocument>, Vec<&CaseDocument>) =
        target_case_documents
            .iter()
            .partition(|d| d.source_ref.as_deref() == Some(incoming_source_ref));

    let clashing: Vec<String> = other_sources
        .iter()
        .map(|d| d.control_number.as_str())
        .filter(|dcn| incoming_dcns.contains(dcn))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if !clashing.is_empty() {
        return Err(AttachError::DuplicateDocs {
            target_case_ref: target_case_ref.to_string(),
            control_numbers: clashing,
        });
    }

    let already_attached: BTreeSet<String> = same_source
        .iter()
        .map(|d| d.control_number.as_str())
        .filter(|dcn| incoming_dcns.contains(dcn))
        .map(str::to_string)
        .collect();

    if already_attached.len() == incoming_documents.len() && !incoming_documents.is_empty() {
        warn!(
            source_ref = %incoming_source_ref,
            case = %target_case_ref,
            "All incoming documents have already been attached to the case"
        );
    } else if !already_attached.is_empty() {
        warn!(
            source_ref = %incoming_source_ref,
            case = %target_case_ref,
            control_numbers = ?already_attached,
            "Some incoming documents have already been attached to the case"
        );
    }

    Ok(already_attached)
}

/// The incoming documents whose control number is not yet present on the
/// target case at all.
pub fn documents_to_add<'a>(
    incoming_documents: &'a [Document],
    target_case_documents: &[CaseDocument],
) -> Vec<&'a Document> {
    let existing: BTreeSet<&str> = target_case_documents
        .iter()
        .map(|d| d.control_number.as_str())
        .collect();

    incoming_documents
        .iter()
        .filter(|d| !existing.contains(d.control_number.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn case_doc(control_number: &str, source_ref: Option<&str>) -> CaseDocument {
        CaseDocument {
            file_name: Some(format!("{control_number}.pdf")),
            control_number: control_number.to_string(),
            document_type: Some("other".to_string()),
            scanned_at: None,
            url: None,
            source_ref: source_ref.map(str::to_string),
        }
    }

    fn incoming_doc(control_number: &str) -> Document {
        Document {
            file_name: format!("{control_number}.pdf"),
            control_number: control_number.to_string(),
            doc_type: "other".to_string(),
            subtype: None,
            scanned_at: Utc::now(),
            uuid: "9cb80274-6beb-4864-a4c0-ab1fdbb63edb".to_string(),
            delivery_date: None,
        }
    }

    #[test]
    fn same_source_duplicate_is_skipped_and_new_document_passes() {
        let target = vec![case_doc("123456", Some("ER1"))];
        let incoming = vec![incoming_doc("123456"), incoming_doc("654321")];

        let already =
            verify_no_duplicates(&target, &incoming, "ER1", "CASE1").unwrap();
        assert_eq!(already.len(), 1);
        assert!(already.contains("123456"));

        let to_add = documents_to_add(&incoming, &target);
        assert_eq!(to_add.len(), 1);
        assert_eq!(to_add[0].control_number, "654321");
    }

    #[test]
    fn other_source_duplicate_is_a_clash_naming_case_and_dcn() {
        let target = vec![case_doc("123456", Some("ER1"))];
        let incoming = vec![incoming_doc("123456")];

        let err = verify_no_duplicates(&target, &incoming, "ER2", "CASE1").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("123456"));
        assert!(message.contains("CASE1"));
    }

    #[test]
    fn clash_message_lists_all_duplicates_comma_joined() {
        let target = vec![
            case_doc("111", Some("OTHER")),
            case_doc("222", None),
            case_doc("333", Some("OTHER")),
        ];
        let incoming = vec![incoming_doc("111"), incoming_doc("222"), incoming_doc("444")];

        let err = verify_no_duplicates(&target, &incoming, "ER1", "CASE9").unwrap_err();
        match &err {
            AttachError::DuplicateDocs {
                target_case_ref,
                control_numbers,
            } => {
                assert_eq!(target_case_ref, "CASE9");
                assert_eq!(control_numbers, &vec!["111".to_string(), "222".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("111, 222"));
    }

    #[test]
    fn disjoint_sets_have_no_duplicates() {
        let target = vec![case_doc("111", Some("OTHER"))];
        let incoming = vec![incoming_doc("222")];

        let already = verify_no_duplicates(&target, &incoming, "ER1", "CASE1").unwrap();
        assert!(already.is_empty());
        assert_eq!(documents_to_add(&incoming, &target).len(), 1);
    }

    #[test]
    fn empty_target_case_accepts_everything() {
        let incoming = vec![incoming_doc("111"), incoming_doc("222")];
        let already = verify_no_duplicates(&[], &incoming, "ER1", "CASE1").unwrap();
        assert!(already.is_empty());
        assert_eq!(documents_to_add(&incoming, &[]).len(), 2);
    }
}
