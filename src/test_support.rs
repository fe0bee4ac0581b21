//! Shared hand-written fakes and builders for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use uuid::Uuid;

use crate::cases::api::{CaseApi, CaseDocument, CaseRecord, CaseSubmission, MutationStart};
use crate::cases::attach::SupplementaryEvidenceAttacher;
use crate::cases::auth::{AuthProvider, Credentials};
use crate::cases::creation::AutoCaseCreator;
use crate::cases::exception_record::ExceptionRecordCreator;
use crate::cases::finder::CaseFinder;
use crate::cases::update::AutoCaseUpdater;
use crate::config::{ServiceConfig, ServiceConfigProvider};
use crate::envelope::{Classification, Document, Envelope, PaymentReference};
use crate::error::{
    CaseApiError, NotificationError, PaymentClientError, QueueError, StoreError,
    TransformationError,
};
use crate::handlers::{
    EnvelopeAction, EnvelopeRouter, ExceptionHandler, NewApplicationHandler,
    SupplementaryEvidenceHandler, SupplementaryEvidenceWithOcrHandler,
};
use crate::payments::client::PaymentProcessorClient;
use crate::payments::model::{
    CreatePaymentRequest, Payment, PaymentStatus, UpdatePayment, UpdatePaymentRequest,
};
use crate::payments::service::PaymentsService;
use crate::payments::store::PaymentStore;
use crate::queue::message::QueueMessage;
use crate::queue::notifier::EnvelopeNotifier;
use crate::queue::telemetry::Telemetry;
use crate::transform::{
    CaseCreationDetails, CaseUpdateClient, CaseUpdateDetails, TransformationClient,
};

// ── Envelope builders ───────────────────────────────────────────────

pub fn document(control_number: &str) -> Document {
    Document {
        file_name: format!("{control_number}.pdf"),
        control_number: control_number.to_string(),
        doc_type: "other".to_string(),
        subtype: None,
        scanned_at: Utc.with_ymd_and_hms(2024, 6, 24, 12, 1, 0).unwrap(),
        uuid: "0fa1ab60-f836-43aa-8c65-b07cc9bebcbe".to_string(),
        delivery_date: None,
    }
}

pub fn envelope(classification: Classification) -> Envelope {
    envelope_with(classification, None, None)
}

pub fn envelope_with(
    classification: Classification,
    case_ref: Option<&str>,
    legacy_case_ref: Option<&str>,
) -> Envelope {
    Envelope {
        id: "envelope-1".to_string(),
        case_ref: case_ref.map(str::to_string),
        legacy_case_ref: legacy_case_ref.map(str::to_string),
        po_box: "PO 12345".to_string(),
        jurisdiction: "MAILSCAN".to_string(),
        container: "mailscan".to_string(),
        zip_file_name: "envelope.zip".to_string(),
        form_type: Some("FORM1".to_string()),
        delivery_date: Utc.with_ymd_and_hms(2024, 6, 24, 12, 0, 0).unwrap(),
        opening_date: Utc.with_ymd_and_hms(2024, 6, 24, 13, 0, 0).unwrap(),
        classification,
        documents: vec![document("1234")],
        payments: Vec::new(),
        ocr_data: Vec::new(),
        ocr_data_validation_warnings: Vec::new(),
    }
}

pub fn envelope_with_documents(
    classification: Classification,
    control_numbers: &[&str],
) -> Envelope {
    let mut e = envelope(classification);
    e.documents = control_numbers.iter().map(|dcn| document(dcn)).collect();
    e
}

pub fn envelope_with_payments(
    classification: Classification,
    control_numbers: &[&str],
) -> Envelope {
    let mut e = envelope(classification);
    e.payments = control_numbers
        .iter()
        .map(|dcn| PaymentReference {
            document_control_number: dcn.to_string(),
        })
        .collect();
    e
}

pub fn envelope_json(envelope: &Envelope) -> Vec<u8> {
    serde_json::to_vec(envelope).expect("envelope serializes")
}

// ── Service config builders ─────────────────────────────────────────

pub fn service_config(service: &str) -> ServiceConfig {
    ServiceConfig {
        service: service.to_string(),
        jurisdiction: "MAILSCAN".to_string(),
        auto_case_creation_enabled: true,
        auto_case_update_enabled: true,
        duplicate_prevention_enabled: true,
    }
}

pub fn provider_with(config: ServiceConfig) -> Arc<ServiceConfigProvider> {
    Arc::new(ServiceConfigProvider::new(vec![config]))
}

// ── Case API fake ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCaseApi {
    cases: Mutex<HashMap<u64, CaseRecord>>,
    legacy_refs: Mutex<HashMap<String, Vec<u64>>>,
    envelope_case_refs: Mutex<HashMap<String, Vec<u64>>>,
    exception_record_refs: Mutex<HashMap<String, Vec<u64>>>,
    submit_error: Mutex<Option<fn() -> CaseApiError>>,
    submits: AtomicUsize,
    mutations_started: AtomicUsize,
    get_case_calls: AtomicUsize,
    next_case_id: AtomicU64,
}

impl FakeCaseApi {
    pub fn put_case(&self, id: u64, case_type_id: &str) {
        self.put_case_record(CaseRecord {
            id,
            case_type_id: case_type_id.to_string(),
            jurisdiction: "MAILSCAN".to_string(),
            state: Some("Open".to_string()),
            data: serde_json::json!({}),
        });
    }

    pub fn put_case_with_documents(&self, id: u64, documents: Vec<CaseDocument>) {
        self.put_case_record(CaseRecord {
            id,
            case_type_id: "MAILSCAN_Service".to_string(),
            jurisdiction: "MAILSCAN".to_string(),
            state: Some("Open".to_string()),
            data: serde_json::json!({ "scanned_documents": documents }),
        });
    }

    pub fn put_case_record(&self, record: CaseRecord) {
        self.cases.lock().unwrap().insert(record.id, record);
    }

    pub fn case(&self, id: u64) -> Option<CaseRecord> {
        self.cases.lock().unwrap().get(&id).cloned()
    }

    pub fn set_legacy_refs(&self, legacy_ref: &str, ids: Vec<u64>) {
        self.legacy_refs
            .lock()
            .unwrap()
            .insert(legacy_ref.to_string(), ids);
    }

    pub fn set_envelope_case_refs(&self, envelope_id: &str, ids: Vec<u64>) {
        self.envelope_case_refs
            .lock()
            .unwrap()
            .insert(envelope_id.to_string(), ids);
    }

    pub fn set_exception_record_refs(&self, envelope_id: &str, ids: Vec<u64>) {
        self.exception_record_refs
            .lock()
            .unwrap()
            .insert(envelope_id.to_string(), ids);
    }

    /// Make every subsequent submit fail with the produced error.
    pub fn fail_submits_with(&self, make_error: fn() -> CaseApiError) {
        *self.submit_error.lock().unwrap() = Some(make_error);
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn mutations_started(&self) -> usize {
        self.mutations_started.load(Ordering::SeqCst)
    }

    pub fn get_case_calls(&self) -> usize {
        self.get_case_calls.load(Ordering::SeqCst)
    }

    fn allocate_case_id(&self) -> u64 {
        7_000_001 + self.next_case_id.fetch_add(1, Ordering::SeqCst)
    }

    fn register_created_case(&self, id: u64, case_type_id: &str, data: &serde_json::Value) {
        if case_type_id.ends_with("_ExceptionRecord") {
            if let Some(envelope_id) = data.get("envelope_id").and_then(|v| v.as_str()) {
                self.exception_record_refs
                    .lock()
                    .unwrap()
                    .entry(envelope_id.to_string())
                    .or_default()
                    .push(id);
            }
        } else if let Some(references) = data
            .get("envelope_references")
            .and_then(|v| v.as_array())
        {
            for reference in references {
                if let Some(envelope_id) = reference.get("id").and_then(|v| v.as_str()) {
                    self.envelope_case_refs
                        .lock()
                        .unwrap()
                        .entry(envelope_id.to_string())
                        .or_default()
                        .push(id);
                }
            }
        }
    }
}

#[async_trait]
impl CaseApi for FakeCaseApi {
    async fn start_mutation(
        &self,
        _credentials: &Credentials,
        _jurisdiction: &str,
        _case_type_id: &str,
        case_id: Option<u64>,
        event_id: &str,
    ) -> Result<MutationStart, CaseApiError> {
        self.mutations_started.fetch_add(1, Ordering::SeqCst);
        Ok(MutationStart {
            token: "mutation-token".to_string(),
            event_id: event_id.to_string(),
            case_record: case_id.and_then(|id| self.case(id)),
        })
    }

    async fn submit(
        &self,
        _credentials: &Credentials,
        jurisdiction: &str,
        case_type_id: &str,
        case_id: Option<u64>,
        submission: CaseSubmission,
    ) -> Result<CaseRecord, CaseApiError> {
        if let Some(make_error) = *self.submit_error.lock().unwrap() {
            return Err(make_error());
        }
        self.submits.fetch_add(1, Ordering::SeqCst);

        let record = match case_id {
            Some(id) => {
                let mut cases = self.cases.lock().unwrap();
                let record = cases
                    .get_mut(&id)
                    .ok_or_else(|| CaseApiError::NotFound(id.to_string()))?;
                record.data = submission.data;
                record.clone()
            }
            None => {
                let id = self.allocate_case_id();
                let record = CaseRecord {
                    id,
                    case_type_id: case_type_id.to_string(),
                    jurisdiction: jurisdiction.to_string(),
                    state: Some("Created".to_string()),
                    data: submission.data,
                };
                self.register_created_case(id, case_type_id, &record.data);
                self.cases.lock().unwrap().insert(id, record.clone());
                record
            }
        };
        Ok(record)
    }

    async fn get_case(
        &self,
        case_id: &str,
        _jurisdiction: &str,
    ) -> Result<Option<CaseRecord>, CaseApiError> {
        self.get_case_calls.fetch_add(1, Ordering::SeqCst);
        let id: u64 = case_id
            .parse()
            .map_err(|_| CaseApiError::InvalidCaseId(case_id.to_string()))?;
        Ok(self.case(id))
    }

    async fn case_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        _service: &str,
    ) -> Result<Vec<u64>, CaseApiError> {
        Ok(self
            .envelope_case_refs
            .lock()
            .unwrap()
            .get(envelope_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn case_refs_by_legacy_id(
        &self,
        legacy_case_ref: &str,
        _service: &str,
    ) -> Result<Vec<u64>, CaseApiError> {
        Ok(self
            .legacy_refs
            .lock()
            .unwrap()
            .get(legacy_case_ref)
            .cloned()
            .unwrap_or_default())
    }

    async fn exception_record_refs_by_envelope_id(
        &self,
        envelope_id: &str,
        _service: &str,
    ) -> Result<Vec<u64>, CaseApiError> {
        Ok(self
            .exception_record_refs
            .lock()
            .unwrap()
            .get(envelope_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ── Auth fake ───────────────────────────────────────────────────────

pub struct FakeAuth;

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn credentials_for(&self, _jurisdiction: &str) -> Result<Credentials, CaseApiError> {
        Ok(Credentials {
            service_token: SecretString::from("test-service-token"),
            user_token: SecretString::from("test-user-token"),
            user_id: "test-user".to_string(),
        })
    }
}

// ── Transformation fakes ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformMode {
    Success,
    Unprocessable,
    Transport,
}

pub struct FakeTransformer {
    mode: Mutex<TransformMode>,
}

impl Default for FakeTransformer {
    fn default() -> Self {
        Self {
            mode: Mutex::new(TransformMode::Success),
        }
    }
}

impl FakeTransformer {
    pub fn set_mode(&self, mode: TransformMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl TransformationClient for FakeTransformer {
    async fn transform_envelope(
        &self,
        _envelope: &Envelope,
    ) -> Result<CaseCreationDetails, TransformationError> {
        match *self.mode.lock().unwrap() {
            TransformMode::Success => Ok(CaseCreationDetails {
                case_type_id: "MAILSCAN_Service".to_string(),
                event_id: "create_new_case".to_string(),
                case_data: serde_json::json!({}),
            }),
            TransformMode::Unprocessable => {
                Err(TransformationError::Unprocessable("invalid data".to_string()))
            }
            TransformMode::Transport => {
                Err(TransformationError::Transport("connection refused".to_string()))
            }
        }
    }
}

pub struct FakeCaseUpdateClient {
    mode: Mutex<TransformMode>,
}

impl Default for FakeCaseUpdateClient {
    fn default() -> Self {
        Self {
            mode: Mutex::new(TransformMode::Success),
        }
    }
}

impl FakeCaseUpdateClient {
    pub fn set_mode(&self, mode: TransformMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl CaseUpdateClient for FakeCaseUpdateClient {
    async fn case_update_data(
        &self,
        _service: &str,
        _existing_case: &CaseRecord,
        _envelope: &Envelope,
    ) -> Result<CaseUpdateDetails, TransformationError> {
        match *self.mode.lock().unwrap() {
            TransformMode::Success => Ok(CaseUpdateDetails {
                case_data: serde_json::json!({}),
            }),
            TransformMode::Unprocessable => {
                Err(TransformationError::Unprocessable("invalid data".to_string()))
            }
            TransformMode::Transport => {
                Err(TransformationError::Transport("connection refused".to_string()))
            }
        }
    }
}

// ── Payment fakes ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePaymentProcessor {
    fail_next: Mutex<u32>,
    create_requests: Mutex<Vec<CreatePaymentRequest>>,
    update_requests: Mutex<Vec<UpdatePaymentRequest>>,
}

impl FakePaymentProcessor {
    /// Fail the next `n` processor calls with a 502-style response.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock().unwrap() = n;
    }

    pub fn create_requests(&self) -> Vec<CreatePaymentRequest> {
        self.create_requests.lock().unwrap().clone()
    }

    pub fn update_requests(&self) -> Vec<UpdatePaymentRequest> {
        self.update_requests.lock().unwrap().clone()
    }

    fn maybe_fail(&self) -> Result<(), PaymentClientError> {
        let mut remaining = self.fail_next.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            Err(PaymentClientError::Response {
                status: 502,
                body: "processor unavailable".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentProcessorClient for FakePaymentProcessor {
    async fn create_payment(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<(), PaymentClientError> {
        self.maybe_fail()?;
        self.create_requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn update_payment(
        &self,
        request: &UpdatePaymentRequest,
    ) -> Result<(), PaymentClientError> {
        self.maybe_fail()?;
        self.update_requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPaymentStore {
    payments: Mutex<HashMap<Uuid, Payment>>,
    update_payments: Mutex<HashMap<Uuid, UpdatePayment>>,
    payment_save_history: Mutex<Vec<Payment>>,
    fail_saves: Mutex<bool>,
}

impl MemoryPaymentStore {
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    /// Every payment save, in order; exposes the pending-before-call write.
    pub fn payment_save_history(&self) -> Vec<Payment> {
        self.payment_save_history.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if *self.fail_saves.lock().unwrap() {
            Err(StoreError::Query("injected save failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryPaymentStore {
    async fn save_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        self.check_failure()?;
        self.payment_save_history
            .lock()
            .unwrap()
            .push(payment.clone());
        self.payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        Ok(())
    }

    async fn payment(&self, id: Uuid) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.lock().unwrap().get(&id).cloned())
    }

    async fn payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>, StoreError> {
        let mut found: Vec<Payment> = self
            .payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        Ok(found)
    }

    async fn save_update_payment(&self, payment: &UpdatePayment) -> Result<(), StoreError> {
        self.check_failure()?;
        self.update_payments
            .lock()
            .unwrap()
            .insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&self, id: Uuid) -> Result<Option<UpdatePayment>, StoreError> {
        Ok(self.update_payments.lock().unwrap().get(&id).cloned())
    }

    async fn update_payments_by_status(
        &self,
        status: PaymentStatus,
    ) -> Result<Vec<UpdatePayment>, StoreError> {
        let mut found: Vec<UpdatePayment> = self
            .update_payments
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.created_at);
        Ok(found)
    }
}

// ── Notifier fake ───────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeNotifier {
    fail_next: Mutex<u32>,
    notifications: Mutex<Vec<(String, u64, EnvelopeAction)>>,
}

impl FakeNotifier {
    pub fn fail_next(&self, n: u32) {
        *self.fail_next.lock().unwrap() = n;
    }

    pub fn notifications(&self) -> Vec<(String, u64, EnvelopeAction)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl EnvelopeNotifier for FakeNotifier {
    async fn notify(
        &self,
        envelope_id: &str,
        case_id: u64,
        action: EnvelopeAction,
    ) -> Result<(), NotificationError> {
        {
            let mut remaining = self.fail_next.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(NotificationError::Send("downstream unavailable".to_string()));
            }
        }
        self.notifications
            .lock()
            .unwrap()
            .push((envelope_id.to_string(), case_id, action));
        Ok(())
    }
}

// ── Queue message fake ──────────────────────────────────────────────

#[derive(Default)]
pub struct FakeQueueMessage {
    id: String,
    subject: Option<String>,
    body: Vec<u8>,
    delivery_count: u32,
    completed: Mutex<bool>,
    dead_lettered: Mutex<Option<(String, String)>>,
}

impl FakeQueueMessage {
    pub fn new(body: Vec<u8>, delivery_count: u32) -> Self {
        Self {
            id: "message-1".to_string(),
            subject: None,
            body,
            delivery_count,
            ..Default::default()
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            id: "heartbeat-1".to_string(),
            subject: Some(crate::queue::message::HEARTBEAT_SUBJECT.to_string()),
            ..Default::default()
        }
    }

    pub fn completed(&self) -> bool {
        *self.completed.lock().unwrap()
    }

    pub fn dead_lettered(&self) -> Option<(String, String)> {
        self.dead_lettered.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueMessage for FakeQueueMessage {
    fn message_id(&self) -> &str {
        &self.id
    }

    fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    async fn complete(&self) -> Result<(), QueueError> {
        *self.completed.lock().unwrap() = true;
        Ok(())
    }

    async fn dead_letter(&self, reason: &str, description: &str) -> Result<(), QueueError> {
        *self.dead_lettered.lock().unwrap() =
            Some((reason.to_string(), description.to_string()));
        Ok(())
    }
}

// ── Test harness ────────────────────────────────────────────────────

/// Fully wired pipeline over fakes, with every collaborator reachable for
/// assertions.
pub struct TestHarness {
    pub case_api: Arc<FakeCaseApi>,
    pub transformer: Arc<FakeTransformer>,
    pub update_client: Arc<FakeCaseUpdateClient>,
    pub payment_store: Arc<MemoryPaymentStore>,
    pub payment_processor: Arc<FakePaymentProcessor>,
    pub notifier: Arc<FakeNotifier>,
    pub telemetry: Arc<Telemetry>,
    pub services: Arc<ServiceConfigProvider>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_auto_update(true)
    }

    pub fn with_auto_update(auto_case_update_enabled: bool) -> Self {
        let mut config = service_config("mailscan");
        config.auto_case_update_enabled = auto_case_update_enabled;
        Self {
            case_api: Arc::new(FakeCaseApi::default()),
            transformer: Arc::new(FakeTransformer::default()),
            update_client: Arc::new(FakeCaseUpdateClient::default()),
            payment_store: Arc::new(MemoryPaymentStore::default()),
            payment_processor: Arc::new(FakePaymentProcessor::default()),
            notifier: Arc::new(FakeNotifier::default()),
            telemetry: Arc::new(Telemetry::default()),
            services: provider_with(config),
        }
    }

    pub fn payments_service(&self) -> Arc<PaymentsService> {
        Arc::new(PaymentsService::new(
            Arc::clone(&self.payment_store) as Arc<dyn PaymentStore>,
            Arc::clone(&self.payment_processor) as Arc<dyn PaymentProcessorClient>,
        ))
    }

    fn exception_record_creator(&self) -> Arc<ExceptionRecordCreator> {
        Arc::new(ExceptionRecordCreator::new(
            Arc::clone(&self.case_api) as Arc<dyn CaseApi>,
            Arc::new(FakeAuth),
            Arc::clone(&self.services),
        ))
    }

    fn case_finder(&self) -> Arc<CaseFinder> {
        Arc::new(CaseFinder::new(Arc::clone(&self.case_api) as Arc<dyn CaseApi>))
    }

    pub fn new_application_handler(&self) -> NewApplicationHandler {
        let creator = Arc::new(AutoCaseCreator::new(
            Arc::clone(&self.case_api) as Arc<dyn CaseApi>,
            Arc::new(FakeAuth),
            Arc::clone(&self.transformer) as Arc<dyn TransformationClient>,
            Arc::clone(&self.services),
        ));
        NewApplicationHandler::new(
            creator,
            self.payments_service(),
            self.exception_record_creator(),
        )
    }

    pub fn exception_handler(&self) -> ExceptionHandler {
        ExceptionHandler::new(self.exception_record_creator(), self.payments_service())
    }

    pub fn supplementary_evidence_handler(&self) -> SupplementaryEvidenceHandler {
        let attacher = Arc::new(SupplementaryEvidenceAttacher::new(
            Arc::clone(&self.case_api) as Arc<dyn CaseApi>,
            Arc::new(FakeAuth),
        ));
        SupplementaryEvidenceHandler::new(
            self.case_finder(),
            attacher,
            self.exception_record_creator(),
            self.payments_service(),
        )
    }

    pub fn supplementary_evidence_with_ocr_handler(&self) -> SupplementaryEvidenceWithOcrHandler {
        let updater = Arc::new(AutoCaseUpdater::new(
            Arc::clone(&self.case_api) as Arc<dyn CaseApi>,
            Arc::new(FakeAuth),
            self.case_finder(),
            Arc::clone(&self.update_client) as Arc<dyn CaseUpdateClient>,
        ));
        SupplementaryEvidenceWithOcrHandler::new(
            self.exception_record_creator(),
            self.payments_service(),
            updater,
            Arc::clone(&self.services),
        )
    }

    pub fn router(&self) -> EnvelopeRouter {
        EnvelopeRouter::new(
            self.new_application_handler(),
            self.exception_handler(),
            self.supplementary_evidence_handler(),
            self.supplementary_evidence_with_ocr_handler(),
        )
    }
}
