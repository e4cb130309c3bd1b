use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::device::DeviceInfo;

// --- Envelope ---

/// Outbound JSON body. Every POST carries the device metadata next to the
/// operation payload.
#[derive(Debug, Serialize)]
pub struct RequestBody<'a, P: Serialize> {
    pub device: &'a DeviceInfo,
    pub payload: &'a P,
}

/// Response wrapper shared by every backend operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub rc: Option<String>,
    pub code: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiFieldError>,
}

/// One entry of the envelope's `errors` array. A missing `field` marks a
/// page-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFieldError {
    pub field: Option<String>,
    pub message: String,
    #[serde(rename = "reasonCode")]
    pub reason_code: Option<String>,
}

/// Empty request payload (`{}`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Empty {}

// --- Auth ---

#[derive(Debug, Clone, Serialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Which sign-in methods the backend allows for an email address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AuthOptions {
    #[serde(rename = "password-enabled", default)]
    pub password_enabled: bool,
    #[serde(rename = "sso-enabled", default)]
    pub sso_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corporate {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(rename = "isDefault", default)]
    pub is_default: bool,
}

/// The authenticated user as returned by `/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "user-id")]
    pub id: i64,
    #[serde(rename = "full-name")]
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub corporates: Vec<Corporate>,
}

impl User {
    pub fn has_permission(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.code == code)
    }
}

// --- Catalog ---

#[derive(Debug, Clone, Serialize)]
pub struct CorporateListRequest {
    #[serde(rename = "includeProducts")]
    pub include_products: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorporateProductsRequest {
    #[serde(rename = "corporateId")]
    pub corporate_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(rename = "productCode")]
    pub product_code: String,
    #[serde(rename = "productName")]
    pub product_name: String,
    pub status: String,
}

impl Product {
    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }
}

// --- Application fields ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    #[default]
    Virtual,
    Physical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmbossType {
    #[default]
    Personalized,
    NonPersonalized,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliverTo {
    #[default]
    Home,
    Office,
}

/// A single card application record. Field order matches the bulk CSV
/// column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEntry {
    #[serde(default)]
    pub kit_number: String,
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub amount: String,
    #[serde(default, deserialize_with = "deliver_to_or_default")]
    pub deliver_to: DeliverTo,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: String,
    #[serde(default)]
    pub address_line3: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub pincode: String,
}

/// Blank or null `deliverTo` means the default. Bulk files for virtual
/// cards leave the column empty.
fn deliver_to_or_default<'de, D>(deserializer: D) -> std::result::Result<DeliverTo, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(DeliverTo::default()),
        Some("HOME") => Ok(DeliverTo::Home),
        Some("OFFICE") => Ok(DeliverTo::Office),
        Some(other) => Err(serde::de::Error::unknown_variant(other, &["HOME", "OFFICE"])),
    }
}

// --- Staging ---

/// Submit-for-validation request. Exactly one of `file_path` (bulk) and
/// `application` (single) is set, mirrored by `is_bulk` / `is_single`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingRequest {
    pub corporate_code: String,
    pub product_code: String,
    pub card_type: CardType,
    pub emboss_type: EmbossType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationEntry>,
    pub is_bulk: bool,
    pub is_single: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DraftCreated {
    #[serde(rename = "draftId")]
    pub draft_id: i64,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StagingBatchRef {
    #[serde(rename = "stagingBatchId")]
    pub staging_batch_id: i64,
}

/// Lifecycle status of a staging batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(from = "String")]
pub enum StagingStatusKind {
    Validating,
    Validated,
    Completed,
    Failed,
    Other(String),
}

impl StagingStatusKind {
    /// `COMPLETED` only shows up in some backend revisions and behaves
    /// exactly like `VALIDATED`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StagingStatusKind::Validated | StagingStatusKind::Completed | StagingStatusKind::Failed
        )
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, StagingStatusKind::Validated | StagingStatusKind::Completed)
    }

    pub fn as_str(&self) -> &str {
        match self {
            StagingStatusKind::Validating => "VALIDATING",
            StagingStatusKind::Validated => "VALIDATED",
            StagingStatusKind::Completed => "COMPLETED",
            StagingStatusKind::Failed => "FAILED",
            StagingStatusKind::Other(s) => s,
        }
    }
}

impl From<String> for StagingStatusKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "VALIDATING" => StagingStatusKind::Validating,
            "VALIDATED" => StagingStatusKind::Validated,
            "COMPLETED" => StagingStatusKind::Completed,
            "FAILED" => StagingStatusKind::Failed,
            _ => StagingStatusKind::Other(s),
        }
    }
}

impl fmt::Display for StagingStatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read projection of a staging batch, polled while validation runs.
/// Counts are absent while the backend is still counting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingStatus {
    pub status: StagingStatusKind,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub valid_count: u64,
    #[serde(default)]
    pub invalid_count: u64,
}

/// A past staging batch as listed by `/applications/draft/list`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingBatch {
    pub draft_id: i64,
    pub uploaded_by: Option<i64>,
    pub created_at: Option<String>,
    pub status: StagingStatusKind,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub valid_count: u64,
    #[serde(default)]
    pub invalid_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorReportRef {
    #[serde(rename = "filePath")]
    pub file_path: Option<String>,
}

// --- Files ---

/// Server-side handle returned by the multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(rename = "fileName", alias = "path", alias = "filePath")]
    pub file_name: String,
}

// --- Paging ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Pageable {
    #[serde(default)]
    pub offset: u64,
    #[serde(rename = "pageSize", default)]
    pub page_size: u32,
    #[serde(rename = "pageNumber", default)]
    pub page_number: u32,
}

/// Spring-style page of results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub number_of_elements: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub pageable: Pageable,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRequest<F: Serialize> {
    pub filter: F,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<i64>,
}

// --- Batches ---

/// A submitted group of card applications.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationBatch {
    pub batch_id: i64,
    pub status: String,
    pub product_name: Option<String>,
    pub corporate_code: Option<String>,
    pub card_type: Option<CardType>,
    #[serde(default)]
    pub total_records: u64,
    pub created_at: Option<String>,
}

impl ApplicationBatch {
    pub fn is_pending_approval(&self) -> bool {
        self.status == "PENDING_APPROVAL"
    }
}

/// One line item of an application batch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: i64,
    pub batch_id: Option<i64>,
    pub status: String,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub email: Option<String>,
    pub failure_reason: Option<String>,
    pub corp_id: Option<i64>,
    pub product_name: Option<String>,
    pub card_type: Option<CardType>,
    pub emboss_type: Option<EmbossType>,
    pub application: Option<ApplicationEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchAction {
    Approve,
    Reject,
    Cancel,
}

impl BatchAction {
    pub fn requires_reason(self) -> bool {
        !matches!(self, BatchAction::Approve)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchAction::Approve => "APPROVE",
            BatchAction::Reject => "REJECT",
            BatchAction::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for BatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchActionRequest {
    pub batch_id: i64,
    pub action: BatchAction,
    pub reason: String,
}

// --- Health ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    pub status: String,
}

impl HealthReport {
    pub fn is_up(&self) -> bool {
        self.status == "UP"
    }
}
