use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use cardops_client::{
    ApplicationEntry, CardOpsError, CardType, Corporate, EmbossType, Product, StagingRequest,
    UploadedFile,
};

use crate::api::ConsoleApi;
use crate::error::{map_api_errors, ConsoleError, PageError, Result};
use crate::notice::{Notice, Outcome};
use crate::session::{SessionSnapshot, SessionStore};
use crate::shell::{Navigation, Route};

pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["csv", "xls", "xlsx"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryMode {
    #[default]
    Bulk,
    Single,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success(UploadedFile),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
}

/// Products offered for a corporate: its active ones.
pub async fn active_products(api: &dyn ConsoleApi, corporate: &Corporate) -> Result<Vec<Product>> {
    let products = api.list_corporate_products(corporate.id).await?;
    Ok(products.into_iter().filter(Product::is_active).collect())
}

/// The "create application" form: common fields plus either a bulk file or
/// one inline record.
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub corporate_code: String,
    pub product_code: String,
    pub card_type: CardType,
    pub emboss_type: EmbossType,
    pub mode: EntryMode,
    pub entry: ApplicationEntry,
    file: Option<SelectedFile>,
    upload: UploadStatus,
    submitting: bool,
    pub field_errors: BTreeMap<String, String>,
    pub page_error: Option<PageError>,
}

impl UploadForm {
    pub fn new(corporate_code: impl Into<String>) -> Self {
        Self {
            corporate_code: corporate_code.into(),
            product_code: String::new(),
            card_type: CardType::default(),
            emboss_type: EmbossType::default(),
            mode: EntryMode::default(),
            entry: ApplicationEntry::default(),
            file: None,
            upload: UploadStatus::Idle,
            submitting: false,
            field_errors: BTreeMap::new(),
            page_error: None,
        }
    }

    /// A form bound to the session's selected corporate.
    pub fn for_session(session: &SessionSnapshot) -> Result<Self> {
        let corporate = session
            .selected_corporate
            .as_ref()
            .ok_or(ConsoleError::NoCorporate)?;
        Ok(Self::new(corporate.code.clone()))
    }

    /// Pick a product by code from the offered list.
    pub fn select_product(&mut self, offered: &[Product], product_code: &str) -> Result<()> {
        let product = offered
            .iter()
            .find(|p| p.product_code == product_code && p.is_active())
            .ok_or_else(|| ConsoleError::NotFound(format!("active product {product_code}")))?;
        self.product_code = product.product_code.clone();
        Ok(())
    }

    pub fn upload_status(&self) -> &UploadStatus {
        &self.upload
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.upload == UploadStatus::Uploading
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Claim the form's single upload slot for a newly selected file.
    pub fn begin_upload(&mut self, file_name: &str, size: u64) -> Result<()> {
        if self.is_uploading() {
            return Err(ConsoleError::UploadInFlight);
        }

        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ConsoleError::UnsupportedFile(file_name.to_string()));
        }

        self.file = Some(SelectedFile {
            name: file_name.to_string(),
            size,
        });
        self.upload = UploadStatus::Uploading;
        Ok(())
    }

    /// Record the upload result. A failed upload also forgets the file.
    pub fn finish_upload(&mut self, result: &cardops_client::Result<UploadedFile>) -> Option<Notice> {
        match result {
            Ok(uploaded) => {
                self.upload = UploadStatus::Success(uploaded.clone());
                None
            }
            Err(e) => {
                warn!(error = %e, "File upload failed");
                self.upload = UploadStatus::Failed(e.to_string());
                self.file = None;
                Some(Notice::error(
                    "Upload Failed",
                    "Failed to upload file. Please try again.",
                ))
            }
        }
    }

    /// Upload a bulk file and keep the server-side reference for validation.
    pub async fn upload(
        &mut self,
        api: &dyn ConsoleApi,
        session: &SessionStore,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Outcome> {
        self.begin_upload(file_name, contents.len() as u64)?;

        let result = {
            let mut slot = UploadSlot::claim(&mut self.upload, &mut self.file);
            let result = api.upload_file(file_name, contents).await;
            slot.release();
            result
        };
        let notice = self.finish_upload(&result);

        if let Err(e) = &result {
            if let Some(nav) = session.on_api_error(e) {
                return Ok(Outcome::navigate(nav));
            }
        }

        let mut outcome = Outcome::stay();
        if let Some(notice) = notice {
            outcome = outcome.with_notice(notice);
        }
        Ok(outcome)
    }

    /// Remove the selected file. Not allowed mid-upload.
    pub fn remove_file(&mut self) -> Result<()> {
        if self.is_uploading() {
            return Err(ConsoleError::UploadInFlight);
        }
        self.file = None;
        self.upload = UploadStatus::Idle;
        Ok(())
    }

    /// Names of required inputs that are still empty or invalid.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.corporate_code.trim().is_empty() {
            missing.push("corporateCode");
        }
        if self.product_code.trim().is_empty() {
            missing.push("productCode");
        }

        match self.mode {
            EntryMode::Bulk => {
                if !matches!(self.upload, UploadStatus::Success(_)) || self.file.is_none() {
                    missing.push("file");
                }
            }
            EntryMode::Single => missing.extend(missing_entry_fields(&self.entry, self.card_type)),
        }
        missing
    }

    /// Whether "Upload and Validate" may be pressed.
    pub fn can_validate(&self) -> bool {
        !self.submitting && !self.is_uploading() && self.missing_fields().is_empty()
    }

    pub fn build_request(&self) -> Result<StagingRequest> {
        if self.is_uploading() {
            return Err(ConsoleError::UploadInFlight);
        }
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ConsoleError::Incomplete(missing));
        }

        let (file_path, application) = match (&self.mode, &self.upload) {
            (EntryMode::Bulk, UploadStatus::Success(uploaded)) => {
                (Some(uploaded.file_name.clone()), None)
            }
            (EntryMode::Single, _) => (None, Some(self.entry.clone())),
            (EntryMode::Bulk, _) => return Err(ConsoleError::Incomplete(vec!["file"])),
        };

        Ok(StagingRequest {
            corporate_code: self.corporate_code.clone(),
            product_code: self.product_code.clone(),
            card_type: self.card_type,
            emboss_type: self.emboss_type,
            is_bulk: file_path.is_some(),
            is_single: application.is_some(),
            file_path,
            application,
        })
    }

    /// Create the staging batch and move to its status view.
    pub async fn submit(&mut self, api: &dyn ConsoleApi, session: &SessionStore) -> Result<Outcome> {
        let request = self.build_request()?;
        if self.submitting {
            return Err(ConsoleError::NotAllowed("validation already requested".to_string()));
        }

        self.submitting = true;
        self.field_errors.clear();
        self.page_error = None;

        let result = api.validate_draft(&request).await;
        self.submitting = false;

        match result {
            Ok(created) => {
                info!(draft_id = created.draft_id, "Validation started");
                Ok(Outcome::navigate(Navigation::To(Route::StagingStatus(
                    created.draft_id,
                ))))
            }
            Err(e) => Ok(self.absorb_error(&e, session)),
        }
    }

    fn absorb_error(&mut self, err: &CardOpsError, session: &SessionStore) -> Outcome {
        if let Some(nav) = session.on_api_error(err) {
            return Outcome::navigate(nav);
        }

        warn!(error = %err, "Validation request failed");
        let mapping = map_api_errors(err);
        let mut outcome = Outcome::stay();

        if !mapping.field_errors.is_empty() {
            outcome = outcome.with_notice(Notice::error(
                "Validation Failed",
                "Please check the highlighted fields.",
            ));
        }
        if let Some(page) = &mapping.page_error {
            outcome = outcome.with_notice(Notice::error(&page.title, &page.description));
        }

        self.field_errors = mapping.field_errors;
        self.page_error = mapping.page_error;
        outcome
    }
}

/// Frees the form's upload slot when the request is dropped before the
/// backend answers.
struct UploadSlot<'a> {
    status: &'a mut UploadStatus,
    file: &'a mut Option<SelectedFile>,
    pending: bool,
}

impl<'a> UploadSlot<'a> {
    fn claim(status: &'a mut UploadStatus, file: &'a mut Option<SelectedFile>) -> Self {
        Self {
            status,
            file,
            pending: true,
        }
    }

    fn release(&mut self) {
        self.pending = false;
    }
}

impl Drop for UploadSlot<'_> {
    fn drop(&mut self) {
        if self.pending && *self.status == UploadStatus::Uploading {
            warn!("Upload abandoned before the backend answered");
            *self.status = UploadStatus::Idle;
            *self.file = None;
        }
    }
}

/// Required single-record fields that are empty. Physical cards also need a
/// delivery address.
pub fn missing_entry_fields(entry: &ApplicationEntry, card_type: CardType) -> Vec<&'static str> {
    let mut required: Vec<(&'static str, &str)> = vec![
        ("name", entry.name.as_str()),
        ("mobile", entry.mobile.as_str()),
        ("email", entry.email.as_str()),
    ];
    if card_type == CardType::Physical {
        required.extend([
            ("addressLine1", entry.address_line1.as_str()),
            ("city", entry.city.as_str()),
            ("state", entry.state.as_str()),
            ("pincode", entry.pincode.as_str()),
        ]);
    }

    let mut missing: Vec<&'static str> = required
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
    if !is_valid_amount(&entry.amount) {
        missing.push("amount");
    }
    missing
}

pub fn is_valid_amount(amount: &str) -> bool {
    amount
        .trim()
        .parse::<f64>()
        .map(|v| v.is_finite() && v > 0.0)
        .unwrap_or(false)
}
