// Test doubles for the console.
//
// ScriptedApi implements ConsoleApi from canned replies. Anything not
// scripted fails with a 501 so tests notice unexpected calls. Status polls
// are served from a queue whose last entry repeats.
//
// Plus helpers for building users, corporates, statuses and pages.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use cardops_client::{
    ApiFieldError, ApplicationBatch, ApplicationFilter, ApplicationRecord, AuthOptions,
    BatchAction, BatchFilter, CardOpsError, Corporate, DraftCreated, ErrorReportRef,
    HealthReport, Page, Pageable, Permission, Product, Result, StagingBatch, StagingRequest,
    StagingStatus, StagingStatusKind, UploadedFile, User,
};

use crate::api::ConsoleApi;

/// A failure a scripted call should produce.
#[derive(Debug, Clone)]
pub enum Failure {
    Unauthorized,
    Server(u16),
    Network,
    Rejected {
        description: String,
        errors: Vec<ApiFieldError>,
    },
}

impl Failure {
    pub fn rejected(description: &str) -> Self {
        Failure::Rejected {
            description: description.to_string(),
            errors: Vec::new(),
        }
    }

    pub fn field(field: &str, message: &str) -> Self {
        Failure::Rejected {
            description: "Validation failed".to_string(),
            errors: vec![ApiFieldError {
                field: Some(field.to_string()),
                message: message.to_string(),
                reason_code: None,
            }],
        }
    }

    fn into_error(self) -> CardOpsError {
        match self {
            Failure::Unauthorized => CardOpsError::SessionExpired,
            Failure::Server(status) => CardOpsError::Http {
                status,
                message: "scripted failure".to_string(),
            },
            Failure::Network => CardOpsError::Network("connection reset".to_string()),
            Failure::Rejected {
                description,
                errors,
            } => CardOpsError::Rejected {
                title: Some("Error".to_string()),
                description,
                code: None,
                errors,
            },
        }
    }
}

pub type Reply<T> = std::result::Result<T, Failure>;

fn unscripted<T>() -> Reply<T> {
    Err(Failure::Server(501))
}

fn replay<T: Clone>(slot: &Mutex<Reply<T>>) -> Result<T> {
    slot.lock().unwrap().clone().map_err(Failure::into_error)
}

pub struct ScriptedApi {
    calls: Mutex<Vec<String>>,
    user: Mutex<Reply<User>>,
    auth_options: Mutex<Reply<AuthOptions>>,
    login: Mutex<Reply<()>>,
    corporates: Mutex<Reply<Vec<Corporate>>>,
    products: Mutex<Reply<Vec<Product>>>,
    upload: Mutex<Reply<UploadedFile>>,
    upload_delay: Mutex<Option<Duration>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    validate: Mutex<Reply<DraftCreated>>,
    statuses: Mutex<VecDeque<Reply<StagingStatus>>>,
    status_delay: Mutex<Option<Duration>>,
    drafts: Mutex<Reply<Page<StagingBatch>>>,
    error_report: Mutex<Reply<ErrorReportRef>>,
    submit: Mutex<Reply<()>>,
    batches: Mutex<Reply<Page<ApplicationBatch>>>,
    applications: Mutex<Reply<Page<ApplicationRecord>>>,
    action: Mutex<Reply<()>>,
    health: Mutex<Reply<HealthReport>>,
    last_staging_request: Mutex<Option<StagingRequest>>,
    last_action: Mutex<Option<(i64, BatchAction, String)>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            user: Mutex::new(unscripted()),
            auth_options: Mutex::new(unscripted()),
            login: Mutex::new(Ok(())),
            corporates: Mutex::new(unscripted()),
            products: Mutex::new(unscripted()),
            upload: Mutex::new(unscripted()),
            upload_delay: Mutex::new(None),
            files: Mutex::new(HashMap::new()),
            validate: Mutex::new(unscripted()),
            statuses: Mutex::new(VecDeque::new()),
            status_delay: Mutex::new(None),
            drafts: Mutex::new(unscripted()),
            error_report: Mutex::new(unscripted()),
            submit: Mutex::new(unscripted()),
            batches: Mutex::new(unscripted()),
            applications: Mutex::new(unscripted()),
            action: Mutex::new(unscripted()),
            health: Mutex::new(unscripted()),
            last_staging_request: Mutex::new(None),
            last_action: Mutex::new(None),
        }
    }

    pub fn with_user(self, user: User) -> Self {
        *self.user.lock().unwrap() = Ok(user);
        self
    }

    pub fn with_auth_options(self, password: bool, sso: bool) -> Self {
        *self.auth_options.lock().unwrap() = Ok(AuthOptions {
            password_enabled: password,
            sso_enabled: sso,
        });
        self
    }

    pub fn with_login(self, reply: Reply<()>) -> Self {
        *self.login.lock().unwrap() = reply;
        self
    }

    pub fn with_corporates(self, corporates: Vec<Corporate>) -> Self {
        *self.corporates.lock().unwrap() = Ok(corporates);
        self
    }

    pub fn with_products(self, products: Vec<Product>) -> Self {
        *self.products.lock().unwrap() = Ok(products);
        self
    }

    pub fn with_upload(self, reply: Reply<UploadedFile>) -> Self {
        *self.upload.lock().unwrap() = reply;
        self
    }

    /// Make every upload take this long to answer.
    pub fn with_upload_delay(self, delay: Duration) -> Self {
        *self.upload_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_file(self, name: &str, contents: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), contents.to_vec());
        self
    }

    pub fn with_validate(self, reply: Reply<DraftCreated>) -> Self {
        *self.validate.lock().unwrap() = reply;
        self
    }

    /// Queue status poll replies. The last one repeats forever.
    pub fn with_statuses(self, replies: Vec<Reply<StagingStatus>>) -> Self {
        *self.statuses.lock().unwrap() = replies.into();
        self
    }

    /// Make every status poll take this long to answer.
    pub fn with_status_delay(self, delay: Duration) -> Self {
        *self.status_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_drafts(self, page: Page<StagingBatch>) -> Self {
        *self.drafts.lock().unwrap() = Ok(page);
        self
    }

    pub fn with_error_report(self, reply: Reply<ErrorReportRef>) -> Self {
        *self.error_report.lock().unwrap() = reply;
        self
    }

    pub fn with_submit(self, reply: Reply<()>) -> Self {
        *self.submit.lock().unwrap() = reply;
        self
    }

    pub fn with_batches(self, page: Page<ApplicationBatch>) -> Self {
        *self.batches.lock().unwrap() = Ok(page);
        self
    }

    pub fn with_applications(self, page: Page<ApplicationRecord>) -> Self {
        *self.applications.lock().unwrap() = Ok(page);
        self
    }

    pub fn with_action(self, reply: Reply<()>) -> Self {
        *self.action.lock().unwrap() = reply;
        self
    }

    pub fn with_health(self, status: &str) -> Self {
        *self.health.lock().unwrap() = Ok(HealthReport {
            status: status.to_string(),
        });
        self
    }

    /// Every call made so far, by operation name.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn last_staging_request(&self) -> Option<StagingRequest> {
        self.last_staging_request.lock().unwrap().clone()
    }

    pub fn last_action(&self) -> Option<(i64, BatchAction, String)> {
        self.last_action.lock().unwrap().clone()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    fn next_status(&self) -> Result<StagingStatus> {
        let mut queue = self.statuses.lock().unwrap();
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        reply.unwrap_or_else(unscripted).map_err(Failure::into_error)
    }
}

impl Default for ScriptedApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsoleApi for ScriptedApi {
    async fn auth_options(&self, _email: &str) -> Result<AuthOptions> {
        self.record("auth_options");
        replay(&self.auth_options)
    }

    async fn login(&self, _email: &str, _password: &str) -> Result<()> {
        self.record("login");
        replay(&self.login)
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout");
        Ok(())
    }

    async fn me(&self) -> Result<User> {
        self.record("me");
        replay(&self.user)
    }

    async fn list_corporates(&self) -> Result<Vec<Corporate>> {
        self.record("list_corporates");
        replay(&self.corporates)
    }

    async fn list_corporate_products(&self, _corporate_id: i64) -> Result<Vec<Product>> {
        self.record("list_corporate_products");
        replay(&self.products)
    }

    async fn upload_file(&self, _file_name: &str, _contents: Vec<u8>) -> Result<UploadedFile> {
        self.record("upload_file");
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        replay(&self.upload)
    }

    async fn download_file(&self, file_name: &str) -> Result<Vec<u8>> {
        self.record("download_file");
        self.files
            .lock()
            .unwrap()
            .get(file_name)
            .cloned()
            .ok_or(CardOpsError::Http {
                status: 404,
                message: "Not Found".to_string(),
            })
    }

    async fn validate_draft(&self, req: &StagingRequest) -> Result<DraftCreated> {
        self.record("validate_draft");
        *self.last_staging_request.lock().unwrap() = Some(req.clone());
        replay(&self.validate)
    }

    async fn draft_status(&self, _staging_batch_id: i64) -> Result<StagingStatus> {
        self.record("draft_status");
        let delay = *self.status_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_status()
    }

    async fn list_drafts(&self, _page: u32, _size: u32) -> Result<Page<StagingBatch>> {
        self.record("list_drafts");
        replay(&self.drafts)
    }

    async fn draft_errors(&self, _staging_batch_id: i64) -> Result<ErrorReportRef> {
        self.record("draft_errors");
        replay(&self.error_report)
    }

    async fn submit_draft(&self, _staging_batch_id: i64) -> Result<()> {
        self.record("submit_draft");
        replay(&self.submit)
    }

    async fn list_batches(
        &self,
        _filter: BatchFilter,
        _page: u32,
        _size: u32,
    ) -> Result<Page<ApplicationBatch>> {
        self.record("list_batches");
        replay(&self.batches)
    }

    async fn list_applications(
        &self,
        _filter: ApplicationFilter,
        _page: u32,
        _size: u32,
    ) -> Result<Page<ApplicationRecord>> {
        self.record("list_applications");
        replay(&self.applications)
    }

    async fn batch_action(&self, batch_id: i64, action: BatchAction, reason: &str) -> Result<()> {
        self.record("batch_action");
        *self.last_action.lock().unwrap() = Some((batch_id, action, reason.to_string()));
        replay(&self.action)
    }

    async fn health(&self) -> Result<HealthReport> {
        self.record("health");
        replay(&self.health)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn corporate(id: i64, code: &str) -> Corporate {
    Corporate {
        id,
        code: code.to_string(),
        name: format!("{code} Ltd"),
        is_default: false,
    }
}

pub fn user(permissions: &[&str], corporates: Vec<Corporate>) -> User {
    User {
        id: 1,
        full_name: "Jane Operator".to_string(),
        email: "jane@example.com".to_string(),
        roles: vec!["ADMIN".to_string()],
        permissions: permissions
            .iter()
            .map(|code| Permission {
                code: code.to_string(),
            })
            .collect(),
        corporates,
    }
}

pub fn product(id: i64, code: &str, status: &str) -> Product {
    Product {
        id,
        product_code: code.to_string(),
        product_name: format!("{code} card"),
        status: status.to_string(),
    }
}

pub fn status(kind: &str, total: u64, valid: u64, invalid: u64) -> StagingStatus {
    StagingStatus {
        status: StagingStatusKind::from(kind.to_string()),
        total_count: total,
        valid_count: valid,
        invalid_count: invalid,
    }
}

pub fn batch(batch_id: i64, status: &str) -> ApplicationBatch {
    ApplicationBatch {
        batch_id,
        status: status.to_string(),
        product_name: Some("Gift card".to_string()),
        corporate_code: Some("ACME".to_string()),
        card_type: None,
        total_records: 10,
        created_at: None,
    }
}

pub fn record(id: i64, batch_id: i64, status: &str) -> ApplicationRecord {
    ApplicationRecord {
        id,
        batch_id: Some(batch_id),
        status: status.to_string(),
        name: Some("Jane Doe".to_string()),
        mobile: Some("9876543210".to_string()),
        email: Some("jane@example.com".to_string()),
        failure_reason: None,
        corp_id: Some(1),
        product_name: None,
        card_type: None,
        emboss_type: None,
        application: None,
    }
}

/// First page of `total` elements, `size` per page.
pub fn page<T>(content: Vec<T>, total: u64, size: u32) -> Page<T> {
    let number_of_elements = content.len() as u32;
    let total_pages = if size == 0 {
        0
    } else {
        total.div_ceil(size as u64) as u32
    };
    Page {
        content,
        total_pages,
        total_elements: total,
        number_of_elements,
        first: true,
        last: total_pages <= 1,
        number: 0,
        pageable: Pageable {
            offset: 0,
            page_size: size,
            page_number: 0,
        },
    }
}
