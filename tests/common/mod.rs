#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use kmt_server::{
    AppConfig, AppState, AttachmentService, MockAttachmentStore, MockMailService, UserService,
    error::AppError,
    models::{Attachment, NewAttachment, Role, User},
    repository::Repository,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use uuid::Uuid;

pub const ADMIN_ID: Uuid = Uuid::from_u128(1);
pub const MANAGER_ID: Uuid = Uuid::from_u128(2);
pub const INACTIVE_ID: Uuid = Uuid::from_u128(3);
pub const MISSING_ID: Uuid = Uuid::from_u128(999);
pub const PASSWORD: &str = "correct horse battery staple";

// --- In-memory Repository ---

/// Stand-in for Postgres. Rows live in vectors behind mutexes; a couple of
/// switches simulate database faults and counters record writes.
#[derive(Default)]
pub struct MockRepo {
    pub users: Mutex<Vec<User>>,
    pub roles: Mutex<Vec<Role>>,
    pub attachments: Mutex<Vec<Attachment>>,
    pub fail_attachment_insert: bool,
    pub user_writes: AtomicUsize,
    pub attachment_writes: AtomicUsize,
}

impl MockRepo {
    /// Roles admin/manager/user; an active admin, an active manager and an
    /// inactive user.
    pub fn seeded() -> Self {
        let repo = MockRepo::default();
        *repo.roles.lock().unwrap() = vec![
            role("admin", "Administrator"),
            role("manager", "Manager"),
            role("user", "User"),
        ];
        *repo.users.lock().unwrap() = vec![
            user(ADMIN_ID, "admin@kmt.test", "admin", true),
            user(MANAGER_ID, "manager@kmt.test", "manager", true),
            user(INACTIVE_ID, "gone@kmt.test", "user", false),
        ];
        repo
    }

    pub fn with_user(self, user: User) -> Self {
        self.users.lock().unwrap().push(user);
        self
    }

    pub fn with_attachment(self, attachment: Attachment) -> Self {
        self.attachments.lock().unwrap().push(attachment);
        self
    }

    /// Direct peek at a stored row, for assertions.
    pub fn get_user_sync(&self, id: Uuid) -> User {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .expect("user seeded")
    }

    pub fn user_writes(&self) -> usize {
        self.user_writes.load(Ordering::SeqCst)
    }

    pub fn attachment_writes(&self) -> usize {
        self.attachment_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for MockRepo {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.users.lock().unwrap().clone())
    }

    async fn get_users_by_role(&self, role: &str, active: bool) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.user_role == role && u.active == active)
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: &User) -> Result<User, AppError> {
        self.user_writes.fetch_add(1, Ordering::SeqCst);
        self.users.lock().unwrap().push(user.clone());
        Ok(user.clone())
    }

    async fn update_user(&self, user: &User) -> Result<User, AppError> {
        self.user_writes.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::NotFound("user does not exist".to_string()))?;
        *slot = user.clone();
        Ok(user.clone())
    }

    async fn get_roles(&self) -> Result<Vec<Role>, AppError> {
        Ok(self.roles.lock().unwrap().clone())
    }

    async fn get_role(&self, name: &str) -> Result<Option<Role>, AppError> {
        Ok(self.roles.lock().unwrap().iter().find(|r| r.name == name).cloned())
    }

    async fn create_attachment(&self, attachment: &NewAttachment) -> Result<Attachment, AppError> {
        if self.fail_attachment_insert {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }
        self.attachment_writes.fetch_add(1, Ordering::SeqCst);
        let row = Attachment {
            id: Uuid::new_v4(),
            file_name: attachment.file_name.clone(),
            file_size: attachment.file_size,
            file_type: attachment.file_type.clone(),
            checksum: attachment.checksum.clone(),
            created_at: Utc::now(),
            url: String::new(),
        };
        self.attachments.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get_attachment(&self, id: Uuid) -> Result<Option<Attachment>, AppError> {
        Ok(self
            .attachments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn delete_attachment(&self, id: Uuid) -> Result<bool, AppError> {
        let mut attachments = self.attachments.lock().unwrap();
        let before = attachments.len();
        attachments.retain(|a| a.id != id);
        Ok(attachments.len() < before)
    }
}

// --- Fixtures ---

pub fn role(name: &str, label: &str) -> Role {
    Role {
        name: name.to_string(),
        label: label.to_string(),
    }
}

/// A user whose password is `PASSWORD`. Cost 4 keeps the tests fast.
pub fn user(id: Uuid, email: &str, role: &str, active: bool) -> User {
    let now = Utc::now();
    User {
        id,
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: role.to_string(),
        user_role: role.to_string(),
        active,
        password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
        created_at: now,
        updated_at: now,
    }
}

pub fn attachment_row(file_name: &str, bytes: &[u8]) -> Attachment {
    Attachment {
        id: Uuid::new_v4(),
        file_name: file_name.to_string(),
        file_size: bytes.len() as i64,
        file_type: "text/plain".to_string(),
        checksum: kmt_server::storage::checksum(bytes),
        created_at: Utc::now(),
        url: String::new(),
    }
}

// --- State Builders ---

pub struct TestContext {
    pub repo: Arc<MockRepo>,
    pub storage: Arc<MockAttachmentStore>,
    pub mail: Arc<MockMailService>,
    pub config: AppConfig,
}

impl TestContext {
    pub fn new(repo: MockRepo) -> Self {
        Self::with_parts(repo, MockAttachmentStore::new(), MockMailService::new())
    }

    pub fn with_parts(repo: MockRepo, storage: MockAttachmentStore, mail: MockMailService) -> Self {
        Self {
            repo: Arc::new(repo),
            storage: Arc::new(storage),
            mail: Arc::new(mail),
            config: AppConfig::default(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            repo: self.repo.clone(),
            storage: self.storage.clone(),
            mail: self.mail.clone(),
            config: self.config.clone(),
        }
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.repo.clone(), self.mail.clone(), "http://portal.test/login")
    }

    pub fn attachments(&self) -> AttachmentService {
        AttachmentService::new(self.repo.clone(), self.storage.clone())
    }
}
