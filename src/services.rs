use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth,
    error::AppError,
    mail::MailState,
    models::{
        Attachment, AttachmentResponse, CreateUserRequest, NewAttachment, Role, UpdateUserRequest,
        User,
    },
    repository::RepositoryState,
    storage::{self, StorageState},
};

pub const EMPTY_UPLOAD_MSG: &str = "please select a file!";
pub const UPLOAD_SUCCESS_MSG: &str = "File uploaded successfully.";
pub const ATTACHMENT_DELETED_MSG: &str = "Attachment deleted successfully.";
pub const ATTACHMENT_DELETE_FAILED_MSG: &str = "some problem occurred while deleting attachment";

const USER_NOT_FOUND: &str = "user with the id does not exist";
const USER_MISSING: &str = "user does not exist";
const USER_INACTIVE: &str = "user is not active";
const NOT_PERMITTED: &str = "Operation not permitted";

/// UserService
///
/// Business rules for portal accounts. Holds only shared handles, so it is
/// cheap to build per request (see the `FromRef` impl in `lib.rs`).
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    mail: MailState,
    login_link: String,
}

impl UserService {
    pub fn new(repo: RepositoryState, mail: MailState, login_link: impl Into<String>) -> Self {
        Self {
            repo,
            mail,
            login_link: login_link.into(),
        }
    }

    /// save
    ///
    /// Persists a new user and sends the welcome mail. The mail is
    /// fire-and-forget: a failed send is logged and the saved user is still
    /// returned.
    pub async fn save(&self, user: User) -> Result<User, AppError> {
        self.ensure_email_free(&user.email, None).await?;
        self.ensure_role_exists(&user.user_role).await?;

        let created = self.repo.create_user(&user).await?;
        tracing::info!(user_id = %created.id, role = %created.user_role, "user created");

        if let Err(e) = self
            .mail
            .send_user_created_mail(&created, &self.login_link)
            .await
        {
            tracing::warn!(user_id = %created.id, error = %e, "user-created mail failed");
        }

        Ok(created)
    }

    /// create_user
    ///
    /// Builds an active user with a fresh id and a hashed password, then saves it.
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, AppError> {
        ensure_valid_email(&req.email)?;
        ensure_valid_password(&req.password)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: req.email.trim().to_string(),
            first_name: req.first_name,
            last_name: req.last_name,
            user_role: req.user_role,
            active: true,
            password_hash: auth::hash_password(&req.password)?,
            created_at: now,
            updated_at: now,
        };

        self.save(user).await
    }

    pub async fn get_user_by_id(&self, id: Uuid) -> Result<User, AppError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.repo.get_user_by_email(email).await
    }

    pub async fn get_all_users(&self) -> Result<Vec<User>, AppError> {
        self.repo.get_all_users().await
    }

    /// get_all_active_users_by_roles
    ///
    /// Union of the active users of each requested role, in request order,
    /// with every user appearing at most once.
    pub async fn get_all_active_users_by_roles(
        &self,
        roles: &[String],
    ) -> Result<Vec<User>, AppError> {
        let mut seen = HashSet::new();
        let mut users = Vec::new();

        for role in roles {
            for user in self.repo.get_users_by_role(role, true).await? {
                if seen.insert(user.id) {
                    users.push(user);
                }
            }
        }

        Ok(users)
    }

    /// update_user
    ///
    /// Merges `changes` into the stored row. Only active users can be edited.
    pub async fn update_user(&self, changes: UpdateUserRequest, id: Uuid) -> Result<User, AppError> {
        let mut user = self
            .repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_MISSING.to_string()))?;

        if !user.active {
            return Err(AppError::NotPermitted(USER_INACTIVE.to_string()));
        }

        if let Some(email) = changes.email {
            ensure_valid_email(&email)?;
            let email = email.trim().to_string();
            if !email.eq_ignore_ascii_case(&user.email) {
                self.ensure_email_free(&email, Some(id)).await?;
            }
            user.email = email;
        }
        if let Some(role) = changes.user_role {
            if role != user.user_role {
                self.ensure_role_exists(&role).await?;
            }
            user.user_role = role;
        }
        if let Some(first_name) = changes.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            user.last_name = last_name;
        }
        if let Some(password) = changes.password {
            ensure_valid_password(&password)?;
            user.password_hash = auth::hash_password(&password)?;
        }

        let updated = self.repo.update_user(&user).await?;
        tracing::info!(user_id = %updated.id, "user updated");
        Ok(updated)
    }

    /// change_user_status
    ///
    /// Flips the active flag. Asking for the state the user is already in is
    /// rejected rather than silently accepted.
    pub async fn change_user_status(&self, id: Uuid, active: bool) -> Result<User, AppError> {
        let mut user = self
            .repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND.to_string()))?;

        if user.active == active {
            return Err(AppError::NotPermitted(NOT_PERMITTED.to_string()));
        }

        user.active = active;
        let updated = self.repo.update_user(&user).await?;
        tracing::info!(user_id = %updated.id, active, "user status changed");
        Ok(updated)
    }

    pub async fn get_user_roles(&self) -> Result<Vec<Role>, AppError> {
        self.repo.get_roles().await
    }

    /// authenticate
    ///
    /// Resolves login credentials to an active user. Every failure is the same
    /// `Unauthorized` so callers cannot probe which part was wrong.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .repo
            .get_user_by_email(email.trim())
            .await?
            .filter(|u| u.active)
            .ok_or(AppError::Unauthorized)?;

        if !auth::verify_password(password, &user.password_hash) {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    async fn ensure_email_free(&self, email: &str, owner: Option<Uuid>) -> Result<(), AppError> {
        match self.repo.get_user_by_email(email).await? {
            Some(existing) if Some(existing.id) != owner => {
                Err(AppError::Validation("email already in use".to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn ensure_role_exists(&self, role: &str) -> Result<(), AppError> {
        match self.repo.get_role(role).await? {
            Some(_) => Ok(()),
            None => Err(AppError::Validation("role does not exist".to_string())),
        }
    }
}

fn ensure_valid_email(email: &str) -> Result<(), AppError> {
    if email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }
    Ok(())
}

fn ensure_valid_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }
    Ok(())
}

/// UploadedFile
///
/// A multipart upload after parsing: the raw bytes plus the client-declared
/// name and MIME type.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub file_type: String,
}

/// AttachmentDownload
#[derive(Debug, Clone)]
pub struct AttachmentDownload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// AttachmentService
///
/// Coordinates the attachment store (bytes) with the repository (rows).
#[derive(Clone)]
pub struct AttachmentService {
    repo: RepositoryState,
    storage: StorageState,
}

impl AttachmentService {
    pub fn new(repo: RepositoryState, storage: StorageState) -> Self {
        Self { repo, storage }
    }

    /// upload
    ///
    /// Empty payloads and write failures come back as a `status: false`
    /// response. A row-insert failure removes the just-written file before
    /// propagating, so no bytes are left without a row.
    pub async fn upload(&self, file: UploadedFile) -> Result<AttachmentResponse, AppError> {
        if file.bytes.is_empty() {
            return Ok(AttachmentResponse::failure(EMPTY_UPLOAD_MSG));
        }

        let stored = match self.storage.store(&file.file_name, &file.bytes).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(error = %e, "attachment write failed");
                return Ok(AttachmentResponse::failure(e.to_string()));
            }
        };

        let row = NewAttachment {
            file_name: stored.file_name.clone(),
            file_size: file.bytes.len() as i64,
            file_type: file.file_type,
            checksum: stored.checksum,
        };

        let attachment = match self.repo.create_attachment(&row).await {
            Ok(attachment) => attachment.with_access_url(),
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&stored.file_name).await {
                    tracing::error!(
                        file_name = %stored.file_name,
                        error = %cleanup,
                        "could not remove attachment after failed insert"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(attachment_id = %attachment.id, size = attachment.file_size, "attachment stored");

        Ok(AttachmentResponse {
            status: true,
            message: UPLOAD_SUCCESS_MSG.to_string(),
            attachment: Some(attachment),
        })
    }

    pub async fn get_attachment_by_id(&self, id: Uuid) -> Result<Attachment, AppError> {
        self.repo
            .get_attachment(id)
            .await?
            .map(Attachment::with_access_url)
            .ok_or_else(|| AppError::NotFound("attachment does not exist".to_string()))
    }

    /// download
    ///
    /// Resolves the row, reads the bytes and checks them against the stored checksum.
    pub async fn download(&self, id: Uuid) -> Result<AttachmentDownload, AppError> {
        let attachment = self.get_attachment_by_id(id).await?;
        let bytes = self.storage.read(&attachment.file_name).await?;

        if storage::checksum(&bytes) != attachment.checksum {
            return Err(AppError::NotPermitted(format!(
                "checksum mismatch for attachment {id}"
            )));
        }

        Ok(AttachmentDownload {
            file_name: attachment.file_name,
            bytes,
        })
    }

    /// delete
    ///
    /// True when a row was removed. A file already missing from disk does not
    /// turn a successful row delete into a failure.
    pub async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let Some(attachment) = self.repo.get_attachment(id).await? else {
            return Ok(false);
        };

        if !self.repo.delete_attachment(id).await? {
            return Ok(false);
        }

        if let Err(e) = self.storage.remove(&attachment.file_name).await {
            tracing::warn!(attachment_id = %id, error = %e, "attachment file already gone");
        }

        tracing::info!(attachment_id = %id, "attachment deleted");
        Ok(true)
    }
}
