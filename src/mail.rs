use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use crate::{error::AppError, models::User};

/// MailService
///
/// Outbound notifications. The only message the portal sends today is the
/// welcome mail for a freshly created account.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn send_user_created_mail(&self, user: &User, login_link: &str) -> Result<(), AppError>;
}

/// MailState
///
/// The concrete type used to share the notifier across the application state.
pub type MailState = Arc<dyn MailService>;

#[derive(Serialize)]
struct MailPayload<'a> {
    to_addr: &'a str,
    subject: &'a str,
    html_body: String,
}

fn welcome_body(user: &User, login_link: &str) -> String {
    format!(
        "<p>Hello {} {},</p>\
         <p>An account has been created for you on the knowledge portal.</p>\
         <p>Sign in at <a href=\"{link}\">{link}</a> with <b>{}</b>.</p>",
        user.first_name,
        user.last_name,
        user.email,
        link = login_link,
    )
}

/// HttpMailService
///
/// Posts mails as JSON to an HTTP relay authenticated with a bearer key.
pub struct HttpMailService {
    client: Client,
    api_url: String,
    api_key: String,
}

impl HttpMailService {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url,
            api_key,
        }
    }
}

#[async_trait]
impl MailService for HttpMailService {
    async fn send_user_created_mail(&self, user: &User, login_link: &str) -> Result<(), AppError> {
        let payload = MailPayload {
            to_addr: &user.email,
            subject: "Your knowledge portal account",
            html_body: welcome_body(user, login_link),
        };

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::Mail(format!("mail relay connection error: {e}")))?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(AppError::Mail(format!(
                "mail relay failed. Status: {status}, Body: {text}"
            )));
        }

        Ok(())
    }
}

/// LogMailService
///
/// Fallback when no relay is configured: records the notification in the log.
pub struct LogMailService;

#[async_trait]
impl MailService for LogMailService {
    async fn send_user_created_mail(&self, user: &User, login_link: &str) -> Result<(), AppError> {
        tracing::info!(
            to = %user.email,
            login_link,
            "mail relay not configured; user-created mail not sent"
        );
        Ok(())
    }
}

/// MockMailService
///
/// Counts sends and can be told to fail, for service tests.
#[derive(Default)]
pub struct MockMailService {
    pub should_fail: bool,
    sent: AtomicUsize,
}

impl MockMailService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Number of send attempts so far, failed ones included.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailService for MockMailService {
    async fn send_user_created_mail(&self, _user: &User, _login_link: &str) -> Result<(), AppError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(AppError::Mail("Mock Mail Error: Simulation requested".to_string()));
        }
        Ok(())
    }
}
