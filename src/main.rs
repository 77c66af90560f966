use kmt_server::{
    AppState, UserService,
    config::{AppConfig, Env},
    create_router,
    mail::{HttpMailService, LogMailService, MailState},
    models::CreateUserRequest,
    repository::{PostgresRepository, RepositoryState},
    storage::{FsAttachmentStore, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, the database, the attachment
/// directory and the mail notifier, then serves the router.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration (fail-fast on missing production secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging: pretty locally, JSON in production for log aggregation.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kmt_server=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Database: pool + migrations.
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // 4. Attachment directory.
    let store = FsAttachmentStore::new(&config.attachments_path);
    store.ensure_root_exists().await?;
    tracing::info!(path = %config.attachments_path.display(), "attachment storage ready");
    let storage = Arc::new(store) as StorageState;

    // 5. Mail relay, or log-only when none is configured.
    let mail: MailState = match (&config.mail_api_url, &config.mail_api_key) {
        (Some(url), Some(key)) => Arc::new(HttpMailService::new(url.clone(), key.clone())),
        _ => Arc::new(LogMailService),
    };

    let app_state = AppState {
        repo,
        storage,
        mail,
        config: config.clone(),
    };

    // 6. Optional bootstrap administrator.
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        bootstrap_admin(&app_state, email, password).await?;
    }

    // 7. Router and server.
    let app = create_router(app_state);
    let listener = TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("Listening on {}", config.bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Creates the configured admin account unless a user with that email exists.
async fn bootstrap_admin(state: &AppState, email: &str, password: &str) -> Result<(), Box<dyn Error>> {
    let users = UserService::new(
        state.repo.clone(),
        state.mail.clone(),
        state.config.portal_login_link.clone(),
    );

    if users.get_user_by_email(email).await?.is_some() {
        return Ok(());
    }

    let admin = users
        .create_user(CreateUserRequest {
            email: email.to_string(),
            first_name: "Portal".to_string(),
            last_name: "Administrator".to_string(),
            user_role: kmt_server::auth::ADMIN_ROLE.to_string(),
            password: password.to_string(),
        })
        .await?;

    tracing::info!(user_id = %admin.id, "bootstrap administrator created");
    Ok(())
}
