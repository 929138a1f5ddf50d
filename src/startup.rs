use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthWorkflow, WorkflowSettings};
use crate::configuration::Settings;
use crate::database::{connect_with_retry, migrate};
use crate::email_client::EmailClient;
use crate::error::{AppError, ConfigError, ValidationError};
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{
    change_password, current_user, deactivate_user, forgot_password, health_check, login, logout,
    refresh, require_password_reset, reset_password_first_login, reset_password_with_token,
};
use crate::users::{CredentialStore, PgCredentialStore};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Connect to Postgres, apply migrations, create the bootstrap admin if
    /// configured, and bind the listener.
    pub async fn build(settings: Settings) -> Result<Self, AppError> {
        let pool = connect_with_retry(&settings.database).await?;
        migrate(&pool).await?;
        let store: Arc<dyn CredentialStore> = Arc::new(PgCredentialStore::new(pool));

        let workflow = build_workflow(store, &settings)?;
        if let Some(admin) = &settings.auth.bootstrap_admin {
            if let Some(user) = workflow.bootstrap_admin(admin).await? {
                tracing::info!(user_id = %user.id, "Bootstrap administrator created");
            }
        }

        let address = format!("{}:{}", settings.application.host, settings.application.port);
        let listener = TcpListener::bind(&address).map_err(|e| {
            AppError::Config(ConfigError::InvalidValue(format!(
                "cannot bind {}: {}",
                address, e
            )))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?
            .port();
        tracing::info!("Server listening on: {}", address);

        let server = run(listener, workflow).map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Assemble the workflow and its email client from settings
pub fn build_workflow(
    store: Arc<dyn CredentialStore>,
    settings: &Settings,
) -> Result<AuthWorkflow, AppError> {
    let sender = settings
        .email_client
        .sender()
        .map_err(|e| AppError::Config(ConfigError::InvalidValue(format!("sender_email: {}", e))))?;
    let email_client = EmailClient::new(
        settings.email_client.base_url.clone(),
        sender,
        settings.email_client.timeout(),
    )?;

    Ok(AuthWorkflow::new(
        store,
        email_client,
        WorkflowSettings::from(settings),
    ))
}

pub fn run(listener: TcpListener, workflow: AuthWorkflow) -> Result<Server, std::io::Error> {
    let jwt_config = workflow.jwt_settings().clone();
    let workflow = web::Data::new(workflow);

    let server = HttpServer::new(move || {
        let json_config = web::JsonConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::InvalidFormat(format!(
                "request body ({})",
                err
            )))
            .into()
        });

        App::new()
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(workflow.clone())
            .app_data(json_config)
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .route("/login", web::post().to(login))
                    .route("/forgot-password", web::post().to(forgot_password))
                    .route("/reset-password", web::post().to(reset_password_with_token))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .service(
                        web::resource("/reset-password-first-login")
                            .wrap(JwtMiddleware::password_reset(jwt_config.clone()))
                            .route(web::post().to(reset_password_first_login)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(JwtMiddleware::access(jwt_config.clone()))
                            .route(web::post().to(change_password)),
                    )
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::access(jwt_config.clone()))
                            .route(web::get().to(current_user)),
                    ),
            )
            .service(
                web::scope("/api/admin")
                    .wrap(JwtMiddleware::access(jwt_config.clone()))
                    .route("/users/{id}/deactivate", web::post().to(deactivate_user))
                    .route(
                        "/users/{id}/require-password-reset",
                        web::post().to(require_password_reset),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
