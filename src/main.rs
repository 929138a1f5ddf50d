use siwes_auth::configuration::get_configuration;
use siwes_auth::error::ErrorContext;
use siwes_auth::startup::Application;
use siwes_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let application = Application::build(configuration).await.map_err(|e| {
        ErrorContext::new("startup").log_error(&e);
        std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
    })?;
    tracing::info!(port = application.port(), "Server started successfully");

    application.run_until_stopped().await
}
