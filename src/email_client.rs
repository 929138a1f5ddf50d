use crate::error::EmailError;
use crate::validators::is_valid_email;
use serde::Serialize;

#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
}

/// Validated, normalized address the service sends from
#[derive(Clone, Debug)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: String) -> Result<Self, String> {
        let email = is_valid_email(&s).map_err(|e| e.to_string())?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
pub struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(rename = "Html")]
    html: &'a str,
    #[serde(rename = "Subject")]
    subject: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SenderEmail,
        timeout: std::time::Duration,
    ) -> Result<Self, EmailError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::ServiceUnavailable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            sender,
        })
    }

    pub fn sender(&self) -> &SenderEmail {
        &self.sender
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
    ) -> Result<(), EmailError> {
        let recipient = is_valid_email(recipient)
            .map_err(|_| EmailError::InvalidRecipient(recipient.to_string()))?;

        let url = format!("{}/email", self.base_url);
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: &recipient,
            subject,
            html: html_content,
        };

        self.http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send email: {}", e);
                EmailError::ServiceUnavailable(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Email service returned error: {}", e);
                EmailError::SendFailed(e.to_string())
            })?;

        Ok(())
    }
}
