#![allow(dead_code)]

use serde_json::Value;
use std::net::TcpListener;
use std::sync::Arc;
use wiremock::MockServer;

use siwes_auth::auth::hash_password;
use siwes_auth::configuration::get_configuration;
use siwes_auth::startup::{build_workflow, run};
use siwes_auth::telemetry::init_test_telemetry;
use siwes_auth::users::{CredentialStore, InMemoryCredentialStore, NewUser, Role, User};

const TEST_BCRYPT_COST: u32 = 4;

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryCredentialStore>,
    pub email_server: MockServer,
    pub client: reqwest::Client,
}

pub async fn spawn_app() -> TestApp {
    init_test_telemetry();

    let email_server = MockServer::start().await;

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.email_client.base_url = email_server.uri();
    configuration.auth.bcrypt_cost = TEST_BCRYPT_COST;

    let store = Arc::new(InMemoryCredentialStore::new());
    let workflow =
        build_workflow(store.clone(), &configuration).expect("Failed to build workflow");

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let server = run(listener, workflow).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        email_server,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub async fn seed_user(
        &self,
        email: &str,
        password: &str,
        role: Role,
        is_first_login: bool,
    ) -> User {
        self.store
            .insert_user(NewUser {
                email: email.to_string(),
                name: "Test User".to_string(),
                password_hash: hash_password(password, TEST_BCRYPT_COST)
                    .expect("Failed to hash password"),
                role,
                is_first_login,
            })
            .await
            .expect("Failed to seed user")
    }

    pub async fn post(&self, path: &str, body: &Value, bearer: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .post(&format!("{}{}", self.address, path))
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn get(&self, path: &str, bearer: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(&format!("{}{}", self.address, path));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }

    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post(
            "/api/auth/login",
            &serde_json::json!({ "email": email, "password": password }),
            None,
        )
        .await
    }

    /// Log in and return the `data` object of a successful response
    pub async fn login_data(&self, email: &str, password: &str) -> Value {
        let response = self.login(email, password).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"].clone()
    }

    /// Reset token carried by the most recent email sent to the mock server
    pub async fn last_reset_token(&self) -> String {
        let requests = self
            .email_server
            .received_requests()
            .await
            .expect("Request recording is disabled");
        let last = requests.last().expect("No email was sent");
        let body: Value = serde_json::from_slice(&last.body).expect("Email body is not JSON");
        let html = body["Html"].as_str().expect("Email has no Html part");

        let start = html.find("token=").expect("No reset link in email") + "token=".len();
        html[start..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect()
    }
}
