#![allow(dead_code)]

use invoice_service::config::{
    AiConfig, AiProvider, DatabaseBackend, DatabaseConfig, InvoiceConfig, NumberingConfig,
};
use invoice_service::services::InvoiceStore;
use invoice_service::startup::Application;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::sync::Arc;

pub const TEST_USER_ID: &str = "test_user_123";
pub const OTHER_USER_ID: &str = "other_user_456";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<dyn InvoiceStore>,
    pub client: reqwest::Client,
}

pub fn test_config(ai_provider: AiProvider) -> InvoiceConfig {
    InvoiceConfig {
        common: CoreConfig {
            port: 0, // Random port for testing
            ..CoreConfig::default()
        },
        database: DatabaseConfig {
            backend: DatabaseBackend::Memory,
            uri: String::new(),
            database: "invoice_test".to_string(),
        },
        numbering: NumberingConfig {
            max_attempts: 10,
            retry_backoff_ms: 1,
        },
        ai: AiConfig {
            provider: ai_provider,
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
        },
        frontend_url: "http://localhost:5173".to_string(),
    }
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config(AiProvider::Mock)).await
    }

    pub async fn spawn_with(config: InvoiceConfig) -> Self {
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let store = app.store();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            store,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn create_invoice(&self, user_id: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url("/invoices"))
            .header("X-User-ID", user_id)
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Create an invoice and return the response body, asserting 201.
    pub async fn create_ok(&self, user_id: &str, body: &Value) -> Value {
        let response = self.create_invoice(user_id, body).await;
        assert_eq!(response.status().as_u16(), 201, "invoice creation failed");
        response.json().await.expect("Failed to parse JSON")
    }
}

/// The two-item invoice used throughout: subtotal 125.50, tax 5, discount 10.
pub fn sample_invoice() -> Value {
    json!({
        "client_name": "Acme Corp",
        "client_email": "Billing@Acme.test",
        "client_address": "1 Main St",
        "items": [
            {"description": "Web design", "quantity": 2, "unit_price": 50.00},
            {"description": "Hosting", "quantity": 1, "unit_price": 25.50}
        ],
        "tax": 5,
        "discount": 10,
        "issue_date": "2024-01-01",
        "due_date": "2024-01-31",
        "notes": "Thanks for your business"
    })
}
