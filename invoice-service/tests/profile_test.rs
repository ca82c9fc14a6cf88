mod common;

use common::{sample_invoice, TestApp, OTHER_USER_ID, TEST_USER_ID};
use serde_json::{json, Value};

async fn put_profile(app: &TestApp, user_id: &str, body: &Value) -> reqwest::Response {
    app.client
        .put(app.url("/users/profile"))
        .header("X-User-ID", user_id)
        .json(body)
        .send()
        .await
        .expect("Failed to execute request")
}

async fn get_profile(app: &TestApp, user_id: &str) -> Value {
    let response = app
        .client
        .get(app.url("/users/profile"))
        .header("X-User-ID", user_id)
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.expect("Failed to parse JSON")
}

#[tokio::test]
async fn profile_starts_blank() {
    let app = TestApp::spawn().await;

    let profile = get_profile(&app, TEST_USER_ID).await;
    assert_eq!(profile["user_id"], TEST_USER_ID);
    assert_eq!(profile["name"], "");
    assert_eq!(profile["business_name"], "");
}

#[tokio::test]
async fn profile_updates_keep_unsent_fields() {
    let app = TestApp::spawn().await;

    let response = put_profile(
        &app,
        TEST_USER_ID,
        &json!({"name": "Ada Lovelace", "businessName": "Engines Ltd", "phone": "555-0100"}),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = put_profile(
        &app,
        TEST_USER_ID,
        &json!({"business_address": "12 St James's Square", "name": ""}),
    )
    .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Ada Lovelace");
    assert_eq!(body["business_address"], "12 St James's Square");

    let profile = get_profile(&app, TEST_USER_ID).await;
    assert_eq!(profile["business_name"], "Engines Ltd");
    assert_eq!(profile["phone"], "555-0100");

    let other = get_profile(&app, OTHER_USER_ID).await;
    assert_eq!(other["name"], "");
}

#[tokio::test]
async fn profile_requires_user_header_and_valid_fields() {
    let app = TestApp::spawn().await;

    let anonymous = app
        .client
        .get(app.url("/users/profile"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status().as_u16(), 401);

    let response = put_profile(&app, TEST_USER_ID, &json!({"phone": "5".repeat(40)})).await;
    assert_eq!(response.status().as_u16(), 422);
}

#[tokio::test]
async fn invoice_detail_includes_owner_business_details() {
    let app = TestApp::spawn().await;
    let created = app.create_ok(TEST_USER_ID, &sample_invoice()).await;
    let url = app.url(&format!("/invoices/{}", created["id"].as_str().unwrap()));

    let before: Value = app
        .client
        .get(&url)
        .header("X-User-ID", TEST_USER_ID)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(before.get("owner").is_none());

    put_profile(
        &app,
        TEST_USER_ID,
        &json!({"business_name": "Engines Ltd", "business_address": "London"}),
    )
    .await;

    let after: Value = app
        .client
        .get(&url)
        .header("X-User-ID", TEST_USER_ID)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["invoice_number"], created["invoice_number"]);
    assert_eq!(after["owner"]["business_name"], "Engines Ltd");
    assert_eq!(after["owner"]["business_address"], "London");
}
