// End-to-end test against live services
// Run with: cargo test --test integration_test -- --ignored
//
// Expects the identity service on AUTH_BASE_URL (default localhost:5000)
// and the orchestrator on API_BASE_URL (default localhost:8080), both
// pointed at a Postgres instance.

use serde_json::{json, Value};
use std::time::Duration;

fn api_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

fn auth_base_url() -> String {
    std::env::var("AUTH_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

async fn register_and_login(client: &reqwest::Client, username: &str) -> String {
    let email = format!("{username}@example.com");

    let response = client
        .post(format!("{}/auth/register", auth_base_url()))
        .json(&json!({ "username": username, "email": email, "password": "pw12345678" }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(response.status(), 201, "registration failed");

    let response = client
        .post(format!("{}/auth/login", auth_base_url()))
        .json(&json!({ "email": email, "password": "pw12345678" }))
        .send()
        .await
        .expect("Failed to login");
    assert_eq!(response.status(), 200, "login failed");

    let body: Value = response.json().await.expect("Failed to parse login body");
    body["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_full_workflow_lifecycle() {
    let client = reqwest::Client::new();
    let suffix = uuid::Uuid::now_v7().simple().to_string();
    let token = register_and_login(&client, &format!("e2e_{}", &suffix[..12])).await;

    // The current user resolves through the identity service
    let response = client
        .get(format!("{}/users/me", auth_base_url()))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to fetch profile");
    assert_eq!(response.status(), 200);

    // Create a workflow that fires every two seconds
    let response = client
        .post(format!("{}/tasks/v1/workflows", api_base_url()))
        .bearer_auth(&token)
        .json(&json!({
            "name": "e2e_ping",
            "trigger": { "type": "schedule", "config": { "cron": "*/2 * * * * *" } },
            "actions": [
                { "name": "say-hi", "type": "log_message", "config": { "message": "tick" } }
            ],
            "is_enabled": true
        }))
        .send()
        .await
        .expect("Failed to create workflow");
    assert_eq!(response.status(), 201);
    let workflow: Value = response.json().await.expect("Failed to parse workflow");
    let workflow_id = workflow["id"].as_str().unwrap();

    // Give the scheduler a few firing windows
    tokio::time::sleep(Duration::from_secs(5)).await;

    let response = client
        .get(format!(
            "{}/tasks/v1/workflows/{}/executions",
            api_base_url(),
            workflow_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to list executions");
    assert_eq!(response.status(), 200);
    let executions: Vec<Value> = response.json().await.expect("Failed to parse executions");
    assert!(
        !executions.is_empty(),
        "expected at least one execution after five seconds"
    );
    let first = &executions[0];
    assert_eq!(first["status"], "completed");
    assert!(first["logs"]
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["message"] == "tick" && entry["status"] == "ACTION_OUTPUT"));

    // A second user cannot see the workflow
    let other_token = register_and_login(&client, &format!("e2f_{}", &suffix[..12])).await;
    let response = client
        .get(format!(
            "{}/tasks/v1/workflows/{}",
            api_base_url(),
            workflow_id
        ))
        .bearer_auth(&other_token)
        .send()
        .await
        .expect("Failed to probe workflow");
    assert_eq!(response.status(), 404);

    // Clean up
    let response = client
        .delete(format!(
            "{}/tasks/v1/workflows/{}",
            api_base_url(),
            workflow_id
        ))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to delete workflow");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore] // Run with: cargo test --test integration_test -- --ignored
async fn test_tampered_token_is_rejected_everywhere() {
    let client = reqwest::Client::new();
    let suffix = uuid::Uuid::now_v7().simple().to_string();
    let token = register_and_login(&client, &format!("e2g_{}", &suffix[..12])).await;

    let last = token.chars().last().unwrap();
    let replacement = if last == 'A' { 'B' } else { 'A' };
    let tampered = format!("{}{}", &token[..token.len() - 1], replacement);

    let response = client
        .post(format!("{}/auth/validate_token", auth_base_url()))
        .bearer_auth(&tampered)
        .send()
        .await
        .expect("Failed to call validate_token");
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/tasks/v1/workflows", api_base_url()))
        .bearer_auth(&tampered)
        .send()
        .await
        .expect("Failed to call orchestrator");
    assert_eq!(response.status(), 401);
}
