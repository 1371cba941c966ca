//! End-to-end API tests driving the router over an in-memory store.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use config::Config;
use http_body_util::BodyExt;
use ml_runtime::ModelRuntime;
use modelhub::{AppState, create_router};
use registry::DocumentStore;
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config {
        storage_root: dir.path().to_path_buf(),
        bind_addr: "127.0.0.1:0".to_string(),
        token_ttl_hours: 24,
    };
    let store = DocumentStore::in_memory();
    let runtime = ModelRuntime::new(config.models_dir());
    let state = AppState::from_parts(config, store, runtime);
    (create_router(state), dir)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Registers a user and returns (token, user id, role).
async fn register_and_login(app: &Router, username: &str) -> (String, String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "secret123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

    let user_id = body["data"]["id"].as_str().expect("user id").to_string();
    let role = body["data"]["role"].as_str().expect("role").to_string();

    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");

    let token = body["data"]["token"].as_str().expect("token").to_string();
    (token, user_id, role)
}

async fn initialize_model(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/ai/initialize",
        Some(token),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "initialize failed: {body}");
    assert_eq!(body["data"]["status"], "initialized");
    body["data"]["id"].as_str().expect("model id").to_string()
}

#[tokio::test]
async fn test_first_user_is_admin_later_users_are_not() {
    let (app, _dir) = test_app();

    let (_, _, role1) = register_and_login(&app, "u1").await;
    let (_, _, role2) = register_and_login(&app, "u2").await;

    assert_eq!(role1, "admin");
    assert_eq!(role2, "user");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let (app, _dir) = test_app();

    let (status, _) = send(&app, "GET", "/api/datasets", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/api/ai/public-models", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_scenario_initialize_and_train() {
    let (app, _dir) = test_app();
    let (token, _, role) = register_and_login(&app, "u1").await;
    assert_eq!(role, "admin");

    let model_id = initialize_model(&app, &token, "M1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/train",
        Some(&token),
        Some(json!({
            "modelId": model_id,
            "trainData": [[0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]],
            "labels": [[1.0]],
            "epochs": 1,
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "train failed: {body}");
    assert_eq!(body["data"]["status"], "trained");
    assert_eq!(body["data"]["trainingHistory"]["epochs"], 1);
}

#[tokio::test]
async fn test_prediction_confidence_bounds() {
    let (app, _dir) = test_app();
    let (token, _, _) = register_and_login(&app, "u1").await;
    let model_id = initialize_model(&app, &token, "M1").await;

    let input = json!([[0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1]]);
    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/predict",
        Some(&token),
        Some(json!({ "modelId": model_id, "inputData": input })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "predict failed: {body}");
    let confidence = body["data"]["confidence"][0].as_f64().expect("confidence");
    assert!(
        (0.5..=1.0).contains(&confidence),
        "single-output confidence out of range: {confidence}"
    );

    // The prediction is recorded on the model document.
    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/ai/models/{model_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["predictions"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_scenario_duplicate_dataset_names() {
    let (app, _dir) = test_app();
    register_and_login(&app, "u1").await;
    let (u2, _, _) = register_and_login(&app, "u2").await;
    let (u3, _, _) = register_and_login(&app, "u3").await;

    let body = json!({ "name": "sales" });
    let (status, _) = send(&app, "POST", "/api/datasets", Some(&u2), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, response) =
        send(&app, "POST", "/api/datasets", Some(&u2), Some(body.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected duplicate: {response}");
    assert_eq!(response["success"], false);

    let (status, _) = send(&app, "POST", "/api/datasets", Some(&u3), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_scenario_public_clone_for_transfer_learning() {
    let (app, _dir) = test_app();
    let (u1, _, _) = register_and_login(&app, "u1").await;
    let (u2, _, _) = register_and_login(&app, "u2").await;

    let model_id = initialize_model(&app, &u1, "M1").await;

    // A stranger cannot clone a private model.
    let (status, _) = send(
        &app,
        "POST",
        "/api/ai/clone",
        Some(&u2),
        Some(json!({ "modelId": model_id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "PUT",
        "/api/ai/visibility",
        Some(&u1),
        Some(json!({ "modelId": model_id, "isPublic": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/clone",
        Some(&u2),
        Some(json!({ "modelId": model_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "clone failed: {body}");
    assert_eq!(body["data"]["model"]["baseModel"], json!(model_id));
    assert_eq!(body["data"]["freezeBaseLayers"], json!(true));
    assert_eq!(body["data"]["model"]["status"], "initialized");
}

#[tokio::test]
async fn test_non_owner_mutation_is_rejected_and_resource_unchanged() {
    let (app, _dir) = test_app();
    let (u1, _, _) = register_and_login(&app, "u1").await;
    let (u2, _, _) = register_and_login(&app, "u2").await;

    let model_id = initialize_model(&app, &u1, "M1").await;

    let (status, _) = send(
        &app,
        "PUT",
        "/api/ai/visibility",
        Some(&u2),
        Some(json!({ "modelId": model_id, "isPublic": true })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/ai/models/{model_id}"),
        Some(&u1),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isPublic"], json!(false));
}

#[tokio::test]
async fn test_predict_without_live_model_is_bad_request() {
    let (app, _dir) = test_app();
    let (u1, _, _) = register_and_login(&app, "u1").await;
    let (u2, _, _) = register_and_login(&app, "u2").await;

    let model_id = initialize_model(&app, &u1, "M1").await;
    let (status, _) = send(
        &app,
        "PUT",
        "/api/ai/visibility",
        Some(&u1),
        Some(json!({ "modelId": model_id, "isPublic": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The clone of a never-saved source has no live session.
    let (_, body) = send(
        &app,
        "POST",
        "/api/ai/clone",
        Some(&u2),
        Some(json!({ "modelId": model_id })),
    )
    .await;
    let clone_id = body["data"]["model"]["id"].as_str().expect("clone id");

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/predict",
        Some(&u2),
        Some(json!({
            "modelId": clone_id,
            "inputData": [[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "expected no-model: {body}");
}

#[tokio::test]
async fn test_model_version_numbers_are_sequential() {
    let (app, _dir) = test_app();
    let (token, _, _) = register_and_login(&app, "u1").await;
    let model_id = initialize_model(&app, &token, "M1").await;

    for expected in 1..=3u64 {
        let (status, body) = send(
            &app,
            "POST",
            "/api/ai/version",
            Some(&token),
            Some(json!({
                "modelId": model_id,
                "storagePath": format!("models/m1_v{expected}"),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["currentVersion"], json!(expected));
    }

    let (_, body) = send(
        &app,
        "GET",
        &format!("/api/ai/models/{model_id}"),
        Some(&token),
        None,
    )
    .await;
    let numbers: Vec<u64> = body["data"]["versions"]
        .as_array()
        .expect("versions")
        .iter()
        .map(|v| v["versionNumber"].as_u64().expect("number"))
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unsupported_layer_type_is_rejected_at_initialize() {
    let (app, _dir) = test_app();
    let (token, _, _) = register_and_login(&app, "u1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/initialize",
        Some(&token),
        Some(json!({
            "name": "conv-net",
            "architecture": [
                { "type": "conv2d", "config": { "filters": 8 } },
            ],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "expected rejection: {body}");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_dataset_share_and_visibility() {
    let (app, _dir) = test_app();
    register_and_login(&app, "root").await;
    let (creator, _, _) = register_and_login(&app, "creator").await;
    let (friend, friend_id, _) = register_and_login(&app, "friend").await;
    let (stranger, _, _) = register_and_login(&app, "stranger").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/datasets",
        Some(&creator),
        Some(json!({ "name": "sales", "storageInfo": { "location": "datasets", "filename": "sales.csv" } })),
    )
    .await;
    let dataset_id = body["data"]["id"].as_str().expect("dataset id").to_string();

    // Hidden from non-collaborators.
    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/datasets/{dataset_id}"),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/datasets/{dataset_id}/share"),
        Some(&creator),
        Some(json!({ "userId": friend_id, "accessLevel": "edit" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/datasets/{dataset_id}"),
        Some(&friend),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["sharedWith"][0]["accessLevel"], "edit");

    // Shared edit access allows appending preprocessing steps.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/datasets/{dataset_id}/preprocessing"),
        Some(&friend),
        Some(json!({ "name": "normalize" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_dataset_soft_delete_hides_and_frees_name() {
    let (app, _dir) = test_app();
    let (token, _, _) = register_and_login(&app, "u1").await;

    let (_, body) = send(
        &app,
        "POST",
        "/api/datasets",
        Some(&token),
        Some(json!({ "name": "sales" })),
    )
    .await;
    let dataset_id = body["data"]["id"].as_str().expect("dataset id").to_string();

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/api/datasets/{dataset_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/datasets/{dataset_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/datasets",
        Some(&token),
        Some(json!({ "name": "sales" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_admin_user_management() {
    let (app, _dir) = test_app();
    let (admin, _, admin_role) = register_and_login(&app, "root").await;
    let (user, user_id, _) = register_and_login(&app, "worker").await;
    assert_eq!(admin_role, "admin");

    // Non-admin cannot list users.
    let (status, _) = send(&app, "GET", "/api/auth/users", Some(&user), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/auth/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/auth/users/{user_id}/role"),
        Some(&admin),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    // Deactivation invalidates the account's token.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/auth/users/{user_id}/status"),
        Some(&admin),
        Some(json!({ "isActive": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/auth/profile", Some(&user), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_hyperparameter_update_merges_and_validates() {
    let (app, _dir) = test_app();
    let (token, _, _) = register_and_login(&app, "u1").await;
    let model_id = initialize_model(&app, &token, "M1").await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/ai/hyperparameters",
        Some(&token),
        Some(json!({ "modelId": model_id, "optimizer": "sgd", "learningRate": 0.01 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "update failed: {body}");
    assert_eq!(body["data"]["hyperparameters"]["optimizer"], "sgd");
    assert_eq!(body["data"]["hyperparameters"]["loss"], "binary_crossentropy");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/ai/hyperparameters",
        Some(&token),
        Some(json!({ "modelId": model_id, "optimizer": "adagrad" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
