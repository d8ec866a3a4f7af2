mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use tablegate::database::{EntityRecord, PREFERENCES_TABLE};
use tablegate::gateway::PreferenceGateway;
use tablegate::types::Identity;

#[tokio::test]
async fn requests_without_token_are_rejected() -> Result<()> {
    let app = common::test_app().await?;

    let res = common::send(&app, Method::GET, "/bookmarks", None, None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED, "body: {}", res.body);
    assert_eq!(res.body["error"]["code"], json!("UNAUTHORIZED"));

    let res = common::send(&app, Method::GET, "/health", None, None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"]["status"], json!("ok"));
    Ok(())
}

#[tokio::test]
async fn create_bookmark_returns_stamped_row() -> Result<()> {
    let app = common::test_app().await?;
    let alice = Identity::user(1);

    let res = common::send(&app, Method::POST, "/bookmarks", Some(&alice), Some(json!({ "title": "Dash" }))).await?;
    assert_eq!(res.status, StatusCode::CREATED, "body: {}", res.body);

    let data = &res.body["data"];
    let id = data["id"].as_i64().expect("numeric id");
    assert_eq!(data["user"], json!(1));
    assert_eq!(data["title"], json!("Dash"));

    let tags = res.cache_tags.expect("cache tag header");
    assert!(tags.contains("table_directus_bookmarks"), "tags: {}", tags);
    assert!(tags.contains(&format!("entity_directus_bookmarks_{}", id)), "tags: {}", tags);
    Ok(())
}

#[tokio::test]
async fn bookmark_of_another_user_is_not_found() -> Result<()> {
    let app = common::test_app().await?;
    let alice = Identity::user(1);
    let bob = Identity::user(2);

    let res = common::send(&app, Method::POST, "/bookmarks", Some(&alice), Some(json!({ "title": "Dash" }))).await?;
    let id = res.body["data"]["id"].as_i64().expect("numeric id");

    let res = common::send(&app, Method::GET, &format!("/bookmarks/{}", id), Some(&bob), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND, "body: {}", res.body);
    assert!(res.body.get("data").is_none());

    let res = common::send(&app, Method::GET, "/bookmarks", Some(&bob), None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["data"], json!([]));

    let res = common::send(&app, Method::GET, &format!("/bookmarks/user/{}", 1), Some(&bob), None).await?;
    assert_eq!(res.body["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn owner_cannot_be_reassigned_by_update() -> Result<()> {
    let app = common::test_app().await?;
    let alice = Identity::user(1);

    let res = common::send(&app, Method::POST, "/bookmarks", Some(&alice), Some(json!({ "title": "Dash" }))).await?;
    let id = res.body["data"]["id"].as_i64().expect("numeric id");

    let res = common::send(
        &app,
        Method::PATCH,
        &format!("/bookmarks/{}", id),
        Some(&alice),
        Some(json!({ "title": "Renamed", "user": 2 })),
    )
    .await?;
    assert_eq!(res.status, StatusCode::OK, "body: {}", res.body);
    assert_eq!(res.body["data"]["title"], json!("Renamed"));
    assert_eq!(res.body["data"]["user"], json!(1));
    Ok(())
}

#[tokio::test]
async fn delete_cascades_to_preferences() -> Result<()> {
    let state = common::test_state().await?;
    let app = tablegate::app(state.clone());
    let alice = Identity::user(1);

    let res = common::send(&app, Method::POST, "/bookmarks", Some(&alice), Some(json!({ "title": "Dash" }))).await?;
    let id = res.body["data"]["id"].as_i64().expect("numeric id");

    let preferences = PreferenceGateway::new(state.gateway(PREFERENCES_TABLE).await?);
    let mut ctx = state.context(alice.clone());
    let payload = EntityRecord::from_payload(json!({ "title": "Dash", "table_name": "orders" }))?;
    preferences.insert_preference(&mut ctx, payload).await?;

    let res = common::send(&app, Method::GET, "/bookmarks/preferences/Dash", Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::OK, "body: {}", res.body);
    assert_eq!(res.body["data"]["table_name"], json!("orders"));

    let res = common::send(&app, Method::DELETE, &format!("/bookmarks/{}", id), Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT, "body: {}", res.body);
    let tags = res.cache_tags.expect("cache tag header");
    assert!(tags.contains("table_directus_preferences"), "tags: {}", tags);

    let res = common::send(&app, Method::GET, "/bookmarks/preferences/Dash", Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = common::send(&app, Method::DELETE, &format!("/bookmarks/{}", id), Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"]["message"], json!("bookmark_not_found"));
    assert_eq!(res.body["error"]["code"], json!("NOT_FOUND"));
    Ok(())
}

#[tokio::test]
async fn missing_preferences_are_an_error() -> Result<()> {
    let app = common::test_app().await?;
    let alice = Identity::user(1);

    let res = common::send(&app, Method::GET, "/bookmarks/preferences/Unknown", Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body["error"]["message"], json!("bookmark_not_found"));
    assert!(res.body.get("data").is_none());
    Ok(())
}

#[tokio::test]
async fn my_bookmarks_accepts_writes_and_lists() -> Result<()> {
    let app = common::test_app().await?;
    let alice = Identity::user(1);

    let res = common::send(&app, Method::POST, "/bookmarks/user/me", Some(&alice), Some(json!({ "title": "One" }))).await?;
    assert_eq!(res.status, StatusCode::OK, "body: {}", res.body);
    common::send(&app, Method::POST, "/bookmarks/user/me", Some(&alice), Some(json!({ "title": "Two" }))).await?;

    let res = common::send(&app, Method::GET, "/bookmarks/user/me?order=title%20desc", Some(&alice), None).await?;
    let titles: Vec<_> = res.body["data"]
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("Two"), json!("One")]);
    Ok(())
}

#[tokio::test]
async fn invalid_bookmark_payload_is_rejected() -> Result<()> {
    let app = common::test_app().await?;
    let alice = Identity::user(1);

    let res = common::send(&app, Method::POST, "/bookmarks", Some(&alice), Some(json!({ "url": "/x" }))).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST, "body: {}", res.body);
    assert_eq!(res.body["error"]["code"], json!("VALIDATION_ERROR"));

    let res = common::send(&app, Method::POST, "/bookmarks", Some(&alice), Some(json!({ "title": "x", "bogus": 1 }))).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST, "body: {}", res.body);
    Ok(())
}

#[tokio::test]
async fn admin_defines_tables_that_items_routes_serve() -> Result<()> {
    let app = common::test_app().await?;
    let admin = Identity::admin(99);
    let alice = Identity::user(1);

    let table = json!({
        "table": "projects",
        "columns": [
            { "name": "name", "type": "varchar", "length": 64, "nullable": false },
            { "name": "stage", "type": "enum", "length": ["draft", "live"], "default": "draft" }
        ]
    });

    let res = common::send(&app, Method::POST, "/tables", Some(&alice), Some(table.clone())).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN, "body: {}", res.body);

    let res = common::send(&app, Method::POST, "/tables", Some(&admin), Some(table)).await?;
    assert_eq!(res.status, StatusCode::CREATED, "body: {}", res.body);
    assert_eq!(res.cache_tags.as_deref(), Some("table_projects"));

    let res = common::send(&app, Method::POST, "/items/projects", Some(&alice), Some(json!({ "name": "Apollo" }))).await?;
    assert_eq!(res.status, StatusCode::CREATED, "body: {}", res.body);
    assert_eq!(res.body["data"]["stage"], json!("draft"));
    let id = res.body["data"]["id"].as_i64().expect("numeric id");

    let res = common::send(
        &app,
        Method::POST,
        "/tables/projects/columns",
        Some(&admin),
        Some(json!({ "name": "budget", "type": "integer", "default": 0 })),
    )
    .await?;
    assert_eq!(res.status, StatusCode::CREATED, "body: {}", res.body);

    let res = common::send(&app, Method::GET, &format!("/items/projects/{}", id), Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::OK, "body: {}", res.body);
    assert_eq!(res.body["data"]["budget"], json!(0));

    let res = common::send(&app, Method::DELETE, &format!("/items/projects/{}", id), Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = common::send(&app, Method::GET, "/items/unknown", Some(&alice), None).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    Ok(())
}
