mod common;

use axum::http::StatusCode;
use chrono::{Duration, FixedOffset, Utc};
use serde_json::{json, Value};

use newsdesk::error::AppError;
use newsdesk::highlights::date_math::resolve_auto_insert;
use newsdesk::highlights::service::{get_highlighted_items, ARCHIVE, PUBLISHED};
use newsdesk::notification::{drain, MarkOperation, Notification};

async fn archive_highlights(env: &common::TestEnv, id: &str) -> Value {
    env.resources()
        .service(ARCHIVE)
        .unwrap()
        .find_by_id(id)
        .await
        .unwrap()
        .expect("item exists")
        .get("highlights")
        .cloned()
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn mark_then_unmark_item() {
    let env = common::TestEnv::start();
    let server = env.server();
    let token = env.login("u1", "user").await;
    env.seed("highlights", json!({"_id": "h1", "name": "Morning"})).await;
    env.seed_item("i1", json!({})).await;

    let response = server
        .post("/api/marked_for_highlights")
        .authorization_bearer(&token)
        .json(&json!([{"marked_item": "i1", "highlights": ["h1"]}]))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    response.assert_json(&json!(["i1"]));
    assert_eq!(archive_highlights(&env, "i1").await, json!(["h1"]));

    server
        .post("/api/marked_for_highlights")
        .authorization_bearer(&token)
        .json(&json!([{"marked_item": "i1", "highlights": "h1"}]))
        .await;
    assert_eq!(archive_highlights(&env, "i1").await, json!([]));
}

#[tokio::test]
async fn toggle_publishes_activity_and_mark_events() {
    let env = common::TestEnv::start();
    let server = env.server();
    let token = env.login("u1", "user").await;
    env.seed("highlights", json!({"_id": "h1", "name": "Morning"})).await;
    env.seed_item("i1", json!({"highlights": ["h2"]})).await;
    let mut events = env.subscribe();

    server
        .post("/api/marked_for_highlights")
        .authorization_bearer(&token)
        .json(&json!([{"marked_item": "i1", "highlights": ["h1", "h2"]}]))
        .await;

    let toggles: Vec<Notification> = drain(&mut events)
        .into_iter()
        .filter(|n| n.name().starts_with("item:"))
        .collect();
    assert_eq!(
        toggles,
        vec![
            Notification::ItemHighlightActivity {
                item_id: "i1".into(),
                highlight_id: "h1".into(),
                highlight_name: Some("Morning".into()),
                operation: MarkOperation::Mark,
            },
            Notification::ItemHighlights {
                marked: 1,
                item_id: "i1".into(),
                mark_id: "h1".into(),
            },
            Notification::ItemHighlightActivity {
                item_id: "i1".into(),
                highlight_id: "h2".into(),
                highlight_name: None,
                operation: MarkOperation::Unmark,
            },
            Notification::ItemHighlights {
                marked: 0,
                item_id: "i1".into(),
                mark_id: "h2".into(),
            },
        ]
    );
}

#[tokio::test]
async fn missing_items_are_reported_as_null() {
    let env = common::TestEnv::start();
    let server = env.server();
    let token = env.login("u1", "user").await;
    env.seed_item("i1", json!({})).await;

    let response = server
        .post("/api/marked_for_highlights")
        .authorization_bearer(&token)
        .json(&json!([
            {"marked_item": "missing", "highlights": ["h1"]},
            {"marked_item": "i1", "highlights": ["h1"]}
        ]))
        .await;
    response.assert_json(&json!([null, "i1"]));
    assert_eq!(archive_highlights(&env, "i1").await, json!(["h1"]));
}

#[tokio::test]
async fn marking_requires_a_session() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();
    env.seed_item("i1", json!({})).await;

    let response = server
        .post("/api/marked_for_highlights")
        .json(&json!([{"marked_item": "i1", "highlights": ["h1"]}]))
        .await;
    response.assert_status_not_found();
    assert_eq!(archive_highlights(&env, "i1").await, Value::Null);
}

#[tokio::test]
async fn published_copy_of_current_version_follows_the_item() {
    let env = common::TestEnv::start();
    let server = env.server();
    let token = env.login("u1", "user").await;
    env.seed_item("i1", json!({"_current_version": 2})).await;
    env.seed(
        PUBLISHED,
        json!({"_id": "p2", "item_id": "i1", "_current_version": 2,
               "_updated": "2020-01-01T00:00:00Z"}),
    )
    .await;
    env.seed(
        PUBLISHED,
        json!({"_id": "p1", "item_id": "i1", "_current_version": 1}),
    )
    .await;

    server
        .post("/api/marked_for_highlights")
        .authorization_bearer(&token)
        .json(&json!([{"marked_item": "i1", "highlights": ["h1"]}]))
        .await;

    let published = env.resources().service(PUBLISHED).unwrap();
    let current = published.find_by_id("p2").await.unwrap().unwrap();
    assert_eq!(current.get("highlights"), Some(&json!(["h1"])));
    assert_eq!(current.updated.to_rfc3339(), "2020-01-01T00:00:00+00:00");

    let old = published.find_by_id("p1").await.unwrap().unwrap();
    assert_eq!(old.get("highlights"), None);
}

#[tokio::test]
async fn highlighted_items_lists_marked_items_newest_first() {
    let env = common::TestEnv::start();
    let server = env.server();
    env.seed("highlights", json!({"_id": "h1", "name": "Today", "auto_insert": "now-1h"}))
        .await;

    let now = chrono::Utc::now();
    env.seed_item("old", json!({"highlights": ["h1"],
        "versioncreated": (now - chrono::Duration::hours(3)).to_rfc3339()}))
        .await;
    env.seed_item("first", json!({"highlights": ["h1"],
        "versioncreated": (now - chrono::Duration::minutes(30)).to_rfc3339()}))
        .await;
    env.seed_item("second", json!({"highlights": ["h1"],
        "versioncreated": (now - chrono::Duration::minutes(5)).to_rfc3339()}))
        .await;
    env.seed_item("other", json!({"highlights": ["h2"]})).await;

    let response = server.get("/api/highlights/h1/items").await;
    let items: Vec<Value> = response.json();
    let ids: Vec<&str> = items.iter().filter_map(|i| i["_id"].as_str()).collect();
    assert_eq!(ids, vec!["second", "first"]);
}

#[tokio::test]
async fn highlighted_items_of_unknown_highlight_is_not_found() {
    let env = common::TestEnv::start();
    let server = env.server_permissive();

    server
        .get("/api/highlights/nope/items")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn deleting_a_highlight_unmarks_items() {
    let env = common::TestEnv::start();
    let server = env.server();
    let token = env.login("u1", "user").await;
    env.seed("highlights", json!({"_id": "h1", "name": "Morning"})).await;
    env.seed_item("i1", json!({"highlights": ["h1", "h2"]})).await;
    env.seed_item("i2", json!({"highlights": ["h2"]})).await;
    let mut events = env.subscribe();

    server
        .delete("/api/highlights/h1")
        .authorization_bearer(&token)
        .await
        .assert_status(axum::http::StatusCode::NO_CONTENT);

    assert_eq!(archive_highlights(&env, "i1").await, json!(["h2"]));
    assert_eq!(archive_highlights(&env, "i2").await, json!(["h2"]));
    assert!(env
        .resources()
        .service("highlights")
        .unwrap()
        .find_by_id("h1")
        .await
        .unwrap()
        .is_none());

    let events = drain(&mut events);
    assert!(events.contains(&Notification::ItemHighlightActivity {
        item_id: "i1".into(),
        highlight_id: "h1".into(),
        highlight_name: Some("Morning".into()),
        operation: MarkOperation::Unmark,
    }));
    assert!(events.contains(&Notification::ResourceDeleted {
        resource: "highlights".into(),
        id: "h1".into(),
    }));
}

#[tokio::test]
async fn highlight_package_is_filled_on_create() {
    let env = common::TestEnv::start();
    env.seed("highlights", json!({"_id": "h1", "name": "Morning"})).await;
    env.seed("desks", json!({"_id": "d1", "default_content_profile": "story"}))
        .await;
    env.seed_item("i1", json!({"highlights": ["h1"], "_current_version": 1}))
        .await;

    env.seed(
        ARCHIVE,
        json!({
            "_id": "pkg",
            "type": "composite",
            "highlight": "h1",
            "task": {"desk": "d1"},
            "groups": [{"id": "root"}, {"id": "main"}]
        }),
    )
    .await;

    let package = env
        .resources()
        .service(ARCHIVE)
        .unwrap()
        .find_by_id("pkg")
        .await
        .unwrap()
        .unwrap();
    let refs = package
        .get("groups")
        .and_then(|g| g.get(1))
        .and_then(|g| g.get("refs"))
        .and_then(Value::as_array)
        .expect("refs");
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0]["residRef"], "i1");
    assert_eq!(refs[0]["location"], "archive");
    assert_eq!(package.get("profile"), Some(&json!("story")));
}

#[tokio::test]
async fn highlight_package_without_main_group_is_rejected() {
    let env = common::TestEnv::start();
    env.seed("highlights", json!({"_id": "h1", "name": "Morning"})).await;

    let fields = json!({"type": "composite", "highlight": "h1", "groups": [{"id": "root"}]});
    let result = env
        .resources()
        .service(ARCHIVE)
        .unwrap()
        .create(vec![fields.as_object().unwrap().clone()])
        .await;
    assert!(matches!(
        result,
        Err(newsdesk::error::AppError::BadRequest(_))
    ));
}

#[tokio::test]
async fn highlighted_items_cut_off_at_local_midnight() {
    let env = common::TestEnv::start();
    env.seed("highlights", json!({"_id": "h1", "name": "Today", "auto_insert": "now/d"}))
        .await;

    let now = Utc::now();
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let local_start = resolve_auto_insert("now/d", now, tz).unwrap();
    let utc_start = resolve_auto_insert("now/d", now, FixedOffset::east_opt(0).unwrap()).unwrap();
    assert_ne!(local_start, utc_start);

    let before_local = local_start - Duration::minutes(1);
    env.seed_item("at_local_midnight", json!({"highlights": ["h1"],
        "versioncreated": local_start.to_rfc3339()}))
        .await;
    env.seed_item("before_local_midnight", json!({"highlights": ["h1"],
        "versioncreated": before_local.to_rfc3339()}))
        .await;

    let ids = |items: Vec<newsdesk::db::models::Document>| -> Vec<String> {
        items.into_iter().map(|d| d.id).collect()
    };

    let local = get_highlighted_items(env.resources(), "h1", tz).await.unwrap();
    assert_eq!(ids(local), vec!["at_local_midnight"]);

    let utc = ids(
        get_highlighted_items(env.resources(), "h1", FixedOffset::east_opt(0).unwrap())
            .await
            .unwrap(),
    );
    assert_eq!(
        utc.contains(&"at_local_midnight".to_string()),
        local_start >= utc_start
    );
    assert_eq!(
        utc.contains(&"before_local_midnight".to_string()),
        before_local >= utc_start
    );
}

#[tokio::test]
async fn overflowing_auto_insert_is_a_bad_request() {
    let env = common::TestEnv::start();
    env.seed(
        "highlights",
        json!({"_id": "h1", "name": "Forever", "auto_insert": "now-9999999999999999m"}),
    )
    .await;
    env.seed_item("i1", json!({"highlights": ["h1"]})).await;

    let tz = FixedOffset::east_opt(0).unwrap();
    let result = get_highlighted_items(env.resources(), "h1", tz).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    env.server_permissive()
        .get("/api/highlights/h1/items")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn toggling_the_same_highlight_twice_marks_then_unmarks() {
    let env = common::TestEnv::start();
    let server = env.server();
    let token = env.login("u1", "user").await;
    env.seed("highlights", json!({"_id": "h1", "name": "Morning"})).await;
    env.seed_item("i1", json!({})).await;
    let mut events = env.subscribe();

    for _ in 0..2 {
        server
            .post("/api/marked_for_highlights")
            .authorization_bearer(&token)
            .json(&json!([{"marked_item": "i1", "highlights": ["h1"]}]))
            .await;
    }
    assert_eq!(archive_highlights(&env, "i1").await, json!([]));

    let toggles: Vec<Notification> = drain(&mut events)
        .into_iter()
        .filter(|n| n.name().starts_with("item:"))
        .collect();
    let activity = |operation| Notification::ItemHighlightActivity {
        item_id: "i1".into(),
        highlight_id: "h1".into(),
        highlight_name: Some("Morning".into()),
        operation,
    };
    let marked = |marked| Notification::ItemHighlights {
        marked,
        item_id: "i1".into(),
        mark_id: "h1".into(),
    };
    assert_eq!(
        toggles,
        vec![
            activity(MarkOperation::Mark),
            marked(1),
            activity(MarkOperation::Unmark),
            marked(0),
        ]
    );
}
