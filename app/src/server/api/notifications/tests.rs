use axum::Json;
use axum::extract::{Path, Query, State};
use watch_core::NotificationOptions;

use super::{ResetQuery, button_click, click, create_notification, list_notifications, reset};
use crate::test_support::test_state;

#[tokio::test]
async fn custom_notification_is_listed_then_cleared_on_click() {
    let state = test_state().await;
    let options = NotificationOptions {
        title: "Heads up".into(),
        message: "Raid incoming".into(),
        ..NotificationOptions::default()
    };

    let created = create_notification(State(state.clone()), Json(options))
        .await
        .unwrap()
        .0;
    let id = created["data"]["id"].as_str().unwrap().to_string();
    assert!(id.starts_with("custom_"));

    let listed = list_notifications(State(state.clone())).await.unwrap().0;
    assert_eq!(listed["data"][0]["id"], id.as_str());
    assert_eq!(listed["data"][0]["title"], "Heads up");

    let event = click(State(state.clone()), Path(id.clone())).await.unwrap().0;
    assert_eq!(event["data"]["type"], "custom_clicked");
    assert_eq!(event["data"]["data"]["notificationId"], id.as_str());

    assert!(state.notifier().active().is_empty());
}

#[tokio::test]
async fn stream_click_resolves_platform_and_id() {
    let state = test_state().await;

    let event = click(State(state), Path("stream_twitch_12345".to_string()))
        .await
        .unwrap()
        .0;
    assert_eq!(event["data"]["type"], "stream_clicked");
    assert_eq!(event["data"]["data"]["platformType"], "twitch");
    assert_eq!(event["data"]["data"]["streamId"], "12345");
}

#[tokio::test]
async fn button_click_carries_index() {
    let state = test_state().await;

    let event = button_click(State(state), Path(("schedule_youtube_v9".to_string(), 1)))
        .await
        .unwrap()
        .0;
    assert_eq!(event["data"]["type"], "schedule_button_clicked");
    assert_eq!(event["data"]["data"]["scheduleId"], "v9");
    assert_eq!(event["data"]["data"]["buttonIndex"], 1);
}

#[tokio::test]
async fn reset_with_nothing_notified_clears_nothing() {
    let state = test_state().await;

    let body = reset(State(state), Query(ResetQuery { id: None }))
        .await
        .unwrap()
        .0;
    assert_eq!(body["data"]["cleared"], 0);
}
