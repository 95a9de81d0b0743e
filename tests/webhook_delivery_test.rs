mod common;

use access_log_watcher::event::Alert;
use access_log_watcher::monitoring::dispatcher::deliver_with_retry;
use access_log_watcher::monitoring::{Notifier, RetryPolicy, WebhookFormat, WebhookNotifier};
use access_log_watcher::utils::AppError;
use chrono::Utc;
use common::spawn_webhook_server;
use std::time::Duration;

#[tokio::test]
async fn should_post_slack_payload_to_webhook() {
    // Arrange
    let (addr, received) = spawn_webhook_server().await;
    let notifier = WebhookNotifier::new(
        format!("http://{addr}/hook"),
        WebhookFormat::Slack,
        Duration::from_secs(2),
    )
    .unwrap();
    let alert = Alert::failover("blue", "green", Utc::now());

    // Act
    let result = notifier.send(&alert).await;

    // Assert
    assert!(result.is_ok());
    let bodies = received.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["text"], alert.message.as_str());
}

#[tokio::test]
async fn should_post_discord_embed_to_webhook() {
    // Arrange
    let (addr, received) = spawn_webhook_server().await;
    let notifier = WebhookNotifier::new(
        format!("http://{addr}/hook"),
        WebhookFormat::Discord,
        Duration::from_secs(2),
    )
    .unwrap();

    // Act
    notifier
        .send(&Alert::error_rate(0.5, 0.2, 5, 10, Utc::now()))
        .await
        .unwrap();

    // Assert
    let bodies = received.bodies();
    assert_eq!(bodies[0]["embeds"][0]["title"], "High error rate");
}

#[tokio::test]
async fn should_report_non_success_status_as_transient_error() {
    // Arrange
    let (addr, _received) = spawn_webhook_server().await;
    let notifier = WebhookNotifier::new(
        format!("http://{addr}/broken"),
        WebhookFormat::Slack,
        Duration::from_secs(2),
    )
    .unwrap();

    // Act
    let result = notifier
        .send(&Alert::failover("blue", "green", Utc::now()))
        .await;

    // Assert
    match result {
        Err(e @ AppError::NotifyStatus { status: 503, .. }) => assert!(e.is_transient()),
        other => panic!("Expected 503 status error, got {other:?}"),
    }
}

#[tokio::test]
async fn should_give_up_after_bounded_retries() {
    // Arrange
    let (addr, _received) = spawn_webhook_server().await;
    let notifier = WebhookNotifier::new(
        format!("http://{addr}/broken"),
        WebhookFormat::Slack,
        Duration::from_secs(1),
    )
    .unwrap();
    let policy = RetryPolicy {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(20),
        max_elapsed_time: Duration::from_millis(200),
    };

    // Act
    let started = std::time::Instant::now();
    let result = deliver_with_retry(
        &notifier,
        &Alert::failover("blue", "green", Utc::now()),
        &policy,
    )
    .await;

    // Assert
    assert!(result.is_err());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn should_not_retry_client_error_whatever_its_body_says() {
    // Arrange
    let (addr, received) = spawn_webhook_server().await;
    let notifier = WebhookNotifier::new(
        format!("http://{addr}/rejected"),
        WebhookFormat::Slack,
        Duration::from_secs(1),
    )
    .unwrap();
    let policy = RetryPolicy {
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(20),
        max_elapsed_time: Duration::from_millis(500),
    };

    // Act
    let result = deliver_with_retry(
        &notifier,
        &Alert::failover("blue", "green", Utc::now()),
        &policy,
    )
    .await;

    // Assert
    assert!(matches!(
        result,
        Err(AppError::NotifyStatus { status: 400, .. })
    ));
    assert_eq!(received.bodies().len(), 1);
}
