use anyhow::Result;
use webhook_relay::models::{status::DeliveryStatus, task::EnqueueOptions};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use crate::common::{card, message, next_terminal, test_executor, title_of};

/// Test: A second delivery under the same key edits the first message
#[tokio::test]
async fn test_tracked_delivery_updates_existing_message() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(query_param("wait", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("1001")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/hook/messages/1001"))
        .and(query_param("wait", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("1001")))
        .expect(1)
        .mount(&server)
        .await;

    let (executor, mut outcomes) = test_executor()?;
    let destination = format!("{}/hook", server.uri());
    let options = EnqueueOptions::default().with_tracking_key("ISSUE-7");

    executor
        .enqueue(&destination, card("unresolved"), options.clone())
        .await?;
    executor
        .enqueue(&destination, card("resolved"), options)
        .await?;

    let created = next_terminal(&mut outcomes).await;
    assert_eq!(created.status, DeliveryStatus::Succeeded);
    assert_eq!(created.message_id.as_deref(), Some("1001"));

    let updated = next_terminal(&mut outcomes).await;
    assert_eq!(updated.status, DeliveryStatus::Succeeded);
    assert_eq!(updated.message_id.as_deref(), Some("1001"));

    assert_eq!(
        executor
            .tracked_message_id(&destination, "ISSUE-7")
            .await
            .as_deref(),
        Some("1001")
    );

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method.as_str(), "PATCH");
    assert_eq!(title_of(&requests[1].body), "resolved");

    Ok(())
}

/// Test: Untracked tasks always post new messages
#[tokio::test]
async fn test_untracked_deliveries_never_update() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("1")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("1")))
        .expect(0)
        .mount(&server)
        .await;

    let (executor, mut outcomes) = test_executor()?;
    let destination = format!("{}/hook", server.uri());

    executor
        .enqueue(&destination, card("push 1"), EnqueueOptions::default())
        .await?;
    executor
        .enqueue(
            &destination,
            card("push 2"),
            EnqueueOptions::default().with_tracking_key(""),
        )
        .await?;

    assert_eq!(next_terminal(&mut outcomes).await.status, DeliveryStatus::Succeeded);
    assert_eq!(next_terminal(&mut outcomes).await.status, DeliveryStatus::Succeeded);

    Ok(())
}

/// Test: Different keys map to different messages
#[tokio::test]
async fn test_distinct_keys_create_distinct_messages() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("10")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("20")))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let (executor, mut outcomes) = test_executor()?;
    let destination = format!("{}/hook", server.uri());

    executor
        .enqueue(
            &destination,
            card("a"),
            EnqueueOptions::default().with_tracking_key("ISSUE-1"),
        )
        .await?;
    executor
        .enqueue(
            &destination,
            card("b"),
            EnqueueOptions::default().with_tracking_key("ISSUE-2"),
        )
        .await?;

    next_terminal(&mut outcomes).await;
    next_terminal(&mut outcomes).await;

    assert_eq!(
        executor.tracked_message_id(&destination, "ISSUE-1").await.as_deref(),
        Some("10")
    );
    assert_eq!(
        executor.tracked_message_id(&destination, "ISSUE-2").await.as_deref(),
        Some("20")
    );

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.method.as_str() == "POST"));

    Ok(())
}

/// Test: Tracking keys are scoped to their destination
#[tokio::test]
async fn test_tracking_keys_are_scoped_per_destination() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("5")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("5")))
        .expect(0)
        .mount(&server)
        .await;

    let (executor, mut outcomes) = test_executor()?;
    let issues = format!("{}/issues", server.uri());
    let changelog = format!("{}/changelog", server.uri());
    let options = EnqueueOptions::default().with_tracking_key("ISSUE-9");

    executor
        .enqueue(&issues, card("issues"), options.clone())
        .await?;
    assert_eq!(next_terminal(&mut outcomes).await.status, DeliveryStatus::Succeeded);

    executor
        .enqueue(&changelog, card("changelog"), options)
        .await?;
    assert_eq!(next_terminal(&mut outcomes).await.status, DeliveryStatus::Succeeded);

    Ok(())
}

/// Test: A failed edit keeps the previously tracked message
#[tokio::test]
async fn test_failed_update_keeps_tracked_message() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message("77")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/hook/messages/77"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (executor, mut outcomes) = test_executor()?;
    let destination = format!("{}/hook", server.uri());
    let options = EnqueueOptions::default().with_tracking_key("ISSUE-3");

    executor
        .enqueue(&destination, card("first"), options.clone())
        .await?;
    executor
        .enqueue(&destination, card("second"), options)
        .await?;

    assert_eq!(next_terminal(&mut outcomes).await.status, DeliveryStatus::Succeeded);

    let failed = next_terminal(&mut outcomes).await;
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.attempts, 1);

    assert_eq!(
        executor.tracked_message_id(&destination, "ISSUE-3").await.as_deref(),
        Some("77")
    );

    Ok(())
}
