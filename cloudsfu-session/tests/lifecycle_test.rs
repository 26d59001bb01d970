//! Integration tests for producer, consumer and transport close paths
//!
//! Run with: cargo test --test lifecycle_test

mod common;

use cloudsfu_session::{ProduceOptions, SessionError, SessionEvent, TransportDirection};
use common::{settle, Call, FakeTrack, Harness};

#[tokio::test]
async fn test_producer_close_deletes_once() {
    let harness = Harness::with_transports().await;
    let producer = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap();
    let id = producer.id().to_string();
    harness.controller.clear();

    producer.close().await;
    producer.close().await;

    assert!(producer.closed());
    assert!(producer.local().closed());
    assert!(harness.session.producer(&id).is_none());
    assert_eq!(harness.controller.deletes(), vec![Call::DeleteProducer(id)]);
}

#[tokio::test]
async fn test_consumer_close_deletes_once() {
    let harness = Harness::with_transports().await;
    let consumer = harness
        .session
        .create_media_consumer("producer-remote")
        .await
        .unwrap();
    let id = consumer.id().to_string();
    harness.controller.clear();

    consumer.close().await;
    consumer.close().await;

    assert!(consumer.closed());
    assert!(harness.session.consumer(&id).is_none());
    assert!(harness.session.consumer_for_producer("producer-remote").is_none());
    assert_eq!(harness.controller.deletes(), vec![Call::DeleteConsumer(id)]);
}

#[tokio::test]
async fn test_failed_producer_delete_still_deregisters() {
    let harness = Harness::with_transports().await;
    let producer = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap();
    let id = producer.id().to_string();
    harness.controller.fail("delete_media_producer");

    producer.close().await;

    assert!(producer.closed());
    assert!(harness.session.producer(&id).is_none());
    assert_eq!(
        harness.controller.count(|c| *c == Call::DeleteProducer(id.clone())),
        1
    );

    // Closed handles never retry the delete
    producer.close().await;
    assert_eq!(
        harness.controller.count(|c| *c == Call::DeleteProducer(id.clone())),
        1
    );
}

#[tokio::test]
async fn test_engine_closed_producer_deleted_remotely() {
    let harness = Harness::with_transports().await;
    let producer = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap();
    let id = producer.id().to_string();
    harness.controller.clear();

    // The engine ends the track on its own
    producer.local().close();
    settle().await;

    assert!(producer.closed());
    assert!(harness.session.producer(&id).is_none());
    assert_eq!(harness.controller.deletes(), vec![Call::DeleteProducer(id)]);
}

#[tokio::test]
async fn test_engine_closed_consumer_deleted_remotely() {
    let harness = Harness::with_transports().await;
    let consumer = harness
        .session
        .create_media_consumer("producer-remote")
        .await
        .unwrap();
    let id = consumer.id().to_string();
    harness.controller.clear();

    consumer.local().close();
    settle().await;

    assert!(consumer.closed());
    assert!(harness.session.consumers().is_empty());
    assert_eq!(harness.controller.deletes(), vec![Call::DeleteConsumer(id)]);
}

#[tokio::test]
async fn test_handle_ops_after_close_fail() {
    let harness = Harness::with_transports().await;
    let producer = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap();
    producer.close().await;
    harness.controller.clear();

    let err = producer.pause().await.unwrap_err();
    assert!(matches!(err, SessionError::PreconditionFailed(_)));
    assert!(harness.controller.calls().is_empty());
}

#[tokio::test]
async fn test_producer_pause_resume() {
    let harness = Harness::with_transports().await;
    let producer = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap();
    let id = producer.id().to_string();
    harness.controller.clear();

    producer.pause().await.unwrap();
    assert!(producer.paused());
    producer.resume().await.unwrap();
    assert!(!producer.paused());

    assert_eq!(
        harness.controller.calls(),
        vec![Call::PauseProducer(id.clone()), Call::ResumeProducer(id)]
    );
}

#[tokio::test]
async fn test_consumer_controls() {
    let harness = Harness::with_transports().await;
    let consumer = harness
        .session
        .create_media_consumer("producer-remote")
        .await
        .unwrap();
    let id = consumer.id().to_string();
    harness.controller.clear();

    consumer.pause().await.unwrap();
    assert!(consumer.paused());
    consumer.resume().await.unwrap();
    consumer.set_preferred_layers(2, 1).await.unwrap();
    consumer.set_priority(5).await.unwrap();
    consumer.unset_priority().await.unwrap();
    consumer.request_key_frame().await.unwrap();

    assert_eq!(
        harness.controller.calls(),
        vec![
            Call::PauseConsumer(id.clone()),
            Call::ResumeConsumer(id.clone()),
            Call::SetConsumerLayers(id.clone(), 2, 1),
            Call::SetConsumerPriority(id.clone(), 5),
            Call::UnsetConsumerPriority(id.clone()),
            Call::RequestKeyFrame(id),
        ]
    );
}

#[tokio::test]
async fn test_transport_close_deletes_and_frees_slot() {
    let harness = Harness::with_transports().await;
    let send = harness.session.send_transport().unwrap();
    let id = send.id().to_string();
    let mut events = harness.session.subscribe();

    send.close().await;
    send.close().await;

    assert!(send.closed());
    assert!(send.local().closed());
    assert!(harness.session.send_transport().is_none());
    assert_eq!(harness.controller.deletes(), vec![Call::DeleteTransport(id.clone())]);
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::TransportClosed { direction: TransportDirection::Send, transport_id }
            if transport_id == id
    ));

    // A fresh transport can be created in its place
    let replacement = harness.session.create_send_transport(None).await.unwrap();
    assert_ne!(replacement.id(), id);
}

#[tokio::test]
async fn test_engine_closed_transport_cascades() {
    let harness = Harness::with_transports().await;
    let producer = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap();
    let send = harness.session.send_transport().unwrap();
    let transport_id = send.id().to_string();
    let producer_id = producer.id().to_string();
    harness.controller.clear();

    // ICE failure on the engine side
    send.local().close();
    settle().await;

    assert!(send.closed());
    assert!(producer.closed());
    assert!(harness.session.send_transport().is_none());
    assert!(harness.session.producers().is_empty());

    let deletes = harness.controller.deletes();
    assert_eq!(deletes.len(), 2);
    assert!(deletes.contains(&Call::DeleteTransport(transport_id)));
    assert!(deletes.contains(&Call::DeleteProducer(producer_id)));
}

#[tokio::test]
async fn test_engine_closed_transport_without_caller_handle() {
    let harness = Harness::with_transports().await;
    let mut events = harness.session.subscribe();
    let (local, transport_id) = {
        let recv = harness.session.recv_transport().unwrap();
        (recv.local().clone(), recv.id().to_string())
    };

    local.close();
    settle().await;

    assert!(harness.session.recv_transport().is_none());
    assert_eq!(
        harness.controller.deletes(),
        vec![Call::DeleteTransport(transport_id.clone())]
    );
    assert!(matches!(
        events.try_recv(),
        Ok(SessionEvent::TransportClosed { direction: TransportDirection::Recv, transport_id: id })
            if id == transport_id
    ));

    // Closing twice still releases the remote transport only once
    local.close();
    settle().await;
    assert_eq!(harness.controller.deletes().len(), 1);
}

#[tokio::test]
async fn test_connect_failure_rejects_produce() {
    let harness = Harness::with_transports().await;
    harness.controller.fail("connect_webrtc_transport");

    let err = harness
        .session
        .create_media_producer(ProduceOptions::new(FakeTrack::audio()))
        .await
        .unwrap_err();

    assert!(err.as_remote().is_some());
    assert_eq!(
        harness.controller.count(|c| matches!(c, Call::CreateProducer { .. })),
        0
    );
}
