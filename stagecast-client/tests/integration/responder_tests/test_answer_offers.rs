use crate::utils::{
    establish_host, make_recv_offer, next_command, next_event, next_signal_command, spawn_client,
    wait_until,
};
use stagecast_client::{LinkDirection, NegotiationState, StreamEvent};
use stagecast_core::{
    ClientCommand, MediaKind, ParticipantId, Role, SdpType, ServerEvent, SessionDescription,
};

#[tokio::test]
async fn test_offer_without_local_media_is_still_answered() {
    let mut h = spawn_client().await;
    establish_host(&mut h, "R1").await;

    let consumer = ParticipantId::new();
    let (_pc, offer_sdp) = make_recv_offer(&[MediaKind::Audio, MediaKind::Video]).await;
    h.hub.send_event(ServerEvent::OfferFromConsumer {
        consumer_id: consumer.clone(),
        offer: SessionDescription {
            kind: SdpType::Offer,
            sdp: offer_sdp,
        },
    });

    match next_event(&mut h.events).await {
        StreamEvent::NoLocalMedia { consumer: c } => assert_eq!(c, consumer),
        other => panic!("unexpected event: {other:?}"),
    }

    match next_signal_command(&mut h.commands).await {
        ClientCommand::SendAnswerToConsumer {
            consumer_id,
            answer,
            ..
        } => {
            assert_eq!(consumer_id, consumer);
            assert_eq!(answer.kind, SdpType::Answer);
            assert!(!answer.sdp.is_empty());
        }
        other => panic!("expected answer, got {other:?}"),
    }

    wait_until(|| h.client.links().len() == 1).await;
    let link = &h.client.links()[0];
    assert_eq!(link.direction, LinkDirection::ToConsumer);
    assert_eq!(link.state, NegotiationState::AnswerSent);
}

#[tokio::test]
async fn test_answer_pins_opus_parameters() {
    let mut h = spawn_client().await;
    establish_host(&mut h, "R1").await;

    h.client.produce(MediaKind::Audio).await.expect("produce");
    let cmd = next_command(&mut h.commands).await;
    assert!(matches!(cmd, ClientCommand::ProduceMedia { .. }));

    let consumer = ParticipantId::new();
    let (_pc, offer_sdp) = make_recv_offer(&[MediaKind::Audio]).await;
    h.hub.send_event(ServerEvent::OfferFromConsumer {
        consumer_id: consumer.clone(),
        offer: SessionDescription {
            kind: SdpType::Offer,
            sdp: offer_sdp,
        },
    });

    let answer = match next_signal_command(&mut h.commands).await {
        ClientCommand::SendAnswerToConsumer { answer, .. } => answer,
        other => panic!("expected answer, got {other:?}"),
    };
    assert!(answer.sdp.contains("maxaveragebitrate=128000"));
    assert!(answer.sdp.contains("stereo=0"));
    assert!(answer.sdp.contains("useinbandfec=1"));
}

#[tokio::test]
async fn test_second_offer_reuses_responder_link() {
    let mut h = spawn_client().await;
    establish_host(&mut h, "R1").await;
    h.client.produce(MediaKind::Audio).await.expect("produce");
    let _ = next_command(&mut h.commands).await;

    let consumer = ParticipantId::new();
    let (_pc, offer_sdp) = make_recv_offer(&[MediaKind::Audio, MediaKind::Video]).await;
    h.hub.send_event(ServerEvent::OfferFromConsumer {
        consumer_id: consumer.clone(),
        offer: SessionDescription {
            kind: SdpType::Offer,
            sdp: offer_sdp,
        },
    });
    let first = next_signal_command(&mut h.commands).await;
    assert!(matches!(first, ClientCommand::SendAnswerToConsumer { .. }));
    wait_until(|| h.client.links().len() == 1).await;

    // the consumer renegotiates; the same link answers again
    let (_pc2, offer_sdp) = make_recv_offer(&[MediaKind::Audio, MediaKind::Video]).await;
    h.hub.send_event(ServerEvent::OfferFromConsumer {
        consumer_id: consumer.clone(),
        offer: SessionDescription {
            kind: SdpType::Offer,
            sdp: offer_sdp,
        },
    });
    let second = next_signal_command(&mut h.commands).await;
    assert!(matches!(second, ClientCommand::SendAnswerToConsumer { .. }));
    assert_eq!(h.client.links().len(), 1);
}

#[tokio::test]
async fn test_offers_outside_a_session_are_ignored() {
    let mut h = spawn_client().await;

    let (_pc, offer_sdp) = make_recv_offer(&[MediaKind::Audio]).await;
    h.hub.send_event(ServerEvent::OfferFromConsumer {
        consumer_id: ParticipantId::new(),
        offer: SessionDescription {
            kind: SdpType::Offer,
            sdp: offer_sdp,
        },
    });

    // establish a session afterwards to prove the worker is still healthy
    establish_host(&mut h, "R1").await;
    assert!(h.client.links().is_empty());
}
