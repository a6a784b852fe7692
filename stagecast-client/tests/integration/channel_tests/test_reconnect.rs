use crate::utils::{next_event, spawn_client};
use stagecast_client::{Error, StreamEvent};
use stagecast_core::{ParticipantId, Role, RoomId, ServerEvent};

#[tokio::test(start_paused = true)]
async fn test_short_outage_reconnects() {
    let mut h = spawn_client().await;

    h.hub.drop_connection();
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::Reconnecting
    ));
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::Reconnected
    ));

    // the fresh connection delivers events again
    h.hub.send_event(ServerEvent::UserJoined {
        participant_id: ParticipantId::new(),
        username: "late".to_string(),
        role: Role::Viewer,
    });
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::UserJoined { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_window_is_bounded() {
    let mut h = spawn_client().await;

    h.hub.refuse_dials(true);
    h.hub.drop_connection();

    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::Reconnecting
    ));
    // every dial fails, so after the window the channel gives up for good
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::Disconnected
    ));

    // further commands fail instead of hanging
    let err = h
        .client
        .join_stream(RoomId::from("R1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Closed | Error::Command { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_outage_ends_active_session() {
    let mut h = spawn_client().await;
    crate::utils::establish_member(&mut h, "R1", Role::Viewer).await;

    h.hub.drop_connection();
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::Reconnecting
    ));
    // in-flight negotiations are not resumed; the session ends and the
    // application rejoins after Reconnected
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::SessionEnded {
            reason: stagecast_client::SessionEndReason::ChannelLost
        }
    ));
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::Reconnected
    ));
}
