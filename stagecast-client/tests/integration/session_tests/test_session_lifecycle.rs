use crate::utils::{
    establish_host, establish_member, next_command, next_event, spawn_client, test_stream,
    wait_until,
};
use stagecast_client::{Error, SessionEndReason, StreamEvent};
use stagecast_core::{ClientCommand, MediaKind, Role, RoomId, ServerEvent};

#[tokio::test]
async fn test_start_stream_makes_host_session() {
    let mut h = spawn_client().await;
    establish_host(&mut h, "R1").await;

    assert_eq!(h.client.current_room(), Some(RoomId::from("R1")));
    assert_eq!(h.client.current_role(), Some(Role::Host));
}

#[tokio::test]
async fn test_join_makes_viewer_session() {
    let mut h = spawn_client().await;
    establish_member(&mut h, "R1", Role::Viewer).await;

    assert_eq!(h.client.current_room(), Some(RoomId::from("R1")));
    assert_eq!(h.client.current_role(), Some(Role::Viewer));
}

#[tokio::test]
async fn test_second_session_is_rejected() {
    let mut h = spawn_client().await;
    establish_host(&mut h, "R1").await;

    let err = h
        .client
        .start_stream(test_stream(MediaKind::Audio))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Session(_)));

    let err = h.client.join_stream(RoomId::from("R2")).await.unwrap_err();
    assert!(matches!(err, Error::Session(_)));
}

#[tokio::test]
async fn test_leave_tears_down_locally() {
    let mut h = spawn_client().await;
    establish_member(&mut h, "R1", Role::Viewer).await;

    h.client.leave_stream().await.expect("leave");
    let cmd = next_command(&mut h.commands).await;
    assert!(matches!(cmd, ClientCommand::LeaveStream { .. }));
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::SessionEnded {
            reason: SessionEndReason::Left
        }
    ));
    wait_until(|| h.client.current_room().is_none()).await;
}

#[tokio::test]
async fn test_stream_ended_by_host() {
    let mut h = spawn_client().await;
    establish_member(&mut h, "R1", Role::Viewer).await;

    h.hub.send_event(ServerEvent::StreamEnded {
        room_id: RoomId::from("R1"),
    });
    assert!(matches!(
        next_event(&mut h.events).await,
        StreamEvent::SessionEnded {
            reason: SessionEndReason::Ended
        }
    ));
    wait_until(|| h.client.current_room().is_none()).await;
}

#[tokio::test]
async fn test_only_host_may_end() {
    let mut h = spawn_client().await;
    establish_member(&mut h, "R1", Role::Viewer).await;

    let err = h.client.end_stream().await.unwrap_err();
    assert!(matches!(err, Error::Session(_)));
    assert_eq!(h.client.current_room(), Some(RoomId::from("R1")));
}

#[tokio::test]
async fn test_chat_needs_a_session() {
    let mut h = spawn_client().await;

    let err = h.client.send_message("hello?").await.unwrap_err();
    assert!(matches!(err, Error::Session(_)));

    establish_member(&mut h, "R1", Role::Viewer).await;
    h.client.send_message("hello!").await.expect("send message");
    let cmd = next_command(&mut h.commands).await;
    match cmd {
        ClientCommand::SendMessage { room_id, body } => {
            assert_eq!(room_id, RoomId::from("R1"));
            assert_eq!(body, "hello!");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
