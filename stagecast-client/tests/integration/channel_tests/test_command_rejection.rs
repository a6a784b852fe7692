use crate::utils::{next_command, spawn_client};
use stagecast_client::Error;
use stagecast_core::{ClientCommand, RoomId};

#[tokio::test]
async fn test_rejected_command_names_the_culprit() {
    let mut h = spawn_client().await;
    h.hub.reject_command("JoinStream", "stream not found");

    let err = h
        .client
        .join_stream(RoomId::from("missing"))
        .await
        .unwrap_err();
    match err {
        Error::Command { command, reason } => {
            assert_eq!(command, "JoinStream");
            assert_eq!(reason, "stream not found");
        }
        other => panic!("unexpected error: {other}"),
    }

    // the command still reached the hub before the rejection
    let cmd = next_command(&mut h.commands).await;
    assert!(matches!(cmd, ClientCommand::JoinStream { .. }));
}

#[tokio::test]
async fn test_rejection_does_not_create_a_session() {
    let mut h = spawn_client().await;
    h.hub.reject_command("JoinStream", "room is full");

    let err = h.client.join_stream(RoomId::from("crowded")).await;
    assert!(err.is_err());
    assert!(h.client.current_room().is_none());

    // the failed join left no pending state behind, so the client can
    // immediately try again
    let _ = next_command(&mut h.commands).await;
    let err = h.client.join_stream(RoomId::from("crowded")).await;
    assert!(matches!(err, Err(Error::Command { .. })));
}
