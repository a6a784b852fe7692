use std::sync::Arc;

use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

use stagecast_core::MediaKind;

async fn new_pc() -> Arc<RTCPeerConnection> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .expect("codec registration");
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)
        .expect("interceptor registration");

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();
    Arc::new(
        api.new_peer_connection(RTCConfiguration::default())
            .await
            .expect("peer connection"),
    )
}

async fn wait_gathering(pc: &RTCPeerConnection) {
    let mut done = pc.gathering_complete_promise().await;
    let _ = done.recv().await;
}

/// Build a receive-only offer the way a consuming counterpart would.
/// The peer connection is returned so it stays alive for the test.
pub async fn make_recv_offer(kinds: &[MediaKind]) -> (Arc<RTCPeerConnection>, String) {
    let pc = new_pc().await;
    for kind in kinds {
        let codec_type = match kind {
            MediaKind::Audio => RTPCodecType::Audio,
            MediaKind::Video => RTPCodecType::Video,
        };
        pc.add_transceiver_from_kind(
            codec_type,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .expect("transceiver");
    }

    let offer = pc.create_offer(None).await.expect("offer");
    pc.set_local_description(offer).await.expect("local offer");
    wait_gathering(&pc).await;

    let sdp = pc
        .local_description()
        .await
        .expect("local description")
        .sdp;
    (pc, sdp)
}

/// Answer an incoming offer the way a producing counterpart would.
pub async fn answer_offer(offer_sdp: &str) -> String {
    let pc = new_pc().await;
    pc.set_remote_description(
        RTCSessionDescription::offer(offer_sdp.to_string()).expect("offer description"),
    )
    .await
    .expect("remote offer");

    let answer = pc.create_answer(None).await.expect("answer");
    pc.set_local_description(answer).await.expect("local answer");
    wait_gathering(&pc).await;

    pc.local_description().await.expect("local description").sdp
}
