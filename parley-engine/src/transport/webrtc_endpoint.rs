use std::rc::Rc;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_core::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use super::{UndeliveredHandler, WebRtcChannel};
use crate::config::ChannelSpec;
use crate::endpoint::{
    ConnectionEndpoint, ConnectionState, EndpointEvent, EndpointEventSink, EndpointFactory,
    SignalingState, TrackInfo, TrackKind,
};
use crate::error::{CandidateError, ChannelError, DescriptionError, EndpointError};

type SharedSink = Arc<Mutex<Option<EndpointEventSink>>>;

fn emit(sink: &SharedSink, event: EndpointEvent) {
    let sink = sink.lock().ok().and_then(|s| s.clone());
    match sink {
        Some(sink) => {
            sink.emit(event);
        }
        None => debug!(?event, "No sink registered, dropping endpoint event"),
    }
}

/// A peer connection from the `webrtc` crate.
pub struct WebRtcEndpoint {
    pc: Arc<RTCPeerConnection>,
    sink: SharedSink,
}

impl WebRtcEndpoint {
    pub async fn new(ice_servers: &[IceServerConfig]) -> Result<Self, EndpointError> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()
            .map_err(|e| EndpointError::Create(e.to_string()))?;
        let registry = register_default_interceptors(Registry::new(), &mut m)
            .map_err(|e| EndpointError::Create(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let pc = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| EndpointError::Create(e.to_string()))?,
        );

        let endpoint = Self {
            pc,
            sink: Arc::new(Mutex::new(None)),
        };
        endpoint.install_callbacks();
        Ok(endpoint)
    }

    fn install_callbacks(&self) {
        let sink = self.sink.clone();
        self.pc.on_negotiation_needed(Box::new(move || {
            let sink = sink.clone();
            Box::pin(async move {
                emit(&sink, EndpointEvent::NegotiationNeeded);
            })
        }));

        let sink = self.sink.clone();
        self.pc
            .on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
                let sink = sink.clone();
                Box::pin(async move {
                    let candidate = match c {
                        Some(candidate) => match candidate.to_json() {
                            Ok(init) => IceCandidate {
                                candidate: init.candidate,
                                sdp_mid: init.sdp_mid,
                                sdp_m_line_index: init.sdp_mline_index,
                                username_fragment: init.username_fragment,
                            },
                            Err(e) => {
                                warn!("Failed to serialize local candidate: {}", e);
                                return;
                            }
                        },
                        None => IceCandidate::end_of_candidates(),
                    };
                    emit(&sink, EndpointEvent::IceCandidate(candidate));
                })
            }));

        let sink = self.sink.clone();
        self.pc.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let sink = sink.clone();
                Box::pin(async move {
                    emit(&sink, EndpointEvent::ConnectionStateChanged(map_connection_state(s)));
                })
            },
        ));

        let sink = self.sink.clone();
        self.pc
            .on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let sink = sink.clone();
                Box::pin(async move {
                    debug!("Remote announced data channel '{}'", dc.label());
                    wire_channel(&dc, &sink);
                    let channel = adapt_channel(dc, &sink);
                    emit(&sink, EndpointEvent::IncomingChannel(channel));
                })
            }));

        let sink = self.sink.clone();
        self.pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
            let sink = sink.clone();
            Box::pin(async move {
                let info = TrackInfo {
                    id: track.id(),
                    kind: match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        _ => TrackKind::Video,
                    },
                    stream_id: track.stream_id(),
                };
                emit(&sink, EndpointEvent::IncomingTrack(info));
            })
        }));
    }

    async fn commit_local(
        &self,
        kind: SdpType,
        desc: RTCSessionDescription,
    ) -> Result<SessionDescription, DescriptionError> {
        self.pc
            .set_local_description(desc)
            .await
            .map_err(|e| DescriptionError::Commit {
                kind,
                reason: e.to_string(),
            })?;

        let local = self
            .pc
            .local_description()
            .await
            .ok_or(DescriptionError::MissingLocal)?;
        Ok(SessionDescription {
            kind,
            sdp: local.sdp,
        })
    }
}

fn adapt_channel(dc: Arc<RTCDataChannel>, sink: &SharedSink) -> Arc<WebRtcChannel> {
    // Captured now: frames that fail after the endpoint closed must still reach the session.
    let registered = sink.lock().ok().and_then(|s| s.clone());
    let label = dc.label().to_owned();
    let on_undelivered: UndeliveredHandler = Box::new(move |frames| match &registered {
        Some(sink) => {
            sink.emit(EndpointEvent::Undelivered {
                label: label.clone(),
                frames,
            });
        }
        None => debug!(label, "No sink registered, dropping undelivered frames"),
    });
    Arc::new(WebRtcChannel::new(dc, on_undelivered))
}

fn wire_channel(dc: &Arc<RTCDataChannel>, sink: &SharedSink) {
    let label = dc.label().to_owned();

    let (open_sink, open_label) = (sink.clone(), label.clone());
    dc.on_open(Box::new(move || {
        Box::pin(async move {
            info!("Data channel '{}' open", open_label);
            emit(&open_sink, EndpointEvent::ChannelOpen { label: open_label });
        })
    }));

    let (msg_sink, msg_label) = (sink.clone(), label.clone());
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let sink = msg_sink.clone();
        let label = msg_label.clone();
        Box::pin(async move {
            match String::from_utf8(msg.data.to_vec()) {
                Ok(text) => emit(&sink, EndpointEvent::ChannelMessage { label, text }),
                Err(_) => warn!("Non-text frame on data channel '{}'", label),
            }
        })
    }));

    let close_sink = sink.clone();
    dc.on_close(Box::new(move || {
        let sink = close_sink.clone();
        let label = label.clone();
        Box::pin(async move {
            emit(&sink, EndpointEvent::ChannelClosed { label });
        })
    }));
}

fn map_connection_state(state: RTCPeerConnectionState) -> ConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => ConnectionState::Connecting,
        RTCPeerConnectionState::Connected => ConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => ConnectionState::Failed,
        RTCPeerConnectionState::Closed => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}

#[async_trait(?Send)]
impl ConnectionEndpoint for WebRtcEndpoint {
    async fn create_and_commit_local_offer(&self) -> Result<SessionDescription, DescriptionError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| DescriptionError::Create {
                kind: SdpType::Offer,
                reason: e.to_string(),
            })?;
        self.commit_local(SdpType::Offer, offer).await
    }

    async fn create_and_commit_local_answer(&self) -> Result<SessionDescription, DescriptionError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| DescriptionError::Create {
                kind: SdpType::Answer,
                reason: e.to_string(),
            })?;
        self.commit_local(SdpType::Answer, answer).await
    }

    async fn commit_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), DescriptionError> {
        let kind = description.kind;
        let commit_err = |e: webrtc::Error| DescriptionError::Commit {
            kind,
            reason: e.to_string(),
        };

        if kind == SdpType::Offer && self.signaling_state() == SignalingState::HaveLocalOffer {
            info!("Rolling back local offer");
            let mut rollback = RTCSessionDescription::default();
            rollback.sdp_type = RTCSdpType::Rollback;
            self.pc
                .set_local_description(rollback)
                .await
                .map_err(commit_err)?;
        }

        let remote = match kind {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp),
            SdpType::Answer => RTCSessionDescription::answer(description.sdp),
        }
        .map_err(commit_err)?;

        self.pc
            .set_remote_description(remote)
            .await
            .map_err(commit_err)
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), CandidateError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| CandidateError(e.to_string()))
    }

    fn signaling_state(&self) -> SignalingState {
        match self.pc.signaling_state() {
            RTCSignalingState::HaveLocalOffer | RTCSignalingState::HaveRemotePranswer => {
                SignalingState::HaveLocalOffer
            }
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer => {
                SignalingState::HaveRemoteOffer
            }
            RTCSignalingState::Closed => SignalingState::Closed,
            _ => SignalingState::Stable,
        }
    }

    fn connection_state(&self) -> ConnectionState {
        map_connection_state(self.pc.connection_state())
    }

    fn register_callbacks(&self, sink: EndpointEventSink) {
        match self.sink.lock() {
            Ok(mut slot) => *slot = Some(sink),
            Err(e) => warn!("Endpoint sink lock poisoned: {}", e),
        }
    }

    async fn open_channel(
        &self,
        spec: &ChannelSpec,
    ) -> Result<Arc<dyn crate::endpoint::Channel>, ChannelError> {
        let init = RTCDataChannelInit {
            negotiated: spec.negotiated_id,
            ..Default::default()
        };
        let dc = self
            .pc
            .create_data_channel(&spec.label, Some(init))
            .await
            .map_err(|e| ChannelError {
                label: spec.label.clone(),
                reason: e.to_string(),
            })?;

        wire_channel(&dc, &self.sink);
        Ok(adapt_channel(dc, &self.sink))
    }

    async fn add_local_track(&self, track: &TrackInfo) -> Result<(), EndpointError> {
        let mime_type = match track.kind {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let local = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            track.id.clone(),
            track.stream_id.clone(),
        ));

        self.pc
            .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| EndpointError::Track {
                id: track.id.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn close(&self) -> Result<(), EndpointError> {
        if let Ok(mut slot) = self.sink.lock() {
            slot.take();
        }
        self.pc
            .close()
            .await
            .map_err(|e| EndpointError::Close(e.to_string()))
    }
}

/// Builds a fresh [`WebRtcEndpoint`] per reset.
pub struct WebRtcEndpointFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl WebRtcEndpointFactory {
    pub fn new(ice_servers: Vec<IceServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait(?Send)]
impl EndpointFactory for WebRtcEndpointFactory {
    async fn create(&self) -> Result<Rc<dyn ConnectionEndpoint>, EndpointError> {
        let endpoint = WebRtcEndpoint::new(&self.ice_servers).await?;
        Ok(Rc::new(endpoint))
    }
}
