use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
}

/// Session description as browsers put it on the wire: `{"type": .., "sdp": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    /// The end-of-candidates marker.
    pub fn end_of_candidates() -> Self {
        Self::default()
    }

    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }
}

/// The only two payloads a relay `signal` event carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalEnvelope {
    Description(SessionDescription),
    Candidate(IceCandidate),
}

/// Loose form of a `signal` payload: `{description?, candidate?}`.
///
/// Peers that finish candidate gathering may send `{"candidate": null}`,
/// which carries nothing and converts to no envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<IceCandidate>,
}

impl SignalPayload {
    pub fn into_envelope(self) -> Option<SignalEnvelope> {
        match (self.description, self.candidate) {
            (Some(description), _) => Some(SignalEnvelope::Description(description)),
            (None, Some(candidate)) => Some(SignalEnvelope::Candidate(candidate)),
            (None, None) => None,
        }
    }
}

impl From<SignalEnvelope> for SignalPayload {
    fn from(envelope: SignalEnvelope) -> Self {
        match envelope {
            SignalEnvelope::Description(description) => Self {
                description: Some(description),
                candidate: None,
            },
            SignalEnvelope::Candidate(candidate) => Self {
                description: None,
                candidate: Some(candidate),
            },
        }
    }
}

/// Frames exchanged with the relay, one JSON object per websocket message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum RelayFrame {
    /// Transport session established.
    #[serde(rename = "connect")]
    Connect,
    /// A second party arrived; only the party already present receives it.
    #[serde(rename = "connected peer")]
    PeerJoined,
    #[serde(rename = "disconnected peer")]
    PeerLeft,
    #[serde(rename = "signal")]
    Signal(SignalPayload),
}

impl RelayFrame {
    pub fn signal(envelope: SignalEnvelope) -> Self {
        Self::Signal(envelope.into())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
