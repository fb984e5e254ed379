use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ROOM_ID_LEN: usize = 7;

/// A room (relay namespace) name: exactly seven decimal digits.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("room id must be {ROOM_ID_LEN} decimal digits, got `{0}`")]
pub struct RoomIdError(String);

impl RoomId {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let digits = (0..ROOM_ID_LEN)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == ROOM_ID_LEN && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_owned()))
        } else {
            Err(RoomIdError(s.to_owned()))
        }
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An address of the form `<base>#<room>`.
///
/// Resolving a locator whose fragment is missing or malformed picks a fresh
/// room and rewrites the fragment, so printing the locator gives an address
/// that reopens the same room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomLocator {
    base: String,
    room: RoomId,
}

impl RoomLocator {
    /// Returns the resolved locator and whether a new room id had to be generated.
    pub fn resolve(locator: &str) -> (Self, bool) {
        let (base, fragment) = match locator.split_once('#') {
            Some((base, fragment)) => (base, fragment),
            None => (locator, ""),
        };

        match fragment.parse::<RoomId>() {
            Ok(room) => (
                Self {
                    base: base.to_owned(),
                    room,
                },
                false,
            ),
            Err(_) => (
                Self {
                    base: base.to_owned(),
                    room: RoomId::generate(),
                },
                true,
            ),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }
}

impl fmt::Display for RoomLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.base, self.room)
    }
}
