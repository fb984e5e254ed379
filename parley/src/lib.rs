pub use parley_core::model::{PeerId, RoomId, RoomLocator};

pub mod model {
    pub use parley_core::model::*;
}

#[cfg(feature = "engine")]
pub mod engine {
    pub use parley_engine::*;
}

#[cfg(feature = "relay")]
pub mod relay {
    pub use parley_relay::*;
}
