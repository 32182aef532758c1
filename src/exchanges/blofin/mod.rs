pub mod codec;
pub mod signer;
pub mod types;

pub mod builder;
pub mod channels;

// Re-export main components
pub use builder::{
    build_copytrading_session, build_private_session, build_public_session, BlofinWsBuilder,
    BlofinWsSession, SessionKind, COPYTRADING_WS_URL, PRIVATE_WS_URL, PUBLIC_WS_URL,
};
pub use codec::BlofinCodec;
pub use signer::BlofinSigner;
pub use types::{BlofinWsChannel, BlofinWsRequest, BlofinWsResponse, CandleInterval, OrderBookDepth};
