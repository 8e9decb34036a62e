pub mod directory;
pub mod relay;
pub mod session;

pub use directory::RoomDirectory;
pub use relay::SignalingRelay;
pub use session::SignalingSession;
