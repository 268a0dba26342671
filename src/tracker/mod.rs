//! Tracker module
//!
//! HTTP announce client: request building, transport, response decoding
//! and the per-torrent announce schedule.

pub mod announcer;
pub mod clock;
pub mod compact;
pub mod request;
pub mod response;
pub mod transport;

pub use announcer::{AnnounceContext, AnnounceState, Announcer, AnnouncerStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compact::{parse_compact_peers, CompactPeer};
pub use request::{AnnounceEvent, AnnounceRequest};
pub use response::TrackerResponse;
pub use transport::{HttpTransport, TrackerTransport};
