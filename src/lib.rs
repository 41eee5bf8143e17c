//! Dual-window karaoke controller core.
//!
//! The control window owns the queue and sends playback commands; the
//! display window owns the embedded video player. The two surfaces share no
//! memory: everything crosses the [`router::MessageRouter`] as named
//! messages, with request/response correlation and timeouts handled by the
//! [`proxy::RemotePlayerProxy`].

pub mod app;
pub mod display;
pub mod messages;
pub mod player;
pub mod playlists;
pub mod proxy;
pub mod queue;
pub mod router;
pub mod storage;
pub mod types;
pub mod validator;
