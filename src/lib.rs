//! `espn-player` - ESPN Player (NeuLion) streaming client core
//!
//! # Features
//!
//! - **Login**: token or username/password, credentials persisted per profile
//! - **Catalog**: categories, schedules bucketed by status, channels
//! - **Streams**: pkan exchange, playback session negotiation, HLS variants
//! - **Bitrate selection**: highest, capped, or interactive
//!
//! # Example
//!
//! ```rust,no_run
//! use espn_player::{BitratePolicy, Config, EspnPlayer, Playback};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut player = EspnPlayer::new(Config::load()?)?;
//!     player.login()?;
//!
//!     let mut never_asked = |_: &[String]| -> Option<usize> { None };
//!     match player.play("4242", None, BitratePolicy::Highest, &mut never_asked)? {
//!         Playback::Ready(item) => println!("{}", item.playback_url()),
//!         other => println!("{other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod bitrate;
pub mod body;
pub mod catalog;
pub mod client;
pub mod config;
pub mod cookies;
pub mod credentials;
pub mod error;
pub mod hls;
pub mod listing;
pub mod session;
pub mod stream;

pub use auth::{AuthManager, AuthState};
pub use bitrate::{BitratePolicy, BitratePrompt};
pub use body::{ContentKind, ResponseBody};
pub use catalog::{filter_events, CatalogClient, Category, Channel, Event, EventBucket, EventStatus};
pub use client::{EspnPlayer, Playback};
pub use config::{Config, Endpoints, DEFAULT_CHANNEL};
pub use cookies::PersistentCookieJar;
pub use credentials::{CredentialStore, Credentials};
pub use error::{Error, Result};
pub use listing::{ListItem, PlayableItem};
pub use session::{HttpMethod, Request, Response, Session, SetCookie};
pub use stream::{BitrateVariant, MediaAuthCookie, StreamResolution, StreamResolver};

/// Version of espn-player
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
