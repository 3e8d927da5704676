//! `EspnPlayer`: the client core as seen from the UI.
//!
//! Wires one shared [`Session`] into the auth, catalog and stream
//! components and turns their results into [`ListItem`]s and
//! [`Playback`] outcomes.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::auth::{AuthManager, AuthState};
use crate::bitrate::{self, BitratePolicy, BitratePrompt};
use crate::catalog::{filter_events, CatalogClient, Event, EventBucket};
use crate::config::Config;
use crate::cookies::PersistentCookieJar;
use crate::credentials::CredentialStore;
use crate::error::Result;
use crate::listing::{ListItem, PlayableItem};
use crate::session::Session;
use crate::stream::{StreamResolution, StreamResolver, MEDIA_AUTH_COOKIE};

/// What `play` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    Ready(PlayableItem),
    /// The service offered no manifest or the manifest had no variants.
    NoStream,
    /// Variants exist but none satisfies the bitrate policy.
    NoAcceptableBitrate,
    /// The user dismissed the bitrate prompt.
    Cancelled,
}

/// ESPN Player client.
pub struct EspnPlayer {
    config: Config,
    session: Arc<Session>,
    auth: AuthManager,
    catalog: CatalogClient,
    resolver: StreamResolver,
}

impl EspnPlayer {
    /// Create the profile directory if needed and load the cookie jar and
    /// credentials from it.
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.profile_dir)?;

        let jar = PersistentCookieJar::load(config.cookie_file())
            .with_session_scoped(&[MEDIA_AUTH_COOKIE]);
        debug!(cookies = jar.len(), path = %jar.path().display(), "Cookie jar loaded");
        let session = Arc::new(Session::with_jar(jar, config.debug)?);

        let store = CredentialStore::new(config.credentials_file());
        store.load()?;

        let endpoints = config.endpoints.clone();
        let auth = AuthManager::new(Arc::clone(&session), store, endpoints.clone());
        let catalog = CatalogClient::new(Arc::clone(&session), endpoints.clone());
        let resolver = StreamResolver::new(Arc::clone(&session), endpoints);

        Ok(Self {
            config,
            session,
            auth,
            catalog,
            resolver,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub fn resolver(&self) -> &StreamResolver {
        &self.resolver
    }

    /// Log in with the stored token or the configured username/password.
    pub fn login(&mut self) -> Result<()> {
        self.auth.login(
            self.config.username.as_deref(),
            self.config.password.as_deref(),
        )?;
        Ok(())
    }

    pub fn logout(&mut self) -> Result<()> {
        self.auth.logout()
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth.is_logged_in()
    }

    pub fn auth_state(&self) -> &AuthState {
        self.auth.state()
    }

    pub fn categories(&self) -> Result<Vec<ListItem>> {
        Ok(self.catalog.get_categories()?.iter().map(ListItem::from).collect())
    }

    /// Every event of `service`, unfiltered.
    pub fn schedule(&self, service: &str) -> Result<Vec<Event>> {
        self.catalog.get_schedule(service)
    }

    /// Events of `service` in `bucket`, ready for listing.
    pub fn events(&self, service: &str, bucket: EventBucket) -> Result<Vec<ListItem>> {
        let schedule = self.catalog.get_schedule(service)?;
        Ok(filter_events(&schedule, bucket)
            .iter()
            .map(ListItem::from)
            .collect())
    }

    pub fn channels(&self) -> Result<Vec<ListItem>> {
        Ok(self.catalog.get_channels()?.iter().map(ListItem::from).collect())
    }

    /// Resolve `airing_id` and pick a variant.
    ///
    /// `channel` defaults to the configured default channel.
    #[instrument(skip(self, prompt))]
    pub fn play(
        &self,
        airing_id: &str,
        channel: Option<&str>,
        policy: BitratePolicy,
        prompt: &mut dyn BitratePrompt,
    ) -> Result<Playback> {
        let channel = channel.unwrap_or(&self.config.default_channel);
        let resolution = self.resolver.get_stream_url(airing_id, Some(channel))?;
        Ok(choose(&resolution, policy, prompt))
    }
}

fn choose(
    resolution: &StreamResolution,
    policy: BitratePolicy,
    prompt: &mut dyn BitratePrompt,
) -> Playback {
    if !resolution.is_playable() {
        info!("No stream available");
        return Playback::NoStream;
    }

    let keys = resolution.keys();
    let picked = bitrate::select(keys.iter().map(String::as_str), policy, prompt);

    match picked.as_deref().and_then(|key| resolution.get(key)) {
        Some(url) => {
            info!(bitrate = picked.as_deref().unwrap_or_default(), "Playing");
            Playback::Ready(PlayableItem::from_playback_url(url))
        }
        None if policy == BitratePolicy::Ask => Playback::Cancelled,
        None => Playback::NoAcceptableBitrate,
    }
}
