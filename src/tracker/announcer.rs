//! Per-torrent announce state machine
//!
//! Each loaded torrent gets one [`Announcer`]. It announces once with
//! `event=started` when loaded, then re-announces on a randomized one to
//! two hour schedule, reporting a slowly growing upload counter and a
//! complete download.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::cli::display::{format_bytes, format_duration};
use crate::cli::settings::SettingsHandle;
use crate::error::{Result, SeederError};
use crate::identity::{AnnounceIdentity, IdentityStore};
use crate::torrent::TorrentInfo;
use crate::tracker::clock::Clock;
use crate::tracker::compact::CompactPeer;
use crate::tracker::request::AnnounceRequest;
use crate::tracker::response::TrackerResponse;
use crate::tracker::transport::TrackerTransport;

/// Shortest delay before the next periodic announce, in seconds
const MIN_ANNOUNCE_DELAY: u64 = 3600;
/// Upper bound (exclusive) of the periodic announce delay, in seconds
const MAX_ANNOUNCE_DELAY: u64 = 7200;

/// Collaborators shared by every announcer
pub struct AnnounceContext {
    pub store: Arc<IdentityStore>,
    pub transport: Arc<dyn TrackerTransport>,
    pub settings: SettingsHandle,
    pub clock: Arc<dyn Clock>,
    /// Bound on a single tracker round trip
    pub request_timeout: Duration,
    /// Largest upload increase per periodic announce
    pub upload_step_max: u64,
}

/// Announcer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceState {
    Idle,
    Announcing,
}

/// Announce client for one torrent
pub struct Announcer {
    name: String,
    path: PathBuf,
    torrent: Arc<TorrentInfo>,
    identity: AnnounceIdentity,
    ctx: Arc<AnnounceContext>,
    rng: StdRng,
    state: AnnounceState,
    last_announce: Option<Instant>,
    next_announce: Instant,
    peers: Vec<CompactPeer>,
    last_response: Option<TrackerResponse>,
    last_error: Option<String>,
}

impl Announcer {
    /// Look up (or create) the identity for `torrent` and schedule the first
    /// periodic announce
    pub async fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        torrent: Arc<TorrentInfo>,
        ctx: Arc<AnnounceContext>,
        mut rng: StdRng,
    ) -> Self {
        let identity = ctx.store.get_or_create(&torrent.info_hash).await;
        let next_announce = ctx.clock.now() + next_delay(&mut rng);

        Self {
            name: name.into(),
            path: path.into(),
            torrent,
            identity,
            ctx,
            rng,
            state: AnnounceState::Idle,
            last_announce: None,
            next_announce,
            peers: Vec::new(),
            last_response: None,
            last_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn torrent(&self) -> &TorrentInfo {
        &self.torrent
    }

    pub fn identity(&self) -> &AnnounceIdentity {
        &self.identity
    }

    pub fn state(&self) -> AnnounceState {
        self.state
    }

    pub fn peers(&self) -> &[CompactPeer] {
        &self.peers
    }

    pub fn last_announce(&self) -> Option<Instant> {
        self.last_announce
    }

    pub fn next_announce(&self) -> Instant {
        self.next_announce
    }

    pub fn last_response(&self) -> Option<&TrackerResponse> {
        self.last_response.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The scheduled announce time has passed
    pub fn is_due(&self) -> bool {
        self.ctx.clock.now() >= self.next_announce
    }

    /// Initial announce. Always runs; failures leave the peer list empty.
    pub async fn start(&mut self) -> bool {
        let request = AnnounceRequest::started(
            self.torrent.info_hash,
            &self.identity.peer_id,
            &self.identity.key,
            self.identity.port,
            self.identity.uploaded,
            self.torrent.total_size(),
        );

        match self.announce(&request).await {
            Ok(response) => {
                self.peers = response.peers();
                self.last_announce = Some(self.ctx.clock.now());
                self.last_response = Some(response);
                self.last_error = None;
                info!("Started {} ({} peers)", self.name, self.peers.len());
                true
            }
            Err(e) => {
                warn!("Initial announce for {} failed: {}", self.name, e);
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Periodic announce, skipped until the scheduled time. Returns true
    /// only when an announce was made and succeeded.
    pub async fn tick(&mut self) -> bool {
        if !self.is_due() {
            return false;
        }
        self.update(false).await
    }

    /// Announce now regardless of schedule
    pub async fn force_update(&mut self) -> bool {
        self.update(true).await
    }

    /// Port used on the next announce
    pub fn set_port(&mut self, port: u16) {
        self.identity.port = port;
    }

    /// Snapshot for display
    pub fn status(&self) -> AnnouncerStatus {
        AnnouncerStatus {
            name: self.name.clone(),
            info_hash: self.torrent.info_hash_hex(),
            peer_id: self.identity.peer_id.clone(),
            key: self.identity.key.clone(),
            port: self.identity.port,
            downloaded: self.torrent.total_size(),
            uploaded: self.identity.uploaded,
            next_announce_in: self.next_announce.saturating_duration_since(self.ctx.clock.now()),
            peers: self.peers.clone(),
            last_error: self.last_error.clone(),
        }
    }

    async fn update(&mut self, force: bool) -> bool {
        let step = self.rng.gen_range(0..=self.ctx.upload_step_max);
        let uploaded = self.identity.uploaded.saturating_add(step);
        let request = AnnounceRequest::regular(
            self.torrent.info_hash,
            &self.identity.peer_id,
            &self.identity.key,
            self.identity.port,
            uploaded,
            self.torrent.total_size(),
        );

        let response = match self.announce(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Announce for {} failed, retrying next pass: {}", self.name, e);
                self.last_error = Some(e.to_string());
                return false;
            }
        };

        let changed = uploaded != self.identity.uploaded;
        self.identity.uploaded = uploaded;

        let peers = response.peers();
        if !peers.is_empty() {
            self.peers = peers;
        }

        let now = self.ctx.clock.now();
        self.last_announce = Some(now);
        self.next_announce = now + next_delay(&mut self.rng);
        self.last_response = Some(response);
        self.last_error = None;

        if changed || force {
            if let Err(e) = self.ctx.store.record_uploaded(&self.torrent.info_hash, uploaded).await {
                warn!("Upload counter for {} not persisted: {}", self.name, e);
            }
        }

        info!(
            "Announced {}: uploaded {}, next in {}",
            self.name,
            format_bytes(uploaded),
            format_duration(self.next_announce.saturating_duration_since(now))
        );
        true
    }

    async fn announce(&mut self, request: &AnnounceRequest) -> Result<TrackerResponse> {
        self.state = AnnounceState::Announcing;
        let result = self.send(request).await;
        self.state = AnnounceState::Idle;
        result
    }

    async fn send(&self, request: &AnnounceRequest) -> Result<TrackerResponse> {
        let url = request.url(&self.torrent.announce);
        let user_agent = self.ctx.settings.get().await.user_agent;
        debug!("Announcing {} as {}", self.name, user_agent);

        let body = match tokio::time::timeout(self.ctx.request_timeout, self.ctx.transport.get(&url, &user_agent)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(SeederError::network_failure_with_address(
                    format!("No tracker response within {}s", self.ctx.request_timeout.as_secs()),
                    self.torrent.announce.as_str(),
                ))
            }
        };

        let response = TrackerResponse::from_bytes(&body)?;
        if let Some(reason) = response.failure_reason() {
            return Err(SeederError::network_failure_with_address(
                format!("Tracker rejected announce: {}", reason),
                self.torrent.announce.as_str(),
            ));
        }
        if let Some(warning) = response.warning() {
            warn!("Tracker warning for {}: {}", self.name, warning);
        }
        Ok(response)
    }
}

fn next_delay(rng: &mut StdRng) -> Duration {
    Duration::from_secs(rng.gen_range(MIN_ANNOUNCE_DELAY..MAX_ANNOUNCE_DELAY))
}

/// What the dashboard shows for one torrent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncerStatus {
    pub name: String,
    pub info_hash: String,
    pub peer_id: String,
    pub key: String,
    pub port: u16,
    pub downloaded: u64,
    pub uploaded: u64,
    pub next_announce_in: Duration,
    pub peers: Vec<CompactPeer>,
    pub last_error: Option<String>,
}

impl fmt::Display for AnnouncerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "  Info hash:   {}", self.info_hash)?;
        writeln!(f, "  Peer ID:     {}", self.peer_id)?;
        writeln!(f, "  Key:         {}", self.key)?;
        writeln!(f, "  Port:        {}", self.port)?;
        writeln!(f, "  Downloaded:  {}", format_bytes(self.downloaded))?;
        writeln!(f, "  Uploaded:    {}", format_bytes(self.uploaded))?;
        writeln!(f, "  Next update: {}", format_duration(self.next_announce_in))?;
        if let Some(error) = &self.last_error {
            writeln!(f, "  Last error:  {}", error)?;
        }
        write!(f, "  Peers:       {}", self.peers.len())?;
        for peer in &self.peers {
            write!(f, "\n    {}", peer)?;
        }
        Ok(())
    }
}
