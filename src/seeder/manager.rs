//! Seeder manager
//!
//! Owns the set of loaded torrents and drives their announce schedule.
//! Operator actions (reload, force update, remove, settings changes) go
//! through here.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::cli::display::format_bytes;
use crate::cli::settings::ClientSettings;
use crate::error::{Result, SeederError};
use crate::seeder::activity::{ActivityEntry, ActivityLog};
use crate::torrent::{TorrentInfo, TorrentParser};
use crate::tracker::{AnnounceContext, Announcer, AnnouncerStatus};

/// Extension of the metadata files picked up by [`SeederManager::reload`]
pub const TORRENT_EXTENSION: &str = "torrent";

/// One loaded torrent as shown to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSummary {
    pub file_name: String,
    pub torrent_name: String,
    pub announce: String,
    pub total_size: u64,
    pub piece_count: usize,
    pub status: AnnouncerStatus,
}

impl fmt::Display for ResourceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ({}, {} pieces) -> {}",
            self.torrent_name,
            format_bytes(self.total_size),
            self.piece_count,
            self.announce
        )?;
        write!(f, "{}", self.status)
    }
}

/// One loaded torrent. The announcer lock is held across tracker requests,
/// so readers go through the last published status instead.
struct Slot {
    name: String,
    path: PathBuf,
    torrent: Arc<TorrentInfo>,
    announcer: Mutex<Announcer>,
    published: watch::Sender<Published>,
}

#[derive(Debug, Clone)]
struct Published {
    status: AnnouncerStatus,
    next_announce: Instant,
}

impl Published {
    fn of(announcer: &Announcer) -> Self {
        Self {
            status: announcer.status(),
            next_announce: announcer.next_announce(),
        }
    }
}

impl Slot {
    fn new(torrent: Arc<TorrentInfo>, announcer: Announcer) -> Self {
        let (published, _) = watch::channel(Published::of(&announcer));
        Self {
            name: announcer.name().to_string(),
            path: announcer.path().to_path_buf(),
            torrent,
            announcer: Mutex::new(announcer),
            published,
        }
    }

    fn publish(&self, announcer: &Announcer) {
        self.published.send_replace(Published::of(announcer));
    }

    /// Last published status with the countdown taken at `now`
    fn status(&self, now: Instant) -> AnnouncerStatus {
        let published = self.published.borrow();
        let mut status = published.status.clone();
        status.next_announce_in = published.next_announce.saturating_duration_since(now);
        status
    }
}

/// Loaded torrents and the control loop over them
pub struct SeederManager {
    ctx: Arc<AnnounceContext>,
    settings_file: PathBuf,
    tick_interval: Duration,
    announcers: RwLock<Vec<Arc<Slot>>>,
    activity: Arc<ActivityLog>,
    rng: std::sync::Mutex<StdRng>,
}

impl SeederManager {
    pub fn new(ctx: Arc<AnnounceContext>, settings_file: impl Into<PathBuf>, tick_interval: Duration, rng: StdRng) -> Self {
        Self {
            ctx,
            settings_file: settings_file.into(),
            tick_interval,
            announcers: RwLock::new(Vec::new()),
            activity: Arc::new(ActivityLog::new()),
            rng: std::sync::Mutex::new(rng),
        }
    }

    /// Load every `.torrent` file in `dir`, start an announcer for each and
    /// replace the active set. Files that fail to parse are skipped.
    pub async fn reload(&self, dir: &Path) -> Result<usize> {
        let paths = torrent_files(dir).await?;
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        for path in paths {
            let name = file_name(&path);
            let torrent = match TorrentParser::parse_file(&path) {
                Ok(torrent) => torrent,
                Err(e) => {
                    self.activity.error(format!("Skipping {}: {}", name, e));
                    continue;
                }
            };

            if !seen.insert(torrent.info_hash) {
                self.activity
                    .warning(format!("Skipping {}: same content as an already loaded torrent", name));
                continue;
            }

            let ctx = self.ctx.clone();
            let rng = self.next_rng();
            let torrent = Arc::new(torrent);
            tasks.spawn(async move {
                let mut announcer = Announcer::new(name, path, torrent.clone(), ctx, rng).await;
                announcer.start().await;
                Slot::new(torrent, announcer)
            });
        }

        let mut loaded = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(slot) => loaded.push(slot),
                Err(e) => self.activity.error(format!("Announcer task failed: {}", e)),
            }
        }
        loaded.sort_by(|a, b| a.name.cmp(&b.name));

        for slot in &loaded {
            let published = slot.published.borrow();
            match &published.status.last_error {
                None => self.activity.info(format!(
                    "Loaded {} ({} peers)",
                    slot.name,
                    published.status.peers.len()
                )),
                Some(e) => self
                    .activity
                    .warning(format!("Loaded {}, initial announce failed: {}", slot.name, e)),
            }
        }

        let count = loaded.len();
        *self.announcers.write().await = loaded.into_iter().map(Arc::new).collect();
        self.activity
            .info(format!("Seeding {} torrent(s) from {}", count, dir.display()));
        Ok(count)
    }

    /// Number of loaded torrents
    pub async fn len(&self) -> usize {
        self.announcers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.announcers.read().await.is_empty()
    }

    /// Summary of every loaded torrent, sorted by file name. Does not wait
    /// for announces in flight.
    pub async fn list(&self) -> Vec<ResourceSummary> {
        let now = self.ctx.clock.now();
        self.snapshot()
            .await
            .iter()
            .map(|slot| summarize(&slot.torrent, slot.status(now)))
            .collect()
    }

    /// Announce one torrent now
    pub async fn force_update(&self, name: &str) -> Result<bool> {
        let slot = self.find(name).await?;
        Ok(self.announce_now(&slot).await)
    }

    /// Announce every torrent now. Returns the number that succeeded.
    pub async fn force_update_all(&self) -> usize {
        let mut succeeded = 0;
        for slot in self.snapshot().await {
            if self.announce_now(&slot).await {
                succeeded += 1;
            }
        }
        succeeded
    }

    /// Forget a torrent: delete its file, drop its stored identity and stop
    /// announcing it. The identity is only dropped once the file is gone.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let slot = self.find(name).await?;
        let path = &slot.path;

        // Identity of the bytes on disk, or of the loaded content when the
        // file can no longer be read
        let info_hash = TorrentParser::content_identity_of_file(path).unwrap_or_else(|e| {
            debug!("Using loaded info hash for {}: {}", path.display(), e);
            slot.torrent.info_hash
        });

        if let Err(e) = tokio::fs::remove_file(path).await {
            return Err(SeederError::persistence_failure_full(
                "Failed to delete torrent file",
                path.display().to_string(),
                e.to_string(),
            ));
        }

        if !self.ctx.store.remove(&info_hash).await {
            debug!("No stored identity for {}", path.display());
        }

        self.announcers.write().await.retain(|s| !Arc::ptr_eq(s, &slot));
        self.activity.info(format!("Removed {}", name));
        Ok(())
    }

    /// Current client settings
    pub async fn settings(&self) -> ClientSettings {
        self.ctx.settings.get().await
    }

    /// Change the user agent presented to trackers
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<ClientSettings> {
        let user_agent = user_agent.trim().to_string();
        let settings = self.ctx.settings.update(|s| s.user_agent = user_agent).await?;
        self.save_settings(&settings).await;
        self.activity.info(format!("User agent set to {}", settings.user_agent));
        Ok(settings)
    }

    /// Change the port reported to trackers, for every torrent
    pub async fn set_port(&self, port: u16) -> Result<ClientSettings> {
        let settings = self.ctx.settings.update(|s| s.port = port).await?;

        if let Err(e) = self.ctx.store.set_port(port).await {
            self.activity.warning(format!("Port change not persisted: {}", e));
        }
        for slot in self.snapshot().await {
            let mut announcer = slot.announcer.lock().await;
            announcer.set_port(port);
            slot.publish(&announcer);
        }

        self.save_settings(&settings).await;
        self.activity.info(format!("Port set to {}", port));
        Ok(settings)
    }

    /// Recent operator-visible events, oldest first
    pub fn activity(&self) -> Vec<ActivityEntry> {
        self.activity.entries()
    }

    /// Give every due torrent its periodic announce. Stops early once
    /// `shutdown` is set. Returns the number of successful announces.
    pub async fn tick_all(&self, shutdown: &watch::Receiver<bool>) -> usize {
        let mut succeeded = 0;
        for slot in self.snapshot().await {
            if *shutdown.borrow() {
                break;
            }
            let mut announcer = slot.announcer.lock().await;
            if !announcer.is_due() {
                continue;
            }
            let ok = announcer.tick().await;
            slot.publish(&announcer);
            self.report(&announcer, ok, "Announce");
            if ok {
                succeeded += 1;
            }
        }
        succeeded
    }

    /// Control loop: tick every torrent each interval until `shutdown` flips
    /// or its sender goes away
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting announce loop (interval: {}s)", self.tick_interval.as_secs());

        loop {
            if *shutdown.borrow() {
                break;
            }

            let announced = self.tick_all(&shutdown).await;
            if announced > 0 {
                debug!("{} announce(s) this pass", announced);
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        info!("Announce loop stopped");
    }

    async fn snapshot(&self) -> Vec<Arc<Slot>> {
        self.announcers.read().await.clone()
    }

    async fn find(&self, name: &str) -> Result<Arc<Slot>> {
        self.announcers
            .read()
            .await
            .iter()
            .find(|slot| slot.name == name)
            .cloned()
            .ok_or_else(|| SeederError::config_error_with_field(format!("No torrent named {}", name), "name"))
    }

    async fn announce_now(&self, slot: &Slot) -> bool {
        let mut announcer = slot.announcer.lock().await;
        let ok = announcer.force_update().await;
        slot.publish(&announcer);
        self.report(&announcer, ok, "Forced update");
        ok
    }

    fn report(&self, announcer: &Announcer, ok: bool, action: &str) {
        if ok {
            self.activity.info(format!(
                "{} {}: uploaded {}",
                action,
                announcer.name(),
                format_bytes(announcer.identity().uploaded)
            ));
        } else {
            self.activity.warning(format!(
                "{} {} failed: {}",
                action,
                announcer.name(),
                announcer.last_error().unwrap_or("unknown error")
            ));
        }
    }

    async fn save_settings(&self, settings: &ClientSettings) {
        if let Err(e) = settings.save(&self.settings_file).await {
            self.activity.warning(format!("Settings not saved: {}", e));
        }
    }

    fn next_rng(&self) -> StdRng {
        let seed = match self.rng.lock() {
            Ok(mut rng) => rng.gen(),
            Err(poisoned) => poisoned.into_inner().gen(),
        };
        StdRng::seed_from_u64(seed)
    }
}

fn summarize(torrent: &TorrentInfo, status: AnnouncerStatus) -> ResourceSummary {
    ResourceSummary {
        file_name: status.name.clone(),
        torrent_name: torrent.name.clone(),
        announce: torrent.announce.clone(),
        total_size: torrent.total_size(),
        piece_count: torrent.piece_count(),
        status,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// `.torrent` files directly inside `dir`, sorted
async fn torrent_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
        SeederError::persistence_failure_full("Failed to read torrent directory", dir.display().to_string(), e.to_string())
    })?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_torrent = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(TORRENT_EXTENSION))
            .unwrap_or(false);
        if is_torrent && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use tokio::sync::Notify;

    use crate::bencode::{self, BencodeValue};
    use crate::cli::settings::SettingsHandle;
    use crate::identity::{IdentityStore, MemoryBackend};
    use crate::torrent::fixtures::{multi_file_torrent, single_file_torrent};
    use crate::tracker::{ManualClock, TrackerTransport};

    const LOCALHOST_PEER: [u8; 6] = [0x7F, 0x00, 0x00, 0x01, 0x1A, 0xE1];

    #[derive(Default)]
    struct StubTracker {
        calls: AtomicUsize,
        // While set, each request waits for `release`
        held: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl TrackerTransport for StubTracker {
        async fn get(&self, _url: &str, _user_agent: &str) -> Result<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.held.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            let body = bencode::encode(&BencodeValue::dict([
                ("interval", BencodeValue::Int(1800)),
                ("peers", BencodeValue::from(&LOCALHOST_PEER[..])),
            ]));
            Ok(Bytes::from(body))
        }
    }

    struct Harness {
        manager: Arc<SeederManager>,
        tracker: Arc<StubTracker>,
        clock: Arc<ManualClock>,
        store: Arc<IdentityStore>,
        dir: PathBuf,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    async fn harness(tag: &str) -> Harness {
        let dir = std::env::temp_dir().join(format!("rts-manager-{}-{}", tag, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        std::fs::write(dir.join("b.torrent"), single_file_torrent("http://tracker.example/announce", 1000)).unwrap();
        std::fs::write(dir.join("a.torrent"), multi_file_torrent("http://tracker.example/announce", &[10, 20])).unwrap();
        std::fs::write(dir.join("broken.torrent"), b"this is not bencode").unwrap();
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let tracker = Arc::new(StubTracker::default());
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(IdentityStore::open_with_rng(Arc::new(MemoryBackend::new()), 6881, StdRng::seed_from_u64(1)).await);
        let ctx = Arc::new(AnnounceContext {
            store: store.clone(),
            transport: tracker.clone(),
            settings: SettingsHandle::new(ClientSettings::default()),
            clock: clock.clone(),
            request_timeout: Duration::from_secs(5),
            upload_step_max: 1024,
        });
        let manager = Arc::new(SeederManager::new(
            ctx,
            dir.join("config.json"),
            Duration::from_millis(10),
            StdRng::seed_from_u64(3),
        ));

        Harness {
            manager,
            tracker,
            clock,
            store,
            dir,
        }
    }

    #[tokio::test]
    async fn test_reload_skips_broken_files() {
        let h = harness("reload").await;

        assert_eq!(h.manager.reload(&h.dir).await.unwrap(), 2);
        assert_eq!(h.tracker.calls.load(Ordering::SeqCst), 2);

        let list = h.manager.list().await;
        assert_eq!(list[0].file_name, "a.torrent");
        assert_eq!(list[0].total_size, 30);
        assert_eq!(list[1].file_name, "b.torrent");
        assert_eq!(list[1].total_size, 1000);
        assert!(list.iter().all(|r| r.status.peers.len() == 1));
        assert_eq!(h.store.snapshot().await.len(), 2);

        assert!(h
            .manager
            .activity()
            .iter()
            .any(|e| e.message.starts_with("Skipping broken.torrent")));
    }

    #[tokio::test]
    async fn test_reload_missing_directory() {
        let h = harness("missing").await;
        let err = h.manager.reload(&h.dir.join("nope")).await.unwrap_err();
        assert!(matches!(err, SeederError::PersistenceFailure { .. }));
    }

    #[tokio::test]
    async fn test_force_update() {
        let h = harness("force").await;
        h.manager.reload(&h.dir).await.unwrap();

        assert!(h.manager.force_update("b.torrent").await.unwrap());
        assert_eq!(h.tracker.calls.load(Ordering::SeqCst), 3);
        assert!(h.manager.force_update("missing.torrent").await.is_err());

        assert_eq!(h.manager.force_update_all().await, 2);
        assert_eq!(h.tracker.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_tick_all_only_announces_due_torrents() {
        let h = harness("tick").await;
        h.manager.reload(&h.dir).await.unwrap();
        let (_tx, rx) = watch::channel(false);

        assert_eq!(h.manager.tick_all(&rx).await, 0);
        assert_eq!(h.tracker.calls.load(Ordering::SeqCst), 2);

        h.clock.advance(Duration::from_secs(7200));
        assert_eq!(h.manager.tick_all(&rx).await, 2);
        assert_eq!(h.tracker.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_list_does_not_wait_for_announce_in_flight() {
        let h = harness("in-flight").await;
        h.manager.reload(&h.dir).await.unwrap();
        h.clock.advance(Duration::from_secs(7200));
        h.tracker.held.store(true, Ordering::SeqCst);

        let manager = h.manager.clone();
        let ticking = tokio::spawn(async move {
            let (_tx, rx) = watch::channel(false);
            manager.tick_all(&rx).await
        });
        h.tracker.entered.notified().await;

        let list = tokio::time::timeout(Duration::from_secs(1), h.manager.list()).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].status.next_announce_in, Duration::ZERO);
        let missing = tokio::time::timeout(Duration::from_secs(1), h.manager.force_update("missing.torrent"))
            .await
            .unwrap();
        assert!(missing.is_err());

        h.tracker.held.store(false, Ordering::SeqCst);
        h.tracker.release.notify_one();
        assert_eq!(ticking.await.unwrap(), 2);

        let list = h.manager.list().await;
        assert!(list.iter().all(|r| r.status.next_announce_in >= Duration::from_secs(3600)));
    }

    #[tokio::test]
    async fn test_remove_deletes_file_and_identity() {
        let h = harness("remove").await;
        h.manager.reload(&h.dir).await.unwrap();

        h.manager.remove("b.torrent").await.unwrap();

        assert!(!h.dir.join("b.torrent").exists());
        assert_eq!(h.manager.len().await, 1);
        assert_eq!(h.store.snapshot().await.len(), 1);
        assert!(h.manager.remove("b.torrent").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_keeps_identity_when_file_cannot_be_deleted() {
        let h = harness("remove-fail").await;
        h.manager.reload(&h.dir).await.unwrap();

        // A directory in place of the file makes the delete fail
        let path = h.dir.join("b.torrent");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = h.manager.remove("b.torrent").await.unwrap_err();
        assert!(matches!(err, SeederError::PersistenceFailure { .. }));
        assert_eq!(h.manager.len().await, 2);
        assert_eq!(h.store.snapshot().await.len(), 2);
        assert!(h.manager.force_update("b.torrent").await.unwrap());
    }

    #[tokio::test]
    async fn test_settings_changes() {
        let h = harness("settings").await;
        h.manager.reload(&h.dir).await.unwrap();

        h.manager.set_user_agent("Transmission/3.00").await.unwrap();
        let settings = h.manager.set_port(51413).await.unwrap();
        assert_eq!(settings.user_agent, "Transmission/3.00");
        assert_eq!(settings.port, 51413);

        assert!(h.manager.list().await.iter().all(|r| r.status.port == 51413));
        assert!(h.store.snapshot().await.values().all(|i| i.port == 51413));
        assert_eq!(ClientSettings::load(&h.dir.join("config.json")).await, settings);

        assert!(h.manager.set_port(80).await.is_err());
        assert!(h.manager.set_user_agent("   ").await.is_err());
        assert_eq!(h.manager.settings().await, settings);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let h = harness("run").await;
        h.manager.reload(&h.dir).await.unwrap();
        let (tx, rx) = watch::channel(false);

        let manager = h.manager.clone();
        let handle = tokio::spawn(async move { manager.run(rx).await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
