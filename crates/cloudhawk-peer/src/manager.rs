//! Connection lifecycle for a single mower.
//!
//! At most one connect attempt runs at a time; explicit connects, the
//! startup retry loop and the maintenance loop all queue on the same lock.
//! Background loops hold weak references and a cancellation token, and only
//! observe cancellation between awaited steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use cloudhawk_frame::{encode_command, CommandCode};
use cloudhawk_transport::{Link, Transport};
use parking_lot::Mutex;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MowerConfig;
use crate::error::{PeerError, Result};
use crate::info::DeviceInfo;
use crate::listener::NotificationListener;
use crate::signal::{UpdateReceiver, UpdateSignal};
use crate::state::ConnectionState;
use crate::store::ResponseStore;

/// Requests sent after every successful connect, in order.
pub const BOOTSTRAP_SEQUENCE: [CommandCode; 7] = [
    CommandCode::GetFirmware,
    CommandCode::GetSerial,
    CommandCode::GetBattery,
    CommandCode::GetSignal,
    CommandCode::GetTrimming,
    CommandCode::GetCutSchedule,
    CommandCode::GetFaultRecord,
];

/// Owns the link to one mower and keeps it alive.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    config: MowerConfig,
    store: ResponseStore,
    signal: UpdateSignal,
    state: watch::Sender<ConnectionState>,
    connect_lock: AsyncMutex<()>,
    link: Mutex<Option<Arc<dyn Link>>>,
    listener: Mutex<Option<NotificationListener>>,
    /// Cancelled when the current link is torn down.
    session: Mutex<Option<CancellationToken>>,
    last_address: Mutex<Option<String>>,
    /// Whether the link should be kept up.
    wanted: AtomicBool,
    /// Replaced on every disconnect so later connects start fresh.
    shutdown: Mutex<CancellationToken>,
    tasks: Mutex<Tasks>,
}

#[derive(Default)]
struct Tasks {
    maintenance: Option<JoinHandle<()>>,
    initial: Option<JoinHandle<()>>,
    bootstrap: Option<JoinHandle<()>>,
}

impl Tasks {
    fn drain(&mut self) -> Vec<JoinHandle<()>> {
        [
            self.maintenance.take(),
            self.initial.take(),
            self.bootstrap.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl ConnectionManager {
    pub fn new(transport: Arc<dyn Transport>, config: MowerConfig) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                store: ResponseStore::new(),
                signal: UpdateSignal::new(),
                state,
                connect_lock: AsyncMutex::new(()),
                link: Mutex::new(None),
                listener: Mutex::new(None),
                session: Mutex::new(None),
                last_address: Mutex::new(None),
                wanted: AtomicBool::new(false),
                shutdown: Mutex::new(CancellationToken::new()),
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    pub fn config(&self) -> &MowerConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &ResponseStore {
        &self.inner.store
    }

    pub fn transport_name(&self) -> &'static str {
        self.inner.transport.transport_name()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Fires after each stored response and each state transition.
    pub fn subscribe(&self) -> UpdateReceiver {
        self.inner.signal.subscribe()
    }

    /// Address of the most recent successful connect.
    pub fn last_address(&self) -> Option<String> {
        self.inner.last_address.lock().clone()
    }

    /// Decode the current store contents.
    pub fn snapshot(&self) -> DeviceInfo {
        DeviceInfo::from_store(&self.inner.store)
    }

    /// Connect once, without retry.
    ///
    /// Without `address`, the last connected address is reused; failing
    /// that, a scan picks the first device whose name contains
    /// [`MowerConfig::device_name`]. Returns immediately when already
    /// connected. A successful connect starts the maintenance loop and the
    /// bootstrap requests.
    pub async fn connect(&self, address: Option<&str>) -> Result<()> {
        self.inner.wanted.store(true, Ordering::SeqCst);
        let token = self.inner.shutdown_token();
        self.inner
            .open(address, ConnectionState::Connecting, &token)
            .await
    }

    /// Keep retrying the first connect in the background until it succeeds.
    pub fn spawn_initial_connect(&self, address: Option<String>) {
        self.inner.wanted.store(true, Ordering::SeqCst);
        let token = self.inner.shutdown_token();
        let mut tasks = self.inner.tasks.lock();
        if tasks
            .initial
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            debug!("initial connect loop already running");
            return;
        }
        tasks.initial = Some(tokio::spawn(initial_connect(
            Arc::downgrade(&self.inner),
            token,
            address,
        )));
    }

    /// Stop every background loop and release the link.
    ///
    /// In-flight connect attempts run to completion first; a link they
    /// produce is released here as well. Stored responses are kept.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.wanted.store(false, Ordering::SeqCst);
        let previous = std::mem::replace(&mut *inner.shutdown.lock(), CancellationToken::new());
        previous.cancel();

        let tasks = inner.tasks.lock().drain();
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "connection task failed");
            }
        }

        let _guard = inner.connect_lock.lock().await;
        inner.teardown().await;
        info!("disconnected from mower");
    }

    /// Whether the state is connected and the link confirms it.
    pub async fn is_connected(&self) -> bool {
        self.inner.link_alive().await
    }

    /// Encode and write a single command.
    pub async fn send(&self, command: CommandCode) -> Result<()> {
        self.inner.write(command, &[]).await
    }

    /// Encode and write a command carrying a payload.
    pub async fn send_with_payload(&self, command: CommandCode, payload: &[u8]) -> Result<()> {
        self.inner.write(command, payload).await
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.transport_name())
            .field("state", &self.state())
            .field("last_address", &self.last_address())
            .finish()
    }
}

impl Inner {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "connection state changed");
            self.signal.notify();
        }
    }

    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.lock().clone()
    }

    fn current_link(&self) -> Option<Arc<dyn Link>> {
        self.link.lock().clone()
    }

    async fn link_alive(&self) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        match self.current_link() {
            Some(link) => link.is_connected().await,
            None => false,
        }
    }

    /// Serialized connect attempt.
    async fn open(
        self: &Arc<Self>,
        requested: Option<&str>,
        via: ConnectionState,
        token: &CancellationToken,
    ) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        if token.is_cancelled() {
            return Err(PeerError::Shutdown);
        }
        if self.link_alive().await {
            debug!("already connected");
            return Ok(());
        }
        if self.current_link().is_some() {
            self.teardown().await;
        }

        self.set_state(via);
        let result = self.establish(requested, token).await;
        if let Err(err) = &result {
            debug!(error = %err, "connect attempt failed");
            self.set_state(ConnectionState::Disconnected);
        }
        result
    }

    async fn establish(
        self: &Arc<Self>,
        requested: Option<&str>,
        token: &CancellationToken,
    ) -> Result<()> {
        let address = self.resolve_address(requested).await?;
        if token.is_cancelled() {
            return Err(PeerError::Shutdown);
        }

        info!(
            address = %address,
            transport = self.transport.transport_name(),
            "connecting to mower"
        );
        let timeout = self.config.connect_timeout;
        let link = match tokio::time::timeout(timeout, self.transport.connect(&address)).await {
            Ok(result) => result?,
            Err(_) => return Err(PeerError::Timeout(timeout)),
        };
        if token.is_cancelled() {
            release(&link).await;
            return Err(PeerError::Shutdown);
        }

        let stream = match link.subscribe().await {
            Ok(stream) => stream,
            Err(err) => {
                release(&link).await;
                return Err(err.into());
            }
        };

        let session = token.child_token();
        let listener = NotificationListener::spawn(
            stream,
            self.store.clone(),
            self.signal.clone(),
            session.child_token(),
        );
        *self.listener.lock() = Some(listener);
        *self.link.lock() = Some(link);
        *self.session.lock() = Some(session.clone());
        *self.last_address.lock() = Some(address.clone());
        self.set_state(ConnectionState::Connected);
        info!(address = %address, "connected to mower");

        self.start_maintenance(token);
        self.start_bootstrap(session);
        Ok(())
    }

    async fn resolve_address(&self, requested: Option<&str>) -> Result<String> {
        if let Some(address) = requested {
            return Ok(address.to_string());
        }
        let remembered = self.last_address.lock().clone();
        if let Some(address) = remembered {
            return Ok(address);
        }

        let name = &self.config.device_name;
        info!(name = %name, scan_time = ?self.config.scan_time, "scanning for mower");
        let devices = self.transport.scan(self.config.scan_time).await?;
        let device = devices
            .into_iter()
            .find(|device| device.name_contains(name))
            .ok_or_else(|| PeerError::DeviceNotFound(name.clone()))?;
        info!(address = %device.address, name = ?device.name, rssi = ?device.rssi, "found mower");
        Ok(device.address)
    }

    /// Stop the listener and release the link. Caller holds `connect_lock`.
    async fn teardown(&self) {
        let session = self.session.lock().take();
        if let Some(session) = session {
            session.cancel();
        }

        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.stop().await;
        }

        let link = self.link.lock().take();
        if let Some(link) = link {
            if let Err(err) = link.unsubscribe().await {
                debug!(error = %err, "unsubscribe failed");
            }
            release(&link).await;
        }

        self.set_state(ConnectionState::Disconnected);
    }

    async fn write(&self, command: CommandCode, payload: &[u8]) -> Result<()> {
        let frame = encode_command(command, payload)?;
        if !self.state().is_connected() {
            return Err(PeerError::NotConnected);
        }
        let link = self.current_link().ok_or(PeerError::NotConnected)?;
        link.write(&frame).await?;
        debug!(command = %command, frame = %hex::encode(&frame), "sent command");
        Ok(())
    }

    fn start_maintenance(self: &Arc<Self>, token: &CancellationToken) {
        let mut tasks = self.tasks.lock();
        if tasks
            .maintenance
            .as_ref()
            .is_some_and(|task| !task.is_finished())
        {
            return;
        }
        tasks.maintenance = Some(tokio::spawn(maintain(Arc::downgrade(self), token.clone())));
        debug!("connection maintenance started");
    }

    fn start_bootstrap(self: &Arc<Self>, session: CancellationToken) {
        let task = tokio::spawn(bootstrap(Arc::downgrade(self), session));
        self.tasks.lock().bootstrap = Some(task);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.get_mut().cancel();
    }
}

async fn release(link: &Arc<dyn Link>) {
    if let Err(err) = link.disconnect().await {
        debug!(address = link.address(), error = %err, "link disconnect failed");
    }
}

/// Sleep unless cancelled first. Returns `false` on cancellation.
async fn pause(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn maintain(weak: Weak<Inner>, token: CancellationToken) {
    let Some(config) = weak.upgrade().map(|inner| inner.config.clone()) else {
        return;
    };
    let interval = config.maintenance_interval;
    let backoff = config.retry_backoff;

    while pause(&token, interval).await {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        if !inner.wanted.load(Ordering::SeqCst) || inner.state().is_connecting() {
            continue;
        }
        if inner.link_alive().await {
            continue;
        }

        warn!("mower link lost; reconnecting");
        match inner
            .open(None, ConnectionState::Reconnecting, &token)
            .await
        {
            Ok(()) => info!("mower reconnected"),
            Err(PeerError::Shutdown) => break,
            Err(err) => {
                warn!(error = %err, retry_in = ?backoff, "reconnect failed");
                drop(inner);
                if !pause(&token, backoff).await {
                    break;
                }
            }
        }
    }
    debug!("connection maintenance stopped");
}

async fn initial_connect(weak: Weak<Inner>, token: CancellationToken, address: Option<String>) {
    let Some(interval) = weak
        .upgrade()
        .map(|inner| inner.config.initial_retry_interval)
    else {
        return;
    };

    let mut attempt: u32 = 0;
    loop {
        let Some(inner) = weak.upgrade() else {
            break;
        };
        attempt += 1;
        match inner
            .open(address.as_deref(), ConnectionState::Connecting, &token)
            .await
        {
            Ok(()) => {
                info!(attempt, "initial connection established");
                break;
            }
            Err(PeerError::Shutdown) => break,
            Err(err) => {
                warn!(attempt, error = %err, retry_in = ?interval, "initial connection failed");
            }
        }
        drop(inner);
        if !pause(&token, interval).await {
            break;
        }
    }
}

async fn bootstrap(weak: Weak<Inner>, session: CancellationToken) {
    let Some(delay) = weak.upgrade().map(|inner| inner.config.bootstrap_delay) else {
        return;
    };

    info!("requesting device information");
    for (index, command) in BOOTSTRAP_SEQUENCE.into_iter().enumerate() {
        if index > 0 && !pause(&session, delay).await {
            return;
        }
        if session.is_cancelled() {
            return;
        }
        let Some(inner) = weak.upgrade() else {
            return;
        };
        if let Err(err) = inner.write(command, &[]).await {
            warn!(command = %command, error = %err, "bootstrap request failed");
        }
    }
    debug!("bootstrap requests sent");
}

#[cfg(test)]
mod tests {
    use cloudhawk_frame::ResponseKey;

    use super::*;
    use crate::mock::MockTransport;

    fn fast_config() -> MowerConfig {
        MowerConfig {
            scan_time: Duration::from_millis(10),
            connect_timeout: Duration::from_millis(500),
            bootstrap_delay: Duration::from_millis(5),
            maintenance_interval: Duration::from_millis(20),
            retry_backoff: Duration::from_millis(20),
            initial_retry_interval: Duration::from_millis(10),
            validation_settle: Duration::from_millis(100),
            ..MowerConfig::default()
        }
    }

    fn manager(mock: &Arc<MockTransport>) -> ConnectionManager {
        ConnectionManager::new(mock.clone(), fast_config())
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition should hold within timeout");
    }

    #[tokio::test]
    async fn connect_sends_bootstrap_requests_in_order() {
        let mock = MockTransport::new();
        let manager = manager(&mock);

        manager.connect(Some("AA:BB")).await.expect("connect");
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(manager.is_connected().await);
        assert_eq!(manager.last_address().as_deref(), Some("AA:BB"));

        let link = mock.current_link().expect("link");
        eventually(|| link.writes().len() == BOOTSTRAP_SEQUENCE.len()).await;
        let expected: Vec<Vec<u8>> = BOOTSTRAP_SEQUENCE
            .iter()
            .map(|command| encode_command(*command, &[]).unwrap().to_vec())
            .collect();
        assert_eq!(link.writes(), expected);

        manager.disconnect().await;
    }

    #[tokio::test]
    async fn connect_without_address_scans_by_name() {
        let mock = MockTransport::new();
        mock.add_device("11:11", Some("Speaker"));
        mock.add_device("22:22", Some("SN-CloudHawk"));
        let manager = manager(&mock);

        manager.connect(None).await.expect("connect");
        assert_eq!(mock.connected_addresses(), vec!["22:22".to_string()]);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn connect_fails_when_no_device_matches() {
        let mock = MockTransport::new();
        mock.add_device("11:11", Some("Speaker"));
        mock.add_device("33:33", None);
        let manager = manager(&mock);

        let err = manager.connect(None).await.unwrap_err();
        assert!(
            matches!(err, PeerError::DeviceNotFound(name) if name == "SN")
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(mock.connect_calls(), 0);
    }

    #[tokio::test]
    async fn connect_times_out() {
        let mock = MockTransport::new();
        mock.set_connect_delay(Duration::from_millis(200));
        let config = MowerConfig {
            connect_timeout: Duration::from_millis(20),
            ..fast_config()
        };
        let manager = ConnectionManager::new(mock.clone(), config);

        let err = manager.connect(Some("AA")).await.unwrap_err();
        assert!(matches!(err, PeerError::Timeout(_)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn concurrent_connects_share_one_attempt() {
        let mock = MockTransport::new();
        mock.set_connect_delay(Duration::from_millis(20));
        let manager = manager(&mock);

        let (first, second) = tokio::join!(
            manager.connect(Some("AA")),
            manager.connect(Some("AA"))
        );
        first.expect("first connect");
        second.expect("second connect");
        assert_eq!(mock.connect_calls(), 1);
        assert_eq!(mock.max_in_flight(), 1);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn initial_connect_retries_until_success() {
        let mock = MockTransport::new();
        mock.fail_next(3);
        let manager = manager(&mock);

        manager.spawn_initial_connect(Some("AA".to_string()));
        eventually(|| manager.state() == ConnectionState::Connected).await;

        assert_eq!(mock.connect_calls(), 4);
        assert_eq!(mock.max_in_flight(), 1);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn maintenance_reconnects_after_link_loss() {
        let mock = MockTransport::new();
        let manager = manager(&mock);
        manager.connect(Some("AA")).await.expect("connect");

        let first = mock.current_link().expect("first link");
        first.drop_link();

        eventually(|| {
            mock.connect_calls() == 2 && manager.state() == ConnectionState::Connected
        })
        .await;
        assert!(manager.is_connected().await);
        assert_eq!(
            mock.connected_addresses(),
            vec!["AA".to_string(), "AA".to_string()]
        );
        assert_eq!(mock.max_in_flight(), 1);
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn maintenance_retries_failed_reconnects() {
        let mock = MockTransport::new();
        let manager = manager(&mock);
        manager.connect(Some("AA")).await.expect("connect");
        let first = mock.current_link().expect("first link");
        eventually(|| first.writes().len() == BOOTSTRAP_SEQUENCE.len()).await;

        mock.fail_next(3);
        first.drop_link();

        eventually(|| {
            mock.connect_calls() == 5 && manager.state() == ConnectionState::Connected
        })
        .await;
        assert!(manager.is_connected().await);
        assert_eq!(mock.max_in_flight(), 1);
        assert_eq!(mock.connected_addresses().len(), 2);

        let second = mock.current_link().expect("second link");
        eventually(|| second.writes().len() == BOOTSTRAP_SEQUENCE.len()).await;
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn disconnect_during_connect_releases_new_link() {
        let mock = MockTransport::new();
        mock.set_connect_delay(Duration::from_millis(100));
        let manager = manager(&mock);

        manager.spawn_initial_connect(Some("AA".to_string()));
        eventually(|| mock.connect_calls() == 1).await;
        manager.disconnect().await;

        let link = mock.current_link().expect("connect completed");
        assert!(!link.is_alive());
        assert!(link.writes().is_empty());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected().await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test]
    async fn disconnect_stops_background_loops() {
        let mock = MockTransport::new();
        mock.fail_next(usize::MAX);
        let manager = manager(&mock);

        manager.spawn_initial_connect(Some("AA".to_string()));
        eventually(|| mock.connect_calls() >= 2).await;
        manager.disconnect().await;

        let calls = mock.connect_calls();
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(mock.connect_calls(), calls);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_releases_link_and_keeps_store() {
        let mock = MockTransport::new();
        let manager = manager(&mock);
        manager.connect(Some("AA")).await.expect("connect");
        let link = mock.current_link().expect("link");

        let mut updates = manager.subscribe();
        assert!(link.push(vec![0x55, 0xaa, 0x03, 0x80, 0x81, 0x38]));
        eventually(|| manager.store().contains(ResponseKey::STATUS)).await;
        assert!(updates.has_changed());

        manager.disconnect().await;
        assert!(!link.is_alive());
        assert!(!manager.is_connected().await);
        assert!(manager.store().contains(ResponseKey::STATUS));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(mock.connect_calls(), 1);
    }

    #[tokio::test]
    async fn reconnect_after_disconnect_uses_fresh_loops() {
        let mock = MockTransport::new();
        let manager = manager(&mock);
        manager.connect(Some("AA")).await.expect("connect");
        manager.disconnect().await;

        manager
            .connect(None)
            .await
            .expect("reconnect to remembered address");
        assert_eq!(
            mock.connected_addresses(),
            vec!["AA".to_string(), "AA".to_string()]
        );

        mock.current_link().expect("link").drop_link();
        eventually(|| mock.connect_calls() == 3).await;
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn send_requires_connection() {
        let mock = MockTransport::new();
        let manager = manager(&mock);

        let err = manager.send(CommandCode::Start).await.unwrap_err();
        assert!(matches!(err, PeerError::NotConnected));

        manager.connect(Some("AA")).await.expect("connect");
        manager.send(CommandCode::Start).await.expect("send");
        let link = mock.current_link().expect("link");
        let start = vec![0x55, 0xaa, 0x02, 0x80, 0x05, 0x86];
        assert!(link.writes().contains(&start));
        manager.disconnect().await;
    }

    #[tokio::test]
    async fn state_transitions_fire_updates() {
        let mock = MockTransport::new();
        let manager = manager(&mock);
        let mut states = manager.watch_state();

        manager.connect(Some("AA")).await.expect("connect");
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);

        manager.disconnect().await;
        assert_eq!(*states.borrow_and_update(), ConnectionState::Disconnected);
    }
}
