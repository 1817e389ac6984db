//! In-memory transport for exercising the connection lifecycle.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cloudhawk_transport::{
    DiscoveredDevice, Link, NotificationStream, Result, Transport, TransportError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

#[derive(Default)]
pub(crate) struct MockTransport {
    devices: Mutex<Vec<DiscoveredDevice>>,
    failures_left: AtomicUsize,
    connect_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    connect_delay: Mutex<Duration>,
    links: Mutex<Vec<Arc<MockLink>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connect_delay: Mutex::new(Duration::from_millis(1)),
            ..Self::default()
        })
    }

    pub fn add_device(&self, address: &str, name: Option<&str>) {
        self.devices.lock().push(DiscoveredDevice {
            address: address.to_string(),
            name: name.map(str::to_string),
            rssi: Some(-60),
        });
    }

    /// Make the next `count` connects fail.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        *self.connect_delay.lock() = delay;
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Highest number of connects observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn current_link(&self) -> Option<Arc<MockLink>> {
        self.links.lock().last().cloned()
    }

    /// Addresses of every successful connect, oldest first.
    pub fn connected_addresses(&self) -> Vec<String> {
        self.links
            .lock()
            .iter()
            .map(|link| link.address.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn scan(&self, _scan_time: Duration) -> Result<Vec<DiscoveredDevice>> {
        Ok(self.devices.lock().clone())
    }

    async fn connect(&self, address: &str) -> Result<Arc<dyn Link>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let delay = *self.connect_delay.lock();
        tokio::time::sleep(delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if failed {
            return Err(TransportError::Connect {
                address: address.to_string(),
                reason: "simulated failure".to_string(),
            });
        }

        let link = Arc::new(MockLink::new(address));
        self.links.lock().push(link.clone());
        let link: Arc<dyn Link> = link;
        Ok(link)
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

pub(crate) struct MockLink {
    address: String,
    alive: AtomicBool,
    writes: Mutex<Vec<Vec<u8>>>,
    notify: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl MockLink {
    fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            alive: AtomicBool::new(true),
            writes: Mutex::new(Vec::new()),
            notify: Mutex::new(None),
        }
    }

    /// Deliver a notification to the subscriber, if any.
    pub fn push(&self, raw: Vec<u8>) -> bool {
        match self.notify.lock().as_ref() {
            Some(tx) => tx.send(raw).is_ok(),
            None => false,
        }
    }

    /// Simulate the peripheral going away.
    pub fn drop_link(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.notify.lock().take();
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().clone()
    }
}

#[async_trait]
impl Link for MockLink {
    fn address(&self) -> &str {
        &self.address
    }

    async fn subscribe(&self) -> Result<NotificationStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.notify.lock() = Some(tx);
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|raw| (raw, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.notify.lock().take();
        Ok(())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if !self.is_alive() {
            return Err(TransportError::NotConnected);
        }
        self.writes.lock().push(data.to_vec());
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.is_alive()
    }

    async fn disconnect(&self) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.notify.lock().take();
        Ok(())
    }
}
