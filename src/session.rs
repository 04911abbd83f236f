//! Receiver session: one open transport connection plus its tally link.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    capture::Captured,
    transport::{ConnectionDescriptor, ReceiverHandle, Tally, Transport, HW_ACCEL_METADATA},
    Result,
};

struct LinkState<R> {
    tally: Tally,
    receiver: Option<Arc<R>>,
}

/// Cached tally state shared between the controller and the open session.
///
/// The cache is updated whether or not a receiver is open; an open receiver
/// gets every change immediately and the full state when it attaches.
/// Pushes and detaching share one lock, so no push can reach a receiver
/// that is being closed.
pub struct TallyLink<R> {
    state: Mutex<LinkState<R>>,
}

impl<R: ReceiverHandle> TallyLink<R> {
    pub fn new(initial: Tally) -> Self {
        Self {
            state: Mutex::new(LinkState {
                tally: initial,
                receiver: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinkState<R>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The cached tally.
    pub fn tally(&self) -> Tally {
        self.lock().tally
    }

    /// Whether a receiver is currently attached.
    pub fn is_attached(&self) -> bool {
        self.lock().receiver.is_some()
    }

    /// Updates `on_preview`. Returns whether the change reached a receiver.
    pub fn set_preview(&self, on_preview: bool) -> bool {
        self.update(|tally| tally.on_preview = on_preview)
    }

    /// Updates `on_program`. Returns whether the change reached a receiver.
    pub fn set_program(&self, on_program: bool) -> bool {
        self.update(|tally| tally.on_program = on_program)
    }

    /// Replaces the whole state. Returns whether it reached a receiver.
    pub fn set(&self, tally: Tally) -> bool {
        self.update(|cached| *cached = tally)
    }

    fn update(&self, apply: impl FnOnce(&mut Tally)) -> bool {
        let mut state = self.lock();
        apply(&mut state.tally);
        let tally = state.tally;
        match &state.receiver {
            Some(receiver) => {
                if !receiver.set_tally(&tally) {
                    debug!(?tally, "transport did not accept tally");
                }
                true
            }
            None => false,
        }
    }

    fn attach(&self, receiver: Arc<R>) {
        let mut state = self.lock();
        let tally = state.tally;
        receiver.set_tally(&tally);
        state.receiver = Some(receiver);
    }

    fn detach(&self) -> Option<Arc<R>> {
        self.lock().receiver.take()
    }
}

impl<R> fmt::Debug for TallyLink<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("TallyLink")
            .field("tally", &state.tally)
            .field("attached", &state.receiver.is_some())
            .finish()
    }
}

/// Owns exactly one transport connection for one worker run.
///
/// Dropping the session detaches it from the tally link and destroys the
/// connection. It must only be dropped once no capture is in flight, which
/// the borrow on [`ReceiverSession::capture`]'s guards enforces.
pub struct ReceiverSession<R: ReceiverHandle> {
    receiver: Arc<R>,
    link: Arc<TallyLink<R>>,
    source_name: String,
}

impl<R: ReceiverHandle> ReceiverSession<R> {
    /// Opens a connection and pushes the cached tally to it.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if the handle cannot be created.
    pub fn open<T>(
        transport: &T,
        descriptor: &ConnectionDescriptor,
        link: Arc<TallyLink<R>>,
    ) -> Result<Self>
    where
        T: Transport<Receiver = R> + ?Sized,
    {
        let receiver = Arc::new(transport.create_receiver(descriptor)?);
        link.attach(Arc::clone(&receiver));
        info!(
            source = %descriptor.source_name,
            bandwidth = ?descriptor.bandwidth,
            "receiver opened"
        );
        Ok(Self {
            receiver,
            link,
            source_name: descriptor.source_name.clone(),
        })
    }

    /// Requests accelerated decoding when `enabled`. Best effort.
    pub fn configure_hardware_accel(&self, enabled: bool) {
        if enabled && !self.receiver.send_metadata(HW_ACCEL_METADATA) {
            warn!(source = %self.source_name, "hardware acceleration request was not accepted");
        }
    }

    /// Stores `tally` and pushes it to the connection.
    pub fn sync_tally(&self, tally: Tally) {
        self.link.set(tally);
    }

    /// Waits up to `timeout` for the next frame or event.
    pub fn capture(&self, timeout: Duration) -> Captured<'_, R> {
        let raw = self.receiver.capture(timeout);
        // SAFETY: raw is the result of this capture call and is wrapped once
        unsafe { Captured::wrap(&*self.receiver, raw) }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Destroys the connection.
    pub fn close(self) {
        drop(self);
    }
}

impl<R: ReceiverHandle> Drop for ReceiverSession<R> {
    fn drop(&mut self) {
        self.link.detach();
        debug!(source = %self.source_name, "receiver closed");
    }
}

impl<R: ReceiverHandle> fmt::Debug for ReceiverSession<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverSession")
            .field("source_name", &self.source_name)
            .field("link", &self.link)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frames::{AudioFrameRef, MetadataFrameRef, RawCapture, VideoFrameRef},
        Error,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubReceiver {
        tallies: Mutex<Vec<Tally>>,
        metadata: Mutex<Vec<String>>,
        destroyed: Arc<AtomicBool>,
    }

    impl Drop for StubReceiver {
        fn drop(&mut self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    impl ReceiverHandle for StubReceiver {
        fn send_metadata(&self, metadata: &str) -> bool {
            self.metadata.lock().unwrap().push(metadata.to_owned());
            true
        }
        fn set_tally(&self, tally: &Tally) -> bool {
            self.tallies.lock().unwrap().push(*tally);
            true
        }
        fn capture(&self, _timeout: Duration) -> RawCapture {
            RawCapture::None
        }
        unsafe fn free_video(&self, _frame: &VideoFrameRef) {}
        unsafe fn free_audio(&self, _frame: &AudioFrameRef) {}
        unsafe fn free_metadata(&self, _frame: &MetadataFrameRef) {}
    }

    struct StubTransport {
        fail: bool,
        destroyed: Arc<AtomicBool>,
    }

    impl Transport for StubTransport {
        type Receiver = StubReceiver;

        fn create_receiver(&self, _descriptor: &ConnectionDescriptor) -> Result<StubReceiver> {
            if self.fail {
                return Err(Error::NullPointer("create_receiver".into()));
            }
            Ok(StubReceiver {
                tallies: Mutex::new(Vec::new()),
                metadata: Mutex::new(Vec::new()),
                destroyed: Arc::clone(&self.destroyed),
            })
        }
    }

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::builder("CAM1").build().unwrap()
    }

    #[test]
    fn test_tally_cached_without_receiver() {
        let link: TallyLink<StubReceiver> = TallyLink::new(Tally::default());
        assert!(!link.set_preview(true));
        assert!(!link.set_program(true));
        assert_eq!(link.tally(), Tally::new(true, true));
        assert!(!link.is_attached());
    }

    #[test]
    fn test_open_pushes_cached_tally() {
        let transport = StubTransport {
            fail: false,
            destroyed: Arc::new(AtomicBool::new(false)),
        };
        let link = Arc::new(TallyLink::new(Tally::default()));
        link.set_preview(true);

        let session = ReceiverSession::open(&transport, &descriptor(), Arc::clone(&link)).unwrap();
        assert!(link.is_attached());
        assert_eq!(
            *session.receiver.tallies.lock().unwrap(),
            vec![Tally::new(false, true)]
        );

        assert!(link.set_program(true));
        assert_eq!(
            session.receiver.tallies.lock().unwrap().last(),
            Some(&Tally::new(true, true))
        );
    }

    #[test]
    fn test_sync_tally_replaces_state() {
        let transport = StubTransport {
            fail: false,
            destroyed: Arc::new(AtomicBool::new(false)),
        };
        let link = Arc::new(TallyLink::new(Tally::new(true, true)));
        let session = ReceiverSession::open(&transport, &descriptor(), Arc::clone(&link)).unwrap();

        session.sync_tally(Tally::new(false, true));
        assert_eq!(link.tally(), Tally::new(false, true));
        assert_eq!(
            *session.receiver.tallies.lock().unwrap(),
            vec![Tally::new(true, true), Tally::new(false, true)]
        );
    }

    #[test]
    fn test_hw_accel_only_when_enabled() {
        let transport = StubTransport {
            fail: false,
            destroyed: Arc::new(AtomicBool::new(false)),
        };
        let link = Arc::new(TallyLink::new(Tally::default()));
        let session = ReceiverSession::open(&transport, &descriptor(), link).unwrap();

        session.configure_hardware_accel(false);
        assert!(session.receiver.metadata.lock().unwrap().is_empty());

        session.configure_hardware_accel(true);
        assert_eq!(
            *session.receiver.metadata.lock().unwrap(),
            vec![HW_ACCEL_METADATA.to_string()]
        );
    }

    #[test]
    fn test_close_detaches_and_destroys() {
        let destroyed = Arc::new(AtomicBool::new(false));
        let transport = StubTransport {
            fail: false,
            destroyed: Arc::clone(&destroyed),
        };
        let link = Arc::new(TallyLink::new(Tally::default()));
        let session = ReceiverSession::open(&transport, &descriptor(), Arc::clone(&link)).unwrap();

        session.close();
        assert!(!link.is_attached());
        assert!(destroyed.load(Ordering::SeqCst));
        assert!(!link.set_preview(true));
    }

    #[test]
    fn test_open_failure_leaves_link_detached() {
        let transport = StubTransport {
            fail: true,
            destroyed: Arc::new(AtomicBool::new(false)),
        };
        let link = Arc::new(TallyLink::new(Tally::default()));
        let result = ReceiverSession::open(&transport, &descriptor(), Arc::clone(&link));
        assert!(result.is_err());
        assert!(!link.is_attached());
    }
}
