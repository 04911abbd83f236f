//! The source lifecycle controller.
//!
//! [`NdiSource`] is the per-instance state behind the host's lifecycle
//! callbacks. The host calls into it from its own thread, never concurrently
//! for one instance; the worker runs fully asynchronously. Every restart
//! joins the previous worker before spawning the next, so at most one
//! worker ever exists per instance.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use tracing::{debug, error};

use crate::{
    host::SourceHost,
    session::TallyLink,
    settings::{SettingsData, SourceOptions, SourceSettings},
    transport::{ConnectionDescriptor, Tally, Transport},
    worker::{StateCell, Worker, WorkerState},
};

/// One host-visible NDI input.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use ndi_source::{NdiSource, Settings, SourceHost, SourceOptions, Transport, PROP_SOURCE};
/// # fn demo<T: Transport, H: SourceHost>(transport: Arc<T>, host: Arc<H>) {
/// let mut settings = Settings::new();
/// settings.set_string(PROP_SOURCE, "STUDIO (Camera 1)");
///
/// let mut source = NdiSource::create(transport, host, SourceOptions::default(), &settings);
/// source.show();
/// source.activate();
///
/// settings.set_string(PROP_SOURCE, "STUDIO (Camera 2)");
/// source.update(&settings); // joins the old worker, then starts a new one
///
/// source.destroy(); // returns once the worker has exited
/// # }
/// ```
pub struct NdiSource<T: Transport, H: SourceHost> {
    transport: Arc<T>,
    host: Arc<H>,
    options: SourceOptions,
    settings: SourceSettings,
    running: Arc<AtomicBool>,
    state: Arc<StateCell>,
    worker: Option<JoinHandle<()>>,
    link: Arc<TallyLink<T::Receiver>>,
}

impl<T: Transport, H: SourceHost> NdiSource<T, H> {
    /// Handles the host's "create" event.
    ///
    /// The tally cache starts from the host's current visibility.
    pub fn create<D: SettingsData + ?Sized>(
        transport: Arc<T>,
        host: Arc<H>,
        options: SourceOptions,
        settings: &D,
    ) -> Self {
        let initial = Tally::new(host.active(), host.showing());
        let mut source = Self {
            transport,
            host,
            options,
            settings: SourceSettings::default(),
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(StateCell::new()),
            worker: None,
            link: Arc::new(TallyLink::new(initial)),
        };
        source.update(settings);
        source
    }

    /// Handles a settings change: stops any running worker, then starts a
    /// new one if a source name is set.
    ///
    /// Blocks for up to one capture timeout while the old worker winds down.
    pub fn update<D: SettingsData + ?Sized>(&mut self, data: &D) {
        self.stop_worker();

        let settings = SourceSettings::from_data(data);
        if !settings.has_source() {
            error!("refuse to create NDI receiver for empty NDI source name");
            return;
        }
        if let Err(e) = ConnectionDescriptor::from_settings(&settings, &self.options) {
            error!(error = %e, "refuse to create NDI receiver");
            return;
        }

        self.settings = settings;
        self.running.store(true, Ordering::Release);

        let worker = Worker {
            transport: Arc::clone(&self.transport),
            host: Arc::clone(&self.host),
            settings: self.settings.clone(),
            options: self.options.clone(),
            running: Arc::clone(&self.running),
            state: Arc::clone(&self.state),
            link: Arc::clone(&self.link),
        };
        match worker.spawn() {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!(
                    source = %self.settings.source_name,
                    error = %e,
                    "unable to start receive thread"
                );
            }
        }
    }

    /// Handles "show": the source is visible in preview.
    pub fn show(&self) {
        self.link.set_preview(true);
    }

    /// Handles "hide".
    pub fn hide(&self) {
        self.link.set_preview(false);
    }

    /// Handles "activate": the source is live in program output.
    pub fn activate(&self) {
        self.link.set_program(true);
    }

    /// Handles "deactivate".
    pub fn deactivate(&self) {
        self.link.set_program(false);
    }

    /// Handles "destroy". Returns only after the worker has exited.
    pub fn destroy(self) {
        drop(self);
    }

    /// Whether a worker has been asked to run and not yet asked to stop.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Whether a receiver handle is currently open.
    pub fn is_connected(&self) -> bool {
        self.link.is_attached()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.state.get()
    }

    /// The cached tally, whether or not it has reached a sender.
    pub fn tally(&self) -> Tally {
        self.link.tally()
    }

    /// Settings of the most recent successful start.
    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    fn stop_worker(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            debug!(source = %self.settings.source_name, "joining receive thread");
            if handle.join().is_err() {
                error!(source = %self.settings.source_name, "receive thread panicked");
                self.state.set(WorkerState::Stopped);
            }
        }
    }
}

impl<T: Transport, H: SourceHost> Drop for NdiSource<T, H> {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

impl<T: Transport, H: SourceHost> fmt::Debug for NdiSource<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdiSource")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .field("state", &self.worker_state())
            .field("link", &self.link)
            .finish()
    }
}
