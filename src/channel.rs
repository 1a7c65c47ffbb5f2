//! Channel orchestrator: publishes the latest frame into the shared region

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use nix::errno::Errno;
use tracing::{debug, info, instrument, warn};

use crate::error::{InitError, SendError, SendFailure};
use crate::frame::header::{self, HEADER_SIZE, MAX_FRAME_BYTES};
use crate::frame::{encode, FrameInfo, FrameRequest};
use crate::shm::{SharedRegion, SyncSet};
use crate::ChannelConfig;

/// The four cross-process handles, live from init until teardown
struct ChannelState {
    region: SharedRegion,
    sync: SyncSet,
}

/// Single-writer frame channel to the virtual-camera consumer.
///
/// Resources come up lazily on the first send and persist across calls.
/// Every failure path tears the whole set down and the next call
/// re-initializes, so a poisoned channel never lingers.
pub struct Channel {
    config: ChannelConfig,
    state: Mutex<Option<ChannelState>>,
}

impl Channel {
    /// No I/O happens here; resources are acquired on `open` or first send
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Eagerly bring up the region and synchronization set. Idempotent.
    pub fn open(&self) -> Result<(), InitError> {
        let mut state = self.lock_state();
        Self::ensure_init(&self.config, &mut state).map(|_| ())
    }

    /// Release all cross-process handles. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock_state();
        if state.take().is_some() {
            debug!("channel closed");
        }
    }

    /// Whether the cross-process handles are currently held
    pub fn is_open(&self) -> bool {
        self.lock_state().is_some()
    }

    /// Publish one frame: validate, encode outside the lock, then
    /// header+payload write and "sent" edge under the write lock.
    ///
    /// On any failure the channel is torn down before the error surfaces;
    /// the next call starts from a clean init.
    #[instrument(skip(self, request), fields(width = request.width, height = request.height))]
    pub fn send(&self, request: &FrameRequest) -> Result<(), SendFailure> {
        let started = Instant::now();
        let mut state = self.lock_state();

        match Self::send_inner(&self.config, &mut state, request) {
            Ok(()) => {
                metrics::histogram!("vcam_send_time_us")
                    .record(started.elapsed().as_micros() as f64);
                Ok(())
            }
            Err(cause) => {
                *state = None;
                metrics::counter!("vcam_send_failures").increment(1);
                warn!(error = %cause, "send failed, channel torn down");
                Err(SendFailure::from(cause))
            }
        }
    }

    /// Like [`Channel::send`], but hands the encode+write cycle to a
    /// blocking worker so the calling task stays responsive.
    pub async fn send_async(self: Arc<Self>, request: FrameRequest) -> Result<(), SendFailure> {
        match tokio::task::spawn_blocking(move || self.send(&request)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            // Runtime is shutting down; treat like any other sync failure
            Err(_) => Err(SendFailure::from(SendError::Sync(Errno::ECANCELED))),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<ChannelState>> {
        // A panicked sender already tore its state down via the error
        // path, so the poisoned contents are still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_init<'a>(
        config: &ChannelConfig,
        slot: &'a mut Option<ChannelState>,
    ) -> Result<&'a mut ChannelState, InitError> {
        if slot.is_none() {
            let mut region =
                SharedRegion::acquire(&config.region_name(), config.region_capacity())?;
            let sync = SyncSet::open_or_create(
                &config.mutex_name(),
                &config.sent_name(),
                &config.want_name(),
            )?;

            header::write_init(&mut region.as_mut_slice()[..HEADER_SIZE]);

            info!(
                region = %config.region_name(),
                created = region.created(),
                "channel initialized"
            );
            *slot = Some(ChannelState { region, sync });
        }

        match slot {
            Some(state) => Ok(state),
            // Filled in just above
            None => unreachable!(),
        }
    }

    fn send_inner(
        config: &ChannelConfig,
        slot: &mut Option<ChannelState>,
        request: &FrameRequest,
    ) -> Result<(), SendError> {
        let state = Self::ensure_init(config, slot)?;

        let expected = request.expected_len();
        if request.data.len() != expected {
            return Err(SendError::InvalidInput {
                width: request.width,
                height: request.height,
                expected,
                actual: request.data.len(),
            });
        }
        if expected > MAX_FRAME_BYTES {
            return Err(SendError::FrameTooLarge {
                width: request.width,
                height: request.height,
                payload: expected,
                capacity: MAX_FRAME_BYTES,
            });
        }

        // Pure transform, kept outside the lock to minimize hold time
        let payload = encode(&request.data, request.width, request.height)?;

        let guard = state
            .sync
            .mutex
            .lock(config.lock_timeout())?;

        let buf = state.region.as_mut_slice();
        FrameInfo::for_dimensions(request.width, request.height).write_to(&mut buf[..HEADER_SIZE]);
        buf[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(&payload);

        // Header and payload are fully written before the edge is raised
        state.sync.sent.signal()?;
        drop(guard);

        Ok(())
    }
}
