//! Per-participant mixer endpoints.
//!
//! A [`Source`] owns one participant's output buffer, preferences and
//! scheduling thread. Its input buffer lives in the registry so that the
//! registry lock alone guards everything a composition pass reads.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;
use serde::Serialize;
use vidmix_common::clock::frame_interval_usec;
use vidmix_common::error::{VidmixError, VidmixResult};
use vidmix_frame::{Rgb, Size, VideoFrame};

use crate::focus::FocusRef;
use crate::layout::{Participant, View};
use crate::registry::{Entry, Mixer, MixerShared};
use crate::scheduler;

/// Receiver of produced frames.
///
/// Called from the source's own thread with no mixer lock held. The frame
/// is only borrowed for the duration of the call.
pub trait FrameHandler: Send + Sync + 'static {
    fn on_frame(&self, timestamp: u64, frame: &VideoFrame);
}

impl<F> FrameHandler for F
where
    F: Fn(u64, &VideoFrame) + Send + Sync + 'static,
{
    fn on_frame(&self, timestamp: u64, frame: &VideoFrame) {
        self(timestamp, frame)
    }
}

/// Counters maintained by the scheduling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Frames handed to the handler.
    pub frames_delivered: u64,
    /// Deadlines that produced nothing: no output buffer, or for content
    /// sources no content to forward.
    pub idle_deadlines: u64,
}

/// Fields guarded by the source lock.
#[derive(Debug)]
pub(crate) struct SourceState {
    /// Output buffer; `None` while the loop composes into it.
    pub(crate) frame_tx: Option<VideoFrame>,
    /// Size of the current output buffer, also while it is lent out.
    pub(crate) out_size: Option<Size>,
    /// Bumped whenever the output buffer is replaced or released.
    pub(crate) generation: u64,
    /// Thread running the scheduling loop, set by the loop itself.
    pub(crate) loop_thread: Option<ThreadId>,
    pub(crate) interval_usec: u64,
    pub(crate) selfview: bool,
    pub(crate) content_hide: bool,
    pub(crate) focus: Option<FocusRef>,
    pub(crate) focus_full: bool,
    pub(crate) running: bool,
    pub(crate) stats: SourceStats,
}

impl SourceState {
    /// Layout preferences with the focus reference resolved.
    pub(crate) fn view(&self, pidx: u32) -> View {
        View {
            pidx,
            selfview: self.selfview,
            content_hide: self.content_hide,
            focus: self.focus.as_ref().and_then(FocusRef::resolve),
            focus_full: self.focus_full,
        }
    }
}

pub(crate) struct SourceShared {
    pub(crate) pidx: u32,
    pub(crate) content: bool,
    pub(crate) mixer: Arc<MixerShared>,
    pub(crate) state: Mutex<SourceState>,
    pub(crate) handler: Box<dyn FrameHandler>,
    /// Loop handle. Held across `start` and `stop` so that they serialize.
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SourceShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceShared")
            .field("pidx", &self.pidx)
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Source`].
pub struct SourceBuilder {
    mixer: Mixer,
    size: Option<Size>,
    fps: u32,
    content: bool,
    handler: Option<Box<dyn FrameHandler>>,
}

impl SourceBuilder {
    pub(crate) fn new(mixer: Mixer, fps: u32) -> Self {
        Self {
            mixer,
            size: None,
            fps,
            content: false,
            handler: None,
        }
    }

    /// Allocate an output buffer of this size up front.
    pub fn size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Mark the source as a content share.
    pub fn content(mut self, content: bool) -> Self {
        self.content = content;
        self
    }

    /// Deliver frames to a closure.
    pub fn on_frame<F>(self, callback: F) -> Self
    where
        F: Fn(u64, &VideoFrame) + Send + Sync + 'static,
    {
        self.handler(callback)
    }

    /// Deliver frames to a handler.
    pub fn handler(mut self, handler: impl FrameHandler) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Create the source. It starts out disabled and stopped.
    ///
    /// Fails with `InvalidArgument` for a zero frame rate or a missing
    /// handler, and with `OutOfMemory` if the output buffer cannot be
    /// allocated. A participant index taken by a failed build is not
    /// handed out again.
    pub fn build(self) -> VidmixResult<Source> {
        let handler = self
            .handler
            .ok_or_else(|| VidmixError::invalid_argument("source requires a frame handler"))?;
        let interval_usec = frame_interval_usec(self.fps)
            .ok_or_else(|| VidmixError::invalid_argument("frame rate must be positive"))?;

        let mixer = self.mixer.shared;
        let (pidx, format) = {
            let mut reg = mixer.registry.lock();
            (reg.assign_pidx(), reg.format)
        };

        let frame_tx = match self.size {
            Some(size) => Some(VideoFrame::filled(format, size, Rgb::BLACK)?),
            None => None,
        };

        tracing::info!(
            pidx,
            fps = self.fps,
            content = self.content,
            size = ?self.size,
            "Source allocated"
        );

        Ok(Source {
            shared: Arc::new(SourceShared {
                pidx,
                content: self.content,
                mixer,
                state: Mutex::new(SourceState {
                    frame_tx,
                    out_size: self.size,
                    generation: 0,
                    loop_thread: None,
                    interval_usec,
                    selfview: false,
                    content_hide: false,
                    focus: None,
                    focus_full: false,
                    running: false,
                    stats: SourceStats::default(),
                }),
                handler,
                lifecycle: Mutex::new(None),
            }),
        })
    }
}

impl Mixer {
    /// Allocate a source in one call.
    ///
    /// Equivalent to `mixer.source().fps(fps).content(content)` with an
    /// optional output size and the given callback.
    pub fn allocate_source<F>(
        &self,
        size: Option<Size>,
        fps: u32,
        content: bool,
        callback: F,
    ) -> VidmixResult<Source>
    where
        F: Fn(u64, &VideoFrame) + Send + Sync + 'static,
    {
        let mut builder = self.source().fps(fps).content(content).on_frame(callback);
        if let Some(size) = size {
            builder = builder.size(size);
        }
        builder.build()
    }
}

/// One participant's mixer endpoint.
///
/// Dropping the handle stops the loop, removes the source from the
/// registry and releases both buffers.
pub struct Source {
    pub(crate) shared: Arc<SourceShared>,
}

impl Source {
    /// Participant index.
    pub fn pidx(&self) -> u32 {
        self.shared.pidx
    }

    pub fn is_content(&self) -> bool {
        self.shared.content
    }

    /// Add to (`true`) or remove from (`false`) the registry. Idempotent.
    ///
    /// Enabling clears a previously contributed input to black.
    pub fn enable(&self, on: bool) {
        let pidx = self.shared.pidx;
        let mut reg = self.shared.mixer.registry.lock();

        if on {
            if reg.sources.contains(pidx) {
                return;
            }
            if let Some(input) = reg.inputs.get_mut(&pidx) {
                Arc::make_mut(input).clear();
            }
            reg.sources.insert_sorted(
                Entry {
                    participant: Participant {
                        pidx,
                        content: self.shared.content,
                    },
                    source: Arc::downgrade(&self.shared),
                },
                |a, b| a.participant.pidx <= b.participant.pidx,
            );
            tracing::info!(pidx, enabled = reg.sources.len(), "Source enabled");
        } else if reg.sources.unlink(pidx) {
            tracing::info!(pidx, enabled = reg.sources.len(), "Source disabled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared
            .mixer
            .registry
            .lock()
            .sources
            .contains(self.shared.pidx)
    }

    /// Launch the scheduling loop.
    ///
    /// Fails with `AlreadyRunning` if the loop is running and with `Spawn`
    /// if the thread cannot be created, in which case the source is left
    /// stopped. From the source's own callback this keeps the current loop
    /// running, unless another thread is already stopping it.
    pub fn start(&self) -> VidmixResult<()> {
        let pidx = self.shared.pidx;

        if self.on_loop_thread() {
            let Some(_lifecycle) = self.shared.lifecycle.try_lock() else {
                tracing::warn!(pidx, "Start from the source's own loop during stop, ignored");
                return Ok(());
            };
            let mut state = self.shared.state.lock();
            if state.running {
                return Err(VidmixError::AlreadyRunning { pidx });
            }
            state.running = true;
            tracing::info!(pidx, "Source resumed from its own loop");
            return Ok(());
        }

        let mut lifecycle = self.shared.lifecycle.lock();

        if self.shared.state.lock().running {
            return Err(VidmixError::AlreadyRunning { pidx });
        }

        // A loop that was only signalled has to exit before a new one starts
        if let Some(stale) = lifecycle.take() {
            join_loop(pidx, stale);
        }

        self.shared.state.lock().running = true;

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("vidmix-src-{pidx}"))
            .spawn(move || scheduler::run(shared));

        match spawned {
            Ok(handle) => {
                *lifecycle = Some(handle);
                tracing::info!(pidx, "Source started");
                Ok(())
            }
            Err(e) => {
                self.shared.state.lock().running = false;
                tracing::warn!(pidx, error = %e, "Failed to spawn source loop");
                Err(VidmixError::Spawn(e))
            }
        }
    }

    /// Stop the scheduling loop and wait for it to exit. Idempotent.
    ///
    /// Concurrent callers all return only after the loop has exited. From
    /// the source's own callback this only signals the loop.
    pub fn stop(&self) {
        let pidx = self.shared.pidx;

        if self.on_loop_thread() {
            self.shared.state.lock().running = false;
            tracing::warn!(pidx, "Stop requested from the source's own loop, not joining");
            return;
        }

        let mut lifecycle = self.shared.lifecycle.lock();
        let was_running = std::mem::replace(&mut self.shared.state.lock().running, false);

        if let Some(handle) = lifecycle.take() {
            join_loop(pidx, handle);
        }
        if was_running {
            tracing::info!(pidx, "Source stopped");
        }
    }

    fn on_loop_thread(&self) -> bool {
        self.shared.state.lock().loop_thread == Some(thread::current().id())
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Stop, detach from the registry and release buffers.
    pub fn destroy(self) {
        drop(self);
    }

    /// Replace this participant's input buffer with a copy of `frame`.
    ///
    /// Frames whose pixel format differs from the mixer's are ignored.
    pub fn put(&self, frame: &VideoFrame) {
        let pidx = self.shared.pidx;
        let copy = Arc::new(frame.clone());

        let old = {
            let mut reg = self.shared.mixer.registry.lock();
            if copy.format() != reg.format {
                tracing::debug!(
                    pidx,
                    format = %copy.format(),
                    expected = %reg.format,
                    "Ignoring input in foreign pixel format"
                );
                return;
            }
            reg.inputs.insert(pidx, copy)
        };

        // Release the previous buffer outside the lock
        drop(old);
    }

    /// Resize the output buffer. The new buffer starts black.
    ///
    /// Requesting the current size is a no-op, also while the loop is
    /// composing into the buffer.
    pub fn set_size(&self, size: Size) -> VidmixResult<()> {
        if self.shared.state.lock().out_size == Some(size) {
            return Ok(());
        }

        let format = self.shared.mixer.registry.lock().format;
        let frame = VideoFrame::filled(format, size, Rgb::BLACK)?;

        let old = {
            let mut state = self.shared.state.lock();
            state.out_size = Some(size);
            state.generation += 1;
            state.frame_tx.replace(frame)
        };
        drop(old);

        tracing::debug!(pidx = self.shared.pidx, %size, %format, "Output size changed");
        Ok(())
    }

    /// Output size, if an output buffer exists.
    pub fn size(&self) -> Option<Size> {
        self.shared.state.lock().out_size
    }

    /// Change the frame rate. A zero rate is ignored.
    pub fn set_rate(&self, fps: u32) {
        let Some(interval) = frame_interval_usec(fps) else {
            tracing::warn!(pidx = self.shared.pidx, "Ignoring zero frame rate");
            return;
        };
        self.shared.state.lock().interval_usec = interval;
        tracing::debug!(pidx = self.shared.pidx, fps, "Frame rate changed");
    }

    /// Frame interval in microseconds.
    pub fn interval_usec(&self) -> u64 {
        self.shared.state.lock().interval_usec
    }

    pub fn set_content_hide(&self, hide: bool) {
        self.shared.state.lock().content_hide = hide;
        tracing::debug!(pidx = self.shared.pidx, hide, "Content hide changed");
    }

    pub fn content_hide(&self) -> bool {
        self.shared.state.lock().content_hide
    }

    /// Flip whether the participant sees its own input. Returns the new
    /// setting.
    pub fn toggle_selfview(&self) -> bool {
        let mut state = self.shared.state.lock();
        state.selfview = !state.selfview;
        tracing::debug!(pidx = self.shared.pidx, selfview = state.selfview, "Selfview toggled");
        state.selfview
    }

    pub fn selfview(&self) -> bool {
        self.shared.state.lock().selfview
    }

    /// Current layout preferences, focus resolved.
    pub fn view(&self) -> View {
        self.shared.state.lock().view(self.shared.pidx)
    }

    pub fn stats(&self) -> SourceStats {
        self.shared.state.lock().stats
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        let pidx = self.shared.pidx;
        self.stop();

        let input = {
            let mut reg = self.shared.mixer.registry.lock();
            reg.sources.unlink(pidx);
            reg.inputs.remove(&pidx)
        };
        drop(input);

        let output = {
            let mut state = self.shared.state.lock();
            state.focus = None;
            state.out_size = None;
            state.generation += 1;
            state.frame_tx.take()
        };
        drop(output);

        tracing::info!(pidx, "Source destroyed");
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("pidx", &self.shared.pidx)
            .field("content", &self.shared.content)
            .finish()
    }
}

fn join_loop(pidx: u32, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        tracing::warn!(pidx, "Source loop panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use vidmix_common::config::MixerDefaults;
    use vidmix_frame::PixelFormat;

    use super::*;

    fn noop(_: u64, _: &VideoFrame) {}

    #[test]
    fn test_build_requires_handler() {
        let mixer = Mixer::new();
        let err = mixer.source().build().unwrap_err();
        assert!(matches!(err, VidmixError::InvalidArgument { .. }));
    }

    #[test]
    fn test_build_rejects_zero_fps() {
        let mixer = Mixer::new();
        let err = mixer.allocate_source(None, 0, false, noop).unwrap_err();
        assert!(matches!(err, VidmixError::InvalidArgument { .. }));
    }

    #[test]
    fn test_build_rejects_empty_size() {
        let mixer = Mixer::new();
        let result = mixer.allocate_source(Some(Size::new(0, 480)), 30, false, noop);
        assert!(matches!(result, Err(VidmixError::InvalidArgument { .. })));

        // The failed build consumed index 1
        let next = mixer.allocate_source(None, 30, false, noop).unwrap();
        assert_eq!(next.pidx(), 2);
    }

    #[test]
    fn test_output_buffer_starts_black() {
        let mixer = Mixer::new();
        let source = mixer
            .allocate_source(Some(Size::new(64, 48)), 30, false, noop)
            .unwrap();

        let state = source.shared.state.lock();
        let frame = state.frame_tx.as_ref().unwrap();
        assert_eq!(frame.format(), PixelFormat::Yuv420p);
        assert!(frame.pixel_is(0, 0, Rgb::BLACK));
        assert_eq!(state.interval_usec, 33_333);
    }

    #[test]
    fn test_set_rate_ignores_zero() {
        let mixer = Mixer::new();
        let source = mixer.allocate_source(None, 25, false, noop).unwrap();
        assert_eq!(source.interval_usec(), 40_000);

        source.set_rate(0);
        assert_eq!(source.interval_usec(), 40_000);

        source.set_rate(50);
        assert_eq!(source.interval_usec(), 20_000);
    }

    #[test]
    fn test_set_size() {
        let mixer = Mixer::new();
        let source = mixer.allocate_source(None, 30, false, noop).unwrap();
        assert_eq!(source.size(), None);

        source.set_size(Size::new(320, 240)).unwrap();
        assert_eq!(source.size(), Some(Size::new(320, 240)));

        mixer.set_format(PixelFormat::Rgb32);
        // Same size is a no-op even though the format changed
        source.set_size(Size::new(320, 240)).unwrap();
        {
            let state = source.shared.state.lock();
            assert_eq!(state.frame_tx.as_ref().unwrap().format(), PixelFormat::Yuv420p);
        }

        source.set_size(Size::new(160, 120)).unwrap();
        let state = source.shared.state.lock();
        assert_eq!(state.frame_tx.as_ref().unwrap().format(), PixelFormat::Rgb32);
    }

    #[test]
    fn test_size_is_stable_while_composing() {
        let mixer = Mixer::with_config(&MixerDefaults {
            tick_ms: 1,
            ..Default::default()
        });
        let (entered_tx, entered) = mpsc::channel();
        let entered_tx = Mutex::new(entered_tx);
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sizes = Arc::clone(&delivered);

        let source = mixer
            .allocate_source(Some(Size::new(64, 64)), 100, false, move |_, frame| {
                sizes.lock().push(frame.size());
                let _ = entered_tx.lock().send(());
                thread::sleep(Duration::from_millis(200));
            })
            .unwrap();
        source.start().unwrap();
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        // The buffer is lent to the callback
        assert!(source.shared.state.lock().frame_tx.is_none());
        assert_eq!(source.size(), Some(Size::new(64, 64)));

        let generation = source.shared.state.lock().generation;
        source.set_size(Size::new(64, 64)).unwrap();
        assert_eq!(source.shared.state.lock().generation, generation);

        source.set_size(Size::new(32, 32)).unwrap();
        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        source.stop();

        assert_eq!(source.size(), Some(Size::new(32, 32)));
        assert_eq!(&delivered.lock()[..2], &[Size::new(64, 64), Size::new(32, 32)]);
        let state = source.shared.state.lock();
        assert!(state.frame_tx.as_ref().unwrap().has_size(Size::new(32, 32)));
    }

    #[test]
    fn test_flags() {
        let mixer = Mixer::new();
        let source = mixer.allocate_source(None, 30, true, noop).unwrap();
        assert!(source.is_content());
        assert!(!source.selfview());

        assert!(source.toggle_selfview());
        assert!(!source.toggle_selfview());

        source.set_content_hide(true);
        assert!(source.content_hide());
        assert!(source.view().content_hide);
    }

    #[test]
    fn test_put_ignores_foreign_format() {
        let mixer = Mixer::new();
        let source = mixer.allocate_source(None, 30, false, noop).unwrap();

        let rgb = VideoFrame::filled(PixelFormat::Rgb32, Size::new(8, 8), Rgb::WHITE).unwrap();
        source.put(&rgb);
        assert!(!mixer.shared.registry.lock().inputs.contains_key(&source.pidx()));

        let yuv = VideoFrame::filled(PixelFormat::Yuv420p, Size::new(8, 8), Rgb::WHITE).unwrap();
        source.put(&yuv);
        source.put(&rgb);

        let reg = mixer.shared.registry.lock();
        assert_eq!(reg.inputs[&source.pidx()].as_ref(), &yuv);
    }

    #[test]
    fn test_enable_clears_input() {
        let mixer = Mixer::new();
        let source = mixer.allocate_source(None, 30, false, noop).unwrap();

        let white = VideoFrame::filled(PixelFormat::Yuv420p, Size::new(8, 8), Rgb::WHITE).unwrap();
        source.put(&white);
        source.enable(true);

        let reg = mixer.shared.registry.lock();
        assert!(reg.inputs[&source.pidx()].pixel_is(4, 4, Rgb::BLACK));
    }

    #[test]
    fn test_drop_releases_registry_state() {
        let mixer = Mixer::new();
        let source = mixer.allocate_source(None, 30, false, noop).unwrap();
        let pidx = source.pidx();

        let frame = VideoFrame::new(PixelFormat::Yuv420p, Size::new(8, 8)).unwrap();
        source.put(&frame);
        source.enable(true);
        source.destroy();

        let reg = mixer.shared.registry.lock();
        assert!(!reg.sources.contains(pidx));
        assert!(!reg.inputs.contains_key(&pidx));
    }
}
