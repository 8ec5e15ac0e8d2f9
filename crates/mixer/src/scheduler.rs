//! The per-source scheduling loop.
//!
//! Each started source runs this loop on its own thread. The loop wakes
//! every tick, and once the frame deadline has passed it produces one frame:
//! a personalized composite, or for content sources the shared content
//! forwarded as is. Deadlines advance by exactly one frame interval, so the
//! rate of one source never depends on another.
//!
//! Locking: the source lock is held only to snapshot state, the registry
//! lock only for the composition pass. The handler runs with neither held.

use std::sync::Arc;

use vidmix_common::clock::{FrameDeadline, MonotonicClock};
use vidmix_frame::VideoFrame;

use crate::compose::{compose, pick_content};
use crate::layout::View;
use crate::source::SourceShared;

/// Run until the source's `running` flag is cleared.
pub(crate) fn run(shared: Arc<SourceShared>) {
    let pidx = shared.pidx;
    let mixer = Arc::clone(&shared.mixer);

    shared.state.lock().loop_thread = Some(std::thread::current().id());
    tracing::info!(pidx, content = shared.content, "Source loop running");

    let mut deadline = FrameDeadline::starting_at(mixer.clock.now_usec());

    loop {
        MonotonicClock::sleep(mixer.tick);
        let now = mixer.clock.now_usec();

        let (interval, view) = {
            let state = shared.state.lock();
            if !state.running {
                break;
            }
            if !deadline.is_due(now) {
                continue;
            }
            (state.interval_usec, state.view(pidx))
        };

        let timestamp = deadline.timestamp();
        let delivered = if shared.content {
            forward_content(&shared, timestamp)
        } else {
            compose_and_deliver(&shared, &view, timestamp)
        };

        if !delivered {
            shared.state.lock().stats.idle_deadlines += 1;
        }

        deadline.advance(interval);
    }

    let stats = {
        let mut state = shared.state.lock();
        state.loop_thread = None;
        state.stats
    };
    tracing::info!(
        pidx,
        frames = stats.frames_delivered,
        idle = stats.idle_deadlines,
        "Source loop exited"
    );
}

/// Compose into the output buffer and hand it to the handler.
///
/// Returns `false` when the source has no output buffer.
fn compose_and_deliver(shared: &SourceShared, view: &View, timestamp: u64) -> bool {
    // Take the buffer so composing does not hold the source lock
    let (mut frame, generation) = {
        let mut state = shared.state.lock();
        let Some(frame) = state.frame_tx.take() else {
            return false;
        };
        (frame, state.generation)
    };

    let tiles = {
        let reg = shared.mixer.registry.lock();
        compose(&mut frame, view, reg.sources.participants(), &reg.inputs)
    };

    tracing::trace!(pidx = shared.pidx, timestamp, tiles, "Frame composed");
    shared.handler.on_frame(timestamp, &frame);

    let mut state = shared.state.lock();
    state.stats.frames_delivered += 1;
    // A buffer replaced or released in the meantime wins
    if state.generation == generation {
        state.frame_tx = Some(frame);
    }
    true
}

/// Forward another participant's shared content.
///
/// Returns `false` when no other content participant has an input.
fn forward_content(shared: &SourceShared, timestamp: u64) -> bool {
    let content: Option<Arc<VideoFrame>> = {
        let reg = shared.mixer.registry.lock();
        pick_content(shared.pidx, reg.sources.participants(), &reg.inputs)
    };

    let Some(frame) = content else {
        return false;
    };

    tracing::trace!(pidx = shared.pidx, timestamp, "Content forwarded");
    shared.handler.on_frame(timestamp, &frame);
    shared.state.lock().stats.frames_delivered += 1;
    true
}
