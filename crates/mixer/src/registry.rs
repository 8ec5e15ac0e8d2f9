//! The mixer registry: ordered source membership, the shared pixel format,
//! the participant-index counter, and every source's input buffer.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use vidmix_common::clock::MonotonicClock;
use vidmix_common::config::MixerDefaults;
use vidmix_frame::PixelFormat;

use crate::compose::InputFrames;
use crate::layout::Participant;
use crate::source::{SourceBuilder, SourceShared};

/// One enabled source in the registry.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) participant: Participant,
    pub(crate) source: Weak<SourceShared>,
}

/// Ordered membership list.
///
/// Insertion is stable: a new entry lands after every existing entry the
/// comparator accepts as preceding it.
#[derive(Debug, Default)]
pub(crate) struct SourceList {
    entries: Vec<Entry>,
}

impl SourceList {
    /// Insert `entry` after the last element `e` for which
    /// `precedes(e, &entry)` holds, or at the front if there is none.
    pub(crate) fn insert_sorted<F>(&mut self, entry: Entry, precedes: F)
    where
        F: Fn(&Entry, &Entry) -> bool,
    {
        let at = self
            .entries
            .iter()
            .rposition(|e| precedes(e, &entry))
            .map_or(0, |i| i + 1);
        self.entries.insert(at, entry);
    }

    /// Remove the entry for `pidx`. Returns whether it was present.
    pub(crate) fn unlink(&mut self, pidx: u32) -> bool {
        match self
            .entries
            .iter()
            .position(|e| e.participant.pidx == pidx)
        {
            Some(at) => {
                self.entries.remove(at);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, pidx: u32) -> bool {
        self.entries.iter().any(|e| e.participant.pidx == pidx)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub(crate) fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.entries.iter().map(|e| &e.participant)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// State guarded by the registry lock.
#[derive(Debug)]
pub(crate) struct Registry {
    pub(crate) sources: SourceList,
    pub(crate) inputs: InputFrames,
    pub(crate) format: PixelFormat,
    next_pidx: u32,
}

impl Registry {
    fn new(format: PixelFormat) -> Self {
        Self {
            sources: SourceList::default(),
            inputs: InputFrames::new(),
            format,
            next_pidx: 0,
        }
    }

    /// Hand out the next participant index. Indices start at 1 and are
    /// never reused.
    pub(crate) fn assign_pidx(&mut self) -> u32 {
        self.next_pidx += 1;
        self.next_pidx
    }
}

pub(crate) struct MixerShared {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) clock: MonotonicClock,
    pub(crate) tick: Duration,
    pub(crate) default_fps: u32,
}

/// Handle to a mixer. Cloning shares the same registry.
#[derive(Clone)]
pub struct Mixer {
    pub(crate) shared: Arc<MixerShared>,
}

impl Mixer {
    /// Create a mixer with default settings (`yuv420p`, 4 ms tick).
    pub fn new() -> Self {
        Self::with_config(&MixerDefaults::default())
    }

    /// Create a mixer from configuration defaults.
    ///
    /// An unknown pixel format falls back to `yuv420p`.
    pub fn with_config(defaults: &MixerDefaults) -> Self {
        let format = defaults.pixel_format.parse().unwrap_or_else(|e| {
            tracing::warn!(
                pixel_format = %defaults.pixel_format,
                error = %e,
                "Unknown pixel format in config, using yuv420p"
            );
            PixelFormat::default()
        });

        let clock = MonotonicClock::start();
        tracing::info!(
            %format,
            tick_ms = defaults.tick().as_millis() as u64,
            epoch = clock.epoch_wall(),
            "Mixer created"
        );

        Self {
            shared: Arc::new(MixerShared {
                registry: Mutex::new(Registry::new(format)),
                clock,
                tick: defaults.tick(),
                default_fps: defaults.default_fps.max(1),
            }),
        }
    }

    /// Pixel format used for buffers allocated from now on.
    pub fn format(&self) -> PixelFormat {
        self.shared.registry.lock().format
    }

    /// Change the pixel format for subsequently allocated buffers.
    ///
    /// Existing output buffers keep their format; inputs in the old format
    /// are no longer accepted by `put`.
    pub fn set_format(&self, format: PixelFormat) {
        let mut reg = self.shared.registry.lock();
        if reg.format != format {
            tracing::debug!(from = %reg.format, to = %format, "Mixer format changed");
            reg.format = format;
        }
    }

    /// Start building a source at the configured default frame rate.
    pub fn source(&self) -> SourceBuilder {
        SourceBuilder::new(self.clone(), self.shared.default_fps)
    }

    /// Participants currently enabled, in registry order.
    pub fn participants(&self) -> Vec<Participant> {
        self.shared
            .registry
            .lock()
            .sources
            .participants()
            .copied()
            .collect()
    }

    /// Number of enabled sources.
    pub fn enabled_count(&self) -> usize {
        self.shared.registry.lock().sources.len()
    }

    /// The clock every source loop paces against.
    pub fn clock(&self) -> &MonotonicClock {
        &self.shared.clock
    }

    /// Scheduler sleep quantum.
    pub fn tick(&self) -> Duration {
        self.shared.tick
    }
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reg = self.shared.registry.lock();
        f.debug_struct("Mixer")
            .field("format", &reg.format)
            .field("enabled", &reg.sources.len())
            .field("next_pidx", &(reg.next_pidx + 1))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(pidx: u32) -> Entry {
        Entry {
            participant: Participant {
                pidx,
                content: false,
            },
            source: Weak::new(),
        }
    }

    fn pidxs(list: &SourceList) -> Vec<u32> {
        list.participants().map(|p| p.pidx).collect()
    }

    fn by_pidx(a: &Entry, b: &Entry) -> bool {
        a.participant.pidx <= b.participant.pidx
    }

    #[test]
    fn test_insert_sorted_orders_by_pidx() {
        let mut list = SourceList::default();
        for pidx in [3, 1, 2] {
            list.insert_sorted(entry(pidx), by_pidx);
        }
        assert_eq!(pidxs(&list), vec![1, 2, 3]);
    }

    #[test]
    fn test_insert_sorted_is_stable() {
        let mut list = SourceList::default();
        list.insert_sorted(entry(2), by_pidx);
        list.insert_sorted(entry(1), by_pidx);

        let mut dup = entry(2);
        dup.participant.content = true;
        list.insert_sorted(dup, by_pidx);

        let items: Vec<_> = list.iter().map(|e| e.participant).collect();
        assert_eq!(items[1].pidx, 2);
        assert!(!items[1].content);
        // Equal keys go after the existing ones
        assert!(items[2].content);
    }

    #[test]
    fn test_unlink() {
        let mut list = SourceList::default();
        list.insert_sorted(entry(1), by_pidx);
        list.insert_sorted(entry(2), by_pidx);

        assert!(list.unlink(1));
        assert!(!list.unlink(1));
        assert!(!list.contains(1));
        assert!(list.contains(2));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_pidx_counter_starts_at_one() {
        let mut reg = Registry::new(PixelFormat::Yuv420p);
        assert_eq!(reg.assign_pidx(), 1);
        assert_eq!(reg.assign_pidx(), 2);
    }

    #[test]
    fn test_set_format() {
        let mixer = Mixer::new();
        assert_eq!(mixer.format(), PixelFormat::Yuv420p);
        mixer.set_format(PixelFormat::Rgb32);
        assert_eq!(mixer.format(), PixelFormat::Rgb32);
    }

    #[test]
    fn test_unknown_config_format_falls_back() {
        let defaults = MixerDefaults {
            pixel_format: "nv12".to_string(),
            ..Default::default()
        };
        let mixer = Mixer::with_config(&defaults);
        assert_eq!(mixer.format(), PixelFormat::Yuv420p);
    }
}
