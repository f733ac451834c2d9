//! RT-safe release of module transfer buffers
//!
//! Module bytes are allocated on the control thread and consumed on the
//! render thread. Wrapping them in `basedrop::Owned` means the render thread
//! never frees them: dropping an `Owned` only enqueues the pointer, and the
//! memory is reclaimed the next time the control thread calls
//! [`BufferCollector::collect`].
//!
//! Each session owns its own collector, so there is no process-wide GC
//! thread and sessions can be torn down independently.
//!
//! ```ignore
//! let mut gc = BufferCollector::new();
//! let owned = gc.adopt(ModuleData::copy_from(bytes)?);
//!
//! // Render thread: consume, then drop (just enqueues)
//! drop(owned);
//!
//! // Control thread: actually free
//! gc.collect();
//! ```

use basedrop::{Collector, Handle, Owned};

use super::command::ModuleData;

/// Per-session collector for module transfer buffers
pub struct BufferCollector {
    collector: Collector,
    handle: Handle,
}

impl BufferCollector {
    /// Create a collector with no live buffers
    pub fn new() -> Self {
        let collector = Collector::new();
        let handle = collector.handle();
        Self { collector, handle }
    }

    /// Hand a buffer over to the collector's deferred-drop scheme
    pub fn adopt(&self, data: ModuleData) -> Owned<ModuleData> {
        Owned::new(&self.handle, data)
    }

    /// Free every buffer dropped since the last collection
    ///
    /// Control thread only. Returns how many allocations were reclaimed.
    pub fn collect(&mut self) -> usize {
        let before = self.collector.alloc_count();
        self.collector.collect();
        let freed = before.saturating_sub(self.collector.alloc_count());
        if freed > 0 {
            log::debug!("Reclaimed {} module buffer(s)", freed);
        }
        freed
    }

    /// Buffers allocated through this collector and not yet reclaimed
    pub fn live_buffers(&self) -> usize {
        self.collector.alloc_count()
    }
}

impl Default for BufferCollector {
    fn default() -> Self {
        Self::new()
    }
}
