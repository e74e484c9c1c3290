extern crate alloc;

use log::{debug, warn};

use crate::catalog::Catalog;
use crate::image_loader::LoadError;
use crate::store::{CursorStore, KvStore};

/// Two triggers inside this window collapse to one, whatever their source.
pub const DEBOUNCE_US: u64 = 200_000;
/// Idle time after the last attempted advance before the timer steps.
pub const AUTO_ADVANCE_US: u64 = 5_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Advancing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    Tap,
    Timer,
    Next,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// The cursor moved and a load was attempted. `loaded` is false when the
    /// load failed; the previously displayed frame stays on screen.
    Advanced { index: usize, loaded: bool },
    /// Trigger arrived inside the cooldown window and was discarded.
    Debounced,
    /// Empty catalog, nothing to show.
    Empty,
}

/// Advances and wraps the durable cursor, persisting it on every honored
/// trigger. The engine is single-threaded by design; `Advancing` is only ever
/// observable from within the load callback.
pub struct Navigator<K: KvStore> {
    cursor: usize,
    state: NavState,
    store: CursorStore<K>,
    last_advance_at: Option<u64>,
}

impl<K: KvStore> Navigator<K> {
    /// Restores the persisted cursor, clamping stale out-of-range values
    /// (the catalog may have shrunk since the last boot).
    pub fn new(mut store: CursorStore<K>, catalog: &Catalog) -> Self {
        let stored = store.get();
        let cursor = match usize::try_from(stored) {
            Ok(v) if v < catalog.len() => v,
            _ => 0,
        };
        Self {
            cursor,
            state: NavState::Idle,
            store,
            last_advance_at: None,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    /// Reloads the asset under the cursor without advancing; the startup
    /// path after the cursor has been restored.
    pub fn show_current<L>(&mut self, now: u64, catalog: &Catalog, load: L) -> Advance
    where
        L: FnOnce(&str) -> Result<(), LoadError>,
    {
        if catalog.is_empty() {
            return Advance::Empty;
        }
        self.state = NavState::Advancing;
        let loaded = self.run_load(self.cursor, catalog, load);
        self.last_advance_at = Some(now);
        self.state = NavState::Idle;
        Advance::Advanced {
            index: self.cursor,
            loaded,
        }
    }

    /// Honors a trigger: wraps the cursor forward, persists it (best effort)
    /// and attempts the load. Returns to `Idle` whatever the load outcome,
    /// and records the attempt so neither the timer nor a failed load can
    /// cause a rapid retry storm.
    pub fn advance<L>(&mut self, trigger: Trigger, now: u64, catalog: &Catalog, load: L) -> Advance
    where
        L: FnOnce(&str) -> Result<(), LoadError>,
    {
        if catalog.is_empty() {
            return Advance::Empty;
        }
        if let Some(last) = self.last_advance_at {
            if now.saturating_sub(last) < DEBOUNCE_US {
                debug!("{:?} trigger inside cooldown, discarded", trigger);
                return Advance::Debounced;
            }
        }

        self.state = NavState::Advancing;
        let next = (self.cursor + 1) % catalog.len();
        debug!("advance ({:?}) to index {}", trigger, next);
        if self.store.set(next as i32).is_err() {
            // display availability beats durability; retried on a later advance
            warn!("failed to persist cursor {}", next);
        }
        self.cursor = next;
        let loaded = self.run_load(next, catalog, load);
        self.last_advance_at = Some(now);
        self.state = NavState::Idle;
        Advance::Advanced {
            index: next,
            loaded,
        }
    }

    /// Fires a timer advance once the idle window has elapsed.
    pub fn poll_timer<L>(&mut self, now: u64, catalog: &Catalog, load: L) -> Option<Advance>
    where
        L: FnOnce(&str) -> Result<(), LoadError>,
    {
        let due = match self.last_advance_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= AUTO_ADVANCE_US,
        };
        due.then(|| self.advance(Trigger::Timer, now, catalog, load))
    }

    fn run_load<L>(&mut self, index: usize, catalog: &Catalog, load: L) -> bool
    where
        L: FnOnce(&str) -> Result<(), LoadError>,
    {
        let Some(name) = catalog.name(index) else {
            return false;
        };
        match load(name) {
            Ok(()) => true,
            Err(err) => {
                warn!("loading {} failed: {:?}", name, err);
                false
            }
        }
    }
}
