extern crate alloc;

use alloc::format;
use alloc::string::String;

use embedded_graphics::image::ImageRawBE;
use embedded_graphics::pixelcolor::Rgb565;
use log::info;

use crate::catalog::Catalog;
use crate::fs::Filesystem;
use crate::image_loader::{ImageLoader, JpegDecoder};
use crate::input::{BootKey, Gesture};
use crate::navigation::{Advance, Navigator, Trigger};
use crate::power::{BatteryIcon, IrqQueue, PowerChip, PowerMonitor, PowerSnapshot};
use crate::store::{CursorStore, KvStore};

/// Period the platform drives [`Application::tick`] at.
pub const TICK_PERIOD_MS: u32 = 500;
/// Manifest location on the mounted card.
pub const MANIFEST_PATH: &str = "prod/meta.txt";
/// Directory the manifest's entries are relative to.
pub const ASSET_DIR: &str = "prod";

const BRIGHTNESS_STEP: u8 = 5;

/// Raised by a tick for the platform layer to act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEvent {
    /// Boot key held past the long-press threshold.
    RestartRequested,
}

/// Glue between the periodic UI tick, gesture callbacks and the engine
/// parts. Everything here runs on the single UI thread; the interrupt queue
/// is the only structure shared with another context.
pub struct Application<F, D, K, P>
where
    F: Filesystem,
    D: JpegDecoder,
    K: KvStore,
    P: PowerChip,
{
    fs: F,
    catalog: Catalog,
    navigator: Navigator<K>,
    loader: ImageLoader<D>,
    monitor: PowerMonitor<P>,
    boot_key: BootKey,
    brightness: u8,
    show_charging: bool,
    dirty: bool,
}

fn asset_path(name: &str) -> String {
    format!("{}/{}", ASSET_DIR, name)
}

impl<F, D, K, P> Application<F, D, K, P>
where
    F: Filesystem,
    D: JpegDecoder,
    K: KvStore,
    P: PowerChip,
{
    /// Loads the catalog, restores the cursor and brings the persisted image
    /// back on screen without waiting for a trigger.
    pub fn new(mut fs: F, decoder: D, kv: K, chip: P, now: u64) -> Self {
        let catalog = Catalog::load(&mut fs, MANIFEST_PATH);
        info!("loaded {} images", catalog.len());
        let navigator = Navigator::new(CursorStore::open(kv), &catalog);
        let mut app = Self {
            fs,
            catalog,
            navigator,
            loader: ImageLoader::new(decoder),
            monitor: PowerMonitor::new(chip),
            boot_key: BootKey::new(),
            brightness: 128,
            show_charging: false,
            dirty: true,
        };
        let Self {
            fs,
            catalog,
            navigator,
            loader,
            ..
        } = &mut app;
        navigator.show_current(now, catalog, |name| loader.load(fs, &asset_path(name)));
        app
    }

    /// Periodic tick (~500 ms): services the power pipeline, blinks the
    /// charge glyph, runs the auto-advance timer and samples the boot key.
    pub fn tick(&mut self, now: u64, queue: &IrqQueue, boot_key_pressed: bool) -> Option<AppEvent> {
        self.monitor.service(queue);
        if self.monitor.snapshot().is_charging() {
            self.show_charging = !self.show_charging;
        } else {
            self.show_charging = false;
        }

        let Self {
            fs,
            catalog,
            navigator,
            loader,
            ..
        } = self;
        if let Some(Advance::Advanced { .. }) =
            navigator.poll_timer(now, catalog, |name| loader.load(fs, &asset_path(name)))
        {
            self.dirty = true;
        }

        if self.boot_key.sample(boot_key_pressed, TICK_PERIOD_MS) {
            return Some(AppEvent::RestartRequested);
        }
        None
    }

    /// Gesture callback, delivered on the UI thread. A tap steps the show;
    /// vertical swipes trim the backlight; horizontal swipes are reserved.
    pub fn handle_gesture(&mut self, gesture: Gesture, now: u64) {
        match gesture {
            Gesture::Tap => {
                self.trigger(Trigger::Tap, now);
            }
            Gesture::SwipeUp => {
                self.brightness = self.brightness.saturating_add(BRIGHTNESS_STEP);
                self.dirty = true;
            }
            Gesture::SwipeDown => {
                self.brightness = self.brightness.saturating_sub(BRIGHTNESS_STEP);
                self.dirty = true;
            }
            Gesture::SwipeLeft | Gesture::SwipeRight => {}
        }
    }

    /// Programmatic "next image".
    pub fn next(&mut self, now: u64) {
        self.trigger(Trigger::Next, now);
    }

    fn trigger(&mut self, trigger: Trigger, now: u64) {
        let Self {
            fs,
            catalog,
            navigator,
            loader,
            ..
        } = self;
        let outcome = navigator.advance(trigger, now, catalog, |name| {
            loader.load(fs, &asset_path(name))
        });
        // repaint after every attempted load, even a failed one
        if let Advance::Advanced { .. } = outcome {
            self.dirty = true;
        }
    }

    /// The current frame, if any decode has succeeded so far.
    pub fn frame(&self) -> Option<ImageRawBE<'_, Rgb565>> {
        self.loader.frame()
    }

    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.loader.size()
    }

    pub fn battery_icon(&self) -> BatteryIcon {
        BatteryIcon::pick(self.snapshot().battery_percent(), self.show_charging)
    }

    pub fn snapshot(&self) -> &PowerSnapshot {
        self.monitor.snapshot()
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn cursor(&self) -> usize {
        self.navigator.cursor()
    }

    pub fn catalog_len(&self) -> usize {
        self.catalog.len()
    }

    /// True once per repaint-worthy change; clears on read.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::take(&mut self.dirty)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::image_loader::LoadError;
    use crate::navigation::DEBOUNCE_US;
    use crate::power::{IrqFlags, PowerError};
    use crate::testkit::{encode_header, MemFs, MemKv, StripDecoder};

    struct QuietChip;
    impl PowerChip for QuietChip {
        fn read_irq_status(&mut self) -> Result<IrqFlags, PowerError> {
            Ok(IrqFlags::default())
        }
        fn battery_percent(&mut self) -> Result<u8, PowerError> {
            Ok(80)
        }
        fn is_charging(&mut self) -> Result<bool, PowerError> {
            Ok(false)
        }
    }

    fn three_image_fs() -> MemFs {
        let mut fs = MemFs::new();
        fs.insert("prod/meta.txt", b"a.jpg\nb.jpg\nc.jpg\n".to_vec());
        fs.insert("prod/a.jpg", encode_header(4, 4));
        fs.insert("prod/b.jpg", encode_header(6, 4));
        fs.insert("prod/c.jpg", encode_header(8, 4));
        fs
    }

    fn app(fs: MemFs, kv: MemKv) -> Application<MemFs, StripDecoder, MemKv, QuietChip> {
        Application::new(fs, StripDecoder, kv, QuietChip, 0)
    }

    #[test]
    fn startup_shows_the_persisted_image() {
        let kv = MemKv::new();
        kv.clone().set_i32("cursor", 1).unwrap();
        let mut app = app(three_image_fs(), kv);
        assert_eq!(app.cursor(), 1);
        assert_eq!(app.frame_size(), Some((6, 4)));
        assert!(app.take_dirty());
    }

    #[test]
    fn tap_advances_persists_and_resumes_after_restart() {
        let kv = MemKv::new();
        let queue = IrqQueue::new();
        let mut first = app(three_image_fs(), kv.clone());
        assert_eq!(first.cursor(), 0);
        assert_eq!(first.frame_size(), Some((4, 4)));

        first.tick(1_000_000, &queue, false);
        first.handle_gesture(Gesture::Tap, 1_100_000);
        assert_eq!(first.cursor(), 1);
        assert_eq!(first.frame_size(), Some((6, 4)));
        assert_eq!(kv.clone().get_i32("cursor"), Some(1));
        drop(first);

        // simulated power cycle: same store, fresh everything else
        let second = app(three_image_fs(), kv);
        assert_eq!(second.cursor(), 1);
        assert_eq!(second.frame_size(), Some((6, 4)));
    }

    #[test]
    fn tap_during_cooldown_is_discarded() {
        let mut app = app(three_image_fs(), MemKv::new());
        app.handle_gesture(Gesture::Tap, DEBOUNCE_US);
        assert_eq!(app.cursor(), 1);
        app.handle_gesture(Gesture::Tap, DEBOUNCE_US + 100_000);
        assert_eq!(app.cursor(), 1);
    }

    #[test]
    fn timer_tick_auto_advances() {
        let queue = IrqQueue::new();
        let mut app = app(three_image_fs(), MemKv::new());
        let _ = app.take_dirty();
        app.tick(4_999_999, &queue, false);
        assert_eq!(app.cursor(), 0);
        assert!(!app.take_dirty());
        app.tick(5_000_000, &queue, false);
        assert_eq!(app.cursor(), 1);
        assert!(app.take_dirty());
    }

    #[test]
    fn missing_asset_keeps_previous_frame_on_screen() {
        let kv = MemKv::new();
        let mut fs = three_image_fs();
        fs.remove("prod/b.jpg");
        let mut app = app(fs, kv);
        assert_eq!(app.frame_size(), Some((4, 4)));
        app.handle_gesture(Gesture::Tap, 1_000_000);
        // cursor advanced and was persisted, but the old frame is still shown
        assert_eq!(app.cursor(), 1);
        assert_eq!(app.frame_size(), Some((4, 4)));
        assert!(app.take_dirty());
    }

    #[test]
    fn empty_catalog_never_touches_the_loader() {
        let queue = IrqQueue::new();
        let mut app = app(MemFs::new(), MemKv::new());
        assert_eq!(app.catalog_len(), 0);
        assert!(app.frame().is_none());
        app.handle_gesture(Gesture::Tap, 1_000_000);
        app.tick(10_000_000, &queue, false);
        assert_eq!(app.cursor(), 0);
        assert!(app.frame().is_none());
    }

    #[test]
    fn swipes_trim_brightness_within_range() {
        let mut app = app(three_image_fs(), MemKv::new());
        assert_eq!(app.brightness(), 128);
        app.handle_gesture(Gesture::SwipeUp, 0);
        assert_eq!(app.brightness(), 133);
        for _ in 0..60 {
            app.handle_gesture(Gesture::SwipeUp, 0);
        }
        assert_eq!(app.brightness(), 255);
        for _ in 0..60 {
            app.handle_gesture(Gesture::SwipeDown, 0);
        }
        assert_eq!(app.brightness(), 0);
        // swipes don't advance the show
        assert_eq!(app.cursor(), 0);
    }

    #[test]
    fn long_press_requests_restart_once() {
        let queue = IrqQueue::new();
        let mut app = app(three_image_fs(), MemKv::new());
        let mut events = 0;
        let mut now = 1_000_000;
        for _ in 0..6 {
            now += 10_000_000;
            if app.tick(now, &queue, true) == Some(AppEvent::RestartRequested) {
                events += 1;
            }
        }
        assert_eq!(events, 1);
    }

    #[test]
    fn load_error_is_reported_per_kind() {
        let mut fs = MemFs::new();
        fs.insert("prod/meta.txt", b"bad.jpg\n".to_vec());
        fs.insert("prod/bad.jpg", b"garbage".to_vec());
        let mut loader = ImageLoader::new(StripDecoder);
        assert_eq!(loader.load(&mut fs, "prod/bad.jpg"), Err(LoadError::Decode));
        assert_eq!(loader.load(&mut fs, "prod/none.jpg"), Err(LoadError::Open));
    }
}
