use std::time::Instant;

use embedded_graphics::{image::Image, prelude::Point, Drawable};

use frame_core::{
    application::{AppEvent, Application, TICK_PERIOD_MS},
    power::IrqQueue,
};

use crate::assets::{DirFilesystem, FileKv, ImageCrateDecoder, SimPmu};
use crate::display::{FrameWindow, HEIGHT, WIDTH};

mod assets;
mod display;

// Shared with the (simulated) interrupt context, exactly as on the device.
static IRQ_QUEUE: IrqQueue = IrqQueue::new();

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Photoframe desktop simulator started");

    let root = std::env::args().nth(1).unwrap_or_else(|| "assets".into());
    let fs = DirFilesystem::new(&root);
    let kv = FileKv::open(std::path::Path::new(&root).join(".frame_nvs"));
    let (pmu, pmu_control) = SimPmu::new();

    let mut window = FrameWindow::new();
    let start = Instant::now();
    let mut application = Application::new(fs, ImageCrateDecoder, kv, pmu, 0);
    let mut last_tick_us = 0u64;

    while window.is_open() {
        let now = start.elapsed().as_micros() as u64;

        let events = window.poll_input();
        for gesture in events.gestures {
            application.handle_gesture(gesture, now);
        }
        if events.next {
            application.next(now);
        }
        if events.charger_toggle {
            pmu_control.toggle_charging(&IRQ_QUEUE);
        }

        if now.saturating_sub(last_tick_us) >= TICK_PERIOD_MS as u64 * 1000 {
            last_tick_us = now;
            if let Some(AppEvent::RestartRequested) =
                application.tick(now, &IRQ_QUEUE, events.boot_key_down)
            {
                log::info!("boot key long press, restart requested");
            }
            // the tick may have blinked the charge glyph
            redraw(&mut window, &application);
        }

        if application.take_dirty() {
            redraw(&mut window, &application);
        }
        window.present(application.brightness());
    }
}

fn redraw<F, D, K, P>(window: &mut FrameWindow, application: &Application<F, D, K, P>)
where
    F: frame_core::fs::Filesystem,
    D: frame_core::image_loader::JpegDecoder,
    K: frame_core::store::KvStore,
    P: frame_core::power::PowerChip,
{
    window.clear();
    if let Some(frame) = application.frame() {
        let (w, h) = application.frame_size().unwrap_or((0, 0));
        let origin = Point::new(
            (WIDTH as i32 - w as i32) / 2,
            (HEIGHT as i32 - h as i32) / 2,
        );
        Image::new(&frame, origin).draw(window).ok();
    }
    window.draw_battery(application.battery_icon());
}
