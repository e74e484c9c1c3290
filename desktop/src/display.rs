use embedded_graphics::{
    Drawable,
    pixelcolor::{Rgb565, Rgb888, RgbColor},
    prelude::{DrawTarget, OriginDimensions, Pixel, Point, Primitive, Size},
    primitives::{PrimitiveStyle, Rectangle},
};

use frame_core::input::Gesture;
use frame_core::power::BatteryIcon;

pub const WIDTH: usize = 400;
pub const HEIGHT: usize = 450;

/// Everything the event loop wants to know after one input poll.
#[derive(Default)]
pub struct InputEvents {
    pub gestures: Vec<Gesture>,
    pub next: bool,
    pub charger_toggle: bool,
    pub boot_key_down: bool,
}

/// Simulated LCD panel in a minifb window. Implements `DrawTarget` so the
/// frame and the status overlay render through embedded-graphics, same as
/// the device panel would.
pub struct FrameWindow {
    window: minifb::Window,
    buffer: Vec<u32>,
    shaded: Vec<u32>,
    mouse_was_down: bool,
}

impl FrameWindow {
    pub fn new() -> Self {
        let mut window = minifb::Window::new(
            "Photoframe Desktop",
            WIDTH,
            HEIGHT,
            minifb::WindowOptions::default(),
        )
        .unwrap_or_else(|e| {
            panic!("Unable to open window: {}", e);
        });
        window.set_target_fps(60);
        Self {
            window,
            buffer: vec![0xFF000000; WIDTH * HEIGHT],
            shaded: vec![0xFF000000; WIDTH * HEIGHT],
            mouse_was_down: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(minifb::Key::Escape)
    }

    /// Samples the keyboard/mouse, mapping them onto the device's touch
    /// gestures and keys. Must be called once per loop iteration.
    pub fn poll_input(&mut self) -> InputEvents {
        let mut events = InputEvents::default();

        let mouse_down = self.window.get_mouse_down(minifb::MouseButton::Left);
        if mouse_down && !self.mouse_was_down {
            events.gestures.push(Gesture::Tap);
        }
        self.mouse_was_down = mouse_down;

        let pressed = |key| self.window.is_key_pressed(key, minifb::KeyRepeat::No);
        if pressed(minifb::Key::Up) {
            events.gestures.push(Gesture::SwipeUp);
        }
        if pressed(minifb::Key::Down) {
            events.gestures.push(Gesture::SwipeDown);
        }
        if pressed(minifb::Key::Left) {
            events.gestures.push(Gesture::SwipeLeft);
        }
        if pressed(minifb::Key::Right) {
            events.gestures.push(Gesture::SwipeRight);
        }
        events.next = pressed(minifb::Key::Space);
        events.charger_toggle = pressed(minifb::Key::C);
        events.boot_key_down = self.window.is_key_down(minifb::Key::B);
        events
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0xFF000000);
    }

    /// Battery glyph in the top-left corner, where the device panel puts it.
    pub fn draw_battery(&mut self, icon: BatteryIcon) {
        let (segments, color) = match icon {
            BatteryIcon::Full => (4, Rgb565::new(22, 52, 26)),
            BatteryIcon::ThreeQuarters => (3, Rgb565::new(22, 52, 26)),
            BatteryIcon::Half => (2, Rgb565::new(22, 52, 26)),
            BatteryIcon::Quarter => (1, Rgb565::new(28, 40, 10)),
            BatteryIcon::Low => (1, Rgb565::new(28, 12, 6)),
            BatteryIcon::Charging => (4, Rgb565::new(16, 58, 19)),
        };
        let outline = PrimitiveStyle::with_stroke(Rgb565::WHITE, 1);
        Rectangle::new(Point::new(8, 8), Size::new(26, 12))
            .into_styled(outline)
            .draw(self)
            .ok();
        Rectangle::new(Point::new(34, 11), Size::new(2, 6))
            .into_styled(PrimitiveStyle::with_fill(Rgb565::WHITE))
            .draw(self)
            .ok();
        for segment in 0..segments {
            Rectangle::new(Point::new(10 + segment * 6, 10), Size::new(5, 8))
                .into_styled(PrimitiveStyle::with_fill(color))
                .draw(self)
                .ok();
        }
    }

    /// Pushes the buffer to the window, dimmed by the backlight level.
    pub fn present(&mut self, brightness: u8) {
        let scale = brightness as u32;
        for (dst, src) in self.shaded.iter_mut().zip(self.buffer.iter()) {
            let r = ((src >> 16) & 0xFF) * scale / 255;
            let g = ((src >> 8) & 0xFF) * scale / 255;
            let b = (src & 0xFF) * scale / 255;
            *dst = 0xFF000000 | (r << 16) | (g << 8) | b;
        }
        self.window
            .update_with_buffer(&self.shaded, WIDTH, HEIGHT)
            .unwrap();
    }
}

impl OriginDimensions for FrameWindow {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl DrawTarget for FrameWindow {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            if coord.x < 0 || coord.y < 0 || coord.x >= WIDTH as i32 || coord.y >= HEIGHT as i32 {
                continue;
            }
            let rgb = Rgb888::from(color);
            let value = 0xFF000000
                | ((rgb.r() as u32) << 16)
                | ((rgb.g() as u32) << 8)
                | rgb.b() as u32;
            self.buffer[coord.y as usize * WIDTH + coord.x as usize] = value;
        }
        Ok(())
    }
}
