//! Text pages and the framebuffer they are presented on.
//!
//! The four pages are ordinary kernel memory in VGA text layout, so user
//! programs can map them with vidmap. On timer ticks the live page is drawn
//! to the bootloader's framebuffer with embedded-graphics, touching only the
//! cells that changed since the last frame.
use bootloader_api::info::{FrameBuffer, PixelFormat};
use core::ptr::addr_of_mut;
use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyleBuilder},
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
    Drawable,
};

use crate::arch::paging::{Paging, PagingError};
use crate::config::{SCREEN_COLS, SCREEN_ROWS, TERMINAL_COUNT};
use crate::hw::VideoPage;
use crate::terminal::TextPage;

const CELL_WIDTH: i32 = 10;
const CELL_HEIGHT: i32 = 20;
const CURSOR_HEIGHT: u32 = 2;

/// VGA attribute colours.
const PALETTE: [Rgb888; 16] = [
    Rgb888::new(0x00, 0x00, 0x00),
    Rgb888::new(0x00, 0x00, 0xaa),
    Rgb888::new(0x00, 0xaa, 0x00),
    Rgb888::new(0x00, 0xaa, 0xaa),
    Rgb888::new(0xaa, 0x00, 0x00),
    Rgb888::new(0xaa, 0x00, 0xaa),
    Rgb888::new(0xaa, 0x55, 0x00),
    Rgb888::new(0xaa, 0xaa, 0xaa),
    Rgb888::new(0x55, 0x55, 0x55),
    Rgb888::new(0x55, 0x55, 0xff),
    Rgb888::new(0x55, 0xff, 0x55),
    Rgb888::new(0x55, 0xff, 0xff),
    Rgb888::new(0xff, 0x55, 0x55),
    Rgb888::new(0xff, 0x55, 0xff),
    Rgb888::new(0xff, 0xff, 0x55),
    Rgb888::new(0xff, 0xff, 0xff),
];

pub struct FramebufferWriter {
    framebuffer: &'static mut [u8],
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub bytes_per_pixel: usize,
    format: PixelFormat,
}

impl FramebufferWriter {
    pub fn new(fb: &'static mut FrameBuffer) -> Self {
        let info = fb.info();
        Self {
            framebuffer: fb.buffer_mut(),
            width: info.width,
            height: info.height,
            stride: info.stride,
            bytes_per_pixel: info.bytes_per_pixel,
            format: info.pixel_format,
        }
    }

    /// Fill entire screen with a color
    pub fn clear(&mut self, color: Rgb888) {
        let _ = Rectangle::new(Point::zero(), self.size())
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(self);
    }

    fn draw_cell(&mut self, row: usize, col: usize, cell: u16) {
        let byte = (cell & 0xff) as u8;
        let attribute = (cell >> 8) as u8;
        let style = MonoTextStyleBuilder::new()
            .font(&FONT_10X20)
            .text_color(PALETTE[usize::from(attribute & 0x0f)])
            .background_color(PALETTE[usize::from(attribute >> 4 & 0x07)])
            .build();
        let glyph = [if byte.is_ascii_graphic() { byte } else { b' ' }];
        let text = core::str::from_utf8(&glyph).unwrap_or(" ");
        let _ = Text::with_baseline(text, cell_origin(row, col), style, Baseline::Top).draw(self);
    }

    fn draw_cursor(&mut self, row: usize, col: usize, cell: u16) {
        let color = PALETTE[usize::from((cell >> 8) as u8 & 0x0f)];
        let origin = cell_origin(row, col) + Point::new(0, CELL_HEIGHT - CURSOR_HEIGHT as i32);
        let _ = Rectangle::new(origin, Size::new(CELL_WIDTH as u32, CURSOR_HEIGHT))
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(self);
    }
}

fn cell_origin(row: usize, col: usize) -> Point {
    Point::new(col as i32 * CELL_WIDTH, row as i32 * CELL_HEIGHT)
}

// Implement DrawTarget for embedded-graphics
impl DrawTarget for FramebufferWriter {
    type Color = Rgb888;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
                continue;
            }

            let offset = (y as usize * self.stride + x as usize) * self.bytes_per_pixel;
            let Some(pixel) = self.framebuffer.get_mut(offset..offset + self.bytes_per_pixel) else {
                continue;
            };
            match self.format {
                PixelFormat::Rgb => {
                    pixel[0] = color.r();
                    pixel[1] = color.g();
                    pixel[2] = color.b();
                }
                PixelFormat::U8 => {
                    pixel[0] = ((u16::from(color.r()) + u16::from(color.g()) + u16::from(color.b())) / 3) as u8;
                }
                _ => {
                    pixel[0] = color.b();
                    pixel[1] = color.g();
                    pixel[2] = color.r();
                }
            }
        }
        Ok(())
    }
}

impl OriginDimensions for FramebufferWriter {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

const PAGE_COUNT: usize = 1 + TERMINAL_COUNT;

static mut PAGES: [TextPage; PAGE_COUNT] = [const { TextPage::blank() }; PAGE_COUNT];

pub struct Screen {
    pages: &'static mut [TextPage; PAGE_COUNT],
    phys: [u64; PAGE_COUNT],
    cursor: (usize, usize),
    fb: Option<FramebufferWriter>,
    shown: TextPage,
    shown_cursor: (usize, usize),
    stale: bool,
}

impl Screen {
    /// Takes the text pages; call once.
    pub fn new(paging: &Paging, fb: Option<FramebufferWriter>) -> Result<Self, PagingError> {
        let pages = unsafe { &mut *addr_of_mut!(PAGES) };
        let mut phys = [0; PAGE_COUNT];
        for (slot, page) in phys.iter_mut().zip(pages.iter()) {
            *slot = paging.phys_of(page as *const TextPage)?;
        }
        if fb.is_none() {
            log::warn!("no framebuffer, terminal output is not displayed");
        }
        Ok(Self {
            pages,
            phys,
            cursor: (0, 0),
            fb,
            shown: TextPage::blank(),
            shown_cursor: (0, 0),
            stale: true,
        })
    }

    fn slot(page: VideoPage) -> usize {
        match page {
            VideoPage::Live => 0,
            VideoPage::Backing(tid) => 1 + tid.index(),
        }
    }

    pub fn page_phys(&self, page: VideoPage) -> u64 {
        self.phys[Self::slot(page)]
    }

    pub fn page_mut(&mut self, page: VideoPage) -> &mut TextPage {
        &mut self.pages[Self::slot(page)]
    }

    pub fn set_cursor(&mut self, row: usize, col: usize) {
        self.cursor = (row, col);
    }

    /// Draws what changed on the live page since the previous call.
    pub fn present(&mut self) {
        let Some(fb) = self.fb.as_mut() else {
            return;
        };
        if self.stale {
            fb.clear(PALETTE[0]);
        }
        let live = &self.pages[0];
        for row in 0..SCREEN_ROWS {
            for col in 0..SCREEN_COLS {
                let cell = live.cell(row, col);
                let moved = (row, col) == self.shown_cursor || (row, col) == self.cursor;
                if self.stale || moved || cell != self.shown.cell(row, col) {
                    fb.draw_cell(row, col, cell);
                }
            }
        }
        let (row, col) = self.cursor;
        if row < SCREEN_ROWS && col < SCREEN_COLS {
            fb.draw_cursor(row, col, live.cell(row, col));
        }
        self.shown.clone_from(live);
        self.shown_cursor = self.cursor;
        self.stale = false;
    }
}
