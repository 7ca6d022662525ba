//! Readout screen
//!
//! Top half: current / average / maximum rate and cumulative dose, coloured by
//! radiation level. Bottom half: the 1-hour and 24-hour trend bars, scaled with
//! [`axis_ceiling`].

use core::fmt::Write;

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_10X20};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Text};
use geiger_core::Snapshot;
use geiger_core::history::axis_ceiling;
use geiger_core::level::RadiationLevel;
use heapless::String;

use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

const BACKGROUND: Rgb565 = Rgb565::BLACK;
const LABEL_COLOR: Rgb565 = Rgb565::CSS_LIGHT_GRAY;
const ALARM_COLOR: Rgb565 = Rgb565::CSS_RED;

const READOUT_HEIGHT: u32 = 120;
const CHART_MARGIN: i32 = 8;
const CHART_LABEL_HEIGHT: i32 = 12;

fn level_color(level: RadiationLevel) -> Rgb565 {
    let rgb = level.rgb();
    let r = ((rgb >> 16) & 0xFF) as u8;
    let g = ((rgb >> 8) & 0xFF) as u8;
    let b = (rgb & 0xFF) as u8;
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

/// Redraw the scalar readout
pub fn draw_readout<D>(display: &mut D, snapshot: &Snapshot, alarm_active: bool) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    Rectangle::new(Point::zero(), Size::new(DISPLAY_WIDTH as u32, READOUT_HEIGHT))
        .into_styled(PrimitiveStyle::with_fill(BACKGROUND))
        .draw(display)?;

    let level = snapshot.level();
    let big = MonoTextStyle::new(&FONT_10X20, level_color(level));
    let small = MonoTextStyle::new(&FONT_6X10, LABEL_COLOR);

    let mut line: String<48> = String::new();
    let _ = write!(line, "{:.3} uSv/h", snapshot.current_rate);
    Text::with_alignment(&line, Point::new(DISPLAY_WIDTH as i32 / 2, 28), big, Alignment::Center)
        .draw(display)?;

    Text::with_alignment(
        level.label(),
        Point::new(DISPLAY_WIDTH as i32 / 2, 46),
        small,
        Alignment::Center,
    )
    .draw(display)?;

    line.clear();
    let _ = write!(
        line,
        "avg {:.3}  max {:.3} uSv/h",
        snapshot.average_rate, snapshot.max_rate
    );
    Text::new(&line, Point::new(CHART_MARGIN, 72), small).draw(display)?;

    line.clear();
    let _ = write!(
        line,
        "dose {:.5} mSv  pulses {}",
        snapshot.cumulative_dose, snapshot.total_pulses
    );
    Text::new(&line, Point::new(CHART_MARGIN, 88), small).draw(display)?;

    if alarm_active {
        Text::new(
            "ALARM",
            Point::new(CHART_MARGIN, 108),
            MonoTextStyle::new(&FONT_10X20, ALARM_COLOR),
        )
        .draw(display)?;
    }

    Ok(())
}

/// Redraw one trend chart as bars, oldest on the left
pub fn draw_trend<D>(display: &mut D, area: Rectangle, title: &str, series: &[f32]) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    area.into_styled(PrimitiveStyle::with_fill(BACKGROUND))
        .draw(display)?;

    let max = series.iter().copied().fold(0.0, f32::max);
    let ceiling = axis_ceiling(max);

    let small = MonoTextStyle::new(&FONT_6X10, LABEL_COLOR);
    let mut label: String<32> = String::new();
    let _ = write!(label, "{} (0-{})", title, ceiling);
    Text::new(&label, area.top_left + Point::new(0, 9), small).draw(display)?;

    if series.is_empty() {
        return Ok(());
    }

    let plot_top = area.top_left.y + CHART_LABEL_HEIGHT;
    let plot_height = area.size.height as i32 - CHART_LABEL_HEIGHT;
    let bar_width = (area.size.width / series.len() as u32).max(1);

    for (i, &value) in series.iter().enumerate() {
        let height = ((value / ceiling).clamp(0.0, 1.0) * plot_height as f32) as u32;
        if height == 0 {
            continue;
        }
        let x = area.top_left.x + (i as u32 * bar_width) as i32;
        let y = plot_top + plot_height - height as i32;
        Rectangle::new(Point::new(x, y), Size::new(bar_width.saturating_sub(1).max(1), height))
            .into_styled(PrimitiveStyle::with_fill(level_color(RadiationLevel::assess(value))))
            .draw(display)?;
    }

    Ok(())
}

/// Left and right chart areas below the readout
pub fn chart_areas() -> (Rectangle, Rectangle) {
    let top = READOUT_HEIGHT as i32 + CHART_MARGIN;
    let height = DISPLAY_HEIGHT as u32 - READOUT_HEIGHT - 2 * CHART_MARGIN as u32;
    let width = (DISPLAY_WIDTH as u32 - 3 * CHART_MARGIN as u32) / 2;

    (
        Rectangle::new(Point::new(CHART_MARGIN, top), Size::new(width, height)),
        Rectangle::new(
            Point::new(2 * CHART_MARGIN + width as i32, top),
            Size::new(width, height),
        ),
    )
}
