//! Strip-chart geometry
//!
//! Turns a [`PedalHistory`] into drawable primitives for a `width x height`
//! surface: background, percentage grid, throttle polyline and a brake trace
//! split into sub-segments wherever the ABS flag changes. Geometry is rebuilt
//! from scratch on every call; nothing is cached between redraws.

use crate::history::{PedalHistory, PedalPoint};
use std::fmt;

/// Grid levels drawn across the chart
pub const GRID_LEVELS: [f32; 4] = [0.25, 0.5, 0.75, 1.0];

/// Horizontal inset of grid labels from the right edge
const LABEL_INSET_X: f32 = 4.0;
/// Vertical offset of grid labels below their line
const LABEL_OFFSET_Y: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

impl Stroke {
    pub const fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

/// Colors and line widths of the chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub grid: Stroke,
    pub label: Color,
    pub label_size: f32,
    pub throttle: Stroke,
    pub brake: Stroke,
    pub abs: Stroke,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: Color::rgb(0x1A, 0x1A, 0x1A),
            grid: Stroke::new(Color::rgb(0x33, 0x33, 0x33), 1.0),
            label: Color::rgb(0x66, 0x66, 0x66),
            label_size: 10.0,
            throttle: Stroke::new(Color::rgb(0x00, 0xC8, 0x00), 1.5),
            brake: Stroke::new(Color::rgb(0xE0, 0x20, 0x20), 1.5),
            abs: Stroke::new(Color::rgb(0xFF, 0xA5, 0x00), 2.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// One horizontal grid line and its label
#[derive(Debug, Clone, PartialEq)]
pub struct GridLine {
    pub level: f32,
    pub y: f32,
    pub label: String,
    /// Right edge and top of the label text
    pub label_anchor: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polyline {
    pub stroke: Stroke,
    pub points: Vec<Point>,
}

/// A run of the brake trace sharing one ABS flag
#[derive(Debug, Clone, PartialEq)]
pub struct BrakeSegment {
    pub abs: bool,
    pub stroke: Stroke,
    pub points: Vec<Point>,
}

/// Everything needed to draw one redraw of the chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFrame {
    pub width: f32,
    pub height: f32,
    pub background: Color,
    pub grid_stroke: Stroke,
    pub label_color: Color,
    pub label_size: f32,
    pub grid: Vec<GridLine>,
    /// `None` until at least two samples are buffered
    pub throttle: Option<Polyline>,
    pub brake: Vec<BrakeSegment>,
}

impl ChartFrame {
    pub fn has_traces(&self) -> bool {
        self.throttle.is_some()
    }

    /// Total vertices across all traces
    pub fn vertex_count(&self) -> usize {
        let throttle = self.throttle.as_ref().map_or(0, |p| p.points.len());
        throttle + self.brake.iter().map(|s| s.points.len()).sum::<usize>()
    }
}

/// Builds [`ChartFrame`]s from pedal history
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    palette: Palette,
}

impl ChartRenderer {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Render `history` onto a `width x height` surface.
    ///
    /// Returns `None` for an empty or negative surface. The x axis spans the
    /// full capacity, so a partially filled history occupies the left part.
    pub fn render<const N: usize>(
        &self,
        history: &PedalHistory<N>,
        width: f32,
        height: f32,
    ) -> Option<ChartFrame> {
        if !(width > 0.0 && height > 0.0) {
            return None;
        }

        let mut frame = ChartFrame {
            width,
            height,
            background: self.palette.background,
            grid_stroke: self.palette.grid,
            label_color: self.palette.label,
            label_size: self.palette.label_size,
            grid: grid_lines(width, height),
            throttle: None,
            brake: Vec::new(),
        };

        if history.len() < 2 {
            return Some(frame);
        }

        let step = width / (history.capacity() - 1) as f32;
        let project = |i: usize, value: f32| Point {
            x: i as f32 * step,
            y: height * (1.0 - value),
        };

        frame.throttle = Some(Polyline {
            stroke: self.palette.throttle,
            points: history
                .iter()
                .enumerate()
                .map(|(i, p)| project(i, p.throttle))
                .collect(),
        });

        frame.brake = segment_brake(
            history
                .iter()
                .enumerate()
                .map(|(i, p): (usize, PedalPoint)| (project(i, p.brake), p.abs)),
        )
        .into_iter()
        .map(|(abs, points)| BrakeSegment {
            abs,
            stroke: if abs {
                self.palette.abs
            } else {
                self.palette.brake
            },
            points,
        })
        .collect();

        Some(frame)
    }
}

fn grid_lines(width: f32, height: f32) -> Vec<GridLine> {
    GRID_LEVELS
        .iter()
        .map(|&level| {
            let y = height * (1.0 - level);
            GridLine {
                level,
                y,
                label: format!("{}%", (level * 100.0).round() as i32),
                label_anchor: Point {
                    x: width - LABEL_INSET_X,
                    y: y + LABEL_OFFSET_Y,
                },
            }
        })
        .collect()
}

/// Split a brake trace into runs of equal ABS flag.
///
/// The tag is seeded from the first point. When a point's flag differs from
/// the open run, that point closes the run and also opens the next one, so
/// boundary vertices appear twice and adjacent runs stay connected.
pub fn segment_brake<I>(points: I) -> Vec<(bool, Vec<Point>)>
where
    I: IntoIterator<Item = (Point, bool)>,
{
    let mut points = points.into_iter();
    let Some((first, mut tag)) = points.next() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut open = vec![first];

    for (point, abs) in points {
        open.push(point);
        if abs != tag {
            segments.push((tag, std::mem::replace(&mut open, vec![point])));
            tag = abs;
        }
    }
    segments.push((tag, open));

    segments
}
