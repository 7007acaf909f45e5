use std::f32::consts::{PI, TAU};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn offset(self, by: Vec2) -> Vec2 {
        Vec2 {
            x: self.x + by.x,
            y: self.y + by.y,
        }
    }

    /// Angle of the vector from `self` to `other`, in radians, measured from +x.
    pub fn angle_to(self, other: Vec2) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub(crate) fn from_polar(origin: Vec2, angle: f32, radius: f32) -> Vec2 {
        Vec2 {
            x: origin.x + angle.cos() * radius,
            y: origin.y + angle.sin() * radius,
        }
    }
}

/// Position plus facing. Every position-providing collaborator hands poses in this shape.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    pub position: Vec2,
    pub angle: f32,
}

impl Pose {
    pub const fn new(x: f32, y: f32, angle: f32) -> Self {
        Self {
            position: Vec2 { x, y },
            angle,
        }
    }

    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            angle: 0.0,
        }
    }
}

/// Axis-aligned rectangle, `origin` is the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2 {
            x: self.x + self.width * 0.5,
            y: self.y + self.height * 0.5,
        }
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Clips the segment `from..=to` against the rect; touching an edge counts.
    pub fn intersects_segment(&self, from: Vec2, to: Vec2) -> bool {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let mut enter = 0.0f32;
        let mut exit = 1.0f32;
        for (p, q) in [
            (-dx, from.x - self.x),
            (dx, self.right() - from.x),
            (-dy, from.y - self.y),
            (dy, self.bottom() - from.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return false;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                if t > exit {
                    return false;
                }
                enter = enter.max(t);
            } else {
                if t < enter {
                    return false;
                }
                exit = exit.min(t);
            }
        }
        enter <= exit
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0)
    }
}

/// Wraps an angle into `(-PI, PI]`.
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Shortest signed difference `to - from`, in `(-PI, PI]`.
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let diff = to - from;
    diff.sin().atan2(diff.cos())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color `{raw}`: expected #rrggbb or 0xrrggbb")]
pub struct ColorParseError {
    pub raw: String,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_rgb_hex(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xff) as u8,
            g: ((value >> 8) & 0xff) as u8,
            b: (value & 0xff) as u8,
        }
    }

    pub fn to_rgb_hex(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Accepts `#rrggbb`, `0xrrggbb`, `rrggbb` and Tiled's `#aarrggbb` (alpha dropped).
    pub fn parse_hex(raw: &str) -> Result<Self, ColorParseError> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .unwrap_or(trimmed);
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError {
                raw: raw.to_string(),
            });
        }
        let rgb_digits = match digits.len() {
            6 => digits,
            8 => &digits[2..],
            _ => {
                return Err(ColorParseError {
                    raw: raw.to_string(),
                })
            }
        };
        u32::from_str_radix(rgb_digits, 16)
            .map(Self::from_rgb_hex)
            .map_err(|_| ColorParseError {
                raw: raw.to_string(),
            })
    }

    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let channel = |a: u8, b: u8| -> u8 {
            let value = a as f32 + (b as f32 - a as f32) * t;
            value.round().clamp(0.0, 255.0) as u8
        };
        Color {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}
