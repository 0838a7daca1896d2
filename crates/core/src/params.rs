use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::RgbColor;

/// A single editable module parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i32),
    Bool(bool),
    Vec2([f64; 2]),
    Text(String),
    Color([f32; 3]),
    /// Control points of a user curve, `[x, y]` pairs sorted by x.
    Curve(Vec<[f64; 2]>),
    Stops(Vec<ColorStop>),
    Image(ImageData),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Float(_) => "float",
            ParamValue::Int(_) => "int",
            ParamValue::Bool(_) => "bool",
            ParamValue::Vec2(_) => "vec2",
            ParamValue::Text(_) => "text",
            ParamValue::Color(_) => "color",
            ParamValue::Curve(_) => "curve",
            ParamValue::Stops(_) => "stops",
            ParamValue::Image(_) => "image",
        }
    }
}

/// One color stop of a spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f64,
    pub color: RgbColor,
}

impl ColorStop {
    pub fn new(position: f64, color: RgbColor) -> Self {
        Self { position, color }
    }
}

/// Raw pixels of an image lookup module, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<RgbColor>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<RgbColor>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == self.width as usize * self.height as usize
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeParams {
    pub values: BTreeMap<String, ParamValue>,
}

impl NodeParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: ParamValue) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("unknown parameter `{0}`")]
    Unknown(String),
    #[error("parameter `{key}` expects {expected}, got {got}")]
    WrongType {
        key: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("invalid value for `{key}`: {message}")]
    Invalid { key: String, message: String },
}

impl ParamError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        ParamError::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

pub(crate) fn expect_float(key: &str, value: &ParamValue) -> Result<f64, ParamError> {
    match value {
        ParamValue::Float(v) if v.is_finite() => Ok(*v),
        ParamValue::Float(_) => Err(ParamError::invalid(key, "must be finite")),
        ParamValue::Int(v) => Ok(f64::from(*v)),
        other => Err(wrong_type(key, "float", other)),
    }
}

pub(crate) fn expect_int(key: &str, value: &ParamValue) -> Result<i32, ParamError> {
    match value {
        ParamValue::Int(v) => Ok(*v),
        other => Err(wrong_type(key, "int", other)),
    }
}

pub(crate) fn expect_bool(key: &str, value: &ParamValue) -> Result<bool, ParamError> {
    match value {
        ParamValue::Bool(v) => Ok(*v),
        other => Err(wrong_type(key, "bool", other)),
    }
}

pub(crate) fn expect_vec2(key: &str, value: &ParamValue) -> Result<[f64; 2], ParamError> {
    match value {
        ParamValue::Vec2(v) if v.iter().all(|c| c.is_finite()) => Ok(*v),
        ParamValue::Vec2(_) => Err(ParamError::invalid(key, "must be finite")),
        other => Err(wrong_type(key, "vec2", other)),
    }
}

pub(crate) fn expect_color(key: &str, value: &ParamValue) -> Result<RgbColor, ParamError> {
    match value {
        ParamValue::Color(rgb) => Ok(RgbColor::from_array(*rgb)),
        other => Err(wrong_type(key, "color", other)),
    }
}

pub(crate) fn wrong_type(key: &str, expected: &'static str, got: &ParamValue) -> ParamError {
    ParamError::WrongType {
        key: key.to_string(),
        expected,
        got: got.type_name(),
    }
}
