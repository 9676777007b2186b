//! Path encodings and the canonical command stream
//!
//! Freehand strokes reach us in one of three shapes: a list of
//! `[command, ...operands]` tuples, an older object keyed by stringified
//! indices, or an SVG path string. [`parse`] turns all of them into one
//! [`CommandStream`] so nothing downstream has to care which dialect produced it.
//!
//! Only move, line, quadratic, cubic and close carry geometry. The SVG
//! commands `H`, `V`, `S`, `T` and `A` are recognized but kept without
//! operands, so any geometry they describe is dropped.

use crate::geometry::Point;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PathError {
    #[error("path entry {index} is not a command tuple")]
    NotATuple { index: usize },
    #[error("path entry {index} has no recognizable command")]
    InvalidCommand { index: usize },
    #[error("command {command} expects {expected} operands, found {found}")]
    MissingOperands { command: char, expected: usize, found: usize },
    #[error("command {command} has a non-numeric operand")]
    InvalidOperand { command: char },
    #[error("path transform has a non-finite {field}")]
    InvalidTransform { field: &'static str },
}

/// Raw path geometry as it appears on the wire
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PathEncoding {
    /// `null`, absent, empty, or a value of an unrecognized type
    #[default]
    Empty,
    /// `[["M", 0, 0], ["L", 10, 10]]`
    Segments(Vec<Value>),
    /// `{"0": ["M", 0, 0], "1": ["L", 10, 10]}`
    Keyed(Map<String, Value>),
    /// `"M 0 0 L 10 10"`
    Svg(String),
}

impl PathEncoding {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(items) if !items.is_empty() => Self::Segments(items),
            Value::Object(map) if !map.is_empty() => Self::Keyed(map),
            Value::String(text) if !text.trim().is_empty() => Self::Svg(text),
            _ => Self::Empty,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Segments(items) => Value::Array(items.clone()),
            Self::Keyed(map) => Value::Object(map.clone()),
            Self::Svg(text) => Value::String(text.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl Serialize for PathEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PathEncoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

/// Command letter of the canonical stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathVerb {
    Move,
    Line,
    Quad,
    Cubic,
    Close,
    /// A recognized SVG command whose operands are not extracted
    Unsupported(char),
}

impl PathVerb {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'M' => Some(Self::Move),
            'L' => Some(Self::Line),
            'Q' => Some(Self::Quad),
            'C' => Some(Self::Cubic),
            'Z' => Some(Self::Close),
            upper @ ('H' | 'V' | 'S' | 'T' | 'A') => Some(Self::Unsupported(upper)),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Move => 'M',
            Self::Line => 'L',
            Self::Quad => 'Q',
            Self::Cubic => 'C',
            Self::Close => 'Z',
            Self::Unsupported(letter) => letter,
        }
    }

    /// Number of operands the command consumes in the canonical stream
    pub fn arity(self) -> usize {
        match self {
            Self::Move | Self::Line => 2,
            Self::Quad => 4,
            Self::Cubic => 6,
            Self::Close | Self::Unsupported(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathToken {
    Command(PathVerb),
    Number(f64),
}

/// One command of the stream with its operands grouped into points
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    QuadTo { ctrl: Point, to: Point },
    CubicTo { ctrl1: Point, ctrl2: Point, to: Point },
    Close,
    Unsupported(char),
}

/// Flat `M x y L x y ...` sequence, the only form the flattener reads
///
/// Commands and operands alternate exactly as [`PathVerb::arity`] dictates;
/// [`CommandStream::push`] is the only way in and enforces it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandStream {
    tokens: Vec<PathToken>,
}

impl CommandStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, verb: PathVerb, operands: &[f64]) -> Result<(), PathError> {
        if operands.len() != verb.arity() {
            return Err(PathError::MissingOperands {
                command: verb.letter(),
                expected: verb.arity(),
                found: operands.len(),
            });
        }
        if operands.iter().any(|value| !value.is_finite()) {
            return Err(PathError::InvalidOperand { command: verb.letter() });
        }

        self.tokens.push(PathToken::Command(verb));
        self.tokens.extend(operands.iter().copied().map(PathToken::Number));
        Ok(())
    }

    pub fn tokens(&self) -> &[PathToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn segments(&self) -> Vec<PathSegment> {
        let mut segments = Vec::new();
        let mut index = 0;

        while index < self.tokens.len() {
            let PathToken::Command(verb) = self.tokens[index] else {
                index += 1;
                continue;
            };
            let operands: Vec<f64> = self.tokens[index + 1..]
                .iter()
                .take(verb.arity())
                .filter_map(|token| match token {
                    PathToken::Number(value) => Some(*value),
                    PathToken::Command(_) => None,
                })
                .collect();
            index += 1 + verb.arity();

            let point = |i: usize| Point::new(operands[i], operands[i + 1]);
            segments.push(match verb {
                PathVerb::Move => PathSegment::MoveTo(point(0)),
                PathVerb::Line => PathSegment::LineTo(point(0)),
                PathVerb::Quad => PathSegment::QuadTo { ctrl: point(0), to: point(2) },
                PathVerb::Cubic => {
                    PathSegment::CubicTo { ctrl1: point(0), ctrl2: point(2), to: point(4) }
                }
                PathVerb::Close => PathSegment::Close,
                PathVerb::Unsupported(letter) => PathSegment::Unsupported(letter),
            });
        }

        segments
    }

    /// Smallest x and y over every endpoint and control point, if any
    pub fn min_point(&self) -> Option<Point> {
        let mut min: Option<Point> = None;
        let mut include = |point: Point| {
            min = Some(match min {
                Some(current) => Point::new(current.x.min(point.x), current.y.min(point.y)),
                None => point,
            });
        };

        for segment in self.segments() {
            match segment {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => include(p),
                PathSegment::QuadTo { ctrl, to } => {
                    include(ctrl);
                    include(to);
                }
                PathSegment::CubicTo { ctrl1, ctrl2, to } => {
                    include(ctrl1);
                    include(ctrl2);
                    include(to);
                }
                PathSegment::Close | PathSegment::Unsupported(_) => {}
            }
        }

        min
    }
}

impl fmt::Display for CommandStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match token {
                PathToken::Command(verb) => write!(f, "{}", verb.letter())?,
                PathToken::Number(value) => write!(f, "{value}")?,
            }
        }
        Ok(())
    }
}

/// Normalize any [`PathEncoding`] into the canonical stream
///
/// Empty or unrecognized input yields an empty stream; malformed tuples are
/// reported so the caller can fall back to a bounding-box mark.
pub fn parse(encoding: &PathEncoding) -> Result<CommandStream, PathError> {
    match encoding {
        PathEncoding::Empty => Ok(CommandStream::new()),
        PathEncoding::Segments(items) => from_tuples(items.iter()),
        PathEncoding::Keyed(map) => from_tuples(keyed_in_order(map).into_iter()),
        PathEncoding::Svg(text) => Ok(from_svg(text)),
    }
}

/// Legacy keyed form: entries are ordered by their integer key, never by
/// insertion or lexical order.
fn keyed_in_order(map: &Map<String, Value>) -> Vec<&Value> {
    let mut entries: Vec<(i64, &Value)> = map
        .iter()
        .filter_map(|(key, value)| key.trim().parse::<i64>().ok().map(|index| (index, value)))
        .collect();
    entries.sort_by_key(|(index, _)| *index);
    entries.into_iter().map(|(_, value)| value).collect()
}

fn from_tuples<'a>(tuples: impl Iterator<Item = &'a Value>) -> Result<CommandStream, PathError> {
    let mut stream = CommandStream::new();

    for (index, tuple) in tuples.enumerate() {
        let items = tuple.as_array().ok_or(PathError::NotATuple { index })?;
        let Some((head, operands)) = items.split_first() else {
            continue;
        };

        let verb = head
            .as_str()
            .and_then(|command| command.trim().chars().next())
            .and_then(PathVerb::from_letter)
            .ok_or(PathError::InvalidCommand { index })?;

        let arity = verb.arity();
        if operands.len() < arity {
            return Err(PathError::MissingOperands {
                command: verb.letter(),
                expected: arity,
                found: operands.len(),
            });
        }

        let values = operands[..arity]
            .iter()
            .map(|operand| operand_value(operand).ok_or(PathError::InvalidOperand { command: verb.letter() }))
            .collect::<Result<Vec<f64>, _>>()?;

        stream.push(verb, &values)?;
    }

    Ok(stream)
}

fn operand_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}

fn from_svg(text: &str) -> CommandStream {
    let mut stream = CommandStream::new();

    for token in split_svg_commands(text) {
        let mut chars = token.chars();
        let Some(verb) = chars.next().and_then(PathVerb::from_letter) else {
            continue;
        };

        let numbers: Vec<f64> = chars
            .as_str()
            .replace(',', " ")
            .split_whitespace()
            .filter_map(|piece| piece.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .collect();

        let arity = verb.arity();
        if arity == 0 {
            // Always arity-correct, cannot fail.
            let _ = stream.push(verb, &[]);
            continue;
        }

        for (group_index, group) in numbers.chunks_exact(arity).enumerate() {
            let repeated = if group_index > 0 && verb == PathVerb::Move { PathVerb::Line } else { verb };
            let _ = stream.push(repeated, group);
        }
    }

    stream
}

/// Split directly before every command letter, keeping the letter
fn split_svg_commands(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;

    for (offset, ch) in text.char_indices() {
        if offset > start && PathVerb::from_letter(ch).is_some() {
            tokens.push(text[start..offset].trim());
            start = offset;
        }
    }
    tokens.push(text[start..].trim());

    tokens.into_iter().filter(|token| !token.is_empty()).collect()
}
