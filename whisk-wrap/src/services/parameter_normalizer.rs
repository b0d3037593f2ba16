//! Parameter normalization
//!
//! Tracing parameters arrive as a loosely typed JSON record in which
//! `"None"`, `"True"` and `"False"` stand for null, true and false. Every key
//! is decoded once against [`WHISK_SCHEMA`]: sentinels first, then the
//! declared type (numeric keys are coerced from floats such as `10E8` or from
//! numeric strings). Unknown keys and missing required keys are errors;
//! optional keys absent from the record take their declared default.
//!
//! Example parameter record:
//!
//! ```json
//! {
//!   "pix_fmt": "gray",
//!   "bufsize": 10E8,
//!   "duration": "None",
//!   "write_stderr_to_screen": "False",
//!   "chunk_size": 200,
//!   "chunk_name_pattern": "chunk%08d.tif",
//!   "delete_tiffs": "True",
//!   "n_trace_processes": 4,
//!   "expectedrows": 1000000,
//!   "verbose": "True",
//!   "skip_stitch": "False",
//!   "face": "right"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Parameter decoding errors
#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    /// Parameter file unreadable or not a JSON object
    #[error("Malformed parameter record: {0}")]
    Malformed(String),

    /// A required key is absent
    #[error("Missing required parameter '{0}'")]
    MissingRequiredParameter(String),

    /// Key not declared in the schema
    #[error("Unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Value does not match the declared type or range
    #[error("Invalid value for parameter '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ParamError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Side of the face the whiskers originate from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Face {
    Left,
    Right,
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Face::Left => write!(f, "left"),
            Face::Right => write!(f, "right"),
        }
    }
}

/// Declared parameter types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    /// Non-negative integer, coerced from floats and numeric strings
    Integer,
    Float,
    Bool,
    /// Filesystem path; an empty string means unset
    Path,
    Face,
    /// Arbitrary JSON passed through to the engine
    Json,
}

/// A decoded parameter value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Integer(u64),
    Float(f64),
    Text(String),
    Path(PathBuf),
    Face(Face),
    Json(Value),
}

/// Schema entry for one parameter
#[derive(Clone)]
pub struct ParamSpec {
    pub key: &'static str,
    pub kind: ParamKind,
    /// Whether `None`/null is an accepted value
    pub nullable: bool,
    /// Default as JSON text; `None` marks the key as required
    pub default_value: Option<&'static str>,
    pub description: &'static str,
    pub validator: Option<fn(&ParamValue) -> Result<(), String>>,
}

impl fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSpec")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("default_value", &self.default_value)
            .finish_non_exhaustive()
    }
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        self.default_value.is_none()
    }
}

fn at_least_one(value: &ParamValue) -> Result<(), String> {
    match value {
        ParamValue::Integer(0) => Err("must be at least 1".to_string()),
        _ => Ok(()),
    }
}

const fn required(key: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        nullable: false,
        default_value: None,
        description,
        validator: None,
    }
}

const fn optional(
    key: &'static str,
    kind: ParamKind,
    default_value: &'static str,
    description: &'static str,
) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        nullable: false,
        default_value: Some(default_value),
        description,
        validator: None,
    }
}

const fn nullable(key: &'static str, kind: ParamKind, description: &'static str) -> ParamSpec {
    ParamSpec {
        key,
        kind,
        nullable: true,
        default_value: Some("null"),
        description,
        validator: None,
    }
}

/// Schema of the tracing parameter record
pub static WHISK_SCHEMA: &[ParamSpec] = &[
    // Streaming reader
    required("pix_fmt", ParamKind::Text, "Pixel format requested from the video reader"),
    required("bufsize", ParamKind::Integer, "Reader pipe buffer size (bytes)"),
    nullable("duration", ParamKind::Float, "Seconds of video to read"),
    nullable("start_frame_time", ParamKind::Float, "Seek offset (seconds)"),
    nullable("start_frame_number", ParamKind::Integer, "Seek offset (frames)"),
    optional("write_stderr_to_screen", ParamKind::Bool, "false", "Show reader stderr"),
    // Chunking / tracing
    nullable(
        "tiffs_to_trace_directory",
        ParamKind::Path,
        "Directory for temporary chunk tiffs (defaults to the video directory)",
    ),
    optional("sensitive", ParamKind::Bool, "false", "Sensitive tracing mode"),
    ParamSpec {
        validator: Some(at_least_one),
        ..required("chunk_size", ParamKind::Integer, "Frames per chunk")
    },
    optional(
        "chunk_name_pattern",
        ParamKind::Text,
        "\"chunk%08d.tif\"",
        "Chunk filename pattern",
    ),
    nullable("stop_after_frame", ParamKind::Integer, "Frame count cap"),
    optional("delete_tiffs", ParamKind::Bool, "true", "Delete temporary tiffs"),
    nullable("timestamps_filename", ParamKind::Path, "Frame timestamp source"),
    nullable("monitor_video", ParamKind::Path, "Monitor video with trace overlay"),
    nullable("monitor_video_kwargs", ParamKind::Json, "Monitor video display parameters"),
    optional(
        "write_monitor_ffmpeg_stderr_to_screen",
        ParamKind::Bool,
        "false",
        "Show monitor encoder stderr",
    ),
    nullable("frame_func", ParamKind::Text, "Per-frame transform name"),
    ParamSpec {
        validator: Some(at_least_one),
        ..required("n_trace_processes", ParamKind::Integer, "Parallel trace worker processes")
    },
    optional("expectedrows", ParamKind::Integer, "1000000", "Output row capacity hint"),
    optional("verbose", ParamKind::Bool, "true", "Verbose engine output"),
    optional("skip_stitch", ParamKind::Bool, "false", "Skip stitching chunks into the output"),
    required("face", ParamKind::Face, "Side of the face the whiskers originate from"),
    // Run modes
    optional("debug", ParamKind::Bool, "false", "Skip tracing and write a placeholder artifact"),
    optional(
        "legacy_output_naming",
        ParamKind::Bool,
        "false",
        "Name the artifact whiski_output.hdf5 instead of <video>_whiski_output.hdf5",
    ),
    // Preprocessing
    nullable("crop_width", ParamKind::Integer, "Crop width (pixels)"),
    nullable("crop_height", ParamKind::Integer, "Crop height (pixels)"),
    nullable("crop_x", ParamKind::Integer, "Crop left edge (pixels)"),
    nullable("crop_y", ParamKind::Integer, "Crop top edge (pixels)"),
    optional("video_codec", ParamKind::Text, "\"mpeg4\"", "Prepared video codec"),
    optional("video_quality", ParamKind::Integer, "2", "Prepared video quality scale"),
];

/// Decoded parameters, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }

    fn require(&self, key: &str) -> Result<&ParamValue, ParamError> {
        self.values
            .get(key)
            .ok_or_else(|| ParamError::MissingRequiredParameter(key.to_string()))
    }

    pub fn text(&self, key: &str) -> Result<&str, ParamError> {
        match self.require(key)? {
            ParamValue::Text(s) => Ok(s),
            other => Err(ParamError::invalid(key, format!("expected text, got {:?}", other))),
        }
    }

    pub fn opt_text(&self, key: &str) -> Result<Option<&str>, ParamError> {
        match self.require(key)? {
            ParamValue::Null => Ok(None),
            _ => self.text(key).map(Some),
        }
    }

    pub fn flag(&self, key: &str) -> Result<bool, ParamError> {
        match self.require(key)? {
            ParamValue::Bool(b) => Ok(*b),
            other => Err(ParamError::invalid(key, format!("expected boolean, got {:?}", other))),
        }
    }

    pub fn integer(&self, key: &str) -> Result<u64, ParamError> {
        match self.require(key)? {
            ParamValue::Integer(n) => Ok(*n),
            other => Err(ParamError::invalid(key, format!("expected integer, got {:?}", other))),
        }
    }

    pub fn opt_integer(&self, key: &str) -> Result<Option<u64>, ParamError> {
        match self.require(key)? {
            ParamValue::Null => Ok(None),
            _ => self.integer(key).map(Some),
        }
    }

    pub fn opt_float(&self, key: &str) -> Result<Option<f64>, ParamError> {
        match self.require(key)? {
            ParamValue::Null => Ok(None),
            ParamValue::Float(x) => Ok(Some(*x)),
            other => Err(ParamError::invalid(key, format!("expected number, got {:?}", other))),
        }
    }

    pub fn opt_path(&self, key: &str) -> Result<Option<&Path>, ParamError> {
        match self.require(key)? {
            ParamValue::Null => Ok(None),
            ParamValue::Path(p) => Ok(Some(p)),
            other => Err(ParamError::invalid(key, format!("expected path, got {:?}", other))),
        }
    }

    pub fn face(&self, key: &str) -> Result<Face, ParamError> {
        match self.require(key)? {
            ParamValue::Face(face) => Ok(*face),
            other => Err(ParamError::invalid(key, format!("expected face, got {:?}", other))),
        }
    }

    pub fn opt_json(&self, key: &str) -> Result<Option<&Value>, ParamError> {
        match self.require(key)? {
            ParamValue::Null => Ok(None),
            ParamValue::Json(v) => Ok(Some(v)),
            other => Err(ParamError::invalid(key, format!("expected JSON, got {:?}", other))),
        }
    }
}

/// Replace the string sentinels `"None"`, `"True"`, `"False"`
pub fn decode_sentinel(value: Value) -> Value {
    match value {
        Value::String(s) if s == "None" => Value::Null,
        Value::String(s) if s == "True" => Value::Bool(true),
        Value::String(s) if s == "False" => Value::Bool(false),
        other => other,
    }
}

fn integral(x: f64) -> Option<u64> {
    if x.is_finite() && x >= 0.0 && x.fract() == 0.0 && x <= u64::MAX as f64 {
        Some(x as u64)
    } else {
        None
    }
}

/// Decode one value against its schema entry
fn coerce(spec: &ParamSpec, value: Value) -> Result<ParamValue, ParamError> {
    let key = spec.key;
    let value = decode_sentinel(value);

    if value.is_null() {
        return if spec.nullable {
            Ok(ParamValue::Null)
        } else {
            Err(ParamError::invalid(key, "must not be None"))
        };
    }

    let decoded = match (spec.kind, value) {
        (ParamKind::Bool, Value::Bool(b)) => ParamValue::Bool(b),
        (ParamKind::Integer, Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(ParamValue::Integer)
            .ok_or_else(|| ParamError::invalid(key, format!("{} is not a non-negative integer", n)))?,
        (ParamKind::Integer, Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().and_then(integral))
            .map(ParamValue::Integer)
            .ok_or_else(|| ParamError::invalid(key, format!("'{}' is not a non-negative integer", s)))?,
        (ParamKind::Float, Value::Number(n)) => n
            .as_f64()
            .map(ParamValue::Float)
            .ok_or_else(|| ParamError::invalid(key, format!("{} is not a number", n)))?,
        (ParamKind::Float, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(ParamValue::Float)
            .map_err(|_| ParamError::invalid(key, format!("'{}' is not a number", s)))?,
        (ParamKind::Text, Value::String(s)) => ParamValue::Text(s),
        (ParamKind::Path, Value::String(s)) if s.is_empty() => {
            if spec.nullable {
                ParamValue::Null
            } else {
                return Err(ParamError::invalid(key, "path must not be empty"));
            }
        }
        (ParamKind::Path, Value::String(s)) => ParamValue::Path(PathBuf::from(s)),
        (ParamKind::Face, Value::String(s)) => match s.as_str() {
            "left" => ParamValue::Face(Face::Left),
            "right" => ParamValue::Face(Face::Right),
            _ => return Err(ParamError::invalid(key, format!("'{}' is not \"left\" or \"right\"", s))),
        },
        (ParamKind::Json, v) => ParamValue::Json(v),
        (kind, v) => {
            return Err(ParamError::invalid(key, format!("expected {:?}, got {}", kind, v)));
        }
    };

    if let Some(validator) = spec.validator {
        validator(&decoded).map_err(|reason| ParamError::invalid(key, reason))?;
    }

    Ok(decoded)
}

/// Decodes raw parameter records against a schema
#[derive(Debug, Clone, Copy)]
pub struct ParameterNormalizer {
    schema: &'static [ParamSpec],
}

impl Default for ParameterNormalizer {
    fn default() -> Self {
        Self::new(WHISK_SCHEMA)
    }
}

impl ParameterNormalizer {
    pub fn new(schema: &'static [ParamSpec]) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'static [ParamSpec] {
        self.schema
    }

    /// Read a JSON parameter file and normalize it
    pub fn load(&self, path: &Path) -> Result<ParameterSet, ParamError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ParamError::Malformed(format!("cannot read {}: {}", path.display(), e)))?;
        let raw: Value = serde_json::from_str(&content)
            .map_err(|e| ParamError::Malformed(format!("cannot parse {}: {}", path.display(), e)))?;

        let params = self.normalize(&raw)?;
        tracing::info!(path = %path.display(), count = params.len(), "Loaded parameters");
        Ok(params)
    }

    /// Decode a raw record; pure and deterministic
    pub fn normalize(&self, raw: &Value) -> Result<ParameterSet, ParamError> {
        let record = raw
            .as_object()
            .ok_or_else(|| ParamError::Malformed("top level must be a JSON object".to_string()))?;

        let mut unknown: Vec<&String> = record
            .keys()
            .filter(|k| !self.schema.iter().any(|spec| spec.key == k.as_str()))
            .collect();
        unknown.sort();
        if let Some(key) = unknown.first() {
            return Err(ParamError::UnknownParameter(key.to_string()));
        }

        let mut values = BTreeMap::new();
        for spec in self.schema {
            let decoded = match (record.get(spec.key), spec.default_value) {
                (Some(raw_value), _) => coerce(spec, raw_value.clone())?,
                (None, Some(default)) => {
                    let default: Value = serde_json::from_str(default).map_err(|e| {
                        ParamError::invalid(spec.key, format!("bad default '{}': {}", default, e))
                    })?;
                    coerce(spec, default)?
                }
                (None, None) => {
                    return Err(ParamError::MissingRequiredParameter(spec.key.to_string()));
                }
            };
            values.insert(spec.key.to_string(), decoded);
        }

        Ok(ParameterSet { values })
    }
}
