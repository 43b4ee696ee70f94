//! Device parameters.
//!
//! A [`DeviceParams`] collects explicit values before a device is built.
//! Construction resolves it once into [`ResolvedParams`]: an explicit value
//! wins, then an environment variable of the same name, then the built-in
//! default. Opaque parameters are never read from the environment.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::render::defaults;
use crate::types::Color;

/// A parameter value: a string, or a shared handle the library passes
/// through untouched
#[derive(Clone)]
pub enum ParamValue {
    Str(String),
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            ParamValue::Opaque(_) => None,
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Str(s) => f.debug_tuple("Str").field(s).finish(),
            ParamValue::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

struct KnownParam {
    name: &'static str,
    default: Option<&'static str>,
    is_string: bool,
}

const fn string(name: &'static str, default: &'static str) -> KnownParam {
    KnownParam {
        name,
        default: Some(default),
        is_string: true,
    }
}

const fn opaque(name: &'static str) -> KnownParam {
    KnownParam {
        name,
        default: None,
        is_string: false,
    }
}

#[rustfmt::skip]
const KNOWN_PARAMS: &[KnownParam] = &[
    string("BG_COLOR", "white"),
    string("BITMAPSIZE", "570x570"),
    string("EMULATE_COLOR", "no"),
    string("MAX_LINE_LENGTH", "500"),
    string("META_PORTABLE", "no"),
    string("PAGESIZE", "letter"),
    string("PNM_PORTABLE", "no"),
    string("ROTATION", "no"),
    string("TERM", "tek"),
    opaque("XDRAWABLE_DISPLAY"),
    opaque("XDRAWABLE_DRAWABLE1"),
];

fn slot(key: &str) -> Option<usize> {
    KNOWN_PARAMS.iter().position(|p| p.name == key)
}

/// Explicitly set parameter values, one slot per known parameter
#[derive(Debug, Clone)]
pub struct DeviceParams {
    values: Vec<Option<ParamValue>>,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceParams {
    pub fn new() -> Self {
        DeviceParams {
            values: vec![None; KNOWN_PARAMS.len()],
        }
    }

    /// Set a parameter. Unknown keys are silently ignored.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> &mut Self {
        if let Some(i) = slot(key) {
            self.values[i] = Some(value.into());
        }
        self
    }

    /// Forget an explicit value so the environment or default applies again.
    pub fn unset(&mut self, key: &str) -> &mut Self {
        if let Some(i) = slot(key) {
            self.values[i] = None;
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        slot(key).and_then(|i| self.values[i].as_ref())
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> ResolvedParams {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve with a caller-supplied environment lookup.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedParams {
        let values = KNOWN_PARAMS
            .iter()
            .zip(&self.values)
            .map(|(known, explicit)| match explicit {
                Some(value) => Some(value.clone()),
                None if known.is_string => env(known.name)
                    .or_else(|| known.default.map(str::to_string))
                    .map(ParamValue::Str),
                None => None,
            })
            .collect();
        ResolvedParams { values }
    }
}

/// Parameter values fixed at device construction
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    values: Vec<Option<ParamValue>>,
}

impl Default for ResolvedParams {
    fn default() -> Self {
        DeviceParams::new().resolve_with(|_| None)
    }
}

impl ResolvedParams {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        slot(key).and_then(|i| self.values[i].as_ref())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_str)
    }

    pub fn get_opaque(&self, key: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        match self.get(key)? {
            ParamValue::Opaque(handle) => Some(Arc::clone(handle)),
            ParamValue::Str(_) => None,
        }
    }

    /// A yes/no parameter; anything but "yes" is false.
    pub fn flag(&self, key: &str) -> bool {
        self.get_str(key)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"))
    }

    /// Background color, if `BG_COLOR` names one.
    pub fn bg_color(&self) -> Option<Color> {
        self.get_str("BG_COLOR")?.parse().ok()
    }

    /// `BITMAPSIZE` as (width, height); a malformed value gives 570x570.
    /// Accepts a trailing X11-style `+x+y` offset, which is ignored.
    pub fn bitmap_size(&self) -> (u32, u32) {
        const FALLBACK: (u32, u32) = (570, 570);
        let Some(value) = self.get_str("BITMAPSIZE") else {
            return FALLBACK;
        };
        let size = value.split(['+', '-']).next().unwrap_or_default();
        let parsed = size.split_once(['x', 'X']).and_then(|(w, h)| {
            Some((w.trim().parse::<u32>().ok()?, h.trim().parse::<u32>().ok()?))
        });
        match parsed {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            _ => FALLBACK,
        }
    }

    /// `MAX_LINE_LENGTH`; a non-positive or malformed value gives the default.
    pub fn max_line_length(&self) -> usize {
        self.get_str("MAX_LINE_LENGTH")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults::MAX_UNFILLED_PATH_LENGTH)
    }

    /// `ROTATION` in degrees: 0, 90, 180 or 270. "yes" means 90.
    pub fn rotation(&self) -> u32 {
        match self.get_str("ROTATION").map(str::trim) {
            Some("yes" | "90") => 90,
            Some("180") => 180,
            Some("270") => 270,
            _ => 0,
        }
    }
}
