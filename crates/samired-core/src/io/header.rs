use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_int};

use fitsio::errors::check_status;
use fitsio::{sys, FitsFile};
use tracing::warn;

use crate::error::{ReductionError, Result};

/// cfitsio symbols exported by the library but absent from `fitsio-sys`,
/// whose bindings cover only the public `fitsio.h`.
mod ffi {
    use std::os::raw::{c_char, c_int};

    extern "C" {
        /// `int ffc2s(const char *instr, char *outstr, int *status)` from `fitsio2.h`.
        pub fn ffc2s(instr: *const c_char, outstr: *mut c_char, status: *mut c_int) -> c_int;
    }
}

/// cfitsio buffer sizes, terminating NUL included.
const FLEN_CARD: usize = 81;
const FLEN_VALUE: usize = 71;
const FLEN_COMMENT: usize = 73;

/// `decim` argument for `ffpkyd`: negative selects `%G` with that many digits.
const FLOAT_DIGITS: c_int = -15;

/// Keywords describing array layout. The reader consumes them and the writer
/// regenerates them, so they never live in a [`Header`] handed to callers.
pub const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "XTENSION", "BITPIX", "NAXIS", "EXTEND", "PCOUNT", "GCOUNT", "BZERO", "BSCALE",
    "END",
];

/// Typed value of a FITS header card.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// One header card. Commentary cards (`HISTORY`, `COMMENT`) have no value.
#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub keyword: String,
    pub value: Option<Value>,
    pub comment: Option<String>,
}

impl Card {
    pub fn is_commentary(&self) -> bool {
        self.value.is_none()
    }
}

/// Ordered FITS header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = normalize(key);
        self.cards
            .iter()
            .find(|c| c.keyword == key && c.value.is_some())
            .and_then(|c| c.value.as_ref())
    }

    /// Set a keyword, replacing its value in place or appending a new card.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let key = normalize(key);
        let value = value.into();
        match self
            .cards
            .iter_mut()
            .find(|c| c.keyword == key && c.value.is_some())
        {
            Some(card) => card.value = Some(value),
            None => self.cards.push(Card {
                keyword: key,
                value: Some(value),
                comment: None,
            }),
        }
    }

    pub fn set_with_comment(&mut self, key: &str, value: impl Into<Value>, comment: &str) {
        self.set(key, value);
        let key = normalize(key);
        if let Some(card) = self
            .cards
            .iter_mut()
            .find(|c| c.keyword == key && c.value.is_some())
        {
            card.comment = Some(comment.to_string());
        }
    }

    /// Set a keyword only if it is absent.
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        if !self.contains(key) {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let key = normalize(key);
        let idx = self
            .cards
            .iter()
            .position(|c| c.keyword == key && c.value.is_some())?;
        self.cards.remove(idx).value
    }

    /// Rename a keyword, keeping its position, value and comment.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let (from, to) = (normalize(from), normalize(to));
        if self.contains(&to) {
            self.remove(&to);
        }
        match self
            .cards
            .iter_mut()
            .find(|c| c.keyword == from && c.value.is_some())
        {
            Some(card) => {
                card.keyword = to;
                true
            }
            None => false,
        }
    }

    pub fn add_history(&mut self, text: &str) {
        self.push_commentary("HISTORY", text);
    }

    pub fn add_comment(&mut self, text: &str) {
        self.push_commentary("COMMENT", text);
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.cards
            .iter()
            .filter(|c| c.keyword == "HISTORY")
            .filter_map(|c| c.comment.as_deref())
    }

    fn push_commentary(&mut self, keyword: &str, text: &str) {
        self.cards.push(Card {
            keyword: keyword.to_string(),
            value: None,
            comment: Some(text.to_string()),
        });
    }

    /// Drop array-layout keywords (including `NAXISn`).
    pub(crate) fn strip_structural(&mut self) {
        self.cards.retain(|c| !is_structural(&c.keyword));
    }

    // -- Typed access ------------------------------------------------------

    pub fn get_str(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| type_mismatch(key, "string"))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.require(key)?;
        value.as_f64().ok_or_else(|| type_mismatch(key, "number"))
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        let value = self.require(key)?;
        value.as_i64().ok_or_else(|| type_mismatch(key, "integer"))
    }

    /// Like [`Header::get_str`], but a missing keyword is `Ok(None)`.
    pub fn opt_str(&self, key: &str) -> Result<Option<&str>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| type_mismatch(key, "string")),
        }
    }

    /// Like [`Header::get_f64`], but a missing keyword is `Ok(None)`.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| type_mismatch(key, "number")),
        }
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| ReductionError::MissingKeyword(normalize(key)))
    }
}

pub(crate) fn normalize(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

pub(crate) fn is_structural(keyword: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&keyword)
        || keyword
            .strip_prefix("NAXIS")
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn type_mismatch(key: &str, expected: &'static str) -> ReductionError {
    ReductionError::TypeMismatch {
        keyword: normalize(key),
        expected,
    }
}

// -- cfitsio adapter --------------------------------------------------------

impl Header {
    /// Read every card of the current HDU of `fptr`, minus layout keywords.
    pub(crate) fn read_current(fptr: &mut FitsFile) -> fitsio::errors::Result<Self> {
        // SAFETY: the pointer stays valid while `fptr` is borrowed and every
        // buffer handed to cfitsio is sized by its FLEN_* limits.
        let raw = unsafe { fptr.as_raw() };
        let (mut nexist, mut nmore, mut status) = (0, 0, 0);
        unsafe { sys::ffghsp(raw, &mut nexist, &mut nmore, &mut status) };
        check_status(status)?;

        let mut header = Self::new();
        for n in 1..=nexist {
            let mut record = [0 as c_char; FLEN_CARD];
            unsafe { sys::ffgrec(raw, n, record.as_mut_ptr(), &mut status) };
            check_status(status)?;
            if let Some(card) = Card::from_record(&mut record) {
                header.cards.push(card);
            }
        }
        header.strip_structural();
        Ok(header)
    }

    /// Append the cards to the current HDU of `fptr`. Layout keywords are
    /// left to cfitsio.
    pub(crate) fn write_current(&self, fptr: &mut FitsFile) -> fitsio::errors::Result<()> {
        let raw = unsafe { fptr.as_raw() };
        drop_default_comments(raw);

        for card in &self.cards {
            if is_structural(&card.keyword) {
                continue;
            }
            if card.keyword.len() > 8 {
                warn!(keyword = %card.keyword, "Dropping keyword longer than 8 characters");
                continue;
            }
            let key = c_string(&card.keyword);
            let comment = card.comment.as_deref().map(c_string);
            let comment_ptr = comment.as_ref().map_or(std::ptr::null(), |c| c.as_ptr());
            let mut status = 0;
            // SAFETY: all strings are NUL-terminated and outlive the call.
            unsafe {
                match &card.value {
                    None if card.keyword == "HISTORY" => {
                        sys::ffphis(raw, comment_ptr, &mut status);
                    }
                    None => {
                        sys::ffpcom(raw, comment_ptr, &mut status);
                    }
                    Some(Value::Str(s)) => {
                        let value = c_string(s);
                        sys::ffpkys(raw, key.as_ptr(), value.as_ptr(), comment_ptr, &mut status);
                    }
                    Some(Value::Int(i)) => {
                        sys::ffpkyj(raw, key.as_ptr(), *i, comment_ptr, &mut status);
                    }
                    Some(Value::Float(x)) => {
                        sys::ffpkyd(raw, key.as_ptr(), *x, FLOAT_DIGITS, comment_ptr, &mut status);
                    }
                    Some(Value::Bool(b)) => {
                        sys::ffpkyl(raw, key.as_ptr(), c_int::from(*b), comment_ptr, &mut status);
                    }
                }
            }
            check_status(status)?;
        }
        Ok(())
    }
}

impl Card {
    /// Build a card from one 80-column record, letting cfitsio split the
    /// value from its comment and classify it. Undefined values are skipped.
    fn from_record(record: &mut [c_char; FLEN_CARD]) -> Option<Self> {
        let text = unsafe { CStr::from_ptr(record.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let keyword = text.get(..8).unwrap_or(&text).trim_end().to_string();
        if keyword.is_empty() {
            return None;
        }
        if keyword == "HISTORY" || keyword == "COMMENT" {
            let body = text.get(8..).unwrap_or("").trim_end().to_string();
            return Some(Self {
                keyword,
                value: None,
                comment: Some(body),
            });
        }

        let mut value = [0 as c_char; FLEN_VALUE];
        let mut comment = [0 as c_char; FLEN_COMMENT];
        let mut dtype: c_char = 0;
        let mut status = 0;
        unsafe {
            sys::ffpsvc(record.as_mut_ptr(), value.as_mut_ptr(), comment.as_mut_ptr(), &mut status);
        }
        if status != 0 || value[0] == 0 {
            return None;
        }
        unsafe { sys::ffdtyp(value.as_ptr(), &mut dtype, &mut status) };
        if status != 0 {
            return None;
        }

        let field = from_c(&value);
        let value = match dtype as u8 {
            b'C' => {
                let mut unquoted = [0 as c_char; FLEN_VALUE];
                unsafe { ffi::ffc2s(value.as_ptr(), unquoted.as_mut_ptr(), &mut status) };
                if status != 0 {
                    return None;
                }
                Value::Str(from_c(&unquoted).trim_end().to_string())
            }
            b'L' => Value::Bool(field.trim() == "T"),
            b'I' => match field.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Float(parse_float(&field)?),
            },
            b'F' => Value::Float(parse_float(&field)?),
            _ => Value::Str(field.trim().to_string()),
        };
        let comment = Some(from_c(&comment).trim().to_string()).filter(|c| !c.is_empty());
        Some(Self {
            keyword,
            value: Some(value),
            comment,
        })
    }
}

/// cfitsio stamps a primary HDU with two `COMMENT` cards citing the FITS
/// paper. They are removed so copied headers do not accumulate them.
fn drop_default_comments(raw: *mut sys::fitsfile) {
    loop {
        let mut status = 0;
        unsafe { sys::ffdkey(raw, c"COMMENT".as_ptr(), &mut status) };
        if status != 0 {
            unsafe { sys::ffcmsg() };
            break;
        }
    }
}

fn from_c(buf: &[c_char]) -> String {
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// FITS cards only hold printable ASCII.
fn c_string(s: &str) -> CString {
    let bytes: Vec<u8> = s
        .bytes()
        .map(|b| if b == b' ' || b.is_ascii_graphic() { b } else { b'?' })
        .collect();
    CString::new(bytes).unwrap_or_default()
}

fn parse_float(field: &str) -> Option<f64> {
    field.trim().replace(['D', 'd'], "E").parse().ok()
}
