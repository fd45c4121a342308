//! Extraction parameters: page ranges, option sets and fallback policies
//!
//! Everything here is recomputed per run; nothing is persisted.

use crate::PdfError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The three independent table-detection flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ExtractionOptions {
    /// Assume visible cell borders (ruling lines)
    pub lattice: bool,
    /// Assume borderless, whitespace-delimited columns
    pub stream: bool,
    /// Localize table regions before cell extraction
    pub guess: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            lattice: true,
            stream: false,
            guess: true,
        }
    }
}

impl ExtractionOptions {
    pub fn new(lattice: bool, stream: bool, guess: bool) -> Self {
        Self {
            lattice,
            stream,
            guess,
        }
    }

    /// Lattice and stream flipped, auto-detect untouched
    pub fn inverted(self) -> Self {
        Self {
            lattice: !self.lattice,
            stream: !self.stream,
            guess: self.guess,
        }
    }

    /// Same strategy flags with auto-detect forced off
    pub fn without_guess(self) -> Self {
        Self {
            guess: false,
            ..self
        }
    }
}

impl fmt::Display for ExtractionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lattice={}, stream={}, guess={}",
            self.lattice, self.stream, self.guess
        )
    }
}

/// Which sequence of option sets to try on a page before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Caller options, then lattice/stream inverted, then auto-detect off
    ThreeTier(ExtractionOptions),
    /// Lattice with auto-detect, then stream with auto-detect
    LatticeThenStream,
}

impl FallbackPolicy {
    /// Option sets in the order they are attempted
    pub fn attempts(&self) -> Vec<ExtractionOptions> {
        match *self {
            FallbackPolicy::ThreeTier(options) => {
                vec![options, options.inverted(), options.without_guess()]
            }
            FallbackPolicy::LatticeThenStream => vec![
                ExtractionOptions::new(true, false, true),
                ExtractionOptions::new(false, true, true),
            ],
        }
    }
}

/// A 1-indexed, inclusive page range
///
/// Only positivity is checked. A range whose start lies after its end
/// visits no pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Result<Self, PdfError> {
        if start == 0 || end == 0 {
            return Err(PdfError::InvalidPageRange(format!(
                "page numbers start at 1 (got {}-{})",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(page: u32) -> Result<Self, PdfError> {
        Self::new(page, page)
    }

    /// Page numbers in ascending order
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self { start: 1, end: 1 }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*(?:-\s*(\d+)\s*)?$").expect("valid page range regex"));

/// Parses `"3"` or `"2-5"`
impl FromStr for PageRange {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RANGE_RE
            .captures(s)
            .ok_or_else(|| PdfError::InvalidPageRange(format!("cannot parse {:?}", s)))?;
        let parse = |m: regex::Match<'_>| {
            m.as_str()
                .parse::<u32>()
                .map_err(|e| PdfError::InvalidPageRange(e.to_string()))
        };
        let start = parse(caps.get(1).ok_or_else(|| {
            PdfError::InvalidPageRange(format!("missing start page in {:?}", s))
        })?)?;
        let end = match caps.get(2) {
            Some(m) => parse(m)?,
            None => start,
        };
        PageRange::new(start, end)
    }
}
