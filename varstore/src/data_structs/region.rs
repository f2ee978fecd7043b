use std::fmt::Display;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::StorageError;

static REGION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<chrom>[^:\s]+)(?::(?P<start>[\d,]*)(?:-(?P<stop>[\d,]*))?)?$")
        .expect("region pattern is valid")
});

/// Genomic interval with optional, inclusive bounds.
///
/// `chr1:100-200` is a closed interval, `chr1:100-` and `chr1:-200` are
/// open-ended, `chr1` covers the whole chromosome and `chr1:100` is a single
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub chrom: String,
    pub start: Option<u32>,
    pub stop:  Option<u32>,
}

impl Region {
    pub fn new(
        chrom: impl Into<String>,
        start: Option<u32>,
        stop: Option<u32>,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            stop,
        }
    }

    pub fn whole(chrom: impl Into<String>) -> Self {
        Self::new(chrom, None, None)
    }

    /// Checks whether `[position, end_position]` overlaps the region. A
    /// missing `end_position` is treated as a single point.
    pub fn overlaps(
        &self,
        chrom: &str,
        position: u32,
        end_position: Option<u32>,
    ) -> bool {
        if chrom != self.chrom {
            return false;
        }
        let end = end_position.unwrap_or(position);
        let after_start = self.start.map_or(true, |start| end >= start);
        let before_stop = self.stop.map_or(true, |stop| position <= stop);
        after_start && before_stop
    }
}

impl FromStr for Region {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = REGION_RE
            .captures(s.trim())
            .ok_or_else(|| StorageError::Query(format!("malformed region: {}", s)))?;

        let parse_bound = |name: &str| -> Result<Option<u32>, StorageError> {
            match caps.name(name).map(|m| m.as_str().replace(',', "")) {
                Some(value) if !value.is_empty() => {
                    value.parse::<u32>().map(Some).map_err(|e| {
                        StorageError::Query(format!("malformed region {}: {}", s, e))
                    })
                },
                _ => Ok(None),
            }
        };

        let start = parse_bound("start")?;
        let has_dash = s
            .split_once(':')
            .map_or(false, |(_, bounds)| bounds.contains('-'));
        let stop = if has_dash { parse_bound("stop")? } else { start };

        if let (Some(start), Some(stop)) = (start, stop) {
            if start > stop {
                return Err(StorageError::Query(format!(
                    "region start after stop: {}",
                    s
                )));
            }
        }

        Ok(Region::new(&caps["chrom"], start, stop))
    }
}

impl Display for Region {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match (self.start, self.stop) {
            (None, None) => write!(f, "{}", self.chrom),
            (Some(start), Some(stop)) if start == stop => {
                write!(f, "{}:{}", self.chrom, start)
            },
            (start, stop) => {
                write!(
                    f,
                    "{}:{}-{}",
                    self.chrom,
                    start.map(|v| v.to_string()).unwrap_or_default(),
                    stop.map(|v| v.to_string()).unwrap_or_default()
                )
            },
        }
    }
}
