//! Timestamped items flowing on input lines

use serde::{Deserialize, Serialize};

use crate::LineId;

/// A payload stamped with its acquisition time (seconds) and source line.
///
/// Fields are private: an item is immutable once created and can only be
/// consumed whole via [`TimestampedItem::into_parts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampedItem<T> {
    line: LineId,
    stamp: f64,
    payload: T,
}

impl<T> TimestampedItem<T> {
    pub fn new(line: LineId, stamp: f64, payload: T) -> Self {
        Self {
            line,
            stamp,
            payload,
        }
    }

    #[inline]
    pub fn line(&self) -> LineId {
        self.line
    }

    #[inline]
    pub fn stamp(&self) -> f64 {
        self.stamp
    }

    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }

    pub fn into_parts(self) -> (LineId, f64, T) {
        (self.line, self.stamp, self.payload)
    }
}
