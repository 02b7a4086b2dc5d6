use std::collections::HashMap;

use crate::error::Error;

/// Minutes since midnight.
pub type Minutes = u32;

const MINUTES_PER_DAY: Minutes = 24 * 60;

/// The fixed, ordered sequence of bookable time labels for a day.
///
/// Every occupancy computation works in slot coordinates: a label's position
/// in this sequence is its index, and a booking reserves a half-open range of
/// indices. Labels are `HH:MM`, strictly increasing and evenly spaced by
/// `granularity` minutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
    granularity: Minutes,
}

impl SlotIndex {
    /// Build an index from an explicit label list.
    pub fn new(labels: Vec<String>, granularity: Minutes) -> Result<Self, Error> {
        if granularity == 0 {
            return Err(Error::Config("slot granularity must be positive".into()));
        }
        if labels.is_empty() {
            return Err(Error::Config("slot index is empty".into()));
        }

        let mut positions = HashMap::with_capacity(labels.len());
        let mut prev: Option<Minutes> = None;
        for (i, label) in labels.iter().enumerate() {
            let at = parse_label(label)
                .ok_or_else(|| Error::Config(format!("malformed slot label: {label:?}")))?;
            if let Some(p) = prev {
                if at <= p {
                    return Err(Error::Config(format!(
                        "slot labels must be strictly increasing: {label} after {}",
                        format_label(p)
                    )));
                }
                if at - p != granularity {
                    return Err(Error::Config(format!(
                        "slot {label} is {} min after the previous one, expected {granularity}",
                        at - p
                    )));
                }
            }
            positions.insert(label.clone(), i);
            prev = Some(at);
        }

        Ok(Self {
            labels,
            positions,
            granularity,
        })
    }

    /// Build an index of every `granularity`-minute label in `[first, end)`.
    pub fn spanning(first: &str, end: &str, granularity: Minutes) -> Result<Self, Error> {
        let start = parse_label(first)
            .ok_or_else(|| Error::Config(format!("malformed slot label: {first:?}")))?;
        let stop = parse_label(end)
            .or_else(|| (end == "24:00").then_some(MINUTES_PER_DAY))
            .ok_or_else(|| Error::Config(format!("malformed slot label: {end:?}")))?;
        if granularity == 0 {
            return Err(Error::Config("slot granularity must be positive".into()));
        }
        if stop <= start {
            return Err(Error::Config(format!("slot window {first}..{end} is empty")));
        }
        let labels = (start..stop)
            .step_by(granularity as usize)
            .map(format_label)
            .collect();
        Self::new(labels, granularity)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn granularity_minutes(&self) -> Minutes {
        self.granularity
    }

    /// Number of slots a booking of `duration` minutes reserves (rounded up).
    pub fn slots_for(&self, duration: Minutes) -> usize {
        duration.div_ceil(self.granularity) as usize
    }
}

impl Default for SlotIndex {
    /// 17:00 through 22:30 in 30-minute steps.
    fn default() -> Self {
        let labels = (17 * 60..23 * 60).step_by(30).map(format_label).collect();
        Self::new(labels, 30).expect("default slot index is well formed")
    }
}

/// Parse `HH:MM` into minutes since midnight.
pub fn parse_label(label: &str) -> Option<Minutes> {
    let (h, m) = label.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: Minutes = h.parse().ok()?;
    let m: Minutes = m.parse().ok()?;
    if h >= 24 || m >= 60 {
        return None;
    }
    Some(h * 60 + m)
}

pub fn format_label(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
