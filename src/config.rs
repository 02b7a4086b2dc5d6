use std::path::PathBuf;

use crate::error::Error;
use crate::slots::{Minutes, SlotIndex};

/// The booking horizon: which slots exist on a day and which days can be booked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub slots: SlotIndex,
    pub days: Vec<String>,
    /// Longest booking a guest may ask for.
    pub max_duration: Minutes,
}

/// Three hours, the longest sitting the front desk offers.
pub const DEFAULT_MAX_DURATION: Minutes = 180;

impl ScheduleConfig {
    pub fn new(slots: SlotIndex, days: Vec<String>) -> Result<Self, Error> {
        if days.is_empty() {
            return Err(Error::Config("at least one bookable day is required".into()));
        }
        for (i, day) in days.iter().enumerate() {
            if day.trim().is_empty() {
                return Err(Error::Config("day names must not be blank".into()));
            }
            if days[..i].contains(day) {
                return Err(Error::Config(format!("duplicate day: {day}")));
            }
        }
        Ok(Self {
            slots,
            days,
            max_duration: DEFAULT_MAX_DURATION,
        })
    }

    pub fn with_max_duration(mut self, minutes: Minutes) -> Result<Self, Error> {
        if minutes == 0 {
            return Err(Error::Config("maximum duration must be positive".into()));
        }
        self.max_duration = minutes;
        Ok(self)
    }

    pub fn is_day(&self, day: &str) -> bool {
        self.days.iter().any(|d| d == day)
    }
}

impl Default for ScheduleConfig {
    /// Dinner service, bookable today and tomorrow.
    fn default() -> Self {
        Self {
            slots: SlotIndex::default(),
            days: vec!["today".into(), "tomorrow".into()],
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

/// A table to register at startup when the ledger is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSeed {
    pub label: String,
    pub capacity: u32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub schedule: ScheduleConfig,
    pub tables: Vec<TableSeed>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve every setting through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let port = parse_or(&lookup, "TABLESLOT_PORT", 5480)?;
        let bind = lookup("TABLESLOT_BIND").unwrap_or_else(|| "0.0.0.0".into());
        let data_dir = lookup("TABLESLOT_DATA_DIR").unwrap_or_else(|| "./data".into());
        let max_connections = parse_or(&lookup, "TABLESLOT_MAX_CONNECTIONS", 256)?;
        let compact_threshold = parse_or(&lookup, "TABLESLOT_COMPACT_THRESHOLD", 1000)?;
        let metrics_port = lookup("TABLESLOT_METRICS_PORT")
            .map(|s| parse_value("TABLESLOT_METRICS_PORT", &s))
            .transpose()?;

        let schedule = match (
            lookup("TABLESLOT_FIRST_SLOT"),
            lookup("TABLESLOT_END_SLOT"),
            lookup("TABLESLOT_GRANULARITY"),
        ) {
            (None, None, None) => ScheduleConfig::default().slots,
            (first, end, granularity) => {
                let granularity = granularity
                    .map(|g| parse_value("TABLESLOT_GRANULARITY", &g))
                    .transpose()?
                    .unwrap_or(30);
                SlotIndex::spanning(
                    first.as_deref().unwrap_or("17:00"),
                    end.as_deref().unwrap_or("23:00"),
                    granularity,
                )?
            }
        };
        let days = match lookup("TABLESLOT_DAYS") {
            Some(list) => split_list(&list),
            None => ScheduleConfig::default().days,
        };
        let max_duration = parse_or(&lookup, "TABLESLOT_MAX_DURATION", DEFAULT_MAX_DURATION)?;
        let schedule = ScheduleConfig::new(schedule, days)?.with_max_duration(max_duration)?;

        let tables = match lookup("TABLESLOT_TABLES") {
            Some(list) => parse_tables(&list)?,
            None => Vec::new(),
        };

        Ok(Self {
            bind,
            port,
            data_dir: PathBuf::from(data_dir),
            max_connections,
            compact_threshold,
            metrics_port,
            schedule,
            tables,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, Error> {
    match lookup(key) {
        Some(s) => parse_value(key, &s),
        None => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}: cannot parse {raw:?}")))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// `"T1:2,T2:4"` → tables labelled T1 and T2 seating 2 and 4.
fn parse_tables(raw: &str) -> Result<Vec<TableSeed>, Error> {
    split_list(raw)
        .into_iter()
        .map(|entry| {
            let (label, capacity) = entry
                .rsplit_once(':')
                .ok_or_else(|| Error::Config(format!("TABLESLOT_TABLES: expected label:capacity, got {entry:?}")))?;
            let capacity: u32 = parse_value("TABLESLOT_TABLES", capacity)?;
            if capacity == 0 {
                return Err(Error::Config(format!("TABLESLOT_TABLES: {label} has zero capacity")));
            }
            Ok(TableSeed {
                label: label.trim().to_string(),
                capacity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 5480);
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.schedule, ScheduleConfig::default());
        assert!(cfg.tables.is_empty());
    }

    #[test]
    fn custom_slot_window_and_days() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("TABLESLOT_FIRST_SLOT", "12:00"),
            ("TABLESLOT_END_SLOT", "14:00"),
            ("TABLESLOT_GRANULARITY", "15"),
            ("TABLESLOT_DAYS", "mon, tue ,wed"),
        ]))
        .unwrap();
        assert_eq!(cfg.schedule.slots.len(), 8);
        assert_eq!(cfg.schedule.slots.label(1), Some("12:15"));
        assert_eq!(cfg.schedule.days, vec!["mon", "tue", "wed"]);
        assert_eq!(cfg.schedule.max_duration, DEFAULT_MAX_DURATION);
    }

    #[test]
    fn max_duration_from_environment() {
        let cfg = ServerConfig::from_lookup(lookup(&[("TABLESLOT_MAX_DURATION", "120")])).unwrap();
        assert_eq!(cfg.schedule.max_duration, 120);
        assert!(ServerConfig::from_lookup(lookup(&[("TABLESLOT_MAX_DURATION", "0")])).is_err());
    }

    #[test]
    fn tables_are_parsed() {
        let cfg = ServerConfig::from_lookup(lookup(&[("TABLESLOT_TABLES", "Window:2, Patio 1:6")])).unwrap();
        assert_eq!(
            cfg.tables,
            vec![
                TableSeed { label: "Window".into(), capacity: 2 },
                TableSeed { label: "Patio 1".into(), capacity: 6 },
            ]
        );
    }

    #[test]
    fn bad_values_are_config_errors() {
        assert!(ServerConfig::from_lookup(lookup(&[("TABLESLOT_PORT", "http")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("TABLESLOT_TABLES", "T1")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("TABLESLOT_TABLES", "T1:0")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("TABLESLOT_DAYS", " , ")])).is_err());
    }

    #[test]
    fn duplicate_days_rejected() {
        let err = ScheduleConfig::new(SlotIndex::default(), vec!["today".into(), "today".into()]);
        assert!(matches!(err, Err(Error::Config(_))));
    }
}
