use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three detection categories reported by the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CountKey {
    TrayWithFood,
    TrayWithoutFood,
    Food,
}

impl CountKey {
    pub const ALL: [CountKey; 3] = [CountKey::TrayWithFood, CountKey::TrayWithoutFood, CountKey::Food];

    /// Name used on the wire (counts header, API paths).
    pub fn as_str(&self) -> &'static str {
        match self {
            CountKey::TrayWithFood => "trayWithFood",
            CountKey::TrayWithoutFood => "trayWithoutFood",
            CountKey::Food => "food",
        }
    }
}

impl fmt::Display for CountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown count key: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionCounts {
    pub tray_with_food: u32,
    pub tray_without_food: u32,
    pub food: u32,
}

impl DetectionCounts {
    pub fn new(tray_with_food: u32, tray_without_food: u32, food: u32) -> Self {
        Self {
            tray_with_food,
            tray_without_food,
            food,
        }
    }

    pub fn get(&self, key: CountKey) -> u32 {
        match key {
            CountKey::TrayWithFood => self.tray_with_food,
            CountKey::TrayWithoutFood => self.tray_without_food,
            CountKey::Food => self.food,
        }
    }

    pub fn set(&mut self, key: CountKey, value: u32) {
        match key {
            CountKey::TrayWithFood => self.tray_with_food = value,
            CountKey::TrayWithoutFood => self.tray_without_food = value,
            CountKey::Food => self.food = value,
        }
    }

    pub fn increment(&mut self, key: CountKey) {
        self.set(key, self.get(key).saturating_add(1));
    }

    /// Add a signed delta to one count, never going below zero.
    pub fn adjust(&mut self, key: CountKey, delta: i64) {
        let next = (self.get(key) as i64).saturating_add(delta).clamp(0, u32::MAX as i64);
        self.set(key, next as u32);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Parse a `key:value,key:value` header.
    ///
    /// Starts from all-zero counts; unknown keys and unparsable values are skipped,
    /// so categories missing from the header read as zero.
    pub fn parse_header(header: &str) -> Self {
        let mut counts = Self::default();
        for part in header.split(',') {
            let Some((key, value)) = part.split_once(':') else {
                continue;
            };
            let Ok(key) = key.trim().parse::<CountKey>() else {
                continue;
            };
            if let Ok(value) = value.trim().parse::<u32>() {
                counts.set(key, value);
            }
        }
        counts
    }

    pub fn to_header(&self) -> String {
        CountKey::ALL
            .iter()
            .map(|k| format!("{}:{}", k, self.get(*k)))
            .collect::<Vec<_>>()
            .join(",")
    }
}
