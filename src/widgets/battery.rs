//! Battery charge from sysfs.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use lazy_static::lazy_static;

use super::{Widget, WidgetCore, WidgetStyle};

const SYSFS_POWER_SUPPLY: &str = "/sys/class/power_supply";

lazy_static! {
    /// Sysfs exposes either the energy_* or the charge_* family depending
    /// on the driver; the ratios work the same either way.
    static ref GAUGE_FILES: Vec<(&'static str, &'static str, &'static str)> = vec![
        ("energy_now", "energy_full", "power_now"),
        ("charge_now", "charge_full", "current_now"),
    ];
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct BatteryState {
    name: String,
    capacity: u8,
    status: String,
    /// Hours and minutes until empty (discharging) or full (charging).
    remaining: Option<(u64, u64)>,
}

fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}

fn read_number(path: &Path) -> Option<u64> {
    read_trimmed(path)?.parse().ok()
}

fn remaining_time(dir: &Path, status: &str) -> Option<(u64, u64)> {
    for (now_file, full_file, rate_file) in GAUGE_FILES.iter() {
        let Some(now) = read_number(&dir.join(now_file)) else {
            continue;
        };
        let full = read_number(&dir.join(full_file))?;
        let rate = read_number(&dir.join(rate_file))?;
        if rate == 0 {
            return None;
        }

        let left = match status {
            "Discharging" => now,
            "Charging" => full.saturating_sub(now),
            _ => return None,
        };
        let minutes = left * 60 / rate;
        return Some((minutes / 60, minutes % 60));
    }
    None
}

fn read_battery(dir: &Path) -> Option<BatteryState> {
    if read_trimmed(&dir.join("type"))? != "Battery" {
        return None;
    }
    let status = read_trimmed(&dir.join("status"))?;
    Some(BatteryState {
        name: dir.file_name()?.to_string_lossy().into_owned(),
        capacity: read_number(&dir.join("capacity"))?.min(100) as u8,
        remaining: remaining_time(dir, &status),
        status,
    })
}

fn read_batteries(base: &Path) -> Vec<BatteryState> {
    let Ok(entries) = std::fs::read_dir(base) else {
        return Vec::new();
    };
    let mut batteries: Vec<BatteryState> = entries
        .flatten()
        .filter_map(|entry| read_battery(&entry.path()))
        .collect();
    batteries.sort_by(|a, b| a.name.cmp(&b.name));
    batteries
}

fn render(batteries: &[BatteryState]) -> String {
    let parts: Vec<String> = batteries
        .iter()
        .map(|battery| {
            let mut part = String::new();
            if batteries.len() > 1 {
                part.push_str(&battery.name);
                part.push_str(": ");
            }
            part.push_str(&format!("{}%", battery.capacity));
            if let Some((hours, minutes)) = battery.remaining {
                part.push_str(&format!(" - {hours}:{minutes:02}"));
            }
            part
        })
        .collect();
    parts.join(" | ")
}

/// Charge of every battery under `/sys/class/power_supply`, polled at the
/// refresh rate. With more than one battery each gets a name prefix.
pub struct BatteryWidget {
    core: WidgetCore,
    base: PathBuf,
}

impl BatteryWidget {
    #[must_use]
    pub fn new(style: WidgetStyle, refresh: Duration) -> Arc<Self> {
        Self::with_base(SYSFS_POWER_SUPPLY, style, refresh)
    }

    #[must_use]
    pub fn with_base(
        base: impl Into<PathBuf>,
        style: WidgetStyle,
        refresh: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: WidgetCore::new(style, Some(refresh)),
            base: base.into(),
        })
    }
}

impl Widget for BatteryWidget {
    fn core(&self) -> &WidgetCore {
        &self.core
    }

    fn update(&self) {
        let batteries = read_batteries(&self.base);
        if batteries.is_empty() {
            self.core.set_content(String::new());
            return;
        }
        self.core.set_content(self.core.decorate(&render(&batteries)));
    }

    fn periodic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_battery(base: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = base.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            std::fs::write(dir.join(file), format!("{content}\n")).unwrap();
        }
    }

    #[test]
    fn single_battery_renders_capacity_and_time() {
        let base = tempfile::tempdir().unwrap();
        write_battery(
            base.path(),
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Discharging"),
                ("capacity", "42"),
                ("energy_now", "30000"),
                ("energy_full", "60000"),
                ("power_now", "20000"),
            ],
        );

        let widget =
            BatteryWidget::with_base(base.path(), WidgetStyle::default(), Duration::from_secs(30));
        widget.update();
        assert_eq!(widget.core().content(), "42% - 1:30");
    }

    #[test]
    fn charging_counts_up_to_full() {
        let base = tempfile::tempdir().unwrap();
        write_battery(
            base.path(),
            "BAT0",
            &[
                ("type", "Battery"),
                ("status", "Charging"),
                ("capacity", "50"),
                ("charge_now", "1000"),
                ("charge_full", "2000"),
                ("current_now", "2000"),
            ],
        );

        let batteries = read_batteries(base.path());
        assert_eq!(batteries[0].remaining, Some((0, 30)));
    }

    #[test]
    fn multiple_batteries_get_name_prefixes_in_order() {
        let base = tempfile::tempdir().unwrap();
        for (name, capacity) in [("BAT1", "20"), ("BAT0", "80")] {
            write_battery(
                base.path(),
                name,
                &[
                    ("type", "Battery"),
                    ("status", "Full"),
                    ("capacity", capacity),
                ],
            );
        }
        // AC adapters are not batteries.
        write_battery(base.path(), "AC", &[("type", "Mains")]);

        let batteries = read_batteries(base.path());
        assert_eq!(render(&batteries), "BAT0: 80% | BAT1: 20%");
    }

    #[test]
    fn no_batteries_renders_nothing() {
        let base = tempfile::tempdir().unwrap();
        let widget =
            BatteryWidget::with_base(base.path(), WidgetStyle::default(), Duration::from_secs(30));
        widget.update();
        assert_eq!(widget.core().content(), "");
    }
}
