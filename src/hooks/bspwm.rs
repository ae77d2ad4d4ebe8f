//! bspwm report subscription.

use super::{CommandConfig, HookConfig};

/// State of one monitor as described by a bspwm report line.
///
/// Desktops keep their report token untouched (`"fDesktop2"`): the first
/// character encodes the occupied/free/urgent and focused state, which the
/// widget layer turns into colours.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorStatus {
    pub name: String,
    pub focused: bool,
    pub desktops: Vec<String>,
    pub layout: Option<String>,
}

/// Subscription command for bspwm >= 0.9.1.
#[must_use]
pub fn config() -> HookConfig {
    HookConfig::Bspwm(CommandConfig::new(["bspc", "subscribe", "report"]))
}

/// Parse a bspwm status line into per-monitor records, in report order.
///
/// The line is a string of colon-separated tokens: `M`/`m` starts a new
/// (focused/unfocused) monitor, `O`/`o`/`F`/`f`/`U`/`u` appends a desktop
/// to the last seen monitor and `L` sets its layout.
#[must_use]
pub fn parse_status(line: &str) -> Vec<MonitorStatus> {
    let mut monitors: Vec<MonitorStatus> = Vec::new();

    // Reports start with a "W" marker.
    let status = line.strip_prefix('W').unwrap_or(line);
    for token in status.split(':') {
        let Some(first) = token.chars().next() else {
            continue;
        };
        match first {
            'M' | 'm' => monitors.push(MonitorStatus {
                name: token[1..].to_string(),
                focused: first == 'M',
                ..MonitorStatus::default()
            }),
            'O' | 'o' | 'F' | 'f' | 'U' | 'u' => {
                if let Some(monitor) = monitors.last_mut() {
                    monitor.desktops.push(token.to_string());
                }
            }
            'L' => {
                if let Some(monitor) = monitors.last_mut() {
                    monitor.layout = Some(token[1..].to_string());
                }
            }
            _ => {}
        }
    }

    monitors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_report() {
        let status = "WmHDMI-0:Ou:LT:MDVI-D-0:fo:f7:fDesktop2:os:Of:fp:oq:fi:LT:\
                      mDVI-I-0:Od:LT";

        let expected = vec![
            MonitorStatus {
                name: "HDMI-0".to_string(),
                focused: false,
                desktops: vec!["Ou".to_string()],
                layout: Some("T".to_string()),
            },
            MonitorStatus {
                name: "DVI-D-0".to_string(),
                focused: true,
                desktops: ["fo", "f7", "fDesktop2", "os", "Of", "fp", "oq", "fi"]
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                layout: Some("T".to_string()),
            },
            MonitorStatus {
                name: "DVI-I-0".to_string(),
                focused: false,
                desktops: vec!["Od".to_string()],
                layout: Some("T".to_string()),
            },
        ];

        assert_eq!(parse_status(status), expected);
    }

    #[test]
    fn monitor_insertion_order_is_preserved() {
        let monitors = parse_status("Wma:Of:mb:of:Mc:Ff");
        let names: Vec<_> = monitors.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(monitors[2].focused);
    }

    #[test]
    fn desktop_tokens_before_any_monitor_are_ignored() {
        assert!(parse_status("WOu:fo").is_empty());
    }

    #[test]
    fn empty_line_parses_to_no_monitors() {
        assert!(parse_status("").is_empty());
    }
}
