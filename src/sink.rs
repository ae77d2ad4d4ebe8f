use std::{
    io::Write,
    process::{Child, Command, Stdio},
};

use crate::error::{Error, Result};

/// Geometry passed to the bar through its `-g` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Geometry {
    /// An already formatted `WxH+X+Y` string, passed through verbatim.
    Literal(String),
    /// Width, height and position. Missing fields render as empty strings,
    /// which lemonbar interprets as "use the default".
    Size {
        width: Option<u32>,
        height: Option<u32>,
        x: Option<i32>,
        y: Option<i32>,
    },
}

impl Geometry {
    #[must_use]
    pub fn flag_value(&self) -> String {
        fn field<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        match self {
            Self::Literal(s) => s.clone(),
            Self::Size {
                width,
                height,
                x,
                y,
            } => format!(
                "{}x{}+{}+{}",
                field(width),
                field(height),
                field(x),
                field(y)
            ),
        }
    }
}

/// Invocation of the external bar process.
#[derive(Clone, Debug)]
pub struct BarConfig {
    /// Path or name of the bar command.
    pub cmd: String,
    pub geometry: Option<Geometry>,
    pub fonts: Vec<String>,
    pub fg: Option<String>,
    pub bg: Option<String>,
    /// Number of clickable areas, for the `-a` flag.
    pub clickable: Option<u32>,
    /// Extra arguments appended verbatim.
    pub extra: Vec<String>,
}

impl Default for BarConfig {
    fn default() -> Self {
        Self {
            cmd: "lemonbar".to_string(),
            geometry: None,
            fonts: Vec::new(),
            fg: None,
            bg: None,
            clickable: None,
            extra: Vec::new(),
        }
    }
}

/// Translate a [`BarConfig`] into the full argument vector of the bar.
#[must_use]
pub fn bar_args(config: &BarConfig) -> Vec<String> {
    let mut args = vec![config.cmd.clone()];
    if let Some(geometry) = &config.geometry {
        args.push("-g".to_string());
        args.push(geometry.flag_value());
    }
    for font in &config.fonts {
        args.push("-f".to_string());
        args.push(font.clone());
    }
    if let Some(fg) = &config.fg {
        args.push("-F".to_string());
        args.push(fg.clone());
    }
    if let Some(bg) = &config.bg {
        args.push("-B".to_string());
        args.push(bg.clone());
    }
    if let Some(clickable) = config.clickable {
        args.push("-a".to_string());
        args.push(clickable.to_string());
    }
    args.extend(config.extra.iter().cloned());
    args
}

/// Owns the external bar subprocess and the shell that executes the
/// commands the bar prints for clicked areas.
pub struct Bar {
    config: BarConfig,
    child: Option<Child>,
    runner: Option<Child>,
}

impl Bar {
    #[must_use]
    pub fn new(config: BarConfig) -> Self {
        Self {
            config,
            child: None,
            runner: None,
        }
    }

    /// Spawn the bar, terminating any previous instance first.
    pub fn init(&mut self) -> Result<()> {
        self.terminate(false);

        let args = bar_args(&self.config);
        tracing::debug!("launching {:?}", args);

        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;

        // Clicked areas make the bar print shell commands on its stdout.
        // Feed them straight into a shell.
        if let Some(stdout) = child.stdout.take() {
            match Command::new("sh").stdin(Stdio::from(stdout)).spawn() {
                Ok(runner) => self.runner = Some(runner),
                Err(e) => tracing::error!("could not spawn the click handler shell: {e}"),
            }
        }

        self.child = Some(child);
        Ok(())
    }

    fn write_frame(&mut self, frame: &str) -> Result<()> {
        let child = self.child.as_mut().ok_or(Error::BarNotRunning)?;
        let stdin = child.stdin.as_mut().ok_or(Error::BarNotRunning)?;
        stdin.write_all(frame.as_bytes())?;
        stdin.write_all(b"\n")?;
        stdin.flush()?;
        Ok(())
    }

    /// Write one newline-terminated frame.
    ///
    /// A broken pipe means the bar died; it is respawned and the write is
    /// retried exactly once before the error is propagated.
    pub fn write(&mut self, frame: &str) -> Result<()> {
        match self.write_frame(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::info!("bar is off ({e}), reinitialising it");
                self.init()?;
                self.write_frame(frame)
            }
        }
    }

    /// Terminate the bar and its click handler. An already dead process is
    /// not an error.
    pub fn terminate(&mut self, kill: bool) {
        for child in [self.child.take(), self.runner.take()].iter_mut().flatten() {
            if !kill {
                // Closing stdin lets lemonbar exit on its own.
                drop(child.stdin.take());
            }
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for Bar {
    fn drop(&mut self) {
        self.terminate(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_args_full() {
        let config = BarConfig {
            cmd: "lemonbar".to_string(),
            geometry: Some(Geometry::Size {
                width: Some(250),
                height: Some(250),
                x: Some(5),
                y: Some(5),
            }),
            fonts: vec![
                "DejaVu Sans Mono for Powerline:size=10".to_string(),
                "FontAwesome:size=12".to_string(),
            ],
            fg: Some("#FFFFFFFF".to_string()),
            bg: Some("#FF000000".to_string()),
            clickable: Some(20),
            extra: vec!["-u".to_string(), "2".to_string()],
        };

        let expected = [
            "lemonbar",
            "-g",
            "250x250+5+5",
            "-f",
            "DejaVu Sans Mono for Powerline:size=10",
            "-f",
            "FontAwesome:size=12",
            "-F",
            "#FFFFFFFF",
            "-B",
            "#FF000000",
            "-a",
            "20",
            "-u",
            "2",
        ];
        assert_eq!(bar_args(&config), expected);
    }

    #[test]
    fn bar_args_defaults_to_bare_command() {
        assert_eq!(bar_args(&BarConfig::default()), ["lemonbar"]);
    }

    #[test]
    fn geometry_literal_passes_through() {
        let config = BarConfig {
            geometry: Some(Geometry::Literal("250x250+5+5".to_string())),
            ..BarConfig::default()
        };
        assert_eq!(bar_args(&config), ["lemonbar", "-g", "250x250+5+5"]);
    }

    #[test]
    fn geometry_missing_fields_render_empty() {
        let geometry = Geometry::Size {
            width: None,
            height: Some(18),
            x: None,
            y: None,
        };
        assert_eq!(geometry.flag_value(), "x18++");
    }
}
