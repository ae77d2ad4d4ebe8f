use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("alignment must be one of 'l', 'c' or 'r', got {0:?}")]
    InvalidAlignment(char),

    #[error("the bar process is not running")]
    BarNotRunning,

    #[error("geometry of output {0:?} could not be fetched")]
    UnknownOutput(String),

    #[error("x11 error: {0}")]
    X11(String),

    #[error("mpd error: {0}")]
    Mpd(String),
}

impl From<xcb::Error> for Error {
    fn from(e: xcb::Error) -> Self {
        Self::X11(e.to_string())
    }
}

impl From<xcb::ConnError> for Error {
    fn from(e: xcb::ConnError) -> Self {
        Self::X11(e.to_string())
    }
}

impl From<xcb::ProtocolError> for Error {
    fn from(e: xcb::ProtocolError) -> Self {
        Self::X11(e.to_string())
    }
}
