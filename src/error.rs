#[derive(Debug)]
pub enum Error<E> {
    Transport(E),
    /// A secure session owns the controller; nothing was sent.
    SessionLocked,
    Protocol(ProtocolError),
    NotInitialized,
    InvalidTransition,
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Transport(value)
    }
}

impl<E> Error<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) | Self::SessionLocked => ErrorKind::Transport,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::NotInitialized | Self::InvalidTransition => ErrorKind::Protocol,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SessionLocked => "session_locked",
            Self::NotInitialized => "not_initialized",
            Self::InvalidTransition => "invalid_transition",
            Self::Transport(_) | Self::Protocol(_) => self.kind().label(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    UnknownStatus(u32),
    BadSignature(u32),
    CountOutOfRange(u8),
    BadScanMagic(u32),
}

/// Failure categories consumed by the recovery policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Protocol,
    DeviceException { code: u8 },
    Watchdog,
}

impl ErrorKind {
    /// Whether this kind bypasses the interrupt error budget.
    pub const fn escalates_immediately(self) -> bool {
        matches!(self, Self::DeviceException { .. } | Self::Watchdog)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::DeviceException { .. } => "exception",
            Self::Watchdog => "watchdog",
        }
    }
}
