//! Terminate signal bridge.
//!
//! Each OS family names its "please stop" requests differently. The bridge
//! resolves a per-platform capability table into a list of
//! [`TerminateEvent`]s once, then binds every entry to the same handler so
//! that ending the process by any of them behaves identically.
//!
//! | Platform | Events                              |
//! |----------|-------------------------------------|
//! | Linux    | interrupt, terminate, hangup        |
//! | Unix     | interrupt, terminate                |
//! | Windows  | break, ctrl-c, ctrl-break           |
//!
//! Entries are installed one at a time. An entry the running host refuses
//! (or that panics while installing) is skipped with a debug line and the
//! rest still get installed.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::debug;

/// One terminate-like request the host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminateEvent {
    /// `SIGINT`
    Interrupt,
    /// `SIGTERM`
    Terminate,
    /// `SIGHUP`
    Hangup,
    /// Windows `SIGBREAK`
    Break,
    /// Windows `CTRL_C_EVENT`
    CtrlC,
    /// Windows `CTRL_BREAK_EVENT`
    CtrlBreak,
}

impl TerminateEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Hangup => "SIGHUP",
            Self::Break => "SIGBREAK",
            Self::CtrlC => "CTRL_C_EVENT",
            Self::CtrlBreak => "CTRL_BREAK_EVENT",
        }
    }

    /// POSIX signal number, when the event is a POSIX signal.
    #[cfg(unix)]
    pub fn signum(self) -> Option<i32> {
        use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
        match self {
            Self::Interrupt => Some(SIGINT),
            Self::Terminate => Some(SIGTERM),
            Self::Hangup => Some(SIGHUP),
            Self::Break | Self::CtrlC | Self::CtrlBreak => None,
        }
    }

    #[cfg(unix)]
    fn from_signum(signum: i32) -> Option<Self> {
        [Self::Interrupt, Self::Terminate, Self::Hangup]
            .into_iter()
            .find(|event| event.signum() == Some(signum))
    }
}

impl std::fmt::Display for TerminateEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// OS family, as far as terminate events are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Unix,
    Windows,
    Other,
}

const POSIX_EVENTS: &[TerminateEvent] = &[TerminateEvent::Interrupt, TerminateEvent::Terminate];
const LINUX_EVENTS: &[TerminateEvent] = &[
    TerminateEvent::Interrupt,
    TerminateEvent::Terminate,
    TerminateEvent::Hangup,
];
const WINDOWS_EVENTS: &[TerminateEvent] = &[
    TerminateEvent::Break,
    TerminateEvent::CtrlC,
    TerminateEvent::CtrlBreak,
];

impl Platform {
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(unix) {
            Self::Unix
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Other
        }
    }

    /// Capability table lookup.
    pub const fn terminate_events(self) -> &'static [TerminateEvent] {
        match self {
            Self::Linux => LINUX_EVENTS,
            Self::Unix => POSIX_EVENTS,
            Self::Windows => WINDOWS_EVENTS,
            Self::Other => &[],
        }
    }
}

/// The one handler every terminate event is routed to.
pub type SignalHandler = Arc<dyn Fn(TerminateEvent) + Send + Sync>;

/// Result of [`SignalBridge::register`]: the events now routed to the handler.
pub struct SignalRegistration {
    installed: Vec<TerminateEvent>,
}

impl SignalRegistration {
    pub fn installed(&self) -> &[TerminateEvent] {
        &self.installed
    }
}

/// Installs handlers for one host API.
pub(crate) trait Install {
    /// Hook a single event. Called once per table entry.
    fn install(&mut self, event: TerminateEvent) -> io::Result<()>;

    /// Start delivering the installed events to `handler`.
    fn finish(self: Box<Self>, handler: SignalHandler) -> io::Result<()>;
}

pub struct SignalBridge {
    events: Vec<TerminateEvent>,
}

impl SignalBridge {
    /// Bridge for the running host.
    pub fn for_host() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self::with_events(platform.terminate_events().to_vec())
    }

    pub(crate) fn with_events(events: Vec<TerminateEvent>) -> Self {
        Self { events }
    }

    /// Bind `handler` to every terminate event of this bridge.
    pub fn register(&self, handler: SignalHandler) -> SignalRegistration {
        self.register_with(Box::new(host::HostInstaller::new()), handler)
    }

    pub(crate) fn register_with(
        &self,
        mut installer: Box<dyn Install>,
        handler: SignalHandler,
    ) -> SignalRegistration {
        let mut installed = Vec::with_capacity(self.events.len());

        for &event in &self.events {
            match panic::catch_unwind(AssertUnwindSafe(|| installer.install(event))) {
                Ok(Ok(())) => installed.push(event),
                Ok(Err(err)) => debug!("signal"; "skipping {}: {}", event, err),
                Err(_) => debug!("signal"; "skipping {}: install panicked", event),
            }
        }

        if !installed.is_empty() {
            let finish = panic::catch_unwind(AssertUnwindSafe(|| {
                installer.finish(Arc::clone(&handler))
            }));
            match finish {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!("signal"; "could not start signal delivery: {}", err);
                    installed.clear();
                }
                Err(_) => {
                    debug!("signal"; "signal delivery setup panicked");
                    installed.clear();
                }
            }
        }

        SignalRegistration { installed }
    }
}

#[cfg(unix)]
mod host {
    use std::io;
    use std::thread;

    use signal_hook::consts::FORBIDDEN;
    use signal_hook::iterator::Signals;

    use super::{Install, SignalHandler, TerminateEvent};

    /// Delivers POSIX signals through a `signal-hook` iterator thread, so the
    /// handler runs as ordinary code instead of in signal context.
    pub struct HostInstaller {
        signals: Option<Signals>,
    }

    impl HostInstaller {
        pub fn new() -> Self {
            Self {
                signals: Signals::new(std::iter::empty::<i32>()).ok(),
            }
        }
    }

    impl Install for HostInstaller {
        fn install(&mut self, event: TerminateEvent) -> io::Result<()> {
            let Some(signum) = event.signum() else {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "not a POSIX signal",
                ));
            };
            if FORBIDDEN.contains(&signum) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "signal cannot be intercepted",
                ));
            }
            let signals = self
                .signals
                .as_ref()
                .ok_or_else(|| io::Error::other("signal iterator unavailable"))?;
            signals.add_signal(signum)
        }

        fn finish(self: Box<Self>, handler: SignalHandler) -> io::Result<()> {
            let mut signals = self
                .signals
                .ok_or_else(|| io::Error::other("signal iterator unavailable"))?;
            thread::Builder::new()
                .name("folio-signal".into())
                .spawn(move || {
                    for signum in signals.forever() {
                        if let Some(event) = TerminateEvent::from_signum(signum) {
                            handler(event);
                        }
                    }
                })?;
            Ok(())
        }
    }
}

#[cfg(windows)]
mod host {
    use std::io;

    use super::{Install, SignalHandler, TerminateEvent};

    /// Console control events all arrive through one `ctrlc` handler, which
    /// cannot tell them apart; delivery reports [`TerminateEvent::CtrlC`].
    pub struct HostInstaller;

    impl HostInstaller {
        pub fn new() -> Self {
            Self
        }
    }

    impl Install for HostInstaller {
        fn install(&mut self, event: TerminateEvent) -> io::Result<()> {
            match event {
                TerminateEvent::Break | TerminateEvent::CtrlC | TerminateEvent::CtrlBreak => Ok(()),
                _ => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "not a console control event",
                )),
            }
        }

        fn finish(self: Box<Self>, handler: SignalHandler) -> io::Result<()> {
            ctrlc::try_set_handler(move || handler(TerminateEvent::CtrlC)).map_err(io::Error::other)
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod host {
    use std::io;

    use super::{Install, SignalHandler, TerminateEvent};

    pub struct HostInstaller;

    impl HostInstaller {
        pub fn new() -> Self {
            Self
        }
    }

    impl Install for HostInstaller {
        fn install(&mut self, _event: TerminateEvent) -> io::Result<()> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no signal support on this platform",
            ))
        }

        fn finish(self: Box<Self>, _handler: SignalHandler) -> io::Result<()> {
            Ok(())
        }
    }
}
