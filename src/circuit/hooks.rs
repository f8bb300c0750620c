//! Host-side callbacks invoked by the circuit module while it runs.
//!
//! The module signals faults through `exceptionHandler(code)` and streams text through
//! `printErrorMessage` / `writeBufferMessage`. Error text is buffered until the next fault,
//! log text is buffered until the module writes a lone newline.

use num_bigint::BigUint;
use thiserror::Error;
use tracing::info;

/// Fault categories reported by `exceptionHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    SignalNotFound,
    TooManySignalsSet,
    SignalAlreadySet,
    AssertionFailed,
    OutOfMemory,
    InputArrayOutOfBounds,
    Unknown,
}

impl FaultKind {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => FaultKind::SignalNotFound,
            2 => FaultKind::TooManySignalsSet,
            3 => FaultKind::SignalAlreadySet,
            4 => FaultKind::AssertionFailed,
            5 => FaultKind::OutOfMemory,
            6 => FaultKind::InputArrayOutOfBounds,
            _ => FaultKind::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FaultKind::SignalNotFound => "Signal not found.\n",
            FaultKind::TooManySignalsSet => "Too many signals set.\n",
            FaultKind::SignalAlreadySet => "Signal already set.\n",
            FaultKind::AssertionFailed => "Assert Failed.\n",
            FaultKind::OutOfMemory => "Not enough memory.\n",
            FaultKind::InputArrayOutOfBounds => "Input signal array access exceeds the size.\n",
            FaultKind::Unknown => "Unknown error.\n",
        }
    }
}

/// A fault raised by the module; `message` is the kind text followed by any buffered
/// error output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CircuitFault {
    kind: FaultKind,
    code: u32,
    message: String,
}

impl CircuitFault {
    pub fn new(code: u32, diagnostics: &str) -> Self {
        let kind = FaultKind::from_code(code);
        Self {
            kind,
            code,
            message: format!("{}{}", kind.description(), diagnostics),
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Behaviour behind the `runtime.*` imports. The bridge drains the module's text and
/// window channels and hands the results to these methods.
pub trait HostHooks: Send + 'static {
    fn on_fault(&mut self, code: u32) -> CircuitFault;
    fn on_drain_error(&mut self, message: &str);
    fn on_drain_log(&mut self, message: &str);
    fn on_dump_memory(&mut self, value: &BigUint);
}

/// Owned accumulator for the module's error and log output.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBuffer {
    errors: String,
    line: String,
}

impl DiagnosticBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one item to the pending log line, space separated.
    pub fn append(&mut self, item: &str) {
        if !self.line.is_empty() {
            self.line.push(' ');
        }
        self.line.push_str(item);
    }

    /// Takes the pending log line, leaving it empty.
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.line)
    }

    /// Takes the buffered error text, leaving it empty.
    pub fn drain_errors(&mut self) -> String {
        std::mem::take(&mut self.errors)
    }

    pub fn pending_line(&self) -> &str {
        &self.line
    }

    pub fn pending_errors(&self) -> &str {
        &self.errors
    }
}

impl HostHooks for DiagnosticBuffer {
    fn on_fault(&mut self, code: u32) -> CircuitFault {
        let errors = self.drain_errors();
        CircuitFault::new(code, &errors)
    }

    fn on_drain_error(&mut self, message: &str) {
        self.errors.push_str(message);
        self.errors.push('\n');
    }

    fn on_drain_log(&mut self, message: &str) {
        // circom's log() always terminates with a lone "\n"
        if message == "\n" {
            let line = self.flush();
            info!(target: "circuit", "{}", line);
        } else {
            self.append(message);
        }
    }

    fn on_dump_memory(&mut self, value: &BigUint) {
        self.append(&value.to_string());
    }
}
