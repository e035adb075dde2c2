use std::fmt;
use std::time::Duration;

use crate::driver::DriverError;

/// Terminal failure of a wait, carrying enough context to diagnose the
/// test without rerunning it: the handle's description, the unmet
/// condition's label, the configured timeout and the last driver failure.
#[derive(Debug)]
pub enum Error {
    /// The element never resolved before the deadline
    ElementNotFound {
        search: String,
        expected: String,
        timeout: Duration,
        cause: Option<DriverError>,
    },
    /// The element resolved but never satisfied the condition
    ElementShould {
        search: String,
        prefix: String,
        condition: String,
        actual: Option<String>,
        timeout: Duration,
        cause: Option<DriverError>,
    },
    /// The condition still held when it should not have
    ElementShouldNot {
        search: String,
        prefix: String,
        condition: String,
        actual: Option<String>,
        timeout: Duration,
        cause: Option<DriverError>,
    },
    /// A collection never reached the expected size; `expected` is the
    /// rendered comparison, e.g. `< 10`
    ListSizeMismatch {
        expected: String,
        actual: usize,
        collection: String,
        elements: Vec<String>,
        timeout: Duration,
    },
    /// A collection never showed the expected texts
    TextsMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
        collection: String,
        timeout: Duration,
    },
    FrameNotFound {
        description: String,
        timeout: Duration,
        cause: Option<DriverError>,
    },
    WindowNotFound {
        description: String,
        timeout: Duration,
        cause: Option<DriverError>,
    },
    AlertNotFound {
        timeout: Duration,
        cause: Option<DriverError>,
    },
    /// Malformed selector; fatal, never retried
    InvalidSelector {
        selector: String,
        cause: DriverError,
    },
    /// Name not declared in the page schema
    UnknownPageField(String),
    /// Driver failure outside the transient classes, wrapped exactly once
    Driver(DriverError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ElementNotFound {
                search,
                expected,
                timeout,
                cause,
            } => {
                write!(
                    f,
                    "Element not found {{{}}}\nExpected: {}\nTimeout: {}",
                    search,
                    expected,
                    format_timeout(*timeout)
                )?;
                write_cause(f, cause)
            }
            Error::ElementShould {
                search,
                prefix,
                condition,
                actual,
                timeout,
                cause,
            } => {
                write!(f, "Element should {}{} {{{}}}", prefix, condition, search)?;
                if let Some(actual) = actual {
                    write!(f, "\nActual value: {}", actual)?;
                }
                write!(f, "\nTimeout: {}", format_timeout(*timeout))?;
                write_cause(f, cause)
            }
            Error::ElementShouldNot {
                search,
                prefix,
                condition,
                actual,
                timeout,
                cause,
            } => {
                write!(f, "Element should not {}{} {{{}}}", prefix, condition, search)?;
                if let Some(actual) = actual {
                    write!(f, "\nActual value: {}", actual)?;
                }
                write!(f, "\nTimeout: {}", format_timeout(*timeout))?;
                write_cause(f, cause)
            }
            Error::ListSizeMismatch {
                expected,
                actual,
                collection,
                elements,
                timeout,
            } => {
                write!(
                    f,
                    "List size mismatch: expected: {}, actual: {}, collection: {}\nElements: {}\nTimeout: {}",
                    expected,
                    actual,
                    collection,
                    format_list(elements),
                    format_timeout(*timeout)
                )
            }
            Error::TextsMismatch {
                expected,
                actual,
                collection,
                timeout,
            } => {
                write!(
                    f,
                    "Texts mismatch\nActual: {}\nExpected: {}\nCollection: {}\nTimeout: {}",
                    format_list(actual),
                    format_list(expected),
                    collection,
                    format_timeout(*timeout)
                )
            }
            Error::FrameNotFound {
                description,
                timeout,
                cause,
            } => {
                write!(
                    f,
                    "No frame found with {}\nTimeout: {}",
                    description,
                    format_timeout(*timeout)
                )?;
                write_cause(f, cause)
            }
            Error::WindowNotFound {
                description,
                timeout,
                cause,
            } => {
                write!(
                    f,
                    "No window found with {}\nTimeout: {}",
                    description,
                    format_timeout(*timeout)
                )?;
                write_cause(f, cause)
            }
            Error::AlertNotFound { timeout, cause } => {
                write!(f, "Alert not found\nTimeout: {}", format_timeout(*timeout))?;
                write_cause(f, cause)
            }
            Error::InvalidSelector { selector, cause } => {
                write!(f, "Invalid selector {{{}}}\nCaused by: {}", selector, cause)
            }
            Error::UnknownPageField(name) => {
                write!(f, "Unknown page field: {}", name)
            }
            Error::Driver(cause) => write!(f, "{}", cause),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ElementNotFound { cause, .. }
            | Error::ElementShould { cause, .. }
            | Error::ElementShouldNot { cause, .. }
            | Error::FrameNotFound { cause, .. }
            | Error::WindowNotFound { cause, .. }
            | Error::AlertNotFound { cause, .. } => {
                cause.as_ref().map(|c| c as &(dyn std::error::Error + 'static))
            }
            Error::InvalidSelector { cause, .. } => {
                Some(cause as &(dyn std::error::Error + 'static))
            }
            Error::Driver(cause) => Some(cause as &(dyn std::error::Error + 'static)),
            Error::ListSizeMismatch { .. }
            | Error::TextsMismatch { .. }
            | Error::UnknownPageField(_) => None,
        }
    }
}

impl From<DriverError> for Error {
    fn from(cause: DriverError) -> Self {
        Error::Driver(cause)
    }
}

fn write_cause(f: &mut fmt::Formatter<'_>, cause: &Option<DriverError>) -> fmt::Result {
    if let Some(cause) = cause {
        write!(f, "\nCaused by: {}", cause)?;
    }
    Ok(())
}

/// Renders a wait budget the way test output reads best: whole seconds as
/// `4 s.`, anything finer as `250 ms.`
fn format_timeout(timeout: Duration) -> String {
    let millis = timeout.as_millis();
    if millis % 1000 == 0 {
        format!("{} s.", millis / 1000)
    } else {
        format!("{} ms.", millis)
    }
}

fn format_list(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
