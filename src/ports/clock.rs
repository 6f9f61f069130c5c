//! Clock port, injectable so replay windows and timestamps are testable.

use crate::domain::foundation::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
