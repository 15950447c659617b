//! Failure containment for independently rendered sections. A failed
//! section logs and renders its fallback while the rest of the page carries on.

use std::{fmt::Display, future::Future};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "value")]
pub enum Region<T> {
    Ready(T),
    Failed,
}

impl<T> Region<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Region::Ready(value) => Some(value),
            Region::Failed => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Region::Failed)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Region<U> {
        match self {
            Region::Ready(value) => Region::Ready(f(value)),
            Region::Failed => Region::Failed,
        }
    }

    pub fn unwrap_or(self, fallback: T) -> T {
        self.ready().unwrap_or(fallback)
    }
}

pub fn region<T, E: Display>(name: &str, result: Result<T, E>) -> Region<T> {
    match result {
        Ok(value) => Region::Ready(value),
        Err(e) => {
            warn!("Section {name} failed: {e}");
            Region::Failed
        }
    }
}

pub async fn region_async<T, E: Display>(name: &str, future: impl Future<Output = Result<T, E>>) -> Region<T> {
    region(name, future.await)
}
