//! Files served from memory under `saucer://embedded/`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use url::Url;

use crate::scheme::{Executor, Request, Response, SchemeError};
use crate::sync::read;

pub(crate) const EMBEDDED_HOST: &str = "embedded";

/// Content and MIME type of an embedded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    pub content: Arc<[u8]>,
    pub mime: String,
}

impl EmbeddedFile {
    pub fn new(content: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        let content: Vec<u8> = content.into();
        Self {
            content: content.into(),
            mime: mime.into(),
        }
    }
}

pub(crate) type EmbeddedFiles = Arc<RwLock<HashMap<String, EmbeddedFile>>>;

/// URL at which `path` is served.
pub(crate) fn url_for(path: &str) -> String {
    format!("{}://{EMBEDDED_HOST}/{}", crate::scheme::BUILTIN_SCHEME, path.trim_start_matches('/'))
}

/// Table key for a request URL, or `None` if the URL does not point into the embedded origin.
fn key_for(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    if url.host_str() != Some(EMBEDDED_HOST) {
        return None;
    }
    Some(url.path().trim_start_matches('/').to_string())
}

pub(crate) fn resolve(files: &EmbeddedFiles, request: Request, executor: Executor) {
    let Some(key) = key_for(&request.uri().to_string()) else {
        executor.reject(SchemeError::Invalid);
        return;
    };

    let file = read(files).get(&key).cloned();
    match file {
        Some(file) => executor.resolve(Response::new(file.content.to_vec(), file.mime)),
        None => {
            log::debug!("no embedded file at {key:?}");
            executor.reject(SchemeError::NotFound);
        }
    }
}
