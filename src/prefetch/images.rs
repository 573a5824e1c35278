//! `<img>` extraction from rendered pages.

use std::cell::RefCell;
use std::rc::Rc;

use lol_html::{RewriteStrSettings, element, rewrite_str};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOADING_LAZY: &str = "lazy";
const LOADING_AUTO: &str = "auto";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchImage {
    pub src: String,
    #[serde(default)]
    pub srcset: Option<String>,
    #[serde(default)]
    pub sizes: Option<String>,
    #[serde(default)]
    pub alt: String,
    #[serde(default = "default_loading")]
    pub loading: String,
}

impl PrefetchImage {
    pub fn is_lazy(&self) -> bool {
        self.loading.eq_ignore_ascii_case(LOADING_LAZY)
    }
}

fn default_loading() -> String {
    LOADING_AUTO.to_string()
}

/// Body of `GET /api/prefetch-images/{*path}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImages {
    pub images: Vec<PrefetchImage>,
}

#[derive(Debug, Error)]
#[error("failed to scan page markup: {0}")]
pub struct ImageScanError(String);

/// Collects every `<img>` with a non-empty `src`, in document order.
pub fn extract_images(html: &str) -> Result<Vec<PrefetchImage>, ImageScanError> {
    let found = Rc::new(RefCell::new(Vec::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", {
                let found = Rc::clone(&found);
                move |el| {
                    let Some(src) = el.get_attribute("src").filter(|src| !src.is_empty()) else {
                        return Ok(());
                    };
                    found.borrow_mut().push(PrefetchImage {
                        src,
                        srcset: el.get_attribute("srcset"),
                        sizes: el.get_attribute("sizes"),
                        alt: el.get_attribute("alt").unwrap_or_default(),
                        loading: el
                            .get_attribute("loading")
                            .unwrap_or_else(default_loading),
                    });
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| ImageScanError(err.to_string()))?;

    Ok(found.take())
}
