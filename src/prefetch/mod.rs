//! Image prefetching for catalog links.

mod images;
mod pages;
mod prefetcher;
mod seen;

pub use images::{ImageScanError, PageImages, PrefetchImage, extract_images};
pub use pages::{PageImagesService, PageSource};
pub use prefetcher::{
    DEFAULT_DEBOUNCE, DEFAULT_LIST_CAPACITY, HoverOutcome, ImagePrefetcher, PrefetchClient,
    PrefetchError, PrefetchOptions, ViewportOutcome, should_prefetch,
};
pub use seen::{DEFAULT_SEEN_CAPACITY, SeenSet};
