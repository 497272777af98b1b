//! Paginated stream for lazy iteration over list endpoints.
//!
//! List endpoints answer with a DRF-style envelope:
//!
//! ```json
//! {"count": 5, "next": "https://…/orders/?page=2", "previous": null, "results": [...]}
//! ```
//!
//! [`PaginatedStream`] follows `next` one page at a time, only when polled,
//! so a caller that stops early issues no further requests.

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Type alias for a boxed future used internally.
type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Records on this page, in vendor order
    pub items: Vec<T>,
    /// 1-based position of this page within the stream
    pub number: u32,
    /// Total record count announced by the vendor
    pub total_count: Option<u64>,
    /// Cursor of the following page, `None` on the last page
    pub next: Option<PageCursor>,
}

/// Opaque position of a page, usable to resume a stream at that page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(Url);

impl PageCursor {
    pub(crate) fn new(url: Url) -> Self {
        Self(url)
    }

    pub(crate) fn url(&self) -> &Url {
        &self.0
    }

    /// The cursor as a string, e.g. for logging or persisting.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PageEnvelope<T> {
    Bare(Vec<T>),
    Envelope {
        #[serde(default)]
        count: Option<u64>,
        #[serde(default)]
        next: Option<String>,
        results: Vec<T>,
    },
}

enum NextPage {
    Fetch(Url),
    Invalid(String),
    Done,
}

/// A stream that lazily fetches pages from a list endpoint.
///
/// Pages are fetched strictly in order, one at a time. The stream ends after
/// the last page, after a page fetch fails, or when the vendor repeats a
/// `next` link. A `next` link to a different origin is reported as an error
/// instead of being followed, so the bearer token never leaves the API host.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use localline::{DateRange, LocalLineClient};
///
/// # async fn example(client: LocalLineClient) -> localline::Result<()> {
/// let range = DateRange::parse("2026-10-16", "2026-10-22")?;
/// let mut pages = client.orders().pages(&range)?;
///
/// while let Some(page) = pages.next().await {
///     let page = page?;
///     println!("page {} has {} orders", page.number, page.items.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct PaginatedStream<T> {
    /// Function to fetch a page by URL.
    fetch_page: Box<dyn Fn(Url) -> BoxFuture<'static, Result<Value>> + Send + Sync>,
    origin: url::Origin,
    next_page: NextPage,
    seen: HashSet<String>,
    pages_fetched: u32,
    /// Current in-flight fetch and the URL it is for.
    pending_fetch: Option<(Url, BoxFuture<'static, Result<Value>>)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PaginatedStream<T> {
    /// Create a stream starting at `first`. Links are only followed within
    /// the origin of `first`.
    pub fn new<F>(first: Url, fetch_page: F) -> Self
    where
        F: Fn(Url) -> BoxFuture<'static, Result<Value>> + Send + Sync + 'static,
    {
        Self {
            fetch_page: Box::new(fetch_page),
            origin: first.origin(),
            next_page: NextPage::Fetch(first),
            seen: HashSet::new(),
            pages_fetched: 0,
            pending_fetch: None,
            _marker: PhantomData,
        }
    }

    /// Cursor of the page the stream will fetch next, if any.
    ///
    /// A new stream started from this cursor (see
    /// [`LocalLineClient::resume`](crate::LocalLineClient::resume)) continues
    /// at that page boundary.
    pub fn next_cursor(&self) -> Option<PageCursor> {
        match (&self.pending_fetch, &self.next_page) {
            (Some((url, _)), _) | (None, NextPage::Fetch(url)) => {
                Some(PageCursor::new(url.clone()))
            }
            _ => None,
        }
    }

    /// Number of pages received so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    fn accept_page(&mut self, current: &Url, value: Value) -> Result<Page<T>>
    where
        T: DeserializeOwned,
    {
        self.pages_fetched += 1;
        let number = self.pages_fetched;

        if !is_list_shape(&value) {
            warn!(page = number, "unrecognised list envelope");
            return Err(Error::UpstreamUnavailable {
                attempts: 1,
                reason: format!(
                    "unrecognised list envelope on page {} ({})",
                    number,
                    describe_shape(&value)
                ),
            });
        }

        let (items, total_count, next) = match serde_json::from_value::<PageEnvelope<T>>(value)? {
            PageEnvelope::Bare(items) => (items, None, None),
            PageEnvelope::Envelope {
                count,
                next,
                results,
            } => (results, count, next.filter(|n| !n.trim().is_empty())),
        };

        self.next_page = match next {
            None => NextPage::Done,
            Some(link) => match current.join(&link) {
                Err(e) => NextPage::Invalid(format!("unreadable pagination link: {}", e)),
                Ok(url) if url.origin() != self.origin => {
                    warn!(host = ?url.host_str(), "pagination link points to another origin");
                    NextPage::Invalid(format!(
                        "pagination link leaves the API origin ({})",
                        url.host_str().unwrap_or("unknown host")
                    ))
                }
                Ok(url) if !self.seen.insert(url.as_str().to_string()) => {
                    warn!(page = number, "pagination link repeats, stopping");
                    NextPage::Done
                }
                Ok(url) => NextPage::Fetch(url),
            },
        };

        debug!(page = number, items = items.len(), more = matches!(self.next_page, NextPage::Fetch(_)), "received page");
        Ok(Page {
            items,
            number,
            total_count,
            next: match &self.next_page {
                NextPage::Fetch(url) => Some(PageCursor::new(url.clone())),
                _ => None,
            },
        })
    }

    /// Drain the stream into a single list of records, in page order.
    ///
    /// # Errors
    ///
    /// Returns the first page error; records already received are dropped.
    pub async fn collect_items(mut self) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut items = Vec::new();
        while let Some(page) = self.next().await {
            items.extend(page?.items);
        }
        Ok(items)
    }
}

/// A bare array, or an object whose `results` is an array.
fn is_list_shape(value: &Value) -> bool {
    match value {
        Value::Array(_) => true,
        Value::Object(map) => map.get("results").is_some_and(Value::is_array),
        _ => false,
    }
}

fn describe_shape(value: &Value) -> String {
    match value {
        Value::Object(map) if map.contains_key("raw") && map.len() == 1 => {
            "response body is not JSON".to_string()
        }
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object without a results list, keys: {}", keys.join(", "))
        }
        Value::Null => "empty response body".to_string(),
        _ => "response is neither a list nor an object".to_string(),
    }
}

impl<T> Stream for PaginatedStream<T>
where
    T: DeserializeOwned,
{
    type Item = Result<Page<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some((url, fut)) = this.pending_fetch.as_mut() {
                return match fut.as_mut().poll(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(Ok(value)) => {
                        let url = url.clone();
                        this.pending_fetch = None;
                        let page = this.accept_page(&url, value);
                        if page.is_err() {
                            this.next_page = NextPage::Done;
                        }
                        Poll::Ready(Some(page))
                    }
                    Poll::Ready(Err(e)) => {
                        this.pending_fetch = None;
                        this.next_page = NextPage::Done; // Stop on error
                        Poll::Ready(Some(Err(e)))
                    }
                };
            }

            match std::mem::replace(&mut this.next_page, NextPage::Done) {
                NextPage::Fetch(url) => {
                    this.seen.insert(url.as_str().to_string());
                    let fut = (this.fetch_page)(url.clone());
                    this.pending_fetch = Some((url, fut));
                }
                NextPage::Invalid(reason) => {
                    return Poll::Ready(Some(Err(Error::UpstreamUnavailable {
                        attempts: 1,
                        reason,
                    })));
                }
                NextPage::Done => return Poll::Ready(None),
            }
        }
    }
}
