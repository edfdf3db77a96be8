//! Cursor pagination over list-style Web API methods.

use futures_util::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::web_api::{HttpVerb, Params, WebApiClient, WebApiError};

/// Parameter that carries the continuation cursor between pages.
pub const CURSOR_PARAM: &str = "cursor";

enum PageState {
    Next { params: Params, page: usize },
    Done,
}

impl WebApiClient {
    /// Lazily yields every item of `result_field` across all pages.
    ///
    /// Pages are requested with `GET`, each one only once the previous page's
    /// items are consumed. The sequence ends when a page omits its cursor, when
    /// a page soft-fails (`ok: false`), or when the client's page cap is hit.
    /// Items already yielded before a soft failure are not retracted.
    pub fn paginate<'a>(
        &'a self,
        method: &'a str,
        result_field: &'a str,
        params: Params,
    ) -> impl Stream<Item = Result<Value, WebApiError>> + 'a {
        let pages = stream::try_unfold(PageState::Next { params, page: 0 }, move |state| {
            self.fetch_page(method, result_field, state)
        });

        pages
            .map_ok(|items| stream::iter(items.into_iter().map(Ok::<Value, WebApiError>)))
            .try_flatten()
    }

    /// Collects every item of `result_field` across all pages.
    ///
    /// Returns an empty list without a second request when the first page
    /// soft-fails.
    pub async fn list_all(
        &self,
        method: &str,
        result_field: &str,
        params: Params,
    ) -> Result<Vec<Value>, WebApiError> {
        self.paginate(method, result_field, params)
            .try_collect()
            .await
    }

    async fn fetch_page(
        &self,
        method: &str,
        result_field: &str,
        state: PageState,
    ) -> Result<Option<(Vec<Value>, PageState)>, WebApiError> {
        let PageState::Next { mut params, page } = state else {
            return Ok(None);
        };

        let response = self.call(method, &params, HttpVerb::Get).await?;
        if !response.ok() {
            debug!(event = "pagination_stopped", method, page, reason = "soft_failure");
            return Ok(None);
        }

        let items: Vec<Value> = match response.get(result_field) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        let next = match response.next_cursor() {
            None => PageState::Done,
            Some(_) if self.max_pages.is_some_and(|cap| page + 1 >= cap) => {
                warn!(event = "pagination_page_cap_reached", method, pages = page + 1);
                PageState::Done
            }
            Some(cursor) => {
                params.insert(CURSOR_PARAM.to_string(), cursor.to_string());
                PageState::Next {
                    params,
                    page: page + 1,
                }
            }
        };

        Ok(Some((items, next)))
    }
}
