//! Response event listener.

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::session::{ResponseFeed, Session};
use crate::error::{Error, Result};

/// Infinite, order-preserving stream of observed response URLs
///
/// Yields `Ok(url)` per `Network.responseReceived` notification. Once the control
/// channel ends it yields exactly one `Err(Error::EventStream)` and then `None`.
/// The stream cannot be restarted: a new session is needed.
pub struct ResponseStream {
    inner: UnboundedReceiverStream<Result<crate::types::ResponseEvent>>,
    finished: bool,
}

impl ResponseStream {
    pub(crate) fn new(feed: ResponseFeed) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(feed),
            finished: false,
        }
    }
}

impl Stream for ResponseStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(event))) => Poll::Ready(Some(Ok(event.url))),
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(Err(Error::EventStream(
                    "response feed ended".to_string(),
                ))))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Subscribe to response events and enable the network domain
///
/// The feed is taken before `Network.enable` is sent, so no notification emitted
/// right after enabling is missed.
pub async fn listen(session: &mut Session) -> Result<ResponseStream> {
    let feed = session
        .take_responses()
        .ok_or_else(|| Error::EventStream("response stream already taken".to_string()))?;
    session.enable_network().await?;
    tracing::info!(target_url = %session.target_url(), "Listening for network responses");
    Ok(ResponseStream::new(feed))
}
