use bytes::Buf;
use hyper::body::Body;
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

pin_project! {
    /// Collects every data frame of a body into one buffer.
    pub struct DrainBodyFuture<B: Body> {
        #[pin]
        body: B,
        buf: Vec<u8>,
        limit: usize,
    }
}

impl<B> DrainBodyFuture<B>
where
    B: Body,
{
    /// `size_hint` is only used to presize the buffer, `limit` caps what is kept.
    #[inline]
    #[must_use]
    pub fn new(body: B, size_hint: usize, limit: usize) -> Self {
        Self {
            body,
            buf: Vec::with_capacity(size_hint.min(limit)),
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn new_trusted_length(body: B, content_length: usize) -> Self {
        Self::new(body, content_length, usize::MAX)
    }
}

impl<B> Future for DrainBodyFuture<B>
where
    B: Body,
{
    type Output = Result<Vec<u8>, anyhow::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slf = self.project();
        loop {
            let next = match slf.body.as_mut().poll_frame(cx) {
                Poll::Ready(next) => next,
                Poll::Pending => return Poll::Pending,
            };
            let Some(next_res) = next else {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            };
            let frame = match next_res {
                Ok(frame) => frame,
                Err(_e) => {
                    return Poll::Ready(Err(anyhow::anyhow!("Failed to poll next frame")));
                }
            };
            // Trailers carry nothing we keep
            let Ok(mut data) = frame.into_data() else {
                continue;
            };
            while data.has_remaining() {
                let chunk = data.chunk();
                let room = slf.limit.saturating_sub(slf.buf.len());
                slf.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                let consumed = chunk.len();
                data.advance(consumed);
            }
            if slf.body.is_end_stream() {
                return Poll::Ready(Ok(std::mem::take(slf.buf)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::byte_body;

    #[tokio::test]
    async fn drains_full_body() {
        let body = byte_body(&b"{\"short_key\":\"abc\"}"[..]);
        let bytes = DrainBodyFuture::new_trusted_length(body, 8).await.unwrap();
        assert_eq!(bytes, b"{\"short_key\":\"abc\"}");
    }

    #[tokio::test]
    async fn truncates_at_limit() {
        let body = byte_body(&b"0123456789"[..]);
        let bytes = DrainBodyFuture::new(body, 10, 4).await.unwrap();
        assert_eq!(bytes, b"0123");
    }
}
