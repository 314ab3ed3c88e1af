use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

pin_project! {
    /// Future adapter that measures the wall-clock time between the first
    /// poll of the inner future and its completion.
    ///
    /// The clock starts on first poll rather than on construction, so a future
    /// that sits in a queue before being driven isn't charged for waiting.
    ///
    /// ```
    /// use tankobon_asyncutils::Timed;
    ///
    /// # futures::executor::block_on(async {
    /// let (value, elapsed) = Timed::new(async { 40 + 2 }).await;
    /// assert_eq!(value, 42);
    /// assert!(elapsed.as_secs() < 1);
    /// # });
    /// ```
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Timed<F> {
        #[pin]
        inner: F,
        started: Option<Instant>,
    }
}

impl<F> Timed<F> {
    pub fn new(inner: F) -> Self {
        Self { inner, started: None }
    }
}

impl<F: Future> Future for Timed<F> {
    type Output = (F::Output, Duration);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let started = *this.started.get_or_insert_with(Instant::now);
        match this.inner.poll(cx) {
            Poll::Ready(output) => Poll::Ready((output, started.elapsed())),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_output_and_duration() {
        let (output, elapsed) = Timed::new(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "done"
        })
        .await;
        assert_eq!(output, "done");
        assert!(elapsed >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_clock_starts_on_first_poll() {
        let timed = Timed::new(async { 1 });
        // Constructed but never polled; the wait below must not be counted.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let (_, elapsed) = timed.await;
        assert!(elapsed < Duration::from_millis(30));
    }
}
