use futures::{FutureExt, StreamExt, stream::BoxStream};

/// Asynchronous work that produces messages.
///
/// Commands let an Elm-style `update` function hand request work to its
/// runtime without awaiting it inline. A binding turns a trigger into a
/// command with [`RequestBinding::command`](crate::request::RequestBinding::command);
/// the host drains it with [`into_stream`](Self::into_stream) and feeds the
/// messages back into its update loop.
///
/// # Examples
///
/// ```
/// use tears_request::command::Command;
///
/// enum Message {
///     GotResult(i32),
/// }
///
/// let cmd = Command::perform(async { 42 }, Message::GotResult);
/// ```
pub struct Command<Msg: Send + 'static> {
    stream: BoxStream<'static, Msg>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Perform an asynchronous operation and convert its result to a message.
    ///
    /// # Examples
    ///
    /// ```
    /// use tears_request::command::Command;
    ///
    /// async fn fetch_data() -> String {
    ///     "data".to_string()
    /// }
    ///
    /// enum Message {
    ///     DataReceived(String),
    /// }
    ///
    /// let cmd = Command::perform(fetch_data(), Message::DataReceived);
    /// ```
    pub fn perform<A>(
        future: impl Future<Output = A> + Send + 'static,
        f: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self {
        Self::future(future.map(f))
    }

    /// Create a command from a future that produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: future.into_stream().boxed(),
        }
    }

    /// Hands the messages to the caller.
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Msg> {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain<Msg: Send + 'static>(cmd: Command<Msg>) -> Vec<Msg> {
        cmd.into_stream().collect().await
    }

    #[tokio::test]
    async fn test_perform_converts_result() {
        #[derive(Debug, PartialEq)]
        enum Message {
            Loaded(Result<u32, String>),
        }

        let cmd = Command::perform(async { Ok(7) }, Message::Loaded);
        assert_eq!(drain(cmd).await, vec![Message::Loaded(Ok(7))]);
    }

    #[tokio::test]
    async fn test_future_yields_one_message() {
        let cmd = Command::future(async { "done" });
        assert_eq!(drain(cmd).await, vec!["done"]);
    }
}
