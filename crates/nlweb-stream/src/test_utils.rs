//! Scripted transport for driving the engine without a network.
//!
//! Each call to [`Transport::open`] consumes the next [`Script`] entry. When
//! the script runs out, further opens fail.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::errors::TransportError;
use crate::transport::{RawEventStream, Transport};

/// Sender half of a [`Script::Channel`] connection.
pub type ScriptSender = mpsc::UnboundedSender<Result<String, TransportError>>;

/// Outcome of one scripted connection attempt.
pub enum Script {
    /// The attempt fails.
    Fail(TransportError),
    /// The attempt succeeds and yields these items, then the server closes.
    Stream(Vec<Result<String, TransportError>>),
    /// The attempt succeeds and yields whatever the test sends; the server
    /// closes when the sender is dropped.
    Channel(mpsc::UnboundedReceiver<Result<String, TransportError>>),
    /// The attempt succeeds and the stream never yields.
    Hang,
}

impl Script {
    /// A successful connection yielding `payloads`, then closing.
    pub fn events<I, S>(payloads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stream(payloads.into_iter().map(|p| Ok(p.into())).collect())
    }

    /// A successful connection fed through the returned sender.
    pub fn channel() -> (ScriptSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::Channel(rx))
    }
}

/// A [`Transport`] that replays a fixed script.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opened: Mutex<Vec<Url>>,
}

impl ScriptedTransport {
    /// Create a transport that plays `scripts` in order.
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Append another connection outcome.
    pub fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Number of connection attempts made so far.
    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    /// URLs of every connection attempt, in order.
    pub fn opened_urls(&self) -> Vec<Url> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &Url) -> Result<RawEventStream, TransportError> {
        self.opened.lock().unwrap().push(url.clone());
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            None => Err(TransportError::Other {
                message: "no scripted connection left".into(),
            }),
            Some(Script::Fail(err)) => Err(err),
            Some(Script::Stream(items)) => Ok(Box::pin(futures::stream::iter(items))),
            Some(Script::Channel(rx)) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            Some(Script::Hang) => Ok(Box::pin(futures::stream::pending::<
                Result<String, TransportError>,
            >())),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    fn url() -> Url {
        Url::parse("http://localhost/ask").unwrap()
    }

    #[tokio::test]
    async fn plays_scripts_in_order() {
        let transport = ScriptedTransport::new([
            Script::Fail(TransportError::Closed),
            Script::events(["one"]),
        ]);
        assert!(transport.open(&url()).await.is_err());
        let items: Vec<_> = transport.open(&url()).await.unwrap().collect().await;
        assert_eq!(items.len(), 1);
        assert!(transport.open(&url()).await.is_err());
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn channel_script_forwards_sent_items() {
        let (tx, script) = Script::channel();
        let transport = ScriptedTransport::new([script]);
        let mut stream = transport.open(&url()).await.unwrap();
        tx.send(Ok("late".into())).unwrap();
        drop(tx);
        assert_eq!(stream.next().await.unwrap().unwrap(), "late");
        assert!(stream.next().await.is_none());
    }
}
