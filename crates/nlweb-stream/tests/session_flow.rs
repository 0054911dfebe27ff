//! Multi-query flows through `ChatClient::run` over a scripted transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nlweb_settings::ClientSettings;
use nlweb_stream::test_utils::{Script, ScriptedTransport};
use nlweb_stream::{
    ChatClient, ClientCommand, RecordingRenderer, RenderRecord, RenderedBlock, SessionOutcome,
    TransportError,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn wait_for_opens(transport: &ScriptedTransport, count: usize) {
    while transport.open_count() < count {
        tokio::task::yield_now().await;
    }
}

fn query_id_of(transport: &ScriptedTransport, index: usize) -> String {
    let url = &transport.opened_urls()[index];
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    params["query_id"].clone()
}

fn batch(query_id: &str, url: &str, score: f64) -> String {
    json!({
        "message_type": "result_batch",
        "query_id": query_id,
        "results": [{"url": url, "name": url, "score": score}]
    })
    .to_string()
}

#[tokio::test]
async fn new_query_preempts_and_isolates_previous_round() {
    let (old_tx, old_script) = Script::channel();
    let (new_tx, new_script) = Script::channel();
    let transport = Arc::new(ScriptedTransport::new([old_script, new_script]));
    let mut client = ChatClient::new(ClientSettings::default(), transport.clone());
    let mut renderer = RecordingRenderer::new();
    let (commands, rx) = mpsc::channel(8);

    let driver = async {
        commands.send(ClientCommand::Ask("ramen".into())).await.unwrap();
        wait_for_opens(&transport, 1).await;
        let old_id = query_id_of(&transport, 0);
        old_tx.send(Ok(batch(&old_id, "https://old-a", 0.4))).unwrap();

        commands.send(ClientCommand::Ask("pho".into())).await.unwrap();
        wait_for_opens(&transport, 2).await;
        let new_id = query_id_of(&transport, 1);
        assert_ne!(old_id, new_id);

        // The prior connection is gone; nothing more can arrive on it.
        assert!(old_tx.is_closed());

        // Cross-talk from the old query on the new connection is ignored.
        new_tx.send(Ok(batch(&old_id, "https://old-late", 0.99))).unwrap();
        new_tx.send(Ok(batch(&new_id, "https://new-a", 0.2))).unwrap();
        new_tx.send(Ok(batch(&new_id, "https://new-b", 0.8))).unwrap();
        new_tx
            .send(Ok(json!({"message_type": "complete", "query_id": new_id}).to_string()))
            .unwrap();
        drop(commands);
    };

    timeout(TIMEOUT, async { tokio::join!(client.run(rx, &mut renderer), driver) })
        .await
        .unwrap();

    assert_eq!(
        renderer.outcomes(),
        vec![&SessionOutcome::Cancelled, &SessionOutcome::Completed { result_count: 2 }]
    );
    let shown: Vec<&str> = renderer.last_results().iter().map(|r| r.url.as_str()).collect();
    assert_eq!(shown, vec!["https://new-b", "https://new-a"]);
    assert!(client.active().is_none());
    assert_eq!(client.prior_turns(), ["ramen", "pho"]);
}

#[tokio::test]
async fn cancel_command_stops_streaming() {
    let (tx, script) = Script::channel();
    let transport = Arc::new(ScriptedTransport::new([script]));
    let mut client = ChatClient::new(ClientSettings::default(), transport.clone());
    let mut renderer = RecordingRenderer::new();
    let (commands, rx) = mpsc::channel(8);

    let driver = async {
        commands.send(ClientCommand::Ask("tacos".into())).await.unwrap();
        wait_for_opens(&transport, 1).await;
        commands.send(ClientCommand::Cancel).await.unwrap();
        while !tx.is_closed() {
            tokio::task::yield_now().await;
        }
        drop(commands);
    };

    timeout(TIMEOUT, async { tokio::join!(client.run(rx, &mut renderer), driver) })
        .await
        .unwrap();

    assert_eq!(renderer.outcomes(), vec![&SessionOutcome::Cancelled]);
    assert_eq!(transport.open_count(), 1);
}

#[tokio::test]
async fn round_reset_precedes_first_content() {
    let transport = Arc::new(ScriptedTransport::new([Script::events([
        json!({"message_type": "asking_sites", "message": "seriouseats"}).to_string(),
        json!({"message_type": "summary", "message": "Three bowls stand out."}).to_string(),
        json!({"message_type": "result_batch", "results": [{"url": "https://a", "score": 0.5}]})
            .to_string(),
        json!({"message_type": "complete"}).to_string(),
    ])]));
    let mut client = ChatClient::new(ClientSettings::default(), transport);
    let mut renderer = RecordingRenderer::new();

    let outcome = client.ask("ramen", &mut renderer).await.unwrap();
    assert_eq!(outcome, SessionOutcome::Completed { result_count: 1 });
    assert_eq!(renderer.records[0], RenderRecord::RoundReset);

    let view = renderer.last_view().unwrap();
    assert_eq!(view.len(), 3);
    assert!(matches!(&view[0], RenderedBlock::Annotation(_)));
    assert!(matches!(&view[1], RenderedBlock::Annotation(_)));
    assert!(matches!(&view[2], RenderedBlock::Result(r) if r.url == "https://a"));
}

#[tokio::test(start_paused = true)]
async fn new_query_cancels_pending_reconnect() {
    let (new_tx, new_script) = Script::channel();
    let transport = Arc::new(ScriptedTransport::new([
        Script::Fail(TransportError::Closed),
        new_script,
    ]));
    let mut client = ChatClient::new(ClientSettings::default(), transport.clone());
    let mut renderer = RecordingRenderer::new();
    let (commands, rx) = mpsc::channel(8);

    let driver = async {
        commands.send(ClientCommand::Ask("ramen".into())).await.unwrap();
        wait_for_opens(&transport, 1).await;
        let old_id = query_id_of(&transport, 0);

        // The first open failed; the session is now waiting out its 2s backoff.
        tokio::time::sleep(Duration::from_millis(500)).await;
        commands.send(ClientCommand::Ask("pho".into())).await.unwrap();
        wait_for_opens(&transport, 2).await;
        let new_id = query_id_of(&transport, 1);
        new_tx
            .send(Ok(json!({"message_type": "complete", "query_id": new_id}).to_string()))
            .unwrap();

        // Well past every deadline the old session could have scheduled.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.open_count(), 2);
        assert_ne!(query_id_of(&transport, 1), old_id);
        drop(commands);
    };

    timeout(Duration::from_secs(60), async {
        tokio::join!(client.run(rx, &mut renderer), driver)
    })
    .await
    .unwrap();

    assert_eq!(
        renderer.outcomes(),
        vec![&SessionOutcome::Cancelled, &SessionOutcome::Completed { result_count: 0 }]
    );
}
