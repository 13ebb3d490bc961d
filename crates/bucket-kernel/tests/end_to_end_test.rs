//! End-to-end tests: chat lines in, replies out, through the real kernel.
//!
//! Buckets are in-memory; the last test also runs the full bridge with a
//! mock adapter so replies pass through the shared throttle.

use async_trait::async_trait;
use bucket_channels::types::{ChannelAdapter, ChannelMessage, ChannelUser};
use bucket_kernel::BucketKernel;
use bucket_memory::store::FactStore;
use bucket_memory::Buckets;
use bucket_types::config::{BucketConfig, ChannelBinding, StorageBackend};
use bucket_types::factoid::Key;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

const ADMIN_HOST: &str = "admin.example.org";
const NICK: &str = "bot";

fn config() -> BucketConfig {
    let mut config = BucketConfig {
        nick: NICK.to_string(),
        owner: Some(ADMIN_HOST.to_string()),
        reply_spacing_ms: 5,
        channels: vec![
            ChannelBinding {
                channel: "#main".to_string(),
                bucket: "shared".to_string(),
            },
            ChannelBinding {
                channel: "#side".to_string(),
                bucket: "shared".to_string(),
            },
            ChannelBinding {
                channel: "#ops".to_string(),
                bucket: "ops".to_string(),
            },
        ],
        ..BucketConfig::default()
    };
    config.storage.backend = StorageBackend::Memory;
    config
}

struct Harness {
    kernel: BucketKernel,
    buckets: Buckets,
}

impl Harness {
    fn new() -> Self {
        let buckets = Buckets::in_memory(["shared", "ops"]);
        let kernel = BucketKernel::boot_with_buckets(config(), buckets.clone()).unwrap();
        Self { kernel, buckets }
    }

    async fn say_in(&self, channel: &str, nick: &str, host: &str, text: &str) -> Option<String> {
        self.kernel
            .dispatcher()
            .process(&message(channel, nick, host, text))
            .await
    }

    async fn say(&self, nick: &str, text: &str) -> Option<String> {
        self.say_in("#main", nick, &format!("{nick}.users.example"), text)
            .await
    }

    async fn admin(&self, text: &str) -> Option<String> {
        self.say_in("#main", "root", ADMIN_HOST, text).await
    }

    async fn values(&self, bucket: &str, key: &str) -> Vec<String> {
        self.buckets
            .get(bucket)
            .unwrap()
            .get(&Key::new(key))
            .await
            .unwrap()
            .value
            .map(|set| set.iter().map(|e| e.store.clone()).collect())
            .unwrap_or_default()
    }
}

fn message(channel: &str, nick: &str, host: &str, text: &str) -> ChannelMessage {
    ChannelMessage {
        sender: ChannelUser {
            platform_id: channel.to_string(),
            nick: nick.to_string(),
            host: Some(host.to_string()),
        },
        target: channel.to_string(),
        text: text.to_string(),
        is_group: true,
        bot_nick: NICK.to_string(),
    }
}

fn say(s: &str) -> Option<String> {
    Some(s.to_string())
}

#[tokio::test]
async fn test_teach_query_delete_flow() {
    let h = Harness::new();

    assert_eq!(h.say("alice", "bot: foo is bar").await, say("Okay, alice"));
    assert_eq!(h.say("alice", "bot: foo?").await, say("foo is bar"));

    // Non-admin delete: silent, data untouched.
    assert_eq!(h.say("alice", "bot: delete foo #0").await, None);
    assert_eq!(h.values("shared", "foo").await, vec!["bar"]);

    assert_eq!(
        h.admin("bot: delete foo #0").await,
        say("Deleted foo #0 (is bar)")
    );
    assert!(h.values("shared", "foo").await.is_empty());
    assert_eq!(h.say("alice", "bot: foo?").await, say("What?"));
}

#[tokio::test]
async fn test_retrieve_only_returns_taught_values() {
    let h = Harness::new();
    let taught = ["red", "green", "blue"];
    for value in taught {
        h.say("alice", &format!("bot: sky is {value}")).await;
    }
    for _ in 0..30 {
        let reply = h.say("bob", "bot: sky").await.unwrap();
        let value = reply.strip_prefix("sky is ").unwrap();
        assert!(taught.contains(&value), "untaught value {value}");
    }
}

#[tokio::test]
async fn test_deleted_value_never_returns() {
    let h = Harness::new();
    for value in ["a", "b", "c"] {
        h.say("alice", &format!("bot: letter is {value}")).await;
    }
    assert_eq!(
        h.admin("bot: delete letter #1").await,
        say("Deleted letter #1 (is b)")
    );
    assert_eq!(h.values("shared", "letter").await, vec!["a", "c"]);
    for _ in 0..30 {
        assert_ne!(h.say("bob", "bot: letter").await, say("letter is b"));
    }
}

#[tokio::test]
async fn test_wrong_id_and_duplicate() {
    let h = Harness::new();
    h.say("alice", "bot: foo is bar").await;
    assert_eq!(h.admin("bot: delete foo #5").await, say("Wrong #ID"));
    assert_eq!(h.say("bob", "bot: foo is bar").await, say("I already knew that!"));
    assert_eq!(h.admin("bot: delete nothing #0").await, None);
}

#[tokio::test]
async fn test_reply_action_and_custom_verbs() {
    let h = Harness::new();
    h.say("alice", "bot: hello <reply> Hi $who!").await;
    h.say("alice", "bot: dance <action> does the robot").await;
    h.say("alice", "bot: carol <likes> pizza").await;

    assert_eq!(h.say("bob", "bot: hello").await, say("Hi bob!"));
    assert_eq!(
        h.say("bob", "bot: dance").await,
        say("\x01ACTION does the robot\x01")
    );
    assert_eq!(h.say("bob", "bot: carol").await, say("carol likes pizza"));
}

#[tokio::test]
async fn test_alias_resolution_and_cycles() {
    let h = Harness::new();
    assert_eq!(h.admin("bot: a <alias> b").await, say("Okay, root"));
    h.say("alice", "bot: b <reply> hello").await;
    assert_eq!(h.say("bob", "bot: a").await, say("hello"));

    // Teaching through the alias lands on the target.
    h.say("alice", "bot: a <reply> hello again").await;
    assert_eq!(h.values("shared", "a").await, vec!["b"]);
    assert_eq!(h.values("shared", "b").await, vec!["hello", "hello again"]);

    // Immediate and longer cycles terminate.
    h.admin("bot: x <alias> y").await;
    h.admin("bot: y <alias> x").await;
    assert_eq!(h.say("bob", "bot: x").await, say("What?"));
    h.admin("bot: p <alias> q").await;
    h.admin("bot: q <alias> r").await;
    h.admin("bot: r <alias> p").await;
    assert_eq!(h.say("bob", "bot: p").await, say("What?"));
    assert_eq!(
        h.say("bob", "bot: p is stuck").await,
        say("That alias goes in circles")
    );
}

#[tokio::test]
async fn test_undo_last_permissions() {
    let h = Harness::new();
    h.say("alice", "bot: foo is one").await;
    h.say("alice", "bot: foo is two").await;

    // Someone else: refused, nothing changes.
    assert_eq!(h.say("mallory", "bot: undo last").await, None);
    assert_eq!(h.values("shared", "foo").await, vec!["one", "two"]);

    // The author reverses exactly the most recent teach.
    assert_eq!(
        h.say("alice", "bot: undo last").await,
        say("Deleted foo #1 (is two)")
    );
    assert_eq!(h.values("shared", "foo").await, vec!["one"]);

    // Ledger cleared: a second undo is a no-op.
    assert_eq!(h.say("alice", "bot: undo last").await, None);
    assert_eq!(h.values("shared", "foo").await, vec!["one"]);
}

#[tokio::test]
async fn test_admin_undoes_someone_elses_teach() {
    let h = Harness::new();
    h.say("alice", "bot: foo is one").await;
    assert_eq!(h.admin("bot: undo last").await, say("Deleted foo #0 (is one)"));
    assert!(h.values("shared", "foo").await.is_empty());
}

#[tokio::test]
async fn test_undo_finds_entry_after_shift() {
    let h = Harness::new();
    h.say("alice", "bot: foo is one").await;
    h.say("alice", "bot: foo is two").await;
    // #side shares the bucket; its delete shifts positions without touching
    // #main's ledger.
    let side = h
        .say_in("#side", "root", ADMIN_HOST, "bot: delete foo #0")
        .await;
    assert_eq!(side, say("Deleted foo #0 (is one)"));

    assert_eq!(
        h.say("alice", "bot: undo last").await,
        say("Deleted foo #0 (is two)")
    );
    assert!(h.values("shared", "foo").await.is_empty());
}

#[tokio::test]
async fn test_what_was_that() {
    let h = Harness::new();
    assert_eq!(h.say("bob", "bot: what was that?").await, None);
    h.say("alice", "bot: foo is bar").await;
    h.say("bob", "bot: foo").await;
    assert_eq!(
        h.say("bob", "bot: what was that?").await,
        say("That was foo #0 (is bar)")
    );
}

#[tokio::test]
async fn test_remember_quotes() {
    let h = Harness::new();
    assert_eq!(h.say("carol", "pizza is the best food").await, None);
    assert_eq!(
        h.say("alice", "bot: remember carol pizza").await,
        say("Okay, alice, remembered carol saying pizza is the best food")
    );
    assert_eq!(
        h.say("bob", "bot: carol quotes").await,
        say("<carol> pizza is the best food")
    );
    assert_eq!(
        h.say("alice", "bot: remember carol sushi").await,
        say("I don't see it :(")
    );
    // Quoting yourself counts as editing your own factoids.
    assert_eq!(
        h.say("carol", "bot: remember carol pizza").await,
        say("Editing your own factoids?")
    );
}

#[tokio::test]
async fn test_combine() {
    let h = Harness::new();
    h.say("alice", "bot: word <reply> la").await;
    assert_eq!(h.say("bob", "bot: combine 3 word").await, say("la la la"));
    h.say("alice", "bot: wave <action> waves").await;
    assert_eq!(
        h.say("bob", "bot: combine 2 wave").await,
        say("/me waves /me waves")
    );
    assert_eq!(h.say("bob", "bot: combine 2 nothing").await, None);
}

#[tokio::test]
async fn test_overheard_lines() {
    let h = Harness::new();
    h.say("alice", "bot: coffee <reply> Coffee is life").await;

    // Implicit query on the last segment.
    assert_eq!(
        h.say("bob", "dave: coffee").await,
        say("Coffee is life")
    );
    // Misses are silent and feed the history.
    assert_eq!(h.say("bob", "tea time").await, None);
    assert_eq!(
        h.say("alice", "bot: remember bob tea").await,
        say("Okay, alice, remembered bob saying tea time")
    );
}

#[tokio::test]
async fn test_channels_sharing_a_bucket() {
    let h = Harness::new();
    h.say("alice", "bot: foo is bar").await;
    let side = h
        .say_in("#side", "bob", "bob.users.example", "bot: foo")
        .await;
    assert_eq!(side, say("foo is bar"));
    let ops = h
        .say_in("#ops", "bob", "bob.users.example", "bot: foo")
        .await;
    assert_eq!(ops, say("What?"));
}

#[tokio::test]
async fn test_delete_all() {
    let h = Harness::new();
    h.say("alice", "bot: foo is one").await;
    h.say("alice", "bot: foo is two").await;
    assert_eq!(h.say("alice", "bot: delete all foo").await, None);
    assert_eq!(h.admin("bot: delete all foo").await, say("Deleted all foo"));
    assert!(h.values("shared", "foo").await.is_empty());
}

#[tokio::test]
async fn test_history_is_bounded() {
    let h = Harness::new();
    h.say("carol", "marker line").await;
    for i in 0..100 {
        h.say("carol", &format!("filler {i}")).await;
    }
    let channel = h.kernel.dispatcher().channel("#main").unwrap();
    assert_eq!(channel.find_line("carol", "marker"), None);
    assert_eq!(
        channel.find_line("carol", "filler 0").as_deref(),
        Some("filler 0")
    );
}

// ---------------------------------------------------------------------------
// Full pipeline through the bridge
// ---------------------------------------------------------------------------

struct MockAdapter {
    rx: Mutex<Option<mpsc::Receiver<ChannelMessage>>>,
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl ChannelAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(
        &self,
    ) -> Result<Pin<Box<dyn Stream<Item = ChannelMessage> + Send>>, Box<dyn std::error::Error>>
    {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("start() called more than once");
        Ok(Box::pin(receiver_stream(rx)))
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));
        Ok(())
    }

    async fn join(&self, _channel: &str) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

fn receiver_stream(
    mut rx: mpsc::Receiver<ChannelMessage>,
) -> impl Stream<Item = ChannelMessage> + Send {
    futures::stream::poll_fn(move |cx| rx.poll_recv(cx))
}

#[tokio::test]
async fn test_bridge_end_to_end() {
    let h = Harness::new();
    let (tx, rx) = mpsc::channel(16);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let adapter = Arc::new(MockAdapter {
        rx: Mutex::new(Some(rx)),
        sent: sent.clone(),
    });

    let mut bridge = h.kernel.bridge();
    bridge.start_adapter(adapter).await.unwrap();

    let host = "alice.users.example";
    tx.send(message("#main", "alice", host, "bot: foo is bar")).await.unwrap();
    tx.send(message("#main", "alice", host, "just chatting")).await.unwrap();
    tx.send(message("#main", "alice", host, "bot: foo?")).await.unwrap();

    for _ in 0..200 {
        if sent.lock().unwrap().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let sent_now = sent.lock().unwrap().clone();
    assert_eq!(
        sent_now,
        vec![
            ("#main".to_string(), "Okay, alice".to_string()),
            ("#main".to_string(), "foo is bar".to_string()),
        ]
    );

    bridge.stop().await;
}
