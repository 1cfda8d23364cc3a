//! Command routing: keyword commands, stage continuations, and the fault boundary.

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    futures::FutureExt,
    tokio::sync::OwnedMutexGuard,
    tracing::{debug, error, warn},
};

use {
    reelbot_channels::{ChannelOutbound, InboundEvent},
    reelbot_config::BotConfig,
    reelbot_pipeline::parse_selection,
    reelbot_sessions::{SessionRecord, SessionStage, SessionStore},
};

use crate::error::{Error, Result};

/// Sent when a handler fails in a way it didn't report itself.
pub const GENERIC_FAILURE: &str = "❌ Something went wrong. Please try again.";

/// Name, aliases, and help text of a keyword command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
}

impl CommandSpec {
    fn keywords(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

/// Everything a handler needs to answer one inbound event.
pub struct CommandContext {
    pub sender_id: String,
    /// Full message text, trimmed.
    pub text: String,
    /// Text after the keyword, trimmed. Empty for continuations.
    pub args: String,
    pub outbound: Arc<dyn ChannelOutbound>,
    pub sessions: Arc<dyn SessionStore>,
}

impl CommandContext {
    /// Send a plain text reply to the sender.
    pub async fn reply(&self, text: &str) -> anyhow::Result<()> {
        self.outbound.send_text(&self.sender_id, text).await?;
        Ok(())
    }
}

/// A command started by a keyword, e.g. `.movie avatar`.
#[async_trait]
pub trait KeywordCommand: Send + Sync {
    fn spec(&self) -> CommandSpec;

    async fn run(&self, ctx: &CommandContext) -> anyhow::Result<()>;
}

/// A reply to a pending session in a given stage.
#[async_trait]
pub trait Continuation: Send + Sync {
    fn stage(&self) -> SessionStage;

    /// Whether `text` answers the pending `record`. Defaults to the numbered-reply protocol.
    fn accepts(&self, text: &str, _record: &SessionRecord) -> bool {
        parse_selection(text).is_some()
    }

    async fn run(&self, ctx: &CommandContext, record: SessionRecord) -> anyhow::Result<()>;
}

/// What the router did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Command { name: &'static str },
    Continuation { stage: SessionStage },
    /// Neither a keyword nor an accepted reply.
    Ignored,
    /// The handler returned an error or panicked; the sender got [`GENERIC_FAILURE`].
    Faulted,
}

pub struct CommandRouter {
    prefixes: Vec<String>,
    commands: Vec<Arc<dyn KeywordCommand>>,
    /// Lowercased name or alias → index into `commands`.
    keywords: HashMap<String, usize>,
    continuations: Vec<Arc<dyn Continuation>>,
    sessions: Arc<dyn SessionStore>,
    outbound: Arc<dyn ChannelOutbound>,
    user_locks: Option<UserLocks>,
}

impl CommandRouter {
    pub fn new(
        config: &BotConfig,
        sessions: Arc<dyn SessionStore>,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Self {
        Self {
            prefixes: config
                .command_prefixes
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            commands: Vec::new(),
            keywords: HashMap::new(),
            continuations: Vec::new(),
            sessions,
            outbound,
            user_locks: config.serialize_per_user.then(UserLocks::default),
        }
    }

    /// Register a keyword command. Fails without side effects if any of its
    /// keywords is already taken.
    pub fn register_command(&mut self, command: Arc<dyn KeywordCommand>) -> Result<()> {
        let spec = command.spec();
        let mut keywords = Vec::new();
        for keyword in spec.keywords() {
            let keyword = keyword.trim().to_lowercase();
            if keyword.is_empty() {
                return Err(Error::EmptyCommandName);
            }
            if self.keywords.contains_key(&keyword) || keywords.contains(&keyword) {
                return Err(Error::DuplicateCommand { name: keyword });
            }
            keywords.push(keyword);
        }

        let index = self.commands.len();
        self.commands.push(command);
        for keyword in keywords {
            self.keywords.insert(keyword, index);
        }
        debug!(command = spec.name, aliases = ?spec.aliases, "registered command");
        Ok(())
    }

    /// Continuations are tried in registration order.
    pub fn register_continuation(&mut self, continuation: Arc<dyn Continuation>) {
        self.continuations.push(continuation);
    }

    #[must_use]
    pub fn command_specs(&self) -> Vec<CommandSpec> {
        self.commands.iter().map(|c| c.spec()).collect()
    }

    /// Prefix shown in help text: the first configured one.
    #[must_use]
    pub fn display_prefix(&self) -> &str {
        self.prefixes.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// Route one inbound event to at most one handler.
    pub async fn dispatch(&self, event: &InboundEvent) -> Dispatch {
        let text = event.text.trim();
        if text.is_empty() {
            return Dispatch::Ignored;
        }

        let _turn = match &self.user_locks {
            Some(locks) => Some(locks.acquire(&event.sender_id).await),
            None => None,
        };

        if let Some((command, args)) = self.match_keyword(text) {
            let name = command.spec().name;
            if let Some(abandoned) = self.sessions.remove(&event.sender_id) {
                debug!(
                    sender_id = %event.sender_id,
                    command = name,
                    stage = %abandoned.stage(),
                    "keyword abandons pending session"
                );
            }
            let ctx = self.context(event, text, args);
            return if self.guarded(&ctx, name, command.run(&ctx)).await {
                Dispatch::Command { name }
            } else {
                Dispatch::Faulted
            };
        }

        let Some(record) = self.sessions.get(&event.sender_id) else {
            return Dispatch::Ignored;
        };
        let stage = record.stage();
        let Some(continuation) = self
            .continuations
            .iter()
            .find(|c| c.stage() == stage && c.accepts(text, &record))
        else {
            debug!(sender_id = %event.sender_id, %stage, "text does not answer pending session");
            return Dispatch::Ignored;
        };

        let ctx = self.context(event, text, "");
        let handler = match stage {
            SessionStage::AwaitingSelection => "awaiting_selection",
            SessionStage::AwaitingQuality => "awaiting_quality",
        };
        if self.guarded(&ctx, handler, continuation.run(&ctx, record)).await {
            Dispatch::Continuation { stage }
        } else {
            Dispatch::Faulted
        }
    }

    fn match_keyword<'a>(&self, text: &'a str) -> Option<(&Arc<dyn KeywordCommand>, &'a str)> {
        // With prefixes configured, unprefixed chat is never a command.
        let body = if self.prefixes.is_empty() {
            text
        } else {
            self.prefixes
                .iter()
                .find_map(|p| text.strip_prefix(p.as_str()))?
        };
        let (word, args) = body
            .split_once(char::is_whitespace)
            .map_or((body, ""), |(w, a)| (w, a.trim()));
        let index = self.keywords.get(&word.to_lowercase())?;
        self.commands.get(*index).map(|c| (c, args))
    }

    fn context(&self, event: &InboundEvent, text: &str, args: &str) -> CommandContext {
        CommandContext {
            sender_id: event.sender_id.clone(),
            text: text.to_string(),
            args: args.to_string(),
            outbound: Arc::clone(&self.outbound),
            sessions: Arc::clone(&self.sessions),
        }
    }

    /// Run `handler`, turning an error or panic into one generic reply. Returns
    /// `false` on a fault.
    async fn guarded<F>(&self, ctx: &CommandContext, handler: &str, run: F) -> bool
    where
        F: Future<Output = anyhow::Result<()>>,
    {
        let fault = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(())) => return true,
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => panic_message(panic.as_ref()),
        };

        error!(sender_id = %ctx.sender_id, handler, error = %fault, "handler failed");
        self.sessions.remove(&ctx.sender_id);
        if let Err(e) = ctx.reply(GENERIC_FAILURE).await {
            warn!(sender_id = %ctx.sender_id, error = %e, "failed to report handler failure");
        }
        false
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".into()
    }
}

/// One async lock per sender, created on demand and dropped once unused.
#[derive(Default)]
struct UserLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl UserLocks {
    async fn acquire(&self, sender_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(sender_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use {
        reelbot_channels::CapturingOutbound,
        reelbot_pipeline::Candidate,
        reelbot_sessions::InMemorySessionStore,
        rstest::rstest,
    };

    use super::*;

    /// Records the args it was called with; optionally fails or panics.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: bool,
        panic: bool,
    }

    #[async_trait]
    impl KeywordCommand for Recorder {
        fn spec(&self) -> CommandSpec {
            CommandSpec {
                name: "search",
                aliases: &["movie", "film"],
                description: "test",
            }
        }

        async fn run(&self, ctx: &CommandContext) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(ctx.args.clone());
            if self.panic {
                panic!("boom");
            }
            if self.fail {
                anyhow::bail!("scripted failure");
            }
            ctx.sessions.put(
                &ctx.sender_id,
                SessionRecord::awaiting_selection(vec![candidate()], 0),
            );
            Ok(())
        }
    }

    /// Counts how many times it ran for a given stage.
    struct Reply {
        stage: SessionStage,
        runs: AtomicUsize,
    }

    impl Reply {
        fn new(stage: SessionStage) -> Arc<Self> {
            Arc::new(Self {
                stage,
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Continuation for Reply {
        fn stage(&self) -> SessionStage {
            self.stage
        }

        async fn run(&self, _ctx: &CommandContext, _record: SessionRecord) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            title: "Movie".into(),
            locator: "movie/1".into(),
            thumbnail: None,
            hints: Default::default(),
        }
    }

    type Harness = (
        CommandRouter,
        Arc<InMemorySessionStore>,
        Arc<CapturingOutbound>,
    );

    fn router(config: &BotConfig) -> Harness {
        let sessions = Arc::new(InMemorySessionStore::new());
        let outbound = Arc::new(CapturingOutbound::new());
        let router = CommandRouter::new(config, sessions.clone(), outbound.clone());
        (router, sessions, outbound)
    }

    #[tokio::test]
    async fn keyword_matches_name_alias_prefix_and_case() {
        let (mut router, ..) = router(&BotConfig::default());
        let recorder = Arc::new(Recorder::default());
        router.register_command(recorder.clone()).unwrap();

        for text in [".movie avatar", "/FILM  the matrix ", ".search x", "!Movie"] {
            assert_eq!(
                router.dispatch(&InboundEvent::new("u1", text)).await,
                Dispatch::Command { name: "search" }
            );
        }
        assert_eq!(*recorder.calls.lock().unwrap(), vec!["avatar", "the matrix", "x", ""]);

        for text in [".movies", "search x", "movie avatar"] {
            assert_eq!(
                router.dispatch(&InboundEvent::new("u1", text)).await,
                Dispatch::Ignored
            );
        }
    }

    #[tokio::test]
    async fn unprefixed_chat_keeps_pending_session() {
        let (mut router, sessions, _) = router(&BotConfig::default());
        router.register_command(Arc::new(Recorder::default())).unwrap();
        sessions.put("u1", SessionRecord::awaiting_selection(vec![candidate()], 0));

        assert_eq!(
            router
                .dispatch(&InboundEvent::new("u1", "search me one with a dragon"))
                .await,
            Dispatch::Ignored
        );
        assert!(sessions.get("u1").is_some());
    }

    #[tokio::test]
    async fn no_prefixes_matches_bare_keywords() {
        let (mut router, ..) = router(&BotConfig {
            command_prefixes: Vec::new(),
            ..Default::default()
        });
        router.register_command(Arc::new(Recorder::default())).unwrap();

        assert_eq!(
            router.dispatch(&InboundEvent::new("u1", "movie avatar")).await,
            Dispatch::Command { name: "search" }
        );
    }

    #[tokio::test]
    async fn number_without_session_is_ignored() {
        let (mut router, ..) = router(&BotConfig::default());
        let reply = Reply::new(SessionStage::AwaitingSelection);
        router.register_continuation(reply.clone());

        assert_eq!(
            router.dispatch(&InboundEvent::new("u1", "2")).await,
            Dispatch::Ignored
        );
        assert_eq!(reply.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn continuation_matches_stage_and_protocol() {
        let (mut router, sessions, _) = router(&BotConfig::default());
        let quality = Reply::new(SessionStage::AwaitingQuality);
        let selection = Reply::new(SessionStage::AwaitingSelection);
        router.register_continuation(quality.clone());
        router.register_continuation(selection.clone());
        sessions.put("u1", SessionRecord::awaiting_selection(vec![candidate()], 0));

        assert_eq!(
            router.dispatch(&InboundEvent::new("u1", "hello")).await,
            Dispatch::Ignored
        );
        assert_eq!(
            router.dispatch(&InboundEvent::new("u1", " 1 ")).await,
            Dispatch::Continuation {
                stage: SessionStage::AwaitingSelection
            }
        );
        assert_eq!(selection.runs.load(Ordering::SeqCst), 1);
        assert_eq!(quality.runs.load(Ordering::SeqCst), 0);

        // Another sender's session is not ours.
        assert_eq!(
            router.dispatch(&InboundEvent::new("u2", "1")).await,
            Dispatch::Ignored
        );
    }

    #[tokio::test]
    async fn first_registered_continuation_wins() {
        let (mut router, sessions, _) = router(&BotConfig::default());
        let first = Reply::new(SessionStage::AwaitingSelection);
        let second = Reply::new(SessionStage::AwaitingSelection);
        router.register_continuation(first.clone());
        router.register_continuation(second.clone());
        sessions.put("u1", SessionRecord::awaiting_selection(vec![candidate()], 0));

        router.dispatch(&InboundEvent::new("u1", "1")).await;
        assert_eq!(first.runs.load(Ordering::SeqCst), 1);
        assert_eq!(second.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keyword_abandons_pending_session() {
        let (mut router, sessions, _) = router(&BotConfig::default());
        router
            .register_command(Arc::new(Recorder {
                fail: true,
                ..Default::default()
            }))
            .unwrap();
        let mut stale = SessionRecord::awaiting_selection(vec![candidate(), candidate()], 0);
        stale.touch(42);
        sessions.put("u1", stale);

        router.dispatch(&InboundEvent::new("u1", ".movie other")).await;
        assert!(sessions.get("u1").is_none());
    }

    #[rstest]
    #[case::error(false)]
    #[case::panic(true)]
    #[tokio::test]
    async fn handler_fault_is_contained(#[case] panic: bool) {
        let (mut router, sessions, outbound) = router(&BotConfig::default());
        router
            .register_command(Arc::new(Recorder {
                fail: !panic,
                panic,
                ..Default::default()
            }))
            .unwrap();

        let outcome = router.dispatch(&InboundEvent::new("u1", ".movie x")).await;
        assert_eq!(outcome, Dispatch::Faulted);
        assert_eq!(outbound.bodies(), vec![GENERIC_FAILURE.to_string()]);
        assert!(sessions.get("u1").is_none());

        // The router keeps working afterwards.
        assert_eq!(
            router.dispatch(&InboundEvent::new("u1", "hello")).await,
            Dispatch::Ignored
        );
    }

    #[test]
    fn duplicate_keywords_are_rejected() {
        let (mut router, ..) = router(&BotConfig::default());
        router.register_command(Arc::new(Recorder::default())).unwrap();
        let err = router.register_command(Arc::new(Recorder::default())).unwrap_err();
        assert!(matches!(err, Error::DuplicateCommand { ref name } if name == "search"));
        assert_eq!(router.command_specs().len(), 1);
    }

    /// Tracks the highest number of overlapping runs.
    #[derive(Default)]
    struct Overlap {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl KeywordCommand for Overlap {
        fn spec(&self) -> CommandSpec {
            CommandSpec {
                name: "slow",
                aliases: &[],
                description: "test",
            }
        }

        async fn run(&self, _ctx: &CommandContext) -> anyhow::Result<()> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn peak_overlap(serialize_per_user: bool) -> usize {
        let (mut router, ..) = router(&BotConfig {
            serialize_per_user,
            ..Default::default()
        });
        let overlap = Arc::new(Overlap::default());
        router.register_command(overlap.clone()).unwrap();

        let a = InboundEvent::new("u1", ".slow");
        let b = InboundEvent::new("u1", ".slow");
        tokio::join!(router.dispatch(&a), router.dispatch(&b));
        overlap.peak.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn per_user_serialization_is_opt_in() {
        assert_eq!(peak_overlap(false).await, 2);
        assert_eq!(peak_overlap(true).await, 1);
    }
}
