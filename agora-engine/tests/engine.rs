//! Engine lifecycle tests: the validation gates, the turn loop, and
//! settlement, run against the in-memory collaborators and a scripted
//! model client.

use std::sync::{Arc, Mutex};

use agora_engine::{BoutEngine, EngineConfig, StaticCatalog};
use agora_state_memory::{
    DEFAULT_INTRO_POOL_MICRO, MemoryBoutStore, MemoryEntitlements, MemoryFreeBoutPool,
    MemoryKeyStash, MemoryLedger, MemoryRateLimiter, MemorySharedPool, STARTING_BALANCE_MICRO,
};
use agora_types::{
    Agent, BoutEvent, BoutRejection, BoutRequest, BoutStatus, BoutStore, ByokCredentials, Caller,
    CreditLedger, EffectiveTier, EventSink, ExecuteError, ExecutionPlan, FreePoolCap,
    GenerationRequest, KeyStash, ModelClient, ModelError, ModelEvent, ModelId, ModelStream,
    NewBout, PoolError, PoolStatus, Preset, PresetTier, ResolvedModel, ResponseFormat,
    ResponseLength, SecretString, SharedPool, SinkError, StreamFault, Tier, TokenUsage,
    TranscriptEntry,
};
use async_trait::async_trait;

/// One scripted model call: the events its stream will yield.
struct TurnScript {
    events: Vec<ModelEvent>,
}

impl TurnScript {
    fn text(text: &str) -> Self {
        Self {
            events: vec![ModelEvent::TextDelta(text.to_string())],
        }
    }

    fn with_usage(text: &str, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            events: vec![
                ModelEvent::TextDelta(text.to_string()),
                ModelEvent::Usage(TokenUsage {
                    input_tokens,
                    output_tokens,
                    ..TokenUsage::default()
                }),
            ],
        }
    }

    fn fault(message: &str) -> Self {
        Self {
            events: vec![ModelEvent::Error(StreamFault::retryable(message))],
        }
    }
}

/// What the engine asked the model for, captured per call.
#[derive(Clone)]
struct RecordedRequest {
    model: String,
    system: Option<String>,
    user: String,
    max_output_tokens: u32,
    byok: bool,
}

/// A scripted model client: streams pre-configured turns in sequence and
/// records every request it receives.
struct ScriptedClient {
    turns: Mutex<Vec<TurnScript>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedClient {
    fn new(turns: Vec<TurnScript>) -> Self {
        Self {
            turns: Mutex::new(turns),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("test lock poisoned").clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn stream(&self, request: GenerationRequest<'_>) -> Result<ModelStream, ModelError> {
        self.requests
            .lock()
            .expect("test lock poisoned")
            .push(RecordedRequest {
                model: request.model.to_string(),
                system: request.system.map(str::to_string),
                user: request.user.to_string(),
                max_output_tokens: request.max_output_tokens,
                byok: request.byok.is_some(),
            });
        let script = {
            let mut turns = self.turns.lock().expect("test lock poisoned");
            if turns.is_empty() {
                panic!("ScriptedClient: no more turns scripted");
            }
            turns.remove(0)
        };
        Ok(ModelStream::new(futures::stream::iter(script.events)))
    }
}

/// Sink that appends every event to a log.
struct RecordingSink {
    events: Mutex<Vec<BoutEvent>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<BoutEvent> {
        self.events.lock().expect("test lock poisoned").clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: BoutEvent) -> Result<(), SinkError> {
        self.events.lock().expect("test lock poisoned").push(event);
        Ok(())
    }
}

/// Sink that accepts a fixed number of events, then reports the client
/// gone.
struct ClosingSink {
    allow: Mutex<u32>,
}

impl ClosingSink {
    fn after(events: u32) -> Self {
        Self {
            allow: Mutex::new(events),
        }
    }
}

#[async_trait]
impl EventSink for ClosingSink {
    async fn emit(&self, _event: BoutEvent) -> Result<(), SinkError> {
        let mut allow = self.allow.lock().expect("test lock poisoned");
        if *allow == 0 {
            return Err(SinkError::Closed("receiver dropped".into()));
        }
        *allow -= 1;
        Ok(())
    }
}

/// An engine plus handles to every collaborator a test may steer.
struct Harness {
    engine: BoutEngine,
    store: Arc<MemoryBoutStore>,
    ledger: Arc<MemoryLedger>,
    shared_pool: Arc<MemorySharedPool>,
    entitlements: Arc<MemoryEntitlements>,
    stash: Arc<MemoryKeyStash>,
    client: Arc<ScriptedClient>,
}

impl Harness {
    fn new(turns: Vec<TurnScript>) -> Self {
        Self::build(
            EngineConfig::default(),
            MemorySharedPool::new(),
            MemoryFreeBoutPool::new(),
            turns,
        )
    }

    fn with_config(config: EngineConfig, turns: Vec<TurnScript>) -> Self {
        Self::build(config, MemorySharedPool::new(), MemoryFreeBoutPool::new(), turns)
    }

    fn build(
        config: EngineConfig,
        shared_pool: MemorySharedPool,
        free_pool: MemoryFreeBoutPool,
        turns: Vec<TurnScript>,
    ) -> Self {
        let store = Arc::new(MemoryBoutStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let shared_pool = Arc::new(shared_pool);
        let entitlements = Arc::new(MemoryEntitlements::new());
        let stash = Arc::new(MemoryKeyStash::new());
        let client = Arc::new(ScriptedClient::new(turns));
        let engine = BoutEngine::new(
            store.clone(),
            ledger.clone(),
            shared_pool.clone(),
            Arc::new(free_pool),
            Arc::new(MemoryRateLimiter::new()),
            entitlements.clone(),
            Arc::new(StaticCatalog::new()),
            client.clone(),
            config,
        )
        .with_key_stash(stash.clone());
        Self {
            engine,
            store,
            ledger,
            shared_pool,
            entitlements,
            stash,
            client,
        }
    }
}

fn request(bout_id: &str, preset_id: &str) -> BoutRequest {
    BoutRequest {
        bout_id: Some(bout_id.into()),
        preset_id: Some(preset_id.into()),
        topic: Some("should robots pay rent".into()),
        ..BoutRequest::default()
    }
}

fn new_bout(id: &str) -> NewBout {
    NewBout {
        id: id.into(),
        preset_id: "gloves-off".into(),
        topic: None,
        response_length: ResponseLength::default(),
        response_format: ResponseFormat::default(),
        owner_id: None,
    }
}

fn byok_config() -> EngineConfig {
    EngineConfig {
        byok_enabled: true,
        ..EngineConfig::default()
    }
}

/// `n` turns, each reporting 150 input / 30 output tokens.
fn scripted_turns(n: u32) -> Vec<TurnScript> {
    (0..n)
        .map(|i| TurnScript::with_usage(&format!("Round {i}."), 150, 30))
        .collect()
}

// --- shape, topic and conflict gates ---

#[tokio::test]
async fn missing_ids_are_rejected() {
    let h = Harness::new(vec![]);
    let caller = Caller::anonymous("ip:1", "req-1");

    let no_bout = BoutRequest {
        preset_id: Some("gloves-off".into()),
        ..BoutRequest::default()
    };
    assert!(matches!(
        h.engine.validate(&no_bout, &caller).await,
        Err(BoutRejection::MissingBoutId)
    ));

    let no_preset = BoutRequest {
        bout_id: Some("b-1".into()),
        ..BoutRequest::default()
    };
    assert!(matches!(
        h.engine.validate(&no_preset, &caller).await,
        Err(BoutRejection::MissingPresetId)
    ));

    // Whitespace-only ids count as missing.
    let blank = BoutRequest {
        bout_id: Some("   ".into()),
        preset_id: Some("gloves-off".into()),
        ..BoutRequest::default()
    };
    assert!(matches!(
        h.engine.validate(&blank, &caller).await,
        Err(BoutRejection::MissingBoutId)
    ));
}

#[tokio::test]
async fn topic_gates_reject_oversized_and_unsafe_content() {
    let h = Harness::new(vec![]);
    let caller = Caller::anonymous("ip:1", "req-1");

    let mut req = request("b-topic", "gloves-off");
    req.topic = Some("x".repeat(501));
    assert!(matches!(
        h.engine.validate(&req, &caller).await,
        Err(BoutRejection::TopicTooLong)
    ));

    req.topic = Some("visit https://spam.example for details".into());
    assert!(matches!(
        h.engine.validate(&req, &caller).await,
        Err(BoutRejection::UnsafeContent)
    ));

    // Exactly 500 characters passes the length gate.
    req.bout_id = Some("b-topic-ok".into());
    req.topic = Some("y".repeat(500));
    assert!(h.engine.validate(&req, &caller).await.is_ok());

    // Shape rejections leave no row behind; the accepted one does.
    assert!(h.store.get("b-topic").await.unwrap().is_none());
    assert!(h.store.get("b-topic-ok").await.unwrap().is_some());
}

#[tokio::test]
async fn retryable_rows_can_be_revalidated() {
    let h = Harness::new(vec![]);
    let caller = Caller::user("user-1", "ip:1", "req-1");
    let req = request("b-retry", "gloves-off");

    let first = h.engine.validate(&req, &caller).await.unwrap();
    assert_eq!(first.bout_id, "b-retry");

    // The row sits in Running with no turns yet, the
    // crash-before-first-append window, so a retry revalidates cleanly.
    let second = h.engine.validate(&req, &caller).await.unwrap();
    assert_eq!(second.preset_id, "gloves-off");
}

#[tokio::test]
async fn completed_bouts_conflict_on_retry() {
    let mut turns = scripted_turns(6);
    turns.push(TurnScript::text("six rounds, no survivors"));
    let h = Harness::new(turns);
    let caller = Caller::anonymous("ip:1", "req-1");
    let req = request("b-done", "gloves-off");

    let plan = h.engine.validate(&req, &caller).await.unwrap();
    h.engine.execute(plan, None).await.unwrap();

    assert!(matches!(
        h.engine.validate(&req, &caller).await,
        Err(BoutRejection::AlreadyCompleted)
    ));
}

#[tokio::test]
async fn in_flight_bouts_conflict() {
    let h = Harness::new(vec![]);
    let caller = Caller::anonymous("ip:1", "req-1");

    h.store.create_if_absent(new_bout("b-flight")).await.unwrap();
    h.store
        .append_turn(
            "b-flight",
            TranscriptEntry {
                turn: 0,
                agent_id: "advocate".into(),
                agent_name: "The Advocate".into(),
                text: "opening".into(),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        h.engine.validate(&request("b-flight", "gloves-off"), &caller).await,
        Err(BoutRejection::AlreadyRunning)
    ));
}

// --- presets and ownership ---

#[tokio::test]
async fn unknown_presets_miss() {
    let h = Harness::new(vec![]);
    let caller = Caller::anonymous("ip:1", "req-1");
    let err = h
        .engine
        .validate(&request("b-x", "thunderdome"), &caller)
        .await
        .unwrap_err();
    match err {
        BoutRejection::UnknownPreset(id) => assert_eq!(id, "thunderdome"),
        other => panic!("expected UnknownPreset, got {other:?}"),
    }
}

#[tokio::test]
async fn arena_bouts_rebuild_from_the_persisted_lineup() {
    let h = Harness::new(vec![]);
    let caller = Caller::anonymous("ip:1", "req-1");

    // Arena with no persisted lineup resolves nowhere.
    assert!(matches!(
        h.engine.validate(&request("b-arena-none", "arena"), &caller).await,
        Err(BoutRejection::UnknownPreset(_))
    ));

    let mut bout = new_bout("b-arena");
    bout.preset_id = "arena".into();
    bout.topic = Some("robot chess".into());
    bout.response_length = ResponseLength::Long;
    h.store.create_if_absent(bout).await.unwrap();
    let lineup = vec![
        Agent {
            id: "poet".into(),
            name: "The Poet".into(),
            system_prompt: "You speak only in verse.".into(),
            color: Some("#a78bfa".into()),
        },
        Agent {
            id: "engineer".into(),
            name: "The Engineer".into(),
            system_prompt: "You want the numbers.".into(),
            color: None,
        },
    ];
    h.store.save_lineup("b-arena", &lineup, 4).await.unwrap();

    // A retry may arrive with nothing but the ids; the roster and the
    // dial settings come back from the row.
    let bare = BoutRequest {
        bout_id: Some("b-arena".into()),
        preset_id: Some("arena".into()),
        ..BoutRequest::default()
    };
    let plan = h.engine.validate(&bare, &caller).await.unwrap();
    assert_eq!(plan.preset.max_turns, 4);
    assert_eq!(plan.preset.agents.len(), 2);
    assert_eq!(plan.preset.agents[0].id, "poet");
    assert_eq!(plan.topic.as_deref(), Some("robot chess"));
    assert_eq!(plan.length, ResponseLength::Long);
}

#[tokio::test]
async fn bouts_belong_to_their_creator() {
    let h = Harness::new(vec![]);
    let owner = Caller::user("user-a", "ip:1", "req-1");
    let req = request("b-owned", "gloves-off");
    h.engine.validate(&req, &owner).await.unwrap();

    let stranger = Caller::user("user-b", "ip:2", "req-2");
    assert!(matches!(
        h.engine.validate(&req, &stranger).await,
        Err(BoutRejection::NotYourBout)
    ));

    let anonymous = Caller::anonymous("ip:3", "req-3");
    assert!(matches!(
        h.engine.validate(&req, &anonymous).await,
        Err(BoutRejection::NotYourBout)
    ));
}

// --- rate limits, tiers and model access ---

#[tokio::test]
async fn anonymous_callers_get_two_bouts_an_hour() {
    let h = Harness::new(vec![]);
    let caller = Caller::anonymous("ip:9", "req-1");

    h.engine
        .validate(&request("b-rl-1", "gloves-off"), &caller)
        .await
        .unwrap();
    h.engine
        .validate(&request("b-rl-2", "gloves-off"), &caller)
        .await
        .unwrap();

    let err = h
        .engine
        .validate(&request("b-rl-3", "gloves-off"), &caller)
        .await
        .unwrap_err();
    match err {
        BoutRejection::RateLimited {
            limit,
            retry_after_secs,
            tier,
            upgrades,
        } => {
            assert_eq!(limit, 2);
            assert!(retry_after_secs <= 3600);
            assert_eq!(tier, EffectiveTier::Anonymous);
            assert_eq!(upgrades.len(), 2);
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }

    // A different fingerprint is a different window.
    let other = Caller::anonymous("ip:10", "req-2");
    assert!(
        h.engine
            .validate(&request("b-rl-4", "gloves-off"), &other)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn model_requests_respect_tier_families() {
    let h = Harness::new(vec![]);
    let caller = Caller::user("user-m", "ip:1", "req-1");

    let mut req = request("b-m1", "gloves-off");
    req.model = Some("claude-opus-4-6".into());
    assert!(matches!(
        h.engine.validate(&req, &caller).await,
        Err(BoutRejection::ModelNotAllowed)
    ));

    // Unknown ids fail closed rather than falling back.
    req.model = Some("gpt-4o".into());
    assert!(matches!(
        h.engine.validate(&req, &caller).await,
        Err(BoutRejection::ModelNotAllowed)
    ));

    req.model = Some("claude-sonnet-4-5-20250929".into());
    let plan = h.engine.validate(&req, &caller).await.unwrap();
    assert_eq!(plan.model.platform(), Some(ModelId::Sonnet45));

    // Lab tier unlocks opus.
    h.entitlements.set_tier("user-lab", Tier::Lab).await;
    let lab = Caller::user("user-lab", "ip:2", "req-2");
    let mut req = request("b-m2", "gloves-off");
    req.model = Some("claude-opus-4-5-20251101".into());
    let plan = h.engine.validate(&req, &lab).await.unwrap();
    assert_eq!(plan.model.platform(), Some(ModelId::Opus45));
}

#[tokio::test]
async fn daily_quota_exhausts() {
    let h = Harness::new(vec![]);
    h.entitlements.set_daily_bouts_used("user-q", 5).await;
    let caller = Caller::user("user-q", "ip:1", "req-1");
    let err = h
        .engine
        .validate(&request("b-q", "gloves-off"), &caller)
        .await
        .unwrap_err();
    match err {
        BoutRejection::QuotaExhausted { reason } => assert!(reason.contains("daily limit")),
        other => panic!("expected QuotaExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn first_bout_promotion_upgrades_silently() {
    let h = Harness::new(vec![]);
    let caller = Caller::user("user-new", "ip:1", "req-1");

    let plan = h
        .engine
        .validate(&request("b-promo", "gloves-off"), &caller)
        .await
        .unwrap();
    assert_eq!(plan.model.platform(), Some(ModelId::Opus46));
    // Reserved at the promoted model's price.
    assert_eq!(plan.preauth_micro, 305);

    let log = h.ledger.transactions().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].kind, "preauthorize");
    assert_eq!(log[0].delta_micro, 305);
    assert_eq!(log[0].reference, "b-promo");
}

#[tokio::test]
async fn promotion_skips_repeat_and_explicit_callers() {
    let h = Harness::new(vec![]);

    h.entitlements.set_free_bouts_used("user-old", 3).await;
    let plan = h
        .engine
        .validate(
            &request("b-p1", "gloves-off"),
            &Caller::user("user-old", "ip:1", "req-1"),
        )
        .await
        .unwrap();
    assert_eq!(plan.model.platform(), Some(ModelId::Haiku45));

    // Asking for the default by name still counts as asking.
    let mut req = request("b-p2", "gloves-off");
    req.model = Some("claude-haiku-4-5-20251001".into());
    let plan = h
        .engine
        .validate(&req, &Caller::user("user-explicit", "ip:2", "req-2"))
        .await
        .unwrap();
    assert_eq!(plan.model.platform(), Some(ModelId::Haiku45));
    assert_eq!(plan.preauth_micro, 61);
}

#[tokio::test]
async fn premium_presets_prefer_the_best_accessible_model() {
    let h = Harness::new(vec![]);
    let plan = h
        .engine
        .validate(
            &request("b-darwin", "darwin-special"),
            &Caller::user("user-p", "ip:1", "req-1"),
        )
        .await
        .unwrap();
    // Free tier reaches sonnet, not opus; the promotion does not
    // override a premium selection.
    assert_eq!(plan.model.platform(), Some(ModelId::Sonnet45));
}

// --- reservations: pools, credits, BYOK ---

#[tokio::test]
async fn anonymous_bouts_draw_the_shared_pool() {
    let h = Harness::new(vec![]);
    let plan = h
        .engine
        .validate(
            &request("b-pool", "gloves-off"),
            &Caller::anonymous("ip:1", "req-1"),
        )
        .await
        .unwrap();
    assert_eq!(plan.pool_draw_micro, 61);
    assert_eq!(plan.preauth_micro, 0);
    assert!(plan.owner.is_none());

    let status = h.shared_pool.status().await.unwrap();
    assert_eq!(status.remaining_micro, DEFAULT_INTRO_POOL_MICRO - 61);
}

#[tokio::test]
async fn a_thin_pool_asks_for_sign_in() {
    let h = Harness::build(
        EngineConfig::default(),
        MemorySharedPool::with_remaining(10),
        MemoryFreeBoutPool::new(),
        vec![],
    );
    assert!(matches!(
        h.engine
            .validate(
                &request("b-thin", "gloves-off"),
                &Caller::anonymous("ip:1", "req-1"),
            )
            .await,
        Err(BoutRejection::SignInRequired)
    ));
}

/// Shared pool whose status looks healthy but whose draw always loses
/// the race.
struct RacingPool;

#[async_trait]
impl SharedPool for RacingPool {
    async fn status(&self) -> Result<PoolStatus, PoolError> {
        Ok(PoolStatus {
            remaining_micro: 1_000_000,
            exhausted: false,
        })
    }

    async fn consume(&self, _amount_micro: i64) -> Result<bool, PoolError> {
        Ok(false)
    }

    async fn refund(&self, _amount_micro: i64) -> Result<(), PoolError> {
        Ok(())
    }
}

#[tokio::test]
async fn losing_the_pool_race_is_a_typed_rejection() {
    let engine = BoutEngine::new(
        Arc::new(MemoryBoutStore::new()),
        Arc::new(MemoryLedger::new()),
        Arc::new(RacingPool),
        Arc::new(MemoryFreeBoutPool::new()),
        Arc::new(MemoryRateLimiter::new()),
        Arc::new(MemoryEntitlements::new()),
        Arc::new(StaticCatalog::new()),
        Arc::new(ScriptedClient::new(vec![])),
        EngineConfig::default(),
    );
    assert!(matches!(
        engine
            .validate(
                &request("b-race", "gloves-off"),
                &Caller::anonymous("ip:1", "req-1"),
            )
            .await,
        Err(BoutRejection::PoolExhausted)
    ));
}

#[tokio::test]
async fn an_empty_balance_cannot_preauthorize() {
    let h = Harness::new(vec![]);
    h.entitlements.set_tier("user-broke", Tier::Pass).await;
    h.ledger.set_balance("user-broke", 0).await;
    assert!(matches!(
        h.engine
            .validate(
                &request("b-broke", "gloves-off"),
                &Caller::user("user-broke", "ip:1", "req-1"),
            )
            .await,
        Err(BoutRejection::InsufficientCredits)
    ));
    // The declined reservation moved nothing and is not logged.
    assert!(h.ledger.transactions().await.is_empty());
}

#[tokio::test]
async fn free_tier_pool_caps_fire_by_count_and_spend() {
    let h = Harness::build(
        EngineConfig::default(),
        MemorySharedPool::new(),
        MemoryFreeBoutPool::with_caps(1, 50_000),
        vec![],
    );
    h.entitlements.set_free_bouts_used("user-f1", 1).await;
    let caller = Caller::user("user-f1", "ip:1", "req-1");
    h.engine
        .validate(&request("b-f1", "gloves-off"), &caller)
        .await
        .unwrap();
    let err = h
        .engine
        .validate(&request("b-f2", "gloves-off"), &caller)
        .await
        .unwrap_err();
    match err {
        BoutRejection::FreePoolExhausted { cap } => assert_eq!(cap, FreePoolCap::Count),
        other => panic!("expected FreePoolExhausted, got {other:?}"),
    }

    let h = Harness::build(
        EngineConfig::default(),
        MemorySharedPool::new(),
        MemoryFreeBoutPool::with_caps(200, 50),
        vec![],
    );
    h.entitlements.set_free_bouts_used("user-f2", 1).await;
    let err = h
        .engine
        .validate(
            &request("b-f3", "gloves-off"),
            &Caller::user("user-f2", "ip:2", "req-2"),
        )
        .await
        .unwrap_err();
    match err {
        BoutRejection::FreePoolExhausted { cap } => assert_eq!(cap, FreePoolCap::Spend),
        other => panic!("expected FreePoolExhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn byok_request_degrades_when_disabled() {
    let h = Harness::new(vec![]);
    let mut req = request("b-byok-off", "gloves-off");
    req.model = Some("byok".into());
    let plan = h
        .engine
        .validate(&req, &Caller::user("user-b", "ip:1", "req-1"))
        .await
        .unwrap();
    // Runs platform-funded on the default; "byok" counted as an explicit
    // request, so no promotion either.
    assert_eq!(plan.model.platform(), Some(ModelId::Haiku45));
}

#[tokio::test]
async fn byok_takes_the_stashed_key_exactly_once() {
    let h = Harness::with_config(byok_config(), vec![]);
    let caller = Caller::user("user-k", "ip:1", "req-1");
    let mut req = request("b-byok-1", "gloves-off");
    req.model = Some("byok".into());

    // Nothing deposited yet.
    assert!(matches!(
        h.engine.validate(&req, &caller).await,
        Err(BoutRejection::ByokKeyMissing)
    ));

    h.stash
        .put(
            "user-k",
            ByokCredentials::from_raw("sk-ant-caller".into(), Some("claude-opus-4-6".into())),
        )
        .await
        .unwrap();
    let plan = h.engine.validate(&req, &caller).await.unwrap();
    assert!(plan.model.is_byok());
    assert_eq!(plan.model.wire_id(), "claude-opus-4-6");
    // Flat platform fee, floored per bout; no per-token margin.
    assert_eq!(plan.preauth_micro, 10);

    // Single read: the deposit is gone.
    let mut retry = request("b-byok-2", "gloves-off");
    retry.model = Some("byok".into());
    assert!(matches!(
        h.engine.validate(&retry, &caller).await,
        Err(BoutRejection::ByokKeyMissing)
    ));
}

#[tokio::test]
async fn the_research_key_bypasses_every_reservation() {
    let config = EngineConfig {
        research_key: Some(SecretString::new("rk-batch-2025".into())),
        ..EngineConfig::default()
    };
    let h = Harness::with_config(config, vec![]);

    let mut caller = Caller::anonymous("ip:lab", "req-1");
    caller.research_key = Some("rk-batch-2025".into());

    let plan = h
        .engine
        .validate(&request("b-research", "rea-baseline"), &caller)
        .await
        .unwrap();
    assert_eq!(plan.tier, EffectiveTier::User(Tier::Lab));
    assert_eq!(plan.preauth_micro, 0);
    assert_eq!(plan.pool_draw_micro, 0);
    assert_eq!(plan.free_spend_micro, 0);
    assert!(h.ledger.transactions().await.is_empty());
    assert_eq!(
        h.shared_pool.status().await.unwrap().remaining_micro,
        DEFAULT_INTRO_POOL_MICRO
    );

    // A wrong key is just an anonymous caller.
    let mut impostor = Caller::anonymous("ip:fake", "req-2");
    impostor.research_key = Some("rk-wrong".into());
    let plan = h
        .engine
        .validate(&request("b-impostor", "gloves-off"), &impostor)
        .await
        .unwrap();
    assert_eq!(plan.tier, EffectiveTier::Anonymous);
    assert_eq!(plan.pool_draw_micro, 61);
}

// --- the turn loop ---

#[tokio::test]
async fn a_bout_streams_turn_events_in_order() {
    let mut turns = scripted_turns(6);
    turns.push(TurnScript::text("  \"Two robots argued rent and lost.\"  "));
    let h = Harness::new(turns);

    let plan = h
        .engine
        .validate(
            &request("b-stream", "gloves-off"),
            &Caller::anonymous("ip:1", "req-1"),
        )
        .await
        .unwrap();
    let sink = RecordingSink::new();
    let outcome = h.engine.execute(plan, Some(&sink)).await.unwrap();

    assert_eq!(outcome.transcript.len(), 6);
    let speakers: Vec<&str> = outcome.transcript.iter().map(|e| e.agent_id.as_str()).collect();
    assert_eq!(
        speakers,
        ["advocate", "skeptic", "advocate", "skeptic", "advocate", "skeptic"]
    );
    assert_eq!(
        outcome.share_line.as_deref(),
        Some("Two robots argued rent and lost.")
    );
    assert_eq!(outcome.input_tokens, 900);
    assert_eq!(outcome.output_tokens, 180);

    // Five events per turn, then the share line.
    let events = sink.events();
    assert_eq!(events.len(), 31);
    for (turn, window) in events[..30].chunks(5).enumerate() {
        let agent = if turn % 2 == 0 { "advocate" } else { "skeptic" };
        let turn_id = format!("b-stream-{turn}-{agent}");
        assert!(matches!(&window[0], BoutEvent::TurnStart { message_id } if *message_id == turn_id));
        match &window[1] {
            BoutEvent::Turn { data } => {
                assert_eq!(data.turn, turn as u32);
                assert_eq!(data.agent_id, agent);
            }
            other => panic!("expected Turn, got {other:?}"),
        }
        assert!(matches!(&window[2], BoutEvent::TextStart { id } if *id == turn_id));
        assert!(matches!(
            &window[3],
            BoutEvent::TextDelta { id, delta } if *id == turn_id && *delta == format!("Round {turn}.")
        ));
        assert!(matches!(&window[4], BoutEvent::TextEnd { id } if *id == turn_id));
    }
    match events.last() {
        Some(BoutEvent::ShareLine { data }) => {
            assert_eq!(data.text, "Two robots argued rent and lost.");
        }
        other => panic!("expected ShareLine, got {other:?}"),
    }

    // Events serialize straight to the wire tags.
    let first = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(first["type"], "start");
    assert_eq!(first["messageId"], "b-stream-0-advocate");

    // The persisted row matches what streamed.
    let row = h.store.get("b-stream").await.unwrap().unwrap();
    assert_eq!(row.status, BoutStatus::Completed);
    assert_eq!(row.transcript, outcome.transcript);
    assert_eq!(
        row.share_line.as_deref(),
        Some("Two robots argued rent and lost.")
    );

    // Six turn calls plus one share-line call.
    let requests = h.client.requests();
    assert_eq!(requests.len(), 7);
    assert!(
        requests[..6]
            .iter()
            .all(|r| r.model == "claude-haiku-4-5-20251001" && r.max_output_tokens == 300)
    );
    assert!(requests[0].system.is_some());
    assert!(requests[0].user.contains("should robots pay rent"));
    assert!(requests[1].user.contains("The Advocate: Round 0."));
    assert_eq!(requests[6].max_output_tokens, 80);
    assert!(requests[6].system.is_none());
}

#[tokio::test]
async fn byok_turns_carry_the_caller_key_but_the_share_line_does_not() {
    let mut turns = scripted_turns(6);
    turns.push(TurnScript::text("byok caption"));
    let h = Harness::with_config(byok_config(), turns);
    let caller = Caller::user("user-bk", "ip:1", "req-1");
    h.stash
        .put("user-bk", ByokCredentials::from_raw("sk-ant-own".into(), None))
        .await
        .unwrap();
    let mut req = request("b-bk", "gloves-off");
    req.model = Some("byok".into());

    let plan = h.engine.validate(&req, &caller).await.unwrap();
    h.engine.execute(plan, None).await.unwrap();

    let requests = h.client.requests();
    assert_eq!(requests.len(), 7);
    assert!(requests[..6].iter().all(|r| r.byok));
    // The caption runs platform-funded.
    assert!(!requests[6].byok);
    assert_eq!(requests[6].model, "claude-haiku-4-5-20251001");

    // 1 080 total tokens lands on the fee floor the estimate reserved,
    // so settlement had nothing to move.
    let log = h.ledger.transactions().await;
    assert_eq!(log.len(), 1);
    assert_eq!(
        h.ledger.balance_micro("user-bk").await.unwrap(),
        STARTING_BALANCE_MICRO - 10
    );
}

#[tokio::test]
async fn share_line_failure_never_fails_the_bout() {
    let mut turns = scripted_turns(6);
    turns.push(TurnScript::fault("caption service down"));
    let h = Harness::new(turns);
    let plan = h
        .engine
        .validate(
            &request("b-noshare", "gloves-off"),
            &Caller::anonymous("ip:1", "req-1"),
        )
        .await
        .unwrap();

    let outcome = h.engine.execute(plan, None).await.unwrap();
    assert_eq!(outcome.transcript.len(), 6);
    assert!(outcome.share_line.is_none());

    let row = h.store.get("b-noshare").await.unwrap().unwrap();
    assert_eq!(row.status, BoutStatus::Completed);
    assert!(row.share_line.is_none());
}

#[tokio::test]
async fn an_oversized_persona_stops_before_the_model_call() {
    let h = Harness::new(vec![]);
    let mut bout = new_bout("b-huge");
    bout.preset_id = "arena".into();
    h.store.create_if_absent(bout).await.unwrap();
    let lineup = vec![
        Agent {
            id: "maximalist".into(),
            name: "The Maximalist".into(),
            system_prompt: "verbose ".repeat(120_000),
            color: None,
        },
        Agent {
            id: "minimalist".into(),
            name: "The Minimalist".into(),
            system_prompt: "Few words.".into(),
            color: None,
        },
    ];
    h.store.save_lineup("b-huge", &lineup, 2).await.unwrap();

    let plan = h
        .engine
        .validate(
            &request("b-huge", "arena"),
            &Caller::anonymous("ip:1", "req-1"),
        )
        .await
        .unwrap();
    let err = h.engine.execute(plan, None).await.unwrap_err();
    match err {
        ExecuteError::ContextBudgetExceeded { estimated, budget } => {
            assert!(estimated > budget);
            assert_eq!(budget, 170_000);
        }
        other => panic!("expected ContextBudgetExceeded, got {other:?}"),
    }

    // No model call was ever attempted, and the draw came back whole.
    assert!(h.client.requests().is_empty());
    assert_eq!(
        h.shared_pool.status().await.unwrap().remaining_micro,
        DEFAULT_INTRO_POOL_MICRO
    );
    assert_eq!(
        h.store.get("b-huge").await.unwrap().unwrap().status,
        BoutStatus::Error
    );
}

#[tokio::test]
async fn an_empty_roster_is_a_typed_error() {
    let h = Harness::new(vec![]);
    h.store.create_if_absent(new_bout("b-empty")).await.unwrap();
    let plan = ExecutionPlan {
        bout_id: "b-empty".into(),
        preset_id: "gloves-off".into(),
        preset: Preset {
            id: "gloves-off".into(),
            name: "Gloves Off".into(),
            agents: Vec::new(),
            max_turns: 6,
            tier: PresetTier::Free,
        },
        topic: None,
        length: ResponseLength::default(),
        format: ResponseFormat::default(),
        model: ResolvedModel::Platform(ModelId::Haiku45),
        owner: None,
        tier: EffectiveTier::Anonymous,
        preauth_micro: 0,
        pool_draw_micro: 0,
        free_spend_micro: 0,
        free_pool_day: None,
        request_id: "req-empty".into(),
    };
    let err = h.engine.execute(plan, None).await.unwrap_err();
    assert!(matches!(err, ExecuteError::EmptyRoster(id) if id == "gloves-off"));
}

// --- settlement ---

#[tokio::test]
async fn settlement_trues_the_preauthorization_up() {
    // Five turns at (150, 30) plus one at (250, 50): 1000 in, 200 out.
    let mut turns: Vec<TurnScript> = (0..5)
        .map(|i| TurnScript::with_usage(&format!("turn {i}"), 150, 30))
        .collect();
    turns.push(TurnScript::with_usage("closing", 250, 50));
    turns.push(TurnScript::text("robots settled out of court"));
    let h = Harness::new(turns);

    let caller = Caller::user("user-s", "ip:1", "req-1");
    let plan = h
        .engine
        .validate(&request("b-settle", "gloves-off"), &caller)
        .await
        .unwrap();
    // First bout: promoted to opus and reserved at its price.
    assert_eq!(plan.preauth_micro, 305);

    h.engine.execute(plan, None).await.unwrap();

    // Actual: (1000 x 3.66 + 200 x 18.3) / 1M x 1.1 = 0.008052 GBP,
    // 81 micro; the unused 224 flow back.
    let log = h.ledger.transactions().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].kind, "preauthorize");
    assert_eq!(log[0].delta_micro, 305);
    assert_eq!(log[1].kind, "settle");
    assert_eq!(log[1].delta_micro, -224);
    assert_eq!(log[1].reference, "b-settle");
    assert_eq!(
        h.ledger.balance_micro("user-s").await.unwrap(),
        STARTING_BALANCE_MICRO - 81
    );
}

#[tokio::test]
async fn a_closed_sink_aborts_and_refunds_the_pool() {
    let h = Harness::new(vec![TurnScript::text("never delivered")]);
    let plan = h
        .engine
        .validate(
            &request("b-sink", "gloves-off"),
            &Caller::anonymous("ip:1", "req-1"),
        )
        .await
        .unwrap();
    assert_eq!(plan.pool_draw_micro, 61);

    let sink = ClosingSink::after(2);
    let err = h.engine.execute(plan, Some(&sink)).await.unwrap_err();
    assert!(matches!(err, ExecuteError::Sink(_)));

    let row = h.store.get("b-sink").await.unwrap().unwrap();
    assert_eq!(row.status, BoutStatus::Error);
    assert!(row.transcript.is_empty());
    assert!(row.error_message.is_some());

    // The full draw comes back: no turn completed, nothing was earned.
    assert_eq!(
        h.shared_pool.status().await.unwrap().remaining_micro,
        DEFAULT_INTRO_POOL_MICRO
    );
}

#[tokio::test]
async fn a_mid_stream_fault_keeps_completed_turns_billed() {
    let h = Harness::new(vec![
        TurnScript::with_usage("the only turn", 150, 30),
        TurnScript::fault("overloaded"),
    ]);
    h.entitlements.set_free_bouts_used("user-ff", 2).await;
    let caller = Caller::user("user-ff", "ip:1", "req-1");
    let plan = h
        .engine
        .validate(&request("b-fault", "gloves-off"), &caller)
        .await
        .unwrap();
    assert_eq!(plan.preauth_micro, 61);

    let err = h.engine.execute(plan, None).await.unwrap_err();
    match err {
        ExecuteError::Stream(fault) => {
            assert!(fault.retryable);
            assert_eq!(fault.message, "overloaded");
        }
        other => panic!("expected Stream, got {other:?}"),
    }

    let row = h.store.get("b-fault").await.unwrap().unwrap();
    assert_eq!(row.status, BoutStatus::Error);
    assert_eq!(row.transcript.len(), 1);
    assert_eq!(row.transcript[0].text, "the only turn");

    // The finished turn cost 3 micro; the unearned 58 flow back.
    let log = h.ledger.transactions().await;
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].kind, "settle");
    assert_eq!(log[1].delta_micro, -58);
    assert_eq!(
        h.ledger.balance_micro("user-ff").await.unwrap(),
        STARTING_BALANCE_MICRO - 3
    );
}
