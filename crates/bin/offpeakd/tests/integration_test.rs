//! End-to-end tests for the full offpeakd stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, virtual
//! dishwasher and price feed, real engine, real axum router) and exercises
//! the HTTP layer via `tower::ServiceExt::oneshot`. No TCP port is bound.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono_tz::Tz;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use offpeak_adapter_http_axum::router;
use offpeak_adapter_http_axum::state::AppState;
use offpeak_adapter_storage_sqlite_sqlx::{Config, Database, SqliteOptionsStore};
use offpeak_adapter_virtual::VirtualIntegration;
use offpeak_app::event_bus::InProcessEventBus;
use offpeak_app::ports::Clock;
use offpeak_app::registry::SchedulerRegistry;
use offpeak_app::scheduler::{Scheduler, SchedulerSettings};
use offpeak_app::services::control_service::ControlService;
use offpeak_app::tasks::{dispatch_door_event, tick_all};
use offpeak_domain::options::SchedulerOptions;
use offpeak_domain::time::Timestamp;

#[derive(Clone)]
struct ManualClock(Arc<Mutex<Timestamp>>);

impl ManualClock {
    fn at(rfc3339: &str) -> Self {
        Self(Arc::new(Mutex::new(parse(rfc3339))))
    }

    fn set(&self, rfc3339: &str) {
        *self.0.lock().unwrap() = parse(rfc3339);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.0.lock().unwrap()
    }
}

fn parse(rfc3339: &str) -> Timestamp {
    rfc3339.parse().unwrap()
}

type Integration = Arc<VirtualIntegration<Arc<InProcessEventBus>, ManualClock>>;
type Registry = SchedulerRegistry<Integration, Integration, ManualClock>;
type Control = ControlService<Integration, Integration, ManualClock, SqliteOptionsStore>;

struct Stack {
    clock: ManualClock,
    bus: Arc<InProcessEventBus>,
    integration: Integration,
    registry: Arc<Registry>,
    control: Arc<Control>,
    db: Database,
}

impl Stack {
    fn router(&self) -> axum::Router {
        router::build(AppState::from_arc(Arc::clone(&self.control)))
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

fn registry(integration: &Integration, clock: &ManualClock) -> Registry {
    let mut registry = SchedulerRegistry::new(16);
    let settings = SchedulerSettings {
        price_entity: Some("sensor.electricity_price".to_string()),
        door_sensor_entity: Some("binary_sensor.dishwasher_door".to_string()),
        power_switch_entity: Some("switch.dishwasher_power".to_string()),
        ..SchedulerSettings::new(
            "dishwasher",
            "sensor.cheapest_hour",
            "sensor.dishwasher_status",
            "button.dishwasher_start",
        )
    };
    registry.insert(Scheduler::new(
        settings,
        SchedulerOptions::default(),
        Arc::clone(integration),
        Arc::clone(integration),
        clock.clone(),
    ));
    registry
}

/// Build a fully-wired stack at 2025-01-10 14:00 UTC.
async fn stack() -> Stack {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");

    let clock = ManualClock::at("2025-01-10T14:00:00Z");
    let bus = Arc::new(InProcessEventBus::new(64));
    let integration = Arc::new(VirtualIntegration::new(
        ["dishwasher"],
        Tz::UTC,
        Arc::clone(&bus),
        clock.clone(),
    ));
    let registry = Arc::new(registry(&integration, &clock));
    let control = Arc::new(ControlService::new(
        Arc::clone(&registry),
        SqliteOptionsStore::new(db.pool().clone()),
    ));

    Stack {
        clock,
        bus,
        integration,
        registry,
        control,
        db,
    }
}

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let response = stack()
        .await
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn should_list_configured_scheduler_when_started() {
    let stack = stack().await;

    let (status, body) = stack.send("GET", "/api/schedulers", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "dishwasher");
    assert_eq!(body[0]["phase"], "idle");
}

#[tokio::test]
async fn should_plan_cheapest_virtual_hour_when_armed() {
    let stack = stack().await;

    let (status, body) = stack
        .send(
            "PUT",
            "/api/schedulers/dishwasher/armed",
            Some(json!({ "armed": true })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "armed_pending");
    assert_eq!(body["planned_start"], "2025-01-11T02:00:00Z");
}

#[tokio::test]
async fn should_start_and_reset_on_door_open_when_planned_minute_reached() {
    let stack = stack().await;
    stack
        .send(
            "PUT",
            "/api/schedulers/dishwasher/armed",
            Some(json!({ "armed": true })),
        )
        .await;
    let mut events = stack.bus.subscribe();

    stack.clock.set("2025-01-11T02:00:00Z");
    tick_all(&stack.registry, parse("2025-01-11T02:00:00Z")).await;

    let (_, body) = stack.send("GET", "/api/schedulers/dishwasher", None).await;
    assert_eq!(body["last_result"], "started");
    assert_eq!(body["started_at"], "2025-01-11T02:00:00Z");

    stack.clock.set("2025-01-11T04:10:00Z");
    assert!(stack.integration.finish_run("dishwasher").await);
    assert!(stack.integration.open_door("dishwasher").await);
    let door = loop {
        let event = events.recv().await.unwrap();
        if event.entity_id == "binary_sensor.dishwasher_door" {
            break event;
        }
    };
    assert_eq!(dispatch_door_event(&stack.registry, &door).await, 1);

    let (_, body) = stack.send("GET", "/api/schedulers/dishwasher", None).await;
    assert_eq!(body["last_result"], "reset_on_door_open");
    assert_eq!(body["started_at"], Value::Null);
}

#[tokio::test]
async fn should_record_not_ready_when_door_open_at_planned_start() {
    let stack = stack().await;
    stack
        .send(
            "PUT",
            "/api/schedulers/dishwasher/armed",
            Some(json!({ "armed": true })),
        )
        .await;
    assert!(stack.integration.open_door("dishwasher").await);

    tick_all(&stack.registry, parse("2025-01-11T02:00:00Z")).await;

    let (_, body) = stack.send("GET", "/api/schedulers/dishwasher", None).await;
    assert_eq!(body["last_result"], "not_ready");
}

#[tokio::test]
async fn should_restore_persisted_option_when_restarted() {
    let stack = stack().await;
    let (status, _) = stack
        .send(
            "PATCH",
            "/api/schedulers/dishwasher/options",
            Some(json!({ "key": "window_start", "value": "22:30" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let restarted = ControlService::new(
        Arc::new(registry(&stack.integration, &stack.clock)),
        SqliteOptionsStore::new(stack.db.pool().clone()),
    );
    let applied = restarted.restore_options().await.unwrap();

    assert_eq!(applied, 1);
    let snapshot = restarted.get("dishwasher").await.unwrap();
    assert_eq!(snapshot.options.window_start.to_string(), "22:30");
}

#[tokio::test]
async fn should_not_persist_rejected_option() {
    let stack = stack().await;

    let (status, body) = stack
        .send(
            "PATCH",
            "/api/schedulers/dishwasher/options",
            Some(json!({ "key": "ready_substring", "value": "  " })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(stack.control.restore_options().await.unwrap(), 0);
}

#[tokio::test]
async fn should_schedule_from_virtual_price_curve() {
    let stack = stack().await;

    let (status, body) = stack
        .send(
            "POST",
            "/api/schedulers/dishwasher/schedule-from-prices",
            Some(json!({ "duration_half_hours": 2 })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["armed"], true);
    assert_eq!(body["planned_duration_minutes"], 60);
    let start: Timestamp = body["planned_start"].as_str().unwrap().parse().unwrap();
    assert!(start >= parse("2025-01-11T02:00:00Z"));
    assert!(start <= parse("2025-01-11T02:30:00Z"));
}

#[tokio::test]
async fn should_return_404_for_unknown_scheduler() {
    let stack = stack().await;

    let (status, body) = stack.send("GET", "/api/schedulers/dryer", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
