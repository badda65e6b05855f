use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use portsafe::config::{AppConfig, DeliveryConfig};
use portsafe::deliveries::{
    delivery_router, CodeIssuer, DeliveryLifecycle, DeliveryServices, DisabledNoticeSender,
    InMemoryDeliveryRepository, LexicalMatcher, LockerAllocator, RecipientQuery,
    RecipientValidator, RecordingNoticeSender, SeededCodeIssuer, SystemCodeIssuer,
    ValidationPolicy, ValidationRequest,
};
use portsafe::directory::InMemoryUnitDirectory;
use portsafe::error::AppError;
use portsafe::telemetry;
use portsafe::{deliveries, seed};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
struct OpsState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Portsafe",
    about = "Run the condominium package-locker coordination service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a seeded delivery through validation, storage, and pickup
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct DemoArgs {
    /// Seed for the demo code generator, so transcripts are reproducible
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

/// Wires the delivery components over shared storage and directory handles.
fn build_services(
    directory: Arc<InMemoryUnitDirectory>,
    repository: Arc<InMemoryDeliveryRepository>,
    notices: Arc<dyn deliveries::DeliveryNoticeSender>,
    codes: Arc<dyn CodeIssuer>,
    delivery: &DeliveryConfig,
) -> DeliveryServices {
    let deposit_window = chrono::Duration::minutes(delivery.deposit_window_minutes);
    let policy = ValidationPolicy {
        confidence_threshold: delivery.matcher_confidence_threshold,
        apartment_postal_reference: delivery.apartment_postal_reference,
    };

    DeliveryServices {
        validator: Arc::new(RecipientValidator::new(
            directory.clone(),
            Arc::new(LexicalMatcher),
            codes.clone(),
            policy,
        )),
        allocator: Arc::new(LockerAllocator::new(
            repository.clone(),
            directory.clone(),
            codes,
            deposit_window,
        )),
        lifecycle: Arc::new(DeliveryLifecycle::new(
            repository,
            directory,
            notices,
            deposit_window,
        )),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let ops_state = OpsState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let directory = Arc::new(seed::demo_directory());
    let repository = Arc::new(InMemoryDeliveryRepository::default());
    seed::seed_locker_bank(repository.as_ref(), seed::LOCKER_BANK_SIZE)
        .map_err(|err| AppError::Delivery(err.to_string()))?;

    let services = build_services(
        directory,
        repository,
        Arc::new(DisabledNoticeSender),
        Arc::new(SystemCodeIssuer),
        &config.delivery,
    );

    spawn_expiry_sweep(services.lifecycle.clone());

    let ops = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(ops_state);

    let app = delivery_router(services).merge(ops).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "package locker coordinator ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Background task returning lapsed reservations to the pool once a minute.
fn spawn_expiry_sweep(lifecycle: Arc<DeliveryLifecycle>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match lifecycle.release_expired(Utc::now()) {
                Ok(expired) if !expired.is_empty() => {
                    info!(count = expired.len(), "expired reservations released");
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "expiry sweep failed"),
            }
        }
    });
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<OpsState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<OpsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = DeliveryConfig {
        deposit_window_minutes: 5,
        matcher_confidence_threshold: 70,
        apartment_postal_reference: false,
    };
    let directory = Arc::new(seed::demo_directory());
    let repository = Arc::new(InMemoryDeliveryRepository::default());
    seed::seed_locker_bank(repository.as_ref(), seed::LOCKER_BANK_SIZE)
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    let notices = Arc::new(RecordingNoticeSender::default());

    let services = build_services(
        directory,
        repository,
        notices.clone(),
        Arc::new(SeededCodeIssuer::new(args.seed)),
        &config,
    );

    println!("Package locker walkthrough (seed {})", args.seed);

    println!("\n1. Courier announces a parcel for Maria Silva, CEP 12345-678");
    let request = ValidationRequest {
        claimed_name: "Maria Silva".to_string(),
        query: RecipientQuery::House {
            postal_code: "12345-678".to_string(),
        },
    };
    let outcome = services
        .validator
        .validate(&request)
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    println!("   -> {}", outcome.message);
    let details = outcome
        .found
        .ok_or_else(|| AppError::Delivery("demo recipient missing from seed".to_string()))?;
    println!("   -> address on file: {}", details.address);

    println!("\n2. Courier mistypes the name; the assisted matcher takes over");
    let assisted = services
        .validator
        .validate_assisted(&ValidationRequest {
            claimed_name: "Mariia Silva".to_string(),
            query: RecipientQuery::House {
                postal_code: "12345-678".to_string(),
            },
        })
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    println!(
        "   -> matched: {} (confidence {}%)",
        assisted.matched, assisted.confidence
    );

    println!("\n3. A locker is reserved for the validated unit");
    let reservation = services
        .allocator
        .reserve(&details.unit_id)
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    println!(
        "   -> locker {} | delivery {} | entry code {}",
        reservation.locker_id.0, reservation.delivery_id.0, reservation.entry_code
    );

    println!("\n4. Courier deposits the parcel and shuts the door");
    let receipt = services
        .lifecycle
        .confirm_closure(&reservation.delivery_id)
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    println!(
        "   -> stored at {} | access password {} | resident notified: {}",
        receipt.registered_at, receipt.access_password, receipt.notified
    );
    for notice in notices.sent() {
        println!(
            "   -> notice to {}: locker {}, password {}",
            notice.email, notice.locker_number, notice.access_password
        );
    }

    println!("\n5. The resident keys in the password and collects the parcel");
    let pickup = services
        .lifecycle
        .confirm_pickup(&reservation.delivery_id)
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    println!("   -> picked up at {}", pickup.picked_up_at);

    println!("\n6. An unknown recipient is redirected to the front desk");
    let escalation = services
        .lifecycle
        .escalate_front_desk("Paulo Desconhecido", "99999-999")
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    println!("   -> front desk case {}", escalation.case_id.0);

    println!("\n7. Delivery history for Maria Silva");
    let history = services
        .lifecycle
        .history_for_recipient("Maria Silva")
        .map_err(|err| AppError::Delivery(err.to_string()))?;
    for delivery in history {
        println!(
            "   -> {} | {} | {}",
            delivery.id.0,
            delivery.status.label(),
            delivery.address
        );
    }

    Ok(())
}
