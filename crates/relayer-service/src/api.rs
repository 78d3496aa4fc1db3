//! HTTP intake for signed intents.
//!
//! `POST /intents` only parses the payload and hands it to the in-process
//! signed intent source; validation happens on the relayer's worker.

use axum::{
	extract::State,
	http::StatusCode,
	response::Json,
	routing::{get, post},
	Router,
};
use relayer_discovery::{SignedIntentPayload, SignedIntentSender};
use relayer_intent::TypedDataCodec;
use relayer_types::{Address, SignedSubmission};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

pub struct ApiServer {
	bind_address: String,
	state: AppState,
}

#[derive(Clone)]
struct AppState {
	intake: SignedIntentSender,
	codec: TypedDataCodec,
	relayer: Address,
	chain_id: u64,
}

impl ApiServer {
	pub fn new(
		host: &str,
		port: u16,
		intake: SignedIntentSender,
		codec: TypedDataCodec,
		relayer: Address,
		chain_id: u64,
	) -> Self {
		Self {
			bind_address: format!("{}:{}", host, port),
			state: AppState {
				intake,
				codec,
				relayer,
				chain_id,
			},
		}
	}

	pub fn router(&self) -> Router {
		Router::new()
			.route("/health", get(health))
			.route("/intents", post(submit_intent))
			.with_state(self.state.clone())
			.layer(TraceLayer::new_for_http())
			.layer(CorsLayer::permissive())
	}

	pub async fn run(self) -> anyhow::Result<()> {
		let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
		info!("API server listening on {}", self.bind_address);

		axum::serve(listener, self.router()).await?;
		Ok(())
	}
}

async fn health(State(state): State<AppState>) -> Json<Value> {
	Json(json!({
		"status": "ok",
		"relayer": state.relayer.to_string(),
		"chainId": state.chain_id,
		"timestamp": chrono::Utc::now().timestamp()
	}))
}

async fn submit_intent(
	State(state): State<AppState>,
	Json(payload): Json<SignedIntentPayload>,
) -> (StatusCode, Json<Value>) {
	let submission = match SignedSubmission::try_from(payload) {
		Ok(submission) => submission,
		Err(e) => {
			warn!(error = %e, "Rejected signed intent payload");
			return (
				StatusCode::BAD_REQUEST,
				Json(json!({ "error": "INVALID_INTENT", "message": e.to_string() })),
			);
		}
	};

	let digest = state.codec.digest(&submission.intent);
	match state.intake.send(submission) {
		Ok(()) => {
			info!(%digest, "Signed intent accepted for relaying");
			(
				StatusCode::ACCEPTED,
				Json(json!({ "status": "accepted", "digest": digest.to_string() })),
			)
		}
		Err(e) => (
			StatusCode::SERVICE_UNAVAILABLE,
			Json(json!({ "error": "UNAVAILABLE", "message": e.to_string() })),
		),
	}
}
