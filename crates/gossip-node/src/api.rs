//! Thin HTTP read API: a projection over the store.
//!
//! Reads never trigger validation; staleness is the revalidation loop's
//! job.

use alloy_primitives::{Address, B256};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use gossip_store::StoreService;
use gossip_types::{Order, OrderQuery, OrderSort, Side};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(store: Arc<StoreService>) -> Router {
	// Browser clients read the order book cross-origin; everything here
	// is public data.
	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods(Any)
		.allow_headers(Any);

	Router::new()
		.route("/health", get(health))
		.route("/orders", get(list_orders))
		.route("/orders/{hash}", get(order_by_hash))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(cors),
		)
		.with_state(store)
}

#[derive(Serialize)]
struct Health {
	status: &'static str,
}

async fn health() -> Json<Health> {
	Json(Health { status: "ok" })
}

#[derive(Debug, Deserialize)]
struct ListParams {
	collection: String,
	side: Option<String>,
	sort: Option<String>,
	limit: Option<usize>,
	offset: Option<usize>,
}

#[derive(Serialize)]
struct OrderList {
	orders: Vec<Order>,
}

enum ApiError {
	BadRequest(String),
	Internal(String),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
			Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
		};
		(status, Json(serde_json::json!({ "error": message }))).into_response()
	}
}

async fn list_orders(
	State(store): State<Arc<StoreService>>,
	Query(params): Query<ListParams>,
) -> Result<Json<OrderList>, ApiError> {
	let collection = params
		.collection
		.parse::<Address>()
		.map_err(|_| ApiError::BadRequest(format!("invalid address: {}", params.collection)))?;
	let side = match params.side.as_deref() {
		None | Some("SELL") => Side::Sell,
		Some("BUY") => Side::Buy,
		Some(other) => return Err(ApiError::BadRequest(format!("invalid side: {}", other))),
	};
	let sort = match params.sort.as_deref() {
		None | Some("NEWEST") => OrderSort::Newest,
		Some("OLDEST") => OrderSort::Oldest,
		Some("ENDING_SOON") => OrderSort::EndingSoon,
		Some("PRICE_ASC") => OrderSort::PriceAsc,
		Some("PRICE_DESC") => OrderSort::PriceDesc,
		Some(other) => return Err(ApiError::BadRequest(format!("invalid sort: {}", other))),
	};
	let query = OrderQuery {
		side,
		sort,
		filters: Vec::new(),
		limit: params.limit.unwrap_or(50).min(1_000),
		offset: params.offset.unwrap_or(0),
	};
	let rows = store
		.find_orders(Some(collection), &query)
		.await
		.map_err(|e| ApiError::Internal(e.to_string()))?;
	Ok(Json(OrderList {
		orders: rows.into_iter().map(|(_, order)| order).collect(),
	}))
}

async fn order_by_hash(
	State(store): State<Arc<StoreService>>,
	Path(hash): Path<String>,
) -> Result<Response, ApiError> {
	let hash = hash
		.parse::<B256>()
		.map_err(|_| ApiError::BadRequest(format!("invalid order hash: {}", hash)))?;
	let order = store
		.get_order(hash)
		.await
		.map_err(|e| ApiError::Internal(e.to_string()))?;
	match order {
		Some(order) => Ok(Json(order).into_response()),
		None => Ok(StatusCode::NOT_FOUND.into_response()),
	}
}
