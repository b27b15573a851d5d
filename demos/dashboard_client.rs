//! Demonstrates a dashboard signing in, loading orders concurrently across an access token
//! expiry, and logging out, against a mock rental API.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use tokio::task::JoinSet;
use url::Url;
// self
use rental_session::{
	api::Credentials,
	config::SessionConfig,
	session::{LogoutReason, SessionContext, SessionObserver},
	store::{MemoryStore, TokenStore},
};

struct PrintingObserver;
impl SessionObserver for PrintingObserver {
	fn on_login_success(&self, session: &rental_session::auth::Session) {
		println!("Signed in as user {}.", session.user_id());
	}

	fn on_session_expired(&self) {
		println!("Session expired; redirecting to the login page.");
	}

	fn on_logout(&self, reason: LogoutReason) {
		println!("Signed out ({reason}).");
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login/");
			then.status(200).header("content-type", "application/json").body(
				r#"{"token":"A1","refresh_token":"R1","user":{"id":7,"email":"vendor@example.com","role":"vendor"}}"#,
			);
		})
		.await;
	let stale = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/vendor/orders/").header("authorization", "Bearer A1");
			then.status(401).body(r#"{"code":"token_not_valid"}"#);
		})
		.await;
	let fresh = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/vendor/orders/").header("authorization", "Bearer A2");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"[{"id":1,"status":"rented"},{"id":2,"status":"returned"}]"#);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/refresh/");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"A2"}"#)
				.delay(std::time::Duration::from_millis(150));
		})
		.await;
	let config = SessionConfig::builder(Url::parse(&server.url("/api/"))?).build()?;
	let store = MemoryStore::default();
	let context = SessionContext::new(config, Arc::new(store.clone()))?;

	context.subscribe(Arc::new(PrintingObserver));
	context.login(&Credentials::new("vendor@example.com", "s3cret")).await?;

	let mut widgets = JoinSet::new();

	for widget in ["summary", "calendar", "returns"] {
		let context = context.clone();
		let request = context.pipeline().get("vendor/orders/")?;

		widgets.spawn(async move {
			let orders: Vec<serde_json::Value> = context.pipeline().execute_json(request).await?;

			Ok::<_, rental_session::error::Error>((widget, orders.len()))
		});
	}
	while let Some(joined) = widgets.join_next().await {
		let (widget, count) = joined??;

		println!("Widget {widget} loaded {count} orders.");
	}

	println!(
		"Refresh calls: {}; the stored access token is now {}.",
		context.coordinator().metrics().attempts(),
		store.get().await?.map(|session| session.access_token.expose().to_owned()).unwrap_or_default(),
	);

	context.logout().await?;

	login.assert_calls_async(1).await;
	stale.assert_calls_async(3).await;
	fresh.assert_calls_async(3).await;
	refresh.assert_calls_async(1).await;

	Ok(())
}
