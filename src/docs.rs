use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::models;
use crate::routes::{auth, categories, comments, genres, health, reviews, titles, users};

#[derive(OpenApi)]
#[openapi(
	info(title = "YaMDb API", description = "Reviews of titles (books, films, music) with comments, ratings and role-based moderation."),
	paths(
		auth::signup,
		auth::token,
		users::list_users,
		users::create_user,
		users::get_me,
		users::update_me,
		users::get_user,
		users::update_user,
		users::delete_user,
		categories::list_categories,
		categories::create_category,
		categories::delete_category,
		genres::list_genres,
		genres::create_genre,
		genres::delete_genre,
		titles::list_titles,
		titles::create_title,
		titles::get_title,
		titles::update_title,
		titles::delete_title,
		reviews::list_reviews,
		reviews::create_review,
		reviews::get_review,
		reviews::update_review,
		reviews::delete_review,
		comments::list_comments,
		comments::create_comment,
		comments::get_comment,
		comments::update_comment,
		comments::delete_comment,
		health::health
	),
	components(
		schemas(
			models::user::Role,
			models::user::User,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::user::SignupRequest,
			models::user::SignupResponse,
			models::user::TokenRequest,
			models::user::TokenResponse,
			models::category::Lookup,
			models::category::LookupCreateRequest,
			models::title::Title,
			models::title::TitleCreateRequest,
			models::title::TitleUpdateRequest,
			models::review::Review,
			models::review::ReviewCreateRequest,
			models::review::ReviewUpdateRequest,
			models::comment::Comment,
			models::comment::CommentWriteRequest,
			health::HealthResponse,
			ErrorResponse
		)
	),
	modifiers(&SecurityAddon),
	tags(
		(name = "Auth", description = "Signup and confirmation-code token exchange"),
		(name = "Users", description = "User administration and own profile"),
		(name = "Categories", description = "Title categories"),
		(name = "Genres", description = "Title genres"),
		(name = "Titles", description = "Titles with aggregated rating"),
		(name = "Reviews", description = "Scored reviews of a title"),
		(name = "Comments", description = "Comments on a review"),
		(name = "Health", description = "Liveness and database probe")
	)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		if let Some(components) = openapi.components.as_mut() {
			components.add_security_scheme(
				"bearerAuth",
				SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
			);
		}
	}
}

/// The generated document with a `servers` entry for the local listener.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_servers(&mut doc, port);
	add_error_examples(&mut doc);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let server_url = format!("http://localhost:{port}");

	match doc.get_mut("servers") {
		Some(Value::Array(arr)) => {
			let has = arr.iter().any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				arr.push(json!({ "url": server_url }));
			}
		}
		_ => {
			doc["servers"] = json!([{ "url": server_url }]);
		}
	}
}

/// Attaches the shared error body to every 4xx response that has none.
fn add_error_examples(doc: &mut Value) {
	let Some(paths) = doc.get_mut("paths").and_then(Value::as_object_mut) else {
		return;
	};

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else {
			continue;
		};
		for operation in operations.values_mut() {
			let Some(responses) = operation.get_mut("responses").and_then(Value::as_object_mut) else {
				continue;
			};
			for (status, response) in responses.iter_mut() {
				if !status.starts_with('4') || response.get("content").is_some() {
					continue;
				}
				if let Some(obj) = response.as_object_mut() {
					obj.insert(
						"content".to_string(),
						json!({
							"application/json": {
								"schema": { "$ref": "#/components/schemas/ErrorResponse" },
								"example": error_example(status)
							}
						}),
					);
				}
			}
		}
	}
}

fn error_example(status: &str) -> Value {
	match status {
		"400" => json!({
			"error": "validation",
			"message": "score: score must be between 1 and 10",
			"fields": { "score": ["score must be between 1 and 10"] }
		}),
		"401" => json!({ "error": "unauthorized", "message": "authentication credentials were not provided" }),
		"403" => json!({ "error": "forbidden", "message": "you do not have permission to perform this action" }),
		"404" => json!({ "error": "not_found", "message": "not found" }),
		_ => json!({ "error": "bad_request", "message": "bad request" }),
	}
}
