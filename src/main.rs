// src/main.rs

mod api;
mod app_state;
mod assistant;
mod auth;
mod config;
mod dispatcher;
mod errors;
mod events;
mod models;
mod notify_server;
mod router;
mod scorer;
mod state_machine;
mod store;
mod ws;

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};

use crate::app_state::AppState;
use crate::auth::verify_token;
use crate::dispatcher::Dispatcher;
use crate::notify_server::NotifyServer;
use crate::store::mongo::MongoStore;

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim().to_string();
                    let secret = req
                        .app_data::<web::Data<AppState>>()
                        .map(|data| data.config.jwt_secret.clone())
                        .unwrap_or_else(|| {
                            env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string())
                        });
                    match verify_token(&token, &secret) {
                        Ok(identity) => {
                            req.extensions_mut().insert(identity);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .body(format!("Invalid token: {}", e))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let store = Arc::new(MongoStore::init(&config.mongo_uri, &config.database_name).await);
    let dispatcher = Arc::new(Dispatcher::new(
        store,
        config.max_workload,
        config.suggestion_count,
        config.caller_cache_capacity,
        config.caller_cache_ttl(),
    ));
    // Start the notification fan-out actor.
    let notifier = NotifyServer::new().start();

    let frontend_origin =
        env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

    println!("Server running at http://{}", config.bind_addr);
    println!("Allowed CORS Origin: {}", frontend_origin);

    let bind_addr = config.bind_addr.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(AppState {
                dispatcher: dispatcher.clone(),
                notifier: notifier.clone(),
                config: config.clone(),
            }))
            // Generic action dispatch, shared by the UI and the assistant
            .service(web::resource("/actions").route(web::post().to(api::dispatch_action)))
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("", web::post().to(api::create_task))
                    .route("/mine", web::get().to(api::list_my_tasks))
                    .service(
                        web::scope("/{task_id}")
                            .route("/status", web::get().to(api::get_task_status))
                            .route("/accept", web::post().to(api::accept_task))
                            .route("/reject", web::post().to(api::reject_task))
                            .route("/progress", web::post().to(api::update_task_progress)),
                    ),
            )
            // EMPLOYEES
            .service(web::resource("/employees").route(web::get().to(api::list_employees)))
            // ASSISTANT
            .service(
                web::scope("/assistant").route("/command", web::post().to(assistant::command)),
            )
            // WEBSOCKET route for real-time notifications
            .service(web::resource("/ws").route(web::get().to(ws::ws_index)))
    })
    .bind(bind_addr)?
    .run()
    .await
}
