use log::info;
use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, Responder, guard, http::Method, web};
use askama::Template;
use serde_json::{Map, Value};

use crate::auth::{authorize, generate_token};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::gpio::{AtomicPinState, ControlState, GpioBackend, GpioController, PinState};
use crate::metrics::Metrics;
use crate::monitor::read_service_statuses;

pub struct AppState<B: GpioBackend> {
    pub controller: Arc<GpioController<B>>,
    pub config: Arc<AppConfig>,
    pub controls: Arc<ControlState>,
    token: Arc<str>,
}

impl<B: GpioBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            config: Arc::clone(&self.config),
            controls: Arc::clone(&self.controls),
            token: Arc::clone(&self.token),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate<'a> {
    leds_on: bool,
    fan_on: bool,
    token: &'a str,
}

impl<B: GpioBackend + 'static> AppState<B> {
    pub fn new(config: Arc<AppConfig>, backend: Arc<B>) -> Result<Self, AppError> {
        Ok(Self::with_token(config, backend, generate_token()?))
    }

    pub fn with_token(config: Arc<AppConfig>, backend: Arc<B>, token: String) -> Self {
        Self {
            controller: Arc::new(GpioController::new(backend)),
            config,
            controls: Arc::new(ControlState::default()),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Drives every configured output line active, matching the initial
    /// logical state.
    pub fn power_on(&self) -> Result<(), AppError> {
        self.controller.activate_pins(&self.config.gpio.output_pins())?;
        self.controls.leds.store(PinState::Active);
        self.controls.fan.store(PinState::Active);
        Ok(())
    }

    pub fn scope(&self) -> actix_web::Scope {
        web::scope("")
            .service(
                web::resource("/")
                    .route(web::get().to(index::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::GET]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/toggle/leds")
                    .route(web::post().to(toggle_leds::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/toggle/fan")
                    .route(web::post().to(toggle_fan::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/service-monitor/update")
                    .route(web::post().to(update_service_monitor::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
            .service(
                web::resource("/metrics/update")
                    .route(web::post().to(update_metrics::<B>))
                    .route(
                        web::route()
                            .guard(guard_not_methods(&[Method::POST]))
                            .to(method_not_allowed),
                    ),
            )
    }
}

async fn index<B: GpioBackend + 'static>(
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    let page = IndexTemplate {
        leds_on: state.controls.leds.load().into(),
        fan_on: state.controls.fan.load().into(),
        token: state.token(),
    };
    let html = page
        .render()
        .map_err(|e| AppError::Template(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html))
}

async fn toggle_leds<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    authorize(&req, state.token())?;

    let pins = state.config.gpio.led_pins();
    let new = toggle_group(&state, &state.controls.leds, move |ctl, current| {
        ctl.toggle_pins(&pins, current)
    })
    .await?;
    info!("LEDs set to {new}");

    Ok(web::Json(toggle_response("leds_on", new)))
}

async fn toggle_fan<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    authorize(&req, state.token())?;

    let gpio = state.config.gpio.clone();
    let new = toggle_group(&state, &state.controls.fan, move |ctl, current| {
        ctl.toggle_pin(&gpio.device, gpio.fan_control_pin, current)
    })
    .await?;
    info!("fan set to {new}");

    Ok(web::Json(toggle_response("fan_on", new)))
}

// The read of `flag` and the write-back are not covered by the controller
// lock; two toggles racing on one group may both flip from the same value.
async fn toggle_group<B, F>(
    state: &AppState<B>,
    flag: &AtomicPinState,
    write: F,
) -> Result<PinState, AppError>
where
    B: GpioBackend + 'static,
    F: FnOnce(&GpioController<B>, PinState) -> Result<PinState, AppError> + Send + 'static,
{
    let current = flag.load();
    let controller = Arc::clone(&state.controller);
    let new = blocking(move || write(&controller, current)).await??;
    flag.store(new);
    Ok(new)
}

async fn blocking<F, R>(f: F) -> Result<R, AppError>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    web::block(f)
        .await
        .map_err(|e| AppError::Worker(format!("blocking task failed: {e}")))
}

fn toggle_response(key: &str, state: PinState) -> Map<String, Value> {
    let on = bool::from(state);
    let mut body = Map::new();
    body.insert(key.to_string(), Value::Bool(on));
    body.insert("on".to_string(), Value::Bool(on));
    body
}

async fn update_service_monitor<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    authorize(&req, state.token())?;

    let config = Arc::clone(&state.config);
    let statuses = blocking(move || {
        read_service_statuses(&config.monitor.file, &config.monitor.services)
    })
    .await?;

    Ok(web::Json(statuses))
}

async fn update_metrics<B: GpioBackend + 'static>(
    req: HttpRequest,
    state: web::Data<AppState<B>>,
) -> Result<impl Responder, AppError> {
    authorize(&req, state.token())?;

    let config = Arc::clone(&state.config);
    let metrics = blocking(move || Metrics::collect(&config.metrics)).await?;

    Ok(web::Json(metrics))
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().finish()
}

fn guard_not_methods(methods: &[Method]) -> impl guard::Guard {
    let allowed: Vec<Method> = methods.to_vec();
    guard::fn_guard(move |ctx| !allowed.iter().any(|m| m == ctx.head().method))
}
