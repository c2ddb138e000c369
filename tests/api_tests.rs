use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, test, web};
use pisite::{AppConfig, AppState, DeviceOp, MockGpioBackend, PinState};
use serde_json::Value;

const CHIP: &str = "/dev/gpiochip4";
const TOKEN: &str = "0123456789abcdef0123456789abcdef";

fn sample_config(monitor_file: &str, temperature_file: &str) -> AppConfig {
    serde_json::from_value(serde_json::json!({
        "http": { "host": "127.0.0.1:8000" },
        "gpio": {
            "device": CHIP,
            "power_led_control_pin": 17,
            "io_led_control_pin": 27,
            "fan_control_pin": 18
        },
        "monitor": { "file": monitor_file, "services": ["yapper", "yoinker"] },
        "metrics": { "temperature_file": temperature_file }
    }))
    .expect("valid sample config")
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("pisite-api-{}-{name}", std::process::id()))
}

fn sample_state(config: AppConfig) -> (AppState<MockGpioBackend>, Arc<MockGpioBackend>) {
    let backend = Arc::new(MockGpioBackend::default());
    let state = AppState::with_token(Arc::new(config), backend.clone(), TOKEN.to_string());
    (state, backend)
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .service($state.scope()),
        )
        .await
    };
}

#[actix_rt::test]
async fn index_renders_state_and_token() {
    let (state, _) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = test::read_body(resp).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains(&format!(r#"<meta name="token" content="{TOKEN}">"#)));
    assert!(html.contains(r#"id="leds-switch" checked"#));
    assert!(html.contains(r#"id="fan-switch" checked"#));
}

#[actix_rt::test]
async fn toggle_leds_flips_state_and_pins() {
    let (state, backend) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    state.power_on().unwrap();
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/toggle/leds")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["leds_on"], false);
    assert_eq!(resp["on"], false);
    assert_eq!(state.controls.leds.load(), PinState::Inactive);
    assert_eq!(state.controls.fan.load(), PinState::Active);
    assert_eq!(backend.value(CHIP, 17), Some(PinState::Inactive));
    assert_eq!(backend.value(CHIP, 27), Some(PinState::Inactive));
    assert_eq!(backend.value(CHIP, 18), Some(PinState::Active));

    let req = test::TestRequest::post()
        .uri("/toggle/leds")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(resp["leds_on"], true);
    assert_eq!(backend.value(CHIP, 17), Some(PinState::Active));

    let req = test::TestRequest::get().uri("/").to_request();
    let body = test::call_and_read_body(&app, req).await;
    let html = std::str::from_utf8(&body).unwrap();
    assert!(html.contains(r#"id="leds-switch" checked"#));
}

#[actix_rt::test]
async fn toggle_fan_drives_only_fan_pin() {
    let (state, backend) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/toggle/fan")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["fan_on"], false);
    assert_eq!(resp["on"], false);
    assert_eq!(state.controls.fan.load(), PinState::Inactive);
    assert_eq!(backend.value(CHIP, 18), Some(PinState::Inactive));
    assert_eq!(backend.value(CHIP, 17), None);
    assert_eq!(
        backend.journal(),
        vec![
            DeviceOp::Open {
                device: CHIP.to_string()
            },
            DeviceOp::Write {
                device: CHIP.to_string(),
                line: 18,
                value: PinState::Inactive
            },
            DeviceOp::Close {
                device: CHIP.to_string()
            },
        ]
    );
}

#[actix_rt::test]
async fn unauthorized_requests_change_nothing() {
    let (state, backend) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    let app = init_app!(state);

    for uri in [
        "/toggle/leds",
        "/toggle/fan",
        "/service-monitor/update",
        "/metrics/update",
    ] {
        let req = test::TestRequest::post().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "{uri} without token");
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("token"));

        let req = test::TestRequest::post()
            .uri(uri)
            .insert_header(("X-Token", "not-the-token"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403, "{uri} with wrong token");
    }

    assert_eq!(state.controls.leds.load(), PinState::Active);
    assert_eq!(state.controls.fan.load(), PinState::Active);
    assert!(backend.journal().is_empty());
}

#[actix_rt::test]
async fn device_failure_is_internal_error() {
    let (state, backend) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    backend.fail_device(CHIP);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/toggle/leds")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 500);
    assert_eq!(state.controls.leds.load(), PinState::Active);
}

#[actix_rt::test]
async fn missing_monitor_file_is_empty_list() {
    let (state, _) = sample_state(sample_config("/nonexistent/containers.json", "/nonexistent"));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/service-monitor/update")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!([]));
}

#[actix_rt::test]
async fn service_monitor_reports_matches() {
    let monitor = temp_path("containers.json");
    fs::write(
        &monitor,
        r#"[
            {"Id": "c1", "Names": ["yapper"], "State": "running", "Status": "Up 3 days"},
            {"Id": "c2", "Names": ["other"], "State": "exited", "Status": "Exited (1)"}
        ]"#,
    )
    .unwrap();
    let (state, _) = sample_state(sample_config(monitor.to_str().unwrap(), "/nonexistent"));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/service-monitor/update")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let _ = fs::remove_file(&monitor);

    assert_eq!(body[0]["service_name"], "yapper");
    assert_eq!(body[0]["service_status"]["State"], "running");
    assert_eq!(body[1]["service_name"], "yoinker");
    assert_eq!(body[1]["service_status"], serde_json::json!({}));
}

#[actix_rt::test]
async fn metrics_report_temperature_or_null() {
    let thermal = temp_path("thermal");
    fs::write(&thermal, "51250\n").unwrap();
    let (state, _) = sample_state(sample_config("/nonexistent", thermal.to_str().unwrap()));
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/metrics/update")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let _ = fs::remove_file(&thermal);
    assert_eq!(body["temperature"], 51.25);
    assert_eq!(body["fan_rpm"], Value::Null);

    let (state, _) = sample_state(sample_config("/nonexistent", "/nonexistent/thermal"));
    let app = init_app!(state);
    let req = test::TestRequest::post()
        .uri("/metrics/update")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["temperature"], Value::Null);
}

#[actix_rt::test]
async fn wrong_method_returns_405() {
    let (state, _) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    let app = init_app!(state);

    let req = test::TestRequest::get().uri("/toggle/leds").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);

    let req = test::TestRequest::post().uri("/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
}

#[actix_rt::test]
async fn power_on_activates_every_output() {
    let (state, backend) = sample_state(sample_config("/nonexistent", "/nonexistent"));
    state.power_on().unwrap();

    for line in [17, 27, 18] {
        assert_eq!(backend.value(CHIP, line), Some(PinState::Active));
    }
    assert_eq!(backend.max_open_handles(), 1);
}

#[actix_rt::test]
async fn partial_metrics_section_uses_default_thermal_path() {
    let rpm = temp_path("fan_rpm");
    fs::write(&rpm, "2400").unwrap();
    let mut config = sample_config("/nonexistent", "/nonexistent");
    config.metrics = serde_json::from_value(serde_json::json!({
        "fan_rpm_file": rpm.to_str().unwrap()
    }))
    .unwrap();
    assert_eq!(
        config.metrics.temperature_file,
        "/sys/class/thermal/thermal_zone0/temp"
    );
    let (state, _) = sample_state(config);
    let app = init_app!(state);

    let req = test::TestRequest::post()
        .uri("/metrics/update")
        .insert_header(("X-Token", TOKEN))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let _ = fs::remove_file(&rpm);

    assert_eq!(body["fan_rpm"], 2400.0);
}
