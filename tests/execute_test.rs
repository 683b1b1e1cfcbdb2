// Integration tests for process execution against mocked ICMM and OOI services

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use indicators::config::IndicatorsConfig;
use indicators::http::build_client;
use indicators::process::{IndicatorRegistry, ProcessRunner};
use indicators::wps::{create_wps_router, WpsAppState};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app(recalculate: bool) -> Router {
    let mut config = IndicatorsConfig::default();
    config.server.recalculate = recalculate;
    let http_client = build_client(&config.http).unwrap();
    create_wps_router(Arc::new(WpsAppState {
        registry: IndicatorRegistry::with_defaults(),
        runner: ProcessRunner::new(http_client, config),
    }))
}

fn icmm_url(server: &ServerGuard, id: u64) -> String {
    format!("{}/icmm_api/CRISMA.worldstates/{}", server.url(), id)
}

fn ooi_url(server: &ServerGuard, id: u64) -> String {
    format!("{}/ooi/WorldState/{}", server.url(), id)
}

async fn mock_worldstate(server: &mut ServerGuard, id: u64, body: Value) -> Mock {
    server
        .mock("GET", format!("/icmm_api/CRISMA.worldstates/{}", id).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

async fn mock_properties(server: &mut ServerGuard, wsid: u64, etpid: u64, records: Value) -> Mock {
    server
        .mock("GET", "/ooi/EntityProperty")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("wsid".into(), wsid.to_string()),
            Matcher::UrlEncoded("etpid".into(), etpid.to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(records.to_string())
        .create_async()
        .await
}

fn life(entity: u64, value: &str) -> Value {
    json!({
        "entityId": entity,
        "entityTypePropertyId": 42,
        "entityPropertyValue": value,
        "entityTypeProperty": {"entityTypePropertyType": 1}
    })
}

/// Baseline 1 (OOI 4) -> current 2 (OOI 5).
async fn mock_two_step_scenario(server: &mut ServerGuard) -> (Mock, Mock) {
    let baseline_body = json!({
        "id": 1,
        "name": "Baseline",
        "categories": [{"key": "Baseline"}],
        "worldstatedata": [{"name": "OOI-worldstate-ref", "actualaccessinfo": ooi_url(server, 4)}]
    });
    let current_body = json!({
        "id": 2,
        "name": "Step 1",
        "description": "after triage",
        "parentworldstate": {"$ref": "/CRISMA.worldstates/1"},
        "worldstatedata": [{"name": "OOI-worldstate-ref", "actualaccessinfo": ooi_url(server, 5)}],
        "iccdata": []
    });
    let baseline = mock_worldstate(server, 1, baseline_body).await;
    let current = mock_worldstate(server, 2, current_body).await;
    (baseline, current)
}

async fn post_execute(app: Router, process: &str, worldstate_url: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/processes/{}/execute", process))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "ICMMworldstateURL": worldstate_url }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

/// Baseline {A:80, B:20}, current {A:90, B:15}: one improved, none deteriorated.
#[tokio::test]
async fn test_improved_end_to_end() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _exposed = mock_properties(&mut server, 4, 54, json!([])).await;
    let _base = mock_properties(&mut server, 4, 42, json!([life(1, "80"), life(2, "20")])).await;
    let _now = mock_properties(&mut server, 5, 42, json!([life(1, "90"), life(2, "15")])).await;
    let publish = server
        .mock("POST", "/icmm_api/CRISMA.dataitems")
        .match_body(Matcher::PartialJson(json!({"worldstate": {"$ref": "/CRISMA.worldstates/2"}})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 100}"#)
        .expect(3)
        .create_async()
        .await;

    let (status, body) = post_execute(create_test_app(true), "Improved", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["recalculated"], true);
    assert_eq!(body["indicator"][0]["id"], "Improved");
    assert_eq!(body["indicator"][0]["data"], 1);
    assert_eq!(body["indicator"][0]["totalCount"], 2);
    assert_eq!(body["indicator"][0]["worldstates"], json!([4, 5]));
    assert_eq!(body["indicator"][1]["id"], "SeriouslyDeteriorated");
    assert_eq!(body["indicator"][1]["data"], 0);
    assert_eq!(
        body["indicator"][0]["worldstateDescription"]["ICMMname"],
        "Step 1"
    );
    assert_eq!(body["kpi"]["casualties"]["Improved"]["value"], 1);
    assert_eq!(
        body["ICMMindicatorValueURL"],
        format!("{}/icmm_api/CRISMA.dataitems/100", server.url())
    );
    assert!(body["skippedRecords"].as_array().unwrap().is_empty());
    publish.assert_async().await;
}

/// Deaths through the KVP endpoint, returning only the raw indicator output.
#[tokio::test]
async fn test_kvp_execute_raw_output() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _life = mock_properties(
        &mut server,
        5,
        42,
        json!([life(1, "5"), life(2, "19"), life(3, "60"), life(4, "n/a")]),
    )
    .await;
    let _publish = server
        .mock("POST", "/icmm_api/CRISMA.dataitems")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 7}"#)
        .create_async()
        .await;

    let inputs = urlencoding::encode(&format!("ICMMworldstateURL={}", icmm_url(&server, 2))).into_owned();
    let uri = format!(
        "/wps?service=WPS&request=Execute&version=1.0.0&identifier=Deaths&datainputs={}&rawdataoutput=indicator",
        inputs
    );
    let response = create_test_app(true)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let indicator: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(indicator["id"], "Deaths");
    assert_eq!(indicator["type"], "number");
    assert_eq!(indicator["data"], 2);
    assert_eq!(indicator["worldstates"], json!([2]));
}

/// Legacy processes mirror their value into OOI and reference it from ICMM.
#[tokio::test]
async fn test_mirrored_indicator_is_stored_in_ooi() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _existing = mock_properties(&mut server, 5, 61, json!([])).await;
    let _life = mock_properties(&mut server, 5, 42, json!([life(1, "5")])).await;
    let store = server
        .mock("POST", "/ooi/EntityProperty")
        .match_body(Matcher::PartialJson(json!({
            "entityId": 1,
            "entityTypePropertyId": 61,
            "worldStateId": 5
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"entityPropertyId": 900, "entityId": 1, "entityTypePropertyId": 61}"#)
        .create_async()
        .await;
    let reference = server
        .mock("POST", "/icmm_api/CRISMA.dataitems")
        .match_body(Matcher::PartialJson(json!({"actualaccessinfocontenttype": "text/plain"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 12}"#)
        .create_async()
        .await;
    let _indicator = server
        .mock("POST", "/icmm_api/CRISMA.dataitems")
        .match_body(Matcher::PartialJson(json!({"actualaccessinfocontenttype": "application/json"})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 11}"#)
        .create_async()
        .await;

    let (status, body) =
        post_execute(create_test_app(true), "deathsIndicator", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["indicator"]["name"], "Deaths");
    assert_eq!(body["indicator"]["data"], 1);
    assert!(body.get("kpi").is_none());
    assert_eq!(
        body["OOIindicatorURL"],
        format!("{}/ooi/EntityProperty/900", server.url())
    );
    assert_eq!(
        body["ICMMindicatorRefURL"],
        format!("{}/icmm_api/CRISMA.dataitems/12", server.url())
    );
    store.assert_async().await;
    reference.assert_async().await;
}

/// With recalculation disabled a stored value is reported as-is.
#[tokio::test]
async fn test_existing_value_reused_without_recalculation() {
    let mut server = Server::new_async().await;
    let body = json!({
        "id": 2,
        "worldstatedata": [{"name": "OOI-worldstate-ref", "actualaccessinfo": ooi_url(&server, 5)}],
        "iccdata": [{"id": 55, "name": "Deaths", "categories": [{"key": "Indicators"}]}]
    });
    let _ws = mock_worldstate(&mut server, 2, body).await;
    let no_ooi_reads = server
        .mock("GET", "/ooi/EntityProperty")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (status, body) = post_execute(create_test_app(false), "Deaths", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["recalculated"], false);
    assert_eq!(
        body["ICMMindicatorValueURL"],
        format!("{}/icmm_api/CRISMA.dataitems/55", server.url())
    );
    assert!(body.get("indicator").is_none());
    no_ooi_reads.assert_async().await;
}

/// Missing OOI cross-reference is an unresolved reference, not a server error.
#[tokio::test]
async fn test_missing_ooi_reference_is_unprocessable() {
    let mut server = Server::new_async().await;
    let _ws = mock_worldstate(&mut server, 2, json!({"id": 2, "worldstatedata": []})).await;

    let (status, body) = post_execute(create_test_app(true), "Deaths", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["exceptionCode"], "NoApplicableCode");
    assert_eq!(body["locator"], "ICMMworldstateURL");
}

/// Upstream failures surface as 502 with the failing URL.
#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let mut server = Server::new_async().await;
    let _ws = server
        .mock("GET", "/icmm_api/CRISMA.worldstates/2")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let (status, body) = post_execute(create_test_app(true), "Deaths", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["text"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn test_invalid_icmm_reference() {
    let (status, body) =
        post_execute(create_test_app(true), "Deaths", "http://icmm/not-a-worldstate").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["text"].as_str().unwrap().contains("invalid ICMM ref"));
}

fn record(entity: u64, property: u64, declared: i64, value: Value) -> Value {
    json!({
        "entityId": entity,
        "entityTypePropertyId": property,
        "entityPropertyValue": value,
        "entityTypeProperty": {"entityTypePropertyType": declared}
    })
}

async fn mock_publish(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/icmm_api/CRISMA.dataitems")
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 30}"#)
        .create_async()
        .await
}

/// Every record of an OOI world-state, no property filter.
async fn mock_all_properties(server: &mut ServerGuard, wsid: u64, records: Value) -> Mock {
    server
        .mock("GET", "/ooi/EntityProperty")
        .match_query(Matcher::UrlEncoded("wsid".into(), wsid.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(records.to_string())
        .create_async()
        .await
}

/// Baseline 1 (OOI 4, 10:00) -> 2 (OOI 5, 10:30) -> 3 (OOI 6, 11:15).
///
/// A vehicle is ordered to evacuate at 2 and the last patient is gone at 3.
/// Vehicle 1 moves, vehicle 2 is unavailable from the start, vehicle 3 idles.
async fn mock_evacuation_scenario(server: &mut ServerGuard) -> Vec<Mock> {
    let steps = [
        (1, None, 4, "2014-11-27T10:00"),
        (2, Some(1), 5, "2014-11-27T10:30"),
        (3, Some(2), 6, "2014-11-27T11:15"),
    ];
    let mut mocks = Vec::new();
    for (id, parent, ooi, time) in steps {
        let mut body = json!({
            "id": id,
            "name": format!("Step {}", id),
            "simulatedTime": time,
            "worldstatedata": [{"name": "OOI-worldstate-ref", "actualaccessinfo": ooi_url(server, ooi)}],
            "iccdata": []
        });
        match parent {
            Some(parent) => {
                body["parentworldstate"] = json!({"$ref": format!("/CRISMA.worldstates/{}", parent)})
            }
            None => body["categories"] = json!([{"key": "Baseline"}]),
        }
        mocks.push(mock_worldstate(server, id, body).await);
    }

    let evacuate = json!(r#"{"Command-Type": "Evacuate", "Target": "hospital"}"#);
    mocks.push(
        mock_all_properties(
            server,
            4,
            json!([
                record(1, 46, 1, json!("1")),
                record(2, 46, 1, json!("-1")),
                record(3, 46, 1, json!("2")),
                record(3, 48, 2, json!("idle")),
                record(10, 52, 2, json!("waiting")),
            ]),
        )
        .await,
    );
    mocks.push(
        mock_all_properties(
            server,
            5,
            json!([
                record(1, 45, 2, evacuate),
                record(1, 48, 2, json!("moving")),
                record(10, 52, 2, json!("waiting")),
            ]),
        )
        .await,
    );
    mocks.push(
        mock_all_properties(
            server,
            6,
            json!([
                record(2, 46, 1, json!("5")),
                record(10, 52, 2, json!("Evacuated")),
            ]),
        )
        .await,
    );
    mocks
}

/// A record with a non-string value is reported as skipped, the rest is counted.
#[tokio::test]
async fn test_non_string_value_is_skipped() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _life = mock_properties(
        &mut server,
        5,
        42,
        json!([life(1, "5"), record(2, 42, 1, json!(7))]),
    )
    .await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) = post_execute(create_test_app(true), "Deaths", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["indicator"]["data"], 1);
    assert_eq!(body["skippedRecords"][0]["entityId"], 2);
    assert_eq!(body["skippedRecords"][0]["reason"]["kind"], "notText");
}

#[tokio::test]
async fn test_evacuation_timeline() {
    let mut server = Server::new_async().await;
    let _scenario = mock_evacuation_scenario(&mut server).await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) = post_execute(create_test_app(true), "Evacuation", &icmm_url(&server, 3)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let values = body["indicator"].as_array().unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(values[0]["id"], "Evacuation");
    assert_eq!(values[0]["type"], "timeintervals");
    assert_eq!(values[0]["worldstates"], json!([1, 2, 3]));
    let interval = &values[0]["data"]["intervals"][0];
    assert!(interval["startTime"].as_str().unwrap().starts_with("2014-11-27T10:30:00"));
    assert!(interval["endTime"].as_str().unwrap().starts_with("2014-11-27T11:15:00"));
    assert_eq!(values[1]["id"], "TimeToEvacuation");
    assert_eq!(values[1]["data"], 30.0);
    assert_eq!(values[2]["id"], "LastPatientEvacuated");
    assert_eq!(values[2]["data"], 75.0);
    assert_eq!(body["kpi"]["delay"]["Evacuation"]["value"], 75.0);
    assert_eq!(body["kpi"]["delay"]["Evacuation"]["unit"], "Minutes");
}

/// Evaluated at step 2 the evacuation has started but not completed.
#[tokio::test]
async fn test_evacuation_in_progress_has_no_kpi() {
    let mut server = Server::new_async().await;
    let _scenario = mock_evacuation_scenario(&mut server).await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) = post_execute(create_test_app(true), "Evacuation", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let values = body["indicator"].as_array().unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1]["id"], "TimeToEvacuation");
    assert_eq!(values[1]["data"], 30.0);
    assert!(values[0]["data"]["intervals"][0]["endTime"]
        .as_str()
        .unwrap()
        .starts_with("2014-11-27T10:30:00"));
    assert!(body.get("kpi").is_none());
}

#[tokio::test]
async fn test_unused_resources_over_lineage() {
    let mut server = Server::new_async().await;
    let _scenario = mock_evacuation_scenario(&mut server).await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) =
        post_execute(create_test_app(true), "UnusedResources", &icmm_url(&server, 3)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let value = &body["indicator"][0];
    assert_eq!(value["id"], "UnusedResources");
    assert_eq!(value["data"], 1);
    assert_eq!(value["totalCount"], 2);
    assert_eq!(value["worldstates"], json!([1, 2, 3]));
    assert_eq!(body["kpi"]["Resources"]["UnusedResources"]["value"], 1);
}

#[tokio::test]
async fn test_effective_response_excludes_unexposed() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _exposed = mock_properties(&mut server, 5, 54, json!([record(3, 54, 2, json!("False"))])).await;
    let _treatment = mock_properties(
        &mut server,
        5,
        52,
        json!([
            record(1, 52, 2, json!("None")),
            record(2, 52, 2, json!("Treated")),
            record(3, 52, 2, json!("None")),
            record(4, 52, 2, json!(7)),
        ]),
    )
    .await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) =
        post_execute(create_test_app(true), "EffectiveResponse", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["indicator"][0]["id"], "EffectiveResponse");
    assert_eq!(body["indicator"][0]["data"], 33);
    assert_eq!(body["indicator"][0]["totalCount"], 3);
    assert_eq!(body["indicator"][1]["id"], "IneffectiveResponse");
    assert_eq!(body["indicator"][1]["data"], 67);
    assert_eq!(body["kpi"]["Resources"]["EffectiveResponse"]["unit"], "%");
    assert_eq!(body["skippedRecords"][0]["entityId"], 4);
}

#[tokio::test]
async fn test_resource_depleted_counts_all_records() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _capacity = mock_properties(
        &mut server,
        5,
        47,
        json!([
            record(1, 47, 1, json!("20")),
            record(2, 47, 1, json!("55")),
            record(3, 47, 1, json!("5,5")),
            record(4, 47, 1, json!("full")),
        ]),
    )
    .await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) =
        post_execute(create_test_app(true), "ResourceDepleted", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["indicator"]["data"], 2);
    assert_eq!(body["indicator"]["totalCount"], 4);
    assert_eq!(body["kpi"]["resources"]["ResourceDepleted"]["value"], 2);
    assert_eq!(body["kpi"]["resources"]["ResourceDepleted"]["unit"], "Vehicles");
    assert_eq!(body["skippedRecords"][0]["entityId"], 4);
}

/// `improvedIndicator` ignores exposure and mirrors its count into OOI.
#[tokio::test]
async fn test_legacy_improved_is_mirrored() {
    let mut server = Server::new_async().await;
    let _ws = mock_two_step_scenario(&mut server).await;
    let _existing = mock_properties(&mut server, 5, 63, json!([])).await;
    let _base = mock_properties(&mut server, 4, 42, json!([life(1, "80"), life(2, "20")])).await;
    let _now = mock_properties(&mut server, 5, 42, json!([life(1, "90"), life(2, "25")])).await;
    let no_exposure_reads = server
        .mock("GET", "/ooi/EntityProperty")
        .match_query(Matcher::UrlEncoded("etpid".into(), "54".into()))
        .expect(0)
        .create_async()
        .await;
    let store = server
        .mock("POST", "/ooi/EntityProperty")
        .match_body(Matcher::PartialJson(json!({"entityTypePropertyId": 63, "worldStateId": 5})))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"entityPropertyId": 910, "entityId": 1, "entityTypePropertyId": 63}"#)
        .create_async()
        .await;
    let _publish = mock_publish(&mut server).await;

    let (status, body) =
        post_execute(create_test_app(true), "improvedIndicator", &icmm_url(&server, 2)).await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["indicator"]["id"], "improvedIndicator");
    assert_eq!(body["indicator"]["name"], "improved");
    assert_eq!(body["indicator"]["data"], 2);
    assert_eq!(body["indicator"]["worldstates"], json!([4, 5]));
    assert!(body.get("kpi").is_none());
    assert_eq!(
        body["OOIindicatorURL"],
        format!("{}/ooi/EntityProperty/910", server.url())
    );
    store.assert_async().await;
    no_exposure_reads.assert_async().await;
}
