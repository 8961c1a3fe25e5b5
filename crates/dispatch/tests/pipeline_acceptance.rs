use std::sync::Arc;

use dispatch::{
    generators::{LoadContent, RefreshPanel},
    system_controllers, ControllerRegistry, ControllerType, DispatchConfig, Dispatcher,
    HintMode, RequestContext, ResultMapping,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use session::{ComponentTree, Field, MapBean, Session};
use shared::{
    domain::{PathId, SessionId},
    protocol::{params, results, session_attrs, ClientRequest, RequestParams},
    transfer::TransferTree,
};

type Log = Arc<Mutex<Vec<String>>>;

fn acct_components() -> ComponentTree {
    ComponentTree::new()
        .with(Field::new("acctForm.name", "name"))
        .with(Field::new("acctForm.note", "note"))
}

fn registry(log: Log) -> ControllerRegistry {
    let config = DispatchConfig::default();
    let save_log = Arc::clone(&log);
    let close_log = Arc::clone(&log);
    let mark_log = Arc::clone(&log);
    let load_log = Arc::clone(&log);

    let mut builder = ControllerRegistry::builder().rule(
        "rejectAll",
        |_tree: &TransferTree, rc: &mut RequestContext| {
            rc.add_validation_info(Some("name"), "names are frozen");
            false
        },
    );
    for controller in system_controllers(&config) {
        builder = builder.controller(controller);
    }
    builder
        .controller(
            ControllerType::document("/main")
                .result(ResultMapping::json("docOnly").with(LoadContent)),
        )
        .controller(
            ControllerType::page("/acct")
                .bean_template(MapBean::new().with("name", "unset"))
                .components(acct_components)
                .bind("name", "acctForm.name", "name")
                .bind("note", "acctForm.note", "note")
                .on_load(|ctx| {
                    ctx.add_on_save_id("acctForm.note");
                    Ok(())
                })
                .on_save(move |ctx| {
                    save_log.lock().push(format!("save {}", ctx.page().path_id()));
                    ctx.hint(HintMode::Info, "saved");
                    Ok(())
                })
                .on_close(move |ctx| {
                    close_log
                        .lock()
                        .push(format!("close {}", ctx.page().path_id()));
                    Ok(())
                })
                .action("/toDocument", |_ctx| Ok("docOnly".to_string()))
                .action("/pin", |ctx| {
                    ctx.add_sticky_path("/ledger:a/mark");
                    ctx.add_sticky_path("/ledger:b/mark");
                    Ok("none".to_string())
                })
                .action("/rename", |ctx| {
                    ctx.set_controller_property("/ledger:a", "owner", vec!["acct".into()]);
                    ctx.fire_controller_action("/ledger:a/mark");
                    Ok("none".to_string())
                })
                .result(ResultMapping::json("save").with(RefreshPanel)),
        )
        .controller(
            ControllerType::page("/audited")
                .extends("/acct")
                .validate_action("/savePage", &["rejectAll"]),
        )
        .controller(
            ControllerType::page("/report")
                .extends("/acct")
                .read_only(),
        )
        .controller(
            ControllerType::page("/search")
                .extends("/acct")
                .reset_on_write()
                .bean_template(MapBean::new().with("status", "fresh")),
        )
        .controller(
            ControllerType::page("/feed")
                .on_load(move |ctx| {
                    load_log.lock().push(format!("load {}", ctx.page().path_id()));
                    ctx.hint(HintMode::Info, "feed reloaded");
                    Ok(())
                })
                .action("/refresh", |_ctx| Ok(results::RELOAD.to_string())),
        )
        .controller(ControllerType::page("/vault").secured())
        .controller(
            ControllerType::page("/ledger").action("/mark", move |ctx| {
                mark_log.lock().push(format!("mark {}", ctx.page().path_id()));
                Ok("none".to_string())
            }),
        )
        .build(&config)
        .expect("registry")
}

struct App {
    dispatcher: Dispatcher,
    session: Session,
    log: Log,
}

impl App {
    fn new() -> Self {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        Self {
            dispatcher: Dispatcher::new(
                Arc::new(registry(Arc::clone(&log))),
                DispatchConfig::default(),
            ),
            session: Session::new(SessionId::from("acceptance")),
            log,
        }
    }

    fn post(&self, path: &str, pairs: &[(&str, &str)]) -> Value {
        let request = ClientRequest::new(path, RequestParams::from_pairs(pairs.iter().copied()));
        let response = self
            .dispatcher
            .process(&self.session, &request)
            .expect("response");
        serde_json::from_str(response.body()).expect("json body")
    }

    fn bean(&self, path_id: &str) -> Value {
        let page = self
            .session
            .page(&PathId::from(path_id))
            .expect("live page");
        let snapshot = page.lock().bean().snapshot();
        snapshot
    }

    fn open(&self, path_id: &str) {
        self.post(
            &format!("{path_id}/openPage"),
            &[(params::DOCUMENT, "/main")],
        );
    }

    fn panel(&self) -> Vec<String> {
        self.session
            .existing_content_panel(&PathId::from("/main"))
            .map(|panel| {
                panel
                    .lock()
                    .pages()
                    .iter()
                    .map(|page| page.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn handlers(body: &Value) -> Vec<String> {
    body["jsonResp"]
        .as_array()
        .expect("response array")
        .iter()
        .filter_map(|fragment| fragment["handler"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn save_with_repeated_rows_populates_every_sibling() {
    let app = App::new();

    let body = app.post(
        "/acct/savePage",
        &[("name_0001", "Ada"), ("name_0002", "Bob")],
    );

    assert_eq!(app.bean("/acct")["name"], json!([null, "Ada", "Bob"]));
    assert_eq!(
        handlers(&body),
        vec!["refreshPanelHdl", "hintUserHdl", "refreshMenuHdl"]
    );
    assert_eq!(body["jsonResp"][1]["hintList"][0]["message"], "saved");
    assert_eq!(*app.log.lock(), vec!["save /acct".to_string()]);
}

#[test]
fn failed_validation_skips_population_and_action() {
    let app = App::new();
    app.post("/audited/noResult", &[]);
    let before = app.bean("/audited");

    let body = app.post(
        "/audited/savePage",
        &[
            ("name_0001", "Ada"),
            ("name_0002", "Bob"),
            (params::VALIDATION_ACTION, "/savePage"),
        ],
    );

    assert_eq!(
        body,
        json!({
            "jsonResp": [
                {
                    "handler": "validationErrorHdl",
                    "validationInfo": [{ "target": "name", "message": "names are frozen" }]
                },
                { "handler": "hintUserHdl", "hintList": [] }
            ]
        })
    );
    assert_eq!(app.bean("/audited"), before);
    assert!(app.log.lock().is_empty());
}

#[test]
fn results_resolve_on_the_page_before_the_document() {
    let app = App::new();

    let body = app.post("/acct/toDocument", &[(params::DOCUMENT, "/main")]);
    assert_eq!(handlers(&body), vec!["loadContentHdl", "hintUserHdl", "refreshMenuHdl"]);
    assert_eq!(body["jsonResp"][0]["path"], "/main");
    assert_eq!(body["jsonResp"][0]["commandPath"], "/main/command");

    let body = app.post("/acct/noResult", &[(params::DOCUMENT, "/main")]);
    assert_eq!(body, json!({ "jsonResp": [] }));
}

#[test]
fn unmapped_results_render_the_system_error_page() {
    let app = App::new();

    let body = app.post("/acct/toDocument", &[(params::REMOTE_VIEWER, "tv-1")]);
    assert_eq!(handlers(&body)[0], "showSystemErrorHdl");
    assert!(body["jsonResp"][0]["message"]
        .as_str()
        .expect("message")
        .contains("docOnly"));
}

#[test]
fn read_only_pages_never_change() {
    let app = App::new();
    app.post("/report/noResult", &[]);
    let before = app.bean("/report");

    app.post("/report/noResult", &[("name", "Mallory"), ("note", "x")]);
    assert_eq!(app.bean("/report"), before);
}

#[test]
fn reset_on_write_discards_previous_state() {
    let app = App::new();
    app.post("/search/noResult", &[("note", "first")]);
    assert_eq!(app.bean("/search"), json!({ "status": "fresh", "note": "first" }));

    app.post("/search/noResult", &[("name", "second")]);
    assert_eq!(app.bean("/search"), json!({ "status": "fresh", "name": "second" }));
}

#[test]
fn closing_a_single_page_only_touches_its_own_entry() {
    let app = App::new();
    app.open("/acct:1");
    app.open("/acct:2");

    let body = app.post("/acct:2/closePage", &[(params::DOCUMENT, "/main")]);
    assert_eq!(body["jsonResp"][0]["closed"], json!(["/acct:2"]));
    assert_eq!(app.panel(), vec!["/acct:1"]);
    assert!(app.session.page(&PathId::from("/acct:2")).is_none());
    assert!(app.session.page(&PathId::from("/acct:1")).is_some());

    let body = app.post("/acct:9/closePage", &[(params::DOCUMENT, "/main")]);
    assert_eq!(body["jsonResp"][0]["closed"], json!([]));
    assert_eq!(app.panel(), vec!["/acct:1"]);
}

#[test]
fn close_all_cascades_and_runs_deferred_close_hooks() {
    let app = App::new();
    for path in ["/acct:1", "/acct:2", "/acct:3"] {
        app.open(path);
    }

    app.post(
        "/acct:2/closePage",
        &[(params::DOCUMENT, "/main"), (params::TARGET_VALUE, "closeall")],
    );

    assert_eq!(
        *app.log.lock(),
        vec!["close /acct:2".to_string(), "close /acct:3".to_string()]
    );
    assert_eq!(app.panel(), vec!["/acct:1"]);
    assert!(app.session.page(&PathId::from("/acct:3")).is_none());
}

#[test]
fn sticky_paths_replay_in_order_after_open() {
    let app = App::new();
    app.open("/acct:1");
    app.post("/acct:1/pin", &[(params::DOCUMENT, "/main")]);

    let body = app.post("/acct:2/openPage", &[(params::DOCUMENT, "/main")]);

    assert_eq!(
        *app.log.lock(),
        vec!["mark /ledger:a".to_string(), "mark /ledger:b".to_string()]
    );
    assert_eq!(app.panel(), vec!["/acct:1", "/acct:2"]);
    assert_eq!(body["jsonResp"][0]["path"], "/acct:2");
    assert_eq!(body["scrollReset"], true);
}

#[test]
fn cross_controller_helpers_run_after_the_page_is_released() {
    let app = App::new();
    app.post("/ledger:a/noResult", &[]);

    app.post("/acct/rename", &[]);

    assert_eq!(app.bean("/ledger:a")["owner"], "acct");
    assert_eq!(*app.log.lock(), vec!["mark /ledger:a".to_string()]);
}

#[test]
fn secured_pages_require_a_signed_in_session() {
    let app = App::new();

    let request = ClientRequest::new("/vault", RequestParams::new());
    let response = app
        .dispatcher
        .process(&app.session, &request)
        .expect("unauthorized page");
    assert_eq!(response.content_type(), Some("text/html"));
    assert!(response.body().contains("/unauthorized"));
    assert_eq!(
        app.session.attribute(session_attrs::LOGIN_REQUIRED),
        Some(json!(true))
    );

    app.session.set_authenticated(true);
    let response = app
        .dispatcher
        .process(&app.session, &request)
        .expect("vault page");
    assert!(response.body().contains("/vault"));
}

#[test]
fn embedded_failures_use_the_system_error_page() {
    let app = App::new();

    let body = app.post("/missing/openPage", &[(params::DOCUMENT, "/main")]);
    let fragment = &body["jsonResp"][0];
    assert_eq!(fragment["handler"], "showSystemErrorHdl");
    assert_eq!(fragment["loginRequired"], true);
    assert_eq!(fragment["stackTrace"], Value::Null);
}

#[test]
fn reload_results_run_the_load_hook_before_responding() {
    let app = App::new();
    app.post("/feed/noResult", &[]);
    assert!(app.log.lock().is_empty());

    let body = app.post("/feed/refresh", &[]);

    assert_eq!(*app.log.lock(), vec!["load /feed".to_string()]);
    assert_eq!(handlers(&body), vec!["reloadContentHdl", "hintUserHdl"]);
    assert_eq!(body["jsonResp"][0]["path"], "/feed");
    assert_eq!(body["jsonResp"][1]["hintList"][0]["message"], "feed reloaded");
}

#[test]
fn huge_row_indices_are_skipped_without_touching_the_bean() {
    let app = App::new();

    let body = app.post(
        "/acct/savePage",
        &[
            ("name_18446744073709551615", "x"),
            ("name_4000000000", "y"),
            ("name_100000", "z"),
        ],
    );

    assert_eq!(handlers(&body)[0], "refreshPanelHdl");
    assert_eq!(app.bean("/acct")["name"], "unset");
    assert_eq!(*app.log.lock(), vec!["save /acct".to_string()]);
}

#[test]
fn opened_content_carries_its_command_path_and_save_list() {
    let app = App::new();

    let body = app.post("/acct:3/openPage", &[(params::DOCUMENT, "/main")]);

    assert_eq!(handlers(&body)[0], "loadContentHdl");
    assert_eq!(body["jsonResp"][0]["path"], "/acct:3");
    assert_eq!(body["jsonResp"][0]["commandPath"], "/acct:3/command");
    assert_eq!(body["jsonResp"][0]["onSaveList"], json!(["acctForm.note"]));

    let body = app.post("/acct:3/toDocument", &[(params::DOCUMENT, "/main")]);
    assert_eq!(body["jsonResp"][0]["onSaveList"], json!([]));
}
