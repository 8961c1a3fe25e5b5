use serde_json::Value;
use session::{ComponentTree, Field, MapBean};
use shared::domain::SessionId;

use super::*;
use crate::{
    context::HintMode,
    generators::{HintUser, RefreshMenu},
    test_support::parts,
};

struct Fixed(&'static str);

impl ResponseGenerator for Fixed {
    fn name(&self) -> &str {
        self.0
    }

    fn generate(
        &self,
        writer: &mut ResponseWriter,
        _ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        writer.write(self.0);
        Ok(())
    }
}

struct Failing;

impl ResponseGenerator for Failing {
    fn name(&self) -> &str {
        "failing"
    }

    fn generate(
        &self,
        _writer: &mut ResponseWriter,
        _ctx: &mut GenerateContext<'_>,
    ) -> Result<(), DispatchError> {
        Err(DispatchError::Generation("boom".into()))
    }
}

fn page(components: ComponentTree) -> PageInstance {
    PageInstance::new(
        parts("/acct"),
        Box::new(MapBean::new().with("name", "Ada")),
        components,
    )
}

#[test]
fn markup_output_is_concatenated() {
    let session = Session::new(SessionId::from("s"));
    let page = page(ComponentTree::new());
    let mut rc = RequestContext::default();
    let mapping = ResultMapping::html("print").with(Fixed("<p>")).with(Fixed("</p>"));
    let mut writer = ResponseWriter::new();

    let mut ctx = GenerateContext {
        page: &page,
        request: &mut rc,
        session: &session,
    };
    assemble(&mut writer, &mapping, &mut ctx).expect("assemble");
    assert_eq!(writer.as_str(), "<p></p>");
}

#[test]
fn data_exchange_output_is_wrapped_with_auxiliary_fields() {
    let session = Session::new(SessionId::from("s"));
    let components = ComponentTree::new()
        .with(Field::new("acctForm.name", "name").referencing("acctForm.total"))
        .with(Field::new("acctForm.total", "total"))
        .always_pushing("acctForm.name");
    let page = page(components);
    let mut rc = RequestContext::new(Some("viewer-1".into()));
    rc.set_scroll_reset();
    rc.add_hint(HintMode::Info, "saved");
    let mapping = ResultMapping::json("save").with(HintUser).with(RefreshMenu);
    let mut writer = ResponseWriter::new();

    let mut ctx = GenerateContext {
        page: &page,
        request: &mut rc,
        session: &session,
    };
    assemble(&mut writer, &mapping, &mut ctx).expect("assemble");

    let body: Value = serde_json::from_str(writer.as_str()).expect("valid json");
    let handlers: Vec<&str> = body["jsonResp"]
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|fragment| fragment["handler"].as_str())
        .collect();
    assert_eq!(handlers, vec!["hintUserHdl", "refreshMenuHdl"]);
    assert_eq!(body["jsonResp"][0]["hintList"][0]["message"], "saved");
    assert_eq!(body["allPush"], serde_json::json!(["acctForm.name", "acctForm.total"]));
    assert_eq!(body["remoteView"]["view"], "viewer-1");
    assert_eq!(body["scrollReset"], true);
    assert!(rc.hints().is_empty());
}

#[test]
fn empty_envelope_has_only_the_response_array() {
    let session = Session::new(SessionId::from("s"));
    let page = page(ComponentTree::new());
    let mut rc = RequestContext::default();
    let mut writer = ResponseWriter::new();

    let mut ctx = GenerateContext {
        page: &page,
        request: &mut rc,
        session: &session,
    };
    assemble(&mut writer, &ResultMapping::json("none"), &mut ctx).expect("assemble");
    assert_eq!(writer.as_str(), "{\"jsonResp\":[]}");
}

#[test]
fn generator_failure_aborts_assembly() {
    let session = Session::new(SessionId::from("s"));
    let page = page(ComponentTree::new());
    let mut rc = RequestContext::default();
    let mapping = ResultMapping::json("broken").with(Fixed("{}")).with(Failing);
    let mut writer = ResponseWriter::new();

    let mut ctx = GenerateContext {
        page: &page,
        request: &mut rc,
        session: &session,
    };
    let err = assemble(&mut writer, &mapping, &mut ctx).expect_err("must fail");
    assert!(matches!(err, DispatchError::Generation(_)));
}

#[test]
fn pooled_writers_come_back_empty() {
    let pool = WriterPool::new(1);
    {
        let mut writer = pool.acquire();
        writer.write("first");
        let mut second = pool.acquire();
        second.write("second");
    }
    assert_eq!(pool.idle_count(), 1);
    let writer = pool.acquire();
    assert!(writer.is_empty());
    assert_eq!(pool.idle_count(), 0);
}
