use pretty_assertions::assert_eq;
use pyliquid::tags::{ControlSignal, Tag, TagDescriptor};
use pyliquid::tpl::ast::{TagArgs, TagNode};
use pyliquid::tpl::render_context::RenderContext;
use pyliquid::{Config, ErrorKind, Mode, Result, Template, tag_manager};
use serde_json::json;
use std::sync::Arc;

/// Echoes the bare word after the tag name instead of evaluating it.
#[pyliquid::tag("print,echo", mode = "python", void = true, start = "varname")]
#[derive(Default)]
struct TagEcho;

impl Tag for TagEcho {
    fn render(&self, node: &TagNode, _ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        if let TagArgs::VarName(name) = &node.args {
            out.push_str(name);
        }
        Ok(ControlSignal::Normal)
    }
}

#[test]
fn test_register_tag_macro() {
    let descriptor = tag_manager().register_tag::<TagEcho>().unwrap();
    assert_eq!(descriptor.names, vec!["print".to_string(), "echo".to_string()]);
    assert!(descriptor.void);
    assert!(!descriptor.is_protected());

    let tpl = Template::new("{% echo abc %}", Config::python()).unwrap();
    assert_eq!(tpl.render(&()).unwrap(), "abc");
    let tpl = Template::new("{% print abc %}", Config::python()).unwrap();
    assert_eq!(tpl.render(&()).unwrap(), "abc");

    // the standard dialect keeps its built-in echo
    let tpl = Template::new("{% echo 'abc' | upper %}", Mode::Standard).unwrap();
    assert_eq!(tpl.render(&()).unwrap(), "ABC");

    let removed = tag_manager().unregister("echo", Mode::Python).unwrap();
    assert!(Arc::ptr_eq(&removed, &descriptor));
    let err = Template::new("{% echo abc %}", Config::python()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    let tpl = Template::new("{% print abc %}", Config::python()).unwrap();
    assert_eq!(tpl.render(&()).unwrap(), "abc");

    let err = tag_manager().unregister("print", Mode::Standard).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registry);
    let err = tag_manager().unregister("echo", Mode::Python).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registry);
}

/// Renders its body in upper case.
struct Upcase;

impl Tag for Upcase {
    fn render(&self, node: &TagNode, ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        let mut body = String::new();
        let signal = node.render_body(ctx, &mut body)?;
        out.push_str(&body.to_uppercase());
        Ok(signal)
    }
}

#[test]
fn test_register_block_tag() {
    tag_manager()
        .register("upcase", Mode::Standard, TagDescriptor::new(Upcase))
        .unwrap();
    let tpl = Template::new("{% upcase %}hi {{ name }}{% endupcase %}!", Mode::Standard).unwrap();
    assert_eq!(tpl.render(&json!({"name": "bob"})).unwrap(), "HI BOB!");

    let err = Template::new("{% upcase %}hi", Mode::Standard).unwrap_err();
    assert!(err.message().contains("endupcase"), "{}", err);
    let err = Template::new("{% upcase now %}{% endupcase %}", Mode::Standard).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(!tag_manager().contains("upcase", Mode::Python));
}

#[test]
fn test_register_rejects_bad_names() {
    for names in ["", " , ", "endthing", "two words", "9lives"] {
        let err = tag_manager()
            .register(names, Mode::Python, TagDescriptor::new(Upcase))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Registry, "{:?}", names);
    }
    let err = tag_manager().unregister("never_registered", Mode::Python).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registry);
}

/// Writes its head text back untouched.
#[pyliquid::tag("verbatim", void = true, start = "raw")]
#[derive(Default)]
struct Verbatim;

impl Tag for Verbatim {
    fn render(&self, node: &TagNode, _ctx: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        if let TagArgs::Raw(head) = &node.args {
            out.push_str(head);
        }
        Ok(ControlSignal::Normal)
    }
}

#[test]
fn test_raw_head_is_not_parsed() {
    tag_manager().register_tag::<Verbatim>().unwrap();
    let tpl = Template::new("[{% verbatim a + b | c: ( %}][{% verbatim %}]", Mode::Standard).unwrap();
    assert_eq!(tpl.render(&()).unwrap(), "[a + b | c: (][]");
    assert!(!tag_manager().contains("verbatim", Mode::Python));
}
