use pretty_assertions::assert_eq;
use pyliquid::tags::{ControlSignal, Tag, TagDescriptor};
use pyliquid::tpl::ast::TagNode;
use pyliquid::tpl::render_context::RenderContext;
use pyliquid::{Config, ErrorKind, Mode, Result, Template, tag_manager};
use serde_json::json;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_syntax_errors_carry_offsets() {
    init_tracing();
    let cases = [
        ("ab{% foo %}", 2),
        ("ab{{ x", 2),
        ("ab{# note", 2),
        ("{% if x %}ab", 0),
        ("abc{% endif %}", 3),
    ];
    for (source, offset) in cases {
        let err = Template::new(source, Mode::Standard).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax, "{}", source);
        assert_eq!(err.offset(), Some(offset), "{}: {}", source, err);
    }
    let err = Template::new("{% for i in range(3) %}{% endif %}", Config::python()).unwrap_err();
    assert!(err.message().contains("Mismatched closing tag"), "{}", err);
    let err = Template::new("{% break %}", Config::python()).unwrap_err();
    assert!(err.message().contains("outside of"), "{}", err);

    // loop control in a loop's else clause would cut the output short
    let err = Template::new("a{% for i in [] %}{% else %}{% break %}{% endfor %}b", Mode::Standard)
        .unwrap_err();
    assert_eq!(err.message(), "'break' outside of 'for' or 'while'");
    assert_eq!(err.offset(), Some(28));
    let err = Template::new(
        "a{% while False %}{% else %}{% continue %}{% endwhile %}b",
        Config::python(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "'continue' outside of 'for' or 'while'");
}

#[test]
fn test_render_errors_carry_offsets() {
    let err = Template::new("ab{{ x }}", Mode::Standard)
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(err.offset(), Some(2));
    assert_eq!(err.message(), "name 'x' is not defined");

    let err = Template::new("abc{% if y %}{{ 1 | nope }}{% endif %}", Config::python())
        .unwrap()
        .render(&json!({"y": true}))
        .unwrap_err();
    assert_eq!(err.offset(), Some(13));
    assert!(err.message().contains("nope"), "{}", err);

    let err = Template::new("{{ 1 // 0 }}", Config::python())
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert!(err.message().contains("division by zero"));

    let err = Template::new("{{ x }}", Mode::Standard)
        .unwrap()
        .render(&json!([1, 2]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
}

#[test]
fn test_template_shared_across_threads() {
    init_tracing();
    let tpl = Arc::new(
        Template::new(
            "{% for i in range(n) %}{{ i }}{% endfor %}{% increment c %}",
            Config::python().debug(true),
        )
        .unwrap(),
    );
    let handles: Vec<_> = (0..8)
        .map(|n| {
            let tpl = Arc::clone(&tpl);
            thread::spawn(move || {
                let mut outs = Vec::new();
                for _ in 0..20 {
                    outs.push(tpl.render(&json!({ "n": n })).unwrap());
                }
                (n, outs)
            })
        })
        .collect();
    for handle in handles {
        let (n, outs) = handle.join().unwrap();
        let digits: String = (0..n).map(|i| i.to_string()).collect();
        // counters start over on every render
        let want = format!("{}0", digits);
        assert!(outs.iter().all(|o| *o == want), "{:?}", outs);
    }
}

struct Mark(&'static str);

impl Tag for Mark {
    fn render(&self, _: &TagNode, _: &mut RenderContext, out: &mut String) -> Result<ControlSignal> {
        out.push_str(self.0);
        Ok(ControlSignal::Normal)
    }
}

const MARKS: [&str; 6] = ["mark_a", "mark_b", "mark_c", "mark_d", "mark_e", "mark_f"];

#[test]
fn test_registry_mutation_while_parsing() {
    let writers: Vec<_> = MARKS
        .iter()
        .map(|&name| {
            thread::spawn(move || {
                for _ in 0..50 {
                    tag_manager()
                        .register(name, Mode::Python, TagDescriptor::new(Mark(name)).void())
                        .unwrap();
                    let tpl = Template::new(&format!("{{% {} %}}", name), Config::python()).unwrap();
                    assert_eq!(tpl.render(&()).unwrap(), name);
                    tag_manager().unregister(name, Mode::Python).unwrap();
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                for _ in 0..100 {
                    let tpl = Template::new(
                        "{% if x %}{% for i in [1, 2] %}{{ i }}{% endfor %}{% endif %}",
                        Config::python(),
                    )
                    .unwrap();
                    assert_eq!(tpl.render(&json!({"x": 1})).unwrap(), "12");
                }
            })
        })
        .collect();
    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }
    for name in MARKS {
        assert!(!tag_manager().contains(name, Mode::Python));
    }
}
