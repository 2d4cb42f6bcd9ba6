use pretty_assertions::assert_eq;
use pyliquid::{Config, ErrorKind, Object, Template, Value};
use serde_json::{Value as Json, json};
use std::collections::HashMap;

fn render(source: &str, vars: Json) -> String {
    Template::new(source, Config::python())
        .unwrap()
        .render(&vars)
        .unwrap()
}

fn py(source: &str) -> String {
    render(source, json!({}))
}

/// Attribute-only host object, the python `Diot`.
#[derive(Debug)]
struct Attrs(HashMap<String, Value>);

impl Object for Attrs {
    fn type_name(&self) -> &str {
        "Attrs"
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

#[test]
fn test_op() {
    assert_eq!(py("{% if 1 in (1,) %}1{% endif %}"), "1");
    assert_eq!(py("{% unless 1 not in (1,) %}1{% endunless %}"), "1");
    assert_eq!(py("{% unless 1 is 1 %}1{% else %}2{% endunless %}"), "2");
    assert_eq!(py("{% unless 1 is not 1 %}1{% else %}2{% endunless %}"), "1");
}

#[test]
fn test_comment() {
    assert_eq!(py("{# whatever #}"), "");
    assert_eq!(py("a{% comment %}{{ not parsed }}{% endcomment %}b"), "ab");
}

#[test]
fn test_assign() {
    assert_eq!(py("{% assign x = 1 %}{{x}}"), "1");
    assert_eq!(render("{% assign x = y[0] %}{{x}}", json!({"y": [1, 2, 3]})), "1");
    assert_eq!(render("{% assign x = y[0:] %}{{x[0]}}", json!({"y": [1, 2, 3]})), "1");
    assert_eq!(py("{% assign x = [1,2,3] %}{{x[0]}}"), "1");
    assert_eq!(py("{% assign x = [1] %}{{x[0]}}"), "1");
    assert_eq!(py("{% assign x = (1,2,3) %}{{x[0]}}"), "1");
    assert_eq!(py("{% assign x = {1,2,3} %}{{list(x)[0]}}"), "1");
    assert_eq!(py("{% assign x = {1,2,3} %}{{ x | len }}"), "3");
    assert_eq!(py("{% assign x = {'a':1, 'b':2, 'c':3} %}{{x['a']}}"), "1");
    assert_eq!(render("{% assign x = a - 1 %}{{x}}", json!({"a": 2})), "1");
    assert_eq!(render("{% assign x = a ** 3 %}{{x}}", json!({"a": 2})), "8");
}

#[test]
fn test_if_else() {
    assert_eq!(py("{% if False %}1{%else %}2{%endif %}"), "2");
    let tpl = Template::new(
        "{% if False %}1{%else if False %}2{% else%}3{%endif %}",
        Config::python().debug(true),
    )
    .unwrap();
    assert_eq!(tpl.render(&()).unwrap(), "3");
}

#[test]
fn test_elif() {
    for (a, b, want) in [(1, 0, "a"), (0, 1, "b"), (0, 0, "")] {
        let vars = json!({"a": a, "b": b});
        assert_eq!(render("{% if a %}a{% elif b %}b{% endif %}", vars.clone()), want);
        assert_eq!(render("{% if a %}a{% elsif b %}b{% endif %}", vars), want);
    }
}

#[test]
fn test_output() {
    assert_eq!(py("{{[1,2][1 if True else 2]}}"), "2");
    assert_eq!(py("{{[1,2,3][1 if False else 2]}}"), "3");
    assert_eq!(py("{{[1,2,3][0 or 2]}}"), "3");
    assert_eq!(py("{{[1,2,3][0 or 0]}}"), "1");
    assert_eq!(py("{{[1,2,3][1 and 0]}}"), "1");
    assert_eq!(py("{{[1,2,3][1 and 2]}}"), "3");
    assert_eq!(py("{{[1,2,3][(not True) or 2]}}"), "3");
    assert_eq!(py("{{ 1 and 2 }}|{{ 0 or 2 }}|{{ 1 if True else 2 }}"), "2|2|1");
}

#[test]
fn test_member_access() {
    let tpl = Template::new("{{a.a}}", Config::python()).unwrap();
    let object = Value::from_object(Attrs(HashMap::from([("a".to_string(), Value::Int(1))])));
    let vars = HashMap::from([("a".to_string(), object)]);
    assert_eq!(tpl.render_with(vars).unwrap(), "1");
    assert_eq!(tpl.render(&json!({"a": {"a": 1}})).unwrap(), "1");

    let err = tpl.render(&json!({"a": {}})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert!(err.message().contains("'a'"));

    let err = Template::new("{{1 | no_such_filter}}", Config::python())
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
}

#[test]
fn test_expr() {
    let cases = [
        ("{{[1,2][1 || 1]}}", "2"),
        ("{{[1,2][1 & 1]}}", "2"),
        ("{{[1,2][1 ^ 1]}}", "1"),
        ("{{[1,2,3][1 << 1]}}", "3"),
        ("{{[1,2,3][1 >> 1]}}", "1"),
        ("{{[1,2,3][1 + 1]}}", "3"),
        ("{{[1,2,3][1 - 1]}}", "1"),
        ("{{[1,2,3][int(1 / 1)]}}", "2"),
        ("{{[1,2,3][1 // 1]}}", "2"),
        ("{{[1,2,3][1 % 1]}}", "1"),
        ("{{[1,2,3][1 * 1]}}", "2"),
        ("{{[1,2,3][1 ** 1]}}", "2"),
        ("{{[1,2,3][~-1]}}", "1"),
        ("{{[1,2,3][+1]}}", "2"),
        ("{{list()}}", "[]"),
        ("{{ 10 / 4 }}", "2.5"),
        ("{{ -7 % 3 }}", "2"),
        ("{{ 'ab' * 2 }}", "abab"),
        ("{{ [1, 2] + [3] }}", "[1, 2, 3]"),
        ("{{ 'hello'[::-1] }}", "olleh"),
        ("{{ 'b' in 'abc' if True else 0 }}", "True"),
    ];
    for (source, want) in cases {
        assert_eq!(py(source), want, "{}", source);
    }
    assert_eq!(render("{{a > 0}}", json!({"a": 1})), "True");
}

#[test]
fn test_collections() {
    assert_eq!(py("{{()}}"), "()");
    assert_eq!(py("{{[]}}"), "[]");
    assert_eq!(py("{{ {} }}"), "{}");
    assert_eq!(py("{{ (1,) }}"), "(1,)");
    assert_eq!(py("{{ {'a': 1} }}"), "{'a': 1}");
    assert_eq!(py("{{ {1, 2} }}"), "{1, 2}");
    assert_eq!(py("{{ None }} {{ True }} {{ 1.0 }}"), "None True 1.0");
    assert_eq!(py("{{ ['a', 1] }}"), "['a', 1]");
}

#[test]
fn test_else_following() {
    let err = Template::new("{%if False%}{%else%}{%else%}{%endif%}", Config::python()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.to_string().contains("No tags allowed after"));
}

#[test]
fn test_for() {
    assert_eq!(py("{% for i in range(3) %}{{i}}{% endfor %}"), "012");

    let continue_first = "{% for i in range(3) -%}
        {% if i == 0 %}{% continue %}{% endif %}{{i}}
        {%- endfor -%}
    ";
    assert_eq!(py(continue_first), "12");

    let break_second = "{% for i in range(3) -%}
        {% if i == 1 %}{% break %}{% endif %}{{i}}
        {%- endfor -%}
    ";
    assert_eq!(py(break_second), "0");

    let with_else = "{% for i in range(3) -%}
        {{i}}
        {%- else -%}x
        {%- endfor -%}
    ";
    assert_eq!(py(with_else), "012x");

    let break_skips_else = "{% for i in range(3) -%}
        {{i}}{% break %}
        {%- else -%}x
        {%- endfor -%}
    ";
    assert_eq!(py(break_skips_else), "0");

    assert_eq!(py("{% for i in [] %}{{i}}{% else %}x{% endfor %}"), "x");
    assert_eq!(py("{% for i in [1] %}{{i}}{% break %}{% else %}x{% endfor %}"), "1");
}

#[test]
fn test_for_unpacking_and_loop_info() {
    let out = render(
        "{% for k, v in d.items() %}{{ loop.index }}{{k}}={{v}};{% endfor %}",
        json!({"d": {"a": 1, "b": 2}}),
    );
    assert_eq!(out, "1a=1;2b=2;");
    assert_eq!(
        py("{% for i, c in enumerate('ab') %}{{i}}{{c}}{% if not loop.last %},{% endif %}{% endfor %}"),
        "0a,1b"
    );
    let err = Template::new("{% for a, b in [(1, 2, 3)] %}{% endfor %}", Config::python())
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
}

#[test]
fn test_while() {
    let completes = "
    {% assign x = 2 %}
    {% while x > 0 -%}
        {{- x -}}
        {%assign x = x - 1 -%}
    {% else -%}9
    {%- endwhile -%}
    ";
    assert_eq!(py(completes).trim(), "219");

    let breaks = "
    {% assign x = 2 %}
    {% while x > 0 -%}
        {{- x -}}
        {% if x == 1 %}{%break %}{%endif -%}
        {%assign x = x - 1 -%}
    {% else -%}9
    {%- endwhile -%}
    ";
    assert_eq!(py(breaks).trim(), "21");
}

#[test]
fn test_loop_scope() {
    // the loop variable lives in the per-iteration frame only
    let err = Template::new("{% for i in range(2) %}{% endfor %}{{ i }}", Config::python())
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.message(), "name 'i' is not defined");
    // assign inside a loop reaches the global frame
    assert_eq!(
        py("{% for i in range(3) %}{% assign last = i %}{% endfor %}{{ last }}"),
        "2"
    );
}

#[test]
fn test_builtin_calls_and_methods() {
    assert_eq!(py("{{ len([1, 2]) }} {{ sum(range(4)) }} {{ max(3, 9, 2) }}"), "2 6 9");
    assert_eq!(py("{{ sorted([3, 1, 2]) }}"), "[1, 2, 3]");
    assert_eq!(py("{{ 'a-b'.split('-') | join: '+' }}"), "a+b");
    assert_eq!(py("{{ ', '.join(['x', 'y']) }}"), "x, y");
    assert_eq!(py("{{ {'k': 1}.get('z', 0) }}"), "0");
    assert_eq!(py("{{ [3, 1] | sorted }}"), "[1, 3]");
    assert_eq!(py("{{ 'Hi' | upper }}"), "HI");
    let err = Template::new("{{ 5 | len }}", Config::python())
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.message(), "object of type 'int' has no len()");
}

#[test]
fn test_identity_and_overflow() {
    assert_eq!(py("{{ [] is [] }} {{ None is None }} {{ 'a' is 'a' }}"), "False True True");
    assert_eq!(py("{{ len is len }}"), "True");
    assert_eq!(py("{{ [1,2,3][1::9223372036854775807] }}"), "[2]");
    let err = Template::new("{{ enumerate([1, 2], 9223372036854775807) }}", Config::python())
        .unwrap()
        .render(&())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(err.message(), "integer overflow");
}

#[test]
fn test_echo_and_counters() {
    assert_eq!(py("{% echo 1 + 1 %}{% print 'x' %}"), "2x");
    assert_eq!(py("{% increment n %}{% increment n %}"), "01");
}
