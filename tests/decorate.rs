use std::sync::Arc;

use hintcheck::compile::Registry;
use hintcheck::prelude::*;
use hintcheck::hint::Origin;
use hintcheck::value::{ClassRef, BOOL, FLOAT, INT, STR};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn decorator(conf: Conf) -> Decorator {
    Decorator::with_registry(conf, Registry::new())
}

fn first(args: &Args) -> Value {
    args.positional.first().cloned().unwrap_or(Value::None)
}

fn violation(err: Error) -> Violation {
    match err {
        Error::Violation(violation) => *violation,
        other => panic!("expected a violation, got {:?}", other),
    }
}

#[test]
fn test_identity_on_int() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", Hint::of(&INT)))
        .returns(Hint::of(&INT));
    let f = decorate(&f, &Conf::default()).unwrap();

    assert_eq!(f.call_with([Value::Int(5)]).unwrap(), Value::Int(5));

    let v = violation(f.call_with([Value::str("a")]).unwrap_err());
    assert_eq!(v.kind, ViolationKind::Param);
    assert_eq!(v.pith_name, "x");
    assert_eq!(v.culprits[0].repr, "'a'");
    assert!(v.to_string().starts_with("Function f() parameter x='a' violates type hint int"));
}

#[test]
fn test_union_param_and_str_return() {
    let ns = Namespace::new("demo");
    let g = Function::new("g", &ns, |args: &Args| Ok(Value::str(first(args).to_string())))
        .param(Param::positional("x", parse_hint("Union[int, str]", &ns).unwrap()))
        .returns(Hint::of(&STR));
    let g = decorate(&g, &Conf::default()).unwrap();

    assert_eq!(g.call_with([Value::Int(3)]).unwrap(), Value::str("3"));
    assert_eq!(g.call_with([Value::str("x")]).unwrap(), Value::str("'x'"));

    let v = violation(g.call_with([Value::Float(3.0)]).unwrap_err());
    assert_eq!(v.hint, "Union[int, str]");
    assert_eq!(v.cause, "float 3.0 not int, str");
}

#[rstest]
#[case(0, None)]
#[case(1, None)]
#[case(2, Some("list index 2 item str 'bad' not instance of int"))]
fn test_sampled_list_items(#[case] random: u32, #[case] cause: Option<&str>) {
    let ns = Namespace::new("demo");
    let h = Function::new("h", &ns, |args: &Args| {
        Ok(Value::Int(first(args).len().unwrap_or(0) as i64))
    })
    .param(Param::positional("xs", parse_hint("List[int]", &ns).unwrap()))
    .returns(Hint::of(&INT));
    let conf = Conf::default().with_index_source(FixedSource(random));
    let h = decorator(conf).decorate(&h).unwrap();

    let good = Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert_eq!(h.call_with([good]).unwrap(), Value::Int(3));

    let mixed = Value::list([Value::Int(1), Value::Int(2), Value::str("bad")]);
    match cause {
        None => assert_eq!(h.call_with([mixed]).unwrap(), Value::Int(3)),
        Some(cause) => {
            let v = violation(h.call_with([mixed]).unwrap_err());
            assert_eq!(v.cause, cause);
            assert_eq!(v.culprits.len(), 2);
            assert_eq!(v.culprits[1].repr, "'bad'");
        },
    }
}

#[test]
fn test_full_sampling_finds_every_bad_item() {
    let ns = Namespace::new("demo");
    let h = Function::new("h", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("xs", Hint::list(Hint::of(&INT))));
    let h = decorator(Conf::full()).decorate(&h).unwrap();
    let mixed = Value::list([Value::Int(1), Value::str("bad"), Value::Int(3)]);
    let v = violation(h.call_with([mixed]).unwrap_err());
    assert_eq!(v.cause, "list index 1 item str 'bad' not instance of int");
}

#[test]
fn test_redecoration_is_idempotent() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", Hint::of(&INT)));
    let decorator = decorator(Conf::default());
    let once = decorator.decorate(&f).unwrap();
    let twice = decorator.decorate(&once).unwrap();
    assert!(once.is_wrapper());
    assert!(twice.is_same(&once));
    assert!(once.wrappee().unwrap().is_same(&f));
}

#[test]
fn test_unhinted_functions_are_returned_unchanged() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::new("x", ParamKind::PositionalOrKeyword))
        .param(Param::positional("y", Hint::Any))
        .returns(Hint::Any);
    let decorated = decorate(&f, &Conf::default()).unwrap();
    assert!(decorated.is_same(&f));
    assert!(!decorated.is_wrapper());
}

#[test]
fn test_wrapper_keeps_metadata() {
    let ns = Namespace::new("demo");
    let f = Function::new("area", &ns, |args: &Args| Ok(first(args)))
        .qualname("Shape.area")
        .doc("Area of the shape.")
        .param(Param::positional("self_", Hint::Any))
        .returns(Hint::of(&FLOAT));
    let wrapper = decorate(&f, &Conf::default()).unwrap();
    assert_eq!(wrapper.meta().name, "area");
    assert_eq!(wrapper.meta().qualname, "Shape.area");
    assert_eq!(wrapper.meta().doc.as_deref(), Some("Area of the shape."));
    assert_eq!(wrapper.params().len(), 1);
    assert_eq!(wrapper.params()[0].name, "self_");

    let v = violation(wrapper.call_with([Value::str("x")]).unwrap_err());
    assert_eq!(v.kind, ViolationKind::Return);
    assert_eq!(v.func, "Shape.area");
}

#[test]
fn test_forward_references_resolve_once() {
    let ns = Namespace::new("shapes");
    let f = Function::new("scale", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("shape", Hint::forward("Circle", &ns)));
    let f = decorator(Conf::default()).decorate(&f).unwrap();

    // Undefined at call time: resolution fails, and is retried next call.
    assert!(matches!(
        f.call_with([Value::Int(1)]),
        Err(Error::ForwardRefUnresolved { .. })
    ));

    let circle: ClassRef = Class::new("Circle", "shapes").member("radius").build();
    ns.define_class(&circle);
    let lookups = ns.lookups();

    let shape = Value::instance(&circle);
    for _ in 0..5 {
        assert!(f.call_with([shape.clone()]).unwrap().is_same(&shape));
    }
    assert_eq!(ns.lookups(), lookups + 1);

    let v = violation(f.call_with([Value::Int(1)]).unwrap_err());
    assert_eq!(v.hint, "'Circle'");
    assert_eq!(v.cause, "int 1 not instance of shapes.Circle");
}

#[test]
fn test_recursive_forward_references_terminate() {
    let ns = Namespace::new("trees");
    ns.define("Tree", Hint::list(Hint::forward("Tree", &ns)));
    let f = Function::new("walk", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("tree", Hint::forward("Tree", &ns)));
    let f = decorator(Conf::full()).decorate(&f).unwrap();

    let leaf = Value::list(Vec::new());
    let tree = Value::list([leaf.clone(), Value::list([leaf])]);
    assert!(f.call_with([tree]).is_ok());
    assert!(f.call_with([Value::list([Value::Int(1)])]).is_err());
}

#[test]
fn test_noreturn_always_raises_on_return() {
    let ns = Namespace::new("demo");
    let f = Function::new("halt", &ns, |_: &Args| Ok(Value::None)).returns(Hint::NoReturn);
    let f = decorate(&f, &Conf::default()).unwrap();
    let v = violation(f.call(&Args::new()).unwrap_err());
    assert_eq!(v.kind, ViolationKind::Return);
    assert_eq!(v.hint, "NoReturn");

    let g = Function::new("fail", &ns, |_: &Args| Err(Error::from("boom"))).returns(Hint::NoReturn);
    let g = decorate(&g, &Conf::default()).unwrap();
    assert!(matches!(g.call(&Args::new()), Err(Error::Raised(msg)) if msg == "boom"));
}

#[test]
fn test_var_positional_checks_each_argument() {
    let ns = Namespace::new("demo");
    let f = Function::new("total", &ns, |args: &Args| {
        let mut sum = 0;
        for value in &args.positional[1..] {
            if let Value::Int(i) = value {
                sum += i;
            }
        }
        Ok(Value::Int(sum))
    })
    .param(Param::positional("label", Hint::of(&STR)))
    .param(Param::new("values", ParamKind::VarPositional).hinted(Hint::of(&INT)));
    let f = decorate(&f, &Conf::default()).unwrap();

    let ok = Args::new().arg("sum").arg(1).arg(2).arg(3);
    assert_eq!(f.call(&ok).unwrap(), Value::Int(6));

    let bad = Args::new().arg("sum").arg(1).arg("two");
    let v = violation(f.call(&bad).unwrap_err());
    assert_eq!(v.pith_name, "values");
    assert_eq!(v.pith_repr, "'two'");
}

#[test]
fn test_keyword_arguments_are_checked() {
    let ns = Namespace::new("demo");
    let f = Function::new("open", &ns, |_: &Args| Ok(Value::None))
        .param(Param::positional("path", Hint::of(&STR)))
        .param(Param::new("mode", ParamKind::KeywordOnly).hinted(Hint::of(&STR)));
    let f = decorate(&f, &Conf::default()).unwrap();

    assert!(f.call(&Args::new().kwarg("path", "a.txt").kwarg("mode", "r")).is_ok());
    // Unpassed parameters are not checked.
    assert!(f.call(&Args::new().arg("a.txt")).is_ok());

    let v = violation(f.call(&Args::new().arg("a.txt").kwarg("mode", 1)).unwrap_err());
    assert_eq!(v.pith_name, "mode");
}

#[rstest]
#[case(true, false)]
#[case(false, true)]
fn test_numeric_tower(#[case] strict: bool, #[case] accepts_int: bool) {
    let ns = Namespace::new("demo");
    let f = Function::new("half", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", Hint::of(&FLOAT)));
    let f = decorator(Conf { strict, ..Conf::default() }).decorate(&f).unwrap();
    assert!(f.call_with([Value::Float(0.5)]).is_ok());
    assert_eq!(f.call_with([Value::Int(1)]).is_ok(), accepts_int);
    assert!(f.call_with([Value::str("1")]).is_err());
}

#[test]
fn test_debug_wrappers_keep_source_and_hints() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", Hint::list(Hint::of(&INT))))
        .returns(Hint::of(&INT));

    let plain = decorator(Conf::default()).decorate(&f).unwrap();
    assert!(plain.source().is_none());
    assert!(plain.resolved_hints().is_none());

    let debug = decorator(Conf { is_debug: true, ..Conf::default() }).decorate(&f).unwrap();
    let source = debug.source().unwrap();
    assert!(source.starts_with("def f("));
    assert!(source.contains("isinstance(__hc_pith_root, list)"), "Unexpected source:\n{}", source);
    let hints = debug.resolved_hints().unwrap();
    assert_eq!(hints.keys().collect::<Vec<_>>(), vec!["x", "return"]);
    assert_eq!(hints["return"], Hint::of(&INT));
}

#[rstest]
#[case(true, 1)]
#[case(false, 0)]
fn test_deprecated_hint_warnings(#[case] warn: bool, #[case] expected: usize) {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", parse_hint("List[int]", &ns).unwrap()));
    let conf = Conf { warn_on_deprecated_hints: warn, ..Conf::default() };
    let f = decorator(conf).decorate(&f).unwrap();
    assert_eq!(f.warnings().len(), expected);
}

#[test]
fn test_malformed_signatures_are_rejected() {
    let ns = Namespace::new("demo");
    let reserved = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("__hc_func", Hint::of(&INT)));
    assert!(matches!(decorate(&reserved, &Conf::default()), Err(Error::ParamName { .. })));

    let kwargs = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::new("options", ParamKind::VarKeyword).hinted(Hint::of(&INT)));
    assert!(matches!(decorate(&kwargs, &Conf::default()), Err(Error::ParamMalformed { .. })));
}

#[test]
fn test_unsupported_hints_fail_decoration() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", Hint::Opaque("Callable[..., int]".to_string())));
    let err = decorate(&f, &Conf::default()).unwrap_err();
    assert!(err.is_decoration_error());

    let masked = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional(
            "x",
            Hint::union([Hint::Any, Hint::Opaque("Callable[..., int]".to_string())]),
        ))
        .returns(Hint::union([Hint::Opaque("42".to_string()), Hint::Any]));
    match decorate(&masked, &Conf::default()) {
        Err(Error::HintUnsupported { hint, .. }) => assert_eq!(hint, "<opaque Callable[..., int]>"),
        other => panic!("expected an unsupported hint, got {:?}", other),
    }
}

#[test]
fn test_validators_run_after_the_type_check() {
    let ns = Namespace::new("demo");
    let positive = Validator::new("positive", |v: &Value| matches!(v, Value::Int(i) if *i > 0));
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("n", Hint::annotated(Hint::of(&INT), [positive])));
    let f = decorate(&f, &Conf::default()).unwrap();
    assert!(f.call_with([Value::Int(3)]).is_ok());

    let v = violation(f.call_with([Value::Int(-3)]).unwrap_err());
    assert_eq!(v.cause, "int -3 violates validator Is[positive]");
    assert!(f.call_with([Value::str("3")]).is_err());
}

#[test]
fn test_user_text_never_reaches_source_unescaped() {
    let ns = Namespace::new("demo");
    let braces = Validator::new("{pith} > 0", |v: &Value| matches!(v, Value::Int(i) if *i > 0));
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("a", Hint::literal([Value::str("a:\nb")])))
        .param(Param::positional("b", Hint::literal([Value::str("{pith}")])))
        .param(Param::positional("c", Hint::annotated(Hint::of(&INT), [braces])));
    let f = decorator(Conf { is_debug: true, ..Conf::default() }).decorate(&f).unwrap();

    let source = f.source().unwrap();
    assert!(source.contains(r"'a:\nb'"));
    assert!(!source.contains("== '__hc_pith_root'"));
    assert!(!source.contains("{pith"));

    let args = [Value::str("a:\nb"), Value::str("{pith}"), int(1)];
    assert!(f.call_with(args.clone()).is_ok());
    let v = violation(f.call_with([args[0].clone(), Value::str("x"), int(1)]).unwrap_err());
    assert_eq!(v.pith_name, "b");
    assert_eq!(v.cause, "str 'x' != any of Literal['{pith}']");
}

#[test]
fn test_literal_source_and_check_agree_on_bools() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", Hint::literal([int(1)])));
    let f = decorator(Conf { is_debug: true, ..Conf::default() }).decorate(&f).unwrap();
    assert!(f.source().unwrap().contains("== 1 and isinstance(__hc_pith_root, int)"));

    assert!(f.call_with([Value::Bool(true)]).is_ok());
    assert!(f.call_with([Value::Bool(false)]).is_err());
    assert!(f.call_with([Value::Float(1.0)]).is_err());
}

/// Python `==` between literal values: `bool`, `int` and `float` compare as numbers.
fn literal_eq(a: &Value, b: &Value) -> bool {
    fn number(v: &Value) -> Option<f64> {
        match v {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Reference checker: walks every item without sampling or caching.
fn conforms(hint: &Hint, value: &Value) -> bool {
    match hint {
        Hint::Any => true,
        Hint::NoneType => matches!(value, Value::None),
        Hint::Class(class) => value.is_instance(class),
        Hint::Union(members) => members.iter().any(|member| conforms(member, value)),
        Hint::Generic { origin: Origin::Type, args, .. } => match (value, args.as_slice()) {
            (Value::Type(_), []) | (Value::Type(_), [Hint::Any]) => true,
            (Value::Type(class), [Hint::Class(base)]) => class.is_subclass_of(base),
            _ => false,
        },
        Hint::Generic { origin, args, .. } => {
            if !value.is_instance(&origin.class()) {
                return false;
            }
            match (value, args.as_slice()) {
                (Value::Dict(entries), [key, val]) => {
                    entries.iter().all(|(k, v)| conforms(key, k) && conforms(val, v))
                },
                (_, [item]) => value.items().map_or(true, |items| items.iter().all(|v| conforms(item, v))),
                _ => true,
            }
        },
        Hint::Tuple { items, variadic, .. } => match value {
            Value::Tuple(values) if *variadic => values.iter().all(|v| conforms(&items[0], v)),
            Value::Tuple(values) => {
                values.len() == items.len() && items.iter().zip(values.iter()).all(|(h, v)| conforms(h, v))
            },
            _ => false,
        },
        Hint::Protocol(protocol) => {
            let class = value.class();
            protocol.members().iter().all(|member| class.has_member(member))
        },
        Hint::ForwardRef(fref) => conforms(fref.resolve().unwrap(), value),
        Hint::Annotated(inner, validators) => {
            conforms(inner, value) && validators.iter().all(|v| v.validate(value))
        },
        Hint::Literal(values) => values
            .iter()
            .any(|lit| literal_eq(value, lit) && value.is_instance(&lit.class())),
        other => panic!("reference checker does not handle {}", other),
    }
}

fn int(i: i64) -> Value {
    Value::Int(i)
}

fn assert_agrees(ns: &Arc<Namespace>, hint: &Hint, value: &Value) {
    let f = Function::new("f", ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("x", hint.clone()));
    let f = decorator(Conf::full()).decorate(&f).unwrap();

    let expected = conforms(hint, value);
    match f.call_with([value.clone()]) {
        Ok(returned) => {
            assert!(expected, "{} accepted {}", hint, value);
            assert!(returned.is_same(value));
        },
        Err(Error::Violation(v)) => {
            assert!(!expected, "{} rejected {}: {}", hint, value, v);
            assert_eq!(v.pith_repr, value.repr());
        },
        Err(other) => panic!("unexpected error {:?}", other),
    }
}

#[rstest]
#[case("list[int]", Value::list([int(1), int(2), int(3)]))]
#[case("list[int]", Value::list([int(1), Value::str("2"), int(3)]))]
#[case("list[int]", Value::tuple([int(1)]))]
#[case("dict[str, list[int]]", Value::dict([(Value::str("a"), Value::list([int(1)]))]))]
#[case("dict[str, list[int]]", Value::dict([(Value::str("a"), Value::list([Value::None]))]))]
#[case("dict[str, list[int]]", Value::dict([(int(1), Value::list(Vec::new()))]))]
#[case("tuple[int, str]", Value::tuple([int(1), Value::str("a")]))]
#[case("tuple[int, str]", Value::tuple([int(1), int(2)]))]
#[case("tuple[int, str]", Value::tuple([int(1)]))]
#[case("tuple[int, ...]", Value::tuple([int(1), int(2), Value::Float(3.0)]))]
#[case("Optional[list[str]]", Value::None)]
#[case("Optional[list[str]]", Value::list([Value::str("a"), Value::Bool(true)]))]
#[case("int | str | None", Value::Float(1.0))]
#[case("int | list[int | str]", Value::list([int(1), Value::str("a")]))]
#[case("list[list[list[int]]]", Value::list([Value::list([Value::list([int(1), Value::None])])]))]
#[case("set[int]", Value::set([int(1), int(2)]))]
#[case("set[int]", Value::set([int(1), Value::str("x")]))]
#[case("frozenset[str]", Value::frozenset([Value::str("a"), Value::str("b")]))]
#[case("frozenset[str]", Value::frozenset([Value::str("a"), int(2)]))]
#[case("frozenset[str]", Value::set([Value::str("a")]))]
#[case("Literal[1, 'a']", int(1))]
#[case("Literal[1, 'a']", Value::Bool(true))]
#[case("Literal[1, 'a']", Value::Float(1.0))]
#[case("Literal[True]", int(1))]
#[case("list[Literal['a', None]]", Value::list([Value::None, Value::str("b")]))]
#[case("type[int]", Value::Type(Arc::clone(&*BOOL)))]
#[case("type[int]", Value::Type(Arc::clone(&*STR)))]
#[case("type[int]", int(1))]
#[case("type", Value::Type(Arc::clone(&*STR)))]
#[case("SupportsInt", Value::Float(1.5))]
#[case("SupportsIndex", Value::Float(1.5))]
#[case("list[SupportsAbs]", Value::list([int(1), Value::str("x")]))]
fn test_agrees_with_reference_checker(#[case] hint: &str, #[case] value: Value) {
    let ns = Namespace::new("demo");
    let hint = parse_hint(hint, &ns).unwrap();
    assert_agrees(&ns, &hint, &value);
}

#[test]
fn test_agrees_with_reference_checker_on_built_hints() {
    let ns = Namespace::new("demo");
    let fish = Class::new("Fish", "demo").member("swim").build();
    let cod = Class::new("Cod", "demo").base(&fish).build();
    let rock = Class::new("Rock", "demo").build();
    ns.define_class(&fish);

    let swims = Protocol::new("SupportsSwim", ["swim"]);
    let even = Validator::new("even", |v: &Value| matches!(v, Value::Int(i) if i % 2 == 0));
    let cases = vec![
        (Hint::forward("Fish", &ns), Value::instance(&cod)),
        (Hint::forward("Fish", &ns), Value::instance(&rock)),
        (Hint::list(Hint::forward("Fish", &ns)), Value::list([Value::instance(&fish), int(1)])),
        (Hint::Protocol(Arc::clone(&swims)), Value::instance(&cod)),
        (Hint::Protocol(Arc::clone(&swims)), Value::instance(&rock)),
        (Hint::annotated(Hint::of(&INT), [even.clone()]), int(4)),
        (Hint::annotated(Hint::of(&INT), [even.clone()]), int(3)),
        (Hint::annotated(Hint::of(&INT), [even.clone()]), Value::str("4")),
        (Hint::list(Hint::annotated(Hint::of(&INT), [even])), Value::list([int(2), int(5)])),
        (Hint::type_of(Hint::of(&fish)), Value::Type(Arc::clone(&cod))),
        (Hint::type_of(Hint::of(&fish)), Value::Type(Arc::clone(&rock))),
        (Hint::literal([Value::Bool(false), Value::str("{pith}")]), int(0)),
        (Hint::literal([Value::Bool(false), Value::str("{pith}")]), Value::str("{pith}")),
    ];
    for (hint, value) in &cases {
        assert_agrees(&ns, hint, value);
    }
}

#[test]
fn test_wrappers_are_shareable_across_threads() {
    let ns = Namespace::new("demo");
    let f = Function::new("f", &ns, |args: &Args| Ok(first(args)))
        .param(Param::positional("xs", Hint::list(Hint::of(&INT))));
    let f = Arc::new(decorate(&f, &Conf::default()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f.call_with([Value::list([int(i), int(i + 1)])]).is_ok())
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
