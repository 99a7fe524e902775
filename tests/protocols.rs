use hintcheck::compile::Registry;
use hintcheck::prelude::*;
use hintcheck::value::{ClassRef, BOOL, FLOAT, INT, STR};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn identity(hint: Hint) -> Function {
    let ns = Namespace::new("pond");
    let func = Function::new("identity", &ns, |args: &Args| {
        Ok(args.positional.first().cloned().unwrap_or(Value::None))
    })
    .param(Param::positional("arg", hint.clone()))
    .returns(hint);
    Decorator::with_registry(Conf::default(), Registry::new()).decorate(&func).unwrap()
}

#[rstest]
#[case("SupportsAbs", Value::Int(-1))]
#[case("SupportsAbs", Value::Float(-1.5))]
#[case("SupportsAbs", Value::Complex(1.0, 1.0))]
#[case("SupportsInt", Value::Bool(true))]
#[case("SupportsInt", Value::Float(2.5))]
#[case("SupportsFloat", Value::Int(2))]
#[case("SupportsIndex", Value::Int(2))]
#[case("SupportsIndex", Value::Bool(false))]
#[case("SupportsRound", Value::Float(0.5))]
#[case("SupportsBytes", Value::Bytes(b"fish"[..].into()))]
#[case("Sized", Value::str("fish"))]
#[case("Iterable", Value::list([Value::Int(1)]))]
fn test_builtin_protocols_accept(#[case] hint: &str, #[case] value: Value) {
    let ns = Namespace::new("pond");
    let checked = identity(parse_hint(hint, &ns).unwrap());
    assert!(checked.call_with([value.clone()]).unwrap().is_same(&value));
}

#[rstest]
#[case("SupportsIndex", Value::Float(1.0))]
#[case("SupportsInt", Value::str("1"))]
#[case("SupportsComplex", Value::Int(1))]
#[case("Sized", Value::Int(1))]
fn test_builtin_protocols_reject(#[case] hint: &str, #[case] value: Value) {
    let ns = Namespace::new("pond");
    let checked = identity(parse_hint(hint, &ns).unwrap());
    match checked.call_with([value]) {
        Err(Error::Violation(v)) => {
            assert_eq!(v.kind, ViolationKind::Param);
            assert_eq!(v.hint, hint);
        },
        other => panic!("expected a violation, got {:?}", other),
    }
}

struct Pond {
    fishy: hintcheck::hint::ProtocolRef,
    one_fish: ClassRef,
    two_fish: ClassRef,
    red_snapper: ClassRef,
}

fn pond() -> Pond {
    Pond {
        fishy: Protocol::new("SupportsFish", ["fish"]),
        one_fish: Class::new("OneFish", "pond").member("fish").build(),
        two_fish: Class::new("TwoFish", "pond").members(["fish", "swim"]).build(),
        red_snapper: Class::new("RedSnapper", "pond").member("oh").build(),
    }
}

#[test]
fn test_custom_protocol_is_structural() {
    let pond = pond();
    let checked = identity(Hint::Protocol(pond.fishy.clone()));

    for class in [&pond.one_fish, &pond.two_fish] {
        let fish = Value::instance(class);
        assert!(checked.call_with([fish.clone()]).unwrap().is_same(&fish));
    }

    match checked.call_with([Value::instance(&pond.red_snapper)]) {
        Err(Error::Violation(v)) => {
            assert_eq!(
                v.cause,
                "RedSnapper <pond.RedSnapper object> not instance of protocol SupportsFish \
                 (missing fish)"
            );
        },
        other => panic!("expected a violation, got {:?}", other),
    }
}

#[test]
fn test_protocol_verdicts_are_memoized_per_class() {
    let pond = pond();
    let checked = identity(Hint::Protocol(pond.fishy.clone()));
    for _ in 0..3 {
        checked.call_with([Value::instance(&pond.one_fish)]).unwrap();
        let _ = checked.call_with([Value::instance(&pond.red_snapper)]);
    }
    assert_eq!(pond.fishy.cached_verdicts(), 2);
}

#[test]
fn test_protocol_param_with_violating_return() {
    let pond = pond();
    let ns = Namespace::new("pond");
    let lies = Function::new("lies_all_lies", &ns, |_: &Args| Ok(Value::tuple([Value::Int(1)])))
        .param(Param::positional("arg", Hint::Protocol(pond.fishy.clone())))
        .returns(Hint::tuple([Hint::of(&STR)]).legacy());
    let lies = decorate(&lies, &Conf::default()).unwrap();

    match lies.call_with([Value::instance(&pond.one_fish)]) {
        Err(Error::Violation(v)) => {
            assert_eq!(v.kind, ViolationKind::Return);
            assert_eq!(v.hint, "Tuple[str]");
            assert_eq!(v.cause, "tuple index 0 item int 1 not instance of str");
        },
        other => panic!("expected a violation, got {:?}", other),
    }
}

#[test]
fn test_protocols_inside_containers() {
    let pond = pond();
    let ns = Namespace::new("pond");
    let school = Function::new("school", &ns, |args: &Args| {
        Ok(Value::Int(args.positional.first().and_then(Value::len).unwrap_or(0) as i64))
    })
    .param(Param::positional("fish", Hint::list(Hint::Protocol(pond.fishy.clone()))))
    .returns(Hint::of(&INT));
    let school = Decorator::with_registry(Conf::full(), Registry::new()).decorate(&school).unwrap();

    let good = Value::list([Value::instance(&pond.one_fish), Value::instance(&pond.two_fish)]);
    assert_eq!(school.call_with([good]).unwrap(), Value::Int(2));

    let bad = Value::list([Value::instance(&pond.one_fish), Value::instance(&pond.red_snapper)]);
    assert!(school.call_with([bad]).is_err());
}

#[test]
fn test_builtin_protocol_membership() {
    let ns = Namespace::new("pond");
    let index = match parse_hint("SupportsIndex", &ns).unwrap() {
        Hint::Protocol(protocol) => protocol,
        other => panic!("expected a protocol, got {}", other),
    };
    assert!(index.is_satisfied_by(&INT));
    assert!(index.is_satisfied_by(&BOOL));
    assert!(!index.is_satisfied_by(&FLOAT));
    assert_eq!(index.missing_members(&FLOAT), vec!["__index__"]);
}
