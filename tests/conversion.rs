mod common;

use std::sync::Arc;
use std::thread;

use php_runtime_core::convert::{DelegateSignature, NoBinder, to_host};
use php_runtime_core::dynamic::{SourceCodeDescriptor, create_lambda_function};
use php_runtime_core::registry::{MemberAttributes, TypeDesc, native_callback};
use php_runtime_core::value::{HostValue, PhpArray, PhpReference, Value};
use php_runtime_core::{ConversionEngine, ConversionStrictness, Converted, HostType};
use rust_decimal::Decimal;

use ConversionStrictness::{DomainChange, ExactMatch, Explicit, Failed, PrecisionLost};

#[test]
fn strictness_grades_follow_the_value_shape() {
    assert_eq!(to_host::try_to_int32(&Value::Int(7)).strictness, ExactMatch);
    assert_eq!(to_host::try_to_int32(&Value::Double(7.9)), Converted::new(7, PrecisionLost));
    assert_eq!(to_host::try_to_int32(&Value::Bool(true)), Converted::new(1, DomainChange));
    assert!(to_host::try_to_int32(&Value::Long(i64::MAX)).is_failed());
    assert_eq!(to_host::try_to_int64(&Value::Long(i64::MIN)), Converted::exact(i64::MIN));
    assert_eq!(to_host::try_to_double(&Value::Int(2)), Converted::exact(2.0));
    assert_eq!(to_host::try_to_single(&Value::Double(0.5)).strictness, PrecisionLost);
    assert!(to_host::try_to_single(&Value::Double(1e300)).is_failed());
    assert_eq!(
        to_host::try_to_string(&Value::Int(12)),
        Converted::new(Some("12".to_string()), DomainChange)
    );
    assert_eq!(to_host::try_to_char(&Value::from("x")), Converted::exact('x'));
    assert!(to_host::try_to_char(&Value::from("xy")).is_failed());
}

#[test]
fn references_are_followed_for_strings() {
    let reference = Value::Reference(PhpReference::new(Value::from("inner")));
    assert_eq!(
        to_host::try_to_string(&reference),
        Converted::exact(Some("inner".to_string()))
    );
}

#[test]
fn objects_with_to_string_convert_explicitly() {
    let ty = TypeDesc::builder("Label")
        .method(
            to_host::TO_STRING_METHOD,
            MemberAttributes::PUBLIC,
            native_callback(|_, _| Ok(Value::from("label"))),
        )
        .build();
    let object = Value::Object(ty.instantiate().expect("instance"));
    assert_eq!(
        to_host::try_to_string(&object),
        Converted::new(Some("label".to_string()), Explicit)
    );

    let plain = Value::Object(TypeDesc::builder("Plain").build().instantiate().expect("instance"));
    assert_eq!(to_host::try_to_string(&plain).strictness, Failed);
}

#[test]
fn array_conversion_reports_the_worst_element() {
    let engine = ConversionEngine::new();
    let values = Value::Array(PhpArray::from_values([
        Value::Int(1),
        Value::Bool(false),
        Value::Double(3.0),
    ]));
    let converted = engine.try_convert(&values, &HostType::array_of(HostType::Int64), &NoBinder);
    assert_eq!(converted.strictness, DomainChange);
    match converted.value {
        HostValue::Array(array) => assert_eq!(array.items.len(), 3),
        other => panic!("expected an array, got {other:?}"),
    }

    let broken = Value::Array(PhpArray::from_values([Value::Int(1), Value::Null]));
    assert!(engine.try_convert_to::<Vec<i32>>(&broken).is_failed());
}

#[test]
fn classification_is_shared_across_threads() {
    let engine = ConversionEngine::new();
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for i in 0..50 {
                    let converted = engine.try_convert_to::<i64>(&Value::Int(i));
                    assert_eq!(converted, Converted::exact(i64::from(i)));
                }
            });
        }
    });
    assert_eq!(engine.classification_count(), 1);
}

#[test]
fn lambdas_bind_to_delegate_targets_through_the_script() {
    let (app, _) = common::context();
    let mut script = common::script(&app);
    let name = create_lambda_function(
        &mut script,
        "$first",
        "return $first;",
        SourceCodeDescriptor::new("handlers.php", 2, 1),
    )
    .expect("create")
    .expect("compiled");

    let target = HostType::Delegate(DelegateSignature::new("Handler", 1));
    let engine = ConversionEngine::global();
    let converted = engine.try_convert(&Value::from(name.as_str()), &target, &script);
    assert_eq!(converted.strictness, ExactMatch);
    let HostValue::Delegate(delegate) = converted.value else {
        panic!("expected a delegate");
    };
    assert_eq!(delegate.invoke(&[Value::Int(5)]).expect("invoke"), Value::Int(5));

    let unbound = engine.try_convert(&Value::from("no_such_function"), &target, &script);
    assert!(unbound.is_failed());
}

#[test]
fn object_to_type_rejects_values_that_do_not_fit() {
    let engine = Arc::new(ConversionEngine::new());
    assert_eq!(
        engine
            .object_to_type(&Value::Int(3), &HostType::Int16, &NoBinder)
            .expect("fits"),
        HostValue::I16(3)
    );
    assert!(
        engine
            .object_to_type(&Value::Int(3), &HostType::class("Stream"), &NoBinder)
            .is_err()
    );
}

#[test]
fn decimal_targets_go_through_the_dispatch_table() {
    let engine = ConversionEngine::new();
    assert_eq!(
        engine.try_convert_to::<Decimal>(&Value::from("19.5")),
        Converted::new(Decimal::new(195, 1), DomainChange)
    );
    assert!(engine.try_convert_to::<Decimal>(&Value::Double(f64::INFINITY)).is_failed());

    let prices = Value::Array(PhpArray::from_values([Value::Int(3), Value::Double(0.5)]));
    let converted = engine.try_convert_to::<Vec<Decimal>>(&prices);
    assert_eq!(converted.strictness, PrecisionLost);
    assert_eq!(converted.value, vec![Decimal::from(3), Decimal::new(5, 1)]);
    assert_eq!(HostType::Decimal.default_value(), HostValue::Decimal(Decimal::ZERO));
}
