use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use sable_exec::prelude::*;
use sable_norm::{DEFAULT_DELIMITERS, DEFAULT_ESCAPE};

fn substring(s: &str, start: i32, length: Option<i32>) -> Result<Value, ExecError> {
    let mut program = Program::new();
    let data = program.add_variable(Value::from(s));
    let start_id = program.add_variable(Value::from(start));
    let length_id = length.map(|l| program.add_variable(Value::from(l)));
    let out = program.add_variable(Value::null_of(DataType::String));
    let mut action = SubString::new(data, start_id, length_id, out);
    action.initialize(&program)?;
    action.execute(&program)?;
    let result = program.variable(out)?.copy();
    Ok(result)
}

#[test]
fn substring_follows_sql_semantics() {
    assert_eq!(substring("héllo", 2, Some(3)).unwrap().to_string(), "éll");
    assert_eq!(substring("abc", -1, Some(5)).unwrap().to_string(), "abc");
    assert_eq!(
        substring("abc", 1, Some(-1)).err(),
        Some(ExecError::SubStringError)
    );
}

#[test]
fn overlay_follows_sql_semantics() {
    let overlay = |s: &str, p: &str, start: i32, length: Option<i32>| -> String {
        let mut program = Program::new();
        let source = program.add_variable(Value::from(s));
        let placement = program.add_variable(Value::from(p));
        let start_id = program.add_variable(Value::from(start));
        let length_id = length.map(|l| program.add_variable(Value::from(l)));
        let out = program.add_variable(Value::null_of(DataType::String));
        let mut action = Overlay::new(source, placement, start_id, length_id, out);
        action.initialize(&program).expect("initialize failed");
        action.execute(&program).expect("execute failed");
        let result = program.variable(out).expect("missing out");
        result.to_string()
    };
    assert_eq!(overlay("abcdef", "XYZ", 2, Some(2)), "aXYZdef");
    assert_eq!(overlay("abcdef", "XY", 10, None), "abcdefXY");
}

#[test]
fn cardinality_and_element_reference() {
    let mut program = Program::new();
    let array = program.add_variable(Value::from(DataArray::from_values(vec![
        Value::from(10i32),
        Value::from(20i32),
        Value::from(30i32),
    ])));
    let count_out = program.add_variable(Value::null_of(DataType::Int32));
    let mut cardinality = Cardinality::new(array, count_out);
    cardinality.initialize(&program).unwrap();
    cardinality.execute(&program).unwrap();
    assert_eq!(program.variable(count_out).unwrap().to_i32(), Some(3));

    let index = program.add_variable(Value::from(2i32));
    let element_out = program.add_variable(Value::null_of(DataType::Int32));
    let mut reference = ElementReference::new(array, index, element_out);
    reference.initialize(&program).unwrap();
    reference.execute(&program).unwrap();
    assert_eq!(program.variable(element_out).unwrap().to_i32(), Some(20));

    let bad_index = program.add_variable(Value::from(4i32));
    let mut out_of_range = ElementReference::new(array, bad_index, element_out);
    out_of_range.initialize(&program).unwrap();
    assert_eq!(
        out_of_range.execute(&program),
        Err(ExecError::BadArrayElement)
    );
}

#[test]
fn action_list_runs_a_small_expression_tree() {
    // (a + b) * c, with the sum reused through the done latch.
    let mut program = Program::new();
    let a = program.add_variable(Value::from(2i32));
    let b = program.add_variable(Value::from(3i32));
    let c = program.add_variable(Value::from(4i32));
    let sum = program.add_variable(Value::null_of(DataType::Int32));
    let out = program.add_variable(Value::null_of(DataType::Int32));

    let mut list = ActionList::new();
    list.add(Box::new(Arithmetic::dyadic(Operation::Addition, a, b, sum)));
    list.add(Box::new(Arithmetic::dyadic(Operation::Addition, a, b, sum)));
    list.add(Box::new(Arithmetic::dyadic(
        Operation::Multiplication,
        sum,
        c,
        out,
    )));

    list.initialize(&program).unwrap();
    assert_eq!(list.execute(&program).unwrap(), Status::Success);
    assert_eq!(program.variable(out).unwrap().to_i32(), Some(20));

    // Next row: new inputs take effect only after undone.
    program
        .variable_mut(a)
        .unwrap()
        .assign(&Value::from(10i32))
        .unwrap();
    list.undone();
    list.execute(&program).unwrap();
    assert_eq!(program.variable(out).unwrap().to_i32(), Some(52));
    list.terminate(&program);
}

#[test]
fn normalizer_round_trip_through_the_program() {
    let rule = Arc::new(
        NormRule::builder()
            .pre(0xFF71, 0x30A2) // ｱ → ア
            .pre(0xFF92, 0x30E1) // ﾒ → メ
            .pre(0xFF98, 0x30EA) // ﾘ → リ
            .pre(0xFF76, 0x30AB) // ｶ → カ
            .build(),
    );
    let normalizer = Normalizer::new(rule, Box::new(IdentityRules), Box::new(IdentityRules));
    let handle = Rc::new(RefCell::new(normalizer));

    let mut program = Program::new();
    program.set_normalizer(handle.clone());

    let data = program.add_variable(Value::from("ｱﾒﾘｶ"));
    let normalized_option = program.add_variable(Value::from(0i32));
    let both_option = program.add_variable(Value::from(2i32));
    let out = program.add_variable(Value::null_of(DataType::String));

    let mut normalize = Normalize::new(data, normalized_option, out);
    normalize.initialize(&program).unwrap();
    normalize.execute(&program).unwrap();
    assert_eq!(program.variable(out).unwrap().to_string(), "アメリカ");

    let mut both = Normalize::new(data, both_option, out);
    both.initialize(&program).unwrap();
    both.execute(&program).unwrap();
    let both_form = program.variable(out).unwrap().as_str16().unwrap().clone();

    // Extraction recovers each side of the both-mode form.
    let mut normalizer = handle.borrow_mut();
    normalizer
        .extract_init(
            &both_form,
            OutputMode::Original,
            DEFAULT_DELIMITERS,
            DEFAULT_ESCAPE,
        )
        .unwrap();
    let mut original = Utf16String::new();
    while let Some(c) = normalizer.extract_getc().unwrap() {
        original.push(c);
    }
    assert_eq!(original.to_string(), "ｱﾒﾘｶ");

    normalizer
        .extract_init(
            &both_form,
            OutputMode::Normalized,
            DEFAULT_DELIMITERS,
            DEFAULT_ESCAPE,
        )
        .unwrap();
    let mut normalized = Utf16String::new();
    while let Some(c) = normalizer.extract_getc().unwrap() {
        normalized.push(c);
    }
    assert_eq!(normalized.to_string(), "アメリカ");
}

#[test]
fn coalesce_and_getmax_compose() {
    let mut program = Program::new();
    let a = program.add_variable(Value::null_of(DataType::Int32));
    let b = program.add_variable(Value::from(5i32));
    let c = program.add_variable(Value::from(9i32));
    let coalesced = program.add_variable(Value::null_of(DataType::Int32));
    let out = program.add_variable(Value::null_of(DataType::Int32));

    let mut list = ActionList::new();
    list.add(Box::new(Coalesce::new(a, b, coalesced)));
    list.add(Box::new(GetMax::new(&[coalesced, c, a], out)));
    list.initialize(&program).unwrap();
    list.execute(&program).unwrap();
    assert_eq!(program.variable(out).unwrap().to_i32(), Some(9));
}

#[test]
fn invoke_steps_a_stored_routine_per_row() {
    let mut routines = RoutineMap::new();
    routines.insert("add_one", || {
        Box::new(FnRoutine(|args: &DataArray| {
            args.element(0)
                .and_then(|v| v.to_i32())
                .map(|v| Value::from(v + 1))
        }))
    });

    let mut program = Program::new();
    program.set_routine_provider(Box::new(routines));
    let operand = program.add_variable(Value::from(DataArray::from_values(vec![Value::from(
        1i32,
    )])));
    let out = program.add_variable(Value::null_of(DataType::Int32));
    let mut action = Invoke::new("add_one", operand, out);
    action.initialize(&program).unwrap();

    for expected in [2, 3] {
        action.execute(&program).unwrap();
        assert_eq!(program.variable(out).unwrap().to_i32(), Some(expected));
        // Feed the output back for the next row.
        let next = program.variable(out).unwrap().copy();
        program
            .variable_mut(operand)
            .unwrap()
            .as_array_mut()
            .unwrap()
            .set_element(0, next);
        action.undone();
    }
    action.finish(&program).unwrap();
    action.terminate(&program);
}
