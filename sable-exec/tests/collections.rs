use sable_exec::prelude::*;

fn int_row(values: &[Option<i32>]) -> Value {
    Value::from(
        values
            .iter()
            .map(|v| match v {
                Some(v) => Value::from(*v),
                None => Value::null_of(DataType::Int32),
            })
            .collect::<DataArray>(),
    )
}

fn int_out_row(width: usize) -> Value {
    Value::from(
        (0..width)
            .map(|_| Value::null_of(DataType::Int32))
            .collect::<DataArray>(),
    )
}

#[test]
fn sort_ascending_places_nulls_last() {
    let program = Program::new();
    let mut sort = Sort::new(vec![0], vec![0], vec![]);
    sort.initialize(&program).expect("failed to initialize sort");

    for key in [Some(3), None, Some(1), Some(2), None] {
        sort.put_data(&program, &int_row(&[key]))
            .expect("failed to put row");
    }
    sort.put_finish(&program).expect("failed to finish put");

    let mut out = int_out_row(1);
    let mut keys = Vec::new();
    while sort.get_data(&program, &mut out).expect("failed to get row") {
        keys.push(out.as_array().unwrap().element(0).unwrap().to_i32());
    }
    assert_eq!(keys, vec![Some(1), Some(2), Some(3), None, None]);
}

#[test]
fn store_round_trips_every_row() {
    let program = Program::new();
    let mut store = Store::new();
    let input: Vec<Vec<Option<i32>>> = vec![
        vec![Some(1), Some(10)],
        vec![Some(2), None],
        vec![Some(3), Some(30)],
    ];
    for row in &input {
        store.put_data(&program, &int_row(row)).expect("put failed");
    }

    let mut out = int_out_row(2);
    let mut seen = Vec::new();
    while store.get_data(&program, &mut out).expect("get failed") {
        let array = out.as_array().unwrap();
        seen.push(vec![
            array.element(0).unwrap().to_i32(),
            array.element(1).unwrap().to_i32(),
        ]);
    }
    assert_eq!(seen, input);
}

#[test]
fn grouping_preserves_the_row_multiset() {
    let program = Program::new();
    let mut grouping = Grouping::new(vec![0], false);
    let keys = [1, 1, 2, 2, 2, 3];

    let mut emitted = Vec::new();
    let mut out = int_out_row(1);
    for (i, key) in keys.iter().enumerate() {
        let changed = grouping
            .put_data(&program, &int_row(&[Some(*key)]))
            .expect("put failed");
        if i > 0 {
            // The first slot always holds the previous row; consume it.
            assert!(grouping.get_data(&program, &mut out).expect("get failed"));
            emitted.push(out.as_array().unwrap().element(0).unwrap().to_i32().unwrap());
            let expected_change = keys[i - 1] != *key;
            assert_eq!(changed, expected_change, "at row {i}");
        } else {
            assert!(!changed);
            grouping.shift(&program).expect("shift failed");
        }
    }
    // Drain the final row.
    assert!(grouping.get_data(&program, &mut out).expect("get failed"));
    emitted.push(out.as_array().unwrap().element(0).unwrap().to_i32().unwrap());

    assert_eq!(emitted, keys.to_vec());
}

#[test]
fn bitset_disintegration_expands_row_ids() {
    let program = Program::new();
    let mut collection = Disintegrate::bitset();
    let bits: BitSet = [7u32, 2, 40].into_iter().collect();
    let source = Value::from(DataArray::from_values(vec![
        Value::from("doc"),
        Value::from(bits),
    ]));
    collection.put_data(&program, &source).expect("put failed");

    let mut out = Value::from(DataArray::from_values(vec![
        Value::null_of(DataType::String),
        Value::default_of(DataType::UInt32),
    ]));
    let mut ids = Vec::new();
    while collection.get_data(&program, &mut out).expect("get failed") {
        let array = out.as_array().unwrap();
        assert_eq!(array.element(0).unwrap().to_string(), "doc");
        ids.push(array.element(1).unwrap().to_u32().unwrap());
    }
    assert_eq!(ids, vec![2, 7, 40]);
    assert!(collection.is_get_next_operand());
}

#[test]
fn connection_ships_rows_and_end_of_stream() {
    let transport = MemoryTransport::new();
    let mut program = Program::new();
    let connection_id = program.add_connection(Box::new(transport.clone()));

    let mut sink = Connection::new(connection_id);
    sink.initialize(&program).expect("failed to initialize");
    for i in 0..3 {
        sink.put_data(&program, &int_row(&[Some(i)]))
            .expect("put failed");
    }
    sink.put_finish(&program).expect("finish failed");
    sink.terminate(&program);

    let messages = transport.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages[..3].iter().all(|m| m.is_some()));
    assert!(messages[3].is_none());
    assert_eq!(program.sent_rows(), 4);
}

#[test]
fn sort_output_is_an_ordered_permutation_of_random_input() {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);

    let program = Program::new();
    let mut sort = Sort::new(vec![0], vec![0], vec![]);
    sort.initialize(&program).expect("failed to initialize sort");

    let mut input: Vec<i32> = Vec::new();
    for _ in 0..500 {
        let v = rng.gen_range(-1000..1000);
        input.push(v);
        sort.put_data(&program, &int_row(&[Some(v)]))
            .expect("put failed");
    }

    let mut out = int_out_row(1);
    let mut output = Vec::new();
    while sort.get_data(&program, &mut out).expect("get failed") {
        output.push(out.as_array().unwrap().element(0).unwrap().to_i32().unwrap());
    }

    assert!(output.windows(2).all(|w| w[0] <= w[1]));
    let mut sorted_input = input;
    sorted_input.sort_unstable();
    assert_eq!(output, sorted_input);
}

#[test]
fn explain_renders_collection_shapes() {
    let sort = Sort::new(vec![0, 1], vec![0, 1], vec![]);
    let mut explain = Explain::new(ExplainOptions::default());
    sort.explain(&mut explain);
    assert_eq!(explain.text(), "sort(0,1 desc)");

    let grouping = Grouping::new(vec![2], false);
    let mut explain = Explain::new(ExplainOptions::default());
    grouping.explain(&mut explain);
    assert_eq!(explain.text(), "grouping(2)");
}
