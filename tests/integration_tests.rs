use tagql::{Composer, Error, Value};

fn tags_of(module: &Value) -> Vec<String> {
    match module.get_key("tags") {
        Some(Value::List(items)) => items
            .iter()
            .map(|item| item.as_str().unwrap().to_string())
            .collect(),
        _ => Vec::new(),
    }
}

#[test]
fn test_garage_scenario() {
    let mut composer = Composer::new();
    let script = r#"
        # build a small inventory
        new garage is json {"location": "north"} end;
        in garage new car as red, fast is json {"wheels": 4} end;
        in garage new car as blue is json {"wheels": 4} end;
        in garage new bike as red is json {"wheels": 2} end;
    "#;
    composer.compose(script, false).unwrap();

    let red = composer.compose("in garage/red get;", false).unwrap();
    assert_eq!(red.len(), 2);
    assert!(tags_of(&red[0]).contains(&"car".to_string()));
    assert!(tags_of(&red[1]).contains(&"bike".to_string()));

    let red_cars = composer
        .compose("in garage/(car & red) get;", false)
        .unwrap();
    assert_eq!(red_cars.len(), 1);
    assert_eq!(
        red_cars[0].get_key("payload").and_then(|p| p.get_key("wheels")),
        Some(&Value::Int(4))
    );

    composer.compose("in garage/(car & blue) del;", false).unwrap();
    let cars = composer.compose("in garage/car get;", false).unwrap();
    assert_eq!(cars.len(), 1);

    let garages_with_bikes = composer.compose("in garage > bike get;", false).unwrap();
    assert_eq!(garages_with_bikes.len(), 1);
    assert_eq!(
        garages_with_bikes[0]
            .get_key("payload")
            .and_then(|p| p.get_key("location")),
        Some(&Value::String("north".into()))
    );
}

#[test]
fn test_definition_with_children_and_later_queries() {
    let mut composer = Composer::new();
    composer
        .compose(
            "new library has { \
                 new shelf as fiction has { new book is 'dune'; }; \
                 new shelf as history; \
             };",
            false,
        )
        .unwrap();

    let shelves = composer.compose("in library/shelf get;", false).unwrap();
    assert_eq!(shelves.len(), 2);

    let books = composer
        .compose("in library >> book get;", false)
        .unwrap();
    assert_eq!(books.len(), 1);
    assert!(tags_of(&books[0]).contains(&"library".to_string()));

    let deep = composer
        .compose("in library/shelf/book get;", false)
        .unwrap();
    assert_eq!(deep.len(), 1);
    assert_eq!(
        deep[0].get_key("payload"),
        Some(&Value::String("dune".into()))
    );
}

#[test]
fn test_chunked_input_matches_whole_input() {
    let script = "new garage; in garage new car as red; in garage/red get;";

    let mut whole = Composer::new();
    let expected = whole.compose(script, false).unwrap();

    let mut chunked = Composer::new();
    let mut collected = Vec::new();
    for chunk in script.as_bytes().chunks(7) {
        let text = std::str::from_utf8(chunk).unwrap();
        collected.extend(chunked.compose(text, true).unwrap());
    }
    assert!(!chunked.carrying());
    assert_eq!(collected, expected);
}

#[test]
fn test_canonical_form_replays_into_an_equal_store() {
    let script = "new a as tagged is json {\"k\": [1, 2]} end has { new b; }; \
                  in a new c is 'text';";

    let mut first = Composer::new();
    first.compose(script, false).unwrap();

    // replay every statement through its canonical text form
    let mut lexer = tagql::StatementLexer::new();
    lexer.feed(script);
    let mut second = Composer::new();
    while let Some(tokens) = lexer.next(false).unwrap() {
        let mut parser = tagql::Parser::new(tokens);
        let statement = parser.parse_statement().unwrap();
        second.compose(&statement.canonical(), false).unwrap();
    }

    assert_eq!(first.store(), second.store());
}

#[test]
fn test_programmatic_and_textual_paths_agree() {
    let mut textual = Composer::new();
    textual
        .compose("new a; in a new b is json {\"n\": 7} end;", false)
        .unwrap();

    let mut programmatic = Composer::new();
    programmatic
        .compose_ast(&Value::from_json(&serde_json::json!([
            {"operation": "new", "handle": "a"},
            {"operation": "new", "context": "a", "handle": "b", "payload": {"n": 7}},
        ])))
        .unwrap();

    assert_eq!(textual.store(), programmatic.store());
}

#[test]
fn test_syntax_errors_carry_positions() {
    let mut composer = Composer::new();
    let error = composer.compose("new a;\nnew = b;", false).unwrap_err();
    let Error::Syntax { position, .. } = &error else {
        panic!("expected a syntax error, got {error:?}");
    };
    assert_eq!(position.as_ref().unwrap().line, 2);
    let rendered = error.to_string();
    assert!(rendered.contains("2:"), "no position in {rendered:?}");
}

#[test]
fn test_store_snapshot_is_deeply_copied() {
    let mut composer = Composer::new();
    composer.compose("new a is json {\"k\": 1} end;", false).unwrap();
    let output = composer.compose("in a get;", false).unwrap();
    composer.compose("in a set b;", false).unwrap();
    // the earlier snapshot is unaffected by the overwrite
    assert_eq!(tags_of(&output[0]), vec!["a"]);
}
