use tagql::lexer::StatementLexer;
use tagql::parser::{from_value, from_values, Parser};
use tagql::{
    BinaryKind, CompareKind, Error, ExprNode, OperationKind, Payload, SpecialKind, Statement,
    Value, ValueKind,
};

fn parse_one(input: &str) -> Statement {
    let mut lexer = StatementLexer::new();
    lexer.feed(input);
    let tokens = lexer.next(false).unwrap().unwrap();
    let mut parser = Parser::new(tokens);
    let statement = parser.parse_statement().unwrap();
    parser.expect_end().unwrap();
    statement
}

fn parse_error(input: &str) -> Error {
    let mut lexer = StatementLexer::new();
    lexer.feed(input);
    let tokens = match lexer.next(false) {
        Err(error) => return error,
        Ok(tokens) => tokens.unwrap(),
    };
    let mut parser = Parser::new(tokens);
    parser
        .parse_statement()
        .and_then(|s| parser.expect_end().map(|()| s))
        .unwrap_err()
}

fn lit(text: &str) -> ExprNode {
    ExprNode::Literal(text.into())
}

fn bin(op: BinaryKind, left: ExprNode, right: ExprNode) -> ExprNode {
    ExprNode::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

#[test]
fn test_bare_get() {
    let statement = parse_one("get;");
    assert_eq!(statement.context, None);
    assert!(!statement.greedy);
    assert_eq!(statement.operation, OperationKind::Print);
    assert_eq!(statement.definition, None);
}

#[test]
fn test_new_with_handle_and_tags() {
    let statement = parse_one("new car as red, fast;");
    assert_eq!(statement.operation, OperationKind::New);
    let definition = statement.definition.unwrap();
    assert_eq!(definition.handle.as_deref(), Some("car"));
    assert_eq!(definition.tags, vec!["red".to_string(), "fast".to_string()]);
    assert!(definition.payload.is_none());
    assert!(definition.children.is_empty());
}

#[test]
fn test_none_handle() {
    let statement = parse_one("new @none as a;");
    assert_eq!(statement.definition.unwrap().handle, None);
}

#[test]
fn test_uuid_placeholder_as_handle_and_tag() {
    let statement = parse_one("new @uuid as @uuid, @uuid;");
    let definition = statement.definition.unwrap();
    assert_eq!(definition.handle.as_deref(), Some("@uuid"));
    assert_eq!(
        definition.tags,
        vec!["@uuid".to_string(), "@uuid".to_string()]
    );
}

#[test]
fn test_at_clause_is_greedy() {
    let statement = parse_one("at * del;");
    assert!(statement.greedy);
    assert_eq!(statement.operation, OperationKind::Delete);
    assert_eq!(statement.context, Some(ExprNode::Special(SpecialKind::Any)));
}

#[test]
fn test_boolean_precedence() {
    let statement = parse_one("in a & b | c get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::Or,
            bin(BinaryKind::And, lit("a"), lit("b")),
            lit("c"),
        ))
    );
}

#[test]
fn test_not_binds_tighter_than_and() {
    let statement = parse_one("in !a & b get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::And,
            ExprNode::Not(Box::new(lit("a"))),
            lit("b"),
        ))
    );
}

#[test]
fn test_transitions_group_rightward() {
    let statement = parse_one("in a/b/c get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::To,
            lit("a"),
            bin(BinaryKind::To, lit("b"), lit("c")),
        ))
    );
}

#[test]
fn test_boolean_binds_tighter_than_transition() {
    let statement = parse_one("in a & b / c get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::To,
            bin(BinaryKind::And, lit("a"), lit("b")),
            lit("c"),
        ))
    );
}

#[test]
fn test_parentheses_override_precedence() {
    let statement = parse_one("in a & (b | c) get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::And,
            lit("a"),
            bin(BinaryKind::Or, lit("b"), lit("c")),
        ))
    );
}

#[test]
fn test_word_operators_match_symbols() {
    assert_eq!(
        parse_one("in a and b or not c get;").context,
        parse_one("in a & b | !c get;").context
    );
    assert_eq!(
        parse_one("in a to b toward c get;").context,
        parse_one("in a / b // c get;").context
    );
}

#[test]
fn test_comma_reads_as_or() {
    assert_eq!(
        parse_one("in a, b get;").context,
        parse_one("in a | b get;").context
    );
}

#[test]
fn test_bare_angle_after_value_is_comparison() {
    let statement = parse_one("in @depth < 2 get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::Compare(CompareKind::Lt),
            ExprNode::Value(ValueKind::Depth),
            ExprNode::Number(2.0),
        ))
    );
}

#[test]
fn test_digit_shaped_words_are_tags_outside_comparisons() {
    let statement = parse_one("in nan & 404 get;");
    assert_eq!(
        statement.context,
        Some(bin(BinaryKind::And, lit("nan"), lit("404")))
    );
    let statement = parse_one("in @count == 404 get;");
    assert_eq!(
        statement.context,
        Some(bin(
            BinaryKind::Compare(CompareKind::Eq),
            ExprNode::Value(ValueKind::Count),
            ExprNode::Number(404.0),
        ))
    );
}

#[test]
fn test_bare_angle_after_tag_is_relational() {
    let statement = parse_one("in a > b get;");
    assert_eq!(
        statement.context,
        Some(bin(BinaryKind::Parent { negated: false }, lit("a"), lit("b")))
    );
}

#[test]
fn test_negated_relational_operators() {
    let statement = parse_one("in a !>> b get;");
    assert_eq!(
        statement.context,
        Some(bin(BinaryKind::Ascend { negated: true }, lit("a"), lit("b")))
    );
}

#[test]
fn test_double_star_is_unconditional() {
    let statement = parse_one("in ** get;");
    assert_eq!(statement.context, Some(ExprNode::Truth(true)));
}

#[test]
fn test_ternary_parses() {
    let statement = parse_one("in a then b else c get;");
    assert_eq!(
        statement.context,
        Some(ExprNode::Ternary {
            condition: Box::new(lit("a")),
            then_branch: Box::new(lit("b")),
            else_branch: Box::new(lit("c")),
        })
    );
}

#[test]
fn test_then_without_else_is_an_error() {
    assert!(matches!(
        parse_error("in a then b get;"),
        Error::Syntax { .. }
    ));
}

#[test]
fn test_empty_context_clause_is_an_error() {
    assert!(matches!(parse_error("in get;"), Error::Syntax { .. }));
}

#[test]
fn test_json_payload_is_parsed() {
    let statement = parse_one(r#"new a is json {"n": 1, "tags": ["x"]} end;"#);
    let payload = statement.definition.unwrap().payload.unwrap();
    let Payload::Data { value, .. } = payload else {
        panic!("expected a data payload");
    };
    assert_eq!(
        value,
        Value::from_json(&serde_json::json!({"n": 1, "tags": ["x"]}))
    );
}

#[test]
fn test_yaml_payload_is_parsed() {
    let statement = parse_one("new a is yaml\nn: 1\nend;");
    let Payload::Data { value, .. } = statement.definition.unwrap().payload.unwrap() else {
        panic!("expected a data payload");
    };
    assert_eq!(value.get_key("n"), Some(&Value::Int(1)));
}

#[test]
fn test_malformed_json_payload_is_an_error() {
    assert!(matches!(
        parse_error("new a is json {broken end;"),
        Error::Syntax { .. }
    ));
}

#[test]
fn test_string_payload() {
    let statement = parse_one("new a is 'note';");
    assert_eq!(
        statement.definition.unwrap().payload,
        Some(Payload::Text("note".into()))
    );
}

#[test]
fn test_has_block_collects_children() {
    let statement = parse_one("new a has { new b; new c is 'p'; };");
    let definition = statement.definition.unwrap();
    assert_eq!(definition.children.len(), 2);
    assert_eq!(
        definition.children[0]
            .definition
            .as_ref()
            .unwrap()
            .handle
            .as_deref(),
        Some("b")
    );
}

#[test]
fn test_has_block_rejects_context_clauses() {
    assert!(matches!(
        parse_error("new a has { in x new b; };"),
        Error::Syntax { .. }
    ));
}

#[test]
fn test_has_block_rejects_non_new_statements() {
    assert!(matches!(
        parse_error("new a has { get; };"),
        Error::Syntax { .. }
    ));
}

#[test]
fn test_get_takes_no_definition() {
    assert!(matches!(parse_error("get a;"), Error::Syntax { .. }));
}

#[test]
fn test_duplicate_tags_are_rejected() {
    assert!(matches!(
        parse_error("new a as b, b;"),
        Error::Syntax { .. }
    ));
    assert!(matches!(parse_error("new a as a;"), Error::Syntax { .. }));
}

#[test]
fn test_canonical_round_trip() {
    let sources = [
        "get;",
        "new car as red, fast;",
        "in a & b | !c get;",
        "at a/b//c del;",
        "in @depth < 2 & a > b get;",
        "new @none as @uuid is json {\"k\": [1, 2.5, true, null]} end;",
        "new a is json {\"c\": \"x\\#y\"} end;",
        "new a is 'it\\'s a note' has { new b; };",
        "in a then b else c get;",
    ];
    for source in sources {
        let first = parse_one(source);
        let second = parse_one(&first.canonical());
        assert_eq!(first, second, "canonical form of {source:?} drifted");
    }
}

#[test]
fn test_from_value_builds_statements() {
    let node = Value::from_json(&serde_json::json!({
        "operation": "new",
        "context": "a & b",
        "greedy": true,
        "handle": "c",
        "tags": ["d"],
        "payload": {"k": 1},
        "nested": [{"operation": "new", "handle": "e"}],
    }));
    let statement = from_value(&node).unwrap();
    assert!(statement.greedy);
    assert_eq!(statement.operation, OperationKind::New);
    assert_eq!(
        statement.context,
        Some(bin(BinaryKind::And, lit("a"), lit("b")))
    );
    let definition = statement.definition.unwrap();
    assert_eq!(definition.handle.as_deref(), Some("c"));
    assert_eq!(definition.children.len(), 1);
}

#[test]
fn test_from_value_rejects_definition_on_get() {
    let node = Value::from_json(&serde_json::json!({
        "operation": "get",
        "handle": "a",
    }));
    assert!(matches!(from_value(&node), Err(Error::Syntax { .. })));
}

#[test]
fn test_from_value_rejects_contextual_nested_statements() {
    let node = Value::from_json(&serde_json::json!({
        "operation": "new",
        "handle": "a",
        "nested": [{"operation": "new", "handle": "b", "context": "x"}],
    }));
    assert!(matches!(from_value(&node), Err(Error::Syntax { .. })));
}

#[test]
fn test_from_values_accepts_list_or_single_node() {
    let single = Value::from_json(&serde_json::json!({"operation": "get"}));
    assert_eq!(from_values(&single).unwrap().len(), 1);
    let list = Value::from_json(&serde_json::json!([
        {"operation": "get"},
        {"operation": "del"},
    ]));
    assert_eq!(from_values(&list).unwrap().len(), 2);
}
