use tagql::lexer::{Lexer, Scan, StatementLexer};
use tagql::{Error, TokenKind};

fn kinds(input: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::new(input);
    let mut kinds = Vec::new();
    loop {
        match lexer.next_token().unwrap() {
            Scan::Token(token) => kinds.push(token.kind),
            Scan::End => return kinds,
            Scan::Partial => panic!("unexpected partial scan"),
        }
    }
}

fn keyword(word: &str) -> TokenKind {
    TokenKind::Keyword(word.into())
}

fn tag(text: &str) -> TokenKind {
    TokenKind::Tag(text.into())
}

fn symbol(text: &str) -> TokenKind {
    TokenKind::Symbol(text.into())
}

#[test]
fn test_keywords_and_tags() {
    assert_eq!(
        kinds("in garage new car as red, fast;"),
        vec![
            keyword("in"),
            tag("garage"),
            keyword("new"),
            tag("car"),
            keyword("as"),
            tag("red"),
            symbol(","),
            tag("fast"),
            symbol(";"),
        ]
    );
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert_eq!(kinds("NEW Garage"), vec![keyword("new"), tag("Garage")]);
}

#[test]
fn test_marker_forces_keyword_reading() {
    assert_eq!(kinds("@NONE @uuid"), vec![keyword("none"), keyword("uuid")]);
}

#[test]
fn test_identifiers_may_start_with_digits() {
    assert_eq!(kinds("123abc"), vec![tag("123abc")]);
}

#[test]
fn test_numeric_literal_with_fraction_is_one_token() {
    assert_eq!(
        kinds("depth == 2.5"),
        vec![keyword("depth"), symbol("=="), tag("2.5")]
    );
}

#[test]
fn test_comment_runs_to_end_of_line() {
    assert_eq!(kinds("a # b c d\ne"), vec![tag("a"), tag("e")]);
}

#[test]
fn test_longest_match_symbols() {
    assert_eq!(
        kinds("!>> !< << >= // ** != &"),
        vec![
            symbol("!>>"),
            symbol("!<"),
            symbol("<<"),
            symbol(">="),
            symbol("//"),
            symbol("**"),
            symbol("!="),
            symbol("&"),
        ]
    );
}

#[test]
fn test_lone_equals_is_an_error() {
    let mut lexer = Lexer::new("a = b");
    assert!(matches!(lexer.next_token(), Ok(Scan::Token(_))));
    assert!(lexer.next_token().is_err());
}

#[test]
fn test_line_string() {
    assert_eq!(
        kinds("'hello world'"),
        vec![TokenKind::LineString("hello world".into())]
    );
}

#[test]
fn test_line_string_escapes() {
    assert_eq!(
        kinds(r"'it\'s\n'"),
        vec![TokenKind::LineString("it's\n".into())]
    );
}

#[test]
fn test_line_string_rejects_newline() {
    let mut lexer = Lexer::new("'broken\n'");
    assert!(lexer.next_token().is_err());
}

#[test]
fn test_multi_string_spans_lines() {
    assert_eq!(
        kinds("`two\nlines`"),
        vec![TokenKind::MultiString("two\nlines".into())]
    );
}

#[test]
fn test_dynamic_string_keeps_directives() {
    assert_eq!(
        kinds("\"id @uuid here\""),
        vec![TokenKind::DynamicString("id @uuid here".into())]
    );
}

#[test]
fn test_nested_variable_reference() {
    assert_eq!(
        kinds("@outer{@inner{leaf}}"),
        vec![tag("@outer{@inner{leaf}}")]
    );
}

#[test]
fn test_unmatched_variable_brace_is_an_error() {
    let mut lexer = Lexer::new("@outer{*}");
    assert!(lexer.next_token().is_err());
}

#[test]
fn test_payload_block_is_raw() {
    assert_eq!(
        kinds(r#"json {"a": 1} end"#),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" {\"a\": 1} ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_end_needs_word_boundary() {
    assert_eq!(
        kinds(r#"json "legend" end"#),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" \"legend\" ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_at_end_directive() {
    assert_eq!(
        kinds(r#"json {"a": 1}@end"#),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" {\"a\": 1}".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_uuid_directive_is_spliced_quoted() {
    assert_eq!(
        kinds("json {\"id\": @uuid} end"),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" {\"id\": \"@uuid\"} ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_escaped_e_suppresses_terminator() {
    assert_eq!(
        kinds(r"json x\end end"),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" xend ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_escaped_marker() {
    assert_eq!(
        kinds(r"json a\@b end"),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" a@b ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_other_backslash_pairs_pass_through() {
    assert_eq!(
        kinds(r#"json "a\nb" end"#),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" \"a\\nb\" ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_comment_is_stripped() {
    assert_eq!(
        kinds("json {\"a\": 1} # note the end\nend"),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" {\"a\": 1} ".into()),
            TokenKind::DataFragment("\n".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_escaped_hash_is_literal() {
    assert_eq!(
        kinds(r"json x\#y end"),
        vec![
            keyword("json"),
            TokenKind::DataFragment(" x#y ".into()),
            keyword("end"),
        ]
    );
}

#[test]
fn test_payload_unknown_directive_is_an_error() {
    let mut lexer = Lexer::new("json @nope end");
    assert!(matches!(lexer.next_token(), Ok(Scan::Token(_))));
    assert!(lexer.next_token().is_err());
}

#[test]
fn test_positions_track_lines_and_columns() {
    let mut lexer = Lexer::new("a\n  b");
    let Scan::Token(first) = lexer.next_token().unwrap() else {
        panic!("expected a token");
    };
    assert_eq!((first.position.line, first.position.column), (1, 1));
    let Scan::Token(second) = lexer.next_token().unwrap() else {
        panic!("expected a token");
    };
    assert_eq!((second.position.line, second.position.column), (2, 3));
}

#[test]
fn test_statement_lexer_splits_on_terminator() {
    let mut lexer = StatementLexer::new();
    lexer.feed("new a; new b;");
    let first = lexer.next(false).unwrap().unwrap();
    assert!(first.last().unwrap().is_symbol(";"));
    assert_eq!(first.len(), 3);
    let second = lexer.next(false).unwrap().unwrap();
    assert_eq!(second.len(), 3);
    assert!(lexer.next(false).unwrap().is_none());
}

#[test]
fn test_statement_lexer_ignores_semicolons_inside_braces() {
    let mut lexer = StatementLexer::new();
    lexer.feed("new a has { new b; new c; };");
    let tokens = lexer.next(false).unwrap().unwrap();
    assert!(tokens.last().unwrap().is_symbol(";"));
    assert!(lexer.next(false).unwrap().is_none());
}

#[test]
fn test_statement_lexer_carries_incomplete_input() {
    let mut lexer = StatementLexer::new();
    lexer.feed("in gara");
    assert!(lexer.next(true).unwrap().is_none());
    assert!(lexer.carrying());
    lexer.feed("ge get;");
    let tokens = lexer.next(true).unwrap().unwrap();
    assert!(!lexer.carrying());

    let mut whole = StatementLexer::new();
    whole.feed("in garage get;");
    let expected = whole.next(false).unwrap().unwrap();
    let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
    let expected_kinds: Vec<_> = expected.into_iter().map(|t| t.kind).collect();
    assert_eq!(kinds, expected_kinds);
}

#[test]
fn test_statement_lexer_split_anywhere() {
    let source = "in garage new car as red, fast is json {\"a\": 1} end;";
    let mut whole = StatementLexer::new();
    whole.feed(source);
    let expected: Vec<_> = whole
        .next(false)
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect();

    for (split, _) in source.char_indices().skip(1) {
        let mut lexer = StatementLexer::new();
        lexer.feed(&source[..split]);
        assert!(
            lexer.next(true).unwrap().is_none(),
            "prefix up to byte {split} produced a statement"
        );
        lexer.feed(&source[split..]);
        let tokens: Vec<_> = lexer
            .next(true)
            .unwrap()
            .unwrap_or_else(|| panic!("no statement after split at byte {split}"))
            .into_iter()
            .map(|t| t.kind)
            .collect();
        assert_eq!(tokens, expected, "split at byte {split} changed the tokens");
    }
}

#[test]
fn test_statement_lexer_rejects_leftover_without_carry() {
    let mut lexer = StatementLexer::new();
    lexer.feed("in a get");
    let error = lexer.next(false).unwrap_err();
    assert!(matches!(error, Error::Syntax { .. }));
    assert!(!lexer.carrying());
}

#[test]
fn test_statement_lexer_unmatched_closing_brace() {
    let mut lexer = StatementLexer::new();
    lexer.feed("new a; } new b;");
    assert!(lexer.next(false).unwrap().is_some());
    assert!(lexer.next(false).is_err());
    assert!(!lexer.carrying());
}

#[test]
fn test_statement_lexer_reset_drops_carry() {
    let mut lexer = StatementLexer::new();
    lexer.feed("in half");
    assert!(lexer.next(true).unwrap().is_none());
    lexer.reset();
    assert!(!lexer.carrying());
    assert!(lexer.next(true).unwrap().is_none());
}
