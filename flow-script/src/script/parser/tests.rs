//! # Parser 测试

use super::*;

fn kinds_and_contents(blocks: &[ParsedBlock]) -> Vec<(BlockType, &str)> {
    blocks
        .iter()
        .map(|block| (block.kind, block.content.as_str()))
        .collect()
}

// -------------------------------------------------------------------------
// 文本块与分隔符
// -------------------------------------------------------------------------

#[test]
fn test_parse_text_blocks() {
    let blocks = parse_blocks("\nText1\nText2\n\nText3\n\n").unwrap();
    assert!(blocks.iter().all(|block| block.attributes.is_none()));

    insta::assert_debug_snapshot!(kinds_and_contents(&blocks), @r#"
    [
        (
            Text,
            "Text1",
        ),
        (
            Text,
            "Text2",
        ),
        (
            Separator,
            "",
        ),
        (
            Text,
            "Text3",
        ),
    ]
    "#);
}

#[test]
fn test_blank_line_runs_collapse() {
    let blocks = parse_blocks("\n\n  \nA\n\n \t\n\nB\nC\n   \n\n").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks)
            .into_iter()
            .map(|(kind, _)| kind)
            .collect::<Vec<_>>(),
        vec![
            BlockType::Text,
            BlockType::Separator,
            BlockType::Text,
            BlockType::Text
        ]
    );
    assert_eq!(blocks[2].content, "B");
    assert_eq!(blocks[3].content, "C");
}

#[test]
fn test_empty_and_blank_text() {
    assert!(parse_blocks("").unwrap().is_empty());
    assert!(parse_blocks("\n \n\t\n").unwrap().is_empty());
}

#[test]
fn test_text_keeps_quotes_and_brackets() {
    let blocks = parse_blocks("他说：'你好\n[[不是字符串\n").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![(BlockType::Text, "他说：'你好"), (BlockType::Text, "[[不是字符串")]
    );
}

#[test]
fn test_carriage_return_removed() {
    let blocks = parse_blocks("A\r\n\r\nB\r\n").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![
            (BlockType::Text, "A"),
            (BlockType::Separator, ""),
            (BlockType::Text, "B")
        ]
    );
}

#[test]
fn test_block_line_numbers() {
    let blocks = parse_blocks("\n\nA\n<| x |>\n\n  B").unwrap();
    let lines: Vec<usize> = blocks.iter().map(|block| block.line).collect();
    assert_eq!(lines, vec![3, 4, 5, 6]);
}

// -------------------------------------------------------------------------
// 代码块
// -------------------------------------------------------------------------

#[test]
fn test_parse_execution_blocks() {
    let blocks = parse_blocks("\n<| code1() |>\n<| code2() |>\n\n@<| code3() |>\n\n\n").unwrap();
    assert!(blocks.iter().all(|block| block.attributes.is_none()));
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![
            (BlockType::LazyExecution, " code1() "),
            (BlockType::LazyExecution, " code2() "),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " code3() "),
        ]
    );
}

#[test]
fn test_block_end_inside_comment() {
    let blocks =
        parse_blocks("\n<|-- Comment |>\ncode1() |>\n<| code2() |>\n\n@<| --[[ Comment |> ]] code3() |>\n")
            .unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![
            (BlockType::LazyExecution, "-- Comment |>\ncode1() "),
            (BlockType::LazyExecution, " code2() "),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " --[[ Comment |> ]] code3() "),
        ]
    );
}

#[test]
fn test_block_end_inside_string() {
    let blocks = parse_blocks("<| say('|>', \"<|\") |>\n<| s = [=[ a [[ |> ]] ]=]|>").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![
            (BlockType::LazyExecution, " say('|>', \"<|\") "),
            (BlockType::LazyExecution, " s = [=[ a [[ |> ]] ]=]"),
        ]
    );
}

#[test]
fn test_mixed_blocks() {
    let blocks = parse_blocks("\n@<| hello_world |>\n\n<|\n--[[ <| |> ]] |>\nText\n\n").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![
            (BlockType::EagerExecution, " hello_world "),
            (BlockType::Separator, ""),
            (BlockType::LazyExecution, "\n--[[ <| |> ]] "),
            (BlockType::Text, "Text"),
        ]
    );
}

#[test]
fn test_block_with_empty_line_inside() {
    let blocks = parse_blocks("<| code1() |>\n<| code2()\n\ncode2_2() |>\n\n@<| code3() |>").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![
            (BlockType::LazyExecution, " code1() "),
            (BlockType::LazyExecution, " code2()\n\ncode2_2() "),
            (BlockType::Separator, ""),
            (BlockType::EagerExecution, " code3() "),
        ]
    );
}

#[test]
fn test_trailing_whitespace_after_block_end() {
    let blocks = parse_blocks("  <| a() |>   \nB").unwrap();
    assert_eq!(
        kinds_and_contents(&blocks),
        vec![(BlockType::LazyExecution, " a() "), (BlockType::Text, "B")]
    );
}

// -------------------------------------------------------------------------
// 属性表
// -------------------------------------------------------------------------

#[test]
fn test_parse_attributes() {
    let blocks =
        parse_blocks("[stage = before, flag, 'long key'=\"a\\tb\", stage=after]<| code() |>")
            .unwrap();
    assert_eq!(blocks.len(), 1);
    let block = &blocks[0];
    assert_eq!(block.kind, BlockType::LazyExecution);
    assert_eq!(block.content, " code() ");

    let attributes = block.attributes.as_ref().unwrap();
    assert_eq!(attributes.len(), 3);
    // 同名键后者覆盖前者
    assert_eq!(attributes["stage"], Some("after".to_string()));
    assert_eq!(attributes["flag"], None);
    assert_eq!(attributes["long key"], Some("a\tb".to_string()));
}

#[test]
fn test_parse_eager_attributes() {
    let blocks = parse_blocks("@[]<| a |>\n@[x=1]<| b |>").unwrap();
    assert_eq!(blocks[0].kind, BlockType::EagerExecution);
    assert_eq!(blocks[0].attributes, Some(Attributes::new()));
    assert_eq!(blocks[1].kind, BlockType::EagerExecution);
    assert_eq!(
        blocks[1].attributes.as_ref().unwrap()["x"],
        Some("1".to_string())
    );
}

// -------------------------------------------------------------------------
// 错误
// -------------------------------------------------------------------------

#[test]
fn test_unpaired_block_start() {
    assert_eq!(
        parse_blocks("Text\n  <| code()\nmore"),
        Err(ParseError::UnpairedBlockStart { line: 2, column: 3 })
    );
}

#[test]
fn test_text_after_block_end() {
    let err = parse_blocks("<| a |> b").unwrap_err();
    assert!(matches!(err, ParseError::UnexpectedToken { line: 1, column: 9, .. }));
}

#[test]
fn test_malformed_attributes() {
    assert!(matches!(
        parse_blocks("[a b]<| |>"),
        Err(ParseError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse_blocks("[a=]<| |>"),
        Err(ParseError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse_blocks("[a=1"),
        Err(ParseError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse_blocks("[a=[[x]]]<| |>"),
        Err(ParseError::UnexpectedToken { .. })
    ));
    assert!(matches!(
        parse_blocks("[a]\n"),
        Err(ParseError::UnexpectedToken { .. })
    ));
}

#[test]
fn test_eager_without_code() {
    assert!(matches!(
        parse_blocks("@label"),
        Err(ParseError::UnexpectedToken { line: 1, column: 2, .. })
    ));
}

#[test]
fn test_errors_inside_code_block() {
    assert!(matches!(
        parse_blocks("<| x = 'abc\n |>"),
        Err(ParseError::UnpairedQuote { line: 1, column: 8 })
    ));
    assert!(matches!(
        parse_blocks("<| --[[ x |>"),
        Err(ParseError::UnpairedBlockComment { .. })
    ));
    assert!(matches!(
        parse_blocks("<| x = [[ a |>"),
        Err(ParseError::UnpairedMultilineString { .. })
    ));
}

#[test]
fn test_unclosed_deep_long_brackets_in_block() {
    let text = format!("<| {} |>", "[[".repeat(200_000));
    assert_eq!(
        parse_blocks(&text),
        Err(ParseError::UnpairedMultilineString { line: 1, column: 4 })
    );
}

// -------------------------------------------------------------------------
// 确定性与 chunk 切分
// -------------------------------------------------------------------------

#[test]
fn test_parse_is_deterministic() {
    let text = "@<| label('a') |>\nA::x\n[k=v]<| y() |>\n\nB\n@<| jump_to('b') |>\n";
    assert_eq!(parse_blocks(text).unwrap(), parse_blocks(text).unwrap());
}

#[test]
fn test_parse_chunks() {
    let chunks = parse_chunks("@<| a |>\nT1\n<| l() |>\nT2\n\nT3\n@<| b |>\n@<| c |>").unwrap();
    let shape: Vec<Vec<BlockType>> = chunks
        .iter()
        .map(|chunk| chunk.iter().map(|block| block.kind).collect())
        .collect();
    assert_eq!(
        shape,
        vec![
            vec![BlockType::EagerExecution],
            vec![BlockType::Text, BlockType::LazyExecution, BlockType::Text],
            vec![BlockType::Text],
            vec![BlockType::EagerExecution],
            vec![BlockType::EagerExecution],
        ]
    );
}
